pub mod contact;
pub mod exhibition;
pub mod file;
pub mod pagination;
pub mod user;
pub mod validation;

pub use pagination::{Page, Pagination};
