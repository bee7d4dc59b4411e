pub mod auth_client;
pub mod export;
pub mod uploads;

pub use auth_client::ExternalAuthClient;
pub use uploads::{Naming, UploadRules, UploadStore};
