pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod ocr;
pub mod router;
pub mod service;
pub mod types;

pub use error::ExpoError;
pub use router::{ExpoState, expo_router};
