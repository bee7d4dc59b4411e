//! Database module: schema, row models and queries for persistent storage.
//!
//! Layout:
//! - `models.rs`: Rust structs mirroring DB rows
//! - `schema.rs`: SQL DDL for initializing the database (SQLite-first)
//! - `sqlite.rs`: the `ExpoStorage` handle, connection and schema bootstrap
//! - `users.rs`, `exhibitions.rs`, `contacts.rs`, `files.rs`: per-entity queries

pub mod contacts;
pub mod exhibitions;
pub mod files;
pub mod models;
pub mod schema;
pub mod sqlite;
pub mod users;

pub use models::{ContactFileType, DbContact, DbContactFile, DbExhibition, DbFile, DbUser};
pub use sqlite::ExpoStorage;
