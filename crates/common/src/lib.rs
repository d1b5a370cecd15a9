//! Common utilities and shared types for huddle.
//!
//! This crate provides foundational components used across all huddle crates:
//!
//! - **Configuration**: Application settings via [`Config`]
//! - **Error handling**: Unified error types via [`AppError`] and [`AppResult`]
//! - **ID Generation**: time-ordered UUID identifiers via [`IdGenerator`]
//! - **Storage**: presigned upload/download URLs for object storage
//! - **URL Preview**: Open Graph / Twitter Card fetching for link cards
//!
//! # Example
//!
//! ```no_run
//! use huddle_common::{Config, IdGenerator, AppResult};
//!
//! fn example() -> AppResult<()> {
//!     let config = Config::load()?;
//!     let id_gen = IdGenerator::new();
//!     let id = id_gen.generate();
//!     println!("Listening on {} with id {}", config.port, id);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod id;
pub mod storage;
pub mod url_preview;

pub use config::{Config, Environment, ObjectStorageConfig};
pub use error::{AppError, AppResult};
pub use id::IdGenerator;
pub use storage::{DisabledStorage, PresignedUrl, StorageService, generate_storage_key};
#[cfg(feature = "s3")]
pub use storage::S3Storage;
pub use url_preview::{HttpOgpFetcher, OgpFetcher, UrlPreview, UrlPreviewConfig};
