//! mediarag — ask questions about the files you uploaded.
//!
//! The content index is the core: a durable [`content::Ledger`] of uploaded
//! file metadata and an in-memory [`content::VectorIndex`] ranking items by
//! cosine similarity. Model calls, blob storage and HTTP routing sit around it
//! behind traits so the core never depends on a concrete provider.

pub mod config;
pub mod content;
pub mod error;
pub mod gateway;
pub mod providers;
pub mod retrieval;

pub use error::{ContentError, Result};
pub use retrieval::{Answer, ContentService, Upload};
