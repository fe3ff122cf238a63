//! Content index: the durable file ledger and the in-memory vector index,
//! plus blob storage, text extraction and description helpers used while
//! ingesting uploads.

pub mod describe;
pub mod extract;
pub mod ledger;
pub mod schema;
pub mod storage;
pub mod vector;

pub use ledger::{Ledger, DEFAULT_LIST_LIMIT};
pub use schema::{ContentType, FileRecord, QueryMatch, VectorMetadata, VectorRecord};
pub use storage::{BlobStore, LocalBlobStore};
pub use vector::{cosine_similarity, VectorIndex};
