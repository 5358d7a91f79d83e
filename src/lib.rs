pub mod error;
pub mod ids;
pub mod models;
pub mod repo;
pub mod resolve;
pub mod service;
pub mod storage;

// Re-export commonly used items for tests / external users
pub use error::{DeleteFailure, PostError};
pub use resolve::{collect_object_refs, resolve_object_ref, ObjectRef, StorageConfig};
pub use service::{DeletionReport, PostService};
