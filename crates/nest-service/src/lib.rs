//! Comment service for Nest.
//!
//! This is the main entry point for applications embedding Nest. It ties the
//! record store to the tree builder, owns id generation and timestamping, and
//! turns storage failures into the service error taxonomy.

pub mod backend;
pub mod config;
pub mod error;
pub mod service;
pub mod session;

pub use backend::CommentBackend;
pub use config::NestConfig;
pub use error::{ServiceError, ServiceResult};
pub use service::CommentService;
pub use session::ThreadSession;

// Re-export key types
pub use nest_store::{InMemoryRecordStore, RecordStore, SyncMode, WalRecordStore, WalStoreConfig};
pub use nest_tree::{append_root, build_tree, insert_reply, remove_subtree, CommentNode, Replies};
pub use nest_types::{CommentRecord, Timestamp};
