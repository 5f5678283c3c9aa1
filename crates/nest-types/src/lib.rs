//! Foundation types for Nest, the nested comment store.
//!
//! Every other Nest crate depends on `nest-types`. The types here are flat:
//! nothing in this crate knows about reply trees.
//!
//! # Key Types
//!
//! - [`CommentRecord`]: Flat, persisted representation of one comment
//! - [`CommentId`]: UUID v7 identifier assigned at creation
//! - [`Timestamp`]: ISO-8601 creation time that sorts lexicographically

pub mod error;
pub mod id;
pub mod record;
pub mod timestamp;

pub use error::TypeError;
pub use id::{validate_id, CommentId};
pub use record::{normalize_content, CommentRecord};
pub use timestamp::Timestamp;
