//! Reply trees for Nest.
//!
//! Turns flat [`CommentRecord`](nest_types::CommentRecord)s into nested
//! [`CommentNode`]s and applies local edits to an existing tree. Nothing here
//! performs I/O or holds shared mutable state, so every function is safe to
//! call from any thread.
//!
//! # Structural sharing
//!
//! Nodes are immutable and reference-counted. The editing functions copy only
//! the path from a root down to the edited node; every other subtree, and the
//! whole tree when nothing matched, comes back as the very same allocation.
//! Callers detect "nothing changed" with [`Replies::ptr_eq`].
//!
//! # Modules
//!
//! - [`node`]: [`CommentNode`] and the [`Replies`] sequence
//! - [`builder`]: [`build_tree`]
//! - [`editor`]: [`insert_reply`], [`append_root`], [`remove_subtree`]

pub mod builder;
pub mod editor;
pub mod node;

pub use builder::build_tree;
pub use editor::{append_root, insert_reply, remove_subtree};
pub use node::{CommentNode, Replies};
