//! Flat-to-nested reconstruction.

use std::collections::HashMap;
use std::sync::Arc;

use nest_types::CommentRecord;

use crate::node::{CommentNode, Replies};

/// Mutable node used while the tree is being assembled.
struct Draft {
    record: CommentRecord,
    children: Vec<usize>,
}

/// Nest a flat, unordered set of records into a tree.
///
/// Returns the root sequence. Every sibling sequence is sorted ascending by
/// `created_at`; the sort is stable, so records with equal timestamps keep
/// their input order.
///
/// A record whose `parent_id` is absent from `records` becomes a root rather
/// than being dropped. The same holds for records caught in a parent cycle:
/// the first of them in input order is promoted to a root. The output always
/// contains every input record exactly once.
pub fn build_tree(records: impl IntoIterator<Item = CommentRecord>) -> Replies {
    // Pass 1: index every record by id.
    let mut drafts: Vec<Draft> = records
        .into_iter()
        .map(|record| Draft {
            record,
            children: Vec::new(),
        })
        .collect();
    let mut by_id: HashMap<&str, usize> = HashMap::with_capacity(drafts.len());
    for (slot, draft) in drafts.iter().enumerate() {
        by_id.entry(draft.record.id.as_str()).or_insert(slot);
    }

    // Pass 2: attach each record to its parent, or collect it as a root.
    let mut roots = Vec::new();
    let mut links = Vec::new();
    for (slot, draft) in drafts.iter().enumerate() {
        match draft.record.parent_id.as_deref().and_then(|p| by_id.get(p)) {
            Some(&parent) => links.push((parent, slot)),
            None => roots.push(slot),
        }
    }
    drop(by_id);
    for (parent, child) in links {
        drafts[parent].children.push(child);
    }

    // Pass 3: sort siblings and freeze into shared nodes.
    let mut taken: Vec<Option<CommentRecord>> = Vec::with_capacity(drafts.len());
    let mut children: Vec<Vec<usize>> = Vec::with_capacity(drafts.len());
    for draft in drafts {
        taken.push(Some(draft.record));
        children.push(draft.children);
    }
    let mut freezer = Freezer { taken, children };

    let mut nodes: Vec<Arc<CommentNode>> = roots
        .into_iter()
        .filter_map(|slot| freezer.freeze(slot))
        .collect();

    // Anything still unfrozen sits on a parent cycle and is unreachable from
    // the roots found above.
    for slot in 0..freezer.taken.len() {
        if let Some(node) = freezer.freeze(slot) {
            nodes.push(node);
        }
    }

    sort_siblings(&mut nodes);
    Replies::from_shared(nodes)
}

struct Freezer {
    taken: Vec<Option<CommentRecord>>,
    children: Vec<Vec<usize>>,
}

/// A node whose children are still being frozen.
struct Frame {
    record: CommentRecord,
    /// Child slots not yet visited, last-first.
    pending: Vec<usize>,
    replies: Vec<Arc<CommentNode>>,
}

impl Freezer {
    /// Build the subtree rooted at `slot`. Returns `None` if `slot` was
    /// already consumed, which also breaks parent cycles.
    ///
    /// Post-order over an explicit stack: a node is finished once all of its
    /// children are.
    fn freeze(&mut self, slot: usize) -> Option<Arc<CommentNode>> {
        let mut stack = vec![self.open(slot)?];
        while let Some(top) = stack.last_mut() {
            if let Some(child) = top.pending.pop() {
                if let Some(frame) = self.open(child) {
                    stack.push(frame);
                }
                continue;
            }
            let Frame {
                record,
                mut replies,
                ..
            } = stack.pop()?;
            sort_siblings(&mut replies);
            let mut node = CommentNode::leaf(record);
            node.replies = Replies::from_shared(replies);
            let node = Arc::new(node);
            match stack.last_mut() {
                Some(parent) => parent.replies.push(node),
                None => return Some(node),
            }
        }
        None
    }

    fn open(&mut self, slot: usize) -> Option<Frame> {
        let record = self.taken[slot].take()?;
        let mut pending = std::mem::take(&mut self.children[slot]);
        pending.reverse();
        Some(Frame {
            record,
            replies: Vec::with_capacity(pending.len()),
            pending,
        })
    }
}

/// Stable ascending sort by `created_at` (plain string comparison).
fn sort_siblings(nodes: &mut [Arc<CommentNode>]) {
    nodes.sort_by(|a, b| a.created_at.cmp(&b.created_at));
}
