//! Local edits on an existing tree.
//!
//! Both edits are total: a target that is not in the tree is a no-op, not an
//! error, because the target may already have been removed by another edit.
//! A no-op returns the input sequence itself (same allocation).

use std::sync::Arc;

use crate::node::{CommentNode, Replies};

/// Index path from the roots to the first node with `id` in pre-order.
fn find_path(tree: &Replies, id: &str) -> Option<Vec<usize>> {
    let mut path = Vec::new();
    let mut stack: Vec<(usize, usize, &Arc<CommentNode>)> = tree
        .iter()
        .enumerate()
        .rev()
        .map(|(index, node)| (0, index, node))
        .collect();
    while let Some((depth, index, node)) = stack.pop() {
        path.truncate(depth);
        path.push(index);
        if node.id == id {
            return Some(path);
        }
        stack.extend(
            node.replies
                .iter()
                .enumerate()
                .rev()
                .map(|(index, child)| (depth + 1, index, child)),
        );
    }
    None
}

/// Rebuild the tree along a non-empty `path`.
///
/// `edit` receives the sequence holding the target and the target's index
/// in it, and returns that sequence's replacement. Every ancestor on the
/// path is copied; everything off the path is shared with `tree`.
fn rewrite_path(
    tree: &Replies,
    path: &[usize],
    edit: impl FnOnce(&Replies, usize) -> Replies,
) -> Replies {
    // containers[k] is the sequence holding the node at path[k].
    let mut containers = Vec::with_capacity(path.len());
    let mut list = tree;
    for &index in path {
        containers.push(list);
        list = &list[index].replies;
    }

    let last = path.len() - 1;
    let mut current = edit(containers[last], path[last]);
    for k in (0..last).rev() {
        let owner = &containers[k][path[k]];
        current = containers[k].replaced(path[k], Arc::new(owner.with_replies(current)));
    }
    current
}

/// Append `reply` to the end of the replies of the node with `parent_id`.
///
/// The reply is not sorted into place. If its `created_at` is earlier than
/// an existing sibling it stays at the end until the next full rebuild.
/// When several nodes share `parent_id`, the first in pre-order gets it.
///
/// If no node has `parent_id`, returns `tree` unchanged.
pub fn insert_reply(tree: &Replies, parent_id: &str, reply: CommentNode) -> Replies {
    let Some(path) = find_path(tree, parent_id) else {
        return tree.clone();
    };
    rewrite_path(tree, &path, |list, index| {
        let parent = &list[index];
        let replies = parent.replies.appended(Arc::new(reply));
        list.replaced(index, Arc::new(parent.with_replies(replies)))
    })
}

/// Append `node` to the end of the root sequence.
pub fn append_root(tree: &Replies, node: CommentNode) -> Replies {
    tree.appended(Arc::new(node))
}

/// Remove every node with `id` together with its whole reply subtree.
///
/// If no node has `id`, returns `tree` unchanged.
pub fn remove_subtree(tree: &Replies, id: &str) -> Replies {
    let mut current = tree.clone();
    while let Some(path) = find_path(&current, id) {
        current = rewrite_path(&current, &path, |list, index| list.without(index));
    }
    current
}
