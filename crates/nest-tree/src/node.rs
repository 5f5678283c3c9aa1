use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use nest_types::{CommentRecord, Timestamp};
use serde::ser::{Error as _, SerializeStruct};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Nesting depth past which serialization fails instead of descending
/// further.
pub const MAX_SERIALIZE_DEPTH: usize = 512;

/// One comment together with its reply subtree.
///
/// Built from a [`CommentRecord`]; a node without replies carries an empty
/// [`Replies`], never a missing one.
///
/// Serializes to camelCase JSON with `replies` nested inline. Trees nested
/// deeper than [`MAX_SERIALIZE_DEPTH`] fail to serialize.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentNode {
    pub id: String,
    pub content: String,
    pub created_at: Timestamp,
    pub parent_id: Option<String>,
    pub replies: Replies,
}

impl CommentNode {
    /// A node with no replies.
    pub fn leaf(record: CommentRecord) -> Self {
        Self {
            id: record.id,
            content: record.content,
            created_at: record.created_at,
            parent_id: record.parent_id,
            replies: Replies::empty(),
        }
    }

    /// The same comment with a different reply sequence.
    pub fn with_replies(&self, replies: Replies) -> Self {
        Self {
            id: self.id.clone(),
            content: self.content.clone(),
            created_at: self.created_at.clone(),
            parent_id: self.parent_id.clone(),
            replies,
        }
    }

    /// The flat record for this node, without replies.
    pub fn to_record(&self) -> CommentRecord {
        CommentRecord {
            id: self.id.clone(),
            content: self.content.clone(),
            created_at: self.created_at.clone(),
            parent_id: self.parent_id.clone(),
        }
    }

    /// Number of nodes in this subtree, including this one.
    pub fn subtree_len(&self) -> usize {
        1 + self.replies.total_len()
    }
}

impl Serialize for CommentNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        NodeSer { node: self, depth: 0 }.serialize(serializer)
    }
}

impl From<CommentRecord> for CommentNode {
    fn from(record: CommentRecord) -> Self {
        Self::leaf(record)
    }
}

/// An ordered, immutable sequence of sibling nodes.
///
/// Used both for a node's replies and for the list of roots. Cloning is a
/// reference-count bump; [`ptr_eq`](Replies::ptr_eq) tells whether two
/// values are the same allocation.
///
/// Equality, [`total_len`](Replies::total_len), and dropping all walk the
/// tree with an explicit stack, so a chain of any depth is safe.
#[derive(Clone)]
pub struct Replies(Arc<[Arc<CommentNode>]>);

impl Replies {
    /// An empty sequence.
    pub fn empty() -> Self {
        Self(Arc::from(Vec::new()))
    }

    /// Wrap already shared nodes.
    pub fn from_shared(nodes: Vec<Arc<CommentNode>>) -> Self {
        Self(Arc::from(nodes))
    }

    /// Returns `true` if both values are the same allocation.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }

    /// A new sequence with `node` added at the end.
    pub fn appended(&self, node: Arc<CommentNode>) -> Self {
        let mut nodes = Vec::with_capacity(self.0.len() + 1);
        nodes.extend(self.0.iter().cloned());
        nodes.push(node);
        Self::from_shared(nodes)
    }

    /// A new sequence with the node at `index` swapped for `node`.
    pub(crate) fn replaced(&self, index: usize, node: Arc<CommentNode>) -> Self {
        let mut nodes = self.0.to_vec();
        nodes[index] = node;
        Self::from_shared(nodes)
    }

    /// A new sequence without the node at `index`.
    pub(crate) fn without(&self, index: usize) -> Self {
        let mut nodes = self.0.to_vec();
        nodes.remove(index);
        Self::from_shared(nodes)
    }

    /// Total number of nodes in all subtrees of this sequence.
    pub fn total_len(&self) -> usize {
        self.depth_first().count()
    }

    /// Depth-first search for the node with `id`.
    pub fn find(&self, id: &str) -> Option<&Arc<CommentNode>> {
        self.depth_first()
            .map(|(_, node)| node)
            .find(|node| node.id == id)
    }

    /// Pre-order traversal yielding `(depth, node)`; roots have depth 0.
    pub fn depth_first(&self) -> DepthFirst<'_> {
        DepthFirst {
            stack: self.0.iter().rev().map(|node| (0, node)).collect(),
        }
    }
}

impl Default for Replies {
    fn default() -> Self {
        Self::empty()
    }
}

impl Deref for Replies {
    type Target = [Arc<CommentNode>];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<CommentNode>> for Replies {
    fn from(nodes: Vec<CommentNode>) -> Self {
        Self::from_shared(nodes.into_iter().map(Arc::new).collect())
    }
}

impl PartialEq for Replies {
    /// Same shape and same comments, compared in pre-order.
    fn eq(&self, other: &Self) -> bool {
        if Self::ptr_eq(self, other) {
            return true;
        }
        let mut left = self.depth_first();
        let mut right = other.depth_first();
        loop {
            match (left.next(), right.next()) {
                (None, None) => return true,
                (Some((ld, l)), Some((rd, r)))
                    if ld == rd
                        && l.id == r.id
                        && l.content == r.content
                        && l.created_at == r.created_at
                        && l.parent_id == r.parent_id => {}
                _ => return false,
            }
        }
    }
}

impl Eq for Replies {}

impl Drop for Replies {
    fn drop(&mut self) {
        // Detach uniquely owned reply lists onto a worklist so a long chain
        // is freed one level at a time.
        let mut pending = Vec::new();
        detach_replies(&mut self.0, &mut pending);
        while let Some(mut list) = pending.pop() {
            detach_replies(&mut list.0, &mut pending);
        }
    }
}

fn detach_replies(list: &mut Arc<[Arc<CommentNode>]>, pending: &mut Vec<Replies>) {
    let Some(nodes) = Arc::get_mut(list) else {
        return;
    };
    for node in nodes.iter_mut() {
        if let Some(node) = Arc::get_mut(node) {
            if !node.replies.is_empty() {
                pending.push(std::mem::take(&mut node.replies));
            }
        }
    }
}

impl fmt::Debug for Replies {
    /// Flat pre-order listing of `(depth, id, created_at)`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(
                self.depth_first()
                    .map(|(depth, node)| (depth, &node.id, &node.created_at)),
            )
            .finish()
    }
}

impl Serialize for Replies {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        ListSer { list: self, depth: 0 }.serialize(serializer)
    }
}

/// A reply sequence at a known nesting depth.
struct ListSer<'a> {
    list: &'a Replies,
    depth: usize,
}

struct NodeSer<'a> {
    node: &'a CommentNode,
    depth: usize,
}

impl Serialize for ListSer<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.depth > MAX_SERIALIZE_DEPTH {
            return Err(S::Error::custom(format!(
                "reply tree nested deeper than {MAX_SERIALIZE_DEPTH} levels"
            )));
        }
        let depth = self.depth;
        serializer.collect_seq(self.list.iter().map(|node| NodeSer { node, depth }))
    }
}

impl Serialize for NodeSer<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let node = self.node;
        let mut state = serializer.serialize_struct("CommentNode", 5)?;
        state.serialize_field("id", &node.id)?;
        state.serialize_field("content", &node.content)?;
        state.serialize_field("createdAt", &node.created_at)?;
        state.serialize_field("parentId", &node.parent_id)?;
        state.serialize_field(
            "replies",
            &ListSer {
                list: &node.replies,
                depth: self.depth + 1,
            },
        )?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for Replies {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Vec::<CommentNode>::deserialize(deserializer).map(Self::from)
    }
}

/// Iterator returned by [`Replies::depth_first`].
pub struct DepthFirst<'a> {
    stack: Vec<(usize, &'a Arc<CommentNode>)>,
}

impl<'a> Iterator for DepthFirst<'a> {
    type Item = (usize, &'a Arc<CommentNode>);

    fn next(&mut self) -> Option<Self::Item> {
        let (depth, node) = self.stack.pop()?;
        self.stack
            .extend(node.replies.0.iter().rev().map(|child| (depth + 1, child)));
        Some((depth, node))
    }
}
