use std::cmp::Ordering;
use std::collections::BinaryHeap;
use tracing::trace;

use crate::error::{HuffError, Result};
use crate::frequency::{FrequencyTable, symbol_label};

/// A Huffman tree node. Leaves carry a symbol, internal nodes carry exactly two children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Leaf(u8),
    Internal { zero: Box<Node>, one: Box<Node> },
}

impl Node {
    pub fn internal(zero: Node, one: Node) -> Self {
        Node::Internal {
            zero: Box::new(zero),
            one: Box::new(one),
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf(_))
    }

    pub fn leaf_count(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            match node {
                Node::Leaf(_) => count += 1,
                Node::Internal { zero, one } => {
                    stack.push(one);
                    stack.push(zero);
                }
            }
        }
        count
    }

    /// Edges on the longest root-to-leaf path. A lone leaf has height 0.
    pub fn height(&self) -> usize {
        let mut deepest = 0;
        let mut stack = vec![(self, 0usize)];
        while let Some((node, depth)) = stack.pop() {
            match node {
                Node::Leaf(_) => deepest = deepest.max(depth),
                Node::Internal { zero, one } => {
                    stack.push((one, depth + 1));
                    stack.push((zero, depth + 1));
                }
            }
        }
        deepest
    }

    /// Draws the tree rotated a quarter turn: the `one` subtree above its parent,
    /// the `zero` subtree below, four spaces of indent per level.
    pub fn render_sideways(&self) -> String {
        let mut out = String::new();
        // (node, depth, children already scheduled)
        let mut stack = vec![(self, 0usize, false)];
        while let Some((node, depth, expanded)) = stack.pop() {
            match node {
                Node::Internal { zero, one } if !expanded => {
                    stack.push((zero, depth + 1, false));
                    stack.push((node, depth, true));
                    stack.push((one, depth + 1, false));
                }
                Node::Internal { .. } => {
                    out.push_str(&"    ".repeat(depth));
                    out.push_str("*\n");
                }
                Node::Leaf(symbol) => {
                    out.push_str(&"    ".repeat(depth));
                    out.push_str(&symbol_label(*symbol));
                    out.push('\n');
                }
            }
        }
        out
    }
}

// Queue entry. Ordering is reversed so BinaryHeap pops the lowest priority,
// then the earliest insertion among equal priorities.
#[derive(Debug)]
struct Queued {
    priority: u64,
    seq: u64,
    node: Node,
}

impl PartialEq for Queued {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}
impl Eq for Queued {}

impl Ord for Queued {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}
impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Min-priority queue with stable insertion-order tie-breaking.
#[derive(Debug, Default)]
struct MergeQueue {
    heap: BinaryHeap<Queued>,
    next_seq: u64,
}

impl MergeQueue {
    fn push(&mut self, node: Node, priority: u64) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Queued {
            priority,
            seq,
            node,
        });
    }

    fn pop(&mut self) -> Option<(Node, u64)> {
        self.heap.pop().map(|q| (q.node, q.priority))
    }

    fn peek_priority(&self) -> Option<u64> {
        self.heap.peek().map(|q| q.priority)
    }

    fn len(&self) -> usize {
        self.heap.len()
    }
}

/// One greedy step of tree construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Merge {
    pub zero: u64,
    pub one: u64,
    /// Lowest priority still queued after both children were removed.
    pub next_lowest: Option<u64>,
}

/// Builds the optimal prefix tree for `table`.
///
/// Leaves enter the queue in ascending symbol order. The first node dequeued
/// becomes the `zero` child, the second the `one` child. A table with a
/// single symbol yields a lone leaf.
pub fn build_tree(table: &FrequencyTable) -> Result<Node> {
    build_tree_observed(table, |_| {})
}

pub(crate) fn build_tree_observed(
    table: &FrequencyTable,
    mut observe: impl FnMut(&Merge),
) -> Result<Node> {
    let mut queue = MergeQueue::default();
    for (symbol, count) in table.iter() {
        queue.push(Node::Leaf(symbol), count);
    }

    loop {
        let Some((zero, zero_weight)) = queue.pop() else {
            return Err(HuffError::EmptyInput);
        };
        let Some((one, one_weight)) = queue.pop() else {
            return Ok(zero);
        };

        let merge = Merge {
            zero: zero_weight,
            one: one_weight,
            next_lowest: queue.peek_priority(),
        };
        trace!(
            zero = merge.zero,
            one = merge.one,
            next = ?merge.next_lowest,
            queued = queue.len(),
            "merge"
        );
        observe(&merge);

        queue.push(Node::internal(zero, one), zero_weight + one_weight);
    }
}
