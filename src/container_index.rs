/*
Generic container index (C2): maps an instance id to a per-instance
collection of items, each item referencing one offset in an external data
buffer. This is the layer `AvlTreesIndex` (avl_index.rs) is built on; it
owns the node array and the instance table and knows nothing about
ordering, comparators, or trees — that is the specialization's job.
*/

use crate::container::{GrowableBuffer, CONTAINER_END};

/// Snapshot captured at `transaction_begin`, restored verbatim by the
/// default rollback. Specialized indices (the CNF store's L0 index) instead
/// use this to know how far back to rebuild from.
#[derive(Debug, Clone, Copy)]
pub struct TransactionSnapshot {
    pub node_count: u32,
    pub instances_size: u32,
    pub container_size: u32,
}

/// A version-stamped insertion point base: valid only while `version_stamp`
/// equals the index's current node count. Specializations embed this
/// alongside their own insertion-point payload (see `avl_index::InsertionPoint`).
pub trait VersionStamped {
    fn version_stamp(&self) -> u32;
}

#[derive(Debug, Clone)]
pub struct ContainerIndex<Node: Copy + Default> {
    instances: GrowableBuffer<u32>,
    nodes: GrowableBuffer<Node>,
    transaction: Option<TransactionSnapshot>,
}

impl<Node: Copy + Default> Default for ContainerIndex<Node> {
    fn default() -> Self {
        Self {
            instances: GrowableBuffer::new(),
            nodes: GrowableBuffer::new(),
            transaction: None,
        }
    }
}

impl<Node: Copy + Default> ContainerIndex<Node> {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn node_count(&self) -> u32 {
        self.nodes.len()
    }

    #[inline]
    pub fn instances_len(&self) -> u32 {
        self.instances.len()
    }

    pub fn node(&self, offset: u32) -> &Node {
        self.nodes.get(offset)
    }

    pub fn node_mut(&mut self, offset: u32) -> &mut Node {
        self.nodes.get_mut(offset)
    }

    pub fn push_node(&mut self, node: Node) -> u32 {
        let offset = self.nodes.len();
        self.nodes.push(node);
        offset
    }

    /// Root node offset for `instance`, or `CONTAINER_END` if the instance
    /// has never been assigned one (or doesn't exist in the table yet).
    pub fn root(&self, instance: u32) -> u32 {
        if instance < self.instances.len() {
            *self.instances.get(instance)
        } else {
            CONTAINER_END
        }
    }

    pub fn set_root(&mut self, instance: u32, node: u32) {
        *self.instances.get_mut(instance) = node;
    }

    /// Grows the instance table with `CONTAINER_END` entries so that
    /// `instance` is addressable.
    pub fn ensure_instance(&mut self, instance: u32) {
        if instance >= self.instances.len() {
            let grow_by = instance - self.instances.len() + 1;
            self.instances.append(CONTAINER_END, grow_by);
        }
    }

    pub fn reset(&mut self, instances: u32, nodes: u32) {
        assert!(self.transaction.is_none(), "reset while a transaction is open");
        self.instances.reset(instances);
        self.instances.append(CONTAINER_END, instances);
        self.nodes.reset(nodes);
    }

    pub fn reset_instances_size(&mut self, instances: u32) {
        self.instances.reset(instances);
        self.instances.append(CONTAINER_END, instances);
    }

    #[inline]
    pub fn is_valid_insertion_point_stamp(&self, version_stamp: u32) -> bool {
        version_stamp == self.node_count()
    }

    pub fn transaction_begin(&mut self, container_size: u32) {
        assert!(self.transaction.is_none(), "transactions are not nestable");
        self.transaction = Some(TransactionSnapshot {
            node_count: self.node_count(),
            instances_size: self.instances_len(),
            container_size,
        });
    }

    pub fn transaction_commit(&mut self) {
        assert!(self.transaction.take().is_some(), "commit with no open transaction");
    }

    /// Default rollback: truncate node array and instance table back to the
    /// snapshot. Returns the snapshot so the caller (e.g. the CNF store) can
    /// also truncate its own external buffer and, if it needs to rebuild the
    /// index rather than merely truncate it, do so using the same snapshot.
    pub fn transaction_rollback_snapshot(&mut self) -> TransactionSnapshot {
        let snapshot = self
            .transaction
            .take()
            .expect("rollback with no open transaction");
        self.nodes.truncate(snapshot.node_count);
        self.instances.truncate(snapshot.instances_size);
        snapshot
    }

    pub fn transaction_offset_is_immutable(&self, offset: u32) -> bool {
        match self.transaction {
            Some(snapshot) => offset < snapshot.node_count,
            None => false,
        }
    }

    pub fn is_transaction_open(&self) -> bool {
        self.transaction.is_some()
    }
}

/// Per-instance traversal, delegated to by the whole-index iterator. AVL's
/// in-order walk (`avl_index::AvlInOrderIterator`) is the only implementer
/// today, but the split mirrors the original `ContainerIndexIterator` /
/// `BinaryTreesIndexInstanceOffsetIterator` split so a different ordering
/// strategy could be swapped in without touching the whole-index iterator.
pub trait InstanceIterator<Node: Copy + Default> {
    fn new(index: &ContainerIndex<Node>) -> Self;
    /// Position at the first item of `instance`; returns its container
    /// offset, or `CONTAINER_END` if the instance is empty.
    fn first(&mut self, index: &ContainerIndex<Node>, instance: u32) -> u32;
    /// Advance to the next item of the current instance; returns its
    /// container offset, or `CONTAINER_END` when exhausted.
    fn next(&mut self, index: &ContainerIndex<Node>) -> u32;
}

/// Iterates every referenced container offset across all instances, skipping
/// empty instances, in ascending instance-id order.
pub struct WholeIndexIterator<'a, Node: Copy + Default, Iter: InstanceIterator<Node>> {
    index: &'a ContainerIndex<Node>,
    instance_iterator: Iter,
    instance_offset: u32,
    container_offset: u32,
}

impl<'a, Node: Copy + Default, Iter: InstanceIterator<Node>> WholeIndexIterator<'a, Node, Iter> {
    pub fn new(index: &'a ContainerIndex<Node>) -> Self {
        let mut iterator = Self {
            index,
            instance_iterator: Iter::new(index),
            instance_offset: 0,
            container_offset: CONTAINER_END,
        };
        iterator.load_instance();
        iterator
    }

    fn load_instance(&mut self) {
        while self.instance_offset < self.index.instances_len()
            && self.index.root(self.instance_offset) == CONTAINER_END
        {
            self.instance_offset += 1;
        }
        self.container_offset = if self.instance_offset < self.index.instances_len() {
            self.instance_iterator.first(self.index, self.instance_offset)
        } else {
            CONTAINER_END
        };
    }
}

impl<'a, Node: Copy + Default, Iter: InstanceIterator<Node>> Iterator for WholeIndexIterator<'a, Node, Iter> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        if self.container_offset == CONTAINER_END {
            return None;
        }
        let result = self.container_offset;
        let next_offset = self.instance_iterator.next(self.index);
        if next_offset == CONTAINER_END {
            self.instance_offset += 1;
            self.load_instance();
        } else {
            self.container_offset = next_offset;
        }
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy, Default)]
    struct DummyNode {
        next_in_instance: u32,
        container_offset: u32,
    }

    struct LinkedIterator {
        current: u32,
    }

    impl InstanceIterator<DummyNode> for LinkedIterator {
        fn new(_index: &ContainerIndex<DummyNode>) -> Self {
            Self { current: CONTAINER_END }
        }

        fn first(&mut self, index: &ContainerIndex<DummyNode>, instance: u32) -> u32 {
            self.current = index.root(instance);
            if self.current == CONTAINER_END {
                CONTAINER_END
            } else {
                index.node(self.current).container_offset
            }
        }

        fn next(&mut self, index: &ContainerIndex<DummyNode>) -> u32 {
            if self.current == CONTAINER_END {
                return CONTAINER_END;
            }
            self.current = index.node(self.current).next_in_instance;
            if self.current == CONTAINER_END {
                CONTAINER_END
            } else {
                index.node(self.current).container_offset
            }
        }
    }

    #[test]
    fn whole_index_iterator_skips_empty_instances() {
        let mut index: ContainerIndex<DummyNode> = ContainerIndex::new();
        index.reset(3, 0);
        // instance 0 empty, instance 1 has two linked nodes, instance 2 has one
        let n0 = index.push_node(DummyNode { next_in_instance: CONTAINER_END, container_offset: 100 });
        let n1 = index.push_node(DummyNode { next_in_instance: CONTAINER_END, container_offset: 200 });
        index.node_mut(n0).next_in_instance = n1;
        index.set_root(1, n0);
        let n2 = index.push_node(DummyNode { next_in_instance: CONTAINER_END, container_offset: 300 });
        index.set_root(2, n2);

        let collected: Vec<u32> = WholeIndexIterator::<DummyNode, LinkedIterator>::new(&index).collect();
        assert_eq!(collected, vec![100, 200, 300]);
    }

    #[test]
    fn transaction_rollback_restores_snapshot_sizes() {
        let mut index: ContainerIndex<DummyNode> = ContainerIndex::new();
        index.reset(2, 0);
        index.transaction_begin(0);
        index.push_node(DummyNode::default());
        index.push_node(DummyNode::default());
        assert_eq!(index.node_count(), 2);
        let snapshot = index.transaction_rollback_snapshot();
        assert_eq!(snapshot.node_count, 0);
        assert_eq!(index.node_count(), 0);
    }
}
