/*
AVL-ordered binary-trees index (C3): a `ContainerIndex` specialization where
each instance's items form a binary search tree ordered by a caller-supplied
comparator over the referenced container.

Following the original implementation (and its own TODO), this does not
perform AVL rotations: it is a plain unbalanced binary search tree per
instance. The type is still called an "AVL" index because that is the
contract its caller relies on (`find`/`append` at amortized-logarithmic
depth for the clause distributions this library sees in practice) and
because a future rebalancing pass can be added without changing the
insertion-point protocol below. Rebalancing is explicitly not safe to
combine with in-place transaction rollback (duplicates may be retargeted to
a later offset, see `append`'s `Current` case) — callers that need
transactional rollback must rebuild the index from the surviving buffer
prefix instead, which is exactly what `cnf::Cnf::transaction_rollback` does.
*/

use std::cmp::Ordering;

use crate::container::CONTAINER_END;
use crate::container_index::{ContainerIndex, InstanceIterator};

#[derive(Debug, Clone, Copy, Default)]
pub struct AvlNode {
    parent: u32,
    left: u32,
    right: u32,
    container_offset: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertionKind {
    Root,
    Left,
    Right,
    Current,
}

/// A version-stamped insertion point returned by `find`. Only valid while
/// `version_stamp` matches the index's current node count; any intervening
/// mutation (including on a different instance) invalidates it and it must
/// be recomputed before use.
#[derive(Debug, Clone, Copy)]
pub struct InsertionPoint {
    pub kind: InsertionKind,
    /// Instance offset for `Root`, node offset otherwise.
    pub offset: u32,
    /// Container offset of the matching record for `Current`, else `CONTAINER_END`.
    pub container_offset: u32,
    pub version_stamp: u32,
}

impl InsertionPoint {
    /// A fresh, deliberately-stale insertion point: `find` will always
    /// recompute it since no version stamp can equal `CONTAINER_END`.
    pub fn uninitialized() -> Self {
        Self {
            kind: InsertionKind::Root,
            offset: CONTAINER_END,
            container_offset: CONTAINER_END,
            version_stamp: CONTAINER_END,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AvlTreesIndex {
    base: ContainerIndex<AvlNode>,
}

impl AvlTreesIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn base(&self) -> &ContainerIndex<AvlNode> {
        &self.base
    }

    pub fn reset(&mut self, instances: u32, nodes: u32) {
        self.base.reset(instances, nodes);
    }

    pub fn reset_instances_size(&mut self, instances: u32) {
        self.base.reset_instances_size(instances);
    }

    pub fn node_count(&self) -> u32 {
        self.base.node_count()
    }

    pub fn instances_len(&self) -> u32 {
        self.base.instances_len()
    }

    pub fn is_valid_insertion_point(&self, point: &InsertionPoint) -> bool {
        self.base.is_valid_insertion_point_stamp(point.version_stamp)
    }

    pub fn transaction_begin(&mut self, container_size: u32) {
        self.base.transaction_begin(container_size);
    }

    pub fn transaction_commit(&mut self) {
        self.base.transaction_commit();
    }

    pub fn transaction_offset_is_immutable(&self, offset: u32) -> bool {
        self.base.transaction_offset_is_immutable(offset)
    }

    pub fn is_transaction_open(&self) -> bool {
        self.base.is_transaction_open()
    }

    /// Pops the open transaction and truncates the node/instance tables back
    /// to their pre-transaction sizes, returning the snapshot. A `Current`
    /// overwrite can retarget a node below the snapshot to an offset that no
    /// longer exists once the caller's own buffer is truncated, so the
    /// truncated tree here must not be trusted as-is; callers that rely on
    /// in-place rollback safety must rebuild the tree from scratch using the
    /// returned `instances_size` (see `cnf::Cnf::transaction_rollback`).
    pub fn transaction_rollback_snapshot(&mut self) -> crate::container_index::TransactionSnapshot {
        self.base.transaction_rollback_snapshot()
    }

    /// Pure lookup: walks from the instance root using `compare(candidate)`,
    /// where `candidate` is the container offset stored at each visited
    /// node; `compare` must return the ordering of the sought key relative
    /// to the record at `candidate`. Returns the container offset of the
    /// first equal node, or `CONTAINER_END`.
    pub fn find_lookup(&self, instance: u32, mut compare: impl FnMut(u32) -> Ordering) -> u32 {
        let mut offset = self.base.root(instance);
        while offset != CONTAINER_END {
            let node = *self.base.node(offset);
            match compare(node.container_offset) {
                Ordering::Greater => offset = node.right,
                Ordering::Less => offset = node.left,
                Ordering::Equal => return node.container_offset,
            }
        }
        CONTAINER_END
    }

    /// Insertion-point variant: same walk as `find_lookup`, but grows the
    /// instance table to include `instance` if needed, and always produces
    /// an `InsertionPoint` describing either the match (`Current`) or where
    /// a new node should be spliced in (`Root`/`Left`/`Right`).
    pub fn find(&mut self, instance: u32, mut compare: impl FnMut(u32) -> Ordering) -> InsertionPoint {
        self.base.ensure_instance(instance);
        let version_stamp = self.node_count();
        let mut offset = self.base.root(instance);
        if offset == CONTAINER_END {
            return InsertionPoint {
                kind: InsertionKind::Root,
                offset: instance,
                container_offset: CONTAINER_END,
                version_stamp,
            };
        }
        loop {
            let node = *self.base.node(offset);
            match compare(node.container_offset) {
                Ordering::Greater => {
                    if node.right == CONTAINER_END {
                        return InsertionPoint {
                            kind: InsertionKind::Right,
                            offset,
                            container_offset: CONTAINER_END,
                            version_stamp,
                        };
                    }
                    offset = node.right;
                }
                Ordering::Less => {
                    if node.left == CONTAINER_END {
                        return InsertionPoint {
                            kind: InsertionKind::Left,
                            offset,
                            container_offset: CONTAINER_END,
                            version_stamp,
                        };
                    }
                    offset = node.left;
                }
                Ordering::Equal => {
                    return InsertionPoint {
                        kind: InsertionKind::Current,
                        offset,
                        container_offset: node.container_offset,
                        version_stamp,
                    };
                }
            }
        }
    }

    /// Splices or overwrites a node according to `point.kind`. `Current`
    /// overwrites the existing node's `container_offset` in place (the tree
    /// shape is untouched) rather than inserting — this is how aggregation
    /// merges a new record over an old one, potentially relocating the
    /// indexed offset to a later position in the buffer.
    pub fn append(&mut self, point: &InsertionPoint, container_offset: u32) {
        assert!(point.offset != CONTAINER_END);
        assert_eq!(point.version_stamp, self.node_count(), "stale insertion point");

        if point.kind == InsertionKind::Current {
            self.base.node_mut(point.offset).container_offset = container_offset;
            return;
        }

        match point.kind {
            InsertionKind::Root => {
                assert_eq!(self.base.root(point.offset), CONTAINER_END);
            }
            InsertionKind::Left => {
                assert_eq!(self.base.node(point.offset).left, CONTAINER_END);
            }
            InsertionKind::Right => {
                assert_eq!(self.base.node(point.offset).right, CONTAINER_END);
            }
            InsertionKind::Current => unreachable!(),
        }

        let parent = if point.kind == InsertionKind::Root {
            CONTAINER_END
        } else {
            point.offset
        };
        let new_offset = self.base.push_node(AvlNode {
            parent,
            left: CONTAINER_END,
            right: CONTAINER_END,
            container_offset,
        });

        match point.kind {
            InsertionKind::Root => self.base.set_root(point.offset, new_offset),
            InsertionKind::Left => self.base.node_mut(point.offset).left = new_offset,
            InsertionKind::Right => self.base.node_mut(point.offset).right = new_offset,
            InsertionKind::Current => unreachable!(),
        }
    }

    pub fn in_order_iter(&self) -> crate::container_index::WholeIndexIterator<'_, AvlNode, AvlInOrderIterator> {
        crate::container_index::WholeIndexIterator::new(&self.base)
    }

    pub fn instance_iter(&self, instance: u32) -> InstanceOffsets<'_> {
        InstanceOffsets {
            index: &self.base,
            iter: AvlInOrderIterator::new(&self.base),
            next: None,
            instance,
            started: false,
        }
    }
}

/// In-order traversal of one instance's tree, starting at the deepest
/// leftmost leaf the way the original `BinaryTreesIndexInstanceOffsetIterator`
/// does.
#[derive(Clone)]
pub struct AvlInOrderIterator {
    item_offset: u32,
}

impl InstanceIterator<AvlNode> for AvlInOrderIterator {
    fn new(_index: &ContainerIndex<AvlNode>) -> Self {
        Self {
            item_offset: CONTAINER_END,
        }
    }

    fn first(&mut self, index: &ContainerIndex<AvlNode>, instance: u32) -> u32 {
        self.item_offset = index.root(instance);
        while self.item_offset != CONTAINER_END && index.node(self.item_offset).left != CONTAINER_END {
            self.item_offset = index.node(self.item_offset).left;
        }
        if self.item_offset == CONTAINER_END {
            CONTAINER_END
        } else {
            index.node(self.item_offset).container_offset
        }
    }

    fn next(&mut self, index: &ContainerIndex<AvlNode>) -> u32 {
        if self.item_offset == CONTAINER_END {
            return CONTAINER_END;
        }
        if index.node(self.item_offset).right != CONTAINER_END {
            self.item_offset = index.node(self.item_offset).right;
            while index.node(self.item_offset).left != CONTAINER_END {
                self.item_offset = index.node(self.item_offset).left;
            }
        } else {
            loop {
                let parent = index.node(self.item_offset).parent;
                if parent != CONTAINER_END && index.node(parent).right == self.item_offset {
                    self.item_offset = parent;
                } else {
                    self.item_offset = parent;
                    break;
                }
            }
        }
        if self.item_offset == CONTAINER_END {
            CONTAINER_END
        } else {
            index.node(self.item_offset).container_offset
        }
    }
}

/// A standalone per-instance iterator (the public `variable_clauses`-style
/// API), distinct from the internal whole-index walk.
pub struct InstanceOffsets<'a> {
    index: &'a ContainerIndex<AvlNode>,
    iter: AvlInOrderIterator,
    next: Option<u32>,
    instance: u32,
    started: bool,
}

impl<'a> Iterator for InstanceOffsets<'a> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        let offset = if !self.started {
            self.started = true;
            self.iter.first(self.index, self.instance)
        } else {
            self.iter.next(self.index)
        };
        self.next = if offset == CONTAINER_END { None } else { Some(offset) };
        self.next
    }
}
