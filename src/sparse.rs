//! `LoudsSparse`: the lower tier of the trie, covering every level at or
//! below the dense/sparse cutoff. Each node's children are a contiguous run
//! in a flat [`LabelArray`], with parallel `has_child` and `louds` bits:
//! `louds` marks where a new node's run of children begins (so `select`
//! finds a node's first child), `has_child` marks which children continue
//! into another sparse node rather than terminating a key.
//!
//! A node that is itself a stored key (and also has children below it) is
//! marked by giving it a `TERMINATOR` label as its first child with
//! `has_child` unset, see [`crate::label_array`] for the skip-on-search
//! rule this implies. A node with no children at all never exists as a
//! sparse node: it is represented purely by the non-`has_child` edge in its
//! parent that points at it.

use crate::binary::Reader;
use crate::error::Error;
use crate::key::TERMINATOR;
use crate::label_array::LabelArray;
use crate::rank::RankBitVector;
use crate::select::SelectBitVector;
use crate::suffix::SuffixStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SparseLookup {
    Found(bool),
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoudsSparse {
    labels: LabelArray,
    has_child: RankBitVector,
    louds: SelectBitVector,
    suffixes: SuffixStore,
    /// Added to a local `has_child.rank` result to translate it into this
    /// tier's own node numbering. The dense tier hands off to sparse via
    /// `child_count_dense - node_count_dense` boundary edges that never
    /// appear in `has_child` at all (they live in the dense tier's own
    /// `child_bitmaps`), so a rank computed purely within the sparse
    /// arrays undercounts by exactly that many nodes whenever more than
    /// one such edge exists.
    boundary_offset: usize,
}

impl LoudsSparse {
    pub(crate) fn new(
        labels: LabelArray,
        has_child: RankBitVector,
        louds: SelectBitVector,
        suffixes: SuffixStore,
        boundary_offset: usize,
    ) -> Self {
        LoudsSparse {
            labels,
            has_child,
            louds,
            suffixes,
            boundary_offset,
        }
    }

    pub(crate) fn empty() -> Self {
        LoudsSparse {
            labels: LabelArray::new(Vec::new()),
            has_child: RankBitVector::new(crate::bitvector::PackedBitVector::with_len(0)),
            louds: SelectBitVector::new(crate::bitvector::PackedBitVector::with_len(0)),
            suffixes: SuffixStore::none(),
            boundary_offset: 0,
        }
    }

    pub(crate) fn node_count(&self) -> usize {
        self.louds.num_ones()
    }

    pub(crate) fn labels(&self) -> &LabelArray {
        &self.labels
    }

    pub(crate) fn suffixes(&self) -> &SuffixStore {
        &self.suffixes
    }

    pub(crate) fn has_child_at(&self, pos: usize) -> bool {
        self.has_child.read_bit(pos)
    }

    /// Absolute position of `node`'s first child label.
    pub(crate) fn first_label_pos(&self, node: usize) -> usize {
        self.louds.select(node + 1)
    }

    /// Number of children `node` has (its run length in `labels`).
    pub(crate) fn node_size(&self, node: usize) -> usize {
        let start = self.first_label_pos(node);
        if node + 1 < self.node_count() {
            self.first_label_pos(node + 1) - start
        } else {
            self.labels.len() - start
        }
    }

    /// The node reached by the `has_child` edge at absolute position `pos`,
    /// local to this tier's own numbering (see `boundary_offset`).
    pub(crate) fn child_node(&self, pos: usize) -> usize {
        self.has_child.rank(pos + 1) + self.boundary_offset
    }

    pub(crate) fn suffix_slot(&self, pos: usize) -> usize {
        pos - self.has_child.rank(pos + 1)
    }

    /// True when `node`'s first child is a `TERMINATOR` label, i.e. `node`
    /// is itself a stored key in addition to having children.
    pub(crate) fn is_prefix_key(&self, node: usize) -> bool {
        let start = self.first_label_pos(node);
        self.node_size(node) > 0 && self.labels.get(start) == TERMINATOR
    }

    /// Walks `key` through the sparse tier starting at local `node`, having
    /// already consumed `level` bytes of `key`.
    pub(crate) fn lookup_key(&self, key: &[u8], mut node: usize, mut level: usize) -> SparseLookup {
        loop {
            if level == key.len() {
                if self.is_prefix_key(node) {
                    let pos = self.first_label_pos(node);
                    let idx = self.suffix_slot(pos);
                    return SparseLookup::Found(self.suffixes.check_equality(idx, key, level));
                }
                return SparseLookup::NotFound;
            }
            let start = self.first_label_pos(node);
            let len = self.node_size(node);
            let pos = match self.labels.search(key[level], start, len) {
                Some(pos) => pos,
                None => return SparseLookup::NotFound,
            };
            if !self.has_child.read_bit(pos) {
                let idx = self.suffix_slot(pos);
                return SparseLookup::Found(self.suffixes.check_equality(idx, key, level + 1));
            }
            node = self.child_node(pos);
            level += 1;
        }
    }

    pub fn heap_size(&self) -> usize {
        self.labels.heap_size()
            + self.has_child.heap_size()
            + self.louds.heap_size()
            + self.suffixes.heap_size()
    }

    pub(crate) fn serialize_into(&self, out: &mut Vec<u8>) {
        self.labels.serialize_into(out);
        self.has_child.serialize_into(out);
        self.louds.serialize_into(out);
        self.suffixes.serialize_into(out);
    }

    /// `boundary_offset` is not itself part of this tier's serialized
    /// bytes (it derives entirely from the dense tier already read); the
    /// caller computes it from the deserialized `LoudsDense` and passes it
    /// in here.
    pub(crate) fn deserialize_from(r: &mut Reader, boundary_offset: usize) -> Result<Self, Error> {
        let labels = LabelArray::deserialize_from(r)?;
        let has_child = RankBitVector::deserialize_from(r)?;
        let louds = SelectBitVector::deserialize_from(r)?;
        let suffixes = SuffixStore::deserialize_from(r)?;
        if has_child.num_bits() != labels.len() || louds.num_bits() != labels.len() {
            return Err(Error::CorruptSerialized(
                "sparse tier: label/bitmap length mismatch",
            ));
        }
        Ok(LoudsSparse::new(labels, has_child, louds, suffixes, boundary_offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitvector::PackedBitVector;

    /// One sparse node (node 0, root) with three children: 'a' (leaf),
    /// 'r' (has_child, leads to node 1), and node 1 has a single leaf
    /// child 't'. Node 0 is also itself a stored key ("" as prefix would
    /// be odd at the sparse root, so instead node 1 is marked a prefix
    /// key to exercise the TERMINATOR path): labels = [a, r, TERM, t].
    fn sample() -> LoudsSparse {
        let labels = LabelArray::new(vec![b'a', b'r', TERMINATOR, b't']);
        let mut has_child_bits = PackedBitVector::with_len(4);
        has_child_bits.set_bit(1); // 'r' has a child
        let has_child = RankBitVector::new(has_child_bits);
        let mut louds_bits = PackedBitVector::with_len(4);
        louds_bits.set_bit(0); // node 0 starts at position 0
        louds_bits.set_bit(2); // node 1 starts at position 2 (TERM, t)
        let louds = SelectBitVector::new(louds_bits);
        LoudsSparse::new(labels, has_child, louds, SuffixStore::none(), 0)
    }

    #[test]
    fn finds_leaf_child() {
        let sparse = sample();
        assert_eq!(sparse.lookup_key(b"a", 0, 0), SparseLookup::Found(true));
    }

    #[test]
    fn descends_through_has_child_edge() {
        let sparse = sample();
        assert_eq!(sparse.lookup_key(b"rt", 0, 0), SparseLookup::Found(true));
    }

    #[test]
    fn prefix_key_matches_via_terminator() {
        let sparse = sample();
        assert_eq!(sparse.lookup_key(b"r", 0, 0), SparseLookup::Found(true));
    }

    #[test]
    fn missing_label_not_found() {
        let sparse = sample();
        assert_eq!(sparse.lookup_key(b"z", 0, 0), SparseLookup::NotFound);
        assert_eq!(sparse.lookup_key(b"rz", 0, 0), SparseLookup::NotFound);
    }

    /// `child_node` must add `boundary_offset` to the local rank, not just
    /// return it: two dense nodes hand off to two sparse nodes (local 0
    /// and 1) before node 1's own `has_child` edge (to local node 2) is
    /// reached, so a bare `has_child.rank` at that edge under-reports by
    /// one node.
    #[test]
    fn child_node_applies_boundary_offset() {
        // node 0: one leaf 'x'. node 1: one has_child edge 'y' to node 2.
        // node 2: one leaf 'z'. Both node 0 and node 1 are reached via
        // dense boundary edges that never appear in this tier's own
        // `has_child` bits, so their rank-only positions would both come
        // out as 0 without the offset.
        let labels = LabelArray::new(vec![b'x', b'y', b'z']);
        let mut has_child_bits = PackedBitVector::with_len(3);
        has_child_bits.set_bit(1); // 'y' has a child
        let has_child = RankBitVector::new(has_child_bits);
        let mut louds_bits = PackedBitVector::with_len(3);
        louds_bits.set_bit(0); // node 0 starts at 0
        louds_bits.set_bit(1); // node 1 starts at 1
        louds_bits.set_bit(2); // node 2 starts at 2
        let louds = SelectBitVector::new(louds_bits);
        let sparse = LoudsSparse::new(labels, has_child, louds, SuffixStore::none(), 1);
        assert_eq!(sparse.child_node(1), 2);
        assert_eq!(sparse.lookup_key(b"yz", 1, 0), SparseLookup::Found(true));
    }

    #[test]
    fn node_sizes_match_runs() {
        let sparse = sample();
        assert_eq!(sparse.node_size(0), 2);
        assert_eq!(sparse.node_size(1), 2);
    }
}
