//! `LoudsDense`: the upper, fixed-fanout tier of the trie. Every node is a
//! 256-bit `label_bitmap` (one bit per possible byte) plus a 256-bit
//! `child_bitmap` (set where that label leads to another node rather than a
//! terminal), plus one bit in `prefix_key_bits` marking "the path ending at
//! this node is itself a stored key".
//!
//! Node numbering within this tier is flat: node 0 is the root, and a node
//! reached via a `has_child` edge gets number `child_bitmaps.rank(pos + 1)`
//! (an inclusive rank, so the first `has_child` edge anywhere produces node
//! 1; node 0 is never "created" by an edge, it pre-exists as the root).
//! The builder only materializes dense nodes for levels below the cutoff,
//! so a `has_child` edge at the last dense level has no corresponding dense
//! node: its rank value is `>= node_count`, and `rank - node_count` is the
//! *sparse*-tier's own local node number (node 0 of
//! [`crate::sparse::LoudsSparse`] is the first such edge in BFS order).

use crate::binary::Reader;
use crate::error::Error;
use crate::key::TERMINATOR;
use crate::rank::RankBitVector;
use crate::suffix::SuffixStore;

/// Width, in bits, of a dense node's label/child bitmaps.
pub(crate) const NODE_FANOUT: usize = 256;

/// Outcome of walking `key` through the dense tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum DenseLookup {
    /// The key's fate was fully decided within the dense tier.
    Found(bool),
    /// The key does not exist along this path.
    NotFound,
    /// The dense tier ran out of levels while the key still had bytes
    /// left; `node` is the LOUDS-sparse *local* node number the search must
    /// continue at, and `level` is how many key bytes have already been
    /// consumed.
    ContinueInSparse { node: usize, level: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoudsDense {
    label_bitmaps: RankBitVector,
    child_bitmaps: RankBitVector,
    prefix_key_bits: RankBitVector,
    suffixes: SuffixStore,
    node_count: usize,
}

impl LoudsDense {
    pub(crate) fn new(
        label_bitmaps: RankBitVector,
        child_bitmaps: RankBitVector,
        prefix_key_bits: RankBitVector,
        suffixes: SuffixStore,
    ) -> Self {
        let node_count = label_bitmaps.num_bits() / NODE_FANOUT;
        LoudsDense {
            label_bitmaps,
            child_bitmaps,
            prefix_key_bits,
            suffixes,
            node_count,
        }
    }

    /// An empty dense tier: used when `include_dense` is false, or when no
    /// level met the cutoff heuristic's bar.
    pub(crate) fn empty() -> Self {
        LoudsDense {
            label_bitmaps: RankBitVector::new(crate::bitvector::PackedBitVector::with_len(0)),
            child_bitmaps: RankBitVector::new(crate::bitvector::PackedBitVector::with_len(0)),
            prefix_key_bits: RankBitVector::new(crate::bitvector::PackedBitVector::with_len(0)),
            suffixes: SuffixStore::none(),
            node_count: 0,
        }
    }

    pub(crate) fn node_count(&self) -> usize {
        self.node_count
    }

    pub(crate) fn is_prefix_key(&self, node: usize) -> bool {
        self.prefix_key_bits.read_bit(node)
    }

    pub(crate) fn has_label(&self, node: usize, label: u8) -> bool {
        self.label_bitmaps.read_bit(node * NODE_FANOUT + label as usize)
    }

    pub(crate) fn has_child_at(&self, pos: usize) -> bool {
        self.child_bitmaps.read_bit(pos)
    }

    /// Total number of `has_child` edges in the dense tier, used for the
    /// serialized trailer's `child_count_dense` field.
    pub(crate) fn child_count(&self) -> usize {
        self.child_bitmaps.rank(self.node_count * NODE_FANOUT)
    }

    /// The node reached by the `has_child` edge at absolute position `pos`.
    /// Compare against [`Self::node_count`] to tell whether it is still a
    /// dense node or the start of the sparse tier.
    pub(crate) fn child_node(&self, pos: usize) -> usize {
        self.child_bitmaps.rank(pos + 1)
    }

    /// Smallest set label in `node`'s bitmap at or after `from`, if any.
    pub(crate) fn first_label_at_or_after(&self, node: usize, from: u16) -> Option<u8> {
        if from as usize >= NODE_FANOUT {
            return None;
        }
        let start = node * NODE_FANOUT + from as usize;
        let dist = self.label_bitmaps.distance_to_next_set_bit(start);
        let pos = start + dist;
        if pos < node * NODE_FANOUT + NODE_FANOUT {
            Some((pos - node * NODE_FANOUT) as u8)
        } else {
            None
        }
    }

    /// Largest set label in `node`'s bitmap at or before `from`, if any.
    pub(crate) fn last_label_at_or_before(&self, node: usize, from: u16) -> Option<u8> {
        let start = node * NODE_FANOUT + from as usize;
        let dist = self.label_bitmaps.distance_to_prev_set_bit(start);
        if dist > from as usize {
            return None;
        }
        Some((from - dist as u16) as u8)
    }

    /// Suffix slot for a terminal (non-`has_child`) label at `pos` in
    /// `node`. Construction order assigns, per node in node-number order, a
    /// prefix-key slot first (if the node is a prefix key) and then one
    /// slot per terminal label in ascending label order, so this terminal
    /// label's slot is simply "how many slots were assigned strictly
    /// before it": every earlier terminal label, plus every prefix-key
    /// slot through and including this node's own (which, if present,
    /// precedes all of this node's terminal labels).
    pub(crate) fn terminal_suffix_slot(&self, node: usize, pos: usize) -> usize {
        let terminals_before = self.label_bitmaps.rank(pos) - self.child_bitmaps.rank(pos);
        terminals_before + self.prefix_key_bits.rank(node + 1)
    }

    /// Suffix slot for `node`'s own prefix-key hit: every terminal label in
    /// an earlier node, plus every earlier node's prefix-key slot (this
    /// node's own excluded, since that's the slot being computed).
    pub(crate) fn prefix_suffix_slot(&self, node: usize) -> usize {
        let start = node * NODE_FANOUT;
        let terminals_before = self.label_bitmaps.rank(start) - self.child_bitmaps.rank(start);
        terminals_before + self.prefix_key_bits.rank(node)
    }

    pub(crate) fn suffixes(&self) -> &SuffixStore {
        &self.suffixes
    }

    /// Walks `key` through the dense tier from the root.
    pub(crate) fn lookup_key(&self, key: &[u8]) -> DenseLookup {
        let mut node = 0usize;
        let mut level = 0usize;
        loop {
            if node >= self.node_count {
                // Shouldn't happen for level 0 (root always exists when
                // node_count > 0); guards an empty dense tier.
                return DenseLookup::ContinueInSparse { node, level };
            }
            if level == key.len() {
                if self.is_prefix_key(node) {
                    let idx = self.prefix_suffix_slot(node);
                    return DenseLookup::Found(self.suffixes.check_equality(idx, key, level));
                }
                return DenseLookup::NotFound;
            }
            let pos = node * NODE_FANOUT + key[level] as usize;
            if !self.label_bitmaps.read_bit(pos) {
                return DenseLookup::NotFound;
            }
            if !self.child_bitmaps.read_bit(pos) {
                let idx = self.terminal_suffix_slot(node, pos);
                return DenseLookup::Found(self.suffixes.check_equality(idx, key, level + 1));
            }
            let child = self.child_node(pos);
            level += 1;
            if child >= self.node_count {
                return DenseLookup::ContinueInSparse {
                    node: child - self.node_count,
                    level,
                };
            }
            node = child;
        }
    }

    pub fn heap_size(&self) -> usize {
        self.label_bitmaps.heap_size()
            + self.child_bitmaps.heap_size()
            + self.prefix_key_bits.heap_size()
            + self.suffixes.heap_size()
    }

    pub(crate) fn serialize_into(&self, out: &mut Vec<u8>) {
        self.label_bitmaps.serialize_into(out);
        self.child_bitmaps.serialize_into(out);
        self.prefix_key_bits.serialize_into(out);
        self.suffixes.serialize_into(out);
    }

    pub(crate) fn deserialize_from(r: &mut Reader) -> Result<Self, Error> {
        let label_bitmaps = RankBitVector::deserialize_from(r)?;
        let child_bitmaps = RankBitVector::deserialize_from(r)?;
        let prefix_key_bits = RankBitVector::deserialize_from(r)?;
        let suffixes = SuffixStore::deserialize_from(r)?;
        if label_bitmaps.num_bits() != child_bitmaps.num_bits() {
            return Err(Error::CorruptSerialized(
                "dense tier: label/child bitmap length mismatch",
            ));
        }
        if label_bitmaps.num_bits() % NODE_FANOUT != 0 {
            return Err(Error::CorruptSerialized(
                "dense tier: label bitmap length not a multiple of node fanout",
            ));
        }
        Ok(LoudsDense::new(
            label_bitmaps,
            child_bitmaps,
            prefix_key_bits,
            suffixes,
        ))
    }
}

// `TERMINATOR` never appears as a dense label: a key byte excludes it by
// construction, so dense nodes never need the sparse tier's synthetic
// terminator-label trick.
#[allow(dead_code)]
const _: u8 = TERMINATOR;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitvector::PackedBitVector;
    use crate::suffix::SuffixType;

    /// Builds a tiny two-level dense tier by hand: root has edges 'a'
    /// (leaf, terminal) and 'f' (has child); the 'f' child is itself a
    /// prefix key ("f") with one further edge 'a' (leaf).
    fn sample() -> LoudsDense {
        let mut labels = PackedBitVector::with_len(512);
        let mut children = PackedBitVector::with_len(512);
        let mut prefix = PackedBitVector::with_len(2);

        labels.set_bit(b'a' as usize);
        labels.set_bit(b'f' as usize);
        children.set_bit(b'f' as usize);

        labels.set_bit(256 + b'a' as usize);
        prefix.set_bit(1);

        let label_bitmaps = RankBitVector::new(labels);
        let child_bitmaps = RankBitVector::new(children);
        let prefix_key_bits = RankBitVector::new(prefix);
        let suffixes = SuffixStore::none();
        LoudsDense::new(label_bitmaps, child_bitmaps, prefix_key_bits, suffixes)
    }

    #[test]
    fn looks_up_leaf_edge() {
        let dense = sample();
        assert_eq!(dense.lookup_key(b"a"), DenseLookup::Found(true));
    }

    #[test]
    fn looks_up_missing_label() {
        let dense = sample();
        assert_eq!(dense.lookup_key(b"z"), DenseLookup::NotFound);
    }

    #[test]
    fn descends_and_finds_prefix_key() {
        let dense = sample();
        assert_eq!(dense.lookup_key(b"f"), DenseLookup::Found(true));
    }

    #[test]
    fn descends_and_finds_grandchild_leaf() {
        let dense = sample();
        assert_eq!(dense.lookup_key(b"fa"), DenseLookup::Found(true));
    }

    #[test]
    fn exhausting_dense_continues_in_sparse() {
        // Re-use `sample`'s 'f' node but without marking it a prefix key,
        // and with node_count artificially limited so its own child
        // lookup overflows into "sparse".
        let mut labels = PackedBitVector::with_len(256);
        labels.set_bit(b'f' as usize);
        let mut children = PackedBitVector::with_len(256);
        children.set_bit(b'f' as usize);
        let dense = LoudsDense::new(
            RankBitVector::new(labels),
            RankBitVector::new(children),
            RankBitVector::new(PackedBitVector::with_len(1)),
            SuffixStore::none(),
        );
        match dense.lookup_key(b"far") {
            DenseLookup::ContinueInSparse { level, .. } => assert_eq!(level, 1),
            other => panic!("expected ContinueInSparse, got {other:?}"),
        }
    }

    #[test]
    fn suffix_disambiguates_prefix_match() {
        let mut labels = PackedBitVector::with_len(256);
        labels.set_bit(b'f' as usize);
        let children = PackedBitVector::with_len(256);
        let mut prefix = PackedBitVector::with_len(1);
        prefix.set_bit(0);
        let values = crate::suffix::construct_values(
            SuffixType::Real,
            0,
            8,
            &[(b"f".to_vec(), 1)],
        );
        let suffixes = SuffixStore::build(SuffixType::Real, 0, 8, &values);
        let dense = LoudsDense::new(
            RankBitVector::new(labels),
            RankBitVector::new(children),
            RankBitVector::new(prefix),
            suffixes,
        );
        assert_eq!(dense.lookup_key(b"f"), DenseLookup::Found(true));
    }
}
