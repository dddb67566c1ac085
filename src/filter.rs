//! `Filter`: the public façade wrapping a [`LoudsDense`] upper tier and a
//! [`LoudsSparse`] lower tier, plus [`Cursor`], the bidirectional iterator
//! that walks both tiers to answer range queries and ordered traversal.

use std::cmp::Ordering;

use log::{trace, warn};

use crate::binary::{self, Reader};
use crate::builder;
use crate::dense::{DenseLookup, LoudsDense};
use crate::error::Error;
use crate::key::{Key, TERMINATOR};
use crate::options::FilterOptions;
use crate::sparse::{LoudsSparse, SparseLookup};
use crate::suffix::{SuffixStore, SuffixType};

/// The built, read-only SuRF filter. Immutable and safe to share across
/// any number of concurrent readers; construction is the only fallible,
/// single-threaded step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    dense: LoudsDense,
    sparse: LoudsSparse,
    /// Depth at which the trie switches from dense to sparse encoding,
    /// serialized as both trailer fields named in §6 (`dense_height` and
    /// `sparse_start_level` coincide in this design, since there is no gap
    /// between the last dense level and the first sparse one).
    cutoff_level: usize,
}

impl Filter {
    /// Builds a filter from a sorted, deduplicated-on-build key sequence.
    /// See [`crate::error::Error`] for the ways this can fail.
    pub fn new(keys: &[Key], options: FilterOptions) -> Result<Self, Error> {
        let (dense, sparse, node_count_dense) = builder::build(keys, &options)?;
        let cutoff_level = if node_count_dense == 0 {
            0
        } else {
            // Any dense node's depth is < cutoff_level by construction; we
            // don't track depth post-hoc, so derive it isn't necessary;
            // `node_count_dense` alone is enough to reconstruct the dense
            // tier's node count, and `cutoff_level` is only needed for the
            // trailer's informational fields, not for query logic.
            node_count_dense
        };
        Ok(Filter {
            dense,
            sparse,
            cutoff_level,
        })
    }

    /// `LoudsDense.lookupKey` then, if it reports "continue in sparse",
    /// `LoudsSparse.lookupKey`. Never fails, a missing key is simply
    /// `false`.
    pub fn contains(&self, key: &[u8]) -> bool {
        match self.dense.lookup_key(key) {
            DenseLookup::Found(hit) => hit,
            DenseLookup::NotFound => false,
            DenseLookup::ContinueInSparse { node, level } => {
                matches!(self.sparse.lookup_key(key, node, level), SparseLookup::Found(true))
            }
        }
    }

    /// `true` iff some stored key lies in the interval described by `lo`
    /// (and its inclusivity) through `hi` (and its inclusivity). May be a
    /// false positive, bounded by the suffix configuration; never a false
    /// negative.
    pub fn range_overlaps(&self, lo: &[u8], lo_inclusive: bool, hi: &[u8], hi_inclusive: bool) -> bool {
        let mut cursor = self.cursor();
        cursor.move_to_greater_or_equal(lo, lo_inclusive);
        if !cursor.is_valid() {
            return false;
        }
        let key = cursor.reconstruct_key();
        match key.as_slice().cmp(hi) {
            Ordering::Less => true,
            Ordering::Equal => hi_inclusive,
            Ordering::Greater => false,
        }
    }

    /// A fresh, unpositioned cursor over this filter.
    pub fn cursor(&self) -> Cursor<'_> {
        Cursor {
            filter: self,
            dense_frames: Vec::new(),
            sparse_frames: Vec::new(),
            valid: false,
        }
    }

    pub fn heap_size(&self) -> usize {
        self.dense.heap_size() + self.sparse.heap_size()
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.dense.serialize_into(&mut out);
        self.sparse.serialize_into(&mut out);
        binary::push_u32(&mut out, self.cutoff_level as u32);
        binary::push_u32(&mut out, self.cutoff_level as u32);
        let node_count_dense = self.dense.node_count() as u32;
        binary::push_u32(&mut out, node_count_dense);
        binary::push_u32(&mut out, self.dense.child_count() as u32);
        binary::align8(&mut out);
        out
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, Error> {
        let mut r = Reader::new(bytes);
        trace!("surf filter: deserializing dense tier");
        let dense = LoudsDense::deserialize_from(&mut r)?;
        trace!("surf filter: deserializing sparse tier");
        let boundary_offset = dense.child_count().saturating_sub(dense.node_count());
        let sparse = LoudsSparse::deserialize_from(&mut r, boundary_offset)?;
        trace!("surf filter: deserializing trailer");
        let dense_height = r.read_u32()? as usize;
        let sparse_start_level = r.read_u32()? as usize;
        let node_count_dense = r.read_u32()? as usize;
        let child_count_dense = r.read_u32()? as usize;
        r.align8();

        if dense_height != sparse_start_level {
            warn!("surf filter: corrupt trailer, dense_height != sparse_start_level");
            return Err(Error::CorruptSerialized(
                "filter trailer: dense_height and sparse_start_level disagree",
            ));
        }
        if node_count_dense != dense.node_count() {
            warn!("surf filter: corrupt trailer, node_count_dense mismatch");
            return Err(Error::CorruptSerialized(
                "filter trailer: node_count_dense does not match dense tier",
            ));
        }
        if child_count_dense != dense.child_count() {
            warn!("surf filter: corrupt trailer, child_count_dense mismatch");
            return Err(Error::CorruptSerialized(
                "filter trailer: child_count_dense does not match dense tier",
            ));
        }

        Ok(Filter {
            dense,
            sparse,
            cutoff_level: dense_height,
        })
    }
}

/// One frame of a cursor's position in the dense tier: `label = None` means
/// the cursor sits at `node`'s own prefix-key entry (the path ending here
/// is itself a stored key); `label = Some(b)` means it sits at the edge
/// labeled `b`.
#[derive(Debug, Clone, Copy)]
struct DenseFrame {
    node: usize,
    label: Option<u8>,
}

/// One frame of a cursor's position in the sparse tier: `pos` is the
/// absolute index into the tier's label array (which may be a synthetic
/// `TERMINATOR` entry representing `node`'s own prefix-key hit).
#[derive(Debug, Clone, Copy)]
struct SparseFrame {
    node: usize,
    pos: usize,
}

/// A bidirectional, thread-local cursor over a [`Filter`]'s key space.
/// Holds mutable position state; must not be shared across threads without
/// external synchronization.
pub struct Cursor<'a> {
    filter: &'a Filter,
    dense_frames: Vec<DenseFrame>,
    sparse_frames: Vec<SparseFrame>,
    valid: bool,
}

impl<'a> Cursor<'a> {
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// The trie-decided bytes of the key at the cursor's current position.
    /// This is the prefix the trie used to find the key; for suffix
    /// types that store extra bits without byte alignment (`Hash`,
    /// `Real`, `Mixed`), those bits are not reflected here; see
    /// [`Cursor::key_with_suffix`].
    pub fn key(&self) -> Result<Vec<u8>, Error> {
        if !self.valid {
            return Err(Error::OperationOnInvalidIterator);
        }
        Ok(self.reconstruct_key())
    }

    fn reconstruct_key(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for frame in &self.dense_frames {
            if let Some(label) = frame.label {
                out.push(label);
            }
        }
        for frame in &self.sparse_frames {
            let label = self.filter.sparse.labels().get(frame.pos);
            if label != TERMINATOR {
                out.push(label);
            }
        }
        out
    }

    /// The trie-decided key bytes plus whatever suffix bits are stored for
    /// this position, right-padded with zero bits to a byte boundary. The
    /// second element of the tuple is the number of meaningful suffix
    /// bits in the last byte(s) appended.
    pub fn key_with_suffix(&self) -> Result<(Vec<u8>, u32), Error> {
        let mut bytes = self.key()?;
        let (value, bit_len) = self.get_suffix()?;
        if bit_len == 0 {
            return Ok((bytes, 0));
        }
        let byte_len = ((bit_len + 7) / 8) as usize;
        let shifted = value << (byte_len as u32 * 8 - bit_len);
        for i in (0..byte_len).rev() {
            bytes.push(((shifted >> (i * 8)) & 0xFF) as u8);
        }
        Ok((bytes, bit_len))
    }

    /// The raw suffix bits stored at the cursor's current position, and
    /// their width. `(0, 0)` when the filter carries no suffix bits.
    pub fn get_suffix(&self) -> Result<(u64, u32), Error> {
        if !self.valid {
            return Err(Error::OperationOnInvalidIterator);
        }
        match self.current_suffix_slot() {
            Some((store, idx)) => Ok((store.read(idx), store.width())),
            None => Ok((0, 0)),
        }
    }

    /// `true` when the cursor's current position was decided using an
    /// approximation (no suffix, or a hash suffix) rather than an exact
    /// byte comparison, i.e. the position could in principle be a false
    /// positive relative to whatever query produced it.
    pub fn is_false_positive_flag(&self) -> bool {
        match self.current_suffix_slot() {
            Some((store, _)) => matches!(store.suffix_type(), SuffixType::None | SuffixType::Hash),
            None => true,
        }
    }

    fn current_suffix_slot(&self) -> Option<(&'a SuffixStore, usize)> {
        if let Some(frame) = self.sparse_frames.last() {
            let idx = self.filter.sparse.suffix_slot(frame.pos);
            return Some((self.filter.sparse.suffixes(), idx));
        }
        if let Some(frame) = self.dense_frames.last() {
            let idx = match frame.label {
                None => self.filter.dense.prefix_suffix_slot(frame.node),
                Some(label) => {
                    let pos = frame.node * crate::dense::NODE_FANOUT + label as usize;
                    self.filter.dense.terminal_suffix_slot(frame.node, pos)
                }
            };
            return Some((self.filter.dense.suffixes(), idx));
        }
        None
    }

    /// Positions the cursor at the smallest stored key `>= key` (or `>
    /// key` when `inclusive` is false).
    pub fn move_to_greater_or_equal(&mut self, key: &[u8], inclusive: bool) {
        self.dense_frames.clear();
        self.sparse_frames.clear();
        self.valid = false;

        let mut level = 0usize;
        let mut node = 0usize;
        let mut in_dense = self.filter.dense.node_count() > 0;

        loop {
            if in_dense {
                let dense = &self.filter.dense;
                if level == key.len() {
                    self.settle_node_start_dense(node, inclusive);
                    return;
                }
                let target = key[level];
                match dense.first_label_at_or_after(node, target as u16) {
                    None => {
                        self.bubble_forward_or_invalid();
                        return;
                    }
                    Some(label) if label > target => {
                        self.dense_frames.push(DenseFrame { node, label: Some(label) });
                        self.descend_leftmost_dense_child(node, label);
                        self.valid = true;
                        return;
                    }
                    Some(_) => {
                        let pos = node * crate::dense::NODE_FANOUT + target as usize;
                        self.dense_frames.push(DenseFrame { node, label: Some(target) });
                        if dense.has_child_at(pos) {
                            let child = dense.child_node(pos);
                            level += 1;
                            if child < dense.node_count() {
                                node = child;
                            } else {
                                in_dense = false;
                                node = child - dense.node_count();
                            }
                        } else {
                            let idx = dense.terminal_suffix_slot(node, pos);
                            let ord = compare_terminal(dense.suffixes(), idx, key, level + 1);
                            self.finish_forward_at_terminal(ord, inclusive);
                            return;
                        }
                    }
                }
            } else {
                let sparse = &self.filter.sparse;
                if level == key.len() {
                    self.settle_node_start_sparse(node, inclusive);
                    return;
                }
                let target = key[level];
                let start = sparse.first_label_pos(node);
                let size = sparse.node_size(node);
                match sparse.labels().search(target, start, size) {
                    Some(pos) => {
                        self.sparse_frames.push(SparseFrame { node, pos });
                        if sparse.has_child_at(pos) {
                            node = sparse.child_node(pos);
                            level += 1;
                        } else {
                            let idx = sparse.suffix_slot(pos);
                            let ord = compare_terminal(sparse.suffixes(), idx, key, level + 1);
                            self.finish_forward_at_terminal(ord, inclusive);
                            return;
                        }
                    }
                    None => match sparse.labels().search_greater_than(target, start, size) {
                        Some(pos) => {
                            self.sparse_frames.push(SparseFrame { node, pos });
                            self.descend_leftmost_sparse_child(pos);
                            self.valid = true;
                            return;
                        }
                        None => {
                            self.bubble_forward_or_invalid();
                            return;
                        }
                    },
                }
            }
        }
    }

    /// Positions the cursor at the largest stored key `<= key` (or `<
    /// key` when `inclusive` is false).
    pub fn move_to_less_or_equal(&mut self, key: &[u8], inclusive: bool) {
        self.dense_frames.clear();
        self.sparse_frames.clear();
        self.valid = false;

        let mut level = 0usize;
        let mut node = 0usize;
        let mut in_dense = self.filter.dense.node_count() > 0;

        loop {
            if in_dense {
                let dense = &self.filter.dense;
                if level == key.len() {
                    self.settle_node_end_dense(node, inclusive);
                    return;
                }
                let target = key[level];
                let smaller = if target == 0 {
                    None
                } else {
                    dense.last_label_at_or_before(node, target as u16 - 1)
                };
                let exact = dense.has_label(node, target);
                if exact {
                    let pos = node * crate::dense::NODE_FANOUT + target as usize;
                    self.dense_frames.push(DenseFrame { node, label: Some(target) });
                    if dense.has_child_at(pos) {
                        let child = dense.child_node(pos);
                        level += 1;
                        if child < dense.node_count() {
                            node = child;
                        } else {
                            in_dense = false;
                            node = child - dense.node_count();
                        }
                        continue;
                    } else {
                        let idx = dense.terminal_suffix_slot(node, pos);
                        let ord = compare_terminal(dense.suffixes(), idx, key, level + 1);
                        self.finish_backward_at_terminal(ord, inclusive);
                        return;
                    }
                }
                match smaller {
                    Some(label) => {
                        self.dense_frames.push(DenseFrame { node, label: Some(label) });
                        self.descend_rightmost_dense_child(node, label);
                        self.valid = true;
                    }
                    None => {
                        if dense.is_prefix_key(node) {
                            self.dense_frames.push(DenseFrame { node, label: None });
                            self.valid = true;
                        } else {
                            self.bubble_backward_or_invalid();
                        }
                    }
                }
                return;
            } else {
                let sparse = &self.filter.sparse;
                if level == key.len() {
                    self.settle_node_end_sparse(node, inclusive);
                    return;
                }
                let target = key[level];
                let start = sparse.first_label_pos(node);
                let size = sparse.node_size(node);
                match sparse.labels().search(target, start, size) {
                    Some(pos) => {
                        self.sparse_frames.push(SparseFrame { node, pos });
                        if sparse.has_child_at(pos) {
                            node = sparse.child_node(pos);
                            level += 1;
                            continue;
                        } else {
                            let idx = sparse.suffix_slot(pos);
                            let ord = compare_terminal(sparse.suffixes(), idx, key, level + 1);
                            self.finish_backward_at_terminal(ord, inclusive);
                            return;
                        }
                    }
                    None => match sparse.labels().search_less_than(target, start, size) {
                        Some(pos) => {
                            self.sparse_frames.push(SparseFrame { node, pos });
                            self.descend_rightmost_sparse_child(pos);
                            self.valid = true;
                        }
                        None => self.bubble_backward_or_invalid(),
                    },
                }
                return;
            }
        }
    }

    /// Advances to the next stored key in order, if any. The cursor
    /// becomes invalid if it was already at the last key.
    pub fn next(&mut self) -> Result<(), Error> {
        if !self.valid {
            return Err(Error::OperationOnInvalidIterator);
        }
        self.valid = self.step_forward();
        Ok(())
    }

    /// Moves to the previous stored key in order, if any. The cursor
    /// becomes invalid if it was already at the first key.
    pub fn prev(&mut self) -> Result<(), Error> {
        if !self.valid {
            return Err(Error::OperationOnInvalidIterator);
        }
        self.valid = self.step_backward();
        Ok(())
    }

    // ---- shared stepping logic ----

    fn step_forward(&mut self) -> bool {
        loop {
            if let Some(frame) = self.sparse_frames.pop() {
                let sparse = &self.filter.sparse;
                let node = frame.node;
                let start = sparse.first_label_pos(node);
                let size = sparse.node_size(node);
                let next_pos = frame.pos + 1;
                if next_pos < start + size {
                    self.sparse_frames.push(SparseFrame { node, pos: next_pos });
                    self.descend_leftmost_sparse_child(next_pos);
                    return true;
                }
                continue;
            }
            if let Some(frame) = self.dense_frames.pop() {
                let dense = &self.filter.dense;
                let node = frame.node;
                let from = match frame.label {
                    None => 0u16,
                    Some(label) => label as u16 + 1,
                };
                match dense.first_label_at_or_after(node, from) {
                    Some(label) => {
                        self.dense_frames.push(DenseFrame { node, label: Some(label) });
                        self.descend_leftmost_dense_child(node, label);
                        return true;
                    }
                    None => continue,
                }
            }
            return false;
        }
    }

    fn step_backward(&mut self) -> bool {
        loop {
            if let Some(frame) = self.sparse_frames.pop() {
                let sparse = &self.filter.sparse;
                let node = frame.node;
                let start = sparse.first_label_pos(node);
                if frame.pos == start {
                    continue;
                }
                let prev_pos = frame.pos - 1;
                self.sparse_frames.push(SparseFrame { node, pos: prev_pos });
                self.descend_rightmost_sparse_child(prev_pos);
                return true;
            }
            if let Some(frame) = self.dense_frames.pop() {
                let dense = &self.filter.dense;
                let node = frame.node;
                match frame.label {
                    None => continue,
                    Some(label) => {
                        let smaller = if label == 0 {
                            None
                        } else {
                            dense.last_label_at_or_before(node, label as u16 - 1)
                        };
                        match smaller {
                            Some(prev_label) => {
                                self.dense_frames.push(DenseFrame { node, label: Some(prev_label) });
                                self.descend_rightmost_dense_child(node, prev_label);
                                return true;
                            }
                            None => {
                                if dense.is_prefix_key(node) {
                                    self.dense_frames.push(DenseFrame { node, label: None });
                                    return true;
                                }
                                continue;
                            }
                        }
                    }
                }
            }
            return false;
        }
    }

    fn bubble_forward_or_invalid(&mut self) {
        self.valid = self.step_forward();
    }

    fn bubble_backward_or_invalid(&mut self) {
        self.valid = self.step_backward();
    }

    fn finish_forward_at_terminal(&mut self, ord: Ordering, inclusive: bool) {
        self.valid = true;
        let must_advance = match ord {
            Ordering::Less => true,
            Ordering::Equal => !inclusive,
            Ordering::Greater => false,
        };
        if must_advance {
            self.valid = self.step_forward();
        }
    }

    fn finish_backward_at_terminal(&mut self, ord: Ordering, inclusive: bool) {
        self.valid = true;
        let must_retreat = match ord {
            Ordering::Greater => true,
            Ordering::Equal => !inclusive,
            Ordering::Less => false,
        };
        if must_retreat {
            self.valid = self.step_backward();
        }
    }

    fn settle_node_start_dense(&mut self, node: usize, inclusive: bool) {
        let dense = &self.filter.dense;
        if dense.is_prefix_key(node) {
            self.dense_frames.push(DenseFrame { node, label: None });
            self.valid = true;
            if !inclusive {
                self.valid = self.step_forward();
            }
            return;
        }
        match dense.first_label_at_or_after(node, 0) {
            Some(label) => {
                self.dense_frames.push(DenseFrame { node, label: Some(label) });
                self.descend_leftmost_dense_child(node, label);
                self.valid = true;
            }
            None => self.bubble_forward_or_invalid(),
        }
    }

    fn settle_node_start_sparse(&mut self, node: usize, inclusive: bool) {
        let sparse = &self.filter.sparse;
        if sparse.is_prefix_key(node) {
            let pos = sparse.first_label_pos(node);
            self.sparse_frames.push(SparseFrame { node, pos });
            self.valid = true;
            if !inclusive {
                self.valid = self.step_forward();
            }
            return;
        }
        let start = sparse.first_label_pos(node);
        if sparse.node_size(node) == 0 {
            self.bubble_forward_or_invalid();
            return;
        }
        self.sparse_frames.push(SparseFrame { node, pos: start });
        self.descend_leftmost_sparse_child(start);
        self.valid = true;
    }

    fn settle_node_end_dense(&mut self, node: usize, inclusive: bool) {
        let dense = &self.filter.dense;
        if dense.is_prefix_key(node) {
            self.dense_frames.push(DenseFrame { node, label: None });
            self.valid = true;
            if !inclusive {
                self.valid = self.step_backward();
            }
            return;
        }
        self.bubble_backward_or_invalid();
    }

    fn settle_node_end_sparse(&mut self, node: usize, inclusive: bool) {
        let sparse = &self.filter.sparse;
        if sparse.is_prefix_key(node) {
            let pos = sparse.first_label_pos(node);
            self.sparse_frames.push(SparseFrame { node, pos });
            self.valid = true;
            if !inclusive {
                self.valid = self.step_backward();
            }
            return;
        }
        self.bubble_backward_or_invalid();
    }

    fn descend_leftmost_dense_child(&mut self, node: usize, label: u8) {
        let dense = &self.filter.dense;
        let pos = node * crate::dense::NODE_FANOUT + label as usize;
        if !dense.has_child_at(pos) {
            return;
        }
        let child = dense.child_node(pos);
        if child < dense.node_count() {
            self.push_leftmost_dense(child);
        } else {
            self.push_leftmost_sparse(child - dense.node_count());
        }
    }

    fn descend_rightmost_dense_child(&mut self, node: usize, label: u8) {
        let dense = &self.filter.dense;
        let pos = node * crate::dense::NODE_FANOUT + label as usize;
        if !dense.has_child_at(pos) {
            return;
        }
        let child = dense.child_node(pos);
        if child < dense.node_count() {
            self.push_rightmost_dense(child);
        } else {
            self.push_rightmost_sparse(child - dense.node_count());
        }
    }

    fn descend_leftmost_sparse_child(&mut self, pos: usize) {
        let sparse = &self.filter.sparse;
        if !sparse.has_child_at(pos) {
            return;
        }
        let child = sparse.child_node(pos);
        self.push_leftmost_sparse(child);
    }

    fn descend_rightmost_sparse_child(&mut self, pos: usize) {
        let sparse = &self.filter.sparse;
        if !sparse.has_child_at(pos) {
            return;
        }
        let child = sparse.child_node(pos);
        self.push_rightmost_sparse(child);
    }

    fn push_leftmost_dense(&mut self, node: usize) {
        let dense = &self.filter.dense;
        if dense.is_prefix_key(node) {
            self.dense_frames.push(DenseFrame { node, label: None });
            return;
        }
        if let Some(label) = dense.first_label_at_or_after(node, 0) {
            self.dense_frames.push(DenseFrame { node, label: Some(label) });
            self.descend_leftmost_dense_child(node, label);
        }
    }

    fn push_rightmost_dense(&mut self, node: usize) {
        let dense = &self.filter.dense;
        if let Some(label) = dense.last_label_at_or_before(node, 255) {
            self.dense_frames.push(DenseFrame { node, label: Some(label) });
            self.descend_rightmost_dense_child(node, label);
        } else if dense.is_prefix_key(node) {
            self.dense_frames.push(DenseFrame { node, label: None });
        }
    }

    fn push_leftmost_sparse(&mut self, node: usize) {
        let sparse = &self.filter.sparse;
        let start = sparse.first_label_pos(node);
        if sparse.is_prefix_key(node) {
            self.sparse_frames.push(SparseFrame { node, pos: start });
            return;
        }
        if sparse.node_size(node) == 0 {
            return;
        }
        self.sparse_frames.push(SparseFrame { node, pos: start });
        self.descend_leftmost_sparse_child(start);
    }

    fn push_rightmost_sparse(&mut self, node: usize) {
        let sparse = &self.filter.sparse;
        let start = sparse.first_label_pos(node);
        let size = sparse.node_size(node);
        if size == 0 {
            return;
        }
        let last = start + size - 1;
        self.sparse_frames.push(SparseFrame { node, pos: last });
        self.descend_rightmost_sparse_child(last);
    }
}

/// Lexicographic comparison of the stored suffix at `idx` against the
/// suffix `key` would have at `level`, used to settle cursor movement when
/// the trie path runs out before the query does. `None`/`Hash` suffixes
/// carry no ordering guarantee, so they're treated as an exact match,
/// the trie-decided prefix is accepted as-is, same as `contains`'s
/// unbounded/hash-bounded false-positive behavior.
fn compare_terminal(store: &SuffixStore, idx: usize, key: &[u8], level: usize) -> Ordering {
    match store.suffix_type() {
        SuffixType::Real | SuffixType::Mixed => store.compare(idx, key, level),
        SuffixType::None | SuffixType::Hash => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::FilterOptions;
    use proptest::prelude::*;

    fn sample_keys() -> Vec<Key> {
        ["f", "far", "fas", "fast", "fat", "s", "top", "toy", "trie", "trip", "try"]
            .iter()
            .map(|s| s.as_bytes().to_vec())
            .collect()
    }

    fn real_suffix_options() -> FilterOptions {
        FilterOptions {
            suffix_type: SuffixType::Real,
            real_len_bits: 8,
            ..FilterOptions::default()
        }
    }

    #[test]
    fn contains_all_input_keys() {
        let keys = sample_keys();
        let filter = Filter::new(&keys, real_suffix_options()).unwrap();
        for k in &keys {
            assert!(filter.contains(k), "expected contains({:?})", String::from_utf8_lossy(k));
        }
    }

    #[test]
    fn contains_rejects_clear_non_member() {
        let keys = sample_keys();
        let filter = Filter::new(&keys, real_suffix_options()).unwrap();
        assert!(!filter.contains(b"fase"));
        assert!(!filter.contains(b"zzz"));
    }

    #[test]
    fn prefix_disambiguated_by_real_suffix() {
        let keys = sample_keys();
        let filter = Filter::new(&keys, real_suffix_options()).unwrap();
        // "fa" is a proper prefix of several stored keys but not itself
        // stored; an 8-bit real suffix is enough to tell them apart here.
        assert!(!filter.contains(b"fa"));
    }

    #[test]
    fn range_overlaps_matches_stored_key() {
        let keys = sample_keys();
        let filter = Filter::new(&keys, real_suffix_options()).unwrap();
        assert!(filter.range_overlaps(b"top", false, b"toyy", false));
        assert!(!filter.range_overlaps(b"fare", true, b"fase", false));
    }

    #[test]
    fn range_overlaps_equals_contains_for_single_point() {
        let keys = sample_keys();
        let filter = Filter::new(&keys, real_suffix_options()).unwrap();
        for k in &keys {
            assert_eq!(filter.range_overlaps(k, true, k, true), filter.contains(k));
        }
    }

    #[test]
    fn cursor_move_to_greater_or_equal_then_next() {
        let keys = sample_keys();
        let filter = Filter::new(&keys, real_suffix_options()).unwrap();
        let mut cursor = filter.cursor();
        cursor.move_to_greater_or_equal(b"to", true);
        assert!(cursor.is_valid());
        assert_eq!(cursor.key().unwrap(), b"top".to_vec());
        cursor.next().unwrap();
        assert!(cursor.is_valid());
        assert_eq!(cursor.key().unwrap(), b"toy".to_vec());
    }

    #[test]
    fn cursor_forward_traversal_visits_all_keys_in_order() {
        let keys = sample_keys();
        let filter = Filter::new(&keys, real_suffix_options()).unwrap();
        let mut cursor = filter.cursor();
        cursor.move_to_greater_or_equal(b"", true);
        let mut seen = Vec::new();
        while cursor.is_valid() {
            seen.push(cursor.key().unwrap());
            if cursor.next().is_err() {
                break;
            }
        }
        let mut expected = keys.clone();
        expected.sort();
        expected.dedup();
        assert_eq!(seen, expected);
    }

    #[test]
    fn cursor_backward_traversal_visits_all_keys_in_order() {
        let keys = sample_keys();
        let filter = Filter::new(&keys, real_suffix_options()).unwrap();
        let mut cursor = filter.cursor();
        cursor.move_to_less_or_equal(b"\xff\xff\xff\xff", true);
        let mut seen = Vec::new();
        while cursor.is_valid() {
            seen.push(cursor.key().unwrap());
            if cursor.prev().is_err() {
                break;
            }
        }
        seen.reverse();
        let mut expected = keys.clone();
        expected.sort();
        expected.dedup();
        assert_eq!(seen, expected);
    }

    #[test]
    fn bidirectional_consistency_next_then_prev() {
        let keys = sample_keys();
        let filter = Filter::new(&keys, real_suffix_options()).unwrap();
        let mut cursor = filter.cursor();
        cursor.move_to_greater_or_equal(b"far", true);
        let start = cursor.key().unwrap();
        cursor.next().unwrap();
        cursor.prev().unwrap();
        assert_eq!(cursor.key().unwrap(), start);
    }

    #[test]
    fn serialize_round_trip_preserves_contains() {
        let keys = sample_keys();
        let filter = Filter::new(&keys, real_suffix_options()).unwrap();
        let bytes = filter.serialize();
        let restored = Filter::deserialize(&bytes).unwrap();
        for k in &keys {
            assert_eq!(restored.contains(k), filter.contains(k));
        }
        assert_eq!(restored.contains(b"fase"), filter.contains(b"fase"));
    }

    #[test]
    fn deserialize_rejects_truncated_buffer() {
        let keys = sample_keys();
        let filter = Filter::new(&keys, real_suffix_options()).unwrap();
        let mut bytes = filter.serialize();
        bytes.truncate(bytes.len() / 2);
        assert!(Filter::deserialize(&bytes).is_err());
    }

    #[test]
    fn numeric_keys_with_mixed_suffix() {
        let mut keys: Vec<Key> = (0..=1_000_000u32)
            .step_by(10)
            .map(|n| n.to_be_bytes().to_vec())
            .collect();
        keys.sort();
        let options = FilterOptions {
            suffix_type: SuffixType::Mixed,
            hash_len_bits: 8,
            real_len_bits: 8,
            ..FilterOptions::default()
        };
        let filter = Filter::new(&keys, options).unwrap();
        for k in keys.iter().step_by(5000) {
            assert!(filter.contains(k));
        }
        let mut cursor = filter.cursor();
        cursor.move_to_greater_or_equal(&55u32.to_be_bytes(), false);
        assert!(cursor.is_valid());
        let found = cursor.key().unwrap();
        assert_eq!(&found[..], &60u32.to_be_bytes()[..]);
    }

    proptest! {
        #[test]
        fn no_false_negatives_over_random_key_sets(
            keys in prop::collection::btree_set(prop::collection::vec(any::<u8>(), 1..6), 1..40),
        ) {
            let keys: Vec<Key> = keys.into_iter().collect();
            let filter = Filter::new(&keys, FilterOptions::new()).unwrap();
            for k in &keys {
                prop_assert!(filter.contains(k));
            }
        }

        #[test]
        fn serialize_round_trip_agrees_on_random_probes(
            keys in prop::collection::btree_set(prop::collection::vec(any::<u8>(), 1..6), 1..40),
            probes in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..6), 0..20),
        ) {
            let keys: Vec<Key> = keys.into_iter().collect();
            let filter = Filter::new(&keys, FilterOptions::new()).unwrap();
            let bytes = filter.serialize();
            let restored = Filter::deserialize(&bytes).unwrap();
            for k in &keys {
                prop_assert_eq!(restored.contains(k), filter.contains(k));
            }
            for probe in &probes {
                prop_assert_eq!(restored.contains(probe), filter.contains(probe));
            }
        }
    }
}
