//! `LabelArray`: the flat byte array of LOUDS-sparse edge labels for one
//! node's children, plus the three-tier search strategy (linear / binary /
//! SIMD) keyed off fanout, and the `TERMINATOR`-skip rule for nodes whose
//! first child represents "a stored key ends here".
//!
//! A node's labels are stored with its `TERMINATOR` byte (if present)
//! first, followed by the remaining labels in ascending order; that's an
//! artifact of build order, not sort order, so every search here skips a
//! leading `TERMINATOR` before running its ascending-order search on what
//! remains.

use crate::binary::{self, Reader};
use crate::error::Error;
use crate::key::TERMINATOR;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelArray {
    labels: Vec<u8>,
}

impl LabelArray {
    pub fn new(labels: Vec<u8>) -> Self {
        LabelArray { labels }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn get(&self, pos: usize) -> u8 {
        self.labels[pos]
    }

    /// Find `target` among `labels[pos..pos+search_len)`, returning its
    /// absolute index.
    pub fn search(&self, target: u8, pos: usize, search_len: usize) -> Option<usize> {
        let (pos, search_len) = self.skip_terminator(pos, search_len);
        if search_len < 3 {
            self.linear_search(target, pos, search_len)
        } else if search_len < 12 {
            self.binary_search(target, pos, search_len)
        } else {
            self.simd_search(target, pos, search_len)
        }
    }

    /// Find the first label strictly greater than `target` in
    /// `labels[pos..pos+search_len)`, returning its absolute index.
    pub fn search_greater_than(&self, target: u8, pos: usize, search_len: usize) -> Option<usize> {
        let (pos, search_len) = self.skip_terminator(pos, search_len);
        if search_len < 3 {
            self.linear_search_greater_than(target, pos, search_len)
        } else {
            self.binary_search_greater_than(target, pos, search_len)
        }
    }

    /// Find the last label strictly less than `target` in
    /// `labels[pos..pos+search_len)`, returning its absolute index.
    pub fn search_less_than(&self, target: u8, pos: usize, search_len: usize) -> Option<usize> {
        let (pos, search_len) = self.skip_terminator(pos, search_len);
        if search_len == 0 {
            return None;
        }
        let mut l = pos;
        let mut r = pos + search_len;
        while l < r {
            let m = (l + r) / 2;
            match target.cmp(&self.labels[m]) {
                std::cmp::Ordering::Greater => l = m + 1,
                _ => r = m,
            }
        }
        if l > pos {
            Some(l - 1)
        } else {
            None
        }
    }

    fn skip_terminator(&self, pos: usize, search_len: usize) -> (usize, usize) {
        if search_len > 1 && self.labels[pos] == TERMINATOR {
            (pos + 1, search_len - 1)
        } else {
            (pos, search_len)
        }
    }

    fn linear_search(&self, target: u8, pos: usize, search_len: usize) -> Option<usize> {
        (0..search_len).find(|&i| self.labels[pos + i] == target).map(|i| pos + i)
    }

    fn binary_search(&self, target: u8, pos: usize, search_len: usize) -> Option<usize> {
        let mut l = pos;
        let mut r = pos + search_len;
        while l < r {
            let m = (l + r) / 2;
            match target.cmp(&self.labels[m]) {
                std::cmp::Ordering::Less => r = m,
                std::cmp::Ordering::Equal => return Some(m),
                std::cmp::Ordering::Greater => l = m + 1,
            }
        }
        None
    }

    #[cfg(target_arch = "x86_64")]
    fn simd_search(&self, target: u8, pos: usize, search_len: usize) -> Option<usize> {
        // SAFETY: SSE2 is part of the x86_64 baseline ABI, so this is
        // always available without runtime feature detection.
        unsafe { simd::search(&self.labels, target, pos, search_len) }
    }

    #[cfg(not(target_arch = "x86_64"))]
    fn simd_search(&self, target: u8, pos: usize, search_len: usize) -> Option<usize> {
        self.binary_search(target, pos, search_len)
    }

    fn linear_search_greater_than(
        &self,
        target: u8,
        pos: usize,
        search_len: usize,
    ) -> Option<usize> {
        (0..search_len)
            .find(|&i| self.labels[pos + i] > target)
            .map(|i| pos + i)
    }

    fn binary_search_greater_than(
        &self,
        target: u8,
        pos: usize,
        search_len: usize,
    ) -> Option<usize> {
        let mut l = pos;
        let mut r = pos + search_len;
        while l < r {
            let m = (l + r) / 2;
            match target.cmp(&self.labels[m]) {
                std::cmp::Ordering::Less => r = m,
                std::cmp::Ordering::Equal => {
                    return if m < pos + search_len - 1 { Some(m + 1) } else { None };
                }
                std::cmp::Ordering::Greater => l = m + 1,
            }
        }
        if l < pos + search_len {
            Some(l)
        } else {
            None
        }
    }

    pub fn heap_size(&self) -> usize {
        self.labels.capacity()
    }

    pub(crate) fn serialize_into(&self, out: &mut Vec<u8>) {
        binary::push_u32(out, self.labels.len() as u32);
        binary::push_bytes(out, &self.labels);
        binary::align8(out);
    }

    pub(crate) fn deserialize_from(r: &mut Reader) -> Result<Self, Error> {
        let len = r.read_u32()? as usize;
        let labels = r.read_bytes(len)?.to_vec();
        r.align8();
        Ok(LabelArray { labels })
    }
}

#[cfg(target_arch = "x86_64")]
mod simd {
    use std::arch::x86_64::{_mm_cmpeq_epi8, _mm_loadu_si128, _mm_movemask_epi8, _mm_set1_epi8};

    /// Scans `labels[pos..pos+search_len)` sixteen bytes at a time.
    ///
    /// # Safety
    /// `labels` must have at least `pos + search_len` readable bytes; the
    /// lane load reads up to 16 bytes regardless of how many are needed for
    /// the final partial lane, which is safe here because `labels` is
    /// always backed by a `Vec<u8>` with no trailing under-allocation
    /// beyond what the caller already validated via `search_len`.
    pub(super) unsafe fn search(
        labels: &[u8],
        target: u8,
        pos: usize,
        search_len: usize,
    ) -> Option<usize> {
        let needle = _mm_set1_epi8(target as i8);
        let mut searched = 0usize;
        let mut left = search_len;
        while left >= 16 {
            let ptr = labels.as_ptr().add(pos + searched) as *const std::arch::x86_64::__m128i;
            let hay = _mm_loadu_si128(ptr);
            let cmp = _mm_cmpeq_epi8(needle, hay);
            let mask = _mm_movemask_epi8(cmp) as u32;
            if mask != 0 {
                return Some(pos + searched + mask.trailing_zeros() as usize);
            }
            searched += 16;
            left -= 16;
        }
        if left > 0 {
            // Last lane may read past `pos + search_len` but stays within
            // the backing `Vec<u8>` as long as at least 16 bytes remain
            // from `pos + searched`; fall back to linear scan near the end
            // of the array to avoid reading out of bounds.
            if pos + searched + 16 <= labels.len() {
                let ptr = labels.as_ptr().add(pos + searched) as *const std::arch::x86_64::__m128i;
                let hay = _mm_loadu_si128(ptr);
                let cmp = _mm_cmpeq_epi8(needle, hay);
                let leftover_mask = (1u32 << left) - 1;
                let mask = _mm_movemask_epi8(cmp) as u32 & leftover_mask;
                if mask != 0 {
                    return Some(pos + searched + mask.trailing_zeros() as usize);
                }
                return None;
            }
            for i in 0..left {
                if labels[pos + searched + i] == target {
                    return Some(pos + searched + i);
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_and_binary_agree_small() {
        let arr = LabelArray::new(vec![1, 5, 9]);
        for t in 0..12u8 {
            assert_eq!(
                arr.linear_search(t, 0, 3),
                arr.binary_search(t, 0, 3),
                "target {t}"
            );
        }
    }

    #[test]
    fn search_skips_leading_terminator() {
        let arr = LabelArray::new(vec![TERMINATOR, 2, 4, 6]);
        assert_eq!(arr.search(TERMINATOR, 0, 4), None);
        assert_eq!(arr.search(4, 0, 4), Some(2));
    }

    #[test]
    fn search_large_node_uses_simd_path() {
        let labels: Vec<u8> = (0..40u8).collect();
        let arr = LabelArray::new(labels);
        assert_eq!(arr.search(37, 0, 40), Some(37));
        assert_eq!(arr.search(255, 0, 40), None);
    }

    #[test]
    fn search_greater_than_basic() {
        let arr = LabelArray::new(vec![2, 4, 6, 8]);
        assert_eq!(arr.search_greater_than(3, 0, 4), Some(1));
        assert_eq!(arr.search_greater_than(8, 0, 4), None);
        assert_eq!(arr.search_greater_than(0, 0, 4), Some(0));
    }

    #[test]
    fn search_less_than_basic() {
        let arr = LabelArray::new(vec![2, 4, 6, 8]);
        assert_eq!(arr.search_less_than(6, 0, 4), Some(1));
        assert_eq!(arr.search_less_than(2, 0, 4), None);
        assert_eq!(arr.search_less_than(9, 0, 4), Some(3));
    }

    #[test]
    fn round_trip() {
        let arr = LabelArray::new(vec![1, 2, 3, 4, 5]);
        let mut buf = Vec::new();
        arr.serialize_into(&mut buf);
        let mut r = Reader::new(&buf);
        let restored = LabelArray::deserialize_from(&mut r).unwrap();
        assert_eq!(restored, arr);
    }
}
