//! `RankBitVector`: a [`PackedBitVector`] plus a block-level cumulative
//! popcount lookup table giving O(1) `rank`. Block size defaults to 512
//! bits, matching the basic-block size used throughout the reference
//! succinct-trie literature this design is drawn from.

use crate::binary::{self, Reader};
use crate::bitops::leading_ones_mask;
use crate::bitvector::PackedBitVector;
use crate::error::Error;
use crate::options::RANK_BLOCK_SIZE;

// Layout: num_bits | basic_block_size | num_blocks | words | lut, 8-byte
// aligned at the end. `PackedBitVector::serialize_into` isn't reused here
// since its own num_bits|words|align layout would put the words block
// before block_size/num_blocks instead of after.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankBitVector {
    bits: PackedBitVector,
    block_size: usize,
    /// `lut[i]` = number of set bits in `[0, i * block_size)`. Has
    /// `num_blocks + 1` entries, so `lut[num_blocks]` is the total rank.
    lut: Vec<u32>,
}

impl RankBitVector {
    pub fn new(bits: PackedBitVector) -> Self {
        Self::with_block_size(bits, RANK_BLOCK_SIZE)
    }

    pub(crate) fn with_block_size(bits: PackedBitVector, block_size: usize) -> Self {
        let lut = build_lut(&bits, block_size);
        RankBitVector {
            bits,
            block_size,
            lut,
        }
    }

    pub fn num_bits(&self) -> usize {
        self.bits.num_bits()
    }

    pub fn read_bit(&self, pos: usize) -> bool {
        self.bits.read_bit(pos)
    }

    pub fn distance_to_next_set_bit(&self, pos: usize) -> usize {
        self.bits.distance_to_next_set_bit(pos)
    }

    pub fn distance_to_prev_set_bit(&self, pos: usize) -> usize {
        self.bits.distance_to_prev_set_bit(pos)
    }

    /// Number of set bits in `[0, pos)`. `pos` may equal `num_bits()`, in
    /// which case this is the vector's total popcount.
    pub fn rank(&self, pos: usize) -> usize {
        let bits_len = self.bits.num_bits();
        let pos = pos.min(bits_len);
        let num_blocks = self.lut.len() - 1;
        let block_id = (pos / self.block_size).min(num_blocks);
        let words_per_block = self.block_size / 64;
        let block_start_word = block_id * words_per_block;
        let target_word = pos / 64;

        let mut count = self.lut[block_id] as usize;
        let words = self.bits.words();
        for w in block_start_word..target_word.min(words.len()) {
            count += words[w].count_ones() as usize;
        }
        let offset = pos % 64;
        if offset > 0 && target_word < words.len() {
            let mask = leading_ones_mask(offset as u32);
            count += (words[target_word] & mask).count_ones() as usize;
        }
        count
    }

    pub fn heap_size(&self) -> usize {
        self.bits.heap_size() + self.lut.capacity() * std::mem::size_of::<u32>()
    }

    pub(crate) fn serialize_into(&self, out: &mut Vec<u8>) {
        binary::push_u32(out, self.bits.num_bits() as u32);
        binary::push_u32(out, self.block_size as u32);
        binary::push_u32(out, (self.lut.len() - 1) as u32);
        binary::push_words(out, self.bits.words());
        for &v in &self.lut {
            binary::push_u32(out, v);
        }
        binary::align8(out);
    }

    pub(crate) fn deserialize_from(r: &mut Reader) -> Result<Self, Error> {
        let num_bits = r.read_u32()? as usize;
        let block_size = r.read_u32()? as usize;
        if block_size == 0 || block_size % 64 != 0 {
            return Err(Error::CorruptSerialized("rank bitvector: invalid block size"));
        }
        let num_blocks = r.read_u32()? as usize;
        let num_words = (num_bits + 63) / 64;
        let words = r.read_words(num_words)?;
        let lut = r.read_u32s(num_blocks + 1)?;
        r.align8();
        let bits = PackedBitVector::from_words(words, num_bits);
        Ok(RankBitVector {
            bits,
            block_size,
            lut,
        })
    }
}

fn build_lut(bits: &PackedBitVector, block_size: usize) -> Vec<u32> {
    let words_per_block = block_size / 64;
    let num_bits = bits.num_bits();
    let num_blocks = if num_bits == 0 {
        0
    } else {
        (num_bits + block_size - 1) / block_size
    };
    let words = bits.words();
    let mut lut = Vec::with_capacity(num_blocks + 1);
    let mut cumulative = 0u32;
    for b in 0..num_blocks {
        lut.push(cumulative);
        let start = b * words_per_block;
        let end = ((b + 1) * words_per_block).min(words.len());
        for &w in &words[start..end] {
            cumulative += w.count_ones();
        }
    }
    lut.push(cumulative);
    lut
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn bv_from_bits(set: &[usize], num_bits: usize) -> PackedBitVector {
        let mut bv = PackedBitVector::with_len(num_bits);
        for &b in set {
            bv.set_bit(b);
        }
        bv
    }

    #[test]
    fn rank_matches_naive_count() {
        let set = [0, 3, 5, 64, 65, 127, 511, 512, 1000];
        let bv = bv_from_bits(&set, 1200);
        let rbv = RankBitVector::with_block_size(bv, 512);
        for pos in [0usize, 1, 4, 64, 128, 511, 512, 513, 1000, 1200] {
            let expected = set.iter().filter(|&&b| b < pos).count();
            assert_eq!(rbv.rank(pos), expected, "rank({pos})");
        }
    }

    #[test]
    fn rank_total_equals_popcount() {
        let set = [2, 9, 100, 300];
        let bv = bv_from_bits(&set, 400);
        let rbv = RankBitVector::new(bv);
        assert_eq!(rbv.rank(400), set.len());
    }

    #[test]
    fn round_trip() {
        let set = [1, 2, 3, 600, 601];
        let bv = bv_from_bits(&set, 700);
        let rbv = RankBitVector::new(bv);
        let mut buf = Vec::new();
        rbv.serialize_into(&mut buf);
        let mut r = Reader::new(&buf);
        let restored = RankBitVector::deserialize_from(&mut r).unwrap();
        assert_eq!(restored, rbv);
        assert_eq!(restored.rank(601), 5);
    }

    proptest! {
        #[test]
        fn rank_matches_naive_for_any_bitvector(
            set in prop::collection::btree_set(0usize..2000, 0..200),
            pos in 0usize..=2000,
        ) {
            let num_bits = 2000;
            let bv = bv_from_bits(&set.iter().copied().collect::<Vec<_>>(), num_bits);
            let rbv = RankBitVector::new(bv);
            let expected = set.iter().filter(|&&b| b < pos).count();
            prop_assert_eq!(rbv.rank(pos), expected);
        }
    }
}
