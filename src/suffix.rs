//! `SuffixStore`: the per-key bit-packed suffix slots that sharpen a
//! trie-path match into either a (bounded false-positive) hash check or an
//! exact check against the key's remaining bytes.

use crate::binary::{self, Reader};
use crate::bitvector::PackedBitVector;
use crate::error::Error;
use crate::hash::suffix_hash;
use crate::key::Key;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuffixType {
    /// No suffix is stored; every trie-path match is reported as a hit.
    None,
    /// A `hash_len_bits`-wide hash of the key is stored.
    Hash,
    /// The next `real_len_bits` bits of the key's remaining bytes are
    /// stored verbatim, enabling exact equality and ordered comparison.
    Real,
    /// Both: hash bits in the high-order position, real bits low-order.
    Mixed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuffixStore {
    suffix_type: SuffixType,
    hash_len_bits: u32,
    real_len_bits: u32,
    bits: PackedBitVector,
    num_suffixes: usize,
}

impl SuffixStore {
    /// The combined width in bits of one suffix slot.
    fn slot_width(suffix_type: SuffixType, hash_len_bits: u32, real_len_bits: u32) -> u32 {
        suffix_width(suffix_type, hash_len_bits, real_len_bits)
    }

    pub fn none() -> Self {
        SuffixStore {
            suffix_type: SuffixType::None,
            hash_len_bits: 0,
            real_len_bits: 0,
            bits: PackedBitVector::with_len(0),
            num_suffixes: 0,
        }
    }

    /// Packs raw per-key suffix words (already constructed via
    /// [`SuffixStore::construct_from_key`]) into a dense bit-packed store.
    pub(crate) fn build(
        suffix_type: SuffixType,
        hash_len_bits: u32,
        real_len_bits: u32,
        values: &[u64],
    ) -> Self {
        let width = Self::slot_width(suffix_type, hash_len_bits, real_len_bits);
        if width == 0 {
            return SuffixStore {
                suffix_type: SuffixType::None,
                hash_len_bits,
                real_len_bits,
                bits: PackedBitVector::with_len(0),
                num_suffixes: values.len(),
            };
        }
        let mut bits = PackedBitVector::with_len(values.len() * width as usize);
        for (idx, &value) in values.iter().enumerate() {
            write_bits(&mut bits, idx * width as usize, width, value);
        }
        SuffixStore {
            suffix_type,
            hash_len_bits,
            real_len_bits,
            bits,
            num_suffixes: values.len(),
        }
    }

    pub fn suffix_type(&self) -> SuffixType {
        self.suffix_type
    }

    pub fn len(&self) -> usize {
        self.num_suffixes
    }

    pub fn is_empty(&self) -> bool {
        self.num_suffixes == 0
    }

    pub(crate) fn width(&self) -> u32 {
        Self::slot_width(self.suffix_type, self.hash_len_bits, self.real_len_bits)
    }

    pub fn read(&self, idx: usize) -> u64 {
        let width = self.width();
        if width == 0 {
            return 0;
        }
        self.bits.read_bits(idx * width as usize, width)
    }

    /// Builds the suffix value that would be stored for `key`, whose trie
    /// path became unique (or ran out of bytes) at `level` (a byte offset
    /// into `key`).
    pub fn construct_from_key(&self, key: &[u8], level: usize) -> u64 {
        construct_suffix(self.suffix_type, self.hash_len_bits, self.real_len_bits, key, level)
    }

    /// `idx`'s suffix matches `key` at `level`, per §4.5's type dispatch:
    /// `None` always matches; a stored `Real` sentinel of `0` means "no
    /// suffix was stored for this slot" and also always matches; everything
    /// else is a plain computed-vs-stored equality check.
    pub fn check_equality(&self, idx: usize, key: &[u8], level: usize) -> bool {
        match self.suffix_type {
            SuffixType::None => true,
            SuffixType::Real => {
                let stored = self.read(idx);
                if stored == 0 {
                    return true;
                }
                if (key.len().saturating_sub(level)) * 8 < self.real_len_bits as usize {
                    return false;
                }
                stored == self.construct_from_key(key, level)
            }
            SuffixType::Hash | SuffixType::Mixed => {
                self.read(idx) == self.construct_from_key(key, level)
            }
        }
    }

    /// Lexicographic comparison of the stored suffix at `idx` against the
    /// suffix `key` would have at `level`. Only meaningful for `Real` and
    /// `Mixed` suffix stores.
    pub fn compare(&self, idx: usize, key: &[u8], level: usize) -> std::cmp::Ordering {
        debug_assert!(matches!(self.suffix_type, SuffixType::Real | SuffixType::Mixed));
        let stored = self.read(idx);
        if self.suffix_type == SuffixType::Real && stored == 0 {
            return std::cmp::Ordering::Less;
        }
        let querying = self.construct_from_key(key, level);
        stored.cmp(&querying)
    }

    pub fn heap_size(&self) -> usize {
        self.bits.heap_size()
    }

    pub(crate) fn serialize_into(&self, out: &mut Vec<u8>) {
        let type_tag: u8 = match self.suffix_type {
            SuffixType::None => 0,
            SuffixType::Hash => 1,
            SuffixType::Real => 2,
            SuffixType::Mixed => 3,
        };
        out.push(type_tag);
        binary::push_u32(out, self.hash_len_bits);
        binary::push_u32(out, self.real_len_bits);
        binary::push_u32(out, self.num_suffixes as u32);
        self.bits.serialize_into(out);
        binary::align8(out);
    }

    pub(crate) fn deserialize_from(r: &mut Reader) -> Result<Self, Error> {
        let tag = r.read_bytes(1)?[0];
        let suffix_type = match tag {
            0 => SuffixType::None,
            1 => SuffixType::Hash,
            2 => SuffixType::Real,
            3 => SuffixType::Mixed,
            _ => return Err(Error::CorruptSerialized("suffix store: unknown type tag")),
        };
        let hash_len_bits = r.read_u32()?;
        let real_len_bits = r.read_u32()?;
        let num_suffixes = r.read_u32()? as usize;
        let bits = PackedBitVector::deserialize_from(r)?;
        r.align8();
        Ok(SuffixStore {
            suffix_type,
            hash_len_bits,
            real_len_bits,
            bits,
            num_suffixes,
        })
    }
}

fn write_bits(bits: &mut PackedBitVector, bit_pos: usize, len: u32, value: u64) {
    // Written MSB-first to match `PackedBitVector::read_bits`: bit 0 of the
    // slot is the most significant of the `len`-bit value.
    for i in 0..len {
        let bit = (value >> (len - 1 - i)) & 1;
        if bit != 0 {
            bits.set_bit(bit_pos + i as usize);
        }
    }
}

/// Constructs the raw (unpacked) suffix value for `key` at `level`,
/// dispatched on `suffix_type`. Shared between build time (the value a key
/// contributes to the store) and query time (the value being looked up).
pub(crate) fn construct_suffix(
    suffix_type: SuffixType,
    hash_len_bits: u32,
    real_len_bits: u32,
    key: &[u8],
    level: usize,
) -> u64 {
    match suffix_type {
        SuffixType::None => 0,
        SuffixType::Hash => construct_hash_suffix(key, hash_len_bits),
        SuffixType::Real => construct_real_suffix(key, level, real_len_bits),
        SuffixType::Mixed => {
            let hash_part = construct_hash_suffix(key, hash_len_bits);
            let real_part = construct_real_suffix(key, level, real_len_bits);
            (hash_part << real_len_bits) | real_part
        }
    }
}

fn construct_hash_suffix(key: &[u8], len: u32) -> u64 {
    let hash = suffix_hash(key) as u64;
    if len == 0 {
        0
    } else if len >= 64 {
        hash
    } else {
        hash & ((1u64 << len) - 1)
    }
}

fn construct_real_suffix(key: &[u8], level: usize, len: u32) -> u64 {
    if len == 0 {
        return 0;
    }
    let mut suffix: u64 = 0;
    let num_complete_bytes = (len / 8) as usize;
    if num_complete_bytes > 0 {
        if level < key.len() {
            suffix += key[level] as u64;
        }
        for i in 1..num_complete_bytes {
            suffix <<= 8;
            if level + i < key.len() {
                suffix += key[level + i] as u64;
            }
        }
    }
    let offset = len % 8;
    if offset > 0 {
        suffix <<= offset;
        let mut remaining = 0u64;
        if level + num_complete_bytes < key.len() {
            remaining = key[level + num_complete_bytes] as u64;
        }
        remaining >>= 8 - offset;
        suffix += remaining;
    }
    suffix
}

/// The combined width in bits of one suffix slot for the given
/// configuration; used by the builder's cutoff-level byte accounting as
/// well as by [`SuffixStore`] itself.
pub(crate) fn suffix_width(suffix_type: SuffixType, hash_len_bits: u32, real_len_bits: u32) -> u32 {
    match suffix_type {
        SuffixType::None => 0,
        SuffixType::Hash => hash_len_bits,
        SuffixType::Real => real_len_bits,
        SuffixType::Mixed => hash_len_bits + real_len_bits,
    }
}

/// Convenience for the builder: one raw suffix value per key, in key order.
pub(crate) fn construct_values(
    suffix_type: SuffixType,
    hash_len_bits: u32,
    real_len_bits: u32,
    keys_and_levels: &[(Key, usize)],
) -> Vec<u64> {
    keys_and_levels
        .iter()
        .map(|(key, level)| construct_suffix(suffix_type, hash_len_bits, real_len_bits, key, *level))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_always_matches() {
        let store = SuffixStore::none();
        assert!(store.check_equality(0, b"anything", 3));
    }

    #[test]
    fn real_suffix_round_trips_through_store() {
        let keys = [(b"farmhand".to_vec(), 2), (b"faster".to_vec(), 2)];
        let values = construct_values(SuffixType::Real, 0, 16, &keys);
        let store = SuffixStore::build(SuffixType::Real, 0, 16, &values);
        assert!(store.check_equality(0, b"farmhand", 2));
        assert!(!store.check_equality(0, b"faster", 2));
        assert!(store.check_equality(1, b"faster", 2));
    }

    #[test]
    fn real_zero_sentinel_matches_anything() {
        // A key with no bytes left past `level` constructs an all-zero
        // suffix, which the sentinel rule treats as "no suffix stored".
        let keys = [(b"fa".to_vec(), 2)];
        let values = construct_values(SuffixType::Real, 0, 8, &keys);
        assert_eq!(values[0], 0);
        let store = SuffixStore::build(SuffixType::Real, 0, 8, &values);
        assert!(store.check_equality(0, b"completely-different", 5));
    }

    #[test]
    fn hash_suffix_distinguishes_most_keys() {
        let keys = [(b"far".to_vec(), 1), (b"fas".to_vec(), 1)];
        let values = construct_values(SuffixType::Hash, 8, 0, &keys);
        let store = SuffixStore::build(SuffixType::Hash, 8, 0, &values);
        assert!(store.check_equality(0, b"far", 1));
        assert!(store.check_equality(1, b"fas", 1));
    }

    #[test]
    fn compare_orders_real_suffixes() {
        let keys = [(b"a1".to_vec(), 1), (b"a9".to_vec(), 1)];
        let values = construct_values(SuffixType::Real, 0, 8, &keys);
        let store = SuffixStore::build(SuffixType::Real, 0, 8, &values);
        assert_eq!(store.compare(0, b"a9", 1), std::cmp::Ordering::Less);
        assert_eq!(store.compare(1, b"a1", 1), std::cmp::Ordering::Greater);
        assert_eq!(store.compare(0, b"a1", 1), std::cmp::Ordering::Equal);
    }

    #[test]
    fn round_trip_serialize() {
        let keys = [(b"far".to_vec(), 1), (b"fas".to_vec(), 1), (b"fat".to_vec(), 1)];
        let values = construct_values(SuffixType::Real, 0, 8, &keys);
        let store = SuffixStore::build(SuffixType::Real, 0, 8, &values);
        let mut buf = Vec::new();
        store.serialize_into(&mut buf);
        let mut r = Reader::new(&buf);
        let restored = SuffixStore::deserialize_from(&mut r).unwrap();
        assert_eq!(restored, store);
    }
}
