//! Error types for filter construction, (de)serialization and cursor use.

use thiserror::Error;

/// Failure modes for the SuRF core.
///
/// Per the error handling policy: lookups (`contains`, `range_overlaps`)
/// never fail, a missing key is simply `false`. Only construction,
/// (de)serialization, and invalid cursor use can produce an `Error`.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum Error {
    /// `Filter::new` was called with zero keys.
    #[error("filter requires at least one key")]
    EmptyInput,

    /// Keys were not in non-decreasing lexicographic order.
    #[error("keys are not sorted: key at index {at} is out of order")]
    Unsorted {
        /// Index of the first offending key.
        at: usize,
    },

    /// `hash_len_bits + real_len_bits` exceeded 64.
    #[error(
        "suffix length out of range: hash_len_bits({hash_len_bits}) + real_len_bits({real_len_bits}) > 64"
    )]
    SuffixLengthOutOfRange {
        /// Requested hash suffix width in bits.
        hash_len_bits: u32,
        /// Requested real suffix width in bits.
        real_len_bits: u32,
    },

    /// `Filter::deserialize` encountered an inconsistent header or a byte
    /// count that could not have produced a well-formed filter.
    #[error("corrupt serialized filter: {0}")]
    CorruptSerialized(&'static str),

    /// A cursor method (`key`, `next`, `prev`, ...) was called while the
    /// cursor is not positioned on a valid entry.
    #[error("operation attempted on an invalid iterator")]
    OperationOnInvalidIterator,
}
