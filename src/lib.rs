//! A succinct range filter (SuRF): a static, space-efficient approximate
//! membership structure over a sorted set of byte-string keys.
//!
//! Unlike a hash-based filter, a SuRF preserves key ordering. This gives it
//! a bounded false-positive rate not just for point queries (`contains`)
//! but also for range queries (`range_overlaps`) and ordered iteration
//! (`Cursor`), at the cost of storing (a prefix of) the keys themselves in
//! a two-tier LOUDS trie rather than a flat hash table.
//!
//! ```
//! use surf_filter::{Filter, FilterOptions};
//!
//! let keys: Vec<Vec<u8>> = vec![b"far".to_vec(), b"fast".to_vec(), b"fat".to_vec()];
//! let filter = Filter::new(&keys, FilterOptions::new()).unwrap();
//!
//! assert!(filter.contains(b"fast"));
//! assert!(!filter.contains(b"ghost"));
//! assert!(filter.range_overlaps(b"fa", true, b"fas", true));
//! ```

mod binary;
mod bitops;
mod bitvector;
mod builder;
mod dense;
mod error;
mod filter;
mod hash;
mod key;
mod label_array;
mod options;
mod rank;
mod select;
mod sparse;
mod suffix;

pub use crate::error::Error;
pub use crate::filter::{Cursor, Filter};
pub use crate::key::Key;
pub use crate::options::{FilterOptions, RANK_BLOCK_SIZE, SELECT_SAMPLE_INTERVAL};
pub use crate::suffix::SuffixType;
