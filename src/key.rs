//! The `Key` alias and the one reserved byte value every stored key must
//! avoid.

/// A stored key: an arbitrary byte string, excluding `TERMINATOR`.
pub type Key = Vec<u8>;

/// Reserved label value marking "a stored key ends here" in a trie node
/// that also has other children. Callers are expected not to use this byte
/// value within a key; the builder does not scan for it (the five error
/// kinds this crate reports are fixed, and this is not among them).
pub(crate) const TERMINATOR: u8 = 0xFF;
