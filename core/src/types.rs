//! Core types for Lachesis
//!
//! Identifiers and counters shared by every layer of the consensus core.

use serde::{Deserialize, Serialize};
use std::fmt;

/// 32-byte hash type
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Hash(pub [u8; 32]);

impl Hash {
    pub const ZERO: Hash = Hash([0u8; 32]);

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Hash(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Hash(arr))
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", &self.to_hex()[..16])
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash(0x{})", self.to_hex())
    }
}

/// Event identifier (hash of the sealed event header)
pub type EventId = Hash;

/// Validator stake
pub type Weight = u64;

/// Validator identifier
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ValidatorId(pub u32);

impl ValidatorId {
    pub fn new(value: u32) -> Self {
        ValidatorId(value)
    }
}

impl fmt::Display for ValidatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "validator:{}", self.0)
    }
}

impl fmt::Debug for ValidatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ValidatorId({})", self.0)
    }
}

/// Position of an event in its creator's chain (first event is 1)
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Seq(pub u32);

impl Seq {
    /// Marker for "nothing observed"
    pub const NONE: Seq = Seq(0);
    pub const FIRST: Seq = Seq(1);

    pub fn new(value: u32) -> Self {
        Seq(value)
    }

    pub fn next(&self) -> Seq {
        Seq(self.0 + 1)
    }

    pub fn is_none(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Seq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Seq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Seq({})", self.0)
    }
}

/// Era number; only used to tell forks apart from chain restarts
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Epoch(pub u32);

impl Epoch {
    pub const GENESIS: Epoch = Epoch(1);

    pub fn new(value: u32) -> Self {
        Epoch(value)
    }
}

impl Default for Epoch {
    fn default() -> Self {
        Epoch::GENESIS
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

impl fmt::Debug for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Epoch({})", self.0)
    }
}

/// Consensus round number assigned to every event
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Frame(pub u32);

impl Frame {
    pub const ZERO: Frame = Frame(0);

    pub fn new(value: u32) -> Self {
        Frame(value)
    }

    pub fn next(&self) -> Frame {
        Frame(self.0 + 1)
    }

    /// Previous frame, `None` for frame 0
    pub fn prev(&self) -> Option<Frame> {
        self.0.checked_sub(1).map(Frame)
    }

    /// Number of frames between `earlier` and `self`, `None` if `earlier` is later
    pub fn distance_from(&self, earlier: Frame) -> Option<u32> {
        self.0.checked_sub(earlier.0)
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "f{}", self.0)
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_hex() {
        let hash = Hash([7u8; 32]);
        let hex = hash.to_hex();
        let parsed = Hash::from_hex(&hex).unwrap();
        assert_eq!(hash, parsed);
        assert!(Hash::from_hex("abcd").is_err());
    }

    #[test]
    fn test_frame_arithmetic() {
        let f = Frame::new(3);
        assert_eq!(f.next(), Frame::new(4));
        assert_eq!(f.prev(), Some(Frame::new(2)));
        assert_eq!(Frame::ZERO.prev(), None);
        assert_eq!(f.distance_from(Frame::new(1)), Some(2));
        assert_eq!(Frame::new(1).distance_from(f), None);
    }

    #[test]
    fn test_seq_sequence() {
        assert!(Seq::NONE.is_none());
        assert_eq!(Seq::FIRST.next(), Seq::new(2));
        assert!(Seq::new(2) > Seq::FIRST);
    }
}
