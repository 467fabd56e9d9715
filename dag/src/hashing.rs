//! Domain-separated BLAKE3 hashing for event identifiers

use lachesis_core::Hash;

/// Key-derivation context for event ids
pub const EVENT_ID_CONTEXT: &str = "lachesis.event.id.v1";

/// Incremental hasher bound to a domain context
pub struct IncrementalHasher {
    hasher: blake3::Hasher,
}

impl IncrementalHasher {
    pub fn new(context: &str) -> Self {
        Self {
            hasher: blake3::Hasher::new_derive_key(context),
        }
    }

    pub fn update(&mut self, data: &[u8]) -> &mut Self {
        self.hasher.update(data);
        self
    }

    /// Length-prefixed update so adjacent variable fields cannot collide
    pub fn update_framed(&mut self, data: &[u8]) -> &mut Self {
        self.hasher.update(&(data.len() as u64).to_le_bytes());
        self.hasher.update(data);
        self
    }

    pub fn finalize(&self) -> Hash {
        Hash::from_bytes(*self.hasher.finalize().as_bytes())
    }
}
