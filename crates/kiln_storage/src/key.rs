//! Encryption keys handed to the engine at open and rekey time.

use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of an encryption key in bytes.
pub const KEY_SIZE: usize = 32;

/// Encryption algorithm selector.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EncryptionAlgorithm {
    /// No encryption.
    #[default]
    None = 0,
    /// AES-256.
    Aes256 = 1,
}

impl EncryptionAlgorithm {
    /// Converts a raw selector, returning `None` for unknown values.
    #[must_use]
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::None),
            1 => Some(Self::Aes256),
            _ => None,
        }
    }
}

/// An encryption key. The key bytes are wiped when the value is dropped.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey {
    #[zeroize(skip)]
    algorithm: EncryptionAlgorithm,
    bytes: [u8; KEY_SIZE],
}

impl EncryptionKey {
    /// Creates a key for `algorithm` from raw bytes.
    #[must_use]
    pub fn new(algorithm: EncryptionAlgorithm, bytes: [u8; KEY_SIZE]) -> Self {
        Self { algorithm, bytes }
    }

    /// Creates an AES-256 key.
    #[must_use]
    pub fn aes256(bytes: [u8; KEY_SIZE]) -> Self {
        Self::new(EncryptionAlgorithm::Aes256, bytes)
    }

    /// Returns the algorithm.
    #[must_use]
    pub fn algorithm(&self) -> EncryptionAlgorithm {
        self.algorithm
    }

    /// Returns the key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }

    /// Returns true if this key actually encrypts.
    #[must_use]
    pub fn is_encrypting(&self) -> bool {
        self.algorithm != EncryptionAlgorithm::None
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionKey")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_hides_key_bytes() {
        let key = EncryptionKey::aes256([0xAB; KEY_SIZE]);
        let printed = format!("{key:?}");
        assert!(printed.contains("Aes256"));
        assert!(!printed.contains("171"));
    }

    #[test]
    fn algorithm_from_raw() {
        assert_eq!(EncryptionAlgorithm::from_raw(0), Some(EncryptionAlgorithm::None));
        assert_eq!(EncryptionAlgorithm::from_raw(1), Some(EncryptionAlgorithm::Aes256));
        assert_eq!(EncryptionAlgorithm::from_raw(7), None);
    }

    #[test]
    fn none_algorithm_does_not_encrypt() {
        let key = EncryptionKey::new(EncryptionAlgorithm::None, [0; KEY_SIZE]);
        assert!(!key.is_encrypting());
        assert!(EncryptionKey::aes256([1; KEY_SIZE]).is_encrypting());
    }
}
