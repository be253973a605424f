//! Engine open configuration.

use crate::key::EncryptionKey;

bitflags::bitflags! {
    /// Flags selecting engine-open behavior.
    ///
    /// Kiln forwards these untouched; only the engine interprets them.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DatabaseFlags: u32 {
        /// Create the database if it does not exist.
        const CREATE = 0x01;
        /// Open read-only.
        const READ_ONLY = 0x02;
        /// Compact automatically in the background.
        const AUTO_COMPACT = 0x04;
        /// The path names a bundle directory rather than a file.
        const BUNDLED = 0x08;
    }
}

/// Configuration for opening a storage engine.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Open flags.
    pub flags: DatabaseFlags,

    /// Encryption key, if the database is encrypted.
    pub encryption_key: Option<EncryptionKey>,
}

impl EngineConfig {
    /// Creates a configuration with no flags and no key.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration from raw flags and an optional key.
    #[must_use]
    pub fn from_parts(flags: DatabaseFlags, encryption_key: Option<EncryptionKey>) -> Self {
        Self {
            flags,
            encryption_key,
        }
    }

    /// Sets whether to create the database if missing.
    #[must_use]
    pub fn create(mut self, value: bool) -> Self {
        self.flags.set(DatabaseFlags::CREATE, value);
        self
    }

    /// Sets whether to open read-only.
    #[must_use]
    pub fn read_only(mut self, value: bool) -> Self {
        self.flags.set(DatabaseFlags::READ_ONLY, value);
        self
    }

    /// Sets the encryption key.
    #[must_use]
    pub fn encryption_key(mut self, key: EncryptionKey) -> Self {
        self.encryption_key = Some(key);
        self
    }
}
