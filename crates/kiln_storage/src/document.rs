//! The opaque document value passed across the engine boundary.

bitflags::bitflags! {
    /// Flags describing a stored document.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DocumentFlags: u32 {
        /// The current revision is a deletion (tombstone).
        const DELETED = 0x01;
        /// The document has unresolved conflicting revisions.
        const CONFLICTED = 0x02;
        /// The document carries attachments.
        const HAS_ATTACHMENTS = 0x04;
        /// The document exists in storage.
        const EXISTS = 0x1000;
    }
}

/// A stored document.
///
/// Kiln never interprets the body; it only routes documents between
/// callers and the engine, and exposes the flags and type tag to
/// enumeration filters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    doc_id: String,
    doc_type: String,
    body: Vec<u8>,
    flags: DocumentFlags,
    sequence: u64,
}

impl Document {
    /// Creates a live document. The sequence is assigned on write.
    pub fn new(doc_id: impl Into<String>, doc_type: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            doc_id: doc_id.into(),
            doc_type: doc_type.into(),
            body,
            flags: DocumentFlags::EXISTS,
            sequence: 0,
        }
    }

    /// Creates a deletion marker for `doc_id`.
    pub fn tombstone(doc_id: impl Into<String>) -> Self {
        Self {
            doc_id: doc_id.into(),
            doc_type: String::new(),
            body: Vec::new(),
            flags: DocumentFlags::EXISTS | DocumentFlags::DELETED,
            sequence: 0,
        }
    }

    /// Returns the document with additional flags set.
    #[must_use]
    pub fn with_flags(mut self, flags: DocumentFlags) -> Self {
        self.flags |= flags;
        self
    }

    /// Returns the sequence-stamped copy an engine stores.
    #[must_use]
    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    /// Returns the document ID.
    #[must_use]
    pub fn doc_id(&self) -> &str {
        &self.doc_id
    }

    /// Returns the application-defined type tag (may be empty).
    #[must_use]
    pub fn doc_type(&self) -> &str {
        &self.doc_type
    }

    /// Returns the body bytes.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Returns the document flags.
    #[must_use]
    pub fn flags(&self) -> DocumentFlags {
        self.flags
    }

    /// Returns the sequence of the last write, or 0 if never written.
    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Returns true if the current revision is a deletion.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.flags.contains(DocumentFlags::DELETED)
    }

    /// Drops the body, keeping metadata.
    #[must_use]
    pub fn without_body(mut self) -> Self {
        self.body = Vec::new();
        self
    }
}
