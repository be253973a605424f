//! Document enumeration with an injectable filter.

use crate::lifecycle::InstanceCounted;
use kiln_storage::{Document, DocumentFlags};
use std::fmt;
use std::vec;
use tracing::trace;

bitflags::bitflags! {
    /// Options controlling which documents an enumerator yields and how.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EnumeratorFlags: u16 {
        /// Yield documents in descending ID order.
        const DESCENDING = 0x01;
        /// Include deleted documents.
        const INCLUDE_DELETED = 0x08;
        /// Include documents that are not in conflict.
        const INCLUDE_NON_CONFLICTED = 0x10;
        /// Include document bodies.
        const INCLUDE_BODIES = 0x20;
    }
}

impl Default for EnumeratorFlags {
    fn default() -> Self {
        Self::INCLUDE_NON_CONFLICTED | Self::INCLUDE_BODIES
    }
}

/// A predicate deciding whether the enumerator yields a document.
///
/// Called with the document, its flags and its type tag. The document's
/// body is still present when the filter runs, even without
/// [`EnumeratorFlags::INCLUDE_BODIES`].
pub type EnumFilter = Box<dyn Fn(&Document, DocumentFlags, &str) -> bool + Send>;

/// Iterates a snapshot of a database's documents.
///
/// Documents are yielded in ID order (reversed with
/// [`EnumeratorFlags::DESCENDING`]). A document is skipped if the flags
/// exclude it or the filter rejects it.
pub struct DocEnumerator {
    docs: vec::IntoIter<Document>,
    flags: EnumeratorFlags,
    filter: Option<EnumFilter>,
    _counted: InstanceCounted,
}

impl DocEnumerator {
    /// Creates an enumerator over `docs`.
    pub fn new(mut docs: Vec<Document>, flags: EnumeratorFlags) -> Self {
        docs.sort_by(|a, b| a.doc_id().cmp(b.doc_id()));
        if flags.contains(EnumeratorFlags::DESCENDING) {
            docs.reverse();
        }
        Self {
            docs: docs.into_iter(),
            flags,
            filter: None,
            _counted: InstanceCounted::new(),
        }
    }

    /// Installs `filter`, replacing any earlier one.
    pub fn set_filter(&mut self, filter: EnumFilter) {
        self.filter = Some(filter);
    }

    /// Removes the filter.
    pub fn clear_filter(&mut self) {
        self.filter = None;
    }

    /// Returns true if a filter is installed.
    pub fn has_filter(&self) -> bool {
        self.filter.is_some()
    }

    /// Returns the enumerator's flags.
    pub fn flags(&self) -> EnumeratorFlags {
        self.flags
    }
}

fn admits(flags: EnumeratorFlags, filter: Option<&EnumFilter>, doc: &Document) -> bool {
    let doc_flags = doc.flags();
    if doc_flags.contains(DocumentFlags::DELETED)
        && !flags.contains(EnumeratorFlags::INCLUDE_DELETED)
    {
        return false;
    }
    if !doc_flags.contains(DocumentFlags::CONFLICTED)
        && !flags.contains(EnumeratorFlags::INCLUDE_NON_CONFLICTED)
    {
        return false;
    }
    filter.map_or(true, |filter| filter(doc, doc_flags, doc.doc_type()))
}

impl Iterator for DocEnumerator {
    type Item = Document;

    fn next(&mut self) -> Option<Document> {
        let flags = self.flags;
        let filter = self.filter.as_ref();
        let doc = self.docs.by_ref().find(|doc| {
            let admitted = admits(flags, filter, doc);
            if !admitted {
                trace!(doc_id = doc.doc_id(), "enumerator skipped document");
            }
            admitted
        })?;
        if flags.contains(EnumeratorFlags::INCLUDE_BODIES) {
            Some(doc)
        } else {
            Some(doc.without_body())
        }
    }
}

impl fmt::Debug for DocEnumerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocEnumerator")
            .field("remaining", &self.docs.len())
            .field("flags", &self.flags)
            .field("has_filter", &self.has_filter())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<Document> {
        vec![
            Document::new("b", "note", vec![2]),
            Document::new("a", "task", vec![1]),
            Document::tombstone("c"),
            Document::new("d", "note", vec![4]).with_flags(DocumentFlags::CONFLICTED),
        ]
    }

    fn ids(iter: impl Iterator<Item = Document>) -> Vec<String> {
        iter.map(|doc| doc.doc_id().to_string()).collect()
    }

    #[test]
    fn default_skips_deleted_in_id_order() {
        let docs = DocEnumerator::new(sample(), EnumeratorFlags::default());
        assert_eq!(ids(docs), ["a", "b", "d"]);
    }

    #[test]
    fn descending_and_deleted() {
        let flags = EnumeratorFlags::default()
            | EnumeratorFlags::DESCENDING
            | EnumeratorFlags::INCLUDE_DELETED;
        let docs = DocEnumerator::new(sample(), flags);
        assert_eq!(ids(docs), ["d", "c", "b", "a"]);
    }

    #[test]
    fn without_non_conflicted_only_conflicts_remain() {
        let docs = DocEnumerator::new(sample(), EnumeratorFlags::INCLUDE_BODIES);
        assert_eq!(ids(docs), ["d"]);
    }

    #[test]
    fn bodies_stripped_unless_requested() {
        let mut docs = DocEnumerator::new(sample(), EnumeratorFlags::INCLUDE_NON_CONFLICTED);
        assert!(docs.next().unwrap().body().is_empty());
    }

    #[test]
    fn filter_sees_type_and_body() {
        let mut docs = DocEnumerator::new(sample(), EnumeratorFlags::INCLUDE_NON_CONFLICTED);
        docs.set_filter(Box::new(|doc: &Document, _: DocumentFlags, doc_type: &str| {
            doc_type == "note" && doc.body() == [2]
        }));
        assert!(docs.has_filter());
        assert_eq!(ids(docs), ["b"]);
    }

    #[test]
    fn last_filter_wins() {
        let mut docs = DocEnumerator::new(sample(), EnumeratorFlags::default());
        docs.set_filter(Box::new(|_: &Document, _: DocumentFlags, _: &str| false));
        docs.set_filter(Box::new(|_: &Document, _: DocumentFlags, doc_type: &str| {
            doc_type == "task"
        }));
        assert_eq!(ids(docs), ["a"]);
    }

    #[test]
    fn cleared_filter_admits_everything() {
        let mut docs = DocEnumerator::new(sample(), EnumeratorFlags::default());
        docs.set_filter(Box::new(|_: &Document, _: DocumentFlags, _: &str| false));
        docs.clear_filter();
        assert!(!docs.has_filter());
        assert_eq!(ids(docs).len(), 3);
    }

    #[test]
    fn filter_receives_document_flags() {
        let mut docs = DocEnumerator::new(sample(), EnumeratorFlags::default());
        docs.set_filter(Box::new(|_: &Document, flags: DocumentFlags, _: &str| {
            flags.contains(DocumentFlags::CONFLICTED)
        }));
        assert_eq!(ids(docs), ["d"]);
    }
}
