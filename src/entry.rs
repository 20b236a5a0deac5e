//! The Shadow Entry data model (spec §3).

/// The kind of a [`ShadowEntry`], mirroring the POSIX file-type bits the
/// overlay models. `Deleted` is a tombstone: it records that a
/// previously-visible path has been removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    Regular,
    Directory,
    Symlink,
    Deleted,
}

/// A single record in the [`crate::store::ShadowStore`]: an addition,
/// modification, deletion, or symlink relative to the underlying
/// filesystem.
///
/// `content` holds the file body for [`EntryKind::Regular`], the
/// (unresolved) link target for [`EntryKind::Symlink`], and is empty for
/// [`EntryKind::Directory`] and [`EntryKind::Deleted`].
///
/// `original_kind` records the entry kind observed in the underlying
/// filesystem the first time a shadow entry was created at this path; it
/// drives the `add`/`mod`/`del` classification in
/// [`crate::store::ShadowStore::changes`].
#[derive(Debug, Clone)]
pub struct ShadowEntry {
    pub kind: EntryKind,
    pub content: Vec<u8>,
    pub original_kind: Option<EntryKind>,
}

impl ShadowEntry {
    /// Construct a new entry, not yet carrying an `original_kind`; that
    /// gets filled in by [`crate::store::ShadowStore::add_entry`].
    #[must_use]
    pub fn new(kind: EntryKind, content: Vec<u8>) -> Self {
        Self {
            kind,
            content,
            original_kind: None,
        }
    }

    #[must_use]
    pub fn directory() -> Self {
        Self::new(EntryKind::Directory, Vec::new())
    }

    #[must_use]
    pub fn deleted() -> Self {
        Self::new(EntryKind::Deleted, Vec::new())
    }

    #[must_use]
    pub fn symlink(target: impl Into<Vec<u8>>) -> Self {
        Self::new(EntryKind::Symlink, target.into())
    }

    #[must_use]
    pub fn regular(content: impl Into<Vec<u8>>) -> Self {
        Self::new(EntryKind::Regular, content.into())
    }

    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.kind == EntryKind::Deleted
    }
}
