//! The Shadow Store (spec §2/§4.3): the in-memory map of absolute path to
//! [`ShadowEntry`], plus the union-listing and change-log logic that reads
//! it alongside an [`FsBackend`].

use std::collections::HashMap;

use crate::backend::FsBackend;
use crate::entry::{EntryKind, ShadowEntry};
use crate::pathutil;

/// The in-memory map backing an overlay, keyed by absolute canonical
/// path. Never touches the filesystem directly; callers supply an
/// [`FsBackend`] when an operation needs to consult the underlying
/// filesystem (e.g. to capture `original_kind` on first write).
#[derive(Debug, Default)]
pub struct ShadowStore {
    entries: HashMap<String, ShadowEntry>,
}

impl ShadowStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, path: &str) -> Option<&ShadowEntry> {
        self.entries.get(path)
    }

    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    /// Record `entry` at `path`, capturing `original_kind` from `backend`
    /// on the first write to a path and carrying it forward on
    /// subsequent writes (spec §4.3). A `Deleted` entry with no
    /// `original_kind` (i.e. deleting something the overlay itself
    /// created) collapses: the path reverts to "never shadowed" and is
    /// removed outright, per the store's tombstone-collapse invariant.
    pub fn add_entry(&mut self, path: &str, mut entry: ShadowEntry, backend: &dyn FsBackend) {
        if let Some(existing) = self.entries.get(path) {
            entry.original_kind = existing.original_kind;
        } else if let Ok(st) = backend.lstat(path) {
            entry.original_kind = Some(kind_from_mode(st.mode));
        }

        if entry.is_deleted() && entry.original_kind.is_none() {
            self.entries.remove(path);
            return;
        }
        self.entries.insert(path.to_string(), entry);
    }

    /// Merge the overlay's view of `dir`'s direct children onto `base`
    /// (the backend's own listing), applying additions and removing
    /// anything tombstoned (spec §4.3).
    #[must_use]
    pub fn merge_listing(&self, dir: &str, mut base: Vec<String>) -> Vec<String> {
        for (path, entry) in &self.entries {
            let (parent, name) = pathutil::split(path);
            if parent != dir || name.is_empty() {
                continue;
            }
            if entry.is_deleted() {
                base.retain(|n| n != &name);
            } else if !base.contains(&name) {
                base.push(name);
            }
        }
        base
    }

    /// All shadowed paths directly or transitively under `root`
    /// (inclusive), sorted.
    #[must_use]
    pub fn paths_under(&self, root: &str, recurse: bool) -> Vec<String> {
        let mut paths: Vec<String> = self
            .entries
            .keys()
            .filter(|p| {
                if recurse {
                    pathutil::is_under(p, root)
                } else {
                    p.as_str() == root || pathutil::dirname(p) == root
                }
            })
            .cloned()
            .collect();
        paths.sort();
        paths
    }

    /// The `tag:path` change-log lines for every shadowed path, sorted by
    /// path (spec §4.1/§6).
    #[must_use]
    pub fn changes(&self) -> Vec<String> {
        let mut paths: Vec<&String> = self.entries.keys().collect();
        paths.sort();
        paths
            .into_iter()
            .map(|p| change_line(p, &self.entries[p]))
            .collect()
    }

    /// The `tag:path` lines restricted to paths under `root`. When
    /// `relative` is set, the `root/` prefix is stripped from each path
    /// while the `tag:` prefix is kept intact (spec §4.1/§6).
    #[must_use]
    pub fn changes_under(&self, root: &str, recurse: bool, relative: bool) -> Vec<String> {
        self.paths_under(root, recurse)
            .into_iter()
            .map(|p| {
                let entry = &self.entries[&p];
                let shown = if relative {
                    relativize(&p, root)
                } else {
                    p
                };
                format!("{}:{shown}", tag_for(entry))
            })
            .collect()
    }

    /// Replace this store with an empty one, returning the displaced
    /// contents, used by `uninstall()` to capture the vaporized
    /// snapshot.
    pub fn take(&mut self) -> Self {
        std::mem::take(self)
    }
}

fn kind_from_mode(mode: u32) -> EntryKind {
    use crate::stat::{S_IFDIR, S_IFLNK, S_IFREG};
    match mode & 0o170_000 {
        S_IFDIR => EntryKind::Directory,
        S_IFLNK => EntryKind::Symlink,
        S_IFREG => EntryKind::Regular,
        _ => EntryKind::Regular,
    }
}

fn tag_for(entry: &ShadowEntry) -> &'static str {
    if entry.is_deleted() {
        "del"
    } else if entry.original_kind.is_none() {
        "add"
    } else {
        "mod"
    }
}

fn change_line(path: &str, entry: &ShadowEntry) -> String {
    format!("{}:{path}", tag_for(entry))
}

/// Strip a `root/` prefix from `path`, leaving it unchanged if `path`
/// doesn't actually start with it. `path == root` relativizes to `""`.
fn relativize(path: &str, root: &str) -> String {
    if path == root {
        return String::new();
    }
    let prefix = format!("{root}/");
    path.strip_prefix(prefix.as_str()).unwrap_or(path).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RealFs;

    #[test]
    fn add_entry_marks_new_path_as_add() {
        let mut store = ShadowStore::new();
        store.add_entry(
            "/does/not/exist/on/disk",
            ShadowEntry::regular(b"hi".to_vec()),
            &RealFs,
        );
        assert_eq!(store.changes(), vec!["add:/does/not/exist/on/disk"]);
    }

    #[test]
    fn deleting_an_added_path_collapses_it() {
        let mut store = ShadowStore::new();
        store.add_entry("/tmp/x", ShadowEntry::regular(b"hi".to_vec()), &RealFs);
        store.add_entry("/tmp/x", ShadowEntry::deleted(), &RealFs);
        assert!(!store.contains("/tmp/x"));
        assert!(store.changes().is_empty());
    }

    #[test]
    fn changes_under_relative_strips_root_but_keeps_the_tag() {
        let mut store = ShadowStore::new();
        store.entries.insert(
            "/proj/existing".to_string(),
            ShadowEntry {
                kind: EntryKind::Deleted,
                content: Vec::new(),
                original_kind: Some(EntryKind::Regular),
            },
        );
        store.add_entry("/proj/new", ShadowEntry::regular(Vec::new()), &RealFs);

        let mut lines = store.changes_under("/proj", true, true);
        lines.sort();
        assert_eq!(lines, vec!["add:new", "del:existing"]);
    }

    #[test]
    fn merge_listing_applies_additions_and_removals() {
        let mut store = ShadowStore::new();
        store.add_entry("/d/new", ShadowEntry::regular(Vec::new()), &RealFs);
        store.add_entry("/d/gone", ShadowEntry::deleted(), &RealFs);
        let merged = store.merge_listing("/d", vec!["gone".to_string(), "existing".to_string()]);
        assert!(merged.contains(&"new".to_string()));
        assert!(merged.contains(&"existing".to_string()));
        assert!(!merged.contains(&"gone".to_string()));
    }
}
