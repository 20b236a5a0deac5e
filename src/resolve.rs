//! The Path Canonicaliser (spec §2/§4.2): turning an arbitrary path into
//! the absolute, symlink-free form every other component keys its state
//! by.

use crate::error::{OverlayError, Result};
use crate::overlay::Overlay;
use crate::pathutil;
use crate::stat::Stat;

/// Upper bound on symlink hops a single `deref()` walk will follow before
/// giving up with [`OverlayError::SymlinkLoop`]. The system this overlay
/// models makes no such promise and would recurse forever on a cycle;
/// this crate picks a concrete bound rather than risk a stack overflow
/// (spec §4.2, resolved open question: see `DESIGN.md`).
pub const MAX_SYMLINK_HOPS: u32 = 40;

impl Overlay {
    /// Resolve `path` to its absolute, lexically normalized form, joining
    /// onto the process's current directory if relative. Purely
    /// syntactic, no filesystem access (spec §4.2).
    #[must_use]
    pub fn abs(&self, path: &str) -> String {
        let cwd = std::env::current_dir().unwrap_or_else(|_| std::path::PathBuf::from("/"));
        pathutil::absolutize(std::path::Path::new(path), &cwd)
    }

    /// Fully resolve `path`, following every symlink encountered in any
    /// path component (spec §4.2).
    ///
    /// When `to_parent` is `true`, only the parent directory is resolved
    /// and the final component is rejoined unresolved and unchecked,
    /// used by operations that create or remove the final component
    /// itself (`mkdir`, `symlink`, `unlink`), which must not require that
    /// component to already exist.
    pub fn deref(&self, path: &str, to_parent: bool) -> Result<String> {
        let absolute = self.abs(path);
        if to_parent {
            let (head, tail) = pathutil::split(&absolute);
            let resolved_head = self.deref(&head, false)?;
            return Ok(pathutil::join(&resolved_head, &tail));
        }
        self.deref_walk(&absolute, 0)
    }

    fn deref_walk(&self, absolute: &str, hops: u32) -> Result<String> {
        let segments: Vec<&str> = absolute.split('/').filter(|s| !s.is_empty()).collect();
        let mut cur = String::from("/");
        for (idx, seg) in segments.iter().enumerate() {
            cur = pathutil::join(&cur, seg);
            let st = self.raw_lstat(&cur)?;
            if st.is_symlink() {
                if hops >= MAX_SYMLINK_HOPS {
                    return Err(OverlayError::SymlinkLoop(absolute.into()));
                }
                let target = self.readlink(&cur)?;
                let mut composed = pathutil::join(&pathutil::dirname(&cur), &target);
                for rest in &segments[idx + 1..] {
                    composed = pathutil::join(&composed, rest);
                }
                return self.deref_walk(&self.abs(&composed), hops + 1);
            }
        }
        Ok(cur)
    }

    /// `lstat` of `path` without consulting `deref` on the final
    /// component, assumes the caller already resolved everything but
    /// the last segment. Falls through to the underlying backend on a
    /// shadow miss.
    pub(crate) fn raw_lstat(&self, path: &str) -> Result<Stat> {
        if let Some(entry) = self.entry_at(path) {
            if entry.is_deleted() {
                return Err(OverlayError::NotFound(path.into()));
            }
            return Ok(Stat::for_entry(entry.kind, entry.content.len()));
        }
        let mut st = self.underlying_backend().lstat(path)?;
        st.overlay = false;
        Ok(st)
    }

    /// `stat` of `path`, following a final symlink, without going
    /// through the `anystat` directory-component check. Assumes the
    /// caller already resolved everything but the last segment.
    pub(crate) fn raw_stat(&self, path: &str) -> Result<Stat> {
        if let Some(entry) = self.entry_at(path) {
            if entry.is_deleted() {
                return Err(OverlayError::NotFound(path.into()));
            }
            if entry.kind == crate::entry::EntryKind::Symlink {
                let resolved = self.deref(path, false)?;
                return self.raw_stat(&resolved);
            }
            return Ok(Stat::for_entry(entry.kind, entry.content.len()));
        }
        let mut st = self.underlying_backend().stat(path)?;
        st.overlay = false;
        Ok(st)
    }

    /// Require that `full`'s parent directory exists and is a directory,
    /// the check every path-creating operation (`mkdir`, `symlink`, a
    /// write-mode `open`) performs before adding a shadow entry.
    pub(crate) fn check_parent_is_dir(&self, full: &str) -> Result<()> {
        let (head, _tail) = pathutil::split(full);
        let st = self.raw_stat(&head)?;
        if !st.is_dir() {
            return Err(OverlayError::NotADirectory(head.into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deref_leaves_plain_paths_unchanged() {
        let ov = Overlay::new();
        assert_eq!(ov.deref("/tmp", false).unwrap(), "/tmp");
    }

    #[test]
    fn deref_to_parent_does_not_require_tail_to_exist() {
        let ov = Overlay::new();
        let resolved = ov.deref("/tmp/definitely-not-here", true).unwrap();
        assert_eq!(resolved, "/tmp/definitely-not-here");
    }

    #[test]
    fn deref_follows_shadow_symlink() {
        let ov = Overlay::new();
        ov.mkdir("/shadow-dir").unwrap();
        ov.symlink("/shadow-dir", "/shadow-link").unwrap();
        let resolved = ov.deref("/shadow-link/child", true).unwrap();
        assert_eq!(resolved, "/shadow-dir/child");
    }
}
