//! Directory Operations (spec §2/§4.5): `mkdir`/`makedirs`/`rmdir`/
//! `listdir`/`rmtree`.

use crate::entry::ShadowEntry;
use crate::error::{OverlayError, Result};
use crate::overlay::Overlay;
use crate::pathutil;

impl Overlay {
    /// Create a directory at `path`. Fails `EEXIST` if anything already
    /// lexists there, `ENOTDIR` if the parent is not a directory (spec
    /// §4.5).
    pub fn mkdir(&self, path: &str) -> Result<()> {
        let full = self.deref(path, true)?;
        if self.raw_lstat(&full).is_ok() {
            return Err(OverlayError::Exists(full.into()));
        }
        self.check_parent_is_dir(&full)?;
        self.add_shadow_entry(&full, ShadowEntry::directory());
        Ok(())
    }

    /// Create `path` and every missing parent directory, the way
    /// `os.makedirs` does. Intermediate components that already exist
    /// (in the overlay or the underlying filesystem) are left alone, but
    /// the final segment must not already exist: `EEXIST` if it does.
    pub fn makedirs(&self, path: &str) -> Result<()> {
        let full = self.deref(path, true)?;
        let mut cur = String::from("/");
        let mut segments = full
            .trim_start_matches('/')
            .split('/')
            .filter(|s| !s.is_empty())
            .peekable();
        while let Some(seg) = segments.next() {
            cur = pathutil::join(&cur, seg);
            let is_final = segments.peek().is_none();
            match self.mkdir(&cur) {
                Ok(()) => {}
                Err(OverlayError::Exists(_)) if !is_final => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Remove the empty directory at `path`. Fails `ENOTDIR` if `path` is
    /// not a directory, `ENOTEMPTY` if it still has entries (spec §4.5).
    pub fn rmdir(&self, path: &str) -> Result<()> {
        let full = self.deref(path, true)?;
        let st = self.raw_lstat(&full)?;
        if !st.is_dir() {
            return Err(OverlayError::NotADirectory(full.into()));
        }
        if !self.listdir(&full)?.is_empty() {
            return Err(OverlayError::NotEmpty(full.into()));
        }
        self.add_shadow_entry(&full, ShadowEntry::deleted());
        Ok(())
    }

    /// List the direct children of the directory at `path`, the union of
    /// the underlying filesystem's listing and the overlay's additions
    /// and removals (spec §4.3/§4.5). A final symlink to a directory is
    /// followed, the same as `os.listdir`.
    pub fn listdir(&self, path: &str) -> Result<Vec<String>> {
        let full = self.deref(path, false)?;
        let st = self.raw_lstat(&full)?;
        if !st.is_dir() {
            return Err(OverlayError::NotADirectory(full.into()));
        }
        let base = self
            .underlying_backend()
            .listdir(&full)
            .unwrap_or_default();
        Ok(self.merge_listing(&full, base))
    }

    /// Recursively tombstone everything under `path`, including `path`
    /// itself. Every file, symlink, and directory visible through the
    /// overlay at the time of the call gets its own deletion entry, so
    /// `changes()` after an `rmtree` reads as a flat list rather than one
    /// opaque subtree marker.
    ///
    /// Fails immediately on the first error, including when `path`
    /// itself is a symlink: `rmtree` never follows a symlink to delete
    /// whatever it points at (spec §8 boundary behaviour). For a version
    /// that keeps going past failures, see [`Overlay::rmtree_onerror`].
    pub fn rmtree(&self, path: &str) -> Result<()> {
        let full = self.deref(path, false)?;
        let st = self.raw_lstat(&full)?;
        if st.is_symlink() {
            return Err(OverlayError::InvalidArgument(full.into()));
        }
        self.remove_recursive(&full)
    }

    /// As [`Overlay::rmtree`], but routes each step's failure to
    /// `onerror(path, &error)` instead of aborting, continuing on to
    /// sibling entries, the way `shutil.rmtree`'s `onerror` callback
    /// does (spec §7).
    pub fn rmtree_onerror(&self, path: &str, mut onerror: impl FnMut(&str, &OverlayError)) {
        let full = match self.deref(path, false) {
            Ok(p) => p,
            Err(e) => {
                onerror(path, &e);
                return;
            }
        };
        match self.raw_lstat(&full) {
            Ok(st) if st.is_symlink() => {
                onerror(&full, &OverlayError::InvalidArgument(full.clone().into()));
            }
            Ok(_) => self.remove_recursive_collecting(&full, &mut onerror),
            Err(e) => onerror(&full, &e),
        }
    }

    fn remove_recursive(&self, path: &str) -> Result<()> {
        let st = self.raw_lstat(path)?;
        if st.is_dir() {
            for name in self.listdir(path)? {
                let child = pathutil::join(path, &name);
                self.remove_recursive(&child)?;
            }
        }
        self.add_shadow_entry(path, ShadowEntry::deleted());
        Ok(())
    }

    fn remove_recursive_collecting(&self, path: &str, onerror: &mut dyn FnMut(&str, &OverlayError)) {
        match self.raw_lstat(path) {
            Ok(st) if st.is_dir() => match self.listdir(path) {
                Ok(children) => {
                    for name in children {
                        let child = pathutil::join(path, &name);
                        self.remove_recursive_collecting(&child, onerror);
                    }
                }
                Err(e) => {
                    onerror(path, &e);
                    return;
                }
            },
            Ok(_) => {}
            Err(e) => {
                onerror(path, &e);
                return;
            }
        }
        self.add_shadow_entry(path, ShadowEntry::deleted());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mkdir_then_listdir_sees_the_new_entry() {
        let ov = Overlay::new();
        ov.mkdir("/shadow-parent").unwrap();
        ov.mkdir("/shadow-parent/child").unwrap();
        assert_eq!(ov.listdir("/shadow-parent").unwrap(), vec!["child"]);
    }

    #[test]
    fn mkdir_twice_is_eexist() {
        let ov = Overlay::new();
        ov.mkdir("/dup-dir").unwrap();
        let err = ov.mkdir("/dup-dir").unwrap_err();
        assert!(matches!(err, OverlayError::Exists(_)));
    }

    #[test]
    fn mkdir_under_a_file_parent_is_enotdir() {
        use std::io::Write;
        let ov = Overlay::new();
        ov.open("/plain-file", "w").unwrap().write_all(b"x").unwrap();
        let err = ov.mkdir("/plain-file/child").unwrap_err();
        assert!(matches!(err, OverlayError::NotADirectory(_)));
    }

    #[test]
    fn rmdir_non_empty_fails() {
        let ov = Overlay::new();
        ov.mkdir("/full-dir").unwrap();
        ov.mkdir("/full-dir/child").unwrap();
        let err = ov.rmdir("/full-dir").unwrap_err();
        assert!(matches!(err, OverlayError::NotEmpty(_)));
    }

    #[test]
    fn rmdir_empty_succeeds_and_vanishes_from_listing() {
        let ov = Overlay::new();
        ov.mkdir("/empty-parent").unwrap();
        ov.mkdir("/empty-parent/child").unwrap();
        ov.rmdir("/empty-parent/child").unwrap();
        assert!(ov.listdir("/empty-parent").unwrap().is_empty());
    }

    #[test]
    fn makedirs_creates_every_missing_component() {
        let ov = Overlay::new();
        ov.makedirs("/a/b/c").unwrap();
        assert!(ov.exists("/a"));
        assert!(ov.exists("/a/b"));
        assert!(ov.exists("/a/b/c"));
    }

    #[test]
    fn makedirs_twice_is_eexist_on_the_final_segment() {
        let ov = Overlay::new();
        ov.makedirs("/x/y/z").unwrap();
        let err = ov.makedirs("/x/y/z").unwrap_err();
        assert!(matches!(err, OverlayError::Exists(_)));
    }

    #[test]
    fn rmtree_on_a_symlink_fails_before_deleting_anything() {
        let ov = Overlay::new();
        ov.mkdir("/target-dir").unwrap();
        ov.symlink("/target-dir", "/link-to-dir").unwrap();
        let err = ov.rmtree("/link-to-dir").unwrap_err();
        assert!(matches!(err, OverlayError::InvalidArgument(_)));
        assert!(ov.islink("/link-to-dir"));
    }

    #[test]
    fn rmtree_onerror_keeps_going_past_a_failure() {
        let ov = Overlay::new();
        ov.makedirs("/keep-going/a").unwrap();
        ov.makedirs("/keep-going/b").unwrap();
        let mut errors = Vec::new();
        ov.rmtree_onerror("/keep-going", |p, _e| errors.push(p.to_string()));
        assert!(errors.is_empty());
        assert!(!ov.exists("/keep-going/a"));
        assert!(!ov.exists("/keep-going/b"));
    }

    #[test]
    fn rmtree_tombstones_every_descendant() {
        let ov = Overlay::new();
        ov.makedirs("/tree/a/b").unwrap();
        {
            use std::io::Write;
            ov.open("/tree/a/file", "w")
                .unwrap()
                .write_all(b"x")
                .unwrap();
        }
        ov.rmtree("/tree").unwrap();
        assert!(!ov.exists("/tree"));
        assert!(!ov.exists("/tree/a"));
        assert!(!ov.exists("/tree/a/b"));
        assert!(!ov.exists("/tree/a/file"));
    }
}
