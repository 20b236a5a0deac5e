//! Link Operations (spec §2/§4.6): `symlink`/`readlink`/`islink`.

use crate::entry::ShadowEntry;
use crate::error::{OverlayError, Result};
use crate::overlay::Overlay;

impl Overlay {
    /// Create a symlink at `link_path` pointing at `target`. `target` is
    /// stored exactly as given; it is never resolved or validated, the
    /// same as the real `symlink(2)` (spec §4.6).
    pub fn symlink(&self, target: &str, link_path: &str) -> Result<()> {
        let full = self.deref(link_path, true)?;
        if self.raw_lstat(&full).is_ok() {
            return Err(OverlayError::Exists(full.into()));
        }
        self.check_parent_is_dir(&full)?;
        self.add_shadow_entry(&full, ShadowEntry::symlink(target.to_string()));
        Ok(())
    }

    /// The literal target a symlink at `path` was created with, without
    /// resolving it further (spec §4.6).
    pub fn readlink(&self, path: &str) -> Result<String> {
        let full = self.deref(path, true)?;
        let st = self.raw_lstat(&full)?;
        if !st.is_symlink() {
            return Err(OverlayError::InvalidArgument(full.into()));
        }
        if let Some(entry) = self.entry_at(&full) {
            return Ok(String::from_utf8_lossy(&entry.content).into_owned());
        }
        self.underlying_backend().readlink(&full)
    }

    /// `true` iff `path` itself (not what it points to) is a symlink
    /// (spec §4.6). Any error resolving `path` counts as `false`.
    #[must_use]
    pub fn islink(&self, path: &str) -> bool {
        match self.deref(path, true).and_then(|full| self.raw_lstat(&full)) {
            Ok(st) => st.is_symlink(),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symlink_then_readlink_round_trips() {
        let ov = Overlay::new();
        ov.symlink("/etc/hosts", "/my-link").unwrap();
        assert_eq!(ov.readlink("/my-link").unwrap(), "/etc/hosts");
        assert!(ov.islink("/my-link"));
    }

    #[test]
    fn symlink_twice_at_same_path_is_eexist() {
        let ov = Overlay::new();
        ov.symlink("/a", "/dup").unwrap();
        let err = ov.symlink("/b", "/dup").unwrap_err();
        assert!(matches!(err, OverlayError::Exists(_)));
    }

    #[test]
    fn readlink_on_non_symlink_is_einval() {
        let ov = Overlay::new();
        ov.mkdir("/plain-dir").unwrap();
        let err = ov.readlink("/plain-dir").unwrap_err();
        assert!(matches!(err, OverlayError::InvalidArgument(_)));
    }
}
