//! The Stat Resolver (spec §2/§4.4): `lstat`/`stat`/`exists`/`lexists`/
//! `access`, all built on the canonicaliser's `anystat` primitive.

use crate::error::{OverlayError, Result};
use crate::overlay::Overlay;
use crate::pathutil;
use crate::stat::{self, Stat};

impl Overlay {
    fn anystat(&self, path: &str, link: bool) -> Result<Stat> {
        let absolute = self.abs(path);
        let (head, tail) = pathutil::split(&absolute);
        let resolved_head = self.deref(&head, false)?;
        let head_stat = self.raw_stat(&resolved_head)?;
        if !head_stat.is_dir() {
            return Err(OverlayError::NotADirectory(resolved_head.into()));
        }
        let full = pathutil::join(&resolved_head, &tail);
        if link {
            self.raw_lstat(&full)
        } else {
            self.raw_stat(&full)
        }
    }

    /// `lstat(2)`: stats `path` itself, not following a final symlink
    /// (spec §4.4).
    pub fn lstat(&self, path: &str) -> Result<Stat> {
        self.anystat(path, true)
    }

    /// `stat(2)`: stats `path`, following a final symlink (spec §4.4).
    pub fn stat(&self, path: &str) -> Result<Stat> {
        self.anystat(path, false)
    }

    /// `true` iff `path` exists once fully resolved, following a final
    /// symlink (spec §4.4). Any failure (missing component, dangling
    /// symlink, non-directory in the middle of the path) means `false`.
    #[must_use]
    pub fn exists(&self, path: &str) -> bool {
        self.stat(path).is_ok()
    }

    /// As [`Overlay::exists`], but a dangling symlink itself still
    /// counts as existing (spec §4.4).
    #[must_use]
    pub fn lexists(&self, path: &str) -> bool {
        self.lstat(path).is_ok()
    }

    /// `access(2)`: `true` iff `path` exists and its permission bits
    /// satisfy `mode` (a bitwise OR of [`stat::R_OK`]/[`stat::W_OK`]/
    /// [`stat::X_OK`]), per spec §4.4.
    #[must_use]
    pub fn access(&self, path: &str, mode: u32) -> bool {
        match self.stat(path) {
            Ok(st) => st.accessible(mode),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exists_false_for_missing_path() {
        let ov = Overlay::new();
        assert!(!ov.exists("/definitely/not/a/real/path/xyz"));
    }

    #[test]
    fn shadowed_file_exists_and_stats_as_regular() {
        use std::io::Write;
        let ov = Overlay::new();
        {
            let mut f = ov.open("/shadow-file", "w").unwrap();
            f.write_all(b"hi").unwrap();
        }
        assert!(ov.exists("/shadow-file"));
        let st = ov.stat("/shadow-file").unwrap();
        assert!(st.is_regular());
        assert!(st.overlay);
    }

    #[test]
    fn lexists_true_for_dangling_symlink() {
        let ov = Overlay::new();
        ov.symlink("/nowhere", "/dangling").unwrap();
        assert!(ov.lexists("/dangling"));
        assert!(!ov.exists("/dangling"));
    }
}
