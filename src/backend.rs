//! The pluggable "underlying filesystem" an [`crate::Overlay`] reads
//! through to on a shadow miss.
//!
//! Per the design notes in spec §9, this crate does not monkey-patch a
//! process-wide filesystem module the way the source does. Instead every
//! intercepted operation is a method on the [`FsBackend`] trait, and
//! `install()` captures whichever backend was previously occupying a
//! [`crate::lifecycle::BackendSlot`], be it [`RealFs`] or another,
//! already-installed [`crate::Overlay`] (the nested-overlay case, spec §8
//! scenario 6).

use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::Path;

use crate::error::{OverlayError, Result};
use crate::fileops::{OpenMode, OverlayFile};
use crate::stat::Stat;

/// Identifies which concrete backend currently occupies a
/// [`crate::lifecycle::BackendSlot`], used by `Overlay::active()` to
/// detect foreign displacement (spec §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendId {
    Real,
    Overlay(u64),
}

/// The minimal set of POSIX primitives the overlay engine needs from
/// whatever it is layered on top of. Implemented by [`RealFs`] (the host
/// filesystem) and by [`crate::Overlay`] itself (so overlays nest).
pub trait FsBackend: std::fmt::Debug {
    fn backend_id(&self) -> BackendId;

    /// `lstat(2)`: does not follow a final symlink.
    fn lstat(&self, path: &str) -> Result<Stat>;

    /// `stat(2)`: follows symlinks, including a final one.
    fn stat(&self, path: &str) -> Result<Stat>;

    /// Directory entry names directly inside `path`.
    fn listdir(&self, path: &str) -> Result<Vec<String>>;

    /// The literal target a symlink at `path` points to.
    fn readlink(&self, path: &str) -> Result<String>;

    /// Open `path` in `mode`, returning a handle good for read and/or
    /// write according to that mode.
    fn open_file(&self, path: &str, mode: OpenMode) -> Result<OverlayFile>;
}

/// The real host filesystem, reached via `std::fs`.
#[derive(Debug, Default)]
pub struct RealFs;

impl FsBackend for RealFs {
    fn backend_id(&self) -> BackendId {
        BackendId::Real
    }

    fn lstat(&self, path: &str) -> Result<Stat> {
        let meta = fs::symlink_metadata(path).map_err(|e| classify(e, path))?;
        Ok(stat_from_metadata(&meta))
    }

    fn stat(&self, path: &str) -> Result<Stat> {
        let meta = fs::metadata(path).map_err(|e| classify(e, path))?;
        Ok(stat_from_metadata(&meta))
    }

    fn listdir(&self, path: &str) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(path).map_err(|e| classify(e, path))? {
            let entry = entry.map_err(|e| classify(e, path))?;
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        Ok(names)
    }

    fn readlink(&self, path: &str) -> Result<String> {
        let target = fs::read_link(path).map_err(|e| classify(e, path))?;
        Ok(target.to_string_lossy().into_owned())
    }

    fn open_file(&self, path: &str, mode: OpenMode) -> Result<OverlayFile> {
        let mut opts = fs::OpenOptions::new();
        match mode {
            OpenMode::Read => {
                opts.read(true);
            }
            OpenMode::Write => {
                opts.write(true).create(true).truncate(true);
            }
            OpenMode::Append => {
                opts.write(true).create(true).append(true);
            }
        }
        let file = opts.open(path).map_err(|e| classify(e, path))?;
        Ok(OverlayFile::Real(file))
    }
}

fn stat_from_metadata(meta: &fs::Metadata) -> Stat {
    Stat {
        mode: meta.mode(),
        size: meta.len(),
        uid: meta.uid(),
        gid: meta.gid(),
        nlink: meta.nlink(),
        ino: meta.ino(),
        dev: meta.dev(),
        atime: meta.atime(),
        mtime: meta.mtime(),
        ctime: meta.ctime(),
        overlay: false,
    }
}

fn classify(err: std::io::Error, path: &str) -> OverlayError {
    match err.kind() {
        std::io::ErrorKind::NotFound => OverlayError::NotFound(Path::new(path).to_path_buf()),
        std::io::ErrorKind::AlreadyExists => OverlayError::Exists(Path::new(path).to_path_buf()),
        _ => OverlayError::Io(err),
    }
}
