//! File Operations (spec §2/§4.7): `open`-mode parsing, the unified file
//! handle returned by `open`, and the descriptor-table `os_*` primitives.

use std::fs;
use std::io::{self, Read, Seek, SeekFrom, Write};

use crate::entry::ShadowEntry;
use crate::error::{OverlayError, Result};
use crate::overlay::Overlay;
use crate::pathutil;

/// The three modes `open()` supports. Combinations like read+write or a
/// trailing `+` are rejected outright (spec §4.7); this crate models a
/// unidirectional stream, not a general POSIX file descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    Write,
    Append,
}

impl OpenMode {
    /// Parse a Python-`open`-style mode string. Accepts `"r"`, `"w"`,
    /// `"a"`, and the same with a `"b"` suffix (binary mode is the only
    /// mode this crate has, so the suffix is accepted and ignored).
    /// Anything naming more than one of read/write/append, or a `"+"`,
    /// is rejected.
    pub fn parse(mode: &str) -> Result<Self> {
        let core = mode.trim_end_matches('b');
        match core {
            "r" => Ok(Self::Read),
            "w" => Ok(Self::Write),
            "a" => Ok(Self::Append),
            _ => Err(OverlayError::UnknownMode(mode.to_string())),
        }
    }
}

/// The handle returned by `Overlay::open`. A tagged union rather than a
/// boxed trait object: each variant supports only the operations its
/// origin makes sense for, and attempting the wrong one is a logic error
/// surfaced as [`io::ErrorKind::Unsupported`] rather than a panic.
#[derive(Debug)]
pub enum OverlayFile {
    /// A read-only view onto shadow-entry content already in memory.
    Shadow(io::Cursor<Vec<u8>>),
    /// A write/append handle bound to an overlay path; commits a new
    /// [`ShadowEntry`] on close or drop.
    Stream(OverlayStream),
    /// A genuine handle onto the host filesystem, used for passthrough
    /// opens and for the read-miss fallback.
    Real(fs::File),
}

impl Read for OverlayFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Shadow(cur) => cur.read(buf),
            Self::Stream(_) => Err(io::Error::from(io::ErrorKind::Unsupported)),
            Self::Real(f) => f.read(buf),
        }
    }
}

impl Write for OverlayFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Shadow(_) => Err(io::Error::from(io::ErrorKind::Unsupported)),
            Self::Stream(s) => s.write(buf),
            Self::Real(f) => f.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Shadow(_) => Ok(()),
            Self::Stream(s) => s.flush(),
            Self::Real(f) => f.flush(),
        }
    }
}

/// An in-memory write/append stream bound to one overlay path. Commits a
/// regular [`ShadowEntry`] the first time it is closed, either explicitly
/// via [`OverlayStream::close`] or implicitly when dropped, the "scoped
/// release on all exit paths" the data model calls for (spec §3).
#[derive(Debug)]
pub struct OverlayStream {
    owner: Overlay,
    path: String,
    buffer: Vec<u8>,
    closed: bool,
}

impl OverlayStream {
    pub(crate) fn new(owner: Overlay, path: String, prepend: Vec<u8>) -> Self {
        Self {
            owner,
            path,
            buffer: prepend,
            closed: false,
        }
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.closed {
            return Err(io::Error::from(io::ErrorKind::BrokenPipe));
        }
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Commit the buffered content as a regular shadow entry and mark
    /// this stream closed. Calling it more than once is a no-op.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let content = std::mem::take(&mut self.buffer);
        self.owner.commit_stream(&self.path, content);
    }
}

impl Drop for OverlayStream {
    fn drop(&mut self) {
        self.close();
    }
}

impl Overlay {
    /// Open `path` in `mode` (spec §4.7).
    ///
    /// Resolution order: a matching passthru pattern always wins and
    /// delegates to the underlying backend unchanged; otherwise a write
    /// or append creates/continues a shadow entry, and a read consults
    /// the shadow store first, falling through to the underlying
    /// filesystem on a miss.
    pub fn open(&self, path: &str, mode: &str) -> Result<OverlayFile> {
        let mode = OpenMode::parse(mode)?;
        let full = self.deref(path, true)?;

        if self.matches_passthru(&full) {
            return self.underlying_backend().open_file(&full, mode);
        }

        match mode {
            OpenMode::Read => {
                let resolved = self.deref(path, false)?;
                self.open_for_read(&resolved)
            }
            OpenMode::Write => {
                let target = self.follow_write_target(full)?;
                self.check_parent_is_dir(&target)?;
                if matches!(self.raw_lstat(&target), Ok(st) if st.is_dir()) {
                    return Err(OverlayError::IsADirectory(target.into()));
                }
                Ok(OverlayFile::Stream(OverlayStream::new(
                    self.clone(),
                    target,
                    Vec::new(),
                )))
            }
            OpenMode::Append => {
                let target = self.follow_write_target(full)?;
                self.check_parent_is_dir(&target)?;
                if matches!(self.raw_lstat(&target), Ok(st) if st.is_dir()) {
                    return Err(OverlayError::IsADirectory(target.into()));
                }
                let prepend = match self.open_for_read(&target) {
                    Ok(OverlayFile::Shadow(mut cur)) => {
                        let mut buf = Vec::new();
                        cur.read_to_end(&mut buf)?;
                        buf
                    }
                    Ok(OverlayFile::Real(mut f)) => {
                        let mut buf = Vec::new();
                        f.read_to_end(&mut buf)?;
                        buf
                    }
                    Ok(OverlayFile::Stream(_)) => unreachable!("read never returns a Stream"),
                    Err(OverlayError::NotFound(_)) => Vec::new(),
                    Err(e) => return Err(e),
                };
                Ok(OverlayFile::Stream(OverlayStream::new(
                    self.clone(),
                    target,
                    prepend,
                )))
            }
        }
    }

    /// Follow a chain of final-component symlinks the way a write/append
    /// open does: keep substituting `dirname(path) / readlink(path)` as
    /// long as the current path is itself a symlink, stopping as soon as
    /// it isn't, even if that means the path doesn't exist yet (the write
    /// will land there and create it).
    fn follow_write_target(&self, mut full: String) -> Result<String> {
        for _ in 0..crate::resolve::MAX_SYMLINK_HOPS {
            match self.raw_lstat(&full) {
                Ok(st) if st.is_symlink() => {
                    let target = self.readlink(&full)?;
                    let composed = pathutil::join(&pathutil::dirname(&full), &target);
                    full = self.deref(&composed, true)?;
                }
                _ => return Ok(full),
            }
        }
        Err(OverlayError::SymlinkLoop(full.into()))
    }

    fn open_for_read(&self, path: &str) -> Result<OverlayFile> {
        if let Some(entry) = self.entry_at(path) {
            if entry.is_deleted() {
                return Err(OverlayError::NotFound(path.into()));
            }
            if entry.kind == crate::entry::EntryKind::Directory {
                return Err(OverlayError::IsADirectory(path.into()));
            }
            return Ok(OverlayFile::Shadow(io::Cursor::new(entry.content.clone())));
        }
        self.underlying_backend().open_file(path, OpenMode::Read)
    }

    /// Remove `path` (spec §4.7): records a tombstone if the path is (or
    /// was) visible, and errors `EISDIR` for a directory; `rmdir` is the
    /// correct operation for those.
    pub fn unlink(&self, path: &str) -> Result<()> {
        let full = self.deref(path, true)?;
        let st = self.raw_lstat(&full)?;
        if st.is_dir() {
            return Err(OverlayError::IsADirectory(full.into()));
        }
        self.add_shadow_entry(&full, ShadowEntry::deleted());
        Ok(())
    }

    /// Alias for [`Overlay::unlink`] (spec §6 lists both names).
    pub fn remove(&self, path: &str) -> Result<()> {
        self.unlink(path)
    }
}

impl Seek for OverlayFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            Self::Shadow(cur) => cur.seek(pos),
            Self::Stream(_) => Err(io::Error::from(io::ErrorKind::Unsupported)),
            Self::Real(f) => f.seek(pos),
        }
    }
}

// POSIX `open(2)` flag bits, Linux values, used only to translate an
// integer-flags call into the mode string `open()` understands.
pub const O_RDONLY: i32 = 0o0;
pub const O_WRONLY: i32 = 0o1;
pub const O_RDWR: i32 = 0o2;
pub const O_APPEND: i32 = 0o2000;

impl Overlay {
    /// Integer-descriptor counterpart to `open()` (spec §4.7), for code
    /// written against `os.open`-style flags rather than mode strings.
    ///
    /// Preserves a faithful quirk of the system this crate's overlay
    /// behavior is modeled on: `O_APPEND` does not select append mode.
    /// It only appends a `'b'` suffix to the derived mode string, same
    /// as any other flag combination would get. A flags value asking for
    /// append therefore opens in truncating write mode, same as a plain
    /// `O_WRONLY`. This is surprising but deliberate; callers that need
    /// real append semantics should use [`Overlay::open`] with `"a"`.
    pub fn os_open(&self, path: &str, flags: i32) -> Result<i32> {
        let base = match flags & (O_WRONLY | O_RDWR) {
            O_RDWR => return Err(OverlayError::UnknownMode(format!("flags={flags:#o}"))),
            O_WRONLY => "w",
            _ => "r",
        };
        let mode = if flags & O_APPEND != 0 {
            format!("{base}b")
        } else {
            base.to_string()
        };
        let file = self.open(path, &mode)?;
        Ok(self.register_descriptor(file))
    }

    /// Read up to `len` bytes from descriptor `fd` (spec §4.7).
    pub fn os_read(&self, fd: i32, len: usize) -> Result<Vec<u8>> {
        self.with_descriptor(fd, |file| {
            let mut buf = vec![0u8; len];
            let n = file.read(&mut buf).map_err(OverlayError::Io)?;
            buf.truncate(n);
            Ok(buf)
        })
    }

    /// Write `buf` to descriptor `fd`, returning the number of bytes
    /// accepted (spec §4.7).
    pub fn os_write(&self, fd: i32, buf: &[u8]) -> Result<usize> {
        self.with_descriptor(fd, |file| file.write(buf).map_err(OverlayError::Io))
    }

    /// Close descriptor `fd`, committing any buffered write (spec §4.7).
    pub fn os_close(&self, fd: i32) -> Result<()> {
        let file = self.take_descriptor(fd)?;
        drop(file);
        Ok(())
    }

    /// Wrap descriptor `fd` into an owned [`OverlayFile`] handle, the way
    /// `os.fdopen` hands a raw descriptor off to a higher-level file
    /// object (spec §6). Removes `fd` from the descriptor table; once
    /// fdopen'd, the returned handle (and its own `Drop`/commit
    /// behavior) is the only way to interact with that open file.
    pub fn os_fdopen(&self, fd: i32) -> Result<OverlayFile> {
        self.take_descriptor(fd)
    }
}
