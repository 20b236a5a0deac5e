//! The POSIX-flavored error taxonomy shared by every overlay operation.

use std::io;
use std::path::PathBuf;

/// Errors produced by overlay operations.
///
/// Every variant corresponds to the POSIX error code that the equivalent
/// real filesystem call would raise (see spec §7/§4.8), except
/// [`OverlayError::UnknownMode`], [`OverlayError::StateCollision`], and
/// [`OverlayError::OrderViolation`], which are programmer-error conditions
/// with no POSIX analogue.
#[derive(Debug, thiserror::Error)]
pub enum OverlayError {
    /// ENOENT: the path (or a required component of it) does not exist.
    #[error("no such file or directory: {0}")]
    NotFound(PathBuf),

    /// EEXIST: an entry already occupies the requested name.
    #[error("file exists: {0}")]
    Exists(PathBuf),

    /// ENOTDIR: a path component required to be a directory was not one.
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),

    /// EISDIR: an operation that requires a non-directory was given one.
    #[error("is a directory: {0}")]
    IsADirectory(PathBuf),

    /// ENOTEMPTY: `rmdir` was called on a directory that still has entries.
    #[error("directory not empty: {0}")]
    NotEmpty(PathBuf),

    /// EINVAL: e.g. `readlink` on something that is not a symlink.
    #[error("invalid argument: {0}")]
    InvalidArgument(PathBuf),

    /// An `open` mode string combined incompatible flags (e.g. both read
    /// and write, or a `+`) or named none of read/write/append. Indicates
    /// programmer error, not a filesystem condition.
    #[error("unknown or unsupported open mode: {0:?}")]
    UnknownMode(String),

    /// `install()` found the overlay already installed but displaced by a
    /// foreign installer occupying the backend slot.
    #[error("overlay install collision: already installed by another handler")]
    StateCollision,

    /// `uninstall()` found the overlay installed but no longer active
    /// (some other overlay has been layered on top without being popped
    /// first).
    #[error("overlay uninstall order violation: overlay is not the active handler")]
    OrderViolation,

    /// Symlink resolution exceeded [`crate::resolve::MAX_SYMLINK_HOPS`]
    /// hops. The source makes no such promise (see spec §4.2's open
    /// question); this crate bounds it rather than recursing forever.
    #[error("too many levels of symbolic links: {0}")]
    SymlinkLoop(PathBuf),

    /// A descriptor passed to one of the `os_*` functions was never opened
    /// through this overlay and does not belong to any known backend.
    #[error("bad file descriptor: {0}")]
    BadDescriptor(i32),

    /// An I/O failure surfaced unchanged from the underlying filesystem.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, OverlayError>;

impl OverlayError {
    /// The [`io::ErrorKind`] a caller treating this as an I/O error should
    /// see. `UnknownMode`, `StateCollision`, `OrderViolation`, and
    /// `BadDescriptor` have no POSIX analogue and map to
    /// [`io::ErrorKind::Other`] / [`io::ErrorKind::InvalidInput`].
    #[must_use]
    pub fn kind(&self) -> io::ErrorKind {
        match self {
            Self::NotFound(_) => io::ErrorKind::NotFound,
            Self::Exists(_) => io::ErrorKind::AlreadyExists,
            Self::NotADirectory(_) | Self::IsADirectory(_) => io::ErrorKind::InvalidInput,
            Self::NotEmpty(_) => io::ErrorKind::Other,
            Self::InvalidArgument(_) | Self::UnknownMode(_) | Self::BadDescriptor(_) => {
                io::ErrorKind::InvalidInput
            }
            Self::SymlinkLoop(_) => io::ErrorKind::FilesystemLoop,
            Self::StateCollision | Self::OrderViolation => io::ErrorKind::Other,
            Self::Io(e) => e.kind(),
        }
    }
}

impl From<OverlayError> for io::Error {
    fn from(err: OverlayError) -> Self {
        let kind = err.kind();
        io::Error::new(kind, err)
    }
}
