//! An in-process, copy-on-write virtual overlay over a host filesystem.
//!
//! [`Overlay`] intercepts filesystem-mutating calls (`mkdir`, `open`
//! for write/append, `unlink`, `symlink`, `rmdir`, `rmtree`) and routes
//! them into an in-memory shadow store instead of the real filesystem.
//! Reads see the union of the shadow store and the real filesystem, with
//! the overlay winning on conflicts. Nothing is ever written to disk,
//! and there is no cleanup step beyond dropping the `Overlay` (or, for
//! the scoped/install form, calling `uninstall()`), which is exactly why
//! it exists: fast, isolated filesystem tests with no temp-directory
//! teardown to get wrong.
//!
//! ```
//! use repoverlay::Overlay;
//!
//! let overlay = Overlay::new();
//! overlay.mkdir("/scratch").unwrap();
//! {
//!     use std::io::Write;
//!     let mut f = overlay.open("/scratch/greeting", "w").unwrap();
//!     f.write_all(b"hello").unwrap();
//! }
//! assert!(overlay.exists("/scratch/greeting"));
//! assert_eq!(overlay.changes(), vec!["add:/scratch", "add:/scratch/greeting"]);
//! ```
//!
//! This crate is deliberately single-threaded: [`Overlay`] is built on
//! `Rc`, not `Arc`, and is neither `Send` nor `Sync`. Concurrent access
//! to one overlay from multiple threads is not a supported use case; see
//! the lifecycle module for the install/uninstall/nesting model this
//! implies.

mod backend;
mod dirops;
mod entry;
mod error;
mod fileops;
mod lifecycle;
mod linkops;
mod overlay;
mod pathutil;
mod resolve;
mod resolver;
mod stat;
mod store;

pub use backend::{BackendId, FsBackend, RealFs};
pub use entry::EntryKind;
pub use error::{OverlayError, Result};
pub use fileops::{OpenMode, OverlayFile, OverlayStream};
pub use lifecycle::{OverlayGuard, OverlayStack};
pub use overlay::Overlay;
pub use resolve::MAX_SYMLINK_HOPS;
pub use stat::{Stat, R_OK, W_OK, X_OK};
