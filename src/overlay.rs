//! The [`Overlay`] handle itself: construction, the shared interior
//! state, descriptor table, and the small helpers every other module
//! (`resolve`, `resolver`, `dirops`, `linkops`, `fileops`, `lifecycle`)
//! builds on.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use regex::Regex;

use crate::backend::{BackendId, FsBackend, RealFs};
use crate::entry::ShadowEntry;
use crate::error::Result;
use crate::fileops::OverlayFile;
use crate::store::ShadowStore;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// A shared, mutable "who currently occupies this interception point"
/// cell. Every [`Overlay`] gets a private one by default, making
/// `install`/`uninstall` trivially uncontested; [`Overlay::nested_in`]
/// shares the outer overlay's slot instead, so installing the inner
/// overlay genuinely displaces the outer one (spec §8 scenario 6).
pub(crate) type BackendSlot = Rc<RefCell<Rc<dyn FsBackend>>>;

pub(crate) struct OverlayInner {
    pub(crate) id: u64,
    pub(crate) entries: ShadowStore,
    pub(crate) installed: bool,
    pub(crate) underlying: Rc<dyn FsBackend>,
    pub(crate) vaporized: Option<ShadowStore>,
    pub(crate) descriptors: HashMap<i32, OverlayFile>,
    pub(crate) next_fd: i32,
    pub(crate) passthru: Vec<Regex>,
    pub(crate) slot: BackendSlot,
}

impl std::fmt::Debug for OverlayInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayInner")
            .field("id", &self.id)
            .field("installed", &self.installed)
            .field("passthru_patterns", &self.passthru.len())
            .finish_non_exhaustive()
    }
}

/// An in-process, copy-on-write virtual overlay over a host filesystem.
///
/// Cheaply [`Clone`]-able (an `Rc` handle around shared interior state),
/// and intentionally `!Send`/`!Sync`: this crate makes no attempt at
/// concurrency, matching the single-threaded model it is designed for.
/// The commonest usage is direct: construct one, call its methods, no
/// `install()` required. `install()`/`uninstall()` additionally model
/// the overlay's lifecycle as a backend hand-off, which only matters
/// when composing overlays (see [`Overlay::nested_in`]) or when reusing
/// one `Overlay` value across several independent shadowed sessions.
#[derive(Clone)]
pub struct Overlay(pub(crate) Rc<RefCell<OverlayInner>>);

impl std::fmt::Debug for Overlay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.borrow().fmt(f)
    }
}

impl Overlay {
    /// A fresh overlay with no passthru patterns, reading through to the
    /// real filesystem.
    #[must_use]
    pub fn new() -> Self {
        Self::with_compiled_passthru(Vec::new())
    }

    /// An overlay whose matching paths bypass shadowing entirely and
    /// delegate straight to the underlying backend (spec §4.7/§6).
    pub fn with_passthru<I, S>(patterns: I) -> std::result::Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let compiled = patterns
            .into_iter()
            .map(|p| Regex::new(p.as_ref()))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self::with_compiled_passthru(compiled))
    }

    /// As [`Overlay::with_passthru`], but for already-compiled patterns.
    #[must_use]
    pub fn with_compiled_passthru(patterns: Vec<Regex>) -> Self {
        let real: Rc<dyn FsBackend> = Rc::new(RealFs);
        let slot: BackendSlot = Rc::new(RefCell::new(real.clone()));
        Self(Rc::new(RefCell::new(OverlayInner {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            entries: ShadowStore::new(),
            installed: false,
            underlying: real,
            vaporized: None,
            descriptors: HashMap::new(),
            next_fd: 1_000_000,
            passthru: patterns,
            slot,
        })))
    }

    /// A new overlay that shares `outer`'s backend slot, so that
    /// installing this overlay displaces `outer` as the active handler,
    /// and `outer` becomes this overlay's `underlying` once installed
    /// (spec §8 scenario 6).
    #[must_use]
    pub fn nested_in(outer: &Overlay) -> Self {
        let shared_slot = outer.0.borrow().slot.clone();
        let real: Rc<dyn FsBackend> = Rc::new(RealFs);
        Self(Rc::new(RefCell::new(OverlayInner {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            entries: ShadowStore::new(),
            installed: false,
            underlying: real,
            vaporized: None,
            descriptors: HashMap::new(),
            next_fd: 1_000_000,
            passthru: Vec::new(),
            slot: shared_slot,
        })))
    }

    pub(crate) fn underlying_backend(&self) -> Rc<dyn FsBackend> {
        self.0.borrow().underlying.clone()
    }

    pub(crate) fn entry_at(&self, path: &str) -> Option<ShadowEntry> {
        self.0.borrow().entries.get(path).cloned()
    }

    pub(crate) fn add_shadow_entry(&self, path: &str, entry: ShadowEntry) {
        let backend = self.underlying_backend();
        self.0.borrow_mut().entries.add_entry(path, entry, &*backend);
    }

    pub(crate) fn commit_stream(&self, path: &str, content: Vec<u8>) {
        self.add_shadow_entry(path, ShadowEntry::regular(content));
    }

    pub(crate) fn merge_listing(&self, dir: &str, base: Vec<String>) -> Vec<String> {
        self.0.borrow().entries.merge_listing(dir, base)
    }

    pub(crate) fn matches_passthru(&self, path: &str) -> bool {
        self.0.borrow().passthru.iter().any(|re| re.is_match(path))
    }

    pub(crate) fn register_descriptor(&self, file: OverlayFile) -> i32 {
        let mut inner = self.0.borrow_mut();
        let fd = inner.next_fd;
        inner.next_fd += 1;
        inner.descriptors.insert(fd, file);
        fd
    }

    pub(crate) fn with_descriptor<T>(
        &self,
        fd: i32,
        f: impl FnOnce(&mut OverlayFile) -> Result<T>,
    ) -> Result<T> {
        let mut inner = self.0.borrow_mut();
        let file = inner
            .descriptors
            .get_mut(&fd)
            .ok_or(crate::error::OverlayError::BadDescriptor(fd))?;
        f(file)
    }

    pub(crate) fn take_descriptor(&self, fd: i32) -> Result<OverlayFile> {
        self.0
            .borrow_mut()
            .descriptors
            .remove(&fd)
            .ok_or(crate::error::OverlayError::BadDescriptor(fd))
    }
}

impl Default for Overlay {
    fn default() -> Self {
        Self::new()
    }
}

impl FsBackend for Overlay {
    fn backend_id(&self) -> BackendId {
        BackendId::Overlay(self.0.borrow().id)
    }

    fn lstat(&self, path: &str) -> Result<crate::stat::Stat> {
        Overlay::lstat(self, path)
    }

    fn stat(&self, path: &str) -> Result<crate::stat::Stat> {
        Overlay::stat(self, path)
    }

    fn listdir(&self, path: &str) -> Result<Vec<String>> {
        Overlay::listdir(self, path)
    }

    fn readlink(&self, path: &str) -> Result<String> {
        Overlay::readlink(self, path)
    }

    fn open_file(&self, path: &str, mode: crate::fileops::OpenMode) -> Result<OverlayFile> {
        let mode_str = match mode {
            crate::fileops::OpenMode::Read => "r",
            crate::fileops::OpenMode::Write => "w",
            crate::fileops::OpenMode::Append => "a",
        };
        Overlay::open(self, path, mode_str)
    }
}
