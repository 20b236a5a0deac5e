//! Overlay Lifecycle & Change Log (spec §2/§4.1): `install`/`uninstall`/
//! `active`, scoped RAII acquisition, the explicit overlay stack, and the
//! change-log introspection surface.

use std::rc::Rc;

use crate::backend::{BackendId, FsBackend};
use crate::error::{OverlayError, Result};
use crate::overlay::Overlay;

impl Overlay {
    /// Make this overlay the active handler for its backend slot,
    /// capturing whatever currently occupies it as `underlying`.
    ///
    /// Idempotent: calling `install()` again while already active is a
    /// no-op. For a standalone overlay (the common case, no
    /// [`Overlay::nested_in`] sharing involved) this is unconditionally
    /// safe, since nothing else can ever occupy its private slot.
    pub fn install(&self) -> Result<()> {
        let mut inner = self.0.borrow_mut();
        if inner.installed {
            let occupant = inner.slot.borrow().backend_id();
            if occupant != BackendId::Overlay(inner.id) {
                return Err(OverlayError::StateCollision);
            }
            return Ok(());
        }
        let captured = inner.slot.borrow().clone();
        inner.underlying = captured;
        inner.installed = true;
        let as_backend: Rc<dyn FsBackend> = Rc::new(self.clone());
        *inner.slot.borrow_mut() = as_backend;
        Ok(())
    }

    /// `true` iff this overlay is both installed and still the current
    /// occupant of its backend slot; `false` if some other overlay has
    /// since been installed on top of it without being uninstalled
    /// first.
    #[must_use]
    pub fn active(&self) -> bool {
        let inner = self.0.borrow();
        inner.installed && inner.slot.borrow().backend_id() == BackendId::Overlay(inner.id)
    }

    /// Restore whatever this overlay displaced at install time, and move
    /// its entries into the vaporized snapshot (spec §4.1).
    ///
    /// A no-op if never installed. Fails [`OverlayError::OrderViolation`]
    /// if installed but displaced by something still on top of it (a
    /// nested overlay that was never popped).
    pub fn uninstall(&self) -> Result<()> {
        {
            let inner = self.0.borrow();
            if !inner.installed {
                return Ok(());
            }
            let occupant = inner.slot.borrow().backend_id();
            if occupant != BackendId::Overlay(inner.id) {
                return Err(OverlayError::OrderViolation);
            }
        }
        // Take the descriptor table out from behind the RefCell before
        // dropping it: an open write/append stream commits into
        // `entries` on drop, which re-borrows this same overlay, and
        // that borrow must not land while we're still holding one here.
        let descriptors = {
            let mut inner = self.0.borrow_mut();
            std::mem::take(&mut inner.descriptors)
        };
        drop(descriptors);

        let mut inner = self.0.borrow_mut();
        let snapshot = inner.entries.take();
        inner.vaporized = Some(snapshot);
        *inner.slot.borrow_mut() = inner.underlying.clone();
        inner.installed = false;
        Ok(())
    }

    /// Install this overlay and return a guard that uninstalls it when
    /// dropped, the scoped-acquisition pattern the data model calls for
    /// (spec §3/§6).
    pub fn scoped(&self) -> Result<OverlayGuard> {
        self.install()?;
        Ok(OverlayGuard {
            overlay: self.clone(),
        })
    }

    /// The `tag:path` change-log lines for every path currently shadowed,
    /// sorted by path (spec §4.1/§6).
    #[must_use]
    pub fn changes(&self) -> Vec<String> {
        self.0.borrow().entries.changes()
    }

    /// As [`Overlay::changes`], but restricted to paths under `root`.
    /// Returns `None` if `root` itself carries no shadow entry and
    /// `recurse` is `false`: there is nothing to report one directory at
    /// a time when the directory itself was never touched (spec §9).
    ///
    /// When `relative` is set, each line's path has the `root/` prefix
    /// stripped, while the `tag:` prefix is kept intact.
    #[must_use]
    pub fn changes_under(&self, root: &str, recurse: bool, relative: bool) -> Option<Vec<String>> {
        let inner = self.0.borrow();
        if !recurse && !inner.entries.contains(root) {
            return None;
        }
        Some(inner.entries.changes_under(root, recurse, relative))
    }

    /// The change-log lines captured at the most recent `uninstall()`,
    /// or `None` if this overlay has never been uninstalled.
    #[must_use]
    pub fn vaporized_changes(&self) -> Option<Vec<String>> {
        self.0.borrow().vaporized.as_ref().map(|s| s.changes())
    }
}

/// RAII handle returned by [`Overlay::scoped`]: uninstalls the overlay
/// when dropped, on every exit path including an unwinding panic.
pub struct OverlayGuard {
    overlay: Overlay,
}

impl OverlayGuard {
    /// The overlay this guard is holding installed.
    #[must_use]
    pub fn overlay(&self) -> &Overlay {
        &self.overlay
    }
}

impl Drop for OverlayGuard {
    fn drop(&mut self) {
        if let Err(e) = self.overlay.uninstall() {
            log::warn!("overlay guard drop: uninstall failed: {e}");
        }
    }
}

/// An explicit, LIFO stack of nested overlays sharing one backend slot.
///
/// The source keeps this as global, implicit state; per the design
/// notes this crate prefers an object the caller threads through
/// explicitly rather than a hidden thread-local (spec §9).
#[derive(Default)]
pub struct OverlayStack {
    frames: Vec<Overlay>,
}

impl OverlayStack {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Push and install a new overlay nested inside the current top (or
    /// reading straight through to the real filesystem, if the stack is
    /// empty), returning a clone of it.
    pub fn push(&mut self) -> Result<Overlay> {
        let next = match self.frames.last() {
            Some(top) => Overlay::nested_in(top),
            None => Overlay::new(),
        };
        next.install()?;
        self.frames.push(next.clone());
        Ok(next)
    }

    /// Uninstall and pop the top overlay. Fails
    /// [`OverlayError::OrderViolation`] if the stack is empty.
    pub fn pop(&mut self) -> Result<Overlay> {
        let top = self.frames.pop().ok_or(OverlayError::OrderViolation)?;
        top.uninstall()?;
        Ok(top)
    }

    /// A clone of the currently active (innermost) overlay, if any.
    #[must_use]
    pub fn peek(&self) -> Option<Overlay> {
        self.frames.last().cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_twice_is_idempotent() {
        let ov = Overlay::new();
        ov.install().unwrap();
        ov.install().unwrap();
        assert!(ov.active());
        ov.uninstall().unwrap();
    }

    #[test]
    fn uninstall_without_install_is_a_no_op() {
        let ov = Overlay::new();
        ov.uninstall().unwrap();
        assert!(ov.vaporized_changes().is_none());
    }

    #[test]
    fn install_then_uninstall_with_no_ops_yields_empty_vaporized() {
        let ov = Overlay::new();
        ov.install().unwrap();
        ov.uninstall().unwrap();
        assert_eq!(ov.vaporized_changes(), Some(Vec::new()));
    }

    #[test]
    fn scoped_guard_uninstalls_on_drop() {
        let ov = Overlay::new();
        {
            let _guard = ov.scoped().unwrap();
            assert!(ov.active());
        }
        assert!(!ov.active());
    }

    #[test]
    fn nested_install_then_uninstall_out_of_order_is_order_violation() {
        let outer = Overlay::new();
        outer.install().unwrap();
        let inner = Overlay::nested_in(&outer);
        inner.install().unwrap();
        let err = outer.uninstall().unwrap_err();
        assert!(matches!(err, OverlayError::OrderViolation));
        inner.uninstall().unwrap();
        outer.uninstall().unwrap();
    }

    #[test]
    fn install_while_displaced_by_foreign_installer_is_state_collision() {
        let outer = Overlay::new();
        outer.install().unwrap();
        let inner = Overlay::nested_in(&outer);
        inner.install().unwrap();
        let err = outer.install().unwrap_err();
        assert!(matches!(err, OverlayError::StateCollision));
        inner.uninstall().unwrap();
        outer.uninstall().unwrap();
    }

    #[test]
    fn stack_push_pop_is_lifo() {
        let mut stack = OverlayStack::new();
        let a = stack.push().unwrap();
        let b = stack.push().unwrap();
        assert!(!a.active());
        assert!(b.active());
        stack.pop().unwrap();
        stack.pop().unwrap();
        assert!(stack.is_empty());
    }
}
