//! End-to-end scenarios against a real temporary directory, exercising
//! the overlay the way a test harness actually would: scoped-installed,
//! doing real filesystem-shaped work, then checking the host filesystem
//! was never touched once the guard drops.

use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use repoverlay::Overlay;
use tempfile::TempDir;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn under(dir: &TempDir, name: &str) -> String {
    dir.path().join(name).to_string_lossy().into_owned()
}

#[test]
fn scenario_1_created_file_vanishes_after_exit() {
    init_logging();
    let tmp = TempDir::new().unwrap();
    let x = under(&tmp, "X");

    let overlay = Overlay::new();
    {
        let _guard = overlay.scoped().unwrap();
        {
            let mut f = overlay.open(&x, "w").unwrap();
            f.write_all(b"abc").unwrap();
        }
        let mut f = overlay.open(&x, "r").unwrap();
        let mut buf = String::new();
        f.read_to_string(&mut buf).unwrap();
        assert_eq!(buf, "abc");
    }

    assert!(!overlay.exists(&x));
    assert!(!Path::new(&x).exists());
}

#[test]
fn scenario_2_append_is_isolated_from_the_real_file() {
    init_logging();
    let tmp = TempDir::new().unwrap();
    let y = under(&tmp, "Y");
    fs::write(&y, "hello").unwrap();

    let overlay = Overlay::new();
    {
        let _guard = overlay.scoped().unwrap();
        {
            let mut f = overlay.open(&y, "a").unwrap();
            f.write_all(b" world").unwrap();
        }
        let mut f = overlay.open(&y, "r").unwrap();
        let mut buf = String::new();
        f.read_to_string(&mut buf).unwrap();
        assert_eq!(buf, "hello world");
    }

    assert_eq!(fs::read_to_string(&y).unwrap(), "hello");
}

#[test]
fn scenario_3_unlink_is_isolated_from_the_real_file() {
    init_logging();
    let tmp = TempDir::new().unwrap();
    let z = under(&tmp, "Z");
    fs::write(&z, "z").unwrap();

    let overlay = Overlay::new();
    {
        let _guard = overlay.scoped().unwrap();
        overlay.unlink(&z).unwrap();
        assert!(!overlay.exists(&z));
    }

    assert!(Path::new(&z).exists());
}

#[test]
fn scenario_4_directory_and_symlink_operations() {
    init_logging();
    let tmp = TempDir::new().unwrap();
    let d = under(&tmp, "d");
    let l = format!("{d}/l");

    let overlay = Overlay::new();
    let _guard = overlay.scoped().unwrap();

    overlay.mkdir(&d).unwrap();
    let err = overlay.mkdir(&d).unwrap_err();
    assert!(matches!(err, repoverlay::OverlayError::Exists(_)));

    overlay.symlink("target", &l).unwrap();
    assert_eq!(overlay.readlink(&l).unwrap(), "target");
    assert_eq!(overlay.listdir(&d).unwrap(), vec!["l"]);

    let changes = overlay.changes();
    assert!(changes.contains(&format!("add:{d}")));
    assert!(changes.contains(&format!("add:{l}")));
}

#[test]
fn scenario_5_passthru_bypasses_shadowing_selectively() {
    init_logging();
    let tmp = TempDir::new().unwrap();
    let keep = under(&tmp, "keep1");
    let drop_ = under(&tmp, "drop1");

    let overlay = Overlay::with_passthru([".*keep.*"]).unwrap();
    {
        let _guard = overlay.scoped().unwrap();
        {
            let mut f = overlay.open(&keep, "w").unwrap();
            f.write_all(b"K").unwrap();
        }
        {
            let mut f = overlay.open(&drop_, "w").unwrap();
            f.write_all(b"D").unwrap();
        }
    }

    assert!(Path::new(&keep).exists());
    assert_eq!(fs::read_to_string(&keep).unwrap(), "K");
    assert!(!Path::new(&drop_).exists());
}

#[test]
fn scenario_6_nested_overlays_compose() {
    init_logging();
    let tmp = TempDir::new().unwrap();
    let a = under(&tmp, "a");

    let outer = Overlay::new();
    let outer_guard = outer.scoped().unwrap();
    outer.open(&a, "w").unwrap();
    assert!(outer.exists(&a));

    let inner = Overlay::nested_in(&outer);
    {
        let _inner_guard = inner.scoped().unwrap();
        inner.unlink(&a).unwrap();
        assert!(!inner.exists(&a));
    }

    // inner exited: outer still sees its own creation.
    assert!(outer.exists(&a));

    drop(outer_guard);
    // outer exited: nothing was ever written to the real filesystem.
    assert!(!Path::new(&a).exists());
}
