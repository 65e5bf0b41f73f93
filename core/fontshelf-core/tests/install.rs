#![cfg(unix)]

mod common;

use std::fs;
use std::path::{Path, PathBuf};

use common::face;
use fontshelf_core::catalog::{build_catalog, BuildOptions};
use fontshelf_core::install::{install, plan_install, InstallOptions, SubtitleOutcome};
use fontshelf_core::link::NativeLinks;
use fontshelf_core::resolve::LinkMode;
use tempfile::{tempdir, TempDir};

const SCRIPT: &str = "[Script Info]\r\nTitle: test\r\n\r\n[V4+ Styles]\r\nFormat: Name, Fontname, Fontsize, Bold, Italic\r\nStyle: Default,Kai,20,0,0\r\nStyle: Title,@Song,30,-1,0\r\n\r\n[Events]\r\nFormat: Layer, Start, End, Style, Text\r\nDialogue: 0,0:00:00.00,0:00:01.00,Default,{\\fnGhost}Hello, there\r\nDialogue: 0,0:00:01.00,0:00:02.00,Title,{\\i1}Hi\r\n";

struct Fixture {
    _tmp: TempDir,
    storage: PathBuf,
    target: PathBuf,
}

fn write(path: &Path, bytes: &[u8]) {
    fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
    fs::write(path, bytes).expect("write");
}

fn fixture() -> Fixture {
    let tmp = tempdir().expect("tempdir");
    let root = tmp.path().canonicalize().expect("canonical tmp");
    let source = root.join("source");
    let storage = root.join("storage");
    let target = root.join("anime");

    write(&source.join("Kai.ttf"), &face("Kai", "Regular", "1.0"));
    write(&source.join("Song.ttf"), &face("Song", "Regular", "1.0"));
    write(&source.join("SongBold.ttf"), &face("Song", "Bold", "1.0"));
    build_catalog(&source, &BuildOptions::new(&storage)).expect("build");

    write(&target.join("show/ep1.ass"), SCRIPT.as_bytes());
    write(&target.join("show/s2/ep2.ass"), SCRIPT.as_bytes());

    Fixture {
        _tmp: tmp,
        storage,
        target,
    }
}

#[test]
fn installs_links_and_collects_missing_fonts() {
    let fx = fixture();
    let opts = InstallOptions::new(&fx.storage);

    let report = install(&fx.target, &opts, &NativeLinks).expect("install");
    assert_eq!(report.failed(), 0);
    assert_eq!(report.tasks.len(), 4);

    let kai = fx.target.join("show/fonts/Kai.Regular.ttf");
    assert_eq!(fs::read_link(&kai).unwrap(), fx.storage.join("Kai/Regular.ttf"));
    let song = fx.target.join("show/s2/fonts/Song.Bold.ttf");
    assert_eq!(fs::read_link(&song).unwrap(), fx.storage.join("Song/Bold.ttf"));

    assert_eq!(report.missing.keys().collect::<Vec<_>>(), vec!["Ghost -- __"]);
    assert_eq!(
        report.missing.files("Ghost -- __").unwrap(),
        ["show/ep1.ass".to_string(), "show/s2/ep2.ass".to_string()]
    );

    let links = report.links.expect("link summary");
    assert_eq!((links.created, links.failed), (4, 0));
}

#[test]
fn second_run_changes_nothing() {
    let fx = fixture();
    let opts = InstallOptions::new(&fx.storage);

    let first = install(&fx.target, &opts, &NativeLinks).expect("first");
    let second = install(&fx.target, &opts, &NativeLinks).expect("second");

    let links = second.links.expect("link summary");
    assert_eq!(links.mutations(), 0);
    assert_eq!(links.unchanged, 4);
    assert_eq!(first.missing, second.missing);
    assert_eq!(first.tasks, second.tasks);
}

#[test]
fn dry_run_touches_nothing() {
    let fx = fixture();
    let opts = InstallOptions {
        dry_run: true,
        ..InstallOptions::new(&fx.storage)
    };

    let report = install(&fx.target, &opts, &NativeLinks).expect("dry run");
    assert_eq!(report.tasks.len(), 4);
    assert!(report.links.is_none());
    assert!(!fx.target.join("show/fonts").exists());
}

#[test]
fn relative_links_resolve_to_stored_faces() {
    let fx = fixture();
    let opts = InstallOptions {
        link_mode: LinkMode::Relative,
        ..InstallOptions::new(&fx.storage)
    };

    install(&fx.target, &opts, &NativeLinks).expect("install");
    let link = fx.target.join("show/fonts/Kai.Regular.ttf");
    let dest = fs::read_link(&link).unwrap();
    assert!(dest.is_relative(), "{}", dest.display());
    assert_eq!(
        fs::read(&link).unwrap(),
        fs::read(fx.storage.join("Kai/Regular.ttf")).unwrap()
    );
}

#[test]
fn broken_subtitles_are_isolated_unless_fail_fast() {
    let fx = fixture();
    write(&fx.target.join("bad.ass"), b"[Events]\nDialogue: nothing here\n");
    write(&fx.target.join("show/ignored.ass"), b"[Script Info]\n[V4+ Styles]\nFormat: Name, Fontname, Bold, Italic\nStyle: Default,Ghost,0,0\n");

    let opts = InstallOptions {
        dry_run: true,
        ignored_fonts: ["Ghost".to_string()].into_iter().collect(),
        ..InstallOptions::new(&fx.storage)
    };
    let report = plan_install(&fx.target, &opts).expect("plan");
    assert_eq!(report.failed(), 1);
    assert_eq!(report.skipped(), 1);
    assert!(report.missing.is_empty());
    assert!(matches!(
        report.subtitles[0].outcome,
        SubtitleOutcome::Failed { ref reason } if reason.contains("Script Info")
    ));

    let strict = InstallOptions {
        fail_fast: true,
        ..opts
    };
    assert!(plan_install(&fx.target, &strict).is_err());
}
