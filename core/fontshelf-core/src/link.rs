//! Idempotent link installation (made by FontLab https://www.fontlab.com/)

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{error, info, warn};
use serde::Serialize;

use crate::error::{ShelfError, ShelfResult};
use crate::resolve::InstallTasks;

/// How links are read and made on this platform.
pub trait LinkCapability {
    fn read_link(&self, link: &Path) -> io::Result<PathBuf>;
    fn create_link(&self, source: &Path, link: &Path) -> io::Result<()>;
}

/// Symbolic links through the standard library.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeLinks;

impl LinkCapability for NativeLinks {
    fn read_link(&self, link: &Path) -> io::Result<PathBuf> {
        fs::read_link(link)
    }

    #[cfg(unix)]
    fn create_link(&self, source: &Path, link: &Path) -> io::Result<()> {
        std::os::unix::fs::symlink(source, link)
    }

    #[cfg(windows)]
    fn create_link(&self, source: &Path, link: &Path) -> io::Result<()> {
        std::os::windows::fs::symlink_file(source, link)
    }

    #[cfg(not(any(unix, windows)))]
    fn create_link(&self, _source: &Path, link: &Path) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            format!("symbolic links are not available here: {}", link.display()),
        ))
    }
}

/// The capability for the running platform, picked once per run.
pub fn platform_links() -> Box<dyn LinkCapability> {
    Box::new(NativeLinks)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOutcome {
    Created,
    Replaced { previous: PathBuf },
    Unchanged,
    /// A real file sits at the target; it is never touched.
    Blocked,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LinkSummary {
    pub created: usize,
    pub replaced: usize,
    pub unchanged: usize,
    pub blocked: usize,
    pub failed: usize,
}

impl LinkSummary {
    pub fn mutations(&self) -> usize {
        self.created + self.replaced
    }
}

/// Make `target` a link to `source`, doing nothing when it already is one.
pub fn materialize(links: &dyn LinkCapability, source: &Path, target: &Path) -> ShelfResult<LinkOutcome> {
    let link_error = |source: io::Error| ShelfError::Link {
        target: target.to_path_buf(),
        source,
    };

    match fs::symlink_metadata(target) {
        Ok(meta) if !meta.file_type().is_symlink() => {
            warn!("file is not link: {}", target.display());
            Ok(LinkOutcome::Blocked)
        }
        Ok(_) => {
            let current = links.read_link(target).map_err(link_error)?;
            if current == source {
                return Ok(LinkOutcome::Unchanged);
            }
            info!("removed old link to {}", current.display());
            fs::remove_file(target).map_err(link_error)?;
            links.create_link(source, target).map_err(link_error)?;
            Ok(LinkOutcome::Replaced { previous: current })
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            if let Some(dir) = target.parent() {
                fs::create_dir_all(dir).map_err(link_error)?;
            }
            links.create_link(source, target).map_err(link_error)?;
            Ok(LinkOutcome::Created)
        }
        Err(err) => Err(link_error(err)),
    }
}

/// Run every task; failures are logged and counted, never fatal.
pub fn materialize_all(links: &dyn LinkCapability, tasks: &InstallTasks) -> LinkSummary {
    let mut summary = LinkSummary::default();
    for (target, source) in tasks {
        match materialize(links, source, target) {
            Ok(LinkOutcome::Created) => {
                info!("installed {} => {}", target.display(), source.display());
                summary.created += 1;
            }
            Ok(LinkOutcome::Replaced { .. }) => {
                info!("installed {} => {}", target.display(), source.display());
                summary.replaced += 1;
            }
            Ok(LinkOutcome::Unchanged) => summary.unchanged += 1,
            Ok(LinkOutcome::Blocked) => summary.blocked += 1,
            Err(err) => {
                error!("{err}");
                summary.failed += 1;
            }
        }
    }
    summary
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::cell::Cell;
    use tempfile::tempdir;

    #[derive(Default)]
    struct CountingLinks {
        created: Cell<usize>,
    }

    impl LinkCapability for CountingLinks {
        fn read_link(&self, link: &Path) -> io::Result<PathBuf> {
            NativeLinks.read_link(link)
        }

        fn create_link(&self, source: &Path, link: &Path) -> io::Result<()> {
            self.created.set(self.created.get() + 1);
            NativeLinks.create_link(source, link)
        }
    }

    #[test]
    fn creates_missing_link_and_parent_dir() {
        let tmp = tempdir().expect("tempdir");
        let source = tmp.path().join("Kai.ttf");
        fs::write(&source, b"font").unwrap();
        let target = tmp.path().join("subs/fonts/Kai.ttf");

        let outcome = materialize(&NativeLinks, &source, &target).expect("link");
        assert_eq!(outcome, LinkOutcome::Created);
        assert_eq!(fs::read_link(&target).unwrap(), source);
    }

    #[test]
    fn existing_correct_link_is_left_alone() {
        let tmp = tempdir().expect("tempdir");
        let source = tmp.path().join("Kai.ttf");
        let target = tmp.path().join("link.ttf");
        std::os::unix::fs::symlink(&source, &target).unwrap();

        let links = CountingLinks::default();
        assert_eq!(materialize(&links, &source, &target).unwrap(), LinkOutcome::Unchanged);
        assert_eq!(links.created.get(), 0);
    }

    #[test]
    fn stale_and_dangling_links_are_replaced() {
        let tmp = tempdir().expect("tempdir");
        let old = tmp.path().join("gone.ttf");
        let source = tmp.path().join("Kai.ttf");
        let target = tmp.path().join("link.ttf");
        std::os::unix::fs::symlink(&old, &target).unwrap();

        let outcome = materialize(&NativeLinks, &source, &target).unwrap();
        assert_eq!(outcome, LinkOutcome::Replaced { previous: old });
        assert_eq!(fs::read_link(&target).unwrap(), source);
    }

    #[test]
    fn real_files_are_never_overwritten() {
        let tmp = tempdir().expect("tempdir");
        let target = tmp.path().join("real.ttf");
        fs::write(&target, b"keep me").unwrap();

        let outcome = materialize(&NativeLinks, Path::new("/elsewhere.ttf"), &target).unwrap();
        assert_eq!(outcome, LinkOutcome::Blocked);
        assert_eq!(fs::read(&target).unwrap(), b"keep me");
    }

    #[test]
    fn summary_counts_each_outcome() {
        let tmp = tempdir().expect("tempdir");
        let source = tmp.path().join("Kai.ttf");
        let blocked = tmp.path().join("blocked.ttf");
        fs::write(&blocked, b"x").unwrap();

        let mut tasks = InstallTasks::new();
        tasks.insert(tmp.path().join("fonts/a.ttf"), source.clone());
        tasks.insert(blocked, source.clone());

        let first = materialize_all(&NativeLinks, &tasks);
        assert_eq!((first.created, first.blocked, first.failed), (1, 1, 0));

        let second = materialize_all(&NativeLinks, &tasks);
        assert_eq!(second.mutations(), 0);
        assert_eq!(second.unchanged, 1);
    }
}
