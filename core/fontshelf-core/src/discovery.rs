//! Source file discovery for fontshelf-core (made by FontLab https://www.fontlab.com/)

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use log::debug;
use walkdir::WalkDir;

/// Directory levels below the target root searched for subtitles.
pub const SUBTITLE_DEPTH: usize = 4;

/// What a pipeline is looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// `ttf`, `otf`, `ttc`, `otc`.
    Font,
    /// `ass`, `ssa`.
    Subtitle,
}

impl SourceKind {
    pub fn matches(self, path: &Path) -> bool {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return false;
        };
        let ext = ext.to_ascii_lowercase();
        match self {
            SourceKind::Font => matches!(ext.as_str(), "ttf" | "otf" | "ttc" | "otc"),
            SourceKind::Subtitle => matches!(ext.as_str(), "ass" | "ssa"),
        }
    }
}

/// A discovered file and the root it was found under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRef {
    pub path: PathBuf,
    pub root: PathBuf,
}

impl SourceRef {
    /// Path below the root it was discovered in.
    pub fn relative(&self) -> &Path {
        self.path.strip_prefix(&self.root).unwrap_or(&self.path)
    }

    /// `relative()` with `/` separators, the form used in reports and force prefixes.
    pub fn relative_display(&self) -> String {
        self.relative()
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// Enumerates pipeline inputs from some backing store.
pub trait SourceDiscovery {
    fn discover(&self) -> Result<Vec<SourceRef>>;
}

/// Recursive filesystem walker, results sorted by path.
#[derive(Debug, Clone)]
pub struct PathDiscovery {
    roots: Vec<PathBuf>,
    kind: SourceKind,
    follow_symlinks: bool,
    max_depth: Option<usize>,
}

impl PathDiscovery {
    pub fn new<I, P>(roots: I, kind: SourceKind) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let roots = roots.into_iter().map(Into::into).collect();
        Self {
            roots,
            kind,
            follow_symlinks: false,
            max_depth: None,
        }
    }

    pub fn follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// Limit how many directory levels below each root are entered.
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }
}

impl SourceDiscovery for PathDiscovery {
    fn discover(&self) -> Result<Vec<SourceRef>> {
        let mut found = Vec::new();

        for root in &self.roots {
            if !root.exists() {
                return Err(anyhow!("root path does not exist: {}", root.display()));
            }

            let mut walker = WalkDir::new(root)
                .follow_links(self.follow_symlinks)
                .sort_by_file_name();
            if let Some(depth) = self.max_depth {
                // walkdir counts the file itself as one level
                walker = walker.max_depth(depth + 1);
            }

            for entry in walker {
                let entry = entry?;
                if !entry.file_type().is_file() {
                    continue;
                }
                if self.kind.matches(entry.path()) {
                    found.push(SourceRef {
                        path: entry.path().to_path_buf(),
                        root: root.clone(),
                    });
                } else {
                    debug!("skipped {}", entry.path().display());
                }
            }
        }

        found.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(found)
    }
}
