//! Catalog build pipeline (made by FontLab https://www.fontlab.com/)
//!
//! Source fonts are unpacked, identified, arbitrated against what storage
//! already holds, written under `storage/<family>/<subfamily>.<ext>` with a
//! JSON sidecar, and registered in the index. Each source file then moves to
//! a `.done` or `.fail` bucket next to the source root.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use log::{error, info, warn};
use read_fonts::FontRef;
use serde::Serialize;

use crate::container::unpack_collection;
use crate::discovery::{PathDiscovery, SourceDiscovery, SourceKind, SourceRef};
use crate::error::ShelfError;
use crate::identity::{FontIdentity, FontNames, VERSION};
use crate::output::write_json_pretty;
use crate::store::{IndexStore, INDEX_FILE_NAME};
use crate::version::{arbitrate, Verdict};

/// Sidecar extension next to every stored face.
pub const SIDECAR_EXT: &str = "json";

/// Source-relative prefix that forces overwrite when nothing else is configured.
pub const DEFAULT_FORCE_PREFIX: &str = "_reindex";

#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub storage: PathBuf,
    /// Overwrite regardless of version for every file.
    pub force_all: bool,
    /// Source-relative path prefixes that overwrite regardless of version.
    pub force_prefixes: Vec<String>,
    /// Move processed sources into the `.done` / `.fail` buckets.
    pub move_sources: bool,
}

impl BuildOptions {
    pub fn new(storage: impl Into<PathBuf>) -> Self {
        Self {
            storage: storage.into(),
            force_all: false,
            force_prefixes: vec![DEFAULT_FORCE_PREFIX.to_string()],
            move_sources: true,
        }
    }

    fn forces(&self, relative: &str) -> bool {
        self.force_all
            || self
                .force_prefixes
                .iter()
                .any(|prefix| relative.starts_with(prefix.as_str()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SourceOutcome {
    /// Every face went through; `stored` of them were written to storage.
    Done { faces: usize, stored: usize },
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceReport {
    /// `/`-separated path below the source root.
    pub path: String,
    #[serde(flatten)]
    pub outcome: SourceOutcome,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildReport {
    pub sources: Vec<SourceReport>,
    pub families: usize,
}

impl BuildReport {
    pub fn failed(&self) -> usize {
        self.sources
            .iter()
            .filter(|s| matches!(s.outcome, SourceOutcome::Failed { .. }))
            .count()
    }

    pub fn faces_stored(&self) -> usize {
        self.sources
            .iter()
            .map(|s| match s.outcome {
                SourceOutcome::Done { stored, .. } => stored,
                SourceOutcome::Failed { .. } => 0,
            })
            .sum()
    }
}

/// Font storage plus its in-memory index.
#[derive(Debug)]
pub struct Catalog {
    storage: PathBuf,
    index: IndexStore,
}

impl Catalog {
    /// Load `storage/index.json`, or start empty.
    pub fn open(storage: impl Into<PathBuf>) -> Result<Self> {
        let storage = storage.into();
        let index = IndexStore::load(&storage.join(INDEX_FILE_NAME))?;
        Ok(Self { storage, index })
    }

    pub fn storage(&self) -> &Path {
        &self.storage
    }

    pub fn index(&self) -> &IndexStore {
        &self.index
    }

    pub fn index_mut(&mut self) -> &mut IndexStore {
        &mut self.index
    }

    pub fn save(&self) -> Result<()> {
        let path = self.storage.join(INDEX_FILE_NAME);
        info!("writing index to {}", path.display());
        self.index.save(&path)
    }

    /// Ingest every face of a source file's bytes.
    ///
    /// Stops at the first face that fails; faces before it stay stored.
    pub fn ingest_file(&mut self, data: &[u8], force: bool) -> Result<Vec<Verdict>> {
        let mut verdicts = Vec::new();
        let mut failure = None;

        let was_collection = unpack_collection(data, |index, face| {
            if failure.is_some() {
                return;
            }
            info!("unpacked #{index}");
            match self.ingest_face(&face, force) {
                Ok(verdict) => verdicts.push(verdict),
                Err(err) => failure = Some(err.context(format!("face #{index}"))),
            }
        })?;

        if let Some(err) = failure {
            return Err(err);
        }
        if !was_collection {
            verdicts.push(self.ingest_face(data, force)?);
        }
        Ok(verdicts)
    }

    /// Arbitrate one standalone face against storage, store it if it wins,
    /// and register it under every locale it declares.
    pub fn ingest_face(&mut self, data: &[u8], force: bool) -> Result<Verdict> {
        let font = FontRef::new(data).map_err(|err| ShelfError::Parse(err.to_string()))?;
        let identity = FontIdentity::from_names(FontNames::from_font(&font))?;

        let family_dir = path_component(&identity.family());
        let stem = path_component(&identity.subfamily());
        let dir = self.storage.join(&family_dir);
        let sidecar = dir.join(format!("{stem}.{SIDECAR_EXT}"));

        let existing = stored_version(&sidecar)?;
        let verdict = arbitrate(&identity.version(), existing.as_deref(), force)?;

        let ext = if verdict.installs() {
            let ext = face_extension(data);
            info!("=> store {}", dir.join(&stem).display());
            store_face(&dir, &stem, ext, data, identity.names())?;
            ext
        } else {
            stored_extension(&dir, &stem).unwrap_or_else(|| face_extension(data))
        };

        self.index
            .register_identity(&identity, &format!("{family_dir}/{stem}.{ext}"));
        Ok(verdict)
    }
}

/// Run the build pipeline over every font below `source_root`.
pub fn build_catalog(source_root: &Path, opts: &BuildOptions) -> Result<BuildReport> {
    let source_root = source_root
        .canonicalize()
        .with_context(|| format!("resolving source root {}", source_root.display()))?;
    let buckets = if opts.move_sources {
        Some((bucket_root(&source_root, "done")?, bucket_root(&source_root, "fail")?))
    } else {
        None
    };

    let mut catalog = Catalog::open(&opts.storage)?;
    let sources = PathDiscovery::new([&source_root], SourceKind::Font).discover()?;

    let mut report = BuildReport::default();
    for source in sources {
        let relative = source.relative_display();
        info!("processing: {relative}");

        let force = opts.forces(&relative);
        let result = fs::read(&source.path)
            .with_context(|| format!("reading {}", source.path.display()))
            .and_then(|data| catalog.ingest_file(&data, force));

        let outcome = match result {
            Ok(verdicts) => SourceOutcome::Done {
                faces: verdicts.len(),
                stored: verdicts.iter().filter(|v| v.installs()).count(),
            },
            Err(err) => {
                error!("{relative}: {err:#}");
                SourceOutcome::Failed {
                    reason: format!("{err:#}"),
                }
            }
        };

        if let Some((done, fail)) = &buckets {
            let bucket = match outcome {
                SourceOutcome::Done { .. } => done,
                SourceOutcome::Failed { .. } => fail,
            };
            if let Err(err) = move_into(&source, bucket) {
                error!("{err:#}");
            }
        }

        report.sources.push(SourceReport {
            path: relative,
            outcome,
        });
    }

    catalog.save()?;
    report.families = catalog.index().len();
    Ok(report)
}

/// Make a name safe as one path component; the index keeps the original.
pub fn path_component(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if cleaned.trim_matches('.').is_empty() {
        return "_".to_string();
    }
    cleaned
}

/// `otf` for CFF-flavoured faces, `ttf` for everything else.
pub fn face_extension(data: &[u8]) -> &'static str {
    if data.starts_with(b"OTTO") {
        "otf"
    } else {
        "ttf"
    }
}

/// `<source_root>.<suffix>`, a sibling of the source root.
pub fn bucket_root(source_root: &Path, suffix: &str) -> Result<PathBuf> {
    let name = source_root
        .file_name()
        .ok_or_else(|| anyhow!("source root {} has no name", source_root.display()))?;
    Ok(source_root.with_file_name(format!("{}.{suffix}", name.to_string_lossy())))
}

fn move_into(source: &SourceRef, bucket: &Path) -> Result<()> {
    let destination = bucket.join(source.relative());
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    fs::rename(&source.path, &destination).with_context(|| {
        format!(
            "moving {} to {}",
            source.path.display(),
            destination.display()
        )
    })
}

fn stored_version(sidecar: &Path) -> Result<Option<String>> {
    if !sidecar.exists() {
        return Ok(None);
    }
    let raw = fs::read(sidecar).with_context(|| format!("reading {}", sidecar.display()))?;
    let names: FontNames = serde_json::from_slice(&raw)
        .with_context(|| format!("parsing sidecar {}", sidecar.display()))?;

    let version = names.preferred(VERSION).unwrap_or_default();
    if version.is_empty() {
        warn!("stored face has no version: {}", sidecar.display());
    }
    Ok(Some(version.to_string()))
}

fn stored_extension(dir: &Path, stem: &str) -> Option<&'static str> {
    ["ttf", "otf"]
        .into_iter()
        .find(|ext| dir.join(format!("{stem}.{ext}")).exists())
}

fn store_face(dir: &Path, stem: &str, ext: &str, data: &[u8], names: &FontNames) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;

    let font_path = dir.join(format!("{stem}.{ext}"));
    fs::write(&font_path, data).with_context(|| format!("writing {}", font_path.display()))?;

    let sidecar = dir.join(format!("{stem}.{SIDECAR_EXT}"));
    let file = fs::File::create(&sidecar).with_context(|| format!("writing {}", sidecar.display()))?;
    write_json_pretty(names, file)?;

    // a face that changed outline flavour leaves its old file behind otherwise
    for other in ["ttf", "otf"].into_iter().filter(|e| *e != ext) {
        let stale = dir.join(format!("{stem}.{other}"));
        if stale.exists() {
            fs::remove_file(&stale).with_context(|| format!("removing {}", stale.display()))?;
        }
    }
    Ok(())
}
