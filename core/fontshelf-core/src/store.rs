//! The persisted family → subfamily → path index (made by FontLab https://www.fontlab.com/)
//!
//! Loaded once when a pipeline starts, mutated in memory by the build
//! pipeline, written back once at the end. The install pipeline only reads it.

use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use indexmap::IndexMap;
use log::warn;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::identity::FontIdentity;
use crate::output::write_json_pretty;

/// File name of the index inside the storage root.
pub const INDEX_FILE_NAME: &str = "index.json";

/// Subfamilies of one family, plus the marker that hides it from resolution.
///
/// Subfamilies keep the order they were first stored in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyEntry {
    #[serde(rename = "$ignore", default, skip_serializing_if = "is_false")]
    pub ignored: bool,
    #[serde(flatten)]
    pub faces: IndexMap<String, String>,
}

impl FamilyEntry {
    pub fn face(&self, subfamily: &str) -> Option<&str> {
        self.faces.get(subfamily).map(String::as_str)
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Families in file order; new ones are appended.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IndexStore {
    families: IndexMap<String, FamilyEntry>,
}

impl IndexStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read an index file; a missing file is an empty index.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let raw = fs::read(path).with_context(|| format!("reading index {}", path.display()))?;
        serde_json::from_slice(&raw).with_context(|| format!("parsing index {}", path.display()))
    }

    /// Replace the file at `path` in one rename so readers never see half an index.
    pub fn save(&self, path: &Path) -> Result<()> {
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;

        let mut tmp = NamedTempFile::new_in(dir)
            .with_context(|| format!("creating temporary index in {}", dir.display()))?;
        write_json_pretty(self, &mut tmp)?;
        tmp.write_all(b"\n")?;
        tmp.persist(path)
            .with_context(|| format!("writing index {}", path.display()))?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.families.len()
    }

    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }

    pub fn family(&self, name: &str) -> Option<&FamilyEntry> {
        self.families.get(name)
    }

    pub fn families(&self) -> impl Iterator<Item = (&String, &FamilyEntry)> {
        self.families.iter()
    }

    pub fn set_ignored(&mut self, family: &str, ignored: bool) {
        self.families.entry(family.to_string()).or_default().ignored = ignored;
    }

    /// Point `family/subfamily` at `path`, returning the path it pointed at before.
    pub fn register(&mut self, family: &str, subfamily: &str, path: &str) -> Option<String> {
        let entry = self.families.entry(family.to_string()).or_default();
        let previous = entry.faces.insert(subfamily.to_string(), path.to_string());
        match previous {
            Some(old) if old != path => {
                warn!("index replaced: {family}/{subfamily}, {old} to {path}");
                Some(old)
            }
            _ => None,
        }
    }

    /// Register a stored face under every localized family/subfamily it declares.
    pub fn register_identity(&mut self, identity: &FontIdentity, path: &str) {
        for (family, subfamily) in identity.locale_pairs() {
            self.register(&family, &subfamily, path);
        }
    }
}
