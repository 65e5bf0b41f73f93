//! Mapping font requirements onto catalog entries (made by FontLab https://www.fontlab.com/)

use std::collections::{BTreeMap, HashSet};
use std::path::{Component, Path, PathBuf};

use log::warn;
use serde::Serialize;

use crate::store::{FamilyEntry, IndexStore};
use crate::subtitle::FontRequirement;

/// Name of the per-directory folder links are installed into.
pub const FONTS_DIR: &str = "fonts";

/// Link target path → link contents. Later requirements win for the same target.
pub type InstallTasks = BTreeMap<PathBuf, PathBuf>;

/// Missing-font key → every subtitle file that asked for it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct MissingReport(BTreeMap<String, Vec<String>>);

impl MissingReport {
    pub fn record(&mut self, key: impl Into<String>, file: impl Into<String>) {
        self.0.entry(key.into()).or_default().push(file.into());
    }

    /// Sorted keys.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn files(&self, key: &str) -> Option<&[String]> {
        self.0.get(key).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkMode {
    #[default]
    Absolute,
    Relative,
}

/// Resolves one subtitle's requirements against the index.
#[derive(Debug, Clone)]
pub struct Resolver<'a> {
    store: &'a IndexStore,
    storage_root: &'a Path,
    ignored: &'a HashSet<String>,
    mode: LinkMode,
}

impl<'a> Resolver<'a> {
    pub fn new(
        store: &'a IndexStore,
        storage_root: &'a Path,
        ignored: &'a HashSet<String>,
        mode: LinkMode,
    ) -> Self {
        Self {
            store,
            storage_root,
            ignored,
            mode,
        }
    }

    /// Requirements that survive dedup and the ignore list, first occurrence order.
    pub fn effective<'r>(&self, requirements: &'r [FontRequirement]) -> Vec<&'r FontRequirement> {
        let mut seen = HashSet::new();
        requirements
            .iter()
            .filter(|r| !self.ignored.contains(&r.font_name))
            .filter(|r| seen.insert(*r))
            .collect()
    }

    /// Add install tasks for `subtitle`, or missing records for `report_name`.
    ///
    /// `subtitle` should be absolute; its directory receives the `fonts` folder.
    /// Returns the number of tasks produced.
    pub fn resolve(
        &self,
        subtitle: &Path,
        report_name: &str,
        requirements: &[FontRequirement],
        tasks: &mut InstallTasks,
        missing: &mut MissingReport,
    ) -> usize {
        let install_dir = subtitle
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(FONTS_DIR);

        let mut produced = 0;
        for requirement in self.effective(requirements) {
            let Some(family) = self.store.family(&requirement.font_name) else {
                missing.record(requirement.missing_key(), report_name);
                continue;
            };
            if family.ignored {
                continue;
            }
            let Some((_, font)) = pick_subfamily(family, requirement.bold, requirement.italic)
            else {
                warn!("family {} has no stored faces", requirement.font_name);
                continue;
            };

            let source = storage_path(self.storage_root, font);
            let target = install_dir.join(flatten_font_path(font));
            let link = match self.mode {
                LinkMode::Absolute => source,
                LinkMode::Relative => relative_path(&source, &target),
            };
            tasks.insert(target, link);
            produced += 1;
        }
        produced
    }
}

/// Subfamily buckets tried in order; the first present name wins.
pub fn candidate_subfamilies(bold: bool, italic: bool) -> Vec<&'static str> {
    let mut candidates = Vec::new();
    if bold && italic {
        candidates.extend(["Bold Italic", "Italic Bold"]);
    }
    if bold {
        candidates.extend(["Bold", "Heavy"]);
    }
    if italic {
        candidates.extend(["Italic", "Bold Italic"]);
    }
    candidates.extend(["Regular", "Normal"]);
    candidates
}

/// `(subfamily, stored path)` for a bold/italic request, falling back to the
/// first face stored for the family.
pub fn pick_subfamily(family: &FamilyEntry, bold: bool, italic: bool) -> Option<(&str, &str)> {
    for name in candidate_subfamilies(bold, italic) {
        if let Some((subfamily, path)) = family.faces.get_key_value(name) {
            return Some((subfamily.as_str(), path.as_str()));
        }
    }

    let (subfamily, path) = family.faces.iter().next()?;
    warn!("no font matched! fallback: {path}");
    Some((subfamily.as_str(), path.as_str()))
}

/// Absolute location of an index path (always `/`-separated) under the storage root.
pub fn storage_path(root: &Path, font: &str) -> PathBuf {
    font.split(['/', '\\'])
        .filter(|part| !part.is_empty())
        .fold(root.to_path_buf(), |path, part| path.join(part))
}

/// `Family/Bold.ttf` → `Family.Bold.ttf`, the file name used inside `fonts/`.
pub fn flatten_font_path(font: &str) -> String {
    font.replace(['/', '\\'], ".")
}

/// Express `source` relative to the directory holding `target`.
///
/// Paths with nothing in common come back unchanged.
pub fn relative_path(source: &Path, target: &Path) -> PathBuf {
    let source_parts: Vec<Component> = source.components().collect();
    let target_parts: Vec<Component> = target.components().collect();

    let common = source_parts
        .iter()
        .zip(&target_parts)
        .take_while(|(a, b)| a == b)
        .count();
    if common == 0 {
        return source.to_path_buf();
    }

    let ups = (target_parts.len() - common).saturating_sub(1);
    let mut relative = PathBuf::new();
    for _ in 0..ups {
        relative.push("..");
    }
    for part in &source_parts[common..] {
        relative.push(part.as_os_str());
    }
    relative
}
