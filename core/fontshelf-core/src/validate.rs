//! Storage integrity checks (made by FontLab https://www.fontlab.com/)
//!
//! Two passes: every index path must exist in storage, and every sidecar's
//! family names must be index keys.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::{info, warn};
use serde::Serialize;
use walkdir::WalkDir;

use crate::catalog::SIDECAR_EXT;
use crate::identity::{FontNames, FAMILY};
use crate::resolve::storage_path;
use crate::store::{IndexStore, INDEX_FILE_NAME};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Problem {
    /// The index points at a file storage does not have.
    Missing {
        family: String,
        subfamily: String,
        path: String,
    },
    /// A stored face declares a family the index does not know.
    Unindexed { sidecar: String, family: String },
    /// A sidecar that is not valid name metadata.
    Unreadable { sidecar: String, reason: String },
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub indexed_paths: usize,
    pub sidecars: usize,
    pub problems: Vec<Problem>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.problems.is_empty()
    }

    /// Storage directories holding unindexed faces, to copy back under the
    /// force prefix of the source tree.
    pub fn reindex_dirs(&self) -> Vec<String> {
        let dirs: BTreeSet<&str> = self
            .problems
            .iter()
            .filter_map(|p| match p {
                Problem::Unindexed { sidecar, .. } => {
                    Some(sidecar.rsplit_once('/').map_or("", |(dir, _)| dir))
                }
                _ => None,
            })
            .collect();
        dirs.into_iter().map(str::to_string).collect()
    }
}

/// Cross-check `storage/index.json` against the storage tree.
pub fn validate_storage(storage: &Path) -> Result<ValidationReport> {
    let index = IndexStore::load(&storage.join(INDEX_FILE_NAME))?;
    let mut report = ValidationReport::default();

    for (family, entry) in index.families() {
        if entry.ignored {
            continue;
        }
        for (subfamily, path) in &entry.faces {
            report.indexed_paths += 1;
            if !storage_path(storage, path).exists() {
                warn!("missing {path:?}");
                report.problems.push(Problem::Missing {
                    family: family.clone(),
                    subfamily: subfamily.clone(),
                    path: path.clone(),
                });
            }
        }
    }
    info!("validate complete: {}", report.indexed_paths);

    // sidecars live exactly one directory below the storage root
    let sidecars = WalkDir::new(storage)
        .min_depth(2)
        .max_depth(2)
        .sort_by_file_name();
    for entry in sidecars {
        let entry = entry.with_context(|| format!("walking {}", storage.display()))?;
        let path = entry.path();
        if !entry.file_type().is_file()
            || path.extension().and_then(|e| e.to_str()) != Some(SIDECAR_EXT)
        {
            continue;
        }

        report.sidecars += 1;
        let relative = relative_name(storage, path);
        let names = match read_sidecar(path) {
            Ok(names) => names,
            Err(err) => {
                warn!("unreadable sidecar {relative}: {err:#}");
                report.problems.push(Problem::Unreadable {
                    sidecar: relative,
                    reason: format!("{err:#}"),
                });
                continue;
            }
        };

        // Index keys are registered trimmed.
        let families: BTreeSet<&str> = names
            .get(FAMILY)
            .into_iter()
            .flat_map(|values| values.values())
            .map(|family| family.trim())
            .filter(|family| !family.is_empty())
            .collect();
        for family in families {
            if index.family(family).is_none() {
                warn!("unindexed {relative:?} family {family}");
                report.problems.push(Problem::Unindexed {
                    sidecar: relative.clone(),
                    family: family.to_string(),
                });
            }
        }
    }
    info!("index check complete: {}", report.sidecars);

    Ok(report)
}

fn read_sidecar(path: &Path) -> Result<FontNames> {
    let raw = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_slice(&raw).with_context(|| format!("parsing {}", path.display()))
}

fn relative_name(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::SUBFAMILY;
    use crate::output::to_json_pretty;
    use tempfile::tempdir;

    fn write_face(storage: &Path, dir: &str, families: &[(&str, &str)]) {
        let mut names = FontNames::new();
        for (locale, family) in families {
            names.insert(FAMILY, locale, *family);
        }
        names.insert(SUBFAMILY, "en", "Regular");
        fs::create_dir_all(storage.join(dir)).unwrap();
        fs::write(storage.join(dir).join("Regular.ttf"), b"font").unwrap();
        fs::write(storage.join(dir).join("Regular.json"), to_json_pretty(&names).unwrap()).unwrap();
    }

    #[test]
    fn consistent_storage_is_clean() {
        let tmp = tempdir().expect("tempdir");
        write_face(tmp.path(), "Kai", &[("en", "Kai"), ("zh", "楷体")]);
        let mut index = IndexStore::new();
        index.register("Kai", "Regular", "Kai/Regular.ttf");
        index.register("楷体", "Regular", "Kai/Regular.ttf");
        index.save(&tmp.path().join(INDEX_FILE_NAME)).unwrap();

        let report = validate_storage(tmp.path()).expect("validate");
        assert!(report.is_clean(), "{:?}", report.problems);
        assert_eq!((report.indexed_paths, report.sidecars), (2, 1));
    }

    #[test]
    fn reports_missing_files_and_unindexed_families() {
        let tmp = tempdir().expect("tempdir");
        write_face(tmp.path(), "Hei", &[("en", "Hei")]);
        let mut index = IndexStore::new();
        index.register("Song", "Bold", "Song/Bold.ttf");
        index.register("Ghost", "Regular", "Ghost/Regular.ttf");
        index.set_ignored("Ghost", true);
        index.save(&tmp.path().join(INDEX_FILE_NAME)).unwrap();

        let report = validate_storage(tmp.path()).expect("validate");
        assert_eq!(
            report.problems,
            vec![
                Problem::Missing {
                    family: "Song".into(),
                    subfamily: "Bold".into(),
                    path: "Song/Bold.ttf".into(),
                },
                Problem::Unindexed {
                    sidecar: "Hei/Regular.json".into(),
                    family: "Hei".into(),
                },
            ]
        );
        assert_eq!(report.reindex_dirs(), vec!["Hei".to_string()]);
    }

    #[test]
    fn padded_sidecar_family_matches_trimmed_index_key() {
        let tmp = tempdir().expect("tempdir");
        write_face(tmp.path(), "Yuan", &[("en", "  Yuan "), ("zh", "圆体\t")]);
        let mut index = IndexStore::new();
        index.register("Yuan", "Regular", "Yuan/Regular.ttf");
        index.register("圆体", "Regular", "Yuan/Regular.ttf");
        index.save(&tmp.path().join(INDEX_FILE_NAME)).unwrap();

        let report = validate_storage(tmp.path()).expect("validate");
        assert!(report.is_clean(), "{:?}", report.problems);
    }

    #[test]
    fn broken_sidecar_is_a_problem_not_an_error() {
        let tmp = tempdir().expect("tempdir");
        fs::create_dir_all(tmp.path().join("Bad")).unwrap();
        fs::write(tmp.path().join("Bad/Regular.json"), b"not json").unwrap();

        let report = validate_storage(tmp.path()).expect("validate");
        assert!(matches!(report.problems[..], [Problem::Unreadable { .. }]));
    }
}
