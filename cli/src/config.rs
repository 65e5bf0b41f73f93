//! Config file loading and merging (made by FontLab https://www.fontlab.com/)

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use fontshelf_core::catalog::DEFAULT_FORCE_PREFIX;

pub const DEFAULT_CONFIG_FILE: &str = "fontshelf.json";
pub const STORAGE_ENV: &str = "FONTSHELF_STORAGE";

fn default_force_prefixes() -> Vec<String> {
    vec![DEFAULT_FORCE_PREFIX.to_string()]
}

/// Everything `fontshelf.json` may set. Unknown keys are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub storage: Option<PathBuf>,
    #[serde(default)]
    pub source: Option<PathBuf>,
    #[serde(default)]
    pub ignored_fonts: Vec<String>,
    #[serde(default)]
    pub relative_links: bool,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default = "default_force_prefixes")]
    pub force_prefixes: Vec<String>,
    #[serde(default)]
    pub report_dir: Option<PathBuf>,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            storage: None,
            source: None,
            ignored_fonts: Vec::new(),
            relative_links: false,
            dry_run: false,
            force_prefixes: default_force_prefixes(),
            report_dir: None,
        }
    }
}

impl FileConfig {
    /// Read `explicit`, else `./fontshelf.json` if present, else defaults.
    ///
    /// Relative paths inside the file are taken relative to the file.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !fallback.is_file() {
                    return Ok(Self::default());
                }
                fallback
            }
        };

        let raw = fs::read(&path).with_context(|| format!("reading config {}", path.display()))?;
        let mut config: FileConfig = serde_json::from_slice(&raw)
            .with_context(|| format!("parsing config {}", path.display()))?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        for field in [&mut config.storage, &mut config.source, &mut config.report_dir] {
            if let Some(p) = field.as_mut().filter(|p| p.is_relative()) {
                *p = base.join(&*p);
            }
        }
        Ok(config)
    }

    /// CLI flag, then `FONTSHELF_STORAGE`, then the file.
    pub fn storage(&self, flag: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = flag {
            return Ok(path.to_path_buf());
        }
        if let Some(path) = env::var_os(STORAGE_ENV).filter(|v| !v.is_empty()) {
            return Ok(PathBuf::from(path));
        }
        self.storage.clone().ok_or_else(|| {
            anyhow!("no storage root: pass --storage, set {STORAGE_ENV} or add \"storage\" to the config")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_keep_the_reindex_prefix() {
        let config: FileConfig = serde_json::from_str("{}").expect("parse");
        assert_eq!(config, FileConfig::default());
        assert_eq!(config.force_prefixes, vec!["_reindex".to_string()]);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(serde_json::from_str::<FileConfig>(r#"{"storag": "x"}"#).is_err());
    }

    #[test]
    fn relative_paths_follow_the_config_file() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("fontshelf.json");
        fs::write(
            &path,
            r#"{"storage": "fonts", "report_dir": "/abs/reports", "ignored_fonts": ["Arial"]}"#,
        )
        .unwrap();

        let config = FileConfig::load(Some(&path)).expect("load");
        assert_eq!(config.storage, Some(tmp.path().join("fonts")));
        assert_eq!(config.report_dir, Some(PathBuf::from("/abs/reports")));
        assert_eq!(config.ignored_fonts, vec!["Arial".to_string()]);
    }

    #[test]
    fn flag_beats_file_storage() {
        let config = FileConfig {
            storage: Some(PathBuf::from("/from/file")),
            ..FileConfig::default()
        };
        assert_eq!(
            config.storage(Some(Path::new("/from/flag"))).unwrap(),
            PathBuf::from("/from/flag")
        );
    }
}
