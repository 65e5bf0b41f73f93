//! Subtitle install pipeline (made by FontLab https://www.fontlab.com/)

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{error, info};
use serde::Serialize;

use crate::discovery::{PathDiscovery, SourceDiscovery, SourceKind, SUBTITLE_DEPTH};
use crate::link::{materialize_all, LinkCapability, LinkSummary};
use crate::resolve::{InstallTasks, LinkMode, MissingReport, Resolver};
use crate::store::{IndexStore, INDEX_FILE_NAME};
use crate::subtitle::{parse_subtitle, SubtitleFonts};

#[derive(Debug, Clone)]
pub struct InstallOptions {
    pub storage: PathBuf,
    pub ignored_fonts: HashSet<String>,
    pub link_mode: LinkMode,
    /// Plan tasks and reports without touching the target tree.
    pub dry_run: bool,
    /// Abort the batch at the first subtitle that fails to parse.
    pub fail_fast: bool,
    pub max_depth: usize,
}

impl InstallOptions {
    pub fn new(storage: impl Into<PathBuf>) -> Self {
        Self {
            storage: storage.into(),
            ignored_fonts: HashSet::new(),
            link_mode: LinkMode::default(),
            dry_run: false,
            fail_fast: false,
            max_depth: SUBTITLE_DEPTH,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SubtitleOutcome {
    Parsed { requirements: usize, tasks: usize },
    Skipped { reason: String },
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubtitleReport {
    /// `/`-separated path below the target root.
    pub path: String,
    #[serde(flatten)]
    pub outcome: SubtitleOutcome,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct InstallReport {
    pub subtitles: Vec<SubtitleReport>,
    pub tasks: InstallTasks,
    pub missing: MissingReport,
    /// `None` on a dry run.
    pub links: Option<LinkSummary>,
}

impl InstallReport {
    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, SubtitleOutcome::Failed { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, SubtitleOutcome::Skipped { .. }))
    }

    fn count(&self, pred: impl Fn(&SubtitleOutcome) -> bool) -> usize {
        self.subtitles.iter().filter(|s| pred(&s.outcome)).count()
    }
}

/// Parse and resolve every subtitle below `target_root` without linking anything.
pub fn plan_install(target_root: &Path, opts: &InstallOptions) -> Result<InstallReport> {
    let target_root = target_root
        .canonicalize()
        .with_context(|| format!("resolving install target {}", target_root.display()))?;
    let storage = opts
        .storage
        .canonicalize()
        .with_context(|| format!("resolving storage root {}", opts.storage.display()))?;

    let index = IndexStore::load(&storage.join(INDEX_FILE_NAME))?;
    let resolver = Resolver::new(&index, &storage, &opts.ignored_fonts, opts.link_mode);
    let subtitles = PathDiscovery::new([&target_root], SourceKind::Subtitle)
        .max_depth(opts.max_depth)
        .discover()?;

    let mut report = InstallReport::default();
    for subtitle in subtitles {
        let name = subtitle.relative_display();
        info!("parsing subtitle: {name}");

        let outcome = match read_subtitle(&subtitle.path) {
            Ok(fonts) if fonts.requirements.is_empty() => SubtitleOutcome::Skipped {
                reason: "no fonts defined".to_string(),
            },
            Ok(fonts) if resolver.effective(&fonts.requirements).is_empty() => {
                SubtitleOutcome::Skipped {
                    reason: "only ignored fonts".to_string(),
                }
            }
            Ok(fonts) => {
                let tasks = resolver.resolve(
                    &subtitle.path,
                    &name,
                    &fonts.requirements,
                    &mut report.tasks,
                    &mut report.missing,
                );
                SubtitleOutcome::Parsed {
                    requirements: fonts.requirements.len(),
                    tasks,
                }
            }
            Err(err) if opts.fail_fast => return Err(err),
            Err(err) => {
                error!("{err:#}");
                SubtitleOutcome::Failed {
                    reason: format!("{err:#}"),
                }
            }
        };

        report.subtitles.push(SubtitleReport {
            path: name,
            outcome,
        });
    }

    info!("total tasks: {}", report.tasks.len());
    Ok(report)
}

/// Plan, then materialize every task unless this is a dry run.
pub fn install(
    target_root: &Path,
    opts: &InstallOptions,
    links: &dyn LinkCapability,
) -> Result<InstallReport> {
    let mut report = plan_install(target_root, opts)?;
    if opts.dry_run {
        info!("dry run, skipping install");
    } else {
        report.links = Some(materialize_all(links, &report.tasks));
    }
    Ok(report)
}

fn read_subtitle(path: &Path) -> Result<SubtitleFonts> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    parse_subtitle(&bytes).with_context(|| format!("parsing {}", path.display()))
}
