//! fontshelf CLI (made by FontLab https://www.fontlab.com/)

mod config;
mod logging;

use std::collections::HashSet;
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum, ValueHint};
use log::warn;

use fontshelf_core::catalog::{build_catalog, BuildOptions, BuildReport, SourceOutcome};
use fontshelf_core::install::{install, InstallOptions, InstallReport, SubtitleOutcome};
use fontshelf_core::link::platform_links;
use fontshelf_core::output::{write_json_pretty, write_missing_reports};
use fontshelf_core::resolve::LinkMode;
use fontshelf_core::validate::{validate_storage, Problem, ValidationReport};

use crate::config::FileConfig;

/// Exit code of a `validate` run that found problems.
pub const EXIT_PROBLEMS: i32 = 2;

/// CLI entrypoint for fontshelf.
#[derive(Debug, Parser)]
#[command(
    name = "fontshelf",
    about = "Font catalog builder and subtitle font linker (made by FontLab https://www.fontlab.com/)"
)]
pub struct Cli {
    /// JSON config file (default: ./fontshelf.json when present)
    #[arg(long = "config", global = true, value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,

    /// More log output (-v info, -vv debug)
    #[arg(short = 'v', long = "verbose", global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short = 'q', long = "quiet", global = true, action = ArgAction::SetTrue, conflicts_with = "verbose")]
    quiet: bool,

    /// Control colorized output (auto|always|never)
    #[arg(long = "color", global = true, default_value_t = ColorChoice::Auto, value_enum)]
    color: ColorChoice,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Unpack, identify and store source fonts, then update the index
    Build(BuildArgs),
    /// Link the fonts every subtitle below a directory asks for
    Install(InstallArgs),
    /// Cross-check the index against the storage tree
    Validate(ValidateArgs),
}

#[derive(Debug, Args)]
struct BuildArgs {
    /// Directory of fonts to ingest (default: "source" from the config)
    #[arg(value_hint = ValueHint::DirPath)]
    source: Option<PathBuf>,

    /// Catalog storage root
    #[arg(long = "storage", value_hint = ValueHint::DirPath)]
    storage: Option<PathBuf>,

    /// Overwrite stored faces regardless of version
    #[arg(long = "force", action = ArgAction::SetTrue)]
    force: bool,

    /// Source-relative prefix that forces overwrite (replaces the config list)
    #[arg(long = "force-prefix", value_hint = ValueHint::Other)]
    force_prefixes: Vec<String>,

    /// Leave processed files in place instead of moving them to .done/.fail
    #[arg(long = "keep-sources", action = ArgAction::SetTrue)]
    keep_sources: bool,

    /// Emit the build report as JSON
    #[arg(long = "json", action = ArgAction::SetTrue)]
    json: bool,
}

#[derive(Debug, Args)]
struct InstallArgs {
    /// Directory scanned for .ass/.ssa files
    #[arg(value_hint = ValueHint::DirPath)]
    target: PathBuf,

    /// Catalog storage root
    #[arg(long = "storage", value_hint = ValueHint::DirPath)]
    storage: Option<PathBuf>,

    /// Link with paths relative to each fonts directory
    #[arg(long = "relative", action = ArgAction::SetTrue)]
    relative: bool,

    /// Plan links and reports without touching the target tree
    #[arg(long = "dry-run", action = ArgAction::SetTrue)]
    dry_run: bool,

    /// Font names never linked nor reported missing (adds to the config list)
    #[arg(long = "ignore", value_delimiter = ',', value_hint = ValueHint::Other)]
    ignore: Vec<String>,

    /// Where missing.txt and missing.json are written
    #[arg(long = "report-dir", value_hint = ValueHint::DirPath)]
    report_dir: Option<PathBuf>,

    /// Stop at the first subtitle that cannot be parsed
    #[arg(long = "fail-fast", action = ArgAction::SetTrue)]
    fail_fast: bool,

    /// Emit the install report as JSON
    #[arg(long = "json", action = ArgAction::SetTrue)]
    json: bool,
}

#[derive(Debug, Args)]
struct ValidateArgs {
    /// Catalog storage root
    #[arg(long = "storage", value_hint = ValueHint::DirPath)]
    storage: Option<PathBuf>,

    /// Emit the validation report as JSON
    #[arg(long = "json", action = ArgAction::SetTrue)]
    json: bool,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum ColorChoice {
    Auto,
    Always,
    Never,
}

/// Parse CLI args, execute the selected command, and return the exit code.
pub fn run() -> Result<i32> {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.quiet);
    let config = FileConfig::load(cli.config.as_deref())?;

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    let use_color = match cli.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => handle.is_terminal(),
    };

    match cli.command {
        Command::Build(args) => run_build(args, &config, &mut handle, use_color),
        Command::Install(args) => run_install(args, &config, &mut handle, use_color),
        Command::Validate(args) => run_validate(args, &config, &mut handle, use_color),
    }
}

fn build_options(args: &BuildArgs, config: &FileConfig) -> Result<(PathBuf, BuildOptions)> {
    let source = args
        .source
        .clone()
        .or_else(|| config.source.clone())
        .ok_or_else(|| anyhow!("no source directory: pass one or add \"source\" to the config"))?;

    let mut opts = BuildOptions::new(config.storage(args.storage.as_deref())?);
    opts.force_all = args.force;
    opts.move_sources = !args.keep_sources;
    opts.force_prefixes = if args.force_prefixes.is_empty() {
        config.force_prefixes.clone()
    } else {
        args.force_prefixes.clone()
    };
    Ok((source, opts))
}

fn install_options(args: &InstallArgs, config: &FileConfig) -> Result<InstallOptions> {
    let mut opts = InstallOptions::new(config.storage(args.storage.as_deref())?);
    opts.ignored_fonts = config
        .ignored_fonts
        .iter()
        .chain(&args.ignore)
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect::<HashSet<_>>();
    opts.link_mode = if args.relative || config.relative_links {
        LinkMode::Relative
    } else {
        LinkMode::Absolute
    };
    opts.dry_run = args.dry_run || config.dry_run;
    opts.fail_fast = args.fail_fast;
    Ok(opts)
}

fn run_build(args: BuildArgs, config: &FileConfig, w: &mut impl Write, color: bool) -> Result<i32> {
    let (source, opts) = build_options(&args, config)?;
    let report = build_catalog(&source, &opts)?;

    if args.json {
        write_json_pretty(&report, &mut *w)?;
        writeln!(w)?;
    } else {
        write_build_summary(&report, w, color)?;
    }
    Ok(0)
}

fn run_install(args: InstallArgs, config: &FileConfig, w: &mut impl Write, color: bool) -> Result<i32> {
    let opts = install_options(&args, config)?;
    let links = platform_links();
    let report = install(&args.target, &opts, links.as_ref())?;

    let report_dir = args
        .report_dir
        .clone()
        .or_else(|| config.report_dir.clone())
        .unwrap_or_else(|| PathBuf::from("."));
    write_missing_reports(&report.missing, &report_dir)
        .with_context(|| format!("writing reports to {}", report_dir.display()))?;

    if !report.missing.is_empty() {
        warn!("install complete, missing fonts: {}", report.missing.len());
    }

    if args.json {
        write_json_pretty(&report, &mut *w)?;
        writeln!(w)?;
    } else {
        write_install_summary(&report, w, color)?;
    }
    Ok(0)
}

fn run_validate(args: ValidateArgs, config: &FileConfig, w: &mut impl Write, color: bool) -> Result<i32> {
    let storage = config.storage(args.storage.as_deref())?;
    let report = validate_storage(&storage)?;

    if args.json {
        write_json_pretty(&report, &mut *w)?;
        writeln!(w)?;
    } else {
        write_validation_summary(&report, &storage, w, color)?;
    }
    Ok(if report.is_clean() { 0 } else { EXIT_PROBLEMS })
}

fn write_build_summary(report: &BuildReport, mut w: impl Write, color: bool) -> Result<()> {
    for source in &report.sources {
        if let SourceOutcome::Failed { reason } = &source.outcome {
            let path = apply_color(&source.path, color, AnsiColor::Red);
            writeln!(w, "failed  {path}  {reason}")?;
        }
    }

    let done = report.sources.len() - report.failed();
    writeln!(w, "sources: {done} done, {} failed", report.failed())?;
    writeln!(w, "faces stored: {}", report.faces_stored())?;
    writeln!(w, "families indexed: {}", report.families)?;
    Ok(())
}

fn write_install_summary(report: &InstallReport, mut w: impl Write, color: bool) -> Result<()> {
    for subtitle in &report.subtitles {
        let (label, reason, code) = match &subtitle.outcome {
            SubtitleOutcome::Parsed { .. } => continue,
            SubtitleOutcome::Skipped { reason } => ("skipped", reason, AnsiColor::Yellow),
            SubtitleOutcome::Failed { reason } => ("failed ", reason, AnsiColor::Red),
        };
        let path = apply_color(&subtitle.path, color, code);
        writeln!(w, "{label} {path}  {reason}")?;
    }

    let parsed = report.subtitles.len() - report.skipped() - report.failed();
    writeln!(
        w,
        "subtitles: {parsed} parsed, {} skipped, {} failed",
        report.skipped(),
        report.failed()
    )?;
    writeln!(w, "tasks: {}", report.tasks.len())?;
    match &report.links {
        Some(links) => writeln!(
            w,
            "links: {} created, {} replaced, {} unchanged, {} real files skipped, {} failed",
            links.created, links.replaced, links.unchanged, links.blocked, links.failed
        )?,
        None => writeln!(w, "links: dry run, nothing linked")?,
    }

    writeln!(w, "missing fonts: {}", report.missing.len())?;
    for key in report.missing.keys() {
        writeln!(w, "\t{}", apply_color(key, color, AnsiColor::Yellow))?;
    }
    Ok(())
}

fn write_validation_summary(
    report: &ValidationReport,
    storage: &Path,
    mut w: impl Write,
    color: bool,
) -> Result<()> {
    for problem in &report.problems {
        let line = match problem {
            Problem::Missing { path, .. } => format!("missing {path:?}"),
            Problem::Unindexed { sidecar, family } => format!("unindexed {sidecar:?} family {family}"),
            Problem::Unreadable { sidecar, reason } => format!("unreadable {sidecar:?}: {reason}"),
        };
        writeln!(w, "{}", apply_color(&line, color, AnsiColor::Red))?;
    }

    writeln!(w, "indexed paths: {}", report.indexed_paths)?;
    writeln!(w, "sidecars: {}", report.sidecars)?;
    for dir in report.reindex_dirs() {
        let path = storage.join(dir);
        writeln!(w, "reindex: {}", apply_color(&path.display().to_string(), color, AnsiColor::Cyan))?;
    }
    Ok(())
}

#[derive(Copy, Clone)]
enum AnsiColor {
    Cyan,
    Yellow,
    Red,
}

fn apply_color(text: &str, color: bool, code: AnsiColor) -> String {
    if !color {
        return text.to_string();
    }

    let code_str = match code {
        AnsiColor::Cyan => "36",
        AnsiColor::Yellow => "33",
        AnsiColor::Red => "31",
    };

    format!("\u{1b}[{}m{}\u{1b}[0m", code_str, text)
}
