//! Stderr backend for the `log` facade (made by FontLab https://www.fontlab.com/)
//!
//! Level comes from `-v`/`-q` on the command line unless `FONTSHELF_LOG`
//! names one of `off`, `error`, `warn`, `info`, `debug`, `trace`.

use std::env;
use std::io::Write;

use log::{LevelFilter, Log, Metadata, Record};

pub const LOG_ENV: &str = "FONTSHELF_LOG";

struct StderrLogger;

static LOGGER: StderrLogger = StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(stderr, "[{}] {}", record.level(), record.args());
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

/// `warn` by default, one step louder per `-v`, `error` only with `-q`.
pub fn level_from_flags(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::Error;
    }
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn level_from_env() -> Option<LevelFilter> {
    env::var(LOG_ENV).ok()?.trim().parse().ok()
}

/// Install the logger; a second call only adjusts the level.
pub fn init(verbose: u8, quiet: bool) {
    let level = level_from_env().unwrap_or_else(|| level_from_flags(verbose, quiet));
    let _ = log::set_logger(&LOGGER);
    log::set_max_level(level);
}
