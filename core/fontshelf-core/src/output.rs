//! Report and JSON writers (made by FontLab https://www.fontlab.com/)

use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};

use crate::resolve::MissingReport;

pub const MISSING_LIST_FILE: &str = "missing.txt";
pub const MISSING_JSON_FILE: &str = "missing.json";

/// Write `value` as tab-indented JSON, the format of the index and sidecars.
pub fn write_json_pretty<T: Serialize + ?Sized>(value: &T, mut w: impl Write) -> Result<()> {
    let mut ser = Serializer::with_formatter(&mut w, PrettyFormatter::with_indent(b"\t"));
    value.serialize(&mut ser)?;
    Ok(())
}

pub fn to_json_pretty<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    write_json_pretty(value, &mut buf)?;
    Ok(buf)
}

/// Sorted missing keys, one per line, no trailing newline.
pub fn write_missing_list(missing: &MissingReport, mut w: impl Write) -> Result<()> {
    let keys: Vec<&str> = missing.keys().collect();
    w.write_all(keys.join("\n").as_bytes())?;
    Ok(())
}

/// Write `missing.txt` and `missing.json` into `dir`, leaving unchanged files alone.
pub fn write_missing_reports(missing: &MissingReport, dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("creating report dir {}", dir.display()))?;

    let mut list = Vec::new();
    write_missing_list(missing, &mut list)?;
    write_if_changed(&dir.join(MISSING_LIST_FILE), &list)?;
    write_if_changed(&dir.join(MISSING_JSON_FILE), &to_json_pretty(missing)?)?;
    Ok(())
}

/// Returns true when the file was (re)written.
pub fn write_if_changed(path: &Path, contents: &[u8]) -> Result<bool> {
    if fs::read(path).is_ok_and(|existing| existing == contents) {
        return Ok(false);
    }
    fs::write(path, contents).with_context(|| format!("writing {}", path.display()))?;
    Ok(true)
}
