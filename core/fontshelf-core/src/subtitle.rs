//! ASS/SSA font requirement extraction (made by FontLab https://www.fontlab.com/)
//!
//! A line-oriented state machine: the current section and its declared
//! `Format:` decide how each `Type: value` line is read. Style lines and
//! dialogue override tags both contribute [`FontRequirement`]s; nothing else
//! about the script is interpreted.

use std::collections::HashMap;

use log::{debug, warn};
use serde::Serialize;

use crate::encoding::{decode_subtitle, opens_with_script_info};
use crate::error::{ShelfError, ShelfResult};

const DEFAULT_STYLE: &str = "Default";
const STYLE_FIELDS: [&str; 4] = ["Name", "Fontname", "Bold", "Italic"];

/// A font name with the bold/italic flags it is rendered with.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct FontRequirement {
    pub font_name: String,
    pub bold: bool,
    pub italic: bool,
}

/// What a `Style:` line declares; same shape as a requirement.
pub type StyleRecord = FontRequirement;

impl FontRequirement {
    pub fn new(font_name: impl Into<String>, bold: bool, italic: bool) -> Self {
        Self {
            font_name: font_name.into(),
            bold,
            italic,
        }
    }

    /// `"{name} -- {B|_}{I|_}"`, the key of the missing-font report.
    pub fn missing_key(&self) -> String {
        format!(
            "{} -- {}{}",
            self.font_name,
            if self.bold { 'B' } else { '_' },
            if self.italic { 'I' } else { '_' }
        )
    }
}

/// Everything a script tells us about fonts.
#[derive(Debug, Clone, Default)]
pub struct SubtitleFonts {
    pub styles: HashMap<String, StyleRecord>,
    /// In encounter order, duplicates included.
    pub requirements: Vec<FontRequirement>,
    /// Names from `fontname:` lines of a `[Fonts]` section.
    pub embedded: Vec<String>,
}

/// Decode and parse raw subtitle bytes.
pub fn parse_subtitle(bytes: &[u8]) -> ShelfResult<SubtitleFonts> {
    let text = decode_subtitle(bytes)?;
    parse_script(&text)
}

/// Parse already decoded script text.
pub fn parse_script(text: &str) -> ShelfResult<SubtitleFonts> {
    if !opens_with_script_info(text) {
        return Err(ShelfError::malformed(1, "script does not begin with [Script Info]"));
    }

    let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
    let mut parser = ScriptParser::default();
    for (i, line) in normalized.lines().enumerate() {
        parser.feed(i + 1, line)?;
    }

    let fonts = parser.fonts;
    if !fonts.embedded.is_empty() {
        warn!("embedded fonts found, be careful: {}", fonts.embedded.join(", "));
    }
    Ok(fonts)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Section {
    #[default]
    Other,
    Styles,
    Events,
    Fonts,
}

impl Section {
    fn from_header(line: &str) -> Self {
        let name = line
            .trim_start_matches('[')
            .split(']')
            .next()
            .unwrap_or_default()
            .trim()
            .to_lowercase();

        match name.as_str() {
            "v4 styles" | "v4+ styles" => Section::Styles,
            "events" => Section::Events,
            "fonts" => Section::Fonts,
            _ => Section::Other,
        }
    }
}

#[derive(Debug, Default)]
struct ScriptParser {
    section: Section,
    format: Option<Vec<String>>,
    fonts: SubtitleFonts,
}

impl ScriptParser {
    fn feed(&mut self, line_no: usize, raw: &str) -> ShelfResult<()> {
        let line = raw.trim();
        if line.is_empty() || line.starts_with(';') || line.starts_with("!:") {
            return Ok(());
        }

        if line.starts_with('[') {
            self.section = Section::from_header(line);
            self.format = None;
            return Ok(());
        }

        match self.section {
            Section::Other => return Ok(()),
            Section::Fonts => {
                note_embedded(&mut self.fonts, line);
                return Ok(());
            }
            Section::Styles | Section::Events => {}
        }

        let (kind, value) = line.split_once(':').ok_or_else(|| {
            ShelfError::malformed(line_no, format!("expected `Type: value`, got {line:?}"))
        })?;
        let kind = kind.trim();
        let value = value.trim_start();

        if kind == "Format" {
            self.format = Some(value.split(',').map(|f| f.trim().to_string()).collect());
            return Ok(());
        }

        let Some(format) = self.format.as_deref() else {
            return Err(ShelfError::malformed(
                line_no,
                format!("`{kind}` line before any Format line"),
            ));
        };

        let fields: Vec<&str> = value.splitn(format.len(), ',').collect();
        if fields.len() != format.len() {
            return Err(ShelfError::malformed(
                line_no,
                format!("expected {} fields, found {}", format.len(), fields.len()),
            ));
        }
        let record = Record { format, fields };

        match self.section {
            Section::Styles => style_line(&mut self.fonts, line_no, kind, &record),
            Section::Events => event_line(&mut self.fonts, line_no, kind, &record),
            Section::Other | Section::Fonts => Ok(()),
        }
    }
}

struct Record<'a> {
    format: &'a [String],
    fields: Vec<&'a str>,
}

impl<'a> Record<'a> {
    fn get(&self, name: &str) -> Option<&'a str> {
        self.format
            .iter()
            .position(|f| f.eq_ignore_ascii_case(name))
            .map(|i| self.fields[i])
    }

    fn require(&self, line_no: usize, name: &str) -> ShelfResult<&'a str> {
        self.get(name)
            .ok_or_else(|| ShelfError::malformed(line_no, format!("missing required field {name}")))
    }
}

fn style_line(
    fonts: &mut SubtitleFonts,
    line_no: usize,
    kind: &str,
    record: &Record,
) -> ShelfResult<()> {
    if kind != "Style" {
        return Err(ShelfError::malformed(
            line_no,
            format!("unexpected `{kind}` line in styles section"),
        ));
    }

    let [name, font, bold, italic] = STYLE_FIELDS;
    let name = record.require(line_no, name)?.trim();
    let style = StyleRecord::new(
        strip_vertical(record.require(line_no, font)?),
        flag(record.require(line_no, bold)?),
        flag(record.require(line_no, italic)?),
    );

    fonts.requirements.push(style.clone());
    fonts.styles.insert(name.to_string(), style);
    Ok(())
}

fn event_line(
    fonts: &mut SubtitleFonts,
    line_no: usize,
    kind: &str,
    record: &Record,
) -> ShelfResult<()> {
    match kind {
        "Comment" => return Ok(()),
        "Dialogue" => {}
        other => {
            return Err(ShelfError::malformed(
                line_no,
                format!("unexpected `{other}` line in events section"),
            ))
        }
    }

    let style_name = record.get("Style").unwrap_or_default().trim();
    let Some(base) = fonts
        .styles
        .get(style_name)
        .or_else(|| fonts.styles.get(DEFAULT_STYLE))
        .cloned()
    else {
        debug!("line {line_no}: style {style_name:?} undefined and no Default, renderer default applies");
        return Ok(());
    };
    let text = record.require(line_no, "Text")?;

    let mut current = base.clone();
    fonts.requirements.push(current.clone());
    scan_overrides(text, &base, &mut current, &mut fonts.requirements);
    Ok(())
}

/// Walk every `{...}` block of dialogue text, applying the tags we track.
fn scan_overrides(
    text: &str,
    base: &StyleRecord,
    current: &mut FontRequirement,
    out: &mut Vec<FontRequirement>,
) {
    let mut rest = text;
    while let Some(open) = rest.find('{') {
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            break;
        };

        // Text before the first backslash is not a tag.
        for run in after[..close].split('\\').skip(1) {
            // The first tag we do not track ends the whole block.
            let Some(tag) = OverrideTag::parse(run) else {
                break;
            };
            tag.apply(base, current);
            out.push(current.clone());
        }

        rest = &after[close + 1..];
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OverrideTag<'a> {
    Bold(bool),
    Italic(bool),
    /// Empty means back to the style's own font.
    FontName(&'a str),
}

impl<'a> OverrideTag<'a> {
    fn parse(run: &'a str) -> Option<Self> {
        let tag = if run.starts_with("b1") {
            OverrideTag::Bold(true)
        } else if run.starts_with("b0") {
            OverrideTag::Bold(false)
        } else if run.starts_with("i1") {
            OverrideTag::Italic(true)
        } else if run.starts_with("i0") {
            OverrideTag::Italic(false)
        } else if let Some(name) = run.strip_prefix("fn") {
            OverrideTag::FontName(name.trim())
        } else {
            return None;
        };
        Some(tag)
    }

    fn apply(self, base: &StyleRecord, current: &mut FontRequirement) {
        match self {
            OverrideTag::Bold(on) => current.bold = on,
            OverrideTag::Italic(on) => current.italic = on,
            OverrideTag::FontName("") => current.font_name = base.font_name.clone(),
            OverrideTag::FontName(name) => current.font_name = strip_vertical(name),
        }
    }
}

fn note_embedded(fonts: &mut SubtitleFonts, line: &str) {
    if let Some((kind, name)) = line.split_once(':') {
        if kind.trim().eq_ignore_ascii_case("fontname") {
            fonts.embedded.push(name.trim().to_string());
        }
    }
}

/// Drop the `@` that marks vertical text layout.
fn strip_vertical(name: &str) -> String {
    let name = name.trim();
    name.strip_prefix('@').unwrap_or(name).trim().to_string()
}

/// ASS booleans are `-1`/`0`; anything non-empty other than `0` counts as set.
fn flag(value: &str) -> bool {
    let value = value.trim();
    !(value.is_empty() || value == "0")
}
