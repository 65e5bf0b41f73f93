//! Version arbitration between a candidate face and the stored one
//! (made by FontLab https://www.fontlab.com/)

use std::cmp::Ordering;
use std::sync::OnceLock;

use log::warn;
use regex::Regex;

use crate::error::{ShelfError, ShelfResult};

/// What to do with a candidate face whose storage slot may already be taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Nothing stored yet.
    Fresh,
    /// Something stored, overwritten because of the force flag.
    Forced,
    /// Raw version strings are identical.
    Identical,
    /// Different spelling, same version once cleaned.
    EquivalentAfterClean,
    /// Candidate is older or equal.
    NotNewer,
    /// Candidate is strictly newer.
    Newer,
}

impl Verdict {
    pub fn installs(self) -> bool {
        matches!(self, Verdict::Fresh | Verdict::Forced | Verdict::Newer)
    }
}

/// Decide whether `candidate` replaces `existing` (`None` when nothing is stored).
///
/// Fails when neither string is identical nor orderable.
pub fn arbitrate(candidate: &str, existing: Option<&str>, force: bool) -> ShelfResult<Verdict> {
    let Some(existing) = existing else {
        return Ok(Verdict::Fresh);
    };

    if force {
        warn!("force install over stored version {existing:?}");
        return Ok(Verdict::Forced);
    }

    if candidate == existing {
        return Ok(Verdict::Identical);
    }

    let cleaned_candidate = clean_version(candidate);
    let cleaned_existing = clean_version(existing);
    if cleaned_candidate == cleaned_existing {
        warn!("same version after clean: {candidate} == {existing}");
        return Ok(Verdict::EquivalentAfterClean);
    }

    match compare_versions(&cleaned_candidate, &cleaned_existing) {
        Some(Ordering::Greater) => {
            warn!("version greater, overwriting: {candidate} > {existing}");
            Ok(Verdict::Newer)
        }
        Some(_) => {
            warn!("version smaller: {candidate} <= {existing}");
            Ok(Verdict::NotNewer)
        }
        None => Err(ShelfError::VersionCompare {
            candidate: candidate.to_string(),
            existing: existing.to_string(),
        }),
    }
}

/// Reduce a `name` table version string to its dotted numeric core.
///
/// `"Version 2.001; ttfautohint"` → `"2.001"`, `"1.10beta"` → `"1.10"`,
/// anything else is only trimmed.
pub fn clean_version(raw: &str) -> String {
    static PREFIXED: OnceLock<Regex> = OnceLock::new();
    static SUFFIXED: OnceLock<Regex> = OnceLock::new();

    let prefixed = PREFIXED.get_or_init(|| Regex::new(r"[Vv]ersion\s*([\d.]+)").expect("regex"));
    if let Some(caps) = prefixed.captures(raw) {
        return caps[1].to_string();
    }

    let suffixed = SUFFIXED.get_or_init(|| Regex::new(r"^([\d.]+)[a-zA-Z]\w+$").expect("regex"));
    if let Some(caps) = suffixed.captures(raw) {
        return caps[1].to_string();
    }

    raw.trim().to_string()
}

/// Semantic-version style ordering of two cleaned strings.
///
/// Accepts one to four dotted numeric segments (with `x`/`*` wildcards), an
/// optional `-prerelease` and ignored `+build` metadata. `None` when either
/// side does not parse.
pub fn compare_versions(a: &str, b: &str) -> Option<Ordering> {
    let a = ParsedVersion::parse(a)?;
    let b = ParsedVersion::parse(b)?;

    let len = a.segments.len().max(b.segments.len());
    for i in 0..len {
        let left = a.segments.get(i).map_or("0", String::as_str);
        let right = b.segments.get(i).map_or("0", String::as_str);
        match compare_segment(left, right) {
            Ordering::Equal => continue,
            other => return Some(other),
        }
    }

    Some(match (&a.prerelease, &b.prerelease) {
        (Some(left), Some(right)) => {
            let left: Vec<&str> = left.split('.').collect();
            let right: Vec<&str> = right.split('.').collect();
            let len = left.len().max(right.len());
            (0..len)
                .map(|i| {
                    compare_segment(
                        left.get(i).copied().unwrap_or("0"),
                        right.get(i).copied().unwrap_or("0"),
                    )
                })
                .find(|o| o.is_ne())
                .unwrap_or(Ordering::Equal)
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    })
}

struct ParsedVersion {
    segments: Vec<String>,
    prerelease: Option<String>,
}

impl ParsedVersion {
    fn parse(raw: &str) -> Option<Self> {
        static SEMVER: OnceLock<Regex> = OnceLock::new();
        let re = SEMVER.get_or_init(|| {
            Regex::new(
                r"(?i)^[v^~<>=]*?(\d+)(?:\.([x*]|\d+)(?:\.([x*]|\d+)(?:\.([x*]|\d+))?(?:-([\da-z\-]+(?:\.[\da-z\-]+)*))?(?:\+[\da-z\-]+(?:\.[\da-z\-]+)*)?)?)?$",
            )
            .expect("regex")
        });

        let caps = re.captures(raw)?;
        let segments = (1..=4)
            .map_while(|i| caps.get(i).map(|m| m.as_str().to_string()))
            .collect();
        let prerelease = caps.get(5).map(|m| m.as_str().to_string());
        Some(Self {
            segments,
            prerelease,
        })
    }
}

fn compare_segment(a: &str, b: &str) -> Ordering {
    let wildcard = |s: &str| matches!(s, "x" | "X" | "*");
    if wildcard(a) || wildcard(b) {
        return Ordering::Equal;
    }

    let numeric = |s: &str| !s.is_empty() && s.bytes().all(|c| c.is_ascii_digit());
    if numeric(a) && numeric(b) {
        let a = a.trim_start_matches('0');
        let b = b.trim_start_matches('0');
        a.len().cmp(&b.len()).then_with(|| a.cmp(b))
    } else {
        a.cmp(b)
    }
}
