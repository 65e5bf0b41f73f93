//! Face identity from the `name` table (made by FontLab https://www.fontlab.com/)

use std::collections::{BTreeMap, HashMap};

use log::warn;
use read_fonts::{FontRef, TableProvider};
use serde::{Deserialize, Serialize};

use crate::error::{ShelfError, ShelfResult};

pub const FAMILY: &str = "fontFamily";
pub const SUBFAMILY: &str = "fontSubfamily";
pub const VERSION: &str = "version";

/// Locales tried, in order, before settling for whatever comes first.
pub const PREFERRED_LOCALES: [&str; 3] = ["en", "zh", "ja"];

/// Locale tag → string for a single name attribute.
pub type LocalizedString = BTreeMap<String, String>;

/// Every name attribute of a face, keyed like `fontFamily` / `version`.
///
/// This is also the sidecar format written next to each stored face.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FontNames(BTreeMap<String, LocalizedString>);

impl FontNames {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&LocalizedString> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: &str, locale: &str, value: impl Into<String>) {
        self.0
            .entry(key.to_string())
            .or_default()
            .insert(locale.to_string(), value.into());
    }

    /// Value of `key` in its own preferred locale, used when reading sidecars.
    pub fn preferred(&self, key: &str) -> Option<&str> {
        let values = self.0.get(key)?;
        let locale = preferred_locale(values)?;
        values.get(locale).map(String::as_str)
    }

    /// Read every attribute the face carries.
    pub fn from_font(font: &FontRef) -> Self {
        let mut names = FontNames::new();
        let Ok(table) = font.name() else {
            return names;
        };

        let data = table.string_data();
        let mut ranks: HashMap<(&'static str, String), u8> = HashMap::new();
        for record in table.name_record() {
            let Some(key) = attribute_key(record.name_id().to_u16()) else {
                continue;
            };
            let platform = record.platform_id();
            let mac_roman = platform == 1 && record.encoding_id() == 0;
            if !record.is_unicode() && !mac_roman {
                continue;
            }
            let Ok(entry) = record.string(data) else {
                continue;
            };

            let locale = locale_tag(platform, record.language_id());
            let rank = platform_rank(platform);
            let slot = (key, locale.clone());
            if ranks.get(&slot).is_some_and(|existing| *existing > rank) {
                continue;
            }
            ranks.insert(slot, rank);
            names.insert(key, &locale, entry.to_string());
        }

        names
    }
}

/// Pick the locale to read an attribute in: `en`, `zh`, `ja`, else the first one.
pub fn preferred_locale(values: &LocalizedString) -> Option<&str> {
    for locale in PREFERRED_LOCALES {
        if values.get(locale).is_some_and(|v| !v.is_empty()) {
            return Some(locale);
        }
    }

    let fallback = values.keys().next()?;
    warn!("abnormal default locale, fallback to {fallback}");
    Some(fallback.as_str())
}

/// The identity of one face: its names plus the locale chosen for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontIdentity {
    names: FontNames,
    locale: String,
}

impl FontIdentity {
    /// Fails with a parse error when no locale carries a family name.
    pub fn from_names(names: FontNames) -> ShelfResult<Self> {
        let locale = names
            .get(FAMILY)
            .and_then(preferred_locale)
            .map(str::to_string)
            .ok_or_else(|| ShelfError::Parse("no family name".to_string()))?;

        Ok(Self { names, locale })
    }

    /// Parse a standalone sfnt buffer.
    pub fn read(data: &[u8]) -> ShelfResult<Self> {
        let font = FontRef::new(data).map_err(|err| ShelfError::Parse(err.to_string()))?;
        Self::from_names(FontNames::from_font(&font))
    }

    pub fn names(&self) -> &FontNames {
        &self.names
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    pub fn family(&self) -> String {
        self.attribute(FAMILY)
    }

    pub fn subfamily(&self) -> String {
        self.attribute(SUBFAMILY)
    }

    pub fn version(&self) -> String {
        self.attribute(VERSION)
    }

    /// Trimmed attribute in the display locale, falling back to any locale, then "".
    pub fn attribute(&self, key: &str) -> String {
        let Some(values) = self.names.get(key) else {
            warn!("unable to read {key}, fallback to empty");
            return String::new();
        };

        if let Some(value) = values.get(&self.locale) {
            return value.trim().to_string();
        }

        match values.iter().next() {
            Some((fallback, value)) => {
                warn!("unable to read {key}.{}, fallback to {fallback}", self.locale);
                value.trim().to_string()
            }
            None => {
                warn!("unable to read {key}, fallback to empty");
                String::new()
            }
        }
    }

    /// Every `(family, subfamily)` pair the face declares, one per family locale.
    ///
    /// A locale without its own subfamily borrows the display subfamily.
    pub fn locale_pairs(&self) -> Vec<(String, String)> {
        let Some(families) = self.names.get(FAMILY) else {
            return Vec::new();
        };
        let subfamilies = self.names.get(SUBFAMILY);
        let display_subfamily = self.subfamily();

        let mut pairs: Vec<(String, String)> = families
            .iter()
            .map(|(locale, family)| {
                let subfamily = subfamilies
                    .and_then(|s| s.get(locale))
                    .map(|s| s.trim().to_string())
                    .unwrap_or_else(|| display_subfamily.clone());
                (family.trim().to_string(), subfamily)
            })
            .filter(|(family, _)| !family.is_empty())
            .collect();
        pairs.dedup();
        pairs
    }
}

fn attribute_key(name_id: u16) -> Option<&'static str> {
    Some(match name_id {
        0 => "copyright",
        1 => FAMILY,
        2 => SUBFAMILY,
        3 => "uniqueID",
        4 => "fullName",
        5 => VERSION,
        6 => "postScriptName",
        7 => "trademark",
        8 => "manufacturer",
        9 => "designer",
        10 => "description",
        11 => "manufacturerURL",
        12 => "designerURL",
        13 => "license",
        14 => "licenseURL",
        16 => "preferredFamily",
        17 => "preferredSubfamily",
        18 => "compatibleFullName",
        19 => "sampleText",
        20 => "postScriptFindFontName",
        21 => "wwsFamily",
        22 => "wwsSubfamily",
        _ => return None,
    })
}

fn platform_rank(platform: u16) -> u8 {
    match platform {
        3 => 2,
        1 => 1,
        _ => 0,
    }
}

/// Map a platform/language pair to a short locale tag.
pub fn locale_tag(platform: u16, language: u16) -> String {
    let known = match platform {
        3 => windows_locale(language),
        1 => mac_locale(language),
        0 => Some("und"),
        _ => None,
    };

    match known {
        Some(tag) => tag.to_string(),
        None if platform == 3 => format!("win-0x{language:04X}"),
        None => format!("p{platform}-{language}"),
    }
}

fn windows_locale(language: u16) -> Option<&'static str> {
    Some(match language {
        0x0409 => "en",
        0x0809 => "en-GB",
        0x0C09 => "en-AU",
        0x1009 => "en-CA",
        0x0804 => "zh",
        0x0404 => "zh-TW",
        0x0C04 => "zh-HK",
        0x1004 => "zh-SG",
        0x1404 => "zh-MO",
        0x0411 => "ja",
        0x0412 => "ko",
        0x0401 => "ar",
        0x0405 => "cs",
        0x0406 => "da",
        0x0407 => "de",
        0x0408 => "el",
        0x0C0A => "es",
        0x040B => "fi",
        0x040C => "fr",
        0x040D => "he",
        0x040E => "hu",
        0x0410 => "it",
        0x0413 => "nl",
        0x0414 => "nb",
        0x0415 => "pl",
        0x0416 => "pt-BR",
        0x0816 => "pt",
        0x0419 => "ru",
        0x041D => "sv",
        0x041E => "th",
        0x041F => "tr",
        0x0422 => "uk",
        0x042A => "vi",
        _ => return None,
    })
}

fn mac_locale(language: u16) -> Option<&'static str> {
    Some(match language {
        0 => "en",
        1 => "fr",
        2 => "de",
        3 => "it",
        4 => "nl",
        5 => "sv",
        6 => "es",
        11 => "ja",
        12 => "ar",
        19 => "zh-Hant",
        23 => "ko",
        32 => "ru",
        33 => "zh",
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(entries: &[(&str, &str, &str)]) -> FontNames {
        let mut names = FontNames::new();
        for (key, locale, value) in entries {
            names.insert(key, locale, *value);
        }
        names
    }

    #[test]
    fn prefers_english_then_chinese_then_japanese() {
        let identity = FontIdentity::from_names(names(&[
            (FAMILY, "ja", "ヒラギノ"),
            (FAMILY, "zh", "冬青黑体"),
            (SUBFAMILY, "zh", "常规"),
        ]))
        .expect("identity");

        assert_eq!(identity.locale(), "zh");
        assert_eq!(identity.family(), "冬青黑体");
        assert_eq!(identity.subfamily(), "常规");
    }

    #[test]
    fn falls_back_to_first_locale() {
        let identity =
            FontIdentity::from_names(names(&[(FAMILY, "ko", "나눔"), (FAMILY, "fr", "Nanum")]))
                .expect("identity");
        assert_eq!(identity.locale(), "fr");
    }

    #[test]
    fn missing_family_is_a_parse_error() {
        let err = FontIdentity::from_names(names(&[(SUBFAMILY, "en", "Bold")])).unwrap_err();
        assert!(matches!(err, ShelfError::Parse(ref m) if m == "no family name"));
    }

    #[test]
    fn attribute_falls_back_per_key() {
        let identity = FontIdentity::from_names(names(&[
            (FAMILY, "en", "  Source Han  "),
            (SUBFAMILY, "ja", "Bold"),
        ]))
        .expect("identity");

        assert_eq!(identity.family(), "Source Han");
        assert_eq!(identity.subfamily(), "Bold");
        assert_eq!(identity.version(), "");
    }

    #[test]
    fn locale_pairs_cover_every_family_locale() {
        let identity = FontIdentity::from_names(names(&[
            (FAMILY, "en", "Hiragino Sans"),
            (FAMILY, "ja", "ヒラギノ角ゴシック"),
            (SUBFAMILY, "en", "W3"),
        ]))
        .expect("identity");

        assert_eq!(
            identity.locale_pairs(),
            vec![
                ("Hiragino Sans".to_string(), "W3".to_string()),
                ("ヒラギノ角ゴシック".to_string(), "W3".to_string()),
            ]
        );
    }

    #[test]
    fn sidecar_round_trips_through_json() {
        let original = names(&[(FAMILY, "en", "Alpha"), (VERSION, "en", "Version 1.0")]);
        let json = serde_json::to_string(&original).expect("serialize");
        assert!(json.contains("\"fontFamily\":{\"en\":\"Alpha\"}"));

        let parsed: FontNames = serde_json::from_str(&json).expect("parse");
        assert_eq!(parsed.preferred(VERSION), Some("Version 1.0"));
    }

    #[test]
    fn locale_tags_cover_both_platforms() {
        assert_eq!(locale_tag(3, 0x0409), "en");
        assert_eq!(locale_tag(3, 0x0804), "zh");
        assert_eq!(locale_tag(1, 11), "ja");
        assert_eq!(locale_tag(3, 0x0456), "win-0x0456");
    }
}
