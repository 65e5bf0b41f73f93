//! Subtitle byte decoding (made by FontLab https://www.fontlab.com/)
//!
//! - A byte order mark, when present, decides the encoding and is stripped.
//! - Otherwise valid UTF-8 is taken as is.
//! - Otherwise UTF-16LE/BE are tried and kept if the text opens with `[Script Info]`.
//! - Otherwise a fixed list of CJK legacy code pages is tried, first clean decode wins.

use encoding_rs::{Encoding, BIG5, EUC_KR, GB18030, SHIFT_JIS, UTF_16BE, UTF_16LE, UTF_8};
use log::warn;

use crate::error::{ShelfError, ShelfResult};

const SCRIPT_INFO: &str = "[script info]";

/// Legacy code pages tried when nothing else fits, in order.
pub const FALLBACK_ENCODINGS: [&Encoding; 4] = [GB18030, BIG5, SHIFT_JIS, EUC_KR];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bom {
    Utf8,
    Utf16Le,
    Utf16Be,
    Utf32Le,
    Utf32Be,
    Utf7,
    Utf1,
    Gb18030,
}

impl Bom {
    fn sniff(bytes: &[u8]) -> Option<(Bom, usize)> {
        // UTF-32LE must be tested before UTF-16LE: it shares the first two bytes.
        let found = match bytes {
            [0xFF, 0xFE, 0x00, 0x00, ..] => (Bom::Utf32Le, 4),
            [0x00, 0x00, 0xFE, 0xFF, ..] => (Bom::Utf32Be, 4),
            [0xEF, 0xBB, 0xBF, ..] => (Bom::Utf8, 3),
            [0xFF, 0xFE, ..] => (Bom::Utf16Le, 2),
            [0xFE, 0xFF, ..] => (Bom::Utf16Be, 2),
            [0x2B, 0x2F, 0x76, 0x38 | 0x39 | 0x2B | 0x2F, ..] => (Bom::Utf7, 0),
            [0xF7, 0x64, 0x4C, ..] => (Bom::Utf1, 3),
            [0x84, 0x31, 0x95, 0x33, ..] => (Bom::Gb18030, 4),
            _ => return None,
        };
        Some(found)
    }
}

/// Turn raw subtitle bytes into text, or explain why we could not.
pub fn decode_subtitle(bytes: &[u8]) -> ShelfResult<String> {
    if let Some((bom, len)) = Bom::sniff(bytes) {
        let body = &bytes[len..];
        return match bom {
            Bom::Utf8 => strict(UTF_8, body),
            Bom::Utf16Le => strict(UTF_16LE, body),
            Bom::Utf16Be => strict(UTF_16BE, body),
            Bom::Gb18030 => strict(GB18030, body),
            Bom::Utf32Le => decode_utf32(body, u32::from_le_bytes),
            Bom::Utf32Be => decode_utf32(body, u32::from_be_bytes),
            Bom::Utf7 => decode_utf7(body)
                .map(|text| text.trim_start_matches('\u{feff}').to_string())
                .ok_or_else(|| ShelfError::Encoding("invalid UTF-7 data".to_string())),
            Bom::Utf1 => Err(ShelfError::Encoding(
                "UTF-1 byte order mark found, UTF-1 is not supported".to_string(),
            )),
        };
    }

    // ASCII-only UTF-16 is also valid UTF-8, NULs and all.
    let utf8 = std::str::from_utf8(bytes).ok();
    if let Some(text) = utf8.filter(|text| !text.contains('\0') || opens_with_script_info(text)) {
        return Ok(text.to_string());
    }

    for encoding in [UTF_16LE, UTF_16BE] {
        let (text, had_errors) = encoding.decode_without_bom_handling(bytes);
        if !had_errors && opens_with_script_info(&text) {
            warn!("unusual encoding: {}", encoding.name());
            return Ok(text.into_owned());
        }
    }

    if let Some(text) = utf8 {
        return Ok(text.to_string());
    }

    for encoding in FALLBACK_ENCODINGS {
        if let Some(text) = encoding.decode_without_bom_handling_and_without_replacement(bytes) {
            warn!("unusual encoding: {}", encoding.name());
            return Ok(text.into_owned());
        }
    }

    Err(ShelfError::Encoding("unknown encoding".to_string()))
}

/// True when the first non-blank text is `[Script Info]`, in any case.
pub fn opens_with_script_info(text: &str) -> bool {
    text.trim_start_matches('\u{feff}')
        .trim_start()
        .get(..SCRIPT_INFO.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(SCRIPT_INFO))
}

fn strict(encoding: &'static Encoding, body: &[u8]) -> ShelfResult<String> {
    encoding
        .decode_without_bom_handling_and_without_replacement(body)
        .map(|text| text.into_owned())
        .ok_or_else(|| ShelfError::Encoding(format!("invalid {} data", encoding.name())))
}

fn decode_utf32(body: &[u8], word: fn([u8; 4]) -> u32) -> ShelfResult<String> {
    let chunks = body.chunks_exact(4);
    if !chunks.remainder().is_empty() {
        return Err(ShelfError::Encoding("truncated UTF-32 data".to_string()));
    }

    chunks
        .map(|c| char::from_u32(word([c[0], c[1], c[2], c[3]])))
        .collect::<Option<String>>()
        .ok_or_else(|| ShelfError::Encoding("invalid UTF-32 code point".to_string()))
}

/// RFC 2152 decoding: ASCII passes through, `+...-` runs are modified base64 of UTF-16.
fn decode_utf7(bytes: &[u8]) -> Option<String> {
    fn sextet(b: u8) -> Option<u32> {
        Some(match b {
            b'A'..=b'Z' => b - b'A',
            b'a'..=b'z' => b - b'a' + 26,
            b'0'..=b'9' => b - b'0' + 52,
            b'+' => 62,
            b'/' => 63,
            _ => return None,
        } as u32)
    }

    let mut out = String::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b != b'+' {
            if !b.is_ascii() {
                return None;
            }
            out.push(b as char);
            i += 1;
            continue;
        }

        i += 1;
        if bytes.get(i) == Some(&b'-') {
            out.push('+');
            i += 1;
            continue;
        }

        let mut units = Vec::new();
        let (mut bits, mut nbits) = (0u32, 0u32);
        while let Some(value) = bytes.get(i).and_then(|&b| sextet(b)) {
            bits = (bits << 6) | value;
            nbits += 6;
            if nbits >= 16 {
                nbits -= 16;
                units.push((bits >> nbits) as u16);
                bits &= (1 << nbits) - 1;
            }
            i += 1;
        }
        if bytes.get(i) == Some(&b'-') {
            i += 1;
        }

        for ch in char::decode_utf16(units) {
            out.push(ch.ok()?);
        }
    }

    Some(out)
}
