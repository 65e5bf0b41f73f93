//! Synthetic sfnt buffers for integration tests.
#![allow(dead_code)]

pub const EN: u16 = 0x0409;
pub const ZH: u16 = 0x0804;

pub type Table = ([u8; 4], Vec<u8>);

/// A face with English family, subfamily and version names.
pub fn face(family: &str, subfamily: &str, version: &str) -> Vec<u8> {
    sfnt(&face_tables(&[(1, EN, family), (2, EN, subfamily), (5, EN, version)]), false)
}

/// Tables of a minimal face: `head` plus a Windows-platform `name` table.
pub fn face_tables(names: &[(u16, u16, &str)]) -> Vec<Table> {
    vec![(*b"head", head_table()), (*b"name", name_table(names))]
}

pub fn head_table() -> Vec<u8> {
    let mut head = vec![0u8; 54];
    head[0..4].copy_from_slice(&0x0001_0000u32.to_be_bytes());
    head[4..8].copy_from_slice(&0x0001_0000u32.to_be_bytes());
    head[12..16].copy_from_slice(&0x5F0F_3CF5u32.to_be_bytes());
    head[18..20].copy_from_slice(&1000u16.to_be_bytes());
    head
}

/// Format 0 `name` table, Windows Unicode BMP records.
pub fn name_table(records: &[(u16, u16, &str)]) -> Vec<u8> {
    let mut sorted: Vec<_> = records.to_vec();
    sorted.sort_by_key(|(name_id, language, _)| (*language, *name_id));

    let mut strings = Vec::new();
    let mut out = Vec::new();
    out.extend_from_slice(&0u16.to_be_bytes());
    out.extend_from_slice(&(sorted.len() as u16).to_be_bytes());
    out.extend_from_slice(&(6 + 12 * sorted.len() as u16).to_be_bytes());
    for (name_id, language, text) in sorted {
        let encoded: Vec<u8> = text.encode_utf16().flat_map(u16::to_be_bytes).collect();
        for field in [3, 1, language, name_id, encoded.len() as u16, strings.len() as u16] {
            out.extend_from_slice(&field.to_be_bytes());
        }
        strings.extend(encoded);
    }
    out.extend(strings);
    out
}

/// Standalone sfnt with tables in the given order.
pub fn sfnt(tables: &[Table], cff: bool) -> Vec<u8> {
    let header_len = 12 + tables.len() * 16;
    let mut out = Vec::new();
    out.extend_from_slice(if cff { b"OTTO" } else { &[0, 1, 0, 0] });
    out.extend_from_slice(&(tables.len() as u16).to_be_bytes());
    out.extend_from_slice(&[0u8; 6]);

    let mut data = Vec::new();
    for (tag, bytes) in tables {
        out.extend_from_slice(tag);
        out.extend_from_slice(&0u32.to_be_bytes());
        out.extend_from_slice(&((header_len + data.len()) as u32).to_be_bytes());
        out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
        data.extend_from_slice(bytes);
        pad4(&mut data);
    }
    out.extend(data);
    out
}

/// A `ttcf` collection; table data follows every directory, unshared.
pub fn collection(faces: &[Vec<Table>]) -> Vec<u8> {
    let header_len = 12 + faces.len() * 4;
    let directories_len: usize = faces.iter().map(|f| 12 + f.len() * 16).sum();

    let mut out = Vec::new();
    out.extend_from_slice(b"ttcf");
    out.extend_from_slice(&0x0001_0000u32.to_be_bytes());
    out.extend_from_slice(&(faces.len() as u32).to_be_bytes());
    let mut dir_cursor = header_len;
    for face in faces {
        out.extend_from_slice(&(dir_cursor as u32).to_be_bytes());
        dir_cursor += 12 + face.len() * 16;
    }

    let mut data = Vec::new();
    for face in faces {
        out.extend_from_slice(&[0, 1, 0, 0]);
        out.extend_from_slice(&(face.len() as u16).to_be_bytes());
        out.extend_from_slice(&[0u8; 6]);
        for (tag, bytes) in face {
            out.extend_from_slice(tag);
            out.extend_from_slice(&0u32.to_be_bytes());
            out.extend_from_slice(&((header_len + directories_len + data.len()) as u32).to_be_bytes());
            out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
            data.extend_from_slice(bytes);
            pad4(&mut data);
        }
    }
    out.extend(data);
    out
}

fn pad4(buf: &mut Vec<u8>) {
    while buf.len() % 4 != 0 {
        buf.push(0);
    }
}
