//! Font collection unpacking (made by FontLab https://www.fontlab.com/)
//!
//! Splits a `ttcf` collection into standalone sfnt buffers. Each face gets its
//! own copy of every table it references, packed contiguously on 4-byte
//! boundaries, with `head.checkSumAdjustment` recomputed for the new file.

use log::warn;

use crate::error::{ShelfError, ShelfResult};

/// Leading tag of a TrueType/OpenType collection.
pub const COLLECTION_TAG: [u8; 4] = *b"ttcf";

/// Whole-file checksum every sfnt must reach once `checkSumAdjustment` is set.
pub const CHECKSUM_MAGIC: u32 = 0xB1B0_AFBA;

const OFFSET_TABLE_LEN: usize = 12;
const TABLE_RECORD_LEN: usize = 16;
const HEAD_ADJUSTMENT_OFFSET: usize = 8;

/// Returns true when the buffer starts with the collection tag.
pub fn is_collection(data: &[u8]) -> bool {
    data.get(..4) == Some(&COLLECTION_TAG[..])
}

/// Unpack every face of a collection, handing each finished buffer to `on_face`.
///
/// Returns `Ok(false)` when `data` is not a collection at all; the caller then
/// treats the whole buffer as a single face. What the callback does with a
/// face has no bearing on the return value.
pub fn unpack_collection<F>(data: &[u8], mut on_face: F) -> ShelfResult<bool>
where
    F: FnMut(usize, Vec<u8>),
{
    if !is_collection(data) {
        return Ok(false);
    }

    let face_count = read_u32(data, 8)? as usize;
    for index in 0..face_count {
        let header_offset = read_u32(data, 12 + index * 4)? as usize;
        let face = extract_face(data, header_offset)?;
        on_face(index, face);
    }

    Ok(true)
}

/// Rebuild one face whose offset table starts at `header_offset`.
pub fn extract_face(data: &[u8], header_offset: usize) -> ShelfResult<Vec<u8>> {
    let table_count = read_u16(data, header_offset.saturating_add(4))? as usize;
    let header_len = OFFSET_TABLE_LEN + table_count * TABLE_RECORD_LEN;
    let header = slice(data, header_offset, header_len)?;

    let mut tables = Vec::with_capacity(table_count);
    let mut declared_len = 0usize;
    let mut head_index = None;
    for i in 0..table_count {
        let record = OFFSET_TABLE_LEN + i * TABLE_RECORD_LEN;
        let tag = &header[record..record + 4];
        let offset = read_u32(header, record + 8)? as usize;
        let length = read_u32(header, record + 12)? as usize;
        slice(data, offset, length)?;

        // Tables of one face never overlap, so together they fit in the file.
        declared_len = declared_len
            .checked_add(length)
            .filter(|total| *total <= data.len())
            .ok_or_else(|| {
                ShelfError::Parse(format!(
                    "face at offset {header_offset} declares more table data than the {} byte collection",
                    data.len()
                ))
            })?;
        if head_index.is_none() && tag == b"head" {
            head_index = Some(i);
        }
        tables.push((offset, length));
    }

    let payload_len: usize = tables.iter().map(|&(_, length)| align4(length)).sum();
    let mut face = vec![0u8; header_len + payload_len];
    face[..header_len].copy_from_slice(header);

    let mut cursor = header_len;
    let mut adjustment_at = None;
    for (i, &(offset, length)) in tables.iter().enumerate() {
        let record = OFFSET_TABLE_LEN + i * TABLE_RECORD_LEN;
        let new_offset = u32::try_from(cursor)
            .map_err(|_| ShelfError::Internal(format!("face too large: table at {cursor}")))?;
        face[record + 8..record + 12].copy_from_slice(&new_offset.to_be_bytes());
        face[cursor..cursor + length].copy_from_slice(slice(data, offset, length)?);

        if head_index == Some(i) {
            if length >= HEAD_ADJUSTMENT_OFFSET + 4 {
                adjustment_at = Some(cursor + HEAD_ADJUSTMENT_OFFSET);
            } else {
                warn!("head table is only {length} bytes, cannot hold checkSumAdjustment");
            }
        }
        cursor += align4(length);
    }

    match adjustment_at {
        Some(at) => {
            face[at..at + 4].fill(0);
            let adjustment = CHECKSUM_MAGIC.wrapping_sub(checksum(&face)?);
            face[at..at + 4].copy_from_slice(&adjustment.to_be_bytes());
        }
        None => warn!(
            "unable to find checkSumAdjustment (head table) for face at offset {header_offset}"
        ),
    }

    Ok(face)
}

/// Sum of all big-endian 32-bit words, wrapping at 2^32.
pub fn checksum(buf: &[u8]) -> ShelfResult<u32> {
    if buf.len() % 4 != 0 {
        return Err(ShelfError::Internal(format!(
            "checksum over {} bytes, not a multiple of 4",
            buf.len()
        )));
    }

    Ok(buf
        .chunks_exact(4)
        .map(|word| u32::from_be_bytes([word[0], word[1], word[2], word[3]]))
        .fold(0u32, u32::wrapping_add))
}

fn align4(n: usize) -> usize {
    (n + 3) & !3
}

fn slice(data: &[u8], offset: usize, len: usize) -> ShelfResult<&[u8]> {
    offset
        .checked_add(len)
        .and_then(|end| data.get(offset..end))
        .ok_or_else(|| {
            ShelfError::Parse(format!(
                "collection truncated: need {len} bytes at offset {offset}, have {}",
                data.len()
            ))
        })
}

fn read_u16(data: &[u8], offset: usize) -> ShelfResult<u16> {
    let bytes = slice(data, offset, 2)?;
    Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
}

fn read_u32(data: &[u8], offset: usize) -> ShelfResult<u32> {
    let bytes = slice(data, offset, 4)?;
    Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}
