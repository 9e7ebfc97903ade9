//! Document id layout shared by the store, the cursors and the image.
//!
//! An id is a 27-bit integer split into a 15-bit group and a 12-bit sub-id.
//! Postings are blocked per group, so ids sharing a group share storage.

use crate::error::{QuarryError, Result};

/// Document identifier. Zero is the "no match" sentinel.
pub type DocId = u32;

/// Mask selecting the group bits of an id
pub const GROUP_MASK: u32 = 0x7FF_F000;

/// Mask selecting the sub-id bits of an id
pub const SUB_ID_MASK: u32 = 0xFFF;

/// Largest id representable by the group/sub-id split
pub const MAX_ID: DocId = GROUP_MASK | SUB_ID_MASK;

/// Largest position recorded by the builder (14 bits)
pub const MAX_POSITION: u16 = 0x3FFF;

/// Group number of an id
#[inline]
pub fn group_of(id: DocId) -> u16 {
    ((id & GROUP_MASK) >> 12) as u16
}

/// Sub-id of an id within its group
#[inline]
pub fn sub_id_of(id: DocId) -> u16 {
    (id & SUB_ID_MASK) as u16
}

/// Reassemble an id from its group and sub-id
#[inline]
pub fn compose_id(group: u16, sub_id: u16) -> DocId {
    ((group as u32) << 12) | (sub_id as u32 & SUB_ID_MASK)
}

/// Reject the sentinel and ids outside the 27-bit space
pub fn validate_id(id: DocId) -> Result<()> {
    if id == 0 || id > MAX_ID {
        return Err(QuarryError::InvalidId(id));
    }
    Ok(())
}

/// Encode a position list as the little-endian u16 payload term cursors expose
pub fn encode_positions(positions: &[u16]) -> Vec<u8> {
    let mut sorted = positions.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    let mut out = Vec::with_capacity(sorted.len() * 2);
    for pos in sorted {
        out.extend_from_slice(&pos.to_le_bytes());
    }
    out
}

/// Read a payload as little-endian u16 positions. An odd-length payload is
/// not a position list and yields no positions.
pub fn decode_positions(payload: &[u8], out: &mut Vec<u16>) {
    out.clear();
    if payload.len() % 2 != 0 {
        return;
    }
    out.extend(
        payload
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]])),
    );
}
