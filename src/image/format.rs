//! Byte layout of image term data.
//!
//! A term's data is a run of groups. Each group is a u16 group id, a length
//! prefix of 1 to 3 bytes, then its entries. An entry starts with a u16
//! header `sub_id << 4 | control`:
//!
//! ```text
//! control & 8 == 0   value entry
//!     0..=4          the value itself
//!     5 / 6 / 7      u8 / u16 / i32 value follows
//! control & 8 != 0   position list
//!     low bits n>0   list is n + 1 bytes
//!     low bits 0     u32 follows, list is that + 1 bytes
//! ```
//!
//! Each list item is a u16 `position | width << 14` followed by a value of
//! 0, 1, 2 or 4 bytes for width 0, 1, 2, 3.
//!
//! All integers are little-endian.

/// Largest encodable group body
pub const MAX_GROUP_BYTES: usize = 0x3F_FFFF;

const CONTROL_LIST: u16 = 8;
const POSITION_BITS: u16 = 0x3FFF;

/// One (position, value) pair of a posting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Tuple {
    pub position: u16,
    pub value: i32,
}

fn list_width(value: i32) -> (u16, usize) {
    match value {
        0 => (0, 0),
        1..=255 => (1, 1),
        256..=65535 => (2, 2),
        _ => (3, 4),
    }
}

/// Append one entry. A lone tuple at position 0 is stored as a bare value.
pub(crate) fn encode_entry(out: &mut Vec<u8>, sub_id: u16, tuples: &[Tuple]) {
    let header = sub_id << 4;
    if let [Tuple { position: 0, value }] = tuples {
        let value = *value;
        match value {
            0..=4 => out.extend_from_slice(&(header | value as u16).to_le_bytes()),
            5..=255 => {
                out.extend_from_slice(&(header | 5).to_le_bytes());
                out.push(value as u8);
            }
            256..=65535 => {
                out.extend_from_slice(&(header | 6).to_le_bytes());
                out.extend_from_slice(&(value as u16).to_le_bytes());
            }
            _ => {
                out.extend_from_slice(&(header | 7).to_le_bytes());
                out.extend_from_slice(&value.to_le_bytes());
            }
        }
        return;
    }

    let size: usize = tuples.iter().map(|t| 2 + list_width(t.value).1).sum();
    // a list is never shorter than 2 bytes, so size - 1 leaves 0 free as the
    // escape for a 4-byte length
    let stored = size.saturating_sub(1);
    if stored > 7 {
        out.extend_from_slice(&(header | CONTROL_LIST).to_le_bytes());
        out.extend_from_slice(&(stored as u32).to_le_bytes());
    } else {
        out.extend_from_slice(&(header | CONTROL_LIST | stored as u16).to_le_bytes());
    }
    for tuple in tuples {
        let (code, width) = list_width(tuple.value);
        let word = (tuple.position & POSITION_BITS) | code << 14;
        out.extend_from_slice(&word.to_le_bytes());
        out.extend_from_slice(&tuple.value.to_le_bytes()[..width]);
    }
}

/// Append a group. The caller keeps `body` within [`MAX_GROUP_BYTES`].
pub(crate) fn encode_group(out: &mut Vec<u8>, group: u16, body: &[u8]) {
    out.extend_from_slice(&group.to_le_bytes());
    let len = body.len();
    if len <= 63 {
        out.push(len as u8);
    } else if len <= 0x3FFF {
        out.push(0x40 | (len >> 8) as u8);
        out.push((len & 0xFF) as u8);
    } else {
        out.push(0x80 | ((len >> 16) & 0x3F) as u8);
        out.extend_from_slice(&((len & 0xFFFF) as u16).to_le_bytes());
    }
    out.extend_from_slice(body);
}

fn read_u16(data: &[u8], at: usize) -> Option<u16> {
    let bytes = data.get(at..at + 2)?;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}

fn read_u32(data: &[u8], at: usize) -> Option<u32> {
    let bytes = data.get(at..at + 4)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Location of one group inside a term's data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct GroupHeader {
    pub group: u16,
    /// First body byte
    pub start: usize,
    /// One past the last body byte, also where the next group starts
    pub end: usize,
}

pub(crate) fn decode_group(data: &[u8], at: usize) -> Option<GroupHeader> {
    let group = read_u16(data, at)?;
    let lead = *data.get(at + 2)?;
    let (len, start) = match lead >> 6 {
        0 => (lead as usize, at + 3),
        1 => ((((lead & 0x3F) as usize) << 8) | *data.get(at + 3)? as usize, at + 4),
        2 => (
            (((lead & 0x3F) as usize) << 16) | read_u16(data, at + 3)? as usize,
            at + 5,
        ),
        _ => return None,
    };
    let end = start.checked_add(len).filter(|&end| end <= data.len())?;
    Some(GroupHeader { group, start, end })
}

/// One decoded entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ImageEntry<'a> {
    pub sub_id: u16,
    /// The bare value, 0 for position lists
    pub value: i32,
    /// Raw position list, empty for value entries
    pub list: &'a [u8],
    pub next: usize,
}

/// Decode the entry at `at`; `None` if it runs past `end`
pub(crate) fn decode_entry(data: &[u8], at: usize, end: usize) -> Option<ImageEntry<'_>> {
    let data = data.get(..end)?;
    let header = read_u16(data, at)?;
    let sub_id = header >> 4;
    let control = header & 0xF;
    let body = at + 2;

    if control & CONTROL_LIST != 0 {
        let (len, start) = match control & 7 {
            0 => (read_u32(data, body)? as usize + 1, body + 4),
            n => (n as usize + 1, body),
        };
        let next = start.checked_add(len)?;
        let list = data.get(start..next)?;
        return Some(ImageEntry {
            sub_id,
            value: 0,
            list,
            next,
        });
    }

    let (value, next) = match control {
        0..=4 => (control as i32, body),
        5 => (*data.get(body)? as i32, body + 1),
        6 => (read_u16(data, body)? as i32, body + 2),
        _ => (read_u32(data, body)? as i32, body + 4),
    };
    Some(ImageEntry {
        sub_id,
        value,
        list: &[],
        next,
    })
}

/// Expand a position list. Returns false when the list is malformed.
pub(crate) fn decode_list(list: &[u8], positions: &mut Vec<u16>, values: &mut Vec<i32>) -> bool {
    positions.clear();
    values.clear();
    let mut at = 0;
    while at < list.len() {
        let Some(word) = read_u16(list, at) else {
            return false;
        };
        at += 2;
        let (value, width) = match word >> 14 {
            0 => (Some(0), 0),
            1 => (list.get(at).map(|&b| b as i32), 1),
            2 => (read_u16(list, at).map(i32::from), 2),
            _ => (read_u32(list, at).map(|v| v as i32), 4),
        };
        let Some(value) = value else {
            return false;
        };
        at += width;
        positions.push(word & POSITION_BITS);
        values.push(value);
    }
    true
}
