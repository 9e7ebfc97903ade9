//! Entry encoding inside external posting blocks.
//!
//! An external block is an ascending run of entries, one per sub-id:
//!
//! ```text
//! u16 LE header = (sub_id << 4) | len_code
//! len_code 0..=6   payload of len_code bytes follows
//! len_code 7       extended length, then the payload:
//!                    byte n (n >= 2)   n payload bytes
//!                    byte 0, u16 LE    16-bit length
//!                    byte 1, u32 LE    32-bit length
//! ```
//!
//! The vector holding the run carries its own length, so blocks need no
//! separate length prefix in memory.

/// Payloads at most this long are stored inline in the group slot
pub const INLINE_CAPACITY: usize = 6;

const EXTENDED: u16 = 7;

/// A decoded view of one entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryRef<'a> {
    pub sub_id: u16,
    pub payload: &'a [u8],
    /// Offset of the entry that follows this one
    pub next: usize,
}

/// Bytes an entry with this payload occupies in a block
pub fn encoded_len(payload_len: usize) -> usize {
    2 + length_prefix_len(payload_len) + payload_len
}

fn length_prefix_len(payload_len: usize) -> usize {
    if payload_len < EXTENDED as usize {
        0
    } else if payload_len <= u8::MAX as usize {
        1
    } else if payload_len <= u16::MAX as usize {
        3
    } else {
        5
    }
}

/// Append one entry to `out`
pub fn encode_entry(sub_id: u16, payload: &[u8], out: &mut Vec<u8>) {
    let len = payload.len();
    let code = if len < EXTENDED as usize {
        len as u16
    } else {
        EXTENDED
    };
    out.extend_from_slice(&((sub_id << 4) | code).to_le_bytes());
    if code == EXTENDED {
        if len <= u8::MAX as usize {
            out.push(len as u8);
        } else if len <= u16::MAX as usize {
            out.push(0);
            out.extend_from_slice(&(len as u16).to_le_bytes());
        } else {
            out.push(1);
            out.extend_from_slice(&(len as u32).to_le_bytes());
        }
    }
    out.extend_from_slice(payload);
}

/// Decode the entry starting at `pos`, `None` at the end of the run or on a
/// truncated entry
pub fn decode_entry(block: &[u8], pos: usize) -> Option<EntryRef<'_>> {
    let header = block.get(pos..pos + 2)?;
    let header = u16::from_le_bytes([header[0], header[1]]);
    let sub_id = header >> 4;
    let code = header & 0xF;
    let mut at = pos + 2;
    let len = if code < EXTENDED {
        code as usize
    } else {
        let marker = *block.get(at)?;
        at += 1;
        match marker {
            0 => {
                let b = block.get(at..at + 2)?;
                at += 2;
                u16::from_le_bytes([b[0], b[1]]) as usize
            }
            1 => {
                let b = block.get(at..at + 4)?;
                at += 4;
                u32::from_le_bytes([b[0], b[1], b[2], b[3]]) as usize
            }
            n => n as usize,
        }
    };
    let payload = block.get(at..at + len)?;
    Some(EntryRef {
        sub_id,
        payload,
        next: at + len,
    })
}

/// Iterate over every entry of a block
pub fn entries(block: &[u8]) -> Entries<'_> {
    Entries { block, pos: 0 }
}

/// Iterator over the entries of a block, yielding `(offset, entry)`
pub struct Entries<'a> {
    block: &'a [u8],
    pos: usize,
}

impl<'a> Iterator for Entries<'a> {
    type Item = (usize, EntryRef<'a>);

    fn next(&mut self) -> Option<Self::Item> {
        let at = self.pos;
        let entry = decode_entry(self.block, at)?;
        self.pos = entry.next;
        Some((at, entry))
    }
}
