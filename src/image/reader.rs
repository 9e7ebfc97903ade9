use std::fs::File;
use std::io::{self, Read};
use std::ops::{Deref, Range};
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use tracing::info;

use super::cursor::ImageTermCursor;
use super::format::{decode_entry, decode_group, decode_list};
use super::{image_path, GLOBAL_DATA_SUFFIX, GLOBAL_INDEX_SUFFIX, TERM_DATA_SUFFIX, TERM_INDEX_SUFFIX};
use crate::config::ImageConfig;
use crate::cursor::{wildcard, BoxCursor, EmptyCursor};
use crate::error::{QuarryError, Result};
use crate::query::CursorSource;
use crate::types::DocId;

/// Bytes of one image file, mapped or read
enum Region {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl Deref for Region {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            Region::Mapped(map) => map,
            Region::Owned(bytes) => bytes,
        }
    }
}

impl Region {
    fn load(path: &Path, use_mmap: bool) -> Result<Self> {
        let mut file = File::open(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => QuarryError::corrupt(path, "missing file"),
            _ => QuarryError::Io(e),
        })?;
        let len = file.metadata()?.len();
        if use_mmap && len > 0 {
            // SAFETY: image files are written once by the builder and never
            // modified while loaded
            let map = unsafe { Mmap::map(&file)? };
            return Ok(Region::Mapped(map));
        }
        let mut bytes = Vec::with_capacity(len as usize);
        file.read_to_end(&mut bytes)?;
        Ok(Region::Owned(bytes))
    }
}

fn read_u32(data: &[u8], at: usize) -> Option<u32> {
    Some(u32::from_le_bytes(data.get(at..at + 4)?.try_into().ok()?))
}

fn read_u64(data: &[u8], at: usize) -> Option<u64> {
    Some(u64::from_le_bytes(data.get(at..at + 8)?.try_into().ok()?))
}

/// Find the `len`-prefixed region starting at `offset`
fn prefixed(data: &[u8], offset: u64) -> Option<Range<usize>> {
    let start = usize::try_from(offset).ok()?;
    let len = read_u32(data, start.checked_sub(4)?)? as usize;
    let end = start.checked_add(len)?;
    (end <= data.len()).then_some(start..end)
}

struct TermSlot {
    name: Range<usize>,
    data: Range<usize>,
    max_term_size: u32,
}

/// A loaded, immutable index image.
///
/// Lookups binary-search the term index; cursors decode postings directly
/// from the file bytes. An image is `Send + Sync` and may be queried from
/// many threads at once.
pub struct Image {
    base: PathBuf,
    global_index: Region,
    global_data: Region,
    term_index: Region,
    term_data: Region,
    terms: Vec<TermSlot>,
}

impl Image {
    /// Load and validate the four image files written for `base`
    pub fn open(base: impl AsRef<Path>, config: &ImageConfig) -> Result<Self> {
        let base = base.as_ref();
        let load = |suffix: &str| Region::load(&image_path(base, suffix), config.use_mmap);
        let image = Self {
            base: base.to_path_buf(),
            global_index: load(GLOBAL_INDEX_SUFFIX)?,
            global_data: load(GLOBAL_DATA_SUFFIX)?,
            term_index: load(TERM_INDEX_SUFFIX)?,
            term_data: load(TERM_DATA_SUFFIX)?,
            terms: Vec::new(),
        };
        image.with_validated_index(config)
    }

    fn corrupt(&self, suffix: &str, reason: impl Into<String>) -> QuarryError {
        QuarryError::corrupt(image_path(&self.base, suffix), reason)
    }

    fn with_validated_index(mut self, config: &ImageConfig) -> Result<Self> {
        if self.global_index.len() % 8 != 0 {
            return Err(self.corrupt(GLOBAL_INDEX_SUFFIX, "length is not a multiple of 8"));
        }
        let mut globals = 0usize;
        for (id, chunk) in self.global_index.chunks_exact(8).enumerate() {
            let offset = read_u64(chunk, 0).unwrap_or_default();
            if offset == 0 {
                continue;
            }
            if prefixed(&self.global_data, offset).is_none() {
                return Err(self.corrupt(GLOBAL_DATA_SUFFIX, format!("global {} out of range", id)));
            }
            globals += 1;
        }

        let mut terms = Vec::new();
        let mut at = 0;
        while at < self.term_index.len() {
            let index = &self.term_index[..];
            let Some(nul) = index[at..].iter().position(|&b| b == 0) else {
                return Err(self.corrupt(TERM_INDEX_SUFFIX, "unterminated term"));
            };
            let name = at..at + nul;
            if std::str::from_utf8(&index[name.clone()]).is_err() {
                return Err(self.corrupt(TERM_INDEX_SUFFIX, format!("term at {} is not UTF-8", at)));
            }
            let fields = name.end + 1;
            let (Some(offset), Some(max_term_size)) = (read_u64(index, fields), read_u32(index, fields + 8)) else {
                return Err(self.corrupt(TERM_INDEX_SUFFIX, "truncated entry"));
            };
            let Some(data) = prefixed(&self.term_data, offset) else {
                return Err(self.corrupt(TERM_DATA_SUFFIX, format!("term at {} out of range", at)));
            };
            if let Some(prev) = terms.last().map(|slot: &TermSlot| &index[slot.name.clone()]) {
                if prev >= &index[name.clone()] {
                    return Err(self.corrupt(TERM_INDEX_SUFFIX, "terms out of order"));
                }
            }
            terms.push(TermSlot {
                name,
                data,
                max_term_size,
            });
            at = fields + 12;
        }
        self.terms = terms;

        if config.verify_groups {
            for slot in &self.terms {
                if let Err(reason) = verify_term(&self.term_data[slot.data.clone()]) {
                    let term = self.slot_name(slot);
                    return Err(self.corrupt(TERM_DATA_SUFFIX, format!("term {:?}: {}", term, reason)));
                }
            }
        }

        info!(
            base = %self.base.display(),
            terms = self.terms.len(),
            globals,
            term_data_bytes = self.term_data.len(),
            global_data_bytes = self.global_data.len(),
            "index image loaded"
        );
        Ok(self)
    }

    fn slot_name(&self, slot: &TermSlot) -> &str {
        std::str::from_utf8(&self.term_index[slot.name.clone()]).unwrap_or_default()
    }

    fn find(&self, term: &str) -> Option<&TermSlot> {
        let index = &self.term_index[..];
        self.terms
            .binary_search_by(|slot| index[slot.name.clone()].cmp(term.as_bytes()))
            .ok()
            .map(|i| &self.terms[i])
    }

    /// Blob attached to `id`
    pub fn global(&self, id: DocId) -> Option<&[u8]> {
        let offset = read_u64(&self.global_index, (id as usize).checked_mul(8)?)?;
        if offset == 0 {
            return None;
        }
        prefixed(&self.global_data, offset).map(|range| &self.global_data[range])
    }

    pub fn term_count(&self) -> usize {
        self.terms.len()
    }

    /// Every term in sorted order
    pub fn terms(&self) -> impl Iterator<Item = &str> + '_ {
        self.terms.iter().map(|slot| self.slot_name(slot))
    }

    pub fn contains_term(&self, term: &str) -> bool {
        self.find(term).is_some()
    }

    /// Longest position list of any id under `term`
    pub fn max_group_size(&self, term: &str) -> Option<u32> {
        self.find(term).map(|slot| slot.max_term_size)
    }

    fn open_cursor(&self, slot: &TermSlot) -> ImageTermCursor<'_> {
        ImageTermCursor::new(
            self.slot_name(slot),
            &self.term_data[slot.data.clone()],
            slot.max_term_size,
        )
    }

    /// Cursor over one term, `None` for an unknown term
    pub fn term_cursor(&self, term: &str) -> Option<ImageTermCursor<'_>> {
        self.find(term).map(|slot| self.open_cursor(slot))
    }

    /// Union over every term starting with `prefix`. The scan also covers
    /// `prefix*` terms written by
    /// [`IndexBuilder::wildcard_term`](super::IndexBuilder::wildcard_term),
    /// so ids added with plain [`IndexBuilder::term`](super::IndexBuilder::term)
    /// still match.
    pub fn prefix_cursor(&self, prefix: &str) -> BoxCursor<'_> {
        let index = &self.term_index[..];
        let first = self
            .terms
            .partition_point(|slot| &index[slot.name.clone()] < prefix.as_bytes());
        let cursors = self.terms[first..]
            .iter()
            .take_while(|slot| index[slot.name.clone()].starts_with(prefix.as_bytes()))
            .map(|slot| Box::new(self.open_cursor(slot)) as BoxCursor<'_>)
            .collect();
        wildcard(cursors)
    }
}

impl CursorSource for Image {
    fn term_cursor(&self, term: &str) -> BoxCursor<'_> {
        match Image::term_cursor(self, term) {
            Some(cursor) => Box::new(cursor),
            None => Box::new(EmptyCursor),
        }
    }

    fn prefix_cursor(&self, prefix: &str) -> BoxCursor<'_> {
        Image::prefix_cursor(self, prefix)
    }
}

/// Walk every group and entry of one term's data
fn verify_term(data: &[u8]) -> std::result::Result<(), String> {
    let mut at = 0;
    let mut last_group: Option<u16> = None;
    let (mut positions, mut values) = (Vec::new(), Vec::new());
    while at < data.len() {
        let header = decode_group(data, at).ok_or_else(|| format!("bad group header at {}", at))?;
        if last_group.map_or(false, |last| last >= header.group) {
            return Err(format!("group {} out of order", header.group));
        }
        last_group = Some(header.group);

        let mut entry_at = header.start;
        let mut last_sub: Option<u16> = None;
        while entry_at < header.end {
            let entry = decode_entry(data, entry_at, header.end)
                .ok_or_else(|| format!("bad entry at {}", entry_at))?;
            if last_sub.map_or(false, |last| last >= entry.sub_id) {
                return Err(format!("entry at {} out of order", entry_at));
            }
            if !entry.list.is_empty() && !decode_list(entry.list, &mut positions, &mut values) {
                return Err(format!("bad position list at {}", entry_at));
            }
            last_sub = Some(entry.sub_id);
            entry_at = entry.next;
        }
        at = header.end;
    }
    Ok(())
}
