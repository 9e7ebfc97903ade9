use std::cmp::Ordering;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use super::format::{encode_entry, encode_group, Tuple, MAX_GROUP_BYTES};
use super::sort::{ExternalSorter, SortRecord, Sorted};
use super::{image_path, GLOBAL_DATA_SUFFIX, GLOBAL_INDEX_SUFFIX, TERM_DATA_SUFFIX, TERM_INDEX_SUFFIX};
use crate::config::BuilderConfig;
use crate::error::{QuarryError, Result};
use crate::types::{group_of, sub_id_of, validate_id, DocId};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TermRecord {
    term: String,
    id: DocId,
    position: u16,
    value: i32,
}

impl SortRecord for TermRecord {
    fn cmp_key(&self, other: &Self) -> Ordering {
        self.term
            .cmp(&other.term)
            .then(self.id.cmp(&other.id))
            .then(self.position.cmp(&other.position))
    }

    fn approx_bytes(&self) -> usize {
        std::mem::size_of::<Self>() + self.term.len()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GlobalRecord {
    id: DocId,
    data: Vec<u8>,
}

impl SortRecord for GlobalRecord {
    fn cmp_key(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }

    fn approx_bytes(&self) -> usize {
        std::mem::size_of::<Self>() + self.data.len()
    }
}

/// Counts reported by [`IndexBuilder::finish`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildStats {
    pub terms: usize,
    pub groups: usize,
    /// Distinct (term, id) pairs
    pub postings: usize,
    pub globals: usize,
    /// Sort runs spilled to disk across both sorters
    pub spilled_runs: usize,
}

/// Accepts postings and per-id blobs in any order and writes the image files
/// `<base>_gbl_idx`, `<base>_gbl`, `<base>_term_idx` and `<base>_term_data`.
///
/// Input is sorted externally within the configured memory budget. For
/// duplicate `(term, id, position)` tuples, and duplicate global ids, the
/// first one added wins.
pub struct IndexBuilder {
    base: PathBuf,
    config: BuilderConfig,
    terms: ExternalSorter<TermRecord>,
    globals: ExternalSorter<GlobalRecord>,
}

impl IndexBuilder {
    pub fn new(base: impl Into<PathBuf>, config: BuilderConfig) -> Self {
        let run_dir = config.run_dir.as_deref();
        let terms = ExternalSorter::new("terms", config.term_buffer_bytes, run_dir);
        let globals = ExternalSorter::new("globals", config.global_buffer_bytes, run_dir);
        Self {
            base: base.into(),
            config,
            terms,
            globals,
        }
    }

    /// Add one occurrence of `term` in `id`. Positions beyond the configured
    /// maximum are ignored.
    pub fn term(&mut self, id: DocId, value: i32, position: u16, term: &str) -> Result<()> {
        validate_id(id)?;
        if term.contains('\0') {
            return Err(QuarryError::InvalidTerm(term.to_string()));
        }
        if position > self.config.max_position {
            return Ok(());
        }
        self.terms.push(TermRecord {
            term: term.to_string(),
            id,
            position,
            value,
        })
    }

    /// Add `term` plus `prefix*` for every prefix of it at least
    /// `min_prefix` bytes long, the full term included
    pub fn wildcard_term(
        &mut self,
        id: DocId,
        value: i32,
        position: u16,
        min_prefix: usize,
        term: &str,
    ) -> Result<()> {
        self.term(id, value, position, term)?;
        for len in (min_prefix..=term.len()).rev() {
            if !term.is_char_boundary(len) {
                continue;
            }
            self.term(id, value, position, &format!("{}*", &term[..len]))?;
        }
        Ok(())
    }

    /// Attach an opaque blob to `id`
    pub fn global(&mut self, id: DocId, data: &[u8]) -> Result<()> {
        validate_id(id)?;
        if u32::try_from(data.len()).is_err() {
            return Err(QuarryError::PostingTooLarge {
                term: format!("global {}", id),
                bytes: data.len(),
            });
        }
        self.globals.push(GlobalRecord {
            id,
            data: data.to_vec(),
        })
    }

    /// Sort everything added and write the image
    pub fn finish(self) -> Result<BuildStats> {
        let mut stats = BuildStats {
            spilled_runs: self.terms.run_count() + self.globals.run_count(),
            ..BuildStats::default()
        };
        stats.globals = write_globals(&self.base, self.globals.finish()?)?;
        write_terms(&self.base, self.terms.finish()?, &mut stats)?;

        info!(
            base = %self.base.display(),
            terms = stats.terms,
            groups = stats.groups,
            postings = stats.postings,
            globals = stats.globals,
            spilled_runs = stats.spilled_runs,
            "index image written"
        );
        Ok(stats)
    }
}

fn create(base: &Path, suffix: &str) -> Result<BufWriter<File>> {
    Ok(BufWriter::new(File::create(image_path(base, suffix))?))
}

/// One u64 offset per id from 0 up to the largest id, 0 where absent. Each
/// offset points just past the blob's u32 length prefix.
fn write_globals(base: &Path, mut records: Sorted<GlobalRecord>) -> Result<usize> {
    let mut index = create(base, GLOBAL_INDEX_SUFFIX)?;
    let mut data = create(base, GLOBAL_DATA_SUFFIX)?;
    let mut offset: u64 = 4;
    let mut next_id: DocId = 0;
    let mut count = 0;

    while let Some(record) = records.next_unique()? {
        while next_id < record.id {
            index.write_all(&0u64.to_le_bytes())?;
            next_id += 1;
        }
        index.write_all(&offset.to_le_bytes())?;
        data.write_all(&(record.data.len() as u32).to_le_bytes())?;
        data.write_all(&record.data)?;
        offset += 4 + record.data.len() as u64;
        next_id += 1;
        count += 1;
    }

    index.flush()?;
    data.flush()?;
    Ok(count)
}

fn write_terms(base: &Path, mut records: Sorted<TermRecord>, stats: &mut BuildStats) -> Result<()> {
    let mut index = create(base, TERM_INDEX_SUFFIX)?;
    let mut data = create(base, TERM_DATA_SUFFIX)?;
    let mut offset: u64 = 4;
    let mut postings: Vec<(DocId, Tuple)> = Vec::new();
    let mut body = Vec::new();
    let mut pending = records.next_unique()?;

    while let Some(first) = pending.take() {
        postings.clear();
        let term = first.term;
        postings.push((first.id, Tuple { position: first.position, value: first.value }));
        loop {
            match records.next_unique()? {
                Some(record) if record.term == term => {
                    postings.push((record.id, Tuple { position: record.position, value: record.value }));
                }
                other => {
                    pending = other;
                    break;
                }
            }
        }

        body.clear();
        let encoded = encode_term(&term, &postings, &mut body)?;
        let len = u32::try_from(body.len()).map_err(|_| QuarryError::PostingTooLarge {
            term: term.clone(),
            bytes: body.len(),
        })?;

        index.write_all(term.as_bytes())?;
        index.write_all(&[0])?;
        index.write_all(&offset.to_le_bytes())?;
        index.write_all(&encoded.max_term_size.to_le_bytes())?;
        data.write_all(&len.to_le_bytes())?;
        data.write_all(&body)?;
        offset += 4 + body.len() as u64;

        stats.terms += 1;
        stats.groups += encoded.groups;
        stats.postings += encoded.ids;
    }

    index.flush()?;
    data.flush()?;
    Ok(())
}

struct EncodedTerm {
    groups: usize,
    ids: usize,
    /// Longest position list of any id
    max_term_size: u32,
}

/// Consecutive runs of items sharing a key
fn runs<'a, T, K: PartialEq>(items: &'a [T], key: impl Fn(&T) -> K + 'a) -> impl Iterator<Item = &'a [T]> + 'a {
    let mut rest = items;
    std::iter::from_fn(move || {
        let first = rest.first()?;
        let k = key(first);
        let len = rest.iter().take_while(|item| key(item) == k).count();
        let (run, tail) = rest.split_at(len);
        rest = tail;
        Some(run)
    })
}

fn encode_term(term: &str, postings: &[(DocId, Tuple)], out: &mut Vec<u8>) -> Result<EncodedTerm> {
    let mut encoded = EncodedTerm {
        groups: 0,
        ids: 0,
        max_term_size: 0,
    };
    let mut group_body = Vec::new();
    let mut tuples = Vec::new();

    for group in runs(postings, |p| group_of(p.0)) {
        group_body.clear();
        for entry in runs(group, |p| p.0) {
            tuples.clear();
            tuples.extend(entry.iter().map(|p| p.1));
            if tuples.len() > 1 || tuples[0].position != 0 {
                encoded.max_term_size = encoded.max_term_size.max(tuples.len() as u32);
            }
            encode_entry(&mut group_body, sub_id_of(entry[0].0), &tuples);
            encoded.ids += 1;
        }
        if group_body.len() > MAX_GROUP_BYTES {
            return Err(QuarryError::PostingTooLarge {
                term: term.to_string(),
                bytes: group_body.len(),
            });
        }
        encode_group(out, group_of(group[0].0), &group_body);
        encoded.groups += 1;
    }
    Ok(encoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn read(base: &Path, suffix: &str) -> Vec<u8> {
        fs::read(image_path(base, suffix)).unwrap()
    }

    #[test]
    fn test_global_files() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("idx");
        let mut builder = IndexBuilder::new(&base, BuilderConfig::default());
        builder.global(3, b"three").unwrap();
        builder.global(1, b"one").unwrap();
        builder.global(3, b"again").unwrap();
        let stats = builder.finish().unwrap();
        assert_eq!(stats.globals, 2);

        let index = read(&base, GLOBAL_INDEX_SUFFIX);
        let offsets: Vec<u64> = index
            .chunks(8)
            .map(|c| u64::from_le_bytes(c.try_into().unwrap()))
            .collect();
        assert_eq!(offsets, vec![0, 4, 0, 4 + 3 + 4]);

        let data = read(&base, GLOBAL_DATA_SUFFIX);
        assert_eq!(&data[offsets[3] as usize..offsets[3] as usize + 5], b"three");
    }

    #[test]
    fn test_term_files() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("idx");
        let mut builder = IndexBuilder::new(&base, BuilderConfig::default());
        builder.term(5, 0, 0, "dog").unwrap();
        builder.term(5, 2, 0, "cat").unwrap();
        builder.term(6, 0, 4, "cat").unwrap();
        builder.term(6, 0, 9, "cat").unwrap();
        let stats = builder.finish().unwrap();
        assert_eq!(stats.terms, 2);
        assert_eq!(stats.postings, 3);

        let index = read(&base, TERM_INDEX_SUFFIX);
        assert_eq!(&index[..4], b"cat\0");
        let offset = u64::from_le_bytes(index[4..12].try_into().unwrap());
        let max_term_size = u32::from_le_bytes(index[12..16].try_into().unwrap());
        assert_eq!(offset, 4);
        assert_eq!(max_term_size, 2);
        assert_eq!(&index[16..20], b"dog\0");

        let data = read(&base, TERM_DATA_SUFFIX);
        let len = u32::from_le_bytes(data[..4].try_into().unwrap()) as usize;
        // group 0 header, value entry for 5, list entry of two positions for 6
        assert_eq!(len, 3 + 2 + 2 + 4);
    }

    #[test]
    fn test_rejects_bad_input() {
        let dir = tempfile::tempdir().unwrap();
        let mut builder = IndexBuilder::new(dir.path().join("idx"), BuilderConfig::default());
        assert!(matches!(builder.term(0, 0, 0, "x"), Err(QuarryError::InvalidId(0))));
        assert!(matches!(builder.term(1, 0, 0, "a\0b"), Err(QuarryError::InvalidTerm(_))));
        assert!(builder.global(0, b"").is_err());
        // out of range positions are skipped, not errors
        builder.term(1, 0, 0x4000, "x").unwrap();
        assert_eq!(builder.finish().unwrap().terms, 0);
    }

    #[test]
    fn test_wildcard_prefixes() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("idx");
        let mut builder = IndexBuilder::new(&base, BuilderConfig::default());
        builder.wildcard_term(1, 0, 0, 2, "cats").unwrap();
        let stats = builder.finish().unwrap();
        // cats, cats*, cat*, ca*
        assert_eq!(stats.terms, 4);
    }

    #[test]
    fn test_spilling_builder() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("idx");
        let config = BuilderConfig::default()
            .with_buffer_bytes(256)
            .with_run_dir(dir.path());
        let mut builder = IndexBuilder::new(&base, config);
        for id in 1..=500u32 {
            builder.term(id, 0, 1, if id % 2 == 0 { "even" } else { "odd" }).unwrap();
        }
        let stats = builder.finish().unwrap();
        assert!(stats.spilled_runs > 0);
        assert_eq!(stats.terms, 2);
        assert_eq!(stats.postings, 500);
    }
}
