// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! Bitcask store: binds the segment set, the keydir, and the membership
//! filter behind the [`Kernel`] verbs.
//!
//! ```text
//! set/remove ──→ record codec ──→ current segment (append) ──→ keydir + filter
//! get        ──→ filter ──→ keydir ──→ positional read on the locator's segment
//! open       ──→ replay segments in generation order, rebuilding keydir + filter
//! ```
//!
//! Writes append to the tail of the current segment; once its write position
//! reaches `max_file_size` the set rotates to a fresh generation. Stale
//! values and tombstones stay on disk — only the in-memory index forgets
//! them — so the log grows until the store directory is rebuilt by hand.

use std::io::{Seek, SeekFrom};
use std::path::Path;

use bloomfilter::Bloom;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{CaskError, Result};
use crate::kernel::Kernel;
use crate::storage::keydir::{KeyDir, Locator};
use crate::storage::record::Record;
use crate::storage::segment::SegmentSet;

/// Snapshot of the store's shape, for status reporting.
#[derive(Debug, Clone, Copy)]
pub struct Stats {
    /// Keys currently resolvable through the index.
    pub live_keys: usize,
    /// Segments known to this process lifetime.
    pub segments: usize,
    /// Generation accepting appends.
    pub current_gen: u64,
    /// Write position within the current segment.
    pub write_pos: u64,
}

/// An open Bitcask store. All verbs must be externally serialized; the store
/// performs no locking of its own.
pub struct Cask {
    segments: SegmentSet,
    keydir: KeyDir,
    filter: Bloom<[u8]>,
    max_file_size: u64,
    sync_on_write: bool,
}

impl Cask {
    /// Open (or create) the store at the configured directory.
    pub fn open(config: Config) -> Result<Self> {
        let dir = config.storage.dir.clone();
        Self::open_at(config, dir)
    }

    /// Open (or create) the store at an explicit directory, overriding the
    /// configured one.
    pub fn open_at(config: Config, dir: impl AsRef<Path>) -> Result<Self> {
        config.validate()?;

        let mut filter = Bloom::new_for_fp_rate(
            config.storage.filter_capacity,
            config.storage.filter_fp_rate,
        )
        .map_err(|e| CaskError::Config(format!("membership filter: {e}")))?;

        let (mut segments, existing) = SegmentSet::open(dir.as_ref())?;
        let mut keydir = KeyDir::new();
        for &gen in &existing {
            replay_segment(&mut segments, gen, &mut keydir, &mut filter)?;
        }

        info!(
            live_keys = keydir.len(),
            segments = segments.segment_count(),
            current_gen = segments.current_gen(),
            "Store recovered"
        );

        Ok(Self {
            segments,
            keydir,
            filter,
            max_file_size: config.storage.max_file_size,
            sync_on_write: config.storage.sync_on_write,
        })
    }

    /// Force buffered appends to disk.
    pub fn sync(&self) -> Result<()> {
        self.segments.sync()
    }

    pub fn stats(&self) -> Stats {
        Stats {
            live_keys: self.keydir.len(),
            segments: self.segments.segment_count(),
            current_gen: self.segments.current_gen(),
            write_pos: self.segments.write_pos(),
        }
    }

    /// Append one record and return the write position after it. The index
    /// is only touched by the caller once this has succeeded, so a failed
    /// append leaves no partial visibility.
    fn append_record(&mut self, record: &Record) -> Result<u64> {
        let end = self.segments.append(&record.encode())?;
        if self.sync_on_write {
            self.segments.sync()?;
        }
        Ok(end)
    }

    /// Rotate once the current segment has reached the size threshold.
    fn maybe_rotate(&mut self) -> Result<()> {
        if self.segments.write_pos() >= self.max_file_size {
            self.segments.rotate()?;
        }
        Ok(())
    }
}

impl Kernel for Cask {
    fn get(&mut self, key: &[u8]) -> Result<Vec<u8>> {
        if !self.filter.check(key) {
            return Err(CaskError::KeyNotFound(key.to_vec()));
        }
        let loc = match self.keydir.get(key) {
            Some(loc) => *loc,
            None => return Err(CaskError::KeyNotFound(key.to_vec())),
        };
        self.segments.read_at(loc.gen, loc.offset, loc.value_len)
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        if key.is_empty() {
            return Err(CaskError::EmptyKey);
        }

        let record = Record::new(key.to_vec(), value.to_vec());
        let end = self.append_record(&record)?;

        self.filter.set(key);
        let value_len = record.value.len() as u64;
        self.keydir.insert(
            record.key,
            Locator {
                gen: self.segments.current_gen(),
                value_len,
                offset: end - value_len,
                timestamp: record.timestamp,
            },
        );
        debug!(key_len = key.len(), value_len, gen = self.segments.current_gen(), "Value appended");

        self.maybe_rotate()
    }

    fn remove(&mut self, key: &[u8]) -> Result<bool> {
        if !self.filter.check(key) || !self.keydir.contains(key) {
            return Ok(false);
        }

        let record = Record::tombstone(key.to_vec());
        self.append_record(&record)?;

        self.filter.set(key);
        self.keydir.remove(key);
        debug!(key_len = key.len(), gen = self.segments.current_gen(), "Tombstone appended");

        self.maybe_rotate()?;
        Ok(true)
    }

    fn remove_with_get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        if !self.filter.check(key) || !self.keydir.contains(key) {
            return Ok(None);
        }
        let value = self.get(key)?;
        self.remove(key)?;
        Ok(Some(value))
    }

    fn contains(&self, key: &[u8]) -> Result<bool> {
        if !self.filter.check(key) {
            return Ok(false);
        }
        Ok(self.keydir.contains(key))
    }
}

/// Walk one segment from offset 0, folding each decoded record into the
/// keydir and the filter. The first decode error is the segment's truncation
/// point: replay of this segment stops there, later segments still replay.
fn replay_segment(
    segments: &mut SegmentSet,
    gen: u64,
    keydir: &mut KeyDir,
    filter: &mut Bloom<[u8]>,
) -> Result<()> {
    let reader = segments.reader_mut(gen).ok_or_else(|| {
        CaskError::Corrupt(format!("no read handle for generation {gen}"))
    })?;
    reader.seek(SeekFrom::Start(0))?;

    let mut records = 0usize;
    loop {
        match Record::decode(reader) {
            Ok(Some(record)) => {
                records += 1;
                filter.set(&record.key);
                if record.is_tombstone() {
                    keydir.remove(&record.key);
                } else {
                    let value_len = record.value.len() as u64;
                    keydir.insert(
                        record.key,
                        Locator {
                            gen,
                            value_len,
                            offset: reader.pos() - value_len,
                            timestamp: record.timestamp,
                        },
                    );
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!(gen, records, error = %e, "Replay halted at truncated record");
                break;
            }
        }
    }

    reader.seek(SeekFrom::Start(0))?;
    debug!(gen, records, "Segment replayed");
    Ok(())
}
