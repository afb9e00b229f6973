// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! Segment set — the generation-numbered append-only files that make up the
//! on-disk log.
//!
//! A store directory holds files named `<gen>.bc`, where `<gen>` is the
//! decimal encoding of a monotonically increasing 64-bit generation. Exactly
//! one segment (the highest generation) is writable; every segment that has
//! existed in this process lifetime keeps a positional read handle so index
//! locators resolve with a single positional read. The writer and the current
//! generation's reader are two distinct `File` views over the same inode.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use tracing::info;

use crate::error::{CaskError, Result};
use crate::storage::pos::{ReaderWithPos, WriterWithPos};

/// File extension of segment files.
pub const SEGMENT_EXT: &str = "bc";

/// Monotonic generation counter. Seeded from the highest generation found on
/// disk, or from the wall-clock epoch seconds when the directory is empty.
#[derive(Debug)]
pub struct GenAllocator {
    last: AtomicU64,
}

impl GenAllocator {
    pub fn new(seed: u64) -> Self {
        Self { last: AtomicU64::new(seed) }
    }

    /// Bump the counter and return the freshly allocated generation.
    pub fn alloc(&self) -> u64 {
        self.last.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// Path of the segment file for `gen` under `dir`.
pub fn segment_path(dir: &Path, gen: u64) -> PathBuf {
    dir.join(format!("{gen}.{SEGMENT_EXT}"))
}

/// Enumerate `*.bc` files under `dir` and return their generations in
/// ascending order. A `.bc` file whose stem is not a decimal u64 aborts the
/// open: the directory is not a store this code understands.
pub fn sorted_generations(dir: &Path) -> Result<Vec<u64>> {
    let mut gens = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some(SEGMENT_EXT) {
            continue;
        }
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
        let gen: u64 = stem.parse().map_err(|_| {
            CaskError::Corrupt(format!("segment file {} has no numeric generation", path.display()))
        })?;
        gens.push(gen);
    }
    gens.sort_unstable();
    Ok(gens)
}

/// All segment files of one store: per-generation read handles plus the
/// single append-only writer on the current segment.
#[derive(Debug)]
pub struct SegmentSet {
    dir: PathBuf,
    readers: HashMap<u64, ReaderWithPos<File>>,
    writer: WriterWithPos<File>,
    current_gen: u64,
    gens: GenAllocator,
}

impl SegmentSet {
    /// Open the segment files under `dir`, creating the directory and an
    /// initial segment if none exist. Returns the set together with the
    /// generations that were already on disk, in replay (ascending) order.
    pub fn open(dir: &Path) -> Result<(Self, Vec<u64>)> {
        fs::create_dir_all(dir)?;
        let existing = sorted_generations(dir)?;

        match existing.last() {
            None => {
                let gens = GenAllocator::new(Utc::now().timestamp() as u64);
                let gen = gens.alloc();
                let (writer, reader) = create_segment(dir, gen)?;
                let mut readers = HashMap::new();
                readers.insert(gen, reader);
                info!(gen, dir = %dir.display(), "Created fresh store");
                let set = Self { dir: dir.to_path_buf(), readers, writer, current_gen: gen, gens };
                Ok((set, existing))
            }
            Some(&last) => {
                let mut readers = HashMap::new();
                for &gen in &existing {
                    let file = File::open(segment_path(dir, gen))?;
                    readers.insert(gen, ReaderWithPos::new(file)?);
                }
                let file = OpenOptions::new().append(true).open(segment_path(dir, last))?;
                let mut writer = WriterWithPos::new(file)?;
                writer.seek(SeekFrom::End(0))?;
                info!(
                    segments = existing.len(),
                    current_gen = last,
                    dir = %dir.display(),
                    "Opened segment set"
                );
                let gens = GenAllocator::new(last);
                let set = Self { dir: dir.to_path_buf(), readers, writer, current_gen: last, gens };
                Ok((set, existing))
            }
        }
    }

    /// Generation of the segment currently accepting appends.
    pub fn current_gen(&self) -> u64 {
        self.current_gen
    }

    /// Logical write position within the current segment.
    pub fn write_pos(&self) -> u64 {
        self.writer.pos()
    }

    /// Number of segments known to this process lifetime.
    pub fn segment_count(&self) -> usize {
        self.readers.len()
    }

    /// Append `buf` to the tail of the current segment. Returns the write
    /// position after the append.
    pub fn append(&mut self, buf: &[u8]) -> Result<u64> {
        self.writer.write_all(buf)?;
        Ok(self.writer.pos())
    }

    /// Close the current segment for writes and open a fresh one under the
    /// next generation. The retired segment keeps serving reads.
    pub fn rotate(&mut self) -> Result<u64> {
        let gen = self.gens.alloc();
        let (writer, reader) = create_segment(&self.dir, gen)?;
        self.writer = writer;
        self.readers.insert(gen, reader);
        self.current_gen = gen;
        info!(gen, "Rotated to new segment");
        Ok(gen)
    }

    /// Positional read of `len` bytes at `offset` within generation `gen`.
    pub fn read_at(&mut self, gen: u64, offset: u64, len: u64) -> Result<Vec<u8>> {
        let reader = self.readers.get_mut(&gen).ok_or_else(|| {
            CaskError::Corrupt(format!("no segment for generation {gen}"))
        })?;
        let mut buf = vec![0u8; len as usize];
        reader.read_at(offset, &mut buf)?;
        Ok(buf)
    }

    /// Sequential read handle for replaying `gen` from the start.
    pub fn reader_mut(&mut self, gen: u64) -> Option<&mut ReaderWithPos<File>> {
        self.readers.get_mut(&gen)
    }

    /// Sync the current segment's data to disk.
    pub fn sync(&self) -> Result<()> {
        self.writer.get_ref().sync_data()?;
        Ok(())
    }
}

fn create_segment(dir: &Path, gen: u64) -> Result<(WriterWithPos<File>, ReaderWithPos<File>)> {
    let path = segment_path(dir, gen);
    let file = OpenOptions::new().create_new(true).append(true).open(&path)?;
    let writer = WriterWithPos::new(file)?;
    let reader = ReaderWithPos::new(File::open(&path)?)?;
    Ok((writer, reader))
}
