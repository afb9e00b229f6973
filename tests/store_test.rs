// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! Store integration tests: engine verbs + codec + recovery + rotation.
//!
//! Run with: `cargo test`

use std::io::{Cursor, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use tempfile::TempDir;

use caskdb::config::Config;
use caskdb::error::CaskError;
use caskdb::kernel::Kernel;
use caskdb::storage::keydir::{KeyDir, Locator};
use caskdb::storage::pos::{ReaderWithPos, WriterWithPos};
use caskdb::storage::record::{Record, RECORD_HEADER_SIZE};
use caskdb::storage::segment::{GenAllocator, SEGMENT_EXT};
use caskdb::store::Cask;

fn tmp_dir() -> TempDir {
    tempfile::tempdir().expect("create tempdir")
}

fn open_store(dir: &TempDir) -> Cask {
    Cask::open_at(Config::default(), dir.path()).expect("open store")
}

fn small_config(max_file_size: u64) -> Config {
    let mut config = Config::default();
    config.storage.max_file_size = max_file_size;
    config
}

/// All segment files under `dir`, sorted by generation.
fn segment_files(dir: &TempDir) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir.path())
        .expect("read dir")
        .map(|e| e.expect("dir entry").path())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some(SEGMENT_EXT))
        .collect();
    files.sort();
    files
}

fn assert_key_not_found(err: CaskError, key: &[u8]) {
    match err {
        CaskError::KeyNotFound(k) => assert_eq!(k, key.to_vec()),
        other => panic!("expected KeyNotFound, got {other}"),
    }
}

// ───────────────────────────── engine verbs ─────────────────────────────────

#[test]
fn test_set_and_get() {
    let dir = tmp_dir();
    let mut store = open_store(&dir);

    store.set(b"yuuka", b"my wife").expect("set");
    assert_eq!(store.get(b"yuuka").expect("get"), b"my wife");
    assert!(store.contains(b"yuuka").expect("contains"));
}

#[test]
fn test_overwrite_returns_latest() {
    let dir = tmp_dir();
    let mut store = open_store(&dir);

    store.set(b"yuuka", b"my wife").expect("set");
    store.set(b"yuuka", b"my wife!").expect("overwrite");
    assert_eq!(store.get(b"yuuka").expect("get"), b"my wife!");
}

#[test]
fn test_get_missing_key() {
    let dir = tmp_dir();
    let mut store = open_store(&dir);

    assert_key_not_found(store.get(b"no").unwrap_err(), b"no");
    assert!(!store.contains(b"no").expect("contains"));
}

#[test]
fn test_remove() {
    let dir = tmp_dir();
    let mut store = open_store(&dir);

    store.set(b"yuuka", b"my wife").expect("set");
    assert!(store.remove(b"yuuka").expect("remove"));

    assert_key_not_found(store.get(b"yuuka").unwrap_err(), b"yuuka");
    assert!(!store.contains(b"yuuka").expect("contains"));

    // Second delete finds nothing and performs no I/O.
    assert!(!store.remove(b"yuuka").expect("remove again"));
}

#[test]
fn test_remove_missing_returns_false() {
    let dir = tmp_dir();
    let mut store = open_store(&dir);

    assert!(!store.remove(b"never-set").expect("remove"));
}

#[test]
fn test_remove_with_get() {
    let dir = tmp_dir();
    let mut store = open_store(&dir);

    store.set(b"yuuka", b"my wife").expect("set");
    assert_eq!(
        store.remove_with_get(b"yuuka").expect("take"),
        Some(b"my wife".to_vec())
    );

    assert_key_not_found(store.get(b"yuuka").unwrap_err(), b"yuuka");
    assert_eq!(store.remove_with_get(b"yuuka").expect("take again"), None);
}

#[test]
fn test_empty_key_rejected() {
    let dir = tmp_dir();
    let mut store = open_store(&dir);

    assert!(matches!(store.set(b"", b"value"), Err(CaskError::EmptyKey)));
}

#[test]
fn test_sync_on_write() {
    let dir = tmp_dir();
    let mut config = Config::default();
    config.storage.sync_on_write = true;

    let mut store = Cask::open_at(config, dir.path()).expect("open");
    store.set(b"durable", b"yes").expect("set");
    store.sync().expect("explicit sync");
    assert_eq!(store.get(b"durable").expect("get"), b"yes");
}

// ───────────────────────────── recovery ─────────────────────────────────────

#[test]
fn test_restart_recovery() {
    let dir = tmp_dir();

    // Phase 1: mixed workload, then "crash" (drop the store).
    {
        let mut store = open_store(&dir);
        store.set(b"alpha", b"1").expect("set");
        store.set(b"beta", b"2").expect("set");
        store.set(b"alpha", b"1-final").expect("overwrite");
        store.set(b"gamma", b"3").expect("set");
        store.remove(b"beta").expect("remove");
    }

    // Phase 2: reopen and verify answers match the pre-close state.
    {
        let mut store = open_store(&dir);
        assert_eq!(store.get(b"alpha").expect("get"), b"1-final");
        assert_eq!(store.get(b"gamma").expect("get"), b"3");
        assert_key_not_found(store.get(b"beta").unwrap_err(), b"beta");
        assert!(!store.contains(b"beta").expect("contains"));
        assert_eq!(store.stats().live_keys, 2);
    }
}

#[test]
fn test_set_after_reopen() {
    let dir = tmp_dir();

    {
        let mut store = open_store(&dir);
        store.set(b"first", b"before restart").expect("set");
    }
    {
        // Appends must land after the recovered tail, not clobber it.
        let mut store = open_store(&dir);
        store.set(b"second", b"after restart").expect("set");
        assert_eq!(store.get(b"first").expect("get"), b"before restart");
    }
    {
        let mut store = open_store(&dir);
        assert_eq!(store.get(b"first").expect("get"), b"before restart");
        assert_eq!(store.get(b"second").expect("get"), b"after restart");
    }
}

#[test]
fn test_truncated_tail_ignored() {
    let dir = tmp_dir();

    {
        let mut store = open_store(&dir);
        store.set(b"alpha", b"one").expect("set");
        store.set(b"beta", b"two").expect("set");
    }

    // Simulate a crash mid-append: garbage shorter than a header at the tail.
    let files = segment_files(&dir);
    assert_eq!(files.len(), 1);
    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .open(&files[0])
        .expect("open segment");
    file.write_all(&[0xAB; 11]).expect("append garbage");
    drop(file);

    let mut store = open_store(&dir);
    assert_eq!(store.get(b"alpha").expect("get"), b"one");
    assert_eq!(store.get(b"beta").expect("get"), b"two");
}

#[test]
fn test_corruption_halts_segment_replay() {
    let dir = tmp_dir();

    {
        let mut store = open_store(&dir);
        store.set(b"alpha", b"one").expect("set");
        store.set(b"beta", b"two").expect("set");
    }

    // Flip one byte inside the first record's value. Replay must stop at the
    // CRC mismatch, which also makes the (intact) second record unreachable.
    let files = segment_files(&dir);
    let mut bytes = std::fs::read(&files[0]).expect("read segment");
    let first_value_off = RECORD_HEADER_SIZE as usize + b"alpha".len();
    bytes[first_value_off] ^= 0xFF;
    std::fs::write(&files[0], &bytes).expect("write segment");

    let mut store = open_store(&dir);
    assert_eq!(store.stats().live_keys, 0);
    assert_key_not_found(store.get(b"alpha").unwrap_err(), b"alpha");
    assert_key_not_found(store.get(b"beta").unwrap_err(), b"beta");
}

// ───────────────────────────── rotation ─────────────────────────────────────

#[test]
fn test_rotation_on_size_threshold() {
    let dir = tmp_dir();
    // Header is 28 bytes, keys are 2 bytes, values 10 bytes: one record is 40
    // bytes, so every second append crosses the 64-byte threshold.
    let mut store = Cask::open_at(small_config(64), dir.path()).expect("open");

    let mut last_gen = store.stats().current_gen;
    let mut rotations = 0;
    for i in 0..6u8 {
        let key = [b'k', b'0' + i];
        store.set(&key, &[i; 10]).expect("set");
        let gen = store.stats().current_gen;
        if gen != last_gen {
            assert!(gen > last_gen, "generations must be strictly increasing");
            rotations += 1;
            last_gen = gen;
        }
    }

    assert!(rotations >= 2, "expected at least two rotations, saw {rotations}");
    assert_eq!(segment_files(&dir).len(), store.stats().segments);
    assert!(store.stats().segments >= 3);

    // Every key resolves, wherever its segment ended up.
    for i in 0..6u8 {
        let key = [b'k', b'0' + i];
        assert_eq!(store.get(&key).expect("get"), vec![i; 10]);
    }
}

#[test]
fn test_recovery_across_rotated_segments() {
    let dir = tmp_dir();

    {
        let mut store = Cask::open_at(small_config(64), dir.path()).expect("open");
        for i in 0..6u8 {
            let key = [b'k', b'0' + i];
            store.set(&key, &[i; 10]).expect("set");
        }
        store.set(b"k0", b"overwritten").expect("overwrite");
        store.remove(b"k1").expect("remove");
    }

    let mut store = Cask::open_at(small_config(64), dir.path()).expect("reopen");
    assert_eq!(store.get(b"k0").expect("get"), b"overwritten");
    assert_key_not_found(store.get(b"k1").unwrap_err(), b"k1");
    for i in 2..6u8 {
        let key = [b'k', b'0' + i];
        assert_eq!(store.get(&key).expect("get"), vec![i; 10]);
    }
}

// ───────────────────────────── record codec ─────────────────────────────────

#[test]
fn test_record_round_trip() {
    let record = Record::new(b"yuuka".to_vec(), b"my wife".to_vec());
    let encoded = record.encode();
    assert_eq!(encoded.len() as u64, record.encoded_len());

    let decoded = Record::decode(&mut Cursor::new(&encoded))
        .expect("decode")
        .expect("record present");
    assert_eq!(decoded, record);
    assert!(!decoded.is_tombstone());

    let tombstone = Record::tombstone(b"yuuka".to_vec());
    let decoded = Record::decode(&mut Cursor::new(tombstone.encode()))
        .expect("decode")
        .expect("record present");
    assert!(decoded.is_tombstone());
    assert_eq!(decoded.key, b"yuuka");
}

#[test]
fn test_record_decode_errors() {
    // Clean EOF before any header byte is not an error.
    assert!(Record::decode(&mut Cursor::new(Vec::new())).expect("eof").is_none());

    let encoded = Record::new(b"key".to_vec(), b"value".to_vec()).encode();

    // Header cut short.
    let res = Record::decode(&mut Cursor::new(&encoded[..20]));
    assert!(matches!(res, Err(CaskError::Corrupt(_))), "short header: {res:?}");

    // Payload cut short.
    let res = Record::decode(&mut Cursor::new(&encoded[..encoded.len() - 2]));
    assert!(matches!(res, Err(CaskError::Corrupt(_))), "short payload: {res:?}");

    // Flipped value byte fails the CRC.
    let mut corrupt = encoded.clone();
    let last = corrupt.len() - 1;
    corrupt[last] ^= 0x01;
    let res = Record::decode(&mut Cursor::new(&corrupt));
    assert!(matches!(res, Err(CaskError::Corrupt(_))), "crc: {res:?}");
}

// ───────────────────────────── keydir ───────────────────────────────────────

#[test]
fn test_keydir_orders_by_length_then_bytes() {
    let mut keydir = KeyDir::new();
    let locator = Locator { gen: 1, value_len: 0, offset: 0, timestamp: 0 };

    for key in [&b"bb"[..], b"a", b"z", b"ab"] {
        keydir.insert(key.to_vec(), locator);
    }

    let keys: Vec<&[u8]> = keydir.keys().collect();
    assert_eq!(keys, vec![&b"a"[..], b"z", b"ab", b"bb"]);
}

#[test]
fn test_keydir_last_insert_wins() {
    let mut keydir = KeyDir::new();
    keydir.insert(b"k".to_vec(), Locator { gen: 1, value_len: 3, offset: 40, timestamp: 1 });
    keydir.insert(b"k".to_vec(), Locator { gen: 2, value_len: 5, offset: 80, timestamp: 2 });

    assert_eq!(keydir.len(), 1);
    let locator = keydir.get(b"k").expect("locator");
    assert_eq!(locator.gen, 2);
    assert_eq!(locator.offset, 80);

    assert!(keydir.remove(b"k").is_some());
    assert!(keydir.is_empty());
    assert!(!keydir.contains(b"k"));
}

// ───────────────────────────── position I/O ─────────────────────────────────

#[test]
fn test_writer_with_pos() {
    let mut writer = WriterWithPos::new(Cursor::new(Vec::new())).expect("wrap");
    assert_eq!(writer.pos(), 0);

    writer.write_all(b"Hello, this is a test content.").expect("write");
    assert_eq!(writer.pos(), 30);

    // Positional write does not move the logical position.
    writer.write_at(0, b"HELLO").expect("write_at");
    assert_eq!(writer.pos(), 30);

    let pos = writer.seek(SeekFrom::Start(5)).expect("seek");
    assert_eq!(pos, 5);
    assert_eq!(writer.pos(), 5);
    let pos = writer.seek(SeekFrom::Current(3)).expect("seek");
    assert_eq!(pos, 8);

    assert!(writer.get_ref().get_ref().starts_with(b"HELLO, this is a test content."));
}

#[test]
fn test_reader_with_pos() {
    let content = b"Hello, this is a test content.".to_vec();
    let mut reader = ReaderWithPos::new(Cursor::new(content)).expect("wrap");

    let mut buf = [0u8; 10];
    reader.read_exact(&mut buf).expect("read");
    assert_eq!(reader.pos(), 10);

    // Positional read does not move the logical position.
    let mut at = [0u8; 4];
    reader.read_at(7, &mut at).expect("read_at");
    assert_eq!(&at, b"this");
    assert_eq!(reader.pos(), 10);

    let pos = reader.seek(SeekFrom::Start(5)).expect("seek");
    assert_eq!(pos, 5);
    let pos = reader.seek(SeekFrom::Current(3)).expect("seek");
    assert_eq!(pos, 8);
    assert_eq!(reader.pos(), 8);
}

// ───────────────────────────── generations ──────────────────────────────────

#[test]
fn test_gen_allocator_monotonic() {
    let gens = GenAllocator::new(100);
    assert_eq!(gens.alloc(), 101);
    assert_eq!(gens.alloc(), 102);
    assert_eq!(gens.alloc(), 103);
}
