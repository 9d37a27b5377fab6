//! End-to-end extraction over a synthetic two-shard archive.

use std::fs;
use std::path::Path;

use parking_lot::Mutex;
use pakdump::archive::{
    IndexEnd, IndexReader, ShardStore, COUNT_OFFSET, RECORDS_OFFSET, RECORD_HEADER_SIZE,
};
use pakdump::sniff::FileType;
use pakdump::{
    ExtractOptions, ExtractionEvent, ExtractionStats, Extractor, Outcome, RunState, Schedule,
    Stage,
};
use rust_lzo::{LZOContext, LZOError};
use tempfile::TempDir;

const CODE_NONE: i32 = 0;
const CODE_LZO: i32 = 3;

fn record(code: i32, decompressed_length: usize, payload: &[u8]) -> Vec<u8> {
    let mut raw = vec![0u8; RECORD_HEADER_SIZE];
    raw[12..16].copy_from_slice(&(decompressed_length as i32).to_le_bytes());
    raw[28..32].copy_from_slice(&(payload.len() as i32).to_le_bytes());
    raw[36..40].copy_from_slice(&code.to_le_bytes());
    raw.extend_from_slice(payload);
    raw
}

fn lzo(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(rust_lzo::worst_compress(input.len()));
    let err = LZOContext::new().compress(input, &mut out);
    assert!(matches!(err, LZOError::OK));
    out
}

struct Locator {
    token: u64,
    offset: i64,
    length: i32,
}

fn write_index(path: &Path, declared: u32, locators: &[Locator], tail: &[u8]) {
    let mut index = vec![0u8; RECORDS_OFFSET as usize];
    let count = COUNT_OFFSET as usize;
    index[count..count + 4].copy_from_slice(&declared.to_le_bytes());
    for loc in locators {
        index.extend_from_slice(&loc.token.to_be_bytes());
        index.extend_from_slice(&loc.offset.to_le_bytes());
        index.extend_from_slice(&loc.length.to_le_bytes());
    }
    index.extend_from_slice(tail);
    fs::write(path, index).unwrap();
}

struct Archive {
    dir: TempDir,
    xml: Vec<u8>,
    png: Vec<u8>,
    json: Vec<u8>,
}

/// Two shards holding four good records, plus three locators that fail at
/// different stages and a seven-byte partial locator at the end.
fn build_archive() -> Archive {
    let dir = TempDir::new().unwrap();

    let mut xml = b"<?xml version=\"1.0\"?><root>".to_vec();
    for _ in 0..200 {
        xml.extend_from_slice(b"<item value=\"1\"/>");
    }
    xml.extend_from_slice(b"</root>");
    let png = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR\0\0\0\x01".to_vec();
    let json = br#"{"name":"pakdump","shards":2}"#.to_vec();

    let xml_record = record(CODE_LZO, xml.len(), &lzo(&xml));
    let png_record = record(CODE_NONE, png.len(), &png);
    let empty_record = record(CODE_NONE, 0, b"");

    let mut shard0 = Vec::new();
    let xml_at = shard0.len();
    shard0.extend_from_slice(&xml_record);
    let png_at = shard0.len();
    shard0.extend_from_slice(&png_record);
    let empty_at = shard0.len();
    shard0.extend_from_slice(&empty_record);

    let json_record = record(CODE_NONE, json.len(), &json);
    let mut shard1 = json_record.clone();
    let junk_at = shard1.len();
    shard1.extend_from_slice(&[0xAB; 40]);

    fs::write(dir.path().join("Package0.dat"), &shard0).unwrap();
    fs::write(dir.path().join("Package1.dat"), &shard1).unwrap();

    let base1 = shard0.len() as i64;
    let total = (shard0.len() + shard1.len()) as i64;
    let locators = [
        Locator {
            token: 0x0000_0000_0000_0001,
            offset: xml_at as i64,
            length: xml_record.len() as i32,
        },
        Locator {
            token: 0x0000_0000_0000_0002,
            offset: png_at as i64,
            length: png_record.len() as i32,
        },
        Locator {
            token: 0x0000_0000_0000_0003,
            offset: empty_at as i64,
            length: empty_record.len() as i32,
        },
        Locator {
            token: 0xA1B2_C3D4_E5F6_0718,
            offset: base1,
            length: json_record.len() as i32,
        },
        Locator {
            token: 0x0000_0000_0000_0005,
            offset: total + 100,
            length: 10,
        },
        Locator {
            token: 0x0000_0000_0000_0006,
            offset: base1 + junk_at as i64,
            length: 40,
        },
        Locator {
            token: 0x0000_0000_0000_0007,
            offset: base1 - 10,
            length: 80,
        },
    ];
    write_index(&dir.path().join("TRUNK.DIR"), 7, &locators, &[0xEE; 7]);

    Archive { dir, xml, png, json }
}

fn run(
    archive: &Archive,
    schedule: Schedule,
    workers: usize,
) -> (TempDir, ExtractionStats, Vec<ExtractionEvent>) {
    let out = TempDir::new().unwrap();
    let shards = ShardStore::open(archive.dir.path()).unwrap();
    let index = IndexReader::open_path(archive.dir.path().join("TRUNK.DIR")).unwrap();

    let options = ExtractOptions::new(out.path())
        .with_workers(workers)
        .with_queue_depth(2)
        .with_schedule(schedule);
    let events = Mutex::new(Vec::new());
    let stats = Extractor::new(&shards, options)
        .run(index, &|event: &ExtractionEvent| events.lock().push(event.clone()))
        .unwrap();

    let mut events = events.into_inner();
    events.sort_by_key(|e| e.sequence);
    (out, stats, events)
}

fn check_run(schedule: Schedule, workers: usize) {
    let archive = build_archive();
    let (out, stats, events) = run(&archive, schedule, workers);

    assert_eq!(stats.total_declared, 7);
    assert_eq!(stats.dispatched, 7);
    assert_eq!(stats.extracted, 4);
    assert_eq!(stats.failed, 3);
    assert!(!stats.is_complete());
    assert_eq!(stats.index_end, Some(IndexEnd::Truncated { remainder: 7 }));
    assert_eq!(
        stats.bytes_written,
        (archive.xml.len() + archive.png.len() + archive.json.len()) as u64
    );
    for tag in [FileType::XML, FileType::PNG, FileType::TXT, FileType::JSON] {
        assert_eq!(stats.by_type.get(&tag), Some(&1), "{tag}");
    }

    let root = out.path();
    assert_eq!(fs::read(root.join("0/0000000000000001.XML")).unwrap(), archive.xml);
    assert_eq!(fs::read(root.join("0/0000000000000002.PNG")).unwrap(), archive.png);
    assert!(fs::read(root.join("0/0000000000000003.TXT")).unwrap().is_empty());
    assert_eq!(fs::read(root.join("1/A1B2C3D4E5F60718.JSON")).unwrap(), archive.json);

    let sequences: Vec<u64> = events.iter().map(|e| e.sequence).collect();
    assert_eq!(sequences, (1..=7).collect::<Vec<_>>());

    let failures: Vec<(&str, Stage)> = events
        .iter()
        .filter_map(|e| match &e.outcome {
            Outcome::Failed { stage, .. } => Some((e.token.as_str(), *stage)),
            Outcome::Extracted { .. } => None,
        })
        .collect();
    assert_eq!(
        failures,
        [
            ("0000000000000005", Stage::Read),
            ("0000000000000006", Stage::Decode),
            ("0000000000000007", Stage::Read),
        ]
    );

    let lzo_event = &events[0];
    assert_eq!(lzo_event.shard, Some(0));
    assert_eq!(lzo_event.decompressed_length, Some(archive.xml.len() as i32));
    assert_eq!(lzo_event.total, 7);
}

#[test]
fn test_streaming_extraction() {
    check_run(Schedule::Streaming, 3);
}

#[test]
fn test_materialized_extraction() {
    check_run(Schedule::Materialized, 3);
}

#[test]
fn test_single_worker_matches() {
    check_run(Schedule::Streaming, 1);
    check_run(Schedule::Materialized, 1);
}

#[test]
fn test_reruns_over_existing_output() {
    let archive = build_archive();
    let out = TempDir::new().unwrap();
    let shards = ShardStore::open(archive.dir.path()).unwrap();

    for schedule in [Schedule::Streaming, Schedule::Materialized] {
        let index = IndexReader::open_path(archive.dir.path().join("TRUNK.DIR")).unwrap();
        let options = ExtractOptions::new(out.path()).with_schedule(schedule);
        let stats = Extractor::new(&shards, options)
            .run(index, &pakdump::NoopObserver)
            .unwrap();
        assert_eq!(stats.extracted, 4);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Seen {
    State(RunState),
    Record,
}

/// Records state changes and record completions in arrival order.
struct Timeline(Mutex<Vec<Seen>>);

impl pakdump::ExtractionObserver for Timeline {
    fn on_record(&self, _event: &ExtractionEvent) {
        self.0.lock().push(Seen::Record);
    }

    fn on_state(&self, state: RunState) {
        self.0.lock().push(Seen::State(state));
    }
}

fn timeline(index_path: &Path, shard_dir: &Path, schedule: Schedule) -> Vec<Seen> {
    let out = TempDir::new().unwrap();
    let shards = ShardStore::open(shard_dir).unwrap();
    let index = IndexReader::open_path(index_path).unwrap();
    let seen = Timeline(Mutex::new(Vec::new()));

    let options = ExtractOptions::new(out.path())
        .with_workers(2)
        .with_schedule(schedule);
    Extractor::new(&shards, options).run(index, &seen).unwrap();
    seen.0.into_inner()
}

#[test]
fn test_run_states_in_order() {
    let archive = build_archive();
    let index_path = archive.dir.path().join("TRUNK.DIR");

    for schedule in [Schedule::Streaming, Schedule::Materialized] {
        let seen = timeline(&index_path, archive.dir.path(), schedule);
        let states: Vec<Seen> = seen.iter().copied().filter(|s| *s != Seen::Record).collect();
        assert_eq!(
            states,
            [
                Seen::State(RunState::Running),
                Seen::State(RunState::Draining),
                Seen::State(RunState::Done),
            ],
            "{schedule:?}"
        );
        assert_eq!(seen.first(), Some(&Seen::State(RunState::Running)));
        assert_eq!(seen.last(), Some(&Seen::State(RunState::Done)));
        assert_eq!(seen.iter().filter(|s| **s == Seen::Record).count(), 7);
    }
}

#[test]
fn test_materialized_drains_before_last_record() {
    let archive = build_archive();
    let seen = timeline(
        &archive.dir.path().join("TRUNK.DIR"),
        archive.dir.path(),
        Schedule::Materialized,
    );

    let draining = seen
        .iter()
        .position(|s| *s == Seen::State(RunState::Draining))
        .unwrap();
    let last_record = seen.iter().rposition(|s| *s == Seen::Record).unwrap();
    assert!(draining < last_record, "{seen:?}");
}

#[test]
fn test_materialized_empty_index_states() {
    let archive = build_archive();
    let index_path = archive.dir.path().join("EMPTY.DIR");
    write_index(&index_path, 0, &[], &[]);

    let seen = timeline(&index_path, archive.dir.path(), Schedule::Materialized);
    assert_eq!(
        seen,
        [
            Seen::State(RunState::Running),
            Seen::State(RunState::Draining),
            Seen::State(RunState::Done),
        ]
    );
}

#[test]
fn test_empty_index() {
    let archive = build_archive();
    let index_path = archive.dir.path().join("EMPTY.DIR");
    write_index(&index_path, 0, &[], &[]);

    let out = TempDir::new().unwrap();
    let shards = ShardStore::open(archive.dir.path()).unwrap();
    let index = IndexReader::open_path(&index_path).unwrap();
    let stats = Extractor::new(&shards, ExtractOptions::new(out.path()))
        .run(index, &pakdump::NoopObserver)
        .unwrap();

    assert_eq!(stats.dispatched, 0);
    assert_eq!(stats.index_end, Some(IndexEnd::Clean));
    assert!(stats.is_complete());
}
