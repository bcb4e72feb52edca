#![allow(dead_code)]

use std::fs;
use std::io;
use std::io::Write;
use std::path::PathBuf;

use streamtar::{EntryAttributes, HeaderRecord, OwnerResolver, SourceMetadata};

pub const FILES: [&str; 3] = ["file1.txt", "file2.txt", "file3.txt"];

/// 2021-02-15T20:11:34Z, the time the fixtures were created with.
pub const MTIME: i64 = 1_613_419_894;

pub fn fixture_path(relative: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(relative)
}

pub fn fixture(relative: &str) -> Vec<u8> {
    fs::read(fixture_path(relative)).unwrap()
}

pub fn file(name: &str) -> Vec<u8> {
    fixture(&format!("files/{}", name))
}

/// The attributes GNU tar was told to use for the fixtures.
pub fn header(name: &str, size: u64) -> HeaderRecord {
    HeaderRecord {
        mode: 0o644,
        uid: Some(1001),
        gid: Some(33),
        size,
        mtime: MTIME,
        uname: Some("discourse".to_owned()),
        gname: Some("www-data".to_owned()),
        ..HeaderRecord::new(name)
    }
}

pub fn attributes() -> EntryAttributes {
    EntryAttributes {
        mode: Some(0o644),
        uid: Some(1001),
        gid: Some(33),
        uname: Some("discourse".to_owned()),
        gname: Some("www-data".to_owned()),
        mtime: Some(MTIME),
    }
}

pub fn metadata(size: u64) -> SourceMetadata {
    SourceMetadata {
        size,
        mode: 0o100_644,
        uid: 1001,
        gid: 33,
        uname: Some("discourse".to_owned()),
        gname: Some("www-data".to_owned()),
        mtime: MTIME,
    }
}

/// Write `data` in a few differently sized pieces.
pub fn write_in_chunks(out: &mut dyn Write, data: &[u8]) -> io::Result<()> {
    let mut rest = data;
    for &size in [1usize, 7, 300].iter().cycle() {
        if rest.is_empty() {
            break;
        }
        let (chunk, tail) = rest.split_at(size.min(rest.len()));
        out.write_all(chunk)?;
        rest = tail;
    }
    Ok(())
}

/// Resolves the ids used by the fixtures.
pub struct FixtureOwners;

impl OwnerResolver for FixtureOwners {
    fn user_name(&self, uid: u64) -> Option<String> {
        if uid == 1001 { Some("discourse".to_owned()) } else { None }
    }

    fn group_name(&self, gid: u64) -> Option<String> {
        if gid == 33 { Some("www-data".to_owned()) } else { None }
    }
}
