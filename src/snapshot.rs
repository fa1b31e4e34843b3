//! Snapshot encoding for the term -> references mapping.
//!
//! A snapshot is a single bincode blob carrying a format version and the full
//! mapping. Callers reach these functions only through `Index::save*` and
//! `Index::load*`, which hold the `Save`/`Load` lock modes around them.

use crate::error::{IndexError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Term -> ordered, duplicate-free references.
pub type Entries = BTreeMap<String, Vec<String>>;

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Default snapshot file name.
pub const DEFAULT_SNAPSHOT_FILE: &str = "index.dat";

/// Distinguishes temporary files of concurrent saves within one process.
static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Serialize)]
struct SnapshotRef<'a> {
    version: u32,
    entries: &'a Entries,
}

#[derive(Debug, Deserialize)]
struct Snapshot {
    version: u32,
    entries: Entries,
}

/// Encode `entries` into `writer`.
pub fn write_snapshot<W: Write>(writer: W, entries: &Entries) -> Result<()> {
    let mut writer = BufWriter::new(writer);
    bincode::serialize_into(
        &mut writer,
        &SnapshotRef {
            version: SNAPSHOT_VERSION,
            entries,
        },
    )?;
    writer.flush()?;
    Ok(())
}

/// Decode a mapping from `reader`.
///
/// Terms whose reference list is empty are dropped and duplicate references
/// collapsed, so a decoded mapping always satisfies the index invariants.
pub fn read_snapshot<R: Read>(reader: R) -> Result<Entries> {
    let snapshot: Snapshot = bincode::deserialize_from(BufReader::new(reader))?;
    if snapshot.version > SNAPSHOT_VERSION {
        return Err(IndexError::IncompatibleSnapshot {
            expected: SNAPSHOT_VERSION,
            actual: snapshot.version,
        });
    }

    let mut entries = snapshot.entries;
    entries.retain(|_, refs| {
        dedup_preserving_order(refs);
        !refs.is_empty()
    });
    Ok(entries)
}

/// Drop repeated references, keeping the first occurrence of each.
fn dedup_preserving_order(refs: &mut Vec<String>) {
    let keep: Vec<bool> = {
        let mut seen = HashSet::with_capacity(refs.len());
        refs.iter().map(|r| seen.insert(r.as_str())).collect()
    };
    let mut keep = keep.into_iter();
    refs.retain(|_| keep.next().unwrap_or(false));
}

/// Write a snapshot file, replacing any previous one.
///
/// The snapshot is written to a sibling temporary file and renamed over
/// `path`, so readers see either the old or the new snapshot in full. If
/// writing fails the previous file is left as it was.
pub fn save_file(path: &Path, entries: &Entries) -> Result<()> {
    let dir = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => {
            fs::create_dir_all(parent)?;
            parent.to_path_buf()
        }
        None => PathBuf::from("."),
    };

    let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
    let tmp = dir.join(format!(
        ".{}.{}-{}.tmp",
        name,
        std::process::id(),
        TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));

    let written = write_snapshot(File::create(&tmp)?, entries)
        .and_then(|()| fs::rename(&tmp, path).map_err(IndexError::from));
    if written.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    written
}

/// Read a snapshot file.
pub fn load_file(path: &Path) -> Result<Entries> {
    if !path.exists() {
        return Err(IndexError::SnapshotNotFound(path.to_path_buf()));
    }
    read_snapshot(File::open(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> Entries {
        let mut entries = Entries::new();
        entries.insert("beef".into(), vec!["PageSix".into(), "PageFive".into()]);
        entries.insert("wellington".into(), vec!["PageSix".into()]);
        entries
    }

    #[test]
    fn test_roundtrip_bytes() {
        let mut buf = Vec::new();
        write_snapshot(&mut buf, &sample()).unwrap();
        assert_eq!(read_snapshot(buf.as_slice()).unwrap(), sample());
    }

    #[test]
    fn test_truncated_snapshot_fails() {
        let mut buf = Vec::new();
        write_snapshot(&mut buf, &sample()).unwrap();
        buf.truncate(buf.len() / 2);

        let err = read_snapshot(buf.as_slice()).unwrap_err();
        assert!(matches!(err, IndexError::Serialization(_)), "{err}");
    }

    #[test]
    fn test_newer_version_rejected() {
        #[derive(Serialize)]
        struct Future {
            version: u32,
            entries: Entries,
        }
        let buf = bincode::serialize(&Future {
            version: SNAPSHOT_VERSION + 1,
            entries: sample(),
        })
        .unwrap();

        let err = read_snapshot(buf.as_slice()).unwrap_err();
        assert!(matches!(
            err,
            IndexError::IncompatibleSnapshot { expected: 1, actual: 2 }
        ));
    }

    #[test]
    fn test_decode_normalizes_entries() {
        let mut raw = Entries::new();
        raw.insert("empty".into(), Vec::new());
        raw.insert("dup".into(), vec!["a".into(), "b".into(), "a".into()]);

        let mut buf = Vec::new();
        write_snapshot(&mut buf, &raw).unwrap();
        let decoded = read_snapshot(buf.as_slice()).unwrap();

        let mut expected = Entries::new();
        expected.insert("dup".into(), vec!["a".into(), "b".into()]);
        assert_eq!(decoded, expected);
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(DEFAULT_SNAPSHOT_FILE);

        save_file(&path, &sample()).unwrap();
        assert_eq!(load_file(&path).unwrap(), sample());
    }

    #[test]
    fn test_save_replaces_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_SNAPSHOT_FILE);

        save_file(&path, &Entries::new()).unwrap();
        save_file(&path, &sample()).unwrap();
        assert_eq!(load_file(&path).unwrap(), sample());

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from(DEFAULT_SNAPSHOT_FILE)]);
    }

    #[test]
    fn test_failed_save_keeps_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_SNAPSHOT_FILE);
        save_file(&path, &sample()).unwrap();

        // A directory in the way of the rename target.
        let blocked = dir.path().join("blocked");
        fs::create_dir(&blocked).unwrap();
        fs::write(blocked.join("child"), b"x").unwrap();
        assert!(save_file(&blocked, &Entries::new()).is_err());

        assert_eq!(load_file(&path).unwrap(), sample());
        let leftovers = fs::read_dir(dir.path())
            .unwrap()
            .filter(|e| e.as_ref().unwrap().file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.dat");
        assert!(matches!(
            load_file(&path),
            Err(IndexError::SnapshotNotFound(p)) if p == path
        ));
    }
}
