//! Single-file table store.
//!
//! Layout of `table.bin`:
//!
//! ```text
//! magic "CLB\0" | version u8 | revision u64 | payload len u64 | crc32 u32 | payload
//! ```
//!
//! Integers are little-endian; the payload is the MessagePack-encoded
//! [`RawTable`]. Writes go to a temp file that is synced and renamed over
//! the old one, so a reader sees either the previous table or the new one.
//! Every read holds a shared lock on `LOCK` and every write an exclusive one,
//! which makes the revision check in [`TableStore::write_if`] atomic across
//! processes.

use super::TableStore;
use crate::config::FileStoreConfig;
use crate::error::{ClaimError, Result};
use crate::types::{RawTable, Revision, Snapshot};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Magic bytes for the table file.
const TABLE_MAGIC: &[u8; 4] = b"CLB\0";

/// Current table file format version.
const TABLE_VERSION: u8 = 1;

/// Header size: magic + version + revision + payload len + crc.
const HEADER_SIZE: usize = 4 + 1 + 8 + 8 + 4;

const TABLE_FILE: &str = "table.bin";
const TEMP_FILE: &str = "table.bin.tmp";
const LOCK_FILE: &str = "LOCK";

struct Header {
    revision: Revision,
    payload_len: u64,
    crc: u32,
}

/// Table stored in one file on disk.
pub struct FileStore {
    config: FileStoreConfig,
}

impl FileStore {
    /// Open the store directory, creating it when allowed.
    pub fn open(config: FileStoreConfig) -> Result<Self> {
        if !config.path.exists() {
            if !config.create_if_missing {
                return Err(ClaimError::Io(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("store directory {} does not exist", config.path.display()),
                )));
            }
            fs::create_dir_all(&config.path)?;
        }

        Ok(Self { config })
    }

    /// Replace the stored table with a JSON sheet export.
    pub fn import_json(&self, path: impl AsRef<Path>) -> Result<Revision> {
        let data = fs::read(path.as_ref())?;
        let table = RawTable::from_json(&data)?;
        info!(rows = table.len(), source = %path.as_ref().display(), "importing sheet");
        self.write(&table)
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }

    fn table_path(&self) -> PathBuf {
        self.config.path.join(TABLE_FILE)
    }

    fn lock_file(&self) -> Result<File> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(self.config.path.join(LOCK_FILE))?;
        Ok(file)
    }

    fn lock_shared(&self) -> Result<File> {
        let file = self.lock_file()?;
        file.lock_shared().map_err(|_| ClaimError::Locked)?;
        Ok(file)
    }

    fn lock_exclusive(&self) -> Result<File> {
        let file = self.lock_file()?;
        file.lock_exclusive().map_err(|_| ClaimError::Locked)?;
        Ok(file)
    }

    fn read_header(reader: &mut impl Read) -> Result<Header> {
        let mut buf = [0u8; HEADER_SIZE];
        reader.read_exact(&mut buf).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                ClaimError::InvalidFormat("Truncated table header".into())
            } else {
                ClaimError::Io(e)
            }
        })?;

        if &buf[0..4] != TABLE_MAGIC {
            return Err(ClaimError::InvalidFormat("Invalid table magic".into()));
        }
        if buf[4] != TABLE_VERSION {
            return Err(ClaimError::InvalidFormat(format!(
                "Unsupported table version: {}",
                buf[4]
            )));
        }

        let mut word = [0u8; 8];
        word.copy_from_slice(&buf[5..13]);
        let revision = Revision(u64::from_le_bytes(word));
        word.copy_from_slice(&buf[13..21]);
        let payload_len = u64::from_le_bytes(word);
        let mut crc = [0u8; 4];
        crc.copy_from_slice(&buf[21..25]);

        Ok(Header {
            revision,
            payload_len,
            crc: u32::from_le_bytes(crc),
        })
    }

    /// Revision currently on disk. A missing file is revision 0.
    fn current_revision(&self) -> Result<Revision> {
        let path = self.table_path();
        if !path.exists() {
            return Ok(Revision(0));
        }
        let mut file = File::open(path)?;
        Ok(Self::read_header(&mut file)?.revision)
    }

    fn read_frame(&self) -> Result<Snapshot> {
        let path = self.table_path();
        if !path.exists() {
            return Ok(Snapshot {
                table: RawTable::default(),
                revision: Revision(0),
            });
        }

        let mut file = File::open(path)?;
        let header = Self::read_header(&mut file)?;

        let mut payload = Vec::new();
        file.read_to_end(&mut payload)?;
        if payload.len() as u64 != header.payload_len {
            return Err(ClaimError::InvalidFormat(format!(
                "Payload length {} does not match header ({})",
                payload.len(),
                header.payload_len
            )));
        }

        let got = crc32fast::hash(&payload);
        if got != header.crc {
            return Err(ClaimError::ChecksumMismatch {
                expected: header.crc,
                got,
            });
        }

        let table: RawTable = rmp_serde::from_slice(&payload)?;
        Ok(Snapshot {
            table,
            revision: header.revision,
        })
    }

    fn write_frame(&self, table: &RawTable, revision: Revision) -> Result<()> {
        let payload = rmp_serde::to_vec(table)?;
        let temp_path = self.config.path.join(TEMP_FILE);

        let mut file = File::create(&temp_path)?;
        file.write_all(TABLE_MAGIC)?;
        file.write_all(&[TABLE_VERSION])?;
        file.write_all(&revision.0.to_le_bytes())?;
        file.write_all(&(payload.len() as u64).to_le_bytes())?;
        file.write_all(&crc32fast::hash(&payload).to_le_bytes())?;
        file.write_all(&payload)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, self.table_path())?;
        Ok(())
    }
}

impl TableStore for FileStore {
    fn read(&self) -> Result<Snapshot> {
        let _lock = self.lock_shared()?;
        let snapshot = self.read_frame()?;
        debug!(revision = snapshot.revision.0, rows = snapshot.table.len(), "read table");
        Ok(snapshot)
    }

    fn write(&self, table: &RawTable) -> Result<Revision> {
        let _lock = self.lock_exclusive()?;
        let next = self.current_revision()?.next();
        self.write_frame(table, next)?;
        debug!(revision = next.0, rows = table.len(), "wrote table");
        Ok(next)
    }

    fn write_if(&self, table: &RawTable, expected: Revision) -> Result<Revision> {
        let _lock = self.lock_exclusive()?;
        let found = self.current_revision()?;
        if found != expected {
            return Err(ClaimError::Conflict { expected, found });
        }
        let next = found.next();
        self.write_frame(table, next)?;
        debug!(revision = next.0, rows = table.len(), "wrote table");
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn test_config(dir: &TempDir) -> FileStoreConfig {
        FileStoreConfig {
            path: dir.path().join("board"),
            create_if_missing: true,
        }
    }

    fn sheet() -> RawTable {
        RawTable {
            columns: vec!["instruction".into(), "validator".into()],
            rows: vec![
                vec![json!("a"), serde_json::Value::Null],
                vec![json!("b"), json!("bob")],
            ],
        }
    }

    #[test]
    fn test_empty_store_reads_revision_zero() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(test_config(&dir)).unwrap();
        let snap = store.read().unwrap();
        assert_eq!(snap.revision, Revision(0));
        assert!(snap.table.is_empty());
    }

    #[test]
    fn test_missing_directory_without_create() {
        let dir = TempDir::new().unwrap();
        let result = FileStore::open(FileStoreConfig {
            path: dir.path().join("absent"),
            create_if_missing: false,
        });
        assert!(matches!(result, Err(ClaimError::Io(_))));
    }

    #[test]
    fn test_write_then_read() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(test_config(&dir)).unwrap();

        assert_eq!(store.write(&sheet()).unwrap(), Revision(1));
        let snap = store.read().unwrap();
        assert_eq!(snap.revision, Revision(1));
        assert_eq!(snap.table, sheet());
    }

    #[test]
    fn test_write_if_conflict_keeps_file() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(test_config(&dir)).unwrap();
        store.write(&sheet()).unwrap();

        let err = store.write_if(&RawTable::default(), Revision(0)).unwrap_err();
        assert!(matches!(
            err,
            ClaimError::Conflict { expected: Revision(0), found: Revision(1) }
        ));
        assert_eq!(store.read().unwrap().table.len(), 2);

        assert_eq!(store.write_if(&RawTable::default(), Revision(1)).unwrap(), Revision(2));
    }

    #[test]
    fn test_corrupt_payload_detected() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(test_config(&dir)).unwrap();
        store.write(&sheet()).unwrap();

        let path = dir.path().join("board").join(TABLE_FILE);
        let mut bytes = fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        fs::write(&path, bytes).unwrap();

        assert!(matches!(
            store.read(),
            Err(ClaimError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_bad_magic_detected() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(test_config(&dir)).unwrap();
        fs::write(dir.path().join("board").join(TABLE_FILE), b"not a table file at all!!").unwrap();

        assert!(matches!(store.read(), Err(ClaimError::InvalidFormat(_))));
    }

    #[test]
    fn test_truncated_header_detected() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(test_config(&dir)).unwrap();
        fs::write(dir.path().join("board").join(TABLE_FILE), b"CLB\0").unwrap();

        assert!(matches!(store.read(), Err(ClaimError::InvalidFormat(_))));
    }

    #[test]
    fn test_import_json() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(test_config(&dir)).unwrap();

        let export = dir.path().join("sheet.json");
        fs::write(
            &export,
            r#"[{"instruction": "triage", "input": "chest pain", "output": ""}]"#,
        )
        .unwrap();

        assert_eq!(store.import_json(&export).unwrap(), Revision(1));
        let snap = store.read().unwrap();
        assert_eq!(snap.table.len(), 1);
        assert!(snap.table.columns.contains(&"input".to_string()));
    }
}
