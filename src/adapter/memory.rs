//! In-memory table store.

use super::TableStore;
use crate::error::{ClaimError, Result};
use crate::types::{RawTable, Revision, Snapshot};
use parking_lot::RwLock;

/// Table held in process memory.
pub struct MemoryStore {
    inner: RwLock<Snapshot>,
}

impl MemoryStore {
    /// Empty store at revision 0.
    pub fn new() -> Self {
        Self::with_table(RawTable::default())
    }

    /// Store seeded with `table` at revision 0.
    pub fn with_table(table: RawTable) -> Self {
        Self {
            inner: RwLock::new(Snapshot {
                table,
                revision: Revision(0),
            }),
        }
    }

    pub fn revision(&self) -> Revision {
        self.inner.read().revision
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TableStore for MemoryStore {
    fn read(&self) -> Result<Snapshot> {
        Ok(self.inner.read().clone())
    }

    fn write(&self, table: &RawTable) -> Result<Revision> {
        let mut inner = self.inner.write();
        inner.table = table.clone();
        inner.revision = inner.revision.next();
        Ok(inner.revision)
    }

    fn write_if(&self, table: &RawTable, expected: Revision) -> Result<Revision> {
        let mut inner = self.inner.write();
        if inner.revision != expected {
            return Err(ClaimError::Conflict {
                expected,
                found: inner.revision,
            });
        }
        inner.table = table.clone();
        inner.revision = inner.revision.next();
        Ok(inner.revision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sheet() -> RawTable {
        RawTable {
            columns: vec!["instruction".into()],
            rows: vec![vec![json!("a")], vec![json!("b")]],
        }
    }

    #[test]
    fn test_read_returns_seed() {
        let store = MemoryStore::with_table(sheet());
        let snap = store.read().unwrap();
        assert_eq!(snap.revision, Revision(0));
        assert_eq!(snap.table.len(), 2);
    }

    #[test]
    fn test_write_bumps_revision() {
        let store = MemoryStore::new();
        assert_eq!(store.write(&sheet()).unwrap(), Revision(1));
        assert_eq!(store.write(&sheet()).unwrap(), Revision(2));
        assert_eq!(store.revision(), Revision(2));
    }

    #[test]
    fn test_write_if_detects_stale_revision() {
        let store = MemoryStore::with_table(sheet());
        let snap = store.read().unwrap();

        assert_eq!(store.write_if(&snap.table, snap.revision).unwrap(), Revision(1));

        let mut stale = snap.table.clone();
        stale.rows.clear();
        let err = store.write_if(&stale, snap.revision).unwrap_err();
        assert!(matches!(
            err,
            ClaimError::Conflict { expected: Revision(0), found: Revision(1) }
        ));

        // Nothing was written.
        assert_eq!(store.read().unwrap().table.len(), 2);
    }
}
