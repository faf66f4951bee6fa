//! Store adapters: where the shared table lives.
//!
//! The engine never talks to storage directly. A session reads a
//! [`Snapshot`] through a [`TableStore`], works on it in memory, and commits
//! the whole table back with [`TableStore::write_if`], naming the revision it
//! read. A store that has moved on in the meantime refuses the write with
//! [`ClaimError::Conflict`](crate::ClaimError::Conflict) and the session
//! starts over from a fresh read.
//!
//! Two adapters ship with the crate:
//! - [`MemoryStore`]: in-process, for tests and embedding
//! - [`FileStore`]: a single checksummed file guarded by an OS file lock

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::error::Result;
use crate::types::{RawTable, Revision, Snapshot};

/// Whole-table storage with a revision stamp.
pub trait TableStore: Send + Sync {
    /// Read the full table, in row order, with its current revision.
    fn read(&self) -> Result<Snapshot>;

    /// Overwrite the table regardless of what is stored.
    fn write(&self, table: &RawTable) -> Result<Revision>;

    /// Overwrite the table only if the store is still at `expected`.
    fn write_if(&self, table: &RawTable, expected: Revision) -> Result<Revision>;
}
