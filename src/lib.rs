//! # Claim Board
//!
//! Shared annotation table where validators claim batches of rows, label
//! them, and save them back.
//!
//! ## Core Concepts
//!
//! - **Rows**: source text plus an owner, a label and a status
//! - **Partition**: unassigned / mine / mine-pending, relative to one validator
//! - **Claim**: take the earliest unassigned rows as a batch
//! - **Save**: record a label on an owned row and mark it done
//! - **Revisions**: every commit names the revision it read, so concurrent
//!   claims can never hand the same row to two validators
//!
//! ## Example
//!
//! ```ignore
//! use claimboard::{AssignmentConfig, FileStore, FileStoreConfig, Session};
//!
//! let store = FileStore::open(FileStoreConfig {
//!     path: "./board".into(),
//!     ..Default::default()
//! })?;
//! store.import_json("sheet.json")?;
//!
//! let session = Session::login(&store, "bob", AssignmentConfig::default())?;
//! let outcome = session.claim_batch(10)?;
//! session.save_label(outcome.claimed[0], "KAT 2")?;
//! ```

pub mod adapter;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod normalize;
pub mod session;
pub mod types;

// Re-exports
pub use adapter::{FileStore, MemoryStore, TableStore};
pub use config::{AssignmentConfig, ClaimGate, FileStoreConfig};
pub use engine::{claim, is_owned_by, is_unassigned, partition, save, Partition};
pub use error::{ClaimError, Result};
pub use events::{ActivityEvent, EventBus, EventHandle, SubscriptionId};
pub use normalize::{cell_text, coerce_cell, normalize};
pub use session::{ClaimOutcome, Overview, SaveOutcome, Session, WorkItem, WorkView};
pub use types::*;
