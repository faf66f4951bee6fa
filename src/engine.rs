//! Assignment engine: who owns which rows, and the two mutations.
//!
//! Every function here works on a single normalized [`Table`] snapshot and
//! never touches a store. Row state moves one way only:
//!
//! ```text
//! Unassigned --claim--> Pending --save--> Done --save--> Done
//! ```
//!
//! Nothing clears a validator once it is set.

use crate::error::{ClaimError, Result};
use crate::types::{Row, RowState, Table, ValidatorId, STATUS_DONE};

/// Whether nobody has claimed the row. Whitespace-only owners count as nobody.
pub fn is_unassigned(row: &Row) -> bool {
    row.validator.trim().is_empty()
}

/// Exact, case-sensitive ownership check.
pub fn is_owned_by(row: &Row, user: &str) -> bool {
    !is_unassigned(row) && row.validator == user
}

impl RowState {
    pub fn of(row: &Row) -> Self {
        if is_unassigned(row) {
            RowState::Unassigned
        } else if row.is_done() {
            RowState::Done
        } else {
            RowState::Pending
        }
    }
}

/// Row indices split relative to one validator.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Partition {
    /// Rows nobody owns, in table order.
    pub unassigned: Vec<usize>,
    /// Rows owned by the validator.
    pub mine_all: Vec<usize>,
    /// Owned rows not yet done.
    pub mine_pending: Vec<usize>,
}

impl Partition {
    pub fn mine_done(&self) -> usize {
        self.mine_all.len() - self.mine_pending.len()
    }
}

pub fn partition(table: &Table, user: &str) -> Partition {
    let mut out = Partition::default();

    for (index, row) in table.rows.iter().enumerate() {
        if is_unassigned(row) {
            out.unassigned.push(index);
        } else if row.validator == user {
            out.mine_all.push(index);
            if !row.is_done() {
                out.mine_pending.push(index);
            }
        }
    }

    out
}

/// Claim up to `batch_size` unassigned rows for `user`, earliest first.
///
/// Returns the claimed indices. An empty pool claims nothing and leaves the
/// table as it was.
pub fn claim(table: &mut Table, user: &ValidatorId, batch_size: usize) -> Vec<usize> {
    let picked: Vec<usize> = table
        .rows
        .iter()
        .enumerate()
        .filter(|(_, row)| is_unassigned(row))
        .map(|(index, _)| index)
        .take(batch_size)
        .collect();

    for &index in &picked {
        table.rows[index].validator = user.as_str().to_string();
    }

    picked
}

/// Record `label` for a row owned by `user` and mark it done.
///
/// Empty labels are accepted. Saving the same label twice is a no-op.
pub fn save(table: &mut Table, index: usize, user: &ValidatorId, label: &str) -> Result<()> {
    let len = table.rows.len();
    let row = table
        .rows
        .get_mut(index)
        .ok_or(ClaimError::RowNotFound { row: index, len })?;

    if !is_owned_by(row, user.as_str()) {
        return Err(ClaimError::OwnershipMismatch {
            row: index,
            owner: row.validator.clone(),
            user: user.to_string(),
        });
    }

    row.instruction_ats = label.to_string();
    row.status = STATUS_DONE.to_string();
    Ok(())
}
