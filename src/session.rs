//! One validator's view of the shared table.
//!
//! Every call runs a full cycle against the store: read a snapshot,
//! normalize it, compute the validator's partition, and for mutations apply
//! the change and commit the whole table with the revision that was read.
//! A conflicting commit throws the work away and repeats the cycle on a
//! fresh snapshot, up to [`AssignmentConfig::max_commit_attempts`] times.
//! Nothing is cached between calls.

use crate::adapter::TableStore;
use crate::config::{AssignmentConfig, ClaimGate};
use crate::engine::{self, Partition};
use crate::error::{ClaimError, Result};
use crate::events::{ActivityEvent, EventBus};
use crate::normalize::normalize;
use crate::types::{Revision, Row, RowState, Table, Timestamp, ValidatorId};
use tracing::{debug, info, warn};

/// Which of the validator's rows to list.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WorkView {
    /// Only rows still waiting for a label.
    #[default]
    Pending,
    /// Every owned row, completed ones included.
    All,
}

/// A row on the validator's worklist.
#[derive(Clone, Copy, Debug)]
pub struct WorkItem<'a> {
    /// Position in the table.
    pub index: usize,
    /// Position shown to people (`index + 1`).
    pub number: usize,
    pub row: &'a Row,
    pub state: RowState,
}

/// Table snapshot partitioned for one validator.
#[derive(Clone, Debug)]
pub struct Overview {
    pub revision: Revision,
    pub table: Table,
    pub partition: Partition,
}

impl Overview {
    /// Rows nobody has claimed yet.
    pub fn unassigned_count(&self) -> usize {
        self.partition.unassigned.len()
    }

    /// Rows owned by the validator.
    pub fn mine_count(&self) -> usize {
        self.partition.mine_all.len()
    }

    pub fn pending_count(&self) -> usize {
        self.partition.mine_pending.len()
    }

    pub fn done_count(&self) -> usize {
        self.partition.mine_done()
    }

    pub fn worklist(&self, view: WorkView) -> Vec<WorkItem<'_>> {
        let indices = match view {
            WorkView::Pending => &self.partition.mine_pending,
            WorkView::All => &self.partition.mine_all,
        };

        indices
            .iter()
            .map(|&index| {
                let row = &self.table.rows[index];
                WorkItem {
                    index,
                    number: index + 1,
                    row,
                    state: RowState::of(row),
                }
            })
            .collect()
    }
}

/// Result of a batch claim.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClaimOutcome {
    /// Claimed row indices, ascending. Empty when no work was available.
    pub claimed: Vec<usize>,
    /// Revision after the commit, or the revision read if nothing was written.
    pub revision: Revision,
    /// Read/commit cycles used.
    pub attempts: u32,
}

impl ClaimOutcome {
    pub fn claimed_count(&self) -> usize {
        self.claimed.len()
    }

    /// Whether the pool was empty.
    pub fn no_work_available(&self) -> bool {
        self.claimed.is_empty()
    }
}

/// Result of saving a label.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SaveOutcome {
    pub row: usize,
    pub revision: Revision,
    pub attempts: u32,
}

/// What a mutation decided to do with the snapshot it was given.
enum Change<T> {
    Write(T),
    Skip(T),
}

/// A logged-in validator working against a store.
pub struct Session<'s, S: TableStore + ?Sized> {
    store: &'s S,
    user: ValidatorId,
    config: AssignmentConfig,
    events: Option<&'s EventBus>,
}

impl<'s, S: TableStore + ?Sized> Session<'s, S> {
    pub fn new(store: &'s S, user: ValidatorId, config: AssignmentConfig) -> Self {
        Self {
            store,
            user,
            config,
            events: None,
        }
    }

    /// Start a session from a name typed at login.
    pub fn login(store: &'s S, name: &str, config: AssignmentConfig) -> Result<Self> {
        let user = ValidatorId::login(name)?;
        info!(user = %user, "validator logged in");
        Ok(Self::new(store, user, config))
    }

    /// Publish committed mutations to `events`.
    pub fn with_events(mut self, events: &'s EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn user(&self) -> &ValidatorId {
        &self.user
    }

    pub fn config(&self) -> &AssignmentConfig {
        &self.config
    }

    /// Fresh, partitioned view of the table.
    pub fn overview(&self) -> Result<Overview> {
        let (table, revision) = self.fetch()?;
        let partition = engine::partition(&table, self.user.as_str());
        Ok(Overview {
            revision,
            table,
            partition,
        })
    }

    /// Claim up to `batch_size` unassigned rows.
    ///
    /// An empty pool is not an error: the outcome is empty and nothing is
    /// written.
    pub fn claim_batch(&self, batch_size: usize) -> Result<ClaimOutcome> {
        let batch_size = self.config.check_batch_size(batch_size)?;
        let gate = self.config.claim_gate;
        let user = &self.user;

        let (claimed, revision, attempts) = self.commit_cycle("claim", |table| {
            let partition = engine::partition(table, user.as_str());
            check_gate(gate, &partition)?;

            let claimed = engine::claim(table, user, batch_size);
            if claimed.is_empty() {
                Ok(Change::Skip(claimed))
            } else {
                Ok(Change::Write(claimed))
            }
        })?;

        if claimed.is_empty() {
            info!(user = %self.user, "no unassigned rows left to claim");
        } else {
            info!(
                user = %self.user,
                count = claimed.len(),
                revision = revision.0,
                "claimed batch"
            );
            self.publish(ActivityEvent::Claimed {
                user: self.user.clone(),
                rows: claimed.clone(),
                revision,
                at: Timestamp::now(),
            });
        }

        Ok(ClaimOutcome {
            claimed,
            revision,
            attempts,
        })
    }

    /// Save `label` for row `index` and mark it done.
    pub fn save_label(&self, index: usize, label: &str) -> Result<SaveOutcome> {
        let user = &self.user;

        let (_, revision, attempts) = self.commit_cycle("save", |table| {
            engine::save(table, index, user, label)?;
            Ok(Change::Write(()))
        })?;

        info!(user = %self.user, row = index, revision = revision.0, "saved label");
        self.publish(ActivityEvent::Saved {
            user: self.user.clone(),
            row: index,
            revision,
            at: Timestamp::now(),
        });

        Ok(SaveOutcome {
            row: index,
            revision,
            attempts,
        })
    }

    fn fetch(&self) -> Result<(Table, Revision)> {
        let snapshot = self
            .store
            .read()
            .map_err(|e| ClaimError::Fetch(e.to_string()))?;
        debug!(revision = snapshot.revision.0, rows = snapshot.table.len(), "fetched snapshot");
        Ok((normalize(snapshot.table), snapshot.revision))
    }

    /// Read, mutate and commit, retrying on revision conflicts.
    fn commit_cycle<T>(
        &self,
        action: &str,
        mut mutate: impl FnMut(&mut Table) -> Result<Change<T>>,
    ) -> Result<(T, Revision, u32)> {
        let max_attempts = self.config.max_commit_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let (mut table, read_at) = self.fetch()?;

            let value = match mutate(&mut table)? {
                Change::Skip(value) => return Ok((value, read_at, attempt)),
                Change::Write(value) => value,
            };

            match self.store.write_if(&table.to_raw(), read_at) {
                Ok(revision) => return Ok((value, revision, attempt)),
                Err(ClaimError::Conflict { expected, found }) => {
                    if attempt >= max_attempts {
                        warn!(
                            action,
                            user = %self.user,
                            attempts = attempt,
                            "giving up after repeated conflicts"
                        );
                        return Err(ClaimError::Conflict { expected, found });
                    }
                    warn!(
                        action,
                        user = %self.user,
                        expected = expected.0,
                        found = found.0,
                        "table changed underneath, retrying"
                    );
                }
                Err(e) => return Err(ClaimError::Persist(e.to_string())),
            }
        }
    }

    fn publish(&self, event: ActivityEvent) {
        if let Some(events) = self.events {
            events.publish(event);
        }
    }
}

fn check_gate(gate: ClaimGate, partition: &Partition) -> Result<()> {
    let assigned = partition.mine_all.len();
    let pending = partition.mine_pending.len();

    let refused = match gate {
        ClaimGate::Always => false,
        ClaimGate::WhenNoPending => pending > 0,
        ClaimGate::WhenNoneAssigned => assigned > 0,
    };

    if refused {
        return Err(ClaimError::OutstandingWork { assigned, pending });
    }
    Ok(())
}
