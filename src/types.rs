//! Core types for the claim board.

use crate::error::{ClaimError, Result};
use crate::normalize::coerce_cell;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Column holding the owning validator.
pub const COL_VALIDATOR: &str = "validator";
/// Column holding the label written by the validator.
pub const COL_INSTRUCTION_ATS: &str = "instruction_ats";
/// Column holding the completion status.
pub const COL_STATUS: &str = "status";

pub const COL_INSTRUCTION: &str = "instruction";
pub const COL_INPUT: &str = "input";
pub const COL_OUTPUT: &str = "output";

/// Bookkeeping columns, in the order they are appended when missing.
pub const BOOKKEEPING_COLUMNS: [&str; 3] = [COL_VALIDATOR, COL_INSTRUCTION_ATS, COL_STATUS];

/// Source columns every row carries.
pub const SOURCE_COLUMNS: [&str; 3] = [COL_INSTRUCTION, COL_INPUT, COL_OUTPUT];

/// Status value of a completed row.
pub const STATUS_DONE: &str = "Done";

/// Version stamp of the whole table, bumped by every successful write.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Revision(pub u64);

impl Revision {
    pub fn next(self) -> Self {
        Revision(self.0 + 1)
    }
}

impl fmt::Debug for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rev({})", self.0)
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Microseconds since Unix epoch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Current time.
    pub fn now() -> Self {
        let micros = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as i64)
            .unwrap_or(0);
        Timestamp(micros)
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

/// Self-declared validator identity.
///
/// Identities are trusted as given: nothing stops two people from picking
/// the same name, in which case they share one set of claimed rows.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValidatorId(String);

impl ValidatorId {
    /// Use `name` exactly as given. Blank names are rejected.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ClaimError::EmptyIdentity);
        }
        Ok(ValidatorId(name))
    }

    /// Identity typed into a login form: surrounding whitespace is dropped.
    pub fn login(input: &str) -> Result<Self> {
        Self::new(input.trim())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ValidatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ValidatorId({:?})", self.0)
    }
}

impl fmt::Display for ValidatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ValidatorId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// One unit of annotation work.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    /// Source text. Read-only: write-back uses the stored cell.
    pub instruction: String,
    pub input: String,
    pub output: String,

    /// Owning validator; empty while unclaimed.
    pub validator: String,

    /// Label written by the owner.
    pub instruction_ats: String,

    /// `""` while pending, [`STATUS_DONE`] once saved.
    pub status: String,

    /// Any other sheet columns, as stored.
    pub extra: BTreeMap<String, serde_json::Value>,

    /// Cells exactly as read, one per header column the sheet had.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(crate) cells: Vec<serde_json::Value>,
}

impl Row {
    /// Row with the three source fields set and no bookkeeping.
    pub fn new(
        instruction: impl Into<String>,
        input: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        Self {
            instruction: instruction.into(),
            input: input.into(),
            output: output.into(),
            ..Default::default()
        }
    }

    pub fn is_done(&self) -> bool {
        self.status == STATUS_DONE
    }

    /// Text of a column by name. Non-string extra cells have no text.
    pub fn get(&self, column: &str) -> Option<&str> {
        match column {
            COL_INSTRUCTION => Some(self.instruction.as_str()),
            COL_INPUT => Some(self.input.as_str()),
            COL_OUTPUT => Some(self.output.as_str()),
            COL_VALIDATOR => Some(self.validator.as_str()),
            COL_INSTRUCTION_ATS => Some(self.instruction_ats.as_str()),
            COL_STATUS => Some(self.status.as_str()),
            other => self.extra.get(other).and_then(serde_json::Value::as_str),
        }
    }

    /// Set a column's text by name; unknown names land in `extra`.
    pub fn set(&mut self, column: &str, value: String) {
        match column {
            COL_INSTRUCTION => self.instruction = value,
            COL_INPUT => self.input = value,
            COL_OUTPUT => self.output = value,
            COL_VALIDATOR => self.validator = value,
            COL_INSTRUCTION_ATS => self.instruction_ats = value,
            COL_STATUS => self.status = value,
            other => {
                self.extra
                    .insert(other.to_string(), serde_json::Value::String(value));
            }
        }
    }

    /// Cell value for a column when no stored cell exists.
    fn value(&self, column: &str) -> serde_json::Value {
        match self.extra.get(column) {
            Some(value) => value.clone(),
            None => serde_json::Value::String(self.get(column).unwrap_or_default().to_string()),
        }
    }
}

/// Where a row sits in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RowState {
    /// No validator yet.
    Unassigned,
    /// Claimed, label not saved.
    Pending,
    /// Claimed and saved at least once.
    Done,
}

/// Normalized table: bookkeeping and source columns are total strings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    /// Full header, in sheet order.
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl Table {
    /// Table with the standard header and the given rows.
    pub fn from_rows(rows: Vec<Row>) -> Self {
        let columns = SOURCE_COLUMNS
            .iter()
            .chain(BOOKKEEPING_COLUMNS.iter())
            .map(|c| c.to_string())
            .collect();
        Self { columns, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    /// Convert back to the loosely typed form stores persist.
    ///
    /// Stored cells are written back as read. Bookkeeping cells are only
    /// replaced when their value actually changed.
    pub fn to_raw(&self) -> RawTable {
        let rows = self
            .rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .enumerate()
                    .map(|(i, col)| match row.cells.get(i) {
                        Some(cell) if !BOOKKEEPING_COLUMNS.contains(&col.as_str()) => cell.clone(),
                        Some(cell) if row.get(col) == Some(coerce_cell(cell).as_str()) => {
                            cell.clone()
                        }
                        _ => row.value(col),
                    })
                    .collect()
            })
            .collect();

        RawTable {
            columns: self.columns.clone(),
            rows,
        }
    }
}

/// Table as a sheet connector hands it over: a header plus loosely typed
/// cells. Rows may be shorter than the header.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
}

impl RawTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Build from a list of JSON objects. Columns appear in first-seen order.
    pub fn from_records(records: &[serde_json::Map<String, serde_json::Value>]) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for record in records {
            for key in record.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }

        let rows = records
            .iter()
            .map(|record| {
                columns
                    .iter()
                    .map(|col| record.get(col).cloned().unwrap_or(serde_json::Value::Null))
                    .collect()
            })
            .collect();

        Self { columns, rows }
    }

    /// Parse a sheet export. Accepts either `{"columns": [...], "rows": [[...]]}`
    /// or an array of objects.
    pub fn from_json(data: &[u8]) -> Result<Self> {
        let value: serde_json::Value =
            serde_json::from_slice(data).map_err(|e| ClaimError::Deserialization(e.to_string()))?;

        match value {
            serde_json::Value::Array(items) => {
                let mut records = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        serde_json::Value::Object(map) => records.push(map),
                        other => {
                            return Err(ClaimError::Deserialization(format!(
                                "expected an object per row, got {}",
                                other
                            )))
                        }
                    }
                }
                Ok(Self::from_records(&records))
            }
            value @ serde_json::Value::Object(_) => serde_json::from_value(value)
                .map_err(|e| ClaimError::Deserialization(e.to_string())),
            other => Err(ClaimError::Deserialization(format!(
                "unsupported sheet document: {}",
                other
            ))),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A table together with the revision it was read at.
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    pub table: RawTable,
    pub revision: Revision,
}
