//! Error types for the replay engine.
//!
//! [`Error`] names the specific cause of a failed instruction. Every cause
//! belongs to exactly one [`ErrorKind`]. [`ApplyError`] is what
//! [`crate::apply`] returns: the cause plus the position and kind of the
//! instruction that failed.

use crate::{ColKey, ColumnName, InstructionKind, ObjKey, SchemaVersion, TableKey, TableName};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// All possible causes of a failed instruction.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Reference errors
    #[error("unknown interned string: {0}")]
    UnknownString(u32),

    #[error("string range {offset}+{size} is outside the changeset buffer")]
    BadStringRange { offset: u32, size: u32 },

    #[error("back-reference to created object {index}, but only {created} created so far")]
    UnknownObjectRef { index: u32, created: usize },

    #[error("object {object} not found in table '{table}'")]
    ObjectNotFound { table: TableName, object: String },

    #[error("object belongs to table '{actual}', expected '{expected}'")]
    ObjectTableMismatch {
        expected: TableName,
        actual: TableName,
    },

    #[error("unknown table key: {0}")]
    UnknownTableKey(TableKey),

    #[error("unknown column key {column} in table '{table}'")]
    UnknownColumnKey { table: TableName, column: ColKey },

    #[error("unknown object key {object} in table '{table}'")]
    UnknownObjectKey { table: TableName, object: ObjKey },

    // Selection errors
    #[error("no table selected")]
    NoTableSelected,

    #[error("no list or link list selected")]
    NoContainerSelected,

    #[error("selection was invalidated by an earlier erase")]
    StaleSelection,

    #[error("cannot select table '{0}': no such table")]
    SelectedTableMissing(TableName),

    #[error("cannot select '{column}': no such column in table '{table}'")]
    SelectedColumnMissing {
        table: TableName,
        column: ColumnName,
    },

    #[error("column '{column}' in table '{table}' is not a list")]
    NotAList {
        table: TableName,
        column: ColumnName,
    },

    #[error("column '{column}' in table '{table}' is not a link list")]
    NotALinkList {
        table: TableName,
        column: ColumnName,
    },

    // Schema errors
    #[error("table already exists: {0}")]
    TableExists(TableName),

    #[error("table not found: {0}")]
    TableNotFound(TableName),

    #[error("table '{table}' is the link target of table '{origin}'")]
    TableIsLinkTarget { table: TableName, origin: TableName },

    #[error("column '{column}' already exists in table '{table}'")]
    ColumnExists {
        table: TableName,
        column: ColumnName,
    },

    #[error("column '{column}' not found in table '{table}'")]
    ColumnNotFound {
        table: TableName,
        column: ColumnName,
    },

    #[error("invalid definition for column '{column}': {reason}")]
    InvalidColumnDef { column: ColumnName, reason: String },

    #[error("column '{column}' is the primary key of table '{table}'")]
    PrimaryKeyColumn {
        table: TableName,
        column: ColumnName,
    },

    #[error("primary key mismatch in table '{table}': {reason}")]
    PrimaryKeyMismatch { table: TableName, reason: String },

    #[error("object with primary key {key} already exists in table '{table}'")]
    ObjectExists { table: TableName, key: String },

    #[error("type mismatch for field '{field}': expected {expected}, got {got}")]
    TypeMismatch {
        field: String,
        expected: String,
        got: String,
    },

    #[error("field '{0}' is not nullable")]
    NotNullable(String),

    #[error("field '{0}' is a list, not a scalar")]
    NotAScalar(String),

    #[error("cannot add to null integer field '{0}'")]
    NullIncrement(String),

    #[error("timestamp for field '{field}' has {nanoseconds} nanoseconds, expected 0..1000000000")]
    InvalidTimestamp { field: String, nanoseconds: i32 },

    // Bounds errors
    #[error("index {index} out of bounds for list of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    // Relation errors
    #[error("link in field '{field}' must target table '{expected}', got '{actual}'")]
    LinkTargetMismatch {
        field: String,
        expected: TableName,
        actual: TableName,
    },

    // State errors
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("{key} is already in use in table '{table}'")]
    KeyInUse { table: TableName, key: String },
}

/// Coarse classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// An interned string, buffer range, or back-reference did not resolve.
    MalformedReference,
    /// A required selection is absent, of the wrong kind, or stale.
    InvalidSelection,
    /// Schema objects exist/do not exist, or a value does not fit its column.
    SchemaViolation,
    /// A list index is out of range.
    BoundsViolation,
    /// A link points into the wrong table.
    RelationViolation,
    /// The changeset or snapshot as a whole was rejected.
    MalformedLog,
}

impl ErrorKind {
    /// Whether reapplying the same changeset could succeed.
    ///
    /// Replay failures are deterministic, so this is always `false`.
    pub fn is_retryable(self) -> bool {
        false
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::MalformedReference => write!(f, "malformed reference"),
            ErrorKind::InvalidSelection => write!(f, "invalid selection"),
            ErrorKind::SchemaViolation => write!(f, "schema violation"),
            ErrorKind::BoundsViolation => write!(f, "bounds violation"),
            ErrorKind::RelationViolation => write!(f, "relation violation"),
            ErrorKind::MalformedLog => write!(f, "malformed log"),
        }
    }
}

impl Error {
    /// Classify this cause.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::UnknownString(_)
            | Error::BadStringRange { .. }
            | Error::UnknownObjectRef { .. }
            | Error::ObjectNotFound { .. }
            | Error::ObjectTableMismatch { .. }
            | Error::UnknownTableKey(_)
            | Error::UnknownColumnKey { .. }
            | Error::UnknownObjectKey { .. } => ErrorKind::MalformedReference,

            Error::NoTableSelected
            | Error::NoContainerSelected
            | Error::StaleSelection
            | Error::SelectedTableMissing(_)
            | Error::SelectedColumnMissing { .. }
            | Error::NotAList { .. }
            | Error::NotALinkList { .. } => ErrorKind::InvalidSelection,

            Error::TableExists(_)
            | Error::TableNotFound(_)
            | Error::TableIsLinkTarget { .. }
            | Error::ColumnExists { .. }
            | Error::ColumnNotFound { .. }
            | Error::InvalidColumnDef { .. }
            | Error::PrimaryKeyColumn { .. }
            | Error::PrimaryKeyMismatch { .. }
            | Error::ObjectExists { .. }
            | Error::TypeMismatch { .. }
            | Error::NotNullable(_)
            | Error::NotAScalar(_)
            | Error::NullIncrement(_)
            | Error::InvalidTimestamp { .. } => ErrorKind::SchemaViolation,

            Error::IndexOutOfBounds { .. } => ErrorKind::BoundsViolation,

            Error::LinkTargetMismatch { .. } => ErrorKind::RelationViolation,

            Error::InvalidSnapshot(_) | Error::KeyInUse { .. } => ErrorKind::MalformedLog,
        }
    }
}

/// Result type for instruction handling and store calls.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure of a whole `apply` call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApplyError {
    #[error("instruction {index} ({instruction}) failed: {source}")]
    Instruction {
        index: usize,
        instruction: InstructionKind,
        #[source]
        source: Error,
    },

    #[error("changeset has {actual} instructions, limit is {limit}")]
    TooManyInstructions { limit: usize, actual: usize },

    #[error("changeset schema version mismatch: expected {expected}, got {actual}")]
    SchemaVersionMismatch {
        expected: SchemaVersion,
        actual: SchemaVersion,
    },
}

impl ApplyError {
    /// Zero-based position of the failing instruction.
    pub fn index(&self) -> Option<usize> {
        match self {
            ApplyError::Instruction { index, .. } => Some(*index),
            _ => None,
        }
    }

    /// Kind of the failing instruction.
    pub fn instruction(&self) -> Option<InstructionKind> {
        match self {
            ApplyError::Instruction { instruction, .. } => Some(*instruction),
            _ => None,
        }
    }

    /// The underlying cause, when a specific instruction failed.
    pub fn cause(&self) -> Option<&Error> {
        match self {
            ApplyError::Instruction { source, .. } => Some(source),
            _ => None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ApplyError::Instruction { source, .. } => source.kind(),
            ApplyError::TooManyInstructions { .. } | ApplyError::SchemaVersionMismatch { .. } => {
                ErrorKind::MalformedLog
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = Error::TableNotFound("dogs".into());
        assert_eq!(err.to_string(), "table not found: dogs");

        let err = Error::IndexOutOfBounds { index: 3, len: 0 };
        assert_eq!(err.to_string(), "index 3 out of bounds for list of length 0");

        let err = Error::TypeMismatch {
            field: "age".into(),
            expected: "Int".into(),
            got: "String".into(),
        };
        assert_eq!(
            err.to_string(),
            "type mismatch for field 'age': expected Int, got String"
        );
    }

    #[test]
    fn error_kinds() {
        assert_eq!(Error::UnknownString(7).kind(), ErrorKind::MalformedReference);
        assert_eq!(Error::StaleSelection.kind(), ErrorKind::InvalidSelection);
        assert_eq!(
            Error::TableExists("t".into()).kind(),
            ErrorKind::SchemaViolation
        );
        assert_eq!(
            Error::IndexOutOfBounds { index: 1, len: 0 }.kind(),
            ErrorKind::BoundsViolation
        );
        assert_eq!(
            Error::LinkTargetMismatch {
                field: "owner".into(),
                expected: "people".into(),
                actual: "dogs".into(),
            }
            .kind(),
            ErrorKind::RelationViolation
        );
        assert_eq!(
            Error::KeyInUse {
                table: "dogs".into(),
                key: "obj#0".into(),
            }
            .kind(),
            ErrorKind::MalformedLog
        );
    }

    #[test]
    fn apply_error_accessors() {
        let err = ApplyError::Instruction {
            index: 4,
            instruction: InstructionKind::ListInsert,
            source: Error::IndexOutOfBounds { index: 3, len: 0 },
        };
        assert_eq!(err.index(), Some(4));
        assert_eq!(err.instruction(), Some(InstructionKind::ListInsert));
        assert_eq!(err.kind(), ErrorKind::BoundsViolation);
        assert!(!err.kind().is_retryable());
        assert_eq!(
            err.to_string(),
            "instruction 4 (ListInsert) failed: index 3 out of bounds for list of length 0"
        );

        let err = ApplyError::TooManyInstructions {
            limit: 10,
            actual: 11,
        };
        assert_eq!(err.index(), None);
        assert!(err.cause().is_none());
        assert_eq!(err.kind(), ErrorKind::MalformedLog);
    }
}
