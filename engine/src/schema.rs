//! Schema definitions and store handles.
//!
//! Column definitions carry everything needed to validate a value before it
//! is written: element type, nullability, list-ness, and link target.

use crate::{error::Result, ColumnName, Error, PrimaryKey, TableName, Value};
use serde::{Deserialize, Serialize};

/// Handle of a table in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableKey(pub u32);

/// Handle of a column within its table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColKey(pub u32);

/// Handle of an object (row) within its table.
///
/// Keys are assigned sequentially by the store, so replicas that apply the
/// same changesets from the same state assign the same keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjKey(pub u64);

impl std::fmt::Display for TableKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "table#{}", self.0)
    }
}

impl std::fmt::Display for ColKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "col#{}", self.0)
    }
}

impl std::fmt::Display for ObjKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "obj#{}", self.0)
    }
}

/// Element types a column can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Int,
    Bool,
    Float,
    String,
    Binary,
    Timestamp,
    /// Reference to an object in the column's link target table
    Link,
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueType::Int => write!(f, "Int"),
            ValueType::Bool => write!(f, "Bool"),
            ValueType::Float => write!(f, "Float"),
            ValueType::String => write!(f, "String"),
            ValueType::Binary => write!(f, "Binary"),
            ValueType::Timestamp => write!(f, "Timestamp"),
            ValueType::Link => write!(f, "Link"),
        }
    }
}

/// Types allowed for a primary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyType {
    Int,
    String,
}

impl KeyType {
    pub fn value_type(self) -> ValueType {
        match self {
            KeyType::Int => ValueType::Int,
            KeyType::String => ValueType::String,
        }
    }
}

impl std::fmt::Display for KeyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.value_type().fmt(f)
    }
}

/// Primary key of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrimaryKeyDef {
    /// Name of the primary key column
    pub column: ColumnName,
    pub key_type: KeyType,
    pub nullable: bool,
}

impl PrimaryKeyDef {
    pub fn new(column: impl Into<ColumnName>, key_type: KeyType, nullable: bool) -> Self {
        Self {
            column: column.into(),
            key_type,
            nullable,
        }
    }

    /// Check a key handed to object creation in `table`.
    pub fn check(&self, table: &str, key: Option<&PrimaryKey>) -> Result<()> {
        let mismatch = |reason: String| Error::PrimaryKeyMismatch {
            table: table.to_string(),
            reason,
        };

        match (self.key_type, key) {
            (_, None) => Err(mismatch(format!(
                "missing value for primary key '{}'",
                self.column
            ))),
            (_, Some(PrimaryKey::Null)) if self.nullable => Ok(()),
            (_, Some(PrimaryKey::Null)) => Err(mismatch(format!(
                "primary key '{}' is not nullable",
                self.column
            ))),
            (KeyType::Int, Some(PrimaryKey::Int(_))) => Ok(()),
            (KeyType::String, Some(PrimaryKey::String(_))) => Ok(()),
            (expected, Some(got)) => Err(mismatch(format!(
                "expected {} key, got {}",
                expected,
                got.type_name()
            ))),
        }
    }

    /// The column that stores the key.
    pub fn column_def(&self) -> ColumnDef {
        ColumnDef {
            name: self.column.clone(),
            value_type: self.key_type.value_type(),
            nullable: self.nullable,
            list: false,
            link_target: None,
        }
    }
}

/// Definition of a column in a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDef {
    pub name: ColumnName,
    /// Type of the value, or of each element for lists
    pub value_type: ValueType,
    /// Whether the value (or each list element) may be null
    pub nullable: bool,
    pub list: bool,
    /// Target table for link columns
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_target: Option<TableName>,
}

impl ColumnDef {
    /// A non-null scalar column.
    pub fn required(name: impl Into<ColumnName>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
            nullable: false,
            list: false,
            link_target: None,
        }
    }

    /// A nullable scalar column.
    pub fn optional(name: impl Into<ColumnName>, value_type: ValueType) -> Self {
        Self {
            nullable: true,
            ..Self::required(name, value_type)
        }
    }

    /// A list of non-null elements.
    pub fn list(name: impl Into<ColumnName>, value_type: ValueType) -> Self {
        Self {
            list: true,
            ..Self::required(name, value_type)
        }
    }

    /// A nullable to-one link.
    pub fn link(name: impl Into<ColumnName>, target: impl Into<TableName>) -> Self {
        Self {
            link_target: Some(target.into()),
            ..Self::optional(name, ValueType::Link)
        }
    }

    /// A to-many relation.
    pub fn link_list(name: impl Into<ColumnName>, target: impl Into<TableName>) -> Self {
        Self {
            link_target: Some(target.into()),
            ..Self::list(name, ValueType::Link)
        }
    }

    pub fn is_link_list(&self) -> bool {
        self.list && self.value_type == ValueType::Link
    }

    /// Check that the definition is internally consistent.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| {
            Err(Error::InvalidColumnDef {
                column: self.name.clone(),
                reason: reason.to_string(),
            })
        };

        match (self.value_type, &self.link_target) {
            (ValueType::Link, None) => return invalid("link column without target table"),
            (ValueType::Link, Some(_)) if self.list && self.nullable => {
                return invalid("link list elements cannot be null")
            }
            (ValueType::Link, Some(_)) if !self.list && !self.nullable => {
                return invalid("single link must be nullable")
            }
            (ValueType::Link, Some(_)) => {}
            (_, Some(_)) => return invalid("link target on non-link column"),
            (_, None) => {}
        }

        Ok(())
    }

    /// Check a single value (or list element) against this column.
    ///
    /// Link values are only checked for type here; whether the target object
    /// exists is up to the caller.
    pub fn check_element(&self, value: &Value) -> Result<()> {
        match value.value_type() {
            None if self.nullable => Ok(()),
            None => Err(Error::NotNullable(self.name.clone())),
            Some(t) if t == self.value_type => match value {
                Value::Timestamp(ts) if !ts.is_valid() => Err(Error::InvalidTimestamp {
                    field: self.name.clone(),
                    nanoseconds: ts.nanoseconds,
                }),
                _ => Ok(()),
            },
            Some(_) => Err(Error::TypeMismatch {
                field: self.name.clone(),
                expected: self.value_type.to_string(),
                got: value.type_name().to_string(),
            }),
        }
    }

    /// The value a new object gets for this scalar column.
    pub fn default_value(&self) -> Value {
        if self.nullable {
            return Value::Null;
        }
        match self.value_type {
            ValueType::Int => Value::Int(0),
            ValueType::Bool => Value::Bool(false),
            ValueType::Float => Value::Float(0.0),
            ValueType::String => Value::String(String::new()),
            ValueType::Binary => Value::Binary(Vec::new()),
            ValueType::Timestamp => Value::Timestamp(Default::default()),
            ValueType::Link => Value::Null,
        }
    }
}

impl std::fmt::Display for ColumnDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let element = match &self.link_target {
            Some(target) => format!("Link<{}>", target),
            None => self.value_type.to_string(),
        };
        let element = if self.nullable {
            format!("{}?", element)
        } else {
            element
        };
        if self.list {
            write!(f, "List<{}>", element)
        } else {
            write!(f, "{}", element)
        }
    }
}
