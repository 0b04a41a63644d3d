//! The store contract.
//!
//! [`Storage`] is the entire set of capabilities the applier needs from
//! persistent storage. The applier validates every instruction before calling
//! into it; implementations are still expected to reject calls that would
//! break their own invariants.
//!
//! Transactions are not part of this contract. The caller opens one before
//! `apply` and commits or rolls it back afterwards.

use crate::{
    error::Result, ColKey, ColumnDef, ObjKey, PrimaryKey, PrimaryKeyDef, SchemaVersion, TableKey,
    Value,
};

/// A column with its key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub key: ColKey,
    pub def: ColumnDef,
}

/// Address of one field of one object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRef {
    pub table: TableKey,
    pub object: ObjKey,
    pub column: ColKey,
}

impl FieldRef {
    pub fn new(table: TableKey, object: ObjKey, column: ColKey) -> Self {
        Self {
            table,
            object,
            column,
        }
    }
}

/// Mutable, schema-bearing storage.
pub trait Storage {
    /// Schema version of the stored data.
    fn schema_version(&self) -> SchemaVersion;

    // Tables

    fn find_table(&self, name: &str) -> Option<TableKey>;

    fn table_name(&self, table: TableKey) -> Result<&str>;

    fn add_table(&mut self, name: &str, primary_key: Option<PrimaryKeyDef>) -> Result<TableKey>;

    fn erase_table(&mut self, table: TableKey) -> Result<()>;

    /// Names of other tables with a link column targeting `table`.
    fn link_origins(&self, table: TableKey) -> Result<Vec<String>>;

    fn primary_key(&self, table: TableKey) -> Result<Option<&PrimaryKeyDef>>;

    // Columns

    fn find_column(&self, table: TableKey, name: &str) -> Result<Option<ColumnInfo>>;

    fn column(&self, table: TableKey, column: ColKey) -> Result<ColumnInfo>;

    fn add_column(&mut self, table: TableKey, def: ColumnDef) -> Result<ColKey>;

    fn erase_column(&mut self, table: TableKey, column: ColKey) -> Result<()>;

    // Objects

    fn create_object(&mut self, table: TableKey, primary_key: Option<PrimaryKey>)
        -> Result<ObjKey>;

    fn find_object(&self, table: TableKey, primary_key: &PrimaryKey) -> Result<Option<ObjKey>>;

    fn contains_object(&self, table: TableKey, object: ObjKey) -> Result<bool>;

    /// Erase an object, nullifying links to it and removing it from link lists.
    fn erase_object(&mut self, table: TableKey, object: ObjKey) -> Result<()>;

    fn object_count(&self, table: TableKey) -> Result<usize>;

    // Scalars

    fn get(&self, field: FieldRef) -> Result<Value>;

    fn set(&mut self, field: FieldRef, value: Value) -> Result<()>;

    /// Add to an integer field, wrapping on overflow. Returns the new value.
    fn add_int(&mut self, field: FieldRef, delta: i64) -> Result<i64>;

    // Lists

    fn list_len(&self, field: FieldRef) -> Result<usize>;

    fn list_get(&self, field: FieldRef, index: usize) -> Result<Value>;

    fn list_insert(&mut self, field: FieldRef, index: usize, value: Value) -> Result<()>;

    fn list_set(&mut self, field: FieldRef, index: usize, value: Value) -> Result<()>;

    fn list_erase(&mut self, field: FieldRef, index: usize) -> Result<()>;

    /// Move the element at `from` so that it ends up at `to`.
    fn list_move(&mut self, field: FieldRef, from: usize, to: usize) -> Result<()>;

    fn list_swap(&mut self, field: FieldRef, a: usize, b: usize) -> Result<()>;

    fn list_clear(&mut self, field: FieldRef) -> Result<()>;
}
