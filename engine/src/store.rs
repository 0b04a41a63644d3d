//! Store - the in-memory reference storage.
//!
//! The Store holds tables, columns, and objects in ordered maps so that two
//! stores fed the same changesets export byte-identical snapshots. It
//! implements [`Storage`] and is what tests, benchmarks, and the FFI apply
//! changesets to.

use crate::{
    error::Result, storage::ColumnInfo, ColKey, ColumnDef, Error, FieldRef, ObjKey, PrimaryKey,
    PrimaryKeyDef, SchemaVersion, Storage, TableKey, TableName, Value,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Contents of one field of one object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Cell {
    Scalar(Value),
    List(Vec<Value>),
}

impl Cell {
    fn empty(def: &ColumnDef) -> Self {
        if def.list {
            Cell::List(Vec::new())
        } else {
            Cell::Scalar(def.default_value())
        }
    }

    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            Cell::Scalar(v) => Some(v),
            Cell::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Cell::Scalar(_) => None,
            Cell::List(items) => Some(items),
        }
    }
}

/// A column and its key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub key: ColKey,
    pub def: ColumnDef,
}

/// An object (row).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Object {
    pub key: ObjKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<PrimaryKey>,
    pub fields: BTreeMap<ColKey, Cell>,
}

impl Object {
    pub fn get(&self, column: ColKey) -> Option<&Cell> {
        self.fields.get(&column)
    }
}

/// A table of objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    key: TableKey,
    name: TableName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    primary_key: Option<PrimaryKeyDef>,
    columns: Vec<Column>,
    objects: BTreeMap<ObjKey, Object>,
    next_column: u32,
    next_object: u64,
    /// Primary key index, rebuilt on import
    #[serde(skip)]
    index: BTreeMap<PrimaryKey, ObjKey>,
}

impl Table {
    fn new(
        key: TableKey,
        name: impl Into<TableName>,
        primary_key: Option<PrimaryKeyDef>,
    ) -> Result<Self> {
        let mut table = Self {
            key,
            name: name.into(),
            primary_key: None,
            columns: Vec::new(),
            objects: BTreeMap::new(),
            next_column: 0,
            next_object: 0,
            index: BTreeMap::new(),
        };
        if let Some(pk) = primary_key {
            table.push_column(pk.column_def())?;
            table.primary_key = Some(pk);
        }
        Ok(table)
    }

    pub fn key(&self) -> TableKey {
        self.key
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn primary_key(&self) -> Option<&PrimaryKeyDef> {
        self.primary_key.as_ref()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Get a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.def.name == name)
    }

    pub fn object(&self, key: ObjKey) -> Option<&Object> {
        self.objects.get(&key)
    }

    /// All objects in key order.
    pub fn objects(&self) -> impl Iterator<Item = &Object> {
        self.objects.values()
    }

    /// Find an object by primary key.
    pub fn find(&self, key: &PrimaryKey) -> Option<ObjKey> {
        self.index.get(key).copied()
    }

    /// Get a field by object key and column name.
    pub fn value(&self, object: ObjKey, column: &str) -> Option<&Cell> {
        let column = self.column(column)?;
        self.objects.get(&object)?.get(column.key)
    }

    /// Count of objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    fn push_column(&mut self, def: ColumnDef) -> Result<ColKey> {
        let key = ColKey(self.next_column);
        if self.columns.iter().any(|c| c.key == key) {
            return Err(self.key_in_use(key));
        }
        self.next_column += 1;
        for object in self.objects.values_mut() {
            object.fields.insert(key, Cell::empty(&def));
        }
        self.columns.push(Column { key, def });
        Ok(key)
    }

    fn key_in_use(&self, key: impl std::fmt::Display) -> Error {
        Error::KeyInUse {
            table: self.name.clone(),
            key: key.to_string(),
        }
    }

    fn is_primary_key(&self, def: &ColumnDef) -> bool {
        self.primary_key
            .as_ref()
            .is_some_and(|pk| pk.column == def.name)
    }

    fn column_def(&self, column: ColKey) -> Result<&ColumnDef> {
        self.columns
            .iter()
            .find(|c| c.key == column)
            .map(|c| &c.def)
            .ok_or_else(|| Error::UnknownColumnKey {
                table: self.name.clone(),
                column,
            })
    }

    fn missing_object(&self, object: ObjKey) -> Error {
        Error::UnknownObjectKey {
            table: self.name.clone(),
            object,
        }
    }

    fn cell(&self, object: ObjKey, column: ColKey) -> Result<&Cell> {
        self.column_def(column)?;
        self.objects
            .get(&object)
            .ok_or_else(|| self.missing_object(object))?
            .fields
            .get(&column)
            .ok_or_else(|| Error::UnknownColumnKey {
                table: self.name.clone(),
                column,
            })
    }

    fn cell_mut(&mut self, object: ObjKey, column: ColKey) -> Result<&mut Cell> {
        self.column_def(column)?;
        let missing = self.missing_object(object);
        let table = self.name.clone();
        self.objects
            .get_mut(&object)
            .ok_or(missing)?
            .fields
            .get_mut(&column)
            .ok_or(Error::UnknownColumnKey { table, column })
    }

    /// Check that the key counters, columns and objects agree with each
    /// other. Fails with [`Error::InvalidSnapshot`].
    pub(crate) fn check_consistency(&self) -> Result<()> {
        let invalid = |msg: String| Error::InvalidSnapshot(format!("table {}: {}", self.name, msg));

        let mut keys = BTreeSet::new();
        let mut names = BTreeSet::new();
        for column in &self.columns {
            if column.key.0 >= self.next_column || !keys.insert(column.key) {
                return Err(invalid(format!("invalid column key {}", column.key)));
            }
            if !names.insert(column.def.name.as_str()) {
                return Err(invalid(format!("duplicate column {}", column.def.name)));
            }
            column
                .def
                .validate()
                .map_err(|e| invalid(e.to_string()))?;
        }
        if let Some(pk) = &self.primary_key {
            if !names.contains(pk.column.as_str()) {
                return Err(invalid(format!("missing primary key column {}", pk.column)));
            }
        }

        let mut primary_keys = BTreeSet::new();
        for (key, object) in &self.objects {
            if object.key != *key || key.0 >= self.next_object {
                return Err(invalid(format!("invalid object key {}", object.key)));
            }
            match &self.primary_key {
                Some(def) => def
                    .check(&self.name, object.primary_key.as_ref())
                    .map_err(|e| invalid(format!("{}: {}", key, e)))?,
                None if object.primary_key.is_some() => {
                    return Err(invalid(format!("{} has a primary key", key)))
                }
                None => {}
            }
            if let Some(pk) = &object.primary_key {
                if !primary_keys.insert(pk) {
                    return Err(invalid(format!("duplicate primary key {}", pk)));
                }
            }
            if object.fields.len() != self.columns.len() {
                return Err(invalid(format!("{} has {} fields", key, object.fields.len())));
            }
            for column in &self.columns {
                let values: &[Value] = match (object.get(column.key), column.def.list) {
                    (Some(Cell::Scalar(v)), false) => std::slice::from_ref(v),
                    (Some(Cell::List(items)), true) => items,
                    _ => {
                        return Err(invalid(format!(
                            "{} has no valid cell for {}",
                            key, column.def.name
                        )))
                    }
                };
                for value in values {
                    column
                        .def
                        .check_element(value)
                        .map_err(|e| invalid(format!("{}: {}", key, e)))?;
                }
            }
        }

        Ok(())
    }

    fn rebuild_index(&mut self) {
        self.index = self
            .objects
            .values()
            .filter_map(|o| o.primary_key.clone().map(|pk| (pk, o.key)))
            .collect();
    }
}

/// The in-memory store.
#[derive(Debug, Clone, PartialEq)]
pub struct Store {
    schema_version: SchemaVersion,
    tables: BTreeMap<TableKey, Table>,
    next_table: u32,
}

impl Store {
    /// Create an empty store at the given schema version.
    pub fn new(schema_version: SchemaVersion) -> Self {
        Self {
            schema_version,
            tables: BTreeMap::new(),
            next_table: 0,
        }
    }

    /// Get a table by name.
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.values().find(|t| t.name == name)
    }

    /// All tables in key order.
    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.values()
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    fn table_ref(&self, key: TableKey) -> Result<&Table> {
        self.tables.get(&key).ok_or(Error::UnknownTableKey(key))
    }

    fn table_mut(&mut self, key: TableKey) -> Result<&mut Table> {
        self.tables.get_mut(&key).ok_or(Error::UnknownTableKey(key))
    }

    fn field_def(&self, field: FieldRef) -> Result<&ColumnDef> {
        self.table_ref(field.table)?.column_def(field.column)
    }

    /// Check a value about to be written into a column of `def`.
    fn check_value(&self, def: &ColumnDef, value: &Value) -> Result<()> {
        def.check_element(value)?;

        if let (Value::Link(object), Some(target)) = (value, &def.link_target) {
            let target_key = self
                .find_table(target)
                .ok_or_else(|| Error::TableNotFound(target.clone()))?;
            if !self.contains_object(target_key, *object)? {
                return Err(Error::ObjectNotFound {
                    table: target.clone(),
                    object: object.to_string(),
                });
            }
        }

        Ok(())
    }

    fn list_ref(&self, field: FieldRef) -> Result<&Vec<Value>> {
        let table = self.table_ref(field.table)?;
        match table.cell(field.object, field.column)? {
            Cell::List(items) => Ok(items),
            Cell::Scalar(_) => Err(Error::NotAList {
                table: table.name.clone(),
                column: table.column_def(field.column)?.name.clone(),
            }),
        }
    }

    fn list_mut(&mut self, field: FieldRef) -> Result<&mut Vec<Value>> {
        let table = self.table_mut(field.table)?;
        let not_a_list = Error::NotAList {
            table: table.name.clone(),
            column: table.column_def(field.column)?.name.clone(),
        };
        match table.cell_mut(field.object, field.column)? {
            Cell::List(items) => Ok(items),
            Cell::Scalar(_) => Err(not_a_list),
        }
    }

    /// Checks a list element and returns the list it goes into.
    fn checked_list(&mut self, field: FieldRef, value: &Value) -> Result<&mut Vec<Value>> {
        let def = self.field_def(field)?.clone();
        self.check_value(&def, value)?;
        self.list_mut(field)
    }

    /// Export the current store state as a snapshot.
    pub fn export_state(&self) -> crate::snapshot::StoreSnapshot {
        let mut snapshot = crate::snapshot::StoreSnapshot::new(self.schema_version);
        snapshot.next_table = self.next_table;
        snapshot.tables = self.tables.values().cloned().collect();
        snapshot
    }

    /// Import state from a snapshot.
    ///
    /// This replaces the current state with the snapshot's state.
    pub fn import_state(&mut self, snapshot: crate::snapshot::StoreSnapshot) -> Result<()> {
        snapshot.validate()?;

        self.schema_version = snapshot.schema_version;
        self.next_table = snapshot.next_table;
        self.tables = snapshot
            .tables
            .into_iter()
            .map(|mut table| {
                table.rebuild_index();
                (table.key, table)
            })
            .collect();

        Ok(())
    }
}

impl Storage for Store {
    fn schema_version(&self) -> SchemaVersion {
        self.schema_version
    }

    fn find_table(&self, name: &str) -> Option<TableKey> {
        self.table(name).map(|t| t.key)
    }

    fn table_name(&self, table: TableKey) -> Result<&str> {
        self.table_ref(table).map(|t| t.name.as_str())
    }

    fn add_table(&mut self, name: &str, primary_key: Option<PrimaryKeyDef>) -> Result<TableKey> {
        if self.find_table(name).is_some() {
            return Err(Error::TableExists(name.to_string()));
        }

        let key = TableKey(self.next_table);
        if self.tables.contains_key(&key) {
            return Err(Error::KeyInUse {
                table: name.to_string(),
                key: key.to_string(),
            });
        }
        let table = Table::new(key, name, primary_key)?;
        self.next_table += 1;
        self.tables.insert(key, table);
        Ok(key)
    }

    fn erase_table(&mut self, table: TableKey) -> Result<()> {
        if let Some(origin) = self.link_origins(table)?.into_iter().next() {
            return Err(Error::TableIsLinkTarget {
                table: self.table_name(table)?.to_string(),
                origin,
            });
        }
        self.tables.remove(&table);
        Ok(())
    }

    fn link_origins(&self, table: TableKey) -> Result<Vec<String>> {
        let name = self.table_name(table)?;
        Ok(self
            .tables
            .values()
            .filter(|t| t.key != table)
            .filter(|t| {
                t.columns
                    .iter()
                    .any(|c| c.def.link_target.as_deref() == Some(name))
            })
            .map(|t| t.name.clone())
            .collect())
    }

    fn primary_key(&self, table: TableKey) -> Result<Option<&PrimaryKeyDef>> {
        Ok(self.table_ref(table)?.primary_key.as_ref())
    }

    fn find_column(&self, table: TableKey, name: &str) -> Result<Option<ColumnInfo>> {
        Ok(self.table_ref(table)?.column(name).map(|c| ColumnInfo {
            key: c.key,
            def: c.def.clone(),
        }))
    }

    fn column(&self, table: TableKey, column: ColKey) -> Result<ColumnInfo> {
        let def = self.table_ref(table)?.column_def(column)?;
        Ok(ColumnInfo {
            key: column,
            def: def.clone(),
        })
    }

    fn add_column(&mut self, table: TableKey, def: ColumnDef) -> Result<ColKey> {
        def.validate()?;
        if let Some(target) = &def.link_target {
            if self.find_table(target).is_none() {
                return Err(Error::TableNotFound(target.clone()));
            }
        }

        let table = self.table_mut(table)?;
        if table.column(&def.name).is_some() {
            return Err(Error::ColumnExists {
                table: table.name.clone(),
                column: def.name,
            });
        }
        table.push_column(def)
    }

    fn erase_column(&mut self, table: TableKey, column: ColKey) -> Result<()> {
        let table = self.table_mut(table)?;
        let def = table.column_def(column)?;
        if table.is_primary_key(def) {
            return Err(Error::PrimaryKeyColumn {
                table: table.name.clone(),
                column: def.name.clone(),
            });
        }

        table.columns.retain(|c| c.key != column);
        for object in table.objects.values_mut() {
            object.fields.remove(&column);
        }
        Ok(())
    }

    fn create_object(
        &mut self,
        table: TableKey,
        primary_key: Option<PrimaryKey>,
    ) -> Result<ObjKey> {
        let table = self.table_mut(table)?;

        match (&table.primary_key, &primary_key) {
            (Some(def), key) => def.check(&table.name, key.as_ref())?,
            (None, None) => {}
            (None, Some(_)) => {
                return Err(Error::PrimaryKeyMismatch {
                    table: table.name.clone(),
                    reason: "table has no primary key".into(),
                })
            }
        }
        if let Some(key) = &primary_key {
            if table.index.contains_key(key) {
                return Err(Error::ObjectExists {
                    table: table.name.clone(),
                    key: key.to_string(),
                });
            }
        }

        let key = ObjKey(table.next_object);
        if table.objects.contains_key(&key) {
            return Err(table.key_in_use(key));
        }
        table.next_object += 1;

        let fields = table
            .columns
            .iter()
            .map(|c| {
                let cell = match &primary_key {
                    Some(pk) if table.is_primary_key(&c.def) => Cell::Scalar(pk.to_value()),
                    _ => Cell::empty(&c.def),
                };
                (c.key, cell)
            })
            .collect();

        if let Some(pk) = &primary_key {
            table.index.insert(pk.clone(), key);
        }
        table.objects.insert(
            key,
            Object {
                key,
                primary_key,
                fields,
            },
        );
        Ok(key)
    }

    fn find_object(&self, table: TableKey, primary_key: &PrimaryKey) -> Result<Option<ObjKey>> {
        Ok(self.table_ref(table)?.find(primary_key))
    }

    fn contains_object(&self, table: TableKey, object: ObjKey) -> Result<bool> {
        Ok(self.table_ref(table)?.objects.contains_key(&object))
    }

    fn erase_object(&mut self, table: TableKey, object: ObjKey) -> Result<()> {
        let origin = self.table_mut(table)?;
        let removed = origin
            .objects
            .remove(&object)
            .ok_or_else(|| origin.missing_object(object))?;
        if let Some(pk) = &removed.primary_key {
            origin.index.remove(pk);
        }
        let name = origin.name.clone();

        // Nullify links and drop link list entries pointing at the erased object
        let dangling = Value::Link(object);
        for table in self.tables.values_mut() {
            let link_columns: Vec<ColKey> = table
                .columns
                .iter()
                .filter(|c| c.def.link_target.as_deref() == Some(name.as_str()))
                .map(|c| c.key)
                .collect();
            if link_columns.is_empty() {
                continue;
            }
            for object in table.objects.values_mut() {
                for column in &link_columns {
                    match object.fields.get_mut(column) {
                        Some(Cell::Scalar(v)) if *v == dangling => *v = Value::Null,
                        Some(Cell::List(items)) => items.retain(|v| *v != dangling),
                        _ => {}
                    }
                }
            }
        }

        Ok(())
    }

    fn object_count(&self, table: TableKey) -> Result<usize> {
        Ok(self.table_ref(table)?.len())
    }

    fn get(&self, field: FieldRef) -> Result<Value> {
        let table = self.table_ref(field.table)?;
        match table.cell(field.object, field.column)? {
            Cell::Scalar(v) => Ok(v.clone()),
            Cell::List(_) => Err(Error::NotAScalar(
                table.column_def(field.column)?.name.clone(),
            )),
        }
    }

    fn set(&mut self, field: FieldRef, value: Value) -> Result<()> {
        let table = self.table_ref(field.table)?;
        let def = table.column_def(field.column)?.clone();
        if def.list {
            return Err(Error::NotAScalar(def.name));
        }
        if table.is_primary_key(&def) {
            return Err(Error::PrimaryKeyColumn {
                table: table.name.clone(),
                column: def.name,
            });
        }
        self.check_value(&def, &value)?;

        let cell = self
            .table_mut(field.table)?
            .cell_mut(field.object, field.column)?;
        *cell = Cell::Scalar(value);
        Ok(())
    }

    fn add_int(&mut self, field: FieldRef, delta: i64) -> Result<i64> {
        let table = self.table_mut(field.table)?;
        let def = table.column_def(field.column)?.clone();
        if def.list {
            return Err(Error::NotAScalar(def.name));
        }
        if table.is_primary_key(&def) {
            return Err(Error::PrimaryKeyColumn {
                table: table.name.clone(),
                column: def.name,
            });
        }

        match table.cell_mut(field.object, field.column)? {
            Cell::Scalar(Value::Int(i)) => {
                *i = i.wrapping_add(delta);
                Ok(*i)
            }
            Cell::Scalar(Value::Null) => Err(Error::NullIncrement(def.name)),
            Cell::Scalar(other) => Err(Error::TypeMismatch {
                field: def.name,
                expected: "Int".into(),
                got: other.type_name().into(),
            }),
            Cell::List(_) => Err(Error::NotAScalar(def.name)),
        }
    }

    fn list_len(&self, field: FieldRef) -> Result<usize> {
        self.list_ref(field).map(|items| items.len())
    }

    fn list_get(&self, field: FieldRef, index: usize) -> Result<Value> {
        let items = self.list_ref(field)?;
        items
            .get(index)
            .cloned()
            .ok_or(Error::IndexOutOfBounds {
                index,
                len: items.len(),
            })
    }

    fn list_insert(&mut self, field: FieldRef, index: usize, value: Value) -> Result<()> {
        let items = self.checked_list(field, &value)?;
        if index > items.len() {
            return Err(Error::IndexOutOfBounds {
                index,
                len: items.len(),
            });
        }
        items.insert(index, value);
        Ok(())
    }

    fn list_set(&mut self, field: FieldRef, index: usize, value: Value) -> Result<()> {
        let items = self.checked_list(field, &value)?;
        check_index(index, items.len())?;
        items[index] = value;
        Ok(())
    }

    fn list_erase(&mut self, field: FieldRef, index: usize) -> Result<()> {
        let items = self.list_mut(field)?;
        check_index(index, items.len())?;
        items.remove(index);
        Ok(())
    }

    fn list_move(&mut self, field: FieldRef, from: usize, to: usize) -> Result<()> {
        let items = self.list_mut(field)?;
        check_index(from, items.len())?;
        check_index(to, items.len())?;
        let item = items.remove(from);
        items.insert(to, item);
        Ok(())
    }

    fn list_swap(&mut self, field: FieldRef, a: usize, b: usize) -> Result<()> {
        let items = self.list_mut(field)?;
        check_index(a, items.len())?;
        check_index(b, items.len())?;
        items.swap(a, b);
        Ok(())
    }

    fn list_clear(&mut self, field: FieldRef) -> Result<()> {
        self.list_mut(field)?.clear();
        Ok(())
    }
}

fn check_index(index: usize, len: usize) -> Result<()> {
    if index < len {
        Ok(())
    } else {
        Err(Error::IndexOutOfBounds { index, len })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{KeyType, ValueType};

    fn test_store() -> (Store, TableKey) {
        let mut store = Store::new(1);
        let dogs = store.add_table("dogs", None).unwrap();
        store
            .add_column(dogs, ColumnDef::required("age", ValueType::Int))
            .unwrap();
        store
            .add_column(dogs, ColumnDef::list("tags", ValueType::String))
            .unwrap();
        (store, dogs)
    }

    fn column(store: &Store, table: TableKey, name: &str) -> ColKey {
        store.find_column(table, name).unwrap().unwrap().key
    }

    #[test]
    fn create_store() {
        let store = Store::new(3);
        assert_eq!(store.schema_version(), 3);
        assert_eq!(store.table_count(), 0);
        assert!(store.find_table("dogs").is_none());
    }

    #[test]
    fn add_table_duplicate() {
        let (mut store, _) = test_store();
        let result = store.add_table("dogs", None);
        assert!(matches!(result, Err(Error::TableExists(t)) if t == "dogs"));
        assert_eq!(store.table_count(), 1);
    }

    #[test]
    fn create_object_defaults() {
        let (mut store, dogs) = test_store();
        let rex = store.create_object(dogs, None).unwrap();

        let table = store.table("dogs").unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(
            table.value(rex, "age"),
            Some(&Cell::Scalar(Value::Int(0)))
        );
        assert_eq!(table.value(rex, "tags"), Some(&Cell::List(Vec::new())));
    }

    #[test]
    fn object_keys_are_sequential() {
        let (mut store, dogs) = test_store();
        let a = store.create_object(dogs, None).unwrap();
        let b = store.create_object(dogs, None).unwrap();
        store.erase_object(dogs, a).unwrap();
        let c = store.create_object(dogs, None).unwrap();

        assert_eq!((a, b, c), (ObjKey(0), ObjKey(1), ObjKey(2)));
        assert_eq!(store.object_count(dogs).unwrap(), 2);
    }

    #[test]
    fn add_column_fills_existing_objects() {
        let (mut store, dogs) = test_store();
        let rex = store.create_object(dogs, None).unwrap();
        store
            .add_column(dogs, ColumnDef::optional("name", ValueType::String))
            .unwrap();

        let table = store.table("dogs").unwrap();
        assert_eq!(table.value(rex, "name"), Some(&Cell::Scalar(Value::Null)));
    }

    #[test]
    fn set_and_add_int() {
        let (mut store, dogs) = test_store();
        let rex = store.create_object(dogs, None).unwrap();
        let age = FieldRef::new(dogs, rex, column(&store, dogs, "age"));

        store.set(age, Value::Int(5)).unwrap();
        assert_eq!(store.add_int(age, 2).unwrap(), 7);
        assert_eq!(store.get(age).unwrap(), Value::Int(7));

        store.set(age, Value::Int(i64::MAX)).unwrap();
        assert_eq!(store.add_int(age, 1).unwrap(), i64::MIN);

        let result = store.set(age, Value::String("old".into()));
        assert!(matches!(result, Err(Error::TypeMismatch { .. })));
    }

    #[test]
    fn list_operations() {
        let (mut store, dogs) = test_store();
        let rex = store.create_object(dogs, None).unwrap();
        let tags = FieldRef::new(dogs, rex, column(&store, dogs, "tags"));
        let s = |v: &str| Value::String(v.into());

        store.list_insert(tags, 0, s("a")).unwrap();
        store.list_insert(tags, 1, s("b")).unwrap();
        store.list_insert(tags, 2, s("c")).unwrap();
        store.list_move(tags, 0, 2).unwrap();
        assert_eq!(store.list_ref(tags).unwrap(), &vec![s("b"), s("c"), s("a")]);

        store.list_swap(tags, 0, 2).unwrap();
        store.list_set(tags, 1, s("z")).unwrap();
        assert_eq!(store.list_ref(tags).unwrap(), &vec![s("a"), s("z"), s("b")]);

        store.list_erase(tags, 0).unwrap();
        assert_eq!(store.list_len(tags).unwrap(), 2);
        assert_eq!(store.list_get(tags, 1).unwrap(), s("b"));
        assert!(matches!(
            store.list_get(tags, 2),
            Err(Error::IndexOutOfBounds { index: 2, len: 2 })
        ));

        let result = store.list_insert(tags, 5, s("x"));
        assert!(matches!(
            result,
            Err(Error::IndexOutOfBounds { index: 5, len: 2 })
        ));

        store.list_clear(tags).unwrap();
        assert_eq!(store.list_len(tags).unwrap(), 0);
    }

    #[test]
    fn primary_keys() {
        let mut store = Store::new(1);
        let people = store
            .add_table(
                "people",
                Some(PrimaryKeyDef::new("_id", KeyType::String, false)),
            )
            .unwrap();

        let alice = store
            .create_object(people, Some(PrimaryKey::String("alice".into())))
            .unwrap();
        assert_eq!(
            store
                .find_object(people, &PrimaryKey::String("alice".into()))
                .unwrap(),
            Some(alice)
        );

        let duplicate = store.create_object(people, Some(PrimaryKey::String("alice".into())));
        assert!(matches!(duplicate, Err(Error::ObjectExists { .. })));

        let missing = store.create_object(people, None);
        assert!(matches!(missing, Err(Error::PrimaryKeyMismatch { .. })));

        let pk = column(&store, people, "_id");
        let result = store.set(FieldRef::new(people, alice, pk), Value::String("bob".into()));
        assert!(matches!(result, Err(Error::PrimaryKeyColumn { .. })));
        assert!(matches!(
            store.erase_column(people, pk),
            Err(Error::PrimaryKeyColumn { .. })
        ));
    }

    #[test]
    fn erase_object_clears_links() {
        let mut store = Store::new(1);
        let people = store.add_table("people", None).unwrap();
        let dogs = store.add_table("dogs", None).unwrap();
        let owner = store
            .add_column(dogs, ColumnDef::link("owner", "people"))
            .unwrap();
        let walkers = store
            .add_column(dogs, ColumnDef::link_list("walkers", "people"))
            .unwrap();

        let alice = store.create_object(people, None).unwrap();
        let bob = store.create_object(people, None).unwrap();
        let rex = store.create_object(dogs, None).unwrap();

        store
            .set(FieldRef::new(dogs, rex, owner), Value::Link(alice))
            .unwrap();
        let walkers = FieldRef::new(dogs, rex, walkers);
        store.list_insert(walkers, 0, Value::Link(alice)).unwrap();
        store.list_insert(walkers, 1, Value::Link(bob)).unwrap();
        store.list_insert(walkers, 2, Value::Link(alice)).unwrap();

        store.erase_object(people, alice).unwrap();

        assert_eq!(
            store.get(FieldRef::new(dogs, rex, owner)).unwrap(),
            Value::Null
        );
        assert_eq!(store.list_ref(walkers).unwrap(), &vec![Value::Link(bob)]);
    }

    #[test]
    fn link_to_missing_object() {
        let mut store = Store::new(1);
        store.add_table("people", None).unwrap();
        let dogs = store.add_table("dogs", None).unwrap();
        let owner = store
            .add_column(dogs, ColumnDef::link("owner", "people"))
            .unwrap();
        let rex = store.create_object(dogs, None).unwrap();

        let result = store.set(FieldRef::new(dogs, rex, owner), Value::Link(ObjKey(9)));
        assert!(matches!(result, Err(Error::ObjectNotFound { .. })));
    }

    #[test]
    fn erase_link_target_table() {
        let mut store = Store::new(1);
        let people = store.add_table("people", None).unwrap();
        let dogs = store.add_table("dogs", None).unwrap();
        store
            .add_column(dogs, ColumnDef::link("owner", "people"))
            .unwrap();

        assert_eq!(store.link_origins(people).unwrap(), vec!["dogs".to_string()]);
        let result = store.erase_table(people);
        assert!(matches!(
            result,
            Err(Error::TableIsLinkTarget { table, origin }) if table == "people" && origin == "dogs"
        ));

        store.erase_table(dogs).unwrap();
        store.erase_table(people).unwrap();
        assert_eq!(store.table_count(), 0);
    }

    #[test]
    fn self_link_does_not_block_erase() {
        let mut store = Store::new(1);
        let people = store.add_table("people", None).unwrap();
        store
            .add_column(people, ColumnDef::link("friend", "people"))
            .unwrap();

        assert!(store.link_origins(people).unwrap().is_empty());
        store.erase_table(people).unwrap();
    }

    #[test]
    fn erase_column_removes_fields() {
        let (mut store, dogs) = test_store();
        let rex = store.create_object(dogs, None).unwrap();
        let age = column(&store, dogs, "age");

        store.erase_column(dogs, age).unwrap();

        assert!(store.find_column(dogs, "age").unwrap().is_none());
        let table = store.table("dogs").unwrap();
        assert!(table.object(rex).unwrap().get(age).is_none());
    }

    #[test]
    fn stale_keys() {
        let (mut store, dogs) = test_store();
        store.erase_table(dogs).unwrap();

        assert!(matches!(
            store.create_object(dogs, None),
            Err(Error::UnknownTableKey(k)) if k == dogs
        ));
    }

    #[test]
    fn create_object_never_overwrites() {
        let (mut store, dogs) = test_store();
        let rex = store.create_object(dogs, None).unwrap();
        let age = FieldRef::new(dogs, rex, column(&store, dogs, "age"));
        store.set(age, Value::Int(42)).unwrap();
        store.tables.get_mut(&dogs).unwrap().next_object = 0;

        assert_eq!(
            store.create_object(dogs, None),
            Err(Error::KeyInUse {
                table: "dogs".into(),
                key: "obj#0".into(),
            })
        );
        assert_eq!(store.object_count(dogs).unwrap(), 1);
        assert_eq!(store.get(age).unwrap(), Value::Int(42));
    }

    #[test]
    fn add_column_never_overwrites() {
        let (mut store, dogs) = test_store();
        store.tables.get_mut(&dogs).unwrap().next_column = 1;

        let result = store.add_column(dogs, ColumnDef::optional("name", ValueType::String));
        assert!(matches!(result, Err(Error::KeyInUse { key, .. }) if key == "col#1"));
        assert_eq!(store.table("dogs").unwrap().columns().len(), 2);
        assert!(store.find_column(dogs, "name").unwrap().is_none());
    }

    #[test]
    fn add_table_never_overwrites() {
        let (mut store, dogs) = test_store();
        store.next_table = 0;

        let result = store.add_table("cats", None);
        assert!(matches!(result, Err(Error::KeyInUse { key, .. }) if key == "table#0"));
        assert_eq!(store.table_name(dogs).unwrap(), "dogs");
        assert_eq!(store.table_count(), 1);
    }

    #[test]
    fn consistency_of_built_tables() {
        let mut store = Store::new(1);
        let people = store
            .add_table("people", Some(PrimaryKeyDef::new("_id", KeyType::Int, false)))
            .unwrap();
        store.create_object(people, Some(PrimaryKey::Int(1))).unwrap();
        let (dogs_store, _) = test_store();

        for table in store.tables().chain(dogs_store.tables()) {
            assert!(table.check_consistency().is_ok());
        }

        let mut people_table = store.table("people").unwrap().clone();
        let alice = people_table.objects.get_mut(&ObjKey(0)).unwrap();
        alice.primary_key = Some(PrimaryKey::String("alice".into()));
        assert!(matches!(
            people_table.check_consistency(),
            Err(Error::InvalidSnapshot(msg)) if msg.contains("expected Int key")
        ));
    }
}
