//! Identifier resolution.
//!
//! Instructions refer to names through the intern table, to payload strings
//! through buffer ranges, and to objects through [`ObjectRef`]s. The
//! [`Resolver`] turns these into strings and store handles, and keeps the
//! arena of objects created so far in the changeset for back-references.
//!
//! Registering a created object is the only state the resolver changes.
//! [`Resolver::create_table`] writes to the store, but only through the
//! store handle the caller passes in.

use crate::{
    error::Result, storage::ColumnInfo, Changeset, Error, InternString, KeyPayload, ObjKey,
    ObjectRef, PrimaryKey, PrimaryKeyDef, PrimaryKeySpec, Storage, StringRange, TableKey,
};

/// An object created earlier in the current changeset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectHandle {
    pub table: TableKey,
    pub object: ObjKey,
}

/// Resolves references for one `apply` call.
#[derive(Debug)]
pub struct Resolver<'c> {
    changeset: &'c Changeset,
    created: Vec<ObjectHandle>,
}

impl<'c> Resolver<'c> {
    pub fn new(changeset: &'c Changeset) -> Self {
        Self {
            changeset,
            created: Vec::new(),
        }
    }

    /// Look up an interned name.
    pub fn resolve_string(&self, id: InternString) -> Result<&'c str> {
        self.changeset
            .strings
            .get(id.0 as usize)
            .map(String::as_str)
            .ok_or(Error::UnknownString(id.0))
    }

    /// Read a payload string out of the changeset buffer.
    pub fn resolve_range(&self, range: StringRange) -> Result<&'c str> {
        let start = range.offset as usize;
        let end = start.checked_add(range.size as usize);
        end.and_then(|end| self.changeset.buffer.get(start..end))
            .ok_or(Error::BadStringRange {
                offset: range.offset,
                size: range.size,
            })
    }

    pub fn resolve_key(&self, key: &KeyPayload) -> Result<PrimaryKey> {
        Ok(match key {
            KeyPayload::Null => PrimaryKey::Null,
            KeyPayload::Int(i) => PrimaryKey::Int(*i),
            KeyPayload::String(range) => PrimaryKey::String(self.resolve_range(*range)?.to_owned()),
        })
    }

    /// Look up an existing table by interned name.
    pub fn resolve_table<S: Storage + ?Sized>(
        &self,
        store: &S,
        name: InternString,
    ) -> Result<TableKey> {
        let name = self.resolve_string(name)?;
        store
            .find_table(name)
            .ok_or_else(|| Error::TableNotFound(name.to_string()))
    }

    /// Create a table from an `AddTable` instruction.
    ///
    /// An existing table with the same name is an error, never reused.
    pub fn create_table<S: Storage + ?Sized>(
        &self,
        store: &mut S,
        name: InternString,
        primary_key: Option<&PrimaryKeySpec>,
    ) -> Result<TableKey> {
        let name = self.resolve_string(name)?;
        if store.find_table(name).is_some() {
            return Err(Error::TableExists(name.to_string()));
        }
        let primary_key = primary_key
            .map(|spec| -> Result<PrimaryKeyDef> {
                let column = self.resolve_string(spec.column)?;
                Ok(PrimaryKeyDef::new(column, spec.key_type, spec.nullable))
            })
            .transpose()?;
        store.add_table(name, primary_key)
    }

    /// Look up an existing column by interned name.
    pub fn resolve_column<S: Storage + ?Sized>(
        &self,
        store: &S,
        table: TableKey,
        name: InternString,
    ) -> Result<ColumnInfo> {
        let name = self.resolve_string(name)?;
        store
            .find_column(table, name)?
            .ok_or_else(|| Error::ColumnNotFound {
                table: store.table_name(table).unwrap_or_default().to_string(),
                column: name.to_string(),
            })
    }

    /// Resolve an object reference within `table`.
    pub fn resolve_object<S: Storage + ?Sized>(
        &self,
        store: &S,
        table: TableKey,
        object: &ObjectRef,
    ) -> Result<ObjKey> {
        match object {
            ObjectRef::Created(index) => {
                let handle = self.created(*index)?;
                if handle.table != table {
                    return Err(Error::ObjectTableMismatch {
                        expected: store.table_name(table)?.to_string(),
                        actual: store.table_name(handle.table).unwrap_or_default().to_string(),
                    });
                }
                self.existing(store, table, handle.object, || format!("created#{}", index))
            }
            ObjectRef::PrimaryKey(key) => {
                let key = self.resolve_key(key)?;
                let table_name = store.table_name(table)?;
                match store.primary_key(table)? {
                    Some(def) => def.check(table_name, Some(&key))?,
                    None => {
                        return Err(Error::PrimaryKeyMismatch {
                            table: table_name.to_string(),
                            reason: "table has no primary key".into(),
                        })
                    }
                }
                store
                    .find_object(table, &key)?
                    .ok_or_else(|| Error::ObjectNotFound {
                        table: table_name.to_string(),
                        object: key.to_string(),
                    })
            }
            ObjectRef::Key(key) => self.existing(store, table, *key, || key.to_string()),
        }
    }

    /// Resolve the target of a link stored in `field`.
    ///
    /// A back-reference to an object of another table is a relation
    /// violation rather than a malformed reference.
    pub fn resolve_link<S: Storage + ?Sized>(
        &self,
        store: &S,
        field: &str,
        target: TableKey,
        object: &ObjectRef,
    ) -> Result<ObjKey> {
        if let ObjectRef::Created(index) = object {
            let handle = self.created(*index)?;
            if handle.table != target {
                return Err(Error::LinkTargetMismatch {
                    field: field.to_string(),
                    expected: store.table_name(target)?.to_string(),
                    actual: store.table_name(handle.table).unwrap_or_default().to_string(),
                });
            }
        }
        self.resolve_object(store, target, object)
    }

    /// Record an object created by the current changeset.
    pub fn register_object(&mut self, handle: ObjectHandle) -> u32 {
        self.created.push(handle);
        (self.created.len() - 1) as u32
    }

    /// Number of objects created so far.
    pub fn created_count(&self) -> usize {
        self.created.len()
    }

    fn created(&self, index: u32) -> Result<ObjectHandle> {
        self.created
            .get(index as usize)
            .copied()
            .ok_or(Error::UnknownObjectRef {
                index,
                created: self.created.len(),
            })
    }

    fn existing<S: Storage + ?Sized>(
        &self,
        store: &S,
        table: TableKey,
        object: ObjKey,
        describe: impl FnOnce() -> String,
    ) -> Result<ObjKey> {
        if store.contains_object(table, object)? {
            Ok(object)
        } else {
            Err(Error::ObjectNotFound {
                table: store.table_name(table)?.to_string(),
                object: describe(),
            })
        }
    }
}
