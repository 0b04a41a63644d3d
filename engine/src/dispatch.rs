//! Instruction dispatch.
//!
//! The [`Dispatcher`] interprets one instruction at a time against the
//! current [`Selection`]. Every handler resolves and validates its operands
//! before it calls a mutating [`Storage`] method, and returns the next
//! selection together with the [`Effect`] it had.

use crate::{
    error::Result,
    resolve::{ObjectHandle, Resolver},
    selection::Container,
    storage::ColumnInfo,
    Changeset, ColumnDef, Effect, Error, FieldRef, Instruction, InternString, KeyPayload, ObjKey,
    ObjectRef, Payload, PrimaryKeySpec, Selection, Storage, TableKey, Value, ValueType,
};

/// Outcome of one dispatched instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    /// Selection for the next instruction
    pub selection: Selection,
    pub effect: Effect,
}

impl Step {
    fn new(selection: Selection, effect: Effect) -> Self {
        Self { selection, effect }
    }
}

/// Applies single instructions to a store.
///
/// A dispatcher lives for one changeset: its resolver holds the objects
/// created so far.
pub struct Dispatcher<'a, S: Storage + ?Sized> {
    store: &'a mut S,
    resolver: Resolver<'a>,
}

impl<'a, S: Storage + ?Sized> Dispatcher<'a, S> {
    pub fn new(store: &'a mut S, changeset: &'a Changeset) -> Self {
        Self {
            store,
            resolver: Resolver::new(changeset),
        }
    }

    pub fn resolver(&self) -> &Resolver<'a> {
        &self.resolver
    }

    /// Apply one instruction under `selection`.
    pub fn dispatch(&mut self, selection: Selection, instruction: &Instruction) -> Result<Step> {
        match instruction {
            Instruction::AddTable { table, primary_key } => {
                self.add_table(selection, *table, primary_key.as_ref())
            }
            Instruction::EraseTable { table } => self.erase_table(selection, *table),
            Instruction::AddColumn {
                table,
                column,
                value_type,
                nullable,
                list,
                link_target,
            } => {
                let def = self.column_def(*column, *value_type, *nullable, *list, *link_target)?;
                self.add_column(selection, *table, def)
            }
            Instruction::EraseColumn { table, column } => {
                self.erase_column(selection, *table, *column)
            }
            Instruction::SelectTable { table } => self.select_table(selection, *table),
            Instruction::SelectField { object, field } => {
                self.select_field(selection, object, *field)
            }
            Instruction::SelectLinkList { object, field } => {
                self.select_link_list(selection, object, *field)
            }
            Instruction::CreateObject { primary_key } => {
                self.create_object(selection, primary_key.as_ref())
            }
            Instruction::EraseObject { object } => self.erase_object(selection, object),
            Instruction::Set {
                object,
                field,
                value,
            } => self.set(selection, object, *field, value),
            Instruction::AddInteger {
                object,
                field,
                value,
            } => self.add_integer(selection, object, *field, *value),
            Instruction::ListInsert { index, value } => {
                self.list_insert(selection, *index as usize, value)
            }
            Instruction::ListSet { index, value } => {
                self.list_set(selection, *index as usize, value)
            }
            Instruction::ListErase { index } => self.list_erase(selection, *index as usize),
            Instruction::ListMove { from, to } => {
                self.list_move(selection, *from as usize, *to as usize)
            }
            Instruction::ListSwap { a, b } => self.list_swap(selection, *a as usize, *b as usize),
            Instruction::ListClear => self.list_clear(selection),
        }
    }

    // Schema

    fn add_table(
        &mut self,
        selection: Selection,
        table: InternString,
        primary_key: Option<&PrimaryKeySpec>,
    ) -> Result<Step> {
        let key = self
            .resolver
            .create_table(&mut *self.store, table, primary_key)?;
        let effect = Effect::TableAdded {
            table: self.table_name(key)?,
        };
        Ok(Step::new(selection, effect))
    }

    fn erase_table(&mut self, selection: Selection, table: InternString) -> Result<Step> {
        let key = self.resolver.resolve_table(&*self.store, table)?;
        let name = self.table_name(key)?;
        self.store.erase_table(key)?;

        Ok(Step::new(
            selection.after_table_erased(key),
            Effect::TableErased { table: name },
        ))
    }

    fn column_def(
        &self,
        column: InternString,
        value_type: ValueType,
        nullable: bool,
        list: bool,
        link_target: Option<InternString>,
    ) -> Result<ColumnDef> {
        let name = self.resolver.resolve_string(column)?;
        let link_target = link_target
            .map(|t| self.resolver.resolve_string(t).map(str::to_owned))
            .transpose()?;
        let def = ColumnDef {
            name: name.to_owned(),
            value_type,
            nullable,
            list,
            link_target,
        };
        def.validate()?;
        Ok(def)
    }

    fn add_column(
        &mut self,
        selection: Selection,
        table: InternString,
        def: ColumnDef,
    ) -> Result<Step> {
        let key = self.resolver.resolve_table(&*self.store, table)?;
        let column_type = def.to_string();
        let column = def.name.clone();
        self.store.add_column(key, def)?;

        let effect = Effect::ColumnAdded {
            table: self.table_name(key)?,
            column,
            column_type,
        };
        Ok(Step::new(selection, effect))
    }

    fn erase_column(
        &mut self,
        selection: Selection,
        table: InternString,
        column: InternString,
    ) -> Result<Step> {
        let key = self.resolver.resolve_table(&*self.store, table)?;
        let info = self.resolver.resolve_column(&*self.store, key, column)?;
        self.store.erase_column(key, info.key)?;

        let effect = Effect::ColumnErased {
            table: self.table_name(key)?,
            column: info.def.name,
        };
        Ok(Step::new(selection.after_column_erased(key, info.key), effect))
    }

    // Selection

    fn select_table(&mut self, selection: Selection, table: InternString) -> Result<Step> {
        let next = selection.select_table(&self.resolver, &*self.store, table)?;
        let effect = Effect::TableSelected {
            table: self.table_name(next.table()?)?,
        };
        Ok(Step::new(next, effect))
    }

    fn select_field(
        &mut self,
        selection: Selection,
        object: &ObjectRef,
        field: InternString,
    ) -> Result<Step> {
        let next = selection.select_field(&self.resolver, &*self.store, object, field)?;
        let c = next.container()?;
        let effect = Effect::FieldSelected {
            table: self.table_name(c.table)?,
            object: c.object,
            field: self.store.column(c.table, c.field)?.def.name,
        };
        Ok(Step::new(next, effect))
    }

    fn select_link_list(
        &mut self,
        selection: Selection,
        object: &ObjectRef,
        field: InternString,
    ) -> Result<Step> {
        let next = selection.select_link_list(&self.resolver, &*self.store, object, field)?;
        let c = next.container()?;
        let target = c.target.ok_or(Error::NoContainerSelected)?;
        let effect = Effect::LinkListSelected {
            table: self.table_name(c.table)?,
            object: c.object,
            field: self.store.column(c.table, c.field)?.def.name,
            target: self.table_name(target)?,
        };
        Ok(Step::new(next, effect))
    }

    // Objects

    fn create_object(
        &mut self,
        selection: Selection,
        primary_key: Option<&KeyPayload>,
    ) -> Result<Step> {
        let table = selection.table()?;
        let primary_key = primary_key
            .map(|k| self.resolver.resolve_key(k))
            .transpose()?;
        let object = self.store.create_object(table, primary_key)?;
        let index = self
            .resolver
            .register_object(ObjectHandle { table, object });

        let effect = Effect::ObjectCreated {
            table: self.table_name(table)?,
            object,
            index,
        };
        Ok(Step::new(selection, effect))
    }

    fn erase_object(&mut self, selection: Selection, object: &ObjectRef) -> Result<Step> {
        let table = selection.table()?;
        let object = self.resolver.resolve_object(&*self.store, table, object)?;
        self.store.erase_object(table, object)?;

        let effect = Effect::ObjectErased {
            table: self.table_name(table)?,
            object,
        };
        Ok(Step::new(selection.after_object_erased(table, object), effect))
    }

    // Scalars

    fn set(
        &mut self,
        selection: Selection,
        object: &ObjectRef,
        field: InternString,
        payload: &Payload,
    ) -> Result<Step> {
        let (table, object, column) = self.scalar_field(selection, object, field)?;
        let target = self.link_target(&column.def)?;
        let value = self.value(&column.def, target, payload)?;
        self.store
            .set(FieldRef::new(table, object, column.key), value.clone())?;

        let effect = Effect::FieldSet {
            table: self.table_name(table)?,
            object,
            field: column.def.name,
            value,
        };
        Ok(Step::new(selection, effect))
    }

    fn add_integer(
        &mut self,
        selection: Selection,
        object: &ObjectRef,
        field: InternString,
        delta: i64,
    ) -> Result<Step> {
        let (table, object, column) = self.scalar_field(selection, object, field)?;
        if column.def.value_type != ValueType::Int {
            let got = column.def.to_string();
            return Err(Error::TypeMismatch {
                field: column.def.name,
                expected: ValueType::Int.to_string(),
                got,
            });
        }
        let result = self
            .store
            .add_int(FieldRef::new(table, object, column.key), delta)?;

        let effect = Effect::IntegerAdded {
            table: self.table_name(table)?,
            object,
            field: column.def.name,
            delta,
            result,
        };
        Ok(Step::new(selection, effect))
    }

    // Containers

    fn list_insert(&mut self, selection: Selection, index: usize, payload: &Payload) -> Result<Step> {
        let (c, column) = self.container(selection)?;
        let value = self.value(&column.def, c.target, payload)?;
        self.store.list_insert(field_ref(&c), index, value.clone())?;

        let effect = Effect::ListInserted {
            field: self.container_label(&c, &column)?,
            index,
            value,
        };
        Ok(Step::new(selection, effect))
    }

    fn list_set(&mut self, selection: Selection, index: usize, payload: &Payload) -> Result<Step> {
        let (c, column) = self.container(selection)?;
        let value = self.value(&column.def, c.target, payload)?;
        self.store.list_set(field_ref(&c), index, value.clone())?;

        let effect = Effect::ListSet {
            field: self.container_label(&c, &column)?,
            index,
            value,
        };
        Ok(Step::new(selection, effect))
    }

    fn list_erase(&mut self, selection: Selection, index: usize) -> Result<Step> {
        let (c, column) = self.container(selection)?;
        self.store.list_erase(field_ref(&c), index)?;

        let effect = Effect::ListErased {
            field: self.container_label(&c, &column)?,
            index,
        };
        Ok(Step::new(selection, effect))
    }

    fn list_move(&mut self, selection: Selection, from: usize, to: usize) -> Result<Step> {
        let (c, column) = self.container(selection)?;
        self.store.list_move(field_ref(&c), from, to)?;

        let effect = Effect::ListMoved {
            field: self.container_label(&c, &column)?,
            from,
            to,
        };
        Ok(Step::new(selection, effect))
    }

    fn list_swap(&mut self, selection: Selection, a: usize, b: usize) -> Result<Step> {
        let (c, column) = self.container(selection)?;
        self.store.list_swap(field_ref(&c), a, b)?;

        let effect = Effect::ListSwapped {
            field: self.container_label(&c, &column)?,
            a,
            b,
        };
        Ok(Step::new(selection, effect))
    }

    fn list_clear(&mut self, selection: Selection) -> Result<Step> {
        let (c, column) = self.container(selection)?;
        let field = field_ref(&c);
        let len = self.store.list_len(field)?;
        self.store.list_clear(field)?;

        let effect = Effect::ListCleared {
            field: self.container_label(&c, &column)?,
            len,
        };
        Ok(Step::new(selection, effect))
    }

    // Helpers

    fn table_name(&self, table: TableKey) -> Result<String> {
        self.store.table_name(table).map(str::to_owned)
    }

    /// Resolve the object and column a scalar instruction addresses.
    fn scalar_field(
        &self,
        selection: Selection,
        object: &ObjectRef,
        field: InternString,
    ) -> Result<(TableKey, ObjKey, ColumnInfo)> {
        let table = selection.table()?;
        let column = self.resolver.resolve_column(&*self.store, table, field)?;
        if column.def.list {
            return Err(Error::NotAScalar(column.def.name));
        }
        let object = self.resolver.resolve_object(&*self.store, table, object)?;
        Ok((table, object, column))
    }

    fn container(&self, selection: Selection) -> Result<(Container, ColumnInfo)> {
        let c = selection.container()?;
        let column = self.store.column(c.table, c.field)?;
        Ok((c, column))
    }

    fn container_label(&self, c: &Container, column: &ColumnInfo) -> Result<String> {
        Ok(format!(
            "{}[{}].{}",
            self.store.table_name(c.table)?,
            c.object,
            column.def.name
        ))
    }

    fn link_target(&self, def: &ColumnDef) -> Result<Option<TableKey>> {
        def.link_target
            .as_ref()
            .map(|target| {
                self.store
                    .find_table(target)
                    .ok_or_else(|| Error::TableNotFound(target.clone()))
            })
            .transpose()
    }

    /// Convert a payload into a stored value for a column of `def`.
    ///
    /// Type and nullability are checked by the store against `def`. Links
    /// are resolved here, in `target`.
    fn value(&self, def: &ColumnDef, target: Option<TableKey>, payload: &Payload) -> Result<Value> {
        Ok(match payload {
            Payload::Null => Value::Null,
            Payload::Int(i) => Value::Int(*i),
            Payload::Bool(b) => Value::Bool(*b),
            Payload::Float(x) => Value::Float(*x),
            Payload::String(range) => {
                Value::String(self.resolver.resolve_range(*range)?.to_owned())
            }
            Payload::Binary(bytes) => Value::Binary(bytes.clone()),
            Payload::Timestamp(ts) => Value::Timestamp(*ts),
            Payload::Link(object) => {
                let target = target.ok_or_else(|| Error::TypeMismatch {
                    field: def.name.clone(),
                    expected: def.to_string(),
                    got: ValueType::Link.to_string(),
                })?;
                let object = self
                    .resolver
                    .resolve_link(&*self.store, &def.name, target, object)?;
                Value::Link(object)
            }
        })
    }
}

fn field_ref(c: &Container) -> FieldRef {
    FieldRef::new(c.table, c.object, c.field)
}
