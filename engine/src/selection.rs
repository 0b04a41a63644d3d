//! The selection state machine.
//!
//! Instructions do not repeat the full table/object/field path. Selection
//! instructions set the context and later instructions read it. A
//! [`Selection`] is a plain `Copy` value: each step takes the current one and
//! returns the next, so sequences can be tested without a driver.
//!
//! ```text
//!   None ──select_table──▶ Table ──select_field─────▶ Field
//!                            │  └──select_link_list─▶ LinkList
//!   erase selected table ─▶ Stale
//!   erase selected column/object ─▶ StaleContainer (table still valid)
//! ```

use crate::{
    error::Result, resolve::Resolver, storage::ColumnInfo, ColKey, Error, InternString, ObjKey,
    ObjectRef, Storage, TableKey,
};

/// Current addressing context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Selection {
    #[default]
    None,
    Table {
        table: TableKey,
    },
    Field {
        table: TableKey,
        object: ObjKey,
        field: ColKey,
    },
    LinkList {
        table: TableKey,
        object: ObjKey,
        field: ColKey,
        target: TableKey,
    },
    /// The selected list's column or object was erased
    StaleContainer {
        table: TableKey,
    },
    /// The selected table was erased
    Stale,
}

/// The list or link list container instructions operate on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Container {
    pub table: TableKey,
    pub object: ObjKey,
    pub field: ColKey,
    /// Target table when the container is a link list
    pub target: Option<TableKey>,
}

impl Selection {
    /// The selected table.
    pub fn table(self) -> Result<TableKey> {
        match self {
            Selection::Table { table }
            | Selection::Field { table, .. }
            | Selection::LinkList { table, .. }
            | Selection::StaleContainer { table } => Ok(table),
            Selection::None => Err(Error::NoTableSelected),
            Selection::Stale => Err(Error::StaleSelection),
        }
    }

    /// The selected list or link list.
    pub fn container(self) -> Result<Container> {
        match self {
            Selection::Field {
                table,
                object,
                field,
            } => Ok(Container {
                table,
                object,
                field,
                target: None,
            }),
            Selection::LinkList {
                table,
                object,
                field,
                target,
            } => Ok(Container {
                table,
                object,
                field,
                target: Some(target),
            }),
            Selection::None | Selection::Table { .. } => Err(Error::NoContainerSelected),
            Selection::StaleContainer { .. } | Selection::Stale => Err(Error::StaleSelection),
        }
    }

    /// Select a table. Allowed from any state.
    pub fn select_table<S: Storage + ?Sized>(
        self,
        resolver: &Resolver<'_>,
        store: &S,
        table: InternString,
    ) -> Result<Selection> {
        let name = resolver.resolve_string(table)?;
        let table = store
            .find_table(name)
            .ok_or_else(|| Error::SelectedTableMissing(name.to_string()))?;
        Ok(Selection::Table { table })
    }

    /// Select a non-link list on an object of the selected table.
    pub fn select_field<S: Storage + ?Sized>(
        self,
        resolver: &Resolver<'_>,
        store: &S,
        object: &ObjectRef,
        field: InternString,
    ) -> Result<Selection> {
        let table = self.table()?;
        let column = Self::selectable_column(resolver, store, table, field)?;
        if !column.def.list || column.def.is_link_list() {
            return Err(Error::NotAList {
                table: store.table_name(table)?.to_string(),
                column: column.def.name,
            });
        }
        let object = resolver.resolve_object(store, table, object)?;

        Ok(Selection::Field {
            table,
            object,
            field: column.key,
        })
    }

    /// Select a link list on an object of the selected table.
    pub fn select_link_list<S: Storage + ?Sized>(
        self,
        resolver: &Resolver<'_>,
        store: &S,
        object: &ObjectRef,
        field: InternString,
    ) -> Result<Selection> {
        let table = self.table()?;
        let column = Self::selectable_column(resolver, store, table, field)?;
        let target = match (&column.def.link_target, column.def.is_link_list()) {
            (Some(target), true) => store
                .find_table(target)
                .ok_or_else(|| Error::TableNotFound(target.clone()))?,
            _ => {
                return Err(Error::NotALinkList {
                    table: store.table_name(table)?.to_string(),
                    column: column.def.name,
                })
            }
        };
        let object = resolver.resolve_object(store, table, object)?;

        Ok(Selection::LinkList {
            table,
            object,
            field: column.key,
            target,
        })
    }

    /// Selection after `table` was erased.
    pub fn after_table_erased(self, table: TableKey) -> Selection {
        match self.table() {
            Ok(selected) if selected == table => Selection::Stale,
            _ => self,
        }
    }

    /// Selection after `column` of `table` was erased.
    pub fn after_column_erased(self, table: TableKey, column: ColKey) -> Selection {
        match self.container() {
            Ok(c) if c.table == table && c.field == column => Selection::StaleContainer { table },
            _ => self,
        }
    }

    /// Selection after `object` of `table` was erased.
    pub fn after_object_erased(self, table: TableKey, object: ObjKey) -> Selection {
        match self.container() {
            Ok(c) if c.table == table && c.object == object => {
                Selection::StaleContainer { table }
            }
            _ => self,
        }
    }

    fn selectable_column<S: Storage + ?Sized>(
        resolver: &Resolver<'_>,
        store: &S,
        table: TableKey,
        field: InternString,
    ) -> Result<ColumnInfo> {
        let name = resolver.resolve_string(field)?;
        store
            .find_column(table, name)?
            .ok_or_else(|| Error::SelectedColumnMissing {
                table: store.table_name(table).unwrap_or_default().to_string(),
                column: name.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Changeset, ColumnDef, Store, ValueType};

    struct Fixture {
        changeset: Changeset,
        store: Store,
        dogs: TableKey,
        people: TableKey,
        rex: ObjKey,
    }

    fn fixture() -> Fixture {
        let mut changeset = Changeset::new(1);
        for name in ["dogs", "people", "tags", "walkers", "age", "cats"] {
            changeset.intern(name);
        }

        let mut store = Store::new(1);
        let people = store.add_table("people", None).unwrap();
        let dogs = store.add_table("dogs", None).unwrap();
        store
            .add_column(dogs, ColumnDef::list("tags", ValueType::String))
            .unwrap();
        store
            .add_column(dogs, ColumnDef::link_list("walkers", "people"))
            .unwrap();
        store
            .add_column(dogs, ColumnDef::required("age", ValueType::Int))
            .unwrap();
        let rex = store.create_object(dogs, None).unwrap();

        Fixture {
            changeset,
            store,
            dogs,
            people,
            rex,
        }
    }

    const DOGS: InternString = InternString(0);
    const TAGS: InternString = InternString(2);
    const WALKERS: InternString = InternString(3);
    const AGE: InternString = InternString(4);
    const CATS: InternString = InternString(5);

    #[test]
    fn initial_state() {
        let selection = Selection::default();
        assert_eq!(selection, Selection::None);
        assert_eq!(selection.table(), Err(Error::NoTableSelected));
        assert_eq!(selection.container(), Err(Error::NoContainerSelected));
    }

    #[test]
    fn select_table_then_field() {
        let f = fixture();
        let resolver = Resolver::new(&f.changeset);
        let rex = ObjectRef::Key(f.rex);

        let selection = Selection::None
            .select_table(&resolver, &f.store, DOGS)
            .unwrap();
        assert_eq!(selection, Selection::Table { table: f.dogs });

        let selection = selection
            .select_field(&resolver, &f.store, &rex, TAGS)
            .unwrap();
        let container = selection.container().unwrap();
        assert_eq!(container.table, f.dogs);
        assert_eq!(container.object, f.rex);
        assert_eq!(container.target, None);

        // A second field on the same table may be selected directly
        let selection = selection
            .select_link_list(&resolver, &f.store, &rex, WALKERS)
            .unwrap();
        assert_eq!(selection.container().unwrap().target, Some(f.people));
    }

    #[test]
    fn select_missing_table() {
        let f = fixture();
        let resolver = Resolver::new(&f.changeset);

        let result = Selection::None.select_table(&resolver, &f.store, CATS);
        assert!(matches!(result, Err(Error::SelectedTableMissing(t)) if t == "cats"));
    }

    #[test]
    fn select_field_requires_table() {
        let f = fixture();
        let resolver = Resolver::new(&f.changeset);

        let result = Selection::None.select_field(&resolver, &f.store, &ObjectRef::Key(f.rex), TAGS);
        assert_eq!(result, Err(Error::NoTableSelected));
    }

    #[test]
    fn select_field_wrong_kind() {
        let f = fixture();
        let resolver = Resolver::new(&f.changeset);
        let rex = ObjectRef::Key(f.rex);
        let selection = Selection::Table { table: f.dogs };

        assert!(matches!(
            selection.select_field(&resolver, &f.store, &rex, AGE),
            Err(Error::NotAList { column, .. }) if column == "age"
        ));
        assert!(matches!(
            selection.select_field(&resolver, &f.store, &rex, WALKERS),
            Err(Error::NotAList { .. })
        ));
        assert!(matches!(
            selection.select_link_list(&resolver, &f.store, &rex, TAGS),
            Err(Error::NotALinkList { .. })
        ));
        assert!(matches!(
            selection.select_field(&resolver, &f.store, &rex, CATS),
            Err(Error::SelectedColumnMissing { column, .. }) if column == "cats"
        ));
    }

    #[test]
    fn erase_invalidates() {
        let f = fixture();
        let tags = f.store.find_column(f.dogs, "tags").unwrap().unwrap().key;
        let field = Selection::Field {
            table: f.dogs,
            object: f.rex,
            field: tags,
        };

        assert_eq!(field.after_table_erased(f.people), field);
        assert_eq!(field.after_table_erased(f.dogs), Selection::Stale);
        assert_eq!(Selection::Stale.table(), Err(Error::StaleSelection));

        let stale = field.after_column_erased(f.dogs, tags);
        assert_eq!(stale, Selection::StaleContainer { table: f.dogs });
        assert_eq!(stale.container(), Err(Error::StaleSelection));
        assert_eq!(stale.table(), Ok(f.dogs));

        assert_eq!(
            field.after_object_erased(f.dogs, f.rex),
            Selection::StaleContainer { table: f.dogs }
        );
        assert_eq!(field.after_object_erased(f.dogs, ObjKey(99)), field);
    }

    #[test]
    fn reselect_after_stale() {
        let f = fixture();
        let resolver = Resolver::new(&f.changeset);

        let selection = Selection::Stale
            .select_table(&resolver, &f.store, DOGS)
            .unwrap();
        assert_eq!(selection, Selection::Table { table: f.dogs });

        let selection = Selection::StaleContainer { table: f.dogs }
            .select_field(&resolver, &f.store, &ObjectRef::Key(f.rex), TAGS)
            .unwrap();
        assert!(selection.container().is_ok());
    }
}
