//! Snapshot types for persisting and restoring store state.
//!
//! Snapshots are the bridge between the in-memory Store and persistent
//! storage. Tables and objects are kept in key order so that two replicas in
//! the same state serialize to the same JSON.

use crate::{error::Result, Error, SchemaVersion, Table};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Version of the snapshot format for future compatibility.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// A point-in-time snapshot of the store state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    /// Snapshot format version
    pub format_version: u32,
    /// Schema version of the stored data
    pub schema_version: SchemaVersion,
    /// Next table key the store will assign
    pub next_table: u32,
    /// All tables in key order
    pub tables: Vec<Table>,
}

impl StoreSnapshot {
    /// Create a new empty snapshot.
    pub fn new(schema_version: SchemaVersion) -> Self {
        Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            schema_version,
            next_table: 0,
            tables: Vec::new(),
        }
    }

    /// Count objects across all tables.
    pub fn object_count(&self) -> usize {
        self.tables.iter().map(|t| t.len()).sum()
    }

    /// Check structural consistency before importing.
    pub fn validate(&self) -> Result<()> {
        if self.format_version > SNAPSHOT_FORMAT_VERSION {
            return Err(Error::InvalidSnapshot(format!(
                "unsupported snapshot format version: {} (max supported: {})",
                self.format_version, SNAPSHOT_FORMAT_VERSION
            )));
        }

        let mut names = BTreeSet::new();
        let mut keys = BTreeSet::new();
        for table in &self.tables {
            if !names.insert(table.name()) {
                return Err(Error::InvalidSnapshot(format!(
                    "duplicate table name: {}",
                    table.name()
                )));
            }
            if !keys.insert(table.key()) || table.key().0 >= self.next_table {
                return Err(Error::InvalidSnapshot(format!(
                    "invalid key {} for table {}",
                    table.key(),
                    table.name()
                )));
            }
            table.check_consistency()?;
            for column in table.columns() {
                if let Some(target) = &column.def.link_target {
                    if !self.tables.iter().any(|t| t.name() == target) {
                        return Err(Error::InvalidSnapshot(format!(
                            "column {}.{} links to missing table {}",
                            table.name(),
                            column.def.name,
                            target
                        )));
                    }
                }
            }
        }

        Ok(())
    }

    /// Serialize to JSON with deterministic ordering.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::InvalidSnapshot(e.to_string()))
    }

    /// Serialize to pretty JSON with deterministic ordering.
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::InvalidSnapshot(e.to_string()))
    }

    /// Deserialize from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: Self =
            serde_json::from_str(json).map_err(|e| Error::InvalidSnapshot(e.to_string()))?;
        snapshot.validate()?;
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ColumnDef, FieldRef, Storage, Store, Value, ValueType};

    fn populated_store() -> Store {
        let mut store = Store::new(2);
        let people = store.add_table("people", None).unwrap();
        let dogs = store.add_table("dogs", None).unwrap();
        let name = store
            .add_column(dogs, ColumnDef::required("name", ValueType::String))
            .unwrap();
        store
            .add_column(dogs, ColumnDef::link("owner", "people"))
            .unwrap();
        store.create_object(people, None).unwrap();
        let rex = store.create_object(dogs, None).unwrap();
        store
            .set(FieldRef::new(dogs, rex, name), Value::String("Rex".into()))
            .unwrap();
        store
    }

    #[test]
    fn create_empty_snapshot() {
        let snapshot = StoreSnapshot::new(1);
        assert_eq!(snapshot.format_version, SNAPSHOT_FORMAT_VERSION);
        assert_eq!(snapshot.schema_version, 1);
        assert_eq!(snapshot.object_count(), 0);
        assert!(snapshot.validate().is_ok());
    }

    #[test]
    fn export_import_roundtrip() {
        let store = populated_store();
        let snapshot = store.export_state();
        assert_eq!(snapshot.tables.len(), 2);
        assert_eq!(snapshot.object_count(), 2);

        let json = snapshot.to_json().unwrap();
        let parsed = StoreSnapshot::from_json(&json).unwrap();

        let mut restored = Store::new(0);
        restored.import_state(parsed).unwrap();
        assert_eq!(restored, store);
        assert_eq!(restored.schema_version(), 2);
    }

    #[test]
    fn import_rebuilds_primary_key_index() {
        let mut store = Store::new(1);
        let people = store
            .add_table(
                "people",
                Some(crate::PrimaryKeyDef::new("_id", crate::KeyType::Int, false)),
            )
            .unwrap();
        let alice = store
            .create_object(people, Some(crate::PrimaryKey::Int(1)))
            .unwrap();

        let json = store.export_state().to_json().unwrap();
        let mut restored = Store::new(1);
        restored
            .import_state(StoreSnapshot::from_json(&json).unwrap())
            .unwrap();

        assert_eq!(
            restored
                .find_object(people, &crate::PrimaryKey::Int(1))
                .unwrap(),
            Some(alice)
        );
    }

    #[test]
    fn pretty_json_parses_back() {
        let snapshot = populated_store().export_state();
        let pretty = snapshot.to_json_pretty().unwrap();
        assert!(pretty.contains('\n'));
        assert_eq!(StoreSnapshot::from_json(&pretty).unwrap(), snapshot);
    }

    #[test]
    fn non_finite_floats_roundtrip() {
        let mut store = Store::new(1);
        let points = store.add_table("points", None).unwrap();
        let x = store
            .add_column(points, ColumnDef::list("x", ValueType::Float))
            .unwrap();
        let p = store.create_object(points, None).unwrap();
        let field = FieldRef::new(points, p, x);
        for (i, v) in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY, -0.5]
            .into_iter()
            .enumerate()
        {
            store.list_insert(field, i, Value::Float(v)).unwrap();
        }

        let json = store.export_state().to_json().unwrap();
        assert!(json.contains(r#""value":"NaN""#));
        assert!(!json.contains(r#""value":null"#));

        let mut restored = Store::new(1);
        restored
            .import_state(StoreSnapshot::from_json(&json).unwrap())
            .unwrap();
        let floats: Vec<f64> = (0..4)
            .map(|i| match restored.list_get(field, i).unwrap() {
                Value::Float(v) => v,
                other => panic!("expected float, got {:?}", other),
            })
            .collect();
        assert!(floats[0].is_nan());
        assert_eq!(&floats[1..], &[f64::INFINITY, f64::NEG_INFINITY, -0.5]);
    }

    #[test]
    fn deterministic_json() {
        let a = populated_store().export_state().to_json().unwrap();
        let b = populated_store().export_state().to_json().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn reject_future_format_version() {
        let mut snapshot = StoreSnapshot::new(1);
        snapshot.format_version = SNAPSHOT_FORMAT_VERSION + 1;
        let json = serde_json::to_string(&snapshot).unwrap();

        let result = StoreSnapshot::from_json(&json);
        assert!(matches!(result, Err(Error::InvalidSnapshot(_))));
    }

    #[test]
    fn reject_dangling_link_target() {
        let mut snapshot = populated_store().export_state();
        snapshot.tables.retain(|t| t.name() != "people");

        assert!(matches!(
            snapshot.validate(),
            Err(Error::InvalidSnapshot(msg)) if msg.contains("missing table people")
        ));
    }

    /// Export `populated_store`, edit the `dogs` table as JSON and parse
    /// the result back.
    fn edited_dogs(edit: impl FnOnce(&mut serde_json::Value)) -> Result<StoreSnapshot> {
        let mut json = serde_json::to_value(populated_store().export_state()).unwrap();
        edit(&mut json["tables"][1]);
        StoreSnapshot::from_json(&json.to_string())
    }

    fn assert_rejected(result: Result<StoreSnapshot>, reason: &str) {
        match result {
            Err(Error::InvalidSnapshot(msg)) => {
                assert!(msg.contains(reason), "{:?} does not mention {:?}", msg, reason)
            }
            other => panic!("expected invalid snapshot, got {:?}", other),
        }
    }

    #[test]
    fn accept_unedited_tables() {
        assert!(edited_dogs(|_| {}).is_ok());
    }

    #[test]
    fn reject_object_counter_behind_objects() {
        assert_rejected(
            edited_dogs(|dogs| dogs["nextObject"] = 0.into()),
            "invalid object key obj#0",
        );
    }

    #[test]
    fn reject_column_counter_behind_columns() {
        assert_rejected(
            edited_dogs(|dogs| dogs["nextColumn"] = 1.into()),
            "invalid column key col#1",
        );
    }

    #[test]
    fn reject_duplicate_column_name() {
        assert_rejected(
            edited_dogs(|dogs| dogs["columns"][1]["def"]["name"] = "name".into()),
            "duplicate column name",
        );
    }

    #[test]
    fn reject_object_under_wrong_key() {
        assert_rejected(
            edited_dogs(|dogs| dogs["objects"]["0"]["key"] = 5.into()),
            "invalid object key obj#5",
        );
    }

    #[test]
    fn reject_missing_or_misshapen_cell() {
        assert_rejected(
            edited_dogs(|dogs| {
                dogs["objects"]["0"]["fields"]
                    .as_object_mut()
                    .unwrap()
                    .remove("1");
            }),
            "obj#0 has 1 fields",
        );
        assert_rejected(
            edited_dogs(|dogs| {
                dogs["objects"]["0"]["fields"]["0"] =
                    serde_json::json!({"kind": "list", "value": []})
            }),
            "no valid cell for name",
        );
        assert_rejected(
            edited_dogs(|dogs| {
                dogs["objects"]["0"]["fields"]["0"] =
                    serde_json::json!({"kind": "scalar", "value": {"type": "int", "value": 3}})
            }),
            "type mismatch",
        );
    }

    #[test]
    fn reject_bad_table_key() {
        let mut snapshot = populated_store().export_state();
        snapshot.next_table = 1;

        assert!(snapshot.validate().is_err());
    }
}
