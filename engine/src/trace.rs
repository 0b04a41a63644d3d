//! Trace records for applied instructions.
//!
//! Each successful instruction produces one [`Effect`]. When the caller of
//! `apply` supplies a [`TraceSink`], the driver hands it a [`TraceEvent`] per
//! instruction. Without a sink nothing is recorded.

use crate::{InstructionKind, ObjKey, TableName, Value};
use std::fmt;

/// What one instruction did to the store or the selection.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    TableAdded {
        table: TableName,
    },
    TableErased {
        table: TableName,
    },
    ColumnAdded {
        table: TableName,
        column: String,
        /// Rendered column type, e.g. `List<Link<people>>`
        column_type: String,
    },
    ColumnErased {
        table: TableName,
        column: String,
    },
    TableSelected {
        table: TableName,
    },
    FieldSelected {
        table: TableName,
        object: ObjKey,
        field: String,
    },
    LinkListSelected {
        table: TableName,
        object: ObjKey,
        field: String,
        target: TableName,
    },
    ObjectCreated {
        table: TableName,
        object: ObjKey,
        /// Back-reference index assigned within the changeset
        index: u32,
    },
    ObjectErased {
        table: TableName,
        object: ObjKey,
    },
    FieldSet {
        table: TableName,
        object: ObjKey,
        field: String,
        value: Value,
    },
    IntegerAdded {
        table: TableName,
        object: ObjKey,
        field: String,
        delta: i64,
        result: i64,
    },
    ListInserted {
        field: String,
        index: usize,
        value: Value,
    },
    ListSet {
        field: String,
        index: usize,
        value: Value,
    },
    ListErased {
        field: String,
        index: usize,
    },
    ListMoved {
        field: String,
        from: usize,
        to: usize,
    },
    ListSwapped {
        field: String,
        a: usize,
        b: usize,
    },
    ListCleared {
        field: String,
        len: usize,
    },
}

impl Effect {
    /// Whether the store was changed.
    pub fn is_mutation(&self) -> bool {
        !matches!(
            self,
            Effect::TableSelected { .. }
                | Effect::FieldSelected { .. }
                | Effect::LinkListSelected { .. }
        )
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Effect::TableAdded { table } => write!(f, "add table {}", table),
            Effect::TableErased { table } => write!(f, "erase table {}", table),
            Effect::ColumnAdded {
                table,
                column,
                column_type,
            } => write!(f, "add column {}.{}: {}", table, column, column_type),
            Effect::ColumnErased { table, column } => {
                write!(f, "erase column {}.{}", table, column)
            }
            Effect::TableSelected { table } => write!(f, "select table {}", table),
            Effect::FieldSelected {
                table,
                object,
                field,
            } => write!(f, "select list {}[{}].{}", table, object, field),
            Effect::LinkListSelected {
                table,
                object,
                field,
                target,
            } => write!(
                f,
                "select link list {}[{}].{} -> {}",
                table, object, field, target
            ),
            Effect::ObjectCreated {
                table,
                object,
                index,
            } => write!(f, "create object {}[{}] as #{}", table, object, index),
            Effect::ObjectErased { table, object } => {
                write!(f, "erase object {}[{}]", table, object)
            }
            Effect::FieldSet {
                table,
                object,
                field,
                value,
            } => write!(f, "set {}[{}].{} = {}", table, object, field, value),
            Effect::IntegerAdded {
                table,
                object,
                field,
                delta,
                result,
            } => write!(
                f,
                "add {} to {}[{}].{} = {}",
                delta, table, object, field, result
            ),
            Effect::ListInserted {
                field,
                index,
                value,
            } => write!(f, "insert {}[{}] = {}", field, index, value),
            Effect::ListSet {
                field,
                index,
                value,
            } => write!(f, "set {}[{}] = {}", field, index, value),
            Effect::ListErased { field, index } => write!(f, "erase {}[{}]", field, index),
            Effect::ListMoved { field, from, to } => {
                write!(f, "move {}[{}] to {}", field, from, to)
            }
            Effect::ListSwapped { field, a, b } => write!(f, "swap {}[{}] and [{}]", field, a, b),
            Effect::ListCleared { field, len } => {
                write!(f, "clear {} ({} elements)", field, len)
            }
        }
    }
}

/// One successfully applied instruction.
#[derive(Debug, Clone, Copy)]
pub struct TraceEvent<'a> {
    /// Position of the instruction in the changeset
    pub index: usize,
    pub instruction: InstructionKind,
    pub effect: &'a Effect,
}

impl fmt::Display for TraceEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}: {}", self.index, self.instruction, self.effect)
    }
}

/// Receives one event per applied instruction.
pub trait TraceSink {
    fn trace(&mut self, event: &TraceEvent<'_>);
}

/// Collects rendered events.
impl TraceSink for Vec<String> {
    fn trace(&mut self, event: &TraceEvent<'_>) {
        self.push(event.to_string());
    }
}

/// Forwards events to `tracing` at trace level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl TraceSink for TracingSink {
    fn trace(&mut self, event: &TraceEvent<'_>) {
        tracing::trace!(
            index = event.index,
            instruction = %event.instruction,
            mutation = event.effect.is_mutation(),
            "{}",
            event.effect
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effect_messages() {
        let effect = Effect::FieldSet {
            table: "dogs".into(),
            object: ObjKey(0),
            field: "name".into(),
            value: Value::String("Rex".into()),
        };
        assert_eq!(effect.to_string(), r#"set dogs[obj#0].name = "Rex""#);

        let effect = Effect::ListMoved {
            field: "tags".into(),
            from: 0,
            to: 2,
        };
        assert_eq!(effect.to_string(), "move tags[0] to 2");
    }

    #[test]
    fn selection_is_not_a_mutation() {
        let select = Effect::TableSelected {
            table: "dogs".into(),
        };
        assert!(!select.is_mutation());
        assert!(Effect::TableErased {
            table: "dogs".into()
        }
        .is_mutation());
    }

    #[test]
    fn vec_sink_collects_events() {
        let effect = Effect::TableAdded {
            table: "dogs".into(),
        };
        let mut sink: Vec<String> = Vec::new();
        sink.trace(&TraceEvent {
            index: 3,
            instruction: InstructionKind::AddTable,
            effect: &effect,
        });
        assert_eq!(sink, vec!["#3 AddTable: add table dogs".to_string()]);
    }
}
