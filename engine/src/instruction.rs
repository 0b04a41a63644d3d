//! Instruction types.
//!
//! [`Instruction`] is a closed set. Every consumer matches on it
//! exhaustively, so a new kind cannot be added without handling it
//! everywhere.

use crate::{InternString, KeyType, ObjKey, StringRange, Timestamp, ValueType};
use serde::{Deserialize, Serialize};

/// Primary key declaration carried by `AddTable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrimaryKeySpec {
    pub column: InternString,
    pub key_type: KeyType,
    #[serde(default)]
    pub nullable: bool,
}

/// Primary key as it appears in an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum KeyPayload {
    Null,
    Int(i64),
    String(StringRange),
}

/// How an instruction names an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ObjectRef {
    /// The n-th object created earlier in this changeset
    Created(u32),
    /// Lookup by primary key in the addressed table
    PrimaryKey(KeyPayload),
    /// Store-assigned object key
    Key(ObjKey),
}

/// Value carried by `Set` and list instructions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Payload {
    Null,
    Int(i64),
    Bool(bool),
    Float(#[serde(with = "crate::value::float_repr")] f64),
    String(StringRange),
    Binary(Vec<u8>),
    Timestamp(Timestamp),
    Link(ObjectRef),
}

/// One operation within a changeset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Instruction {
    // Schema
    AddTable {
        table: InternString,
        #[serde(default)]
        primary_key: Option<PrimaryKeySpec>,
    },
    EraseTable {
        table: InternString,
    },
    AddColumn {
        table: InternString,
        column: InternString,
        value_type: ValueType,
        #[serde(default)]
        nullable: bool,
        #[serde(default)]
        list: bool,
        #[serde(default)]
        link_target: Option<InternString>,
    },
    EraseColumn {
        table: InternString,
        column: InternString,
    },

    // Selection
    SelectTable {
        table: InternString,
    },
    SelectField {
        object: ObjectRef,
        field: InternString,
    },
    SelectLinkList {
        object: ObjectRef,
        field: InternString,
    },

    // Objects, in the selected table
    CreateObject {
        #[serde(default)]
        primary_key: Option<KeyPayload>,
    },
    EraseObject {
        object: ObjectRef,
    },

    // Scalars, in the selected table
    Set {
        object: ObjectRef,
        field: InternString,
        value: Payload,
    },
    AddInteger {
        object: ObjectRef,
        field: InternString,
        value: i64,
    },

    // Containers, on the selected list or link list
    ListInsert {
        index: u32,
        value: Payload,
    },
    ListSet {
        index: u32,
        value: Payload,
    },
    ListErase {
        index: u32,
    },
    ListMove {
        from: u32,
        to: u32,
    },
    ListSwap {
        a: u32,
        b: u32,
    },
    ListClear,
}

/// The kind of an instruction, without its operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstructionKind {
    AddTable,
    EraseTable,
    AddColumn,
    EraseColumn,
    SelectTable,
    SelectField,
    SelectLinkList,
    CreateObject,
    EraseObject,
    Set,
    AddInteger,
    ListInsert,
    ListSet,
    ListErase,
    ListMove,
    ListSwap,
    ListClear,
}

impl std::fmt::Display for InstructionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

impl Instruction {
    /// Get the kind of this instruction.
    pub fn kind(&self) -> InstructionKind {
        match self {
            Instruction::AddTable { .. } => InstructionKind::AddTable,
            Instruction::EraseTable { .. } => InstructionKind::EraseTable,
            Instruction::AddColumn { .. } => InstructionKind::AddColumn,
            Instruction::EraseColumn { .. } => InstructionKind::EraseColumn,
            Instruction::SelectTable { .. } => InstructionKind::SelectTable,
            Instruction::SelectField { .. } => InstructionKind::SelectField,
            Instruction::SelectLinkList { .. } => InstructionKind::SelectLinkList,
            Instruction::CreateObject { .. } => InstructionKind::CreateObject,
            Instruction::EraseObject { .. } => InstructionKind::EraseObject,
            Instruction::Set { .. } => InstructionKind::Set,
            Instruction::AddInteger { .. } => InstructionKind::AddInteger,
            Instruction::ListInsert { .. } => InstructionKind::ListInsert,
            Instruction::ListSet { .. } => InstructionKind::ListSet,
            Instruction::ListErase { .. } => InstructionKind::ListErase,
            Instruction::ListMove { .. } => InstructionKind::ListMove,
            Instruction::ListSwap { .. } => InstructionKind::ListSwap,
            Instruction::ListClear => InstructionKind::ListClear,
        }
    }

    /// Whether this instruction only changes the selection.
    pub fn is_selection(&self) -> bool {
        matches!(
            self,
            Instruction::SelectTable { .. }
                | Instruction::SelectField { .. }
                | Instruction::SelectLinkList { .. }
        )
    }
}
