//! The changeset: one decoded unit of synchronized change.

use crate::{Instruction, SchemaVersion};
use serde::{Deserialize, Serialize};

/// Index into a changeset's intern table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InternString(pub u32);

/// Byte range into a changeset's payload string buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StringRange {
    pub offset: u32,
    pub size: u32,
}

/// An ordered log of instructions with the strings they reference.
///
/// Table and column names are interned in `strings`; string payloads live in
/// `buffer` and are addressed by [`StringRange`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Changeset {
    /// Schema version the producer was at
    pub schema_version: SchemaVersion,
    /// Intern table, indexed by [`InternString`]
    #[serde(default)]
    pub strings: Vec<String>,
    /// Payload string buffer
    #[serde(default)]
    pub buffer: String,
    pub instructions: Vec<Instruction>,
}

impl Changeset {
    /// Create an empty changeset.
    pub fn new(schema_version: SchemaVersion) -> Self {
        Self {
            schema_version,
            ..Self::default()
        }
    }

    /// Intern a name, reusing an existing entry.
    pub fn intern(&mut self, s: &str) -> InternString {
        if let Some(pos) = self.strings.iter().position(|existing| existing == s) {
            return InternString(pos as u32);
        }
        self.strings.push(s.to_string());
        InternString((self.strings.len() - 1) as u32)
    }

    /// Append a payload string to the buffer.
    pub fn add_string(&mut self, s: &str) -> StringRange {
        let range = StringRange {
            offset: self.buffer.len() as u32,
            size: s.len() as u32,
        };
        self.buffer.push_str(s);
        range
    }

    /// Append an instruction.
    pub fn push(&mut self, instruction: Instruction) -> &mut Self {
        self.instructions.push(instruction);
        self
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Instruction> {
        self.instructions.iter()
    }
}
