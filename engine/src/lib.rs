//! # Carry Replay
//!
//! A changeset replay engine for local-first replicas.
//!
//! A changeset is an ordered log of compact instructions produced on another
//! replica. This crate applies such a log, instruction by instruction, to a
//! local store and either succeeds or stops at the first inconsistent
//! instruction with a structured error. Every peer that applies the same
//! changesets in the same order converges on the same state.
//!
//! ## Design Principles
//!
//! - **No IO**: The engine only talks to the store through the [`Storage`] trait
//! - **Deterministic**: Same changeset + same starting state = same result
//! - **Validate first**: Every instruction is checked against the current store
//!   state before anything is mutated
//! - **No partial silent success**: The first failing instruction aborts the
//!   whole changeset; the caller rolls back its transaction
//!
//! ## Core Concepts
//!
//! ### Changesets and Instructions
//!
//! A [`Changeset`] carries an intern table of names, a payload string buffer,
//! and a sequence of [`Instruction`]s. Instructions come in five groups:
//! schema (add/erase table or column), selection (select table, field, or
//! link list), object (create/erase), scalar (set, add integer), and
//! container (insert/set/erase/move/swap/clear list elements).
//!
//! ### Selection
//!
//! The wire format does not repeat a full path on every instruction. Instead
//! selection instructions establish the current table, list, or link list, and
//! the following instructions are interpreted relative to it. See
//! [`Selection`].
//!
//! ### Back-references
//!
//! Objects created earlier in the same changeset can be referenced with
//! [`ObjectRef::Created`]. The arena behind these references lives only for the
//! duration of one `apply` call.
//!
//! ## Quick Start
//!
//! ```rust
//! use carry_replay::{
//!     Changeset, Instruction, InstructionApplier, ObjectRef, Payload, Store, ValueType,
//! };
//!
//! let mut changeset = Changeset::new(1);
//! let dogs = changeset.intern("dogs");
//! let age = changeset.intern("age");
//! changeset.push(Instruction::AddTable { table: dogs, primary_key: None });
//! changeset.push(Instruction::AddColumn {
//!     table: dogs,
//!     column: age,
//!     value_type: ValueType::Int,
//!     nullable: false,
//!     list: false,
//!     link_target: None,
//! });
//! changeset.push(Instruction::SelectTable { table: dogs });
//! changeset.push(Instruction::CreateObject { primary_key: None });
//! changeset.push(Instruction::Set {
//!     object: ObjectRef::Created(0),
//!     field: age,
//!     value: Payload::Int(5),
//! });
//!
//! let mut store = Store::new(1);
//! InstructionApplier::new(&mut store)
//!     .apply(&changeset, None)
//!     .unwrap();
//!
//! assert_eq!(store.table("dogs").unwrap().len(), 1);
//! ```
//!
//! ## FFI
//!
//! The [`ffi`] module exposes C-compatible functions that exchange changesets
//! and snapshots as JSON strings.

pub mod applier;
pub mod changeset;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod ffi;
pub mod instruction;
pub mod resolve;
pub mod schema;
pub mod selection;
pub mod snapshot;
pub mod storage;
pub mod store;
pub mod trace;
pub mod value;

// Re-export main types at crate root
pub use applier::{apply, InstructionApplier};
pub use changeset::{Changeset, InternString, StringRange};
pub use config::{ApplierConfig, ConfigError};
pub use dispatch::{Dispatcher, Step};
pub use error::{ApplyError, Error, ErrorKind};
pub use instruction::{Instruction, InstructionKind, KeyPayload, ObjectRef, Payload, PrimaryKeySpec};
pub use resolve::{ObjectHandle, Resolver};
pub use schema::{ColKey, ColumnDef, KeyType, ObjKey, PrimaryKeyDef, TableKey, ValueType};
pub use selection::{Container, Selection};
pub use snapshot::{StoreSnapshot, SNAPSHOT_FORMAT_VERSION};
pub use storage::{ColumnInfo, FieldRef, Storage};
pub use store::{Cell, Column, Object, Store, Table};
pub use trace::{Effect, TraceEvent, TraceSink, TracingSink};
pub use value::{PrimaryKey, Timestamp, Value};

/// Type aliases for clarity
pub type TableName = String;
pub type ColumnName = String;
pub type SchemaVersion = u32;
