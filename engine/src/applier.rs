//! The changeset driver.
//!
//! [`InstructionApplier`] runs a changeset through the dispatcher in log
//! order and stops at the first failing instruction. It does not open or
//! roll back transactions: on failure the store is left with the effects of
//! the instructions before the failing one, and the caller discards them.

use crate::{
    dispatch::Dispatcher, ApplierConfig, ApplyError, Changeset, Selection, Storage, TraceEvent,
    TraceSink,
};

/// Applies changesets to a store.
pub struct InstructionApplier<'s, S: Storage + ?Sized> {
    store: &'s mut S,
    config: ApplierConfig,
}

impl<'s, S: Storage + ?Sized> InstructionApplier<'s, S> {
    /// Create an applier with the default configuration.
    pub fn new(store: &'s mut S) -> Self {
        Self::with_config(store, ApplierConfig::default())
    }

    pub fn with_config(store: &'s mut S, config: ApplierConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &ApplierConfig {
        &self.config
    }

    /// Apply every instruction of `changeset` in order.
    ///
    /// When `sink` is given it receives one event per applied instruction.
    pub fn apply(
        &mut self,
        changeset: &Changeset,
        mut sink: Option<&mut dyn TraceSink>,
    ) -> Result<(), ApplyError> {
        self.check(changeset)?;

        let span = tracing::debug_span!(
            "apply",
            schema_version = changeset.schema_version,
            instructions = changeset.len()
        );
        let _guard = span.enter();
        tracing::debug!("applying changeset");

        let mut dispatcher = Dispatcher::new(&mut *self.store, changeset);
        let mut selection = Selection::default();

        for (index, instruction) in changeset.iter().enumerate() {
            let kind = instruction.kind();
            let step = dispatcher.dispatch(selection, instruction).map_err(|source| {
                tracing::warn!(
                    index,
                    instruction = %kind,
                    kind = %source.kind(),
                    error = %source,
                    "instruction failed"
                );
                ApplyError::Instruction {
                    index,
                    instruction: kind,
                    source,
                }
            })?;

            if let Some(sink) = sink.as_deref_mut() {
                sink.trace(&TraceEvent {
                    index,
                    instruction: kind,
                    effect: &step.effect,
                });
            }
            selection = step.selection;
        }

        tracing::debug!(
            created = dispatcher.resolver().created_count(),
            "changeset applied"
        );
        Ok(())
    }

    /// Reject the changeset as a whole before anything is applied.
    fn check(&self, changeset: &Changeset) -> Result<(), ApplyError> {
        if let Some(limit) = self.config.max_instructions {
            if changeset.len() > limit {
                tracing::warn!(limit, actual = changeset.len(), "changeset too large");
                return Err(ApplyError::TooManyInstructions {
                    limit,
                    actual: changeset.len(),
                });
            }
        }

        if self.config.check_schema_version {
            let expected = self.store.schema_version();
            if changeset.schema_version != expected {
                tracing::warn!(
                    expected,
                    actual = changeset.schema_version,
                    "schema version mismatch"
                );
                return Err(ApplyError::SchemaVersionMismatch {
                    expected,
                    actual: changeset.schema_version,
                });
            }
        }

        Ok(())
    }
}

/// Apply `changeset` to `store` with the default configuration.
pub fn apply<S: Storage + ?Sized>(
    store: &mut S,
    changeset: &Changeset,
    sink: Option<&mut dyn TraceSink>,
) -> Result<(), ApplyError> {
    InstructionApplier::new(store).apply(changeset, sink)
}
