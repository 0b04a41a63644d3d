//! Configuration for the applier.

use std::env;

/// Applier configuration.
///
/// The defaults impose no instruction limit and check the changeset's schema
/// version against the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplierConfig {
    /// Reject changesets with more instructions than this
    pub max_instructions: Option<usize>,
    /// Reject changesets whose schema version differs from the store's
    pub check_schema_version: bool,
}

impl Default for ApplierConfig {
    fn default() -> Self {
        Self {
            max_instructions: None,
            check_schema_version: true,
        }
    }
}

impl ApplierConfig {
    pub const MAX_INSTRUCTIONS_VAR: &'static str = "CARRY_REPLAY_MAX_INSTRUCTIONS";
    pub const CHECK_SCHEMA_VERSION_VAR: &'static str = "CARRY_REPLAY_CHECK_SCHEMA_VERSION";

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(raw) = lookup(Self::MAX_INSTRUCTIONS_VAR) {
            let limit = raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidMaxInstructions(raw.clone()))?;
            config.max_instructions = Some(limit);
        }

        if let Some(raw) = lookup(Self::CHECK_SCHEMA_VERSION_VAR) {
            config.check_schema_version = match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => return Err(ConfigError::InvalidCheckSchemaVersion(raw)),
            };
        }

        Ok(config)
    }

    pub fn with_max_instructions(mut self, limit: usize) -> Self {
        self.max_instructions = Some(limit);
        self
    }

    pub fn with_schema_version_check(mut self, check: bool) -> Self {
        self.check_schema_version = check;
        self
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid CARRY_REPLAY_MAX_INSTRUCTIONS value: {0}")]
    InvalidMaxInstructions(String),

    #[error("Invalid CARRY_REPLAY_CHECK_SCHEMA_VERSION value: {0}")]
    InvalidCheckSchemaVersion(String),
}
