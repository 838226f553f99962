//! Error types for row-to-entity mapping.
//!
//! Every variant here is fatal for the query execution that raised it.
//! Expected absence (a left join with no matching row) is never an error:
//! the cursor reports it as `Ok(None)`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MapperError {
    /// Deduplication was requested without a primary key selector.
    #[error("Primary key selector is not defined for `{entity}`, but is required for deduplication")]
    MissingPrimaryKey { entity: &'static str },

    /// A fragment produced no primary key, so it cannot be deduplicated safely.
    #[error("A null primary key was extracted from `{entity}`, which results in an unpredictable state")]
    NullPrimaryKey { entity: &'static str },

    /// The query layer and the mapper disagree on consumption order.
    #[error("Fragment at position {position} holds `{found}`, but `{expected}` was expected")]
    TypeMismatch {
        position: usize,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Alias `{alias}` is declared more than once in the row shape")]
    DuplicateAlias { alias: String },

    #[error("Failed to decode fragment `{alias}`: {source}")]
    Decode {
        alias: String,
        #[source]
        source: serde_json::Error,
    },
}

impl MapperError {
    /// True for errors caused by mapper or query wiring rather than row data.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            MapperError::MissingPrimaryKey { .. }
                | MapperError::TypeMismatch { .. }
                | MapperError::DuplicateAlias { .. }
        )
    }
}
