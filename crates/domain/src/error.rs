//! Common error types used across the workspace.
//!
//! Only malformed input is an error. Lookups that find nothing return
//! `Option`/`bool`, and faults raised by listeners, handlers or jobs are
//! contained where they are dispatched.

/// Base error for everything that can fail in homecore.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    #[error("validation error")]
    Validation(#[from] ValidationError),

    /// A worker or timer thread could not be spawned.
    #[error("failed to spawn thread")]
    Spawn(#[from] std::io::Error),

    /// An integration failed during setup or teardown.
    #[error("integration {name} failed")]
    Integration {
        name: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Input that violates a domain invariant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Identifier is not of the form `domain.object_id`.
    #[error("invalid identifier format: {0:?}")]
    InvalidIdentifierFormat(String),
}
