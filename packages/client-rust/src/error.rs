//! Error type shared by the dispatch framework and every operation handler.

use ledgerkit_core::LedgerError;

use crate::storage::StorageError;

/// Errors returned by [`Client::run`](crate::Client::run) and operation handlers.
///
/// The first group is raised by the framework itself. Collaborator failures
/// (`Ledger`, `Storage`, `Other`) are transparent: the executor hands them
/// back exactly as the handler produced them, so callers can match on the
/// original failure kind.
#[derive(Debug, thiserror::Error)]
pub enum OperationError {
    #[error("an operation with key [{key}] is already registered")]
    Duplicate { key: &'static str },

    #[error("no handler registered for operation [{key}]")]
    Unregistered { key: String },

    #[error("operation canceled")]
    Canceled,

    #[error("operation [{key}] is registered with different input/output types")]
    TypeMismatch { key: &'static str },

    #[error("client has no capability named [{name}]")]
    MissingCapability { name: &'static str },

    #[error("plugin [{plugin}] failed to install: {source}")]
    PluginInstall {
        plugin: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("hydration would change field [{field}] of the lazy record")]
    Hydration { field: &'static str },

    #[error("{} teardown callback(s) failed", .failures.len())]
    Teardown {
        /// The handler error that was already being returned, if any.
        primary: Option<Box<OperationError>>,
        failures: Vec<anyhow::Error>,
    },

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl OperationError {
    /// True if this is, or wraps as its primary error, a cancellation.
    #[must_use]
    pub fn is_canceled(&self) -> bool {
        matches!(self.primary(), Self::Canceled)
    }

    /// The error the handler produced, looking through teardown failures.
    #[must_use]
    pub fn primary(&self) -> &OperationError {
        match self {
            Self::Teardown {
                primary: Some(primary),
                ..
            } => primary.primary(),
            other => other,
        }
    }

    /// Shorthand for ad-hoc handler failures.
    pub fn other(message: impl std::fmt::Display) -> Self {
        Self::Other(anyhow::anyhow!("{message}"))
    }
}
