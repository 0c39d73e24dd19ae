//! Two-phase records: a cheap lazy form and its fully loaded counterpart.
//!
//! Scan operations return lazy records carrying identifiers only. A dedicated
//! load operation turns one lazy record into a full one by running nested
//! fetches under the caller's scope. Which fetches run is decided solely by
//! the lazy record's own fields. Loading never changes a field the lazy
//! record already carries; [`ensure_unchanged`] guards that when a fetched
//! sub-entity repeats a lazy field.

use super::descriptor::OperationDescriptor;
use super::scope::Scope;
use crate::client::Client;
use crate::error::OperationError;

/// Either the lazy or the fully loaded form of one entity.
#[derive(Debug, Clone, PartialEq)]
pub enum Hydration<L, F> {
    Lazy(L),
    Full(F),
}

impl<L, F> Hydration<L, F> {
    #[must_use]
    pub fn is_lazy(&self) -> bool {
        matches!(self, Self::Lazy(_))
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        matches!(self, Self::Full(_))
    }

    #[must_use]
    pub fn as_lazy(&self) -> Option<&L> {
        match self {
            Self::Lazy(lazy) => Some(lazy),
            Self::Full(_) => None,
        }
    }

    #[must_use]
    pub fn as_full(&self) -> Option<&F> {
        match self {
            Self::Full(full) => Some(full),
            Self::Lazy(_) => None,
        }
    }

    /// The full record, if already loaded.
    #[must_use]
    pub fn into_full(self) -> Option<F> {
        match self {
            Self::Full(full) => Some(full),
            Self::Lazy(_) => None,
        }
    }

    /// Returns the full record, loading it through `load` when still lazy.
    ///
    /// A full record is returned as-is without touching the ledger.
    ///
    /// # Errors
    ///
    /// Whatever the load operation fails with.
    pub async fn ensure_full<I>(
        self,
        client: &Client,
        scope: Option<&Scope>,
        load: OperationDescriptor<I, F>,
        make_input: impl FnOnce(L) -> I,
    ) -> Result<F, OperationError>
    where
        I: Send + 'static,
        F: Send + 'static,
    {
        match self {
            Self::Full(full) => Ok(full),
            Self::Lazy(lazy) => client.run(load.with(make_input(lazy)), scope).await,
        }
    }
}

/// Checks that a fetched value agrees with the lazy record's copy of `field`.
///
/// # Errors
///
/// [`OperationError::Hydration`] when the two differ.
pub fn ensure_unchanged<T: PartialEq>(
    field: &'static str,
    lazy: &T,
    fetched: &T,
) -> Result<(), OperationError> {
    if lazy == fetched {
        Ok(())
    } else {
        Err(OperationError::Hydration { field })
    }
}
