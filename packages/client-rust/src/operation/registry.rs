use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use tracing::debug;

use super::descriptor::OperationDescriptor;
use super::scope::Scope;
use crate::client::Client;
use crate::error::OperationError;

pub type ErasedValue = Box<dyn Any + Send>;

// ---------------------------------------------------------------------------
// OperationHandler trait
// ---------------------------------------------------------------------------

/// Executes one kind of operation.
///
/// Handlers receive the shared [`Client`] so they can run nested operations,
/// and the operation's [`Scope`] so they can check for cancellation and
/// register cleanup. Handlers performing several ledger calls must call
/// [`Scope::throw_if_canceled`] between them.
#[async_trait]
pub trait OperationHandler<I, O>: Send + Sync + 'static
where
    I: Send + 'static,
    O: Send + 'static,
{
    async fn handle(&self, input: I, client: &Client, scope: &Scope) -> Result<O, OperationError>;
}

/// Adapter turning an async closure into an [`OperationHandler`].
pub struct HandlerFn<F>(F);

/// Wraps `f` as a handler. The client and scope are passed by value (both
/// are cheap `Arc` clones) so the returned future can own them.
///
/// ```
/// use ledgerkit_client::{handler_fn, OperationError};
///
/// let double = handler_fn(|input: u64, _client, _scope| async move {
///     Ok::<_, OperationError>(input * 2)
/// });
/// # let _ = double;
/// ```
pub fn handler_fn<I, O, F, Fut>(f: F) -> HandlerFn<F>
where
    F: Fn(I, Client, Scope) -> Fut,
    Fut: Future<Output = Result<O, OperationError>>,
{
    HandlerFn(f)
}

#[async_trait]
impl<I, O, F, Fut> OperationHandler<I, O> for HandlerFn<F>
where
    I: Send + 'static,
    O: Send + 'static,
    F: Fn(I, Client, Scope) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O, OperationError>> + Send + 'static,
{
    async fn handle(&self, input: I, client: &Client, scope: &Scope) -> Result<O, OperationError> {
        (self.0)(input, client.clone(), scope.clone()).await
    }
}

// ---------------------------------------------------------------------------
// Type-erased handler
// ---------------------------------------------------------------------------

pub(crate) trait ErasedHandler: Send + Sync {
    fn call(
        &self,
        input: ErasedValue,
        client: Client,
        scope: Scope,
    ) -> BoxFuture<'static, Result<ErasedValue, OperationError>>;
}

struct TypedHandler<I, O, H> {
    key: &'static str,
    handler: Arc<H>,
    _types: PhantomData<fn(I) -> O>,
}

impl<I, O, H> ErasedHandler for TypedHandler<I, O, H>
where
    I: Send + 'static,
    O: Send + 'static,
    H: OperationHandler<I, O>,
{
    fn call(
        &self,
        input: ErasedValue,
        client: Client,
        scope: Scope,
    ) -> BoxFuture<'static, Result<ErasedValue, OperationError>> {
        let key = self.key;
        let handler = Arc::clone(&self.handler);
        Box::pin(async move {
            let input = input
                .downcast::<I>()
                .map_err(|_| OperationError::TypeMismatch { key })?;
            let output = handler.handle(*input, &client, &scope).await?;
            Ok(Box::new(output) as ErasedValue)
        })
    }
}

// ---------------------------------------------------------------------------
// RegistryEntry
// ---------------------------------------------------------------------------

/// A registered handler together with the types it was registered for.
pub struct RegistryEntry {
    key: &'static str,
    input_type: TypeId,
    output_type: TypeId,
    input_name: &'static str,
    output_name: &'static str,
    handler: Arc<dyn ErasedHandler>,
}

impl RegistryEntry {
    #[must_use]
    pub fn key(&self) -> &'static str {
        self.key
    }

    /// `(input, output)` type names, for diagnostics.
    #[must_use]
    pub fn signature(&self) -> (&'static str, &'static str) {
        (self.input_name, self.output_name)
    }

    pub(crate) fn accepts(&self, input_type: TypeId, output_type: TypeId) -> bool {
        self.input_type == input_type && self.output_type == output_type
    }

    pub(crate) fn handler(&self) -> Arc<dyn ErasedHandler> {
        Arc::clone(&self.handler)
    }
}

impl std::fmt::Debug for RegistryEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryEntry")
            .field("key", &self.key)
            .field("input", &self.input_name)
            .field("output", &self.output_name)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// OperationRegistry
// ---------------------------------------------------------------------------

/// Maps operation keys to handlers. At most one handler per key.
///
/// Populated while plugins install, then frozen behind an `Arc` inside the
/// client; nothing mutates it once the client exists.
#[derive(Default)]
pub struct OperationRegistry {
    handlers: HashMap<&'static str, Arc<RegistryEntry>>,
}

impl OperationRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `descriptor`.
    ///
    /// # Errors
    ///
    /// Returns [`OperationError::Duplicate`] if the key already has a handler;
    /// the existing registration is left in place.
    pub fn register<I, O, H>(
        &mut self,
        descriptor: OperationDescriptor<I, O>,
        handler: H,
    ) -> Result<(), OperationError>
    where
        I: Send + 'static,
        O: Send + 'static,
        H: OperationHandler<I, O>,
    {
        let key = descriptor.key();
        if self.handlers.contains_key(key) {
            return Err(OperationError::Duplicate { key });
        }
        let entry = RegistryEntry {
            key,
            input_type: TypeId::of::<I>(),
            output_type: TypeId::of::<O>(),
            input_name: type_name::<I>(),
            output_name: type_name::<O>(),
            handler: Arc::new(TypedHandler {
                key,
                handler: Arc::new(handler),
                _types: PhantomData,
            }),
        };
        self.handlers.insert(key, Arc::new(entry));
        debug!(key, "operation registered");
        Ok(())
    }

    /// Looks up the handler registered for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`OperationError::Unregistered`] if no handler exists.
    pub fn resolve(&self, key: &str) -> Result<Arc<RegistryEntry>, OperationError> {
        self.handlers
            .get(key)
            .cloned()
            .ok_or_else(|| OperationError::Unregistered {
                key: key.to_string(),
            })
    }

    /// Looks up the handler for `descriptor` and checks its types.
    ///
    /// # Errors
    ///
    /// [`OperationError::Unregistered`] if missing,
    /// [`OperationError::TypeMismatch`] if registered for other types.
    pub fn resolve_typed<I: 'static, O: 'static>(
        &self,
        descriptor: OperationDescriptor<I, O>,
    ) -> Result<Arc<RegistryEntry>, OperationError> {
        let entry = self.resolve(descriptor.key())?;
        if entry.accepts(TypeId::of::<I>(), TypeId::of::<O>()) {
            Ok(entry)
        } else {
            Err(OperationError::TypeMismatch {
                key: descriptor.key(),
            })
        }
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.handlers.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Registered keys, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<&'static str> {
        let mut keys: Vec<_> = self.handlers.keys().copied().collect();
        keys.sort_unstable();
        keys
    }
}

impl std::fmt::Debug for OperationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationRegistry")
            .field("keys", &self.keys())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
