//! The shared client: executor for operations and home of plugin facades.

use std::any::TypeId;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ledgerkit_core::LedgerRpc;
use parking_lot::Mutex;
use tower::ServiceExt;

use crate::config::ClientConfig;
use crate::error::OperationError;
use crate::operation::descriptor::OperationInstance;
use crate::operation::middleware::{build_operation_pipeline, OperationPipeline};
use crate::operation::registry::OperationRegistry;
use crate::operation::router::{Dispatch, OperationContext, OperationRouter};
use crate::operation::scope::Scope;
use crate::plugin::{install_all, Capability, CapabilitySet, Plugin};
use crate::plugins::auction_house::AuctionHousePlugin;
use crate::plugins::nft::NftPlugin;
use crate::storage::{MemoryDriver, StorageDriver};

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

struct ClientInner {
    config: ClientConfig,
    ledger: Arc<dyn LedgerRpc>,
    storage: Arc<dyn StorageDriver>,
    registry: Arc<OperationRegistry>,
    capabilities: CapabilitySet,
    // BoxCloneService is Send but not Sync; each call clones it out.
    pipeline: Mutex<OperationPipeline>,
    call_ids: AtomicU64,
}

/// Entry point for running operations. Cheap to clone; clones share the
/// same registry, collaborators and capabilities.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Client {
    /// Starts building a client over `ledger`.
    #[must_use]
    pub fn builder(ledger: Arc<dyn LedgerRpc>) -> ClientBuilder {
        ClientBuilder {
            ledger,
            config: ClientConfig::default(),
            storage: None,
            plugins: Vec::new(),
        }
    }

    /// Builds a client with the built-in `nft` and `auction_house` plugins.
    ///
    /// # Errors
    ///
    /// Fails only if a built-in plugin fails to install.
    pub fn with_defaults(ledger: Arc<dyn LedgerRpc>) -> Result<Self, OperationError> {
        Self::builder(ledger)
            .plugin(NftPlugin)
            .plugin(AuctionHousePlugin::default())
            .build()
    }

    /// Runs one operation to completion.
    ///
    /// The operation gets its own scope: a child of `parent` when given,
    /// otherwise a new root. The scope's cleanup callbacks run before this
    /// returns, whatever the outcome.
    ///
    /// # Errors
    ///
    /// - [`OperationError::Unregistered`] if no plugin handles the key.
    /// - [`OperationError::Canceled`] if the scope was cancelled before the
    ///   handler started, or the handler observed cancellation.
    /// - [`OperationError::Teardown`] if cleanup callbacks failed.
    /// - Otherwise, the handler's own error, unchanged.
    pub async fn run<I, O>(
        &self,
        instance: OperationInstance<I, O>,
        parent: Option<&Scope>,
    ) -> Result<O, OperationError>
    where
        I: Send + 'static,
        O: Send + 'static,
    {
        let scope = parent.map_or_else(Scope::new, Scope::child);
        let (descriptor, input) = instance.into_parts();
        let key = descriptor.key();

        let dispatch = Dispatch {
            ctx: OperationContext {
                call_id: self.inner.call_ids.fetch_add(1, Ordering::Relaxed),
                key,
                depth: scope.depth(),
                timeout: self.inner.config.operation_timeout,
            },
            scope: scope.clone(),
            client: self.clone(),
            input: Box::new(input),
            input_type: TypeId::of::<I>(),
            output_type: TypeId::of::<O>(),
        };

        let pipeline = self.inner.pipeline.lock().clone();
        let result = pipeline.oneshot(dispatch).await.and_then(|output| {
            output
                .downcast::<O>()
                .map(|output| *output)
                .map_err(|_| OperationError::TypeMismatch { key })
        });
        scope.finish(result)
    }

    /// Binds `instance` to this client for a later [`Invocation::run`].
    #[must_use]
    pub fn operation<I, O>(&self, instance: OperationInstance<I, O>) -> Invocation<I, O> {
        Invocation {
            client: self.clone(),
            instance,
        }
    }

    #[must_use]
    pub fn ledger(&self) -> &Arc<dyn LedgerRpc> {
        &self.inner.ledger
    }

    #[must_use]
    pub fn storage(&self) -> &Arc<dyn StorageDriver> {
        &self.inner.storage
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn registry(&self) -> &OperationRegistry {
        &self.inner.registry
    }

    /// The capability of type `T`, if a plugin attached one.
    #[must_use]
    pub fn capability<T: Capability>(&self) -> Option<Arc<T>> {
        self.inner.capabilities.get::<T>()
    }

    /// The capability of type `T`.
    ///
    /// # Errors
    ///
    /// [`OperationError::MissingCapability`] if no plugin attached it.
    pub fn require_capability<T: Capability>(
        &self,
        name: &'static str,
    ) -> Result<Arc<T>, OperationError> {
        self.capability::<T>()
            .ok_or(OperationError::MissingCapability { name })
    }

    #[must_use]
    pub fn has_capability(&self, name: &str) -> bool {
        self.inner.capabilities.contains(name)
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.inner.config)
            .field("operations", &self.inner.registry.keys())
            .field("capabilities", &self.inner.capabilities.names())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Invocation
// ---------------------------------------------------------------------------

/// An operation instance bound to a client, ready to run once.
pub struct Invocation<I, O> {
    client: Client,
    instance: OperationInstance<I, O>,
}

impl<I, O> Invocation<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    #[must_use]
    pub fn key(&self) -> &'static str {
        self.instance.key()
    }

    /// Runs the operation; see [`Client::run`].
    ///
    /// # Errors
    ///
    /// As [`Client::run`].
    pub async fn run(self, parent: Option<&Scope>) -> Result<O, OperationError> {
        self.client.run(self.instance, parent).await
    }
}

impl<I: std::fmt::Debug, O> std::fmt::Debug for Invocation<I, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Invocation")
            .field("instance", &self.instance)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// ClientBuilder
// ---------------------------------------------------------------------------

/// Collects configuration and plugins, then builds a [`Client`].
pub struct ClientBuilder {
    ledger: Arc<dyn LedgerRpc>,
    config: ClientConfig,
    storage: Option<Arc<dyn StorageDriver>>,
    plugins: Vec<Box<dyn Plugin>>,
}

impl ClientBuilder {
    #[must_use]
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Storage driver for off-ledger files. Defaults to an empty
    /// [`MemoryDriver`].
    #[must_use]
    pub fn storage(mut self, storage: Arc<dyn StorageDriver>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Appends a plugin. Plugins install in the order they were added.
    #[must_use]
    pub fn plugin(mut self, plugin: impl Plugin + 'static) -> Self {
        self.plugins.push(Box::new(plugin));
        self
    }

    /// Installs every plugin and freezes the registry.
    ///
    /// # Errors
    ///
    /// The first plugin failure, e.g. [`OperationError::Duplicate`] when two
    /// plugins register the same key. No client is produced in that case.
    pub fn build(self) -> Result<Client, OperationError> {
        let mut registry = OperationRegistry::new();
        let capabilities = install_all(&self.plugins, &mut registry, &self.config)?;
        let registry = Arc::new(registry);
        let pipeline = build_operation_pipeline(OperationRouter::new(Arc::clone(&registry)));

        tracing::debug!(
            operations = registry.len(),
            capabilities = capabilities.len(),
            "client built"
        );

        Ok(Client {
            inner: Arc::new(ClientInner {
                config: self.config,
                ledger: self.ledger,
                storage: self
                    .storage
                    .unwrap_or_else(|| Arc::new(MemoryDriver::new())),
                registry,
                capabilities,
                pipeline: Mutex::new(pipeline),
                call_ids: AtomicU64::new(1),
            }),
        })
    }
}

impl std::fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let plugins: Vec<_> = self.plugins.iter().map(|p| p.name()).collect();
        f.debug_struct("ClientBuilder")
            .field("config", &self.config)
            .field("plugins", &plugins)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
