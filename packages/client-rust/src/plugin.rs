//! Plugin installation and capability extension.
//!
//! Plugins are installed once, in order, while a [`Client`](crate::Client)
//! is being built. Each plugin registers operations and may attach
//! capabilities: typed facades reachable from the finished client.
//! Installation is all-or-nothing; if any plugin fails the client is never
//! constructed.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::ClientConfig;
use crate::error::OperationError;
use crate::operation::descriptor::OperationDescriptor;
use crate::operation::registry::{OperationHandler, OperationRegistry};

// ---------------------------------------------------------------------------
// Plugin trait
// ---------------------------------------------------------------------------

/// A self-contained unit that extends a client at construction time.
pub trait Plugin: Send + Sync {
    /// Unique, human-readable name, used in logs and errors.
    fn name(&self) -> &'static str;

    /// Registers operations and provides capabilities.
    ///
    /// # Errors
    ///
    /// Any error aborts client construction.
    fn install(&self, installer: &mut Installer<'_>) -> Result<(), OperationError>;
}

/// A plugin built from a closure; see [`plugin_fn`].
pub struct FnPlugin<F> {
    name: &'static str,
    install: F,
}

/// Wraps a closure as a [`Plugin`].
pub fn plugin_fn<F>(name: &'static str, install: F) -> FnPlugin<F>
where
    F: Fn(&mut Installer<'_>) -> Result<(), OperationError> + Send + Sync,
{
    FnPlugin { name, install }
}

impl<F> Plugin for FnPlugin<F>
where
    F: Fn(&mut Installer<'_>) -> Result<(), OperationError> + Send + Sync,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn install(&self, installer: &mut Installer<'_>) -> Result<(), OperationError> {
        (self.install)(installer)
    }
}

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

/// A facade attached to the client by a plugin.
///
/// The `Any` bound enables type-based lookup via [`CapabilitySet::get`].
pub trait Capability: Any + Send + Sync {
    /// Name the capability is attached under. Unique per client.
    fn name(&self) -> &'static str;
}

/// Capabilities attached to a client, looked up by name or by type.
///
/// First write wins: a later capability with an already-used name is
/// ignored (and logged).
#[derive(Default)]
pub struct CapabilitySet {
    by_name: HashMap<&'static str, TypeId>,
    by_type: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl CapabilitySet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches `capability`. Returns `false` if the name was taken.
    pub fn insert<T: Capability>(&mut self, capability: Arc<T>) -> bool {
        self.insert_erased(capability.name(), TypeId::of::<T>(), capability)
    }

    fn insert_erased(
        &mut self,
        name: &'static str,
        type_id: TypeId,
        capability: Arc<dyn Any + Send + Sync>,
    ) -> bool {
        if self.by_name.contains_key(name) || self.by_type.contains_key(&type_id) {
            warn!(capability = name, "capability already attached, keeping the first");
            return false;
        }
        self.by_name.insert(name, type_id);
        self.by_type.insert(type_id, capability);
        true
    }

    /// Retrieve a capability by its concrete type.
    #[must_use]
    pub fn get<T: Capability>(&self) -> Option<Arc<T>> {
        self.by_type
            .get(&TypeId::of::<T>())
            .and_then(|capability| Arc::clone(capability).downcast::<T>().ok())
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Attached capability names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.by_name.keys().copied().collect();
        names.sort_unstable();
        names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

impl std::fmt::Debug for CapabilitySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilitySet")
            .field("names", &self.names())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Installer
// ---------------------------------------------------------------------------

struct StagedCapability {
    name: &'static str,
    type_id: TypeId,
    capability: Arc<dyn Any + Send + Sync>,
}

/// Handle given to [`Plugin::install`].
///
/// Operations are registered immediately; capabilities are staged and only
/// attached once the whole plugin list installs successfully.
pub struct Installer<'a> {
    plugin: &'static str,
    registry: &'a mut OperationRegistry,
    config: &'a ClientConfig,
    staged: &'a mut Vec<StagedCapability>,
}

impl Installer<'_> {
    /// Name of the plugin being installed.
    #[must_use]
    pub fn plugin(&self) -> &'static str {
        self.plugin
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        self.config
    }

    /// Registers an operation handler.
    ///
    /// # Errors
    ///
    /// [`OperationError::Duplicate`] if another handler owns the key.
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
        self.registry.register(descriptor, handler)
    }

    /// Stages `capability` for attachment to the client.
    pub fn provide<T: Capability>(&mut self, capability: Arc<T>) {
        self.staged.push(StagedCapability {
            name: capability.name(),
            type_id: TypeId::of::<T>(),
            capability,
        });
    }
}

/// Runs every plugin's install against `registry`, then attaches the staged
/// capabilities. Stops at the first failure, leaving `capabilities` empty.
pub(crate) fn install_all(
    plugins: &[Box<dyn Plugin>],
    registry: &mut OperationRegistry,
    config: &ClientConfig,
) -> Result<CapabilitySet, OperationError> {
    let mut staged = Vec::new();
    for plugin in plugins {
        let name = plugin.name();
        let mut installer = Installer {
            plugin: name,
            registry: &mut *registry,
            config,
            staged: &mut staged,
        };
        plugin.install(&mut installer).map_err(|e| match e {
            OperationError::Other(source) => OperationError::PluginInstall {
                plugin: name,
                source,
            },
            framework => framework,
        })?;
        info!(plugin = name, "plugin installed");
    }

    let mut capabilities = CapabilitySet::new();
    for staged in staged {
        capabilities.insert_erased(staged.name, staged.type_id, staged.capability);
    }
    Ok(capabilities)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::registry::handler_fn;

    struct Greeter(&'static str);

    impl Capability for Greeter {
        fn name(&self) -> &'static str {
            "greeter"
        }
    }

    struct Counter;

    impl Capability for Counter {
        fn name(&self) -> &'static str {
            "counter"
        }
    }

    const PING: OperationDescriptor<(), ()> = OperationDescriptor::new("Ping");

    fn ping_plugin(name: &'static str) -> Box<dyn Plugin> {
        Box::new(plugin_fn(name, |installer| {
            installer.provide(Arc::new(Counter));
            installer.register(PING, handler_fn(|(), _client, _scope| async { Ok(()) }))
        }))
    }

    #[test]
    fn capability_lookup_by_type_and_name() {
        let mut set = CapabilitySet::new();
        assert!(set.insert(Arc::new(Greeter("hello"))));
        assert!(set.contains("greeter"));
        assert_eq!(set.get::<Greeter>().unwrap().0, "hello");
        assert!(set.get::<Counter>().is_none());
        assert_eq!(set.names(), vec!["greeter"]);
    }

    #[test]
    fn first_capability_write_wins() {
        let mut set = CapabilitySet::new();
        assert!(set.insert(Arc::new(Greeter("first"))));
        assert!(!set.insert(Arc::new(Greeter("second"))));
        assert_eq!(set.get::<Greeter>().unwrap().0, "first");
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn install_all_attaches_capabilities_in_order() {
        let plugins: Vec<Box<dyn Plugin>> = vec![
            Box::new(plugin_fn("a", |installer| {
                installer.provide(Arc::new(Greeter("a")));
                Ok(())
            })),
            Box::new(plugin_fn("b", |installer| {
                installer.provide(Arc::new(Greeter("b")));
                Ok(())
            })),
        ];
        let mut registry = OperationRegistry::new();
        let set = install_all(&plugins, &mut registry, &ClientConfig::default()).unwrap();
        assert_eq!(set.get::<Greeter>().unwrap().0, "a");
    }

    #[test]
    fn duplicate_operation_aborts_installation() {
        let plugins = vec![ping_plugin("a"), ping_plugin("b")];
        let mut registry = OperationRegistry::new();
        let err = install_all(&plugins, &mut registry, &ClientConfig::default()).unwrap_err();
        assert!(matches!(err, OperationError::Duplicate { key: "Ping" }));
    }

    #[test]
    fn plugin_failures_name_the_plugin() {
        let plugins: Vec<Box<dyn Plugin>> = vec![Box::new(plugin_fn("broken", |_installer| {
            Err(OperationError::Other(anyhow::anyhow!("no config")))
        }))];
        let mut registry = OperationRegistry::new();
        let err = install_all(&plugins, &mut registry, &ClientConfig::default()).unwrap_err();
        match err {
            OperationError::PluginInstall { plugin, source } => {
                assert_eq!(plugin, "broken");
                assert_eq!(source.to_string(), "no config");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn installer_exposes_plugin_and_config() {
        let plugins: Vec<Box<dyn Plugin>> = vec![Box::new(plugin_fn("probe", |installer| {
            assert_eq!(installer.plugin(), "probe");
            assert!(installer.config().load_json_metadata);
            Ok(())
        }))];
        let mut registry = OperationRegistry::new();
        assert!(install_all(&plugins, &mut registry, &ClientConfig::default())
            .unwrap()
            .is_empty());
    }
}
