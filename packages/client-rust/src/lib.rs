//! Ledgerkit Client: plugin-driven operation dispatch with hierarchical
//! cancellation, cleanup scopes and lazy record hydration.
//!
//! Every capability of the client is an *operation*: a typed
//! [`OperationDescriptor`] whose handler is registered by a [`Plugin`]. The
//! [`Client`] runs operations through a tower pipeline, giving each run its
//! own [`Scope`] for cancellation and teardown.
//!
//! ```
//! use std::sync::Arc;
//!
//! use ledgerkit_client::{handler_fn, plugin_fn, Client, OperationDescriptor};
//! use ledgerkit_core::InMemoryLedger;
//!
//! const DOUBLE: OperationDescriptor<u64, u64> = OperationDescriptor::new("Double");
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let client = Client::builder(Arc::new(InMemoryLedger::new()))
//!     .plugin(plugin_fn("math", |installer| {
//!         installer.register(DOUBLE, handler_fn(|n: u64, _client, _scope| async move { Ok(n * 2) }))
//!     }))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(client.run(DOUBLE.with(21), None).await.unwrap(), 42);
//! # });
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod operation;
pub mod plugin;
pub mod plugins;
pub mod storage;

pub use client::{Client, ClientBuilder, Invocation};
pub use config::{ClientConfig, FetchOptions, StorageConfig};
pub use error::OperationError;
pub use logging::{init_tracing, LogFormat};
pub use operation::{
    ensure_unchanged, handler_fn, Hydration, OperationDescriptor, OperationHandler,
    OperationInstance, OperationRegistry, Scope,
};
pub use plugin::{plugin_fn, Capability, CapabilitySet, Installer, Plugin};
pub use plugins::auction_house::{AuctionHousePlugin, AuctionsExt};
pub use plugins::nft::{NftExt, NftPlugin};
pub use storage::{FilesystemDriver, MemoryDriver, StorageDriver, StorageError, StoredFile};
