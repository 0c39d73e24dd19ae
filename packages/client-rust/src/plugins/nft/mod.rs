//! The `nft` plugin: lookups for mints, metadata and token accounts.
//!
//! Installs the operations in [`operations`] and attaches [`NftCapability`],
//! reached through [`NftExt::nfts`].

use std::sync::Arc;

use ledgerkit_core::Address;

use crate::client::{Client, Invocation};
use crate::config::FetchOptions;
use crate::error::OperationError;
use crate::operation::handler_fn;
use crate::plugin::{Capability, Installer, Plugin};

pub mod accounts;
pub mod models;
pub mod operations;

pub use accounts::{
    associated_token_address, metadata_address, MetadataAccount, MintAccount, TokenAccount,
    ASSOCIATED_TOKEN_PROGRAM, METADATA_PROGRAM, NATIVE_MINT, TOKEN_PROGRAM,
};
pub use models::{JsonMetadata, Metadata, Mint, MintWithMetadata, Token, TokenWithMetadata};
pub use operations::{
    FindMintByAddressInput, FindMintByMetadataInput, FindTokenByAddressInput,
    FindTokenByMetadataInput, FIND_MINT_WITH_METADATA_BY_ADDRESS,
    FIND_MINT_WITH_METADATA_BY_METADATA, FIND_TOKEN_WITH_METADATA_BY_ADDRESS,
    FIND_TOKEN_WITH_METADATA_BY_METADATA, LOAD_JSON_METADATA,
};

/// Name [`NftCapability`] is attached under.
pub const NFT_CAPABILITY: &str = "nfts";

#[derive(Debug, Clone, Copy, Default)]
pub struct NftPlugin;

impl Plugin for NftPlugin {
    fn name(&self) -> &'static str {
        "nft"
    }

    fn install(&self, installer: &mut Installer<'_>) -> Result<(), OperationError> {
        installer.register(
            FIND_MINT_WITH_METADATA_BY_ADDRESS,
            handler_fn(operations::find_mint_with_metadata_by_address),
        )?;
        installer.register(
            FIND_MINT_WITH_METADATA_BY_METADATA,
            handler_fn(operations::find_mint_with_metadata_by_metadata),
        )?;
        installer.register(
            FIND_TOKEN_WITH_METADATA_BY_ADDRESS,
            handler_fn(operations::find_token_with_metadata_by_address),
        )?;
        installer.register(
            FIND_TOKEN_WITH_METADATA_BY_METADATA,
            handler_fn(operations::find_token_with_metadata_by_metadata),
        )?;
        installer.register(LOAD_JSON_METADATA, handler_fn(operations::load_json_metadata))?;
        installer.provide(Arc::new(NftCapability));
        Ok(())
    }
}

/// Marks a client as able to serve [`NftClient`].
#[derive(Debug)]
pub struct NftCapability;

impl Capability for NftCapability {
    fn name(&self) -> &'static str {
        NFT_CAPABILITY
    }
}

/// Facade building nft operations against one client.
#[derive(Debug, Clone)]
pub struct NftClient {
    client: Client,
}

impl NftClient {
    #[must_use]
    pub fn find_mint_with_metadata_by_address(
        &self,
        address: Address,
        options: FetchOptions,
    ) -> Invocation<FindMintByAddressInput, MintWithMetadata> {
        self.client.operation(
            FIND_MINT_WITH_METADATA_BY_ADDRESS.with(FindMintByAddressInput { address, options }),
        )
    }

    #[must_use]
    pub fn find_mint_with_metadata_by_metadata(
        &self,
        metadata: Address,
        options: FetchOptions,
    ) -> Invocation<FindMintByMetadataInput, MintWithMetadata> {
        self.client.operation(
            FIND_MINT_WITH_METADATA_BY_METADATA.with(FindMintByMetadataInput { metadata, options }),
        )
    }

    #[must_use]
    pub fn find_token_with_metadata_by_address(
        &self,
        address: Address,
        options: FetchOptions,
    ) -> Invocation<FindTokenByAddressInput, TokenWithMetadata> {
        self.client.operation(
            FIND_TOKEN_WITH_METADATA_BY_ADDRESS.with(FindTokenByAddressInput { address, options }),
        )
    }

    #[must_use]
    pub fn find_token_with_metadata_by_metadata(
        &self,
        metadata: Address,
        owner: Address,
        options: FetchOptions,
    ) -> Invocation<FindTokenByMetadataInput, TokenWithMetadata> {
        self.client
            .operation(FIND_TOKEN_WITH_METADATA_BY_METADATA.with(FindTokenByMetadataInput {
                metadata,
                owner,
                options,
            }))
    }

    #[must_use]
    pub fn load_json_metadata(&self, metadata: Metadata) -> Invocation<Metadata, Metadata> {
        self.client.operation(LOAD_JSON_METADATA.with(metadata))
    }
}

/// Adds [`nfts`](NftExt::nfts) to [`Client`].
pub trait NftExt {
    /// The nft facade.
    ///
    /// # Errors
    ///
    /// [`OperationError::MissingCapability`] unless [`NftPlugin`] is installed.
    fn nfts(&self) -> Result<NftClient, OperationError>;
}

impl NftExt for Client {
    fn nfts(&self) -> Result<NftClient, OperationError> {
        self.require_capability::<NftCapability>(NFT_CAPABILITY)?;
        Ok(NftClient {
            client: self.clone(),
        })
    }
}


#[cfg(test)]
mod tests {
    use ledgerkit_core::{Currency, InMemoryLedger, LedgerError};

    use super::fixtures::seed_nft;
    use super::*;
    use crate::operation::Scope;
    use crate::storage::MemoryDriver;

    const OWNER: Address = Address::new([9; 32]);

    fn setup() -> (Arc<InMemoryLedger>, Arc<MemoryDriver>, Client) {
        let ledger = Arc::new(InMemoryLedger::new());
        let storage = Arc::new(MemoryDriver::new());
        let client = Client::builder(ledger.clone())
            .storage(storage.clone())
            .plugin(NftPlugin)
            .build()
            .unwrap();
        (ledger, storage, client)
    }

    #[tokio::test]
    async fn finds_mint_by_address_with_json() {
        let (ledger, storage, client) = setup();
        storage.put("nfts/1.json", r#"{"name":"Sunrise","image":"sunrise.png"}"#);
        let nft = seed_nft(&ledger, 1, OWNER, "nfts/1.json");

        let found = client
            .nfts()
            .unwrap()
            .find_mint_with_metadata_by_address(nft.mint, FetchOptions::default())
            .run(None)
            .await
            .unwrap();
        assert_eq!(found.address(), nft.mint);
        assert_eq!(found.metadata.address, nft.metadata);
        assert_eq!(found.currency(), &Currency::token());
        assert!(found.metadata.json_loaded);
        assert_eq!(found.metadata.json.unwrap().name.as_deref(), Some("Sunrise"));
    }

    #[tokio::test]
    async fn json_can_be_skipped() {
        let (ledger, storage, client) = setup();
        storage.put("nfts/1.json", "{}");
        let nft = seed_nft(&ledger, 1, OWNER, "nfts/1.json");

        let found = client
            .nfts()
            .unwrap()
            .find_mint_with_metadata_by_metadata(nft.metadata, FetchOptions::default().without_json())
            .run(None)
            .await
            .unwrap();
        assert_eq!(found.address(), nft.mint);
        assert!(!found.metadata.json_loaded);
        assert!(found.metadata.json.is_none());
    }

    #[tokio::test]
    async fn missing_json_is_not_an_error() {
        let (ledger, _storage, client) = setup();
        let nft = seed_nft(&ledger, 1, OWNER, "nfts/missing.json");

        let found = client
            .nfts()
            .unwrap()
            .find_mint_with_metadata_by_address(nft.mint, FetchOptions::default())
            .run(None)
            .await
            .unwrap();
        assert!(found.metadata.json_loaded);
        assert!(found.metadata.json.is_none());
    }

    #[tokio::test]
    async fn finds_token_by_address_and_by_metadata() {
        let (ledger, _storage, client) = setup();
        let nft = seed_nft(&ledger, 2, OWNER, "");
        let nfts = client.nfts().unwrap();

        let by_address = nfts
            .find_token_with_metadata_by_address(nft.token, FetchOptions::default())
            .run(None)
            .await
            .unwrap();
        let by_metadata = nfts
            .find_token_with_metadata_by_metadata(nft.metadata, OWNER, FetchOptions::default())
            .run(None)
            .await
            .unwrap();
        assert_eq!(by_address, by_metadata);
        assert_eq!(by_address.address(), nft.token);
        assert_eq!(by_address.token.owner, OWNER);
        assert_eq!(by_address.amount().basis_points, 1);
    }

    #[tokio::test]
    async fn missing_mint_is_account_not_found() {
        let (_ledger, _storage, client) = setup();
        let missing = Address::new([42; 32]);
        let err = client
            .nfts()
            .unwrap()
            .find_mint_with_metadata_by_address(missing, FetchOptions::default())
            .run(None)
            .await
            .unwrap_err();
        match err {
            OperationError::Ledger(LedgerError::AccountNotFound {
                address,
                account_type,
            }) => {
                assert_eq!(address, missing);
                assert_eq!(account_type, "Mint");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn canceled_lookup_reads_nothing() {
        let (ledger, _storage, client) = setup();
        let nft = seed_nft(&ledger, 3, OWNER, "");
        let scope = Scope::new();
        scope.cancel();

        let err = client
            .nfts()
            .unwrap()
            .find_token_with_metadata_by_address(nft.token, FetchOptions::default())
            .run(Some(&scope))
            .await
            .unwrap_err();
        assert!(err.is_canceled());
        assert_eq!(ledger.total_reads(), 0);
    }

    #[test]
    fn facade_requires_plugin() {
        let client = Client::builder(Arc::new(InMemoryLedger::new())).build().unwrap();
        let err = client.nfts().unwrap_err();
        assert!(matches!(err, OperationError::MissingCapability { name: "nfts" }));
    }
}
