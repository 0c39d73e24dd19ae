//! Lookup operations for mints, metadata and token accounts.
//!
//! Handlers performing several ledger reads check the scope between them.
//! Off-ledger JSON is loaded through the nested [`LOAD_JSON_METADATA`]
//! operation when [`FetchOptions::load_json_metadata`] resolves to true.

use ledgerkit_core::codec::decode_required;
use ledgerkit_core::{AccountRecord, Address, LedgerError};
use tracing::debug;

use super::accounts::{associated_token_address, metadata_address, MetadataAccount, MintAccount, TokenAccount};
use super::models::{JsonMetadata, Metadata, Mint, MintWithMetadata, Token, TokenWithMetadata};
use crate::client::Client;
use crate::config::FetchOptions;
use crate::error::OperationError;
use crate::operation::{ensure_unchanged, OperationDescriptor, Scope};

// ---------------------------------------------------------------------------
// Descriptors
// ---------------------------------------------------------------------------

pub const FIND_MINT_WITH_METADATA_BY_ADDRESS: OperationDescriptor<
    FindMintByAddressInput,
    MintWithMetadata,
> = OperationDescriptor::new("FindMintWithMetadataByAddress");

pub const FIND_MINT_WITH_METADATA_BY_METADATA: OperationDescriptor<
    FindMintByMetadataInput,
    MintWithMetadata,
> = OperationDescriptor::new("FindMintWithMetadataByMetadata");

pub const FIND_TOKEN_WITH_METADATA_BY_ADDRESS: OperationDescriptor<
    FindTokenByAddressInput,
    TokenWithMetadata,
> = OperationDescriptor::new("FindTokenWithMetadataByAddress");

pub const FIND_TOKEN_WITH_METADATA_BY_METADATA: OperationDescriptor<
    FindTokenByMetadataInput,
    TokenWithMetadata,
> = OperationDescriptor::new("FindTokenWithMetadataByMetadata");

pub const LOAD_JSON_METADATA: OperationDescriptor<Metadata, Metadata> =
    OperationDescriptor::new("LoadJsonMetadata");

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindMintByAddressInput {
    pub address: Address,
    pub options: FetchOptions,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindMintByMetadataInput {
    pub metadata: Address,
    pub options: FetchOptions,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindTokenByAddressInput {
    pub address: Address,
    pub options: FetchOptions,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindTokenByMetadataInput {
    pub metadata: Address,
    pub owner: Address,
    pub options: FetchOptions,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Mint address -> mint and its derived metadata, in one round-trip.
pub(crate) async fn find_mint_with_metadata_by_address(
    input: FindMintByAddressInput,
    client: Client,
    scope: Scope,
) -> Result<MintWithMetadata, OperationError> {
    let commitment = input.options.commitment(client.config());
    let metadata_address = metadata_address(&input.address);
    let accounts = client
        .ledger()
        .get_multiple_accounts(&[input.address, metadata_address], commitment)
        .await?;

    let (mint, metadata) = pair(accounts)?;
    let mint: MintAccount = decode_required(&input.address, mint.as_ref())?;
    let metadata: MetadataAccount = decode_required(&metadata_address, metadata.as_ref())?;
    let mint = Mint::from_account(input.address, mint, &metadata.symbol);
    let metadata = Metadata::from_account(metadata_address, metadata);
    ensure_unchanged("mint", &mint.address, &metadata.mint)?;

    let metadata = with_json(&client, &scope, metadata, input.options).await?;
    Ok(MintWithMetadata { mint, metadata })
}

/// Metadata address -> metadata -> mint.
pub(crate) async fn find_mint_with_metadata_by_metadata(
    input: FindMintByMetadataInput,
    client: Client,
    scope: Scope,
) -> Result<MintWithMetadata, OperationError> {
    let commitment = input.options.commitment(client.config());
    let record = client.ledger().get_account(&input.metadata, commitment).await?;
    let metadata: MetadataAccount = decode_required(&input.metadata, record.as_ref())?;
    scope.throw_if_canceled()?;

    let mint_address = metadata.mint;
    let record = client.ledger().get_account(&mint_address, commitment).await?;
    let mint: MintAccount = decode_required(&mint_address, record.as_ref())?;
    let mint = Mint::from_account(mint_address, mint, &metadata.symbol);
    let metadata = Metadata::from_account(input.metadata, metadata);

    let metadata = with_json(&client, &scope, metadata, input.options).await?;
    Ok(MintWithMetadata { mint, metadata })
}

/// Token account address -> token account -> mint and metadata.
pub(crate) async fn find_token_with_metadata_by_address(
    input: FindTokenByAddressInput,
    client: Client,
    scope: Scope,
) -> Result<TokenWithMetadata, OperationError> {
    let commitment = input.options.commitment(client.config());
    let record = client.ledger().get_account(&input.address, commitment).await?;
    let token: TokenAccount = decode_required(&input.address, record.as_ref())?;
    scope.throw_if_canceled()?;

    let token = Token::from_account(input.address, token);
    let MintWithMetadata { mint, metadata } = client
        .run(
            FIND_MINT_WITH_METADATA_BY_ADDRESS.with(FindMintByAddressInput {
                address: token.mint,
                options: input.options,
            }),
            Some(&scope),
        )
        .await?;
    Ok(TokenWithMetadata {
        token,
        mint,
        metadata,
    })
}

/// Metadata address and owner -> metadata -> mint and the owner's
/// associated token account.
pub(crate) async fn find_token_with_metadata_by_metadata(
    input: FindTokenByMetadataInput,
    client: Client,
    scope: Scope,
) -> Result<TokenWithMetadata, OperationError> {
    let commitment = input.options.commitment(client.config());
    let record = client.ledger().get_account(&input.metadata, commitment).await?;
    let metadata: MetadataAccount = decode_required(&input.metadata, record.as_ref())?;
    scope.throw_if_canceled()?;

    let mint_address = metadata.mint;
    let token_address = associated_token_address(&mint_address, &input.owner);
    let accounts = client
        .ledger()
        .get_multiple_accounts(&[mint_address, token_address], commitment)
        .await?;
    let (mint, token) = pair(accounts)?;
    let mint: MintAccount = decode_required(&mint_address, mint.as_ref())?;
    let token: TokenAccount = decode_required(&token_address, token.as_ref())?;

    let mint = Mint::from_account(mint_address, mint, &metadata.symbol);
    let metadata = Metadata::from_account(input.metadata, metadata);
    let token = Token::from_account(token_address, token);
    ensure_unchanged("mint", &mint.address, &token.mint)?;

    let metadata = with_json(&client, &scope, metadata, input.options).await?;
    Ok(TokenWithMetadata {
        token,
        mint,
        metadata,
    })
}

/// Reads the document at `metadata.uri` from the client's storage.
///
/// A missing or malformed document is not an error: `json` stays `None`
/// and `json_loaded` is set either way.
pub(crate) async fn load_json_metadata(
    mut metadata: Metadata,
    client: Client,
    _scope: Scope,
) -> Result<Metadata, OperationError> {
    metadata.json_loaded = true;
    if metadata.uri.is_empty() {
        return Ok(metadata);
    }
    let parsed = match client.storage().read(&metadata.uri).await {
        Ok(file) => file.json::<JsonMetadata>(),
        Err(e) => Err(e),
    };
    match parsed {
        Ok(json) => metadata.json = Some(json),
        Err(error) => debug!(uri = %metadata.uri, %error, "json metadata unavailable"),
    }
    Ok(metadata)
}

fn pair(
    accounts: Vec<Option<AccountRecord>>,
) -> Result<(Option<AccountRecord>, Option<AccountRecord>), LedgerError> {
    let len = accounts.len();
    let mut accounts = accounts.into_iter();
    match (accounts.next(), accounts.next(), accounts.next()) {
        (Some(first), Some(second), None) => Ok((first, second)),
        _ => Err(LedgerError::Rpc(format!("expected 2 accounts, got {len}"))),
    }
}

async fn with_json(
    client: &Client,
    scope: &Scope,
    metadata: Metadata,
    options: FetchOptions,
) -> Result<Metadata, OperationError> {
    if !options.load_json_metadata(client.config()) {
        return Ok(metadata);
    }
    scope.throw_if_canceled()?;
    client
        .run(LOAD_JSON_METADATA.with(metadata), Some(scope))
        .await
}
