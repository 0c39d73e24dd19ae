//! On-ledger layouts and address derivations for token and metadata accounts.

use ledgerkit_core::{AccountType, Address};
use serde::{Deserialize, Serialize};

/// Program owning mints and token accounts.
pub const TOKEN_PROGRAM: Address = Address::from_label(b"token-program");
/// Program deriving the canonical token account of an owner.
pub const ASSOCIATED_TOKEN_PROGRAM: Address = Address::from_label(b"associated-token-program");
/// Program owning metadata accounts.
pub const METADATA_PROGRAM: Address = Address::from_label(b"token-metadata-program");
/// Mint standing for the native currency.
pub const NATIVE_MINT: Address = Address::from_label(b"native-mint");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintAccount {
    pub decimals: u8,
    pub supply: u64,
    pub mint_authority: Option<Address>,
}

impl AccountType for MintAccount {
    const NAME: &'static str = "Mint";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataAccount {
    pub mint: Address,
    pub update_authority: Address,
    pub name: String,
    pub symbol: String,
    pub uri: String,
    pub seller_fee_basis_points: u16,
}

impl AccountType for MetadataAccount {
    const NAME: &'static str = "Metadata";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenAccount {
    pub mint: Address,
    pub owner: Address,
    pub amount: u64,
}

impl AccountType for TokenAccount {
    const NAME: &'static str = "TokenAccount";
}

/// Address of the metadata account attached to `mint`.
#[must_use]
pub fn metadata_address(mint: &Address) -> Address {
    Address::derive(
        &METADATA_PROGRAM,
        &[b"metadata", METADATA_PROGRAM.as_bytes(), mint.as_bytes()],
    )
}

/// Address of `owner`'s associated token account for `mint`.
#[must_use]
pub fn associated_token_address(mint: &Address, owner: &Address) -> Address {
    Address::derive(
        &ASSOCIATED_TOKEN_PROGRAM,
        &[owner.as_bytes(), TOKEN_PROGRAM.as_bytes(), mint.as_bytes()],
    )
}
