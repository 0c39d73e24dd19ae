//! Client-side models assembled from nft accounts.

use ledgerkit_core::{Address, Amount, Currency};
use serde::{Deserialize, Serialize};

use super::accounts::{MetadataAccount, MintAccount, TokenAccount};

/// Off-ledger JSON document referenced by a metadata `uri`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JsonMetadata {
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mint {
    pub address: Address,
    pub decimals: u8,
    pub supply: u64,
    pub mint_authority: Option<Address>,
    /// Unit of amounts of this mint; the symbol comes from its metadata.
    pub currency: Currency,
}

impl Mint {
    pub(crate) fn from_account(address: Address, account: MintAccount, symbol: &str) -> Self {
        let symbol = if symbol.is_empty() { "Token" } else { symbol };
        Self {
            address,
            decimals: account.decimals,
            supply: account.supply,
            mint_authority: account.mint_authority,
            currency: Currency {
                symbol: symbol.to_string(),
                decimals: account.decimals,
            },
        }
    }

    /// `basis_points` of this mint as an [`Amount`].
    #[must_use]
    pub fn amount(&self, basis_points: u64) -> Amount {
        Amount::new(basis_points, self.currency.clone())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Metadata {
    pub address: Address,
    pub mint: Address,
    pub update_authority: Address,
    pub name: String,
    pub symbol: String,
    pub uri: String,
    pub seller_fee_basis_points: u16,
    /// The document at `uri`, when loaded and valid.
    pub json: Option<JsonMetadata>,
    /// Whether loading `json` was attempted.
    pub json_loaded: bool,
}

impl Metadata {
    pub(crate) fn from_account(address: Address, account: MetadataAccount) -> Self {
        Self {
            address,
            mint: account.mint,
            update_authority: account.update_authority,
            name: account.name,
            symbol: account.symbol,
            uri: account.uri,
            seller_fee_basis_points: account.seller_fee_basis_points,
            json: None,
            json_loaded: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub address: Address,
    pub mint: Address,
    pub owner: Address,
    pub amount: u64,
}

impl Token {
    pub(crate) fn from_account(address: Address, account: TokenAccount) -> Self {
        Self {
            address,
            mint: account.mint,
            owner: account.owner,
            amount: account.amount,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MintWithMetadata {
    pub mint: Mint,
    pub metadata: Metadata,
}

impl MintWithMetadata {
    #[must_use]
    pub fn address(&self) -> Address {
        self.mint.address
    }

    #[must_use]
    pub fn currency(&self) -> &Currency {
        &self.mint.currency
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TokenWithMetadata {
    pub token: Token,
    pub mint: Mint,
    pub metadata: Metadata,
}

impl TokenWithMetadata {
    #[must_use]
    pub fn address(&self) -> Address {
        self.token.address
    }

    /// Tokens held, in the mint's currency.
    #[must_use]
    pub fn amount(&self) -> Amount {
        self.mint.amount(self.token.amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mint_currency_uses_metadata_symbol() {
        let account = MintAccount {
            decimals: 0,
            supply: 1,
            mint_authority: None,
        };
        let mint = Mint::from_account(Address::new([1; 32]), account.clone(), "SUN");
        assert_eq!(mint.currency.symbol, "SUN");
        assert_eq!(mint.amount(1).to_string(), "1 SUN");

        let anonymous = Mint::from_account(Address::new([1; 32]), account, "");
        assert_eq!(anonymous.currency, Currency::token());
    }

    #[test]
    fn json_metadata_keeps_unknown_fields() {
        let json: JsonMetadata =
            serde_json::from_str(r#"{"name":"Sunrise","attributes":[{"trait":"sky"}]}"#).unwrap();
        assert_eq!(json.name.as_deref(), Some("Sunrise"));
        assert!(json.extra.contains_key("attributes"));
    }
}
