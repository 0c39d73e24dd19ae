//! Auction house, bid and listing models.
//!
//! Bids and listings come in two forms. The lazy forms ([`LazyBid`],
//! [`LazyListing`]) are decoded straight from receipts and carry addresses
//! only. The full forms ([`Bid`], [`Listing`]) repeat every lazy field and
//! add the resolved nft they trade.

use ledgerkit_core::{Address, Amount, Currency};

use super::accounts::{AuctionHouseAccount, BidReceiptAccount, ListingReceiptAccount};
use crate::operation::Hydration;
use crate::plugins::nft::{MintWithMetadata, TokenWithMetadata, NATIVE_MINT};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuctionHouse {
    pub address: Address,
    pub creator: Address,
    pub authority: Address,
    pub treasury_mint: Address,
    pub treasury: Address,
    pub fee_account: Address,
    pub seller_fee_basis_points: u16,
    pub requires_sign_off: bool,
    pub can_change_sale_price: bool,
    /// Currency prices on this auction house are denominated in.
    pub treasury_currency: Currency,
}

impl AuctionHouse {
    pub(crate) fn from_account(
        address: Address,
        account: AuctionHouseAccount,
        treasury_currency: Currency,
    ) -> Self {
        Self {
            address,
            creator: account.creator,
            authority: account.authority,
            treasury_mint: account.treasury_mint,
            treasury: account.treasury,
            fee_account: account.fee_account,
            seller_fee_basis_points: account.seller_fee_basis_points,
            requires_sign_off: account.requires_sign_off,
            can_change_sale_price: account.can_change_sale_price,
            treasury_currency,
        }
    }

    /// Whether prices are paid in the native currency.
    #[must_use]
    pub fn is_native(&self) -> bool {
        self.treasury_mint == NATIVE_MINT
    }

    /// `basis_points` of the treasury currency.
    #[must_use]
    pub fn price(&self, basis_points: u64) -> Amount {
        Amount::new(basis_points, self.treasury_currency.clone())
    }
}

// ---------------------------------------------------------------------------
// Bids
// ---------------------------------------------------------------------------

/// What a bid is placed on, as recorded in its receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BidTarget {
    /// A specific token account.
    Private { token_address: Address },
    /// Any holder of the mint.
    Public,
}

impl BidTarget {
    pub(crate) fn from_token_account(token_account: Option<Address>) -> Self {
        token_account.map_or(Self::Public, |token_address| Self::Private { token_address })
    }

    #[must_use]
    pub fn token_address(&self) -> Option<Address> {
        match self {
            Self::Private { token_address } => Some(*token_address),
            Self::Public => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LazyBid {
    pub auction_house: AuctionHouse,
    pub trade_state: Address,
    pub bookkeeper: Address,
    /// `None` when the bid was placed without printing a receipt.
    pub receipt: Option<Address>,
    pub purchase_receipt: Option<Address>,
    pub buyer: Address,
    pub metadata: Address,
    pub target: BidTarget,
    pub price: Amount,
    /// Token units bid on, in the nft mint's smallest unit.
    pub tokens: u64,
    pub created_at: Option<i64>,
    pub canceled_at: Option<i64>,
}

impl LazyBid {
    pub(crate) fn from_receipt(
        receipt: Address,
        account: BidReceiptAccount,
        auction_house: AuctionHouse,
    ) -> Self {
        let price = auction_house.price(account.price);
        Self {
            auction_house,
            trade_state: account.trade_state,
            bookkeeper: account.bookkeeper,
            receipt: Some(receipt),
            purchase_receipt: account.purchase_receipt,
            buyer: account.buyer,
            metadata: account.metadata,
            target: BidTarget::from_token_account(account.token_account),
            price,
            tokens: account.token_size,
            created_at: Some(account.created_at),
            canceled_at: account.canceled_at,
        }
    }

    #[must_use]
    pub fn is_public(&self) -> bool {
        self.target == BidTarget::Public
    }
}

/// The nft a loaded bid is placed on.
#[derive(Debug, Clone, PartialEq)]
pub enum BidAsset {
    /// Private bid: the targeted token account.
    Token(TokenWithMetadata),
    /// Public bid: the mint.
    Mint(MintWithMetadata),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bid {
    pub auction_house: AuctionHouse,
    pub trade_state: Address,
    pub bookkeeper: Address,
    pub receipt: Option<Address>,
    pub purchase_receipt: Option<Address>,
    pub buyer: Address,
    pub metadata: Address,
    pub target: BidTarget,
    pub price: Amount,
    pub created_at: Option<i64>,
    pub canceled_at: Option<i64>,
    pub asset: BidAsset,
    /// Token units bid on, in the nft's currency.
    pub tokens: Amount,
}

impl Bid {
    /// Extends `lazy` with the loaded asset. Every lazy field is kept as is.
    pub(crate) fn from_lazy(lazy: LazyBid, asset: BidAsset, tokens: Amount) -> Self {
        Self {
            auction_house: lazy.auction_house,
            trade_state: lazy.trade_state,
            bookkeeper: lazy.bookkeeper,
            receipt: lazy.receipt,
            purchase_receipt: lazy.purchase_receipt,
            buyer: lazy.buyer,
            metadata: lazy.metadata,
            target: lazy.target,
            price: lazy.price,
            created_at: lazy.created_at,
            canceled_at: lazy.canceled_at,
            asset,
            tokens,
        }
    }

    #[must_use]
    pub fn is_public(&self) -> bool {
        matches!(self.asset, BidAsset::Mint(_))
    }

    #[must_use]
    pub fn token(&self) -> Option<&TokenWithMetadata> {
        match &self.asset {
            BidAsset::Token(token) => Some(token),
            BidAsset::Mint(_) => None,
        }
    }

    #[must_use]
    pub fn mint(&self) -> Option<&MintWithMetadata> {
        match &self.asset {
            BidAsset::Mint(mint) => Some(mint),
            BidAsset::Token(_) => None,
        }
    }

    /// Address of the nft mint, whichever branch loaded it.
    #[must_use]
    pub fn mint_address(&self) -> Address {
        match &self.asset {
            BidAsset::Token(token) => token.mint.address,
            BidAsset::Mint(mint) => mint.mint.address,
        }
    }
}

/// A bid in either form.
pub type MaybeLazyBid = Hydration<LazyBid, Bid>;

// ---------------------------------------------------------------------------
// Listings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LazyListing {
    pub auction_house: AuctionHouse,
    pub trade_state: Address,
    pub bookkeeper: Address,
    pub receipt: Option<Address>,
    pub purchase_receipt: Option<Address>,
    pub seller: Address,
    pub metadata: Address,
    pub price: Amount,
    pub tokens: u64,
    pub created_at: Option<i64>,
    pub canceled_at: Option<i64>,
}

impl LazyListing {
    pub(crate) fn from_receipt(
        receipt: Address,
        account: ListingReceiptAccount,
        auction_house: AuctionHouse,
    ) -> Self {
        let price = auction_house.price(account.price);
        Self {
            auction_house,
            trade_state: account.trade_state,
            bookkeeper: account.bookkeeper,
            receipt: Some(receipt),
            purchase_receipt: account.purchase_receipt,
            seller: account.seller,
            metadata: account.metadata,
            price,
            tokens: account.token_size,
            created_at: Some(account.created_at),
            canceled_at: account.canceled_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Listing {
    pub auction_house: AuctionHouse,
    pub trade_state: Address,
    pub bookkeeper: Address,
    pub receipt: Option<Address>,
    pub purchase_receipt: Option<Address>,
    pub seller: Address,
    pub metadata: Address,
    pub price: Amount,
    pub created_at: Option<i64>,
    pub canceled_at: Option<i64>,
    /// The seller's token account for the listed nft.
    pub token: TokenWithMetadata,
    pub tokens: Amount,
}

impl Listing {
    pub(crate) fn from_lazy(lazy: LazyListing, token: TokenWithMetadata, tokens: Amount) -> Self {
        Self {
            auction_house: lazy.auction_house,
            trade_state: lazy.trade_state,
            bookkeeper: lazy.bookkeeper,
            receipt: lazy.receipt,
            purchase_receipt: lazy.purchase_receipt,
            seller: lazy.seller,
            metadata: lazy.metadata,
            price: lazy.price,
            created_at: lazy.created_at,
            canceled_at: lazy.canceled_at,
            token,
            tokens,
        }
    }
}

/// A listing in either form.
pub type MaybeLazyListing = Hydration<LazyListing, Listing>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bid_target_follows_token_account() {
        let token = Address::new([7; 32]);
        assert_eq!(BidTarget::from_token_account(None), BidTarget::Public);
        let private = BidTarget::from_token_account(Some(token));
        assert_eq!(private.token_address(), Some(token));
    }

    #[test]
    fn native_auction_house_prices_in_sol() {
        let account = AuctionHouseAccount {
            creator: Address::new([1; 32]),
            authority: Address::new([1; 32]),
            treasury_mint: NATIVE_MINT,
            treasury: Address::new([2; 32]),
            fee_account: Address::new([3; 32]),
            seller_fee_basis_points: 200,
            requires_sign_off: false,
            can_change_sale_price: false,
        };
        let house = AuctionHouse::from_account(Address::new([4; 32]), account, Currency::sol());
        assert!(house.is_native());
        assert_eq!(house.price(1_500_000_000), ledgerkit_core::sol(1.5));
    }
}
