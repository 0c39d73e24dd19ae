//! On-ledger layouts and address derivations of the auction house program.

use ledgerkit_core::{AccountType, Address};
use serde::{Deserialize, Serialize};

pub const AUCTION_HOUSE_PROGRAM: Address = Address::from_label(b"auction-house-program");

const PREFIX: &[u8] = b"auction_house";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionHouseAccount {
    pub creator: Address,
    pub authority: Address,
    pub treasury_mint: Address,
    pub treasury: Address,
    pub fee_account: Address,
    pub seller_fee_basis_points: u16,
    pub requires_sign_off: bool,
    pub can_change_sale_price: bool,
}

impl AccountType for AuctionHouseAccount {
    const NAME: &'static str = "AuctionHouse";
}

/// Which side of a trade a trade state records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeSide {
    Bid,
    Ask,
}

/// Marker written for every open bid or listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeStateAccount {
    pub side: TradeSide,
    pub auction_house: Address,
    pub wallet: Address,
    pub metadata: Address,
    pub token_account: Option<Address>,
    pub price: u64,
    pub token_size: u64,
}

impl AccountType for TradeStateAccount {
    const NAME: &'static str = "TradeState";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidReceiptAccount {
    pub trade_state: Address,
    pub bookkeeper: Address,
    pub auction_house: Address,
    pub buyer: Address,
    pub metadata: Address,
    pub token_account: Option<Address>,
    pub purchase_receipt: Option<Address>,
    pub price: u64,
    pub token_size: u64,
    pub created_at: i64,
    pub canceled_at: Option<i64>,
}

impl AccountType for BidReceiptAccount {
    const NAME: &'static str = "BidReceipt";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingReceiptAccount {
    pub trade_state: Address,
    pub bookkeeper: Address,
    pub auction_house: Address,
    pub seller: Address,
    pub metadata: Address,
    pub purchase_receipt: Option<Address>,
    pub price: u64,
    pub token_size: u64,
    pub created_at: i64,
    pub canceled_at: Option<i64>,
}

impl AccountType for ListingReceiptAccount {
    const NAME: &'static str = "ListingReceipt";
}

#[must_use]
pub fn auction_house_address(program: &Address, creator: &Address, treasury_mint: &Address) -> Address {
    Address::derive(program, &[PREFIX, creator.as_bytes(), treasury_mint.as_bytes()])
}

#[must_use]
pub fn treasury_address(program: &Address, auction_house: &Address) -> Address {
    Address::derive(program, &[PREFIX, auction_house.as_bytes(), b"treasury"])
}

#[must_use]
pub fn fee_account_address(program: &Address, auction_house: &Address) -> Address {
    Address::derive(program, &[PREFIX, auction_house.as_bytes(), b"fee_payer"])
}

/// Seeds identifying one trade state.
#[derive(Debug, Clone, Copy)]
pub struct TradeStateSeeds<'a> {
    pub auction_house: &'a Address,
    pub wallet: &'a Address,
    pub treasury_mint: &'a Address,
    pub mint: &'a Address,
    /// `None` for public bids.
    pub token_account: Option<&'a Address>,
    pub price: u64,
    pub token_size: u64,
}

#[must_use]
pub fn trade_state_address(program: &Address, seeds: &TradeStateSeeds<'_>) -> Address {
    let price = seeds.price.to_le_bytes();
    let size = seeds.token_size.to_le_bytes();
    let token_account: &[u8] = match seeds.token_account {
        Some(account) => account.as_bytes(),
        None => &[],
    };
    Address::derive(
        program,
        &[
            PREFIX,
            seeds.wallet.as_bytes(),
            seeds.auction_house.as_bytes(),
            token_account,
            seeds.treasury_mint.as_bytes(),
            seeds.mint.as_bytes(),
            &price,
            &size,
        ],
    )
}

#[must_use]
pub fn bid_receipt_address(program: &Address, trade_state: &Address) -> Address {
    Address::derive(program, &[b"bid_receipt", trade_state.as_bytes()])
}

#[must_use]
pub fn listing_receipt_address(program: &Address, trade_state: &Address) -> Address {
    Address::derive(program, &[b"listing_receipt", trade_state.as_bytes()])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_and_private_trade_states_differ() {
        let ah = Address::new([1; 32]);
        let wallet = Address::new([2; 32]);
        let mint = Address::new([3; 32]);
        let token = Address::new([4; 32]);
        let seeds = TradeStateSeeds {
            auction_house: &ah,
            wallet: &wallet,
            treasury_mint: &mint,
            mint: &mint,
            token_account: None,
            price: 10,
            token_size: 1,
        };
        let public = trade_state_address(&AUCTION_HOUSE_PROGRAM, &seeds);
        let private = trade_state_address(
            &AUCTION_HOUSE_PROGRAM,
            &TradeStateSeeds {
                token_account: Some(&token),
                ..seeds
            },
        );
        assert_ne!(public, private);
        assert_ne!(
            bid_receipt_address(&AUCTION_HOUSE_PROGRAM, &public),
            listing_receipt_address(&AUCTION_HOUSE_PROGRAM, &public)
        );
    }
}
