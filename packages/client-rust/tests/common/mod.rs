//! Shared fixtures for the integration tests: an in-memory ledger running the
//! auction house simulator, and helpers seeding nft accounts.

#![allow(dead_code)]

use std::sync::Arc;

use ledgerkit_client::plugins::auction_house::{AuctionHouseSimulator, AuctionHousePlugin};
use ledgerkit_client::plugins::nft::{
    associated_token_address, metadata_address, MetadataAccount, MintAccount, NftPlugin,
    TokenAccount, METADATA_PROGRAM, TOKEN_PROGRAM,
};
use ledgerkit_client::{Client, MemoryDriver};
use ledgerkit_core::{Address, InMemoryLedger};

pub const CREATOR: Address = Address::new([1; 32]);
pub const BUYER: Address = Address::new([2; 32]);
pub const SELLER: Address = Address::new([3; 32]);

/// Addresses of one seeded nft.
#[derive(Debug, Clone, Copy)]
pub struct Nft {
    pub mint: Address,
    pub metadata: Address,
    pub owner: Address,
    pub token: Address,
}

/// Ledger with the auction house simulator installed.
pub fn ledger() -> Arc<InMemoryLedger> {
    let ledger = Arc::new(InMemoryLedger::new());
    ledger.set_processor(Arc::new(AuctionHouseSimulator::default()));
    ledger
}

/// Client with both built-in plugins over `ledger` and `storage`.
pub fn client(ledger: &Arc<InMemoryLedger>, storage: &Arc<MemoryDriver>) -> Client {
    Client::builder(ledger.clone())
        .storage(storage.clone())
        .plugin(NftPlugin)
        .plugin(AuctionHousePlugin::default())
        .build()
        .expect("built-in plugins install")
}

/// Writes a one-of-one mint, its metadata pointing at `uri` and `owner`'s
/// associated token account.
pub fn seed_nft(ledger: &InMemoryLedger, seed: u8, owner: Address, uri: &str) -> Nft {
    let mint = Address::new([seed; 32]);
    let metadata = metadata_address(&mint);
    let token = associated_token_address(&mint, &owner);
    ledger
        .put_typed(
            mint,
            TOKEN_PROGRAM,
            &MintAccount {
                decimals: 0,
                supply: 1,
                mint_authority: Some(owner),
            },
        )
        .expect("mint encodes");
    ledger
        .put_typed(
            metadata,
            METADATA_PROGRAM,
            &MetadataAccount {
                mint,
                update_authority: owner,
                name: format!("Nft #{seed}"),
                symbol: "NFT".to_string(),
                uri: uri.to_string(),
                seller_fee_basis_points: 500,
            },
        )
        .expect("metadata encodes");
    ledger
        .put_typed(
            token,
            TOKEN_PROGRAM,
            &TokenAccount {
                mint,
                owner,
                amount: 1,
            },
        )
        .expect("token encodes");
    Nft {
        mint,
        metadata,
        owner,
        token,
    }
}
