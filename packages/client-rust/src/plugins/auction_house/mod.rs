//! The `auction_house` plugin: auction houses, bids and listings.
//!
//! Bid and listing lookups hydrate through the nft operations, so this
//! plugin is normally installed next to [`NftPlugin`](crate::plugins::nft::NftPlugin).
//! Reach it through [`AuctionsExt::auctions`].

use std::sync::Arc;

use ledgerkit_core::Address;

use crate::client::{Client, Invocation};
use crate::config::FetchOptions;
use crate::error::OperationError;
use crate::plugin::{Capability, Installer, Plugin};

pub mod accounts;
pub mod instructions;
pub mod models;
pub mod operations;
pub mod simulator;

pub use accounts::{
    auction_house_address, bid_receipt_address, listing_receipt_address, trade_state_address,
    AuctionHouseAccount, BidReceiptAccount, ListingReceiptAccount, TradeSide, TradeStateAccount,
    TradeStateSeeds, AUCTION_HOUSE_PROGRAM,
};
pub use instructions::AuctionHouseInstruction;
pub use models::{
    AuctionHouse, Bid, BidAsset, BidTarget, LazyBid, LazyListing, Listing, MaybeLazyBid,
    MaybeLazyListing,
};
pub use operations::{
    is_missing, BidRequest, CreateAuctionHouseInput, CreateAuctionHouseOutput, CreateBidInput,
    CreateBidOutput, CreateListingInput, CreateListingOutput, FindAuctionHouseInput,
    FindBidByReceiptInput, FindBidByTradeStateInput, FindBidsInput, FindListingByReceiptInput,
    ListingRequest, LoadBidInput, LoadListingInput, CREATE_AUCTION_HOUSE, CREATE_BID,
    CREATE_LISTING, FIND_AUCTION_HOUSE_BY_ADDRESS, FIND_BIDS_BY_AUCTION_HOUSE,
    FIND_BID_BY_RECEIPT, FIND_BID_BY_TRADE_STATE, FIND_LISTING_BY_RECEIPT, LOAD_BID,
    LOAD_LISTING,
};
pub use simulator::AuctionHouseSimulator;

/// Name [`AuctionHouseCapability`] is attached under.
pub const AUCTIONS_CAPABILITY: &str = "auctions";

/// Installs the auction house operations for one program id.
#[derive(Debug, Clone, Copy)]
pub struct AuctionHousePlugin {
    program: Address,
}

impl AuctionHousePlugin {
    #[must_use]
    pub fn new(program: Address) -> Self {
        Self { program }
    }
}

impl Default for AuctionHousePlugin {
    fn default() -> Self {
        Self::new(AUCTION_HOUSE_PROGRAM)
    }
}

impl Plugin for AuctionHousePlugin {
    fn name(&self) -> &'static str {
        "auction_house"
    }

    fn install(&self, installer: &mut Installer<'_>) -> Result<(), OperationError> {
        use operations::*;

        let program = self.program;
        installer.register(CREATE_AUCTION_HOUSE, CreateAuctionHouseHandler { program })?;
        installer.register(
            FIND_AUCTION_HOUSE_BY_ADDRESS,
            FindAuctionHouseByAddressHandler { program },
        )?;
        installer.register(CREATE_BID, CreateBidHandler { program })?;
        installer.register(FIND_BID_BY_RECEIPT, FindBidByReceiptHandler)?;
        installer.register(FIND_BID_BY_TRADE_STATE, FindBidByTradeStateHandler { program })?;
        installer.register(
            FIND_BIDS_BY_AUCTION_HOUSE,
            FindBidsByAuctionHouseHandler { program },
        )?;
        installer.register(LOAD_BID, LoadBidHandler)?;
        installer.register(CREATE_LISTING, CreateListingHandler { program })?;
        installer.register(FIND_LISTING_BY_RECEIPT, FindListingByReceiptHandler)?;
        installer.register(LOAD_LISTING, LoadListingHandler)?;
        installer.provide(Arc::new(AuctionHouseCapability { program }));
        Ok(())
    }
}

/// Attached by [`AuctionHousePlugin`]; records the program id it serves.
#[derive(Debug)]
pub struct AuctionHouseCapability {
    program: Address,
}

impl AuctionHouseCapability {
    #[must_use]
    pub fn program(&self) -> Address {
        self.program
    }
}

impl Capability for AuctionHouseCapability {
    fn name(&self) -> &'static str {
        AUCTIONS_CAPABILITY
    }
}

// ---------------------------------------------------------------------------
// Facades
// ---------------------------------------------------------------------------

/// Entry point for auction house operations.
#[derive(Debug, Clone)]
pub struct AuctionsClient {
    client: Client,
    program: Address,
}

impl AuctionsClient {
    /// Program id the installed plugin targets.
    #[must_use]
    pub fn program(&self) -> Address {
        self.program
    }

    #[must_use]
    pub fn create_auction_house(
        &self,
        input: CreateAuctionHouseInput,
    ) -> Invocation<CreateAuctionHouseInput, CreateAuctionHouseOutput> {
        self.client.operation(CREATE_AUCTION_HOUSE.with(input))
    }

    #[must_use]
    pub fn find_auction_house_by_address(
        &self,
        address: Address,
        options: FetchOptions,
    ) -> Invocation<FindAuctionHouseInput, AuctionHouse> {
        self.client
            .operation(FIND_AUCTION_HOUSE_BY_ADDRESS.with(FindAuctionHouseInput { address, options }))
    }

    /// Operations scoped to one auction house.
    #[must_use]
    pub fn for_auction_house(&self, auction_house: AuctionHouse) -> AuctionHouseClient {
        AuctionHouseClient {
            client: self.client.clone(),
            auction_house,
        }
    }

    #[must_use]
    pub fn load_bid(&self, lazy: LazyBid, options: FetchOptions) -> Invocation<LoadBidInput, Bid> {
        self.client.operation(LOAD_BID.with(LoadBidInput { lazy, options }))
    }

    #[must_use]
    pub fn load_listing(
        &self,
        lazy: LazyListing,
        options: FetchOptions,
    ) -> Invocation<LoadListingInput, Listing> {
        self.client
            .operation(LOAD_LISTING.with(LoadListingInput { lazy, options }))
    }
}

/// Auction house operations bound to one [`AuctionHouse`].
#[derive(Debug, Clone)]
pub struct AuctionHouseClient {
    client: Client,
    auction_house: AuctionHouse,
}

impl AuctionHouseClient {
    #[must_use]
    pub fn auction_house(&self) -> &AuctionHouse {
        &self.auction_house
    }

    #[must_use]
    pub fn bid(&self, request: BidRequest) -> Invocation<CreateBidInput, CreateBidOutput> {
        self.client.operation(CREATE_BID.with(CreateBidInput {
            auction_house: self.auction_house.clone(),
            request,
        }))
    }

    #[must_use]
    pub fn find_bid_by_receipt(
        &self,
        receipt: Address,
        options: FetchOptions,
    ) -> Invocation<FindBidByReceiptInput, Bid> {
        self.client.operation(FIND_BID_BY_RECEIPT.with(FindBidByReceiptInput {
            receipt,
            auction_house: self.auction_house.clone(),
            options,
        }))
    }

    #[must_use]
    pub fn find_bid_by_trade_state(
        &self,
        trade_state: Address,
        options: FetchOptions,
    ) -> Invocation<FindBidByTradeStateInput, Bid> {
        self.client
            .operation(FIND_BID_BY_TRADE_STATE.with(FindBidByTradeStateInput {
                trade_state,
                auction_house: self.auction_house.clone(),
                options,
            }))
    }

    /// Bids on this auction house, optionally narrowed by buyer and nft.
    #[must_use]
    pub fn find_bids(
        &self,
        buyer: Option<Address>,
        metadata: Option<Address>,
    ) -> Invocation<FindBidsInput, Vec<LazyBid>> {
        self.client
            .operation(FIND_BIDS_BY_AUCTION_HOUSE.with(FindBidsInput {
                auction_house: self.auction_house.clone(),
                buyer,
                metadata,
                options: FetchOptions::default(),
            }))
    }

    #[must_use]
    pub fn list(&self, request: ListingRequest) -> Invocation<CreateListingInput, CreateListingOutput> {
        self.client.operation(CREATE_LISTING.with(CreateListingInput {
            auction_house: self.auction_house.clone(),
            request,
        }))
    }

    #[must_use]
    pub fn find_listing_by_receipt(
        &self,
        receipt: Address,
        options: FetchOptions,
    ) -> Invocation<FindListingByReceiptInput, Listing> {
        self.client
            .operation(FIND_LISTING_BY_RECEIPT.with(FindListingByReceiptInput {
                receipt,
                auction_house: self.auction_house.clone(),
                options,
            }))
    }
}

/// Adds [`auctions`](AuctionsExt::auctions) to [`Client`].
pub trait AuctionsExt {
    /// The auction house facade.
    ///
    /// # Errors
    ///
    /// [`OperationError::MissingCapability`] unless [`AuctionHousePlugin`]
    /// is installed.
    fn auctions(&self) -> Result<AuctionsClient, OperationError>;
}

impl AuctionsExt for Client {
    fn auctions(&self) -> Result<AuctionsClient, OperationError> {
        let capability =
            self.require_capability::<AuctionHouseCapability>(AUCTIONS_CAPABILITY)?;
        Ok(AuctionsClient {
            client: self.clone(),
            program: capability.program(),
        })
    }
}
