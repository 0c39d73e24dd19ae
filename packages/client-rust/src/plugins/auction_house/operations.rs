//! Auction house operations: creation, lookup and loading of auction houses,
//! bids and listings.

use async_trait::async_trait;
use ledgerkit_core::codec::{decode, decode_required};
use ledgerkit_core::{Address, Amount, Currency, LedgerError, Signature, Transaction};

use super::accounts::{
    auction_house_address, bid_receipt_address, listing_receipt_address,
    trade_state_address, treasury_address, AuctionHouseAccount, BidReceiptAccount,
    ListingReceiptAccount, TradeStateSeeds,
};
use super::instructions::AuctionHouseInstruction;
use super::models::{AuctionHouse, Bid, BidAsset, BidTarget, LazyBid, LazyListing, Listing};
use crate::client::Client;
use crate::config::FetchOptions;
use crate::error::OperationError;
use crate::operation::{ensure_unchanged, OperationDescriptor, OperationHandler, Scope};
use crate::plugins::nft::{
    associated_token_address, metadata_address, FindMintByAddressInput, FindMintByMetadataInput,
    FindTokenByAddressInput, FindTokenByMetadataInput, FIND_MINT_WITH_METADATA_BY_ADDRESS,
    FIND_MINT_WITH_METADATA_BY_METADATA, FIND_TOKEN_WITH_METADATA_BY_ADDRESS,
    FIND_TOKEN_WITH_METADATA_BY_METADATA, NATIVE_MINT,
};

// ---------------------------------------------------------------------------
// Descriptors
// ---------------------------------------------------------------------------

pub const CREATE_AUCTION_HOUSE: OperationDescriptor<CreateAuctionHouseInput, CreateAuctionHouseOutput> =
    OperationDescriptor::new("CreateAuctionHouse");
pub const FIND_AUCTION_HOUSE_BY_ADDRESS: OperationDescriptor<FindAuctionHouseInput, AuctionHouse> =
    OperationDescriptor::new("FindAuctionHouseByAddress");
pub const CREATE_BID: OperationDescriptor<CreateBidInput, CreateBidOutput> =
    OperationDescriptor::new("CreateBid");
pub const FIND_BID_BY_RECEIPT: OperationDescriptor<FindBidByReceiptInput, Bid> =
    OperationDescriptor::new("FindBidByReceipt");
pub const FIND_BID_BY_TRADE_STATE: OperationDescriptor<FindBidByTradeStateInput, Bid> =
    OperationDescriptor::new("FindBidByTradeState");
pub const FIND_BIDS_BY_AUCTION_HOUSE: OperationDescriptor<FindBidsInput, Vec<LazyBid>> =
    OperationDescriptor::new("FindBidsByAuctionHouse");
pub const LOAD_BID: OperationDescriptor<LoadBidInput, Bid> = OperationDescriptor::new("LoadBid");
pub const CREATE_LISTING: OperationDescriptor<CreateListingInput, CreateListingOutput> =
    OperationDescriptor::new("CreateListing");
pub const FIND_LISTING_BY_RECEIPT: OperationDescriptor<FindListingByReceiptInput, Listing> =
    OperationDescriptor::new("FindListingByReceipt");
pub const LOAD_LISTING: OperationDescriptor<LoadListingInput, Listing> =
    OperationDescriptor::new("LoadListing");

// ---------------------------------------------------------------------------
// Inputs and outputs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateAuctionHouseInput {
    /// Pays for and derives the auction house.
    pub creator: Address,
    /// Defaults to `creator`.
    pub authority: Option<Address>,
    /// Defaults to the native mint.
    pub treasury_mint: Option<Address>,
    pub seller_fee_basis_points: u16,
    pub requires_sign_off: bool,
    pub can_change_sale_price: bool,
    pub options: FetchOptions,
}

impl CreateAuctionHouseInput {
    #[must_use]
    pub fn new(creator: Address, seller_fee_basis_points: u16) -> Self {
        Self {
            creator,
            authority: None,
            treasury_mint: None,
            seller_fee_basis_points,
            requires_sign_off: false,
            can_change_sale_price: false,
            options: FetchOptions::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateAuctionHouseOutput {
    pub auction_house: AuctionHouse,
    pub signature: Signature,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindAuctionHouseInput {
    pub address: Address,
    pub options: FetchOptions,
}

/// Parameters of a new bid, independent of the auction house.
///
/// A bid is public unless a token account or a seller is given. With only
/// a seller, the seller's associated token account is targeted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BidRequest {
    pub buyer: Address,
    pub mint: Address,
    pub price: Amount,
    pub seller: Option<Address>,
    pub token_account: Option<Address>,
    /// Defaults to one token unit.
    pub tokens: Option<u64>,
    pub print_receipt: bool,
    pub options: FetchOptions,
}

impl BidRequest {
    #[must_use]
    pub fn new(buyer: Address, mint: Address, price: Amount) -> Self {
        Self {
            buyer,
            mint,
            price,
            seller: None,
            token_account: None,
            tokens: None,
            print_receipt: true,
            options: FetchOptions::default(),
        }
    }

    #[must_use]
    pub fn seller(mut self, seller: Address) -> Self {
        self.seller = Some(seller);
        self
    }

    #[must_use]
    pub fn token_account(mut self, token_account: Address) -> Self {
        self.token_account = Some(token_account);
        self
    }

    #[must_use]
    pub fn tokens(mut self, tokens: u64) -> Self {
        self.tokens = Some(tokens);
        self
    }

    #[must_use]
    pub fn without_receipt(mut self) -> Self {
        self.print_receipt = false;
        self
    }

    #[must_use]
    pub fn options(mut self, options: FetchOptions) -> Self {
        self.options = options;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateBidInput {
    pub auction_house: AuctionHouse,
    pub request: BidRequest,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateBidOutput {
    pub bid: Bid,
    pub buyer_trade_state: Address,
    pub receipt: Option<Address>,
    pub signature: Signature,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindBidByReceiptInput {
    pub receipt: Address,
    pub auction_house: AuctionHouse,
    pub options: FetchOptions,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindBidByTradeStateInput {
    pub trade_state: Address,
    pub auction_house: AuctionHouse,
    pub options: FetchOptions,
}

/// Scan filters; unset fields match every bid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindBidsInput {
    pub auction_house: AuctionHouse,
    pub buyer: Option<Address>,
    pub metadata: Option<Address>,
    pub options: FetchOptions,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadBidInput {
    pub lazy: LazyBid,
    pub options: FetchOptions,
}

/// Parameters of a new listing, independent of the auction house.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingRequest {
    pub seller: Address,
    pub mint: Address,
    pub price: Amount,
    /// Defaults to the seller's associated token account.
    pub token_account: Option<Address>,
    pub tokens: Option<u64>,
    pub print_receipt: bool,
    pub options: FetchOptions,
}

impl ListingRequest {
    #[must_use]
    pub fn new(seller: Address, mint: Address, price: Amount) -> Self {
        Self {
            seller,
            mint,
            price,
            token_account: None,
            tokens: None,
            print_receipt: true,
            options: FetchOptions::default(),
        }
    }

    #[must_use]
    pub fn tokens(mut self, tokens: u64) -> Self {
        self.tokens = Some(tokens);
        self
    }

    #[must_use]
    pub fn without_receipt(mut self) -> Self {
        self.print_receipt = false;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateListingInput {
    pub auction_house: AuctionHouse,
    pub request: ListingRequest,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateListingOutput {
    pub listing: Listing,
    pub seller_trade_state: Address,
    pub receipt: Option<Address>,
    pub signature: Signature,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindListingByReceiptInput {
    pub receipt: Address,
    pub auction_house: AuctionHouse,
    pub options: FetchOptions,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadListingInput {
    pub lazy: LazyListing,
    pub options: FetchOptions,
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

fn encode_instruction(
    program: Address,
    instruction: AuctionHouseInstruction,
) -> Result<ledgerkit_core::Instruction, OperationError> {
    instruction
        .into_instruction(program)
        .map_err(|e| OperationError::Other(e.into()))
}

fn check_price_currency(auction_house: &AuctionHouse, price: &Amount) -> Result<(), OperationError> {
    if price.currency == auction_house.treasury_currency {
        Ok(())
    } else {
        Err(OperationError::other(format!(
            "price is in {} but auction house [{}] trades in {}",
            price.currency.symbol, auction_house.address, auction_house.treasury_currency.symbol
        )))
    }
}

// ---------------------------------------------------------------------------
// Auction houses
// ---------------------------------------------------------------------------

pub(crate) struct CreateAuctionHouseHandler {
    pub(crate) program: Address,
}

#[async_trait]
impl OperationHandler<CreateAuctionHouseInput, CreateAuctionHouseOutput> for CreateAuctionHouseHandler {
    async fn handle(
        &self,
        input: CreateAuctionHouseInput,
        client: &Client,
        scope: &Scope,
    ) -> Result<CreateAuctionHouseOutput, OperationError> {
        let treasury_mint = input.treasury_mint.unwrap_or(NATIVE_MINT);
        let address = auction_house_address(&self.program, &input.creator, &treasury_mint);
        let instruction = encode_instruction(
            self.program,
            AuctionHouseInstruction::CreateAuctionHouse {
                creator: input.creator,
                authority: input.authority.unwrap_or(input.creator),
                treasury_mint,
                seller_fee_basis_points: input.seller_fee_basis_points,
                requires_sign_off: input.requires_sign_off,
                can_change_sale_price: input.can_change_sale_price,
            },
        )?;

        let commitment = input.options.commitment(client.config());
        let signature = client
            .ledger()
            .send_transaction(Transaction::new(input.creator).with(instruction), commitment)
            .await?;
        scope.throw_if_canceled()?;

        let auction_house = client
            .run(
                FIND_AUCTION_HOUSE_BY_ADDRESS.with(FindAuctionHouseInput {
                    address,
                    options: input.options,
                }),
                Some(scope),
            )
            .await?;
        Ok(CreateAuctionHouseOutput {
            auction_house,
            signature,
        })
    }
}

pub(crate) struct FindAuctionHouseByAddressHandler {
    pub(crate) program: Address,
}

#[async_trait]
impl OperationHandler<FindAuctionHouseInput, AuctionHouse> for FindAuctionHouseByAddressHandler {
    async fn handle(
        &self,
        input: FindAuctionHouseInput,
        client: &Client,
        scope: &Scope,
    ) -> Result<AuctionHouse, OperationError> {
        let commitment = input.options.commitment(client.config());
        let record = client.ledger().get_account(&input.address, commitment).await?;
        let account: AuctionHouseAccount = decode_required(&input.address, record.as_ref())?;
        ensure_unchanged(
            "treasury",
            &treasury_address(&self.program, &input.address),
            &account.treasury,
        )?;

        let currency = if account.treasury_mint == NATIVE_MINT {
            Currency::sol()
        } else {
            scope.throw_if_canceled()?;
            let mint = client
                .run(
                    FIND_MINT_WITH_METADATA_BY_ADDRESS.with(FindMintByAddressInput {
                        address: account.treasury_mint,
                        options: input.options.without_json(),
                    }),
                    Some(scope),
                )
                .await?;
            mint.mint.currency
        };
        Ok(AuctionHouse::from_account(input.address, account, currency))
    }
}

// ---------------------------------------------------------------------------
// Bids
// ---------------------------------------------------------------------------

pub(crate) struct CreateBidHandler {
    pub(crate) program: Address,
}

#[async_trait]
impl OperationHandler<CreateBidInput, CreateBidOutput> for CreateBidHandler {
    async fn handle(
        &self,
        input: CreateBidInput,
        client: &Client,
        scope: &Scope,
    ) -> Result<CreateBidOutput, OperationError> {
        let CreateBidInput {
            auction_house,
            request,
        } = input;
        check_price_currency(&auction_house, &request.price)?;

        let token_account = request.token_account.or_else(|| {
            request
                .seller
                .map(|seller| associated_token_address(&request.mint, &seller))
        });
        let tokens = request.tokens.unwrap_or(1);
        let metadata = metadata_address(&request.mint);
        let trade_state = trade_state_address(
            &self.program,
            &TradeStateSeeds {
                auction_house: &auction_house.address,
                wallet: &request.buyer,
                treasury_mint: &auction_house.treasury_mint,
                mint: &request.mint,
                token_account: token_account.as_ref(),
                price: request.price.basis_points,
                token_size: tokens,
            },
        );
        let receipt = request
            .print_receipt
            .then(|| bid_receipt_address(&self.program, &trade_state));

        let mut transaction = Transaction::new(request.buyer).with(encode_instruction(
            self.program,
            AuctionHouseInstruction::Buy {
                auction_house: auction_house.address,
                wallet: request.buyer,
                metadata,
                token_account,
                trade_state,
                price: request.price.basis_points,
                token_size: tokens,
            },
        )?);
        if let Some(receipt) = receipt {
            transaction = transaction.with(encode_instruction(
                self.program,
                AuctionHouseInstruction::PrintBidReceipt {
                    trade_state,
                    receipt,
                    bookkeeper: request.buyer,
                },
            )?);
        }

        let commitment = request.options.commitment(client.config());
        let signature = client.ledger().send_transaction(transaction, commitment).await?;
        scope.throw_if_canceled()?;

        let bid = if receipt.is_some() {
            client
                .run(
                    FIND_BID_BY_TRADE_STATE.with(FindBidByTradeStateInput {
                        trade_state,
                        auction_house,
                        options: request.options,
                    }),
                    Some(scope),
                )
                .await?
        } else {
            let lazy = LazyBid {
                price: request.price,
                auction_house,
                trade_state,
                bookkeeper: request.buyer,
                receipt: None,
                purchase_receipt: None,
                buyer: request.buyer,
                metadata,
                target: BidTarget::from_token_account(token_account),
                tokens,
                created_at: None,
                canceled_at: None,
            };
            client
                .run(
                    LOAD_BID.with(LoadBidInput {
                        lazy,
                        options: request.options,
                    }),
                    Some(scope),
                )
                .await?
        };

        Ok(CreateBidOutput {
            bid,
            buyer_trade_state: trade_state,
            receipt,
            signature,
        })
    }
}

pub(crate) struct FindBidByReceiptHandler;

#[async_trait]
impl OperationHandler<FindBidByReceiptInput, Bid> for FindBidByReceiptHandler {
    async fn handle(
        &self,
        input: FindBidByReceiptInput,
        client: &Client,
        scope: &Scope,
    ) -> Result<Bid, OperationError> {
        let commitment = input.options.commitment(client.config());
        let record = client.ledger().get_account(&input.receipt, commitment).await?;
        let account: BidReceiptAccount = decode_required(&input.receipt, record.as_ref())?;
        ensure_unchanged("auction_house", &input.auction_house.address, &account.auction_house)?;
        scope.throw_if_canceled()?;

        let lazy = LazyBid::from_receipt(input.receipt, account, input.auction_house);
        client
            .run(
                LOAD_BID.with(LoadBidInput {
                    lazy,
                    options: input.options,
                }),
                Some(scope),
            )
            .await
    }
}

pub(crate) struct FindBidByTradeStateHandler {
    pub(crate) program: Address,
}

#[async_trait]
impl OperationHandler<FindBidByTradeStateInput, Bid> for FindBidByTradeStateHandler {
    async fn handle(
        &self,
        input: FindBidByTradeStateInput,
        client: &Client,
        scope: &Scope,
    ) -> Result<Bid, OperationError> {
        let receipt = bid_receipt_address(&self.program, &input.trade_state);
        client
            .run(
                FIND_BID_BY_RECEIPT.with(FindBidByReceiptInput {
                    receipt,
                    auction_house: input.auction_house,
                    options: input.options,
                }),
                Some(scope),
            )
            .await
    }
}

pub(crate) struct FindBidsByAuctionHouseHandler {
    pub(crate) program: Address,
}

#[async_trait]
impl OperationHandler<FindBidsInput, Vec<LazyBid>> for FindBidsByAuctionHouseHandler {
    async fn handle(
        &self,
        input: FindBidsInput,
        client: &Client,
        _scope: &Scope,
    ) -> Result<Vec<LazyBid>, OperationError> {
        use ledgerkit_core::AccountType;

        let commitment = input.options.commitment(client.config());
        let records = client
            .ledger()
            .get_program_accounts(&self.program, &[BidReceiptAccount::filter()], commitment)
            .await?;

        let mut bids = Vec::new();
        for record in &records {
            let account: BidReceiptAccount = decode(record)?;
            let matches = account.auction_house == input.auction_house.address
                && input.buyer.map_or(true, |buyer| account.buyer == buyer)
                && input.metadata.map_or(true, |metadata| account.metadata == metadata);
            if matches {
                bids.push(LazyBid::from_receipt(
                    record.address,
                    account,
                    input.auction_house.clone(),
                ));
            }
        }
        Ok(bids)
    }
}

/// Turns a [`LazyBid`] into a [`Bid`].
///
/// The branch is chosen by the lazy bid's target alone: a private bid loads
/// its token account by address, a public bid loads its mint through the
/// metadata. Exactly one branch runs.
pub(crate) struct LoadBidHandler;

#[async_trait]
impl OperationHandler<LoadBidInput, Bid> for LoadBidHandler {
    async fn handle(
        &self,
        input: LoadBidInput,
        client: &Client,
        scope: &Scope,
    ) -> Result<Bid, OperationError> {
        let LoadBidInput { lazy, options } = input;

        let (asset, tokens) = match lazy.target {
            BidTarget::Private { token_address } => {
                let token = client
                    .run(
                        FIND_TOKEN_WITH_METADATA_BY_ADDRESS.with(FindTokenByAddressInput {
                            address: token_address,
                            options,
                        }),
                        Some(scope),
                    )
                    .await?;
                ensure_unchanged("token_address", &token_address, &token.token.address)?;
                ensure_unchanged("metadata", &lazy.metadata, &token.metadata.address)?;
                let tokens = token.mint.amount(lazy.tokens);
                (BidAsset::Token(token), tokens)
            }
            BidTarget::Public => {
                let mint = client
                    .run(
                        FIND_MINT_WITH_METADATA_BY_METADATA.with(FindMintByMetadataInput {
                            metadata: lazy.metadata,
                            options,
                        }),
                        Some(scope),
                    )
                    .await?;
                ensure_unchanged("metadata", &lazy.metadata, &mint.metadata.address)?;
                let tokens = mint.mint.amount(lazy.tokens);
                (BidAsset::Mint(mint), tokens)
            }
        };

        scope.throw_if_canceled()?;
        Ok(Bid::from_lazy(lazy, asset, tokens))
    }
}

// ---------------------------------------------------------------------------
// Listings
// ---------------------------------------------------------------------------

pub(crate) struct CreateListingHandler {
    pub(crate) program: Address,
}

#[async_trait]
impl OperationHandler<CreateListingInput, CreateListingOutput> for CreateListingHandler {
    async fn handle(
        &self,
        input: CreateListingInput,
        client: &Client,
        scope: &Scope,
    ) -> Result<CreateListingOutput, OperationError> {
        let CreateListingInput {
            auction_house,
            request,
        } = input;
        check_price_currency(&auction_house, &request.price)?;

        let token_account = request
            .token_account
            .unwrap_or_else(|| associated_token_address(&request.mint, &request.seller));
        let tokens = request.tokens.unwrap_or(1);
        let metadata = metadata_address(&request.mint);
        let trade_state = trade_state_address(
            &self.program,
            &TradeStateSeeds {
                auction_house: &auction_house.address,
                wallet: &request.seller,
                treasury_mint: &auction_house.treasury_mint,
                mint: &request.mint,
                token_account: Some(&token_account),
                price: request.price.basis_points,
                token_size: tokens,
            },
        );
        let receipt = request
            .print_receipt
            .then(|| listing_receipt_address(&self.program, &trade_state));

        let mut transaction = Transaction::new(request.seller).with(encode_instruction(
            self.program,
            AuctionHouseInstruction::Sell {
                auction_house: auction_house.address,
                wallet: request.seller,
                metadata,
                token_account,
                trade_state,
                price: request.price.basis_points,
                token_size: tokens,
            },
        )?);
        if let Some(receipt) = receipt {
            transaction = transaction.with(encode_instruction(
                self.program,
                AuctionHouseInstruction::PrintListingReceipt {
                    trade_state,
                    receipt,
                    bookkeeper: request.seller,
                },
            )?);
        }

        let commitment = request.options.commitment(client.config());
        let signature = client.ledger().send_transaction(transaction, commitment).await?;
        scope.throw_if_canceled()?;

        let listing = match receipt {
            Some(receipt) => {
                client
                    .run(
                        FIND_LISTING_BY_RECEIPT.with(FindListingByReceiptInput {
                            receipt,
                            auction_house,
                            options: request.options,
                        }),
                        Some(scope),
                    )
                    .await?
            }
            None => {
                let lazy = LazyListing {
                    price: request.price,
                    auction_house,
                    trade_state,
                    bookkeeper: request.seller,
                    receipt: None,
                    purchase_receipt: None,
                    seller: request.seller,
                    metadata,
                    tokens,
                    created_at: None,
                    canceled_at: None,
                };
                client
                    .run(
                        LOAD_LISTING.with(LoadListingInput {
                            lazy,
                            options: request.options,
                        }),
                        Some(scope),
                    )
                    .await?
            }
        };

        Ok(CreateListingOutput {
            listing,
            seller_trade_state: trade_state,
            receipt,
            signature,
        })
    }
}

pub(crate) struct FindListingByReceiptHandler;

#[async_trait]
impl OperationHandler<FindListingByReceiptInput, Listing> for FindListingByReceiptHandler {
    async fn handle(
        &self,
        input: FindListingByReceiptInput,
        client: &Client,
        scope: &Scope,
    ) -> Result<Listing, OperationError> {
        let commitment = input.options.commitment(client.config());
        let record = client.ledger().get_account(&input.receipt, commitment).await?;
        let account: ListingReceiptAccount = decode_required(&input.receipt, record.as_ref())?;
        ensure_unchanged("auction_house", &input.auction_house.address, &account.auction_house)?;
        scope.throw_if_canceled()?;

        let lazy = LazyListing::from_receipt(input.receipt, account, input.auction_house);
        client
            .run(
                LOAD_LISTING.with(LoadListingInput {
                    lazy,
                    options: input.options,
                }),
                Some(scope),
            )
            .await
    }
}

/// Turns a [`LazyListing`] into a [`Listing`] by loading the seller's token.
pub(crate) struct LoadListingHandler;

#[async_trait]
impl OperationHandler<LoadListingInput, Listing> for LoadListingHandler {
    async fn handle(
        &self,
        input: LoadListingInput,
        client: &Client,
        scope: &Scope,
    ) -> Result<Listing, OperationError> {
        let LoadListingInput { lazy, options } = input;
        let token = client
            .run(
                FIND_TOKEN_WITH_METADATA_BY_METADATA.with(FindTokenByMetadataInput {
                    metadata: lazy.metadata,
                    owner: lazy.seller,
                    options,
                }),
                Some(scope),
            )
            .await?;
        ensure_unchanged("metadata", &lazy.metadata, &token.metadata.address)?;
        ensure_unchanged("seller", &lazy.seller, &token.token.owner)?;

        scope.throw_if_canceled()?;
        let tokens = token.mint.amount(lazy.tokens);
        Ok(Listing::from_lazy(lazy, token, tokens))
    }
}

/// Whether `error` is the ledger reporting a missing account of type `T`.
#[must_use]
pub fn is_missing<T: ledgerkit_core::AccountType>(error: &OperationError) -> bool {
    matches!(
        error.primary(),
        OperationError::Ledger(LedgerError::AccountNotFound { account_type, .. })
            if *account_type == T::NAME
    )
}
