//! Local execution of auction house instructions against an [`InMemoryLedger`].
//!
//! Writes of one transaction are staged and applied only after every
//! instruction succeeded, so a rejected transaction leaves the ledger
//! untouched. Instructions for other programs are ignored.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use ledgerkit_core::codec::{self, decode_required};
use ledgerkit_core::{
    AccountRecord, AccountType, Address, InMemoryLedger, LedgerError, Transaction,
    TransactionProcessor,
};
use tracing::debug;

use super::accounts::{
    auction_house_address, bid_receipt_address, fee_account_address, listing_receipt_address,
    treasury_address, AuctionHouseAccount, BidReceiptAccount, ListingReceiptAccount, TradeSide,
    TradeStateAccount, AUCTION_HOUSE_PROGRAM,
};
use super::instructions::AuctionHouseInstruction;

/// First timestamp handed out to receipts.
const GENESIS: i64 = 1_700_000_000;

/// [`TransactionProcessor`] implementing the auction house program.
pub struct AuctionHouseSimulator {
    program: Address,
    clock: AtomicI64,
}

impl AuctionHouseSimulator {
    #[must_use]
    pub fn new(program: Address) -> Self {
        Self {
            program,
            clock: AtomicI64::new(GENESIS),
        }
    }

    #[must_use]
    pub fn program(&self) -> Address {
        self.program
    }

    fn tick(&self) -> i64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for AuctionHouseSimulator {
    fn default() -> Self {
        Self::new(AUCTION_HOUSE_PROGRAM)
    }
}

/// Pending writes of one transaction, read-through to the ledger.
struct Staged<'a> {
    program: Address,
    ledger: &'a InMemoryLedger,
    writes: HashMap<Address, AccountRecord>,
}

impl Staged<'_> {
    fn get(&self, address: &Address) -> Option<AccountRecord> {
        self.writes
            .get(address)
            .cloned()
            .or_else(|| self.ledger.peek(address))
    }

    fn read<T: AccountType>(&self, address: &Address) -> Result<T, LedgerError> {
        decode_required(address, self.get(address).as_ref())
    }

    fn create<T: AccountType>(&mut self, address: Address, value: &T) -> Result<(), LedgerError> {
        if self.get(&address).is_some() {
            return Err(rejected(format!(
                "{} account [{address}] already exists",
                T::NAME
            )));
        }
        let data = codec::encode(value).map_err(|e| rejected(e.to_string()))?;
        self.writes.insert(
            address,
            AccountRecord {
                address,
                owner: self.program,
                data,
            },
        );
        Ok(())
    }
}

fn rejected(reason: impl Into<String>) -> LedgerError {
    LedgerError::TransactionFailed {
        reason: reason.into(),
    }
}

fn expect_address(what: &str, expected: &Address, actual: &Address) -> Result<(), LedgerError> {
    if expected == actual {
        Ok(())
    } else {
        Err(rejected(format!(
            "{what} [{actual}] does not match the derived address [{expected}]"
        )))
    }
}

impl TransactionProcessor for AuctionHouseSimulator {
    fn process(&self, transaction: &Transaction, ledger: &InMemoryLedger) -> Result<(), LedgerError> {
        let mut staged = Staged {
            program: self.program,
            ledger,
            writes: HashMap::new(),
        };

        for instruction in &transaction.instructions {
            if instruction.program != self.program {
                continue;
            }
            let instruction = AuctionHouseInstruction::decode(&instruction.data)
                .map_err(|e| rejected(format!("invalid instruction data: {e}")))?;
            self.execute(instruction, &mut staged)?;
        }

        let written = staged.writes.len();
        for (_, record) in staged.writes {
            ledger.put_account(record);
        }
        debug!(written, "auction house transaction applied");
        Ok(())
    }
}

impl AuctionHouseSimulator {
    fn execute(
        &self,
        instruction: AuctionHouseInstruction,
        staged: &mut Staged<'_>,
    ) -> Result<(), LedgerError> {
        match instruction {
            AuctionHouseInstruction::CreateAuctionHouse {
                creator,
                authority,
                treasury_mint,
                seller_fee_basis_points,
                requires_sign_off,
                can_change_sale_price,
            } => {
                if seller_fee_basis_points > 10_000 {
                    return Err(rejected("seller fee exceeds 100%"));
                }
                let address = auction_house_address(&self.program, &creator, &treasury_mint);
                staged.create(
                    address,
                    &AuctionHouseAccount {
                        creator,
                        authority,
                        treasury_mint,
                        treasury: treasury_address(&self.program, &address),
                        fee_account: fee_account_address(&self.program, &address),
                        seller_fee_basis_points,
                        requires_sign_off,
                        can_change_sale_price,
                    },
                )
            }
            AuctionHouseInstruction::Buy {
                auction_house,
                wallet,
                metadata,
                token_account,
                trade_state,
                price,
                token_size,
            } => {
                staged.read::<AuctionHouseAccount>(&auction_house)?;
                staged.create(
                    trade_state,
                    &TradeStateAccount {
                        side: TradeSide::Bid,
                        auction_house,
                        wallet,
                        metadata,
                        token_account,
                        price,
                        token_size,
                    },
                )
            }
            AuctionHouseInstruction::Sell {
                auction_house,
                wallet,
                metadata,
                token_account,
                trade_state,
                price,
                token_size,
            } => {
                staged.read::<AuctionHouseAccount>(&auction_house)?;
                staged.create(
                    trade_state,
                    &TradeStateAccount {
                        side: TradeSide::Ask,
                        auction_house,
                        wallet,
                        metadata,
                        token_account: Some(token_account),
                        price,
                        token_size,
                    },
                )
            }
            AuctionHouseInstruction::PrintBidReceipt {
                trade_state,
                receipt,
                bookkeeper,
            } => {
                expect_address(
                    "bid receipt",
                    &bid_receipt_address(&self.program, &trade_state),
                    &receipt,
                )?;
                let state: TradeStateAccount = staged.read(&trade_state)?;
                if state.side != TradeSide::Bid {
                    return Err(rejected("trade state is not a bid"));
                }
                staged.create(
                    receipt,
                    &BidReceiptAccount {
                        trade_state,
                        bookkeeper,
                        auction_house: state.auction_house,
                        buyer: state.wallet,
                        metadata: state.metadata,
                        token_account: state.token_account,
                        purchase_receipt: None,
                        price: state.price,
                        token_size: state.token_size,
                        created_at: self.tick(),
                        canceled_at: None,
                    },
                )
            }
            AuctionHouseInstruction::PrintListingReceipt {
                trade_state,
                receipt,
                bookkeeper,
            } => {
                expect_address(
                    "listing receipt",
                    &listing_receipt_address(&self.program, &trade_state),
                    &receipt,
                )?;
                let state: TradeStateAccount = staged.read(&trade_state)?;
                if state.side != TradeSide::Ask {
                    return Err(rejected("trade state is not a listing"));
                }
                staged.create(
                    receipt,
                    &ListingReceiptAccount {
                        trade_state,
                        bookkeeper,
                        auction_house: state.auction_house,
                        seller: state.wallet,
                        metadata: state.metadata,
                        purchase_receipt: None,
                        price: state.price,
                        token_size: state.token_size,
                        created_at: self.tick(),
                        canceled_at: None,
                    },
                )
            }
        }
    }
}
