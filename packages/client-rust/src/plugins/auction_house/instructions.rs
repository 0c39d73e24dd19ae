//! Instructions understood by the auction house program.
//!
//! Instruction data is the MsgPack encoding of [`AuctionHouseInstruction`].

use ledgerkit_core::{AccountMeta, Address, Instruction};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuctionHouseInstruction {
    CreateAuctionHouse {
        creator: Address,
        authority: Address,
        treasury_mint: Address,
        seller_fee_basis_points: u16,
        requires_sign_off: bool,
        can_change_sale_price: bool,
    },
    /// Opens a bid. `token_account` is `None` for public bids.
    Buy {
        auction_house: Address,
        wallet: Address,
        metadata: Address,
        token_account: Option<Address>,
        trade_state: Address,
        price: u64,
        token_size: u64,
    },
    PrintBidReceipt {
        trade_state: Address,
        receipt: Address,
        bookkeeper: Address,
    },
    Sell {
        auction_house: Address,
        wallet: Address,
        metadata: Address,
        token_account: Address,
        trade_state: Address,
        price: u64,
        token_size: u64,
    },
    PrintListingReceipt {
        trade_state: Address,
        receipt: Address,
        bookkeeper: Address,
    },
}

impl AuctionHouseInstruction {
    /// Encodes into an [`Instruction`] for `program`.
    ///
    /// # Errors
    ///
    /// Returns an error if MsgPack serialization fails.
    pub fn into_instruction(self, program: Address) -> Result<Instruction, rmp_serde::encode::Error> {
        let keys = self.keys();
        Ok(Instruction {
            program,
            keys,
            data: rmp_serde::to_vec_named(&self)?,
        })
    }

    /// Decodes instruction data.
    ///
    /// # Errors
    ///
    /// Returns an error if `data` is not an encoded instruction.
    pub fn decode(data: &[u8]) -> Result<Self, rmp_serde::decode::Error> {
        rmp_serde::from_slice(data)
    }

    fn keys(&self) -> Vec<AccountMeta> {
        match self {
            Self::CreateAuctionHouse {
                creator, authority, ..
            } => vec![
                AccountMeta::writable(*creator, true),
                AccountMeta::readonly(*authority, false),
            ],
            Self::Buy {
                auction_house,
                wallet,
                metadata,
                token_account,
                trade_state,
                ..
            } => {
                let mut keys = vec![
                    AccountMeta::writable(*wallet, true),
                    AccountMeta::readonly(*auction_house, false),
                    AccountMeta::readonly(*metadata, false),
                    AccountMeta::writable(*trade_state, false),
                ];
                keys.extend(token_account.map(|t| AccountMeta::readonly(t, false)));
                keys
            }
            Self::Sell {
                auction_house,
                wallet,
                metadata,
                token_account,
                trade_state,
                ..
            } => vec![
                AccountMeta::writable(*wallet, true),
                AccountMeta::readonly(*auction_house, false),
                AccountMeta::readonly(*metadata, false),
                AccountMeta::writable(*token_account, false),
                AccountMeta::writable(*trade_state, false),
            ],
            Self::PrintBidReceipt {
                trade_state,
                receipt,
                bookkeeper,
            }
            | Self::PrintListingReceipt {
                trade_state,
                receipt,
                bookkeeper,
            } => vec![
                AccountMeta::writable(*bookkeeper, true),
                AccountMeta::readonly(*trade_state, false),
                AccountMeta::writable(*receipt, false),
            ],
        }
    }
}
