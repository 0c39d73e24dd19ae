//! Narrow interface to the remote ledger.
//!
//! Operation handlers never talk to the network directly; they go through a
//! [`LedgerRpc`] implementation. Only the shape of the calls is defined here:
//! account encoding, transaction serialization, signing and retries belong to
//! the concrete implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::{Address, Commitment, Signature};

// ---------------------------------------------------------------------------
// LedgerError
// ---------------------------------------------------------------------------

/// Failures reported by the ledger or while interpreting its accounts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("The account of type [{account_type}] was not found at the provided address [{address}]")]
    AccountNotFound {
        address: Address,
        account_type: &'static str,
    },
    #[error("account [{address}] could not be decoded: {reason}")]
    Decode { address: Address, reason: String },
    #[error("rpc call failed: {0}")]
    Rpc(String),
    #[error("transaction failed: {reason}")]
    TransactionFailed { reason: String },
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

/// Raw account as returned by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub address: Address,
    /// Program that owns (and alone may write) this account.
    pub owner: Address,
    pub data: Vec<u8>,
}

/// Predicate applied server-side by [`LedgerRpc::get_program_accounts`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountFilter {
    /// Account data starts with the given bytes.
    DataPrefix(Vec<u8>),
    /// Account data contains the given bytes at the given offset.
    DataAt { offset: usize, bytes: Vec<u8> },
}

impl AccountFilter {
    #[must_use]
    pub fn matches(&self, data: &[u8]) -> bool {
        match self {
            Self::DataPrefix(prefix) => data.starts_with(prefix),
            Self::DataAt { offset, bytes } => offset
                .checked_add(bytes.len())
                .and_then(|end| data.get(*offset..end))
                .is_some_and(|window| window == bytes.as_slice()),
        }
    }
}

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

/// Account referenced by an instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountMeta {
    pub address: Address,
    pub is_signer: bool,
    pub is_writable: bool,
}

impl AccountMeta {
    #[must_use]
    pub fn writable(address: Address, is_signer: bool) -> Self {
        Self {
            address,
            is_signer,
            is_writable: true,
        }
    }

    #[must_use]
    pub fn readonly(address: Address, is_signer: bool) -> Self {
        Self {
            address,
            is_signer,
            is_writable: false,
        }
    }
}

/// A single program invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub program: Address,
    pub keys: Vec<AccountMeta>,
    pub data: Vec<u8>,
}

/// Ordered list of instructions paid for by `fee_payer`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub fee_payer: Address,
    pub instructions: Vec<Instruction>,
}

impl Transaction {
    #[must_use]
    pub fn new(fee_payer: Address) -> Self {
        Self {
            fee_payer,
            instructions: Vec::new(),
        }
    }

    #[must_use]
    pub fn with(mut self, instruction: Instruction) -> Self {
        self.instructions.push(instruction);
        self
    }
}

// ---------------------------------------------------------------------------
// LedgerRpc
// ---------------------------------------------------------------------------

/// Asynchronous access to the authoritative ledger.
/// Implementations: RPC node client (out of tree), [`InMemoryLedger`](crate::InMemoryLedger).
#[async_trait]
pub trait LedgerRpc: Send + Sync {
    /// Fetch a single account, `None` if it does not exist.
    async fn get_account(
        &self,
        address: &Address,
        commitment: Commitment,
    ) -> Result<Option<AccountRecord>, LedgerError>;

    /// Fetch several accounts in one round-trip, preserving input order.
    async fn get_multiple_accounts(
        &self,
        addresses: &[Address],
        commitment: Commitment,
    ) -> Result<Vec<Option<AccountRecord>>, LedgerError>;

    /// Scan every account owned by `program` that matches all `filters`.
    async fn get_program_accounts(
        &self,
        program: &Address,
        filters: &[AccountFilter],
        commitment: Commitment,
    ) -> Result<Vec<AccountRecord>, LedgerError>;

    /// Sign, submit and confirm a transaction.
    async fn send_transaction(
        &self,
        transaction: Transaction,
        commitment: Commitment,
    ) -> Result<Signature, LedgerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_filter() {
        let filter = AccountFilter::DataPrefix(vec![1, 2]);
        assert!(filter.matches(&[1, 2, 3]));
        assert!(!filter.matches(&[2, 1, 3]));
        assert!(!filter.matches(&[1]));
    }

    #[test]
    fn offset_filter_handles_short_data() {
        let filter = AccountFilter::DataAt {
            offset: 2,
            bytes: vec![9, 9],
        };
        assert!(filter.matches(&[0, 0, 9, 9]));
        assert!(!filter.matches(&[0, 0, 9]));
        assert!(!filter.matches(&[]));
    }

    #[test]
    fn offset_filter_rejects_offset_past_address_space() {
        let filter = AccountFilter::DataAt {
            offset: usize::MAX,
            bytes: vec![1],
        };
        assert!(!filter.matches(&[1, 2, 3]));
    }

    #[test]
    fn account_not_found_message_names_type() {
        let err = LedgerError::AccountNotFound {
            address: Address::new([0; 32]),
            account_type: "BidReceipt",
        };
        assert!(err
            .to_string()
            .contains("The account of type [BidReceipt] was not found"));
    }

    #[test]
    fn transaction_builder_appends_instructions() {
        let payer = Address::new([1; 32]);
        let ix = Instruction {
            program: Address::new([2; 32]),
            keys: vec![AccountMeta::writable(payer, true)],
            data: vec![0],
        };
        let tx = Transaction::new(payer).with(ix.clone()).with(ix);
        assert_eq!(tx.instructions.len(), 2);
        assert_eq!(tx.fee_payer, payer);
    }
}
