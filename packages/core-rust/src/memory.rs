//! In-memory [`LedgerRpc`] implementation backed by [`DashMap`].
//!
//! Used by tests and local development. Every read is counted per address so
//! callers can assert which fetches an operation performed. Submitted
//! transactions are logged and, when a [`TransactionProcessor`] is installed,
//! applied as account writes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};

use crate::codec::{self, AccountType};
use crate::ledger::{AccountFilter, AccountRecord, LedgerError, LedgerRpc, Transaction};
use crate::types::{Address, Commitment, Signature};

/// Applies a submitted transaction to an [`InMemoryLedger`].
///
/// Stands in for on-ledger program execution in tests.
pub trait TransactionProcessor: Send + Sync {
    /// Apply `transaction`. Returning an error rejects the whole transaction.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::TransactionFailed`] (or any other variant) to
    /// reject the transaction.
    fn process(&self, transaction: &Transaction, ledger: &InMemoryLedger)
        -> Result<(), LedgerError>;
}

/// Concurrent in-memory ledger.
pub struct InMemoryLedger {
    accounts: DashMap<Address, AccountRecord>,
    reads: DashMap<Address, u64>,
    transactions: Mutex<Vec<Transaction>>,
    processor: RwLock<Option<Arc<dyn TransactionProcessor>>>,
    next_signature: AtomicU64,
}

impl InMemoryLedger {
    /// Creates an empty ledger with no transaction processor.
    #[must_use]
    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
            reads: DashMap::new(),
            transactions: Mutex::new(Vec::new()),
            processor: RwLock::new(None),
            next_signature: AtomicU64::new(1),
        }
    }

    /// Installs the processor used by `send_transaction`.
    pub fn set_processor(&self, processor: Arc<dyn TransactionProcessor>) {
        *self.processor.write() = Some(processor);
    }

    /// Inserts or replaces a raw account.
    pub fn put_account(&self, record: AccountRecord) -> Option<AccountRecord> {
        self.accounts.insert(record.address, record)
    }

    /// Encodes and stores a typed account.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be encoded.
    pub fn put_typed<T: AccountType>(
        &self,
        address: Address,
        owner: Address,
        value: &T,
    ) -> Result<(), rmp_serde::encode::Error> {
        let data = codec::encode(value)?;
        self.put_account(AccountRecord {
            address,
            owner,
            data,
        });
        Ok(())
    }

    /// Removes an account, returning it if present.
    pub fn remove_account(&self, address: &Address) -> Option<AccountRecord> {
        self.accounts.remove(address).map(|(_, r)| r)
    }

    /// Returns an account without counting it as a read.
    #[must_use]
    pub fn peek(&self, address: &Address) -> Option<AccountRecord> {
        self.accounts.get(address).map(|r| r.clone())
    }

    /// Number of times `address` was read through [`LedgerRpc`].
    #[must_use]
    pub fn reads(&self, address: &Address) -> u64 {
        self.reads.get(address).map_or(0, |n| *n)
    }

    /// Total reads across all addresses.
    #[must_use]
    pub fn total_reads(&self) -> u64 {
        self.reads.iter().map(|entry| *entry.value()).sum()
    }

    /// Snapshot of every transaction submitted so far, in order.
    #[must_use]
    pub fn transactions(&self) -> Vec<Transaction> {
        self.transactions.lock().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    fn record_read(&self, address: &Address) {
        *self.reads.entry(*address).or_insert(0) += 1;
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerRpc for InMemoryLedger {
    async fn get_account(
        &self,
        address: &Address,
        _commitment: Commitment,
    ) -> Result<Option<AccountRecord>, LedgerError> {
        self.record_read(address);
        Ok(self.peek(address))
    }

    async fn get_multiple_accounts(
        &self,
        addresses: &[Address],
        _commitment: Commitment,
    ) -> Result<Vec<Option<AccountRecord>>, LedgerError> {
        Ok(addresses
            .iter()
            .map(|address| {
                self.record_read(address);
                self.peek(address)
            })
            .collect())
    }

    async fn get_program_accounts(
        &self,
        program: &Address,
        filters: &[AccountFilter],
        _commitment: Commitment,
    ) -> Result<Vec<AccountRecord>, LedgerError> {
        let mut matched: Vec<AccountRecord> = self
            .accounts
            .iter()
            .filter(|entry| {
                let record = entry.value();
                record.owner == *program && filters.iter().all(|f| f.matches(&record.data))
            })
            .map(|entry| entry.value().clone())
            .collect();
        matched.sort_by_key(|record| record.address);
        Ok(matched)
    }

    async fn send_transaction(
        &self,
        transaction: Transaction,
        _commitment: Commitment,
    ) -> Result<Signature, LedgerError> {
        let processor = self.processor.read().clone();
        if let Some(processor) = processor {
            processor.process(&transaction, self)?;
        }
        let n = self.next_signature.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            signature = n,
            instructions = transaction.instructions.len(),
            "transaction applied"
        );
        self.transactions.lock().push(transaction);
        Ok(Signature(format!("mem-{n:016x}")))
    }
}
