//! Ledgerkit Core: addresses, amounts, the ledger RPC interface, and the account codec.

pub mod codec;
pub mod hash;
pub mod ledger;
pub mod memory;
pub mod types;

pub use codec::AccountType;
pub use ledger::{
    AccountFilter, AccountMeta, AccountRecord, Instruction, LedgerError, LedgerRpc, Transaction,
};
pub use memory::{InMemoryLedger, TransactionProcessor};
pub use types::{lamports, sol, token, Address, Amount, Commitment, Currency, Signature};

#[cfg(test)]
mod tests {
    #[test]
    fn crate_loads() {
        // Empty body: if this test runs, the crate compiles and loads.
    }
}
