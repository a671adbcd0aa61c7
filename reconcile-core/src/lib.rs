//! In-memory ledger/feed reconciliation engine.
//!
//! Indexed account and transaction stores, ledger and feed importers, a
//! structural-key merger, and a diff-based exporter. See the module docs on
//! each piece for its contract; this crate has no I/O of its own — callers
//! supply rows, feed records, and a `LedgerWriteClient`.

pub mod account;
pub mod account_store;
pub mod error;
pub mod export;
pub mod feed_import;
pub mod identity;
pub mod ledger_import;
pub mod merge;
pub mod money;
pub mod transaction;
pub mod transaction_store;

pub use account::{Account, AccountType, Role};
pub use account_store::AccountStore;
pub use error::{Error, Result};
pub use export::{
    export_accounts, export_transactions, synthesize_missing_roles, AccountPayload, AccountWrite,
    LedgerWriteClient, TransactionKind, TransactionPayload, TransactionWrite,
};
pub use feed_import::{FeedConversion, FeedTransactionRow};
pub use ledger_import::{LedgerAccountRow, LedgerTransactionRow};
pub use merge::{merge, merge_default, MergeOutcome};
pub use money::Money;
pub use transaction::Transaction;
pub use transaction_store::TransactionStore;
