//! Error types for the reconciliation core.

use thiserror::Error;

/// Domain errors raised by the stores, importers, matcher, merger and exporter.
///
/// Per the error taxonomy: `DataIntegrity` and store-invariant violations are
/// fatal and abort the run with a diagnostic naming the offending entity.
/// `IndexDuplicate` during import is handled by the importer itself (logged and
/// skipped) and never constructed here.
#[derive(Error, Debug)]
pub enum Error {
    /// A secondary key collided with an existing entry on `create`.
    #[error("duplicate key {key} on {entity}")]
    DuplicateKey { entity: &'static str, key: String },

    /// `save` was called with an id that does not exist in the store.
    #[error("unknown id {id} in {entity}")]
    UnknownId { entity: &'static str, id: u64 },

    /// `save` attempted to change an immutable identity field.
    #[error("field {field} on {entity} {id} is immutable: {old} -> {new}")]
    ImmutableField {
        entity: &'static str,
        id: u64,
        field: &'static str,
        old: String,
        new: String,
    },

    /// `getByNameFuzzy` was called on an empty name index.
    #[error("no accounts in store")]
    NoAccounts,

    /// Ledger import found more than one existing account match, or found one
    /// match that could not be merged under the Expense/Revenue promotion rule.
    #[error("account conflict importing {candidate}: matches {matches:?}")]
    AccountConflict { candidate: String, matches: Vec<String> },

    /// A ledger transaction row referenced a source or destination account id
    /// that was not found via `getByExternalId`.
    #[error("missing account for ledger account id {0}")]
    MissingAccount(String),

    /// A feed transaction referenced a feed account id with no matching owned
    /// account, or the matched account is not Asset/Liability.
    #[error("unconfigured account for akahu account id {0}")]
    UnconfiguredAccount(String),

    /// After transfer fusion, one or both transfer pools still held unmatched
    /// internal-transfer transactions.
    #[error("unmatched transfer: {0} transaction(s) left over")]
    UnmatchedTransfer(usize),

    /// The (sourceType, destinationType) pair has no entry in the kind table.
    #[error("invalid transaction kind: {source_type:?} -> {destination_type:?}")]
    InvalidTransactionKind {
        source_type: crate::account::AccountType,
        destination_type: crate::account::AccountType,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
