//! The `Account` entity (§3) and its role records.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Role type of one side of an account's participation in transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountType {
    Asset,
    Liability,
    Expense,
    Revenue,
}

/// A role record: one side (source or destination) an `Account` can take in a
/// `Transaction`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub external_id: Option<String>,
    pub account_type: AccountType,
    pub notes: Option<String>,
}

impl Role {
    pub fn new(account_type: AccountType) -> Self {
        Self { external_id: None, account_type, notes: None }
    }
}

/// One party in the ledger.
///
/// Invariants (enforced by `AccountStore`, not by this struct in isolation):
/// at least one of `source`/`destination` is present; if both are present they
/// share one `external_id`; within one store, `akahu_id`, every bank number,
/// every normalized name, and every role `external_id` are each unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: u64,
    pub name: String,
    /// Normalized name -> original display form. Always contains the
    /// normalized primary name.
    pub alternate_names: BTreeMap<String, String>,
    pub bank_numbers: BTreeSet<String>,
    pub akahu_id: Option<String>,
    /// Free-text notes as last read from the ledger, including any
    /// structured blocks; the exporter strips and rebuilds those blocks
    /// rather than trusting this copy, but keeps whatever surrounds them.
    pub notes: Option<String>,
    pub source: Option<Role>,
    pub destination: Option<Role>,
}

impl Account {
    /// Build a candidate account, before it has been assigned an id by a store.
    pub fn candidate(name: &str) -> Self {
        let trimmed = name.trim().to_string();
        let mut alternate_names = BTreeMap::new();
        alternate_names.insert(crate::identity::normalize_name(&trimmed), trimmed.clone());
        Self {
            id: 0,
            name: trimmed,
            alternate_names,
            bank_numbers: BTreeSet::new(),
            akahu_id: None,
            notes: None,
            source: None,
            destination: None,
        }
    }

    pub fn normalized_primary_name(&self) -> String {
        crate::identity::normalize_name(&self.name)
    }

    pub fn add_alternate_name(&mut self, original: &str) {
        let trimmed = original.trim().to_string();
        self.alternate_names
            .insert(crate::identity::normalize_name(&trimmed), trimmed);
    }

    /// Every normalized name this account is known by (primary + alternates).
    pub fn normalized_names(&self) -> impl Iterator<Item = &str> {
        self.alternate_names.keys().map(String::as_str)
    }

    /// The external id shared by whichever of source/destination is set.
    pub fn external_id(&self) -> Option<&str> {
        self.source
            .as_ref()
            .and_then(|r| r.external_id.as_deref())
            .or_else(|| self.destination.as_ref().and_then(|r| r.external_id.as_deref()))
    }

    pub fn has_role(&self, account_type: AccountType) -> bool {
        self.source.as_ref().map(|r| r.account_type) == Some(account_type)
            || self.destination.as_ref().map(|r| r.account_type) == Some(account_type)
    }

    /// A stable, loggable dump of this account for diagnostics (§7: "sets are
    /// rendered as arrays for stability").
    pub fn dump(&self) -> String {
        format!(
            "Account{{id={}, name={:?}, bank_numbers={:?}, akahu_id={:?}, external_id={:?}}}",
            self.id,
            self.name,
            self.bank_numbers.iter().collect::<Vec<_>>(),
            self.akahu_id,
            self.external_id(),
        )
    }
}
