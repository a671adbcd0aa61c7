//! The `Transaction` entity (§3).

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

/// One signed movement of value between two accounts in the companion
/// `AccountStore`.
///
/// Invariants (enforced alongside `TransactionStore`): `sourceId`/
/// `destinationId` resolve to accounts in the companion store; `fireflyId`,
/// once set, is immutable; `akahuIds` only grows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: u64,
    pub firefly_id: Option<String>,
    pub akahu_ids: BTreeSet<String>,
    pub description: String,
    pub date: DateTime<Utc>,
    pub amount: Money,
    pub source_id: u64,
    pub destination_id: u64,
    pub foreign_amount: Option<Money>,
    pub foreign_currency_code: Option<String>,
    pub category_name: Option<String>,
}

impl Transaction {
    pub fn candidate(
        description: impl Into<String>,
        date: DateTime<Utc>,
        amount: Money,
        source_id: u64,
        destination_id: u64,
    ) -> Self {
        Self {
            id: 0,
            firefly_id: None,
            akahu_ids: BTreeSet::new(),
            description: description.into(),
            date,
            amount: amount.abs(),
            source_id,
            destination_id,
            foreign_amount: None,
            foreign_currency_code: None,
            category_name: None,
        }
    }

    /// Does this transaction's date carry a nonzero hour or minute
    /// component? Fusing two legs of one transfer prefers whichever side
    /// isn't exactly midnight.
    pub fn has_nonzero_hour_or_minute(&self) -> bool {
        self.date.format("%H%M").to_string() != "0000"
    }

    pub fn dump(&self) -> String {
        format!(
            "Transaction{{id={}, firefly_id={:?}, akahu_ids={:?}, amount={}, source={}, destination={}}}",
            self.id,
            self.firefly_id,
            self.akahu_ids.iter().collect::<Vec<_>>(),
            self.amount,
            self.source_id,
            self.destination_id,
        )
    }
}
