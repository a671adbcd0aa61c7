//! The indexed `Transaction` collection (§4.3).

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::transaction::Transaction;

/// Keyed collection of `Transaction`s with two secondary indices: `fireflyId`
/// and `akahuIds`.
#[derive(Debug, Clone, Default)]
pub struct TransactionStore {
    next_id: u64,
    transactions: IndexMap<u64, Transaction>,
    by_firefly_id: HashMap<String, u64>,
    by_akahu_id: HashMap<String, u64>,
}

impl TransactionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, mut candidate: Transaction) -> Result<Transaction> {
        self.check_conflicts(&candidate, None)?;
        self.next_id += 1;
        candidate.id = self.next_id;
        self.index(&candidate);
        self.transactions.insert(candidate.id, candidate.clone());
        Ok(candidate)
    }

    /// Replace the existing transaction with the same id. Fails with
    /// `UnknownId` if absent; fails with `ImmutableField` if `fireflyId` would
    /// change from a set value; fails (also `ImmutableField`) if any element
    /// is missing from the new `akahuIds` that was present in the old one,
    /// since `akahuIds` may only grow.
    pub fn save(&mut self, transaction: Transaction) -> Result<()> {
        let existing = self
            .transactions
            .get(&transaction.id)
            .cloned()
            .ok_or(Error::UnknownId { entity: "Transaction", id: transaction.id })?;

        if let Some(old_firefly_id) = &existing.firefly_id {
            if let Some(new_firefly_id) = &transaction.firefly_id {
                if old_firefly_id != new_firefly_id {
                    return Err(Error::ImmutableField {
                        entity: "Transaction",
                        id: transaction.id,
                        field: "fireflyId",
                        old: old_firefly_id.clone(),
                        new: new_firefly_id.clone(),
                    });
                }
            }
        }

        if !existing.akahu_ids.is_subset(&transaction.akahu_ids) {
            let lost: Vec<_> = existing.akahu_ids.difference(&transaction.akahu_ids).cloned().collect();
            return Err(Error::ImmutableField {
                entity: "Transaction",
                id: transaction.id,
                field: "akahuIds",
                old: format!("{:?}", lost),
                new: "(removed)".to_string(),
            });
        }

        self.check_conflicts(&transaction, Some(transaction.id))?;

        self.deindex(&existing);
        self.index(&transaction);
        self.transactions.insert(transaction.id, transaction);
        Ok(())
    }

    pub fn get(&self, id: u64) -> Option<Transaction> {
        self.transactions.get(&id).cloned()
    }

    pub fn get_by_firefly_id(&self, firefly_id: &str) -> Option<Transaction> {
        self.by_firefly_id.get(firefly_id).and_then(|id| self.get(*id))
    }

    pub fn get_by_akahu_id(&self, akahu_id: &str) -> Option<Transaction> {
        self.by_akahu_id.get(akahu_id).and_then(|id| self.get(*id))
    }

    pub fn duplicate(&self) -> TransactionStore {
        self.clone()
    }

    pub fn iter(&self) -> impl Iterator<Item = Transaction> + '_ {
        self.transactions.values().cloned()
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    fn check_conflicts(&self, candidate: &Transaction, exclude_id: Option<u64>) -> Result<()> {
        let owner = |id: &u64| exclude_id != Some(*id);

        if let Some(firefly_id) = &candidate.firefly_id {
            if self.by_firefly_id.get(firefly_id).is_some_and(owner) {
                return Err(Error::DuplicateKey {
                    entity: "Transaction.fireflyId",
                    key: firefly_id.clone(),
                });
            }
        }
        for akahu_id in &candidate.akahu_ids {
            if self.by_akahu_id.get(akahu_id).is_some_and(owner) {
                return Err(Error::DuplicateKey {
                    entity: "Transaction.akahuIds",
                    key: akahu_id.clone(),
                });
            }
        }
        Ok(())
    }

    fn index(&mut self, transaction: &Transaction) {
        if let Some(firefly_id) = &transaction.firefly_id {
            self.by_firefly_id.insert(firefly_id.clone(), transaction.id);
        }
        for akahu_id in &transaction.akahu_ids {
            self.by_akahu_id.insert(akahu_id.clone(), transaction.id);
        }
    }

    fn deindex(&mut self, transaction: &Transaction) {
        if let Some(firefly_id) = &transaction.firefly_id {
            self.by_firefly_id.remove(firefly_id);
        }
        for akahu_id in &transaction.akahu_ids {
            self.by_akahu_id.remove(akahu_id);
        }
    }
}
