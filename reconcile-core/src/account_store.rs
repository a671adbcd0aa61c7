//! The indexed `Account` collection (§4.2).

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::account::Account;
use crate::error::{Error, Result};
use crate::identity::{canonicalize_bank_number, dice_coefficient, normalize_name};

/// Keyed collection of `Account`s with four secondary indices: `akahuId`, bank
/// number, normalized name, and role `externalId`.
///
/// After every mutation, every present key in each secondary index maps to
/// exactly one account, and every account is reachable from every secondary
/// index whose source attribute it possesses.
#[derive(Debug, Clone, Default)]
pub struct AccountStore {
    next_id: u64,
    accounts: IndexMap<u64, Account>,
    by_akahu_id: HashMap<String, u64>,
    by_bank_number: HashMap<String, u64>,
    by_name: HashMap<String, u64>,
    by_external_id: HashMap<String, u64>,
}

impl AccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign the next id and index `candidate`. Fails with `DuplicateKey` if
    /// any secondary key collides with an existing entry.
    pub fn create(&mut self, mut candidate: Account) -> Result<Account> {
        self.check_conflicts(&candidate, None)?;
        self.next_id += 1;
        candidate.id = self.next_id;
        self.index(&candidate);
        self.accounts.insert(candidate.id, candidate.clone());
        Ok(candidate)
    }

    /// Replace the existing account with the same id. Fails with `UnknownId`
    /// if absent, or `ImmutableField` if `akahuId`/`source.externalId`/
    /// `destination.externalId` would change from a set value to a different
    /// one. De-indexes the old entry, then indexes the new one; because
    /// conflicts are checked first, the re-index cannot fail partway through.
    pub fn save(&mut self, account: Account) -> Result<()> {
        let existing = self
            .accounts
            .get(&account.id)
            .cloned()
            .ok_or(Error::UnknownId { entity: "Account", id: account.id })?;

        Self::check_immutable_opt(
            "akahuId",
            account.id,
            &existing.akahu_id,
            &account.akahu_id,
        )?;
        Self::check_immutable_opt(
            "source.externalId",
            account.id,
            &existing.source.as_ref().and_then(|r| r.external_id.clone()),
            &account.source.as_ref().and_then(|r| r.external_id.clone()),
        )?;
        Self::check_immutable_opt(
            "destination.externalId",
            account.id,
            &existing.destination.as_ref().and_then(|r| r.external_id.clone()),
            &account.destination.as_ref().and_then(|r| r.external_id.clone()),
        )?;

        self.check_conflicts(&account, Some(account.id))?;

        self.deindex(&existing);
        self.index(&account);
        self.accounts.insert(account.id, account);
        Ok(())
    }

    pub fn get(&self, id: u64) -> Option<Account> {
        self.accounts.get(&id).cloned()
    }

    pub fn get_by_external_id(&self, external_id: &str) -> Option<Account> {
        self.by_external_id.get(external_id).and_then(|id| self.get(*id))
    }

    pub fn get_by_akahu_id(&self, akahu_id: &str) -> Option<Account> {
        self.by_akahu_id.get(akahu_id).and_then(|id| self.get(*id))
    }

    pub fn get_by_bank_number(&self, bank_number: &str) -> Option<Account> {
        let canonical = canonicalize_bank_number(bank_number)?;
        self.by_bank_number.get(&canonical).and_then(|id| self.get(*id))
    }

    pub fn get_by_name(&self, name: &str) -> Option<Account> {
        let normalized = normalize_name(name);
        self.by_name.get(&normalized).and_then(|id| self.get(*id))
    }

    /// Linear scan across accounts in insertion order, scoring each by the
    /// maximum Sørensen–Dice coefficient between `query` and any of that
    /// account's normalized names. Ties keep the first-seen account.
    pub fn get_by_name_fuzzy(&self, query: &str) -> Result<(Account, f64)> {
        let normalized_query = normalize_name(query);
        let mut best: Option<(Account, f64)> = None;
        for account in self.accounts.values() {
            let score = account
                .normalized_names()
                .map(|name| dice_coefficient(name, &normalized_query))
                .fold(0.0_f64, f64::max);
            match &best {
                Some((_, best_score)) if *best_score >= score => {}
                _ => best = Some((account.clone(), score)),
            }
        }
        best.ok_or(Error::NoAccounts)
    }

    pub fn duplicate(&self) -> AccountStore {
        self.clone()
    }

    pub fn iter(&self) -> impl Iterator<Item = Account> + '_ {
        self.accounts.values().cloned()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    fn check_immutable_opt(
        field: &'static str,
        id: u64,
        old: &Option<String>,
        new: &Option<String>,
    ) -> Result<()> {
        if let Some(old_value) = old {
            if let Some(new_value) = new {
                if old_value != new_value {
                    return Err(Error::ImmutableField {
                        entity: "Account",
                        id,
                        field,
                        old: old_value.clone(),
                        new: new_value.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    fn check_conflicts(&self, candidate: &Account, exclude_id: Option<u64>) -> Result<()> {
        let owner = |id: &u64| exclude_id != Some(*id);

        if let Some(akahu_id) = &candidate.akahu_id {
            if self.by_akahu_id.get(akahu_id).is_some_and(owner) {
                return Err(Error::DuplicateKey { entity: "Account.akahuId", key: akahu_id.clone() });
            }
        }
        for bank_number in &candidate.bank_numbers {
            if self.by_bank_number.get(bank_number).is_some_and(owner) {
                return Err(Error::DuplicateKey {
                    entity: "Account.bankNumbers",
                    key: bank_number.clone(),
                });
            }
        }
        for name in candidate.normalized_names() {
            if self.by_name.get(name).is_some_and(owner) {
                return Err(Error::DuplicateKey { entity: "Account.alternateNames", key: name.to_string() });
            }
        }
        if let Some(external_id) = candidate.external_id() {
            if self.by_external_id.get(external_id).is_some_and(owner) {
                return Err(Error::DuplicateKey {
                    entity: "Account.externalId",
                    key: external_id.to_string(),
                });
            }
        }
        Ok(())
    }

    fn index(&mut self, account: &Account) {
        if let Some(akahu_id) = &account.akahu_id {
            self.by_akahu_id.insert(akahu_id.clone(), account.id);
        }
        for bank_number in &account.bank_numbers {
            self.by_bank_number.insert(bank_number.clone(), account.id);
        }
        for name in account.normalized_names() {
            self.by_name.insert(name.to_string(), account.id);
        }
        if let Some(external_id) = account.external_id() {
            self.by_external_id.insert(external_id.to_string(), account.id);
        }
    }

    fn deindex(&mut self, account: &Account) {
        if let Some(akahu_id) = &account.akahu_id {
            self.by_akahu_id.remove(akahu_id);
        }
        for bank_number in &account.bank_numbers {
            self.by_bank_number.remove(bank_number);
        }
        for name in account.normalized_names() {
            self.by_name.remove(name);
        }
        if let Some(external_id) = account.external_id() {
            self.by_external_id.remove(external_id);
        }
    }
}
