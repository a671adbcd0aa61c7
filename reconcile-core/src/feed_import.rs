//! The Feed Importer + Matcher (§4.5): transforms feed rows into
//! `Transaction`s, resolves counterparty accounts via ordered matching
//! strategies, and fuses internal transfers.

use chrono::{DateTime, Utc};

use crate::account::{Account, AccountType, Role};
use crate::account_store::AccountStore;
use crate::error::{Error, Result};
use crate::merge::merge;
use crate::money::Money;
use crate::transaction::Transaction;

/// Currency-conversion metadata attached to a feed row. `fee`/`rate` are
/// accepted but not persisted (see DESIGN.md).
#[derive(Debug, Clone)]
pub struct FeedConversion {
    pub currency: String,
    pub amount: Money,
    #[allow(dead_code)]
    pub rate: Option<Money>,
    #[allow(dead_code)]
    pub fee: Option<Money>,
}

/// One decoded feed-transaction record.
#[derive(Debug, Clone)]
pub struct FeedTransactionRow {
    pub id: String,
    pub account_id: String,
    pub amount: Money,
    pub date: DateTime<Utc>,
    pub description: String,
    pub merchant_id: Option<String>,
    pub other_party_account_number: Option<String>,
    pub reference: Option<String>,
    pub particulars: Option<String>,
    pub code: Option<String>,
    pub conversion: Option<FeedConversion>,
    pub category_name: Option<String>,
}

fn strip_substrings(mut text: String, parts: &[Option<&String>]) -> String {
    for part in parts.iter().flatten() {
        if !part.is_empty() {
            text = text.replace(part.as_str(), "");
        }
    }
    text.trim().to_string()
}

/// §4.5 counterparty resolution: ordered strategies, first hit wins.
fn resolve_counterparty(store: &AccountStore, row: &FeedTransactionRow) -> Option<(Account, Option<f64>)> {
    if row.description.to_lowercase().contains("interest") {
        if let Some(account) = store.get_by_name("Interest") {
            return Some((account, None));
        }
    }
    if let Some(merchant_id) = &row.merchant_id {
        if let Some(account) = store.get_by_akahu_id(merchant_id) {
            return Some((account, None));
        }
    }
    if let Some(other_account_number) = &row.other_party_account_number {
        if let Some(account) = store.get_by_bank_number(other_account_number) {
            return Some((account, None));
        }
    }

    let plain = store.get_by_name_fuzzy(&row.description).ok();
    let without_reference = row.reference.as_ref().and_then(|reference| {
        let stripped = row.description.replace(reference.as_str(), "");
        store.get_by_name_fuzzy(stripped.trim()).ok()
    });

    match (plain, without_reference) {
        (Some((account, score)), Some((alt_account, alt_score))) => {
            if alt_score > score {
                Some((alt_account, Some(alt_score)))
            } else {
                Some((account, Some(score)))
            }
        }
        (Some((account, score)), None) => Some((account, Some(score))),
        (None, Some((account, score))) => Some((account, Some(score))),
        (None, None) => None,
    }
}

/// Resolve or synthesize the counterparty role-account for one feed row.
///
/// §9 adopts the one-account-per-identity model: a counterparty missing the
/// needed role has that role attached to it in place, rather than cloned
/// into a second account of the same name (which would violate the name
/// uniqueness invariant — see the role-promotion scenario in DESIGN.md).
///
/// If the resolved counterparty is the owner account itself — the only
/// candidate left when fuzzy-matching against a ledger with no merchant
/// accounts yet — a fresh, unlinked role-account is synthesised instead.
fn resolve_counterparty_role(
    store: &mut AccountStore,
    row: &FeedTransactionRow,
    owner: &Account,
    amount_is_negative: bool,
) -> Result<Account> {
    let needed_type = if amount_is_negative { AccountType::Expense } else { AccountType::Revenue };
    let resolved = resolve_counterparty(store, row).map(|(account, _)| account);

    let counterparty = match resolved {
        Some(counterparty) if counterparty.id != owner.id => counterparty,
        _ => {
            let mut fresh = Account::candidate(&row.description);
            match needed_type {
                AccountType::Expense => fresh.destination = Some(Role::new(AccountType::Expense)),
                AccountType::Revenue => fresh.source = Some(Role::new(AccountType::Revenue)),
                _ => unreachable!(),
            }
            return store.create(fresh);
        }
    };

    let has_role = match needed_type {
        AccountType::Expense => counterparty.destination.is_some(),
        AccountType::Revenue => counterparty.source.is_some(),
        _ => unreachable!(),
    };
    if has_role {
        return Ok(counterparty);
    }

    let mut promoted = counterparty;
    match needed_type {
        AccountType::Expense => promoted.destination = Some(Role::new(AccountType::Expense)),
        AccountType::Revenue => promoted.source = Some(Role::new(AccountType::Revenue)),
        _ => unreachable!(),
    }
    store.save(promoted.clone())?;
    Ok(promoted)
}

fn clean_description(row: &FeedTransactionRow) -> String {
    strip_substrings(row.description.clone(), &[row.reference.as_ref(), row.code.as_ref(), row.particulars.as_ref()])
}

/// Import one feed row into a `Transaction`, resolving/creating the
/// counterparty role-account in `store` as a side effect.
pub fn import_transaction(store: &mut AccountStore, row: &FeedTransactionRow) -> Result<Transaction> {
    let owner = store.get_by_akahu_id(&row.account_id).ok_or_else(|| Error::UnconfiguredAccount(row.account_id.clone()))?;
    if !owner.has_role(AccountType::Asset) && !owner.has_role(AccountType::Liability) {
        return Err(Error::UnconfiguredAccount(row.account_id.clone()));
    }

    let negative = row.amount.is_sign_negative();
    let counterparty = resolve_counterparty_role(store, row, &owner, negative)?;

    let (source_id, destination_id) =
        if negative { (owner.id, counterparty.id) } else { (counterparty.id, owner.id) };

    let description = clean_description(row);
    let mut transaction = Transaction::candidate(description, row.date, row.amount.abs(), source_id, destination_id);
    transaction.akahu_ids.insert(row.id.clone());
    if let Some(conversion) = &row.conversion {
        transaction.foreign_amount = Some(conversion.amount);
        transaction.foreign_currency_code = Some(conversion.currency.clone());
    }
    transaction.category_name = row.category_name.clone();

    Ok(transaction)
}

fn is_owned(store: &AccountStore, account_id: u64) -> bool {
    store
        .get(account_id)
        .and_then(|account| account.akahu_id)
        .is_some_and(|akahu_id| akahu_id.starts_with("acc_"))
}

/// Import every feed row, partition transfers from ordinary transactions, and
/// fuse transfer pairs via the Merger. Returns the pool of transactions this
/// feed contributes to the working `TransactionStore`.
pub fn import_transactions(store: &mut AccountStore, rows: &[FeedTransactionRow]) -> Result<Vec<Transaction>> {
    let mut positive = Vec::new();
    let mut negative = Vec::new();
    let mut ordinary = Vec::new();

    for row in rows {
        let transaction = import_transaction(store, row)?;
        if is_owned(store, transaction.source_id) && is_owned(store, transaction.destination_id) {
            if row.amount.is_sign_negative() {
                negative.push(transaction);
            } else {
                positive.push(transaction);
            }
        } else {
            ordinary.push(transaction);
        }
    }

    let combine = |a: &mut Transaction, b: &Transaction| {
        a.description = format!("{} - {}", a.description, b.description);
    };
    let outcome = merge(&mut positive, negative, |_, _| true, combine);
    if !outcome.left_remainder.is_empty() || !outcome.right_remainder.is_empty() {
        return Err(Error::UnmatchedTransfer(outcome.left_remainder.len() + outcome.right_remainder.len()));
    }

    positive.extend(ordinary);
    Ok(positive)
}
