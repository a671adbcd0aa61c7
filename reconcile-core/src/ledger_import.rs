//! The Ledger Importer (§4.4): transforms raw ledger rows into `Account`s and
//! `Transaction`s, merging ambiguous Expense/Revenue duplicates and parsing
//! identity hints embedded in free-text notes.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::account::{Account, AccountType, Role};
use crate::account_store::AccountStore;
use crate::error::{Error, Result};
use crate::identity::canonicalize_bank_number;
use crate::money::Money;
use crate::transaction::Transaction;
use crate::transaction_store::TransactionStore;

/// One account row as produced by the (out-of-scope) SQL reader.
///
/// `external_id` is the row's own nullable reference column; it is not
/// consulted here; the candidate's role `externalId` is always derived from
/// `id`, which is what transaction rows resolve against.
#[derive(Debug, Clone)]
pub struct LedgerAccountRow {
    pub id: i64,
    pub account_type: String,
    pub name: String,
    pub iban: Option<String>,
    pub account_number: Option<String>,
    pub external_id: Option<String>,
    pub notes: Option<String>,
}

/// One transaction row as produced by the (out-of-scope) SQL reader.
#[derive(Debug, Clone)]
pub struct LedgerTransactionRow {
    pub id: i64,
    pub description: String,
    pub date: DateTime<Utc>,
    pub amount: Money,
    pub source_id: i64,
    pub destination_id: i64,
    pub foreign_amount: Option<Money>,
    pub foreign_currency_code: Option<String>,
    pub external_id: Option<String>,
    pub category_name: Option<String>,
}

/// Fixed mapping from the ledger's account-type string to our four-way type.
/// Rows whose type falls outside this table are dropped.
fn map_account_type(raw: &str) -> Option<AccountType> {
    match raw {
        "Asset account" | "Default account" => Some(AccountType::Asset),
        "Liability" | "Liabilities" | "Debt" | "Loan" | "Mortgage" => Some(AccountType::Liability),
        "Expense account" => Some(AccountType::Expense),
        "Revenue account" => Some(AccountType::Revenue),
        _ => None,
    }
}

static AKAHU_ID_NOTE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*Akahu ID\*\* `([^`]+)`").unwrap());
static ALTERNATE_NAMES_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)\*\*Alternate names\*\*((?:\n-\s*`[^`]+`)+)").unwrap());
static ALTERNATE_NAME_ITEM: Lazy<Regex> = Lazy::new(|| Regex::new(r"`([^`]+)`").unwrap());

fn extract_akahu_id(notes: &str) -> Option<String> {
    AKAHU_ID_NOTE.captures(notes).map(|c| c[1].to_string())
}

fn extract_alternate_names(notes: &str) -> Vec<String> {
    let Some(captures) = ALTERNATE_NAMES_BLOCK.captures(notes) else {
        return Vec::new();
    };
    ALTERNATE_NAME_ITEM
        .captures_iter(&captures[1])
        .map(|c| c[1].to_string())
        .collect()
}

fn parse_bank_numbers(field: &str) -> BTreeSet<String> {
    field
        .split(',')
        .filter_map(|item| canonicalize_bank_number(item.trim()))
        .collect()
}

/// Build the candidate account for one ledger account row, or `None` if its
/// type is outside the fixed mapping table.
fn build_candidate_account(row: &LedgerAccountRow) -> Option<Account> {
    let account_type = map_account_type(&row.account_type)?;
    let mut account = Account::candidate(&row.name);

    if let Some(notes) = &row.notes {
        if let Some(akahu_id) = extract_akahu_id(notes) {
            account.akahu_id = Some(akahu_id);
        }
        for alternate in extract_alternate_names(notes) {
            account.add_alternate_name(&alternate);
        }
        account.notes = Some(notes.clone());
    }

    for field in [&row.iban, &row.account_number].into_iter().flatten() {
        account.bank_numbers.extend(parse_bank_numbers(field));
    }

    let external_id = row.id.to_string();
    match account_type {
        AccountType::Asset | AccountType::Liability => {
            account.source = Some(Role { external_id: Some(external_id.clone()), account_type, notes: None });
            account.destination = Some(Role { external_id: Some(external_id), account_type, notes: None });
        }
        AccountType::Expense => {
            account.destination = Some(Role { external_id: Some(external_id), account_type, notes: None });
        }
        AccountType::Revenue => {
            account.source = Some(Role { external_id: Some(external_id), account_type, notes: None });
        }
    }
    Some(account)
}

fn roles_compatible(a: &Option<Role>, b: &Option<Role>) -> bool {
    match (a, b) {
        (Some(x), Some(y)) => x.account_type == y.account_type,
        _ => true,
    }
}

/// §4.4.1: can `existing` absorb `candidate` under the Expense/Revenue
/// promotion rule?
fn can_merge(existing: &Account, candidate: &Account) -> bool {
    if existing.normalized_primary_name() != candidate.normalized_primary_name() {
        return false;
    }
    let external_ids_compatible = match (existing.external_id(), candidate.external_id()) {
        (Some(a), Some(b)) => a == b,
        _ => true,
    };
    external_ids_compatible
        && roles_compatible(&existing.source, &candidate.source)
        && roles_compatible(&existing.destination, &candidate.destination)
}

fn merge_accounts(existing: &Account, candidate: &Account) -> Account {
    let mut merged = existing.clone();
    for (key, value) in &candidate.alternate_names {
        merged.alternate_names.entry(key.clone()).or_insert_with(|| value.clone());
    }
    for bank_number in &candidate.bank_numbers {
        merged.bank_numbers.insert(bank_number.clone());
    }
    if merged.akahu_id.is_none() {
        merged.akahu_id = candidate.akahu_id.clone();
    }
    if merged.notes.is_none() {
        merged.notes = candidate.notes.clone();
    }
    if merged.source.is_none() {
        merged.source = candidate.source.clone();
    }
    if merged.destination.is_none() {
        merged.destination = candidate.destination.clone();
    }
    merged
}

/// Import one ledger account row into `store`. Resolution follows §4.4 step 6.
pub fn import_account(store: &mut AccountStore, row: &LedgerAccountRow) -> Result<Option<Account>> {
    let Some(candidate) = build_candidate_account(row) else {
        return Ok(None);
    };

    let mut matches: Vec<Account> = Vec::new();
    let mut seen_ids = BTreeSet::new();
    let mut push_match = |account: Option<Account>, matches: &mut Vec<Account>| {
        if let Some(account) = account {
            if seen_ids.insert(account.id) {
                matches.push(account);
            }
        }
    };

    for name in candidate.normalized_names() {
        push_match(store.get_by_name(name), &mut matches);
    }
    for bank_number in &candidate.bank_numbers {
        push_match(store.get_by_bank_number(bank_number), &mut matches);
    }
    if let Some(external_id) = candidate.external_id() {
        push_match(store.get_by_external_id(external_id), &mut matches);
    }

    match matches.as_slice() {
        [] => Ok(Some(store.create(candidate)?)),
        [existing]
            if matches!(candidate.source.as_ref().or(candidate.destination.as_ref()).map(|r| r.account_type), Some(AccountType::Expense) | Some(AccountType::Revenue))
                && can_merge(existing, &candidate) =>
        {
            let merged = merge_accounts(existing, &candidate);
            store.save(merged.clone())?;
            Ok(Some(merged))
        }
        _ => Err(Error::AccountConflict {
            candidate: candidate.dump(),
            matches: matches.iter().map(Account::dump).collect(),
        }),
    }
}

/// Import every account row, logging-and-skipping on `DuplicateKey` (two rows
/// that resolve to the same secondary key) per §7.
pub fn import_accounts(store: &mut AccountStore, rows: &[LedgerAccountRow]) -> Result<()> {
    for row in rows {
        match import_account(store, row) {
            Ok(_) => {}
            Err(Error::DuplicateKey { entity, key }) => {
                tracing::warn!(entity, key, "skipping duplicate account during ledger import");
            }
            Err(other) => return Err(other),
        }
    }
    Ok(())
}

fn parse_akahu_ids(external_id_list: &str) -> BTreeSet<String> {
    external_id_list
        .split(',')
        .map(str::trim)
        .filter(|id| id.starts_with("trans_"))
        .map(str::to_string)
        .collect()
}

/// Import one ledger transaction row into `store`.
pub fn import_transaction(
    account_store: &AccountStore,
    transaction_store: &mut TransactionStore,
    row: &LedgerTransactionRow,
) -> Result<Transaction> {
    let source = account_store
        .get_by_external_id(&row.source_id.to_string())
        .ok_or_else(|| Error::MissingAccount(row.source_id.to_string()))?;
    let destination = account_store
        .get_by_external_id(&row.destination_id.to_string())
        .ok_or_else(|| Error::MissingAccount(row.destination_id.to_string()))?;

    let mut candidate =
        Transaction::candidate(row.description.clone(), row.date, row.amount.abs(), source.id, destination.id);
    candidate.firefly_id = Some(row.id.to_string());
    if let Some(external_id_list) = &row.external_id {
        candidate.akahu_ids = parse_akahu_ids(external_id_list);
    }
    candidate.foreign_amount = row.foreign_amount;
    candidate.foreign_currency_code = row.foreign_currency_code.clone();
    candidate.category_name = row.category_name.clone();

    transaction_store.create(candidate)
}

/// Import every transaction row, logging-and-skipping on `DuplicateKey` per §7.
pub fn import_transactions(
    account_store: &AccountStore,
    transaction_store: &mut TransactionStore,
    rows: &[LedgerTransactionRow],
) -> Result<()> {
    for row in rows {
        match import_transaction(account_store, transaction_store, row) {
            Ok(_) => {}
            Err(Error::DuplicateKey { entity, key }) => {
                tracing::warn!(entity, key, "skipping duplicate transaction during ledger import");
            }
            Err(other) => return Err(other),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn asset_row(id: i64, name: &str) -> LedgerAccountRow {
        LedgerAccountRow {
            id,
            account_type: "Asset account".into(),
            name: name.into(),
            iban: None,
            account_number: None,
            external_id: None,
            notes: None,
        }
    }

    fn expense_row(id: i64, name: &str) -> LedgerAccountRow {
        LedgerAccountRow {
            id,
            account_type: "Expense account".into(),
            name: name.into(),
            iban: None,
            account_number: None,
            external_id: None,
            notes: None,
        }
    }

    #[test]
    fn unmapped_type_is_dropped() {
        let mut store = AccountStore::new();
        let row = LedgerAccountRow {
            id: 1,
            account_type: "Cash account".into(),
            name: "Wallet".into(),
            iban: None,
            account_number: None,
            external_id: None,
            notes: None,
        };
        assert!(import_account(&mut store, &row).unwrap().is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn fresh_account_is_created() {
        let mut store = AccountStore::new();
        let account = import_account(&mut store, &asset_row(1, "Checking")).unwrap().unwrap();
        assert_eq!(account.external_id(), Some("1"));
    }

    #[test]
    fn akahu_id_and_alternate_names_parsed_from_notes() {
        let mut store = AccountStore::new();
        let row = LedgerAccountRow {
            id: 1,
            account_type: "Asset account".into(),
            name: "Checking".into(),
            iban: None,
            account_number: None,
            external_id: None,
            notes: Some(
                "**Akahu ID** `acc_123`\n\n**Alternate names**\n- `Chequing`\n- `Everyday`".into(),
            ),
        };
        let account = import_account(&mut store, &row).unwrap().unwrap();
        assert_eq!(account.akahu_id.as_deref(), Some("acc_123"));
        assert_eq!(account.alternate_names.len(), 3);
    }

    #[test]
    fn bank_numbers_filtered_and_canonicalized() {
        let mut store = AccountStore::new();
        let row = LedgerAccountRow {
            id: 1,
            account_type: "Asset account".into(),
            name: "Checking".into(),
            iban: None,
            account_number: Some("1-2-3-4, not-a-bank-number, 12-34-567-8".into()),
            external_id: None,
            notes: None,
        };
        let account = import_account(&mut store, &row).unwrap().unwrap();
        assert_eq!(account.bank_numbers.len(), 2);
        assert!(account.bank_numbers.contains("01-0002-0000003-004"));
    }

    #[test]
    fn reimporting_same_expense_row_is_idempotent() {
        let mut store = AccountStore::new();
        import_account(&mut store, &expense_row(1, "Coffee")).unwrap();
        let merged = import_account(&mut store, &expense_row(1, "Coffee")).unwrap().unwrap();
        assert_eq!(merged.external_id(), Some("1"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn expense_with_conflicting_external_id_is_rejected() {
        let mut store = AccountStore::new();
        import_account(&mut store, &expense_row(1, "Coffee")).unwrap();
        let err = import_account(&mut store, &expense_row(2, "Coffee")).unwrap_err();
        assert!(matches!(err, Error::AccountConflict { .. }));
    }

    #[test]
    fn conflicting_match_raises_account_conflict() {
        let mut store = AccountStore::new();
        let mut row_a = asset_row(1, "Default");
        row_a.account_number = Some("1-2-3-4".into());
        store.create(build_candidate_account(&row_a).unwrap()).unwrap();

        let mut other_asset = asset_row(2, "Savings");
        other_asset.account_number = Some("5-6-7-8".into());
        store.create(build_candidate_account(&other_asset).unwrap()).unwrap();

        let mut conflict_row = asset_row(3, "Default");
        conflict_row.account_number = Some("5-6-7-8".into());
        let err = import_account(&mut store, &conflict_row).unwrap_err();
        assert!(matches!(err, Error::AccountConflict { .. }));
    }

    #[test]
    fn transaction_parses_trans_prefixed_akahu_ids_and_keeps_firefly_id() {
        let mut accounts = AccountStore::new();
        let source = import_account(&mut accounts, &asset_row(1, "Checking")).unwrap().unwrap();
        let dest = import_account(&mut accounts, &expense_row(2, "Coffee")).unwrap().unwrap();

        let mut transactions = TransactionStore::new();
        let row = LedgerTransactionRow {
            id: 99,
            description: "Coffee run".into(),
            date: Utc::now(),
            amount: dec!(-4.50),
            source_id: source.external_id().unwrap().parse().unwrap(),
            destination_id: dest.external_id().unwrap().parse().unwrap(),
            foreign_amount: None,
            foreign_currency_code: None,
            external_id: Some("trans_A1,other_tag".into()),
            category_name: None,
        };
        let txn = import_transaction(&accounts, &mut transactions, &row).unwrap();
        assert_eq!(txn.firefly_id.as_deref(), Some("99"));
        assert_eq!(txn.akahu_ids, BTreeSet::from(["trans_A1".to_string()]));
        assert_eq!(txn.amount, dec!(4.50));
    }

    #[test]
    fn transaction_with_missing_account_fails() {
        let accounts = AccountStore::new();
        let mut transactions = TransactionStore::new();
        let row = LedgerTransactionRow {
            id: 1,
            description: "x".into(),
            date: Utc::now(),
            amount: dec!(1),
            source_id: 1,
            destination_id: 2,
            foreign_amount: None,
            foreign_currency_code: None,
            external_id: None,
            category_name: None,
        };
        assert!(matches!(import_transaction(&accounts, &mut transactions, &row), Err(Error::MissingAccount(_))));
    }
}
