//! End-to-end scenarios exercising the full ledger-import → feed-import →
//! merge → export pipeline against the public API.

use reconcile_core::export::{export_accounts, LedgerWriteClient};
use reconcile_core::feed_import::{self, FeedTransactionRow};
use reconcile_core::ledger_import::{self, LedgerAccountRow, LedgerTransactionRow};
use reconcile_core::merge::merge_default;
use reconcile_core::{AccountStore, AccountType, TransactionStore};

use rust_decimal_macros::dec;
use std::sync::Mutex;

#[derive(Default)]
struct NullClient {
    account_creates: Mutex<usize>,
}

#[async_trait::async_trait]
impl LedgerWriteClient for NullClient {
    async fn create_account(
        &self,
        _write: &reconcile_core::export::AccountWrite,
    ) -> Result<String, String> {
        *self.account_creates.lock().unwrap() += 1;
        Ok("new".into())
    }
    async fn update_account(&self, _write: &reconcile_core::export::AccountWrite) -> Result<(), String> {
        Ok(())
    }
    async fn create_transaction(
        &self,
        _write: &reconcile_core::export::TransactionWrite,
    ) -> Result<String, String> {
        Ok("new".into())
    }
    async fn update_transaction(
        &self,
        _write: &reconcile_core::export::TransactionWrite,
    ) -> Result<(), String> {
        Ok(())
    }
}

fn asset_row(id: i64, name: &str, akahu_id: &str) -> LedgerAccountRow {
    LedgerAccountRow {
        id,
        account_type: "Asset account".into(),
        name: name.into(),
        iban: None,
        account_number: None,
        external_id: None,
        notes: Some(format!("**Akahu ID** `{}`", akahu_id)),
    }
}

fn feed_deposit(id: &str, account_id: &str, amount: rust_decimal::Decimal, date: &str, description: &str) -> FeedTransactionRow {
    FeedTransactionRow {
        id: id.into(),
        account_id: account_id.into(),
        amount,
        date: date.parse().unwrap(),
        description: description.into(),
        merchant_id: None,
        other_party_account_number: None,
        reference: None,
        particulars: None,
        code: None,
        conversion: None,
        category_name: None,
    }
}

/// S1: fresh ledger, one feed deposit — a Revenue counterparty is produced
/// and the deposit lands with the owned account as destination.
#[test]
fn s1_fresh_ledger_one_feed_deposit() {
    let mut accounts = AccountStore::new();
    ledger_import::import_account(&mut accounts, &asset_row(1, "A", "acc_X")).unwrap();

    let rows = vec![feed_deposit("trans_A1", "acc_X", dec!(50.00), "2024-01-02T10:30:00Z", "Coffee shop")];
    let transactions = feed_import::import_transactions(&mut accounts, &rows).unwrap();

    assert_eq!(transactions.len(), 1);
    let txn = &transactions[0];
    assert_eq!(txn.amount, dec!(50.00));
    assert_eq!(txn.akahu_ids, std::collections::BTreeSet::from(["trans_A1".to_string()]));
    let source = accounts.get(txn.source_id).unwrap();
    assert!(source.has_role(AccountType::Revenue));
    let destination = accounts.get(txn.destination_id).unwrap();
    assert_eq!(destination.external_id(), Some("1"));
}

/// S2: running the same feed/ledger pair twice from fresh stores is
/// idempotent, and a zero-change export writes nothing.
#[tokio::test]
async fn s2_duplicate_import_is_idempotent_and_export_is_empty() {
    let run = || {
        let mut accounts = AccountStore::new();
        ledger_import::import_account(&mut accounts, &asset_row(1, "A", "acc_X")).unwrap();
        let rows = vec![feed_deposit("trans_A1", "acc_X", dec!(50.00), "2024-01-02T10:30:00Z", "Coffee shop")];
        let transactions = feed_import::import_transactions(&mut accounts, &rows).unwrap();
        (accounts, transactions)
    };

    let (accounts_a, transactions_a) = run();
    let (accounts_b, transactions_b) = run();

    assert_eq!(accounts_a.iter().collect::<Vec<_>>(), accounts_b.iter().collect::<Vec<_>>());
    assert_eq!(transactions_a, transactions_b);

    let original = accounts_a.duplicate();
    let client = NullClient::default();
    export_accounts(&original, &accounts_a, &client, false).await;
    assert_eq!(*client.account_creates.lock().unwrap(), 0);
}

/// S3: two feed rows describing one internal transfer fuse into a single
/// Transaction with both akahuIds, one unified amount, and the nonzero-minute
/// leg's date.
#[test]
fn s3_internal_transfer_fusion() {
    let mut accounts = AccountStore::new();
    ledger_import::import_account(&mut accounts, &asset_row(1, "Checking", "acc_X")).unwrap();
    ledger_import::import_account(&mut accounts, &asset_row(2, "Savings", "acc_Y")).unwrap();

    let rows = vec![
        feed_deposit("trans_T-", "acc_X", dec!(-200), "2024-02-03T09:00:00Z", "to savings"),
        feed_deposit("trans_T+", "acc_Y", dec!(200), "2024-02-03T09:01:00Z", "from chq"),
    ];
    let transactions = feed_import::import_transactions(&mut accounts, &rows).unwrap();

    assert_eq!(transactions.len(), 1);
    let fused = &transactions[0];
    assert_eq!(fused.amount, dec!(200));
    assert_eq!(
        fused.akahu_ids,
        std::collections::BTreeSet::from(["trans_T-".to_string(), "trans_T+".to_string()])
    );
    assert_eq!(fused.date.format("%H:%M").to_string(), "09:01");
}

/// S4: a ledger transaction tagged with an akahuId is recognised by the
/// merger and the fused record carries the ledger's fireflyId.
#[test]
fn s4_ledger_transaction_tagged_with_akahu_id_is_recognised() {
    let mut accounts = AccountStore::new();
    let source = ledger_import::import_account(&mut accounts, &asset_row(1, "Checking", "acc_X"))
        .unwrap()
        .unwrap();
    let destination_row = LedgerAccountRow {
        id: 2,
        account_type: "Expense account".into(),
        name: "Coffee".into(),
        iban: None,
        account_number: None,
        external_id: None,
        notes: None,
    };
    let destination = ledger_import::import_account(&mut accounts, &destination_row).unwrap().unwrap();

    let mut ledger_transactions = TransactionStore::new();
    let ledger_row = LedgerTransactionRow {
        id: 77,
        description: "Coffee run".into(),
        date: "2024-03-01T08:00:00Z".parse().unwrap(),
        amount: dec!(4.50),
        source_id: 1,
        destination_id: 2,
        foreign_amount: None,
        foreign_currency_code: None,
        external_id: Some("trans_A1,other_tag".into()),
        category_name: None,
    };
    ledger_import::import_transaction(&accounts, &mut ledger_transactions, &ledger_row).unwrap();

    let mut self_pool: Vec<_> = ledger_transactions.iter().collect();
    let feed_transaction = {
        let mut feed_accounts = accounts.duplicate();
        let rows = vec![feed_deposit("trans_A1", "acc_X", dec!(-4.50), "2024-03-01T08:00:00Z", "Coffee run")];
        feed_import::import_transactions(&mut feed_accounts, &rows).unwrap()
    };

    let outcome = merge_default(&mut self_pool, feed_transaction);
    assert!(outcome.left_remainder.is_empty());
    assert!(outcome.right_remainder.is_empty());
    assert_eq!(self_pool.len(), 1);
    let fused = &self_pool[0];
    assert_eq!(fused.firefly_id.as_deref(), Some("77"));
    assert!(fused.akahu_ids.contains("trans_A1"));
    assert_eq!(fused.source_id, source.id);
    assert_eq!(fused.destination_id, destination.id);
}

/// S5: a feed credit that fuzzy-matches an Expense-only account gets its
/// Revenue role attached to that same account, never a second one.
#[test]
fn s5_role_promotion_reuses_single_account() {
    let mut accounts = AccountStore::new();
    ledger_import::import_account(&mut accounts, &asset_row(1, "Checking", "acc_X")).unwrap();
    let coffee_row = LedgerAccountRow {
        id: 2,
        account_type: "Expense account".into(),
        name: "Coffee".into(),
        iban: None,
        account_number: None,
        external_id: None,
        notes: None,
    };
    let coffee = ledger_import::import_account(&mut accounts, &coffee_row).unwrap().unwrap();

    let rows = vec![feed_deposit("trans_C1", "acc_X", dec!(12.00), "2024-04-01T09:00:00Z", "Coffee")];
    let transactions = feed_import::import_transactions(&mut accounts, &rows).unwrap();

    assert_eq!(transactions[0].source_id, coffee.id);
    let promoted = accounts.get(coffee.id).unwrap();
    assert!(promoted.has_role(AccountType::Expense));
    assert!(promoted.has_role(AccountType::Revenue));
    assert_eq!(accounts.len(), 2);
}

/// S6: an ambiguous ledger account whose identifiers match two different
/// existing accounts raises AccountConflict naming both.
#[test]
fn s6_account_conflict_on_ambiguous_match() {
    let mut accounts = AccountStore::new();
    let mut first = asset_row(1, "Checking", "acc_X");
    first.account_number = Some("1-2-3-4".into());
    ledger_import::import_account(&mut accounts, &first).unwrap();

    let mut second = asset_row(2, "Default", "acc_Y");
    second.account_number = Some("5-6-7-8".into());
    ledger_import::import_account(&mut accounts, &second).unwrap();

    let mut conflict = asset_row(3, "Default", "acc_Z");
    conflict.account_number = Some("1-2-3-4".into());
    let err = ledger_import::import_account(&mut accounts, &conflict).unwrap_err();
    assert!(matches!(err, reconcile_core::Error::AccountConflict { .. }));
}
