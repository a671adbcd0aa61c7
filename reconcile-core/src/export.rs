//! The Exporter / Diff Emitter (§4.7): compares an original snapshot against
//! the working state and emits the minimal set of create/update requests.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::account::{Account, AccountType, Role};
use crate::account_store::AccountStore;
use crate::error::{Error, Result};
use crate::transaction::Transaction;
use crate::transaction_store::TransactionStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionKind {
    Transfer,
    Withdrawal,
    Deposit,
}

/// §4.7 kind table: a pure function of (sourceType, destinationType).
fn kind_of(source_type: AccountType, destination_type: AccountType) -> Result<TransactionKind> {
    use AccountType::*;
    use TransactionKind::*;
    match (source_type, destination_type) {
        (Asset, Asset) => Ok(Transfer),
        (Asset, Liability) => Ok(Withdrawal),
        (Asset, Expense) => Ok(Withdrawal),
        (Liability, Asset) => Ok(Deposit),
        (Liability, Liability) => Ok(Transfer),
        (Liability, Expense) => Ok(Withdrawal),
        (Revenue, Asset) => Ok(Deposit),
        (Revenue, Liability) => Ok(Deposit),
        _ => Err(Error::InvalidTransactionKind { source_type, destination_type }),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountPayload {
    pub name: String,
    pub bank_number: String,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionPayload {
    pub kind: TransactionKind,
    pub akahu_ids: String,
    pub description: String,
    pub date: String,
    pub amount: String,
    pub source_external_id: String,
    pub destination_external_id: String,
    pub foreign_amount: Option<String>,
    pub foreign_currency_code: Option<String>,
    pub category_name: Option<String>,
}

#[derive(Debug)]
pub enum AccountWrite {
    Create { account_type: AccountType, payload: AccountPayload },
    Update { external_id: String, payload: AccountPayload },
}

#[derive(Debug)]
pub enum TransactionWrite {
    Create { payload: TransactionPayload },
    Update { external_id: String, payload: TransactionPayload },
}

/// The out-of-scope HTTPS client the core writes through (§6). Bearer-token
/// auth and the wire format are the service crate's concern.
#[async_trait]
pub trait LedgerWriteClient {
    async fn create_account(&self, write: &AccountWrite) -> std::result::Result<String, String>;
    async fn update_account(&self, write: &AccountWrite) -> std::result::Result<(), String>;
    async fn create_transaction(&self, write: &TransactionWrite) -> std::result::Result<String, String>;
    async fn update_transaction(&self, write: &TransactionWrite) -> std::result::Result<(), String>;
}

static STRIP_AKAHU_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:\n\n)?\*\*Akahu ID\*\* `[^`]+`").unwrap());
static STRIP_ALTERNATE_NAMES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:\n\n)?\*\*Alternate names\*\*(?:\n-\s*`[^`]+`)+").unwrap());

fn rebuild_notes(account: &Account) -> String {
    let existing = account.notes.clone().unwrap_or_default();
    let stripped = STRIP_ALTERNATE_NAMES.replace_all(&STRIP_AKAHU_ID.replace_all(&existing, ""), "");
    let mut notes = stripped.trim().to_string();

    if let Some(akahu_id) = &account.akahu_id {
        notes.push_str(&format!("\n\n**Akahu ID** `{}`", akahu_id.replace('`', "'")));
    }

    let primary = account.normalized_primary_name();
    let alternates: Vec<&String> = account
        .alternate_names
        .iter()
        .filter(|(normalized, _)| *normalized != &primary)
        .map(|(_, original)| original)
        .collect();
    if !alternates.is_empty() {
        notes.push_str("\n\n**Alternate names**");
        for name in alternates {
            notes.push_str(&format!("\n- `{}`", name.replace('`', "'")));
        }
    }
    notes
}

fn account_payload(account: &Account) -> AccountPayload {
    let bank_number = account.bank_numbers.iter().cloned().collect::<Vec<_>>().join(",");
    AccountPayload { name: account.name.clone(), bank_number, notes: rebuild_notes(account) }
}

fn transaction_payload(transaction: &Transaction, accounts: &AccountStore) -> Result<TransactionPayload> {
    let source = accounts
        .get(transaction.source_id)
        .ok_or(Error::MissingAccount(transaction.source_id.to_string()))?;
    let destination = accounts
        .get(transaction.destination_id)
        .ok_or(Error::MissingAccount(transaction.destination_id.to_string()))?;

    let source_type = source
        .source
        .as_ref()
        .map(|r| r.account_type)
        .ok_or(Error::MissingAccount(transaction.source_id.to_string()))?;
    let destination_type = destination
        .destination
        .as_ref()
        .map(|r| r.account_type)
        .ok_or(Error::MissingAccount(transaction.destination_id.to_string()))?;

    let kind = kind_of(source_type, destination_type)?;
    let akahu_ids = transaction.akahu_ids.iter().cloned().collect::<Vec<_>>().join(",");

    Ok(TransactionPayload {
        kind,
        akahu_ids,
        description: transaction.description.clone(),
        date: transaction.date.to_rfc3339(),
        amount: transaction.amount.to_string(),
        source_external_id: source.external_id().unwrap_or_default().to_string(),
        destination_external_id: destination.external_id().unwrap_or_default().to_string(),
        foreign_amount: transaction.foreign_amount.map(|a| a.to_string()),
        foreign_currency_code: transaction.foreign_currency_code.clone(),
        category_name: transaction.category_name.clone(),
    })
}

/// §4.7 pre-pass: synthesize a missing role on each modified transaction's
/// referenced accounts so the kind table always resolves.
pub fn synthesize_missing_roles(transactions: &TransactionStore, accounts: &mut AccountStore) -> Result<()> {
    for transaction in transactions.iter() {
        if let Some(mut source) = accounts.get(transaction.source_id) {
            if source.source.is_none() {
                source.source = Some(Role::new(AccountType::Revenue));
                accounts.save(source)?;
            }
        }
        if let Some(mut destination) = accounts.get(transaction.destination_id) {
            if destination.destination.is_none() {
                destination.destination = Some(Role::new(AccountType::Expense));
                accounts.save(destination)?;
            }
        }
    }
    Ok(())
}

/// Diff `original_accounts` against `modified_accounts` and write the minimal
/// set of create/update requests. `dry_run` suppresses the remote call but
/// keeps comparison and logging.
pub async fn export_accounts(
    original_accounts: &AccountStore,
    modified_accounts: &AccountStore,
    client: &dyn LedgerWriteClient,
    dry_run: bool,
) {
    for account in modified_accounts.iter() {
        let payload = account_payload(&account);
        let original_payload = original_accounts.get(account.id).map(|a| account_payload(&a));
        if original_payload.as_ref() != Some(&payload) {
            if let Some(role) = &account.source {
                emit_account_write(role.external_id.clone(), role.account_type, &payload, client, dry_run).await;
            }
        }
        if let Some(role) = &account.destination {
            if role.account_type == AccountType::Expense {
                let original_matches = original_payload.as_ref() == Some(&payload);
                if !original_matches {
                    emit_account_write(role.external_id.clone(), role.account_type, &payload, client, dry_run).await;
                }
            }
        }
    }
}

async fn emit_account_write(
    external_id: Option<String>,
    account_type: AccountType,
    payload: &AccountPayload,
    client: &dyn LedgerWriteClient,
    dry_run: bool,
) {
    let write = match external_id {
        Some(external_id) => AccountWrite::Update { external_id, payload: payload.clone() },
        None => AccountWrite::Create { account_type, payload: payload.clone() },
    };
    if dry_run {
        tracing::info!(?write, "dry-run: would write account");
        return;
    }
    let outcome = match &write {
        AccountWrite::Update { .. } => client.update_account(&write).await.map(|_| String::new()),
        AccountWrite::Create { .. } => client.create_account(&write).await,
    };
    if let Err(body) = outcome {
        tracing::error!(?write, response = %body, "account write failed, continuing (best-effort export)");
    }
}

/// Diff `original_transactions` against `modified_transactions`, resolving
/// account references through `modified_accounts` for both sides so a change
/// in a referenced account's identity is also detected.
pub async fn export_transactions(
    original_transactions: &TransactionStore,
    modified_transactions: &TransactionStore,
    modified_accounts: &AccountStore,
    client: &dyn LedgerWriteClient,
    dry_run: bool,
) -> Result<()> {
    for transaction in modified_transactions.iter() {
        let new_payload = transaction_payload(&transaction, modified_accounts)?;
        let original_payload = original_transactions
            .get(transaction.id)
            .map(|original| transaction_payload(&original, modified_accounts))
            .transpose()?;

        if original_payload.as_ref() == Some(&new_payload) {
            continue;
        }

        let write = match &transaction.firefly_id {
            Some(external_id) => {
                TransactionWrite::Update { external_id: external_id.clone(), payload: new_payload }
            }
            None => TransactionWrite::Create { payload: new_payload },
        };

        if dry_run {
            tracing::info!(?write, "dry-run: would write transaction");
            continue;
        }
        let outcome = match &write {
            TransactionWrite::Update { .. } => client.update_transaction(&write).await.map(|_| String::new()),
            TransactionWrite::Create { .. } => client.create_transaction(&write).await,
        };
        if let Err(body) = outcome {
            tracing::error!(?write, response = %body, "transaction write failed, continuing (best-effort export)");
        }
    }
    Ok(())
}
