//! The linear reconciliation run (§2, §5): open connections, import the
//! ledger, snapshot, import the feed, merge, export, done. One pass,
//! single-threaded apart from the three suspension points named in §5.

use reconcile_core::{
    export_accounts, export_transactions, feed_import, ledger_import, merge_default,
    synthesize_missing_roles, AccountStore, LedgerWriteClient, Transaction, TransactionStore,
};

use crate::error::ServiceError;
use crate::feed_source::FeedSource;
use crate::ledger_source::LedgerSource;
use crate::config::Settings;

/// Apply a merged pool back onto a `TransactionStore`: fused and
/// still-unmatched ledger transactions already carry a store id and go
/// through `save`; newly created feed-only transactions carry id 0 and go
/// through `create`.
fn apply_merged_pool(store: &mut TransactionStore, pool: Vec<Transaction>) -> Result<(), ServiceError> {
    for transaction in pool {
        if transaction.id == 0 {
            store.create(transaction)?;
        } else {
            store.save(transaction)?;
        }
    }
    Ok(())
}

pub async fn run(
    settings: &Settings,
    ledger_source: &dyn LedgerSource,
    feed_source: &dyn FeedSource,
    client: &dyn LedgerWriteClient,
) -> Result<(), ServiceError> {
    tracing::info!("importing ledger accounts and transactions");
    let account_rows = ledger_source.fetch_accounts().await?;
    let transaction_rows = ledger_source.fetch_transactions().await?;

    let mut accounts = AccountStore::new();
    ledger_import::import_accounts(&mut accounts, &account_rows)?;

    let mut transactions = TransactionStore::new();
    ledger_import::import_transactions(&accounts, &mut transactions, &transaction_rows)?;

    let original_accounts = accounts.duplicate();
    let original_transactions = transactions.duplicate();

    if settings.load_akahu_data {
        tracing::warn!("LOAD_AKAHU_DATA is set but no live feed provider is wired; using the cache only");
    }
    tracing::info!("importing cached feed transactions");
    let feed_rows = feed_source.fetch_cached_transactions().await?;
    let feed_transactions = feed_import::import_transactions(&mut accounts, &feed_rows)?;

    tracing::info!(ledger = transactions.len(), feed = feed_transactions.len(), "merging");
    let mut pool: Vec<Transaction> = transactions.iter().collect();
    merge_default(&mut pool, feed_transactions);
    apply_merged_pool(&mut transactions, pool)?;

    synthesize_missing_roles(&transactions, &mut accounts)?;

    tracing::info!(dry_run = settings.dry_run, "exporting");
    export_accounts(&original_accounts, &accounts, client, settings.dry_run).await;
    export_transactions(&original_transactions, &transactions, &accounts, client, settings.dry_run).await?;

    Ok(())
}
