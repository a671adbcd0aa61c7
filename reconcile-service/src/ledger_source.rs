//! Read-only access to the ledger database (§6): yields the rows the core's
//! ledger importer consumes. Soft-deleted rows are filtered by the query, not
//! by the caller.

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Row, Sqlite};

use reconcile_core::{LedgerAccountRow, LedgerTransactionRow};

use crate::error::ServiceError;

#[async_trait]
pub trait LedgerSource {
    async fn fetch_accounts(&self) -> Result<Vec<LedgerAccountRow>, ServiceError>;
    async fn fetch_transactions(&self) -> Result<Vec<LedgerTransactionRow>, ServiceError>;
}

/// `sqlx`-backed reader over the ledger's own database.
pub struct SqlxLedgerSource {
    pool: Pool<Sqlite>,
}

impl SqlxLedgerSource {
    pub async fn connect(database_url: &str) -> Result<Self, ServiceError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(database_url)
            .await
            .map_err(|e| ServiceError::Database(format!("failed to connect to ledger database: {e}")))?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl LedgerSource for SqlxLedgerSource {
    async fn fetch_accounts(&self) -> Result<Vec<LedgerAccountRow>, ServiceError> {
        let rows = sqlx::query(
            r#"
            SELECT id, type, name, iban, account_number, external_id, notes
            FROM accounts
            WHERE deleted_at IS NULL
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ServiceError::Database(format!("failed to fetch ledger accounts: {e}")))?;

        Ok(rows
            .iter()
            .map(|row| LedgerAccountRow {
                id: row.get("id"),
                account_type: row.get("type"),
                name: row.get("name"),
                iban: row.get("iban"),
                account_number: row.get("account_number"),
                external_id: row.get("external_id"),
                notes: row.get("notes"),
            })
            .collect())
    }

    async fn fetch_transactions(&self) -> Result<Vec<LedgerTransactionRow>, ServiceError> {
        let rows = sqlx::query(
            r#"
            SELECT id, description, date, amount, source_id, destination_id,
                   foreign_amount, foreign_currency_code, external_id, category_name
            FROM transactions
            WHERE deleted_at IS NULL
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ServiceError::Database(format!("failed to fetch ledger transactions: {e}")))?;

        Ok(rows
            .iter()
            .map(|row| LedgerTransactionRow {
                id: row.get("id"),
                description: row.get("description"),
                date: row.get("date"),
                amount: row.get("amount"),
                source_id: row.get("source_id"),
                destination_id: row.get("destination_id"),
                foreign_amount: row.get("foreign_amount"),
                foreign_currency_code: row.get("foreign_currency_code"),
                external_id: row.get("external_id"),
                category_name: row.get("category_name"),
            })
            .collect())
    }
}
