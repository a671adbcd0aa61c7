//! The feed cache (§6): a `{id text primary key, data json}` SQL table
//! holding the raw Akahu records, so a run can replay without reaching the
//! feed provider again.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Row, Sqlite};

use reconcile_core::feed_import::{FeedConversion, FeedTransactionRow};

use crate::error::ServiceError;

#[async_trait]
pub trait FeedSource {
    async fn fetch_cached_transactions(&self) -> Result<Vec<FeedTransactionRow>, ServiceError>;
    async fn upsert_cache_entry(&self, id: &str, data: &serde_json::Value) -> Result<(), ServiceError>;
}

/// Decode one cached Akahu record into the shape the feed importer consumes.
/// Only the fields named in §6 are read; everything else in the record is
/// ignored.
fn decode_feed_row(data: &serde_json::Value) -> Result<FeedTransactionRow, ServiceError> {
    let field = |name: &str| -> Result<&serde_json::Value, ServiceError> {
        data.get(name)
            .ok_or_else(|| ServiceError::Database(format!("cached feed record missing field {name}")))
    };
    let as_str = |value: &serde_json::Value, name: &str| -> Result<String, ServiceError> {
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ServiceError::Database(format!("cached feed record field {name} is not a string")))
    };

    let id = as_str(field("_id")?, "_id")?;
    let account_id = as_str(field("_account")?, "_account")?;
    let amount: Decimal = field("amount")?
        .as_f64()
        .ok_or_else(|| ServiceError::Database("cached feed record field amount is not a number".into()))?
        .try_into()
        .map_err(|e| ServiceError::Database(format!("cached feed record field amount out of range: {e}")))?;
    let date: DateTime<Utc> = as_str(field("date")?, "date")?
        .parse()
        .map_err(|e| ServiceError::Database(format!("cached feed record field date is not RFC3339: {e}")))?;
    let description = as_str(field("description")?, "description")?;

    let merchant_id = data
        .get("merchant")
        .and_then(|m| m.get("_id"))
        .and_then(|v| v.as_str())
        .map(str::to_string);
    let meta = data.get("meta");
    let meta_str = |name: &str| meta.and_then(|m| m.get(name)).and_then(|v| v.as_str()).map(str::to_string);
    let other_party_account_number = meta_str("other_account");
    let reference = meta_str("reference");
    let particulars = meta_str("particulars");
    let code = meta_str("code");
    let conversion = meta
        .and_then(|m| m.get("conversion"))
        .and_then(|c| {
            let currency = c.get("currency")?.as_str()?.to_string();
            let amount = Decimal::try_from(c.get("amount")?.as_f64()?).ok()?;
            Some(FeedConversion { currency, amount, rate: None, fee: None })
        });
    let category_name = data
        .get("category")
        .and_then(|c| c.get("groups"))
        .and_then(|g| g.get("personal_finance"))
        .and_then(|p| p.get("name"))
        .and_then(|v| v.as_str())
        .map(str::to_string);

    Ok(FeedTransactionRow {
        id,
        account_id,
        amount,
        date,
        description,
        merchant_id,
        other_party_account_number,
        reference,
        particulars,
        code,
        conversion,
        category_name,
    })
}

pub struct SqlxFeedSource {
    pool: Pool<Sqlite>,
}

impl SqlxFeedSource {
    pub async fn connect(database_url: &str) -> Result<Self, ServiceError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(database_url)
            .await
            .map_err(|e| ServiceError::Database(format!("failed to connect to feed cache database: {e}")))?;
        sqlx::query(r#"CREATE TABLE IF NOT EXISTS feed_cache (id TEXT PRIMARY KEY, data TEXT NOT NULL)"#)
            .execute(&pool)
            .await
            .map_err(|e| ServiceError::Database(format!("failed to create feed cache table: {e}")))?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl FeedSource for SqlxFeedSource {
    async fn fetch_cached_transactions(&self) -> Result<Vec<FeedTransactionRow>, ServiceError> {
        let rows = sqlx::query("SELECT data FROM feed_cache")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ServiceError::Database(format!("failed to fetch feed cache: {e}")))?;

        rows.iter()
            .map(|row| {
                let raw: String = row.get("data");
                let value: serde_json::Value = serde_json::from_str(&raw)
                    .map_err(|e| ServiceError::Database(format!("cached feed record is not valid JSON: {e}")))?;
                decode_feed_row(&value)
            })
            .collect()
    }

    async fn upsert_cache_entry(&self, id: &str, data: &serde_json::Value) -> Result<(), ServiceError> {
        sqlx::query("INSERT INTO feed_cache (id, data) VALUES (?1, ?2) ON CONFLICT(id) DO UPDATE SET data = ?2")
            .bind(id)
            .bind(data.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| ServiceError::Database(format!("failed to upsert feed cache entry {id}: {e}")))?;
        Ok(())
    }
}
