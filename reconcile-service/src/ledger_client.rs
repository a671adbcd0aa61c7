//! The ledger write API client (§6, §4.7): a bearer-token `reqwest` client
//! implementing the core's `LedgerWriteClient` trait.

use async_trait::async_trait;
use reconcile_core::export::{AccountWrite, LedgerWriteClient, TransactionWrite};
use serde_json::json;

pub struct HttpLedgerClient {
    base_path: String,
    api_key: String,
    client: reqwest::Client,
}

impl HttpLedgerClient {
    pub fn new(base_path: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self { base_path: base_path.into(), api_key: api_key.into(), client: reqwest::Client::new() }
    }

    async fn send(&self, method: reqwest::Method, path: &str, body: serde_json::Value) -> Result<String, String> {
        let url = format!("{}{}", self.base_path, path);
        let response = self
            .client
            .request(method, &url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("request to {url} failed: {e}"))?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            let error = crate::error::ServiceError::RemoteWrite { status: status.as_u16(), body: text };
            return Err(error.to_string());
        }
        Ok(text)
    }
}

#[async_trait]
impl LedgerWriteClient for HttpLedgerClient {
    async fn create_account(&self, write: &AccountWrite) -> Result<String, String> {
        let AccountWrite::Create { account_type, payload } = write else {
            return Err("create_account called with an Update write".into());
        };
        let body = json!({
            "name": payload.name,
            "account_number": payload.bank_number,
            "notes": payload.notes,
            "type": format!("{account_type:?}"),
        });
        self.send(reqwest::Method::POST, "/api/v1/accounts", body).await
    }

    async fn update_account(&self, write: &AccountWrite) -> Result<(), String> {
        let AccountWrite::Update { external_id, payload } = write else {
            return Err("update_account called with a Create write".into());
        };
        let body = json!({
            "name": payload.name,
            "account_number": payload.bank_number,
            "notes": payload.notes,
        });
        self.send(reqwest::Method::PUT, &format!("/api/v1/accounts/{external_id}"), body).await.map(|_| ())
    }

    async fn create_transaction(&self, write: &TransactionWrite) -> Result<String, String> {
        let TransactionWrite::Create { payload } = write else {
            return Err("create_transaction called with an Update write".into());
        };
        let body = json!({
            "apply_rules": true,
            "fire_webhooks": true,
            "transactions": [split_payload(payload)],
        });
        self.send(reqwest::Method::POST, "/api/v1/transactions", body).await
    }

    async fn update_transaction(&self, write: &TransactionWrite) -> Result<(), String> {
        let TransactionWrite::Update { external_id, payload } = write else {
            return Err("update_transaction called with a Create write".into());
        };
        let body = json!({
            "apply_rules": true,
            "fire_webhooks": true,
            "transactions": [split_payload(payload)],
        });
        self.send(reqwest::Method::PUT, &format!("/api/v1/transactions/{external_id}"), body).await.map(|_| ())
    }
}

fn split_payload(payload: &reconcile_core::export::TransactionPayload) -> serde_json::Value {
    json!({
        "type": format!("{:?}", payload.kind),
        "description": payload.description,
        "date": payload.date,
        "amount": payload.amount,
        "source_name": payload.source_external_id,
        "destination_name": payload.destination_external_id,
        "external_id": payload.akahu_ids,
        "foreign_amount": payload.foreign_amount,
        "foreign_currency_code": payload.foreign_currency_code,
        "category_name": payload.category_name,
    })
}
