use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use reconcile_service::config::Settings;
use reconcile_service::feed_source::SqlxFeedSource;
use reconcile_service::ledger_client::HttpLedgerClient;
use reconcile_service::ledger_source::SqlxLedgerSource;
use reconcile_service::pipeline;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into())))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::from_env()?;

    let ledger_source = SqlxLedgerSource::connect(&settings.database_url).await?;
    let feed_source = SqlxFeedSource::connect(&settings.firefly_database_url).await?;
    let client = HttpLedgerClient::new(settings.firefly_base_path.clone(), settings.firefly_api_key.clone());

    pipeline::run(&settings, &ledger_source, &feed_source, &client).await?;

    tracing::info!("reconciliation run complete");
    Ok(())
}
