//! Process boundary for the reconciliation pipeline: configuration,
//! database/feed/ledger-write adapters, and the run orchestration. The
//! reconciliation logic itself lives in `reconcile-core`; this crate only
//! wires it to the outside world.

pub mod config;
pub mod error;
pub mod feed_source;
pub mod ledger_client;
pub mod ledger_source;
pub mod pipeline;
