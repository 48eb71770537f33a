//! FinOps service binary
//!
//! Cost ledger, budget tracking, and statistical anomaly detection
//! behind a small HTTP API.

// Use the library crate for all modules
use finops::cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging (INFO level by default, override with RUST_LOG)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // Run CLI
    cli::run().await
}
