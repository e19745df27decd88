//! Conduit - Main Entry Point
//! Runs a producer/consumer job pair over the in-memory transport

mod demo;

use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use conduit_core::{JobManager, JobManagerConfig};
use conduit_infra_messaging::InMemoryBroker;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const DEFAULT_ORDER_COUNT: u32 = 5;

fn main() -> Result<()> {
    // 1. Initialize logging
    let log_format = std::env::var("CONDUIT_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("conduit=info"))?;

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty())
                .init();
        }
    }

    info!("Conduit v{} starting...", VERSION);

    // 2. Load configuration
    let config = JobManagerConfig::from_env()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;
    let order_count: u32 = std::env::var("CONDUIT_DEMO_ORDERS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_ORDER_COUNT);

    // 3. Wire dependencies
    let manager = Arc::new(
        JobManager::new(config).map_err(|e| anyhow::anyhow!("Job manager start failed: {}", e))?,
    );
    let broker = InMemoryBroker::new();

    // 4. Run the demo until done or Ctrl+C
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let outcome = runtime.block_on(async {
        tokio::select! {
            result = demo::run(&manager, &broker, order_count) => result,
            _ = tokio::signal::ctrl_c() => {
                warn!("Shutdown signal received. Cancelling jobs...");
                Ok(())
            }
        }
    });

    // 5. Graceful shutdown (outside the async context so it can wait)
    drop(runtime);
    manager.shutdown();

    match outcome {
        Ok(()) => info!("Shutdown complete."),
        Err(ref e) => tracing::error!(error = %e, "Demo failed"),
    }
    outcome
}
