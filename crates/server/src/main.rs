use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use meridian_recon::{HttpOracle, Oracle, Reconciler};
use meridian_storage::{Datasets, SqliteStore, Store};

mod http;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let bind = std::env::var("MERIDIAN_BIND").unwrap_or_else(|_| "0.0.0.0:5001".to_string());
    let db_path =
        PathBuf::from(std::env::var("MERIDIAN_DB").unwrap_or_else(|_| "meridian.db".to_string()));
    let oracle_timeout = std::env::var("MERIDIAN_ORACLE_TIMEOUT_MS")
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_secs(30));

    let store: Arc<dyn Store> = Arc::new(SqliteStore::open(&db_path).await?);

    // Specialists come from MERIDIAN_ORACLES: comma-separated `name=url`
    // pairs. With none configured, reconciliation runs are persisted as
    // errored runs and reported as failed.
    let oracles = oracle_endpoints(&std::env::var("MERIDIAN_ORACLES").unwrap_or_default())
        .into_iter()
        .map(|(name, url)| {
            HttpOracle::new(name, url, oracle_timeout).map(|o| Arc::new(o) as Arc<dyn Oracle>)
        })
        .collect::<Result<Vec<_>, _>>()?;

    if oracles.is_empty() {
        tracing::warn!("no classification oracles configured; reconciliation will fail");
    }

    let state = http::AppState {
        datasets: Datasets::new(Arc::clone(&store)),
        reconciler: Arc::new(Reconciler::new(store, oracles, oracle_timeout)),
    };

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    tracing::info!("listening on {bind}");
    axum::serve(listener, http::router(state)).await?;
    Ok(())
}

fn oracle_endpoints(raw: &str) -> Vec<(String, String)> {
    raw.split(',')
        .filter_map(|pair| {
            let pair = pair.trim();
            let (name, url) = pair.split_once('=')?;
            if name.is_empty() || url.is_empty() {
                return None;
            }
            Some((name.to_string(), url.to_string()))
        })
        .collect()
}
