use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use chrono::{DateTime, Utc};
use meridian_storage::Store;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::run::ReconciliationRun;
use crate::ReconError;

const COLLECTION: &str = "resolutions";

/// Per-transaction reconciliation status.
///
/// `pending` is the initial state; `matched`/`exception` are proposed by the
/// oracle; `resolved` only ever comes from an explicit manual action. A
/// manual action may also push a transaction back to `pending` or re-affirm
/// an oracle proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Pending,
    Matched,
    Exception,
    Resolved,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionEntry {
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_with: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub at: DateTime<Utc>,
}

/// Durable manual decision trail for one transaction. `history` is
/// append-only and the top-level fields always mirror its last entry; the
/// record is never deleted, only appended to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionRecord {
    #[serde(rename = "transactionId")]
    pub transaction_id: String,
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_with: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub history: Vec<ResolutionEntry>,
}

/// Append-only resolution store with per-transaction write serialization.
#[derive(Clone)]
pub struct ResolutionLedger {
    store: Arc<dyn Store>,
    // Guards the read-modify-write per transaction id. The outer mutex only
    // protects the map itself and is never held across an await.
    locks: Arc<StdMutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl ResolutionLedger {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            locks: Arc::new(StdMutex::new(HashMap::new())),
        }
    }

    /// Records a resolution: creates the record if absent, appends a history
    /// entry, and projects the current fields from it. Writes for the same
    /// transaction id serialize; different ids are independent.
    pub async fn apply(
        &self,
        transaction_id: &str,
        status: Status,
        matched_with: Option<String>,
        notes: Option<String>,
    ) -> Result<ResolutionRecord, ReconError> {
        let lock = self.lock_for(transaction_id);
        let _guard = lock.lock().await;

        let mut record = self.get(transaction_id).await?.unwrap_or(ResolutionRecord {
            transaction_id: transaction_id.to_string(),
            status: Status::Pending,
            matched_with: None,
            notes: None,
            history: Vec::new(),
        });

        let entry = ResolutionEntry {
            status,
            matched_with,
            notes,
            at: Utc::now(),
        };
        record.status = entry.status;
        record.matched_with = entry.matched_with.clone();
        record.notes = entry.notes.clone();
        record.history.push(entry);

        let document = serde_json::to_value(&record).map_err(meridian_storage::StoreError::from)?;
        self.store.put(COLLECTION, transaction_id, &document).await?;

        tracing::info!(transaction_id, ?status, "resolution recorded");
        Ok(record)
    }

    pub async fn get(&self, transaction_id: &str) -> Result<Option<ResolutionRecord>, ReconError> {
        let document = self.store.get(COLLECTION, transaction_id).await?;
        document
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| ReconError::Store(e.into()))
    }

    pub async fn all(&self) -> Result<Vec<ResolutionRecord>, ReconError> {
        let documents = self.store.list(COLLECTION).await?;
        documents
            .into_iter()
            .map(|doc| serde_json::from_value(doc).map_err(|e| ReconError::Store(e.into())))
            .collect()
    }

    fn lock_for(&self, transaction_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().expect("resolution lock map poisoned");
        // A lock held only by the map has no in-flight writer; evict it so
        // the map stays bounded by live writers rather than every id ever
        // resolved.
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks
            .entry(transaction_id.to_string())
            .or_default()
            .clone()
    }
}

/// Read-side precedence: a recorded resolution always beats the oracle; with
/// no resolution the latest run's proposal is used; with neither the
/// transaction is pending.
pub fn derive_status(
    transaction_id: &str,
    resolution: Option<&ResolutionRecord>,
    latest_run: Option<&ReconciliationRun>,
) -> Status {
    if let Some(record) = resolution {
        return record.status;
    }
    latest_run
        .and_then(|run| run.results.iter().find(|r| r.id == transaction_id))
        .map(|r| r.status)
        .unwrap_or(Status::Pending)
}
