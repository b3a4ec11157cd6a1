use std::collections::HashMap;
use std::sync::Arc;

use meridian_core::{merge, Domain};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::store::{Store, StoreError};

const COLLECTION: &str = "datasets";

/// The single entry point for dataset reads and merges.
///
/// One working set per domain, created lazily (an absent dataset reads as
/// empty) and never deleted here. All mutation funnels through
/// [`Datasets::merge_into`], which holds a per-domain lock across the
/// read-modify-write so concurrent merges cannot lose updates.
#[derive(Clone)]
pub struct Datasets {
    store: Arc<dyn Store>,
    locks: Arc<HashMap<Domain, Mutex<()>>>,
}

impl Datasets {
    pub fn new(store: Arc<dyn Store>) -> Self {
        let locks = Domain::ALL
            .into_iter()
            .map(|domain| (domain, Mutex::new(())))
            .collect();
        Self {
            store,
            locks: Arc::new(locks),
        }
    }

    pub async fn dataset(&self, domain: Domain) -> Result<Vec<Value>, StoreError> {
        let document = self.store.get(COLLECTION, domain.as_str()).await?;
        Ok(match document {
            Some(Value::Array(records)) => records,
            Some(other) => vec![other],
            None => Vec::new(),
        })
    }

    /// Merges `incoming` into the domain's persisted dataset and returns the
    /// updated dataset. First write wins on key collisions; keyless records
    /// receive synthetic keys (see `meridian_core::merge`).
    pub async fn merge_into(
        &self,
        domain: Domain,
        incoming: Vec<Value>,
    ) -> Result<Vec<Value>, StoreError> {
        // Serialize read-modify-write per domain.
        let _guard = self.locks[&domain].lock().await;

        let existing = self.dataset(domain).await?;
        let before = existing.len();
        let merged = merge(existing, incoming, domain.merge_key());

        self.store
            .put(COLLECTION, domain.as_str(), &Value::Array(merged.clone()))
            .await?;

        tracing::info!(
            domain = %domain,
            added = merged.len() - before,
            total = merged.len(),
            "dataset merged"
        );
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn datasets() -> Datasets {
        Datasets::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn absent_dataset_reads_as_empty() {
        let datasets = datasets();
        assert!(datasets.dataset(Domain::Transactions).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn merge_persists_and_rereads() {
        let datasets = datasets();
        datasets
            .merge_into(Domain::Transactions, vec![json!({"id": "T1"})])
            .await
            .unwrap();
        let dataset = datasets.dataset(Domain::Transactions).await.unwrap();
        assert_eq!(dataset, vec![json!({"id": "T1"})]);
    }

    #[tokio::test]
    async fn reimport_does_not_clobber_existing_records() {
        let datasets = datasets();
        datasets
            .merge_into(Domain::Entities, vec![json!({"name": "Acme", "kyc": "valid"})])
            .await
            .unwrap();
        let merged = datasets
            .merge_into(Domain::Entities, vec![json!({"name": "Acme", "kyc": "stale"})])
            .await
            .unwrap();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0]["kyc"], "valid");
    }

    #[tokio::test]
    async fn domains_do_not_share_a_working_set() {
        let datasets = datasets();
        datasets
            .merge_into(Domain::Scenarios, vec![json!({"name": "Rate shock"})])
            .await
            .unwrap();
        assert!(datasets.dataset(Domain::Portfolio).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn concurrent_merges_do_not_lose_updates() {
        let datasets = datasets();
        let mut handles = Vec::new();
        for i in 0..8 {
            let datasets = datasets.clone();
            handles.push(tokio::spawn(async move {
                datasets
                    .merge_into(Domain::Transactions, vec![json!({"id": format!("T{i}")})])
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        let dataset = datasets.dataset(Domain::Transactions).await.unwrap();
        assert_eq!(dataset.len(), 8);
    }
}
