use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use meridian_core::CanonicalTransaction;
use meridian_storage::Store;
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use uuid::Uuid;

use crate::oracle::{Oracle, OracleError, OracleRequest, OracleResponse, OracleResult};
use crate::resolution::{derive_status, ResolutionLedger, Status};
use crate::ReconError;

const COLLECTION: &str = "reconciliation_runs";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub matched: usize,
    pub exceptions: usize,
    pub pending: usize,
}

/// Point-in-time record of one reconciliation invocation: the transactions
/// as of the run, the combined oracle results, and summary counts. Created
/// once, then only ever read — failed runs are persisted too, with an
/// `error` status and message, so failures stay visible in run history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationRun {
    pub id: String,
    pub status: RunStatus,
    pub transactions: Vec<CanonicalTransaction>,
    pub results: Vec<OracleResult>,
    pub summary: RunSummary,
    pub recommendations: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Drives reconciliation: fans a transaction snapshot out to the configured
/// specialist oracles, combines their proposals, and persists the run.
///
/// Failure policy: the join degrades gracefully — any subset of specialists
/// may fail as long as at least one succeeds. Zero successes is a hard
/// failure; the errored run is persisted and datasets and resolution records
/// are left untouched. No automatic retry.
pub struct Reconciler {
    store: Arc<dyn Store>,
    oracles: Vec<Arc<dyn Oracle>>,
    oracle_timeout: Duration,
    resolutions: ResolutionLedger,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn Store>,
        oracles: Vec<Arc<dyn Oracle>>,
        oracle_timeout: Duration,
    ) -> Self {
        let resolutions = ResolutionLedger::new(Arc::clone(&store));
        Self {
            store,
            oracles,
            oracle_timeout,
            resolutions,
        }
    }

    pub fn resolutions(&self) -> &ResolutionLedger {
        &self.resolutions
    }

    /// Runs one reconciliation over the given snapshot and persists the run.
    pub async fn run(
        &self,
        transactions: Vec<CanonicalTransaction>,
    ) -> Result<ReconciliationRun, ReconError> {
        let request = Arc::new(OracleRequest {
            transactions: transactions.clone(),
            entities: None,
        });

        let mut join_set = JoinSet::new();
        for (index, oracle) in self.oracles.iter().enumerate() {
            let oracle = Arc::clone(oracle);
            let request = Arc::clone(&request);
            let timeout = self.oracle_timeout;
            join_set.spawn(async move {
                let outcome = match tokio::time::timeout(timeout, oracle.classify(&request)).await
                {
                    Ok(result) => result,
                    Err(_) => Err(OracleError::TimedOut(timeout)),
                };
                (index, oracle.name().to_string(), outcome)
            });
        }

        let mut successes: Vec<(usize, String, OracleResponse)> = Vec::new();
        let mut failures: Vec<String> = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, name, Ok(response))) => successes.push((index, name, response)),
                Ok((_, name, Err(error))) => {
                    tracing::warn!(specialist = %name, %error, "specialist call failed");
                    failures.push(format!("{name}: {error}"));
                }
                Err(join_error) => failures.push(format!("specialist task failed: {join_error}")),
            }
        }
        // The join completes in arbitrary order; combining must not.
        successes.sort_by_key(|(index, _, _)| *index);

        if successes.is_empty() {
            let message = if failures.is_empty() {
                "no specialists configured".to_string()
            } else {
                failures.join("; ")
            };
            let run = ReconciliationRun {
                id: Uuid::new_v4().to_string(),
                status: RunStatus::Error,
                summary: RunSummary {
                    total: transactions.len(),
                    pending: transactions.len(),
                    ..RunSummary::default()
                },
                transactions,
                results: Vec::new(),
                recommendations: Vec::new(),
                error: Some(message.clone()),
                created_at: Utc::now(),
            };
            self.persist(&run).await?;
            return Err(ReconError::OracleUnavailable(message));
        }

        let (results, recommendations) = combine(&transactions, &successes);
        let summary = summarize(&transactions, &results);

        let run = ReconciliationRun {
            id: Uuid::new_v4().to_string(),
            status: RunStatus::Success,
            transactions,
            results,
            summary,
            recommendations,
            error: None,
            created_at: Utc::now(),
        };
        self.persist(&run).await?;

        tracing::info!(
            run_id = %run.id,
            specialists_ok = successes.len(),
            specialists_failed = failures.len(),
            matched = summary.matched,
            exceptions = summary.exceptions,
            "reconciliation run completed"
        );
        Ok(run)
    }

    /// Run history, newest first. Errored runs are included.
    pub async fn runs(&self) -> Result<Vec<ReconciliationRun>, ReconError> {
        let documents = self.store.list(COLLECTION).await?;
        let mut runs: Vec<ReconciliationRun> = documents
            .into_iter()
            .map(|doc| serde_json::from_value(doc).map_err(meridian_storage::StoreError::from))
            .collect::<Result<_, _>>()?;
        runs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(runs)
    }

    /// Authoritative status for one transaction: recorded resolution first,
    /// then the latest successful run's proposal, else pending.
    pub async fn transaction_status(&self, transaction_id: &str) -> Result<Status, ReconError> {
        let resolution = self.resolutions.get(transaction_id).await?;
        let runs = self.runs().await?;
        let latest_success = runs.iter().find(|run| run.status == RunStatus::Success);
        Ok(derive_status(
            transaction_id,
            resolution.as_ref(),
            latest_success,
        ))
    }

    async fn persist(&self, run: &ReconciliationRun) -> Result<(), ReconError> {
        let document = serde_json::to_value(run).map_err(meridian_storage::StoreError::from)?;
        self.store.put(COLLECTION, &run.id, &document).await?;
        Ok(())
    }
}

/// Combines per-specialist proposals into one result per transaction.
///
/// Majority vote per transaction id; ties resolve to `exception` when an
/// exception is among the tied statuses, otherwise to the earliest
/// specialist's proposal. `matched_with`/`notes` come from the earliest
/// specialist that proposed the winning status. Ids the snapshot does not
/// contain are dropped. Transactions no specialist classified get no entry
/// and read as pending.
fn combine(
    transactions: &[CanonicalTransaction],
    specialists: &[(usize, String, OracleResponse)],
) -> (Vec<OracleResult>, Vec<String>) {
    let mut results = Vec::new();

    for txn in transactions {
        let proposals: Vec<&OracleResult> = specialists
            .iter()
            .filter_map(|(_, _, response)| response.results.iter().find(|r| r.id == txn.id))
            .collect();
        if proposals.is_empty() {
            continue;
        }

        let mut tally: HashMap<Status, usize> = HashMap::new();
        for proposal in &proposals {
            *tally.entry(proposal.status).or_default() += 1;
        }
        let top = tally.values().copied().max().unwrap_or(0);
        let tied: Vec<Status> = tally
            .iter()
            .filter(|(_, count)| **count == top)
            .map(|(status, _)| *status)
            .collect();

        let winner = if tied.len() == 1 {
            tied[0]
        } else if tied.contains(&Status::Exception) {
            Status::Exception
        } else {
            proposals
                .iter()
                .find(|p| tied.contains(&p.status))
                .map(|p| p.status)
                .unwrap_or(Status::Pending)
        };

        let source = proposals
            .iter()
            .find(|p| p.status == winner)
            .expect("winning status has at least one proposal");

        results.push(OracleResult {
            id: txn.id.clone(),
            status: winner,
            matched_with: source.matched_with.clone(),
            notes: source.notes.clone(),
        });
    }

    let mut recommendations: Vec<String> = Vec::new();
    for (_, _, response) in specialists {
        for rec in &response.recommendations {
            if !recommendations.contains(rec) {
                recommendations.push(rec.clone());
            }
        }
    }

    (results, recommendations)
}

fn summarize(transactions: &[CanonicalTransaction], results: &[OracleResult]) -> RunSummary {
    let matched = results.iter().filter(|r| r.status == Status::Matched).count();
    let exceptions = results
        .iter()
        .filter(|r| r.status == Status::Exception)
        .count();
    RunSummary {
        total: transactions.len(),
        matched,
        exceptions,
        pending: transactions.len() - matched - exceptions,
    }
}
