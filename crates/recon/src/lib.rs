pub mod oracle;
pub mod resolution;
pub mod run;

use thiserror::Error;

pub use oracle::{HttpOracle, Oracle, OracleError, OracleRequest, OracleResponse, OracleResult};
pub use resolution::{derive_status, ResolutionEntry, ResolutionLedger, ResolutionRecord, Status};
pub use run::{ReconciliationRun, Reconciler, RunStatus, RunSummary};

#[derive(Error, Debug)]
pub enum ReconError {
    /// Every configured specialist failed; the errored run has been
    /// persisted and the dataset is untouched.
    #[error("classification oracle unavailable: {0}")]
    OracleUnavailable(String),
    #[error(transparent)]
    Store(#[from] meridian_storage::StoreError),
}
