use std::time::Duration;

use async_trait::async_trait;
use meridian_core::{CanonicalEntity, CanonicalTransaction};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::resolution::Status;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleRequest {
    pub transactions: Vec<CanonicalTransaction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entities: Option<Vec<CanonicalEntity>>,
}

/// One proposed classification. Advisory only — it seeds a reconciliation
/// run but never overrides a recorded resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleResult {
    pub id: String,
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_with: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OracleResponse {
    pub results: Vec<OracleResult>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

#[derive(Error, Debug)]
pub enum OracleError {
    #[error("oracle unreachable: {0}")]
    Unreachable(#[from] reqwest::Error),
    #[error("oracle response did not match the declared shape: {0}")]
    Malformed(String),
    #[error("oracle call timed out after {0:?}")]
    TimedOut(Duration),
}

/// A classification specialist. Implementations wrap whatever completion
/// service is configured; callers treat the output as untrusted advice.
#[async_trait]
pub trait Oracle: Send + Sync {
    fn name(&self) -> &str;

    async fn classify(&self, request: &OracleRequest) -> Result<OracleResponse, OracleError>;
}

/// HTTP-backed specialist. Posts the request as JSON and requires the
/// response to parse as [`OracleResponse`]; anything else is a failure of
/// this specialist, never a partial success.
pub struct HttpOracle {
    name: String,
    endpoint: String,
    client: reqwest::Client,
}

impl HttpOracle {
    pub fn new(
        name: impl Into<String>,
        endpoint: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, OracleError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            name: name.into(),
            endpoint: endpoint.into(),
            client,
        })
    }
}

#[async_trait]
impl Oracle for HttpOracle {
    fn name(&self) -> &str {
        &self.name
    }

    async fn classify(&self, request: &OracleRequest) -> Result<OracleResponse, OracleError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await?
            .error_for_status()?;

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| OracleError::Malformed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn response_parses_with_optional_fields_absent() {
        let body = json!({
            "results": [
                {"id": "TXN-1", "status": "matched", "matched_with": "STMT-9"},
                {"id": "TXN-2", "status": "exception"}
            ]
        });
        let response: OracleResponse = serde_json::from_value(body).unwrap();
        assert_eq!(response.results.len(), 2);
        assert_eq!(response.results[0].status, Status::Matched);
        assert_eq!(response.results[1].matched_with, None);
        assert!(response.recommendations.is_empty());
    }

    #[test]
    fn response_with_wrong_shape_is_rejected() {
        let body = r#"{"answer": "all good"}"#;
        assert!(serde_json::from_str::<OracleResponse>(body).is_err());
    }

    #[test]
    fn unknown_status_value_is_rejected() {
        let body = r#"{"results": [{"id": "T", "status": "approved"}]}"#;
        assert!(serde_json::from_str::<OracleResponse>(body).is_err());
    }

    #[test]
    fn request_omits_absent_entities() {
        let request = OracleRequest {
            transactions: vec![],
            entities: None,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("entities").is_none());
    }
}
