use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// A raw input row as handed over by a row extractor: arbitrary string keys,
/// untyped values. No invariants beyond key presence.
pub type RawRecord = serde_json::Map<String, Value>;

/// Canonical transaction shape. `id` is always present and unique within one
/// normalization batch; `raw` retains the original input verbatim for audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalTransaction {
    pub id: String,
    pub source: String,
    pub counterparty: Option<String>,
    /// Currency-tagged display string, e.g. `"USD 1250.00"`, or the em dash
    /// placeholder when the source carried no amount at all.
    pub amount: String,
    pub date: Option<String>,
    #[serde(rename = "type")]
    pub txn_type: Option<String>,
    pub raw: Value,
}

/// Canonical entity shape. Rows with no resolvable name never become
/// entities — they are dropped, not defaulted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalEntity {
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: Option<String>,
    pub kyc_expiry: Option<String>,
    pub jurisdiction: Option<String>,
    pub raw: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioPosition {
    pub asset: String,
    pub quantity: Option<String>,
    pub value: Option<String>,
    pub raw: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub raw: Value,
}

/// Output of one normalization batch. Any of the four sequences may be
/// empty; a single row may contribute to more than one of them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecords {
    pub transactions: Vec<CanonicalTransaction>,
    pub entities: Vec<CanonicalEntity>,
    pub portfolio_positions: Vec<PortfolioPosition>,
    pub scenarios: Vec<Scenario>,
}

impl NormalizedRecords {
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
            && self.entities.is_empty()
            && self.portfolio_positions.is_empty()
            && self.scenarios.is_empty()
    }
}

/// The four persisted dataset domains. Each owns exactly one working set in
/// the store, keyed by the field `merge_key` names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Transactions,
    Entities,
    Portfolio,
    Scenarios,
}

impl Domain {
    pub const ALL: [Domain; 4] = [
        Domain::Transactions,
        Domain::Entities,
        Domain::Portfolio,
        Domain::Scenarios,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Domain::Transactions => "transactions",
            Domain::Entities => "entities",
            Domain::Portfolio => "portfolio",
            Domain::Scenarios => "scenarios",
        }
    }

    /// Identity field used by the merge engine for this domain.
    pub fn merge_key(self) -> &'static str {
        match self {
            Domain::Transactions => "id",
            Domain::Entities => "name",
            Domain::Portfolio => "asset",
            Domain::Scenarios => "name",
        }
    }
}

impl std::fmt::Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq)]
#[error("unknown dataset domain: '{0}'")]
pub struct DomainParseError(pub String);

impl std::str::FromStr for Domain {
    type Err = DomainParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "transactions" => Ok(Domain::Transactions),
            "entities" => Ok(Domain::Entities),
            "portfolio" | "portfolio_positions" | "positions" => Ok(Domain::Portfolio),
            "scenarios" => Ok(Domain::Scenarios),
            other => Err(DomainParseError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn domain_round_trips_through_str() {
        for domain in Domain::ALL {
            assert_eq!(Domain::from_str(domain.as_str()).unwrap(), domain);
        }
    }

    #[test]
    fn domain_accepts_position_spellings() {
        assert_eq!(
            Domain::from_str("portfolio_positions").unwrap(),
            Domain::Portfolio
        );
        assert_eq!(Domain::from_str("positions").unwrap(), Domain::Portfolio);
    }

    #[test]
    fn unknown_domain_is_an_error() {
        assert!(Domain::from_str("reports").is_err());
    }

    #[test]
    fn transaction_serializes_type_field_name() {
        let txn = CanonicalTransaction {
            id: "TXN-1".into(),
            source: "upload".into(),
            counterparty: None,
            amount: "100".into(),
            date: None,
            txn_type: Some("wire".into()),
            raw: serde_json::json!({}),
        };
        let value = serde_json::to_value(&txn).unwrap();
        assert_eq!(value["type"], "wire");
        assert!(value.get("txn_type").is_none());
    }
}
