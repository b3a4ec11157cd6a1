use serde_json::Value;

use crate::record::RawRecord;

/// Ordered alias tables for the fields the source systems disagree on.
///
/// Order matters: the first alias present in a record wins, so the more
/// specific names go first. These are data, not code — downstream shapes
/// reference them instead of hardcoding column names.
pub mod aliases {
    pub const TXN_ID: &[&str] = &["id", "transaction_id", "txn_id", "reference", "ref"];
    pub const AMOUNT: &[&str] = &["amount", "amt", "value", "gross", "net", "total"];
    pub const COUNTERPARTY: &[&str] =
        &["counterparty", "party", "customer", "beneficiary", "vendor"];
    pub const DATE: &[&str] = &[
        "date",
        "trade_date",
        "settlement_date",
        "value_date",
        "posted_date",
    ];
    pub const TXN_TYPE: &[&str] = &["type", "txn_type", "transaction_type", "category"];
    pub const SOURCE: &[&str] = &["source", "channel", "origin", "system"];
    pub const DESCRIPTION: &[&str] = &["description", "memo", "narrative", "details"];

    pub const ENTITY_NAME: &[&str] = &[
        "name",
        "entity",
        "entity_name",
        "legal_name",
        "company",
        "client",
    ];
    pub const ENTITY_TYPE: &[&str] = &["entity_type", "type", "classification"];
    pub const KYC_EXPIRY: &[&str] = &["kyc_expiry", "kyc_expiry_date", "kyc_renewal", "expiry"];
    pub const JURISDICTION: &[&str] = &["jurisdiction", "country", "region", "domicile"];

    pub const ASSET: &[&str] = &["asset", "instrument", "symbol", "security", "ticker"];
    pub const QUANTITY: &[&str] = &["quantity", "qty", "units", "position", "notional"];
    pub const POSITION_VALUE: &[&str] = &["value", "market_value", "mv", "exposure"];

    pub const SCENARIO_NAME: &[&str] = &["scenario", "scenario_name", "stress_scenario"];
}

/// Returns the first alias whose value is present, non-null, and not an
/// empty string. Absence is an expected outcome, not an error.
pub fn resolve<'a>(record: &'a RawRecord, aliases: &[&str]) -> Option<&'a Value> {
    aliases
        .iter()
        .find_map(|alias| record.get(*alias).filter(|v| !is_blank(v)))
}

/// `resolve` rendered to text. Strings come back trimmed and unquoted;
/// numbers and anything structured fall back to their JSON text.
pub fn resolve_string(record: &RawRecord, aliases: &[&str]) -> Option<String> {
    resolve(record, aliases).map(render_scalar)
}

pub fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(pairs: &[(&str, Value)]) -> RawRecord {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn first_present_alias_wins() {
        let r = record(&[("amt", json!("50")), ("total", json!("999"))]);
        assert_eq!(resolve(&r, aliases::AMOUNT), Some(&json!("50")));
    }

    #[test]
    fn alias_order_is_respected_over_record_order() {
        // "amount" outranks "amt" even when "amt" was inserted first.
        let r = record(&[("amt", json!("50")), ("amount", json!("100"))]);
        assert_eq!(resolve_string(&r, aliases::AMOUNT).as_deref(), Some("100"));
    }

    #[test]
    fn null_and_empty_string_are_absent() {
        let r = record(&[
            ("amount", Value::Null),
            ("amt", json!("   ")),
            ("value", json!("42")),
        ]);
        assert_eq!(resolve_string(&r, aliases::AMOUNT).as_deref(), Some("42"));
    }

    #[test]
    fn no_alias_present_is_none() {
        let r = record(&[("unrelated", json!("x"))]);
        assert_eq!(resolve(&r, aliases::AMOUNT), None);
    }

    #[test]
    fn zero_and_false_are_present_values() {
        let r = record(&[("amount", json!(0))]);
        assert_eq!(resolve_string(&r, aliases::AMOUNT).as_deref(), Some("0"));
    }

    #[test]
    fn resolve_is_deterministic() {
        let r = record(&[("gross", json!("10")), ("net", json!("9"))]);
        let first = resolve_string(&r, aliases::AMOUNT);
        for _ in 0..10 {
            assert_eq!(resolve_string(&r, aliases::AMOUNT), first);
        }
    }

    #[test]
    fn render_scalar_trims_strings() {
        assert_eq!(render_scalar(&json!("  Acme ")), "Acme");
        assert_eq!(render_scalar(&json!(12.5)), "12.5");
    }
}
