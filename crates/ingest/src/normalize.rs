use meridian_core::resolve::{aliases, render_scalar, resolve, resolve_string};
use meridian_core::{
    CanonicalEntity, NormalizedRecords, PortfolioPosition, RawRecord, Scenario,
};
use serde_json::Value;

use crate::canonical::canonicalize_with_raw;

/// Classifies each raw row against the four target shapes and collects the
/// typed records. One row may populate more than one shape; rows matching
/// nothing are skipped. There is no all-or-nothing commit — partial results
/// are the happy path.
pub fn normalize_rows(rows: &[RawRecord], document_identity: &str) -> NormalizedRecords {
    let mut out = NormalizedRecords::default();

    for (position, row) in rows.iter().enumerate() {
        let normalized = normalize_keys(row);
        let raw = Value::Object(row.clone());
        let mut matched = false;

        if is_transaction_candidate(&normalized) {
            out.transactions.push(canonicalize_with_raw(
                &normalized,
                raw.clone(),
                position,
                document_identity,
            ));
            matched = true;
        }

        if let Some(name) = resolve_string(&normalized, aliases::ENTITY_NAME) {
            out.entities.push(CanonicalEntity {
                name,
                entity_type: resolve_string(&normalized, aliases::ENTITY_TYPE),
                kyc_expiry: resolve_string(&normalized, aliases::KYC_EXPIRY),
                jurisdiction: resolve_string(&normalized, aliases::JURISDICTION),
                raw: raw.clone(),
            });
            matched = true;
        }

        if let Some(asset) = position_asset(&normalized) {
            out.portfolio_positions.push(PortfolioPosition {
                asset,
                quantity: resolve_string(&normalized, aliases::QUANTITY),
                value: resolve_string(&normalized, aliases::POSITION_VALUE),
                raw: raw.clone(),
            });
            matched = true;
        }

        if let Some(name) = scenario_name(&normalized, matched) {
            out.scenarios.push(Scenario { name, raw });
            matched = true;
        }

        if !matched {
            tracing::debug!(position, "row matched no known shape, skipping");
        }
    }

    out
}

/// Lower-cases keys, trims them, and collapses whitespace runs into a single
/// underscore, so `" Trade Date "` and `"trade_date"` resolve identically.
pub fn normalize_keys(row: &RawRecord) -> RawRecord {
    row.iter()
        .map(|(key, value)| (normalize_key(key), value.clone()))
        .collect()
}

fn normalize_key(key: &str) -> String {
    key.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

/// An amount alone is not enough signal — the row must also carry at least
/// one of counterparty, date, or description.
fn is_transaction_candidate(row: &RawRecord) -> bool {
    resolve(row, aliases::AMOUNT).is_some()
        && (resolve(row, aliases::COUNTERPARTY).is_some()
            || resolve(row, aliases::DATE).is_some()
            || resolve(row, aliases::DESCRIPTION).is_some())
}

fn position_asset(row: &RawRecord) -> Option<String> {
    let asset = resolve_string(row, aliases::ASSET)?;
    if resolve(row, aliases::QUANTITY).is_some() || resolve(row, aliases::POSITION_VALUE).is_some()
    {
        Some(asset)
    } else {
        None
    }
}

/// A scenario comes from an explicit scenario column, or — to support
/// single-column scenario-list imports — from the sole value of a one-column
/// row that matched no other shape.
fn scenario_name(row: &RawRecord, other_shape_matched: bool) -> Option<String> {
    if let Some(name) = resolve_string(row, aliases::SCENARIO_NAME) {
        return Some(name);
    }
    if other_shape_matched || row.len() != 1 {
        return None;
    }
    row.values()
        .next()
        .map(render_scalar)
        .filter(|name| !name.is_empty())
}
