use meridian_core::resolve::{aliases, render_scalar, resolve, resolve_string};
use meridian_core::{CanonicalTransaction, RawRecord};
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;

/// Shown when a transaction arrived with no amount at all; downstream
/// display code must never see a missing field.
const MISSING_AMOUNT: &str = "—";

/// Maps one raw transaction-shaped object into the canonical transaction
/// record. `position` is the record's index within its batch; together with
/// `document_identity` it backs the synthetic id when the source supplied
/// none.
pub fn canonicalize(
    raw_txn: &RawRecord,
    position: usize,
    document_identity: &str,
) -> CanonicalTransaction {
    canonicalize_with_raw(
        raw_txn,
        Value::Object(raw_txn.clone()),
        position,
        document_identity,
    )
}

/// Same as [`canonicalize`] but with an explicit `raw` payload, for callers
/// that resolve fields against a transformed view of the record while
/// retaining the untransformed original for audit.
pub fn canonicalize_with_raw(
    record: &RawRecord,
    raw: Value,
    position: usize,
    document_identity: &str,
) -> CanonicalTransaction {
    let id = resolve_string(record, aliases::TXN_ID)
        .unwrap_or_else(|| format!("{}-{}", document_identity, position + 1));

    let source = resolve_string(record, aliases::SOURCE)
        .unwrap_or_else(|| document_identity.to_string());

    CanonicalTransaction {
        id,
        source,
        counterparty: resolve_string(record, aliases::COUNTERPARTY),
        amount: format_amount(resolve(record, aliases::AMOUNT)),
        date: resolve_string(record, aliases::DATE),
        txn_type: resolve_string(record, aliases::TXN_TYPE),
        raw,
    }
}

/// Renders an amount value as display text.
///
/// A `{amount, currency}` object becomes `"<currency> <amount>"`; without a
/// currency the bare numeric text is used; a wholly absent amount becomes the
/// em dash placeholder.
fn format_amount(value: Option<&Value>) -> String {
    let Some(value) = value else {
        return MISSING_AMOUNT.to_string();
    };

    if let Value::Object(map) = value {
        let amount = map.get("amount").filter(|v| match v {
            Value::Null => false,
            Value::String(s) => !s.trim().is_empty(),
            _ => true,
        });
        let currency = map
            .get("currency")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|c| !c.is_empty());

        return match (currency, amount) {
            (Some(currency), Some(amount)) => {
                format!("{} {}", currency, render_number(amount))
            }
            (None, Some(amount)) => render_number(amount),
            (_, None) => MISSING_AMOUNT.to_string(),
        };
    }

    render_number(value)
}

/// Numeric text is normalized through `Decimal` so the same input always
/// renders the same way; anything unparseable passes through verbatim.
fn render_number(value: &Value) -> String {
    let text = render_scalar(value);

    let trimmed = text.trim();
    let (negative, body) = if trimmed.starts_with('(') && trimmed.ends_with(')') {
        (true, &trimmed[1..trimmed.len() - 1])
    } else {
        (false, trimmed)
    };
    let cleaned = body.replace([',', '$', ' '], "");

    match Decimal::from_str(&cleaned) {
        Ok(dec) => (if negative { -dec } else { dec }).to_string(),
        Err(_) => text,
    }
}
