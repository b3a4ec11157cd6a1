use meridian_core::RawRecord;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported content type: {0}")]
    UnsupportedType(String),
    #[error("no data rows")]
    NoDataRows,
}

/// Converts raw file bytes into an ordered sequence of key/value rows.
///
/// This is the only place file bytes are parsed; everything downstream
/// consumes the row sequence. Keys are passed through as the source spelled
/// them — key normalization is the normalizer's job.
pub fn extract_rows(bytes: &[u8], declared_mime: &str) -> Result<Vec<RawRecord>, ExtractError> {
    let mime = declared_mime
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_lowercase();

    match mime.as_str() {
        "text/csv" | "application/csv" | "application/vnd.ms-excel" => extract_csv(bytes),
        "application/json" | "text/json" => extract_json(bytes),
        // Ad-hoc payloads often arrive with a generic or missing type.
        "" | "text/plain" | "application/octet-stream" => {
            if looks_like_json(bytes) {
                extract_json(bytes)
            } else {
                extract_csv(bytes)
            }
        }
        other => Err(ExtractError::UnsupportedType(other.to_string())),
    }
}

fn extract_csv(bytes: &[u8]) -> Result<Vec<RawRecord>, ExtractError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }
        let mut row = RawRecord::new();
        for (i, field) in record.iter().enumerate() {
            let key = headers
                .get(i)
                .cloned()
                .unwrap_or_else(|| format!("column_{}", i + 1));
            row.insert(key, Value::String(field.to_string()));
        }
        rows.push(row);
    }

    if rows.is_empty() {
        return Err(ExtractError::NoDataRows);
    }
    Ok(rows)
}

fn extract_json(bytes: &[u8]) -> Result<Vec<RawRecord>, ExtractError> {
    let value: Value = serde_json::from_slice(bytes)?;
    let items = match value {
        Value::Array(items) => items,
        single => vec![single],
    };

    let rows: Vec<RawRecord> = items
        .into_iter()
        .map(|item| match item {
            Value::Object(map) => map,
            // A bare scalar still becomes a one-column row so single-column
            // scenario lists survive extraction.
            scalar => {
                let mut row = RawRecord::new();
                row.insert("value".to_string(), scalar);
                row
            }
        })
        .collect();

    if rows.is_empty() {
        return Err(ExtractError::NoDataRows);
    }
    Ok(rows)
}

fn looks_like_json(bytes: &[u8]) -> bool {
    bytes
        .iter()
        .find(|b| !b.is_ascii_whitespace())
        .is_some_and(|b| *b == b'[' || *b == b'{')
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn csv_rows_keep_header_keys_verbatim() {
        let data = b"Trade Date,Amount,Counterparty\n2024-01-15,100.00,Acme\n";
        let rows = extract_rows(data, "text/csv").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["Trade Date"], json!("2024-01-15"));
        assert_eq!(rows[0]["Counterparty"], json!("Acme"));
    }

    #[test]
    fn csv_skips_fully_blank_lines() {
        let data = b"a,b\n1,2\n,\n3,4\n";
        let rows = extract_rows(data, "text/csv").unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn csv_ragged_row_gets_positional_keys() {
        let data = b"a\n1,2\n";
        let rows = extract_rows(data, "text/csv").unwrap();
        assert_eq!(rows[0]["a"], json!("1"));
        assert_eq!(rows[0]["column_2"], json!("2"));
    }

    #[test]
    fn json_array_of_objects() {
        let data = br#"[{"amount": 100, "party": "Acme"}, {"amount": 200}]"#;
        let rows = extract_rows(data, "application/json").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["party"], json!("Acme"));
    }

    #[test]
    fn json_scalars_become_single_column_rows() {
        let data = br#"["Rate shock", "FX gap"]"#;
        let rows = extract_rows(data, "application/json").unwrap();
        assert_eq!(rows[0]["value"], json!("Rate shock"));
        assert_eq!(rows[1]["value"], json!("FX gap"));
    }

    #[test]
    fn unknown_mime_sniffs_json() {
        let data = br#"  [{"amount": 1}]"#;
        let rows = extract_rows(data, "").unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn declared_unsupported_type_is_rejected() {
        let err = extract_rows(b"%PDF-1.4", "application/pdf").unwrap_err();
        assert!(matches!(err, ExtractError::UnsupportedType(_)));
    }

    #[test]
    fn empty_csv_is_no_data_rows() {
        let err = extract_rows(b"a,b\n", "text/csv").unwrap_err();
        assert!(matches!(err, ExtractError::NoDataRows));
    }

    #[test]
    fn mime_parameters_are_ignored() {
        let data = b"a\n1\n";
        assert!(extract_rows(data, "text/csv; charset=utf-8").is_ok());
    }
}
