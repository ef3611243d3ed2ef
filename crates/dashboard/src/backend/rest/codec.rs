//! JSON wire encoding of document values.
//!
//! The documents API wraps every value in a single-key object naming its
//! kind (`{"stringValue": "x"}`, `{"integerValue": "42"}`, ...). Server
//! timestamps are not values on the wire; they are sent as field transforms
//! next to the write, so [`split_transforms`] pulls them out first.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value, json};

use crate::backend::{BackendError, FieldValue, Fields};

/// Separate server-timestamp sentinels from concrete values.
///
/// Returns the remaining fields and the dotted field paths that should be
/// set to the request time.
pub fn split_transforms(fields: Fields) -> (Fields, Vec<String>) {
    let mut transforms = Vec::new();
    let fields = split_inner(fields, &[], &mut transforms);
    (fields, transforms)
}

fn split_inner(fields: Fields, prefix: &[String], transforms: &mut Vec<String>) -> Fields {
    let mut kept = Fields::new();
    for (name, value) in fields {
        let mut path = prefix.to_vec();
        path.push(name.clone());
        match value {
            FieldValue::ServerTimestamp => transforms.push(field_path(&path)),
            FieldValue::Map(inner) => {
                kept.insert(name, FieldValue::Map(split_inner(inner, &path, transforms)));
            }
            other => {
                kept.insert(name, other);
            }
        }
    }
    kept
}

/// Build a dotted field path, quoting segments that are not simple names.
pub fn field_path(segments: &[String]) -> String {
    segments
        .iter()
        .map(|segment| quote_segment(segment))
        .collect::<Vec<_>>()
        .join(".")
}

fn quote_segment(segment: &str) -> String {
    let mut chars = segment.chars();
    let simple = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if simple {
        return segment.to_owned();
    }
    let escaped = segment.replace('\\', "\\\\").replace('`', "\\`");
    format!("`{escaped}`")
}

/// Encode a field map as the wire `fields` object.
pub fn encode_fields(fields: &Fields) -> Value {
    Value::Object(
        fields
            .iter()
            .map(|(name, value)| (name.clone(), encode_value(value)))
            .collect(),
    )
}

/// Encode a single value.
pub fn encode_value(value: &FieldValue) -> Value {
    match value {
        // Server timestamps are removed by `split_transforms` before encoding.
        FieldValue::Null | FieldValue::ServerTimestamp => json!({ "nullValue": null }),
        FieldValue::Bool(b) => json!({ "booleanValue": b }),
        FieldValue::Integer(i) => json!({ "integerValue": i.to_string() }),
        FieldValue::Double(d) => json!({ "doubleValue": d }),
        FieldValue::String(s) => json!({ "stringValue": s }),
        FieldValue::Timestamp(ts) => {
            json!({ "timestampValue": ts.to_rfc3339_opts(SecondsFormat::AutoSi, true) })
        }
        FieldValue::Array(values) => {
            let values: Vec<Value> = values.iter().map(encode_value).collect();
            json!({ "arrayValue": { "values": values } })
        }
        FieldValue::Map(fields) => json!({ "mapValue": { "fields": encode_fields(fields) } }),
    }
}

/// Decode the wire `fields` object of a document.
///
/// # Errors
///
/// Returns `BackendError::Decode` if any value has an unknown shape.
pub fn decode_fields(fields: &Map<String, Value>) -> Result<Fields, BackendError> {
    fields
        .iter()
        .map(|(name, value)| Ok((name.clone(), decode_value(value)?)))
        .collect()
}

/// Decode a single wire value.
///
/// # Errors
///
/// Returns `BackendError::Decode` for unknown kinds or malformed payloads.
pub fn decode_value(value: &Value) -> Result<FieldValue, BackendError> {
    let object = value
        .as_object()
        .ok_or_else(|| BackendError::Decode(format!("value is not an object: {value}")))?;
    let (kind, payload) = object
        .iter()
        .next()
        .ok_or_else(|| BackendError::Decode("empty value object".to_owned()))?;

    match kind.as_str() {
        "nullValue" => Ok(FieldValue::Null),
        "booleanValue" => payload
            .as_bool()
            .map(FieldValue::Bool)
            .ok_or_else(|| malformed(kind, payload)),
        "integerValue" => decode_integer(payload).ok_or_else(|| malformed(kind, payload)),
        "doubleValue" => decode_double(payload).ok_or_else(|| malformed(kind, payload)),
        "timestampValue" => payload
            .as_str()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|ts| FieldValue::Timestamp(ts.with_timezone(&Utc)))
            .ok_or_else(|| malformed(kind, payload)),
        "stringValue" | "referenceValue" | "bytesValue" => payload
            .as_str()
            .map(|s| FieldValue::String(s.to_owned()))
            .ok_or_else(|| malformed(kind, payload)),
        "arrayValue" => {
            let values = match payload.get("values") {
                None => Vec::new(),
                Some(Value::Array(values)) => values
                    .iter()
                    .map(decode_value)
                    .collect::<Result<_, _>>()?,
                Some(_) => return Err(malformed(kind, payload)),
            };
            Ok(FieldValue::Array(values))
        }
        "mapValue" => match payload.get("fields") {
            None => Ok(FieldValue::Map(Fields::new())),
            Some(Value::Object(fields)) => Ok(FieldValue::Map(decode_fields(fields)?)),
            Some(_) => Err(malformed(kind, payload)),
        },
        "geoPointValue" => {
            let coordinate = |name: &str| {
                FieldValue::Double(payload.get(name).and_then(Value::as_f64).unwrap_or(0.0))
            };
            Ok(FieldValue::Map(Fields::from([
                ("latitude".to_owned(), coordinate("latitude")),
                ("longitude".to_owned(), coordinate("longitude")),
            ])))
        }
        other => Err(BackendError::Decode(format!("unknown value kind: {other}"))),
    }
}

fn decode_integer(payload: &Value) -> Option<FieldValue> {
    match payload {
        Value::String(s) => s.parse().ok().map(FieldValue::Integer),
        Value::Number(n) => n.as_i64().map(FieldValue::Integer),
        _ => None,
    }
}

fn decode_double(payload: &Value) -> Option<FieldValue> {
    match payload {
        Value::Number(n) => n.as_f64().map(FieldValue::Double),
        Value::String(s) => match s.as_str() {
            "NaN" => Some(FieldValue::Double(f64::NAN)),
            "Infinity" => Some(FieldValue::Double(f64::INFINITY)),
            "-Infinity" => Some(FieldValue::Double(f64::NEG_INFINITY)),
            _ => None,
        },
        _ => None,
    }
}

fn malformed(kind: &str, payload: &Value) -> BackendError {
    BackendError::Decode(format!("malformed {kind}: {payload}"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_integer_values_are_strings_on_the_wire() {
        assert_eq!(
            encode_value(&FieldValue::Integer(42)),
            json!({ "integerValue": "42" })
        );
        assert_eq!(
            decode_value(&json!({ "integerValue": "42" })).unwrap(),
            FieldValue::Integer(42)
        );
    }

    #[test]
    fn test_timestamp_decodes_offsets_to_utc() {
        let decoded = decode_value(&json!({ "timestampValue": "2024-05-01T14:00:00+02:00" }))
            .unwrap();
        assert_eq!(
            decoded,
            FieldValue::Timestamp(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_nested_document_decodes() {
        let wire = json!({
            "sku": { "stringValue": "A-100" },
            "tags": { "arrayValue": { "values": [{ "stringValue": "cold" }] } },
            "dims": { "mapValue": { "fields": { "w": { "doubleValue": 1.5 } } } },
            "empty": { "arrayValue": {} },
            "owner": { "referenceValue": "projects/p/databases/(default)/documents/users/u1" }
        });
        let fields = decode_fields(wire.as_object().unwrap()).unwrap();
        assert_eq!(fields["sku"], FieldValue::from("A-100"));
        assert_eq!(
            fields["tags"],
            FieldValue::Array(vec![FieldValue::from("cold")])
        );
        assert_eq!(fields["empty"], FieldValue::Array(Vec::new()));
        assert!(matches!(fields["dims"], FieldValue::Map(_)));
        assert!(fields["owner"].as_str().unwrap().ends_with("users/u1"));
    }

    #[test]
    fn test_unknown_kind_is_a_decode_error() {
        assert!(matches!(
            decode_value(&json!({ "vectorValue": {} })),
            Err(BackendError::Decode(_))
        ));
        assert!(matches!(
            decode_value(&json!("bare")),
            Err(BackendError::Decode(_))
        ));
    }

    #[test]
    fn test_server_timestamps_become_transforms() {
        let fields = Fields::from([
            ("inventory".to_owned(), FieldValue::ServerTimestamp),
            ("purchase-requests".to_owned(), FieldValue::ServerTimestamp),
            ("name".to_owned(), FieldValue::from("Dana")),
        ]);
        let (kept, transforms) = split_transforms(fields);
        assert_eq!(kept.len(), 1);
        assert!(kept.contains_key("name"));
        assert_eq!(transforms, vec!["inventory", "`purchase-requests`"]);
    }

    #[test]
    fn test_field_path_quotes_and_escapes() {
        assert_eq!(
            field_path(&["meta".to_owned(), "seen`at".to_owned()]),
            "meta.`seen\\`at`"
        );
        assert_eq!(field_path(&["createdAt".to_owned()]), "createdAt");
        assert_eq!(field_path(&["1st".to_owned()]), "`1st`");
    }
}
