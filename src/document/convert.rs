//! BSON documents to JSON rows

use crate::Row;
use bson::{Bson, Document};
use serde_json::Value as JsonValue;

/// Plain JSON for a BSON value
///
/// ObjectIds become their hex string and datetimes RFC 3339 strings;
/// everything else follows relaxed extended JSON.
pub fn bson_to_json(value: Bson) -> JsonValue {
    match value {
        Bson::ObjectId(oid) => JsonValue::String(oid.to_hex()),
        Bson::DateTime(dt) => match dt.try_to_rfc3339_string() {
            Ok(s) => JsonValue::String(s),
            Err(_) => JsonValue::from(dt.timestamp_millis()),
        },
        Bson::Document(document) => JsonValue::Object(document_to_row(document)),
        Bson::Array(values) => JsonValue::Array(values.into_iter().map(bson_to_json).collect()),
        other => other.into_relaxed_extjson(),
    }
}

pub fn document_to_row(document: Document) -> Row {
    document
        .into_iter()
        .map(|(key, value)| (key, bson_to_json(value)))
        .collect()
}
