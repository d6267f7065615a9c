use hex::ToHex;
use serde_json::Value;

use crate::store::Fields;

/// A store assigned identifier: 20 lowercase hex characters.
pub(crate) fn random_id() -> String {
    rand::random::<[u8; 10]>().encode_hex::<String>()
}

/// Turn a `json!` object into store fields. Anything that isn't an object gives no fields.
pub fn fields(value: Value) -> Fields {
    match value {
        Value::Object(map) => map,
        _ => Fields::new(),
    }
}

/// Form input is only ever trimmed, never rewritten inside.
pub(crate) fn clean_text(s: &str) -> String {
    s.trim().to_string()
}
