use serde_json::{Map, Value};

/// Attribute bag attached to a feature.
pub type Properties = Map<String, Value>;

/// Copies the requested keys out of `props`, in request order.
///
/// Selection is explicit: an empty `keys` slice yields an empty bag. Keys the
/// feature does not carry are left out.
pub fn pick_properties(props: &Properties, keys: &[String]) -> Properties {
    let mut out = Properties::new();
    for key in keys {
        if let Some(v) = props.get(key) {
            out.insert(key.clone(), v.clone());
        }
    }
    out
}

/// Reads `key` as a number. Missing keys, nulls and non-numeric values are `None`.
pub fn numeric_property(props: &Properties, key: &str) -> Option<f64> {
    props.get(key).and_then(Value::as_f64)
}
