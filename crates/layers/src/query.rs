use scene::Feature;
use serde_json::{Number, Value};

use crate::error::LayerError;

/// Default row-id property used for feature identity.
pub const DEFAULT_UNIQUE_ID_PROPERTY: &str = "cartodb_id";

/// Resolves the identity used to dedupe a feature across tiles.
///
/// Reads `properties[unique_id_property]`, falling back to the feature-level id
/// when the property is absent or null. Numbers are keyed by their string form
/// (integral floats print without a fraction, so `7` and `7.0` collide). Any
/// other type is an error rather than a silent mis-dedupe.
pub fn feature_identity(feature: &Feature, unique_id_property: &str) -> Result<String, LayerError> {
    let value = feature
        .properties
        .get(unique_id_property)
        .filter(|v| !v.is_null())
        .or(feature.id.as_ref());

    match value {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(number_key(n)),
        other => Err(LayerError::InvalidFeatureId {
            property: unique_id_property.to_owned(),
            found: describe(other),
        }),
    }
}

fn number_key(n: &Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < 9_007_199_254_740_992.0 => (f as i64).to_string(),
        _ => n.to_string(),
    }
}

fn describe(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "nothing".to_owned(),
        Some(Value::Bool(b)) => format!("boolean {b}"),
        Some(Value::Array(_)) => "an array".to_owned(),
        Some(Value::Object(_)) => "an object".to_owned(),
        Some(v) => v.to_string(),
    }
}
