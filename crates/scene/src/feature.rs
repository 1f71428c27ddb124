use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::components::{Geometry, Properties};

/// A geometry plus its attribute bag.
///
/// `id` is the feature-level identifier (GeoJSON `id`, MVT feature id), used as
/// an identity fallback when the configured id property is absent.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Feature {
    #[serde(default)]
    pub id: Option<Value>,
    pub geometry: Geometry,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub properties: Properties,
}

impl Feature {
    pub fn new(geometry: Geometry, properties: Properties) -> Self {
        Self {
            id: None,
            geometry,
            properties,
        }
    }

    pub fn with_id(mut self, id: impl Into<Value>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn from_geojson(value: &Value) -> Result<Self, serde_json::Error> {
        Feature::deserialize(value)
    }
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Properties, D::Error> {
    Ok(Option::<Properties>::deserialize(deserializer)?.unwrap_or_default())
}

/// Parses a GeoJSON `FeatureCollection` (or a bare array of features).
pub fn features_from_geojson(value: &Value) -> Result<Vec<Feature>, serde_json::Error> {
    #[derive(Deserialize)]
    struct Collection {
        features: Vec<Feature>,
    }

    if value.is_array() {
        return Vec::<Feature>::deserialize(value);
    }
    Ok(Collection::deserialize(value)?.features)
}

#[cfg(test)]
mod tests {
    use super::{Feature, features_from_geojson};
    use crate::components::Geometry;
    use serde_json::json;

    #[test]
    fn parses_collection_with_null_properties() {
        let fc = json!({
            "type": "FeatureCollection",
            "features": [
                { "type": "Feature", "id": 7, "geometry": { "type": "Point", "coordinates": [1, 2] }, "properties": null },
                { "type": "Feature", "geometry": { "type": "Point", "coordinates": [3, 4] }, "properties": { "pop": 10 } }
            ]
        });

        let features = features_from_geojson(&fc).unwrap();
        assert_eq!(features.len(), 2);
        assert_eq!(features[0].id, Some(json!(7)));
        assert!(features[0].properties.is_empty());
        assert_eq!(features[1].properties["pop"], json!(10));
        assert_eq!(features[1].geometry, Geometry::point(3.0, 4.0));
    }

    #[test]
    fn parses_bare_feature() {
        let f = Feature::from_geojson(&json!({
            "geometry": { "type": "LineString", "coordinates": [[0, 0], [1, 1]] }
        }))
        .unwrap();
        assert_eq!(f.id, None);
        assert_eq!(f.geometry.vertex_count(), 2);
    }

    #[test]
    fn missing_geometry_is_an_error() {
        assert!(Feature::from_geojson(&json!({ "properties": {} })).is_err());
    }
}
