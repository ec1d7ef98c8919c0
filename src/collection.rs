use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const FEATURE_COLLECTION: &str = "FeatureCollection";

fn collection_tag() -> String {
    FEATURE_COLLECTION.to_string()
}

/// A GeoJSON FeatureCollection. Features are kept as opaque JSON values;
/// any other top-level members of an input file are dropped on read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type", default = "collection_tag")]
    pub kind: String,
    pub features: Vec<Value>,
}

impl FeatureCollection {
    pub fn new(features: Vec<Value>) -> Self {
        Self {
            kind: collection_tag(),
            features,
        }
    }

    pub fn is_tagged(&self) -> bool {
        self.kind == FEATURE_COLLECTION
    }
}

// Borrowed form used for output, so a flush never clones the accumulator
#[derive(Serialize)]
struct CollectionView<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    features: &'a [Value],
}

/// Read and parse one input file. The top-level value must be an object
/// holding a `features` array.
pub fn read_collection(path: &Path) -> Result<FeatureCollection> {
    let content =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let json: Value =
        serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;

    // structs also deserialize from arrays by position; only accept objects
    if !json.is_object() {
        bail!(
            "parsing {}: top-level value must be an object, found {}",
            path.display(),
            json_kind(&json)
        );
    }
    serde_json::from_value(json).with_context(|| format!("parsing {}", path.display()))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Write `features` wrapped in a FeatureCollection to `path`, replacing
/// whatever was there.
pub fn write_collection(path: &Path, features: &[Value], pretty: bool) -> Result<()> {
    let file = File::create(path).with_context(|| format!("writing {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    let view = CollectionView {
        kind: FEATURE_COLLECTION,
        features,
    };

    let encoded = if pretty {
        serde_json::to_writer_pretty(&mut writer, &view)
    } else {
        serde_json::to_writer(&mut writer, &view)
    };
    encoded.with_context(|| format!("writing {}", path.display()))?;
    writer
        .flush()
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_read_collection_keeps_feature_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("points.geojson");
        fs::write(
            &path,
            r#"{"type":"FeatureCollection","name":"gauges","features":[{"id":1},{"id":2},{"id":3}]}"#,
        )
        .unwrap();

        let collection = read_collection(&path).unwrap();
        assert!(collection.is_tagged());
        assert_eq!(
            collection.features,
            vec![json!({"id": 1}), json!({"id": 2}), json!({"id": 3})]
        );
    }

    #[test]
    fn test_read_collection_without_type_member() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bare.geojson");
        fs::write(&path, r#"{"features":[]}"#).unwrap();

        let collection = read_collection(&path).unwrap();
        assert_eq!(collection.kind, FEATURE_COLLECTION);
        assert!(collection.features.is_empty());
    }

    #[test]
    fn test_read_collection_other_tag_is_not_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("odd.geojson");
        fs::write(&path, r#"{"type":"GeometryCollection","features":[{"id":7}]}"#).unwrap();

        let collection = read_collection(&path).unwrap();
        assert!(!collection.is_tagged());
        assert_eq!(collection.features.len(), 1);
    }

    #[test]
    fn test_read_collection_missing_features_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nofeatures.geojson");
        fs::write(&path, r#"{"type":"FeatureCollection"}"#).unwrap();

        let err = read_collection(&path).unwrap_err();
        assert!(format!("{err:#}").starts_with("parsing "));
    }

    #[test]
    fn test_read_collection_features_not_array_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scalar.geojson");
        fs::write(&path, r#"{"type":"FeatureCollection","features":{"id":1}}"#).unwrap();

        let err = read_collection(&path).unwrap_err();
        assert!(format!("{err:#}").starts_with("parsing "));
    }

    #[test]
    fn test_read_collection_positional_array_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("positional.geojson");
        fs::write(&path, r#"["FeatureCollection", [{"id": 1}, {"id": 2}]]"#).unwrap();

        let err = read_collection(&path).unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.starts_with("parsing "));
        assert!(msg.contains("found an array"));
    }

    #[test]
    fn test_read_collection_non_object_top_level_is_parse_error() {
        let dir = TempDir::new().unwrap();
        for (name, body) in [
            ("empty_array.geojson", "[]"),
            ("short_array.geojson", r#"["Polygon", []]"#),
            ("scalar.geojson", "42"),
            ("string.geojson", r#""FeatureCollection""#),
            ("null.geojson", "null"),
        ] {
            let path = dir.path().join(name);
            fs::write(&path, body).unwrap();

            let err = read_collection(&path).unwrap_err();
            assert!(format!("{err:#}").starts_with("parsing "), "{name} was accepted");
        }
    }

    #[test]
    fn test_read_collection_invalid_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.geojson");
        fs::write(&path, "{\"features\": [").unwrap();

        let err = read_collection(&path).unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("parsing"));
        assert!(msg.contains("broken.geojson"));
    }

    #[test]
    fn test_read_collection_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = read_collection(&dir.path().join("gone.geojson")).unwrap_err();
        assert!(format!("{err:#}").starts_with("reading "));
    }

    #[test]
    fn test_write_empty_collection_is_compact() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("merged.geojson");
        write_collection(&path, &[], false).unwrap();

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            r#"{"type":"FeatureCollection","features":[]}"#
        );
    }

    #[test]
    fn test_write_then_read_preserves_features() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("merged.geojson");
        let features = vec![
            json!({"type": "Feature", "geometry": {"type": "Point", "coordinates": [-91.5, 41.6]}, "properties": {"site": "05454500"}}),
            json!({"type": "Feature", "geometry": null, "properties": {}}),
        ];
        write_collection(&path, &features, true).unwrap();

        let raw: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["type"], FEATURE_COLLECTION);
        assert_eq!(raw["features"], Value::Array(features.clone()));

        let collection = read_collection(&path).unwrap();
        assert_eq!(collection, FeatureCollection::new(features));
    }

    #[test]
    fn test_write_overwrites_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("merged.geojson");
        write_collection(&path, &[json!(1), json!(2)], false).unwrap();
        write_collection(&path, &[json!(3)], false).unwrap();

        assert_eq!(read_collection(&path).unwrap().features, vec![json!(3)]);
    }

    #[test]
    fn test_write_into_missing_directory_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("no_such_dir").join("merged.geojson");
        let err = write_collection(&path, &[], false).unwrap_err();
        assert!(format!("{err:#}").starts_with("writing "));
    }
}
