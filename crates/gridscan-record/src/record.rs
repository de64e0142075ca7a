use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Field name to value. Ordered so serialized checkpoints are stable.
pub type Attributes = BTreeMap<String, Value>;

/// One listing as returned by the source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Source-assigned, globally stable identifier.
    pub unique_id: String,
    #[serde(default)]
    pub attributes: Attributes,
}

impl Record {
    pub fn new(unique_id: impl Into<String>) -> Self {
        Self {
            unique_id: unique_id.into(),
            attributes: Attributes::new(),
        }
    }

    #[must_use]
    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// `(latitude, longitude)` when both are present as numbers.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        let lat = self.get("latitude")?.as_f64()?;
        let lon = self.get("longitude")?.as_f64()?;
        Some((lat, lon))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn coordinates_need_both_numbers() {
        let full = Record::new("a")
            .attribute("latitude", 51.0)
            .attribute("longitude", -114.0);
        assert_eq!(full.coordinates(), Some((51.0, -114.0)));

        let partial = Record::new("b").attribute("latitude", 51.0);
        assert_eq!(partial.coordinates(), None);

        let textual = Record::new("c")
            .attribute("latitude", "51.0")
            .attribute("longitude", -114.0);
        assert_eq!(textual.coordinates(), None);
    }

    #[test]
    fn missing_attributes_deserialize_empty() {
        let record: Record = serde_json::from_value(json!({ "unique_id": "x" })).unwrap();
        assert_eq!(record, Record::new("x"));
    }
}
