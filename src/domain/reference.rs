// Read-only reference collections offered to widget editors
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// One entry of a site-scoped list (sensor, location, camera, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceRecord {
    #[serde(deserialize_with = "id_from_string_or_number")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[cfg(test)]
impl ReferenceRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            extra: Map::new(),
        }
    }
}

// Backends disagree on whether ids are numbers or strings
pub(crate) fn id_from_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {}",
            other
        ))),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceData {
    pub sensors: Vec<ReferenceRecord>,
    pub locations: Vec<ReferenceRecord>,
    pub polygons: Vec<ReferenceRecord>,
    pub chart_configs: Vec<ReferenceRecord>,
    pub manual_capture_configs: Vec<ReferenceRecord>,
    pub cameras: Vec<ReferenceRecord>,
}
