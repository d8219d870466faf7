// Dashboard domain model
use super::widget::Widget;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub site_id: String,
    /// Display order.
    #[serde(default)]
    pub widgets: Vec<Widget>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DashboardConfig {
    /// Build from an externally supplied object such as `{"widgets": [...]}`.
    /// `null` is treated as an empty dashboard.
    pub fn from_seed(seed: Value) -> Result<Self, serde_json::Error> {
        if seed.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(seed)
    }

    /// First grid row that no existing widget occupies.
    pub fn next_free_row(&self) -> u32 {
        self.widgets
            .iter()
            .map(|w| w.layout.bottom())
            .max()
            .unwrap_or(0)
    }
}
