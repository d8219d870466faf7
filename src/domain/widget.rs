// Widget domain model
use super::reference::id_from_string_or_number;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const TITLE_KEY: &str = "title";
pub const SHOW_HEADER_KEY: &str = "showHeader";
pub const CURRENT_DATE_KEY: &str = "currentDate";
pub const DASHBOARD_ID_KEY: &str = "dashboardId";
pub const POLYGON_ID_KEY: &str = "agromonitoringPolygonId";
pub const BOUNDS_KEY: &str = "bounds";

/// Field path the polygon selector sends back; the session turns it into a polygon lookup.
pub const POLYGON_ID_PATH: &str = "config.agromonitoringPolygonId";

pub const NEW_WIDGET_TITLE: &str = "New Widget";

/// Default footprint of a freshly added widget, in grid cells.
pub const DEFAULT_WIDTH: u32 = 3;
pub const DEFAULT_HEIGHT: u32 = 2;

/// Grid rectangle handed to the layout engine untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layout {
    #[serde(default)]
    pub x: u32,
    #[serde(default)]
    pub y: u32,
    #[serde(default)]
    pub w: u32,
    #[serde(default)]
    pub h: u32,
    #[serde(default, deserialize_with = "id_from_string_or_number")]
    pub i: String,
    /// Grid engine flags (`minW`, `static`, `moved`, ...), carried through as-is.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Layout {
    pub fn new(x: u32, y: u32, w: u32, h: u32, i: String) -> Self {
        Self {
            x,
            y,
            w,
            h,
            i,
            extra: Map::new(),
        }
    }

    /// First free row below this rectangle.
    pub fn bottom(&self) -> u32 {
        self.y.saturating_add(self.h)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Widget {
    /// Registry key; empty until the user picks a type.
    #[serde(rename = "type", default)]
    pub widget_type: String,
    #[serde(default)]
    pub config: Map<String, Value>,
    #[serde(default)]
    pub layout: Layout,
    /// Any other top-level fields, carried through load and save as-is.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Widget {
    /// A widget that has just been added: no type yet, placeholder title.
    pub fn stub(today: NaiveDate, layout: Layout) -> Self {
        let mut config = Map::new();
        config.insert(TITLE_KEY.to_string(), Value::from(NEW_WIDGET_TITLE));
        config.insert(
            CURRENT_DATE_KEY.to_string(),
            Value::from(today.format("%Y-%m-%d").to_string()),
        );

        Self {
            widget_type: String::new(),
            config,
            layout,
            extra: Map::new(),
        }
    }

    pub fn is_type_set(&self) -> bool {
        !self.widget_type.is_empty()
    }

    pub fn title(&self) -> Option<&str> {
        self.config.get(TITLE_KEY).and_then(Value::as_str)
    }

    /// Headers are shown unless the config explicitly says `false`.
    pub fn show_header(&self) -> bool {
        self.config
            .get(SHOW_HEADER_KEY)
            .and_then(Value::as_bool)
            .unwrap_or(true)
    }

    pub fn polygon_id(&self) -> Option<&str> {
        self.config.get(POLYGON_ID_KEY).and_then(Value::as_str)
    }
}
