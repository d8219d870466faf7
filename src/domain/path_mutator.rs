// Dotted field paths over a widget
//
// A path is either `config.<key>` (one key inside the widget's config map; the rest of the
// string after the prefix is the key, dots included) or a bare top-level field name.
use super::error::PathError;
use super::widget::{Layout, Widget};
use serde_json::Value;

pub const CONFIG_PREFIX: &str = "config.";
pub const TYPE_PATH: &str = "type";
pub const LAYOUT_PATH: &str = "layout";
pub const CONFIG_PATH: &str = "config";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigPath<'a> {
    /// A field on the widget itself.
    Field(&'a str),
    /// A key inside `widget.config`.
    Config(&'a str),
}

impl<'a> ConfigPath<'a> {
    pub fn parse(path: &'a str) -> Result<Self, PathError> {
        if path.is_empty() {
            return Err(PathError::Empty);
        }

        match path.strip_prefix(CONFIG_PREFIX) {
            Some("") => Err(PathError::EmptyConfigKey),
            Some(key) => Ok(ConfigPath::Config(key)),
            None => Ok(ConfigPath::Field(path)),
        }
    }
}

/// Current value at `path`, if there is one.
pub fn read(widget: &Widget, path: &str) -> Option<Value> {
    match ConfigPath::parse(path).ok()? {
        ConfigPath::Config(key) => widget.config.get(key).cloned(),
        ConfigPath::Field(TYPE_PATH) => Some(Value::from(widget.widget_type.as_str())),
        ConfigPath::Field(LAYOUT_PATH) => serde_json::to_value(&widget.layout).ok(),
        ConfigPath::Field(CONFIG_PATH) => Some(Value::Object(widget.config.clone())),
        ConfigPath::Field(name) => widget.extra.get(name).cloned(),
    }
}

/// Copy of `widget` with `value` written at `path`. The input is never modified; callers
/// treat an error as a no-op.
pub fn try_write(widget: &Widget, path: &str, value: Value) -> Result<Widget, PathError> {
    let parsed = ConfigPath::parse(path)?;
    let mut updated = widget.clone();

    match parsed {
        ConfigPath::Config(key) => {
            updated.config.insert(key.to_string(), value);
        }
        ConfigPath::Field(TYPE_PATH) => match value {
            Value::String(widget_type) => updated.widget_type = widget_type,
            other => return Err(invalid(path, format!("expected a string, got {}", other))),
        },
        ConfigPath::Field(LAYOUT_PATH) => {
            updated.layout = serde_json::from_value::<Layout>(value)
                .map_err(|e| invalid(path, e.to_string()))?;
        }
        ConfigPath::Field(CONFIG_PATH) => match value {
            Value::Object(config) => updated.config = config,
            other => return Err(invalid(path, format!("expected an object, got {}", other))),
        },
        ConfigPath::Field(name) => {
            updated.extra.insert(name.to_string(), value);
        }
    }

    Ok(updated)
}

fn invalid(path: &str, reason: String) -> PathError {
    PathError::InvalidValue {
        path: path.to_string(),
        reason,
    }
}
