// Widget type registry - maps a type key to its defaults and editor
use super::path_mutator::{self, CONFIG_PREFIX, TYPE_PATH};
use super::reference::{ReferenceData, ReferenceRecord};
use super::widget::{POLYGON_ID_KEY, SHOW_HEADER_KEY, TITLE_KEY, Widget};
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::sync::Arc;

/// Everything an editor gets to look at. Editors never fetch; the session has already
/// loaded the reference collections.
#[derive(Debug, Clone, Copy)]
pub struct EditorProps<'a> {
    pub widget: &'a Widget,
    pub index: usize,
    pub reference: &'a ReferenceData,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorView {
    pub index: usize,
    pub type_key: String,
    pub fields: Vec<EditorField>,
}

/// A single input. `path` is what the rendering layer sends back to `update_widget`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EditorField {
    pub path: String,
    pub label: String,
    #[serde(flatten)]
    pub kind: FieldKind,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FieldKind {
    Text,
    Number,
    Toggle,
    Date,
    Url,
    Select { options: Vec<SelectOption> },
    MultiSelect { options: Vec<SelectOption> },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
}

impl SelectOption {
    fn from_records(records: &[ReferenceRecord]) -> Vec<Self> {
        records
            .iter()
            .map(|r| SelectOption {
                value: r.id.clone(),
                label: r.name.clone(),
            })
            .collect()
    }
}

impl EditorField {
    fn config(widget: &Widget, key: &str, label: &str, kind: FieldKind) -> Self {
        let path = format!("{}{}", CONFIG_PREFIX, key);
        let value = path_mutator::read(widget, &path).unwrap_or(Value::Null);
        Self {
            path,
            label: label.to_string(),
            kind,
            value,
        }
    }

    fn select(widget: &Widget, key: &str, label: &str, records: &[ReferenceRecord]) -> Self {
        let options = SelectOption::from_records(records);
        Self::config(widget, key, label, FieldKind::Select { options })
    }
}

/// Capability set of one widget type.
pub trait WidgetEditor: Send + Sync {
    fn type_key(&self) -> &'static str;

    fn label(&self) -> &'static str;

    /// Keys a widget of this type starts with. Only keys missing from the widget's current
    /// config are filled in on a type change.
    fn default_config(&self) -> Map<String, Value> {
        Map::new()
    }

    /// Type-specific fields, shown after the generic title/header fields.
    fn render_editor(&self, props: &EditorProps<'_>) -> Vec<EditorField>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetTypeInfo {
    pub type_key: String,
    pub label: String,
}

/// Registered widget types in selector order.
#[derive(Clone, Default)]
pub struct WidgetTypeRegistry {
    editors: Vec<Arc<dyn WidgetEditor>>,
}

impl WidgetTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(SensorMapEditor));
        registry.register(Arc::new(ChartEditor::HYBRID));
        registry.register(Arc::new(PolygonSummaryEditor::NDVI));
        registry.register(Arc::new(PolygonSummaryEditor::SOIL));
        registry.register(Arc::new(ChartEditor::WEATHER));
        registry.register(Arc::new(ManualDataEntryEditor));
        registry.register(Arc::new(CameraStreamEditor));
        registry.register(Arc::new(PeopleCounterEditor));
        registry.register(Arc::new(ImageDisplayEditor));
        registry.register(Arc::new(SingleStatEditor));
        registry
    }

    /// Adds a type, or replaces the editor already registered under the same key.
    pub fn register(&mut self, editor: Arc<dyn WidgetEditor>) {
        match self
            .editors
            .iter()
            .position(|e| e.type_key() == editor.type_key())
        {
            Some(pos) => self.editors[pos] = editor,
            None => self.editors.push(editor),
        }
    }

    pub fn lookup(&self, type_key: &str) -> Option<&dyn WidgetEditor> {
        self.editors
            .iter()
            .find(|e| e.type_key() == type_key)
            .map(|e| &**e)
    }

    pub fn types(&self) -> Vec<WidgetTypeInfo> {
        self.editors
            .iter()
            .map(|e| WidgetTypeInfo {
                type_key: e.type_key().to_string(),
                label: e.label().to_string(),
            })
            .collect()
    }

    pub fn default_config(&self, type_key: &str) -> Map<String, Value> {
        self.lookup(type_key)
            .map(|e| e.default_config())
            .unwrap_or_default()
    }

    /// Full editor for a widget: the type selector, then (once a type is chosen) the
    /// generic fields and whatever the type's editor adds. Unknown types get only the
    /// generic fields.
    pub fn render(&self, props: &EditorProps<'_>) -> EditorView {
        let widget = props.widget;
        let options = self
            .editors
            .iter()
            .map(|e| SelectOption {
                value: e.type_key().to_string(),
                label: e.label().to_string(),
            })
            .collect();

        let mut fields = vec![EditorField {
            path: TYPE_PATH.to_string(),
            label: "Widget type".to_string(),
            kind: FieldKind::Select { options },
            value: Value::from(widget.widget_type.as_str()),
        }];

        if widget.is_type_set() {
            fields.push(EditorField::config(widget, TITLE_KEY, "Title", FieldKind::Text));
            fields.push(EditorField {
                value: Value::Bool(widget.show_header()),
                ..EditorField::config(widget, SHOW_HEADER_KEY, "Show header", FieldKind::Toggle)
            });

            match self.lookup(&widget.widget_type) {
                Some(editor) => fields.extend(editor.render_editor(props)),
                None => tracing::debug!(
                    "No editor registered for widget type {}",
                    widget.widget_type
                ),
            }
        }

        EditorView {
            index: props.index,
            type_key: widget.widget_type.clone(),
            fields,
        }
    }
}

struct SensorMapEditor;

impl WidgetEditor for SensorMapEditor {
    fn type_key(&self) -> &'static str {
        "sensorMap"
    }

    fn label(&self) -> &'static str {
        "Sensor map"
    }

    fn default_config(&self) -> Map<String, Value> {
        object(json!({ "zoom": 15, "sensorIds": [] }))
    }

    fn render_editor(&self, props: &EditorProps<'_>) -> Vec<EditorField> {
        let widget = props.widget;
        let reference = props.reference;
        vec![
            EditorField::select(widget, "locationId", "Location", &reference.locations),
            EditorField::select(widget, POLYGON_ID_KEY, "Field polygon", &reference.polygons),
            EditorField::config(
                widget,
                "sensorIds",
                "Sensors",
                FieldKind::MultiSelect {
                    options: SelectOption::from_records(&reference.sensors),
                },
            ),
            EditorField::config(widget, "zoom", "Zoom", FieldKind::Number),
        ]
    }
}

/// Chart widgets backed by a saved chart configuration.
struct ChartEditor {
    key: &'static str,
    label: &'static str,
}

impl ChartEditor {
    const HYBRID: ChartEditor = ChartEditor {
        key: "hybridChart",
        label: "Hybrid chart",
    };
    const WEATHER: ChartEditor = ChartEditor {
        key: "weatherChart",
        label: "Weather chart",
    };
}

impl WidgetEditor for ChartEditor {
    fn type_key(&self) -> &'static str {
        self.key
    }

    fn label(&self) -> &'static str {
        self.label
    }

    fn default_config(&self) -> Map<String, Value> {
        object(json!({ "timeRange": "7d" }))
    }

    fn render_editor(&self, props: &EditorProps<'_>) -> Vec<EditorField> {
        let widget = props.widget;
        vec![
            EditorField::select(
                widget,
                "chartConfigId",
                "Chart configuration",
                &props.reference.chart_configs,
            ),
            EditorField::config(widget, "timeRange", "Time range", FieldKind::Text),
            EditorField::config(widget, "startDate", "From", FieldKind::Date),
            EditorField::config(widget, "endDate", "To", FieldKind::Date),
        ]
    }
}

/// Summaries computed over a field polygon (NDVI, soil).
struct PolygonSummaryEditor {
    key: &'static str,
    label: &'static str,
}

impl PolygonSummaryEditor {
    const NDVI: PolygonSummaryEditor = PolygonSummaryEditor {
        key: "ndviSummary",
        label: "NDVI summary",
    };
    const SOIL: PolygonSummaryEditor = PolygonSummaryEditor {
        key: "soilData",
        label: "Soil data",
    };
}

impl WidgetEditor for PolygonSummaryEditor {
    fn type_key(&self) -> &'static str {
        self.key
    }

    fn label(&self) -> &'static str {
        self.label
    }

    fn render_editor(&self, props: &EditorProps<'_>) -> Vec<EditorField> {
        let widget = props.widget;
        vec![
            EditorField::select(widget, POLYGON_ID_KEY, "Field polygon", &props.reference.polygons),
            EditorField::config(widget, "currentDate", "Date", FieldKind::Date),
        ]
    }
}

struct ManualDataEntryEditor;

impl WidgetEditor for ManualDataEntryEditor {
    fn type_key(&self) -> &'static str {
        "manualDataEntry"
    }

    fn label(&self) -> &'static str {
        "Manual data entry"
    }

    fn render_editor(&self, props: &EditorProps<'_>) -> Vec<EditorField> {
        vec![EditorField::select(
            props.widget,
            "manualDataCaptureConfigId",
            "Capture form",
            &props.reference.manual_capture_configs,
        )]
    }
}

struct CameraStreamEditor;

impl WidgetEditor for CameraStreamEditor {
    fn type_key(&self) -> &'static str {
        "cameraStream"
    }

    fn label(&self) -> &'static str {
        "Camera stream"
    }

    fn render_editor(&self, props: &EditorProps<'_>) -> Vec<EditorField> {
        vec![EditorField::select(
            props.widget,
            "cameraId",
            "Camera",
            &props.reference.cameras,
        )]
    }
}

struct PeopleCounterEditor;

impl WidgetEditor for PeopleCounterEditor {
    fn type_key(&self) -> &'static str {
        "peopleCounter"
    }

    fn label(&self) -> &'static str {
        "People counter"
    }

    fn default_config(&self) -> Map<String, Value> {
        object(json!({ "timeRange": "24h" }))
    }

    fn render_editor(&self, props: &EditorProps<'_>) -> Vec<EditorField> {
        let widget = props.widget;
        vec![
            EditorField::select(widget, "cameraId", "Camera", &props.reference.cameras),
            EditorField::select(widget, "locationId", "Location", &props.reference.locations),
            EditorField::config(widget, "timeRange", "Time range", FieldKind::Text),
        ]
    }
}

struct ImageDisplayEditor;

impl WidgetEditor for ImageDisplayEditor {
    fn type_key(&self) -> &'static str {
        "imageDisplay"
    }

    fn label(&self) -> &'static str {
        "Image"
    }

    fn render_editor(&self, props: &EditorProps<'_>) -> Vec<EditorField> {
        vec![EditorField::config(props.widget, "imageUrl", "Image URL", FieldKind::Url)]
    }
}

struct SingleStatEditor;

impl WidgetEditor for SingleStatEditor {
    fn type_key(&self) -> &'static str {
        "singleStat"
    }

    fn label(&self) -> &'static str {
        "Single stat"
    }

    fn default_config(&self) -> Map<String, Value> {
        object(json!({ "decimals": 1 }))
    }

    fn render_editor(&self, props: &EditorProps<'_>) -> Vec<EditorField> {
        let widget = props.widget;
        vec![
            EditorField::select(widget, "sensorId", "Sensor", &props.reference.sensors),
            EditorField::config(widget, "unit", "Unit", FieldKind::Text),
            EditorField::config(widget, "decimals", "Decimals", FieldKind::Number),
        ]
    }
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
