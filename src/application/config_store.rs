// Dashboard config store - the authoritative widget list and its edit operations
use crate::domain::dashboard::DashboardConfig;
use crate::domain::error::{DashboardError, FetchError};
use crate::domain::geometry::{self, PolygonBounds, PolygonGeometry};
use crate::domain::path_mutator::{self, TYPE_PATH};
use crate::domain::registry::WidgetTypeRegistry;
use crate::domain::widget::{
    BOUNDS_KEY, DASHBOARD_ID_KEY, DEFAULT_HEIGHT, DEFAULT_WIDTH, Layout, POLYGON_ID_KEY,
    SHOW_HEADER_KEY, TITLE_KEY, Widget,
};
use chrono::NaiveDate;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Handle for one in-flight polygon lookup. Only the most recently issued request for a
/// widget may write its bounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolygonRequest {
    pub polygon_id: String,
    token: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PolygonOutcome {
    /// Polygon id and bounds were written together.
    Applied(PolygonBounds),
    /// A newer request for the same widget exists, or the widget is gone.
    Stale,
    /// Fetch or projection failed; the widget was left as it was.
    Failed(String),
    /// The editing session was closed before the response arrived.
    Disposed,
}

#[derive(Debug, Clone)]
struct PendingPolygon {
    polygon_id: String,
    token: u64,
}

/// Invalid indices and paths are ignored rather than reported; the editor UI only ever
/// offers valid ones.
pub struct DashboardConfigStore {
    config: DashboardConfig,
    registry: Arc<WidgetTypeRegistry>,
    pending_polygons: HashMap<usize, PendingPolygon>,
    next_token: u64,
    next_layout_id: u64,
    last_error: Option<String>,
    newly_added: Option<usize>,
}

impl DashboardConfigStore {
    pub fn new(config: DashboardConfig, registry: Arc<WidgetTypeRegistry>) -> Self {
        let next_layout_id = config.widgets.len() as u64;
        Self {
            config,
            registry,
            pending_polygons: HashMap::new(),
            next_token: 0,
            next_layout_id,
            last_error: None,
            newly_added: None,
        }
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    pub fn widgets(&self) -> &[Widget] {
        &self.config.widgets
    }

    pub fn widget(&self, index: usize) -> Option<&Widget> {
        self.config.widgets.get(index)
    }

    /// Most recent user-visible error, cleared by the next successful operation.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    pub fn report_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("Dashboard editor error: {}", message);
        self.last_error = Some(message);
    }

    /// Index of the widget added last, for the renderer to expand its editor.
    pub fn newly_added(&self) -> Option<usize> {
        self.newly_added
    }

    pub fn add_widget(&mut self) -> usize {
        self.add_widget_on(chrono::Local::now().date_naive())
    }

    /// Appends an untyped widget in a new row below everything else.
    pub fn add_widget_on(&mut self, today: NaiveDate) -> usize {
        let layout = Layout::new(
            0,
            self.config.next_free_row(),
            DEFAULT_WIDTH,
            DEFAULT_HEIGHT,
            self.fresh_layout_id(),
        );

        self.config.widgets.push(Widget::stub(today, layout));
        let index = self.config.widgets.len() - 1;

        tracing::debug!("Added widget {} at row {}", index, self.config.widgets[index].layout.y);
        self.newly_added = Some(index);
        self.last_error = None;
        index
    }

    pub fn remove_widget(&mut self, index: usize) -> bool {
        if index >= self.config.widgets.len() {
            tracing::debug!("Ignoring removal of missing widget {}", index);
            return false;
        }

        let removed = self.config.widgets.remove(index);
        tracing::debug!("Removed widget {} ({})", index, removed.title().unwrap_or("untitled"));

        // Pending lookups follow their widget to its new position
        let pending = std::mem::take(&mut self.pending_polygons);
        self.pending_polygons = pending
            .into_iter()
            .filter(|(i, _)| *i != index)
            .map(|(i, pending)| if i > index { (i - 1, pending) } else { (i, pending) })
            .collect();

        self.newly_added = match self.newly_added {
            Some(i) if i == index => None,
            Some(i) if i > index => Some(i - 1),
            other => other,
        };
        self.last_error = None;
        true
    }

    /// Writes `value` at `path` on widget `index`. Changing `type` also reseeds the title
    /// and header flag and fills in the new type's defaults for keys not already set.
    ///
    /// `agromonitoringPolygonId` and `bounds` are never written here, whatever the path;
    /// they only change together through a polygon request.
    pub fn update_widget(&mut self, index: usize, path: &str, value: Value) -> bool {
        let Some(current) = self.config.widgets.get(index) else {
            tracing::debug!("Ignoring update of missing widget {}", index);
            return false;
        };

        let mut updated = match path_mutator::try_write(current, path, value) {
            Ok(updated) => updated,
            Err(e) => {
                tracing::debug!("Ignoring update of widget {}: {}", index, e);
                return false;
            }
        };

        if polygon_changed(current, &updated) {
            tracing::debug!(
                "Ignoring update of widget {}: `{}` would change its polygon outside a lookup",
                index,
                path
            );
            return false;
        }

        if path == TYPE_PATH {
            let mut config = self.registry.default_config(&updated.widget_type);
            for (key, value) in std::mem::take(&mut updated.config) {
                config.insert(key, value);
            }
            config.insert(
                TITLE_KEY.to_string(),
                Value::from(format!("New {}", updated.widget_type)),
            );
            config.insert(SHOW_HEADER_KEY.to_string(), Value::Bool(true));
            updated.config = config;
        }

        self.config.widgets[index] = updated;
        self.last_error = None;
        true
    }

    /// Registers a polygon lookup for widget `index`, superseding any earlier one.
    pub fn begin_polygon_request(
        &mut self,
        index: usize,
        polygon_id: &str,
    ) -> Option<PolygonRequest> {
        if index >= self.config.widgets.len() {
            tracing::debug!("Ignoring polygon lookup for missing widget {}", index);
            return None;
        }

        self.next_token += 1;
        let token = self.next_token;
        let superseded = self.pending_polygons.insert(
            index,
            PendingPolygon {
                polygon_id: polygon_id.to_string(),
                token,
            },
        );
        if let Some(previous) = superseded {
            tracing::debug!(
                "Polygon {} supersedes pending lookup of {} for widget {}",
                polygon_id,
                previous.polygon_id,
                index
            );
        }

        Some(PolygonRequest {
            polygon_id: polygon_id.to_string(),
            token,
        })
    }

    /// Applies the result of a lookup started with [`begin_polygon_request`]. Polygon id and
    /// bounds are written in a single widget replacement or not at all.
    ///
    /// [`begin_polygon_request`]: Self::begin_polygon_request
    pub fn complete_polygon_request(
        &mut self,
        request: &PolygonRequest,
        result: Result<PolygonGeometry, FetchError>,
    ) -> PolygonOutcome {
        let Some(index) = self
            .pending_polygons
            .iter()
            .find(|(_, pending)| pending.token == request.token)
            .map(|(i, _)| *i)
        else {
            tracing::debug!(
                "Discarding stale geometry for polygon {}",
                request.polygon_id
            );
            return PolygonOutcome::Stale;
        };

        self.pending_polygons.remove(&index);

        let bounds = match project_result(result) {
            Ok(bounds) => bounds,
            Err(e) => {
                let message = format!(
                    "Could not load bounds for polygon {}: {}",
                    request.polygon_id, e
                );
                self.report_error(message.clone());
                return PolygonOutcome::Failed(message);
            }
        };

        let mut updated = self.config.widgets[index].clone();
        updated.config.insert(
            POLYGON_ID_KEY.to_string(),
            Value::from(request.polygon_id.as_str()),
        );
        updated
            .config
            .insert(BOUNDS_KEY.to_string(), bounds.to_value());
        self.config.widgets[index] = updated;

        tracing::debug!("Applied bounds of polygon {} to widget {}", request.polygon_id, index);
        self.last_error = None;
        PolygonOutcome::Applied(bounds)
    }

    /// Serializable copy with dashboard metadata attached and every widget stamped with
    /// `dashboard_id`. The store itself is not modified.
    pub fn to_saveable(&self, name: &str, site_id: &str, dashboard_id: &str) -> DashboardConfig {
        let mut saveable = self.config.clone();
        saveable.name = name.to_string();
        saveable.site_id = site_id.to_string();
        for widget in &mut saveable.widgets {
            widget
                .config
                .insert(DASHBOARD_ID_KEY.to_string(), Value::from(dashboard_id));
        }
        saveable
    }

    fn fresh_layout_id(&mut self) -> String {
        loop {
            let id = self.next_layout_id.to_string();
            self.next_layout_id += 1;
            if !self.config.widgets.iter().any(|w| w.layout.i == id) {
                return id;
            }
        }
    }
}

fn polygon_changed(before: &Widget, after: &Widget) -> bool {
    [POLYGON_ID_KEY, BOUNDS_KEY]
        .iter()
        .any(|key| before.config.get(*key) != after.config.get(*key))
}

fn project_result(
    result: Result<PolygonGeometry, FetchError>,
) -> Result<PolygonBounds, DashboardError> {
    let polygon = result?;
    Ok(geometry::project(&polygon)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::widget::POLYGON_ID_PATH;
    use serde_json::json;

    fn store_with(widgets: Value) -> DashboardConfigStore {
        let config = DashboardConfig::from_seed(json!({ "widgets": widgets })).unwrap();
        DashboardConfigStore::new(config, Arc::new(WidgetTypeRegistry::builtin()))
    }

    fn two_widgets() -> DashboardConfigStore {
        store_with(json!([
            {
                "type": "singleStat",
                "config": { "title": "Temp", "refreshInterval": 30 },
                "layout": { "x": 0, "y": 0, "w": 3, "h": 2, "i": "0" }
            },
            {
                "type": "imageDisplay",
                "config": { "title": "Photo", "imageUrl": "https://example.com/a.png" },
                "layout": { "x": 3, "y": 0, "w": 3, "h": 4, "i": "1" }
            }
        ]))
    }

    fn square() -> PolygonGeometry {
        PolygonGeometry::from_ring(vec![[10.0, 50.0], [10.0, 51.0], [11.0, 51.0], [11.0, 50.0]])
    }

    #[test]
    fn test_update_title_touches_nothing_else() {
        let mut store = two_widgets();
        let before = store.config().clone();

        assert!(store.update_widget(0, "config.title", json!("Soil temp")));

        let widgets = store.widgets();
        assert_eq!(widgets[0].title(), Some("Soil temp"));
        assert_eq!(widgets[0].widget_type, before.widgets[0].widget_type);
        assert_eq!(widgets[0].layout, before.widgets[0].layout);
        assert_eq!(widgets[0].config["refreshInterval"], json!(30));
        assert_eq!(widgets[0].config.len(), before.widgets[0].config.len());
        assert_eq!(widgets[1], before.widgets[1]);
    }

    #[test]
    fn test_invalid_updates_are_ignored() {
        let mut store = two_widgets();
        let before = store.config().clone();

        assert!(!store.update_widget(5, "config.title", json!("x")));
        assert!(!store.update_widget(0, "", json!("x")));
        assert!(!store.update_widget(0, "type", json!(3)));
        assert_eq!(store.config(), &before);
    }

    #[test]
    fn test_type_change_reseeds_title_and_keeps_other_keys() {
        let mut store = two_widgets();
        store.update_widget(0, "config.showHeader", json!(false));

        assert!(store.update_widget(0, "type", json!("weatherChart")));

        let widget = &store.widgets()[0];
        assert_eq!(widget.widget_type, "weatherChart");
        assert_eq!(widget.title(), Some("New weatherChart"));
        assert_eq!(widget.config[SHOW_HEADER_KEY], json!(true));
        assert_eq!(widget.config["refreshInterval"], json!(30));
        // Defaults fill only missing keys
        assert_eq!(widget.config["timeRange"], json!("7d"));
    }

    #[test]
    fn test_type_change_does_not_override_existing_keys_with_defaults() {
        let mut store = two_widgets();
        store.update_widget(0, "config.timeRange", json!("30d"));
        store.update_widget(0, "type", json!("hybridChart"));

        assert_eq!(store.widgets()[0].config["timeRange"], json!("30d"));
    }

    #[test]
    fn test_type_change_to_unknown_type() {
        let mut store = two_widgets();
        store.update_widget(1, "type", json!("pieChart"));

        let widget = &store.widgets()[1];
        assert_eq!(widget.title(), Some("New pieChart"));
        assert_eq!(widget.config["imageUrl"], json!("https://example.com/a.png"));
    }

    #[test]
    fn test_add_widget_stacks_below_existing() {
        let mut store = two_widgets();
        let today = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();

        let index = store.add_widget_on(today);

        assert_eq!(index, 2);
        let widget = &store.widgets()[2];
        assert_eq!(widget.widget_type, "");
        assert_eq!(widget.title(), Some("New Widget"));
        assert_eq!(widget.config["currentDate"], json!("2024-05-01"));
        assert_eq!(widget.layout.x, 0);
        assert_eq!(widget.layout.y, 4);
        assert_eq!((widget.layout.w, widget.layout.h), (3, 2));
        assert_eq!(store.newly_added(), Some(2));

        for other in &store.widgets()[..2] {
            assert!(other.layout.bottom() <= widget.layout.y);
        }
    }

    #[test]
    fn test_add_widget_ids_are_unique() {
        let mut store = two_widgets();
        store.add_widget();
        store.add_widget();

        let mut ids: Vec<&str> = store.widgets().iter().map(|w| w.layout.i.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 4);
    }

    #[test]
    fn test_add_to_empty_store() {
        let mut store = store_with(json!([]));
        store.add_widget();

        assert_eq!(store.widgets().len(), 1);
        assert_eq!(store.widgets()[0].layout.y, 0);
    }

    #[test]
    fn test_remove_widget_preserves_order() {
        let mut store = two_widgets();
        store.add_widget();
        let before = store.widgets().to_vec();

        assert!(store.remove_widget(1));

        assert_eq!(store.widgets().len(), 2);
        assert_eq!(store.widgets()[0], before[0]);
        assert_eq!(store.widgets()[1], before[2]);
        assert_eq!(store.newly_added(), Some(1));
    }

    #[test]
    fn test_remove_out_of_range_is_no_op() {
        let mut store = two_widgets();
        let before = serde_json::to_vec(store.config()).unwrap();

        assert!(!store.remove_widget(2));
        assert_eq!(serde_json::to_vec(store.config()).unwrap(), before);
    }

    #[test]
    fn test_polygon_bounds_applied_together() {
        let mut store = two_widgets();
        let request = store.begin_polygon_request(0, "poly-1").unwrap();

        let outcome = store.complete_polygon_request(&request, Ok(square()));

        assert!(matches!(outcome, PolygonOutcome::Applied(_)));
        let widget = &store.widgets()[0];
        assert_eq!(widget.polygon_id(), Some("poly-1"));
        assert_eq!(
            widget.config[BOUNDS_KEY],
            json!({ "topLeft": [50.0, 10.0], "bottomRight": [51.0, 11.0] })
        );
    }

    #[test]
    fn test_last_requested_polygon_wins() {
        let mut store = two_widgets();
        let first = store.begin_polygon_request(0, "poly-a").unwrap();
        let second = store.begin_polygon_request(0, "poly-b").unwrap();

        let newer = PolygonGeometry::from_ring(vec![[1.0, 2.0], [1.0, 3.0], [4.0, 3.0]]);
        assert!(matches!(
            store.complete_polygon_request(&second, Ok(newer)),
            PolygonOutcome::Applied(_)
        ));
        // Older response arriving late is dropped
        assert_eq!(
            store.complete_polygon_request(&first, Ok(square())),
            PolygonOutcome::Stale
        );

        let widget = &store.widgets()[0];
        assert_eq!(widget.polygon_id(), Some("poly-b"));
        assert_eq!(widget.config[BOUNDS_KEY]["topLeft"], json!([2.0, 1.0]));
    }

    #[test]
    fn test_superseded_failure_does_not_report() {
        let mut store = two_widgets();
        let first = store.begin_polygon_request(0, "poly-a").unwrap();
        let _second = store.begin_polygon_request(0, "poly-b").unwrap();

        let outcome = store.complete_polygon_request(
            &first,
            Err(FetchError::Unavailable("timeout".to_string())),
        );

        assert_eq!(outcome, PolygonOutcome::Stale);
        assert_eq!(store.last_error(), None);
    }

    #[test]
    fn test_polygon_failure_keeps_previous_bounds() {
        let mut store = two_widgets();
        let request = store.begin_polygon_request(0, "poly-1").unwrap();
        store.complete_polygon_request(&request, Ok(square()));
        let before = store.widgets()[0].clone();

        let request = store.begin_polygon_request(0, "poly-2").unwrap();
        let two_points = PolygonGeometry::from_ring(vec![[1.0, 2.0], [3.0, 4.0]]);
        let outcome = store.complete_polygon_request(&request, Ok(two_points));
        assert!(matches!(outcome, PolygonOutcome::Failed(_)));
        assert_eq!(store.widgets()[0], before);
        assert!(store.last_error().unwrap().contains("poly-2"));

        let request = store.begin_polygon_request(0, "poly-3").unwrap();
        let outcome = store.complete_polygon_request(
            &request,
            Err(FetchError::Status {
                status: 500,
                message: "boom".to_string(),
            }),
        );
        assert!(matches!(outcome, PolygonOutcome::Failed(_)));
        assert_eq!(store.widgets()[0], before);

        // Next successful edit clears the message
        store.update_widget(0, "config.title", json!("Field"));
        assert_eq!(store.last_error(), None);
    }

    #[test]
    fn test_pending_polygon_follows_widget_after_removal() {
        let mut store = two_widgets();
        let request = store.begin_polygon_request(1, "poly-1").unwrap();

        store.remove_widget(0);
        store.complete_polygon_request(&request, Ok(square()));

        assert_eq!(store.widgets()[0].widget_type, "imageDisplay");
        assert_eq!(store.widgets()[0].polygon_id(), Some("poly-1"));
    }

    #[test]
    fn test_pending_polygon_dropped_with_its_widget() {
        let mut store = two_widgets();
        let request = store.begin_polygon_request(0, "poly-1").unwrap();

        store.remove_widget(0);

        assert_eq!(
            store.complete_polygon_request(&request, Ok(square())),
            PolygonOutcome::Stale
        );
        assert_eq!(store.widgets()[0].polygon_id(), None);
    }

    #[test]
    fn test_direct_polygon_writes_are_ignored() {
        let mut store = two_widgets();
        let request = store.begin_polygon_request(0, "poly-1").unwrap();
        store.complete_polygon_request(&request, Ok(square()));
        let before = store.widgets()[0].clone();

        assert!(!store.update_widget(0, POLYGON_ID_PATH, json!("poly-2")));
        assert!(!store.update_widget(0, "config.bounds", json!({ "topLeft": [0.0, 0.0] })));

        let mut config = before.config.clone();
        config.insert(POLYGON_ID_KEY.to_string(), json!("poly-2"));
        assert!(!store.update_widget(0, "config", Value::Object(config)));

        assert_eq!(store.widgets()[0], before);
        assert_eq!(store.widgets()[0].polygon_id(), Some("poly-1"));
    }

    #[test]
    fn test_whole_config_write_keeping_polygon_is_allowed() {
        let mut store = two_widgets();
        let request = store.begin_polygon_request(0, "poly-1").unwrap();
        store.complete_polygon_request(&request, Ok(square()));

        let mut config = store.widgets()[0].config.clone();
        config.insert("decimals".to_string(), json!(2));
        assert!(store.update_widget(0, "config", Value::Object(config)));

        let widget = &store.widgets()[0];
        assert_eq!(widget.config["decimals"], json!(2));
        assert_eq!(widget.polygon_id(), Some("poly-1"));
    }

    #[test]
    fn test_pending_lookup_not_undercut_by_direct_write() {
        let mut store = two_widgets();
        let request = store.begin_polygon_request(0, "poly-a").unwrap();

        assert!(!store.update_widget(0, POLYGON_ID_PATH, json!("poly-b")));
        store.complete_polygon_request(&request, Ok(square()));

        // Id and bounds still describe the same polygon
        let widget = &store.widgets()[0];
        assert_eq!(widget.polygon_id(), Some("poly-a"));
        assert_eq!(widget.config[BOUNDS_KEY]["topLeft"], json!([50.0, 10.0]));
    }

    #[test]
    fn test_seeded_layout_at_grid_limit() {
        let mut store = store_with(json!([
            {
                "type": "singleStat",
                "layout": { "x": 0, "y": u32::MAX, "w": 3, "h": 2, "i": "a" }
            }
        ]));

        let index = store.add_widget();
        assert_eq!(store.widgets()[index].layout.y, u32::MAX);
    }

    #[test]
    fn test_layout_extras_survive_save() {
        let mut store = store_with(json!([
            {
                "type": "singleStat",
                "config": { "title": "Temp" },
                "layout": { "x": 0, "y": 0, "w": 3, "h": 2, "i": 7, "minW": 2, "static": true }
            }
        ]));
        store.update_widget(0, "config.title", json!("Soil temp"));

        let saveable = store.to_saveable("Farm", "site-1", "dash-1");
        let layout = serde_json::to_value(&saveable.widgets[0].layout).unwrap();
        assert_eq!(
            layout,
            json!({ "x": 0, "y": 0, "w": 3, "h": 2, "i": "7", "minW": 2, "static": true })
        );
    }

    #[test]
    fn test_polygon_request_for_missing_widget() {
        let mut store = two_widgets();
        assert!(store.begin_polygon_request(9, "poly-1").is_none());
    }

    #[test]
    fn test_to_saveable_stamps_dashboard_id() {
        let mut store = two_widgets();
        let before = store.config().clone();

        let saveable = store.to_saveable("North farm", "site-3", "dash-42");

        assert_eq!(saveable.name, "North farm");
        assert_eq!(saveable.site_id, "site-3");
        assert_eq!(saveable.widgets.len(), 2);
        for (saved, original) in saveable.widgets.iter().zip(&before.widgets) {
            assert_eq!(saved.config[DASHBOARD_ID_KEY], json!("dash-42"));

            let mut stripped = saved.clone();
            stripped.config.remove(DASHBOARD_ID_KEY);
            assert_eq!(&stripped, original);
        }

        // Store untouched
        assert_eq!(store.config(), &before);
        store.add_widget();
        assert_eq!(saveable.widgets.len(), 2);
    }
}
