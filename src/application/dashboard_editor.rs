// Dashboard editor - one editing session around the config store and its collaborators
use crate::application::config_store::{DashboardConfigStore, PolygonOutcome};
use crate::application::data_source::{DashboardDataSource, DashboardPersistence};
use crate::domain::dashboard::DashboardConfig;
use crate::domain::error::FetchError;
use crate::domain::reference::{ReferenceData, ReferenceRecord};
use crate::domain::registry::{EditorProps, EditorView, WidgetTypeInfo, WidgetTypeRegistry};
use crate::domain::widget::POLYGON_ID_PATH;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

/// What the rendering layer needs after any operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub dashboard: DashboardConfig,
    pub last_error: Option<String>,
    pub newly_added: Option<usize>,
}

/// Cheap to clone; clones share the same session. Locks are never held across a call to
/// a collaborator.
#[derive(Clone)]
pub struct DashboardEditor {
    store: Arc<Mutex<DashboardConfigStore>>,
    reference: Arc<RwLock<ReferenceData>>,
    data_source: Arc<dyn DashboardDataSource>,
    persistence: Arc<dyn DashboardPersistence>,
    registry: Arc<WidgetTypeRegistry>,
}

impl DashboardEditor {
    pub fn open(
        config: DashboardConfig,
        registry: Arc<WidgetTypeRegistry>,
        data_source: Arc<dyn DashboardDataSource>,
        persistence: Arc<dyn DashboardPersistence>,
    ) -> Self {
        tracing::info!(
            "Opening dashboard editor for site {} with {} widgets",
            config.site_id,
            config.widgets.len()
        );

        let store = DashboardConfigStore::new(config, registry.clone());
        Self {
            store: Arc::new(Mutex::new(store)),
            reference: Arc::new(RwLock::new(ReferenceData::default())),
            data_source,
            persistence,
            registry,
        }
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let store = self.store.lock().await;
        snapshot_of(&store)
    }

    pub fn widget_types(&self) -> Vec<WidgetTypeInfo> {
        self.registry.types()
    }

    pub async fn reference_data(&self) -> ReferenceData {
        self.reference.read().await.clone()
    }

    pub async fn add_widget(&self) -> SessionSnapshot {
        let mut store = self.store.lock().await;
        store.add_widget();
        snapshot_of(&store)
    }

    pub async fn remove_widget(&self, index: usize) -> SessionSnapshot {
        let mut store = self.store.lock().await;
        store.remove_widget(index);
        snapshot_of(&store)
    }

    /// Writes `value` at `path` on widget `index`. A polygon chosen through
    /// `config.agromonitoringPolygonId` starts a lookup instead, and its id and bounds land
    /// together once the geometry arrives.
    pub async fn update_widget(&self, index: usize, path: &str, value: Value) -> SessionSnapshot {
        if path == POLYGON_ID_PATH {
            if let Some(polygon_id) = polygon_id_of(&value) {
                // Detached; the outcome is written to the store, not returned here
                if self.spawn_polygon_bounds(index, &polygon_id).await.is_none() {
                    tracing::debug!("Ignoring polygon selection for missing widget {}", index);
                }
                return self.snapshot().await;
            }
        }

        let mut store = self.store.lock().await;
        store.update_widget(index, path, value);
        snapshot_of(&store)
    }

    /// Editor description for widget `index`, or `None` if there is no such widget.
    pub async fn render_editor(&self, index: usize) -> Option<EditorView> {
        let store = self.store.lock().await;
        let widget = store.widget(index)?;
        let reference = self.reference.read().await;

        Some(self.registry.render(&EditorProps {
            widget,
            index,
            reference: &reference,
        }))
    }

    /// Starts a polygon lookup for widget `index` and returns the task applying its result.
    ///
    /// The request is registered before this returns, so calls made one after another are
    /// ordered even if their responses are not. The task holds only a weak reference to the
    /// session; if every handle is dropped first, the response is discarded.
    pub async fn spawn_polygon_bounds(
        &self,
        index: usize,
        polygon_id: &str,
    ) -> Option<JoinHandle<PolygonOutcome>> {
        let request = self.store.lock().await.begin_polygon_request(index, polygon_id)?;

        let store = Arc::downgrade(&self.store);
        let data_source = self.data_source.clone();

        Some(tokio::spawn(async move {
            let result = data_source
                .fetch_polygon_geometry(&request.polygon_id)
                .await;

            let Some(store) = store.upgrade() else {
                tracing::debug!(
                    "Session closed before polygon {} arrived",
                    request.polygon_id
                );
                return PolygonOutcome::Disposed;
            };

            let mut store = store.lock().await;
            store.complete_polygon_request(&request, result)
        }))
    }

    /// Fetches polygon geometry and writes `agromonitoringPolygonId` and `bounds` of widget
    /// `index`. Returns `None` for an unknown widget.
    pub async fn set_polygon_bounds(
        &self,
        index: usize,
        polygon_id: &str,
    ) -> Option<PolygonOutcome> {
        let handle = self.spawn_polygon_bounds(index, polygon_id).await?;

        match handle.await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                let message = format!("Polygon lookup for widget {} aborted: {}", index, e);
                self.store.lock().await.report_error(message.clone());
                Some(PolygonOutcome::Failed(message))
            }
        }
    }

    /// Reloads every reference collection for the dashboard's site. Collections that fail
    /// to load come back empty and the failure is reported.
    pub async fn refresh_reference_data(&self) -> ReferenceData {
        let site_id = self.store.lock().await.config().site_id.clone();
        let source = &self.data_source;

        let (sensors, locations, polygons, chart_configs, manual_capture_configs, cameras) =
            futures::join!(
                source.fetch_sensors(&site_id),
                source.fetch_locations(&site_id),
                source.fetch_polygons(&site_id),
                source.fetch_chart_configs(&site_id),
                source.fetch_manual_capture_configs(&site_id),
                source.fetch_cameras(&site_id),
            );

        let mut failures = Vec::new();
        let data = ReferenceData {
            sensors: collect("sensors", sensors, &mut failures),
            locations: collect("locations", locations, &mut failures),
            polygons: collect("polygons", polygons, &mut failures),
            chart_configs: collect("chart configurations", chart_configs, &mut failures),
            manual_capture_configs: collect(
                "manual capture forms",
                manual_capture_configs,
                &mut failures,
            ),
            cameras: collect("cameras", cameras, &mut failures),
        };

        if let Some(message) = failures.pop() {
            self.store.lock().await.report_error(message);
        }

        *self.reference.write().await = data.clone();
        data
    }

    /// Hands the saveable form of the dashboard to persistence. `name` defaults to the
    /// current dashboard name. On failure the store is unchanged and the error reported.
    pub async fn save(
        &self,
        name: Option<String>,
        dashboard_id: &str,
    ) -> Result<DashboardConfig, FetchError> {
        let saveable = {
            let store = self.store.lock().await;
            let config = store.config();
            let name = name.unwrap_or_else(|| config.name.clone());
            store.to_saveable(&name, &config.site_id, dashboard_id)
        };

        match self.persistence.save(dashboard_id, &saveable).await {
            Ok(()) => {
                tracing::info!(
                    "Saved dashboard {} with {} widgets",
                    dashboard_id,
                    saveable.widgets.len()
                );
                self.store.lock().await.clear_error();
                Ok(saveable)
            }
            Err(e) => {
                self.store
                    .lock()
                    .await
                    .report_error(format!("Could not save dashboard: {}", e));
                Err(e)
            }
        }
    }
}

fn snapshot_of(store: &DashboardConfigStore) -> SessionSnapshot {
    SessionSnapshot {
        dashboard: store.config().clone(),
        last_error: store.last_error().map(str::to_string),
        newly_added: store.newly_added(),
    }
}

fn polygon_id_of(value: &Value) -> Option<String> {
    match value {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

fn collect(
    what: &str,
    result: Result<Vec<ReferenceRecord>, FetchError>,
    failures: &mut Vec<String>,
) -> Vec<ReferenceRecord> {
    result.unwrap_or_else(|e| {
        failures.push(format!("Could not load {}: {}", what, e));
        Vec::new()
    })
}
