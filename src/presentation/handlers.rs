// HTTP request handlers
use crate::application::config_store::PolygonOutcome;
use crate::application::dashboard_editor::SessionSnapshot;
use crate::domain::dashboard::DashboardConfig;
use crate::domain::reference::ReferenceData;
use crate::domain::registry::{EditorView, WidgetTypeInfo};
use crate::presentation::app_state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

#[derive(Deserialize)]
pub struct UpdateWidgetRequest {
    pub path: String,
    #[serde(default)]
    pub value: Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolygonBoundsRequest {
    pub polygon_id: String,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SaveRequest {
    pub name: Option<String>,
    pub dashboard_id: Option<String>,
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

pub async fn get_dashboard(State(state): State<Arc<AppState>>) -> Json<SessionSnapshot> {
    Json(state.editor.snapshot().await)
}

pub async fn list_widget_types(State(state): State<Arc<AppState>>) -> Json<Vec<WidgetTypeInfo>> {
    Json(state.editor.widget_types())
}

pub async fn add_widget(State(state): State<Arc<AppState>>) -> Json<SessionSnapshot> {
    Json(state.editor.add_widget().await)
}

/// Unknown indices are ignored; the response shows the unchanged dashboard.
pub async fn remove_widget(
    Path(index): Path<usize>,
    State(state): State<Arc<AppState>>,
) -> Json<SessionSnapshot> {
    Json(state.editor.remove_widget(index).await)
}

pub async fn update_widget(
    Path(index): Path<usize>,
    State(state): State<Arc<AppState>>,
    Json(request): Json<UpdateWidgetRequest>,
) -> Json<SessionSnapshot> {
    Json(
        state
            .editor
            .update_widget(index, &request.path, request.value)
            .await,
    )
}

/// Looks up the polygon and stores its bounds on the widget. Failures show up as
/// `lastError` in the returned snapshot.
pub async fn set_polygon_bounds(
    Path(index): Path<usize>,
    State(state): State<Arc<AppState>>,
    Json(request): Json<PolygonBoundsRequest>,
) -> Json<SessionSnapshot> {
    match state
        .editor
        .set_polygon_bounds(index, &request.polygon_id)
        .await
    {
        Some(PolygonOutcome::Applied(_)) => {
            tracing::info!("Widget {} now shows polygon {}", index, request.polygon_id)
        }
        Some(outcome) => tracing::debug!("Polygon lookup for widget {}: {:?}", index, outcome),
        None => tracing::debug!("Polygon lookup for missing widget {}", index),
    }

    Json(state.editor.snapshot().await)
}

pub async fn widget_editor(
    Path(index): Path<usize>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<EditorView>, StatusCode> {
    state
        .editor
        .render_editor(index)
        .await
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

pub async fn get_reference_data(State(state): State<Arc<AppState>>) -> Json<ReferenceData> {
    Json(state.editor.reference_data().await)
}

pub async fn refresh_reference_data(State(state): State<Arc<AppState>>) -> Json<ReferenceData> {
    Json(state.editor.refresh_reference_data().await)
}

pub async fn save_dashboard(
    State(state): State<Arc<AppState>>,
    request: Option<Json<SaveRequest>>,
) -> Result<Json<DashboardConfig>, (StatusCode, String)> {
    let Json(request) = request.unwrap_or_default();
    let dashboard_id = request
        .dashboard_id
        .unwrap_or_else(|| state.dashboard_id.clone());

    match state.editor.save(request.name, &dashboard_id).await {
        Ok(saved) => Ok(Json(saved)),
        Err(e) => {
            tracing::error!("Error saving dashboard {}: {}", dashboard_id, e);
            Err((StatusCode::BAD_GATEWAY, e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::dashboard_editor::DashboardEditor;
    use crate::application::data_source::{MockDashboardDataSource, MockDashboardPersistence};
    use crate::domain::error::FetchError;
    use crate::domain::geometry::PolygonGeometry;
    use crate::domain::registry::WidgetTypeRegistry;
    use serde_json::json;

    fn state(
        source: MockDashboardDataSource,
        persistence: MockDashboardPersistence,
    ) -> Arc<AppState> {
        let seed = DashboardConfig::from_seed(json!({
            "name": "Orchard",
            "siteId": "site-1",
            "widgets": [
                { "type": "ndviSummary", "config": { "title": "NDVI" },
                  "layout": { "x": 0, "y": 0, "w": 3, "h": 2, "i": "0" } }
            ]
        }))
        .unwrap();

        Arc::new(AppState {
            editor: DashboardEditor::open(
                seed,
                Arc::new(WidgetTypeRegistry::builtin()),
                Arc::new(source),
                Arc::new(persistence),
            ),
            dashboard_id: "dash-1".to_string(),
        })
    }

    #[tokio::test]
    async fn test_add_then_update() {
        let state = state(MockDashboardDataSource::new(), MockDashboardPersistence::new());

        let Json(snapshot) = add_widget(State(state.clone())).await;
        assert_eq!(snapshot.newly_added, Some(1));

        let Json(snapshot) = update_widget(
            Path(1),
            State(state.clone()),
            Json(UpdateWidgetRequest {
                path: "config.title".to_string(),
                value: json!("Rainfall"),
            }),
        )
        .await;
        assert_eq!(snapshot.dashboard.widgets[1].title(), Some("Rainfall"));

        let Json(snapshot) = remove_widget(Path(8), State(state)).await;
        assert_eq!(snapshot.dashboard.widgets.len(), 2);
    }

    #[tokio::test]
    async fn test_set_polygon_bounds() {
        let mut source = MockDashboardDataSource::new();
        source
            .expect_fetch_polygon_geometry()
            .withf(|id| id == "poly-7")
            .returning(|_| {
                Ok(PolygonGeometry::from_ring(vec![
                    [10.0, 50.0],
                    [10.0, 51.0],
                    [11.0, 51.0],
                ]))
            });
        let state = state(source, MockDashboardPersistence::new());

        let Json(snapshot) = set_polygon_bounds(
            Path(0),
            State(state),
            Json(PolygonBoundsRequest {
                polygon_id: "poly-7".to_string(),
            }),
        )
        .await;

        let config = &snapshot.dashboard.widgets[0].config;
        assert_eq!(config["agromonitoringPolygonId"], json!("poly-7"));
        assert_eq!(config["bounds"]["bottomRight"], json!([51.0, 11.0]));
        assert_eq!(snapshot.last_error, None);
    }

    #[tokio::test]
    async fn test_widget_editor_not_found() {
        let state = state(MockDashboardDataSource::new(), MockDashboardPersistence::new());

        let result = widget_editor(Path(4), State(state.clone())).await;
        assert_eq!(result.unwrap_err(), StatusCode::NOT_FOUND);

        let Json(view) = widget_editor(Path(0), State(state)).await.unwrap();
        assert_eq!(view.type_key, "ndviSummary");
    }

    #[tokio::test]
    async fn test_save_uses_default_dashboard_id() {
        let mut persistence = MockDashboardPersistence::new();
        persistence
            .expect_save()
            .withf(|id, _| id == "dash-1")
            .returning(|_, _| Ok(()));
        let state = state(MockDashboardDataSource::new(), persistence);

        let Json(saved) = save_dashboard(State(state), None).await.unwrap();
        assert_eq!(saved.widgets[0].config["dashboardId"], json!("dash-1"));
    }

    #[tokio::test]
    async fn test_save_failure_maps_to_bad_gateway() {
        let mut persistence = MockDashboardPersistence::new();
        persistence.expect_save().returning(|_, _| {
            Err(FetchError::Unavailable("connection refused".to_string()))
        });
        let state = state(MockDashboardDataSource::new(), persistence);

        let (status, message) = save_dashboard(
            State(state),
            Some(Json(SaveRequest {
                name: None,
                dashboard_id: Some("dash-2".to_string()),
            })),
        )
        .await
        .unwrap_err();

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(message.contains("connection refused"));
    }
}
