// Main entry point - Dependency injection and server setup
mod application;
mod domain;
mod infrastructure;
mod presentation;

use std::{net::SocketAddr, sync::Arc, time::Duration};
use axum::{
    Router,
    routing::{get, patch, post, put},
};
use tower_http::{compression::CompressionLayer, trace::TraceLayer};
use tracing_subscriber::EnvFilter;

use crate::application::dashboard_editor::DashboardEditor;
use crate::domain::registry::WidgetTypeRegistry;
use crate::infrastructure::config::{load_app_config, load_seed};
use crate::infrastructure::http_data_source::HttpDataSource;
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    add_widget, get_dashboard, get_reference_data, health_check, list_widget_types,
    refresh_reference_data, remove_widget, save_dashboard, set_polygon_bounds, update_widget,
    widget_editor,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let app_config = load_app_config()?;
    let seed = load_seed(&app_config.session)?;

    // Backend adapter (infrastructure layer)
    let backend = Arc::new(HttpDataSource::new(
        &app_config.api.base_url,
        app_config.api.token.clone(),
        Duration::from_secs(app_config.api.timeout_secs),
    )?);

    // Editing session (application layer)
    let registry = Arc::new(WidgetTypeRegistry::builtin());
    let editor = DashboardEditor::open(seed, registry, backend.clone(), backend);

    let reference = editor.refresh_reference_data().await;
    tracing::info!(
        "Loaded reference data: {} sensors, {} locations, {} polygons, {} cameras",
        reference.sensors.len(),
        reference.locations.len(),
        reference.polygons.len(),
        reference.cameras.len()
    );

    let state = Arc::new(AppState {
        editor,
        dashboard_id: app_config.session.dashboard_id.clone(),
    });

    // Build router (presentation layer)
    let router = Router::new()
        .route("/healthz", get(health_check))
        .route("/dashboard", get(get_dashboard))
        .route("/widget-types", get(list_widget_types))
        .route("/widgets", post(add_widget))
        .route("/widgets/:index", patch(update_widget).delete(remove_widget))
        .route("/widgets/:index/polygon", put(set_polygon_bounds))
        .route("/widgets/:index/editor", get(widget_editor))
        .route("/reference-data", get(get_reference_data))
        .route("/reference-data/refresh", post(refresh_reference_data))
        .route("/save", post(save_dashboard))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr: SocketAddr = app_config.server.bind.parse()?;
    tracing::info!("Starting dashboard-builder service on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router).await?;

    Ok(())
}
