// Application state for HTTP handlers
use crate::application::dashboard_editor::DashboardEditor;

#[derive(Clone)]
pub struct AppState {
    pub editor: DashboardEditor,
    /// Id the session's dashboard is saved under unless a request names another
    pub dashboard_id: String,
}
