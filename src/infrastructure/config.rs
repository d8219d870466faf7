use crate::domain::dashboard::DashboardConfig;
use anyhow::Context;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerSettings,
    pub api: ApiSettings,
    pub session: SessionSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiSettings {
    pub base_url: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionSettings {
    pub site_id: String,
    #[serde(default)]
    pub name: String,
    pub dashboard_id: String,
    /// JSON file holding an existing dashboard to edit
    #[serde(default)]
    pub seed_path: Option<String>,
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

/// `config/dashboard.*` overlaid with `DASHBOARD__SECTION__KEY` environment variables.
pub fn load_app_config() -> anyhow::Result<AppConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/dashboard").required(false))
        .add_source(config::Environment::with_prefix("DASHBOARD").separator("__"))
        .build()?;

    Ok(settings.try_deserialize()?)
}

/// Dashboard to open the session with. No seed file means a new, empty dashboard.
pub fn load_seed(session: &SessionSettings) -> anyhow::Result<DashboardConfig> {
    let mut dashboard = match &session.seed_path {
        Some(path) => read_seed_file(Path::new(path))?,
        None => DashboardConfig::default(),
    };

    if dashboard.site_id.is_empty() {
        dashboard.site_id = session.site_id.clone();
    }
    if dashboard.name.is_empty() {
        dashboard.name = session.name.clone();
    }
    Ok(dashboard)
}

fn read_seed_file(path: &Path) -> anyhow::Result<DashboardConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read seed dashboard {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&raw)
        .with_context(|| format!("Seed dashboard {} is not valid JSON", path.display()))?;

    DashboardConfig::from_seed(value)
        .with_context(|| format!("Seed dashboard {} has an unexpected shape", path.display()))
}
