// Collaborator traits for reference data, polygon geometry and persistence
use crate::domain::dashboard::DashboardConfig;
use crate::domain::error::FetchError;
use crate::domain::geometry::PolygonGeometry;
use crate::domain::reference::ReferenceRecord;
use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait DashboardDataSource: Send + Sync {
    async fn fetch_sensors(&self, site_id: &str) -> Result<Vec<ReferenceRecord>, FetchError>;

    async fn fetch_locations(&self, site_id: &str) -> Result<Vec<ReferenceRecord>, FetchError>;

    /// Field polygons registered with the agronomy monitoring backend
    async fn fetch_polygons(&self, site_id: &str) -> Result<Vec<ReferenceRecord>, FetchError>;

    async fn fetch_chart_configs(&self, site_id: &str)
    -> Result<Vec<ReferenceRecord>, FetchError>;

    async fn fetch_manual_capture_configs(
        &self,
        site_id: &str,
    ) -> Result<Vec<ReferenceRecord>, FetchError>;

    async fn fetch_cameras(&self, site_id: &str) -> Result<Vec<ReferenceRecord>, FetchError>;

    /// Geometry of one polygon, looked up by its external id
    async fn fetch_polygon_geometry(&self, polygon_id: &str)
    -> Result<PolygonGeometry, FetchError>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait DashboardPersistence: Send + Sync {
    /// Store a dashboard produced by `DashboardConfigStore::to_saveable`
    async fn save(&self, dashboard_id: &str, dashboard: &DashboardConfig)
    -> Result<(), FetchError>;
}
