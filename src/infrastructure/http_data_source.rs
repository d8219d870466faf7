// REST implementation of the data source and persistence collaborators
use crate::application::data_source::{DashboardDataSource, DashboardPersistence};
use crate::domain::dashboard::DashboardConfig;
use crate::domain::error::FetchError;
use crate::domain::geometry::PolygonGeometry;
use crate::domain::reference::ReferenceRecord;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct HttpDataSource {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpDataSource {
    pub fn new(
        base_url: &str,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(FetchError::Unavailable(format!(
                "backend URL `{}` is not an http(s) URL",
                base_url
            )));
        }

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn site_url(&self, site_id: &str, collection: &str) -> String {
        format!(
            "{}/sites/{}/{}",
            self.base_url,
            urlencoding::encode(site_id),
            collection
        )
    }

    fn polygon_url(&self, polygon_id: &str) -> String {
        format!("{}/polygons/{}", self.base_url, urlencoding::encode(polygon_id))
    }

    fn dashboard_url(&self, dashboard_id: &str) -> String {
        format!(
            "{}/dashboards/{}",
            self.base_url,
            urlencoding::encode(dashboard_id)
        )
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        tracing::debug!("GET {}", url);
        let response = self
            .authorized(self.client.get(url))
            .header("Accept", "application/json")
            .send()
            .await?;

        let response = check_status(response).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))
    }

    async fn fetch_records(
        &self,
        site_id: &str,
        collection: &str,
    ) -> Result<Vec<ReferenceRecord>, FetchError> {
        let records: Vec<ReferenceRecord> =
            self.get_json(&self.site_url(site_id, collection)).await?;
        tracing::debug!("Loaded {} {} for site {}", records.len(), collection, site_id);
        Ok(records)
    }
}

async fn check_status(response: Response) -> Result<Response, FetchError> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status().as_u16();
    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "Failed to read response text".to_string());
    Err(FetchError::Status { status, message })
}

/// Accepts the agronomy backend's polygon record (`geo_json.geometry`), a GeoJSON feature
/// (`geometry`), or a bare geometry.
pub fn decode_polygon_geometry(body: Value) -> Result<PolygonGeometry, FetchError> {
    let geometry = match body {
        Value::Object(mut record) => {
            if let Some(Value::Object(mut geo_json)) = record.remove("geo_json") {
                geo_json.remove("geometry").unwrap_or(Value::Null)
            } else if let Some(geometry) = record.remove("geometry") {
                geometry
            } else {
                Value::Object(record)
            }
        }
        other => other,
    };

    serde_json::from_value(geometry)
        .map_err(|e| FetchError::Decode(format!("polygon geometry: {}", e)))
}

#[async_trait]
impl DashboardDataSource for HttpDataSource {
    async fn fetch_sensors(&self, site_id: &str) -> Result<Vec<ReferenceRecord>, FetchError> {
        self.fetch_records(site_id, "sensors").await
    }

    async fn fetch_locations(&self, site_id: &str) -> Result<Vec<ReferenceRecord>, FetchError> {
        self.fetch_records(site_id, "locations").await
    }

    async fn fetch_polygons(&self, site_id: &str) -> Result<Vec<ReferenceRecord>, FetchError> {
        self.fetch_records(site_id, "polygons").await
    }

    async fn fetch_chart_configs(
        &self,
        site_id: &str,
    ) -> Result<Vec<ReferenceRecord>, FetchError> {
        self.fetch_records(site_id, "chart-configs").await
    }

    async fn fetch_manual_capture_configs(
        &self,
        site_id: &str,
    ) -> Result<Vec<ReferenceRecord>, FetchError> {
        self.fetch_records(site_id, "manual-data-capture-configs")
            .await
    }

    async fn fetch_cameras(&self, site_id: &str) -> Result<Vec<ReferenceRecord>, FetchError> {
        self.fetch_records(site_id, "cameras").await
    }

    async fn fetch_polygon_geometry(
        &self,
        polygon_id: &str,
    ) -> Result<PolygonGeometry, FetchError> {
        let body: Value = self.get_json(&self.polygon_url(polygon_id)).await?;
        decode_polygon_geometry(body)
    }
}

#[async_trait]
impl DashboardPersistence for HttpDataSource {
    async fn save(
        &self,
        dashboard_id: &str,
        dashboard: &DashboardConfig,
    ) -> Result<(), FetchError> {
        let url = self.dashboard_url(dashboard_id);
        tracing::debug!("PUT {}", url);
        let response = self
            .authorized(self.client.put(&url))
            .json(dashboard)
            .send()
            .await?;

        check_status(response).await?;
        Ok(())
    }
}
