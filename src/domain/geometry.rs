// Polygon geometry and the display bounds derived from it
use super::error::GeometryError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// GeoJSON polygon: rings of `[longitude, latitude]` positions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolygonGeometry {
    #[serde(rename = "type", default = "polygon_kind")]
    pub kind: String,
    pub coordinates: Vec<Vec<Vec<f64>>>,
}

fn polygon_kind() -> String {
    "Polygon".to_string()
}

impl PolygonGeometry {
    pub fn from_ring(ring: Vec<[f64; 2]>) -> Self {
        Self {
            kind: polygon_kind(),
            coordinates: vec![ring.into_iter().map(|p| p.to_vec()).collect()],
        }
    }

    pub fn outer_ring(&self) -> &[Vec<f64>] {
        self.coordinates.first().map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Two corners in `[latitude, longitude]` order, as the map renderer expects.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolygonBounds {
    pub top_left: [f64; 2],
    pub bottom_right: [f64; 2],
}

impl PolygonBounds {
    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "topLeft": self.top_left,
            "bottomRight": self.bottom_right,
        })
    }
}

/// Bounds from points 0 and 2 of the outer ring, treated as opposite corners of a
/// near-rectangular area. Not a general bounding box.
pub fn project(geometry: &PolygonGeometry) -> Result<PolygonBounds, GeometryError> {
    let ring = geometry.outer_ring();
    if ring.len() < 3 {
        return Err(GeometryError::InsufficientPoints { found: ring.len() });
    }

    Ok(PolygonBounds {
        top_left: lat_lon(ring, 0)?,
        bottom_right: lat_lon(ring, 2)?,
    })
}

fn lat_lon(ring: &[Vec<f64>], index: usize) -> Result<[f64; 2], GeometryError> {
    match ring[index].as_slice() {
        [lon, lat, ..] => Ok([*lat, *lon]),
        _ => Err(GeometryError::MalformedPosition { index }),
    }
}
