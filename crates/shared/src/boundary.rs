use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BoundaryError {
    #[error("boundary is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("expected a GeoJSON FeatureCollection, found {0:?}")]
    NotFeatureCollection(String),
    #[error("feature collection has no features")]
    NoFeatures,
    #[error("first feature has no geometry")]
    MissingGeometry,
    #[error("unsupported geometry type {0:?}, expected Polygon or MultiPolygon")]
    UnsupportedGeometry(String),
    #[error("geometry has no coordinates")]
    EmptyCoordinates,
}

/// Region of interest extracted from an uploaded feature collection.
///
/// The geometry is kept as raw GeoJSON because the compute gateway consumes
/// it verbatim; validation here only checks the shape of the document, never
/// individual coordinates.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct BoundaryGeometry(Value);

impl BoundaryGeometry {
    pub fn from_geojson_str(raw: &str) -> Result<Self, BoundaryError> {
        let doc: Value = serde_json::from_str(raw)?;
        Self::from_feature_collection(doc)
    }

    /// Takes the geometry of the FIRST feature; any further features are
    /// ignored, matching how single-region uploads are treated everywhere.
    pub fn from_feature_collection(doc: Value) -> Result<Self, BoundaryError> {
        let kind = doc
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("<missing>");
        if kind != "FeatureCollection" {
            return Err(BoundaryError::NotFeatureCollection(kind.to_string()));
        }
        let features = doc
            .get("features")
            .and_then(Value::as_array)
            .ok_or(BoundaryError::NoFeatures)?;
        let first = features.first().ok_or(BoundaryError::NoFeatures)?;
        let geometry = first
            .get("geometry")
            .filter(|geometry| !geometry.is_null())
            .ok_or(BoundaryError::MissingGeometry)?;
        Self::from_geometry(geometry.clone())
    }

    /// Accepts a bare GeoJSON geometry object.
    pub fn from_geometry(geometry: Value) -> Result<Self, BoundaryError> {
        let kind = geometry
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if kind != "Polygon" && kind != "MultiPolygon" {
            return Err(BoundaryError::UnsupportedGeometry(kind.to_string()));
        }
        match geometry.get("coordinates").and_then(Value::as_array) {
            Some(rings) if !rings.is_empty() => Ok(Self(geometry)),
            _ => Err(BoundaryError::EmptyCoordinates),
        }
    }

    pub fn geometry_type(&self) -> &str {
        self.0.get("type").and_then(Value::as_str).unwrap_or_default()
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn vertex_count(&self) -> usize {
        let mut count = 0;
        if let Some(coordinates) = self.0.get("coordinates") {
            for_each_position(coordinates, &mut |_, _| count += 1);
        }
        count
    }

    /// `[min_lon, min_lat, max_lon, max_lat]` over every position, `None`
    /// when the coordinate arrays hold no positions at all.
    pub fn bounding_box(&self) -> Option<[f64; 4]> {
        let mut bbox: Option<[f64; 4]> = None;
        if let Some(coordinates) = self.0.get("coordinates") {
            for_each_position(coordinates, &mut |lon, lat| {
                let entry = bbox.get_or_insert([lon, lat, lon, lat]);
                entry[0] = entry[0].min(lon);
                entry[1] = entry[1].min(lat);
                entry[2] = entry[2].max(lon);
                entry[3] = entry[3].max(lat);
            });
        }
        bbox
    }
}

// Positions are `[lon, lat, ...]` arrays; anything nested deeper recurses.
fn for_each_position(value: &Value, visit: &mut impl FnMut(f64, f64)) {
    if let Some(items) = value.as_array() {
        if items.len() >= 2 && items[0].is_number() && items[1].is_number() {
            if let (Some(lon), Some(lat)) = (items[0].as_f64(), items[1].as_f64()) {
                visit(lon, lat);
            }
        } else {
            for item in items {
                for_each_position(item, visit);
            }
        }
    }
}
