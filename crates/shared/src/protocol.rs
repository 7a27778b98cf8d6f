use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{CompositeId, IndexId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositeRequest {
    pub collection: String,
    pub geometry: Value,
    pub date_start: DateTime<Utc>,
    pub date_end: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositeResponse {
    pub composite_id: CompositeId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedDifferenceRequest {
    pub composite_id: CompositeId,
    pub band_a: String,
    pub band_b: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedDifferenceResponse {
    pub index_id: IndexId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionMeanRequest {
    pub index_id: IndexId,
    pub geometry: Value,
    pub scale_m: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionMeanResponse {
    pub mean: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThumbnailRequest {
    pub index_id: IndexId,
    pub geometry: Value,
    pub palette: Vec<String>,
    pub dimensions: String,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThumbnailResponse {
    pub url: String,
}
