use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};
use shared::{
    boundary::BoundaryGeometry,
    domain::{CompositeId, IndexId},
    error::{ApiError, ErrorCode},
    protocol::{
        CompositeRequest, CompositeResponse, NormalizedDifferenceRequest,
        NormalizedDifferenceResponse, RegionMeanRequest, RegionMeanResponse, ThumbnailRequest,
        ThumbnailResponse,
    },
};
use thiserror::Error;
use tracing::debug;
use url::Url;

pub mod auth;

use auth::AccessTokenConfig;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub api_key: String,
    pub api_secret_b64: String,
    pub token_ttl_seconds: i64,
    /// Transport-level cap on every single request; the per-year budget is
    /// enforced by the caller on top of this.
    pub request_timeout_seconds: u64,
}

/// Visualization parameters for rendered index thumbnails.
#[derive(Debug, Clone, PartialEq)]
pub struct ThumbnailStyle {
    pub palette: Vec<String>,
    pub dimensions: String,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid gateway base url {url:?}: {source}")]
    InvalidBaseUrl {
        url: String,
        source: url::ParseError,
    },
    #[error("failed to mint gateway access token: {0}")]
    Auth(#[from] jsonwebtoken::errors::Error),
    #[error("failed to build http client: {0}")]
    ClientBuild(#[source] reqwest::Error),
    #[error("gateway rejected {operation}: {code:?}: {message}")]
    Api {
        operation: &'static str,
        code: ErrorCode,
        message: String,
    },
    #[error("gateway returned {status} for {operation}: {body}")]
    Status {
        operation: &'static str,
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("transport failure during {operation}: {source}")]
    Transport {
        operation: &'static str,
        source: reqwest::Error,
    },
}

/// Remote operations the compute gateway exposes. One implementation talks
/// HTTP; tests script their own.
#[async_trait]
pub trait ComputeEngine: Send + Sync {
    /// Median composite over the date window, clipped to the boundary.
    async fn build_composite(
        &self,
        collection: &str,
        boundary: &BoundaryGeometry,
        date_start: DateTime<Utc>,
        date_end: DateTime<Utc>,
    ) -> Result<CompositeId>;

    /// Normalized difference `(a - b) / (a + b)` between two bands.
    async fn normalized_difference(
        &self,
        composite_id: &CompositeId,
        band_a: &str,
        band_b: &str,
    ) -> Result<IndexId>;

    /// Mean index value over the boundary at the given sampling scale.
    async fn region_mean(
        &self,
        index_id: &IndexId,
        boundary: &BoundaryGeometry,
        scale_m: f64,
    ) -> Result<f64>;

    /// Renders the index over the boundary and returns a fetchable URL.
    async fn render_thumbnail(
        &self,
        index_id: &IndexId,
        boundary: &BoundaryGeometry,
        style: &ThumbnailStyle,
    ) -> Result<String>;
}

/// HTTP client for the compute gateway. The access token is minted once at
/// construction, so a client should live no longer than the token TTL.
#[derive(Debug)]
pub struct GeoComputeClient {
    http: Client,
    base_url: String,
    bearer_token: String,
}

impl GeoComputeClient {
    pub fn new(cfg: &GatewayConfig) -> Result<Self, EngineError> {
        let parsed = Url::parse(&cfg.base_url).map_err(|source| EngineError::InvalidBaseUrl {
            url: cfg.base_url.clone(),
            source,
        })?;
        let bearer_token = auth::mint_access_token(&AccessTokenConfig {
            api_key: cfg.api_key.clone(),
            api_secret_b64: cfg.api_secret_b64.clone(),
            ttl_seconds: cfg.token_ttl_seconds,
        })?;

        let mut base_url = parsed.to_string();
        while base_url.ends_with('/') {
            base_url.pop();
        }

        let http = Client::builder()
            .timeout(Duration::from_secs(cfg.request_timeout_seconds))
            .build()
            .map_err(EngineError::ClientBuild)?;

        Ok(Self {
            http,
            base_url,
            bearer_token,
        })
    }

    async fn post_json<Req, Res>(
        &self,
        operation: &'static str,
        path: &str,
        request: &Req,
    ) -> Result<Res, EngineError>
    where
        Req: Serialize + Sync,
        Res: DeserializeOwned,
    {
        debug!(operation, path, "gateway: request");
        let response = self
            .http
            .post(format!("{}{path}", self.base_url))
            .bearer_auth(&self.bearer_token)
            .json(request)
            .send()
            .await
            .map_err(|source| EngineError::Transport { operation, source })?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<Res>()
                .await
                .map_err(|source| EngineError::Transport { operation, source });
        }

        let body = response
            .text()
            .await
            .map_err(|source| EngineError::Transport { operation, source })?;
        match serde_json::from_str::<ApiError>(&body) {
            Ok(envelope) => Err(EngineError::Api {
                operation,
                code: envelope.code,
                message: envelope.message,
            }),
            // Gateways behind proxies sometimes answer with plain text.
            Err(_) => Err(EngineError::Status {
                operation,
                status,
                body,
            }),
        }
    }
}

#[async_trait]
impl ComputeEngine for GeoComputeClient {
    async fn build_composite(
        &self,
        collection: &str,
        boundary: &BoundaryGeometry,
        date_start: DateTime<Utc>,
        date_end: DateTime<Utc>,
    ) -> Result<CompositeId> {
        let response: CompositeResponse = self
            .post_json(
                "build_composite",
                "/v1/composites",
                &CompositeRequest {
                    collection: collection.to_string(),
                    geometry: boundary.as_value().clone(),
                    date_start,
                    date_end,
                },
            )
            .await?;
        Ok(response.composite_id)
    }

    async fn normalized_difference(
        &self,
        composite_id: &CompositeId,
        band_a: &str,
        band_b: &str,
    ) -> Result<IndexId> {
        let response: NormalizedDifferenceResponse = self
            .post_json(
                "normalized_difference",
                "/v1/indices",
                &NormalizedDifferenceRequest {
                    composite_id: composite_id.clone(),
                    band_a: band_a.to_string(),
                    band_b: band_b.to_string(),
                },
            )
            .await?;
        Ok(response.index_id)
    }

    async fn region_mean(
        &self,
        index_id: &IndexId,
        boundary: &BoundaryGeometry,
        scale_m: f64,
    ) -> Result<f64> {
        let response: RegionMeanResponse = self
            .post_json(
                "region_mean",
                "/v1/indices/mean",
                &RegionMeanRequest {
                    index_id: index_id.clone(),
                    geometry: boundary.as_value().clone(),
                    scale_m,
                },
            )
            .await?;
        Ok(response.mean)
    }

    async fn render_thumbnail(
        &self,
        index_id: &IndexId,
        boundary: &BoundaryGeometry,
        style: &ThumbnailStyle,
    ) -> Result<String> {
        let response: ThumbnailResponse = self
            .post_json(
                "render_thumbnail",
                "/v1/indices/thumbnail",
                &ThumbnailRequest {
                    index_id: index_id.clone(),
                    geometry: boundary.as_value().clone(),
                    palette: style.palette.clone(),
                    dimensions: style.dimensions.clone(),
                    min: style.min,
                    max: style.max,
                },
            )
            .await?;
        Ok(response.url)
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
