use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use geocompute_integration::GatewayConfig;
use ndvi_core::AnalysisOptions;
use serde::Deserialize;

#[derive(Debug, Clone)]
pub struct Settings {
    pub gateway_url: String,
    pub api_key: String,
    pub api_secret_b64: String,
    pub token_ttl_seconds: i64,
    pub request_timeout_seconds: u64,
    pub max_in_flight_years: usize,
    pub per_year_timeout_seconds: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            gateway_url: "http://127.0.0.1:8787".into(),
            api_key: "devkey".into(),
            // "devsecret"
            api_secret_b64: "ZGV2c2VjcmV0".into(),
            token_ttl_seconds: 3600,
            request_timeout_seconds: 30,
            max_in_flight_years: ndvi_core::DEFAULT_MAX_IN_FLIGHT,
            per_year_timeout_seconds: ndvi_core::DEFAULT_PER_YEAR_TIMEOUT.as_secs(),
        }
    }
}

impl Settings {
    pub fn gateway(&self) -> GatewayConfig {
        GatewayConfig {
            base_url: self.gateway_url.clone(),
            api_key: self.api_key.clone(),
            api_secret_b64: self.api_secret_b64.clone(),
            token_ttl_seconds: self.token_ttl_seconds,
            request_timeout_seconds: self.request_timeout_seconds,
        }
    }

    pub fn analysis_options(&self) -> AnalysisOptions {
        AnalysisOptions {
            max_in_flight: self.max_in_flight_years,
            per_year_timeout: Duration::from_secs(self.per_year_timeout_seconds),
        }
    }
}

/// Keys that may appear in the TOML settings file. Anything absent falls
/// back to the defaults above, and environment variables win over both.
#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    gateway_url: Option<String>,
    api_key: Option<String>,
    api_secret_b64: Option<String>,
    token_ttl_seconds: Option<i64>,
    request_timeout_seconds: Option<u64>,
    max_in_flight_years: Option<usize>,
    per_year_timeout_seconds: Option<u64>,
}

pub fn load_settings(path: Option<&Path>) -> Settings {
    let mut settings = Settings::default();

    let file = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("ndvi.toml"));
    if let Ok(raw) = fs::read_to_string(&file) {
        if let Ok(file_cfg) = toml::from_str::<FileSettings>(&raw) {
            apply_file(&mut settings, file_cfg);
        }
    }

    if let Ok(v) = std::env::var("NDVI_GATEWAY_URL") {
        settings.gateway_url = v;
    }
    if let Ok(v) = std::env::var("NDVI_API_KEY") {
        settings.api_key = v;
    }
    if let Ok(v) = std::env::var("NDVI_API_SECRET_B64") {
        settings.api_secret_b64 = v;
    }
    if let Ok(v) = std::env::var("NDVI_TOKEN_TTL_SECONDS") {
        if let Ok(parsed) = v.parse::<i64>() {
            settings.token_ttl_seconds = parsed;
        }
    }
    if let Ok(v) = std::env::var("NDVI_REQUEST_TIMEOUT_SECONDS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.request_timeout_seconds = parsed;
        }
    }
    if let Ok(v) = std::env::var("NDVI_MAX_IN_FLIGHT_YEARS") {
        if let Ok(parsed) = v.parse::<usize>() {
            settings.max_in_flight_years = parsed;
        }
    }
    if let Ok(v) = std::env::var("NDVI_PER_YEAR_TIMEOUT_SECONDS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.per_year_timeout_seconds = parsed;
        }
    }

    settings
}

fn apply_file(settings: &mut Settings, file_cfg: FileSettings) {
    if let Some(v) = file_cfg.gateway_url {
        settings.gateway_url = v;
    }
    if let Some(v) = file_cfg.api_key {
        settings.api_key = v;
    }
    if let Some(v) = file_cfg.api_secret_b64 {
        settings.api_secret_b64 = v;
    }
    if let Some(v) = file_cfg.token_ttl_seconds {
        settings.token_ttl_seconds = v;
    }
    if let Some(v) = file_cfg.request_timeout_seconds {
        settings.request_timeout_seconds = v;
    }
    if let Some(v) = file_cfg.max_in_flight_years {
        settings.max_in_flight_years = v;
    }
    if let Some(v) = file_cfg.per_year_timeout_seconds {
        settings.per_year_timeout_seconds = v;
    }
}
