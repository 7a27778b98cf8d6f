use super::*;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde_json::json;
use shared::domain::{CompositeId, IndexId};
use tokio::{net::TcpListener, sync::Mutex};

// "devsecret" in base64.
const SECRET_B64: &str = "ZGV2c2VjcmV0";

#[derive(Clone)]
struct GatewayState {
    composite_requests: Arc<Mutex<Vec<(Option<String>, CompositeRequest)>>>,
    index_requests: Arc<Mutex<Vec<NormalizedDifferenceRequest>>>,
    mean_requests: Arc<Mutex<Vec<RegionMeanRequest>>>,
    thumbnail_requests: Arc<Mutex<Vec<ThumbnailRequest>>>,
    fail_composites_with: Arc<Mutex<Option<(StatusCode, String)>>>,
}

async fn handle_composites(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    Json(payload): Json<CompositeRequest>,
) -> Result<Json<CompositeResponse>, (StatusCode, String)> {
    if let Some((status, body)) = state.fail_composites_with.lock().await.clone() {
        return Err((status, body));
    }
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let year = payload.date_start.format("%Y").to_string();
    state
        .composite_requests
        .lock()
        .await
        .push((authorization, payload));
    Ok(Json(CompositeResponse {
        composite_id: CompositeId(format!("comp-{year}")),
    }))
}

async fn handle_indices(
    State(state): State<GatewayState>,
    Json(payload): Json<NormalizedDifferenceRequest>,
) -> Json<NormalizedDifferenceResponse> {
    let index_id = IndexId(format!("idx-{}", payload.composite_id.0));
    state.index_requests.lock().await.push(payload);
    Json(NormalizedDifferenceResponse { index_id })
}

async fn handle_mean(
    State(state): State<GatewayState>,
    Json(payload): Json<RegionMeanRequest>,
) -> Json<RegionMeanResponse> {
    state.mean_requests.lock().await.push(payload);
    Json(RegionMeanResponse { mean: 0.42 })
}

async fn handle_thumbnail(
    State(state): State<GatewayState>,
    Json(payload): Json<ThumbnailRequest>,
) -> Json<ThumbnailResponse> {
    let url = format!("https://thumbs.test/{}.png", payload.index_id.0);
    state.thumbnail_requests.lock().await.push(payload);
    Json(ThumbnailResponse { url })
}

async fn spawn_gateway() -> Result<(String, GatewayState)> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let state = GatewayState {
        composite_requests: Arc::new(Mutex::new(Vec::new())),
        index_requests: Arc::new(Mutex::new(Vec::new())),
        mean_requests: Arc::new(Mutex::new(Vec::new())),
        thumbnail_requests: Arc::new(Mutex::new(Vec::new())),
        fail_composites_with: Arc::new(Mutex::new(None)),
    };
    let app = Router::new()
        .route("/v1/composites", post(handle_composites))
        .route("/v1/indices", post(handle_indices))
        .route("/v1/indices/mean", post(handle_mean))
        .route("/v1/indices/thumbnail", post(handle_thumbnail))
        .with_state(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((format!("http://{addr}"), state))
}

fn gateway_config(base_url: String) -> GatewayConfig {
    GatewayConfig {
        base_url,
        api_key: "devkey".into(),
        api_secret_b64: SECRET_B64.into(),
        token_ttl_seconds: 60,
        request_timeout_seconds: 5,
    }
}

fn test_boundary() -> BoundaryGeometry {
    BoundaryGeometry::from_geometry(json!({
        "type": "Polygon",
        "coordinates": [[
            [32.6, -18.9],
            [32.7, -18.9],
            [32.7, -18.8],
            [32.6, -18.8],
            [32.6, -18.9]
        ]]
    }))
    .expect("boundary")
}

fn test_style() -> ThumbnailStyle {
    ThumbnailStyle {
        palette: vec!["red".into(), "green".into(), "blue".into()],
        dimensions: "1024x768".into(),
        min: -1.0,
        max: 1.0,
    }
}

#[tokio::test]
async fn composite_request_carries_bearer_token_and_payload() {
    let (base_url, state) = spawn_gateway().await.expect("spawn gateway");
    let client = GeoComputeClient::new(&gateway_config(base_url)).expect("client");
    let boundary = test_boundary();

    let composite_id = client
        .build_composite(
            "SAT/SR_V1",
            &boundary,
            "2020-01-01T00:00:00Z".parse().expect("timestamp"),
            "2020-12-31T23:59:59Z".parse().expect("timestamp"),
        )
        .await
        .expect("composite");
    assert_eq!(composite_id, CompositeId("comp-2020".into()));

    let requests = state.composite_requests.lock().await;
    assert_eq!(requests.len(), 1);
    let (authorization, payload) = &requests[0];

    let token = authorization
        .as_deref()
        .and_then(|value| value.strip_prefix("Bearer "))
        .expect("bearer authorization header");
    let decoded = decode::<serde_json::Value>(
        token,
        &DecodingKey::from_base64_secret(SECRET_B64).expect("secret"),
        &Validation::default(),
    )
    .expect("token decodes with the shared secret");
    assert_eq!(decoded.claims["iss"], "devkey");
    assert_eq!(decoded.claims["scope"], auth::TOKEN_SCOPE);

    assert_eq!(payload.collection, "SAT/SR_V1");
    assert_eq!(&payload.geometry, boundary.as_value());
}

#[tokio::test]
async fn compute_chain_round_trips_remote_handles() {
    let (base_url, state) = spawn_gateway().await.expect("spawn gateway");
    let client = GeoComputeClient::new(&gateway_config(base_url)).expect("client");
    let boundary = test_boundary();

    let composite_id = client
        .build_composite(
            "SAT/SR_V1",
            &boundary,
            "2019-01-01T00:00:00Z".parse().expect("timestamp"),
            "2019-12-31T23:59:59Z".parse().expect("timestamp"),
        )
        .await
        .expect("composite");

    let index_id = client
        .normalized_difference(&composite_id, "B5", "B4")
        .await
        .expect("index");
    assert_eq!(index_id, IndexId("idx-comp-2019".into()));

    let mean = client
        .region_mean(&index_id, &boundary, 30.0)
        .await
        .expect("mean");
    assert!((mean - 0.42).abs() < f64::EPSILON);

    let url = client
        .render_thumbnail(&index_id, &boundary, &test_style())
        .await
        .expect("thumbnail");
    assert_eq!(url, "https://thumbs.test/idx-comp-2019.png");

    let index_requests = state.index_requests.lock().await;
    assert_eq!(index_requests.len(), 1);
    assert_eq!(index_requests[0].composite_id, composite_id);
    assert_eq!(index_requests[0].band_a, "B5");
    assert_eq!(index_requests[0].band_b, "B4");

    let mean_requests = state.mean_requests.lock().await;
    assert_eq!(mean_requests.len(), 1);
    assert_eq!(mean_requests[0].index_id, index_id);
    assert!((mean_requests[0].scale_m - 30.0).abs() < f64::EPSILON);

    let thumbnail_requests = state.thumbnail_requests.lock().await;
    assert_eq!(thumbnail_requests.len(), 1);
    assert_eq!(thumbnail_requests[0].dimensions, "1024x768");
    assert_eq!(
        thumbnail_requests[0].palette,
        vec!["red".to_string(), "green".to_string(), "blue".to_string()]
    );
}

#[tokio::test]
async fn error_envelope_is_decoded_into_api_error() {
    let (base_url, state) = spawn_gateway().await.expect("spawn gateway");
    let envelope = serde_json::to_string(&ApiError::new(
        ErrorCode::InvalidGeometry,
        "ring is self-intersecting",
    ))
    .expect("envelope");
    *state.fail_composites_with.lock().await =
        Some((StatusCode::UNPROCESSABLE_ENTITY, envelope));

    let client = GeoComputeClient::new(&gateway_config(base_url)).expect("client");
    let err = client
        .build_composite(
            "SAT/SR_V1",
            &test_boundary(),
            "2020-01-01T00:00:00Z".parse().expect("timestamp"),
            "2020-12-31T23:59:59Z".parse().expect("timestamp"),
        )
        .await
        .expect_err("must fail");

    match err.downcast_ref::<EngineError>() {
        Some(EngineError::Api {
            operation,
            code,
            message,
        }) => {
            assert_eq!(*operation, "build_composite");
            assert_eq!(*code, ErrorCode::InvalidGeometry);
            assert!(message.contains("self-intersecting"));
        }
        other => panic!("unexpected error variant: {other:?}"),
    }
}

#[tokio::test]
async fn plain_text_error_body_falls_back_to_status() {
    let (base_url, state) = spawn_gateway().await.expect("spawn gateway");
    *state.fail_composites_with.lock().await = Some((
        StatusCode::INTERNAL_SERVER_ERROR,
        "upstream exploded".to_string(),
    ));

    let client = GeoComputeClient::new(&gateway_config(base_url)).expect("client");
    let err = client
        .build_composite(
            "SAT/SR_V1",
            &test_boundary(),
            "2020-01-01T00:00:00Z".parse().expect("timestamp"),
            "2020-12-31T23:59:59Z".parse().expect("timestamp"),
        )
        .await
        .expect_err("must fail");

    match err.downcast_ref::<EngineError>() {
        Some(EngineError::Status { status, body, .. }) => {
            assert_eq!(*status, StatusCode::INTERNAL_SERVER_ERROR);
            assert!(body.contains("upstream exploded"));
        }
        other => panic!("unexpected error variant: {other:?}"),
    }
}

#[tokio::test]
async fn trailing_slash_in_base_url_is_tolerated() {
    let (base_url, _state) = spawn_gateway().await.expect("spawn gateway");
    let client = GeoComputeClient::new(&gateway_config(format!("{base_url}/"))).expect("client");

    let mean = client
        .region_mean(&IndexId("idx-any".into()), &test_boundary(), 30.0)
        .await
        .expect("mean");
    assert!((mean - 0.42).abs() < f64::EPSILON);
}

#[tokio::test]
async fn connection_refused_maps_to_transport_error() {
    // Discard port; nothing listens there, so the connect is refused.
    let client =
        GeoComputeClient::new(&gateway_config("http://127.0.0.1:9".into())).expect("client");

    let err = client
        .region_mean(&IndexId("idx-any".into()), &test_boundary(), 30.0)
        .await
        .expect_err("must fail");

    match err.downcast_ref::<EngineError>() {
        Some(EngineError::Transport { operation, source }) => {
            assert_eq!(*operation, "region_mean");
            assert!(source.is_connect() || source.is_request());
        }
        other => panic!("unexpected error variant: {other:?}"),
    }
}

#[test]
fn invalid_base_url_is_rejected_at_construction() {
    let err = GeoComputeClient::new(&gateway_config("not a url".into())).expect_err("must fail");
    assert!(matches!(err, EngineError::InvalidBaseUrl { .. }));
}

#[test]
fn non_base64_secret_is_rejected_at_construction() {
    let mut cfg = gateway_config("http://127.0.0.1:9".into());
    cfg.api_secret_b64 = "not base64!!!".into();

    let err = GeoComputeClient::new(&cfg).expect_err("must fail");
    assert!(matches!(err, EngineError::Auth(_)));
}
