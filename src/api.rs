use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use metrics::counter;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::calibrate::{project_weights, ProjectionError};
use crate::config::AnalyzerConfig;
use crate::engine::{EvalParams, ScenarioEngine, ScenarioQuery};
use crate::historical::{top_events, RankedEvent};
use crate::locate::LocationQuery;
use crate::loss::solve_factor;
use crate::regions::{RegionError, RegionProxy};
use crate::report::{nearby_events, MatchedRecord, NearbyEvent, Report};
use crate::scoring::{FeatureWeights, HotReloadWeights, ScoreError};

#[derive(Clone)]
pub struct AppState {
    engine: Arc<ScenarioEngine>,
    weights: Arc<HotReloadWeights>,
    regions: Arc<RegionProxy>,
    defaults: Arc<AnalyzerConfig>,
}

impl AppState {
    pub fn new(
        engine: Arc<ScenarioEngine>,
        weights: HotReloadWeights,
        regions: Arc<RegionProxy>,
        defaults: AnalyzerConfig,
    ) -> Self {
        Self {
            engine,
            weights: Arc::new(weights),
            regions,
            defaults: Arc::new(defaults),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/score", post(score))
        .route("/calibrate/factor", post(calibrate_factor))
        .route("/calibrate/weights", post(calibrate_weights))
        .route("/locate", post(locate))
        .route("/historical", get(historical))
        .route("/region/{name}", get(region_geojson))
        .route("/admin/reload-weights", get(admin_reload_weights))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
        .into_response()
}

fn score_error_response(err: ScoreError) -> Response {
    let status = match err {
        ScoreError::MissingFeature(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ScoreError::InvalidWeights => StatusCode::BAD_REQUEST,
    };
    error_response(status, err.to_string())
}

#[derive(Deserialize)]
struct ScoreReq {
    #[serde(flatten)]
    scenario: ScenarioQuery,
    /// Per-request weight override; the shared vector applies otherwise.
    #[serde(default)]
    weights: Option<FeatureWeights>,
    #[serde(default)]
    exposure_usd: Option<f64>,
    #[serde(default)]
    calibration_factor: Option<f64>,
    #[serde(default)]
    location: Option<LocationQuery>,
    #[serde(default)]
    nearby_radius_km: Option<f64>,
    #[serde(default)]
    nearby_limit: Option<usize>,
}

async fn score(State(state): State<AppState>, Json(body): Json<ScoreReq>) -> Response {
    counter!("score_requests_total").increment(1);

    let weights = match body.weights {
        Some(w) => w,
        None => state.weights.current(),
    };
    let params = EvalParams {
        exposure_usd: body.exposure_usd.unwrap_or(state.defaults.exposure_usd),
        calibration_factor: body
            .calibration_factor
            .unwrap_or(state.defaults.calibration_factor),
        location: body.location,
        nearby_radius_km: body
            .nearby_radius_km
            .unwrap_or(state.defaults.nearby_radius_km),
        nearby_limit: body.nearby_limit.unwrap_or(state.defaults.nearby_limit),
    };

    match state.engine.evaluate(&body.scenario, &weights, &params) {
        Ok(report) => Json::<Report>(report).into_response(),
        Err(err) => score_error_response(err),
    }
}

#[derive(Deserialize)]
struct FactorReq {
    score: f64,
    exposure_usd: f64,
    target_loss_usd: f64,
}

#[derive(Serialize)]
struct FactorResp {
    factor: Option<f64>,
    not_computable: bool,
}

async fn calibrate_factor(Json(body): Json<FactorReq>) -> Json<FactorResp> {
    let factor = solve_factor(body.score, body.target_loss_usd, body.exposure_usd);
    Json(FactorResp {
        not_computable: factor.is_none(),
        factor,
    })
}

#[derive(Deserialize)]
struct WeightAdjustReq {
    normalized_features: Vec<f64>,
    current_weights: Vec<f64>,
    target_score: f64,
    #[serde(default)]
    clip_negative: bool,
}

#[derive(Serialize)]
struct WeightAdjustResp {
    weights: Vec<f64>,
}

async fn calibrate_weights(Json(body): Json<WeightAdjustReq>) -> Response {
    match project_weights(
        &body.normalized_features,
        &body.current_weights,
        body.target_score,
        body.clip_negative,
    ) {
        Ok(weights) => Json(WeightAdjustResp { weights }).into_response(),
        Err(err @ ProjectionError::LengthMismatch { .. }) => {
            error_response(StatusCode::BAD_REQUEST, err.to_string())
        }
    }
}

#[derive(Deserialize)]
struct LocateReq {
    #[serde(flatten)]
    query: LocationQuery,
    #[serde(default)]
    radius_km: Option<f64>,
    #[serde(default)]
    limit: Option<usize>,
}

#[derive(Serialize)]
struct LocateResp {
    #[serde(rename = "match")]
    matched: Option<MatchedRecord>,
    nearby: Vec<NearbyEvent>,
}

async fn locate(State(state): State<AppState>, Json(body): Json<LocateReq>) -> Response {
    let matched = state.engine.locate(&body.query).map(|result| {
        let row = &state.engine.dataset().rows()[result.index];
        MatchedRecord {
            result,
            name: row.name.clone(),
            country: row.country.clone(),
            latitude: row.latitude,
            longitude: row.longitude,
        }
    });

    // Reference point mirrors the report: query coordinates when given,
    // else the matched row's.
    let reference = body.query.coordinates().or_else(|| {
        matched
            .as_ref()
            .and_then(|m| match (m.latitude, m.longitude) {
                (Some(lat), Some(lon)) => Some((lat, lon)),
                _ => None,
            })
    });

    let nearby = match reference {
        Some((lat, lon)) => {
            let weights = state.weights.current();
            let baseline = match state.engine.score_baseline(&weights) {
                Ok(scores) => scores,
                Err(err) => return score_error_response(err),
            };
            nearby_events(
                state.engine.dataset(),
                &baseline,
                lat,
                lon,
                body.radius_km.unwrap_or(state.defaults.nearby_radius_km),
                body.limit.unwrap_or(state.defaults.nearby_limit),
            )
        }
        None => Vec::new(),
    };

    Json(LocateResp { matched, nearby }).into_response()
}

#[derive(Deserialize)]
struct HistoricalQuery {
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    top_n: Option<usize>,
    #[serde(default)]
    exposure_usd: Option<f64>,
    #[serde(default)]
    calibration_factor: Option<f64>,
}

#[derive(Serialize)]
struct HistoricalResp {
    events: Vec<RankedEvent>,
}

async fn historical(
    State(state): State<AppState>,
    Query(q): Query<HistoricalQuery>,
) -> Response {
    let weights = state.weights.current();
    let baseline = match state.engine.score_baseline(&weights) {
        Ok(scores) => scores,
        Err(err) => return score_error_response(err),
    };
    let events = top_events(
        state.engine.dataset(),
        &baseline,
        q.country.as_deref(),
        q.top_n.unwrap_or(10),
        q.exposure_usd.unwrap_or(state.defaults.exposure_usd),
        q.calibration_factor
            .unwrap_or(state.defaults.calibration_factor),
    );
    Json(HistoricalResp { events }).into_response()
}

async fn region_geojson(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    counter!("region_requests_total").increment(1);
    match state.regions.geojson_for(&name).await {
        Ok(Some(geojson)) => (
            StatusCode::OK,
            [("content-type", "application/json")],
            geojson,
        )
            .into_response(),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            format!("region '{name}' is not in the hazard index"),
        ),
        Err(err @ RegionError::Fetch(_)) | Err(err @ RegionError::IndexUnavailable) => {
            error_response(StatusCode::BAD_GATEWAY, err.to_string())
        }
    }
}

async fn admin_reload_weights(State(state): State<AppState>) -> String {
    state.weights.force_reload();
    info!("weight vector reloaded");
    "reloaded".to_string()
}
