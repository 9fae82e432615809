//! Axum HTTP server: evaluate pool notation over JSON.
//!
//! Handlers share an `Arc<AppContext>` holding the named dice and the
//! explosion cache, so repeated requests with the same die and limit reuse
//! earlier explosion tables.
//!
//! ## Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/health` | Health check |
//! | GET | `/mechanics` | Names and labels of every mechanic |
//! | GET | `/dice` | Named dice usable as `[name]` overrides |
//! | POST | `/evaluate` | Distributions for a batch of notation lines |
//!
//! Lines that do not parse, that would enumerate more than
//! [`MAX_API_ENUMERATED_ROLLS`] roll pairs, or whose result overflows are
//! reported in `errors` by line number; the other lines are still evaluated.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};

use crate::batch::{enumeration_size, evaluate_params, PoolSummary};
use crate::constants::{
    DEFAULT_API_EXPLODE_LIMIT, DEFAULT_DIE, DEFAULT_MECHANIC, MAX_API_ENUMERATED_ROLLS,
};
use crate::dice::{parse_die, DieMap};
use crate::distribution::Distribution;
use crate::explode::{ExplodeLimit, ExplosionCache};
use crate::mechanic::Mechanic;
use crate::params::Params;

/// Everything the handlers need.
#[derive(Debug, Default)]
pub struct AppContext {
    pub die_map: DieMap,
    pub cache: ExplosionCache,
}

impl AppContext {
    pub fn new(die_map: DieMap) -> Self {
        Self {
            die_map,
            cache: ExplosionCache::new(),
        }
    }
}

pub type AppState = Arc<AppContext>;

pub fn create_router(ctx: Arc<AppContext>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health_check))
        .route("/mechanics", get(handle_get_mechanics))
        .route("/dice", get(handle_get_dice))
        .route("/evaluate", post(handle_evaluate))
        .layer(cors)
        .with_state(ctx)
}

// ── Request/Response types ──────────────────────────────────────────

/// Either one multi-line string or a list of lines.
#[derive(Deserialize)]
#[serde(untagged)]
enum Notations {
    Text(String),
    Lines(Vec<String>),
}

impl Notations {
    fn into_text(self) -> String {
        match self {
            Notations::Text(text) => text,
            Notations::Lines(lines) => lines.join("\n"),
        }
    }
}

#[derive(Deserialize)]
struct EvaluateRequest {
    notations: Notations,
    die: Option<String>,
    explode_limit: Option<String>,
    mechanic: Option<String>,
}

#[derive(Serialize)]
struct LineError {
    line: usize,
    message: String,
}

#[derive(Serialize)]
struct EvaluateResponse {
    die: String,
    explode_limit: String,
    mechanic: &'static str,
    results: Vec<PoolSummary>,
    errors: Vec<LineError>,
}

type ApiError = (StatusCode, Json<serde_json::Value>);

fn error_response(status: StatusCode, msg: &str) -> ApiError {
    (status, Json(serde_json::json!({ "error": msg })))
}

fn bad_request(err: impl std::fmt::Display) -> ApiError {
    error_response(StatusCode::BAD_REQUEST, &err.to_string())
}

// ── GET handlers ────────────────────────────────────────────────────

async fn handle_health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "OK" }))
}

async fn handle_get_mechanics() -> Json<serde_json::Value> {
    let mechanics: Vec<serde_json::Value> = Mechanic::ALL
        .iter()
        .map(|mechanic| {
            serde_json::json!({
                "name": mechanic.name(),
                "label": mechanic.label(),
            })
        })
        .collect();
    Json(serde_json::json!({
        "default": DEFAULT_MECHANIC.name(),
        "mechanics": mechanics,
    }))
}

async fn handle_get_dice(State(ctx): State<AppState>) -> Json<serde_json::Value> {
    let dice: Vec<serde_json::Value> = ctx
        .die_map
        .iter()
        .map(|(name, die)| {
            serde_json::json!({
                "name": name,
                "min": die.outcomes().next(),
                "max": die.outcomes().next_back(),
                "mean": die.mean(),
                "stdev": die.stdev(),
            })
        })
        .collect();
    Json(serde_json::json!({ "dice": dice }))
}

// ── POST handler ────────────────────────────────────────────────────

async fn handle_evaluate(
    State(ctx): State<AppState>,
    Json(req): Json<EvaluateRequest>,
) -> Result<Json<EvaluateResponse>, ApiError> {
    let die_expr = req.die.unwrap_or_else(|| DEFAULT_DIE.to_string());
    let die = parse_die(&die_expr).map_err(bad_request)?;
    let limit = match req.explode_limit {
        Some(text) => text.parse::<ExplodeLimit>().map_err(bad_request)?,
        None => DEFAULT_API_EXPLODE_LIMIT,
    };
    let mechanic = match req.mechanic {
        Some(name) => name.parse::<Mechanic>().map_err(bad_request)?,
        None => DEFAULT_MECHANIC,
    };
    let text = req.notations.into_text();

    // Evaluation is CPU-bound; keep it off the async workers.
    let (results, errors) = tokio::task::spawn_blocking(move || {
        let mut lines = Vec::new();
        let mut params = Vec::new();
        let mut errors = Vec::new();
        for (line, result) in Params::parse_notation_lines(&text, Some(&ctx.die_map)) {
            let checked = result
                .map_err(|err| err.to_string())
                .and_then(|p| within_budget(p, &die));
            match checked {
                Ok(p) => {
                    lines.push(line);
                    params.push(p);
                }
                Err(message) => errors.push(LineError { line, message }),
            }
        }

        let mut results = Vec::new();
        let evaluated = evaluate_params(params, &die, limit, mechanic, &ctx.cache);
        for (line, result) in lines.into_iter().zip(evaluated) {
            match result {
                Ok(result) => results.push(result.summary()),
                Err(err) => errors.push(LineError {
                    line,
                    message: err.to_string(),
                }),
            }
        }
        errors.sort_by_key(|err| err.line);
        (results, errors)
    })
    .await
    .map_err(|err| {
        log::error!("evaluation task failed: {}", err);
        error_response(StatusCode::INTERNAL_SERVER_ERROR, "evaluation failed")
    })?;

    log::info!(
        "evaluated {} pools ({} rejected lines) with {} on {}",
        results.len(),
        errors.len(),
        mechanic,
        die_expr
    );

    Ok(Json(EvaluateResponse {
        die: die_expr,
        explode_limit: limit.to_string(),
        mechanic: mechanic.name(),
        results,
        errors,
    }))
}

/// Reject pools too big to evaluate within one request.
fn within_budget(params: Params, default_die: &Distribution) -> Result<Params, String> {
    match enumeration_size(&params, params.die_or(default_die)) {
        Some(size) if size <= MAX_API_ENUMERATED_ROLLS => Ok(params),
        size => Err(format!(
            "{} is too large to evaluate here: {} roll pairs (limit {})",
            params,
            size.map_or_else(|| "over 2^128".to_string(), |size| size.to_string()),
            MAX_API_ENUMERATED_ROLLS
        )),
    }
}
