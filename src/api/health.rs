//! Health check endpoints
//!
//! - GET /health/ - overall status with component checks
//! - GET /health/readiness/ - 200 when the database and cache respond, else 503
//! - GET /health/liveness/ - always 200 while the process runs
//!
//! Every route answers with and without the trailing slash.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;
use std::time::Instant;

use crate::api::middleware::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

#[derive(Debug, Serialize)]
pub struct ComponentCheck {
    pub status: &'static str,
    pub latency_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthChecks {
    pub database: ComponentCheck,
    pub cache: ComponentCheck,
}

impl HealthChecks {
    fn all_ok(&self) -> bool {
        self.database.error.is_none() && self.cache.error.is_none()
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub checks: HealthChecks,
}

#[derive(Debug, Serialize)]
pub struct ProbeResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checks: Option<HealthChecks>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/", get(health))
        .route("/health/readiness", get(readiness))
        .route("/health/readiness/", get(readiness))
        .route("/health/liveness", get(liveness))
        .route("/health/liveness/", get(liveness))
}

fn check(driver: String, started: Instant, result: anyhow::Result<()>) -> ComponentCheck {
    let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
    match result {
        Ok(()) => ComponentCheck {
            status: "ok",
            latency_ms,
            driver: Some(driver),
            error: None,
        },
        Err(e) => {
            tracing::warn!(driver = %driver, "Health check failed: {e:#}");
            ComponentCheck {
                status: "error",
                latency_ms,
                driver: Some(driver),
                error: Some(e.to_string()),
            }
        }
    }
}

async fn run_checks(state: &AppState) -> HealthChecks {
    let started = Instant::now();
    let db_result = state.pool.ping().await;
    let database = check(format!("{:?}", state.pool.driver()).to_lowercase(), started, db_result);

    let started = Instant::now();
    let cache_result = state.cache.round_trip().await;
    let cache = check(state.cache.driver_name().to_string(), started, cache_result);

    HealthChecks { database, cache }
}

/// GET /health/
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let checks = run_checks(&state).await;
    let status = if checks.all_ok() {
        HealthStatus::Healthy
    } else {
        HealthStatus::Degraded
    };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.request_stats.uptime_seconds(),
        checks,
    })
}

/// GET /health/readiness/
async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let checks = run_checks(&state).await;
    if checks.all_ok() {
        (
            StatusCode::OK,
            Json(ProbeResponse {
                status: "ready",
                checks: Some(checks),
            }),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ProbeResponse {
                status: "not_ready",
                checks: Some(checks),
            }),
        )
    }
}

/// GET /health/liveness/
async fn liveness() -> Json<ProbeResponse> {
    Json(ProbeResponse {
        status: "alive",
        checks: None,
    })
}
