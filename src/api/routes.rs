use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Local};
use serde::Serialize;

use crate::api::health::HealthState;
use crate::api::latency::LatencyStats;
use crate::error::AppError;
use crate::scheduler::{JobRegistry, JobView, TaskBoard, TaskName, TaskView};

#[derive(Clone)]
pub struct ApiState {
    pub health: Arc<HealthState>,
    pub tasks: Arc<TaskBoard>,
    pub jobs: Arc<JobRegistry>,
    pub latency: Arc<LatencyStats>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .route("/tasks", get(get_tasks))
        .route("/tasks/:name", get(get_task))
        .route("/jobs", get(get_jobs))
        .route("/stats/delivery", get(get_stats_delivery))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub uptime_secs: u64,
    pub last_tick: Option<DateTime<Local>>,
    pub last_dispatch: Option<DateTime<Local>>,
    pub delivered: u64,
    pub failed: u64,
    pub skipped_cycles: u64,
    pub running_jobs: usize,
}

#[derive(Serialize)]
pub struct DeliveryStatsResponse {
    pub samples: u64,
    pub p50_ms: Option<f64>,
    pub p95_ms: Option<f64>,
    pub p99_ms: Option<f64>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn get_health(State(state): State<ApiState>) -> Json<HealthResponse> {
    let h = &state.health;
    Json(HealthResponse {
        status: if h.last_tick().is_some() { "ok" } else { "starting" },
        uptime_secs: h.uptime_secs(),
        last_tick: h.last_tick(),
        last_dispatch: h.last_dispatch(),
        delivered: h.delivered(),
        failed: h.failed(),
        skipped_cycles: h.skipped_cycles(),
        running_jobs: state.jobs.len(),
    })
}

async fn get_tasks(State(state): State<ApiState>) -> Json<Vec<TaskView>> {
    let tasks = TaskName::ORDER
        .iter()
        .filter_map(|name| state.tasks.get(name).map(|v| v.value().clone()))
        .collect();
    Json(tasks)
}

async fn get_task(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> Result<Json<TaskView>, AppError> {
    state
        .tasks
        .iter()
        .find(|e| e.key().as_str() == name)
        .map(|e| Json(e.value().clone()))
        .ok_or_else(|| AppError::NotFound(format!("no task named {name:?}")))
}

async fn get_jobs(State(state): State<ApiState>) -> Json<Vec<JobView>> {
    Json(state.jobs.views())
}

async fn get_stats_delivery(State(state): State<ApiState>) -> Json<DeliveryStatsResponse> {
    let (p50_ms, p95_ms, p99_ms) = state.latency.percentiles_ms();
    Json(DeliveryStatsResponse {
        samples: state.latency.len(),
        p50_ms,
        p95_ms,
        p99_ms,
    })
}
