use axum::{extract::State, Json};
use serde::Serialize;

use crate::background::ScopeSnapshot;
use crate::http::server::AppState;
use crate::observability::FailureRecord;
use crate::resilience::LedgerSnapshot;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub uptime_secs: u64,
    pub remote_connected: bool,
    pub pokemon: usize,
}

#[derive(Serialize)]
pub struct BackgroundStatus {
    pub in_flight: usize,
    pub scopes: ScopeSnapshot,
    pub failures_total: u64,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: if state.shutdown.is_triggered() {
            "shutting_down"
        } else {
            "operational"
        },
        uptime_secs: state.started_at.elapsed().as_secs(),
        remote_connected: state.remote.is_connected(),
        pokemon: state.store.count(),
    })
}

pub async fn get_races(State(state): State<AppState>) -> Json<LedgerSnapshot> {
    Json(state.racer.snapshot())
}

pub async fn get_background(State(state): State<AppState>) -> Json<BackgroundStatus> {
    Json(BackgroundStatus {
        in_flight: state.runner.in_flight(),
        scopes: state.runner.scopes(),
        failures_total: state.failures.total(),
    })
}

pub async fn get_failures(State(state): State<AppState>) -> Json<Vec<FailureRecord>> {
    Json(state.failures.recent())
}
