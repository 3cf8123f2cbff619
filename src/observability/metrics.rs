//! Metrics collection and exposition.
//!
//! # Metrics
//! - `scenario_race_outcomes_total` (counter): races by condition, outcome
//! - `scenario_race_duration_seconds` (histogram): time until a race resolved
//! - `scenario_pending_timers` (gauge): timers armed and not yet released
//! - `scenario_background_jobs_total` (counter): detached jobs by job, result
//! - `scenario_background_job_duration_seconds` (histogram)
//! - `scenario_background_failures_total` (counter): failures by job
//! - `scenario_http_requests_total` (counter): requests by route, status
//!
//! # Design Decisions
//! - Facade calls are no-ops until a recorder is installed
//! - The pending-timer gauge moves by ±1 so it aggregates across racers

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus recorder with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint started"),
        Err(e) => tracing::error!(error = %e, "Failed to install Prometheus recorder"),
    }
}

pub fn record_race(condition: &'static str, outcome: &'static str, start: Instant) {
    counter!(
        "scenario_race_outcomes_total",
        "condition" => condition,
        "outcome" => outcome
    )
    .increment(1);
    histogram!("scenario_race_duration_seconds", "condition" => condition)
        .record(start.elapsed().as_secs_f64());
}

pub fn timer_armed() {
    gauge!("scenario_pending_timers").increment(1.0);
}

pub fn timer_disarmed() {
    gauge!("scenario_pending_timers").decrement(1.0);
}

pub fn record_background_job(job: &'static str, result: &'static str, start: Instant) {
    counter!("scenario_background_jobs_total", "job" => job, "result" => result).increment(1);
    histogram!("scenario_background_job_duration_seconds", "job" => job)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_background_failure(job: String) {
    counter!("scenario_background_failures_total", "job" => job).increment(1);
}

pub fn record_request(route: &'static str, status: u16) {
    counter!(
        "scenario_http_requests_total",
        "route" => route,
        "status" => status.to_string()
    )
    .increment(1);
}
