//! Scenario endpoints.
//!
//! Each handler hands its slow or detached part to the core: publishes go
//! through the deadline racer, deferred inserts through the background
//! runner. Handlers only extract plain values from the request.
//!
//! Request bodies are bounded by `listener.max_body_bytes` before they are
//! deserialized.

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::background::{BackgroundError, JobContext};
use crate::http::request::request_id;
use crate::http::response::{error_response, race_error_response, storage_status};
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::resilience::OperationHandle;
use crate::storage::Pokemon;

#[derive(Debug, Default, Deserialize)]
pub struct FireAndForgetParams {
    /// Name for the stored pokemon; defaults to one derived from the request id.
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PublishParams {
    /// Deadline for the publish, clamped to `timeouts.max_publish_ms`.
    pub timeout_ms: Option<u64>,
    pub group: Option<String>,
    pub message: Option<String>,
}

/// A batch of pokemon as listed by the upstream catalogue.
#[derive(Debug, Deserialize)]
pub struct PokemonBatch {
    pub results: Vec<PokemonEntry>,
}

#[derive(Debug, Deserialize)]
pub struct PokemonEntry {
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Created {
    pub request_id: String,
    pub created: usize,
}

#[derive(Debug, Serialize)]
pub struct Accepted {
    pub request_id: String,
}

#[derive(Debug, Serialize)]
pub struct PokemonCount {
    pub count: usize,
}

fn accepted(request_id: String) -> Response {
    (StatusCode::ACCEPTED, Json(Accepted { request_id })).into_response()
}

/// Schedule a deferred insert and answer 202 right away.
///
/// Only the request id and the name cross into the job; storage is resolved
/// from the job's own scope when it runs.
pub async fn fire_and_forget(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<FireAndForgetParams>,
) -> Response {
    let request_id = request_id(&headers);
    let name = params
        .name
        .unwrap_or_else(|| format!("pokemon-{request_id}"));
    let origin = request_id.clone();

    state.runner.run_detached(
        JobContext::new("create_pokemon", request_id.clone()),
        move |scope| async move {
            let storage = scope.storage();
            storage.add(Pokemon::new(name).with_origin(origin))?;
            storage.save_changes().await?;
            Ok::<(), BackgroundError>(())
        },
    );

    metrics::record_request("fire_and_forget", StatusCode::ACCEPTED.as_u16());
    accepted(request_id)
}

/// Publish to the remote dependency under a deadline.
pub async fn publish(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<PublishParams>,
) -> Response {
    let request_id = request_id(&headers);
    let timeout = state.config.load().timeouts.publish_or(params.timeout_ms);
    let operation = spawn_publish(&state, params);

    let response = match state.racer.timeout_after(operation, timeout).await {
        Ok(()) => accepted(request_id),
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Publish did not complete");
            race_error_response(&e, request_id)
        }
    };
    metrics::record_request("publish", response.status().as_u16());
    response
}

/// Publish to the remote dependency until the server begins shutting down.
pub async fn publish_cancellable(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<PublishParams>,
) -> Response {
    let request_id = request_id(&headers);
    let operation = spawn_publish(&state, params);

    let response = match state
        .racer
        .with_cancellation(operation, state.shutdown.signal())
        .await
    {
        Ok(()) => accepted(request_id),
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Publish did not complete");
            race_error_response(&e, request_id)
        }
    };
    metrics::record_request("publish_cancellable", response.status().as_u16());
    response
}

fn spawn_publish(
    state: &AppState,
    params: PublishParams,
) -> OperationHandle<(), crate::remote::RemoteError> {
    let remote = Arc::clone(&state.remote);
    let group = params.group.unwrap_or_else(|| "group".to_string());
    let message = params.message.unwrap_or_else(|| "hello".to_string());
    OperationHandle::spawn(async move { remote.publish(&group, &message).await })
}

/// Store a batch in one unit of work owned by this request.
pub async fn create_pokemon(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(batch): Json<PokemonBatch>,
) -> Response {
    let request_id = request_id(&headers);
    let scope_guard = state
        .runner
        .scope_factory()
        .create_scope("request", &request_id);
    let storage = scope_guard.scope().storage();

    let result = async {
        for entry in batch.results {
            storage.add(Pokemon::new(entry.name).with_origin(request_id.clone()))?;
        }
        storage.save_changes().await
    }
    .await;
    drop(scope_guard);

    let response = match result {
        Ok(created) => (
            StatusCode::CREATED,
            Json(Created {
                request_id,
                created,
            }),
        )
            .into_response(),
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Batch not stored");
            error_response(storage_status(&e), e.to_string(), request_id)
        }
    };
    metrics::record_request("create_pokemon", response.status().as_u16());
    response
}

pub async fn pokemon_count(State(state): State<AppState>) -> Json<PokemonCount> {
    Json(PokemonCount {
        count: state.store.count(),
    })
}
