//! API handlers for alarm service

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Json, Response,
    },
};
use chrono::Utc;
use errors::FieldwatchError;
use fieldwatch_model::Condition;
use futures::stream::{self, Stream};
use serde_json::json;
use tracing::info;

use crate::api::models::*;
use crate::api::AppState;
use crate::registry::{ConnectionGuard, PushMessage};
use crate::service::ServiceStats;

/// Health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "alarmsrv",
    }))
}

/// Live alarm stream
///
/// Emits `connect` with the client id first, then one `alarm` event per
/// dispatched `AlarmEvent`, and `shutdown` before the server closes it.
pub async fn subscribe(
    State(state): State<AppState>,
    Query(query): Query<SubscribeQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let client_id = resolve_client_id(query.client_id);
    let registry = Arc::clone(state.registry());
    let subscription = registry.subscribe(&client_id);
    let guard = ConnectionGuard::new(registry, &subscription);

    let events = stream::unfold(
        (subscription.receiver, guard, false),
        |(mut receiver, guard, finished)| async move {
            if finished {
                return None;
            }
            let (event, finished) = match receiver.recv().await? {
                PushMessage::Connected { client_id } => {
                    (Event::default().event("connect").data(client_id), false)
                },
                PushMessage::Alarm(payload) => {
                    (Event::default().event("alarm").data(payload.as_ref()), false)
                },
                PushMessage::Shutdown => (
                    Event::default().event("shutdown").data("server shutting down"),
                    true,
                ),
            };
            Some((Ok::<_, Infallible>(event), (receiver, guard, finished)))
        },
    );

    Sse::new(events).keep_alive(KeepAlive::new().interval(state.keep_alive()))
}

/// Blank or missing ids get a time-derived one
fn resolve_client_id(requested: Option<String>) -> String {
    match requested {
        Some(id) if !id.trim().is_empty() => id.trim().to_string(),
        _ => format!("client-{}", Utc::now().timestamp_millis()),
    }
}

/// Drop a client's connection; idempotent
pub async fn unsubscribe(State(state): State<AppState>, Path(client_id): Path<String>) -> StatusCode {
    state.registry().remove(&client_id);
    StatusCode::NO_CONTENT
}

/// Evaluate one reading
pub async fn ingest(
    State(state): State<AppState>,
    Json(request): Json<IngestRequest>,
) -> Result<Response, FieldwatchError> {
    match state
        .pipeline()
        .ingest(&request.path, request.fields, request.period)
        .await
    {
        Ok(outcome) => Ok(Json(outcome).into_response()),
        Err(skip) if skip.is_malformed() => Err(skip.into()),
        Err(skip) => Ok((
            StatusCode::ACCEPTED,
            Json(SkipResponse {
                skipped: true,
                reason: skip.reason().to_string(),
                message: skip.to_string(),
            }),
        )
            .into_response()),
    }
}

/// Bus, pipeline and connection counters
pub async fn get_statistics(State(state): State<AppState>) -> Json<ServiceStats> {
    Json(state.stats())
}

/// Every stored condition of a sensor kind, inactive ones included
pub async fn list_conditions(
    State(state): State<AppState>,
    Path(sensor_kind): Path<String>,
) -> Result<Json<Vec<Condition>>, FieldwatchError> {
    let snapshot = state.store().snapshot();
    let conditions = snapshot
        .all_for(&sensor_kind)
        .ok_or_else(|| FieldwatchError::NotFound {
            resource: format!("conditions for sensor kind '{}'", sensor_kind),
        })?;
    Ok(Json(conditions.iter().map(|c| c.as_ref().clone()).collect()))
}

/// Validate and replace the whole condition set of a sensor kind
pub async fn replace_conditions(
    State(state): State<AppState>,
    Path(sensor_kind): Path<String>,
    Json(conditions): Json<Vec<Condition>>,
) -> Result<Json<ConditionsReplaced>, FieldwatchError> {
    let count = conditions.len();
    state
        .store()
        .replace_sensor_kind(&sensor_kind, conditions)?;
    info!("Replaced {} conditions for sensor kind {}", count, sensor_kind);

    Ok(Json(ConditionsReplaced {
        sensor_kind,
        count,
        version: state.store().version(),
    }))
}

pub async fn remove_conditions(
    State(state): State<AppState>,
    Path(sensor_kind): Path<String>,
) -> Result<StatusCode, FieldwatchError> {
    if state.store().remove_sensor_kind(&sensor_kind) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(FieldwatchError::NotFound {
            resource: format!("conditions for sensor kind '{}'", sensor_kind),
        })
    }
}
