use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures::StreamExt;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::info;

use factcheck_common::{Claim, FactCheckError, PipelineEvent};

use crate::AppState;

pub const NDJSON: &str = "application/x-ndjson";

#[derive(Debug, Deserialize)]
pub struct FactCheckRequest {
    claim: Option<String>,
    /// Kept loose so a non-integer gets a proper validation error.
    num_sources: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct FactCheckQuery {
    claim: Option<String>,
    num_sources: Option<String>,
}

pub async fn fact_check_post(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<FactCheckRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            return error_response(&format!("Invalid request body: {}", rejection.body_text()))
        }
    };

    let num_sources = match request.num_sources {
        None | Some(Value::Null) => None,
        Some(value) => match value.as_i64() {
            Some(n) => Some(n),
            None => return error_response("Invalid number of sources"),
        },
    };

    start(&state, request.claim.as_deref(), num_sources)
}

pub async fn fact_check_get(
    State(state): State<Arc<AppState>>,
    query: Result<Query<FactCheckQuery>, QueryRejection>,
) -> Response {
    let query = match query {
        Ok(Query(query)) => query,
        Err(rejection) => {
            return error_response(&format!("Invalid query string: {}", rejection.body_text()))
        }
    };

    let num_sources = match query.num_sources.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => match raw.parse::<i64>() {
            Ok(n) => Some(n),
            Err(_) => return error_response("Invalid number of sources"),
        },
    };

    start(&state, query.claim.as_deref(), num_sources)
}

/// Validate, then hand the claim to the pipeline and stream its events back.
/// Nothing external is contacted for a rejected request.
fn start(state: &AppState, claim: Option<&str>, num_sources: Option<i64>) -> Response {
    let claim = match Claim::parse(claim.unwrap_or_default(), num_sources, &state.source_limits) {
        Ok(claim) => claim,
        Err(e) => {
            info!(error = %e, "Rejected fact-check request");
            return error_response(&client_message(&e));
        }
    };

    ndjson_response(state.orchestrator.spawn(claim))
}

fn client_message(e: &FactCheckError) -> String {
    match e {
        FactCheckError::Validation(message) => message.clone(),
        other => other.to_string(),
    }
}

fn ndjson_response(events: mpsc::Receiver<PipelineEvent>) -> Response {
    let body = ReceiverStream::new(events).map(|event| event.to_ndjson().map(Bytes::from));
    ([(header::CONTENT_TYPE, NDJSON)], Body::from_stream(body)).into_response()
}

fn error_response(message: &str) -> Response {
    let line = PipelineEvent::Error(message.to_string())
        .to_ndjson()
        .unwrap_or_else(|_| "{\"error\":\"Invalid request\"}\n".to_string());
    (
        StatusCode::BAD_REQUEST,
        [(header::CONTENT_TYPE, NDJSON)],
        line,
    )
        .into_response()
}
