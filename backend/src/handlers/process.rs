//! HTTP handlers for process phase management

use axum::{
    extract::{Path, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use shared::{Phase, PhaseRecord, Transition};

use crate::{error::AppResult, services::ProcessWorkflowService, AppState};

/// Request body for opening a phase tab
#[derive(Debug, Deserialize)]
pub struct TransitionInput {
    pub fase: Phase,
}

/// Accepted transition
#[derive(Debug, Serialize)]
pub struct TransitionResponse {
    pub allowed: bool,
    pub phase: Phase,
}

/// Bearer token forwarded from the browser, if any
fn forwarded_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

fn workflow(state: AppState, headers: &HeaderMap) -> ProcessWorkflowService {
    ProcessWorkflowService::new(
        state.api.with_token(forwarded_token(headers)),
        state.in_flight,
    )
}

/// Get a process with its phase state
pub async fn get_process(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(process_id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    let view = workflow(state, &headers).get_view(process_id).await?;
    Ok(Json(view))
}

/// Request to open a phase tab
pub async fn request_transition(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(process_id): Path<i64>,
    Json(input): Json<TransitionInput>,
) -> AppResult<impl IntoResponse> {
    let Transition::Allowed { phase } = workflow(state, &headers)
        .enter_phase(process_id, input.fase)
        .await?;
    Ok(Json(TransitionResponse {
        allowed: true,
        phase,
    }))
}

/// Submit the measurement record of a phase
pub async fn submit_record(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(process_id): Path<i64>,
    Json(record): Json<PhaseRecord>,
) -> AppResult<impl IntoResponse> {
    let view = workflow(state, &headers)
        .submit_record(process_id, record)
        .await?;
    Ok(Json(view))
}

/// Provisional packaging estimate
pub async fn get_estimate(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(process_id): Path<i64>,
) -> AppResult<Response> {
    let estimate = workflow(state, &headers).estimate(process_id).await?;
    Ok(match estimate {
        Some(estimate) => Json(estimate).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    })
}
