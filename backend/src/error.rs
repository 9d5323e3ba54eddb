//! Error handling for the process phase service
//!
//! Provides consistent error responses in English and Spanish

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared::{PhaseError, ProcessStateError, RecordValidationError};
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Phase rule errors
    #[error("Phase rule violated: {0}")]
    Phase(#[from] PhaseError),

    #[error("Inconsistent process state: {0}")]
    InconsistentProcessState(#[from] ProcessStateError),

    #[error("A submission for process {0} is already in progress")]
    SubmissionInProgress(i64),

    #[error("Packaging already saved for process {0}")]
    PackagingAlreadySaved(i64),

    // Validation errors
    #[error("Validation error: {message}")]
    Validation {
        field: String,
        message: String,
        message_es: String,
    },

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Remote API errors
    #[error("Remote API returned {status}: {body}")]
    RemoteApi { status: u16, body: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<RecordValidationError> for AppError {
    fn from(err: RecordValidationError) -> Self {
        AppError::Validation {
            message_es: format!("Dato inválido en {}: {}", err.field, err.message),
            field: err.field,
            message: err.message,
        }
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message_en: String,
    pub message_es: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl AppError {
    /// Status code and body for this error
    fn detail(&self) -> (StatusCode, ErrorDetail) {
        match self {
            AppError::Phase(err) => {
                let status = match err {
                    PhaseError::Denied(_)
                    | PhaseError::InvalidPhase { .. }
                    | PhaseError::SubStepAlreadyRecorded { .. } => StatusCode::CONFLICT,
                    PhaseError::IncompleteSubSteps { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                    PhaseError::RecordMismatch { .. } => StatusCode::BAD_REQUEST,
                };
                (
                    status,
                    ErrorDetail {
                        code: err.code().to_string(),
                        message_en: err.to_string(),
                        message_es: phase_error_es(err),
                        field: None,
                    },
                )
            }
            AppError::InconsistentProcessState(err) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail {
                    code: "INCONSISTENT_PROCESS_STATE".to_string(),
                    message_en: err.to_string(),
                    message_es: format!("Estado del proceso inconsistente: {}", err),
                    field: None,
                },
            ),
            AppError::SubmissionInProgress(id) => (
                StatusCode::CONFLICT,
                ErrorDetail {
                    code: "SUBMISSION_IN_PROGRESS".to_string(),
                    message_en: format!("A submission for process {} is already in progress", id),
                    message_es: format!("Ya hay un envío en curso para el proceso {}", id),
                    field: None,
                },
            ),
            AppError::PackagingAlreadySaved(id) => (
                StatusCode::CONFLICT,
                ErrorDetail {
                    code: "PACKAGING_ALREADY_SAVED".to_string(),
                    message_en: format!("Packaging figures for process {} are already saved", id),
                    message_es: format!("El empaque del proceso {} ya fue registrado", id),
                    field: None,
                },
            ),
            AppError::Validation {
                field,
                message,
                message_es,
            } => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    code: "VALIDATION_ERROR".to_string(),
                    message_en: message.clone(),
                    message_es: message_es.clone(),
                    field: Some(field.clone()),
                },
            ),
            AppError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                ErrorDetail {
                    code: "NOT_FOUND".to_string(),
                    message_en: format!("{} not found", resource),
                    message_es: format!("No se encontró {}", resource),
                    field: None,
                },
            ),
            AppError::RemoteApi { status, .. } => (
                StatusCode::BAD_GATEWAY,
                ErrorDetail {
                    code: "REMOTE_API_ERROR".to_string(),
                    message_en: format!("Cooperative API responded with status {}", status),
                    message_es: format!("La API de la cooperativa respondió con estado {}", status),
                    field: None,
                },
            ),
            AppError::Http(err) => (
                if err.is_timeout() {
                    StatusCode::GATEWAY_TIMEOUT
                } else {
                    StatusCode::BAD_GATEWAY
                },
                ErrorDetail {
                    code: "REMOTE_API_UNAVAILABLE".to_string(),
                    message_en: "Cooperative API is unavailable".to_string(),
                    message_es: "La API de la cooperativa no está disponible".to_string(),
                    field: None,
                },
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "INTERNAL_ERROR".to_string(),
                    message_en: msg.clone(),
                    message_es: "Error interno del servidor".to_string(),
                    field: None,
                },
            ),
        }
    }
}

fn phase_error_es(err: &PhaseError) -> String {
    use shared::DenialReason;

    match err {
        PhaseError::Denied(DenialReason::MustComplete(phase)) => {
            format!("Primero debe completar {}", phase)
        }
        PhaseError::Denied(DenialReason::AlreadyCompleted(phase)) => {
            format!("{} ya fue completada", phase)
        }
        PhaseError::Denied(DenialReason::Terminal) => "El proceso ya finalizó".to_string(),
        PhaseError::InvalidPhase { phase } => format!("La fase {} ya fue completada", phase),
        PhaseError::IncompleteSubSteps { missing } => {
            format!("No se puede cerrar DENSIDAD: falta {}", missing)
        }
        PhaseError::SubStepAlreadyRecorded { pass } => format!("{} ya fue registrado", pass),
        PhaseError::RecordMismatch { phase, record } => {
            format!("Un registro de {} no corresponde a la fase {}", record, phase)
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_detail) = self.detail();

        // Log the error for debugging
        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::warn!("Request rejected: {}", self);
        }

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{DenialReason, DensityPass, Phase};

    #[test]
    fn test_phase_errors_map_to_distinct_statuses() {
        let denied = AppError::from(PhaseError::Denied(DenialReason::MustComplete(Phase::Color)));
        assert_eq!(denied.detail().0, StatusCode::CONFLICT);
        assert_eq!(denied.detail().1.code, "PHASE_DENIED");

        let incomplete = AppError::from(PhaseError::IncompleteSubSteps {
            missing: DensityPass::Second,
        });
        assert_eq!(incomplete.detail().0, StatusCode::UNPROCESSABLE_ENTITY);

        let mismatch = AppError::from(PhaseError::RecordMismatch {
            phase: Phase::Color,
            record: Phase::Pilado,
        });
        assert_eq!(mismatch.detail().0, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_concurrent_submission_is_conflict() {
        let (status, detail) = AppError::SubmissionInProgress(7).detail();
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(detail.code, "SUBMISSION_IN_PROGRESS");

        let (status, detail) = AppError::PackagingAlreadySaved(7).detail();
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(detail.code, "PACKAGING_ALREADY_SAVED");
    }

    #[test]
    fn test_denial_message_keeps_reason() {
        let err = AppError::from(PhaseError::Denied(DenialReason::MustComplete(
            Phase::Clasificacion,
        )));
        let (_, detail) = err.detail();
        assert_eq!(detail.message_en, "must complete CLASIFICACION first");
        assert_eq!(detail.message_es, "Primero debe completar CLASIFICACION");
    }

    #[test]
    fn test_record_validation_carries_field() {
        let err = AppError::from(RecordValidationError::new("malla", "Mesh size must be between 10 and 20"));
        let (status, detail) = err.detail();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(detail.field.as_deref(), Some("malla"));
    }
}
