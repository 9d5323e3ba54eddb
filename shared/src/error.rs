//! Error types for the phase engine
//!
//! Every rule violation is a named variant so callers can branch on the kind.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::models::{DensityPass, Phase};

/// Why a navigation or finalization request was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialReason {
    /// Target lies ahead of the active phase
    MustComplete(Phase),
    /// Target was finalized before and cannot be re-entered
    AlreadyCompleted(Phase),
    /// `Finalizado` is reached, never entered
    Terminal,
}

impl std::fmt::Display for DenialReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DenialReason::MustComplete(current) => write!(f, "must complete {} first", current),
            DenialReason::AlreadyCompleted(target) => write!(f, "{} already completed", target),
            DenialReason::Terminal => write!(f, "process already finalized"),
        }
    }
}

/// Phase state machine errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PhaseError {
    #[error("{0}")]
    Denied(DenialReason),

    /// Finalizing a phase twice would double-count downstream weights
    #[error("phase {phase} is already completed")]
    InvalidPhase { phase: Phase },

    #[error("cannot finalize DENSIDAD: {missing} has not been recorded")]
    IncompleteSubSteps { missing: DensityPass },

    #[error("{pass} is already recorded")]
    SubStepAlreadyRecorded { pass: DensityPass },

    #[error("a {record} record cannot finalize {phase}")]
    RecordMismatch { phase: Phase, record: Phase },
}

impl PhaseError {
    /// Stable machine-readable kind
    pub fn code(&self) -> &'static str {
        match self {
            PhaseError::Denied(_) => "PHASE_DENIED",
            PhaseError::InvalidPhase { .. } => "INVALID_PHASE",
            PhaseError::IncompleteSubSteps { .. } => "INCOMPLETE_SUB_STEPS",
            PhaseError::SubStepAlreadyRecorded { .. } => "SUB_STEP_ALREADY_RECORDED",
            PhaseError::RecordMismatch { .. } => "RECORD_MISMATCH",
        }
    }
}

/// A phase record that failed boundary validation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{field}: {message}")]
pub struct RecordValidationError {
    pub field: String,
    pub message: String,
}

impl RecordValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Remote process state that strictly sequential finalization cannot produce
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessStateError {
    #[error("progreso {reported} does not match {expected} for current phase {phase}")]
    ProgressMismatch {
        phase: Phase,
        reported: Decimal,
        expected: u8,
    },

    #[error("phase {phase} has recorded data but {current} is still active")]
    RecordsAhead { phase: Phase, current: Phase },

    #[error("phase {phase} has final records but was never advanced")]
    UnadvancedPhase { phase: Phase },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown phase: {0}")]
pub struct UnknownPhase(pub String);
