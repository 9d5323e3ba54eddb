//! Phase progression rules for a single process run
//!
//! Phases complete strictly in the order PILADO → CLASIFICACION → DENSIDAD →
//! COLOR → EMPAQUE. Every function here is pure: it reads the aggregate it is
//! given and returns a new one, leaving persistence and confirmation to the
//! caller. A returned `PhaseProgress` is tentative until the API round-trip
//! confirms it.

use serde::{Deserialize, Serialize};

use crate::error::{DenialReason, PhaseError};
use crate::models::{CompletedPhases, DensityPass, Phase, PhaseProgress, PhaseRecord};

/// Progress credited for each finalized phase
pub const PROGRESS_PER_PHASE: u8 = 20;

/// Outcome of an accepted navigation request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "resultado", rename_all = "snake_case")]
pub enum Transition {
    Allowed { phase: Phase },
}

/// Outcome of recording one density sub-step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "resultado", rename_all = "snake_case")]
pub enum SubStepOutcome {
    /// Sub-step stored, `remaining` still has to be recorded
    Recorded { remaining: DensityPass },
    /// Both passes stored, DENSIDAD is now completed
    PhaseCompleted,
}

/// Drives a process through its phases.
pub struct PhaseMachine;

impl PhaseMachine {
    /// First working phase not yet completed, `Finalizado` once all five are.
    pub fn current_phase(completed: &CompletedPhases) -> Phase {
        Phase::ORDERED
            .into_iter()
            .find(|phase| !completed.contains(*phase))
            .unwrap_or(Phase::Finalizado)
    }

    /// Whether the user may open `phase`.
    ///
    /// The active phase can be revisited; phases behind an incomplete
    /// predecessor and already finalized phases cannot. `Finalizado` is
    /// never entered, even once it is the current phase: it is only reached
    /// by completing `Empaque`.
    pub fn can_enter(phase: Phase, completed: &CompletedPhases) -> bool {
        !phase.is_terminal()
            && !completed.contains(phase)
            && phase.position() <= Self::current_phase(completed).position()
    }

    /// Validate a navigation request, explaining any denial.
    pub fn request_transition(
        target: Phase,
        completed: &CompletedPhases,
    ) -> Result<Transition, PhaseError> {
        if target.is_terminal() {
            return Err(PhaseError::Denied(DenialReason::Terminal));
        }
        if completed.contains(target) {
            return Err(PhaseError::Denied(DenialReason::AlreadyCompleted(target)));
        }

        let current = Self::current_phase(completed);
        if target.position() > current.position() {
            return Err(PhaseError::Denied(DenialReason::MustComplete(current)));
        }

        Ok(Transition::Allowed { phase: target })
    }

    /// Mark `phase` complete and append `record` to the notes log.
    ///
    /// Finalizing twice is an error, never a no-op. For DENSIDAD the record
    /// must be a density pass and, together with what is already logged,
    /// both passes must be present.
    pub fn finalize_phase(
        phase: Phase,
        record: PhaseRecord,
        progress: &PhaseProgress,
    ) -> Result<PhaseProgress, PhaseError> {
        if phase.is_terminal() || progress.completed.contains(phase) {
            return Err(PhaseError::InvalidPhase { phase });
        }

        let current = Self::current_phase(&progress.completed);
        if phase.position() > current.position() {
            return Err(PhaseError::Denied(DenialReason::MustComplete(current)));
        }

        if record.phase() != phase {
            return Err(PhaseError::RecordMismatch {
                phase,
                record: record.phase(),
            });
        }

        if let Some(pass) = record.density_pass() {
            let mut passes = progress.notes.recorded_density_passes();
            let duplicate = !passes.insert(pass);
            if let Some(missing) = DensityPass::ALL.into_iter().find(|p| !passes.contains(p)) {
                return Err(PhaseError::IncompleteSubSteps { missing });
            }
            if duplicate {
                return Err(PhaseError::SubStepAlreadyRecorded { pass });
            }
        }

        Ok(PhaseProgress::new(
            progress.completed.with(phase),
            progress.notes.with_record(record),
        ))
    }

    /// Store one density pass as soon as it is measured.
    ///
    /// Pass 2 requires pass 1. Recording the second pass completes DENSIDAD.
    pub fn record_density_pass(
        record: PhaseRecord,
        progress: &PhaseProgress,
    ) -> Result<(PhaseProgress, SubStepOutcome), PhaseError> {
        let pass = record.density_pass().ok_or(PhaseError::RecordMismatch {
            phase: Phase::Densidad,
            record: record.phase(),
        })?;

        Self::request_transition(Phase::Densidad, &progress.completed).map_err(|err| {
            match err {
                PhaseError::Denied(DenialReason::AlreadyCompleted(phase)) => {
                    PhaseError::InvalidPhase { phase }
                }
                other => other,
            }
        })?;

        if progress.notes.has_density_pass(pass) {
            return Err(PhaseError::SubStepAlreadyRecorded { pass });
        }

        match pass {
            DensityPass::First => Ok((
                PhaseProgress::new(
                    progress.completed.clone(),
                    progress.notes.with_record(record),
                ),
                SubStepOutcome::Recorded {
                    remaining: DensityPass::Second,
                },
            )),
            DensityPass::Second => {
                if !progress.notes.has_density_pass(DensityPass::First) {
                    return Err(PhaseError::IncompleteSubSteps {
                        missing: DensityPass::First,
                    });
                }
                let next = Self::finalize_phase(Phase::Densidad, record, progress)?;
                Ok((next, SubStepOutcome::PhaseCompleted))
            }
        }
    }

    /// Completion percentage, 20 per finalized phase.
    pub fn progress_percent(completed: &CompletedPhases) -> u8 {
        // at most five phases, cannot overflow
        completed.len() as u8 * PROGRESS_PER_PHASE
    }

    /// Phases whose tab can currently be opened.
    pub fn enterable_phases(completed: &CompletedPhases) -> Vec<Phase> {
        Phase::ORDERED
            .into_iter()
            .filter(|phase| Self::can_enter(*phase, completed))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_phase_of_empty_set() {
        assert_eq!(PhaseMachine::current_phase(&CompletedPhases::new()), Phase::Pilado);
    }

    #[test]
    fn test_only_active_phase_is_enterable() {
        let completed = CompletedPhases::from_phases([Phase::Pilado, Phase::Clasificacion]);
        assert_eq!(PhaseMachine::enterable_phases(&completed), vec![Phase::Densidad]);
        assert!(!PhaseMachine::can_enter(Phase::Finalizado, &completed));
    }

    #[test]
    fn test_terminal_target_denied() {
        let all = CompletedPhases::from_phases(Phase::ORDERED);
        assert_eq!(
            PhaseMachine::request_transition(Phase::Finalizado, &all),
            Err(PhaseError::Denied(DenialReason::Terminal))
        );
    }

    #[test]
    fn test_progress_percent_steps_by_twenty() {
        let completed = CompletedPhases::from_phases([Phase::Pilado, Phase::Clasificacion]);
        assert_eq!(PhaseMachine::progress_percent(&completed), 40);
        assert_eq!(
            PhaseMachine::progress_percent(&CompletedPhases::from_phases(Phase::ORDERED)),
            100
        );
    }
}
