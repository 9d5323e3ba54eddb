//! Process workflow service
//!
//! Wires the phase state machine to the cooperative API. Every mutation is
//! computed locally as a tentative result, persisted remotely, and then the
//! process is re-fetched; only the re-fetched state is returned.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use shared::{
    provisional_estimate, CompletedPhases, LotRef, OutputEstimate, Phase, PhaseMachine,
    PhaseProgress, PhaseRecord, Process, SubStepOutcome, TechnicalNotes, Transition,
};

use crate::error::{AppError, AppResult};
use crate::external::{ProcessApiClient, ProcessPatch};

/// Process workflow service
#[derive(Clone)]
pub struct ProcessWorkflowService {
    api: ProcessApiClient,
    in_flight: InFlightSubmissions,
}

/// Process state as shown to the browser
#[derive(Debug, Clone, Serialize)]
pub struct ProcessView {
    pub id: i64,
    pub fase_actual: Phase,
    pub completed: CompletedPhases,
    pub progreso: u8,
    /// Phase tabs the user may open
    pub enterable: Vec<Phase>,
    pub total_quintales: Decimal,
    pub total_kg: Decimal,
    pub lotes: Vec<LotRef>,
    pub notas_tecnicas: TechnicalNotes,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimate: Option<OutputEstimate>,
}

/// Process ids with a submission currently being persisted
#[derive(Clone, Default)]
pub struct InFlightSubmissions(Arc<Mutex<HashSet<i64>>>);

/// Releases the process id when dropped
pub struct SubmissionGuard {
    ids: Arc<Mutex<HashSet<i64>>>,
    process_id: i64,
}

impl InFlightSubmissions {
    /// Claim the process for one submission; fails if another one is running
    pub fn acquire(&self, process_id: i64) -> AppResult<SubmissionGuard> {
        let mut ids = self.0.lock().unwrap_or_else(|e| e.into_inner());
        if !ids.insert(process_id) {
            return Err(AppError::SubmissionInProgress(process_id));
        }
        Ok(SubmissionGuard {
            ids: Arc::clone(&self.0),
            process_id,
        })
    }
}

impl Drop for SubmissionGuard {
    fn drop(&mut self) {
        let mut ids = self.ids.lock().unwrap_or_else(|e| e.into_inner());
        ids.remove(&self.process_id);
    }
}

impl ProcessWorkflowService {
    /// Create a new ProcessWorkflowService instance
    pub fn new(api: ProcessApiClient, in_flight: InFlightSubmissions) -> Self {
        Self { api, in_flight }
    }

    /// Current view of a process, with a live estimate while packaging is open
    pub async fn get_view(&self, process_id: i64) -> AppResult<ProcessView> {
        let process = self.api.fetch_process(process_id).await?;
        build_view(process)
    }

    /// Check whether the user may open a phase tab
    pub async fn enter_phase(&self, process_id: i64, phase: Phase) -> AppResult<Transition> {
        let process = self.api.fetch_process(process_id).await?;
        let progress = derive_progress(&process)?;

        PhaseMachine::request_transition(phase, &progress.completed).map_err(|err| {
            tracing::warn!(process_id, %phase, "Transition denied: {}", err);
            AppError::from(err)
        })
    }

    /// Validate, apply and persist a phase record, then return the re-fetched process
    pub async fn submit_record(
        &self,
        process_id: i64,
        record: PhaseRecord,
    ) -> AppResult<ProcessView> {
        let _guard = self.in_flight.acquire(process_id)?;

        record.validate()?;

        let process = self.api.fetch_process(process_id).await?;
        let progress = derive_progress(&process)?;
        let phase = record.phase();

        match &record {
            PhaseRecord::Empaque(packaging) => match self.api.fetch_packaging(process_id).await? {
                Some(_) if process.is_finished() => {
                    return Err(AppError::PackagingAlreadySaved(process_id));
                }
                // figures saved by an earlier attempt whose closing PATCH failed
                Some(saved) => {
                    let next =
                        PhaseMachine::finalize_phase(phase, PhaseRecord::Empaque(saved), &progress)?;
                    tracing::warn!(process_id, "Packaging already saved, resuming process close");
                    self.api.close_process(process_id, next.notes).await?;
                }
                None => {
                    let next = PhaseMachine::finalize_phase(phase, record.clone(), &progress)?;
                    self.api
                        .finalize_packaging(process_id, packaging, next.notes)
                        .await?;
                    tracing::info!(process_id, "Packaging saved, process finalized");
                }
            },
            PhaseRecord::Densidad(density) => {
                let (next, outcome) = PhaseMachine::record_density_pass(record.clone(), &progress)?;
                self.api.save_phase_record(process_id, &record).await?;
                self.api
                    .patch_process(process_id, &advance_patch(&next))
                    .await?;
                match outcome {
                    SubStepOutcome::PhaseCompleted => {
                        tracing::info!(process_id, %phase, "Phase completed")
                    }
                    SubStepOutcome::Recorded { remaining } => tracing::info!(
                        process_id,
                        pass = %density.paso,
                        %remaining,
                        "Density pass recorded"
                    ),
                }
            }
            _ => {
                let next = PhaseMachine::finalize_phase(phase, record.clone(), &progress)?;
                self.api.save_phase_record(process_id, &record).await?;
                self.api
                    .patch_process(process_id, &advance_patch(&next))
                    .await?;
                tracing::info!(process_id, %phase, "Phase completed");
            }
        }

        let confirmed = self.api.fetch_process(process_id).await?;
        build_view(confirmed)
    }

    /// Provisional output estimate, `None` once packaging figures exist
    pub async fn estimate(&self, process_id: i64) -> AppResult<Option<OutputEstimate>> {
        let process = self.api.fetch_process(process_id).await?;
        if self.api.fetch_packaging(process_id).await?.is_some() {
            return Ok(None);
        }
        let progress = derive_progress(&process)?;
        Ok(provisional_estimate(&progress.notes, Utc::now()))
    }
}

fn derive_progress(process: &Process) -> AppResult<PhaseProgress> {
    process.progress().map_err(|err| {
        tracing::warn!(process_id = process.id, "Refusing inconsistent process: {}", err);
        AppError::from(err)
    })
}

fn advance_patch(progress: &PhaseProgress) -> ProcessPatch {
    ProcessPatch {
        fase_actual: PhaseMachine::current_phase(&progress.completed),
        progreso: PhaseMachine::progress_percent(&progress.completed),
        notas_tecnicas: progress.notes.clone(),
        estado: None,
    }
}

fn build_view(process: Process) -> AppResult<ProcessView> {
    let progress = derive_progress(&process)?;
    let estimate = if process.is_finished() {
        None
    } else {
        provisional_estimate(&progress.notes, Utc::now())
    };

    Ok(ProcessView {
        id: process.id,
        fase_actual: PhaseMachine::current_phase(&progress.completed),
        progreso: PhaseMachine::progress_percent(&progress.completed),
        enterable: PhaseMachine::enterable_phases(&progress.completed),
        total_quintales: process.total_quintales(),
        total_kg: process.total_weight_kg(),
        lotes: process.lots().to_vec(),
        completed: progress.completed,
        notas_tecnicas: progress.notes,
        estimate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_submission_rejected_while_first_in_flight() {
        let in_flight = InFlightSubmissions::default();
        let guard = in_flight.acquire(7).unwrap();
        assert!(matches!(
            in_flight.acquire(7),
            Err(AppError::SubmissionInProgress(7))
        ));
        // other processes are independent
        assert!(in_flight.acquire(8).is_ok());
        drop(guard);
        assert!(in_flight.acquire(7).is_ok());
    }

    #[test]
    fn test_advance_patch_points_at_next_phase() {
        let progress = PhaseProgress::new(
            CompletedPhases::from_phases([Phase::Pilado, Phase::Clasificacion]),
            TechnicalNotes::new(),
        );
        let patch = advance_patch(&progress);
        assert_eq!(patch.fase_actual, Phase::Densidad);
        assert_eq!(patch.progreso, 40);
        assert!(patch.estado.is_none());
    }
}
