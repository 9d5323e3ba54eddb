//! Process run models as returned by the cooperative API

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use super::phase::{CompletedPhases, DensityPass, Phase};
use super::record::{PhaseProgress, TechnicalNotes};
use crate::error::ProcessStateError;
use crate::phase_machine::PhaseMachine;
use crate::types::quintales_to_kg;

/// One batch of coffee taken through the five phases
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Process {
    pub id: i64,
    /// Persisted current phase; absent means the run has not started
    #[serde(default)]
    pub fase_actual: Option<Phase>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estado: Option<ProcessStatus>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub notas_tecnicas: TechnicalNotes,
    /// Completion percentage, 20 per finalized phase
    #[serde(default, deserialize_with = "null_as_default")]
    pub progreso: Decimal,
    /// Declared total weight in quintales
    #[serde(default)]
    pub quintales_totales: Option<Decimal>,
    /// Writable lot references, usually bare ids
    #[serde(default, deserialize_with = "null_as_default")]
    pub lotes: Vec<LotRef>,
    /// Read-only expanded lots, preferred over `lotes` when sent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lotes_info: Option<Vec<LotRef>>,
}

/// Overall status flag kept by the API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessStatus {
    Pendiente,
    EnProceso,
    Completado,
}

/// Lot contributing to a process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "LotRefRepr")]
pub struct LotRef {
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub codigo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quintales: Option<Decimal>,
}

/// The API sends either bare lot ids (`lotes`) or expanded objects (`lotes_info`)
#[derive(Deserialize)]
#[serde(untagged)]
enum LotRefRepr {
    Id(i64),
    Expanded {
        id: i64,
        #[serde(default)]
        codigo: Option<String>,
        #[serde(default, alias = "peso_quintales")]
        quintales: Option<Decimal>,
    },
}

impl From<LotRefRepr> for LotRef {
    fn from(repr: LotRefRepr) -> Self {
        match repr {
            LotRefRepr::Id(id) => LotRef {
                id,
                codigo: None,
                quintales: None,
            },
            LotRefRepr::Expanded {
                id,
                codigo,
                quintales,
            } => LotRef {
                id,
                codigo,
                quintales,
            },
        }
    }
}

impl Process {
    /// Current phase, `Pilado` when the field is absent
    pub fn current_phase(&self) -> Phase {
        self.fase_actual.unwrap_or(Phase::Pilado)
    }

    pub fn is_finished(&self) -> bool {
        self.current_phase().is_terminal() || self.estado == Some(ProcessStatus::Completado)
    }

    /// Contributing lots, expanded when the API sent `lotes_info`
    pub fn lots(&self) -> &[LotRef] {
        self.lotes_info.as_deref().unwrap_or(&self.lotes)
    }

    /// Declared total, falling back to the sum of contributing lots
    pub fn total_quintales(&self) -> Decimal {
        self.quintales_totales.unwrap_or_else(|| {
            self.lots()
                .iter()
                .filter_map(|l| l.quintales)
                .fold(Decimal::ZERO, |acc, q| acc.saturating_add(q))
        })
    }

    pub fn total_weight_kg(&self) -> Decimal {
        quintales_to_kg(self.total_quintales())
    }

    /// Derive the state machine aggregate from the persisted fields
    ///
    /// Fails when the remote state could not have been produced by strictly
    /// sequential finalization, e.g. after a manual backend edit.
    pub fn progress(&self) -> Result<PhaseProgress, ProcessStateError> {
        let current = self.current_phase();
        let completed = CompletedPhases::before(current);

        let expected = PhaseMachine::progress_percent(&completed);
        if self.progreso != Decimal::from(expected) {
            return Err(ProcessStateError::ProgressMismatch {
                phase: current,
                reported: self.progreso,
                expected,
            });
        }

        for phase in self.notas_tecnicas.phases() {
            if phase.position() > current.position() {
                return Err(ProcessStateError::RecordsAhead { phase, current });
            }
            if phase == current && !self.holds_open_records(phase) {
                return Err(ProcessStateError::UnadvancedPhase { phase });
            }
        }

        Ok(PhaseProgress::new(completed, self.notas_tecnicas.clone()))
    }

    /// Only density may hold records before it is completed, and only one pass
    fn holds_open_records(&self, phase: Phase) -> bool {
        phase == Phase::Densidad
            && !self
                .notas_tecnicas
                .has_density_pass(DensityPass::Second)
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_minimal_process() {
        let process: Process = serde_json::from_value(json!({
            "id": 7,
            "fase_actual": null,
            "notas_tecnicas": null,
            "progreso": 0
        }))
        .unwrap();
        assert_eq!(process.current_phase(), Phase::Pilado);
        assert!(process.lots().is_empty());
        assert!(process.progress().unwrap().completed.is_empty());
    }

    #[test]
    fn test_lots_accept_ids_or_objects() {
        let process: Process = serde_json::from_value(json!({
            "id": 1,
            "fase_actual": "COLOR",
            "progreso": 60,
            "lotes_info": [
                {"id": 3, "codigo": "L-003", "quintales": "10.5"},
                {"id": 4, "quintales": "4.5"}
            ]
        }))
        .unwrap();
        assert_eq!(process.lots().len(), 2);
        assert_eq!(process.total_quintales(), Decimal::from(15));
        assert_eq!(process.total_weight_kg(), Decimal::from(690));

        let bare: Process = serde_json::from_value(json!({
            "id": 2,
            "lotes": [11, 12],
            "quintales_totales": "2"
        }))
        .unwrap();
        assert_eq!(bare.lots()[1].id, 12);
        assert_eq!(bare.total_weight_kg(), Decimal::from(92));
    }

    #[test]
    fn test_expanded_lots_preferred_over_ids() {
        let process: Process = serde_json::from_value(json!({
            "id": 1,
            "fase_actual": "PILADO",
            "progreso": 0,
            "lotes": [3, 4],
            "lotes_info": [
                {"id": 3, "codigo": "L-003", "quintales": "6"},
                {"id": 4, "codigo": "L-004", "quintales": "4"}
            ]
        }))
        .unwrap();
        assert_eq!(process.lots().len(), 2);
        assert_eq!(process.lots()[0].codigo.as_deref(), Some("L-003"));
        assert_eq!(process.total_quintales(), Decimal::from(10));

        let null_info: Process = serde_json::from_value(json!({
            "id": 2,
            "lotes": [7],
            "lotes_info": null
        }))
        .unwrap();
        assert_eq!(null_info.lots()[0].id, 7);
    }

    #[test]
    fn test_progress_mismatch_is_rejected() {
        let process: Process = serde_json::from_value(json!({
            "id": 1,
            "fase_actual": "DENSIDAD",
            "progreso": 20
        }))
        .unwrap();
        assert!(matches!(
            process.progress(),
            Err(ProcessStateError::ProgressMismatch { expected: 40, .. })
        ));
    }

    #[test]
    fn test_records_ahead_are_rejected() {
        let process: Process = serde_json::from_value(json!({
            "id": 1,
            "fase_actual": "CLASIFICACION",
            "progreso": 20,
            "notas_tecnicas": {
                "COLOR": [{"tipo": "COLOR", "colores": [{"color": "verde", "peso": "10"}]}]
            }
        }))
        .unwrap();
        assert_eq!(
            process.progress(),
            Err(ProcessStateError::RecordsAhead {
                phase: Phase::Color,
                current: Phase::Clasificacion
            })
        );
    }

    #[test]
    fn test_open_density_pass_is_consistent() {
        let process: Process = serde_json::from_value(json!({
            "id": 1,
            "fase_actual": "DENSIDAD",
            "progreso": 40,
            "notas_tecnicas": {
                "DENSIDAD": [{"tipo": "DENSIDAD", "paso": "DENSITY_PASS_1", "peso": "100"}]
            }
        }))
        .unwrap();
        let progress = process.progress().unwrap();
        assert_eq!(progress.completed.len(), 2);
        assert!(progress.notes.has_density_pass(DensityPass::First));
    }

    #[test]
    fn test_finished_process() {
        let process: Process = serde_json::from_value(json!({
            "id": 1,
            "fase_actual": "COMPLETADO",
            "estado": "COMPLETADO",
            "progreso": 100
        }))
        .unwrap();
        assert!(process.is_finished());
        assert_eq!(process.progress().unwrap().completed.len(), 5);
    }
}
