//! Per-phase measurement records and the technical-notes log

use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::phase::{CompletedPhases, DensityPass, Phase};
use crate::error::RecordValidationError;
use crate::types::sum_weights;

/// Color bucket name that counts toward descarte
pub const DEFECTIVE_COLOR: &str = "defectuoso";

/// True for the defective color bucket, in Spanish or English
pub fn is_defective_color(name: &str) -> bool {
    let name = name.trim();
    name.eq_ignore_ascii_case(DEFECTIVE_COLOR) || name.eq_ignore_ascii_case("defective")
}

/// Measurement data captured when a phase form is finalized
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tipo", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PhaseRecord {
    Pilado(HullingRecord),
    Clasificacion(ClassificationRecord),
    Densidad(DensityRecord),
    Color(ColorRecord),
    Empaque(PackagingRecord),
}

impl PhaseRecord {
    /// Phase this record belongs to; both density passes map to `Densidad`
    pub fn phase(&self) -> Phase {
        match self {
            PhaseRecord::Pilado(_) => Phase::Pilado,
            PhaseRecord::Clasificacion(_) => Phase::Clasificacion,
            PhaseRecord::Densidad(_) => Phase::Densidad,
            PhaseRecord::Color(_) => Phase::Color,
            PhaseRecord::Empaque(_) => Phase::Empaque,
        }
    }

    pub fn density_pass(&self) -> Option<DensityPass> {
        match self {
            PhaseRecord::Densidad(record) => Some(record.paso),
            _ => None,
        }
    }

    /// Validate field values at the boundary where the record is built
    pub fn validate(&self) -> Result<(), RecordValidationError> {
        crate::validation::validate_phase_record(self)
    }
}

/// PILADO: hulling and impurity removal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HullingRecord {
    pub peso_entrada: Decimal,
    pub peso_impurezas: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peso_salida: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observaciones: Option<String>,
}

impl HullingRecord {
    /// Output weight, derived from input minus impurities when not declared
    pub fn output_weight(&self) -> Decimal {
        self.peso_salida
            .unwrap_or(self.peso_entrada - self.peso_impurezas)
    }
}

/// CLASIFICACION: screen size separation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationRecord {
    /// Screen (mesh) size in 64ths of an inch
    pub malla: u8,
    #[serde(default)]
    pub peso_caracolillo: Decimal,
    #[serde(default)]
    pub peso_exportacion: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observaciones: Option<String>,
}

/// DENSIDAD: one pass over the density table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DensityRecord {
    pub paso: DensityPass,
    pub peso: Decimal,
    /// Bulk density in g/L, when measured
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub densidad: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observaciones: Option<String>,
}

/// COLOR: optical sorting into color buckets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorRecord {
    pub colores: Vec<ColorWeight>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observaciones: Option<String>,
}

impl ColorRecord {
    /// Weight per color name, merging repeated names
    pub fn weights(&self) -> BTreeMap<String, Decimal> {
        let mut weights = BTreeMap::new();
        for entry in &self.colores {
            let total = weights
                .entry(entry.color.trim().to_lowercase())
                .or_insert(Decimal::ZERO);
            *total = total.saturating_add(entry.peso);
        }
        weights
    }

    pub fn total_weight(&self) -> Decimal {
        sum_weights(self.colores.iter().map(|c| c.peso))
    }
}

/// Weight and share of one color bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorWeight {
    pub color: String,
    pub peso: Decimal,
    #[serde(default)]
    pub porcentaje: Decimal,
}

/// EMPAQUE: authoritative output figures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackagingRecord {
    pub cafe_caracolillo: Decimal,
    pub cafe_descarte: Decimal,
    pub cafe_exportacion: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observaciones_empaquetado: Option<String>,
}

impl PackagingRecord {
    pub fn total(&self) -> Decimal {
        sum_weights([
            self.cafe_caracolillo,
            self.cafe_descarte,
            self.cafe_exportacion,
        ])
    }
}

/// Append-only log of phase records keyed by phase name (`notas_tecnicas`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TechnicalNotes(BTreeMap<Phase, Vec<PhaseRecord>>);

impl TechnicalNotes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self, phase: Phase) -> &[PhaseRecord] {
        self.0.get(&phase).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_records(&self, phase: Phase) -> bool {
        !self.records(phase).is_empty()
    }

    /// Phases that hold at least one record
    pub fn phases(&self) -> impl Iterator<Item = Phase> + '_ {
        self.0
            .iter()
            .filter(|(_, records)| !records.is_empty())
            .map(|(phase, _)| *phase)
    }

    pub fn density_pass(&self, pass: DensityPass) -> Option<&DensityRecord> {
        self.records(Phase::Densidad).iter().find_map(|r| match r {
            PhaseRecord::Densidad(d) if d.paso == pass => Some(d),
            _ => None,
        })
    }

    pub fn has_density_pass(&self, pass: DensityPass) -> bool {
        self.density_pass(pass).is_some()
    }

    pub fn recorded_density_passes(&self) -> BTreeSet<DensityPass> {
        DensityPass::ALL
            .into_iter()
            .filter(|pass| self.has_density_pass(*pass))
            .collect()
    }

    /// Latest classification record
    pub fn classification(&self) -> Option<&ClassificationRecord> {
        self.records(Phase::Clasificacion).iter().rev().find_map(|r| match r {
            PhaseRecord::Clasificacion(c) => Some(c),
            _ => None,
        })
    }

    /// Latest color record
    pub fn color(&self) -> Option<&ColorRecord> {
        self.records(Phase::Color).iter().rev().find_map(|r| match r {
            PhaseRecord::Color(c) => Some(c),
            _ => None,
        })
    }

    /// Saved packaging figures, if any
    pub fn packaging(&self) -> Option<&PackagingRecord> {
        self.records(Phase::Empaque).iter().rev().find_map(|r| match r {
            PhaseRecord::Empaque(p) => Some(p),
            _ => None,
        })
    }

    pub(crate) fn with_record(&self, record: PhaseRecord) -> Self {
        let mut next = self.0.clone();
        next.entry(record.phase()).or_default().push(record);
        Self(next)
    }
}

/// Caller-owned aggregate the state machine works on
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseProgress {
    pub completed: CompletedPhases,
    pub notes: TechnicalNotes,
}

impl PhaseProgress {
    pub fn new(completed: CompletedPhases, notes: TechnicalNotes) -> Self {
        Self { completed, notes }
    }
}
