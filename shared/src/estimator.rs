//! Provisional packaging output estimate
//!
//! Before the packaging figures are entered, the three output buckets are
//! pre-filled from upstream phase weights with fixed heuristic ratios. The
//! estimate is never authoritative and is frozen once real figures exist.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{is_defective_color, DensityPass, PackagingRecord, TechnicalNotes};
use crate::types::{round_weight, sum_weights};

/// Share of the first density pass assumed to be caracolillo (0.25)
pub const CARACOLILLO_RATIO: Decimal = Decimal::from_parts(25, 0, 0, false, 2);

/// Share of the second density pass assumed to be descarte (0.20)
pub const DESCARTE_RATIO: Decimal = Decimal::from_parts(20, 0, 0, false, 2);

/// Classification weights that override the derived figures when positive
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassificationWeights {
    #[serde(default)]
    pub caracolillo: Decimal,
    #[serde(default)]
    pub exportacion: Decimal,
}

/// Upstream weights feeding the estimate; every field is optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EstimateInputs {
    #[serde(default)]
    pub density_pass1_weight: Option<Decimal>,
    #[serde(default)]
    pub density_pass2_weight: Option<Decimal>,
    #[serde(default)]
    pub color_weights: BTreeMap<String, Decimal>,
    #[serde(default)]
    pub classification: ClassificationWeights,
}

impl EstimateInputs {
    /// Collect inputs from the recorded phase data
    pub fn from_notes(notes: &TechnicalNotes) -> Self {
        Self {
            density_pass1_weight: notes.density_pass(DensityPass::First).map(|d| d.peso),
            density_pass2_weight: notes.density_pass(DensityPass::Second).map(|d| d.peso),
            color_weights: notes.color().map(|c| c.weights()).unwrap_or_default(),
            classification: notes
                .classification()
                .map(|c| ClassificationWeights {
                    caracolillo: c.peso_caracolillo,
                    exportacion: c.peso_exportacion,
                })
                .unwrap_or_default(),
        }
    }

    pub fn has_color(&self) -> bool {
        !self.color_weights.is_empty()
    }

    pub fn has_classification(&self) -> bool {
        self.classification.caracolillo > Decimal::ZERO
            || self.classification.exportacion > Decimal::ZERO
    }

    /// Weight of the defective color bucket, zero when absent
    pub fn defective_weight(&self) -> Decimal {
        sum_weights(
            self.color_weights
                .iter()
                .filter(|(name, _)| is_defective_color(name))
                .map(|(_, weight)| *weight),
        )
    }

    pub fn color_total(&self) -> Decimal {
        sum_weights(self.color_weights.values().copied())
    }
}

/// How much upstream data backed an estimate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimateConfidence {
    /// Both density passes and color sorting were available
    Full,
    Partial,
}

/// Derived, non-authoritative split of the final output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputEstimate {
    pub caracolillo: Decimal,
    pub descarte: Decimal,
    pub exportacion: Decimal,
    /// Human-readable audit text, not meant to be parsed
    pub rationale: String,
    pub confidence: EstimateConfidence,
    pub generated_at: DateTime<Utc>,
}

impl OutputEstimate {
    /// Packaging form pre-filled with the estimate, for the user to override
    pub fn to_packaging_record(&self) -> PackagingRecord {
        PackagingRecord {
            cafe_caracolillo: self.caracolillo,
            cafe_descarte: self.descarte,
            cafe_exportacion: self.exportacion,
            observaciones_empaquetado: Some(self.rationale.clone()),
        }
    }
}

/// Estimate the caracolillo / descarte / exportación split.
///
/// Each bucket is rounded to two decimals on its own; the rounded values are
/// not renormalized to the input total. Cannot fail: missing inputs count as
/// zero and yield a partial estimate, and sums beyond the `Decimal` range
/// saturate.
pub fn estimate(inputs: &EstimateInputs, generated_at: DateTime<Utc>) -> OutputEstimate {
    let pass1 = inputs.density_pass1_weight.unwrap_or(Decimal::ZERO);
    let pass2 = inputs.density_pass2_weight.unwrap_or(Decimal::ZERO);
    let classification = &inputs.classification;

    let caracolillo = if classification.caracolillo > Decimal::ZERO {
        classification.caracolillo
    } else {
        pass1.saturating_mul(CARACOLILLO_RATIO)
    };

    let descarte = if inputs.has_color() {
        pass2
            .saturating_mul(DESCARTE_RATIO)
            .saturating_add(inputs.defective_weight())
    } else {
        Decimal::ZERO
    };

    let exportacion = if classification.exportacion > Decimal::ZERO {
        classification.exportacion
    } else {
        inputs
            .color_total()
            .saturating_sub(caracolillo)
            .saturating_sub(descarte)
            .max(Decimal::ZERO)
    };

    let mut missing = Vec::new();
    if inputs.density_pass1_weight.is_none() {
        missing.push("densidad 1");
    }
    if inputs.density_pass2_weight.is_none() {
        missing.push("densidad 2");
    }
    if !inputs.has_color() {
        missing.push("color");
    }
    let confidence = if missing.is_empty() {
        EstimateConfidence::Full
    } else {
        EstimateConfidence::Partial
    };

    let label = match confidence {
        EstimateConfidence::Full => "Estimación automática".to_string(),
        EstimateConfidence::Partial => {
            format!("Estimación parcial (sin datos de {})", missing.join(", "))
        }
    };
    let rationale = format!(
        "{} {}: densidad 1 = {:.2} kg, densidad 2 = {:.2} kg, color = {:.2} kg, clasificación = {:.2} / {:.2} kg",
        label,
        generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
        round_weight(pass1),
        round_weight(pass2),
        round_weight(inputs.color_total()),
        round_weight(classification.caracolillo),
        round_weight(classification.exportacion),
    );

    OutputEstimate {
        caracolillo: round_weight(caracolillo),
        descarte: round_weight(descarte),
        exportacion: round_weight(exportacion),
        rationale,
        confidence,
        generated_at,
    }
}

/// Live estimate for a process, or `None` when it must not be produced.
///
/// Saved packaging figures freeze the estimate permanently. Without any of
/// density pass 1, classification or color data there is nothing to
/// estimate from.
pub fn provisional_estimate(
    notes: &TechnicalNotes,
    generated_at: DateTime<Utc>,
) -> Option<OutputEstimate> {
    if notes.packaging().is_some() {
        return None;
    }

    let inputs = EstimateInputs::from_notes(notes);
    if inputs.density_pass1_weight.is_none() && !inputs.has_classification() && !inputs.has_color()
    {
        return None;
    }

    Some(estimate(&inputs, generated_at))
}
