//! Validation utilities for phase records
//!
//! Records are checked once, where the caller builds them from form input,
//! before they reach the state machine.

use rust_decimal::Decimal;

use crate::error::RecordValidationError;
use crate::models::{
    ClassificationRecord, ColorRecord, DensityRecord, HullingRecord, PackagingRecord, PhaseRecord,
};

/// Smallest screen size used in classification
pub const MIN_MESH: u8 = 10;
/// Largest screen size used in classification
pub const MAX_MESH: u8 = 20;
/// Heaviest weight accepted for any single measurement, in kg
pub const MAX_WEIGHT_KG: u32 = 1_000_000;

// ============================================================================
// Generic Checks
// ============================================================================

/// Validate a weight is not negative and within a plausible range
pub fn validate_weight(weight: Decimal) -> Result<(), &'static str> {
    if weight < Decimal::ZERO {
        return Err("Weight cannot be negative");
    }
    if weight > Decimal::from(MAX_WEIGHT_KG) {
        return Err("Weight cannot exceed 1000000 kg");
    }
    Ok(())
}

/// Validate a percentage lies in 0..=100
pub fn validate_percentage(percent: Decimal) -> Result<(), &'static str> {
    if percent < Decimal::ZERO || percent > Decimal::from(100) {
        return Err("Percentage must be between 0 and 100");
    }
    Ok(())
}

/// Validate a screen size is one the classifier uses
pub fn validate_mesh(mesh: u8) -> Result<(), &'static str> {
    if !(MIN_MESH..=MAX_MESH).contains(&mesh) {
        return Err("Mesh size must be between 10 and 20");
    }
    Ok(())
}

fn check(field: &str, result: Result<(), &'static str>) -> Result<(), RecordValidationError> {
    result.map_err(|message| RecordValidationError::new(field, message))
}

// ============================================================================
// Phase Records
// ============================================================================

/// Validate a phase record according to its variant
pub fn validate_phase_record(record: &PhaseRecord) -> Result<(), RecordValidationError> {
    match record {
        PhaseRecord::Pilado(r) => validate_hulling(r),
        PhaseRecord::Clasificacion(r) => validate_classification(r),
        PhaseRecord::Densidad(r) => validate_density(r),
        PhaseRecord::Color(r) => validate_color(r),
        PhaseRecord::Empaque(r) => validate_packaging(r),
    }
}

fn validate_hulling(record: &HullingRecord) -> Result<(), RecordValidationError> {
    check("peso_entrada", validate_weight(record.peso_entrada))?;
    check("peso_impurezas", validate_weight(record.peso_impurezas))?;
    if record.peso_impurezas > record.peso_entrada {
        return Err(RecordValidationError::new(
            "peso_impurezas",
            "Impurity weight cannot exceed the input weight",
        ));
    }
    if let Some(salida) = record.peso_salida {
        check("peso_salida", validate_weight(salida))?;
        if salida > record.peso_entrada {
            return Err(RecordValidationError::new(
                "peso_salida",
                "Output weight cannot exceed the input weight",
            ));
        }
    }
    Ok(())
}

fn validate_classification(record: &ClassificationRecord) -> Result<(), RecordValidationError> {
    check("malla", validate_mesh(record.malla))?;
    check("peso_caracolillo", validate_weight(record.peso_caracolillo))?;
    check("peso_exportacion", validate_weight(record.peso_exportacion))
}

fn validate_density(record: &DensityRecord) -> Result<(), RecordValidationError> {
    check("peso", validate_weight(record.peso))?;
    if let Some(density) = record.densidad {
        if density <= Decimal::ZERO {
            return Err(RecordValidationError::new(
                "densidad",
                "Density must be positive",
            ));
        }
    }
    Ok(())
}

fn validate_color(record: &ColorRecord) -> Result<(), RecordValidationError> {
    if record.colores.is_empty() {
        return Err(RecordValidationError::new(
            "colores",
            "At least one color bucket is required",
        ));
    }

    for (i, entry) in record.colores.iter().enumerate() {
        if entry.color.trim().is_empty() {
            return Err(RecordValidationError::new(
                format!("colores[{}].color", i),
                "Color name is required",
            ));
        }
        check(&format!("colores[{}].peso", i), validate_weight(entry.peso))?;
        check(
            &format!("colores[{}].porcentaje", i),
            validate_percentage(entry.porcentaje),
        )?;
    }

    // percentages are typed by hand and rounded, allow a small overshoot
    let total: Decimal = record.colores.iter().map(|c| c.porcentaje).sum();
    if total > Decimal::from(100) + Decimal::new(1, 2) {
        return Err(RecordValidationError::new(
            "colores",
            "Color percentages cannot sum to more than 100",
        ));
    }
    Ok(())
}

fn validate_packaging(record: &PackagingRecord) -> Result<(), RecordValidationError> {
    check("cafe_caracolillo", validate_weight(record.cafe_caracolillo))?;
    check("cafe_descarte", validate_weight(record.cafe_descarte))?;
    check("cafe_exportacion", validate_weight(record.cafe_exportacion))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ColorWeight, DensityPass};
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn color(name: &str, peso: &str, porcentaje: &str) -> ColorWeight {
        ColorWeight {
            color: name.to_string(),
            peso: dec(peso),
            porcentaje: dec(porcentaje),
        }
    }

    // ========================================================================
    // Generic Check Tests
    // ========================================================================

    #[test]
    fn test_validate_weight() {
        assert!(validate_weight(dec("0")).is_ok());
        assert!(validate_weight(dec("12.5")).is_ok());
        assert!(validate_weight(dec("-0.01")).is_err());
        assert!(validate_weight(Decimal::from(MAX_WEIGHT_KG)).is_ok());
        assert!(validate_weight(dec("1000000.01")).is_err());
        assert!(validate_weight(Decimal::MAX).is_err());
    }

    #[test]
    fn test_validate_percentage() {
        assert!(validate_percentage(dec("0")).is_ok());
        assert!(validate_percentage(dec("100")).is_ok());
        assert!(validate_percentage(dec("100.5")).is_err());
        assert!(validate_percentage(dec("-1")).is_err());
    }

    #[test]
    fn test_validate_mesh() {
        assert!(validate_mesh(15).is_ok());
        assert!(validate_mesh(10).is_ok());
        assert!(validate_mesh(20).is_ok());
        assert!(validate_mesh(9).is_err());
        assert!(validate_mesh(21).is_err());
    }

    // ========================================================================
    // Record Tests
    // ========================================================================

    #[test]
    fn test_hulling_impurities_cannot_exceed_input() {
        let record = PhaseRecord::Pilado(HullingRecord {
            peso_entrada: dec("100"),
            peso_impurezas: dec("101"),
            peso_salida: None,
            observaciones: None,
        });
        let err = record.validate().unwrap_err();
        assert_eq!(err.field, "peso_impurezas");
    }

    #[test]
    fn test_classification_mesh_checked() {
        let record = PhaseRecord::Clasificacion(ClassificationRecord {
            malla: 25,
            peso_caracolillo: dec("30"),
            peso_exportacion: dec("40"),
            observaciones: None,
        });
        assert_eq!(record.validate().unwrap_err().field, "malla");
    }

    #[test]
    fn test_density_requires_positive_density() {
        let record = PhaseRecord::Densidad(DensityRecord {
            paso: DensityPass::First,
            peso: dec("100"),
            densidad: Some(Decimal::ZERO),
            observaciones: None,
        });
        assert_eq!(record.validate().unwrap_err().field, "densidad");
    }

    #[test]
    fn test_color_percentages() {
        let ok = PhaseRecord::Color(ColorRecord {
            colores: vec![color("verde", "66.67", "66.67"), color("defectuoso", "33.33", "33.34")],
            observaciones: None,
        });
        assert!(ok.validate().is_ok());

        let over = PhaseRecord::Color(ColorRecord {
            colores: vec![color("verde", "70", "70"), color("amarillo", "40", "40")],
            observaciones: None,
        });
        assert_eq!(over.validate().unwrap_err().field, "colores");

        let blank = PhaseRecord::Color(ColorRecord {
            colores: vec![color(" ", "1", "1")],
            observaciones: None,
        });
        assert_eq!(blank.validate().unwrap_err().field, "colores[0].color");
    }

    #[test]
    fn test_color_requires_entries() {
        let record = PhaseRecord::Color(ColorRecord {
            colores: vec![],
            observaciones: None,
        });
        assert!(record.validate().is_err());
    }

    #[test]
    fn test_packaging_rejects_negative_output() {
        let record = PhaseRecord::Empaque(PackagingRecord {
            cafe_caracolillo: dec("10"),
            cafe_descarte: dec("-1"),
            cafe_exportacion: dec("50"),
            observaciones_empaquetado: None,
        });
        assert_eq!(record.validate().unwrap_err().field, "cafe_descarte");
    }
}
