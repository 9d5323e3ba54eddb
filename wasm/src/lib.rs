//! WebAssembly module for the FAPECAFE process phase UI
//!
//! Runs the phase rules and the packaging estimate in the browser so tabs can
//! be locked and the packaging form pre-filled without a round trip. Inputs
//! and outputs are JSON strings; errors come back as `"<CODE>: <message>"`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use wasm_bindgen::prelude::*;

use shared::{
    estimate, CompletedPhases, EstimateInputs, Phase, PhaseError, PhaseMachine, PhaseProgress,
    PhaseRecord, SubStepOutcome,
};

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    // Set up panic hook for better error messages in browser console
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Phase the process is currently in
#[wasm_bindgen]
pub fn current_phase(completed_json: &str) -> Result<String, JsValue> {
    to_js(current_phase_impl(completed_json))
}

/// Whether the phase tab may be opened
#[wasm_bindgen]
pub fn can_enter(phase: &str, completed_json: &str) -> Result<bool, JsValue> {
    to_js(can_enter_impl(phase, completed_json))
}

/// Request navigation to a phase; the error carries the denial reason
#[wasm_bindgen]
pub fn request_transition(phase: &str, completed_json: &str) -> Result<String, JsValue> {
    to_js(request_transition_impl(phase, completed_json))
}

/// Complete a phase with its record, returning the tentative progress
#[wasm_bindgen]
pub fn finalize_phase(
    phase: &str,
    record_json: &str,
    progress_json: &str,
) -> Result<String, JsValue> {
    to_js(finalize_phase_impl(phase, record_json, progress_json))
}

/// Record one density pass, returning `{progress, outcome}`
#[wasm_bindgen]
pub fn record_density_pass(record_json: &str, progress_json: &str) -> Result<String, JsValue> {
    to_js(record_density_pass_impl(record_json, progress_json))
}

/// Estimate the packaging split from upstream weights
#[wasm_bindgen]
pub fn estimate_output(inputs_json: &str, generated_at_iso: &str) -> Result<String, JsValue> {
    to_js(estimate_output_impl(inputs_json, generated_at_iso))
}

/// Convert quintales to kilograms (46 kg per quintal)
#[wasm_bindgen]
pub fn quintales_to_kg(quintales: f64) -> f64 {
    let quintales = Decimal::try_from(quintales).unwrap_or(Decimal::ZERO);
    shared::quintales_to_kg(quintales)
        .to_string()
        .parse()
        .unwrap_or(0.0)
}

/// Check a phase record before it is submitted
#[wasm_bindgen]
pub fn validate_phase_record(record_json: &str) -> Result<(), JsValue> {
    to_js(validate_phase_record_impl(record_json))
}

// ============================================================================
// JSON-level implementations
// ============================================================================

#[derive(Serialize)]
struct DensityPassResult {
    progress: PhaseProgress,
    outcome: SubStepOutcome,
}

fn to_js<T>(result: Result<T, String>) -> Result<T, JsValue> {
    result.map_err(|e| JsValue::from_str(&e))
}

fn parse<T: serde::de::DeserializeOwned>(json: &str, what: &str) -> Result<T, String> {
    serde_json::from_str(json).map_err(|e| format!("INVALID_INPUT: invalid {} JSON: {}", what, e))
}

fn parse_phase(phase: &str) -> Result<Phase, String> {
    phase
        .parse()
        .map_err(|e| format!("UNKNOWN_PHASE: {}", e))
}

fn phase_error(err: PhaseError) -> String {
    format!("{}: {}", err.code(), err)
}

fn to_json<T: Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string(value).map_err(|e| format!("INTERNAL: {}", e))
}

fn current_phase_impl(completed_json: &str) -> Result<String, String> {
    let completed: CompletedPhases = parse(completed_json, "completed phases")?;
    Ok(PhaseMachine::current_phase(&completed).to_string())
}

fn can_enter_impl(phase: &str, completed_json: &str) -> Result<bool, String> {
    let phase = parse_phase(phase)?;
    let completed: CompletedPhases = parse(completed_json, "completed phases")?;
    Ok(PhaseMachine::can_enter(phase, &completed))
}

fn request_transition_impl(phase: &str, completed_json: &str) -> Result<String, String> {
    let phase = parse_phase(phase)?;
    let completed: CompletedPhases = parse(completed_json, "completed phases")?;
    let transition = PhaseMachine::request_transition(phase, &completed).map_err(phase_error)?;
    to_json(&transition)
}

fn finalize_phase_impl(
    phase: &str,
    record_json: &str,
    progress_json: &str,
) -> Result<String, String> {
    let phase = parse_phase(phase)?;
    let record: PhaseRecord = parse(record_json, "record")?;
    let progress: PhaseProgress = parse(progress_json, "progress")?;
    let next = PhaseMachine::finalize_phase(phase, record, &progress).map_err(phase_error)?;
    to_json(&next)
}

fn record_density_pass_impl(record_json: &str, progress_json: &str) -> Result<String, String> {
    let record: PhaseRecord = parse(record_json, "record")?;
    let progress: PhaseProgress = parse(progress_json, "progress")?;
    let (progress, outcome) =
        PhaseMachine::record_density_pass(record, &progress).map_err(phase_error)?;
    to_json(&DensityPassResult { progress, outcome })
}

fn estimate_output_impl(inputs_json: &str, generated_at_iso: &str) -> Result<String, String> {
    let inputs: EstimateInputs = parse(inputs_json, "estimate inputs")?;
    let generated_at = DateTime::parse_from_rfc3339(generated_at_iso)
        .map_err(|e| format!("INVALID_INPUT: invalid timestamp: {}", e))?
        .with_timezone(&Utc);
    to_json(&estimate(&inputs, generated_at))
}

fn validate_phase_record_impl(record_json: &str) -> Result<(), String> {
    let record: PhaseRecord = parse(record_json, "record")?;
    record
        .validate()
        .map_err(|e| format!("VALIDATION_ERROR: {}: {}", e.field, e.message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn empty_progress() -> String {
        json!({"completed": [], "notes": {}}).to_string()
    }

    #[test]
    fn test_current_phase_from_completed() {
        assert_eq!(current_phase_impl("[]").unwrap(), "PILADO");
        assert_eq!(
            current_phase_impl(r#"["PILADO","CLASIFICACION"]"#).unwrap(),
            "DENSIDAD"
        );
    }

    #[test]
    fn test_terminal_phase_in_completed_is_ignored() {
        let all = r#"["PILADO","CLASIFICACION","DENSIDAD","COLOR","EMPAQUE","FINALIZADO"]"#;
        assert_eq!(current_phase_impl(all).unwrap(), "FINALIZADO");
        assert_eq!(current_phase_impl(r#"["FINALIZADO"]"#).unwrap(), "PILADO");

        let progress = json!({"completed": ["FINALIZADO"], "notes": {}});
        let record = json!({"tipo": "PILADO", "peso_entrada": "460", "peso_impurezas": "5"});
        let next = finalize_phase_impl("PILADO", &record.to_string(), &progress.to_string()).unwrap();
        let next: Value = serde_json::from_str(&next).unwrap();
        assert_eq!(next["completed"], json!(["PILADO"]));
    }

    #[test]
    fn test_color_locked_after_hulling() {
        assert!(!can_enter_impl("COLOR", r#"["PILADO"]"#).unwrap());
        assert!(can_enter_impl("CLASIFICACION", r#"["PILADO"]"#).unwrap());

        let err = request_transition_impl("COLOR", r#"["PILADO"]"#).unwrap_err();
        assert!(err.starts_with("PHASE_DENIED"));
        assert!(err.contains("must complete CLASIFICACION first"));
    }

    #[test]
    fn test_unknown_phase_rejected() {
        let err = can_enter_impl("TOSTADO", "[]").unwrap_err();
        assert!(err.starts_with("UNKNOWN_PHASE"));
    }

    #[test]
    fn test_finalize_hulling() {
        let record = json!({"tipo": "PILADO", "peso_entrada": "460", "peso_impurezas": "5"});
        let next = finalize_phase_impl("PILADO", &record.to_string(), &empty_progress()).unwrap();
        let next: Value = serde_json::from_str(&next).unwrap();
        assert_eq!(next["completed"], json!(["PILADO"]));
        assert_eq!(next["notes"]["PILADO"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_density_first_pass_outcome() {
        let progress = json!({"completed": ["PILADO", "CLASIFICACION"], "notes": {}});
        let record = json!({"tipo": "DENSIDAD", "paso": "DENSITY_PASS_1", "peso": "300"});
        let result =
            record_density_pass_impl(&record.to_string(), &progress.to_string()).unwrap();
        let result: Value = serde_json::from_str(&result).unwrap();
        assert_eq!(result["outcome"]["resultado"], "recorded");
        assert_eq!(result["outcome"]["remaining"], "DENSITY_PASS_2");
    }

    #[test]
    fn test_estimate_output_reference_case() {
        let inputs = json!({
            "density_pass1_weight": "100",
            "density_pass2_weight": "50",
            "color_weights": {"verde": "80", "defectuoso": "10"}
        });
        let result = estimate_output_impl(&inputs.to_string(), "2024-05-01T10:00:00Z").unwrap();
        let result: Value = serde_json::from_str(&result).unwrap();
        assert_eq!(result["confidence"], "full");
        assert!(result["rationale"]
            .as_str()
            .unwrap()
            .contains("2024-05-01 10:00:00 UTC"));
    }

    #[test]
    fn test_estimate_rejects_bad_timestamp() {
        let err = estimate_output_impl("{}", "yesterday").unwrap_err();
        assert!(err.starts_with("INVALID_INPUT"));
    }

    #[test]
    fn test_quintales_to_kg() {
        assert!((quintales_to_kg(10.0) - 460.0).abs() < 0.001);
    }

    #[test]
    fn test_validate_record() {
        let bad = json!({"tipo": "CLASIFICACION", "malla": 5, "peso_caracolillo": "1", "peso_exportacion": "1"});
        let err = validate_phase_record_impl(&bad.to_string()).unwrap_err();
        assert!(err.contains("malla"));

        let good = json!({"tipo": "CLASIFICACION", "malla": 15, "peso_caracolillo": "1", "peso_exportacion": "1"});
        assert!(validate_phase_record_impl(&good.to_string()).is_ok());
    }
}
