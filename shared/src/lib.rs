//! Shared types and phase logic for the FAPECAFE process tracker
//!
//! This crate holds the pure core used by the backend service and, via WASM,
//! by the browser: the phase state machine, the packaging output estimator,
//! and the typed process and phase record models.

pub mod error;
pub mod estimator;
pub mod models;
pub mod phase_machine;
pub mod types;
pub mod validation;

pub use error::*;
pub use estimator::*;
pub use models::*;
pub use phase_machine::*;
pub use types::*;
pub use validation::*;
