//! Business logic services for the process phase service

pub mod process_workflow;

pub use process_workflow::{InFlightSubmissions, ProcessView, ProcessWorkflowService};
