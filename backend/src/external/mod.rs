//! External API integrations

pub mod process_api;

pub use process_api::{ProcessApiClient, ProcessPatch};
