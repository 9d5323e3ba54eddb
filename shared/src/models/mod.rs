//! Domain models for the process phase engine

mod phase;
mod process;
mod record;

pub use phase::*;
pub use process::*;
pub use record::*;
