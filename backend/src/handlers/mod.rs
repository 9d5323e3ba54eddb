//! HTTP handlers

mod health;
mod process;

pub use health::*;
pub use process::*;
