//! Probe result model and in-process history store.
//!
//! Nothing here is persisted; all state is lost on restart.

mod history;
mod models;

pub use history::*;
pub use models::*;
