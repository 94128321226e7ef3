pub mod config;
pub mod engine;
pub mod entry;
pub mod exit;

pub use config::{EntryThresholds, ExitThresholds, SignalConfig};
pub use engine::SignalEngine;
pub use entry::entry_conditions_met;
pub use exit::{check_exit, ExitCheck};
