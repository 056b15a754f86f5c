//! Binary-side plumbing: settings resolution and the progress spinner.

pub(crate) mod config_runtime;
pub(crate) mod progress_manager;
