//! Mode routing
//!
//! - Serve mode (long-running, scheduled updates)
//! - CLI mode (one-shot update, lookup, config generation)

pub mod cli;
pub mod serve;

pub use cli::{run_config_generate, run_lookup, run_update};
pub use serve::run_serve;
