//! Command implementations shared by the CLI and integration tests.

mod config;
mod run;
mod types;

pub use config::config_output;
pub use run::{
    bitable_client, build_aggregator, collect_rows, publish, run, run_with_remote, SyncTarget,
};
pub use types::{RunOutput, SyncOutput};
