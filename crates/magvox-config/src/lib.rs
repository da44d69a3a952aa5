//! Configuration for the Magvox service.
//!
//! Settings persist to disk as a RON file, can be overridden from the command
//! line via clap, and are validated before use. Missing fields fall back to
//! defaults so older files keep loading.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{
    CONFIG_FILE_NAME, Config, DebugConfig, HistoryConfig, PartitionConfig, ServerConfig,
    StorageConfig,
};
pub use error::ConfigError;
