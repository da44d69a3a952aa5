//! Command-line argument parsing for the Magvox service.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// Magvox command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "magvox", about = "Voxel model editing service")]
pub struct CliArgs {
    /// Directory holding the projects.
    #[arg(long)]
    pub projects_dir: Option<PathBuf>,

    /// Server port.
    #[arg(long)]
    pub port: Option<u16>,

    /// Address to bind to.
    #[arg(long)]
    pub bind: Option<String>,

    /// Partition cube edge length in voxels (even).
    #[arg(long)]
    pub partition_edge: Option<i32>,

    /// Maximum number of undoable edits.
    #[arg(long)]
    pub history_depth: Option<usize>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(ref dir) = args.projects_dir {
            self.storage.projects_dir = Some(dir.clone());
        }
        if let Some(port) = args.port {
            self.server.port = port;
        }
        if let Some(ref addr) = args.bind {
            self.server.bind_address = addr.clone();
        }
        if let Some(edge) = args.partition_edge {
            self.partition.edge_length = edge;
        }
        if let Some(depth) = args.history_depth {
            self.history.max_depth = depth;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_override() {
        let mut config = Config::default();
        let args = CliArgs {
            port: Some(9100),
            partition_edge: Some(8),
            projects_dir: Some(PathBuf::from("/tmp/p")),
            ..CliArgs::default()
        };
        config.apply_cli_overrides(&args);
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.partition.edge_length, 8);
        assert_eq!(config.storage.projects_dir, Some(PathBuf::from("/tmp/p")));
        // Non-overridden fields retain defaults
        assert_eq!(config.server.bind_address, "127.0.0.1");
        assert_eq!(config.history.max_depth, 100);
    }

    #[test]
    fn test_cli_no_override() {
        let original = Config::default();
        let mut config = Config::default();
        config.apply_cli_overrides(&CliArgs::default());
        assert_eq!(config, original);
    }

    #[test]
    fn test_cli_parses_flags() {
        let args = CliArgs::parse_from([
            "magvox",
            "--port",
            "8123",
            "--history-depth",
            "20",
            "--log-level",
            "debug",
        ]);
        assert_eq!(args.port, Some(8123));
        assert_eq!(args.history_depth, Some(20));
        assert_eq!(args.log_level.as_deref(), Some("debug"));
        assert!(args.bind.is_none());
    }
}
