//! Command-line argument parsing.

use clap::{Parser, Subcommand};

/// Cumulus - bulk node orchestration against a compute provider
#[derive(Parser, Debug)]
#[command(name = "cumulus")]
#[command(about = "Cumulus - bulk node orchestration against a compute provider")]
#[command(version)]
pub struct Args {
    /// Path to configuration file (optional, defaults used if not found)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Log output format (pretty, json)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Maximum concurrent provider calls per bulk operation
    #[arg(long)]
    pub max_parallel: Option<usize>,

    /// Record nodes in a YAML file instead of memory
    #[arg(long)]
    pub node_store: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List the locations nodes can be created in
    Locations,

    /// Create nodes in a group
    Run {
        /// Group the nodes belong to
        #[arg(long)]
        group: String,

        /// Number of nodes
        #[arg(long, default_value_t = 1)]
        count: u32,

        /// Make the attempt with this ordinal fail (repeatable)
        #[arg(long = "fail-ordinal")]
        fail_ordinals: Vec<u32>,

        /// Destroy the group afterwards even if every node was created
        #[arg(long)]
        teardown: bool,
    },

    /// Create a VLAN network, run nodes on it, then tear everything down
    Experiment {
        /// Group the nodes belong to; also names the network
        #[arg(long)]
        group: String,

        /// Number of nodes
        #[arg(long, default_value_t = 1)]
        count: u32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run() {
        let args = Args::try_parse_from([
            "cumulus",
            "--log-format",
            "json",
            "run",
            "--group",
            "web",
            "--count",
            "3",
            "--fail-ordinal",
            "2",
            "--fail-ordinal",
            "3",
        ])
        .unwrap();

        assert_eq!(args.log_format.as_deref(), Some("json"));
        assert_eq!(
            args.command,
            Command::Run {
                group: "web".to_string(),
                count: 3,
                fail_ordinals: vec![2, 3],
                teardown: false,
            }
        );
    }

    #[test]
    fn test_group_is_required() {
        assert!(Args::try_parse_from(["cumulus", "experiment"]).is_err());
    }
}
