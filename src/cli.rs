//! Command-line interface definition for Lockstep
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for suite orchestration, the reference server, and
//! ad hoc diagnostics against any conforming server.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use url::Url;

/// Lockstep - behavioral-equivalence test harness
///
/// Drive declarative test suites against one or more servers implementing
/// the Lockstep invocation contract and compare their observable behavior.
#[derive(Parser, Debug, Clone)]
#[command(name = "lockstep")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for Lockstep
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run a test suite against its declared servers
    Run {
        /// Path to the suite file (YAML format)
        #[arg(short, long)]
        suite: PathBuf,

        /// Emit the report as JSON instead of the colored transcript
        #[arg(long)]
        json: bool,

        /// Override the per-call timeout (seconds)
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// Override the float comparison tolerance
        #[arg(long)]
        tolerance: Option<f64>,

        /// Skip the preflight method-existence check
        #[arg(long)]
        no_validate: bool,
    },

    /// Run the reference server with the sample function library
    Serve {
        /// Bind host (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Bind port; 0 picks an ephemeral port (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// List the methods registered on a running server
    Methods {
        /// Server endpoint URL (e.g. http://localhost:50051/rpc)
        #[arg(short, long)]
        url: Url,

        /// Only list methods whose name starts with this prefix
        #[arg(long)]
        prefix: Option<String>,

        /// Emit descriptors as JSON
        #[arg(long)]
        json: bool,
    },

    /// Invoke a single method on a running server
    Invoke {
        /// Server endpoint URL (e.g. http://localhost:50051/rpc)
        #[arg(short, long)]
        url: Url,

        /// Method name to invoke
        #[arg(short, long)]
        method: String,

        /// Argument mapping as a JSON object
        #[arg(short, long, default_value = "{}")]
        args: String,

        /// Context identifier for stateful methods
        #[arg(long)]
        context_id: Option<String>,
    },
}

impl Cli {
    /// Parse command line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run() {
        let cli = Cli::try_parse_from(["lockstep", "run", "--suite", "math.yaml", "--json"])
            .unwrap();
        match cli.command {
            Commands::Run { suite, json, .. } => {
                assert_eq!(suite, PathBuf::from("math.yaml"));
                assert!(json);
            }
            _ => panic!("expected run command"),
        }
    }

    #[test]
    fn test_parse_serve_with_port() {
        let cli = Cli::try_parse_from(["lockstep", "serve", "--port", "0"]).unwrap();
        match cli.command {
            Commands::Serve { port, host } => {
                assert_eq!(port, Some(0));
                assert!(host.is_none());
            }
            _ => panic!("expected serve command"),
        }
    }

    #[test]
    fn test_parse_invoke_defaults_empty_args() {
        let cli = Cli::try_parse_from([
            "lockstep",
            "invoke",
            "--url",
            "http://localhost:50051/rpc",
            "--method",
            "add",
        ])
        .unwrap();
        match cli.command {
            Commands::Invoke { args, context_id, .. } => {
                assert_eq!(args, "{}");
                assert!(context_id.is_none());
            }
            _ => panic!("expected invoke command"),
        }
    }

    #[test]
    fn test_invoke_rejects_invalid_url() {
        let parsed = Cli::try_parse_from([
            "lockstep",
            "invoke",
            "--url",
            "not a url",
            "--method",
            "add",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_run_requires_suite() {
        assert!(Cli::try_parse_from(["lockstep", "run"]).is_err());
    }
}
