//! Lockstep - behavioral-equivalence test harness CLI
//!
//! Main entry point for the Lockstep binary.

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use lockstep::cli::{Cli, Commands};
use lockstep::commands;
use lockstep::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Initialize tracing
    init_tracing(cli.verbose);

    // Load configuration
    let mut config = Config::load(cli.config.as_deref())?;

    // Execute command
    match cli.command {
        Commands::Run {
            suite,
            json,
            timeout_secs,
            tolerance,
            no_validate,
        } => {
            tracing::info!(suite = %suite.display(), "starting orchestration run");
            if let Some(secs) = timeout_secs {
                config.harness.request_timeout_seconds = secs;
            }
            if let Some(tolerance) = tolerance {
                config.harness.float_tolerance = tolerance;
            }
            if no_validate {
                config.harness.validate_methods = false;
            }
            config.validate()?;

            let all_passed = commands::run::run_suite(&config, &suite, json).await?;
            if !all_passed {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Serve { host, port } => {
            tracing::info!("starting reference server");
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            commands::serve::run_server(&config).await
        }
        Commands::Methods { url, prefix, json } => {
            tracing::info!(%url, "listing methods");
            commands::inspect::list_methods(&config, url, prefix, json).await
        }
        Commands::Invoke {
            url,
            method,
            args,
            context_id,
        } => {
            tracing::info!(%url, %method, "invoking method");
            commands::inspect::invoke_method(&config, url, method, &args, context_id).await
        }
    }
}

/// Initialize tracing subscriber with environment filter
fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "lockstep=debug" } else { "lockstep=info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
