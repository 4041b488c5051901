//! Reference server command handler
//!
//! Builds the sample-library registry, freezes it into a dispatcher, and
//! serves the invocation contract until Ctrl-C. The bound address is
//! printed on stdout so scripts (and integration tests binding port 0) can
//! discover the chosen port.

use crate::config::Config;
use crate::context::ContextStore;
use crate::dispatch::Dispatcher;
use crate::error::Result;
use crate::registry::FunctionRegistry;
use crate::rpc::RpcServer;
use crate::samples::register_samples;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Run the reference server until interrupted.
///
/// # Errors
///
/// Returns an error if the bind address is invalid, the port cannot be
/// bound, or the accept loop fails.
pub async fn run_server(config: &Config) -> Result<()> {
    let mut registry = FunctionRegistry::new();
    register_samples(&mut registry)?;
    tracing::info!(methods = registry.len(), "sample library registered");

    let dispatcher = Dispatcher::new(Arc::new(registry), Arc::new(ContextStore::new()));
    let server = RpcServer::new(Arc::new(dispatcher));

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| {
            crate::error::LockstepError::Config(format!(
                "invalid bind address {}:{}: {}",
                config.server.host, config.server.port, e
            ))
        })?;

    let bound = server.bind(addr).await?;
    println!("Lockstep server listening on {}", bound.local_addr());

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutting down server");
            signal_token.cancel();
        }
    });

    bound.serve(shutdown).await
}
