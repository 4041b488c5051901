//! Ad hoc diagnostic command handlers
//!
//! `methods` and `invoke` talk directly to any running server implementing
//! the invocation contract, independent of the orchestrator. Useful for
//! manual debugging of a server under development.

use crate::config::Config;
use crate::error::Result;
use crate::rpc::types::InvokeParams;
use crate::rpc::RpcClient;
use anyhow::bail;
use colored::Colorize;
use prettytable::{row, Table};
use std::time::{Duration, Instant};
use url::Url;

fn client_for(config: &Config, url: Url) -> RpcClient {
    RpcClient::new(
        url.host_str().unwrap_or("server").to_string(),
        url,
        Duration::from_secs(config.harness.request_timeout_seconds),
    )
}

/// List methods registered on a server.
///
/// # Errors
///
/// Returns an error if the server is unreachable or the listing fails.
pub async fn list_methods(
    config: &Config,
    url: Url,
    prefix: Option<String>,
    json: bool,
) -> Result<()> {
    let client = client_for(config, url);
    let methods = match client.list_methods(prefix).await {
        Ok(methods) => methods,
        Err(failure) => bail!("methods/list against {} failed: {}", client.endpoint(), failure),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&methods)?);
        return Ok(());
    }

    if methods.is_empty() {
        println!("No methods registered.");
        return Ok(());
    }

    let mut table = Table::new();
    table.add_row(row!["Name", "Parameters", "Returns", "Stateful", "Description"]);
    for method in &methods {
        let parameters: Vec<String> = method
            .parameters
            .iter()
            .map(|p| format!("{}: {}", p.name, p.ty))
            .collect();
        table.add_row(row![
            method.name,
            parameters.join(", "),
            method.returns.to_string(),
            if method.stateful { "yes" } else { "no" },
            method.description
        ]);
    }
    table.printstd();
    Ok(())
}

/// Invoke one method and print the outcome.
///
/// # Errors
///
/// Returns an error for an undecodable argument string, an unreachable
/// server, or a structured invocation failure (so the process exits
/// non-zero on failed invocations).
pub async fn invoke_method(
    config: &Config,
    url: Url,
    method: String,
    args: &str,
    context_id: Option<String>,
) -> Result<()> {
    let arguments: serde_json::Map<String, serde_json::Value> = serde_json::from_str(args)
        .map_err(|e| {
            crate::error::LockstepError::Config(format!("--args must be a JSON object: {}", e))
        })?;

    let client = client_for(config, url);
    let params = InvokeParams {
        method,
        arguments,
        context_id,
    };

    let started = Instant::now();
    match client.invoke(&params).await {
        Ok(result) => {
            let elapsed_us = started.elapsed().as_micros();
            println!("{}", serde_json::to_string_pretty(&result.value)?);
            println!(
                "{}",
                format!(
                    "⏱  {}μs wall, {}μs on server ({})",
                    elapsed_us, result.metadata.execution_time_us, result.metadata.runtime
                )
                .dimmed()
            );
            Ok(())
        }
        Err(failure) => bail!("invocation of '{}' failed: {}", params.method, failure),
    }
}
