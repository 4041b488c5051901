//! HTTP JSON-RPC client for the Lockstep invocation contract
//!
//! One [`RpcClient`] per target server. Every contract operation is an HTTP
//! POST of a single JSON-RPC 2.0 request to the server's `/rpc` endpoint;
//! the response body is the matching JSON-RPC response object.
//!
//! # Failure classification
//!
//! The client keeps the server-side failure taxonomy intact on the caller
//! side:
//!
//! - structured invocation failures from the server surface as
//!   [`CallFailure::Invocation`] with their [`FailureKind`] preserved;
//! - a call that exceeds the configured bound is [`CallFailure::Timeout`];
//!   the in-flight request future is dropped, aborting the call without
//!   blocking anything else;
//! - transport-level problems (refused connection, reset, DNS) are
//!   [`CallFailure::Connection`] and are never conflated with an
//!   application-level execution failure.

use crate::dispatch::InvocationFailure;
use crate::error::LockstepError;
use crate::rpc::types::{
    DestroyContextParams, DestroyContextResult, InspectContextParams, InspectContextResult,
    InvokeParams, InvokeResult, JsonRpcRequest, JsonRpcResponse, ListMethodsParams,
    ListMethodsResult, MethodDescriptor, SeedContextParams, SeedContextResult,
    METHOD_CONTEXTS_DESTROY, METHOD_CONTEXTS_INSPECT, METHOD_CONTEXTS_SEED, METHOD_METHODS_INVOKE,
    METHOD_METHODS_LIST, METHOD_PING,
};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Default per-call timeout when the caller does not configure one.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Caller-side classification of a failed remote call.
#[derive(Debug, Clone, Error)]
pub enum CallFailure {
    /// The server returned a structured invocation failure.
    #[error("{0}")]
    Invocation(InvocationFailure),

    /// No response within the configured bound; the call was abandoned.
    #[error("timed out after {elapsed_ms}ms")]
    Timeout {
        /// Milliseconds waited before giving up.
        elapsed_ms: u64,
    },

    /// The server could not be reached or the transport failed mid-call.
    #[error("connection failure: {0}")]
    Connection(String),

    /// The response violated the JSON-RPC contract (bad envelope, id
    /// mismatch, undecodable result) or carried a non-invocation error.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl From<CallFailure> for LockstepError {
    fn from(failure: CallFailure) -> Self {
        match failure {
            CallFailure::Invocation(f) => LockstepError::ExecutionFailure(f.message),
            CallFailure::Timeout { elapsed_ms } => LockstepError::Timeout {
                server: String::new(),
                elapsed_ms,
            },
            CallFailure::Connection(msg) => LockstepError::Connection(msg),
            CallFailure::Protocol(msg) => LockstepError::Rpc {
                code: 0,
                message: msg,
            },
        }
    }
}

/// JSON-RPC client bound to one server endpoint.
#[derive(Debug)]
pub struct RpcClient {
    http: reqwest::Client,
    endpoint: Url,
    label: String,
    next_id: AtomicU64,
    timeout: Duration,
}

impl RpcClient {
    /// Create a client for the server at `endpoint` (the `/rpc` URL).
    ///
    /// `label` is the logical server name used in logs and reports (e.g.
    /// `"python"`, `"rust"`). The timeout bounds every individual call.
    pub fn new(label: impl Into<String>, endpoint: Url, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .build()
            // Default reqwest client construction only fails if TLS
            // initialisation fails, which is fatal at startup anyway.
            .expect("failed to build reqwest client");
        Self {
            http,
            endpoint,
            label: label.into(),
            next_id: AtomicU64::new(1),
            timeout,
        }
    }

    /// Build a client from a host/port pair, targeting `http://host:port/rpc`.
    ///
    /// # Errors
    ///
    /// Returns [`LockstepError::Config`] if the pair does not form a valid
    /// URL.
    pub fn from_host_port(
        label: impl Into<String>,
        host: &str,
        port: u16,
        timeout: Duration,
    ) -> std::result::Result<Self, LockstepError> {
        let url = Url::parse(&format!("http://{}:{}/rpc", host, port))
            .map_err(|e| LockstepError::Config(format!("invalid server address: {}", e)))?;
        Ok(Self::new(label, url, timeout))
    }

    /// The logical server label this client targets.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The endpoint URL this client targets.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Issue one JSON-RPC request and decode the typed result.
    async fn request<P, R>(
        &self,
        method: &str,
        params: Option<P>,
    ) -> std::result::Result<R, CallFailure>
    where
        P: serde::Serialize,
        R: serde::de::DeserializeOwned,
    {
        let params = match params {
            None => None,
            Some(params) => Some(serde_json::to_value(params).map_err(|e| {
                CallFailure::Protocol(format!("failed to serialize params: {}", e))
            })?),
        };
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = JsonRpcRequest::new(id, method, params);
        let body = serde_json::to_string(&request)
            .map_err(|e| CallFailure::Protocol(format!("failed to serialize request: {}", e)))?;

        let started = std::time::Instant::now();
        let send = async {
            let response = self
                .http
                .post(self.endpoint.as_str())
                .header("Content-Type", "application/json")
                .body(body)
                .send()
                .await?;
            response.text().await
        };

        let text = match tokio::time::timeout(self.timeout, send).await {
            Err(_) => {
                tracing::warn!(server = %self.label, method, "call timed out");
                return Err(CallFailure::Timeout {
                    elapsed_ms: started.elapsed().as_millis() as u64,
                });
            }
            Ok(Err(e)) if e.is_timeout() => {
                return Err(CallFailure::Timeout {
                    elapsed_ms: started.elapsed().as_millis() as u64,
                });
            }
            Ok(Err(e)) => {
                tracing::warn!(server = %self.label, method, error = %e, "transport failure");
                return Err(CallFailure::Connection(e.to_string()));
            }
            Ok(Ok(text)) => text,
        };

        let response: JsonRpcResponse = serde_json::from_str(&text)
            .map_err(|e| CallFailure::Protocol(format!("undecodable response: {}", e)))?;

        if response.id != Some(Value::from(id)) {
            return Err(CallFailure::Protocol(format!(
                "response id {:?} does not match request id {}",
                response.id, id
            )));
        }

        if let Some(error) = response.error {
            return Err(match error.failure_kind() {
                Some(kind) => CallFailure::Invocation(InvocationFailure::new(kind, error.message)),
                None => CallFailure::Protocol(error.to_string()),
            });
        }

        let result = response
            .result
            .ok_or_else(|| CallFailure::Protocol("response carries neither result nor error".to_string()))?;
        serde_json::from_value(result)
            .map_err(|e| CallFailure::Protocol(format!("undecodable result: {}", e)))
    }

    /// Reachability check.
    pub async fn ping(&self) -> std::result::Result<(), CallFailure> {
        let _: Value = self.request(METHOD_PING, None::<Value>).await?;
        Ok(())
    }

    /// List registered methods, optionally filtered by name prefix.
    pub async fn list_methods(
        &self,
        prefix: Option<String>,
    ) -> std::result::Result<Vec<MethodDescriptor>, CallFailure> {
        let params = ListMethodsParams { prefix };
        let result: ListMethodsResult =
            self.request(METHOD_METHODS_LIST, Some(params)).await?;
        Ok(result.methods)
    }

    /// Invoke a registered method.
    pub async fn invoke(
        &self,
        params: &InvokeParams,
    ) -> std::result::Result<InvokeResult, CallFailure> {
        self.request(METHOD_METHODS_INVOKE, Some(params)).await
    }

    /// Seed initial state for a context id; `Ok(false)` when already seen.
    pub async fn seed_context(
        &self,
        context_id: &str,
        state: Value,
    ) -> std::result::Result<bool, CallFailure> {
        let params = SeedContextParams {
            context_id: context_id.to_string(),
            state,
        };
        let result: SeedContextResult =
            self.request(METHOD_CONTEXTS_SEED, Some(params)).await?;
        Ok(result.seeded)
    }

    /// Snapshot the current state of a context id.
    pub async fn inspect_context(
        &self,
        context_id: &str,
    ) -> std::result::Result<Value, CallFailure> {
        let params = InspectContextParams {
            context_id: context_id.to_string(),
        };
        let result: InspectContextResult =
            self.request(METHOD_CONTEXTS_INSPECT, Some(params)).await?;
        Ok(result.state)
    }

    /// Discard a context id; `Ok(false)` when the id had no state.
    pub async fn destroy_context(
        &self,
        context_id: &str,
    ) -> std::result::Result<bool, CallFailure> {
        let params = DestroyContextParams {
            context_id: context_id.to_string(),
        };
        let result: DestroyContextResult =
            self.request(METHOD_CONTEXTS_DESTROY, Some(params)).await?;
        Ok(result.destroyed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_host_port_builds_rpc_endpoint() {
        let client =
            RpcClient::from_host_port("python", "localhost", 50051, DEFAULT_CALL_TIMEOUT).unwrap();
        assert_eq!(client.endpoint().as_str(), "http://localhost:50051/rpc");
        assert_eq!(client.label(), "python");
    }

    #[test]
    fn test_from_host_port_rejects_garbage() {
        let err = RpcClient::from_host_port("x", "not a host", 1, DEFAULT_CALL_TIMEOUT);
        assert!(err.is_err());
    }

    #[test]
    fn test_call_failure_display() {
        let f = CallFailure::Timeout { elapsed_ms: 1500 };
        assert_eq!(f.to_string(), "timed out after 1500ms");

        let f = CallFailure::Connection("refused".to_string());
        assert_eq!(f.to_string(), "connection failure: refused");
    }
}
