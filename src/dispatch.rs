//! Request dispatch engine for Lockstep servers
//!
//! One [`Dispatcher`] per server process. Each incoming invocation runs the
//! same state machine, terminal in success or a structured failure:
//!
//! 1. Resolve the method name in the registry (`unknown_method` on miss).
//! 2. Validate the argument mapping against the declared parameter list
//!    (`missing_argument` / `type_mismatch`).
//! 3. For stateful methods with a context id, lock that context and pass a
//!    by-value snapshot of its state into the handler.
//! 4. Execute the handler; any error becomes `execution_failure`.
//! 5. On success, persist the handler's updated state before releasing the
//!    context lock.
//!
//! The per-context lock is held across steps 3–5, so concurrent requests
//! against the same context id are serialized while requests against
//! different ids (and all stateless requests) proceed in parallel.

use crate::context::ContextStore;
use crate::registry::FunctionRegistry;
use crate::rpc::types::{
    ExecutionMetadata, FailureKind, InvokeParams, InvokeResult, JsonRpcError, TypeTag,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;

/// A structured invocation failure: machine-readable kind plus message.
///
/// This is what travels back over the wire as a JSON-RPC error object; it is
/// never allowed to escape as a crash of the serving process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationFailure {
    /// Failure classification.
    pub kind: FailureKind,
    /// Human-readable description.
    pub message: String,
}

impl std::fmt::Display for InvocationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl InvocationFailure {
    /// Build a failure of the given kind.
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Convert into the wire-level JSON-RPC error object.
    pub fn to_rpc_error(&self) -> JsonRpcError {
        JsonRpcError {
            code: self.kind.code(),
            message: self.message.clone(),
            data: Some(json!({"kind": self.kind})),
        }
    }
}

/// Per-server dispatch engine.
///
/// Owns shared handles to the frozen [`FunctionRegistry`] and the process's
/// [`ContextStore`]; both are constructed at startup and passed in; the
/// dispatcher never reaches for global state.
pub struct Dispatcher {
    registry: Arc<FunctionRegistry>,
    contexts: Arc<ContextStore>,
    /// Runtime label reported in execution metadata (e.g. `"rust"`).
    runtime: String,
}

impl Dispatcher {
    /// Create a dispatcher over a frozen registry and a context store.
    pub fn new(registry: Arc<FunctionRegistry>, contexts: Arc<ContextStore>) -> Self {
        Self {
            registry,
            contexts,
            runtime: "rust".to_string(),
        }
    }

    /// Override the runtime label reported in execution metadata.
    pub fn with_runtime(mut self, runtime: impl Into<String>) -> Self {
        self.runtime = runtime.into();
        self
    }

    /// The registry this dispatcher resolves against.
    pub fn registry(&self) -> &Arc<FunctionRegistry> {
        &self.registry
    }

    /// The context store this dispatcher reads and writes.
    pub fn contexts(&self) -> &Arc<ContextStore> {
        &self.contexts
    }

    /// Run one invocation through the dispatch state machine.
    pub async fn dispatch(
        &self,
        params: &InvokeParams,
    ) -> std::result::Result<InvokeResult, InvocationFailure> {
        let started = Instant::now();

        // 1. Resolve.
        let method = self.registry.get(&params.method).ok_or_else(|| {
            InvocationFailure::new(
                FailureKind::UnknownMethod,
                format!("Unknown method: {}", params.method),
            )
        })?;
        let descriptor = &method.descriptor;

        // 2. Validate arguments against the declared parameter list.
        for parameter in &descriptor.parameters {
            match params.arguments.get(&parameter.name) {
                None => {
                    return Err(InvocationFailure::new(
                        FailureKind::MissingArgument,
                        format!(
                            "Missing argument '{}' for method '{}'",
                            parameter.name, descriptor.name
                        ),
                    ));
                }
                Some(value) if !parameter.ty.admits(value) => {
                    return Err(InvocationFailure::new(
                        FailureKind::TypeMismatch,
                        format!(
                            "Type mismatch for argument '{}': expected {}, got {}",
                            parameter.name,
                            parameter.ty,
                            TypeTag::describe(value)
                        ),
                    ));
                }
                Some(_) => {}
            }
        }
        for supplied in params.arguments.keys() {
            if !descriptor.parameters.iter().any(|p| &p.name == supplied) {
                return Err(InvocationFailure::new(
                    FailureKind::TypeMismatch,
                    format!(
                        "Unexpected argument '{}' for method '{}'",
                        supplied, descriptor.name
                    ),
                ));
            }
        }

        // 3-5. Execute, holding the context lock across the whole
        // read-execute-write cycle for stateful invocations.
        let value = match (descriptor.stateful, params.context_id.as_deref()) {
            (true, Some(context_id)) => {
                let cell = self.contexts.entry(context_id).await;
                let mut state = cell.lock().await;
                let snapshot = state.clone();
                let output = method
                    .handler
                    .invoke(&params.arguments, Some(snapshot))
                    .await
                    .map_err(|e| {
                        InvocationFailure::new(FailureKind::ExecutionFailure, e.to_string())
                    })?;
                if let Some(updated) = output.state {
                    *state = updated;
                }
                output.value
            }
            (true, None) => {
                // Stateful method invoked without a context: runs against
                // empty state and persists nothing. Diagnostic convenience;
                // the orchestrator always supplies ids for stateful cases.
                let output = method
                    .handler
                    .invoke(&params.arguments, Some(json!({})))
                    .await
                    .map_err(|e| {
                        InvocationFailure::new(FailureKind::ExecutionFailure, e.to_string())
                    })?;
                output.value
            }
            (false, _) => {
                let output = method
                    .handler
                    .invoke(&params.arguments, None)
                    .await
                    .map_err(|e| {
                        InvocationFailure::new(FailureKind::ExecutionFailure, e.to_string())
                    })?;
                output.value
            }
        };

        let execution_time_us = started.elapsed().as_micros() as u64;
        tracing::debug!(
            method = %descriptor.name,
            execution_time_us,
            "dispatched invocation"
        );

        Ok(InvokeResult {
            value,
            metadata: ExecutionMetadata {
                execution_time_us,
                runtime: self.runtime.clone(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{handler_fn, MethodOutput};
    use crate::rpc::types::{MethodDescriptor, ParameterSpec};
    use anyhow::anyhow;
    use serde_json::{Map, Value};

    fn dispatcher() -> Dispatcher {
        let mut registry = FunctionRegistry::new();
        registry
            .register(
                MethodDescriptor::new("add", "Add two numbers", TypeTag::Int)
                    .with_parameter(ParameterSpec::new("a", TypeTag::Int))
                    .with_parameter(ParameterSpec::new("b", TypeTag::Int)),
                handler_fn(|args, _state| {
                    let a = args["a"].as_i64().unwrap();
                    let b = args["b"].as_i64().unwrap();
                    Ok(MethodOutput::value(json!(a + b)))
                }),
            )
            .unwrap();
        registry
            .register(
                MethodDescriptor::new("half", "Halve a number", TypeTag::Float)
                    .with_parameter(ParameterSpec::new("x", TypeTag::Float)),
                handler_fn(|args, _state| {
                    let x = args["x"].as_f64().unwrap();
                    Ok(MethodOutput::value(json!(x / 2.0)))
                }),
            )
            .unwrap();
        registry
            .register(
                MethodDescriptor::new("explode", "Always fails", TypeTag::Any),
                handler_fn(|_args, _state| Err(anyhow!("boom"))),
            )
            .unwrap();
        registry
            .register(
                MethodDescriptor::new("counter_increment", "Increment a counter", TypeTag::Int)
                    .stateful(),
                handler_fn(|_args, state| {
                    let current = state
                        .as_ref()
                        .and_then(|s| s.get("counter"))
                        .and_then(|v| v.as_i64())
                        .unwrap_or(0);
                    Ok(MethodOutput::with_state(
                        json!(current + 1),
                        json!({"counter": current + 1}),
                    ))
                }),
            )
            .unwrap();
        Dispatcher::new(Arc::new(registry), Arc::new(ContextStore::new()))
    }

    fn args(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn invoke(method: &str, arguments: Map<String, Value>, context_id: Option<&str>) -> InvokeParams {
        InvokeParams {
            method: method.to_string(),
            arguments,
            context_id: context_id.map(String::from),
        }
    }

    #[tokio::test]
    async fn test_dispatch_success() {
        let d = dispatcher();
        let result = d
            .dispatch(&invoke("add", args(&[("a", json!(5)), ("b", json!(3))]), None))
            .await
            .unwrap();
        assert_eq!(result.value, json!(8));
        assert_eq!(result.metadata.runtime, "rust");
    }

    #[tokio::test]
    async fn test_dispatch_unknown_method() {
        let d = dispatcher();
        let failure = d
            .dispatch(&invoke("does_not_exist", Map::new(), None))
            .await
            .unwrap_err();
        assert_eq!(failure.kind, FailureKind::UnknownMethod);
    }

    #[tokio::test]
    async fn test_dispatch_missing_argument() {
        let d = dispatcher();
        let failure = d
            .dispatch(&invoke("add", args(&[("a", json!(5))]), None))
            .await
            .unwrap_err();
        assert_eq!(failure.kind, FailureKind::MissingArgument);
        assert!(failure.message.contains("'b'"));
    }

    #[tokio::test]
    async fn test_dispatch_type_mismatch() {
        let d = dispatcher();
        let failure = d
            .dispatch(&invoke(
                "add",
                args(&[("a", json!(5)), ("b", json!("three"))]),
                None,
            ))
            .await
            .unwrap_err();
        assert_eq!(failure.kind, FailureKind::TypeMismatch);
        assert!(failure.message.contains("expected int, got string"));
    }

    #[tokio::test]
    async fn test_dispatch_unexpected_argument() {
        let d = dispatcher();
        let failure = d
            .dispatch(&invoke(
                "add",
                args(&[("a", json!(1)), ("b", json!(2)), ("c", json!(3))]),
                None,
            ))
            .await
            .unwrap_err();
        assert_eq!(failure.kind, FailureKind::TypeMismatch);
        assert!(failure.message.contains("Unexpected argument 'c'"));
    }

    #[tokio::test]
    async fn test_dispatch_int_promotes_to_float_parameter() {
        let d = dispatcher();
        let result = d
            .dispatch(&invoke("half", args(&[("x", json!(5))]), None))
            .await
            .unwrap();
        assert_eq!(result.value, json!(2.5));
    }

    #[tokio::test]
    async fn test_dispatch_execution_failure() {
        let d = dispatcher();
        let failure = d
            .dispatch(&invoke("explode", Map::new(), None))
            .await
            .unwrap_err();
        assert_eq!(failure.kind, FailureKind::ExecutionFailure);
        assert!(failure.message.contains("boom"));
    }

    #[tokio::test]
    async fn test_dispatch_stateful_chain() {
        let d = dispatcher();
        d.contexts().seed("ctx-1", json!({"counter": 0})).await;
        for expected in 1..=3i64 {
            let result = d
                .dispatch(&invoke("counter_increment", Map::new(), Some("ctx-1")))
                .await
                .unwrap();
            assert_eq!(result.value, json!(expected));
        }
        assert_eq!(d.contexts().get("ctx-1").await, json!({"counter": 3}));
    }

    #[tokio::test]
    async fn test_dispatch_stateful_isolated_per_context() {
        let d = dispatcher();
        d.dispatch(&invoke("counter_increment", Map::new(), Some("a")))
            .await
            .unwrap();
        let result = d
            .dispatch(&invoke("counter_increment", Map::new(), Some("b")))
            .await
            .unwrap();
        // "b" starts fresh, unaffected by "a".
        assert_eq!(result.value, json!(1));
    }

    #[tokio::test]
    async fn test_dispatch_stateful_without_context_persists_nothing() {
        let d = dispatcher();
        let result = d
            .dispatch(&invoke("counter_increment", Map::new(), None))
            .await
            .unwrap();
        assert_eq!(result.value, json!(1));
        assert_eq!(d.contexts().len().await, 0);
    }

    #[tokio::test]
    async fn test_failure_to_rpc_error_carries_kind_tag() {
        let failure = InvocationFailure::new(FailureKind::MissingArgument, "no 'b'");
        let e = failure.to_rpc_error();
        assert_eq!(e.code, crate::rpc::types::CODE_MISSING_ARGUMENT);
        assert_eq!(e.data.unwrap()["kind"], json!("missing_argument"));
    }
}
