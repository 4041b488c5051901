//! Function registry for Lockstep servers
//!
//! The registry is a write-once-at-startup, read-many mapping from method
//! name to its [`MethodDescriptor`] and executable handler. Registration is
//! explicit and data-driven: a server builds its registry with
//! [`FunctionRegistry::register`] calls during startup and then freezes it
//! into an `Arc` before serving, so no dynamic registration happens during
//! request handling.
//!
//! Registration order is preserved for `methods/list` output but carries no
//! semantic weight. Re-registering an existing name is an error to prevent
//! silent shadowing during test setup.

use crate::error::{LockstepError, Result};
use crate::rpc::types::MethodDescriptor;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Output of one method invocation: the return value plus, for stateful
/// methods, the updated context state to persist.
#[derive(Debug, Clone)]
pub struct MethodOutput {
    /// The function's return value.
    pub value: Value,
    /// Updated context state; `None` leaves stored state untouched.
    pub state: Option<Value>,
}

impl MethodOutput {
    /// A stateless output: just a return value.
    pub fn value(value: Value) -> Self {
        Self { value, state: None }
    }

    /// A stateful output: a return value plus replacement state.
    pub fn with_state(value: Value, state: Value) -> Self {
        Self {
            value,
            state: Some(state),
        }
    }
}

/// Executable seam for registered methods
///
/// Each method body implements this trait. Stateful methods receive the
/// current context state **by value** (a snapshot, never a shared
/// reference) and return their updated state in [`MethodOutput::state`];
/// stateless methods receive `None` and should leave `state` unset.
///
/// Any error returned here is caught by the dispatch engine and converted
/// into a structured `execution_failure`; it never crashes the server.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use lockstep::registry::{MethodHandler, MethodOutput};
/// use serde_json::{json, Map, Value};
///
/// struct Doubler;
///
/// #[async_trait]
/// impl MethodHandler for Doubler {
///     async fn invoke(
///         &self,
///         arguments: &Map<String, Value>,
///         _state: Option<Value>,
///     ) -> anyhow::Result<MethodOutput> {
///         let n = arguments["n"].as_i64().unwrap_or(0);
///         Ok(MethodOutput::value(json!(n * 2)))
///     }
/// }
/// ```
#[async_trait]
pub trait MethodHandler: Send + Sync {
    /// Execute the method body.
    ///
    /// # Arguments
    ///
    /// * `arguments` - Validated argument mapping (every declared parameter
    ///   is present with an admissible type).
    /// * `state` - Snapshot of the context state for stateful methods,
    ///   `None` otherwise.
    ///
    /// # Errors
    ///
    /// Any error is mapped to an `execution_failure` by the dispatcher.
    async fn invoke(
        &self,
        arguments: &Map<String, Value>,
        state: Option<Value>,
    ) -> Result<MethodOutput>;
}

/// Adapter wrapping a plain synchronous closure as a [`MethodHandler`].
///
/// Most equivalence-test function bodies are small pure computations; this
/// keeps their registration as terse as the annotation-style registration
/// seen in other language implementations.
struct FnMethodHandler<F>(F);

#[async_trait]
impl<F> MethodHandler for FnMethodHandler<F>
where
    F: Fn(&Map<String, Value>, Option<Value>) -> Result<MethodOutput> + Send + Sync,
{
    async fn invoke(
        &self,
        arguments: &Map<String, Value>,
        state: Option<Value>,
    ) -> Result<MethodOutput> {
        (self.0)(arguments, state)
    }
}

/// Wrap a synchronous closure into an `Arc<dyn MethodHandler>`.
///
/// # Examples
///
/// ```
/// use lockstep::registry::{handler_fn, MethodOutput};
/// use serde_json::json;
///
/// let handler = handler_fn(|args, _state| {
///     let a = args["a"].as_i64().unwrap_or(0);
///     Ok(MethodOutput::value(json!(a + 1)))
/// });
/// let _ = handler;
/// ```
pub fn handler_fn<F>(f: F) -> Arc<dyn MethodHandler>
where
    F: Fn(&Map<String, Value>, Option<Value>) -> Result<MethodOutput> + Send + Sync + 'static,
{
    Arc::new(FnMethodHandler(f))
}

/// One registered method: its immutable descriptor plus its handler.
pub struct RegisteredMethod {
    /// Declared metadata, immutable once registered.
    pub descriptor: MethodDescriptor,
    /// The executable body.
    pub handler: Arc<dyn MethodHandler>,
}

/// Registry mapping method names to registered methods
///
/// Lookups are exact-match and case-sensitive. The registry is built
/// mutably during server startup and then frozen behind an `Arc`; the type
/// has no interior mutability, so the frozen registry is immutable by
/// construction.
pub struct FunctionRegistry {
    methods: HashMap<String, Arc<RegisteredMethod>>,
    /// Names in registration order, for `methods/list`.
    order: Vec<String>,
}

impl FunctionRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            methods: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Register a method descriptor together with its handler.
    ///
    /// # Errors
    ///
    /// Returns [`LockstepError::DuplicateMethod`] if the descriptor's name
    /// is already registered.
    pub fn register(
        &mut self,
        descriptor: MethodDescriptor,
        handler: Arc<dyn MethodHandler>,
    ) -> std::result::Result<(), LockstepError> {
        let name = descriptor.name.clone();
        if self.methods.contains_key(&name) {
            return Err(LockstepError::DuplicateMethod(name));
        }
        tracing::debug!(method = %name, stateful = descriptor.stateful, "registered method");
        self.methods.insert(
            name.clone(),
            Arc::new(RegisteredMethod {
                descriptor,
                handler,
            }),
        );
        self.order.push(name);
        Ok(())
    }

    /// Resolve a method by exact name.
    pub fn get(&self, name: &str) -> Option<Arc<RegisteredMethod>> {
        self.methods.get(name).cloned()
    }

    /// Descriptors in registration order, optionally filtered by name prefix.
    pub fn descriptors(&self, prefix: Option<&str>) -> Vec<MethodDescriptor> {
        self.order
            .iter()
            .filter(|name| prefix.map_or(true, |p| name.starts_with(p)))
            .filter_map(|name| self.methods.get(name))
            .map(|m| m.descriptor.clone())
            .collect()
    }

    /// Number of registered methods.
    pub fn len(&self) -> usize {
        self.methods.len()
    }

    /// Whether the registry has no methods.
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
