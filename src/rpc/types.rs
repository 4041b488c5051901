//! Lockstep invocation-contract types and JSON-RPC 2.0 primitives
//!
//! This module defines every wire type used by the Lockstep invocation
//! contract. The contract is deliberately small: a server exposes method
//! discovery (`methods/list`), method invocation (`methods/invoke`), and a
//! handful of context-lifecycle operations (`contexts/seed`,
//! `contexts/inspect`, `contexts/destroy`) plus a `ping` diagnostic.
//!
//! All types derive `Debug`, `Clone`, `Serialize`, and `Deserialize` unless
//! noted otherwise. Field names are `snake_case` on the wire. All `Option<>`
//! fields omit their key from JSON when `None` via
//! `#[serde(skip_serializing_if = "Option::is_none")]`.
//!
//! Argument and result values are plain [`serde_json::Value`]s: a tagged
//! variant model (integer, float, boolean, string, null, sequence, mapping)
//! that any conforming language implementation can encode and decode at its
//! boundary.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

// ---------------------------------------------------------------------------
// JSON-RPC method constants
// ---------------------------------------------------------------------------

/// Discovery: list registered methods with their descriptors.
pub const METHOD_METHODS_LIST: &str = "methods/list";
/// Invocation: execute a registered method.
pub const METHOD_METHODS_INVOKE: &str = "methods/invoke";
/// Context lifecycle: seed initial state for an unseen context id.
pub const METHOD_CONTEXTS_SEED: &str = "contexts/seed";
/// Context lifecycle: snapshot the current state of a context id.
pub const METHOD_CONTEXTS_INSPECT: &str = "contexts/inspect";
/// Context lifecycle: discard a context id and its state.
pub const METHOD_CONTEXTS_DESTROY: &str = "contexts/destroy";
/// Keepalive / reachability ping.
pub const METHOD_PING: &str = "ping";

// ---------------------------------------------------------------------------
// JSON-RPC 2.0 error codes
// ---------------------------------------------------------------------------

/// Standard JSON-RPC 2.0: malformed JSON payload.
pub const CODE_PARSE_ERROR: i64 = -32700;
/// Standard JSON-RPC 2.0: envelope is not a valid request object.
pub const CODE_INVALID_REQUEST: i64 = -32600;
/// Standard JSON-RPC 2.0: the envelope method is not part of the contract.
pub const CODE_METHOD_NOT_FOUND: i64 = -32601;
/// Standard JSON-RPC 2.0: the params object failed to deserialize.
pub const CODE_INVALID_PARAMS: i64 = -32602;

/// Invocation failure: the named function is not registered.
pub const CODE_UNKNOWN_METHOD: i64 = -32040;
/// Invocation failure: a declared parameter was not supplied.
pub const CODE_MISSING_ARGUMENT: i64 = -32041;
/// Invocation failure: a supplied argument has the wrong type.
pub const CODE_TYPE_MISMATCH: i64 = -32042;
/// Invocation failure: the function body itself raised an error.
pub const CODE_EXECUTION_FAILURE: i64 = -32043;

// ---------------------------------------------------------------------------
// JSON-RPC 2.0 wire types
// ---------------------------------------------------------------------------

/// A JSON-RPC 2.0 request object.
///
/// `jsonrpc` MUST always be `"2.0"`. `id` is `None` only for notifications,
/// which the Lockstep contract does not use.
///
/// # Examples
///
/// ```
/// use lockstep::rpc::types::JsonRpcRequest;
///
/// let req = JsonRpcRequest {
///     jsonrpc: "2.0".to_string(),
///     id: Some(serde_json::json!(1)),
///     method: "ping".to_string(),
///     params: None,
/// };
/// assert_eq!(req.jsonrpc, "2.0");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// Protocol version identifier; always `"2.0"`.
    pub jsonrpc: String,
    /// Request correlation identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    /// The contract operation to invoke (e.g. `methods/invoke`).
    pub method: String,
    /// Optional operation parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    /// Build a request with the given id, method, and serialized params.
    pub fn new(id: u64, method: &str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: Some(Value::from(id)),
            method: method.to_string(),
            params,
        }
    }
}

/// A JSON-RPC 2.0 response object.
///
/// Exactly one of `result` or `error` is present in a valid response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// Protocol version identifier; always `"2.0"`.
    pub jsonrpc: String,
    /// Mirrors the `id` from the corresponding request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    /// Successful result value; mutually exclusive with `error`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error object; mutually exclusive with `result`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Build a success response mirroring `id`.
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Build an error response mirroring `id`.
    pub fn failure(id: Option<Value>, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

/// A JSON-RPC 2.0 error object.
///
/// Implements `Display` as `"JSON-RPC error {code}: {message}"`. Invocation
/// failures carry a machine-readable [`FailureKind`] tag in `data.kind` in
/// addition to their numeric code.
///
/// # Examples
///
/// ```
/// use lockstep::rpc::types::JsonRpcError;
///
/// let e = JsonRpcError { code: -32600, message: "Invalid Request".to_string(), data: None };
/// assert_eq!(e.to_string(), "JSON-RPC error -32600: Invalid Request");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Numeric error code as defined by JSON-RPC 2.0 or this contract.
    pub code: i64,
    /// Human-readable error description.
    pub message: String,
    /// Optional additional error context (`{"kind": "..."}` for
    /// invocation failures).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JSON-RPC error {}: {}", self.code, self.message)
    }
}

impl JsonRpcError {
    /// Extract the failure kind tag, falling back to code mapping when the
    /// `data.kind` field is absent.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        if let Some(kind) = self
            .data
            .as_ref()
            .and_then(|d| d.get("kind"))
            .and_then(|k| k.as_str())
        {
            if let Ok(parsed) = serde_json::from_value(Value::String(kind.to_string())) {
                return Some(parsed);
            }
        }
        FailureKind::from_code(self.code)
    }
}

// ---------------------------------------------------------------------------
// Invocation failure kinds
// ---------------------------------------------------------------------------

/// Machine-readable tag for the server-side invocation failure taxonomy.
///
/// Serialized as `snake_case` strings inside `error.data.kind` so that a
/// caller can classify a failure without string-matching the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The named function is not registered on the server.
    UnknownMethod,
    /// A declared parameter was absent from the argument mapping.
    MissingArgument,
    /// A supplied argument cannot be coerced to its declared type.
    TypeMismatch,
    /// The function body raised an error during execution.
    ExecutionFailure,
}

impl FailureKind {
    /// The JSON-RPC error code assigned to this failure kind.
    pub fn code(self) -> i64 {
        match self {
            FailureKind::UnknownMethod => CODE_UNKNOWN_METHOD,
            FailureKind::MissingArgument => CODE_MISSING_ARGUMENT,
            FailureKind::TypeMismatch => CODE_TYPE_MISMATCH,
            FailureKind::ExecutionFailure => CODE_EXECUTION_FAILURE,
        }
    }

    /// Map a wire code back to a failure kind, if it is one of ours.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            CODE_UNKNOWN_METHOD => Some(FailureKind::UnknownMethod),
            CODE_MISSING_ARGUMENT => Some(FailureKind::MissingArgument),
            CODE_TYPE_MISMATCH => Some(FailureKind::TypeMismatch),
            CODE_EXECUTION_FAILURE => Some(FailureKind::ExecutionFailure),
            _ => None,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::UnknownMethod => "unknown_method",
            FailureKind::MissingArgument => "missing_argument",
            FailureKind::TypeMismatch => "type_mismatch",
            FailureKind::ExecutionFailure => "execution_failure",
        };
        write!(f, "{}", s)
    }
}

// ---------------------------------------------------------------------------
// Method metadata
// ---------------------------------------------------------------------------

/// Declared type of a parameter or return value.
///
/// `any` admits every value; `int` admits JSON integers only; `float`
/// admits any JSON number (integers promote). `null` is not a tag: it is a
/// value admitted only by `any`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeTag {
    /// Signed integer, at least 64-bit range.
    Int,
    /// IEEE-754 double; integers coerce.
    Float,
    /// Boolean.
    Bool,
    /// UTF-8 string.
    String,
    /// Ordered sequence of values.
    List,
    /// String-keyed mapping of values.
    Map,
    /// Any value, including null.
    Any,
}

impl TypeTag {
    /// Whether `value` is admissible under this tag.
    pub fn admits(self, value: &Value) -> bool {
        match self {
            TypeTag::Int => value.is_i64() || value.is_u64(),
            TypeTag::Float => value.is_number(),
            TypeTag::Bool => value.is_boolean(),
            TypeTag::String => value.is_string(),
            TypeTag::List => value.is_array(),
            TypeTag::Map => value.is_object(),
            TypeTag::Any => true,
        }
    }

    /// A short name for the runtime type of `value`, for error messages.
    pub fn describe(value: &Value) -> &'static str {
        match value {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(n) if n.is_f64() => "float",
            Value::Number(_) => "int",
            Value::String(_) => "string",
            Value::Array(_) => "list",
            Value::Object(_) => "map",
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TypeTag::Int => "int",
            TypeTag::Float => "float",
            TypeTag::Bool => "bool",
            TypeTag::String => "string",
            TypeTag::List => "list",
            TypeTag::Map => "map",
            TypeTag::Any => "any",
        };
        write!(f, "{}", s)
    }
}

/// One declared parameter of a registered method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSpec {
    /// Parameter name; arguments are supplied by name.
    pub name: String,
    /// Declared type tag.
    #[serde(rename = "type")]
    pub ty: TypeTag,
}

impl ParameterSpec {
    /// Convenience constructor.
    pub fn new(name: impl Into<String>, ty: TypeTag) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Static metadata describing one registered method.
///
/// Two servers implementing "the same" method must agree on this descriptor;
/// the orchestrator asserts presence (and may assert shape) during its
/// preflight check. Immutable once registered.
///
/// # Examples
///
/// ```
/// use lockstep::rpc::types::{MethodDescriptor, ParameterSpec, TypeTag};
///
/// let d = MethodDescriptor::new("add", "Add two numbers", TypeTag::Int)
///     .with_parameter(ParameterSpec::new("a", TypeTag::Int))
///     .with_parameter(ParameterSpec::new("b", TypeTag::Int));
/// assert_eq!(d.parameters.len(), 2);
/// assert!(!d.stateful);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodDescriptor {
    /// Unique (per server), case-sensitive method name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Ordered declared parameters.
    #[serde(default)]
    pub parameters: Vec<ParameterSpec>,
    /// Declared return type tag.
    pub returns: TypeTag,
    /// Whether invocations read and write session context state.
    #[serde(default)]
    pub stateful: bool,
}

impl MethodDescriptor {
    /// Create a stateless descriptor with no parameters.
    pub fn new(name: impl Into<String>, description: impl Into<String>, returns: TypeTag) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
            returns,
            stateful: false,
        }
    }

    /// Append a declared parameter, preserving order.
    pub fn with_parameter(mut self, parameter: ParameterSpec) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Mark the method as stateful.
    pub fn stateful(mut self) -> Self {
        self.stateful = true;
        self
    }
}

// ---------------------------------------------------------------------------
// Operation params and results
// ---------------------------------------------------------------------------

/// Parameters for `methods/list`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListMethodsParams {
    /// When present, only methods whose name starts with this prefix are
    /// returned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
}

/// Result of `methods/list`: descriptors in registration order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListMethodsResult {
    /// Registered method descriptors, registration order preserved.
    pub methods: Vec<MethodDescriptor>,
}

/// Parameters for `methods/invoke`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvokeParams {
    /// Name of the registered method to execute.
    pub method: String,
    /// Argument mapping from parameter name to value.
    #[serde(default)]
    pub arguments: Map<String, Value>,
    /// Context identifier; present iff the method is stateful.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
}

/// Callee-side measurements attached to a successful invocation.
///
/// The authoritative latency number is always measured by the caller; this
/// metadata isolates the function body's own execution time from transport
/// and serialization overhead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionMetadata {
    /// Microseconds spent inside dispatch and the function body.
    pub execution_time_us: u64,
    /// Identifier of the serving runtime (e.g. `"rust"`, `"python"`).
    pub runtime: String,
}

/// Result of a successful `methods/invoke`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvokeResult {
    /// The function's return value.
    pub value: Value,
    /// Callee-side execution measurements.
    pub metadata: ExecutionMetadata,
}

/// Parameters for `contexts/seed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedContextParams {
    /// The context to seed.
    pub context_id: String,
    /// Initial state value.
    pub state: Value,
}

/// Result of `contexts/seed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedContextResult {
    /// False when the id already had state (seed is then a no-op).
    pub seeded: bool,
}

/// Parameters for `contexts/inspect`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InspectContextParams {
    /// The context to snapshot.
    pub context_id: String,
}

/// Result of `contexts/inspect`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InspectContextResult {
    /// Current state; an empty mapping for unseen ids.
    pub state: Value,
}

/// Parameters for `contexts/destroy`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestroyContextParams {
    /// The context to discard.
    pub context_id: String,
}

/// Result of `contexts/destroy`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestroyContextResult {
    /// False when the id had no stored state.
    pub destroyed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_roundtrip() {
        let req = JsonRpcRequest::new(
            7,
            METHOD_METHODS_INVOKE,
            Some(json!({"method": "add", "arguments": {"a": 1, "b": 2}})),
        );
        let s = serde_json::to_string(&req).unwrap();
        let back: JsonRpcRequest = serde_json::from_str(&s).unwrap();
        assert_eq!(back.method, "methods/invoke");
        assert_eq!(back.id, Some(json!(7)));
    }

    #[test]
    fn test_response_success_shape() {
        let resp = JsonRpcResponse::success(Some(json!(1)), json!({"value": 8}));
        let s = serde_json::to_string(&resp).unwrap();
        assert!(s.contains("\"result\""));
        assert!(!s.contains("\"error\""));
    }

    #[test]
    fn test_error_display() {
        let e = JsonRpcError {
            code: CODE_UNKNOWN_METHOD,
            message: "Unknown method: nope".to_string(),
            data: None,
        };
        assert_eq!(e.to_string(), "JSON-RPC error -32040: Unknown method: nope");
    }

    #[test]
    fn test_failure_kind_from_data_tag() {
        let e = JsonRpcError {
            code: CODE_TYPE_MISMATCH,
            message: "bad".to_string(),
            data: Some(json!({"kind": "type_mismatch"})),
        };
        assert_eq!(e.failure_kind(), Some(FailureKind::TypeMismatch));
    }

    #[test]
    fn test_failure_kind_from_code_fallback() {
        let e = JsonRpcError {
            code: CODE_MISSING_ARGUMENT,
            message: "bad".to_string(),
            data: None,
        };
        assert_eq!(e.failure_kind(), Some(FailureKind::MissingArgument));
    }

    #[test]
    fn test_failure_kind_codes_roundtrip() {
        for kind in [
            FailureKind::UnknownMethod,
            FailureKind::MissingArgument,
            FailureKind::TypeMismatch,
            FailureKind::ExecutionFailure,
        ] {
            assert_eq!(FailureKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(FailureKind::from_code(-32601), None);
    }

    #[test]
    fn test_type_tag_admits_integers() {
        assert!(TypeTag::Int.admits(&json!(5)));
        assert!(TypeTag::Int.admits(&json!(-5)));
        assert!(!TypeTag::Int.admits(&json!(5.5)));
        assert!(!TypeTag::Int.admits(&json!("5")));
    }

    #[test]
    fn test_type_tag_float_promotes_int() {
        assert!(TypeTag::Float.admits(&json!(5)));
        assert!(TypeTag::Float.admits(&json!(5.5)));
        assert!(!TypeTag::Float.admits(&json!(true)));
    }

    #[test]
    fn test_type_tag_any_admits_null() {
        assert!(TypeTag::Any.admits(&json!(null)));
        assert!(!TypeTag::Map.admits(&json!(null)));
    }

    #[test]
    fn test_type_tag_describe() {
        assert_eq!(TypeTag::describe(&json!(1)), "int");
        assert_eq!(TypeTag::describe(&json!(1.5)), "float");
        assert_eq!(TypeTag::describe(&json!([])), "list");
        assert_eq!(TypeTag::describe(&json!({})), "map");
        assert_eq!(TypeTag::describe(&json!(null)), "null");
    }

    #[test]
    fn test_descriptor_wire_shape() {
        let d = MethodDescriptor::new("counter_increment", "Increment a counter", TypeTag::Int)
            .stateful();
        let v = serde_json::to_value(&d).unwrap();
        assert_eq!(v["name"], "counter_increment");
        assert_eq!(v["returns"], "int");
        assert_eq!(v["stateful"], true);
        assert_eq!(v["parameters"], json!([]));
    }

    #[test]
    fn test_descriptor_parameter_type_rename() {
        let d = MethodDescriptor::new("add", "", TypeTag::Int)
            .with_parameter(ParameterSpec::new("a", TypeTag::Int));
        let v = serde_json::to_value(&d).unwrap();
        assert_eq!(v["parameters"][0]["type"], "int");
    }

    #[test]
    fn test_invoke_params_default_arguments() {
        let p: InvokeParams = serde_json::from_value(json!({"method": "ping_fn"})).unwrap();
        assert!(p.arguments.is_empty());
        assert!(p.context_id.is_none());
    }
}
