//! HTTP JSON-RPC server for the Lockstep invocation contract
//!
//! Exposes the whole contract on a single `POST /rpc` route: each request
//! body is one JSON-RPC 2.0 request object, each response body the matching
//! response object. Dispatch failures come back as structured JSON-RPC
//! errors: a registered function can fail, but the serving process never
//! crashes on a request.
//!
//! The server binds first and serves second, so tests can bind port 0 and
//! read the chosen address before issuing calls. Shutdown is cooperative
//! via a [`CancellationToken`].

use crate::dispatch::Dispatcher;
use crate::error::Result;
use crate::rpc::types::{
    DestroyContextParams, DestroyContextResult, InspectContextParams, InspectContextResult,
    InvokeParams, JsonRpcError, JsonRpcRequest, JsonRpcResponse, ListMethodsParams,
    ListMethodsResult, SeedContextParams, SeedContextResult, CODE_INVALID_PARAMS,
    CODE_METHOD_NOT_FOUND, CODE_PARSE_ERROR, METHOD_CONTEXTS_DESTROY, METHOD_CONTEXTS_INSPECT,
    METHOD_CONTEXTS_SEED, METHOD_METHODS_INVOKE, METHOD_METHODS_LIST, METHOD_PING,
};
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// JSON-RPC server wrapping a [`Dispatcher`].
pub struct RpcServer {
    dispatcher: Arc<Dispatcher>,
}

/// A server bound to a concrete address but not yet serving.
///
/// Splitting bind from serve lets callers bind port 0 and learn the chosen
/// port before the accept loop starts.
pub struct BoundServer {
    listener: tokio::net::TcpListener,
    router: Router,
    local_addr: SocketAddr,
}

impl RpcServer {
    /// Create a server over the given dispatcher.
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }

    /// The axum router exposing `POST /rpc`.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/rpc", post(handle_rpc))
            .with_state(Arc::clone(&self.dispatcher))
    }

    /// Bind the listening socket.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn bind(self, addr: SocketAddr) -> Result<BoundServer> {
        let router = self.router();
        let listener = tokio::net::TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!(%local_addr, "rpc server bound");
        Ok(BoundServer {
            listener,
            router,
            local_addr,
        })
    }
}

impl BoundServer {
    /// The address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Run the accept loop until `shutdown` is cancelled.
    ///
    /// # Errors
    ///
    /// Returns an error if the accept loop fails.
    pub async fn serve(self, shutdown: CancellationToken) -> Result<()> {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;
        tracing::info!("rpc server stopped");
        Ok(())
    }
}

/// Handle one JSON-RPC request body.
async fn handle_rpc(
    State(dispatcher): State<Arc<Dispatcher>>,
    body: String,
) -> Json<JsonRpcResponse> {
    let request: JsonRpcRequest = match serde_json::from_str(&body) {
        Ok(r) => r,
        Err(e) => {
            return Json(JsonRpcResponse::failure(
                None,
                JsonRpcError {
                    code: CODE_PARSE_ERROR,
                    message: format!("Parse error: {}", e),
                    data: None,
                },
            ));
        }
    };

    let id = request.id.clone();
    let response = match request.method.as_str() {
        METHOD_METHODS_LIST => handle_list(&dispatcher, id, request.params),
        METHOD_METHODS_INVOKE => handle_invoke(&dispatcher, id, request.params).await,
        METHOD_CONTEXTS_SEED => handle_seed(&dispatcher, id, request.params).await,
        METHOD_CONTEXTS_INSPECT => handle_inspect(&dispatcher, id, request.params).await,
        METHOD_CONTEXTS_DESTROY => handle_destroy(&dispatcher, id, request.params).await,
        METHOD_PING => JsonRpcResponse::success(id, json!({})),
        other => JsonRpcResponse::failure(
            id,
            JsonRpcError {
                code: CODE_METHOD_NOT_FOUND,
                message: format!("Method not found: {}", other),
                data: None,
            },
        ),
    };

    Json(response)
}

/// Deserialize a params value, treating absent params as the type's default.
fn parse_params<T>(params: Option<Value>) -> std::result::Result<T, JsonRpcError>
where
    T: serde::de::DeserializeOwned + Default,
{
    match params {
        None => Ok(T::default()),
        Some(value) => serde_json::from_value(value).map_err(|e| JsonRpcError {
            code: CODE_INVALID_PARAMS,
            message: format!("Invalid params: {}", e),
            data: None,
        }),
    }
}

/// Deserialize a params value that must be present.
fn parse_required_params<T>(params: Option<Value>) -> std::result::Result<T, JsonRpcError>
where
    T: serde::de::DeserializeOwned,
{
    let value = params.ok_or_else(|| JsonRpcError {
        code: CODE_INVALID_PARAMS,
        message: "Invalid params: missing params object".to_string(),
        data: None,
    })?;
    serde_json::from_value(value).map_err(|e| JsonRpcError {
        code: CODE_INVALID_PARAMS,
        message: format!("Invalid params: {}", e),
        data: None,
    })
}

fn handle_list(
    dispatcher: &Dispatcher,
    id: Option<Value>,
    params: Option<Value>,
) -> JsonRpcResponse {
    let params: ListMethodsParams = match parse_params(params) {
        Ok(p) => p,
        Err(e) => return JsonRpcResponse::failure(id, e),
    };
    let methods = dispatcher.registry().descriptors(params.prefix.as_deref());
    let result = ListMethodsResult { methods };
    JsonRpcResponse::success(id, serde_json::to_value(result).unwrap_or(Value::Null))
}

async fn handle_invoke(
    dispatcher: &Dispatcher,
    id: Option<Value>,
    params: Option<Value>,
) -> JsonRpcResponse {
    let params: InvokeParams = match parse_required_params(params) {
        Ok(p) => p,
        Err(e) => return JsonRpcResponse::failure(id, e),
    };
    match dispatcher.dispatch(&params).await {
        Ok(result) => {
            JsonRpcResponse::success(id, serde_json::to_value(result).unwrap_or(Value::Null))
        }
        Err(failure) => {
            tracing::debug!(
                method = %params.method,
                kind = %failure.kind,
                "invocation failed"
            );
            JsonRpcResponse::failure(id, failure.to_rpc_error())
        }
    }
}

async fn handle_seed(
    dispatcher: &Dispatcher,
    id: Option<Value>,
    params: Option<Value>,
) -> JsonRpcResponse {
    let params: SeedContextParams = match parse_required_params(params) {
        Ok(p) => p,
        Err(e) => return JsonRpcResponse::failure(id, e),
    };
    let seeded = dispatcher
        .contexts()
        .seed(&params.context_id, params.state)
        .await;
    JsonRpcResponse::success(
        id,
        serde_json::to_value(SeedContextResult { seeded }).unwrap_or(Value::Null),
    )
}

async fn handle_inspect(
    dispatcher: &Dispatcher,
    id: Option<Value>,
    params: Option<Value>,
) -> JsonRpcResponse {
    let params: InspectContextParams = match parse_required_params(params) {
        Ok(p) => p,
        Err(e) => return JsonRpcResponse::failure(id, e),
    };
    let state = dispatcher.contexts().get(&params.context_id).await;
    JsonRpcResponse::success(
        id,
        serde_json::to_value(InspectContextResult { state }).unwrap_or(Value::Null),
    )
}

async fn handle_destroy(
    dispatcher: &Dispatcher,
    id: Option<Value>,
    params: Option<Value>,
) -> JsonRpcResponse {
    let params: DestroyContextParams = match parse_required_params(params) {
        Ok(p) => p,
        Err(e) => return JsonRpcResponse::failure(id, e),
    };
    let destroyed = dispatcher.contexts().destroy(&params.context_id).await;
    JsonRpcResponse::success(
        id,
        serde_json::to_value(DestroyContextResult { destroyed }).unwrap_or(Value::Null),
    )
}
