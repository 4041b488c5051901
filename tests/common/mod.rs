//! Shared helpers for integration tests
//!
//! Spawns real in-process RPC servers bound to ephemeral ports so tests
//! exercise the full HTTP pipeline without fixed port assignments.

// Not every integration test binary uses every helper.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use lockstep::context::ContextStore;
use lockstep::dispatch::Dispatcher;
use lockstep::registry::FunctionRegistry;
use lockstep::rpc::RpcServer;
use lockstep::samples::register_samples;

/// An in-process server running on an ephemeral port.
///
/// The accept loop is cancelled when the value is dropped.
pub struct TestServer {
    addr: SocketAddr,
    token: CancellationToken,
}

impl TestServer {
    /// Spawn a server over an arbitrary registry.
    pub async fn spawn(registry: FunctionRegistry) -> Self {
        let dispatcher = Dispatcher::new(Arc::new(registry), Arc::new(ContextStore::new()));
        let server = RpcServer::new(Arc::new(dispatcher));
        let bound = server
            .bind("127.0.0.1:0".parse().expect("loopback addr"))
            .await
            .expect("bind ephemeral port");
        let addr = bound.local_addr();

        let token = CancellationToken::new();
        let serve_token = token.clone();
        tokio::spawn(async move {
            let _ = bound.serve(serve_token).await;
        });

        Self { addr, token }
    }

    /// Spawn a server with the full sample library registered.
    pub async fn spawn_samples() -> Self {
        let mut registry = FunctionRegistry::new();
        register_samples(&mut registry).expect("sample registration");
        Self::spawn(registry).await
    }

    /// The bound socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// The port the server listens on.
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// The `/rpc` endpoint URL.
    pub fn url(&self) -> url::Url {
        url::Url::parse(&format!("http://{}/rpc", self.addr)).expect("endpoint url")
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
