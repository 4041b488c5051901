//! Invocation-contract support for Lockstep
//!
//! This module implements both halves of the language-neutral invocation
//! contract: the HTTP JSON-RPC server a function library sits behind, and
//! the client the orchestrator (and ad hoc diagnostic callers) use to reach
//! any conforming server, whatever language it is written in.
//!
//! # Module Layout
//!
//! - `types`  -- All contract wire types and JSON-RPC 2.0 primitives
//! - `client` -- HTTP JSON-RPC client bound to one server endpoint
//! - `server` -- axum server exposing a dispatcher on `POST /rpc`

pub mod client;
pub mod server;
pub mod types;

pub use client::{CallFailure, RpcClient, DEFAULT_CALL_TIMEOUT};
pub use server::{BoundServer, RpcServer};
pub use types::*;
