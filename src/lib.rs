//! Lockstep - behavioral-equivalence test harness library
//!
//! This library provides the core functionality for verifying that two or
//! more independent implementations of the same function library, each
//! running as a separate networked process, potentially in different
//! languages, produce identical observable behavior, including for
//! functions that carry session-scoped mutable state.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `rpc`: The language-neutral invocation contract (wire types, HTTP
//!   JSON-RPC server and client)
//! - `registry`: Write-once mapping from method name to descriptor and
//!   handler
//! - `context`: Per-process session/context store for stateful methods
//! - `dispatch`: The per-request resolve/validate/execute/persist engine
//! - `suite`: Declarative YAML test suite model
//! - `compare`: Cross-representation value-equality rules
//! - `orchestrator`: The driver issuing cases to all servers and judging
//!   equivalence
//! - `report`: Structured run reports and rendering
//! - `samples`: Sample function library registered by the reference server
//! - `config`: Configuration management
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use lockstep::config::Config;
//! use lockstep::orchestrator::Orchestrator;
//! use lockstep::suite::TestSuite;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load(None)?;
//!     let suite = TestSuite::load("suites/simple_math.yaml")?;
//!     let orchestrator = Orchestrator::from_suite(&suite, config.orchestrator_options())?;
//!     let report = orchestrator.run(&suite).await;
//!     print!("{}", report.render_human());
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod commands;
pub mod compare;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod orchestrator;
pub mod registry;
pub mod report;
pub mod rpc;
pub mod samples;
pub mod suite;

// Re-export commonly used types
pub use compare::ComparePolicy;
pub use config::Config;
pub use context::ContextStore;
pub use dispatch::Dispatcher;
pub use error::{LockstepError, Result};
pub use orchestrator::{Orchestrator, OrchestratorOptions};
pub use registry::FunctionRegistry;
pub use report::SuiteReport;
pub use suite::TestSuite;
