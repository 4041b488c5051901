//! Test suite definition model
//!
//! A suite is a human-editable YAML document declaring the servers under
//! test and an ordered sequence of test cases. Order matters for stateful
//! chains; stateless cases are independent of each other.
//!
//! ```yaml
//! name: simple_math
//! description: Cross-implementation checks for the math sample library
//! servers:
//!   rust:
//!     host: 127.0.0.1
//!     port: 50051
//!   python:
//!     host: 127.0.0.1
//!     port: 50052
//! tests:
//!   - name: add_small
//!     method: add
//!     arguments: { a: 5, b: 3 }
//!     expected: 8
//!   - name: counter_chain
//!     method: counter_increment
//!     stateful: true
//!     initial_state: { counter: 0 }
//!     calls:
//!       - expected: 1
//!       - expected: 2
//!       - expected: 3
//! ```

use crate::error::{LockstepError, Result};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Network address of one server under test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerAddress {
    /// Hostname or IP.
    pub host: String,
    /// TCP port of the `/rpc` endpoint.
    pub port: u16,
}

/// One invocation inside a stateful chain.
///
/// Arguments default to the owning case's arguments when omitted; an
/// omitted `expected` records the result without asserting it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChainedCall {
    /// Override of the case-level argument mapping.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Map<String, Value>>,
    /// Expected result for this call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<Value>,
}

/// One declarative test case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCase {
    /// Case name, used in the report.
    pub name: String,
    /// Optional human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Target method name.
    pub method: String,
    /// Argument mapping; empty for nullary methods.
    #[serde(default)]
    pub arguments: Map<String, Value>,
    /// Whether the method carries session state.
    #[serde(default)]
    pub stateful: bool,
    /// Initial context state, seeded before the first call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_state: Option<Value>,
    /// Explicit context identifier; a fresh one is generated per case when
    /// omitted, so cases are isolated unless a suite chains them on
    /// purpose.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
    /// Expected result; absence means record-only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<Value>,
    /// Repeated invocations sharing this case's context id.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub calls: Vec<ChainedCall>,
}

impl TestCase {
    /// The concrete sequence of (arguments, expected) pairs this case
    /// issues: the chain when `calls` is present, otherwise the single
    /// case-level invocation.
    pub fn effective_calls(&self) -> Vec<(Map<String, Value>, Option<Value>)> {
        if self.calls.is_empty() {
            return vec![(self.arguments.clone(), self.expected.clone())];
        }
        self.calls
            .iter()
            .map(|call| {
                (
                    call.arguments.clone().unwrap_or_else(|| self.arguments.clone()),
                    call.expected.clone(),
                )
            })
            .collect()
    }
}

/// A full test suite: servers plus ordered cases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSuite {
    /// Suite name, used in the report header.
    pub name: String,
    /// Optional human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Logical server label to address. Iteration order is the label's
    /// lexicographic order, which keeps reports deterministic.
    pub servers: BTreeMap<String, ServerAddress>,
    /// Ordered test cases.
    #[serde(default)]
    pub tests: Vec<TestCase>,
}

impl TestSuite {
    /// Load and validate a suite from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid YAML, or
    /// fails [`TestSuite::validate`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read suite file {}", path.display()))?;
        let suite: TestSuite = serde_yaml::from_str(&contents)
            .with_context(|| format!("failed to parse suite file {}", path.display()))?;
        suite.validate()?;
        Ok(suite)
    }

    /// Structural validation beyond what serde enforces.
    ///
    /// # Errors
    ///
    /// Returns [`LockstepError::Suite`] for an empty server set, an empty
    /// method name, or state-related fields on a stateless case.
    pub fn validate(&self) -> Result<()> {
        if self.servers.is_empty() {
            return Err(LockstepError::Suite(format!(
                "suite '{}' declares no servers",
                self.name
            ))
            .into());
        }
        for case in &self.tests {
            if case.method.is_empty() {
                return Err(LockstepError::Suite(format!(
                    "test '{}' has an empty method name",
                    case.name
                ))
                .into());
            }
            if !case.stateful && case.initial_state.is_some() {
                return Err(LockstepError::Suite(format!(
                    "test '{}' sets initial_state but is not stateful",
                    case.name
                ))
                .into());
            }
            if !case.stateful && case.context_id.is_some() {
                return Err(LockstepError::Suite(format!(
                    "test '{}' sets context_id but is not stateful",
                    case.name
                ))
                .into());
            }
            if !case.stateful && !case.calls.is_empty() {
                return Err(LockstepError::Suite(format!(
                    "test '{}' declares a call chain but is not stateful",
                    case.name
                ))
                .into());
            }
        }
        Ok(())
    }

    /// The set of method names referenced by any case, for the preflight
    /// existence check.
    pub fn referenced_methods(&self) -> BTreeSet<&str> {
        self.tests.iter().map(|t| t.method.as_str()).collect()
    }
}
