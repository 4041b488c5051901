//! Test orchestration engine
//!
//! The orchestrator drives a [`TestSuite`] against every declared server and
//! judges equivalence. For each case it issues the same invocation to all
//! servers **concurrently**, measures caller-side wall-clock latency per
//! server, and compares each successful result against the case's expected
//! value and against the other servers' results.
//!
//! Failure containment rules:
//!
//! - a failed case never aborts the suite; every remaining case still runs;
//! - a timeout or connection failure affects only that server's evaluation
//!   of that case (its result is abandoned, other servers' in-flight calls
//!   for the same case are still collected);
//! - a server that fails preflight is reported unreachable, and its per-case
//!   results are synthesized connection failures rather than repeated
//!   network errors.

use crate::compare::ComparePolicy;
use crate::error::Result;
use crate::report::{CallRecord, CaseOutcome, ServerCaseOutcome, ServerResult, SuiteReport};
use crate::rpc::types::{InvokeParams, MethodDescriptor};
use crate::rpc::{CallFailure, RpcClient};
use crate::suite::{TestCase, TestSuite};
use chrono::Utc;
use futures::future::join_all;
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Tunable orchestration behavior.
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// Per-call timeout applied to every remote operation.
    pub call_timeout: Duration,
    /// Value-equality policy for expected and cross-server comparison.
    pub compare: ComparePolicy,
    /// Whether preflight verifies that every referenced method exists on
    /// every reachable server (and that descriptors agree across servers).
    pub validate_methods: bool,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            call_timeout: crate::rpc::DEFAULT_CALL_TIMEOUT,
            compare: ComparePolicy::default(),
            validate_methods: true,
        }
    }
}

/// Per-server bookkeeping for one case run.
struct ServerRun {
    records: Vec<CallRecord>,
    /// Set when the server can take no further calls for this case.
    dead: bool,
}

/// Driver issuing test cases against all declared servers.
pub struct Orchestrator {
    clients: Vec<Arc<RpcClient>>,
    options: OrchestratorOptions,
}

impl Orchestrator {
    /// Build an orchestrator with one client per suite server, in label
    /// order.
    ///
    /// # Errors
    ///
    /// Returns an error if any declared address is invalid.
    pub fn from_suite(suite: &TestSuite, options: OrchestratorOptions) -> Result<Self> {
        let mut clients = Vec::with_capacity(suite.servers.len());
        for (label, address) in &suite.servers {
            let client = RpcClient::from_host_port(
                label.clone(),
                &address.host,
                address.port,
                options.call_timeout,
            )?;
            tracing::info!(server = %label, endpoint = %client.endpoint(), "configured server");
            clients.push(Arc::new(client));
        }
        Ok(Self { clients, options })
    }

    /// Build an orchestrator over pre-constructed clients (test support).
    pub fn new(clients: Vec<RpcClient>, options: OrchestratorOptions) -> Self {
        Self {
            clients: clients.into_iter().map(Arc::new).collect(),
            options,
        }
    }

    /// Run the whole suite and aggregate a report.
    ///
    /// Never fails: connectivity problems and case failures are folded into
    /// the report rather than propagated.
    pub async fn run(&self, suite: &TestSuite) -> SuiteReport {
        let started_at = Utc::now();
        tracing::info!(suite = %suite.name, servers = self.clients.len(), "starting run");

        let preflight = self.preflight(suite).await;

        let mut cases = Vec::with_capacity(suite.tests.len());
        for case in &suite.tests {
            tracing::info!(test = %case.name, method = %case.method, "running test");
            cases.push(self.run_case(case, &preflight).await);
        }

        SuiteReport {
            suite: suite.name.clone(),
            started_at,
            finished_at: Utc::now(),
            unreachable: preflight.unreachable,
            diagnostics: preflight.diagnostics,
            cases,
        }
    }

    /// Ping every server and, when enabled, fetch its method listing.
    async fn preflight(&self, suite: &TestSuite) -> Preflight {
        let pings = join_all(self.clients.iter().map(|client| async move {
            client.ping().await.err().map(|e| e.to_string())
        }))
        .await;

        let mut unreachable = Vec::new();
        let mut reachable_idx = Vec::new();
        for (client, failure) in self.clients.iter().zip(pings) {
            match failure {
                Some(reason) => {
                    tracing::warn!(server = %client.label(), %reason, "server unreachable");
                    unreachable.push(client.label().to_string());
                }
                None => reachable_idx.push(client.label().to_string()),
            }
        }

        let mut listings: HashMap<String, Vec<MethodDescriptor>> = HashMap::new();
        let mut diagnostics = Vec::new();
        if self.options.validate_methods {
            let unreachable_ref = &unreachable;
            let listed = join_all(self.clients.iter().map(|client| async move {
                if unreachable_contains(unreachable_ref, client.label()) {
                    return None;
                }
                match client.list_methods(None).await {
                    Ok(methods) => Some((client.label().to_string(), methods)),
                    Err(e) => {
                        tracing::warn!(server = %client.label(), error = %e, "methods/list failed");
                        None
                    }
                }
            }))
            .await;
            for entry in listed.into_iter().flatten() {
                listings.insert(entry.0, entry.1);
            }
            diagnostics.extend(descriptor_disagreements(suite, &listings));
        }

        Preflight {
            unreachable,
            listings,
            diagnostics,
        }
    }

    /// Run one case against all servers.
    async fn run_case(&self, case: &TestCase, preflight: &Preflight) -> CaseOutcome {
        let context_id = case.stateful.then(|| {
            case.context_id
                .clone()
                .unwrap_or_else(|| Uuid::new_v4().to_string())
        });

        let mut failures: Vec<String> = Vec::new();
        let mut runs: Vec<ServerRun> = self
            .clients
            .iter()
            .map(|client| {
                let mut run = ServerRun {
                    records: Vec::new(),
                    dead: false,
                };
                if unreachable_contains(&preflight.unreachable, client.label()) {
                    run.records.push(CallRecord {
                        elapsed_us: 0,
                        server_time_us: None,
                        result: ServerResult::ConnectionFailure {
                            message: "unreachable during preflight".to_string(),
                        },
                    });
                    run.dead = true;
                    failures.push(format!("server '{}' unreachable", client.label()));
                }
                run
            })
            .collect();

        // Fast failure when a reachable server does not list the method.
        if self.options.validate_methods {
            for (i, client) in self.clients.iter().enumerate() {
                if runs[i].dead {
                    continue;
                }
                if let Some(methods) = preflight.listings.get(client.label()) {
                    if !methods.iter().any(|m| m.name == case.method) {
                        runs[i].dead = true;
                        failures.push(format!(
                            "method '{}' is not registered on server '{}'",
                            case.method,
                            client.label()
                        ));
                    }
                }
            }
        }

        // Seed initial state on every live server before the first call.
        if let (Some(ctx), Some(state)) = (&context_id, &case.initial_state) {
            let seeded = join_all(self.clients.iter().enumerate().map(|(i, client)| {
                let alive = !runs[i].dead;
                let state = state.clone();
                async move {
                    if !alive {
                        return None;
                    }
                    client.seed_context(ctx, state).await.err().map(|e| (i, e))
                }
            }))
            .await;
            for (i, failure) in seeded.into_iter().flatten() {
                failures.push(format!(
                    "server '{}': failed to seed context: {}",
                    self.clients[i].label(),
                    failure
                ));
                runs[i].records.push(CallRecord {
                    elapsed_us: 0,
                    server_time_us: None,
                    result: failure.into(),
                });
                runs[i].dead = true;
            }
        }

        for (call_index, (arguments, expected)) in case.effective_calls().into_iter().enumerate() {
            let results = self
                .issue_call(case, &arguments, context_id.as_deref(), &runs)
                .await;

            // Record results and retire servers that errored.
            for (i, elapsed_us, result) in results {
                let record = match result {
                    Ok(invoke) => CallRecord {
                        elapsed_us,
                        server_time_us: Some(invoke.metadata.execution_time_us),
                        result: ServerResult::Success {
                            value: invoke.value,
                        },
                    },
                    Err(failure) => {
                        failures.push(format!(
                            "server '{}' call {}: {}",
                            self.clients[i].label(),
                            call_index + 1,
                            failure
                        ));
                        runs[i].dead = true;
                        CallRecord {
                            elapsed_us,
                            server_time_us: None,
                            result: failure.into(),
                        }
                    }
                };
                runs[i].records.push(record);
            }

            self.evaluate_call(case, call_index, expected.as_ref(), &runs, &mut failures);
        }

        // Generated context ids are private to this case; tear them down so
        // repeated runs against long-lived servers stay deterministic.
        if case.context_id.is_none() {
            if let Some(ctx) = &context_id {
                join_all(self.clients.iter().enumerate().map(|(i, client)| {
                    let alive = !runs[i].dead;
                    async move {
                        if alive {
                            let _ = client.destroy_context(ctx).await;
                        }
                    }
                }))
                .await;
            }
        }

        CaseOutcome {
            name: case.name.clone(),
            passed: failures.is_empty(),
            failures,
            servers: self
                .clients
                .iter()
                .zip(runs)
                .map(|(client, run)| ServerCaseOutcome {
                    label: client.label().to_string(),
                    calls: run.records,
                })
                .collect(),
        }
    }

    /// Issue one invocation to every live server concurrently.
    ///
    /// Calls are logically concurrent across servers; a slow or hung server
    /// only costs its own timeout bound and never blocks collection of the
    /// other servers' results.
    async fn issue_call(
        &self,
        case: &TestCase,
        arguments: &Map<String, Value>,
        context_id: Option<&str>,
        runs: &[ServerRun],
    ) -> Vec<(usize, u64, std::result::Result<crate::rpc::types::InvokeResult, CallFailure>)> {
        let params = InvokeParams {
            method: case.method.clone(),
            arguments: arguments.clone(),
            context_id: context_id.map(String::from),
        };
        let futures = self.clients.iter().enumerate().map(|(i, client)| {
            let alive = !runs[i].dead;
            let params = params.clone();
            async move {
                if !alive {
                    return None;
                }
                let started = Instant::now();
                let result = client.invoke(&params).await;
                Some((i, started.elapsed().as_micros() as u64, result))
            }
        });
        join_all(futures).await.into_iter().flatten().collect()
    }

    /// Compare the latest call's results against `expected` and across
    /// servers.
    fn evaluate_call(
        &self,
        case: &TestCase,
        call_index: usize,
        expected: Option<&Value>,
        runs: &[ServerRun],
        failures: &mut Vec<String>,
    ) {
        let successes: Vec<(&str, &Value)> = self
            .clients
            .iter()
            .zip(runs)
            .filter_map(|(client, run)| {
                run.records
                    .last()
                    .filter(|_| !run.dead)
                    .and_then(|r| r.result.value())
                    .map(|v| (client.label(), v))
            })
            .collect();

        if let Some(expected) = expected {
            for (label, value) in &successes {
                if !self.options.compare.values_equal(value, expected) {
                    failures.push(format!(
                        "server '{}' call {} of '{}': expected {}, got {}",
                        label,
                        call_index + 1,
                        case.method,
                        expected,
                        value
                    ));
                }
            }
        }

        // Cross-server divergence is surfaced even without an expected
        // value.
        if let Some((baseline_label, baseline)) = successes.first() {
            let diverged = successes[1..]
                .iter()
                .any(|(_, value)| !self.options.compare.values_equal(value, baseline));
            if diverged {
                let rendered: Vec<String> = successes
                    .iter()
                    .map(|(label, value)| format!("{}={}", label, value))
                    .collect();
                failures.push(format!(
                    "results differ at call {} (baseline '{}'): {}",
                    call_index + 1,
                    baseline_label,
                    rendered.join(", ")
                ));
            }
        }
    }
}

/// Preflight observations shared by every case.
struct Preflight {
    unreachable: Vec<String>,
    listings: HashMap<String, Vec<MethodDescriptor>>,
    diagnostics: Vec<String>,
}

fn unreachable_contains(unreachable: &[String], label: &str) -> bool {
    unreachable.iter().any(|l| l == label)
}

/// Descriptor-agreement check across servers for every referenced method.
fn descriptor_disagreements(
    suite: &TestSuite,
    listings: &HashMap<String, Vec<MethodDescriptor>>,
) -> Vec<String> {
    let mut diagnostics = Vec::new();
    let mut labels: Vec<&String> = listings.keys().collect();
    labels.sort();
    let referenced: BTreeSet<&str> = suite.referenced_methods();
    for method in referenced {
        let mut found: Vec<(&str, &MethodDescriptor)> = Vec::new();
        for label in &labels {
            if let Some(descriptor) = listings[*label].iter().find(|m| m.name == method) {
                found.push((label, descriptor));
            }
        }
        if let Some((baseline_label, baseline)) = found.first() {
            for (label, descriptor) in &found[1..] {
                if descriptor != baseline {
                    diagnostics.push(format!(
                        "descriptor for '{}' differs between '{}' and '{}'",
                        method, baseline_label, label
                    ));
                }
            }
        }
    }
    diagnostics.sort();
    diagnostics
}
