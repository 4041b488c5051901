//! Structured run reports and rendering
//!
//! The orchestrator produces a [`SuiteReport`]: per-case pass/fail with
//! every server's result value (or failure), caller-side latency per call,
//! and a final summary. Rendering is either a colored human-readable
//! transcript plus a latency table, or machine-readable JSON.
//!
//! A `ResultMismatch` is information in this report, never an error that
//! propagates: one case's mismatch does not stop the run, only the final
//! exit status reflects it.

use crate::error::Result;
use crate::rpc::types::FailureKind;
use crate::rpc::CallFailure;
use chrono::{DateTime, Utc};
use colored::Colorize;
use prettytable::{row, Table};
use serde::Serialize;
use serde_json::Value;

/// Terminal result of one wire call against one server.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ServerResult {
    /// The server returned a value.
    Success {
        /// The returned value.
        value: Value,
    },
    /// The server returned a structured invocation failure.
    Failure {
        /// Failure classification.
        kind: FailureKind,
        /// Server-provided message.
        message: String,
    },
    /// No response within the configured bound.
    Timeout {
        /// Milliseconds waited before abandoning the call.
        elapsed_ms: u64,
    },
    /// The server could not be reached.
    ConnectionFailure {
        /// Transport error description.
        message: String,
    },
    /// The response violated the wire contract.
    ProtocolError {
        /// Description of the violation.
        message: String,
    },
}

impl ServerResult {
    /// The successful value, if any.
    pub fn value(&self) -> Option<&Value> {
        match self {
            ServerResult::Success { value } => Some(value),
            _ => None,
        }
    }

    /// One-line description for the human report.
    pub fn describe(&self) -> String {
        match self {
            ServerResult::Success { value } => {
                serde_json::to_string(value).unwrap_or_else(|_| "<unprintable>".to_string())
            }
            ServerResult::Failure { kind, message } => format!("{}: {}", kind, message),
            ServerResult::Timeout { elapsed_ms } => format!("timeout after {}ms", elapsed_ms),
            ServerResult::ConnectionFailure { message } => {
                format!("connection failure: {}", message)
            }
            ServerResult::ProtocolError { message } => format!("protocol error: {}", message),
        }
    }
}

impl From<CallFailure> for ServerResult {
    fn from(failure: CallFailure) -> Self {
        match failure {
            CallFailure::Invocation(f) => ServerResult::Failure {
                kind: f.kind,
                message: f.message,
            },
            CallFailure::Timeout { elapsed_ms } => ServerResult::Timeout { elapsed_ms },
            CallFailure::Connection(message) => ServerResult::ConnectionFailure { message },
            CallFailure::Protocol(message) => ServerResult::ProtocolError { message },
        }
    }
}

/// One wire call of a case as observed from one server.
#[derive(Debug, Clone, Serialize)]
pub struct CallRecord {
    /// Caller-side wall-clock latency in microseconds.
    pub elapsed_us: u64,
    /// Callee-reported execution time, when the call succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_time_us: Option<u64>,
    /// Terminal result.
    pub result: ServerResult,
}

/// All calls of one case against one server.
#[derive(Debug, Clone, Serialize)]
pub struct ServerCaseOutcome {
    /// Logical server label.
    pub label: String,
    /// Call records in issue order.
    pub calls: Vec<CallRecord>,
}

impl ServerCaseOutcome {
    /// Total caller-side latency across the case's calls.
    pub fn total_elapsed_us(&self) -> u64 {
        self.calls.iter().map(|c| c.elapsed_us).sum()
    }
}

/// Outcome of one test case across all servers.
#[derive(Debug, Clone, Serialize)]
pub struct CaseOutcome {
    /// Case name from the suite.
    pub name: String,
    /// Whether every assertion held for every server.
    pub passed: bool,
    /// Human-readable failure reasons (mismatches, divergences, errors).
    pub failures: Vec<String>,
    /// Per-server observations.
    pub servers: Vec<ServerCaseOutcome>,
}

/// Aggregated result of one orchestration run.
#[derive(Debug, Clone, Serialize)]
pub struct SuiteReport {
    /// Suite name.
    pub suite: String,
    /// Wall-clock start of the run.
    pub started_at: DateTime<Utc>,
    /// Wall-clock end of the run.
    pub finished_at: DateTime<Utc>,
    /// Labels of servers that failed the preflight reachability check.
    pub unreachable: Vec<String>,
    /// Non-fatal preflight observations (e.g. descriptor disagreements).
    pub diagnostics: Vec<String>,
    /// Per-case outcomes in suite order.
    pub cases: Vec<CaseOutcome>,
}

impl SuiteReport {
    /// Number of passed cases.
    pub fn passed(&self) -> usize {
        self.cases.iter().filter(|c| c.passed).count()
    }

    /// Number of failed cases.
    pub fn failed(&self) -> usize {
        self.cases.len() - self.passed()
    }

    /// Whether the run is clean: every case passed and every server was
    /// reachable. Drives the process exit status.
    pub fn all_passed(&self) -> bool {
        self.failed() == 0 && self.unreachable.is_empty()
    }

    /// Serialize the full report as pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Render the colored human-readable report.
    pub fn render_human(&self) -> String {
        let mut out = String::new();
        let rule = "=".repeat(80);

        out.push_str(&format!("{}\n", rule.bright_blue()));
        out.push_str(&format!(
            "{}: {}\n",
            "Test Suite".bright_blue().bold(),
            self.suite
        ));
        out.push_str(&format!("{}\n", rule.bright_blue()));

        for label in &self.unreachable {
            out.push_str(&format!(
                "\n  {} server '{}' was unreachable during preflight\n",
                "!".bright_yellow().bold(),
                label.bright_white()
            ));
        }

        for diagnostic in &self.diagnostics {
            out.push_str(&format!("\n  {} {}\n", "!".bright_yellow().bold(), diagnostic));
        }

        for case in &self.cases {
            if case.passed {
                out.push_str(&format!(
                    "\n  {} {}\n",
                    "✓".bright_green().bold(),
                    case.name.bright_white()
                ));
                for server in &case.servers {
                    out.push_str(&format!(
                        "    ⏱  {}: {}μs\n",
                        server.label,
                        server.total_elapsed_us().to_string().cyan()
                    ));
                }
                if let Some(value) = case
                    .servers
                    .first()
                    .and_then(|s| s.calls.last())
                    .and_then(|c| c.result.value())
                {
                    let rendered =
                        serde_json::to_string(value).unwrap_or_else(|_| "<unprintable>".into());
                    out.push_str(&format!("    Result: {}\n", rendered.dimmed()));
                }
            } else {
                out.push_str(&format!(
                    "\n  {} {}\n",
                    "✗".bright_red().bold(),
                    case.name.bright_white()
                ));
                for reason in &case.failures {
                    for line in reason.lines() {
                        out.push_str(&format!("    {}\n", line.red()));
                    }
                }
            }
        }

        out.push_str(&format!("\n{}\n", self.latency_table()));

        out.push_str(&format!("{}\n", rule.bright_blue()));
        out.push_str(&format!(
            "{}: {}/{} passed\n",
            "Summary".bright_blue().bold(),
            self.passed().to_string().bright_green(),
            self.cases.len().to_string().bright_white()
        ));
        if self.failed() > 0 {
            out.push_str(&format!(
                "  {} tests failed\n",
                self.failed().to_string().bright_red()
            ));
        }
        if !self.unreachable.is_empty() {
            out.push_str(&format!(
                "  {} servers unreachable\n",
                self.unreachable.len().to_string().bright_yellow()
            ));
        }
        out.push_str(&format!("{}\n", rule.bright_blue()));
        out
    }

    /// Per-case, per-server caller-side latency table.
    fn latency_table(&self) -> Table {
        let mut labels: Vec<&str> = Vec::new();
        for case in &self.cases {
            for server in &case.servers {
                if !labels.contains(&server.label.as_str()) {
                    labels.push(&server.label);
                }
            }
        }

        let mut table = Table::new();
        let mut header = row!["Test"];
        for label in &labels {
            header.add_cell(prettytable::Cell::new(&format!("{} (μs)", label)));
        }
        table.add_row(header);

        for case in &self.cases {
            let mut data = row![case.name];
            for label in &labels {
                let cell = case
                    .servers
                    .iter()
                    .find(|s| s.label.as_str() == *label)
                    .map(|s| s.total_elapsed_us().to_string())
                    .unwrap_or_else(|| "-".to_string());
                data.add_cell(prettytable::Cell::new(&cell));
            }
            table.add_row(data);
        }
        table
    }
}
