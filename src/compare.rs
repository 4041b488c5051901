//! Value-equality rules for cross-server result comparison
//!
//! Two results from independent implementations are compared structurally:
//!
//! - numbers compare by numeric value irrespective of representation width
//!   (`1` equals `1.0`; an `i64` equals the same value decoded as `u64`);
//! - floating-point comparison uses a combined absolute/relative tolerance
//!   rather than bit-exact equality, since independent runtimes may round
//!   differently;
//! - strings, booleans, and null compare literally;
//! - sequences compare element-wise in order;
//! - mappings compare by key set and per-key equality, ignoring insertion
//!   order;
//! - values of different shapes (string vs number, list vs map) are never
//!   equal.

use serde_json::Value;

/// Default tolerance used for floating-point comparison.
pub const DEFAULT_FLOAT_TOLERANCE: f64 = 1e-9;

/// Comparison policy, currently just the float tolerance.
///
/// The tolerance is applied both absolutely and relative to the larger
/// magnitude: `a` and `b` are equal when
/// `|a - b| <= max(tol, tol * max(|a|, |b|))`.
#[derive(Debug, Clone, Copy)]
pub struct ComparePolicy {
    /// Combined absolute/relative epsilon for float comparison.
    pub float_tolerance: f64,
}

impl Default for ComparePolicy {
    fn default() -> Self {
        Self {
            float_tolerance: DEFAULT_FLOAT_TOLERANCE,
        }
    }
}

impl ComparePolicy {
    /// Create a policy with an explicit float tolerance.
    pub fn with_tolerance(float_tolerance: f64) -> Self {
        Self { float_tolerance }
    }

    /// Structural equality of two values under this policy.
    pub fn values_equal(&self, a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(x), Value::Bool(y)) => x == y,
            (Value::String(x), Value::String(y)) => x == y,
            (Value::Number(_), Value::Number(_)) => self.numbers_equal(a, b),
            (Value::Array(xs), Value::Array(ys)) => {
                xs.len() == ys.len()
                    && xs
                        .iter()
                        .zip(ys.iter())
                        .all(|(x, y)| self.values_equal(x, y))
            }
            (Value::Object(xs), Value::Object(ys)) => {
                xs.len() == ys.len()
                    && xs.iter().all(|(key, x)| {
                        ys.get(key).map_or(false, |y| self.values_equal(x, y))
                    })
            }
            _ => false,
        }
    }

    /// Numeric equality across integer widths and float representations.
    fn numbers_equal(&self, a: &Value, b: &Value) -> bool {
        // Exact comparison when both sides are integers.
        if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
            return x == y;
        }
        if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
            return x == y;
        }
        // Mixed-sign integer comparison falls through here with one side
        // out of i64 range; those values cannot be equal.
        match (a.as_f64(), b.as_f64(), a.is_f64() || b.is_f64()) {
            (Some(x), Some(y), true) => self.floats_equal(x, y),
            _ => false,
        }
    }

    fn floats_equal(&self, x: f64, y: f64) -> bool {
        if x == y {
            return true;
        }
        let tol = self.float_tolerance;
        let scale = x.abs().max(y.abs());
        (x - y).abs() <= tol.max(tol * scale)
    }
}
