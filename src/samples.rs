//! Sample function library for the reference server
//!
//! These bodies are test payloads, not harness logic: they exist so that a
//! `lockstep serve` process has something to invoke and so suites have a
//! known-good implementation to compare other languages against. A
//! conforming implementation in another language registers the same
//! descriptors and must produce the same observable results.

use crate::error::Result;
use crate::registry::{handler_fn, FunctionRegistry, MethodOutput};
use crate::rpc::types::{MethodDescriptor, ParameterSpec, TypeTag};
use anyhow::bail;
use serde_json::{json, Value};

/// Register the whole sample library.
///
/// # Errors
///
/// Returns [`crate::error::LockstepError::DuplicateMethod`] if any sample
/// name is already taken in `registry`.
pub fn register_samples(registry: &mut FunctionRegistry) -> Result<()> {
    registry.register(
        MethodDescriptor::new("add", "Add two numbers", TypeTag::Int)
            .with_parameter(ParameterSpec::new("a", TypeTag::Int))
            .with_parameter(ParameterSpec::new("b", TypeTag::Int)),
        handler_fn(|args, _state| {
            let a = require_i64(args, "a")?;
            let b = require_i64(args, "b")?;
            match a.checked_add(b) {
                Some(sum) => Ok(MethodOutput::value(json!(sum))),
                None => bail!("integer overflow in add({}, {})", a, b),
            }
        }),
    )?;

    registry.register(
        MethodDescriptor::new("multiply", "Multiply two numbers", TypeTag::Int)
            .with_parameter(ParameterSpec::new("a", TypeTag::Int))
            .with_parameter(ParameterSpec::new("b", TypeTag::Int)),
        handler_fn(|args, _state| {
            let a = require_i64(args, "a")?;
            let b = require_i64(args, "b")?;
            match a.checked_mul(b) {
                Some(product) => Ok(MethodOutput::value(json!(product))),
                None => bail!("integer overflow in multiply({}, {})", a, b),
            }
        }),
    )?;

    registry.register(
        MethodDescriptor::new("fibonacci", "Calculate the nth Fibonacci number", TypeTag::Int)
            .with_parameter(ParameterSpec::new("n", TypeTag::Int)),
        handler_fn(|args, _state| {
            let n = require_i64(args, "n")?;
            if n < 0 {
                bail!("fibonacci is undefined for negative n");
            }
            if n <= 1 {
                return Ok(MethodOutput::value(json!(n)));
            }
            let mut a = 0i64;
            let mut b = 1i64;
            for _ in 2..=n {
                let next = match a.checked_add(b) {
                    Some(next) => next,
                    None => bail!("fibonacci({}) overflows i64", n),
                };
                a = b;
                b = next;
            }
            Ok(MethodOutput::value(json!(b)))
        }),
    )?;

    registry.register(
        MethodDescriptor::new("factorial", "Calculate factorial of a number", TypeTag::Int)
            .with_parameter(ParameterSpec::new("n", TypeTag::Int)),
        handler_fn(|args, _state| {
            let n = require_i64(args, "n")?;
            if n < 0 {
                bail!("factorial is undefined for negative n");
            }
            let mut acc = 1i64;
            for i in 2..=n {
                acc = match acc.checked_mul(i) {
                    Some(acc) => acc,
                    None => bail!("factorial({}) overflows i64", n),
                };
            }
            Ok(MethodOutput::value(json!(acc)))
        }),
    )?;

    registry.register(
        MethodDescriptor::new("is_prime", "Check if a number is prime", TypeTag::Bool)
            .with_parameter(ParameterSpec::new("n", TypeTag::Int)),
        handler_fn(|args, _state| {
            let n = require_i64(args, "n")?;
            Ok(MethodOutput::value(json!(is_prime(n))))
        }),
    )?;

    registry.register(
        MethodDescriptor::new(
            "counter_increment",
            "Increment a counter (stateful)",
            TypeTag::Int,
        )
        .stateful(),
        handler_fn(|_args, state| {
            let current = counter_value(state.as_ref());
            let next = current + 1;
            Ok(MethodOutput::with_state(
                json!(next),
                json!({"counter": next}),
            ))
        }),
    )?;

    registry.register(
        MethodDescriptor::new(
            "counter_get",
            "Get current counter value (stateful)",
            TypeTag::Int,
        )
        .stateful(),
        handler_fn(|_args, state| {
            Ok(MethodOutput::value(json!(counter_value(state.as_ref()))))
        }),
    )?;

    registry.register(
        MethodDescriptor::new(
            "accumulate",
            "Append a value to the session's item list (stateful)",
            TypeTag::List,
        )
        .stateful()
        .with_parameter(ParameterSpec::new("item", TypeTag::Any)),
        handler_fn(|args, state| {
            let item = args.get("item").cloned().unwrap_or(Value::Null);
            let mut items = state
                .as_ref()
                .and_then(|s| s.get("items"))
                .and_then(|v| v.as_array())
                .cloned()
                .unwrap_or_default();
            items.push(item);
            let items = Value::Array(items);
            Ok(MethodOutput::with_state(
                items.clone(),
                json!({"items": items}),
            ))
        }),
    )?;

    Ok(())
}

fn require_i64(args: &serde_json::Map<String, Value>, name: &str) -> Result<i64> {
    match args.get(name).and_then(|v| v.as_i64()) {
        Some(n) => Ok(n),
        None => bail!("argument '{}' is out of i64 range", name),
    }
}

fn counter_value(state: Option<&Value>) -> i64 {
    state
        .and_then(|s| s.get("counter"))
        .and_then(|v| v.as_i64())
        .unwrap_or(0)
}

fn is_prime(n: i64) -> bool {
    if n < 2 {
        return false;
    }
    if n == 2 {
        return true;
    }
    if n % 2 == 0 {
        return false;
    }
    let limit = (n as f64).sqrt() as i64;
    let mut i = 3;
    while i <= limit {
        if n % i == 0 {
            return false;
        }
        i += 2;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextStore;
    use crate::dispatch::Dispatcher;
    use crate::rpc::types::InvokeParams;
    use serde_json::Map;
    use std::sync::Arc;

    fn sample_dispatcher() -> Dispatcher {
        let mut registry = FunctionRegistry::new();
        register_samples(&mut registry).unwrap();
        Dispatcher::new(Arc::new(registry), Arc::new(ContextStore::new()))
    }

    fn args(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    async fn call(
        dispatcher: &Dispatcher,
        method: &str,
        arguments: Map<String, Value>,
        context_id: Option<&str>,
    ) -> std::result::Result<Value, crate::dispatch::InvocationFailure> {
        dispatcher
            .dispatch(&InvokeParams {
                method: method.to_string(),
                arguments,
                context_id: context_id.map(String::from),
            })
            .await
            .map(|r| r.value)
    }

    #[tokio::test]
    async fn test_register_samples_registers_all() {
        let d = sample_dispatcher();
        let names: Vec<String> = d
            .registry()
            .descriptors(None)
            .into_iter()
            .map(|m| m.name)
            .collect();
        assert_eq!(
            names,
            vec![
                "add",
                "multiply",
                "fibonacci",
                "factorial",
                "is_prime",
                "counter_increment",
                "counter_get",
                "accumulate"
            ]
        );
    }

    #[tokio::test]
    async fn test_add() {
        let d = sample_dispatcher();
        let v = call(&d, "add", args(&[("a", json!(5)), ("b", json!(3))]), None)
            .await
            .unwrap();
        assert_eq!(v, json!(8));
    }

    #[tokio::test]
    async fn test_add_overflow_is_execution_failure() {
        let d = sample_dispatcher();
        let failure = call(
            &d,
            "add",
            args(&[("a", json!(i64::MAX)), ("b", json!(1))]),
            None,
        )
        .await
        .unwrap_err();
        assert_eq!(
            failure.kind,
            crate::rpc::types::FailureKind::ExecutionFailure
        );
        assert!(failure.message.contains("overflow"));
    }

    #[tokio::test]
    async fn test_fibonacci_sequence() {
        let d = sample_dispatcher();
        for (n, expected) in [(0, 0), (1, 1), (2, 1), (10, 55), (20, 6765)] {
            let v = call(&d, "fibonacci", args(&[("n", json!(n))]), None)
                .await
                .unwrap();
            assert_eq!(v, json!(expected), "fibonacci({})", n);
        }
    }

    #[tokio::test]
    async fn test_factorial() {
        let d = sample_dispatcher();
        let v = call(&d, "factorial", args(&[("n", json!(5))]), None)
            .await
            .unwrap();
        assert_eq!(v, json!(120));
        let v = call(&d, "factorial", args(&[("n", json!(0))]), None)
            .await
            .unwrap();
        assert_eq!(v, json!(1));
    }

    #[tokio::test]
    async fn test_is_prime() {
        let d = sample_dispatcher();
        for (n, expected) in [(1, false), (2, true), (9, false), (97, true), (-7, false)] {
            let v = call(&d, "is_prime", args(&[("n", json!(n))]), None)
                .await
                .unwrap();
            assert_eq!(v, json!(expected), "is_prime({})", n);
        }
    }

    #[tokio::test]
    async fn test_counter_roundtrip() {
        let d = sample_dispatcher();
        d.contexts().seed("s", json!({"counter": 10})).await;
        let v = call(&d, "counter_increment", Map::new(), Some("s"))
            .await
            .unwrap();
        assert_eq!(v, json!(11));
        let v = call(&d, "counter_get", Map::new(), Some("s")).await.unwrap();
        assert_eq!(v, json!(11));
    }

    #[tokio::test]
    async fn test_accumulate_builds_list() {
        let d = sample_dispatcher();
        for item in [json!(1), json!("two"), json!([3])] {
            call(&d, "accumulate", args(&[("item", item)]), Some("acc"))
                .await
                .unwrap();
        }
        let v = call(&d, "accumulate", args(&[("item", json!(null))]), Some("acc"))
            .await
            .unwrap();
        assert_eq!(v, json!([1, "two", [3], null]));
    }
}
