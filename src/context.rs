//! Session/context store for stateful method invocations
//!
//! Maps an opaque context identifier to a single accumulated state value,
//! scoped to one server process and never persisted across restarts. The
//! store is an explicit component: the server constructs it at startup and
//! hands it to the dispatch engine by reference, never reached
//! through ambient/global lookup.
//!
//! # Concurrency
//!
//! Each context id owns its own `tokio::sync::Mutex<Value>`. The dispatch
//! engine holds that mutex for the full duration of a stateful invocation,
//! so two concurrent requests against the *same* id are serialized and lost
//! updates are impossible. The outer `RwLock` only guards the shape of the
//! map (insert/remove) and is held briefly, so requests against *different*
//! ids never block each other.

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// The empty/default state handed to unseen context ids.
fn empty_state() -> Value {
    Value::Object(Map::new())
}

/// Keyed storage for per-session mutable state.
///
/// Contexts are created lazily on first stateful invocation (or by an
/// explicit [`ContextStore::seed`]) and live until destroyed or until the
/// process exits.
pub struct ContextStore {
    contexts: RwLock<HashMap<String, Arc<Mutex<Value>>>>,
}

impl ContextStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            contexts: RwLock::new(HashMap::new()),
        }
    }

    /// The lock cell for `id`, creating it with empty state if unseen.
    ///
    /// The dispatch engine locks the returned mutex across the whole
    /// read-execute-write cycle of a stateful invocation.
    pub(crate) async fn entry(&self, id: &str) -> Arc<Mutex<Value>> {
        {
            let contexts = self.contexts.read().await;
            if let Some(cell) = contexts.get(id) {
                return Arc::clone(cell);
            }
        }
        let mut contexts = self.contexts.write().await;
        // Re-check: another task may have created the entry between locks.
        Arc::clone(
            contexts
                .entry(id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(empty_state()))),
        )
    }

    /// Snapshot the current state for `id`.
    ///
    /// Unseen ids yield an empty mapping without creating an entry, so
    /// diagnostic inspection does not perturb the store.
    pub async fn get(&self, id: &str) -> Value {
        let contexts = self.contexts.read().await;
        match contexts.get(id) {
            Some(cell) => cell.lock().await.clone(),
            None => empty_state(),
        }
    }

    /// Replace the stored state for `id`, creating the entry if needed.
    pub async fn put(&self, id: &str, value: Value) {
        let cell = self.entry(id).await;
        let mut state = cell.lock().await;
        *state = value;
    }

    /// Set initial state for `id` only if it is unseen.
    ///
    /// Returns `false` (and leaves stored state untouched) when the id
    /// already has state, keeping repeated seeding deterministic within a
    /// process lifetime.
    pub async fn seed(&self, id: &str, value: Value) -> bool {
        let mut contexts = self.contexts.write().await;
        if contexts.contains_key(id) {
            tracing::debug!(context_id = %id, "seed skipped, context already exists");
            return false;
        }
        contexts.insert(id.to_string(), Arc::new(Mutex::new(value)));
        tracing::debug!(context_id = %id, "seeded context");
        true
    }

    /// Discard `id` and its state. Returns `false` for unseen ids.
    pub async fn destroy(&self, id: &str) -> bool {
        let removed = self.contexts.write().await.remove(id).is_some();
        if removed {
            tracing::debug!(context_id = %id, "destroyed context");
        }
        removed
    }

    /// Number of live contexts.
    pub async fn len(&self) -> usize {
        self.contexts.read().await.len()
    }

    /// Whether the store holds no contexts.
    pub async fn is_empty(&self) -> bool {
        self.contexts.read().await.is_empty()
    }
}

impl Default for ContextStore {
    fn default() -> Self {
        Self::new()
    }
}
