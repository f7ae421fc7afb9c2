//! Deterministic oracle for tests, demos, and offline runs.
//!
//! This is the seam that lets the state-machine and aggregation logic
//! run without any network dependency: responses are registered per
//! schema name, either as a fixed value or as a queue consumed call by
//! call.

use async_trait::async_trait;
use canvass_core::oracle::{Oracle, OracleError, OracleRequest};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
struct Script {
    fixed: HashMap<&'static str, Value>,
    queued: HashMap<&'static str, Vec<Value>>,
}

/// Queue-backed oracle replaying canned responses.
///
/// Lookup order per request: a queued response for the schema first
/// (consumed), then the fixed response (repeatable). A request with
/// neither fails as a provider error, which makes missing script
/// entries loud in tests.
#[derive(Default)]
pub struct ScriptedOracle {
    script: Mutex<Script>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a response returned every time the schema is requested.
    pub fn with_response(self, schema_name: &'static str, value: Value) -> Self {
        self.script
            .lock()
            .expect("script lock poisoned")
            .fixed
            .insert(schema_name, value);
        self
    }

    /// Queues a one-shot response for the schema; queued responses are
    /// consumed in registration order before any fixed response.
    pub fn push_response(&self, schema_name: &'static str, value: Value) {
        self.script
            .lock()
            .expect("script lock poisoned")
            .queued
            .entry(schema_name)
            .or_default()
            .push(value);
    }

    /// Schema names of every call made so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock poisoned").clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("calls lock poisoned").len()
    }
}

#[async_trait]
impl Oracle for ScriptedOracle {
    async fn infer(&self, request: OracleRequest) -> Result<Value, OracleError> {
        let name = request.expected_schema.name;
        self.calls
            .lock()
            .expect("calls lock poisoned")
            .push(name.to_string());

        let mut script = self.script.lock().expect("script lock poisoned");
        if let Some(queue) = script.queued.get_mut(name) {
            if !queue.is_empty() {
                return Ok(queue.remove(0));
            }
        }
        script.fixed.get(name).cloned().ok_or_else(|| {
            OracleError::provider(format!("no scripted response for schema '{name}'"), false)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canvass_core::oracle::SchemaSpec;
    use serde_json::json;

    fn request(name: &'static str) -> OracleRequest {
        OracleRequest::new("", json!({}), SchemaSpec::new(name, json!({})))
    }

    #[tokio::test]
    async fn queued_responses_drain_before_fixed() {
        let oracle = ScriptedOracle::new().with_response("Echo", json!({"fixed": true}));
        oracle.push_response("Echo", json!({"queued": 1}));
        oracle.push_response("Echo", json!({"queued": 2}));

        assert_eq!(oracle.infer(request("Echo")).await.unwrap(), json!({"queued": 1}));
        assert_eq!(oracle.infer(request("Echo")).await.unwrap(), json!({"queued": 2}));
        assert_eq!(oracle.infer(request("Echo")).await.unwrap(), json!({"fixed": true}));
        assert_eq!(oracle.call_count(), 3);
    }

    #[tokio::test]
    async fn unscripted_schema_fails_loudly() {
        let oracle = ScriptedOracle::new();
        let err = oracle.infer(request("Nope")).await.unwrap_err();
        assert!(matches!(err, OracleError::Provider { .. }));
        assert_eq!(oracle.calls(), vec!["Nope"]);
    }
}
