//! Timeout and retry policy around a raw [`Oracle`].

use super::{Oracle, OracleError, OracleRequest, OracleResponse};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// A shared handle to the oracle that enforces the call policy every
/// component relies on: each call carries a bounded deadline, and a
/// transient failure is retried at most once before the error is
/// handed back to the caller for local fallback handling.
#[derive(Clone)]
pub struct OracleClient {
    inner: Arc<dyn Oracle>,
    timeout: Duration,
}

impl OracleClient {
    pub fn new(inner: Arc<dyn Oracle>) -> Self {
        Self {
            inner,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Overrides the per-call deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Performs one inference with the deadline and single-retry policy,
    /// returning the raw JSON value.
    pub async fn infer_value(&self, request: OracleRequest) -> Result<Value, OracleError> {
        match self.attempt(request.clone()).await {
            Ok(value) => Ok(value),
            Err(err) if err.is_transient() => {
                warn!(schema = request.expected_schema.name, error = %err, "oracle call failed, retrying once");
                self.attempt(request).await
            }
            Err(err) => Err(err),
        }
    }

    /// Performs one inference and decodes the response into `T`.
    ///
    /// A response that fails to decode counts as a transient failure:
    /// the request is re-sent once, and only then does the call fail
    /// with [`OracleError::Malformed`].
    pub async fn infer_as<T: OracleResponse>(
        &self,
        system_instructions: impl Into<String>,
        context_payload: Value,
    ) -> Result<T, OracleError> {
        let request = OracleRequest::new(system_instructions, context_payload, T::schema());

        match self.attempt_typed::<T>(request.clone()).await {
            Ok(decoded) => Ok(decoded),
            Err(err) if err.is_transient() => {
                warn!(schema = request.expected_schema.name, error = %err, "oracle call failed, retrying once");
                self.attempt_typed::<T>(request).await
            }
            Err(err) => Err(err),
        }
    }

    async fn attempt(&self, request: OracleRequest) -> Result<Value, OracleError> {
        tokio::time::timeout(self.timeout, self.inner.infer(request))
            .await
            .map_err(|_| OracleError::Timeout)?
    }

    async fn attempt_typed<T: OracleResponse>(
        &self,
        request: OracleRequest,
    ) -> Result<T, OracleError> {
        let schema_name = request.expected_schema.name;
        let value = self.attempt(request).await?;
        serde_json::from_value(value).map_err(|err| {
            OracleError::malformed(format!("response does not match {schema_name}: {err}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::SchemaSpec;
    use async_trait::async_trait;
    use serde::Deserialize;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Echo {
        text: String,
    }

    impl OracleResponse for Echo {
        fn schema() -> SchemaSpec {
            SchemaSpec::new(
                "Echo",
                json!({"type": "object", "properties": {"text": {"type": "string"}}}),
            )
        }
    }

    /// Oracle that pops one canned result per call.
    struct QueueOracle {
        responses: Mutex<Vec<Result<Value, OracleError>>>,
        calls: Mutex<u32>,
    }

    impl QueueOracle {
        fn new(responses: Vec<Result<Value, OracleError>>) -> Self {
            Self {
                responses: Mutex::new(responses),
                calls: Mutex::new(0),
            }
        }

        fn call_count(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl Oracle for QueueOracle {
        async fn infer(&self, _request: OracleRequest) -> Result<Value, OracleError> {
            *self.calls.lock().unwrap() += 1;
            self.responses
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(OracleError::provider("queue exhausted", false)))
        }
    }

    #[tokio::test]
    async fn retries_once_on_transient_failure() {
        let oracle = Arc::new(QueueOracle::new(vec![
            Ok(json!({"text": "second"})),
            Err(OracleError::provider("rate limited", true)),
        ]));
        let client = OracleClient::new(oracle.clone());

        let echo: Echo = client
            .infer_as("echo back", json!({}))
            .await
            .expect("retry should succeed");

        assert_eq!(echo.text, "second");
        assert_eq!(oracle.call_count(), 2);
    }

    #[tokio::test]
    async fn does_not_retry_permanent_failure() {
        let oracle = Arc::new(QueueOracle::new(vec![
            Ok(json!({"text": "unreachable"})),
            Err(OracleError::provider("invalid api key", false)),
        ]));
        let client = OracleClient::new(oracle.clone());

        let result = client.infer_as::<Echo>("echo back", json!({})).await;

        assert!(matches!(result, Err(OracleError::Provider { .. })));
        assert_eq!(oracle.call_count(), 1);
    }

    #[tokio::test]
    async fn malformed_after_retry_surfaces_as_malformed() {
        let oracle = Arc::new(QueueOracle::new(vec![
            Ok(json!({"wrong": 1})),
            Ok(json!({"also_wrong": 2})),
        ]));
        let client = OracleClient::new(oracle.clone());

        let result = client.infer_as::<Echo>("echo back", json!({})).await;

        assert!(matches!(result, Err(OracleError::Malformed(_))));
        assert_eq!(oracle.call_count(), 2);
    }
}
