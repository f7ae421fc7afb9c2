//! The Inference Oracle boundary.
//!
//! Every semantic judgment in Canvass (question generation, answer
//! analysis, synthesis, classification narrative) is delegated to an
//! external text-inference service behind the [`Oracle`] trait. The
//! core never inspects prompt wording; it hands the oracle a fixed
//! instruction block, a structured context payload, and the schema the
//! response must conform to, and requires nothing but schema
//! conformance back. Production implementations call a hosted LLM;
//! test implementations are deterministic stubs.

mod client;

pub use client::OracleClient;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

/// A named JSON schema the oracle response must conform to.
///
/// Conformance is checked by deserializing the raw response into the
/// Rust type that declared the schema; the JSON document itself is
/// forwarded to the oracle so providers that support structured output
/// can enforce it server-side.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaSpec {
    pub name: &'static str,
    pub schema: Value,
}

impl SchemaSpec {
    pub fn new(name: &'static str, schema: Value) -> Self {
        Self { name, schema }
    }
}

/// A single oracle call: fixed instructions, structured context, and
/// the schema of the expected response.
#[derive(Debug, Clone)]
pub struct OracleRequest {
    pub system_instructions: String,
    pub context_payload: Value,
    pub expected_schema: SchemaSpec,
}

impl OracleRequest {
    pub fn new(
        system_instructions: impl Into<String>,
        context_payload: Value,
        expected_schema: SchemaSpec,
    ) -> Self {
        Self {
            system_instructions: system_instructions.into(),
            context_payload,
            expected_schema,
        }
    }
}

/// Typed failure modes of an oracle call.
#[derive(Error, Debug)]
pub enum OracleError {
    /// The call exceeded its bounded deadline.
    #[error("Oracle call timed out")]
    Timeout,

    /// The response did not conform to the expected schema.
    #[error("Oracle returned malformed output: {0}")]
    Malformed(String),

    /// The provider failed outright (network, HTTP error, quota).
    #[error("Oracle provider error ({status_code:?}): {message}")]
    Provider {
        status_code: Option<u16>,
        message: String,
        is_retryable: bool,
    },
}

impl OracleError {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }

    pub fn provider(message: impl Into<String>, is_retryable: bool) -> Self {
        Self::Provider {
            status_code: None,
            message: message.into(),
            is_retryable,
        }
    }

    /// Whether a single retry is worth attempting.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout => true,
            Self::Malformed(_) => true,
            Self::Provider { is_retryable, .. } => *is_retryable,
        }
    }
}

/// The external inference service abstraction.
///
/// Implementations perform exactly one inference attempt per call;
/// timeout and retry policy belong to [`OracleClient`].
#[async_trait]
pub trait Oracle: Send + Sync {
    async fn infer(&self, request: OracleRequest) -> std::result::Result<Value, OracleError>;
}

/// A response type the oracle can be asked for.
///
/// Implementors pair a Rust type with the JSON schema sent along in
/// the request, so call sites stay strategy-agnostic:
/// `client.infer_as::<AnswerFeedback>(...)`.
pub trait OracleResponse: DeserializeOwned {
    fn schema() -> SchemaSpec;
}
