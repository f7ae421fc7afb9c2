//! Prompt rendering for the REST oracle.
//!
//! The core hands over structured context and a schema; this module
//! renders the single user message the provider sees. Wording lives
//! here and nowhere else.

use canvass_core::oracle::{OracleError, OracleRequest};
use minijinja::{Environment, context};
use once_cell::sync::Lazy;

const USER_TEMPLATE: &str = r#"{{ context_payload }}

Respond with a single JSON object conforming to this schema ({{ schema_name }}):
{{ schema }}

IMPORTANT: Output ONLY valid JSON, no markdown formatting or code blocks."#;

static ENV: Lazy<Environment<'static>> = Lazy::new(|| {
    let mut env = Environment::new();
    env.add_template("user", USER_TEMPLATE)
        .expect("builtin template must parse");
    env
});

/// Renders the user-message body for one oracle request.
pub fn render_user_prompt(request: &OracleRequest) -> Result<String, OracleError> {
    let template = ENV.get_template("user").expect("builtin template registered");
    let payload = serde_json::to_string_pretty(&request.context_payload)
        .map_err(|e| OracleError::malformed(format!("unserializable context payload: {e}")))?;
    let schema = serde_json::to_string_pretty(&request.expected_schema.schema)
        .map_err(|e| OracleError::malformed(format!("unserializable schema: {e}")))?;
    template
        .render(context! {
            context_payload => payload,
            schema_name => request.expected_schema.name,
            schema => schema,
        })
        .map_err(|e| OracleError::malformed(format!("prompt template failed: {e}")))
}
