//! Concrete oracle implementations for Canvass.
//!
//! Production inference goes through [`ApiOracle`], a direct REST
//! client for OpenAI-compatible chat-completions endpoints. Tests,
//! demos, and offline runs use [`ScriptedOracle`], which replays
//! canned responses deterministically.

mod api_oracle;
mod prompts;
mod scripted;
pub mod secret;

pub use api_oracle::ApiOracle;
pub use scripted::ScriptedOracle;
