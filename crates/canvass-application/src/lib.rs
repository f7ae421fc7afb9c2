//! Application services for Canvass.
//!
//! This layer owns the session API surface consumed by the transport
//! layer (HTTP, CLI): starting interviews, accepting answers under the
//! per-session lock, producing final results, and running team-review
//! synthesis. It wires the core state machines to a concrete oracle
//! and a profile provider.

mod interview_service;
mod profile_provider;
mod synthesis_service;

pub use interview_service::{
    AnswerOutcome, InterviewContext, InterviewResult, InterviewService, QaPair, StartedInterview,
};
pub use profile_provider::StaticProfileProvider;
pub use synthesis_service::{SynthesisService, normalize_keyword};

// Re-exported so transports depend on one crate for the answer() contract.
pub use tokio_util::sync::CancellationToken;
