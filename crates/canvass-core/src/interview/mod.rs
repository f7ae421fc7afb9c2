//! Question sequencing.
//!
//! A sequencer is the stateful policy deciding the next question and
//! completion status for one interview session. Three variants share
//! one contract: [`LinearSequencer`] walks a fixed list,
//! [`SkillDepthSequencer`] drills three skills through three depth
//! levels, and [`PhasedPersonaSequencer`] adapts its questions to the
//! persona signal accumulated so far.

mod linear;
mod phased;
mod skill_depth;

pub use linear::LinearSequencer;
pub use phased::{PersonaPhase, PhasedPersonaSequencer, QaRecord};
pub use skill_depth::{
    AnswerFeedback, SkillAnswer, SkillDepthSequencer, SkillLevel, SkillTrack, SkillTrackResults,
    select_skills,
};

use crate::error::Result;
use crate::oracle::{OracleResponse, SchemaSpec};
use crate::persona::PersonaDimension;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use strum_macros::Display;

/// The interview variants a session can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum InterviewKind {
    /// Fixed question list, one respondent.
    General,
    /// Fixed question list, every slot answered by each team member.
    TeamReview,
    /// Three skills, three depth levels each.
    SkillDepth,
    /// Exploration, deep-dive, validation over persona dimensions.
    PhasedPersona,
}

/// A question issued to a respondent. Immutable once issued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub text: String,
    /// What the question is probing: a slot tag, a skill name, or a phase.
    pub topic: String,
    /// Persona dimensions this question targets (phased interviews only).
    #[serde(default)]
    pub target_dimensions: Vec<PersonaDimension>,
}

impl Question {
    pub fn new(id: impl Into<String>, text: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            topic: topic.into(),
            target_dimensions: Vec::new(),
        }
    }

    pub fn with_dimensions(mut self, dimensions: Vec<PersonaDimension>) -> Self {
        self.target_dimensions = dimensions;
        self
    }
}

/// One submitted answer. `respondent_id` only matters for
/// multi-respondent flows; single-respondent sequencers accept any
/// stable value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub question_id: String,
    pub respondent_id: String,
    pub text: String,
    pub submitted_at: DateTime<Utc>,
}

/// Why a submission was turned away without touching session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[strum(serialize_all = "snake_case")]
pub enum RejectReason {
    /// The interview already completed.
    InterviewComplete,
    /// The answer targets a question that is not the live slot.
    StaleQuestion,
    /// This respondent already answered the live slot.
    AlreadyAnswered,
    /// No question has been issued yet.
    NotIssued,
}

/// Outcome of one `submit_answer` call, as data rather than
/// exception-driven branching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Transition {
    /// The answer was accepted and the interview moved to a new slot.
    Advanced,
    /// The answer was accepted; the slot re-issues until `remaining`
    /// more respondents have answered it.
    Waiting { remaining: u32 },
    /// The answer was accepted and it was the last one.
    Completed,
    /// The answer was refused; state is unchanged.
    Rejected(RejectReason),
}

impl Transition {
    /// Whether the submission was accepted (anything but a rejection).
    pub fn accepted(&self) -> bool {
        !matches!(self, Self::Rejected(_))
    }
}

/// Read-only progress snapshot, cheap to copy out of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub answered: u32,
    pub total: u32,
    /// Variant-specific stage label, e.g. a skill name or phase.
    pub stage: Option<String>,
}

/// The sequencing contract shared by all interview variants.
///
/// `next_question` is idempotent: calling it repeatedly without an
/// intervening accepted answer re-issues the same question (generating
/// and caching it on first call for the adaptive variants).
/// `submit_answer` is atomic with respect to oracle calls: the answer
/// and any derived signal are committed only after the oracle call for
/// it has completed, so an aborted call leaves the sequencer in its
/// pre-call state.
#[async_trait]
pub trait Sequencer: Send + Sync {
    fn kind(&self) -> InterviewKind;

    async fn next_question(&mut self) -> Result<Option<Question>>;

    async fn submit_answer(&mut self, answer: Answer) -> Result<Transition>;

    fn is_finished(&self) -> bool;

    fn progress(&self) -> Progress;
}

/// An oracle-generated interview question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedQuestion {
    pub question: String,
    /// Why this question is being asked, for the reviewing recruiter.
    pub rationale: String,
}

impl OracleResponse for GeneratedQuestion {
    fn schema() -> SchemaSpec {
        SchemaSpec::new(
            "GeneratedQuestion",
            json!({
                "type": "object",
                "required": ["question", "rationale"],
                "properties": {
                    "question": {"type": "string", "minLength": 20, "maxLength": 300},
                    "rationale": {"type": "string", "minLength": 10}
                }
            }),
        )
    }
}
