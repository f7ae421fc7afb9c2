//! The session API surface.
//!
//! One service instance owns the session store and hands every
//! transport (HTTP, CLI) the same contract: `start`, `answer`,
//! `progress`, `get_result`, `delete`. Mutations run under the
//! per-session progression lock, held across exactly one
//! read-oracle-write transition; an aborted `answer` leaves the
//! session in its pre-call state because sequencers commit only after
//! their oracle calls return. Read-only status comes from a snapshot
//! the oracle never holds, so progress queries are not blocked by an
//! in-flight transition.

use async_trait::async_trait;
use canvass_core::error::{CanvassError, Result};
use canvass_core::interview::{
    Answer, AnswerFeedback, InterviewKind, LinearSequencer, PhasedPersonaSequencer, Progress,
    Question, Sequencer, SkillDepthSequencer, SkillTrackResults, Transition,
};
use canvass_core::oracle::OracleClient;
use canvass_core::persona::FinalPersonaReport;
use canvass_core::profile::{GeneralAnalysis, ProfileProvider};
use canvass_core::session::{Clock, IdGenerator, SessionStore};
use canvass_core::synthesis::{
    Perspective, PerspectiveRecord, SynthesisResult, SynthesisStrategy, synthesize,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::info;

const GENERAL_ANALYSIS_INSTRUCTIONS: &str = "You are an HR analyst. Summarize this interview \
     transcript: the themes the respondent kept returning to, the technical areas they showed \
     interest in, work-style signals, emphasized experiences, and every technology keyword \
     mentioned. Use only what the transcript states.";

/// What `start` needs to know per interview kind. The caller picks the
/// synthesis strategy for team reviews; that judgment depends on
/// answer length and respondent count, which are its business.
#[derive(Debug, Clone, PartialEq)]
pub enum InterviewContext {
    General,
    TeamReview {
        team_size: u32,
        strategy: SynthesisStrategy,
    },
    SkillDepth {
        subject_id: String,
    },
    PhasedPersona,
}

impl InterviewContext {
    pub fn kind(&self) -> InterviewKind {
        match self {
            Self::General => InterviewKind::General,
            Self::TeamReview { .. } => InterviewKind::TeamReview,
            Self::SkillDepth { .. } => InterviewKind::SkillDepth,
            Self::PhasedPersona => InterviewKind::PhasedPersona,
        }
    }
}

/// The sequencer variants a session can hold. The tagged form keeps
/// result extraction exhaustive while the [`Sequencer`] impl below
/// keeps progression code variant-agnostic.
enum SessionSequencer {
    Linear(LinearSequencer),
    SkillDepth(SkillDepthSequencer),
    Phased(PhasedPersonaSequencer),
}

#[async_trait]
impl Sequencer for SessionSequencer {
    fn kind(&self) -> InterviewKind {
        match self {
            Self::Linear(seq) => seq.kind(),
            Self::SkillDepth(seq) => seq.kind(),
            Self::Phased(seq) => seq.kind(),
        }
    }

    async fn next_question(&mut self) -> Result<Option<Question>> {
        match self {
            Self::Linear(seq) => seq.next_question().await,
            Self::SkillDepth(seq) => seq.next_question().await,
            Self::Phased(seq) => seq.next_question().await,
        }
    }

    async fn submit_answer(&mut self, answer: Answer) -> Result<Transition> {
        match self {
            Self::Linear(seq) => seq.submit_answer(answer).await,
            Self::SkillDepth(seq) => seq.submit_answer(answer).await,
            Self::Phased(seq) => seq.submit_answer(answer).await,
        }
    }

    fn is_finished(&self) -> bool {
        match self {
            Self::Linear(seq) => seq.is_finished(),
            Self::SkillDepth(seq) => seq.is_finished(),
            Self::Phased(seq) => seq.is_finished(),
        }
    }

    fn progress(&self) -> Progress {
        match self {
            Self::Linear(seq) => seq.progress(),
            Self::SkillDepth(seq) => seq.progress(),
            Self::Phased(seq) => seq.progress(),
        }
    }
}

/// Mutable progression half of a session, guarded by the per-session
/// mutex.
struct Progression {
    sequencer: SessionSequencer,
    strategy: SynthesisStrategy,
    /// Cached final artifact; repeated `get_result` calls re-invoke
    /// nothing.
    result: Option<InterviewResult>,
}

/// Cheap status copy served without touching the progression lock.
#[derive(Clone)]
struct StatusSnapshot {
    progress: Progress,
    finished: bool,
}

/// Per-session state held by the store.
struct SessionState {
    progression: Mutex<Progression>,
    snapshot: std::sync::RwLock<StatusSnapshot>,
}

impl SessionState {
    fn read_snapshot(&self) -> StatusSnapshot {
        self.snapshot
            .read()
            .expect("snapshot lock poisoned")
            .clone()
    }

    fn publish_snapshot(&self, sequencer: &SessionSequencer) {
        *self.snapshot.write().expect("snapshot lock poisoned") = StatusSnapshot {
            progress: sequencer.progress(),
            finished: sequencer.is_finished(),
        };
    }
}

/// A freshly started interview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartedInterview {
    pub session_id: String,
    pub first_question: Question,
}

/// Outcome of an accepted answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerOutcome {
    pub transition: Transition,
    /// The next question, or the re-issued current one while a slot
    /// waits for more respondents. `None` once the interview finished.
    pub next_question: Option<Question>,
    /// Analysis feedback on the accepted answer, where the variant
    /// produces any (skill-depth only).
    pub feedback: Option<AnswerFeedback>,
    pub progress: Progress,
}

/// One transcript line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaPair {
    pub question: String,
    pub respondent_id: String,
    pub answer: String,
}

/// The final artifact of a completed interview, by kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InterviewResult {
    General {
        transcript: Vec<QaPair>,
        analysis: GeneralAnalysis,
    },
    Synthesis(SynthesisResult),
    SkillTracks(SkillTrackResults),
    PersonaReport(FinalPersonaReport),
}

/// Orchestrates interview sessions end to end.
pub struct InterviewService {
    store: SessionStore<SessionState>,
    oracle: OracleClient,
    profiles: Arc<dyn ProfileProvider>,
}

impl InterviewService {
    pub fn new(oracle: OracleClient, profiles: Arc<dyn ProfileProvider>) -> Self {
        Self {
            store: SessionStore::with_defaults(),
            oracle,
            profiles,
        }
    }

    /// Service with injected clock and id generator, for deterministic
    /// tests.
    pub fn with_sources(
        oracle: OracleClient,
        profiles: Arc<dyn ProfileProvider>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            store: SessionStore::new(clock, ids),
            oracle,
            profiles,
        }
    }

    /// Starts a session and returns its first question.
    pub async fn start(&self, context: InterviewContext) -> Result<StartedInterview> {
        let kind = context.kind();
        let (sequencer, strategy) = match context {
            InterviewContext::General => (
                SessionSequencer::Linear(LinearSequencer::general()),
                SynthesisStrategy::OneShot,
            ),
            InterviewContext::TeamReview {
                team_size,
                strategy,
            } => (
                SessionSequencer::Linear(LinearSequencer::team_review(team_size)),
                strategy,
            ),
            InterviewContext::SkillDepth { subject_id } => {
                let profile = self.profiles.profile(&subject_id).await?;
                let prior = self
                    .profiles
                    .prior_analysis(&subject_id)
                    .await?
                    .unwrap_or_default();
                (
                    SessionSequencer::SkillDepth(SkillDepthSequencer::new(
                        self.oracle.clone(),
                        profile,
                        prior,
                    )?),
                    SynthesisStrategy::OneShot,
                )
            }
            InterviewContext::PhasedPersona => (
                SessionSequencer::Phased(PhasedPersonaSequencer::new(self.oracle.clone())),
                SynthesisStrategy::OneShot,
            ),
        };

        let snapshot = StatusSnapshot {
            progress: sequencer.progress(),
            finished: sequencer.is_finished(),
        };
        let entry = self
            .store
            .create(
                kind,
                SessionState {
                    progression: Mutex::new(Progression {
                        sequencer,
                        strategy,
                        result: None,
                    }),
                    snapshot: std::sync::RwLock::new(snapshot),
                },
            )
            .await;

        let first_question = {
            let mut progression = entry.state.progression.lock().await;
            progression
                .sequencer
                .next_question()
                .await?
                .ok_or_else(|| CanvassError::internal("fresh session has no first question"))?
        };

        info!(session_id = %entry.id, %kind, "interview started");
        Ok(StartedInterview {
            session_id: entry.id.clone(),
            first_question,
        })
    }

    /// Submits an answer to the session's live question.
    ///
    /// The progression lock is held across the whole transition. If
    /// `cancel` fires before the sequencer commits, the call returns
    /// `Cancelled` and the session is untouched.
    ///
    /// # Errors
    ///
    /// `SessionNotFound`; `InvalidTransition` when the interview is
    /// complete or the slot refused the answer; `Cancelled`.
    pub async fn answer(
        &self,
        session_id: &str,
        respondent_id: Option<&str>,
        text: impl Into<String>,
        cancel: &CancellationToken,
    ) -> Result<AnswerOutcome> {
        let entry = self.store.get(session_id).await?;
        let mut progression = entry.state.progression.lock().await;

        let question = progression.sequencer.next_question().await?.ok_or_else(|| {
            CanvassError::invalid_transition("answer submitted after completion")
        })?;

        let answer = Answer {
            question_id: question.id,
            respondent_id: respondent_id.unwrap_or("self").to_string(),
            text: text.into(),
            submitted_at: self.store.clock().now(),
        };

        let transition = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(CanvassError::Cancelled),
            transition = progression.sequencer.submit_answer(answer) => transition?,
        };

        if let Transition::Rejected(reason) = transition {
            return Err(CanvassError::invalid_transition(reason.to_string()));
        }
        entry.state.publish_snapshot(&progression.sequencer);
        entry.touch(self.store.clock().now());

        let feedback = match &progression.sequencer {
            SessionSequencer::SkillDepth(seq) => seq.last_feedback().cloned(),
            _ => None,
        };
        let next_question = progression.sequencer.next_question().await?;
        Ok(AnswerOutcome {
            transition,
            next_question,
            feedback,
            progress: progression.sequencer.progress(),
        })
    }

    /// Read-only progress snapshot; never waits on an in-flight
    /// transition.
    pub async fn progress(&self, session_id: &str) -> Result<Progress> {
        let entry = self.store.get(session_id).await?;
        Ok(entry.state.read_snapshot().progress)
    }

    /// Whether the session's interview has completed; never waits on an
    /// in-flight transition.
    pub async fn is_finished(&self, session_id: &str) -> Result<bool> {
        let entry = self.store.get(session_id).await?;
        Ok(entry.state.read_snapshot().finished)
    }

    /// Produces the session's final artifact, computing it on first
    /// call and serving the cached value afterwards.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` before completion; oracle failures propagate,
    /// since final artifacts must not silently degrade.
    pub async fn get_result(&self, session_id: &str) -> Result<InterviewResult> {
        let entry = self.store.get(session_id).await?;
        let mut progression = entry.state.progression.lock().await;

        if let Some(result) = &progression.result {
            return Ok(result.clone());
        }
        if !progression.sequencer.is_finished() {
            return Err(CanvassError::invalid_transition(
                "result requested before completion",
            ));
        }

        let strategy = progression.strategy;
        let result = match (&progression.sequencer, entry.kind) {
            (SessionSequencer::Linear(seq), InterviewKind::TeamReview) => {
                let records = perspective_records(seq);
                InterviewResult::Synthesis(synthesize(&self.oracle, &records, strategy).await?)
            }
            (SessionSequencer::Linear(seq), _) => {
                let transcript = transcript(seq);
                let analysis = self
                    .oracle
                    .infer_as::<GeneralAnalysis>(
                        GENERAL_ANALYSIS_INSTRUCTIONS,
                        json!({ "transcript": transcript }),
                    )
                    .await?;
                InterviewResult::General {
                    transcript,
                    analysis,
                }
            }
            (SessionSequencer::SkillDepth(seq), _) => {
                InterviewResult::SkillTracks(seq.results())
            }
            (SessionSequencer::Phased(seq), _) => {
                InterviewResult::PersonaReport(seq.final_report().await?)
            }
        };

        progression.result = Some(result.clone());
        Ok(result)
    }

    /// Deletes a session.
    pub async fn delete(&self, session_id: &str) -> Result<()> {
        self.store.remove(session_id).await
    }

    /// Evicts sessions idle longer than `max_idle`; returns the count.
    pub async fn evict_idle(&self, max_idle: chrono::Duration) -> usize {
        self.store.evict_idle(max_idle).await
    }
}

fn transcript(seq: &LinearSequencer) -> Vec<QaPair> {
    seq.answers()
        .iter()
        .map(|answer| QaPair {
            question: seq
                .questions()
                .iter()
                .find(|q| q.id == answer.question_id)
                .map(|q| q.text.clone())
                .unwrap_or_default(),
            respondent_id: answer.respondent_id.clone(),
            answer: answer.text.clone(),
        })
        .collect()
}

fn perspective_records(seq: &LinearSequencer) -> Vec<PerspectiveRecord> {
    seq.questions()
        .iter()
        .map(|question| PerspectiveRecord {
            question_id: question.id.clone(),
            responses: seq
                .answers()
                .iter()
                .filter(|a| a.question_id == question.id)
                .map(|a| Perspective {
                    respondent_id: a.respondent_id.clone(),
                    answer_text: a.text.clone(),
                })
                .collect(),
        })
        .collect()
}
