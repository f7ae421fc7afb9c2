//! Phased-persona sequencer: exploration, deep-dive, validation.
//!
//! Three fixed exploration questions seed the persona score board,
//! two oracle-generated deep-dive questions probe the single globally
//! dominant trait, and one fixed validation question targets the
//! dimension with no clear signal. Six questions, always in phase
//! order.

use super::{
    Answer, GeneratedQuestion, InterviewKind, Progress, Question, RejectReason, Sequencer,
    Transition,
};
use crate::error::{CanvassError, Result};
use crate::oracle::OracleClient;
use crate::persona::{
    FinalPersonaReport, PersonaDimension, PersonaNarrative, ScoreBoard, TraitAnalysis,
};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use strum::IntoEnumIterator;
use strum_macros::Display;
use tracing::warn;

const EXPLORATION_COUNT: u32 = 3;
const DEEP_DIVE_COUNT: u32 = 2;
const TOTAL_QUESTIONS: u32 = EXPLORATION_COUNT + DEEP_DIVE_COUNT + 1;

const ANALYSIS_INSTRUCTIONS: &str = "You are an HR analyst. Score the answer against the target \
     persona dimensions only. For each target dimension return trait-score deltas between 0.0 \
     and 1.0 (strong signal 0.7-1.0, medium 0.4-0.6, weak 0.0-0.3; they need not sum to 1). \
     Analyze only what the answer actually shows; never guess.";

const DEEP_DIVE_INSTRUCTIONS: &str = "You are a recruiter. Generate one concrete situational \
     question that probes the given dominant trait more deeply. Ask for a real past experience \
     and the decision-making behind it, avoid repeating earlier questions, keep it open-ended \
     and under 200 characters.";

const REPORT_INSTRUCTIONS: &str = "You are a talent analyst. Given the winning trait per \
     dimension and the interview transcript, write a one-sentence judgment rationale per \
     dimension citing the answers, a one-line persona summary, and the team environments this \
     persona fits.";

/// Fixed exploration pool, each entry pre-tagged with the dimensions it
/// measures.
static EXPLORATION_QUESTIONS: Lazy<Vec<(&'static str, Vec<PersonaDimension>)>> = Lazy::new(|| {
    vec![
        (
            "When your team disagreed on a decision during a project, how did you resolve it? \
             Please describe the concrete situation and what you did.",
            vec![PersonaDimension::WorkStyle, PersonaDimension::Communication],
        ),
        (
            "How do you respond when the work changes unexpectedly or a deadline is suddenly \
             shortened? Walk me through a concrete example.",
            vec![
                PersonaDimension::ProblemSolving,
                PersonaDimension::StressResponse,
            ],
        ),
        (
            "Tell me about a time you had to pick up a completely new domain or task quickly. \
             How did you learn it, and what came of it?",
            vec![PersonaDimension::Learning],
        ),
    ]
});

/// Fixed validation question per dimension.
static VALIDATION_QUESTIONS: Lazy<BTreeMap<PersonaDimension, &'static str>> = Lazy::new(|| {
    BTreeMap::from([
        (
            PersonaDimension::WorkStyle,
            "When tasks with competing priorities land at the same time, how do you handle it \
             with your teammates?",
        ),
        (
            PersonaDimension::ProblemSolving,
            "When you face a problem you have never seen before, how do you approach solving \
             it? Please anchor it in a concrete case.",
        ),
        (
            PersonaDimension::Learning,
            "Have you ever introduced a new way of working or a new tool to your team? Describe \
             how you contributed to the change.",
        ),
        (
            PersonaDimension::StressResponse,
            "Has something gone wrong right before an important deliverable? Describe what you \
             did, action by action.",
        ),
        (
            PersonaDimension::Communication,
            "When a colleague strongly disagrees with your opinion, how do you act? Describe the \
             concrete behavior and the outcome.",
        ),
    ])
});

/// Phase of a phased-persona interview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PersonaPhase {
    Exploration,
    DeepDive,
    Validation,
}

/// One question/answer pair with the analysis rationale that scored it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaRecord {
    pub question: String,
    pub answer: String,
    pub reasoning: String,
}

/// Adaptive sequencer over the three persona phases.
pub struct PhasedPersonaSequencer {
    oracle: OracleClient,
    scores: ScoreBoard,
    history: Vec<QaRecord>,
    asked: u32,
    current: Option<Question>,
}

impl PhasedPersonaSequencer {
    pub fn new(oracle: OracleClient) -> Self {
        Self {
            oracle,
            scores: ScoreBoard::new(),
            history: Vec::new(),
            asked: 0,
            current: None,
        }
    }

    /// The phase the next question belongs to, `None` once finished.
    pub fn phase(&self) -> Option<PersonaPhase> {
        match self.asked {
            n if n < EXPLORATION_COUNT => Some(PersonaPhase::Exploration),
            n if n < EXPLORATION_COUNT + DEEP_DIVE_COUNT => Some(PersonaPhase::DeepDive),
            n if n < TOTAL_QUESTIONS => Some(PersonaPhase::Validation),
            _ => None,
        }
    }

    /// The accumulated score board.
    pub fn scores(&self) -> &ScoreBoard {
        &self.scores
    }

    /// The full question/answer history.
    pub fn history(&self) -> &[QaRecord] {
        &self.history
    }

    /// Assembles the final persona report: per-dimension winners and
    /// confidence come from the score board, the narrative from one
    /// oracle call.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` before completion; oracle failures propagate,
    /// since a report must not silently degrade.
    pub async fn final_report(&self) -> Result<FinalPersonaReport> {
        if !self.is_finished() {
            return Err(CanvassError::invalid_transition(
                "persona report requires a completed interview",
            ));
        }

        let dimension_traits: BTreeMap<PersonaDimension, Option<String>> = PersonaDimension::iter()
            .map(|dim| {
                (
                    dim,
                    self.scores.dominant_trait_in(dim).map(|t| t.trait_name),
                )
            })
            .collect();

        let payload = json!({
            "dimension_traits": dimension_traits,
            "transcript": self.history,
        });
        let narrative: PersonaNarrative = self
            .oracle
            .infer_as(REPORT_INSTRUCTIONS, payload)
            .await?;

        Ok(FinalPersonaReport {
            dimension_traits,
            dimension_reasons: narrative.dimension_reasons,
            confidence: self.scores.confidence(),
            summary: narrative.summary,
            team_fit: narrative.team_fit,
        })
    }

    fn question_id(&self) -> String {
        format!("pp-{}", self.asked + 1)
    }

    async fn issue_question(&self) -> Result<Question> {
        let phase = self
            .phase()
            .ok_or_else(|| CanvassError::internal("issue_question called after completion"))?;
        match phase {
            PersonaPhase::Exploration => {
                let (text, dimensions) = &EXPLORATION_QUESTIONS[self.asked as usize];
                Ok(
                    Question::new(self.question_id(), *text, phase.to_string())
                        .with_dimensions(dimensions.clone()),
                )
            }
            PersonaPhase::DeepDive => {
                // The most discriminating trait of the whole session:
                // global argmax, not per-dimension.
                let dominant = self.scores.dominant_trait().unwrap_or_else(|| {
                    crate::persona::TraitScore {
                        dimension: PersonaDimension::WorkStyle,
                        trait_name: "collaborative".to_string(),
                        score: 0.0,
                    }
                });
                let payload = json!({
                    "dominant_trait": dominant.trait_name,
                    "dimension": dominant.dimension,
                    "history": self.history,
                });
                let generated: GeneratedQuestion = self
                    .oracle
                    .infer_as(DEEP_DIVE_INSTRUCTIONS, payload)
                    .await
                    .map_err(|source| {
                        // No static default exists for an ad hoc probe.
                        CanvassError::OracleUnavailable {
                            context: "deep-dive question generation",
                            source,
                        }
                    })?;
                Ok(
                    Question::new(self.question_id(), generated.question, phase.to_string())
                        .with_dimensions(vec![dominant.dimension]),
                )
            }
            PersonaPhase::Validation => {
                let dimension = self
                    .scores
                    .unresolved_dimensions()
                    .into_iter()
                    .next()
                    .unwrap_or_else(|| self.scores.least_explored());
                let text = VALIDATION_QUESTIONS[&dimension];
                Ok(
                    Question::new(self.question_id(), text, phase.to_string())
                        .with_dimensions(vec![dimension]),
                )
            }
        }
    }
}

#[async_trait]
impl Sequencer for PhasedPersonaSequencer {
    fn kind(&self) -> InterviewKind {
        InterviewKind::PhasedPersona
    }

    async fn next_question(&mut self) -> Result<Option<Question>> {
        if self.is_finished() {
            return Ok(None);
        }
        if self.current.is_none() {
            let question = self.issue_question().await?;
            self.current = Some(question);
        }
        Ok(self.current.clone())
    }

    async fn submit_answer(&mut self, answer: Answer) -> Result<Transition> {
        if self.is_finished() {
            return Ok(Transition::Rejected(RejectReason::InterviewComplete));
        }
        let Some(current) = self.current.clone() else {
            return Ok(Transition::Rejected(RejectReason::NotIssued));
        };
        if answer.question_id != current.id {
            return Ok(Transition::Rejected(RejectReason::StaleQuestion));
        }

        let payload = json!({
            "question": current.text,
            "answer": answer.text,
            "target_dimensions": current.target_dimensions,
        });
        // Analyze first; nothing is committed if the call is aborted.
        let analysis = match self
            .oracle
            .infer_as::<TraitAnalysis>(ANALYSIS_INSTRUCTIONS, payload)
            .await
        {
            Ok(analysis) => analysis,
            Err(err) => {
                warn!(question = %current.id, error = %err, "trait analysis degraded to zero delta");
                TraitAnalysis::default()
            }
        };

        // Only the dimensions this question targets may score.
        for (dimension, deltas) in &analysis.deltas {
            if current.target_dimensions.contains(dimension) {
                self.scores.accumulate(*dimension, deltas);
            } else {
                warn!(%dimension, question = %current.id, "discarding delta for untargeted dimension");
            }
        }

        self.history.push(QaRecord {
            question: current.text,
            answer: answer.text,
            reasoning: analysis.reasoning,
        });
        self.current = None;
        self.asked += 1;

        if self.is_finished() {
            Ok(Transition::Completed)
        } else {
            Ok(Transition::Advanced)
        }
    }

    fn is_finished(&self) -> bool {
        self.asked >= TOTAL_QUESTIONS
    }

    fn progress(&self) -> Progress {
        Progress {
            answered: self.asked,
            total: TOTAL_QUESTIONS,
            stage: self.phase().map(|p| p.to_string()),
        }
    }
}
