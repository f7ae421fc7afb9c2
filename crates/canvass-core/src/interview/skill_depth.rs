//! Skill-depth sequencer: three skills, three depth levels each.
//!
//! Questions are personalized by the oracle from the candidate's
//! profile, the prior-interview analysis, and earlier answers for the
//! same skill only; history never leaks across skills, which bounds
//! context growth and keeps questions causally dependent on the skill
//! at hand. There is no scoring here, only feedback that steers the
//! next question.

use super::{
    Answer, GeneratedQuestion, InterviewKind, Progress, Question, RejectReason, Sequencer,
    Transition,
};
use crate::error::{CanvassError, Result};
use crate::oracle::{OracleClient, OracleResponse, SchemaSpec};
use crate::profile::{CandidateProfile, GeneralAnalysis};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use strum_macros::Display;
use tracing::warn;

/// How many skills one session evaluates.
pub const SKILLS_PER_SESSION: usize = 3;

const GENERATION_INSTRUCTIONS: &str = "You are a technical interviewer. Generate one open-ended \
     interview question for the given skill at the given depth level, building naturally on the \
     candidate's profile, the prior interview analysis, and earlier answers for this skill. The \
     question must not be answerable with yes/no and must invite a concrete, real experience.";

const FEEDBACK_INSTRUCTIONS: &str = "You are a technical interview analyst. Analyze the answer \
     without scoring it: extract the key points, the technologies mentioned, the areas worth \
     probing deeper, and the direction the next question should take.";

/// Depth levels, always walked in this order within a skill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SkillLevel {
    Basic,
    Practical,
    Advanced,
}

impl SkillLevel {
    pub const ORDER: [SkillLevel; 3] = [SkillLevel::Basic, SkillLevel::Practical, SkillLevel::Advanced];

    /// Question-strategy hint handed to the oracle.
    fn guidance(self) -> &'static str {
        match self {
            SkillLevel::Basic => {
                "Opening question: connect to what the candidate said earlier and explore their \
                 overall experience and use cases with this skill."
            }
            SkillLevel::Practical => {
                "Follow-up question: drill into a concrete technique or experience mentioned in \
                 the previous answer; probe how it was applied and what problems came up."
            }
            SkillLevel::Advanced => {
                "Synthesis question: combine the earlier answers and move to architecture, \
                 performance trade-offs, design decisions, or production edge cases."
            }
        }
    }

    /// Static question used when the oracle cannot produce one.
    fn fallback_question(self, skill: &str) -> String {
        match self {
            SkillLevel::Basic => format!(
                "Walk me through your overall experience with {skill}: where you have used it and for what."
            ),
            SkillLevel::Practical => format!(
                "Describe a concrete problem you solved with {skill} and how you approached it in practice."
            ),
            SkillLevel::Advanced => format!(
                "Tell me about a design decision or trade-off involving {skill} in a production setting, and how it held up."
            ),
        }
    }
}

/// Oracle feedback on one answer. No scores, only signal for the next
/// question.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnswerFeedback {
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default)]
    pub mentioned_technologies: Vec<String>,
    #[serde(default)]
    pub depth_areas: Vec<String>,
    #[serde(default)]
    pub follow_up_direction: String,
}

impl OracleResponse for AnswerFeedback {
    fn schema() -> SchemaSpec {
        SchemaSpec::new(
            "AnswerFeedback",
            json!({
                "type": "object",
                "required": ["key_points", "follow_up_direction"],
                "properties": {
                    "key_points": {"type": "array", "items": {"type": "string"}, "maxItems": 5},
                    "mentioned_technologies": {"type": "array", "items": {"type": "string"}, "maxItems": 5},
                    "depth_areas": {"type": "array", "items": {"type": "string"}, "maxItems": 3},
                    "follow_up_direction": {"type": "string"}
                }
            }),
        )
    }
}

/// One answered question within a skill track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillAnswer {
    pub level: SkillLevel,
    pub question: Question,
    pub answer_text: String,
    /// Absent when analysis degraded to a no-op after oracle failure.
    pub feedback: Option<AnswerFeedback>,
}

/// All progress for one evaluated skill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillTrack {
    pub skill: String,
    pub entries: Vec<SkillAnswer>,
}

/// Final artifact of a skill-depth interview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillTrackResults {
    pub skills_evaluated: Vec<String>,
    pub tracks: Vec<SkillTrack>,
    pub total_questions: u32,
}

/// Picks the skills to evaluate: profile skills that the prior analysis
/// also mentioned come first, then the remaining profile skills, both
/// in profile declaration order, truncated to [`SKILLS_PER_SESSION`].
///
/// # Errors
///
/// `InsufficientCandidates` when the profile declares fewer than three
/// distinct skills.
pub fn select_skills(profile: &CandidateProfile, prior: &GeneralAnalysis) -> Result<Vec<String>> {
    let mut distinct: Vec<&String> = Vec::new();
    for skill in &profile.skills {
        if !distinct.iter().any(|s| s.eq_ignore_ascii_case(skill)) {
            distinct.push(skill);
        }
    }
    if distinct.len() < SKILLS_PER_SESSION {
        return Err(CanvassError::InsufficientCandidates {
            found: distinct.len(),
        });
    }

    let mentioned = |skill: &str| {
        prior
            .technical_keywords
            .iter()
            .any(|k| k.eq_ignore_ascii_case(skill))
    };

    let mut selected: Vec<String> = distinct
        .iter()
        .filter(|s| mentioned(s))
        .map(|s| s.to_string())
        .collect();
    selected.extend(
        distinct
            .iter()
            .filter(|s| !mentioned(s))
            .map(|s| s.to_string()),
    );
    selected.truncate(SKILLS_PER_SESSION);
    Ok(selected)
}

/// Adaptive sequencer over three skill tracks.
pub struct SkillDepthSequencer {
    oracle: OracleClient,
    profile: CandidateProfile,
    prior: GeneralAnalysis,
    tracks: Vec<SkillTrack>,
    skill_idx: usize,
    level_idx: usize,
    current: Option<Question>,
    last_feedback: Option<AnswerFeedback>,
}

impl SkillDepthSequencer {
    /// Builds the sequencer, selecting skills up front.
    ///
    /// # Errors
    ///
    /// `InsufficientCandidates` when fewer than three distinct skills
    /// are available.
    pub fn new(
        oracle: OracleClient,
        profile: CandidateProfile,
        prior: GeneralAnalysis,
    ) -> Result<Self> {
        let skills = select_skills(&profile, &prior)?;
        let tracks = skills
            .into_iter()
            .map(|skill| SkillTrack {
                skill,
                entries: Vec::new(),
            })
            .collect();
        Ok(Self {
            oracle,
            profile,
            prior,
            tracks,
            skill_idx: 0,
            level_idx: 0,
            current: None,
            last_feedback: None,
        })
    }

    /// Feedback for the most recently accepted answer, surfaced back
    /// to the respondent alongside the next question.
    pub fn last_feedback(&self) -> Option<&AnswerFeedback> {
        self.last_feedback.as_ref()
    }

    /// The skills under evaluation, in interview order.
    pub fn skills(&self) -> Vec<String> {
        self.tracks.iter().map(|t| t.skill.clone()).collect()
    }

    /// Final results; meaningful once `is_finished` is true but safe to
    /// call at any point.
    pub fn results(&self) -> SkillTrackResults {
        SkillTrackResults {
            skills_evaluated: self.skills(),
            tracks: self.tracks.clone(),
            total_questions: self.answered(),
        }
    }

    fn answered(&self) -> u32 {
        self.tracks.iter().map(|t| t.entries.len() as u32).sum()
    }

    fn level(&self) -> SkillLevel {
        SkillLevel::ORDER[self.level_idx]
    }

    async fn generate_question(&self) -> Question {
        let track = &self.tracks[self.skill_idx];
        let level = self.level();
        let id = format!("sd-{}-{}", self.skill_idx + 1, self.level_idx + 1);

        let history: Vec<_> = track
            .entries
            .iter()
            .map(|e| {
                json!({
                    "question": e.question.text,
                    "answer": e.answer_text,
                    "depth_areas": e.feedback.as_ref().map(|f| f.depth_areas.clone()).unwrap_or_default(),
                })
            })
            .collect();

        let payload = json!({
            "skill": track.skill,
            "level": level.to_string(),
            "question_number": self.level_idx + 1,
            "level_guidance": level.guidance(),
            "profile": self.profile,
            "prior_analysis": self.prior,
            "previous_answers_for_skill": history,
        });

        match self
            .oracle
            .infer_as::<GeneratedQuestion>(GENERATION_INSTRUCTIONS, payload)
            .await
        {
            Ok(generated) => Question::new(id, generated.question, track.skill.clone()),
            Err(err) => {
                warn!(skill = %track.skill, %level, error = %err, "question generation degraded to static default");
                Question::new(id, level.fallback_question(&track.skill), track.skill.clone())
            }
        }
    }
}

#[async_trait]
impl Sequencer for SkillDepthSequencer {
    fn kind(&self) -> InterviewKind {
        InterviewKind::SkillDepth
    }

    async fn next_question(&mut self) -> Result<Option<Question>> {
        if self.is_finished() {
            return Ok(None);
        }
        if self.current.is_none() {
            let question = self.generate_question().await;
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

        let skill = self.tracks[self.skill_idx].skill.clone();
        let payload = json!({
            "skill": skill,
            "question": current.text,
            "answer": answer.text,
        });
        // Analyze before committing anything: an aborted call leaves the
        // sequencer exactly where it was.
        let feedback = match self
            .oracle
            .infer_as::<AnswerFeedback>(FEEDBACK_INSTRUCTIONS, payload)
            .await
        {
            Ok(feedback) => Some(feedback),
            Err(err) => {
                warn!(%skill, error = %err, "answer analysis degraded, recording answer without feedback");
                None
            }
        };

        let level = self.level();
        self.last_feedback = feedback.clone();
        self.tracks[self.skill_idx].entries.push(SkillAnswer {
            level,
            question: current,
            answer_text: answer.text,
            feedback,
        });
        self.current = None;

        // A skill's levels complete before the next skill begins.
        self.level_idx += 1;
        if self.level_idx >= SkillLevel::ORDER.len() {
            self.level_idx = 0;
            self.skill_idx += 1;
        }

        if self.is_finished() {
            Ok(Transition::Completed)
        } else {
            Ok(Transition::Advanced)
        }
    }

    fn is_finished(&self) -> bool {
        self.skill_idx >= self.tracks.len()
    }

    fn progress(&self) -> Progress {
        Progress {
            answered: self.answered(),
            total: (self.tracks.len() * SkillLevel::ORDER.len()) as u32,
            stage: self.tracks.get(self.skill_idx).map(|t| t.skill.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::{Oracle, OracleError, OracleRequest};
    use chrono::Utc;
    use serde_json::Value;
    use std::sync::Arc;

    /// Oracle returning a fixed question or feedback per schema.
    struct FixedOracle;

    #[async_trait]
    impl Oracle for FixedOracle {
        async fn infer(&self, request: OracleRequest) -> std::result::Result<Value, OracleError> {
            match request.expected_schema.name {
                "GeneratedQuestion" => Ok(json!({
                    "question": format!(
                        "Tell me about {} at the {} level, in detail please.",
                        request.context_payload["skill"].as_str().unwrap_or("it"),
                        request.context_payload["level"].as_str().unwrap_or("?")
                    ),
                    "rationale": "probe depth of real experience",
                })),
                "AnswerFeedback" => Ok(json!({
                    "key_points": ["used it in production"],
                    "mentioned_technologies": ["caching"],
                    "depth_areas": ["failure handling"],
                    "follow_up_direction": "probe failure handling",
                })),
                other => Err(OracleError::malformed(format!("unexpected schema {other}"))),
            }
        }
    }

    /// Oracle that always fails with a non-retryable provider error.
    struct DownOracle;

    #[async_trait]
    impl Oracle for DownOracle {
        async fn infer(&self, _request: OracleRequest) -> std::result::Result<Value, OracleError> {
            Err(OracleError::provider("offline", false))
        }
    }

    fn profile(skills: &[&str]) -> CandidateProfile {
        CandidateProfile {
            name: "Jordan".to_string(),
            headline: "backend engineer".to_string(),
            skills: skills.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    fn prior(keywords: &[&str]) -> GeneralAnalysis {
        GeneralAnalysis {
            technical_keywords: keywords.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    fn answer(question: &Question) -> Answer {
        Answer {
            question_id: question.id.clone(),
            respondent_id: "candidate".to_string(),
            text: "I used it in production for two years.".to_string(),
            submitted_at: Utc::now(),
        }
    }

    #[test]
    fn skills_mentioned_in_prior_analysis_come_first() {
        let selected = select_skills(
            &profile(&["Redis", "Docker", "FastAPI"]),
            &prior(&["Docker", "FastAPI"]),
        )
        .unwrap();
        assert_eq!(selected, vec!["Docker", "FastAPI", "Redis"]);

        let selected = select_skills(
            &profile(&["Redis", "Docker", "FastAPI"]),
            &prior(&["Redis", "Docker"]),
        )
        .unwrap();
        assert_eq!(selected, vec!["Redis", "Docker", "FastAPI"]);
    }

    #[test]
    fn fewer_than_three_skills_is_fatal() {
        let err = select_skills(&profile(&["Redis", "redis", "Docker"]), &prior(&[])).unwrap_err();
        assert!(matches!(
            err,
            CanvassError::InsufficientCandidates { found: 2 }
        ));
    }

    #[tokio::test]
    async fn walks_nine_questions_in_level_order_without_interleaving() {
        let oracle = OracleClient::new(Arc::new(FixedOracle));
        let mut seq = SkillDepthSequencer::new(
            oracle,
            profile(&["Redis", "Docker", "FastAPI"]),
            prior(&["Redis"]),
        )
        .unwrap();

        let mut seen: Vec<(String, SkillLevel)> = Vec::new();
        while let Some(q) = seq.next_question().await.unwrap() {
            let skill = q.topic.clone();
            seq.submit_answer(answer(&q)).await.unwrap();
            let entries = &seq.tracks.iter().find(|t| t.skill == skill).unwrap().entries;
            seen.push((skill, entries.last().unwrap().level));
        }

        assert_eq!(seen.len(), 9);
        let expected_levels = [SkillLevel::Basic, SkillLevel::Practical, SkillLevel::Advanced];
        for (chunk_idx, chunk) in seen.chunks(3).enumerate() {
            let skills: Vec<_> = chunk.iter().map(|(s, _)| s.as_str()).collect();
            assert_eq!(skills, vec![chunk[0].0.as_str(); 3], "skills never interleave");
            let levels: Vec<_> = chunk.iter().map(|(_, l)| *l).collect();
            assert_eq!(levels, expected_levels, "chunk {chunk_idx} out of level order");
        }
        assert!(seq.is_finished());
        assert_eq!(seq.results().total_questions, 9);
    }

    #[tokio::test]
    async fn oracle_failure_falls_back_to_static_question_and_no_feedback() {
        let oracle = OracleClient::new(Arc::new(DownOracle));
        let mut seq = SkillDepthSequencer::new(
            oracle,
            profile(&["Redis", "Docker", "FastAPI"]),
            prior(&[]),
        )
        .unwrap();

        let q = seq.next_question().await.unwrap().unwrap();
        assert!(q.text.contains("Redis"), "fallback names the skill");

        let transition = seq.submit_answer(answer(&q)).await.unwrap();
        assert_eq!(transition, Transition::Advanced);
        assert!(seq.tracks[0].entries[0].feedback.is_none());
    }

    #[tokio::test]
    async fn stale_answer_is_rejected_without_state_change() {
        let oracle = OracleClient::new(Arc::new(FixedOracle));
        let mut seq = SkillDepthSequencer::new(
            oracle,
            profile(&["Redis", "Docker", "FastAPI"]),
            prior(&[]),
        )
        .unwrap();

        let q = seq.next_question().await.unwrap().unwrap();
        let mut stale = answer(&q);
        stale.question_id = "sd-9-9".to_string();

        assert_eq!(
            seq.submit_answer(stale).await.unwrap(),
            Transition::Rejected(RejectReason::StaleQuestion)
        );
        assert_eq!(seq.progress().answered, 0);
    }
}
