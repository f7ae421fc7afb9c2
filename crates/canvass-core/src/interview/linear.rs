//! Linear sequencer: a fixed, ordered question list.
//!
//! Supports the single-respondent general interview and the
//! team-review variant where every slot must be answered by each of M
//! respondents before the slot advances. The total question count is
//! fixed at construction and never varies with answer content.

use super::{Answer, InterviewKind, Progress, Question, RejectReason, Sequencer, Transition};
use crate::error::Result;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use std::collections::BTreeSet;
use tracing::debug;

/// Default pool for candidate-side general interviews.
static GENERAL_QUESTIONS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "Please give a short introduction of yourself and your current role.",
        "Walk me through the project or piece of work you are most proud of, and why.",
        "Tell me about a difficulty you ran into on that work and how you resolved it.",
        "Describe a situation where teamwork mattered and the part you played in it.",
        "Which direction do you want to grow in next, and what are you doing about it?",
    ]
});

/// Default pool for hiring-side requirement interviews.
static HIRING_QUESTIONS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "What are the core values of your team or company?",
        "What kind of person do you want to hire? Name three to five concrete traits.",
        "Describe how your team works day to day and the culture around it.",
        "What problem is this hire supposed to solve for the team?",
        "What matters most to you in a candidate for this specific position?",
    ]
});

/// Fixed-list sequencer, optionally replicated across M respondents
/// per slot.
pub struct LinearSequencer {
    kind: InterviewKind,
    questions: Vec<Question>,
    respondents_per_slot: u32,
    slot: usize,
    answered_in_slot: BTreeSet<String>,
    answers: Vec<Answer>,
}

impl LinearSequencer {
    /// Builds a sequencer over a custom question list.
    ///
    /// `respondents_per_slot` must be at least 1; each slot accepts
    /// exactly that many answers from distinct respondents.
    pub fn new(kind: InterviewKind, questions: Vec<String>, respondents_per_slot: u32) -> Self {
        let questions = questions
            .into_iter()
            .enumerate()
            .map(|(i, text)| Question::new(format!("{kind}-{}", i + 1), text, kind.to_string()))
            .collect();
        Self {
            kind,
            questions,
            respondents_per_slot: respondents_per_slot.max(1),
            slot: 0,
            answered_in_slot: BTreeSet::new(),
            answers: Vec::new(),
        }
    }

    /// Single-respondent general interview over the default pool.
    pub fn general() -> Self {
        let pool = GENERAL_QUESTIONS.iter().map(|q| q.to_string()).collect();
        Self::new(InterviewKind::General, pool, 1)
    }

    /// Team review over the default hiring pool: each slot waits for
    /// all `team_size` members.
    pub fn team_review(team_size: u32) -> Self {
        let pool = HIRING_QUESTIONS.iter().map(|q| q.to_string()).collect();
        Self::new(InterviewKind::TeamReview, pool, team_size)
    }

    /// All accepted answers in submission order.
    pub fn answers(&self) -> &[Answer] {
        &self.answers
    }

    /// The fixed question list.
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    fn current(&self) -> Option<&Question> {
        self.questions.get(self.slot)
    }
}

#[async_trait]
impl Sequencer for LinearSequencer {
    fn kind(&self) -> InterviewKind {
        self.kind
    }

    async fn next_question(&mut self) -> Result<Option<Question>> {
        Ok(self.current().cloned())
    }

    async fn submit_answer(&mut self, answer: Answer) -> Result<Transition> {
        let Some(current) = self.current() else {
            return Ok(Transition::Rejected(RejectReason::InterviewComplete));
        };
        if answer.question_id != current.id {
            return Ok(Transition::Rejected(RejectReason::StaleQuestion));
        }
        if self.answered_in_slot.contains(&answer.respondent_id) {
            return Ok(Transition::Rejected(RejectReason::AlreadyAnswered));
        }

        self.answered_in_slot.insert(answer.respondent_id.clone());
        self.answers.push(answer);

        let answered = self.answered_in_slot.len() as u32;
        if answered < self.respondents_per_slot {
            return Ok(Transition::Waiting {
                remaining: self.respondents_per_slot - answered,
            });
        }

        self.slot += 1;
        self.answered_in_slot.clear();
        debug!(kind = %self.kind, slot = self.slot, "linear slot advanced");

        if self.slot >= self.questions.len() {
            Ok(Transition::Completed)
        } else {
            Ok(Transition::Advanced)
        }
    }

    fn is_finished(&self) -> bool {
        self.slot >= self.questions.len()
    }

    fn progress(&self) -> Progress {
        Progress {
            answered: self.answers.len() as u32,
            total: self.questions.len() as u32 * self.respondents_per_slot,
            stage: self.current().map(|q| q.id.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn answer(question_id: &str, respondent: &str) -> Answer {
        Answer {
            question_id: question_id.to_string(),
            respondent_id: respondent.to_string(),
            text: "an answer".to_string(),
            submitted_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn single_respondent_walks_every_slot_once() {
        let mut seq = LinearSequencer::general();
        let total = GENERAL_QUESTIONS.len();

        for i in 0..total {
            let q = seq.next_question().await.unwrap().expect("question due");
            let transition = seq.submit_answer(answer(&q.id, "candidate")).await.unwrap();
            if i + 1 == total {
                assert_eq!(transition, Transition::Completed);
            } else {
                assert_eq!(transition, Transition::Advanced);
            }
        }

        assert!(seq.is_finished());
        assert_eq!(seq.answers().len(), total);
        assert_eq!(seq.next_question().await.unwrap(), None);
    }

    #[tokio::test]
    async fn slot_waits_for_all_respondents_then_advances() {
        let mut seq = LinearSequencer::new(
            InterviewKind::TeamReview,
            vec!["first?".to_string(), "second?".to_string()],
            2,
        );

        let q1 = seq.next_question().await.unwrap().unwrap();
        assert_eq!(
            seq.submit_answer(answer(&q1.id, "alice")).await.unwrap(),
            Transition::Waiting { remaining: 1 }
        );
        // Same question re-issued while waiting.
        assert_eq!(seq.next_question().await.unwrap().unwrap().id, q1.id);

        assert_eq!(
            seq.submit_answer(answer(&q1.id, "bob")).await.unwrap(),
            Transition::Advanced
        );

        // A third answer to the already-advanced slot is refused.
        assert_eq!(
            seq.submit_answer(answer(&q1.id, "carol")).await.unwrap(),
            Transition::Rejected(RejectReason::StaleQuestion)
        );

        let q2 = seq.next_question().await.unwrap().unwrap();
        assert_ne!(q2.id, q1.id);
        seq.submit_answer(answer(&q2.id, "alice")).await.unwrap();
        assert_eq!(
            seq.submit_answer(answer(&q2.id, "bob")).await.unwrap(),
            Transition::Completed
        );

        // M * Q accepted answers, exactly.
        assert_eq!(seq.answers().len(), 4);
        assert!(seq.is_finished());
    }

    #[tokio::test]
    async fn duplicate_respondent_in_slot_is_rejected() {
        let mut seq = LinearSequencer::team_review(3);
        let q = seq.next_question().await.unwrap().unwrap();

        seq.submit_answer(answer(&q.id, "alice")).await.unwrap();
        assert_eq!(
            seq.submit_answer(answer(&q.id, "alice")).await.unwrap(),
            Transition::Rejected(RejectReason::AlreadyAnswered)
        );
        // The duplicate did not count toward the slot.
        assert_eq!(
            seq.submit_answer(answer(&q.id, "bob")).await.unwrap(),
            Transition::Waiting { remaining: 1 }
        );
    }

    #[tokio::test]
    async fn submission_after_completion_is_rejected() {
        let mut seq = LinearSequencer::new(InterviewKind::General, vec!["only?".to_string()], 1);
        let q = seq.next_question().await.unwrap().unwrap();
        assert_eq!(
            seq.submit_answer(answer(&q.id, "candidate")).await.unwrap(),
            Transition::Completed
        );
        assert_eq!(
            seq.submit_answer(answer(&q.id, "candidate")).await.unwrap(),
            Transition::Rejected(RejectReason::InterviewComplete)
        );
    }

    #[tokio::test]
    async fn progress_counts_accepted_answers() {
        let mut seq = LinearSequencer::team_review(2);
        assert_eq!(seq.progress().total, 10);

        let q = seq.next_question().await.unwrap().unwrap();
        seq.submit_answer(answer(&q.id, "alice")).await.unwrap();
        seq.submit_answer(answer(&q.id, "alice")).await.unwrap(); // rejected
        assert_eq!(seq.progress().answered, 1);
    }
}
