//! Perspective aggregation.
//!
//! Given several respondents' free-text answers about the same topic,
//! produce one synthesized, conflict-aware view. Two strategies share
//! one output shape so downstream consumers never care which ran:
//! a one-shot synthesis call over the raw answers, or a two-phase
//! extract-then-judge pipeline that bounds oracle calls to
//! `respondents + 1` regardless of answer length.
//!
//! Everything here is a pure function over the records passed in; no
//! session state is retained.

pub mod classifier;

pub use classifier::{
    ClassifiedRequirement, Importance, MergedRequirement, RawImportance, classify, merge_items,
    required_threshold,
};

use crate::error::{CanvassError, Result};
use crate::oracle::{OracleClient, OracleResponse, SchemaSpec};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use tracing::debug;

const ONE_SHOT_INSTRUCTIONS: &str = "You are an HR analyst synthesizing several respondents' \
     answers to the same question into one view. Consensus requires at least two respondents; a \
     notable view held by exactly one respondent is minority; mutually exclusive claims are \
     conflicts and need a proposed resolution. Write final_text as a single natural answer. Use \
     only what the answers actually say.";

const EXTRACTION_INSTRUCTIONS: &str = "You are an HR analyst. Extract every concrete requirement \
     keyword from this one respondent's answers. For each item give the keyword, a short \
     category, the importance the respondent attached to it (required, preferred, excluded, or \
     unspecified), and a verbatim quote of the sentence that mentions it. Extract only what the \
     text states.";

const JUDGMENT_INSTRUCTIONS: &str = "You are an HR analyst reviewing keyword frequency \
     statistics aggregated from several respondents. Identify groups of mutually exclusive \
     keywords within one category (for example competing frameworks) and propose a resolution \
     for each, then write a final narrative synthesizing the requirements and a short reasoning \
     summary. Do not reclassify anything; importance is decided by mention frequency elsewhere.";

/// One respondent's answer to a shared question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Perspective {
    pub respondent_id: String,
    pub answer_text: String,
}

/// The unit of aggregation: everyone's answers to one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerspectiveRecord {
    pub question_id: String,
    pub responses: Vec<Perspective>,
}

/// A detected contradiction between respondents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictEntry {
    pub issue: String,
    pub options: Vec<String>,
    pub resolution: String,
}

/// The synthesized view both strategies produce.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SynthesisResult {
    /// Points at least two respondents agree on.
    #[serde(default)]
    pub consensus: Vec<String>,
    /// Points a majority holds without unanimity.
    #[serde(default)]
    pub majority: Vec<String>,
    /// Notable points held by exactly one respondent.
    #[serde(default)]
    pub minority: Vec<String>,
    #[serde(default)]
    pub conflicts: Vec<ConflictEntry>,
    /// The synthesis reading as one natural answer.
    pub final_text: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub priority_order: Vec<String>,
}

impl OracleResponse for SynthesisResult {
    fn schema() -> SchemaSpec {
        SchemaSpec::new(
            "SynthesisResult",
            json!({
                "type": "object",
                "required": ["consensus", "minority", "conflicts", "final_text"],
                "properties": {
                    "consensus": {"type": "array", "items": {"type": "string"}},
                    "majority": {"type": "array", "items": {"type": "string"}},
                    "minority": {"type": "array", "items": {"type": "string"}},
                    "conflicts": {"type": "array", "items": {
                        "type": "object",
                        "required": ["issue", "options", "resolution"],
                        "properties": {
                            "issue": {"type": "string"},
                            "options": {"type": "array", "items": {"type": "string"}},
                            "resolution": {"type": "string"}
                        }
                    }},
                    "final_text": {"type": "string"},
                    "keywords": {"type": "array", "items": {"type": "string"}},
                    "priority_order": {"type": "array", "items": {"type": "string"}}
                }
            }),
        )
    }
}

/// A requirement keyword extracted from one or more respondents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequirementItem {
    pub keyword: String,
    pub category: String,
    #[serde(default)]
    pub importance_raw: RawImportance,
    #[serde(default)]
    pub mentioned_by: Vec<String>,
    /// Verbatim sentence the keyword came from.
    #[serde(default)]
    pub context_quote: String,
}

/// Phase-1 extraction output for one respondent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct ExtractedRequirements {
    #[serde(default)]
    items: Vec<ExtractedItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ExtractedItem {
    keyword: String,
    category: String,
    #[serde(default)]
    importance: RawImportance,
    #[serde(default)]
    context_quote: String,
}

impl OracleResponse for ExtractedRequirements {
    fn schema() -> SchemaSpec {
        SchemaSpec::new(
            "ExtractedRequirements",
            json!({
                "type": "object",
                "required": ["items"],
                "properties": {
                    "items": {"type": "array", "items": {
                        "type": "object",
                        "required": ["keyword", "category"],
                        "properties": {
                            "keyword": {"type": "string"},
                            "category": {"type": "string"},
                            "importance": {"enum": ["required", "preferred", "excluded", "unspecified"]},
                            "context_quote": {"type": "string"}
                        }
                    }}
                }
            }),
        )
    }
}

/// Mutually exclusive keywords flagged by the judgment call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictGroup {
    pub category: String,
    pub keywords: Vec<String>,
    pub issue: String,
    pub resolution: String,
}

/// Phase-2 judgment output over the frequency statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct ClassificationJudgment {
    #[serde(default)]
    conflict_groups: Vec<ConflictGroup>,
    final_text: String,
    #[serde(default)]
    reasoning: String,
}

impl OracleResponse for ClassificationJudgment {
    fn schema() -> SchemaSpec {
        SchemaSpec::new(
            "ClassificationJudgment",
            json!({
                "type": "object",
                "required": ["conflict_groups", "final_text"],
                "properties": {
                    "conflict_groups": {"type": "array", "items": {
                        "type": "object",
                        "required": ["category", "keywords", "issue", "resolution"],
                        "properties": {
                            "category": {"type": "string"},
                            "keywords": {"type": "array", "items": {"type": "string"}},
                            "issue": {"type": "string"},
                            "resolution": {"type": "string"}
                        }
                    }},
                    "final_text": {"type": "string"},
                    "reasoning": {"type": "string"}
                }
            }),
        )
    }
}

/// How to reconcile the perspectives. The caller chooses: the right
/// strategy depends on answer length and respondent count, which are
/// business concerns upstream of this module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SynthesisStrategy {
    OneShot,
    TwoPhase,
}

/// Synthesizes N perspectives into one result.
///
/// # Errors
///
/// `InsufficientRespondents` when the records carry no responses;
/// oracle failures propagate (after the client's single retry), since
/// a silently wrong synthesis would feed hiring decisions.
pub async fn synthesize(
    oracle: &OracleClient,
    records: &[PerspectiveRecord],
    strategy: SynthesisStrategy,
) -> Result<SynthesisResult> {
    let respondents = distinct_respondents(records);
    if respondents.is_empty() {
        return Err(CanvassError::InsufficientRespondents);
    }

    match strategy {
        SynthesisStrategy::OneShot => one_shot(oracle, records).await,
        SynthesisStrategy::TwoPhase => two_phase(oracle, records, &respondents).await,
    }
}

fn distinct_respondents(records: &[PerspectiveRecord]) -> Vec<String> {
    let mut respondents: Vec<String> = Vec::new();
    for record in records {
        for response in &record.responses {
            if !respondents.contains(&response.respondent_id) {
                respondents.push(response.respondent_id.clone());
            }
        }
    }
    respondents
}

async fn one_shot(
    oracle: &OracleClient,
    records: &[PerspectiveRecord],
) -> Result<SynthesisResult> {
    let payload = json!({ "records": records });
    let result = oracle
        .infer_as::<SynthesisResult>(ONE_SHOT_INSTRUCTIONS, payload)
        .await?;
    Ok(result)
}

/// Phase 1 extracts requirement items per respondent independently,
/// phase 2 makes one judgment call over frequency statistics instead
/// of raw text: `respondents + 1` oracle calls total.
async fn two_phase(
    oracle: &OracleClient,
    records: &[PerspectiveRecord],
    respondents: &[String],
) -> Result<SynthesisResult> {
    let extractions = join_all(respondents.iter().map(|respondent| {
        let answers: Vec<_> = records
            .iter()
            .flat_map(|record| {
                record
                    .responses
                    .iter()
                    .filter(|r| &r.respondent_id == respondent)
                    .map(|r| {
                        json!({
                            "question_id": record.question_id,
                            "answer": r.answer_text,
                        })
                    })
            })
            .collect();
        let payload = json!({ "respondent_id": respondent, "answers": answers });
        async move {
            let extracted = oracle
                .infer_as::<ExtractedRequirements>(EXTRACTION_INSTRUCTIONS, payload)
                .await?;
            Ok::<_, CanvassError>((respondent.clone(), extracted))
        }
    }))
    .await;

    let mut items: Vec<RequirementItem> = Vec::new();
    for extraction in extractions {
        let (respondent, extracted) = extraction?;
        for item in extracted.items {
            items.push(RequirementItem {
                keyword: item.keyword,
                category: item.category,
                importance_raw: item.importance,
                mentioned_by: vec![respondent.clone()],
                context_quote: item.context_quote,
            });
        }
    }

    let merged = merge_items(&items);
    let stats: Vec<_> = merged
        .iter()
        .map(|m| {
            json!({
                "keyword": m.keyword,
                "category": m.category,
                "mention_count": m.mention_count,
                "mentioned_by": m.mentioned_by,
                "explicit_required": m.explicit_required,
                "explicit_excluded": m.explicit_excluded,
                "quotes": m.quotes,
            })
        })
        .collect();
    let payload = json!({
        "respondent_count": respondents.len(),
        "keyword_statistics": stats,
    });
    let judgment = oracle
        .infer_as::<ClassificationJudgment>(JUDGMENT_INSTRUCTIONS, payload)
        .await?;
    if !judgment.reasoning.is_empty() {
        debug!(reasoning = %judgment.reasoning, "classification judgment");
    }

    let (classified, conflicts) =
        classify(&merged, respondents.len(), &judgment.conflict_groups);
    Ok(assemble(
        &merged,
        &classified,
        conflicts,
        respondents.len(),
        judgment.final_text,
    ))
}

/// Maps classified requirements onto the strategy-agnostic result
/// shape: consensus is unanimous, majority meets the required
/// threshold without unanimity, minority is a single voice.
fn assemble(
    merged: &[MergedRequirement],
    classified: &[ClassifiedRequirement],
    conflicts: Vec<ConflictEntry>,
    respondent_count: usize,
    final_text: String,
) -> SynthesisResult {
    let counts: BTreeMap<&str, usize> = merged
        .iter()
        .map(|m| (m.keyword.as_str(), m.mention_count))
        .collect();
    let threshold = required_threshold(respondent_count);

    let mut consensus = Vec::new();
    let mut majority = Vec::new();
    let mut minority = Vec::new();
    for m in merged {
        if m.mention_count == respondent_count && respondent_count > 1 {
            consensus.push(m.keyword.clone());
        } else if m.mention_count >= threshold && m.mention_count > 1 {
            majority.push(m.keyword.clone());
        } else if m.mention_count == 1 {
            minority.push(m.keyword.clone());
        }
    }

    let mut keywords: Vec<String> = merged.iter().map(|m| m.keyword.clone()).collect();
    keywords.sort_by(|a, b| {
        counts[b.as_str()]
            .cmp(&counts[a.as_str()])
            .then_with(|| a.cmp(b))
    });

    // Priority is deterministic: required before preferred before
    // excluded, more mentions first, alphabetical last.
    let mut ranked: Vec<&ClassifiedRequirement> = classified.iter().collect();
    ranked.sort_by(|a, b| {
        let rank = |i: Importance| match i {
            Importance::Required => 0,
            Importance::Preferred => 1,
            Importance::Excluded => 2,
        };
        rank(a.importance)
            .cmp(&rank(b.importance))
            .then_with(|| b.mention_count.cmp(&a.mention_count))
            .then_with(|| a.keyword.cmp(&b.keyword))
    });
    let priority_order = ranked.iter().map(|c| c.keyword.clone()).collect();

    SynthesisResult {
        consensus,
        majority,
        minority,
        conflicts,
        final_text,
        keywords,
        priority_order,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::{Oracle, OracleError, OracleRequest};
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::{Arc, Mutex};

    /// Oracle that answers extraction per scripted respondent data and
    /// counts every call.
    struct TwoPhaseOracle {
        calls: Mutex<Vec<&'static str>>,
    }

    impl TwoPhaseOracle {
        fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Oracle for TwoPhaseOracle {
        async fn infer(&self, request: OracleRequest) -> std::result::Result<Value, OracleError> {
            self.calls.lock().unwrap().push(request.expected_schema.name);
            match request.expected_schema.name {
                "ExtractedRequirements" => {
                    let items = match request.context_payload["respondent_id"]
                        .as_str()
                        .unwrap_or_default()
                    {
                        "a" => json!([
                            {"keyword": "Python", "category": "language", "importance": "required", "context_quote": "must know Python"},
                            {"keyword": "Django", "category": "framework", "importance": "required", "context_quote": "we are a Django shop"},
                        ]),
                        "b" => json!([
                            {"keyword": "Python", "category": "language", "importance": "unspecified", "context_quote": "Python daily"},
                            {"keyword": "Kubernetes", "category": "infra", "importance": "preferred", "context_quote": "k8s is a plus"},
                        ]),
                        _ => json!([
                            {"keyword": "Python", "category": "language", "importance": "unspecified", "context_quote": "Python of course"},
                            {"keyword": "FastAPI", "category": "framework", "importance": "required", "context_quote": "FastAPI only"},
                        ]),
                    };
                    Ok(json!({"items": items}))
                }
                "ClassificationJudgment" => Ok(json!({
                    "conflict_groups": [{
                        "category": "framework",
                        "keywords": ["Django", "FastAPI"],
                        "issue": "competing web frameworks demanded as required",
                        "resolution": "Either framework is acceptable given Python depth.",
                    }],
                    "final_text": "The team needs a Python engineer; either Django or FastAPI works; Kubernetes is a plus.",
                    "reasoning": "Python is unanimous; the frameworks split.",
                })),
                other => Err(OracleError::malformed(format!("unexpected schema {other}"))),
            }
        }
    }

    fn record(question_id: &str, answers: &[(&str, &str)]) -> PerspectiveRecord {
        PerspectiveRecord {
            question_id: question_id.to_string(),
            responses: answers
                .iter()
                .map(|(id, text)| Perspective {
                    respondent_id: id.to_string(),
                    answer_text: text.to_string(),
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn zero_respondents_is_a_caller_error() {
        let oracle = OracleClient::new(Arc::new(TwoPhaseOracle::new()));
        let err = synthesize(&oracle, &[], SynthesisStrategy::OneShot)
            .await
            .unwrap_err();
        assert!(matches!(err, CanvassError::InsufficientRespondents));

        let empty = record("q1", &[]);
        let err = synthesize(&oracle, &[empty], SynthesisStrategy::TwoPhase)
            .await
            .unwrap_err();
        assert!(matches!(err, CanvassError::InsufficientRespondents));
    }

    #[tokio::test]
    async fn two_phase_makes_respondents_plus_one_calls() {
        let inner = Arc::new(TwoPhaseOracle::new());
        let oracle = OracleClient::new(inner.clone());
        let records = vec![record(
            "q1",
            &[
                ("a", "We must have Python and we are a Django shop."),
                ("b", "Python daily; k8s is a plus."),
                ("c", "Python of course, FastAPI only."),
            ],
        )];

        let result = synthesize(&oracle, &records, SynthesisStrategy::TwoPhase)
            .await
            .unwrap();

        let calls = inner.calls.lock().unwrap();
        assert_eq!(calls.len(), 4, "3 extractions + 1 judgment");
        assert_eq!(
            calls.iter().filter(|c| **c == "ClassificationJudgment").count(),
            1
        );

        // Python unanimous -> consensus; Kubernetes single -> minority;
        // frameworks merged into one disjunctive conflict.
        assert_eq!(result.consensus, vec!["Python"]);
        assert!(result.minority.contains(&"Kubernetes".to_string()));
        assert_eq!(result.conflicts.len(), 1);
        assert_eq!(result.conflicts[0].options, vec!["Django", "FastAPI"]);
        assert_eq!(result.priority_order[0], "Python");
        assert!(
            result
                .priority_order
                .contains(&"Django or FastAPI".to_string())
        );
        assert!(!result.final_text.is_empty());
    }

    #[tokio::test]
    async fn one_shot_returns_the_oracle_synthesis_as_is() {
        struct OneShotOracle;

        #[async_trait]
        impl Oracle for OneShotOracle {
            async fn infer(
                &self,
                request: OracleRequest,
            ) -> std::result::Result<Value, OracleError> {
                assert_eq!(request.expected_schema.name, "SynthesisResult");
                Ok(json!({
                    "consensus": ["ownership"],
                    "majority": [],
                    "minority": ["pair programming"],
                    "conflicts": [],
                    "final_text": "The team values ownership; one member pushes pairing.",
                    "keywords": ["ownership", "pair programming"],
                    "priority_order": ["ownership", "pair programming"],
                }))
            }
        }

        let oracle = OracleClient::new(Arc::new(OneShotOracle));
        let records = vec![record("q1", &[("a", "ownership"), ("b", "pairing")])];

        let result = synthesize(&oracle, &records, SynthesisStrategy::OneShot)
            .await
            .unwrap();
        assert_eq!(result.consensus, vec!["ownership"]);
        assert_eq!(result.minority, vec!["pair programming"]);
    }
}
