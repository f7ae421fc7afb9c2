//! Team-review synthesis as a standalone service.
//!
//! Used when the perspectives come from outside a live session, e.g.
//! review text collected asynchronously and handed over as a batch.

use canvass_core::error::Result;
use canvass_core::oracle::OracleClient;
use canvass_core::synthesis::{
    ClassifiedRequirement, ConflictEntry, PerspectiveRecord, RequirementItem, SynthesisResult,
    SynthesisStrategy, classify, merge_items, synthesize,
};
use tracing::info;

/// Stateless facade over the aggregation pipeline.
pub struct SynthesisService {
    oracle: OracleClient,
}

impl SynthesisService {
    pub fn new(oracle: OracleClient) -> Self {
        Self { oracle }
    }

    /// Reconciles N respondents' answers into one synthesized view.
    pub async fn synthesize_team_review(
        &self,
        records: &[PerspectiveRecord],
        strategy: SynthesisStrategy,
    ) -> Result<SynthesisResult> {
        let result = synthesize(&self.oracle, records, strategy).await?;
        info!(
            consensus = result.consensus.len(),
            conflicts = result.conflicts.len(),
            "team review synthesized"
        );
        Ok(result)
    }

    /// Classifies pre-extracted requirement items without any oracle
    /// involvement: frequency thresholds and conflict merging only.
    ///
    /// Keywords are grouped by exact string; pass them through
    /// [`normalize_keyword`] first so casing differences merge.
    pub fn classify_requirements(
        &self,
        items: &[RequirementItem],
        respondent_count: usize,
    ) -> (Vec<ClassifiedRequirement>, Vec<ConflictEntry>) {
        let merged = merge_items(items);
        classify(&merged, respondent_count, &[])
    }
}

/// Canonical keyword form for grouping: trimmed, lowercased, inner
/// whitespace collapsed. Synonym folding stays the caller's business.
pub fn normalize_keyword(keyword: &str) -> String {
    keyword
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
