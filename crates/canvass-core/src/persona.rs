//! Persona scoring engine.
//!
//! Oracle-analyzed answers produce per-trait score deltas on five
//! fixed dimensions. The board accumulates them and answers the
//! queries phased sequencing depends on: the single globally dominant
//! trait, per-dimension resolution, and the least-explored dimension.
//! Confidence is derived from score spread and is used only in final
//! reporting, never in sequencing decisions.

use crate::oracle::{OracleResponse, SchemaSpec};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter};
use tracing::warn;

/// A dimension's top trait must beat its runner-up by this fraction of
/// the top score to count as resolved.
pub const CLEAR_MARGIN: f64 = 0.25;

/// The five fixed persona dimensions.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PersonaDimension {
    WorkStyle,
    ProblemSolving,
    Learning,
    StressResponse,
    Communication,
}

/// A trait score located in its dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraitScore {
    pub dimension: PersonaDimension,
    pub trait_name: String,
    pub score: f64,
}

/// Per-trait score deltas for one answer, keyed by dimension.
///
/// The analysis oracle call returns only the dimensions the answered
/// question targeted; everything else is absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TraitAnalysis {
    pub reasoning: String,
    #[serde(default)]
    pub deltas: BTreeMap<PersonaDimension, BTreeMap<String, f64>>,
}

impl OracleResponse for TraitAnalysis {
    fn schema() -> SchemaSpec {
        SchemaSpec::new(
            "TraitAnalysis",
            json!({
                "type": "object",
                "required": ["reasoning", "deltas"],
                "properties": {
                    "reasoning": {"type": "string"},
                    "deltas": {
                        "type": "object",
                        "description": "dimension name -> trait name -> score delta in [0.0, 1.0]",
                        "additionalProperties": {
                            "type": "object",
                            "additionalProperties": {"type": "number"}
                        }
                    }
                }
            }),
        )
    }
}

/// Accumulated trait scores across all five dimensions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBoard {
    scores: BTreeMap<PersonaDimension, BTreeMap<String, f64>>,
}

impl ScoreBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one answer's deltas for a dimension. Deltas are additive
    /// and must be non-negative; a negative delta is clamped to zero.
    pub fn accumulate(&mut self, dimension: PersonaDimension, deltas: &BTreeMap<String, f64>) {
        let entry = self.scores.entry(dimension).or_default();
        for (trait_name, delta) in deltas {
            let delta = if *delta < 0.0 {
                warn!(%dimension, trait_name, delta, "negative trait delta clamped to zero");
                0.0
            } else {
                *delta
            };
            *entry.entry(trait_name.clone()).or_insert(0.0) += delta;
        }
    }

    /// Scores for one dimension, empty if nothing accumulated yet.
    pub fn dimension(&self, dimension: PersonaDimension) -> BTreeMap<String, f64> {
        self.scores.get(&dimension).cloned().unwrap_or_default()
    }

    /// The single highest-scoring trait across all dimensions.
    ///
    /// This is the global argmax, not a per-dimension one: deep-dive
    /// question generation probes the most discriminating trait of the
    /// whole session. Ties resolve to the first trait in dimension
    /// order, then lexicographic trait order, so the result is stable.
    pub fn dominant_trait(&self) -> Option<TraitScore> {
        let mut best: Option<TraitScore> = None;
        for dimension in PersonaDimension::iter() {
            if let Some(traits) = self.scores.get(&dimension) {
                for (trait_name, score) in traits {
                    if best.as_ref().is_none_or(|b| *score > b.score) {
                        best = Some(TraitScore {
                            dimension,
                            trait_name: trait_name.clone(),
                            score: *score,
                        });
                    }
                }
            }
        }
        best
    }

    /// The highest-scoring trait within one dimension.
    pub fn dominant_trait_in(&self, dimension: PersonaDimension) -> Option<TraitScore> {
        let traits = self.scores.get(&dimension)?;
        traits
            .iter()
            .fold(None, |best: Option<(&String, f64)>, (name, score)| {
                if best.is_none_or(|(_, b)| *score > b) {
                    Some((name, *score))
                } else {
                    best
                }
            })
            .map(|(trait_name, score)| TraitScore {
                dimension,
                trait_name: trait_name.clone(),
                score,
            })
    }

    /// Whether a dimension shows one trait rising clearly above the
    /// rest: the top score beats the runner-up by at least
    /// [`CLEAR_MARGIN`] of itself. A dimension with no signal at all is
    /// unresolved; a single scored trait is resolved.
    pub fn is_resolved(&self, dimension: PersonaDimension) -> bool {
        let Some(traits) = self.scores.get(&dimension) else {
            return false;
        };
        let mut sorted: Vec<f64> = traits.values().copied().collect();
        sorted.sort_by(|a, b| b.total_cmp(a));
        match sorted.as_slice() {
            [] => false,
            [top] => *top > 0.0,
            [top, second, ..] => *top > 0.0 && (top - second) >= CLEAR_MARGIN * top,
        }
    }

    /// Dimensions with no clear signal, in canonical dimension order.
    pub fn unresolved_dimensions(&self) -> Vec<PersonaDimension> {
        PersonaDimension::iter()
            .filter(|d| !self.is_resolved(*d))
            .collect()
    }

    /// The dimension with the lowest total accumulated score, i.e. the
    /// least-explored one. Ties resolve to the first in dimension order.
    pub fn least_explored(&self) -> PersonaDimension {
        PersonaDimension::iter()
            .fold(None, |best: Option<(PersonaDimension, f64)>, dim| {
                let total: f64 = self
                    .scores
                    .get(&dim)
                    .map(|t| t.values().sum())
                    .unwrap_or(0.0);
                if best.is_none_or(|(_, b)| total < b) {
                    Some((dim, total))
                } else {
                    best
                }
            })
            .map(|(dim, _)| dim)
            .expect("dimension enum is non-empty")
    }

    /// Margin between the two highest trait scores anywhere on the
    /// board, normalized by the top score. Zero when fewer than two
    /// traits carry signal.
    pub fn confidence(&self) -> f64 {
        let mut all: Vec<f64> = self
            .scores
            .values()
            .flat_map(|traits| traits.values().copied())
            .collect();
        all.sort_by(|a, b| b.total_cmp(a));
        match all.as_slice() {
            [top, second, ..] if *top > 0.0 => (top - second) / top,
            _ => 0.0,
        }
    }
}

/// The final persona report assembled after a phased interview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalPersonaReport {
    /// Winning trait per dimension; `None` where no signal accumulated.
    pub dimension_traits: BTreeMap<PersonaDimension, Option<String>>,
    /// Oracle-written judgment rationale per dimension.
    pub dimension_reasons: BTreeMap<PersonaDimension, String>,
    /// Score-spread confidence in [0, 1], from [`ScoreBoard::confidence`].
    pub confidence: f64,
    /// One-line characterization, e.g. "collaborative, analytical type".
    pub summary: String,
    /// Team environments the persona fits.
    pub team_fit: String,
}

/// Narrative half of the final report, produced by one oracle call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonaNarrative {
    #[serde(default)]
    pub dimension_reasons: BTreeMap<PersonaDimension, String>,
    pub summary: String,
    pub team_fit: String,
}

impl OracleResponse for PersonaNarrative {
    fn schema() -> SchemaSpec {
        SchemaSpec::new(
            "PersonaNarrative",
            json!({
                "type": "object",
                "required": ["dimension_reasons", "summary", "team_fit"],
                "properties": {
                    "dimension_reasons": {
                        "type": "object",
                        "description": "dimension name -> one-sentence judgment rationale",
                        "additionalProperties": {"type": "string"}
                    },
                    "summary": {"type": "string"},
                    "team_fit": {"type": "string"}
                }
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deltas(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn accumulate_is_additive_and_clamps_negatives() {
        let mut board = ScoreBoard::new();
        board.accumulate(
            PersonaDimension::WorkStyle,
            &deltas(&[("collaborative", 0.6)]),
        );
        board.accumulate(
            PersonaDimension::WorkStyle,
            &deltas(&[("collaborative", 0.3), ("directive", -0.5)]),
        );

        let scores = board.dimension(PersonaDimension::WorkStyle);
        assert_eq!(scores["collaborative"], 0.9);
        assert_eq!(scores["directive"], 0.0);
    }

    #[test]
    fn dominant_trait_is_global_argmax() {
        let mut board = ScoreBoard::new();
        board.accumulate(
            PersonaDimension::WorkStyle,
            &deltas(&[("collaborative", 0.5)]),
        );
        board.accumulate(
            PersonaDimension::ProblemSolving,
            &deltas(&[("analytical", 1.4), ("intuitive", 0.2)]),
        );
        board.accumulate(PersonaDimension::Learning, &deltas(&[("systematic", 0.9)]));

        let dominant = board.dominant_trait().unwrap();
        assert_eq!(dominant.dimension, PersonaDimension::ProblemSolving);
        assert_eq!(dominant.trait_name, "analytical");
        assert_eq!(dominant.score, 1.4);
    }

    #[test]
    fn dimension_with_close_top_two_is_unresolved() {
        let mut board = ScoreBoard::new();
        // 0.9 vs 0.8: margin 0.1 < 0.25 * 0.9, no clear winner.
        board.accumulate(
            PersonaDimension::Communication,
            &deltas(&[("logical", 0.9), ("empathetic", 0.8)]),
        );
        // 1.0 vs 0.2: clearly resolved.
        board.accumulate(
            PersonaDimension::Learning,
            &deltas(&[("experimental", 1.0), ("systematic", 0.2)]),
        );

        assert!(!board.is_resolved(PersonaDimension::Communication));
        assert!(board.is_resolved(PersonaDimension::Learning));
        assert!(!board.is_resolved(PersonaDimension::WorkStyle));
    }

    #[test]
    fn least_explored_prefers_lowest_total() {
        let mut board = ScoreBoard::new();
        for dim in PersonaDimension::iter() {
            board.accumulate(dim, &deltas(&[("anything", 1.0)]));
        }
        board.accumulate(
            PersonaDimension::StressResponse,
            &deltas(&[("calm", -1.0)]), // clamped, adds nothing
        );
        board.accumulate(PersonaDimension::WorkStyle, &deltas(&[("directive", 2.0)]));

        // All tied at 1.0 except work_style (3.0); first tied dimension
        // in canonical order after work_style is problem_solving.
        assert_eq!(board.least_explored(), PersonaDimension::ProblemSolving);
    }

    #[test]
    fn confidence_reflects_spread() {
        let mut board = ScoreBoard::new();
        assert_eq!(board.confidence(), 0.0);

        board.accumulate(
            PersonaDimension::WorkStyle,
            &deltas(&[("collaborative", 1.0), ("directive", 0.5)]),
        );
        assert!((board.confidence() - 0.5).abs() < 1e-9);
    }
}
