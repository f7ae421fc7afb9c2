//! Static profile and prior-analysis inputs.
//!
//! Profiles and prior-interview analysis summaries come from an
//! external collaborator; the core reads them once at session start
//! through the [`ProfileProvider`] seam and never writes them back.

use crate::error::Result;
use crate::oracle::{OracleResponse, SchemaSpec};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// One past position in a candidate's profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperienceEntry {
    pub company: String,
    pub title: String,
    #[serde(default)]
    pub duration_years: Option<u32>,
    /// Free-text summary of the work, often a comma-separated stack.
    #[serde(default)]
    pub summary: Option<String>,
}

/// The static candidate profile supplied by the profile provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateProfile {
    pub name: String,
    /// Short role description, e.g. "backend engineer".
    pub headline: String,
    /// Declared skills, in profile declaration order. Order matters:
    /// it breaks ties during skill-depth selection.
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub experiences: Vec<ExperienceEntry>,
    #[serde(default)]
    pub certifications: Vec<String>,
}

impl CandidateProfile {
    /// Total years of experience across all positions; entries without
    /// a duration count as zero.
    pub fn total_experience_years(&self) -> u32 {
        self.experiences
            .iter()
            .map(|e| e.duration_years.unwrap_or(0))
            .sum()
    }
}

/// Summary distilled from a completed linear interview, consumed as
/// context by the adaptive sequencers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneralAnalysis {
    /// Themes the respondent kept returning to.
    #[serde(default)]
    pub key_themes: Vec<String>,
    /// Technical areas the respondent showed interest in.
    #[serde(default)]
    pub interests: Vec<String>,
    /// Work-style signals visible in the answers.
    #[serde(default)]
    pub work_style_hints: Vec<String>,
    /// Experiences the respondent emphasized or repeated.
    #[serde(default)]
    pub emphasized_experiences: Vec<String>,
    /// Technology keywords mentioned anywhere in the answers.
    #[serde(default)]
    pub technical_keywords: Vec<String>,
}

impl OracleResponse for GeneralAnalysis {
    fn schema() -> SchemaSpec {
        SchemaSpec::new(
            "GeneralAnalysis",
            json!({
                "type": "object",
                "properties": {
                    "key_themes": {"type": "array", "items": {"type": "string"}, "maxItems": 5},
                    "interests": {"type": "array", "items": {"type": "string"}, "maxItems": 5},
                    "work_style_hints": {"type": "array", "items": {"type": "string"}, "maxItems": 5},
                    "emphasized_experiences": {"type": "array", "items": {"type": "string"}, "maxItems": 5},
                    "technical_keywords": {"type": "array", "items": {"type": "string"}, "maxItems": 10}
                }
            }),
        )
    }
}

/// Read-only collaborator supplying profile data on demand.
#[async_trait]
pub trait ProfileProvider: Send + Sync {
    async fn profile(&self, subject_id: &str) -> Result<CandidateProfile>;

    /// Prior-interview analysis for the subject, if one exists.
    async fn prior_analysis(&self, subject_id: &str) -> Result<Option<GeneralAnalysis>>;
}
