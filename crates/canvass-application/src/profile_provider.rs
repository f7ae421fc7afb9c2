//! In-memory profile provider.
//!
//! Production deployments read profiles from the platform backend;
//! tests and the CLI register them up front.

use async_trait::async_trait;
use canvass_core::error::{CanvassError, Result};
use canvass_core::profile::{CandidateProfile, GeneralAnalysis, ProfileProvider};
use std::collections::HashMap;

/// Profile provider backed by a fixed map of subjects.
#[derive(Default)]
pub struct StaticProfileProvider {
    profiles: HashMap<String, CandidateProfile>,
    priors: HashMap<String, GeneralAnalysis>,
}

impl StaticProfileProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a subject's profile.
    pub fn with_profile(mut self, subject_id: impl Into<String>, profile: CandidateProfile) -> Self {
        self.profiles.insert(subject_id.into(), profile);
        self
    }

    /// Registers a subject's prior-interview analysis.
    pub fn with_prior(mut self, subject_id: impl Into<String>, prior: GeneralAnalysis) -> Self {
        self.priors.insert(subject_id.into(), prior);
        self
    }
}

#[async_trait]
impl ProfileProvider for StaticProfileProvider {
    async fn profile(&self, subject_id: &str) -> Result<CandidateProfile> {
        self.profiles
            .get(subject_id)
            .cloned()
            .ok_or_else(|| CanvassError::internal(format!("no profile for subject '{subject_id}'")))
    }

    async fn prior_analysis(&self, subject_id: &str) -> Result<Option<GeneralAnalysis>> {
        Ok(self.priors.get(subject_id).cloned())
    }
}
