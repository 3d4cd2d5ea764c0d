//! Form-type classification
//!
//! Scores the recognized text against every profile and keeps the best one.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::storage::{FormTypeProfile, ProfileSet};

const KEYWORD_WEIGHT: f32 = 5.0;
const PATTERN_WEIGHT: f32 = 15.0;

/// Outcome of form-type detection
#[derive(Debug, Clone)]
pub struct ClassificationResult {
    /// Selected profile, or the generic fallback
    pub profile: Arc<FormTypeProfile>,
    /// Score of the selected profile (0-100)
    pub confidence: f32,
}

impl ClassificationResult {
    /// Profile id, e.g. "hospital" or "generic"
    pub fn form_type(&self) -> &str {
        &self.profile.id
    }

    pub fn profile_name(&self) -> &str {
        &self.profile.name
    }

    pub fn is_generic(&self) -> bool {
        self.profile.is_generic()
    }

    /// Payload view
    pub fn summary(&self) -> FormTypeSummary {
        FormTypeSummary {
            form_type: self.form_type().to_string(),
            profile_name: self.profile_name().to_string(),
            confidence: self.confidence,
        }
    }
}

/// Serializable form-type summary
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormTypeSummary {
    #[serde(rename = "type")]
    pub form_type: String,
    pub profile_name: String,
    pub confidence: f32,
}

/// Score one profile against the text
///
/// Keyword hits count every occurrence; patterns count once each. The sum is
/// weighted and divided by the profile's keyword and pattern count.
pub fn score_profile(profile: &FormTypeProfile, text: &str) -> f32 {
    let denominator = profile.keywords.len() + profile.pattern_count();
    if denominator == 0 {
        return 0.0;
    }
    let keyword_hits = profile.keyword_occurrences(text) as f32;
    let pattern_hits = profile.pattern_matches(text) as f32;
    ((keyword_hits * KEYWORD_WEIGHT + pattern_hits * PATTERN_WEIGHT) / denominator as f32).min(100.0)
}

/// Pick the profile with the strictly highest score
///
/// Ties keep the earlier profile; when nothing scores, the generic profile is
/// returned with confidence 0.
pub fn detect_form_type(text: &str, profiles: &ProfileSet) -> ClassificationResult {
    let mut best = ClassificationResult {
        profile: Arc::clone(profiles.generic()),
        confidence: 0.0,
    };

    for profile in profiles.profiles() {
        let score = score_profile(profile, text);
        debug!("Form type {}: score {:.2}", profile.id, score);
        if score > best.confidence {
            best = ClassificationResult {
                profile: Arc::clone(profile),
                confidence: score,
            };
        }
    }

    best
}
