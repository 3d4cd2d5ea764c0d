//! Label candidate extraction and confidence scoring
//!
//! Candidate lines come either from spatial analysis (word boxes with OCR
//! confidence) or from plain text in fallback mode. Each line is filtered,
//! accepted or rejected as a label, normalized, deduplicated, and scored.

use indexmap::IndexMap;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

use super::classifier::ClassificationResult;
use super::normalize::normalize_line;
use crate::config::{ScoringConfig, SpatialSettings};
use crate::vision::{BoundingBox, SpatialLayout};

/// Longest line still considered
const MAX_LINE_LEN: usize = 200;
/// Keyword/pattern acceptance only applies to lines shorter than this
const KEYWORD_LINE_LIMIT: usize = 100;
/// Share of unexpected characters above which a line is noise
const MAX_SPECIAL_RATIO: f32 = 0.6;

lazy_static! {
    static ref RE_NUMERIC: Regex = Regex::new(r"^\d+[\d/\-:.]*$").unwrap();
    static ref RE_SPECIAL_CHAR: Regex = Regex::new(r"[^a-zA-Z0-9\s\-:().,/&*]").unwrap();

    static ref LABEL_SHAPES: Vec<Regex> = vec![
        // Capitalized words ending in a field marker
        Regex::new(r"^[A-Z][a-zA-Z\s]{2,}[:*\-_]").unwrap(),
        Regex::new(r"[:*]\s*$").unwrap(),
        // Numbered item
        Regex::new(r"^\d+[.)]\s*[A-Z]").unwrap(),
        // Capitalized phrase with a currency-style suffix
        Regex::new(r"^[A-Z][a-zA-Z\s]{1,}\s+\$[A-Za-z\s/]+$").unwrap(),
        Regex::new(r"^[A-Z][a-zA-Z\s]*\s+\$.*$").unwrap(),
    ];

    static ref RE_TRAILING_MARKER: Regex = Regex::new(r"[:*\-_]+\s*$").unwrap();
    static ref RE_LIST_MARKER: Regex = Regex::new(r"^\d+[.)]\s*").unwrap();

    static ref RE_TEXT_INLINE: Regex = Regex::new(r"^(.+?)\s*[:*-]?\s*(\.{3,}|_{3,}|\s{5,})(.*)$").unwrap();
    static ref TEXT_LABEL_LINES: Vec<Regex> = vec![
        Regex::new(r"^[A-Z][a-zA-Z\s]{2,}[:*-]?\s*$").unwrap(),
        Regex::new(r"^[A-Z][a-zA-Z\s]*\s+[:*]\s*$").unwrap(),
    ];
    static ref TEXT_PLACEHOLDER_LINES: Vec<Regex> = vec![
        Regex::new(r"^\.{3,}|_{3,}|\s{5,}$").unwrap(),
        Regex::new(r"^\[.*\]$").unwrap(),
        Regex::new(r"^___+$").unwrap(),
    ];
    static ref RE_TEXT_LABEL_MARKER: Regex = Regex::new(r"[:*-]+\s*$").unwrap();
}

/// Where a label/placeholder pairing was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PairingSource {
    /// Plain-text placeholder markup
    Text,
    /// Word positions
    Spatial,
}

/// Evidence that a line labels an input area
#[derive(Debug, Clone, PartialEq)]
pub struct Pairing {
    pub source: PairingSource,
    /// Input area, when positions are known
    pub placeholder: Option<BoundingBox>,
}

/// A line offered to the extractor
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateLine {
    /// Normalized line text, or the paired label text
    pub text: String,
    /// Starting confidence (OCR confidence or the fallback base)
    pub base_confidence: f32,
    pub pairing: Option<Pairing>,
}

/// An accepted label
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelCandidate {
    /// Normalized label text
    pub text: String,
    /// Line the label came from
    pub source_line: String,
    /// Input area paired with the label
    pub placeholder: Option<BoundingBox>,
    /// Score (0-100)
    pub confidence: f32,
}

/// Labels in insertion order, unique by lower-cased text
#[derive(Debug, Clone, Default)]
pub struct LabelSet {
    entries: IndexMap<String, LabelCandidate>,
}

impl LabelSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(text: &str) -> String {
        text.trim().to_lowercase()
    }

    /// Insert unless a label with the same lower-cased text exists
    pub fn insert(&mut self, candidate: LabelCandidate) -> bool {
        let key = Self::key(&candidate.text);
        if self.entries.contains_key(&key) {
            return false;
        }
        self.entries.insert(key, candidate);
        true
    }

    pub fn contains(&self, text: &str) -> bool {
        self.entries.contains_key(&Self::key(text))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LabelCandidate> {
        self.entries.values()
    }

    /// Label texts in order
    pub fn labels(&self) -> Vec<String> {
        self.iter().map(|c| c.text.clone()).collect()
    }

    /// Label text to score, in order
    pub fn confidence_by_label(&self) -> IndexMap<String, f32> {
        self.iter().map(|c| (c.text.clone(), c.confidence)).collect()
    }
}

impl IntoIterator for LabelSet {
    type Item = LabelCandidate;
    type IntoIter = indexmap::map::IntoValues<String, LabelCandidate>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_values()
    }
}

impl FromIterator<LabelCandidate> for LabelSet {
    fn from_iter<I: IntoIterator<Item = LabelCandidate>>(iter: I) -> Self {
        let mut set = LabelSet::new();
        for candidate in iter {
            set.insert(candidate);
        }
        set
    }
}

/// A label/placeholder pair found in plain text
#[derive(Debug, Clone, PartialEq)]
pub struct TextPair {
    pub label: String,
    /// Placeholder markup, e.g. "[.....]"
    pub placeholder: String,
    /// Line holding the label
    pub line_index: usize,
}

/// Find labels followed by placeholder markup in plain-text lines
///
/// Handles inline placeholders ("Name ........") and a label line followed by
/// a placeholder line. A later pairing for the same label replaces an earlier
/// one.
pub fn detect_text_placeholders(lines: &[String], settings: &SpatialSettings) -> Vec<TextPair> {
    let len_ok = |label: &str| {
        let len = label.chars().count();
        len >= settings.min_label_len && len <= settings.max_label_len
    };
    let mut pairs: IndexMap<String, TextPair> = IndexMap::new();

    for (idx, line) in lines.iter().enumerate() {
        if let Some(caps) = RE_TEXT_INLINE.captures(line) {
            let label = caps[1].trim().to_string();
            let suffix = caps[3].trim();
            if len_ok(&label) {
                let placeholder = if suffix.is_empty() {
                    format!("[{}]", caps[2].trim())
                } else {
                    format!("[{}] {}", caps[2].trim(), suffix)
                };
                pairs.insert(
                    label.clone(),
                    TextPair {
                        label,
                        placeholder,
                        line_index: idx,
                    },
                );
            }
        }

        if let Some(next) = lines.get(idx + 1) {
            let is_label = TEXT_LABEL_LINES.iter().any(|re| re.is_match(line));
            let is_placeholder = TEXT_PLACEHOLDER_LINES.iter().any(|re| re.is_match(next));
            if is_label && is_placeholder {
                let label = RE_TEXT_LABEL_MARKER.replace(line, "").trim().to_string();
                if len_ok(&label) {
                    pairs.insert(
                        label.clone(),
                        TextPair {
                            label,
                            placeholder: format!("[{}]", next.trim()),
                            line_index: idx,
                        },
                    );
                }
            }
        }
    }

    pairs.into_values().collect()
}

/// Candidate lines from plain text (fallback mode)
///
/// Lines are normalized first; a line with a detected placeholder offers its
/// label text instead of the whole line.
pub fn text_candidate_lines(text: &str, base_confidence: f32, settings: &SpatialSettings) -> Vec<CandidateLine> {
    let lines: Vec<String> = text.lines().map(normalize_line).collect();
    let pairs = detect_text_placeholders(&lines, settings);

    lines
        .iter()
        .enumerate()
        .filter(|(_, line)| !line.is_empty())
        .map(|(idx, line)| match pairs.iter().rev().find(|p| p.line_index == idx) {
            Some(pair) => CandidateLine {
                text: pair.label.clone(),
                base_confidence,
                pairing: Some(Pairing {
                    source: PairingSource::Text,
                    placeholder: None,
                }),
            },
            None => CandidateLine {
                text: line.clone(),
                base_confidence,
                pairing: None,
            },
        })
        .collect()
}

/// Candidate lines from a spatial layout
///
/// Paired lines offer their label with the label words' confidence; other
/// lines offer their whole text with the line's mean confidence.
pub fn spatial_candidate_lines(layout: &SpatialLayout) -> Vec<CandidateLine> {
    layout
        .lines
        .iter()
        .enumerate()
        .map(|(idx, line)| match layout.pair_for_line(idx) {
            Some(pair) => CandidateLine {
                text: normalize_line(&pair.label),
                base_confidence: pair.confidence,
                pairing: Some(Pairing {
                    source: PairingSource::Spatial,
                    placeholder: Some(pair.placeholder),
                }),
            },
            None => CandidateLine {
                text: normalize_line(&line.text()),
                base_confidence: line.mean_confidence(),
                pairing: None,
            },
        })
        .collect()
}

/// True when a line cannot be a label at all
pub fn is_discarded(line: &str) -> bool {
    let len = line.chars().count();
    if !(2..=MAX_LINE_LEN).contains(&len) {
        return true;
    }
    if RE_NUMERIC.is_match(line) {
        return true;
    }
    let special = RE_SPECIAL_CHAR.find_iter(line).count();
    if special as f32 > len as f32 * MAX_SPECIAL_RATIO {
        return true;
    }
    line.chars().filter(|c| c.is_ascii_alphabetic()).count() < 2
}

/// True when a line has a typical label shape
pub fn is_label_shaped(line: &str) -> bool {
    LABEL_SHAPES.iter().any(|re| re.is_match(line))
}

/// Strip trailing field markers and a leading list number
pub fn normalize_label(line: &str) -> String {
    let stripped = RE_TRAILING_MARKER.replace(line, "");
    RE_LIST_MARKER.replace(&stripped, "").trim().to_string()
}

/// Filters, accepts, and scores candidate lines
pub struct LabelExtractor<'a> {
    scoring: &'a ScoringConfig,
    classification: &'a ClassificationResult,
}

impl<'a> LabelExtractor<'a> {
    pub fn new(scoring: &'a ScoringConfig, classification: &'a ClassificationResult) -> Self {
        Self {
            scoring,
            classification,
        }
    }

    /// Run every candidate line through the filters and scoring
    pub fn extract(&self, lines: &[CandidateLine]) -> LabelSet {
        let mut labels = LabelSet::new();

        for line in lines {
            let text = line.text.trim();
            if is_discarded(text) {
                continue;
            }

            let accepted = line.pairing.is_some()
                || is_label_shaped(text)
                || (self.classification.profile.matches(text) && text.chars().count() < KEYWORD_LINE_LIMIT);
            if !accepted {
                continue;
            }

            let label = normalize_label(text);
            if label.chars().count() < 2 || labels.contains(&label) {
                continue;
            }

            let confidence = self.score(&label, line.base_confidence, line.pairing.as_ref());
            labels.insert(LabelCandidate {
                text: label,
                source_line: text.to_string(),
                placeholder: line.pairing.as_ref().and_then(|p| p.placeholder),
                confidence,
            });
        }

        labels
    }

    /// Additive score for one label, clamped to 0..=100
    pub fn score(&self, label: &str, base: f32, pairing: Option<&Pairing>) -> f32 {
        let mut score = base;

        score += match pairing.map(|p| p.source) {
            Some(PairingSource::Text) => self.scoring.text_pairing_bonus,
            Some(PairingSource::Spatial) => self.scoring.spatial_pairing_bonus,
            None => 0.0,
        };

        if self.classification.profile.matches(label) {
            score += if self.classification.is_generic() {
                self.scoring.generic_keyword_bonus
            } else {
                self.classification.profile.confidence_boost as f32
            };
        }

        if label.contains(':') {
            score += self.scoring.colon_bonus;
        }
        let len = label.chars().count();
        if len > 10 && len < 80 {
            score += self.scoring.length_bonus;
        }
        if label.starts_with(|c: char| c.is_ascii_uppercase()) {
            score += self.scoring.uppercase_bonus;
        }

        score.clamp(0.0, 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::classifier::detect_form_type;
    use crate::storage::ProfileSet;
    use crate::vision::ocr::RecognizedWord;
    use crate::vision::spatial::{FieldPair, VisualLine};

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(|l| l.trim().to_string()).collect()
    }

    fn generic() -> ClassificationResult {
        detect_form_type("", &ProfileSet::builtin())
    }

    #[test]
    fn test_label_set_dedup_case_insensitive() {
        let mut set = LabelSet::new();
        let candidate = |text: &str| LabelCandidate {
            text: text.into(),
            source_line: text.into(),
            placeholder: None,
            confidence: 50.0,
        };
        assert!(set.insert(candidate("Name")));
        assert!(!set.insert(candidate("NAME ")));
        assert!(set.insert(candidate("Email")));
        assert_eq!(set.labels(), vec!["Name", "Email"]);
        assert!(set.contains("name"));
        assert!(set.contains("EMAIL"));
        assert_eq!(set.confidence_by_label()["Email"], 50.0);
    }

    #[test]
    fn test_discard_filters() {
        assert!(is_discarded("a"));
        assert!(is_discarded(&"x".repeat(201)));
        assert!(is_discarded("12/05/2024"));
        assert!(is_discarded("12345"));
        assert!(is_discarded("!!!"));
        assert!(is_discarded("..."));
        assert!(is_discarded("A 1"));
        assert!(!is_discarded("Name:"));
        assert!(!is_discarded("Fee (Rs.) *"));
    }

    #[test]
    fn test_label_shapes() {
        assert!(is_label_shaped("Patient Name:"));
        assert!(is_label_shaped("email *"));
        assert!(is_label_shaped("3. Address"));
        assert!(is_label_shaped("Fee Amount $USD"));
        assert!(!is_label_shaped("the quick brown fox"));
    }

    #[test]
    fn test_normalize_label() {
        assert_eq!(normalize_label("Patient Name:"), "Patient Name");
        assert_eq!(normalize_label("2) Date of Birth *"), "Date of Birth");
        assert_eq!(normalize_label("Signature__"), "Signature");
    }

    #[test]
    fn test_detect_inline_text_placeholder() {
        let pairs = detect_text_placeholders(
            &lines("Date of Birth ........ (dd/mm/yyyy)"),
            &SpatialSettings::default(),
        );
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].label, "Date of Birth");
        assert_eq!(pairs[0].placeholder, "[........] (dd/mm/yyyy)");
    }

    #[test]
    fn test_detect_next_line_text_placeholder() {
        let pairs = detect_text_placeholders(
            &lines("Room No\n____\nDiet:\n[ ]"),
            &SpatialSettings::default(),
        );
        let labels: Vec<&str> = pairs.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, vec!["Room No", "Diet"]);
        assert_eq!(pairs[1].line_index, 2);
    }

    #[test]
    fn test_fallback_scoring() {
        let classification = generic();
        let scoring = ScoringConfig::default();
        let extractor = LabelExtractor::new(&scoring, &classification);
        let candidates = text_candidate_lines("Zebra Crossing:\n", scoring.fallback_confidence, &SpatialSettings::default());
        let labels = extractor.extract(&candidates);

        // 50 base + length 5 + uppercase 5; no keyword, no pairing
        assert_eq!(labels.labels(), vec!["Zebra Crossing"]);
        assert!((labels.confidence_by_label()["Zebra Crossing"] - 60.0).abs() < 1e-4);
    }

    #[test]
    fn test_generic_keyword_bonus() {
        let classification = generic();
        let scoring = ScoringConfig::default();
        let extractor = LabelExtractor::new(&scoring, &classification);
        // 50 + 15 keyword + 5 uppercase
        assert!((extractor.score("Email", 50.0, None) - 70.0).abs() < 1e-4);
    }

    #[test]
    fn test_profile_boost_replaces_generic_bonus() {
        let profiles = ProfileSet::builtin();
        let classification = detect_form_type("Patient Name\nDoctor Name\nDiagnosis", &profiles);
        assert_eq!(classification.form_type(), "hospital");
        let scoring = ScoringConfig::default();
        let extractor = LabelExtractor::new(&scoring, &classification);
        // 40 + 20 boost + 5 length + 5 uppercase
        assert!((extractor.score("Patient Name", 40.0, None) - 70.0).abs() < 1e-4);
        // No hospital keyword: no boost even though "Email" is a generic field word
        assert!((extractor.score("Email", 40.0, None) - 45.0).abs() < 1e-4);
    }

    #[test]
    fn test_pairing_bonus_by_source() {
        let classification = generic();
        let scoring = ScoringConfig::default();
        let extractor = LabelExtractor::new(&scoring, &classification);
        let text = Pairing {
            source: PairingSource::Text,
            placeholder: None,
        };
        let spatial = Pairing {
            source: PairingSource::Spatial,
            placeholder: None,
        };
        assert!((extractor.score("zzz", 10.0, Some(&text)) - 35.0).abs() < 1e-4);
        assert!((extractor.score("zzz", 10.0, Some(&spatial)) - 40.0).abs() < 1e-4);
    }

    #[test]
    fn test_score_clamped() {
        let classification = generic();
        let scoring = ScoringConfig::default();
        let extractor = LabelExtractor::new(&scoring, &classification);
        let spatial = Pairing {
            source: PairingSource::Spatial,
            placeholder: None,
        };
        assert_eq!(extractor.score("Father Name: Mr", 95.0, Some(&spatial)), 100.0);
    }

    #[test]
    fn test_unlabelled_prose_rejected() {
        let classification = generic();
        let scoring = ScoringConfig::default();
        let extractor = LabelExtractor::new(&scoring, &classification);
        let candidates = text_candidate_lines("quick brown fox jumps", 50.0, &SpatialSettings::default());
        assert!(extractor.extract(&candidates).is_empty());
    }

    #[test]
    fn test_spatial_candidates_use_pair_label() {
        let word = |text: &str, x: u32, y: u32, conf: f32| {
            RecognizedWord::new(text, BoundingBox::new(x, y, 40, 18), conf, 0)
        };
        let layout = SpatialLayout {
            lines: vec![
                VisualLine {
                    key: 20,
                    words: vec![word("Blood", 10, 20, 80.0), word("Group:", 60, 20, 60.0)],
                },
                VisualLine {
                    key: 60,
                    words: vec![word("______", 10, 60, 50.0)],
                },
            ],
            pairs: vec![FieldPair {
                label: "Blood Group".into(),
                line_index: 0,
                placeholder: BoundingBox::new(10, 60, 40, 18),
                confidence: 70.0,
                inline: false,
            }],
        };
        let candidates = spatial_candidate_lines(&layout);
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].text, "Blood Group");
        assert_eq!(candidates[0].base_confidence, 70.0);
        assert_eq!(candidates[1].pairing, None);

        let classification = generic();
        let scoring = ScoringConfig::default();
        let labels = LabelExtractor::new(&scoring, &classification).extract(&candidates);
        let blood = labels.iter().next().unwrap();
        assert_eq!(blood.text, "Blood Group");
        // 70 + 30 spatial + 15 keyword + 5 length + 5 uppercase, clamped
        assert_eq!(blood.confidence, 100.0);
        assert_eq!(blood.placeholder, Some(BoundingBox::new(10, 60, 40, 18)));
        assert_eq!(labels.len(), 1);
    }
}
