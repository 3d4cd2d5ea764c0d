//! Spatial text analysis
//!
//! Rebuilds visual lines from word boxes and pairs labels with the input
//! placeholders (dot leaders, underscores, bracketed blanks) next to them.

use std::collections::BTreeMap;

use indexmap::IndexSet;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

use super::ocr::RecognizedWord;
use super::BoundingBox;
use crate::config::SpatialSettings;
use crate::error::{ExtractionError, Result};

lazy_static! {
    /// A line that is only a label ending in a field marker
    static ref RE_LABEL_LINE: Regex = Regex::new(r"^(.+?)\s*[:*\-_]\s*$").unwrap();

    /// A capitalized phrase without a marker, e.g. "Room No"
    static ref RE_BARE_LABEL_LINE: Regex = Regex::new(r"^([A-Z][a-zA-Z\s]{2,}?)\s*[:*\-]?\s*$").unwrap();

    /// Placeholder text on the line below a label
    static ref RE_PLACEHOLDER_LINE: Regex = Regex::new(r"^\.{3,}|_{3,}|\[.*\]|^\s{5,}$").unwrap();

    /// A single placeholder word
    static ref RE_PLACEHOLDER_WORD: Regex = Regex::new(r"^\.{3,}|_{3,}$").unwrap();

    /// Label and placeholder on the same line
    static ref RE_INLINE_PAIR: Regex =
        Regex::new(r"^(.+?)\s*[:*\-_]\s*(\.{3,}|_{3,}|\[.*\]|\s{5,})(.*)$").unwrap();

    /// A word that starts or contains an inline placeholder
    static ref RE_PLACEHOLDER_FRAGMENT: Regex = Regex::new(r"\.{3,}|_{3,}|\[").unwrap();
}

/// Words sharing a vertical bucket, ordered left to right
#[derive(Debug, Clone, PartialEq)]
pub struct VisualLine {
    /// Rounded y coordinate shared by the words
    pub key: u32,
    pub words: Vec<RecognizedWord>,
}

impl VisualLine {
    /// Word texts joined with single spaces
    pub fn text(&self) -> String {
        self.words
            .iter()
            .map(|w| w.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Box around every word on the line
    pub fn bbox(&self) -> BoundingBox {
        let mut iter = self.words.iter().map(|w| w.bbox);
        match iter.next() {
            Some(first) => iter.fold(first, |acc, b| acc.union(&b)),
            None => BoundingBox::default(),
        }
    }

    /// Mean word confidence
    pub fn mean_confidence(&self) -> f32 {
        mean_confidence(&self.words)
    }
}

/// A label matched with the area where the answer goes
#[derive(Debug, Clone, PartialEq)]
pub struct FieldPair {
    /// Label text without its trailing marker
    pub label: String,
    /// Index of the label's line in [`SpatialLayout::lines`]
    pub line_index: usize,
    /// Input area
    pub placeholder: BoundingBox,
    /// Mean confidence of the label's own words
    pub confidence: f32,
    /// Placeholder sits on the label's line rather than the next one
    pub inline: bool,
}

/// Visual lines plus the label/placeholder pairs found on them
#[derive(Debug, Clone, Default)]
pub struct SpatialLayout {
    pub lines: Vec<VisualLine>,
    pub pairs: Vec<FieldPair>,
}

impl SpatialLayout {
    /// Pair recorded for a line, if any
    ///
    /// `locate` records a line's next-line pair before its inline pair, so the
    /// next-line pair wins when a line has both.
    pub fn pair_for_line(&self, line_index: usize) -> Option<&FieldPair> {
        self.pairs.iter().find(|p| p.line_index == line_index)
    }
}

/// Groups words into lines and detects field pairings
#[derive(Debug, Clone)]
pub struct SpatialLocator {
    line_bucket: u32,
    min_label_len: usize,
    max_label_len: usize,
}

impl Default for SpatialLocator {
    fn default() -> Self {
        Self::new(&SpatialSettings::default())
    }
}

impl SpatialLocator {
    pub fn new(settings: &SpatialSettings) -> Self {
        Self {
            line_bucket: settings.line_bucket.max(1),
            min_label_len: settings.min_label_len,
            max_label_len: settings.max_label_len,
        }
    }

    /// Group words into visual lines
    ///
    /// Words with no text or non-positive confidence are dropped. Lines are
    /// ordered top to bottom, words left to right.
    pub fn group_lines(&self, words: &[RecognizedWord]) -> Vec<VisualLine> {
        let mut buckets: BTreeMap<u32, Vec<RecognizedWord>> = BTreeMap::new();
        for word in words {
            if word.text.trim().is_empty() || word.confidence <= 0.0 {
                continue;
            }
            let key = (word.bbox.y as f32 / self.line_bucket as f32).round() as u32 * self.line_bucket;
            buckets.entry(key).or_default().push(word.clone());
        }

        buckets
            .into_iter()
            .map(|(key, mut words)| {
                words.sort_by_key(|w| w.bbox.x);
                VisualLine { key, words }
            })
            .collect()
    }

    /// Build lines and pairings from a per-word table
    ///
    /// Returns [`ExtractionError::NoWordsExtracted`] when no usable word remains.
    pub fn locate(&self, words: &[RecognizedWord]) -> Result<SpatialLayout> {
        let lines = self.group_lines(words);
        if lines.is_empty() {
            return Err(ExtractionError::NoWordsExtracted);
        }

        let mut pairs: Vec<FieldPair> = Vec::new();
        let mut seen: IndexSet<String> = IndexSet::new();
        let mut record = |pair: FieldPair| {
            if seen.insert(pair.label.trim().to_lowercase()) {
                pairs.push(pair);
            }
        };

        for (idx, line) in lines.iter().enumerate() {
            let text = line.text();

            if let (Some(label), Some(next)) = (standalone_label(&text), lines.get(idx + 1)) {
                if self.label_ok(&label) && has_placeholder(next) {
                    record(FieldPair {
                        label,
                        line_index: idx,
                        placeholder: next.words[0].bbox,
                        confidence: line.mean_confidence(),
                        inline: false,
                    });
                }
            }

            if let Some(caps) = RE_INLINE_PAIR.captures(&text) {
                let label = caps[1].trim().to_string();
                if self.label_ok(&label) {
                    let (label_words, placeholder) = split_inline(line);
                    record(FieldPair {
                        label,
                        line_index: idx,
                        placeholder,
                        confidence: mean_confidence(label_words),
                        inline: true,
                    });
                }
            }
        }

        debug!("Spatial analysis: {} lines, {} field pairs", lines.len(), pairs.len());
        Ok(SpatialLayout { lines, pairs })
    }

    fn label_ok(&self, label: &str) -> bool {
        let len = label.chars().count();
        len >= self.min_label_len && len <= self.max_label_len && label.chars().any(char::is_alphabetic)
    }
}

/// Label text of a line holding nothing but a label
fn standalone_label(text: &str) -> Option<String> {
    RE_LABEL_LINE
        .captures(text)
        .or_else(|| RE_BARE_LABEL_LINE.captures(text))
        .map(|caps| caps[1].trim().to_string())
}

fn has_placeholder(line: &VisualLine) -> bool {
    RE_PLACEHOLDER_LINE.is_match(&line.text())
        || line.words.iter().any(|w| RE_PLACEHOLDER_WORD.is_match(&w.text))
}

/// Split a line at its first placeholder word
///
/// Returns the label's words and the placeholder area. A placeholder glued to
/// the label ("Name:_____") keeps that word on the label side.
fn split_inline(line: &VisualLine) -> (&[RecognizedWord], BoundingBox) {
    let first = line
        .words
        .iter()
        .position(|w| RE_PLACEHOLDER_FRAGMENT.is_match(&w.text))
        .unwrap_or(0);

    let placeholder = line.words[first..]
        .iter()
        .skip(1)
        .fold(line.words[first].bbox, |acc, w| acc.union(&w.bbox));

    if first == 0 {
        (&line.words[..1], placeholder)
    } else {
        (&line.words[..first], placeholder)
    }
}

fn mean_confidence(words: &[RecognizedWord]) -> f32 {
    if words.is_empty() {
        return 0.0;
    }
    words.iter().map(|w| w.confidence).sum::<f32>() / words.len() as f32
}
