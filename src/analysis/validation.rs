//! Final validation pass over extracted labels
//!
//! Drops shapes that are never field labels (page numbers, lone letters,
//! bare function words) and rewards the survivors with a flat bonus.

use lazy_static::lazy_static;
use regex::{Regex, RegexBuilder};

use super::labels::{LabelCandidate, LabelSet};

const MAX_NOISE_RATIO: f32 = 0.3;

lazy_static! {
    static ref INVALID_SHAPES: Vec<Regex> = vec![
        Regex::new(r"^\d+$").unwrap(),
        Regex::new(r"^[^A-Za-z0-9_\s]+$").unwrap(),
        Regex::new(r"^\s+$").unwrap(),
        Regex::new(r"^[.,;:]+$").unwrap(),
        Regex::new(r"^[a-z]$").unwrap(),
        Regex::new(r"^[A-Z]$").unwrap(),
        insensitive(r"^(page|page\s+\d+|pg\s+\d+|p\s+\d+)$"),
        insensitive(r"^(of|and|or|the|a|an|in|on|at|to|for|with|by)$"),
        insensitive(r"^(mr|mrs|ms|dr|prof|sr|jr)$"),
    ];

    static ref RE_NOISE_CHAR: Regex = Regex::new(r"[^a-zA-Z0-9\s\-:().,/&]").unwrap();

    static ref VALID_SHAPES: Vec<Regex> = vec![
        Regex::new(r"^[A-Z][a-zA-Z\s]{2,}[:*]?\s*$").unwrap(),
        Regex::new(r"^.+[:*]\s*$").unwrap(),
        Regex::new(r"^\d+\.\s*[A-Z]").unwrap(),
    ];
}

fn insensitive(pattern: &str) -> Regex {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .unwrap()
}

/// Field words; a label containing any of them passes validation
const FIELD_KEYWORDS: &[&str] = &[
    "name", "email", "phone", "address", "date", "signature", "id", "number", "age", "gender",
    "male", "female", "blood", "type", "branch", "course", "semester", "room", "warden", "diet",
    "vegetarian", "faculty", "manager", "office", "reason", "stay", "required", "application",
    "hostel", "student", "year", "photo", "from", "to", "period", "duration", "registration",
    "roll", "enrollment", "department", "class", "section", "marks", "grade", "fee", "payment",
    "amount", "remarks", "approved", "verified", "checked", "issued", "designation", "stamp",
    "seal", "authorized", "certified", "submitted", "received", "processed", "status", "notes",
    "comments", "additional", "special", "preference", "choice", "option", "category", "quota",
    "merit", "rank", "score", "percentage", "division", "result", "pass", "fail", "attendance",
    "conduct", "behavior", "discipline", "uniform", "shoes", "tie", "badge", "card", "proof",
    "document", "certificate", "diploma", "degree", "license", "permit", "visa", "passport",
    "insurance", "bank", "account", "transfer", "deposit", "withdrawal", "balance", "statement",
    "receipt", "invoice", "bill", "order", "delivery", "tracking", "shipment", "customs", "duty",
    "tax", "discount", "rebate", "refund", "claim", "complaint", "feedback", "review", "rating",
    "suggestion", "recommendation", "approval", "rejection", "pending", "cancelled", "completed",
    "rejected", "archived", "deleted", "restored", "updated", "modified", "created", "edited",
    "reviewed", "signed", "sealed", "stamped", "notarized", "witnessed", "attested", "endorsed",
    "countersigned", "initialed", "dated", "logged", "recorded", "documented", "filed", "stored",
    "saved", "printed", "copied", "scanned", "uploaded", "downloaded", "emailed", "courier",
    "registered", "posted", "shipped", "delivered", "accepted", "processing", "refunded",
    "exchanged", "returned", "replaced", "repaired", "serviced", "maintained", "inspected",
    "tested", "calibrated", "adjusted", "configured", "installed", "setup", "connected",
    "disconnected", "enabled", "disabled", "activated", "deactivated", "started", "stopped",
    "paused", "resumed", "restarted", "reset", "cleared", "removed", "added", "inserted",
    "changed", "revised", "corrected", "improved", "enhanced", "optimized", "upgraded",
    "migrated", "imported", "exported", "backed", "recovered", "compressed", "encrypted",
    "decrypted", "authenticated", "declined", "confirmed", "postponed", "delayed", "expedited",
    "rushed", "urgent", "normal", "standard", "regular", "custom", "personal", "business",
    "commercial", "industrial", "residential", "government", "public", "private", "non-profit",
    "profit", "educational", "medical", "legal", "financial", "technical", "administrative",
    "operational", "maintenance", "support", "service", "sales", "marketing", "research",
    "development", "production", "manufacturing", "quality", "control", "assurance", "testing",
    "inspection", "audit", "analysis", "design", "planning", "implementation", "execution",
    "monitoring", "evaluation", "reporting", "documentation", "training", "education",
    "learning", "teaching", "instruction", "guidance", "supervision", "management", "leadership",
    "direction", "coordination", "communication", "collaboration", "cooperation", "partnership",
    "alliance", "joint", "venture", "project", "program", "initiative", "campaign", "activity",
    "event", "occasion", "ceremony", "celebration", "conference", "meeting", "workshop",
    "seminar", "lesson", "session", "term", "quarter", "month", "week", "day", "hour", "minute",
    "second", "time", "schedule", "calendar", "agenda", "minutes", "records", "files",
    "documents", "papers", "reports", "statements", "forms", "applications", "requests",
    "proposals", "contracts", "agreements", "policies", "procedures", "rules", "regulations",
    "guidelines", "standards", "specifications", "requirements", "criteria", "conditions",
    "terms", "clauses", "sections", "chapters", "pages", "lines", "items", "entries", "data",
    "information", "details", "facts", "figures", "statistics", "numbers", "values", "amounts",
    "quantities", "measurements", "dimensions", "sizes", "weights", "volumes", "areas",
    "lengths", "widths", "heights", "depths", "thicknesses", "diameters", "radii",
    "circumferences", "perimeters", "distances", "positions", "locations", "coordinates",
    "addresses", "places", "regions", "zones", "districts", "states", "countries", "continents",
];

/// True when a label survives the validation pass
pub fn is_valid_label(label: &str) -> bool {
    let label = label.trim();
    let len = label.chars().count();
    if !(2..=100).contains(&len) {
        return false;
    }
    if INVALID_SHAPES.iter().any(|re| re.is_match(label)) {
        return false;
    }

    let noise = RE_NOISE_CHAR.find_iter(label).count();
    if noise as f32 / len as f32 > MAX_NOISE_RATIO {
        return false;
    }

    let mixed_case = label.chars().any(|c| c.is_ascii_uppercase())
        && label.chars().any(|c| c.is_ascii_lowercase())
        && (3..=80).contains(&len);
    if mixed_case || VALID_SHAPES.iter().any(|re| re.is_match(label)) {
        return true;
    }

    let lower = label.to_lowercase();
    len >= 3 && FIELD_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

/// Keep valid labels and add `bonus` to each, capped at 100
pub fn validate_labels(labels: LabelSet, bonus: f32) -> LabelSet {
    labels
        .into_iter()
        .filter(|candidate| is_valid_label(&candidate.text))
        .map(|candidate| LabelCandidate {
            text: candidate.text.trim().to_string(),
            confidence: (candidate.confidence + bonus).clamp(0.0, 100.0),
            ..candidate
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(text: &str, confidence: f32) -> LabelCandidate {
        LabelCandidate {
            text: text.into(),
            source_line: text.into(),
            placeholder: None,
            confidence,
        }
    }

    #[test]
    fn test_shape_tables_compile() {
        lazy_static::initialize(&INVALID_SHAPES);
        lazy_static::initialize(&VALID_SHAPES);
        lazy_static::initialize(&RE_NOISE_CHAR);
        assert_eq!(INVALID_SHAPES.len(), 9);
        assert_eq!(VALID_SHAPES.len(), 3);
    }

    #[test]
    fn test_invalid_shapes_rejected() {
        for label in ["42", "#$%", "Page 3", "pg 12", "The", "and", "Mr", "DR", "x", "Q", ";;"] {
            assert!(!is_valid_label(label), "{:?} should be rejected", label);
        }
    }

    #[test]
    fn test_noise_ratio_rejected() {
        assert!(!is_valid_label("N@m#~*"));
    }

    #[test]
    fn test_valid_labels_pass() {
        assert!(is_valid_label("Room No"));
        assert!(is_valid_label("Patient Name"));
        assert!(is_valid_label("DOB:"));
        assert!(is_valid_label("1. ADDRESS"));
        // Lowercase, no label shape, but contains a field word
        assert!(is_valid_label("contact number"));
    }

    #[test]
    fn test_lowercase_without_keyword_rejected() {
        assert!(!is_valid_label("xyzzy"));
    }

    #[test]
    fn test_bonus_applied_and_capped() {
        let set: LabelSet = vec![
            candidate("Patient Name", 60.0),
            candidate("Page 2", 80.0),
            candidate("Room No", 95.0),
        ]
        .into_iter()
        .collect();

        let validated = validate_labels(set, 10.0);
        assert_eq!(validated.labels(), vec!["Patient Name", "Room No"]);
        let confidence = validated.confidence_by_label();
        assert_eq!(confidence["Patient Name"], 70.0);
        assert_eq!(confidence["Room No"], 100.0);
    }
}
