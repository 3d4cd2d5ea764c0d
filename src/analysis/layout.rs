//! Section/layout analysis
//!
//! Splits recognized lines into named sections by header keywords.

use indexmap::IndexMap;
use lazy_static::lazy_static;
use regex::{Regex, RegexBuilder};
use serde::Serialize;

/// Section holding lines seen before the first header
pub const DEFAULT_SECTION: &str = "General";

lazy_static! {
    static ref RE_SECTION_HEADER: Regex = RegexBuilder::new(&format!(
        r"^({})[\s:]*$",
        SECTION_KEYWORDS.join("|")
    ))
    .case_insensitive(true)
    .build()
    .unwrap();

    static ref RE_HEADER_MARKER: Regex = Regex::new(r"[:*\-_]+\s*$").unwrap();
}

const SECTION_KEYWORDS: &[&str] = &[
    "section", "part", "chapter", "information", "details", "declaration", "signature",
    "verification", "authorization", "remarks", "notes", "comments", "additional", "special",
    "preferences", "choices", "options", "categories", "quotas", "merits", "ranks", "scores",
    "percentages", "divisions", "results", "attendance", "conduct", "behavior", "discipline",
    "uniforms", "documents", "certificates", "diplomas", "degrees", "licenses", "permits",
    "visas", "passports", "ids", "proofs", "accounts", "statements", "ledgers", "vouchers",
    "receipts", "invoices", "bills", "estimates", "quotations", "orders", "deliveries",
    "trackings", "shipments", "cargos", "freights", "customs", "duties", "taxes", "discounts",
    "rebates", "refunds", "claims", "complaints", "feedbacks", "reviews", "ratings",
    "suggestions", "recommendations", "approvals", "rejections", "pending", "cancelled",
    "completed", "submitted", "received", "processed", "verified", "approved", "rejected",
    "on hold", "in progress", "archived", "deleted", "restored", "updated", "modified",
    "created", "edited", "reviewed", "signed", "sealed", "stamped", "notarized", "witnessed",
    "attested", "certified", "authorized", "endorsed", "countersigned", "initialed", "dated",
    "timed", "logged", "recorded", "documented", "filed", "stored", "backed up", "recovered",
    "migrated", "transferred", "exported", "imported", "synchronized", "replicated",
    "distributed", "shared", "published", "posted", "uploaded", "downloaded", "streamed",
    "cached", "buffered", "compressed", "encrypted", "decrypted", "hashed", "validated",
    "authenticated", "permitted", "allowed", "denied", "blocked", "restricted", "limited",
    "unlimited", "conditional", "provisional", "temporary", "permanent", "fixed", "variable",
];

/// Section names and the lines under each
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionLayout {
    /// Detected header names in order of first appearance
    pub names: Vec<String>,
    /// Section name to its lines, in order
    pub line_groups: IndexMap<String, Vec<String>>,
}

/// True when a line is a section header
pub fn is_section_header(line: &str) -> bool {
    RE_SECTION_HEADER.is_match(line.trim())
}

/// Group lines under the most recent header
///
/// Every non-empty line lands in exactly one group; headers only start new
/// groups. A header seen twice resumes its existing group.
pub fn analyze_layout(text: &str) -> SectionLayout {
    let mut layout = SectionLayout::default();
    let mut current = DEFAULT_SECTION.to_string();

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if is_section_header(line) {
            current = RE_HEADER_MARKER.replace(line, "").trim().to_string();
            if !layout.names.contains(&current) {
                layout.names.push(current.clone());
            }
            layout.line_groups.entry(current.clone()).or_default();
        } else {
            layout
                .line_groups
                .entry(current.clone())
                .or_default()
                .push(line.to_string());
        }
    }

    layout
}
