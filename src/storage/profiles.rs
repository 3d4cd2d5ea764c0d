//! Form-type profile storage and loading
//!
//! A profile bundles the keywords, field-shape patterns, and expected section
//! names of one kind of form. Profiles are compiled once and shared read-only.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use lazy_static::lazy_static;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

/// Id of the fallback profile used when nothing else scores
pub const GENERIC_PROFILE_ID: &str = "generic";

lazy_static! {
    static ref BUILTIN_PROFILES: Arc<ProfileSet> = Arc::new(
        ProfileSet::from_definitions(builtin_definitions())
            .expect("built-in profile patterns are valid regexes")
    );
}

/// Serializable profile, as stored in a profile JSON file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileDefinition {
    /// Profile identifier, e.g. "hospital"
    pub id: String,
    /// Display name, e.g. "Hospital Form"
    pub name: String,
    /// Whole-word keywords, matched case-insensitively
    pub keywords: Vec<String>,
    /// Field-shape regexes, matched case-insensitively
    #[serde(default)]
    pub field_patterns: Vec<String>,
    /// Expected section names in reading order
    #[serde(default)]
    pub sections: Vec<String>,
    /// Confidence added to labels matching this profile
    pub confidence_boost: u32,
}

/// A compiled form-type profile
#[derive(Debug, Clone)]
pub struct FormTypeProfile {
    pub id: String,
    pub name: String,
    pub keywords: Vec<String>,
    pub sections: Vec<String>,
    pub confidence_boost: u32,
    pattern_sources: Vec<String>,
    keyword_res: Vec<Regex>,
    any_keyword: Option<Regex>,
    patterns: Vec<Regex>,
}

impl FormTypeProfile {
    /// Compile a definition's keywords and patterns
    pub fn compile(def: ProfileDefinition) -> std::result::Result<Self, regex::Error> {
        let keyword_res = def
            .keywords
            .iter()
            .map(|kw| whole_word(&regex::escape(kw)))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let any_keyword = if def.keywords.is_empty() {
            None
        } else {
            let alternation = def
                .keywords
                .iter()
                .map(|kw| regex::escape(kw))
                .collect::<Vec<_>>()
                .join("|");
            Some(whole_word(&format!("(?:{})", alternation))?)
        };

        let patterns = def
            .field_patterns
            .iter()
            .map(|p| RegexBuilder::new(p).case_insensitive(true).build())
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Self {
            id: def.id,
            name: def.name,
            keywords: def.keywords,
            sections: def.sections,
            confidence_boost: def.confidence_boost,
            pattern_sources: def.field_patterns,
            keyword_res,
            any_keyword,
            patterns,
        })
    }

    /// Back to the serializable form
    pub fn definition(&self) -> ProfileDefinition {
        ProfileDefinition {
            id: self.id.clone(),
            name: self.name.clone(),
            keywords: self.keywords.clone(),
            field_patterns: self.pattern_sources.clone(),
            sections: self.sections.clone(),
            confidence_boost: self.confidence_boost,
        }
    }

    pub fn is_generic(&self) -> bool {
        self.id == GENERIC_PROFILE_ID
    }

    /// Number of field-shape patterns
    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    /// Whole-word keyword occurrences in `text`; repeats count individually
    pub fn keyword_occurrences(&self, text: &str) -> usize {
        self.keyword_res.iter().map(|re| re.find_iter(text).count()).sum()
    }

    /// Number of distinct patterns matching anywhere in `text`
    pub fn pattern_matches(&self, text: &str) -> usize {
        self.patterns.iter().filter(|re| re.is_match(text)).count()
    }

    /// Whether `text` contains any keyword
    pub fn has_keyword(&self, text: &str) -> bool {
        self.any_keyword.as_ref().is_some_and(|re| re.is_match(text))
    }

    /// Whether `text` contains any keyword or matches any pattern
    pub fn matches(&self, text: &str) -> bool {
        self.has_keyword(text) || self.patterns.iter().any(|re| re.is_match(text))
    }
}

fn whole_word(pattern: &str) -> std::result::Result<Regex, regex::Error> {
    RegexBuilder::new(&format!(r"\b{}\b", pattern))
        .case_insensitive(true)
        .build()
}

/// Ordered set of profiles plus the generic fallback
#[derive(Debug, Clone)]
pub struct ProfileSet {
    profiles: Vec<Arc<FormTypeProfile>>,
    generic: Arc<FormTypeProfile>,
}

impl ProfileSet {
    /// Shared built-in profiles
    pub fn builtin() -> Arc<ProfileSet> {
        Arc::clone(&BUILTIN_PROFILES)
    }

    /// Compile definitions in order
    ///
    /// A definition with id `generic` replaces the built-in fallback.
    pub fn from_definitions(defs: Vec<ProfileDefinition>) -> std::result::Result<Self, regex::Error> {
        let mut profiles = Vec::with_capacity(defs.len());
        let mut generic = None;
        for def in defs {
            let profile = Arc::new(FormTypeProfile::compile(def)?);
            if profile.is_generic() {
                generic = Some(profile);
            } else {
                profiles.push(profile);
            }
        }

        let generic = match generic {
            Some(g) => g,
            None => Arc::new(FormTypeProfile::compile(generic_definition())?),
        };
        Ok(Self { profiles, generic })
    }

    /// Scored profiles in iteration order
    pub fn profiles(&self) -> &[Arc<FormTypeProfile>] {
        &self.profiles
    }

    /// Fallback profile
    pub fn generic(&self) -> &Arc<FormTypeProfile> {
        &self.generic
    }

    /// Definitions for every profile, fallback last
    pub fn definitions(&self) -> Vec<ProfileDefinition> {
        self.profiles
            .iter()
            .chain(std::iter::once(&self.generic))
            .map(|p| p.definition())
            .collect()
    }
}

/// Load a profile set from a JSON array of definitions
pub fn load_profiles(path: &Path) -> Result<ProfileSet> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read profiles {:?}", path))?;
    let defs: Vec<ProfileDefinition> = serde_json::from_str(&content)
        .with_context(|| format!("Invalid profiles {:?}", path))?;
    let set = ProfileSet::from_definitions(defs)
        .with_context(|| format!("Invalid field pattern in {:?}", path))?;
    Ok(set)
}

/// Save a profile set as JSON
pub fn save_profiles(set: &ProfileSet, path: &Path) -> Result<()> {
    let content = serde_json::to_string_pretty(&set.definitions())?;
    std::fs::write(path, content)?;
    Ok(())
}

fn def(
    id: &str,
    name: &str,
    keywords: &[&str],
    field_patterns: &[&str],
    sections: &[&str],
    confidence_boost: u32,
) -> ProfileDefinition {
    let owned = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();
    ProfileDefinition {
        id: id.to_string(),
        name: name.to_string(),
        keywords: owned(keywords),
        field_patterns: owned(field_patterns),
        sections: owned(sections),
        confidence_boost,
    }
}

/// The built-in profiles in classification order
pub fn builtin_definitions() -> Vec<ProfileDefinition> {
    vec![
        def(
            "hospital",
            "Hospital Form",
            &[
                "patient", "doctor", "medical", "hospital", "diagnosis", "treatment",
                "prescription", "blood", "ward", "bed", "discharge", "admission",
                "clinical", "symptoms", "disease", "medicine", "dosage", "allergies",
            ],
            &[
                r"patient\s*(?:name|id|number)",
                r"date\s*of\s*(?:admission|birth|discharge)",
                r"doctor\s*(?:name|signature)",
                r"diagnosis|treatment|prescription",
                r"blood\s*(?:group|type)",
                r"allergies|medications",
            ],
            &["Patient Information", "Medical History", "Diagnosis", "Treatment", "Discharge"],
            20,
        ),
        def(
            "hostel",
            "Hostel Form",
            &[
                "hostel", "room", "warden", "student", "accommodation", "diet",
                "vegetarian", "non-vegetarian", "check-in", "check-out", "stay",
                "semester", "branch", "admission", "hostel fee", "mess",
            ],
            &[
                r"hostel\s*(?:name|number|room)",
                r"room\s*(?:number|type|allocation)",
                r"warden|mess|diet",
                r"check\s*(?:in|out)|stay\s*period",
                r"vegetarian|non-vegetarian",
            ],
            &[
                "Student Information", "Room Allocation", "Hostel Details",
                "Mess Information", "Duration of Stay",
            ],
            18,
        ),
        def(
            "college",
            "College Form",
            &[
                "student", "college", "university", "course", "semester", "branch",
                "department", "enrollment", "registration", "admission", "roll number",
                "cgpa", "marks", "grade", "academic",
            ],
            &[
                r"(?:student|enrollment|roll)\s*(?:name|number|id)",
                r"course|branch|department|semester",
                r"academic\s*(?:year|session)",
                r"marks|grade|cgpa|result",
                r"admission\s*(?:date|number)",
            ],
            &[
                "Student Information", "Academic Details", "Course Information",
                "Performance", "Verification",
            ],
            18,
        ),
        def(
            "government",
            "Government Form",
            &[
                "government", "official", "department", "ministry", "authority",
                "license", "permit", "certificate", "registration", "application",
                "approval", "signature", "seal", "stamp", "authorized",
            ],
            &[
                r"(?:application|form)\s*(?:number|id)",
                r"date\s*of\s*(?:application|submission|approval)",
                r"authorized\s*(?:by|signature)|official\s*seal",
                r"department|ministry|authority",
                r"approval|rejection|status",
            ],
            &[
                "Applicant Information", "Application Details", "Supporting Documents",
                "Authorization", "Remarks",
            ],
            20,
        ),
        def(
            "medical",
            "Medical/Prescription Form",
            &[
                "prescription", "medicine", "dosage", "frequency", "duration", "patient",
                "doctor", "clinic", "pharmacy", "tablet", "capsule", "injection",
                "ointment", "syrup",
            ],
            &[
                r"medicine|drug|tablet|capsule|injection",
                r"dosage|frequency|duration",
                r"before|after|meals|food",
                r"side\s*effects|contraindications",
                r"doctor\s*(?:name|signature|stamp)",
            ],
            &[
                "Patient Information", "Medications", "Dosage Instructions",
                "Precautions", "Doctor Information",
            ],
            19,
        ),
        def(
            "application",
            "Application Form",
            &[
                "application", "applicant", "position", "job", "vacancy", "experience",
                "qualification", "date", "signature", "declaration", "terms", "conditions",
            ],
            &[
                r"applicant\s*(?:name|address|contact)",
                r"position|job|vacancy|designation",
                r"experience|qualification|education",
                r"date\s*of\s*(?:birth|application)",
                r"declaration|signature|date",
            ],
            &[
                "Personal Information", "Qualifications", "Experience", "Declaration",
                "Signature",
            ],
            17,
        ),
    ]
}

/// Field words common to every kind of form
const GENERIC_KEYWORDS: &[&str] = &[
    "Name", "Email", "Phone", "Mobile", "Address", "Date", "Signature", "Admission",
    "Branch", "Semester", "Course", "Room", "Diet", "Blood", "Sex", "Male", "Female",
    "Gender", "Age", "DOB", "Birth", "Father", "Mother", "Parent", "Guardian",
    "Emergency", "Contact", "Vegetarian", "Non-Vegetarian", "Faculty", "Warden",
    "Manager", "Office", "Reason", "Stay", "Required", "Application", "Hostel",
    "Student", "Year", "Photo", "Type", "ID", "Number", "From", "To", "Period",
    "Duration", "Registration", "Roll", "Enrollment", "Department", "Class", "Section",
    "Marks", "Grade", "Fee", "Payment", "Amount", "Remarks", "Approved", "Verified",
    "Checked", "Issued", "Designation", "Stamp", "Seal", "Authorized", "Certified",
    "Submitted", "Received", "Processed", "Status", "Notes", "Comments", "Additional",
    "Special", "Preference", "Choice", "Option", "Category", "Quota", "Merit", "Rank",
    "Score", "Percentage", "Division", "Result", "Pass", "Fail", "Absent", "Present",
    "Attendance", "Conduct", "Behavior", "Discipline", "Uniform", "Shoes", "Tie",
    "Badge", "Card", "Proof", "Document", "Certificate", "Diploma", "Degree",
    "License", "Permit", "Visa", "Passport", "PAN", "Aadhar", "Voter", "Driving",
    "Insurance", "Bank", "Account", "IFSC", "MICR", "Cheque", "Draft", "Transfer",
    "Deposit", "Withdrawal", "Balance", "Statement", "Ledger", "Voucher", "Receipt",
    "Invoice", "Bill", "Estimate", "Quotation", "Order", "Delivery", "Tracking",
    "Shipment", "Cargo", "Freight", "Customs", "Duty", "Tax", "GST", "VAT", "Discount",
    "Rebate", "Refund", "Claim", "Complaint", "Feedback", "Review", "Rating", "Comment",
    "Suggestion", "Recommendation", "Approval", "Rejection", "Pending", "Cancelled",
    "Completed", "Rejected", "On Hold", "In Progress", "Archived", "Deleted", "Restored",
    "Updated", "Modified", "Created", "Edited", "Reviewed", "Signed", "Sealed",
    "Stamped", "Notarized", "Witnessed", "Attested", "Endorsed", "Countersigned",
    "Initialed", "Dated", "Timed", "Logged", "Recorded", "Documented", "Filed",
    "Stored", "Backed Up", "Recovered", "Migrated", "Transferred", "Exported",
    "Imported", "Synchronized", "Replicated", "Distributed", "Shared", "Published",
    "Posted", "Uploaded", "Downloaded", "Streamed", "Cached", "Buffered", "Compressed",
    "Encrypted", "Decrypted", "Hashed", "Validated", "Authenticated", "Permitted",
    "Allowed", "Denied", "Blocked", "Restricted", "Limited", "Unlimited", "Conditional",
    "Provisional", "Temporary", "Permanent", "Fixed", "Variable",
];

/// The fallback profile: generic field words, no patterns or sections
pub fn generic_definition() -> ProfileDefinition {
    def(GENERIC_PROFILE_ID, "Generic Form", GENERIC_KEYWORDS, &[], &[], 15)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn profile<'a>(set: &'a ProfileSet, id: &str) -> &'a FormTypeProfile {
        set.profiles().iter().find(|p| p.id == id).unwrap()
    }

    #[test]
    fn test_builtin_profiles_in_order() {
        let set = ProfileSet::builtin();
        let ids: Vec<&str> = set.profiles().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["hospital", "hostel", "college", "government", "medical", "application"]
        );
        assert_eq!(set.generic().name, "Generic Form");
        assert!(set.generic().is_generic());
        assert_eq!(profile(&set, "medical").name, "Medical/Prescription Form");
        assert_eq!(profile(&set, "hospital").confidence_boost, 20);
    }

    #[test]
    fn test_builtin_is_shared() {
        let a = ProfileSet::builtin();
        let b = ProfileSet::builtin();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_keyword_occurrences_are_whole_word_and_repeated() {
        let set = ProfileSet::builtin();
        let hostel = profile(&set, "hostel");
        // "room" twice, "roommate" is not a whole-word match
        assert_eq!(hostel.keyword_occurrences("Room number, ROOM type, roommate"), 2);
        // Both "hostel" and "hostel fee" count
        assert_eq!(hostel.keyword_occurrences("hostel fee"), 2);
    }

    #[test]
    fn test_pattern_matches_are_distinct() {
        let set = ProfileSet::builtin();
        let hospital = profile(&set, "hospital");
        let text = "Patient Name: ... Patient ID: ... Blood Group:";
        // Patient pattern counted once despite two hits
        assert_eq!(hospital.pattern_matches(text), 2);
        assert_eq!(hospital.pattern_count(), 6);
    }

    #[test]
    fn test_generic_keywords() {
        let set = ProfileSet::builtin();
        let generic = set.generic();
        assert!(generic.has_keyword("Father's name"));
        assert!(generic.has_keyword("email address"));
        assert!(!generic.has_keyword("Zebra Crossing"));
        assert!(!generic.has_keyword("Renamed"));
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let mut defs = builtin_definitions();
        defs[0].field_patterns.push("(unclosed".into());
        assert!(ProfileSet::from_definitions(defs).is_err());
    }

    #[test]
    fn test_custom_generic_replaces_fallback() {
        let defs = vec![def(GENERIC_PROFILE_ID, "Any Form", &["field"], &[], &[], 5)];
        let set = ProfileSet::from_definitions(defs).unwrap();
        assert!(set.profiles().is_empty());
        assert_eq!(set.generic().name, "Any Form");
    }

    #[test]
    fn test_save_and_load_profiles() {
        let set = ProfileSet::builtin();
        let temp_file = NamedTempFile::new().unwrap();
        save_profiles(&set, temp_file.path()).unwrap();

        let loaded = load_profiles(temp_file.path()).unwrap();
        assert_eq!(loaded.definitions(), set.definitions());
        assert_eq!(loaded.profiles().len(), 6);
    }

    #[test]
    fn test_load_profiles_rejects_bad_json() {
        let temp_file = NamedTempFile::new().unwrap();
        std::fs::write(temp_file.path(), "{ not json").unwrap();
        assert!(load_profiles(temp_file.path()).is_err());
        assert!(load_profiles(Path::new("/nonexistent/profiles.json")).is_err());
    }
}
