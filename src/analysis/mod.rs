//! Analysis Layer
//!
//! Turns recognized text into scored form labels: normalization, form-type
//! classification, candidate extraction, validation, and section layout.

pub mod classifier;
pub mod events;
pub mod labels;
pub mod layout;
pub mod normalize;
pub mod validation;

pub use classifier::{detect_form_type, FormTypeSummary};
pub use events::{EventEmitter, PipelineEvent, Stage, StageStatus};
pub use labels::{LabelCandidate, LabelExtractor, LabelSet};
pub use layout::{analyze_layout, SectionLayout};
pub use validation::validate_labels;
