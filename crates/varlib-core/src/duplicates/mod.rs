//! Duplicate detection and resolution.
//!
//! The pipeline is analyze -> decide -> disambiguate -> plan -> execute.
//! Only the last step touches the filesystem.

mod analyzer;
mod planner;
mod resolver;

pub use analyzer::{analyze, analyze_library, is_duplicate_set, DuplicateGroup, GroupKey};
pub use planner::{
    default_decisions, disambiguate, forced_decisions, plan, CancelDisambiguation, Decisions,
    Disambiguator, MostRecentlyModified, ResolutionDecision, ResolutionPlan,
};
pub use resolver::{DuplicateResolver, ResolutionOutcome};
