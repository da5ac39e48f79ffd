//! Escalation rule repository, sources and matching

pub mod matcher;
pub mod normalize;
pub mod repository;
pub mod source;

pub use matcher::{MatchTier, RuleMatch, RuleMatcher};
pub use normalize::{normalize_rule, RawRuleRecord};
pub use repository::{normalize_records, LoadReport, RuleRepository, SkippedRecord};
pub use source::{decode_rule_document, FileRuleSource, RuleFormat, RuleSource, StaticRuleSource};
