use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;

use crate::error::Result;
use crate::metrics::{RULES_LOADED, RULE_RECORDS_REJECTED_TOTAL};
use crate::models::EscalationRule;
use crate::rules::normalize::{normalize_rule, RawRuleRecord};
use crate::rules::source::RuleSource;

/// A record that did not make it into the repository
#[derive(Debug, Clone, Serialize)]
pub struct SkippedRecord {
    /// Position of the record in the source
    pub index: usize,
    pub reason: String,
}

/// Outcome of a (re)load
#[derive(Debug, Clone, Serialize)]
pub struct LoadReport {
    pub source: String,
    pub loaded: usize,
    pub skipped: Vec<SkippedRecord>,
}

/// Normalize a batch of records, keeping only usable rules.
pub fn normalize_records(records: &[RawRuleRecord]) -> (Vec<EscalationRule>, Vec<SkippedRecord>) {
    let mut rules = Vec::with_capacity(records.len());
    let mut skipped = Vec::new();

    for (index, record) in records.iter().enumerate() {
        match normalize_rule(record) {
            Ok(rule) if !rule.is_usable() => {
                skipped.push(SkippedRecord {
                    index,
                    reason: "no level has a positive resolution time".to_string(),
                });
            }
            Ok(rule) => {
                let inconsistent = rule.inconsistent_levels();
                if !inconsistent.is_empty() {
                    tracing::warn!(
                        rule_id = %rule.id,
                        category = %rule.category,
                        levels = ?inconsistent,
                        "Rule has resolution targets shorter than response targets"
                    );
                }
                rules.push(rule);
            }
            Err(e) => {
                skipped.push(SkippedRecord {
                    index,
                    reason: e.to_string(),
                });
            }
        }
    }

    (rules, skipped)
}

/// Immutable snapshot store of escalation rules.
///
/// Readers take an `Arc` of the current snapshot and never observe a partial
/// reload; `replace` swaps the whole table at once. Iteration order is the
/// order of the source, which is what the matcher's first-wins tie-break uses.
#[derive(Debug, Default)]
pub struct RuleRepository {
    rules: RwLock<Arc<Vec<EscalationRule>>>,
}

impl RuleRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rules(rules: Vec<EscalationRule>) -> Self {
        let repository = Self::new();
        repository.replace(rules);
        repository
    }

    /// Load from a source into a fresh repository
    pub async fn load(source: &dyn RuleSource) -> Result<(Self, LoadReport)> {
        let repository = Self::new();
        let report = repository.reload(source).await?;
        Ok((repository, report))
    }

    /// Replace the current snapshot with the contents of `source`.
    ///
    /// Records that fail normalization are skipped and reported; the
    /// snapshot is only replaced when the source itself could be read.
    pub async fn reload(&self, source: &dyn RuleSource) -> Result<LoadReport> {
        let records = source.fetch_records().await?;
        let (rules, skipped) = normalize_records(&records);

        for skip in &skipped {
            tracing::warn!(
                source = %source.name(),
                index = skip.index,
                reason = %skip.reason,
                "Skipped escalation rule record"
            );
        }
        RULE_RECORDS_REJECTED_TOTAL.inc_by(skipped.len() as u64);

        let report = LoadReport {
            source: source.name(),
            loaded: rules.len(),
            skipped,
        };

        self.replace(rules);

        tracing::info!(
            source = %report.source,
            loaded = report.loaded,
            skipped = report.skipped.len(),
            "Escalation rules loaded"
        );

        Ok(report)
    }

    pub fn replace(&self, rules: Vec<EscalationRule>) {
        RULES_LOADED.set(rules.len() as i64);
        *self.rules.write() = Arc::new(rules);
    }

    /// Current snapshot
    pub fn snapshot(&self) -> Arc<Vec<EscalationRule>> {
        self.rules.read().clone()
    }

    pub fn active_rules(&self) -> Vec<EscalationRule> {
        self.snapshot()
            .iter()
            .filter(|rule| rule.is_active())
            .cloned()
            .collect()
    }

    /// Active rules filtered by category, sub-category and issue; `None`
    /// matches anything.
    pub fn find_by_category(
        &self,
        category: Option<&str>,
        sub_category: Option<&str>,
        issue: Option<&str>,
    ) -> Vec<EscalationRule> {
        let field_matches = |expected: Option<&str>, actual: &str| {
            expected.map_or(true, |e| e.trim() == actual.trim())
        };

        self.snapshot()
            .iter()
            .filter(|rule| {
                rule.is_active()
                    && field_matches(category, &rule.category)
                    && field_matches(sub_category, &rule.sub_category)
                    && field_matches(issue, &rule.issue)
            })
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rules.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
