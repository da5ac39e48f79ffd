use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};
use crate::models::EscalationRule;
use crate::rules::normalize::RawRuleRecord;

/// Where escalation rules come from
#[async_trait]
pub trait RuleSource: Send + Sync {
    /// Human-readable name used in logs and errors
    fn name(&self) -> String;

    /// Fetch every rule record, unnormalized
    async fn fetch_records(&self) -> Result<Vec<RawRuleRecord>>;
}

/// Encodings accepted for rule files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleFormat {
    Json,
    Yaml,
    Toml,
}

impl RuleFormat {
    /// Pick the format from the file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "json" => Some(RuleFormat::Json),
            "yaml" | "yml" => Some(RuleFormat::Yaml),
            "toml" => Some(RuleFormat::Toml),
            _ => None,
        }
    }
}

/// A rule file is either a bare list of records or `{ rules: [...] }`
#[derive(Deserialize)]
#[serde(untagged)]
enum RuleDocument {
    List(Vec<RawRuleRecord>),
    Wrapped { rules: Vec<RawRuleRecord> },
}

impl RuleDocument {
    fn into_records(self) -> Vec<RawRuleRecord> {
        match self {
            RuleDocument::List(records) => records,
            RuleDocument::Wrapped { rules } => rules,
        }
    }
}

/// Decode a rule document without normalizing it
pub fn decode_rule_document(content: &str, format: RuleFormat) -> Result<Vec<RawRuleRecord>> {
    let document: RuleDocument = match format {
        RuleFormat::Json => serde_json::from_str(content)?,
        RuleFormat::Yaml => serde_yaml::from_str(content)?,
        RuleFormat::Toml => toml::from_str(content)?,
    };

    Ok(document.into_records())
}

/// Rules read from a JSON, YAML or TOML file
#[derive(Debug, Clone)]
pub struct FileRuleSource {
    path: PathBuf,
}

impl FileRuleSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl RuleSource for FileRuleSource {
    fn name(&self) -> String {
        self.path.display().to_string()
    }

    async fn fetch_records(&self) -> Result<Vec<RawRuleRecord>> {
        let format = RuleFormat::from_path(&self.path).ok_or_else(|| {
            AppError::rule_source(self.name(), "unsupported file extension (use .json, .yaml, .yml or .toml)")
        })?;

        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| AppError::rule_source(self.name(), e))?;

        decode_rule_document(&content, format)
            .map_err(|e| AppError::rule_source(self.name(), e))
    }
}

/// Rules held in memory, e.g. seeded by tests or an admin import
#[derive(Debug, Clone, Default)]
pub struct StaticRuleSource {
    records: Vec<RawRuleRecord>,
}

impl StaticRuleSource {
    pub fn new(records: Vec<RawRuleRecord>) -> Self {
        Self { records }
    }

    pub fn from_rules(rules: &[EscalationRule]) -> Self {
        Self {
            records: rules.iter().map(RawRuleRecord::from).collect(),
        }
    }
}

#[async_trait]
impl RuleSource for StaticRuleSource {
    fn name(&self) -> String {
        "static".to_string()
    }

    async fn fetch_records(&self) -> Result<Vec<RawRuleRecord>> {
        Ok(self.records.clone())
    }
}
