//! Translation of heterogeneous rule records into [`EscalationRule`].
//!
//! Rule tables arrive from spreadsheets exported by hand, admin APIs and our
//! own `/v1/rules` output, each with its own field spelling. Every record is
//! normalized exactly once, here, at load time. Keys are compared in a
//! canonical form (lower-case, with spaces, underscores and hyphens removed),
//! so `Sub Category`, `sub_category` and `subCategory` are the same field.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{EscalationLevel, EscalationRule, LevelTarget, Priority, RuleStatus};

const TICKET_TYPE: &[&str] = &["tickettype", "type"];
const ISSUE_TYPE: &[&str] = &["issuetype"];
const CATEGORY: &[&str] = &["category"];
const SUB_CATEGORY: &[&str] = &["subcategory"];
const ISSUE: &[&str] = &["issue", "issuedescription", "description"];
const PRIORITY: &[&str] = &["priority"];
const STATUS: &[&str] = &["status", "rulestatus"];
const CLIENT_ESCALATION: &[&str] = &["clientescalation", "escalatetoclient"];
const TENANT_ESCALATION: &[&str] = &["tenantescalation", "escalatetotenant"];
const LEVELS: &[&str] = &["levels"];

const TRUTHY: &[&str] = &["true", "yes", "y", "1"];
const FALSY: &[&str] = &["false", "no", "n", "0"];

const RESPONSE_SUFFIXES: &[&str] = &["responsetime", "responsetimeminutes", "response"];
const RESOLUTION_SUFFIXES: &[&str] = &["resolutiontime", "resolutiontimeminutes", "resolution"];
const ASSIGNEE_SUFFIXES: &[&str] = &["assignee", "escalation", "escalationto", "assignedto"];

/// A rule record exactly as the external source delivered it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRuleRecord(pub Map<String, Value>);

impl RawRuleRecord {
    fn canonical_fields(&self) -> HashMap<String, &Value> {
        self.0
            .iter()
            .map(|(key, value)| (canonical_key(key), value))
            .collect()
    }
}

impl From<Map<String, Value>> for RawRuleRecord {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl From<&EscalationRule> for RawRuleRecord {
    fn from(rule: &EscalationRule) -> Self {
        match serde_json::to_value(rule) {
            Ok(Value::Object(map)) => Self(map),
            _ => Self::default(),
        }
    }
}

fn canonical_key(key: &str) -> String {
    key.chars()
        .filter(|c| !matches!(c, ' ' | '_' | '-' | '.'))
        .flat_map(char::to_lowercase)
        .collect()
}

fn lookup<'a>(fields: &HashMap<String, &'a Value>, aliases: &[&str]) -> Option<&'a Value> {
    aliases.iter().find_map(|alias| fields.get(*alias).copied())
}

fn text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

fn minutes(value: Option<&Value>, field: &str) -> Result<u32> {
    let parsed = match value {
        None | Some(Value::Null) => return Ok(0),
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) if s.trim().is_empty() => return Ok(0),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
    };

    match parsed {
        Some(m) if m.is_finite() && m >= 0.0 && m <= u32::MAX as f64 => Ok(m.round() as u32),
        _ => Err(AppError::Validation(format!(
            "{} must be a non-negative number of minutes",
            field
        ))),
    }
}

fn flag(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
        Some(Value::String(s)) => TRUTHY.contains(&s.trim().to_ascii_lowercase().as_str()),
        _ => false,
    }
}

/// Priorities are sometimes exported with a label ("P1 - Critical"); only
/// the leading token is significant.
fn priority(value: Option<&Value>) -> Result<Priority> {
    let raw = text(value);
    if raw.is_empty() {
        return Err(AppError::Validation("priority is required".to_string()));
    }

    match Priority::from(raw.as_str()) {
        Priority::Other(_) => {
            let token: String = raw.chars().take_while(|c| c.is_ascii_alphanumeric()).collect();
            match Priority::from(token.as_str()) {
                Priority::Other(_) => Ok(Priority::Other(raw)),
                known => Ok(known),
            }
        }
        known => Ok(known),
    }
}

fn status(value: Option<&Value>) -> Result<RuleStatus> {
    match value {
        None | Some(Value::Null) => Ok(RuleStatus::Active),
        Some(Value::Bool(true)) => Ok(RuleStatus::Active),
        Some(Value::Bool(false)) => Ok(RuleStatus::Inactive),
        Some(other) => {
            let raw = text(Some(other));
            if raw.is_empty() {
                return Ok(RuleStatus::Active);
            }

            let lowered = raw.to_ascii_lowercase();
            if TRUTHY.contains(&lowered.as_str()) {
                return Ok(RuleStatus::Active);
            }
            if FALSY.contains(&lowered.as_str()) {
                return Ok(RuleStatus::Inactive);
            }

            raw.parse::<RuleStatus>()
                .map_err(|_| AppError::Validation(format!("unknown rule status '{}'", raw)))
        }
    }
}

fn level_target(
    fields: &HashMap<String, &Value>,
    prefix: &str,
    level: EscalationLevel,
) -> Result<LevelTarget> {
    let keys = |suffixes: &[&str]| -> Vec<String> {
        suffixes.iter().map(|s| format!("{}{}", prefix, s)).collect()
    };
    let find = |suffixes: &[&str]| {
        let names = keys(suffixes);
        names.iter().find_map(|name| fields.get(name).copied())
    };

    Ok(LevelTarget {
        response_time_minutes: minutes(find(RESPONSE_SUFFIXES), &format!("{} response time", level))?,
        resolution_time_minutes: minutes(
            find(RESOLUTION_SUFFIXES),
            &format!("{} resolution time", level),
        )?,
        assignee: text(find(ASSIGNEE_SUFFIXES)),
    })
}

fn nested_levels(entries: &[Value]) -> Result<[LevelTarget; EscalationLevel::COUNT]> {
    let mut levels: [LevelTarget; EscalationLevel::COUNT] = Default::default();

    for (level, entry) in EscalationLevel::all().zip(entries.iter()) {
        let Value::Object(map) = entry else {
            return Err(AppError::Validation(format!(
                "{} level entry must be an object",
                level
            )));
        };
        let fields: HashMap<String, &Value> =
            map.iter().map(|(k, v)| (canonical_key(k), v)).collect();
        levels[level.index()] = level_target(&fields, "", level)?;
    }

    Ok(levels)
}

/// Normalize one external record into the canonical rule shape.
pub fn normalize_rule(record: &RawRuleRecord) -> Result<EscalationRule> {
    let fields = record.canonical_fields();

    let category = text(lookup(&fields, CATEGORY));
    if category.is_empty() {
        return Err(AppError::Validation("category is required".to_string()));
    }

    let levels = match lookup(&fields, LEVELS) {
        Some(Value::Array(entries)) => nested_levels(entries)?,
        _ => {
            let mut levels: [LevelTarget; EscalationLevel::COUNT] = Default::default();
            for level in EscalationLevel::all() {
                let prefix = format!("l{}", level.index());
                levels[level.index()] = level_target(&fields, &prefix, level)?;
            }
            levels
        }
    };

    let id = fields
        .get("id")
        .and_then(|v| v.as_str())
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::new_v4);

    Ok(EscalationRule {
        id,
        ticket_type: text(lookup(&fields, TICKET_TYPE)),
        issue_type: text(lookup(&fields, ISSUE_TYPE)),
        category,
        sub_category: text(lookup(&fields, SUB_CATEGORY)),
        issue: text(lookup(&fields, ISSUE)),
        priority: priority(lookup(&fields, PRIORITY))?,
        levels,
        status: status(lookup(&fields, STATUS))?,
        client_escalation: flag(lookup(&fields, CLIENT_ESCALATION)),
        tenant_escalation: flag(lookup(&fields, TENANT_ESCALATION)),
    })
}
