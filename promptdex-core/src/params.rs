//! Parameter normalization: coerces raw caller-supplied values into the
//! declared parameter types before rendering.
//!
//! Normalization never fails as a whole. Every declared parameter gets a
//! value (possibly `Absent`), and the problems are reported alongside:
//! `missing` names required parameters with no usable value, `invalid` names
//! parameters whose value failed their declared regex.

use crate::frontmatter::{ParameterSpec, ParameterType};
use chrono::{DateTime, NaiveDate, SecondsFormat, TimeZone, Utc};
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

/// A normalized parameter value, shaped for direct use in a render scope.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Absent,
    Bool(bool),
    Number(f64),
    Text(String),
    Items(Vec<String>),
}

impl ParameterValue {
    fn is_blank(&self) -> bool {
        match self {
            ParameterValue::Absent => true,
            ParameterValue::Text(text) => text.trim().is_empty(),
            ParameterValue::Items(items) => items.is_empty(),
            ParameterValue::Bool(_) | ParameterValue::Number(_) => false,
        }
    }
}

/// A parameter whose value failed its declared constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidParameter {
    pub name: String,
    pub label: String,
    pub message: String,
}

/// The full outcome of normalizing one raw parameter map against the
/// declared specs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedParameters {
    pub values: BTreeMap<String, ParameterValue>,
    pub missing: Vec<String>,
    pub invalid: Vec<InvalidParameter>,
}

impl NormalizedParameters {
    pub fn is_ok(&self) -> bool {
        self.missing.is_empty() && self.invalid.is_empty()
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty() && s != "false" && s != "0",
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn coerce_number(value: &Value) -> ParameterValue {
    match value {
        Value::Number(n) => n
            .as_f64()
            .map(ParameterValue::Number)
            .unwrap_or(ParameterValue::Absent),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map(ParameterValue::Number)
            .unwrap_or(ParameterValue::Absent),
        Value::Bool(b) => ParameterValue::Number(if *b { 1.0 } else { 0.0 }),
        _ => ParameterValue::Absent,
    }
}

fn parse_date(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .and_then(|naive| Utc.from_local_datetime(&naive).single())
}

fn coerce_date(value: &Value) -> ParameterValue {
    let Value::String(text) = value else {
        return ParameterValue::Absent;
    };
    match parse_date(text.trim()) {
        Some(parsed) => {
            ParameterValue::Text(parsed.to_rfc3339_opts(SecondsFormat::Millis, true))
        }
        None => ParameterValue::Absent,
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn coerce_array(value: &Value, delimiter: &str) -> ParameterValue {
    match value {
        Value::Array(entries) => {
            ParameterValue::Items(entries.iter().map(stringify).collect())
        }
        Value::String(s) => ParameterValue::Items(
            s.split(delimiter)
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(str::to_string)
                .collect(),
        ),
        _ => ParameterValue::Items(Vec::new()),
    }
}

fn coerce(spec: &ParameterSpec, raw: Option<&Value>) -> ParameterValue {
    match spec.kind {
        ParameterType::Boolean => {
            ParameterValue::Bool(raw.map(truthy).unwrap_or(false))
        }
        ParameterType::Number => match raw {
            Some(Value::Null) | None => ParameterValue::Absent,
            Some(value) => coerce_number(value),
        },
        ParameterType::Date => match raw {
            Some(Value::Null) | None => ParameterValue::Absent,
            Some(value) => coerce_date(value),
        },
        ParameterType::Array => match raw {
            Some(Value::Null) | None => ParameterValue::Items(Vec::new()),
            Some(value) => coerce_array(value, spec.delimiter()),
        },
        ParameterType::String | ParameterType::Text | ParameterType::Enum => match raw {
            Some(Value::Null) | None => ParameterValue::Text(String::new()),
            Some(value) => ParameterValue::Text(stringify(value)),
        },
    }
}

fn check_regex(spec: &ParameterSpec, value: &ParameterValue) -> Option<String> {
    let pattern = spec.regex.as_deref()?;
    if !spec.kind.is_textual() || value.is_blank() {
        return None;
    }
    let ParameterValue::Text(text) = value else {
        return None;
    };
    match Regex::new(pattern) {
        Ok(regex) => {
            if regex.is_match(text) {
                None
            } else {
                Some(format!("value does not match pattern {pattern}"))
            }
        }
        Err(e) => {
            // A broken pattern is an authoring bug in the document, not a
            // reason to block the caller's value.
            warn!(parameter = %spec.name, error = %e, "skipping malformed parameter regex");
            None
        }
    }
}

/// Normalizes raw values against the declared specs.
///
/// Only declared parameters appear in the output; undeclared raw keys are
/// dropped. Declared defaults are not applied here — the caller decides
/// whether and when to prefill them.
pub fn normalize_parameters(
    specs: &[ParameterSpec],
    raw: &HashMap<String, Value>,
) -> NormalizedParameters {
    let mut result = NormalizedParameters::default();
    for spec in specs {
        let value = coerce(spec, raw.get(&spec.name));

        if spec.required && value.is_blank() {
            result.missing.push(spec.name.clone());
        }
        if let Some(message) = check_regex(spec, &value) {
            result.invalid.push(InvalidParameter {
                name: spec.name.clone(),
                label: spec.display_label().to_string(),
                message,
            });
        }
        result.values.insert(spec.name.clone(), value);
    }
    result
}
