//! # Front Matter
//!
//! This module handles the structured metadata block at the top of a prompt
//! document: splitting it from the template body, and validating the parsed
//! YAML against the fixed prompt schema.
//!
//! The main components are:
//! - [`split_document`] - Separates the leading `---` fenced YAML block from the body
//! - [`validate_front_matter`] - Checks a parsed YAML value against the schema,
//!   reporting every violation in a single pass
//! - [`FrontMatter`] and [`ParameterSpec`] - The typed metadata model

use nom::IResult;
use nom::Parser;
use nom::branch::alt;
use nom::bytes::complete::{tag, take_until};
use nom::character::complete::line_ending;
use nom::combinator::{eof, map};
use nom::sequence::{preceded, terminated};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;

/// The only schema version this engine understands.
pub const SCHEMA_VERSION: u64 = 1;

const PARAMETER_TYPES: [&str; 7] = [
    "string", "text", "enum", "number", "boolean", "date", "array",
];
const CLIPBOARD_TYPES: [&str; 3] = ["text", "url", "file"];
const MODEL_PROVIDERS: [&str; 1] = ["openai"];

/// A single problem found while validating a metadata block.
///
/// Issues are data, not errors: a document with issues is still indexed and
/// listed, it just cannot be rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub message: String,
    /// Path into the metadata structure, e.g. `/parameters/0/type`.
    pub path: Option<String>,
}

impl ValidationIssue {
    pub fn new(message: impl Into<String>, path: Option<String>) -> Self {
        ValidationIssue {
            message: message.into(),
            path,
        }
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{} (at {})", self.message, path),
            None => write!(f, "{}", self.message),
        }
    }
}

/// The declared type of a template parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    String,
    Text,
    Enum,
    Number,
    Boolean,
    Date,
    Array,
}

impl ParameterType {
    pub fn is_textual(self) -> bool {
        matches!(self, ParameterType::String | ParameterType::Text)
    }
}

/// A declared, typed, named input a template expects at render time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ParameterType,
    pub label: Option<String>,
    #[serde(default)]
    pub required: bool,
    pub default: Option<Value>,
    pub options: Option<Vec<String>>,
    pub regex: Option<String>,
    #[serde(default)]
    pub multiline: bool,
    pub delimiter: Option<String>,
}

impl ParameterSpec {
    /// The UI-facing field identifier. Derived from `name` and guaranteed not
    /// to collide with it.
    pub fn field_id(&self) -> String {
        format!("param-{}", self.name)
    }

    pub fn delimiter(&self) -> &str {
        self.delimiter.as_deref().unwrap_or(";")
    }

    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub provider: String,
    pub name: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u64>,
}

/// The declared metadata block of a prompt document, present on a record only
/// after it passed schema validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrontMatter {
    pub schema_version: u64,
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub files_to_paste: Vec<String>,
    #[serde(default)]
    pub parameters: Vec<ParameterSpec>,
    pub model: Option<ModelConfig>,
    #[serde(default)]
    pub comments: Vec<String>,
    #[serde(default)]
    pub preferred_clipboard_types: Vec<String>,
    #[serde(default)]
    pub requires_file: bool,
}

fn front_matter_block(input: &str) -> IResult<&str, &str> {
    preceded(
        terminated(tag("---"), line_ending),
        alt((
            terminated(
                take_until("\n---"),
                (tag("\n---"), alt((line_ending, eof))),
            ),
            // Opening fence immediately followed by the closing fence.
            map(terminated(tag("---"), alt((line_ending, eof))), |_| ""),
        )),
    )
    .parse(input)
}

/// Splits a document into its optional front matter block and its body.
///
/// The block is the raw text between the leading `---` fence and the next
/// `---` fence; the body is everything after. A document without a leading
/// fence is all body.
pub fn split_document(input: &str) -> (Option<&str>, &str) {
    match front_matter_block(input) {
        Ok((body, block)) => (Some(block), body),
        Err(_) => (None, input),
    }
}

fn push_issue(issues: &mut Vec<ValidationIssue>, message: impl Into<String>, path: String) {
    issues.push(ValidationIssue::new(message, Some(path)));
}

fn str_of(value: &Value) -> Option<&str> {
    value.as_str()
}

fn check_optional_string(
    map: &serde_yaml::Mapping,
    field: &str,
    issues: &mut Vec<ValidationIssue>,
) {
    if let Some(value) = map.get(field) {
        if str_of(value).is_none() {
            push_issue(issues, format!("{field} must be a string"), format!("/{field}"));
        }
    }
}

fn check_optional_bool(map: &serde_yaml::Mapping, field: &str, issues: &mut Vec<ValidationIssue>) {
    if let Some(value) = map.get(field) {
        if !value.is_bool() {
            push_issue(issues, format!("{field} must be a boolean"), format!("/{field}"));
        }
    }
}

fn check_string_array(
    map: &serde_yaml::Mapping,
    field: &str,
    allowed: Option<&[&str]>,
    issues: &mut Vec<ValidationIssue>,
) {
    let Some(value) = map.get(field) else {
        return;
    };
    let Some(entries) = value.as_sequence() else {
        push_issue(issues, format!("{field} must be an array of strings"), format!("/{field}"));
        return;
    };
    for (i, entry) in entries.iter().enumerate() {
        match str_of(entry) {
            None => push_issue(issues, "must be a string", format!("/{field}/{i}")),
            Some(text) => {
                if let Some(allowed) = allowed {
                    if !allowed.contains(&text) {
                        push_issue(
                            issues,
                            format!("must be one of: {}", allowed.join(", ")),
                            format!("/{field}/{i}"),
                        );
                    }
                }
            }
        }
    }
}

fn check_parameter(entry: &Value, base: &str, issues: &mut Vec<ValidationIssue>) {
    let Some(map) = entry.as_mapping() else {
        push_issue(issues, "parameter must be a mapping", base.to_string());
        return;
    };

    match map.get("name").and_then(str_of) {
        Some(name) if !name.trim().is_empty() => {}
        Some(_) => push_issue(issues, "name must not be empty", format!("{base}/name")),
        None => push_issue(issues, "name is required and must be a string", format!("{base}/name")),
    }

    match map.get("type").and_then(str_of) {
        Some(kind) if PARAMETER_TYPES.contains(&kind) => {
            if kind == "enum" {
                if let Some(options) = map.get("options") {
                    if options.as_sequence().is_some_and(|seq| seq.is_empty()) {
                        push_issue(
                            issues,
                            "enum parameter options must not be empty",
                            format!("{base}/options"),
                        );
                    }
                }
            }
        }
        Some(kind) => push_issue(
            issues,
            format!("type '{kind}' must be one of: {}", PARAMETER_TYPES.join(", ")),
            format!("{base}/type"),
        ),
        None => push_issue(issues, "type is required and must be a string", format!("{base}/type")),
    }

    for field in ["label", "regex", "delimiter"] {
        if let Some(value) = map.get(field) {
            if str_of(value).is_none() {
                push_issue(issues, format!("{field} must be a string"), format!("{base}/{field}"));
            }
        }
    }
    for field in ["required", "multiline"] {
        if let Some(value) = map.get(field) {
            if !value.is_bool() {
                push_issue(issues, format!("{field} must be a boolean"), format!("{base}/{field}"));
            }
        }
    }
    if let Some(options) = map.get("options") {
        match options.as_sequence() {
            None => push_issue(issues, "options must be an array of strings", format!("{base}/options")),
            Some(entries) => {
                for (i, option) in entries.iter().enumerate() {
                    if str_of(option).is_none() {
                        push_issue(issues, "must be a string", format!("{base}/options/{i}"));
                    }
                }
            }
        }
    }
}

fn check_model(value: &Value, issues: &mut Vec<ValidationIssue>) {
    let Some(map) = value.as_mapping() else {
        push_issue(issues, "model must be a mapping", "/model".to_string());
        return;
    };
    match map.get("provider").and_then(str_of) {
        Some(provider) if MODEL_PROVIDERS.contains(&provider) => {}
        Some(provider) => push_issue(
            issues,
            format!("provider '{provider}' must be one of: {}", MODEL_PROVIDERS.join(", ")),
            "/model/provider".to_string(),
        ),
        None => push_issue(
            issues,
            "provider is required and must be a string",
            "/model/provider".to_string(),
        ),
    }
    if let Some(name) = map.get("name") {
        if str_of(name).is_none() {
            push_issue(issues, "name must be a string", "/model/name".to_string());
        }
    }
    if let Some(temperature) = map.get("temperature") {
        if !temperature.is_number() {
            push_issue(issues, "temperature must be a number", "/model/temperature".to_string());
        }
    }
    if let Some(max_tokens) = map.get("max_tokens") {
        if max_tokens.as_u64().is_none() {
            push_issue(
                issues,
                "max_tokens must be a non-negative integer",
                "/model/max_tokens".to_string(),
            );
        }
    }
}

/// Validates a parsed metadata value against the prompt schema.
///
/// Reports every violation found in one pass so a caller can surface all of
/// them at once. On success the typed [`FrontMatter`] is returned.
pub fn validate_front_matter(value: &Value) -> Result<FrontMatter, Vec<ValidationIssue>> {
    let mut issues = Vec::new();

    let Some(map) = value.as_mapping() else {
        return Err(vec![ValidationIssue::new(
            "front matter must be a mapping",
            None,
        )]);
    };

    match map.get("schema_version") {
        None => push_issue(&mut issues, "schema_version is required", "/schema_version".to_string()),
        Some(version) => match version.as_u64() {
            Some(v) if v == SCHEMA_VERSION => {}
            Some(v) => push_issue(
                &mut issues,
                format!("schema_version {v} is not supported, expected {SCHEMA_VERSION}"),
                "/schema_version".to_string(),
            ),
            None => push_issue(&mut issues, "schema_version must be a number", "/schema_version".to_string()),
        },
    }

    match map.get("title").and_then(str_of) {
        Some(title) if !title.trim().is_empty() => {}
        Some(_) => push_issue(&mut issues, "title must not be empty", "/title".to_string()),
        None => push_issue(&mut issues, "title is required and must be a string", "/title".to_string()),
    }

    check_optional_string(map, "description", &mut issues);
    check_string_array(map, "tags", None, &mut issues);
    check_string_array(map, "files_to_paste", None, &mut issues);
    check_string_array(map, "comments", None, &mut issues);
    check_string_array(
        map,
        "preferred_clipboard_types",
        Some(&CLIPBOARD_TYPES),
        &mut issues,
    );
    check_optional_bool(map, "requires_file", &mut issues);

    if let Some(parameters) = map.get("parameters") {
        match parameters.as_sequence() {
            None => push_issue(&mut issues, "parameters must be an array", "/parameters".to_string()),
            Some(entries) => {
                let mut seen = std::collections::HashSet::new();
                for (i, entry) in entries.iter().enumerate() {
                    check_parameter(entry, &format!("/parameters/{i}"), &mut issues);
                    if let Some(name) = entry.as_mapping().and_then(|m| m.get("name")).and_then(str_of) {
                        if !seen.insert(name.to_string()) {
                            push_issue(
                                &mut issues,
                                format!("duplicate parameter name '{name}'"),
                                format!("/parameters/{i}/name"),
                            );
                        }
                    }
                }
            }
        }
    }

    if let Some(model) = map.get("model") {
        check_model(model, &mut issues);
    }

    if !issues.is_empty() {
        return Err(issues);
    }

    serde_yaml::from_value(value.clone()).map_err(|e| {
        vec![ValidationIssue::new(
            format!("front matter does not match schema: {e}"),
            None,
        )]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> Value {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_split_document_with_front_matter() {
        let (block, body) = split_document("---\ntitle: Hello\n---\nBody text");
        assert_eq!(block, Some("title: Hello"));
        assert_eq!(body, "Body text");
    }

    #[test]
    fn test_split_document_without_front_matter() {
        let (block, body) = split_document("Just some body text");
        assert_eq!(block, None);
        assert_eq!(body, "Just some body text");
    }

    #[test]
    fn test_split_document_empty_block() {
        let (block, body) = split_document("---\n---\nBody");
        assert_eq!(block, Some(""));
        assert_eq!(body, "Body");
    }

    #[test]
    fn test_split_document_fence_at_eof() {
        let (block, body) = split_document("---\ntitle: X\n---");
        assert_eq!(block, Some("title: X"));
        assert_eq!(body, "");
    }

    #[test]
    fn test_split_document_multiline_block() {
        let input = "---\ntitle: X\ntags:\n  - a\n---\nHello {{topic}}\n";
        let (block, body) = split_document(input);
        assert_eq!(block, Some("title: X\ntags:\n  - a"));
        assert_eq!(body, "Hello {{topic}}\n");
    }

    #[test]
    fn test_split_document_dashes_in_body_only() {
        let (block, body) = split_document("No fence here\n---\nstill body");
        assert_eq!(block, None);
        assert_eq!(body, "No fence here\n---\nstill body");
    }

    #[test]
    fn test_validate_minimal_valid() {
        let value = parse("schema_version: 1\ntitle: Greeting");
        let fm = validate_front_matter(&value).unwrap();
        assert_eq!(fm.schema_version, 1);
        assert_eq!(fm.title, "Greeting");
        assert!(fm.tags.is_empty());
        assert!(fm.parameters.is_empty());
        assert!(!fm.requires_file);
    }

    #[test]
    fn test_validate_full_document() {
        let value = parse(
            r#"
schema_version: 1
title: Code Review
description: Review a diff
tags: [review, code]
files_to_paste: [diff.patch]
parameters:
  - name: language
    type: enum
    options: [rust, python]
    required: true
  - name: diff
    type: text
    label: Diff
    multiline: true
  - name: reviewers
    type: array
    delimiter: ","
model:
  provider: openai
  name: gpt-4o
  temperature: 0.2
  max_tokens: 2048
comments: ["internal"]
preferred_clipboard_types: [text, url]
requires_file: true
"#,
        );
        let fm = validate_front_matter(&value).unwrap();
        assert_eq!(fm.parameters.len(), 3);
        assert_eq!(fm.parameters[0].kind, ParameterType::Enum);
        assert_eq!(fm.parameters[2].delimiter(), ",");
        assert_eq!(fm.model.as_ref().unwrap().provider, "openai");
        assert!(fm.requires_file);
        assert_eq!(fm.preferred_clipboard_types, vec!["text", "url"]);
    }

    #[test]
    fn test_validate_reports_all_issues_at_once() {
        let value = parse(
            r#"
schema_version: 2
description: 42
tags: "not-an-array"
parameters:
  - type: mystery
"#,
        );
        let issues = validate_front_matter(&value).unwrap_err();
        let paths: Vec<&str> = issues.iter().filter_map(|i| i.path.as_deref()).collect();
        assert!(paths.contains(&"/schema_version"));
        assert!(paths.contains(&"/title"));
        assert!(paths.contains(&"/description"));
        assert!(paths.contains(&"/tags"));
        assert!(paths.contains(&"/parameters/0/name"));
        assert!(paths.contains(&"/parameters/0/type"));
        assert!(issues.len() >= 6);
    }

    #[test]
    fn test_validate_missing_title() {
        let value = parse("schema_version: 1");
        let issues = validate_front_matter(&value).unwrap_err();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].path.as_deref(), Some("/title"));
    }

    #[test]
    fn test_validate_wrong_schema_version() {
        let value = parse("schema_version: 3\ntitle: X");
        let issues = validate_front_matter(&value).unwrap_err();
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("not supported"));
    }

    #[test]
    fn test_validate_duplicate_parameter_names() {
        let value = parse(
            r#"
schema_version: 1
title: X
parameters:
  - name: topic
    type: string
  - name: topic
    type: text
"#,
        );
        let issues = validate_front_matter(&value).unwrap_err();
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("duplicate parameter name"));
        assert_eq!(issues[0].path.as_deref(), Some("/parameters/1/name"));
    }

    #[test]
    fn test_validate_empty_enum_options() {
        let value = parse(
            r#"
schema_version: 1
title: X
parameters:
  - name: choice
    type: enum
    options: []
"#,
        );
        let issues = validate_front_matter(&value).unwrap_err();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].path.as_deref(), Some("/parameters/0/options"));
    }

    #[test]
    fn test_validate_enum_without_options_is_allowed() {
        let value = parse(
            r#"
schema_version: 1
title: X
parameters:
  - name: choice
    type: enum
"#,
        );
        assert!(validate_front_matter(&value).is_ok());
    }

    #[test]
    fn test_validate_bad_model_provider() {
        let value = parse("schema_version: 1\ntitle: X\nmodel:\n  provider: acme");
        let issues = validate_front_matter(&value).unwrap_err();
        assert_eq!(issues[0].path.as_deref(), Some("/model/provider"));
    }

    #[test]
    fn test_validate_bad_clipboard_type() {
        let value = parse("schema_version: 1\ntitle: X\npreferred_clipboard_types: [image]");
        let issues = validate_front_matter(&value).unwrap_err();
        assert_eq!(issues[0].path.as_deref(), Some("/preferred_clipboard_types/0"));
    }

    #[test]
    fn test_validate_non_mapping() {
        let value = parse("- just\n- a\n- list");
        let issues = validate_front_matter(&value).unwrap_err();
        assert_eq!(issues.len(), 1);
        assert!(issues[0].path.is_none());
    }

    #[test]
    fn test_field_id_does_not_collide_with_name() {
        let value = parse(
            r#"
schema_version: 1
title: X
parameters:
  - name: topic
    type: string
"#,
        );
        let fm = validate_front_matter(&value).unwrap();
        let spec = &fm.parameters[0];
        assert_eq!(spec.field_id(), "param-topic");
        assert_ne!(spec.field_id(), spec.name);
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let value = parse("schema_version: 1\ntitle: X\ncustom_field: whatever");
        assert!(validate_front_matter(&value).is_ok());
    }
}
