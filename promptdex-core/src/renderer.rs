//! # Template Rendering
//!
//! Renders a prompt document body against normalized parameters and ambient
//! context. The template language is Handlebars with HTML escaping disabled
//! (the output is plain text for a model, not markup) and a small set of
//! formatting helpers.
//!
//! The render scope exposes four reserved keys — `parameters`, `context`,
//! `metadata`, `tags` — and additionally spreads each parameter name at the
//! top level, so `{{topic}}` and `{{parameters.topic}}` are interchangeable.
//! Reserved keys always win over a parameter of the same name.

use crate::params::ParameterValue;
use crate::record::Record;
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use handlebars::{
    Context, Handlebars, Helper, HelperResult, Output, RenderContext, no_escape,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;

const RESERVED_SCOPE_KEYS: [&str; 4] = ["parameters", "context", "metadata", "tags"];

const DEFAULT_DATE_FORMAT: &str = "%-m/%-d/%Y";
const DEFAULT_JOIN_DELIMITER: &str = ", ";
const DEFAULT_INDENT: u64 = 2;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("prompt is missing front matter and cannot be rendered")]
    MissingFrontMatter,
    #[error(transparent)]
    Template(#[from] handlebars::RenderError),
}

/// A rendered prompt together with the metadata a consumer typically wants
/// to show alongside the output.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPrompt {
    /// The post-processed text, ready to hand to a model.
    pub output: String,
    /// The rendered text before post-processing.
    pub raw: String,
    pub metadata: RenderedMetadata,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedMetadata {
    pub title: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub source_path: String,
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn param_string(h: &Helper<'_>, position: usize) -> String {
    h.param(position)
        .map(|p| scalar(p.value()))
        .unwrap_or_default()
}

fn uppercase_helper(
    h: &Helper<'_>,
    _: &Handlebars<'_>,
    _: &Context,
    _: &mut RenderContext<'_, '_>,
    out: &mut dyn Output,
) -> HelperResult {
    out.write(&param_string(h, 0).to_uppercase())?;
    Ok(())
}

fn lowercase_helper(
    h: &Helper<'_>,
    _: &Handlebars<'_>,
    _: &Context,
    _: &mut RenderContext<'_, '_>,
    out: &mut dyn Output,
) -> HelperResult {
    out.write(&param_string(h, 0).to_lowercase())?;
    Ok(())
}

fn join_helper(
    h: &Helper<'_>,
    _: &Handlebars<'_>,
    _: &Context,
    _: &mut RenderContext<'_, '_>,
    out: &mut dyn Output,
) -> HelperResult {
    let delimiter = h
        .param(1)
        .map(|p| scalar(p.value()))
        .unwrap_or_else(|| DEFAULT_JOIN_DELIMITER.to_string());
    let joined = match h.param(0).map(|p| p.value()) {
        Some(Value::Array(items)) => items
            .iter()
            .map(scalar)
            .collect::<Vec<_>>()
            .join(&delimiter),
        Some(other) => scalar(other),
        None => String::new(),
    };
    out.write(&joined)?;
    Ok(())
}

fn indent_helper(
    h: &Helper<'_>,
    _: &Handlebars<'_>,
    _: &Context,
    _: &mut RenderContext<'_, '_>,
    out: &mut dyn Output,
) -> HelperResult {
    let text = param_string(h, 0);
    let spaces = h
        .param(1)
        .and_then(|p| p.value().as_u64())
        .unwrap_or(DEFAULT_INDENT) as usize;
    let pad = " ".repeat(spaces);
    let indented = text
        .lines()
        .map(|line| {
            if line.is_empty() {
                line.to_string()
            } else {
                format!("{pad}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n");
    out.write(&indented)?;
    Ok(())
}

fn nl2br_helper(
    h: &Helper<'_>,
    _: &Handlebars<'_>,
    _: &Context,
    _: &mut RenderContext<'_, '_>,
    out: &mut dyn Output,
) -> HelperResult {
    out.write(&param_string(h, 0).replace('\n', "<br />"))?;
    Ok(())
}

fn parse_date_input(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .and_then(|naive| Utc.from_local_datetime(&naive).single())
}

fn format_is_valid(format: &str) -> bool {
    StrftimeItems::new(format).all(|item| !matches!(item, Item::Error))
}

fn date_helper(
    h: &Helper<'_>,
    _: &Handlebars<'_>,
    _: &Context,
    _: &mut RenderContext<'_, '_>,
    out: &mut dyn Output,
) -> HelperResult {
    let input = param_string(h, 0);
    let Some(parsed) = parse_date_input(input.trim()) else {
        // Unparseable input renders as nothing rather than failing the
        // whole template.
        return Ok(());
    };
    let format = h
        .param(1)
        .map(|p| scalar(p.value()))
        .filter(|f| !f.is_empty())
        .unwrap_or_else(|| DEFAULT_DATE_FORMAT.to_string());
    let rendered = if format_is_valid(&format) {
        parsed.format(&format).to_string()
    } else {
        parsed.to_rfc3339()
    };
    out.write(&rendered)?;
    Ok(())
}

static FENCE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^```([^\n]*)$").unwrap_or_else(|_| unreachable!())
});

/// Cleans up mechanical artifacts of substitution: line endings, trailing
/// whitespace, and code fence lines whose info string picked up padding.
fn post_process(output: &str) -> String {
    let normalized = output.replace("\r\n", "\n");
    let stripped = normalized
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n");
    let tidied = FENCE_LINE.replace_all(&stripped, |caps: &regex::Captures<'_>| {
        format!("```{}", caps[1].trim())
    });
    tidied.trim_end().to_string()
}

/// A reusable template engine. Building one registers the helper set; a
/// single instance can render any number of documents.
pub struct Renderer {
    registry: Handlebars<'static>,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer {
    pub fn new() -> Self {
        let mut registry = Handlebars::new();
        registry.register_escape_fn(no_escape);
        registry.register_helper("uppercase", Box::new(uppercase_helper));
        registry.register_helper("lowercase", Box::new(lowercase_helper));
        registry.register_helper("join", Box::new(join_helper));
        registry.register_helper("indent", Box::new(indent_helper));
        registry.register_helper("nl2br", Box::new(nl2br_helper));
        registry.register_helper("date", Box::new(date_helper));
        Renderer { registry }
    }

    fn build_scope(
        record: &Record,
        parameters: &BTreeMap<String, ParameterValue>,
        context: &Map<String, Value>,
    ) -> Result<Value, RenderError> {
        let front_matter = record
            .front_matter
            .as_ref()
            .ok_or(RenderError::MissingFrontMatter)?;

        let parameter_values = serde_json::to_value(parameters)
            .map_err(|e| handlebars::RenderError::from(handlebars::RenderErrorReason::SerdeError(e)))?;
        let metadata = serde_json::to_value(front_matter)
            .map_err(|e| handlebars::RenderError::from(handlebars::RenderErrorReason::SerdeError(e)))?;

        let mut scope = Map::new();
        if let Value::Object(params) = &parameter_values {
            for (name, value) in params {
                if !RESERVED_SCOPE_KEYS.contains(&name.as_str()) {
                    scope.insert(name.clone(), value.clone());
                }
            }
        }
        scope.insert("parameters".to_string(), parameter_values);
        scope.insert("context".to_string(), Value::Object(context.clone()));
        scope.insert("metadata".to_string(), metadata);
        scope.insert("tags".to_string(), json!(record.tags));
        Ok(Value::Object(scope))
    }

    /// Renders `record` with the given parameters and ambient context.
    ///
    /// The record must carry valid front matter; callers are expected to have
    /// checked [`Record::is_renderable`] and surfaced validation issues
    /// before getting here.
    pub fn render(
        &self,
        record: &Record,
        parameters: &BTreeMap<String, ParameterValue>,
        context: &Map<String, Value>,
    ) -> Result<RenderedPrompt, RenderError> {
        let scope = Self::build_scope(record, parameters, context)?;
        let rendered = self.registry.render_template(&record.content, &scope)?;
        let front_matter = record
            .front_matter
            .as_ref()
            .ok_or(RenderError::MissingFrontMatter)?;

        Ok(RenderedPrompt {
            output: post_process(&rendered),
            raw: rendered,
            metadata: RenderedMetadata {
                title: front_matter.title.clone(),
                description: front_matter.description.clone(),
                tags: record.tags.clone(),
                source_path: record.id.clone(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontmatter::FrontMatter;
    use std::path::PathBuf;

    fn record(content: &str) -> Record {
        let id = "demo.md".to_string();
        Record {
            id: id.clone(),
            file_path: PathBuf::from("/prompts/demo.md"),
            root_path: PathBuf::from("/prompts"),
            content: content.to_string(),
            excerpt: crate::record::build_excerpt(content),
            front_matter: Some(FrontMatter {
                schema_version: 1,
                title: "Demo".to_string(),
                description: Some("A demo".to_string()),
                tags: vec!["demo".to_string()],
                files_to_paste: Vec::new(),
                parameters: Vec::new(),
                model: None,
                comments: Vec::new(),
                preferred_clipboard_types: Vec::new(),
                requires_file: false,
            }),
            tags: vec!["demo".to_string()],
            modified_at: Utc::now(),
            validation_issues: Vec::new(),
        }
    }

    fn text_params(pairs: &[(&str, &str)]) -> BTreeMap<String, ParameterValue> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), ParameterValue::Text(v.to_string())))
            .collect()
    }

    #[test]
    fn test_render_is_deterministic() {
        let renderer = Renderer::new();
        let record = record("Hello {{topic}}!");
        let params = text_params(&[("topic", "world")]);
        let context = Map::new();

        let first = renderer.render(&record, &params, &context).unwrap();
        let second = renderer.render(&record, &params, &context).unwrap();
        assert_eq!(first.output, "Hello world!");
        assert_eq!(first.output, second.output);
        assert_eq!(first.raw, second.raw);
    }

    #[test]
    fn test_raw_is_rendered_but_not_post_processed() {
        let renderer = Renderer::new();
        let record = record("Hello {{topic}}!   \n\n\n");
        let params = text_params(&[("topic", "world")]);
        let out = renderer.render(&record, &params, &Map::new()).unwrap();
        assert_eq!(out.raw, "Hello world!   \n\n\n");
        assert_eq!(out.output, "Hello world!");
    }

    #[test]
    fn test_nested_and_top_level_access_agree() {
        let renderer = Renderer::new();
        let record = record("{{topic}} == {{parameters.topic}}");
        let params = text_params(&[("topic", "rust")]);
        let out = renderer.render(&record, &params, &Map::new()).unwrap();
        assert_eq!(out.output, "rust == rust");
    }

    #[test]
    fn test_reserved_keys_win_over_parameters() {
        let renderer = Renderer::new();
        let record = record("{{tags.[0]}}");
        let params = text_params(&[("tags", "not-the-tags")]);
        let out = renderer.render(&record, &params, &Map::new()).unwrap();
        assert_eq!(out.output, "demo");
    }

    #[test]
    fn test_undeclared_placeholder_renders_empty() {
        let renderer = Renderer::new();
        let record = record("before [{{nothing}}] after");
        let out = renderer
            .render(&record, &BTreeMap::new(), &Map::new())
            .unwrap();
        assert_eq!(out.output, "before [] after");
    }

    #[test]
    fn test_missing_front_matter_is_an_error() {
        let renderer = Renderer::new();
        let mut record = record("body");
        record.front_matter = None;
        let result = renderer.render(&record, &BTreeMap::new(), &Map::new());
        assert!(matches!(result, Err(RenderError::MissingFrontMatter)));
    }

    #[test]
    fn test_context_and_metadata_are_in_scope() {
        let renderer = Renderer::new();
        let record = record("{{metadata.title}}: {{context.clipboard}}");
        let mut context = Map::new();
        context.insert("clipboard".to_string(), Value::String("pasted".to_string()));
        let out = renderer.render(&record, &BTreeMap::new(), &context).unwrap();
        assert_eq!(out.output, "Demo: pasted");
    }

    #[test]
    fn test_no_html_escaping() {
        let renderer = Renderer::new();
        let record = record("{{snippet}}");
        let params = text_params(&[("snippet", "<a href=\"x\">& more</a>")]);
        let out = renderer.render(&record, &params, &Map::new()).unwrap();
        assert_eq!(out.output, "<a href=\"x\">& more</a>");
    }

    #[test]
    fn test_case_helpers() {
        let renderer = Renderer::new();
        let record = record("{{uppercase name}} / {{lowercase name}}");
        let params = text_params(&[("name", "Ada")]);
        let out = renderer.render(&record, &params, &Map::new()).unwrap();
        assert_eq!(out.output, "ADA / ada");
    }

    #[test]
    fn test_join_helper() {
        let renderer = Renderer::new();
        let record = record("{{join items}} | {{join items \" - \"}}");
        let mut params = BTreeMap::new();
        params.insert(
            "items".to_string(),
            ParameterValue::Items(vec!["a".into(), "b".into()]),
        );
        let out = renderer.render(&record, &params, &Map::new()).unwrap();
        assert_eq!(out.output, "a, b | a - b");
    }

    #[test]
    fn test_indent_helper() {
        let renderer = Renderer::new();
        let record = record("{{indent block 4}}");
        let params = text_params(&[("block", "one\ntwo")]);
        let out = renderer.render(&record, &params, &Map::new()).unwrap();
        assert_eq!(out.output, "    one\n    two");
    }

    #[test]
    fn test_nl2br_helper() {
        let renderer = Renderer::new();
        let record = record("{{nl2br note}}");
        let params = text_params(&[("note", "a\nb")]);
        let out = renderer.render(&record, &params, &Map::new()).unwrap();
        assert_eq!(out.output, "a<br />b");
    }

    #[test]
    fn test_date_helper_formats() {
        let renderer = Renderer::new();
        let record = record("{{date when}} | {{date when \"%Y-%m-%d\"}}");
        let params = text_params(&[("when", "2026-08-05T00:00:00Z")]);
        let out = renderer.render(&record, &params, &Map::new()).unwrap();
        assert_eq!(out.output, "8/5/2026 | 2026-08-05");
    }

    #[test]
    fn test_date_helper_bad_input_renders_empty() {
        let renderer = Renderer::new();
        let record = record("[{{date when}}]");
        let params = text_params(&[("when", "not a date")]);
        let out = renderer.render(&record, &params, &Map::new()).unwrap();
        assert_eq!(out.output, "[]");
    }

    #[test]
    fn test_date_helper_invalid_format_falls_back() {
        let renderer = Renderer::new();
        let record = record("{{date when \"%Q\"}}");
        let params = text_params(&[("when", "2026-08-05")]);
        let out = renderer.render(&record, &params, &Map::new()).unwrap();
        assert!(out.output.starts_with("2026-08-05T00:00:00"));
    }

    #[test]
    fn test_post_processing_normalizes_output() {
        let renderer = Renderer::new();
        let record = record("line one   \r\nline two\t\n```  rust  \ncode\n```   \n\n\n");
        let out = renderer
            .render(&record, &BTreeMap::new(), &Map::new())
            .unwrap();
        assert_eq!(out.output, "line one\nline two\n```rust\ncode\n```");
    }

    #[test]
    fn test_rendered_metadata_carries_source() {
        let renderer = Renderer::new();
        let record = record("body");
        let out = renderer
            .render(&record, &BTreeMap::new(), &Map::new())
            .unwrap();
        assert_eq!(out.metadata.title, "Demo");
        assert_eq!(out.metadata.source_path, "demo.md");
        assert_eq!(out.metadata.tags, vec!["demo"]);
    }
}
