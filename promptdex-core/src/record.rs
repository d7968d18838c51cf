//! Core record type for one indexed prompt document, plus the derivations
//! (excerpt, tags) that are computed for every document regardless of
//! metadata validity.

use crate::frontmatter::{FrontMatter, ValidationIssue};
use chrono::{DateTime, Utc};
use std::path::PathBuf;

/// Maximum excerpt length in characters, including the ellipsis marker.
pub const EXCERPT_MAX_LEN: usize = 260;

/// One indexed prompt document.
///
/// A record exists for every eligible file under the root, valid metadata or
/// not. A record with validation issues is surfaced in listings as "needs
/// metadata" but is never offered for rendering.
#[derive(Debug, Clone)]
pub struct Record {
    /// Stable identity: the root-relative path with `/` separators.
    pub id: String,
    pub file_path: PathBuf,
    pub root_path: PathBuf,
    /// The template source: everything after the front matter block.
    pub content: String,
    /// Whitespace-collapsed preview of the body, at most [`EXCERPT_MAX_LEN`] chars.
    pub excerpt: String,
    /// Present only when the document declared a metadata block that validated.
    pub front_matter: Option<FrontMatter>,
    /// Folder-derived tags unioned with declared tags, lower-cased and deduped.
    pub tags: Vec<String>,
    pub modified_at: DateTime<Utc>,
    /// Non-empty exactly when `front_matter` is `None`.
    pub validation_issues: Vec<ValidationIssue>,
}

impl Record {
    /// Whether this record may be handed to the renderer.
    pub fn is_renderable(&self) -> bool {
        self.front_matter.is_some() && self.validation_issues.is_empty()
    }

    /// Display title: the declared title, or the relative path for documents
    /// without valid metadata.
    pub fn title(&self) -> &str {
        self.front_matter
            .as_ref()
            .map(|fm| fm.title.as_str())
            .unwrap_or(&self.id)
    }
}

/// Collapses all whitespace runs and truncates to [`EXCERPT_MAX_LEN`]
/// characters with an ellipsis marker.
pub fn build_excerpt(content: &str) -> String {
    let clean: String = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if clean.chars().count() <= EXCERPT_MAX_LEN {
        return clean;
    }
    let mut truncated: String = clean.chars().take(EXCERPT_MAX_LEN - 1).collect();
    truncated.push('…');
    truncated
}

fn normalize_segment_tag(segment: &str) -> Option<String> {
    let mut tag = String::new();
    let mut in_run = false;
    for c in segment.chars() {
        if c.is_alphanumeric() {
            if in_run && !tag.is_empty() {
                tag.push('-');
            }
            in_run = false;
            for lower in c.to_lowercase() {
                tag.push(lower);
            }
        } else {
            in_run = true;
        }
    }
    if tag.is_empty() { None } else { Some(tag) }
}

/// Derives the tag set for a document from its root-relative path and any
/// declared tags.
///
/// One tag per folder segment (the filename itself is excluded), lower-cased
/// with non-alphanumeric runs collapsed to a single `-`. Declared tags are
/// trimmed and lower-cased. The union is deduplicated and sorted, so the
/// result is independent of declaration order.
pub fn derive_tags(relative_path: &str, declared: &[String]) -> Vec<String> {
    let normalized = relative_path.replace('\\', "/");
    let segments: Vec<&str> = normalized.split('/').filter(|s| !s.is_empty()).collect();
    let folder_segments = &segments[..segments.len().saturating_sub(1)];

    let mut unique = std::collections::BTreeSet::new();
    for segment in folder_segments {
        if let Some(tag) = normalize_segment_tag(segment) {
            unique.insert(tag);
        }
    }
    for tag in declared {
        let trimmed = tag.trim().to_lowercase();
        if !trimmed.is_empty() {
            unique.insert(trimmed);
        }
    }
    unique.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excerpt_collapses_whitespace() {
        assert_eq!(build_excerpt("Hello   world\n\n  again"), "Hello world again");
    }

    #[test]
    fn test_excerpt_short_content_unchanged() {
        assert_eq!(build_excerpt("short"), "short");
    }

    #[test]
    fn test_excerpt_truncates_with_ellipsis() {
        let long = "word ".repeat(100);
        let excerpt = build_excerpt(&long);
        assert_eq!(excerpt.chars().count(), EXCERPT_MAX_LEN);
        assert!(excerpt.ends_with('…'));
    }

    #[test]
    fn test_excerpt_truncation_is_char_safe() {
        let long = "é".repeat(400);
        let excerpt = build_excerpt(&long);
        assert_eq!(excerpt.chars().count(), EXCERPT_MAX_LEN);
    }

    #[test]
    fn test_derive_tags_from_folders() {
        let tags = derive_tags("Code Review/rust/weekly.md", &[]);
        assert_eq!(tags, vec!["code-review", "rust"]);
    }

    #[test]
    fn test_derive_tags_excludes_filename() {
        let tags = derive_tags("deeply.md", &[]);
        assert!(tags.is_empty());
    }

    #[test]
    fn test_derive_tags_unions_declared() {
        let tags = derive_tags(
            "writing/blog.md",
            &["  Draft ".to_string(), "writing".to_string()],
        );
        assert_eq!(tags, vec!["draft", "writing"]);
    }

    #[test]
    fn test_derive_tags_order_insensitive() {
        let a = derive_tags("x/y.md", &["b".to_string(), "a".to_string()]);
        let b = derive_tags("x/y.md", &["a".to_string(), "b".to_string()]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_derive_tags_idempotent() {
        let first = derive_tags("My Stuff/notes.md", &["Extra!".to_string()]);
        let second = derive_tags("My Stuff/notes.md", &first);
        assert_eq!(first, second);
    }

    #[test]
    fn test_derive_tags_collapses_symbol_runs() {
        let tags = derive_tags("a__b -- c/file.md", &[]);
        assert_eq!(tags, vec!["a-b-c"]);
    }

    #[test]
    fn test_derive_tags_drops_empty_segments() {
        let tags = derive_tags("!!!/real/file.md", &["   ".to_string()]);
        assert_eq!(tags, vec!["real"]);
    }

    #[test]
    fn test_derive_tags_windows_separators() {
        let tags = derive_tags("code\\rust\\file.md", &[]);
        assert_eq!(tags, vec!["code", "rust"]);
    }
}
