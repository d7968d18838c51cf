//! Ambient context made available to templates under the `context` scope key.

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use tracing::warn;

/// Gathers the ambient context for one render: the clipboard text (best
/// effort) and the current timestamp, then any caller-supplied extras, which
/// override the gathered values on key collision.
pub fn gather_context(extras: &[(String, String)]) -> Map<String, Value> {
    let mut context = Map::new();

    match arboard::Clipboard::new().and_then(|mut clipboard| clipboard.get_text()) {
        Ok(text) => {
            context.insert("clipboard".to_string(), Value::String(text));
        }
        Err(e) => {
            // No clipboard (headless session, empty clipboard) is normal.
            warn!(error = %e, "clipboard unavailable, templates see an empty value");
            context.insert("clipboard".to_string(), Value::String(String::new()));
        }
    }

    context.insert(
        "date".to_string(),
        Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
    );

    for (key, value) in extras {
        context.insert(key.clone(), Value::String(value.clone()));
    }
    context
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_always_has_clipboard_and_date() {
        let context = gather_context(&[]);
        assert!(context.contains_key("clipboard"));
        assert!(context.contains_key("date"));
    }

    #[test]
    fn test_extras_override_gathered_values() {
        let extras = vec![
            ("clipboard".to_string(), "forced".to_string()),
            ("custom".to_string(), "value".to_string()),
        ];
        let context = gather_context(&extras);
        assert_eq!(context["clipboard"], Value::String("forced".to_string()));
        assert_eq!(context["custom"], Value::String("value".to_string()));
    }
}
