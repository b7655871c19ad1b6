//! Reduce Anthropic string-or-blocks content to plain text.
//!
//! Both `messages[].content` and `system` may arrive either as a bare string or
//! as an array of typed blocks. Only `text` blocks carry anything the backend
//! can use; images, tool blocks and the like are kept structurally but dropped
//! during extraction.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    Text(String),
    Blocks(#[serde(deserialize_with = "lenient_blocks")] Vec<ContentBlock>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    // Everything else (image sources, tool ids, ...) rides along untouched
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            block_type: "text".to_string(),
            text: Some(text.into()),
            extra: HashMap::new(),
        }
    }
}

impl Content {
    /// Concatenate the text of every `text` block, in order, with no separator.
    pub fn text(&self) -> String {
        match self {
            Content::Text(t) => t.clone(),
            Content::Blocks(blocks) => blocks
                .iter()
                .filter(|b| b.block_type == "text")
                .filter_map(|b| b.text.as_deref())
                .collect(),
        }
    }
}

/// Array elements that are not well-formed blocks (no `type`, not an object)
/// are dropped instead of failing the whole request.
fn lenient_blocks<'de, D>(deserializer: D) -> Result<Vec<ContentBlock>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .filter_map(|value| serde_json::from_value(value).ok())
        .collect())
}

/// Extract plain text from an optional content field. Absent content is `""`.
pub fn extract(content: Option<&Content>) -> String {
    content.map(Content::text).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Option<Content> {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_plain_string_is_unchanged() {
        let content = Content::Text("  Say hello\n".to_string());
        assert_eq!(content.text(), "  Say hello\n");
    }

    #[test]
    fn test_blocks_concatenate_without_separator() {
        let content = parse(r#"[{"type":"text","text":"Hello, "},{"type":"text","text":"world"}]"#);
        assert_eq!(extract(content.as_ref()), "Hello, world");
    }

    #[test]
    fn test_non_text_blocks_are_skipped() {
        let content = parse(
            r#"[
                {"type":"text","text":"Describe "},
                {"type":"image","source":{"type":"base64","media_type":"image/png","data":"AAAA"}},
                {"type":"text","text":"this"}
            ]"#,
        );
        assert_eq!(extract(content.as_ref()), "Describe this");
    }

    #[test]
    fn test_empty_and_absent_yield_empty_string() {
        assert_eq!(extract(None), "");
        assert_eq!(extract(parse("null").as_ref()), "");
        assert_eq!(extract(parse("[]").as_ref()), "");
        assert_eq!(
            extract(parse(r#"[{"type":"image","source":{}}]"#).as_ref()),
            ""
        );
    }

    #[test]
    fn test_text_block_without_text_field() {
        let content = parse(r#"[{"type":"text"},{"type":"text","text":"x"}]"#);
        assert_eq!(extract(content.as_ref()), "x");
    }

    #[test]
    fn test_unknown_block_fields_are_preserved() {
        let content = parse(r#"[{"type":"tool_use","id":"toolu_1","name":"ls","input":{}}]"#);
        let Some(Content::Blocks(blocks)) = content else {
            panic!("expected blocks");
        };
        assert_eq!(blocks[0].block_type, "tool_use");
        assert_eq!(blocks[0].extra["id"], "toolu_1");
    }

    #[test]
    fn test_malformed_blocks_are_dropped() {
        let missing_type = parse(r#"[{"text":"x"},{"type":"text","text":"hi"}]"#);
        assert_eq!(extract(missing_type.as_ref()), "hi");

        let bare_string = parse(r#"[{"type":"text","text":"hi"},"bare",42,null]"#);
        let Some(Content::Blocks(blocks)) = &bare_string else {
            panic!("expected blocks");
        };
        assert_eq!(blocks.len(), 1);
        assert_eq!(extract(bare_string.as_ref()), "hi");

        let bad_text = parse(r#"[{"type":"text","text":7},{"type":"text","text":"ok"}]"#);
        assert_eq!(extract(bad_text.as_ref()), "ok");
    }
}
