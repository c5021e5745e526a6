//! Editor configuration. Programmatic only; the defaults mirror common
//! rich-text conventions.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Attribute marking an element as an editable host block.
    pub editable_attribute: String,
    /// Attribute set on a host while a paste is in flight, so focus and
    /// blur handlers can ignore the shuffle.
    pub pasting_attribute: String,
    /// Whether selection-change notifications fire while the mouse is
    /// still dragging.
    pub mouse_move_selection_changes: bool,

    pub bold_tag: String,
    pub italic_tag: String,
    pub strikethrough_tag: String,
    pub superscript_tag: String,
    pub subscript_tag: String,
    pub link_tag: String,

    /// Tag used when new blocks are created.
    pub default_block_tag: String,
    /// Block-level tags recognized when splitting pasted content.
    pub block_tags: Vec<String>,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            editable_attribute: "data-editable-host".to_string(),
            pasting_attribute: "data-editable-is-pasting".to_string(),
            mouse_move_selection_changes: false,
            bold_tag: "strong".to_string(),
            italic_tag: "em".to_string(),
            strikethrough_tag: "strike".to_string(),
            superscript_tag: "sup".to_string(),
            subscript_tag: "sub".to_string(),
            link_tag: "a".to_string(),
            default_block_tag: "p".to_string(),
            block_tags: [
                "h1", "h2", "h3", "h4", "h5", "h6", "div", "p", "pre", "hr", "blockquote",
                "article", "figure", "header", "footer", "ul", "ol", "li", "section", "table",
            ]
            .iter()
            .map(|tag| tag.to_string())
            .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_use_semantic_formatting_tags() {
        let config = EditorConfig::default();
        assert_eq!(config.bold_tag, "strong");
        assert_eq!(config.italic_tag, "em");
        assert!(config.block_tags.iter().any(|tag| tag == "p"));
        assert!(!config.mouse_move_selection_changes);
    }
}
