//! Paste pipeline: raw pasted markup in, cleaned text blocks out.
//!
//! The host is flagged with the pasting attribute for the duration so
//! observers can ignore the intermediate tree states, and the cursor is
//! parked behind a marker while the filter runs.

use std::sync::OnceLock;

use caret_dom::dom::markup::parse_fragment;
use caret_dom::{Document, NodeId, NodeKind};
use regex::{Captures, Regex};

use crate::config::EditorConfig;
use crate::container::RangeContainer;
use crate::cursor::Cursor;
use crate::error::EditorResult;

/// Turns raw pasted markup into ordered, cleaned block strings.
pub trait PasteFilter {
    fn blocks(&self, doc: &mut Document, raw: &str) -> EditorResult<Vec<String>>;
}

/// The stock filter: element wrappers are dropped, text is kept escaped,
/// block-level elements split the result into separate blocks.
pub struct DefaultPasteFilter {
    split_tags: Vec<String>,
}

// Cannot occur in escaped text, so it is safe as a block separator.
const BLOCK_BREAK: char = '\u{0}';

impl DefaultPasteFilter {
    pub fn new(config: &EditorConfig) -> Self {
        Self {
            split_tags: config.block_tags.clone(),
        }
    }

    fn collect(&self, doc: &Document, node: NodeId, out: &mut String) {
        for &child in doc.children(node) {
            match doc.kind(child) {
                NodeKind::Text => {
                    if let Some(data) = doc.data(child) {
                        out.push_str(&html_escape::encode_text(data));
                    }
                }
                NodeKind::Element => {
                    let splits = doc
                        .tag_name(child)
                        .is_some_and(|tag| self.split_tags.iter().any(|t| t == tag));
                    if splits {
                        out.push(BLOCK_BREAK);
                    }
                    self.collect(doc, child, out);
                    if splits {
                        out.push(BLOCK_BREAK);
                    }
                }
                _ => {}
            }
        }
    }
}

impl PasteFilter for DefaultPasteFilter {
    fn blocks(&self, doc: &mut Document, raw: &str) -> EditorResult<Vec<String>> {
        let scratch = parse_fragment(doc, raw)?;
        let mut text = String::new();
        self.collect(doc, scratch, &mut text);
        doc.remove_node(scratch);

        Ok(text
            .split(BLOCK_BREAK)
            .map(|block| clean_whitespace(block).trim().to_string())
            .filter(|block| !block.is_empty())
            .collect())
    }
}

/// A non-breaking space is only meaningful after a regular space; anywhere
/// else it becomes a plain space.
fn clean_whitespace(text: &str) -> String {
    static NBSP: OnceLock<Regex> = OnceLock::new();
    let re = NBSP.get_or_init(|| Regex::new("(.)\u{a0}").unwrap());
    re.replace_all(text, |caps: &Captures| {
        let before = &caps[1];
        if before == " " {
            format!("{before}\u{a0}")
        } else {
            format!("{before} ")
        }
    })
    .into_owned()
}

/// Run the paste pipeline: reduce the container to a cursor (deleting any
/// selected content), park it, filter the raw markup, and hand back the
/// blocks together with the restored cursor.
pub fn paste(
    doc: &mut Document,
    config: &EditorConfig,
    container: RangeContainer,
    filter: &dyn PasteFilter,
    raw: &str,
) -> EditorResult<Option<(Vec<String>, Cursor)>> {
    let Some(host) = container.host() else {
        return Ok(None);
    };
    doc.set_attribute(host, &config.pasting_attribute, "true");

    let result = (|| -> EditorResult<Option<(Vec<String>, Cursor)>> {
        let Some(mut cursor) = container.force_cursor(doc)? else {
            return Ok(None);
        };
        cursor.save(doc)?;
        let blocks = filter.blocks(doc, raw);
        cursor.restore(doc)?;
        Ok(Some((blocks?, cursor)))
    })();

    doc.remove_attribute(host, &config.pasting_attribute);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use caret_dom::Range;
    use pretty_assertions::assert_eq;

    fn host_from(markup: &str) -> (Document, NodeId) {
        let mut doc = Document::new();
        let host = doc.create_element("div");
        doc.set_attribute(host, "data-editable-host", "true");
        doc.append_child(doc.root(), host).unwrap();
        let frag = parse_fragment(&mut doc, markup).unwrap();
        let children: Vec<_> = doc.children(frag).to_vec();
        for child in children {
            doc.append_child(host, child).unwrap();
        }
        (doc, host)
    }

    fn filter_blocks(raw: &str) -> Vec<String> {
        let config = EditorConfig::default();
        let mut doc = Document::new();
        DefaultPasteFilter::new(&config)
            .blocks(&mut doc, raw)
            .unwrap()
    }

    #[test]
    fn inline_wrappers_are_dropped_and_text_escaped() {
        assert_eq!(
            filter_blocks("keep <b>bold</b> & <span>3 < 4</span>"),
            vec!["keep bold &amp; 3 &lt; 4"]
        );
    }

    #[test]
    fn block_elements_split_into_blocks() {
        assert_eq!(
            filter_blocks("<p>one</p><p> two </p><div>\u{a0}</div><h2>three</h2>"),
            vec!["one", "two", "three"]
        );
    }

    #[test]
    fn nbsp_survives_only_after_a_space() {
        assert_eq!(clean_whitespace("a\u{a0}b \u{a0}c"), "a b \u{a0}c");
    }

    #[test]
    fn paste_over_a_selection_deletes_it_first() {
        let config = EditorConfig::default();
        let (mut doc, host) = host_from("hello world");
        let text = doc.first_child(host).unwrap();
        let mut range = Range::new(&doc);
        range.set_start_and_end(&doc, text, 5, text, 11).unwrap();
        let container = RangeContainer::from_range(host, range);

        let filter = DefaultPasteFilter::new(&config);
        let (blocks, cursor) = paste(&mut doc, &config, container, &filter, "<p>pasted</p>")
            .unwrap()
            .unwrap();

        assert_eq!(blocks, vec!["pasted"]);
        assert_eq!(doc.text_content(host), "hello");
        assert!(cursor.range().collapsed());
        assert_eq!(doc.attribute(host, &config.pasting_attribute), None);
    }

    #[test]
    fn paste_with_no_container_is_a_no_op() {
        let config = EditorConfig::default();
        let mut doc = Document::new();
        let filter = DefaultPasteFilter::new(&config);
        assert!(paste(&mut doc, &config, RangeContainer::None, &filter, "x")
            .unwrap()
            .is_none());
    }
}
