//! A non-collapsed selection inside an editable host.
//!
//! Formatting commands delegate to [`content`]; the selection keeps
//! tracking its text while the tree is rewritten underneath it.

use caret_dom::{Document, NodeId, Range};

use crate::config::EditorConfig;
use crate::content;
use crate::cursor::Cursor;
use crate::error::EditorResult;

#[derive(Clone, Debug, PartialEq)]
pub struct TextSelection {
    cursor: Cursor,
}

impl TextSelection {
    pub fn new(host: NodeId, range: Range) -> Self {
        Self {
            cursor: Cursor::new(host, range),
        }
    }

    pub fn from_cursor(cursor: Cursor) -> Self {
        Self { cursor }
    }

    pub fn host(&self) -> NodeId {
        self.cursor.host()
    }

    pub fn range(&self) -> Range {
        self.cursor.range()
    }

    pub fn is_at_beginning(&self, doc: &Document) -> bool {
        self.cursor.is_at_beginning(doc)
    }

    pub fn is_at_text_end(&self, doc: &Document) -> bool {
        self.cursor.is_at_text_end(doc)
    }

    pub fn is_all_selected(&self, doc: &Document) -> bool {
        self.is_at_beginning(doc) && self.is_at_text_end(doc)
    }

    pub fn is_collapsed(&self) -> bool {
        self.cursor.range().collapsed()
    }

    /// The plain text covered by the selection.
    pub fn text(&self, doc: &Document) -> EditorResult<String> {
        Ok(self.range().to_text(doc)?)
    }

    /// The markup covered by the selection.
    pub fn html(&self, doc: &mut Document) -> EditorResult<String> {
        let fragment = self.range().clone_contents(doc)?;
        let html = content::fragment_to_html(doc, fragment);
        doc.remove_node(fragment);
        Ok(html)
    }

    /// Grow the selection to cover the whole contents of `element`.
    pub fn expand_to(&mut self, doc: &Document, element: NodeId) -> EditorResult<()> {
        let mut range = self.range();
        content::expand_to(doc, &mut range, element)?;
        self.cursor.set_range(range);
        Ok(())
    }

    pub fn get_tags(
        &self,
        doc: &Document,
        filter: impl FnMut(&Document, NodeId) -> bool,
    ) -> EditorResult<Vec<NodeId>> {
        content::get_tags(doc, self.host(), &self.range(), filter)
    }

    pub fn get_tags_by_name(&self, doc: &Document, tag_name: &str) -> EditorResult<Vec<NodeId>> {
        content::get_tags_by_name(doc, self.host(), &self.range(), tag_name)
    }

    pub fn is_exact_selection(&self, doc: &Document, element: NodeId) -> EditorResult<bool> {
        content::is_exact_selection(doc, &self.range(), element, true)
    }

    pub fn contains_string(&self, doc: &Document, needle: &str) -> EditorResult<bool> {
        content::contains_string(doc, &self.range(), needle)
    }

    /// Wrap the selection in `tag_name` when structurally possible.
    pub fn wrap(
        &mut self,
        doc: &mut Document,
        tag_name: &str,
        attributes: &[(&str, &str)],
    ) -> EditorResult<()> {
        let mut range = self.range();
        content::wrap(doc, &mut range, tag_name, attributes)?;
        self.cursor.set_range(range);
        Ok(())
    }

    /// Wrap the selection in `tag_name`, stripping whatever is in the way.
    pub fn force_wrap(
        &mut self,
        doc: &mut Document,
        tag_name: &str,
        attributes: &[(&str, &str)],
    ) -> EditorResult<()> {
        let range = content::force_wrap(doc, self.host(), self.range(), tag_name, attributes)?;
        self.cursor.set_range(range);
        Ok(())
    }

    /// Unwrap every `tag_name` element touching the selection.
    pub fn remove_formatting(&mut self, doc: &mut Document, tag_name: &str) -> EditorResult<()> {
        let range = content::remove_formatting(doc, self.host(), self.range(), tag_name)?;
        self.cursor.set_range(range);
        Ok(())
    }

    /// Wrap in `tag_name`, or unwrap when the selection already is exactly
    /// one such element.
    pub fn toggle(
        &mut self,
        doc: &mut Document,
        tag_name: &str,
        attributes: &[(&str, &str)],
    ) -> EditorResult<()> {
        let range = content::toggle_tag(doc, self.host(), self.range(), tag_name, attributes)?;
        self.cursor.set_range(range);
        Ok(())
    }

    pub fn make_bold(&mut self, doc: &mut Document, config: &EditorConfig) -> EditorResult<()> {
        let tag = config.bold_tag.clone();
        self.force_wrap(doc, &tag, &[])
    }

    pub fn toggle_bold(&mut self, doc: &mut Document, config: &EditorConfig) -> EditorResult<()> {
        let tag = config.bold_tag.clone();
        self.toggle(doc, &tag, &[])
    }

    pub fn give_emphasis(&mut self, doc: &mut Document, config: &EditorConfig) -> EditorResult<()> {
        let tag = config.italic_tag.clone();
        self.force_wrap(doc, &tag, &[])
    }

    pub fn toggle_emphasis(
        &mut self,
        doc: &mut Document,
        config: &EditorConfig,
    ) -> EditorResult<()> {
        let tag = config.italic_tag.clone();
        self.toggle(doc, &tag, &[])
    }

    pub fn toggle_strikethrough(
        &mut self,
        doc: &mut Document,
        config: &EditorConfig,
    ) -> EditorResult<()> {
        let tag = config.strikethrough_tag.clone();
        self.toggle(doc, &tag, &[])
    }

    pub fn toggle_superscript(
        &mut self,
        doc: &mut Document,
        config: &EditorConfig,
    ) -> EditorResult<()> {
        let tag = config.superscript_tag.clone();
        self.toggle(doc, &tag, &[])
    }

    pub fn toggle_subscript(
        &mut self,
        doc: &mut Document,
        config: &EditorConfig,
    ) -> EditorResult<()> {
        let tag = config.subscript_tag.clone();
        self.toggle(doc, &tag, &[])
    }

    /// Turn the selection into a link.
    pub fn link(
        &mut self,
        doc: &mut Document,
        config: &EditorConfig,
        attributes: &[(&str, &str)],
    ) -> EditorResult<()> {
        let tag = config.link_tag.clone();
        self.force_wrap(doc, &tag, attributes)
    }

    pub fn unlink(&mut self, doc: &mut Document, config: &EditorConfig) -> EditorResult<()> {
        let tag = config.link_tag.clone();
        self.remove_formatting(doc, &tag)
    }

    /// Link the selection; when it already touches a link, unlink an exact
    /// match or expand to the existing link so its attributes can be
    /// edited.
    pub fn toggle_link(
        &mut self,
        doc: &mut Document,
        config: &EditorConfig,
        attributes: &[(&str, &str)],
    ) -> EditorResult<()> {
        let links = self.get_tags_by_name(doc, &config.link_tag)?;
        match links.first() {
            Some(&link) => {
                if links.len() == 1 && self.is_exact_selection(doc, link)? {
                    self.unlink(doc, config)
                } else {
                    self.expand_to(doc, link)
                }
            }
            None => self.link(doc, config, attributes),
        }
    }

    /// Put `start_text` and `end_text` around the selection, which grows to
    /// include them.
    pub fn surround(
        &mut self,
        doc: &mut Document,
        start_text: &str,
        end_text: &str,
    ) -> EditorResult<()> {
        let range = content::surround(doc, self.range(), start_text, end_text)?;
        self.cursor.set_range(range);
        Ok(())
    }

    pub fn remove_surround(
        &mut self,
        doc: &mut Document,
        start_text: &str,
        end_text: &str,
    ) -> EditorResult<()> {
        let range = content::delete_character(doc, self.range(), start_text)?;
        let range = content::delete_character(doc, range, end_text)?;
        self.cursor.set_range(range);
        Ok(())
    }

    /// Delete every occurrence of `needle` within the selection.
    pub fn delete_character(&mut self, doc: &mut Document, needle: &str) -> EditorResult<()> {
        let range = content::delete_character(doc, self.range(), needle)?;
        self.cursor.set_range(range);
        Ok(())
    }

    pub fn toggle_surround(
        &mut self,
        doc: &mut Document,
        start_text: &str,
        end_text: &str,
    ) -> EditorResult<()> {
        if self.contains_string(doc, start_text)? {
            self.remove_surround(doc, start_text, end_text)
        } else {
            self.surround(doc, start_text, end_text)
        }
    }

    /// Delete the selected content; what remains is a cursor at the
    /// removal point.
    pub fn delete_content(mut self, doc: &mut Document) -> EditorResult<Cursor> {
        let mut range = self.cursor.range();
        range.delete_contents(doc)?;
        self.cursor.set_range(range);
        Ok(self.cursor)
    }

    pub fn collapse_at_beginning(mut self, doc: &Document) -> EditorResult<Cursor> {
        let mut range = self.cursor.range();
        range.collapse(true);
        range.assert_valid(doc)?;
        self.cursor.set_range(range);
        Ok(self.cursor)
    }

    pub fn collapse_at_end(mut self, doc: &Document) -> EditorResult<Cursor> {
        let mut range = self.cursor.range();
        range.collapse(false);
        range.assert_valid(doc)?;
        self.cursor.set_range(range);
        Ok(self.cursor)
    }

    pub fn equals(&self, other: &TextSelection) -> bool {
        self.cursor.equals(&other.cursor)
    }
}
