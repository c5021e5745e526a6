//! A collapsed position inside an editable host.

use caret_dom::save_restore::{restore_range, save_range, SavedRange};
use caret_dom::{Document, NodeId, Range};

use crate::content;
use crate::error::{EditorError, EditorResult};
use crate::host;

/// A cursor: a range (usually collapsed) tied to its editable host.
#[derive(Clone, Debug, PartialEq)]
pub struct Cursor {
    host: NodeId,
    range: Range,
    saved: Option<SavedRange>,
}

impl Cursor {
    pub fn new(host: NodeId, range: Range) -> Self {
        Self {
            host,
            range,
            saved: None,
        }
    }

    pub fn host(&self) -> NodeId {
        self.host
    }

    pub fn range(&self) -> Range {
        self.range
    }

    pub(crate) fn set_range(&mut self, range: Range) {
        self.range = range;
    }

    pub fn is_at_beginning(&self, doc: &Document) -> bool {
        host::is_beginning_of_host(
            doc,
            self.host,
            self.range.start_container(),
            self.range.start_offset(),
        )
    }

    pub fn is_at_end(&self, doc: &Document) -> bool {
        host::is_end_of_host(
            doc,
            self.host,
            self.range.end_container(),
            self.range.end_offset(),
        )
    }

    /// At the end of the visible text, ignoring trailing whitespace and
    /// linebreaks.
    pub fn is_at_text_end(&self, doc: &Document) -> bool {
        host::is_text_end_of_host(
            doc,
            self.host,
            self.range.end_container(),
            self.range.end_offset(),
        )
    }

    /// Insert markup before the cursor; the cursor ends up after the
    /// insertion.
    pub fn insert_before(&mut self, doc: &mut Document, markup: &str) -> EditorResult<()> {
        let fragment = content::create_fragment_from_string(doc, markup)?;
        self.insert_fragment_before(doc, fragment)
    }

    pub fn insert_fragment_before(
        &mut self,
        doc: &mut Document,
        fragment: NodeId,
    ) -> EditorResult<()> {
        let Some(&last) = doc.children(fragment).last() else {
            return Ok(());
        };
        self.range.insert_node(doc, fragment)?;
        self.range.set_start_after(doc, last)?;
        self.range.set_end_after(doc, last)?;
        Ok(())
    }

    /// Insert markup after the cursor; the cursor stays before the
    /// insertion.
    pub fn insert_after(&mut self, doc: &mut Document, markup: &str) -> EditorResult<()> {
        let fragment = content::create_fragment_from_string(doc, markup)?;
        self.insert_fragment_after(doc, fragment)
    }

    pub fn insert_fragment_after(
        &mut self,
        doc: &mut Document,
        fragment: NodeId,
    ) -> EditorResult<()> {
        if doc.children(fragment).is_empty() {
            return Ok(());
        }
        self.range.insert_node(doc, fragment)?;
        Ok(())
    }

    /// Everything in the host before the cursor, as a fragment.
    pub fn content_before(&self, doc: &mut Document) -> EditorResult<NodeId> {
        let mut range = self.range;
        range.set_start_before(doc, self.host)?;
        content::clone_contents_without_ancestor(doc, &range)
    }

    pub fn content_before_html(&self, doc: &mut Document) -> EditorResult<String> {
        let fragment = self.content_before(doc)?;
        let html = content::fragment_to_html(doc, fragment);
        doc.remove_node(fragment);
        Ok(html)
    }

    /// Everything in the host after the cursor, as a fragment.
    pub fn content_after(&self, doc: &mut Document) -> EditorResult<NodeId> {
        let mut range = self.range;
        range.set_end_after(doc, self.host)?;
        content::clone_contents_without_ancestor(doc, &range)
    }

    pub fn content_after_html(&self, doc: &mut Document) -> EditorResult<String> {
        let fragment = self.content_after(doc)?;
        let html = content::fragment_to_html(doc, fragment);
        doc.remove_node(fragment);
        Ok(html)
    }

    /// Move to just before `element`, which must sit inside the host.
    pub fn move_before(&mut self, doc: &Document, element: NodeId) -> EditorResult<()> {
        self.assert_inside_host(doc, element)?;
        self.range.set_start_before(doc, element)?;
        self.range.set_end_before(doc, element)?;
        Ok(())
    }

    pub fn move_after(&mut self, doc: &Document, element: NodeId) -> EditorResult<()> {
        self.assert_inside_host(doc, element)?;
        self.range.set_start_after(doc, element)?;
        self.range.set_end_after(doc, element)?;
        Ok(())
    }

    pub fn move_at_beginning(
        &mut self,
        doc: &Document,
        element: Option<NodeId>,
    ) -> EditorResult<()> {
        let target = element.unwrap_or(self.host);
        self.assert_inside_host(doc, target)?;
        self.range.select_node_contents(doc, target)?;
        self.range.collapse(true);
        Ok(())
    }

    pub fn move_at_end(&mut self, doc: &Document, element: Option<NodeId>) -> EditorResult<()> {
        let target = element.unwrap_or(self.host);
        self.assert_inside_host(doc, target)?;
        self.range.select_node_contents(doc, target)?;
        self.range.collapse(false);
        Ok(())
    }

    /// Collapse after the last visible character of the host.
    pub fn move_at_text_end(&mut self, doc: &Document) -> EditorResult<()> {
        self.move_at_end(doc, Some(host::latest_child(doc, self.host)))
    }

    /// Park the cursor behind a marker so its own mutations cannot
    /// invalidate it.
    pub fn save(&mut self, doc: &mut Document) -> EditorResult<()> {
        self.saved = Some(save_range(doc, &mut self.range, false)?);
        Ok(())
    }

    pub fn restore(&mut self, doc: &mut Document) -> EditorResult<()> {
        match self.saved.take() {
            Some(saved) => {
                self.range = restore_range(doc, &saved, true)?;
                Ok(())
            }
            None => Err(EditorError::NoSavedState),
        }
    }

    pub fn equals(&self, other: &Cursor) -> bool {
        self.host == other.host && self.range == other.range
    }

    fn assert_inside_host(&self, doc: &Document, node: NodeId) -> EditorResult<()> {
        if doc.is_or_is_ancestor_of(self.host, node) {
            Ok(())
        } else {
            Err(EditorError::OutsideHost)
        }
    }
}
