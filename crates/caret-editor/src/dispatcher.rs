//! Turns raw input into semantic editing events.
//!
//! The dispatcher owns the keyboard frontend and the selection watcher
//! and translates what the embedder feeds it (key events, selection
//! changes, clipboard actions) into notifications like `insert`, `split`,
//! `merge` and `switch`. It never mutates content itself beyond reducing
//! a selection to a cursor; acting on the events is the embedder's job.

use caret_dom::{Document, NodeId, Range};

use crate::clipboard::{self, DefaultPasteFilter, PasteFilter};
use crate::config::EditorConfig;
use crate::container::RangeContainer;
use crate::cursor::Cursor;
use crate::error::EditorResult;
use crate::events::{Eventable, ListenerId, Propagation};
use crate::host;
use crate::keyboard::{Keyboard, KeyStroke, RawKeyEvent};
use crate::selection::TextSelection;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Direction {
    Before,
    After,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ClipboardAction {
    Copy,
    Cut,
}

/// One semantic editing notification.
#[derive(Clone, Debug)]
pub enum EditorEvent {
    Focus { host: NodeId },
    Blur { host: NodeId },
    /// The content changed, or is about to change through the default
    /// handling of the key that triggered this.
    Change { host: NodeId },
    /// The cursor left the host (payload-less `cursor` notification).
    CursorLeft { host: NodeId },
    CursorMoved { host: NodeId, cursor: Cursor },
    /// The selection collapsed or left the host.
    SelectionLeft { host: NodeId },
    SelectionChanged { host: NodeId, selection: TextSelection },
    /// Enter at a host boundary: a new block should appear on `direction`.
    Insert { host: NodeId, direction: Direction, cursor: Cursor },
    /// Enter in the middle: the block splits into two fragments.
    Split { host: NodeId, before: String, after: String, cursor: Cursor },
    /// Backspace at the beginning or delete at the text end.
    Merge { host: NodeId, direction: Direction, cursor: Cursor },
    Newline { host: NodeId, cursor: Cursor },
    /// An arrow key pressed against a host boundary.
    Switch { host: NodeId, direction: Direction, cursor: Cursor },
    Clipboard { host: NodeId, action: ClipboardAction, selection: TextSelection },
    Paste { host: NodeId, blocks: Vec<String>, cursor: Cursor },
}

impl EditorEvent {
    pub fn name(&self) -> &'static str {
        match self {
            EditorEvent::Focus { .. } => "focus",
            EditorEvent::Blur { .. } => "blur",
            EditorEvent::Change { .. } => "change",
            EditorEvent::CursorLeft { .. } | EditorEvent::CursorMoved { .. } => "cursor",
            EditorEvent::SelectionLeft { .. } | EditorEvent::SelectionChanged { .. } => "selection",
            EditorEvent::Insert { .. } => "insert",
            EditorEvent::Split { .. } => "split",
            EditorEvent::Merge { .. } => "merge",
            EditorEvent::Newline { .. } => "newline",
            EditorEvent::Switch { .. } => "switch",
            EditorEvent::Clipboard { .. } => "clipboard",
            EditorEvent::Paste { .. } => "paste",
        }
    }
}

/// Tracks the current cursor/selection state and emits enter/leave
/// notifications when it changes.
#[derive(Default)]
pub struct SelectionWatcher {
    current: RangeContainer,
}

impl SelectionWatcher {
    pub fn current(&self) -> &RangeContainer {
        &self.current
    }

    /// Install the new state and notify the difference: a payload-less
    /// `cursor`/`selection` event when the old state ended, then the new
    /// state with its payload.
    pub fn selection_changed(
        &mut self,
        new: RangeContainer,
        events: &mut Eventable<EditorEvent>,
    ) {
        if !new.is_different_from(&self.current) {
            return;
        }
        let last = std::mem::replace(&mut self.current, new);

        match &last {
            RangeContainer::Cursor(cursor) if !self.current.is_cursor() => {
                events.notify("cursor", &EditorEvent::CursorLeft { host: cursor.host() });
            }
            RangeContainer::Selection(selection) if !self.current.is_selection() => {
                events.notify(
                    "selection",
                    &EditorEvent::SelectionLeft { host: selection.host() },
                );
            }
            _ => {}
        }

        match &self.current {
            RangeContainer::Cursor(cursor) => {
                events.notify(
                    "cursor",
                    &EditorEvent::CursorMoved { host: cursor.host(), cursor: cursor.clone() },
                );
            }
            RangeContainer::Selection(selection) => {
                events.notify(
                    "selection",
                    &EditorEvent::SelectionChanged {
                        host: selection.host(),
                        selection: selection.clone(),
                    },
                );
            }
            RangeContainer::None => {}
        }
    }
}

pub struct Dispatcher {
    config: EditorConfig,
    keyboard: Keyboard,
    watcher: SelectionWatcher,
    events: Eventable<EditorEvent>,
    paste_filter: Box<dyn PasteFilter>,
}

impl Dispatcher {
    pub fn new(config: EditorConfig) -> Self {
        let paste_filter = Box::new(DefaultPasteFilter::new(&config));
        Self {
            config,
            keyboard: Keyboard::new(),
            watcher: SelectionWatcher::default(),
            events: Eventable::new(),
            paste_filter,
        }
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn keyboard_mut(&mut self) -> &mut Keyboard {
        &mut self.keyboard
    }

    pub fn current_container(&self) -> &RangeContainer {
        self.watcher.current()
    }

    pub fn set_paste_filter(&mut self, filter: Box<dyn PasteFilter>) {
        self.paste_filter = filter;
    }

    pub fn on(
        &mut self,
        event: &str,
        callback: impl FnMut(&EditorEvent) -> Propagation + 'static,
    ) -> ListenerId {
        self.events.on(event, callback)
    }

    pub fn off(&mut self, event: &str, id: ListenerId) {
        self.events.off(event, id);
    }

    fn notify(&mut self, event: EditorEvent) {
        tracing::debug!(event = event.name(), "dispatching");
        self.events.notify(event.name(), &event);
    }

    /// Feed the current selection state, as a range or nothing. The host
    /// is derived from the range; a range outside any editable host counts
    /// as no selection.
    pub fn selection_changed(
        &mut self,
        doc: &Document,
        range: Option<Range>,
    ) -> EditorResult<()> {
        let container = match range {
            Some(range) => {
                let ancestor = range.common_ancestor_container(doc)?;
                match host::find_host(doc, &self.config.editable_attribute, ancestor) {
                    Some(host) => RangeContainer::from_range(host, range),
                    None => RangeContainer::None,
                }
            }
            None => RangeContainer::None,
        };
        self.watcher.selection_changed(container, &mut self.events);
        Ok(())
    }

    pub fn focus(&mut self, doc: &Document, element: NodeId) {
        if doc.attribute(element, &self.config.pasting_attribute).is_none() {
            self.notify(EditorEvent::Focus { host: element });
        }
    }

    pub fn blur(&mut self, doc: &Document, element: NodeId) {
        if doc.attribute(element, &self.config.pasting_attribute).is_none() {
            self.notify(EditorEvent::Blur { host: element });
        }
    }

    pub fn copy(&mut self) {
        if let Some(selection) = self.watcher.current().as_selection().cloned() {
            self.notify(EditorEvent::Clipboard {
                host: selection.host(),
                action: ClipboardAction::Copy,
                selection,
            });
        }
    }

    pub fn cut(&mut self) {
        if let Some(selection) = self.watcher.current().as_selection().cloned() {
            let host = selection.host();
            self.notify(EditorEvent::Clipboard {
                host,
                action: ClipboardAction::Cut,
                selection,
            });
            self.notify(EditorEvent::Change { host });
        }
    }

    /// Run the paste pipeline on raw clipboard markup and notify `paste`
    /// and `change` with the result.
    pub fn paste(&mut self, doc: &mut Document, raw: &str) -> EditorResult<()> {
        let container = self.watcher.current().clone();
        let Some((blocks, cursor)) =
            clipboard::paste(doc, &self.config, container, self.paste_filter.as_ref(), raw)?
        else {
            return Ok(());
        };
        let host = cursor.host();
        self.watcher
            .selection_changed(RangeContainer::Cursor(cursor.clone()), &mut self.events);
        if !blocks.is_empty() {
            self.notify(EditorEvent::Paste { host, blocks, cursor });
            self.notify(EditorEvent::Change { host });
        }
        Ok(())
    }

    /// Handle one raw key event. Returns true when the event was consumed
    /// and the embedder must suppress its default handling.
    pub fn dispatch_key(
        &mut self,
        doc: &mut Document,
        event: &RawKeyEvent,
    ) -> EditorResult<bool> {
        let Some(stroke) = self.keyboard.dispatch_key_event(event, true) else {
            return Ok(false);
        };
        match stroke {
            KeyStroke::Left | KeyStroke::Up => self.dispatch_switch(doc, event, Direction::Before),
            KeyStroke::Right | KeyStroke::Down => {
                self.dispatch_switch(doc, event, Direction::After)
            }
            KeyStroke::Tab | KeyStroke::ShiftTab | KeyStroke::Esc => Ok(false),
            KeyStroke::Backspace => {
                match self.watcher.current().as_cursor().cloned() {
                    Some(cursor) if cursor.is_at_beginning(doc) => {
                        let host = cursor.host();
                        self.notify(EditorEvent::Merge {
                            host,
                            direction: Direction::Before,
                            cursor,
                        });
                        Ok(true)
                    }
                    _ => {
                        self.notify_change();
                        Ok(false)
                    }
                }
            }
            KeyStroke::Delete => {
                match self.watcher.current().as_cursor().cloned() {
                    Some(cursor) if cursor.is_at_text_end(doc) => {
                        let host = cursor.host();
                        self.notify(EditorEvent::Merge {
                            host,
                            direction: Direction::After,
                            cursor,
                        });
                        Ok(true)
                    }
                    _ => {
                        self.notify_change();
                        Ok(false)
                    }
                }
            }
            KeyStroke::Enter => {
                let Some(cursor) = self.force_cursor(doc)? else {
                    return Ok(false);
                };
                let host = cursor.host();
                if cursor.is_at_text_end(doc) {
                    self.notify(EditorEvent::Insert {
                        host,
                        direction: Direction::After,
                        cursor,
                    });
                } else if cursor.is_at_beginning(doc) {
                    self.notify(EditorEvent::Insert {
                        host,
                        direction: Direction::Before,
                        cursor,
                    });
                } else {
                    let before = cursor.content_before_html(doc)?;
                    let after = cursor.content_after_html(doc)?;
                    self.notify(EditorEvent::Split { host, before, after, cursor });
                }
                Ok(true)
            }
            KeyStroke::ShiftEnter => {
                let Some(cursor) = self.force_cursor(doc)? else {
                    return Ok(false);
                };
                let host = cursor.host();
                self.notify(EditorEvent::Newline { host, cursor });
                Ok(true)
            }
            KeyStroke::Character(_) => {
                self.notify_change();
                Ok(false)
            }
        }
    }

    /// Arrow key against a host boundary: a cursor that cannot move any
    /// further in that direction raises `switch`.
    fn dispatch_switch(
        &mut self,
        doc: &Document,
        event: &RawKeyEvent,
        direction: Direction,
    ) -> EditorResult<bool> {
        if event.has_modifier() {
            return Ok(false);
        }
        let Some(cursor) = self.watcher.current().as_cursor().cloned() else {
            return Ok(false);
        };
        let at_boundary = match direction {
            Direction::Before => cursor.is_at_beginning(doc),
            Direction::After => cursor.is_at_text_end(doc),
        };
        if !at_boundary {
            return Ok(false);
        }
        let host = cursor.host();
        self.notify(EditorEvent::Switch { host, direction, cursor });
        Ok(true)
    }

    /// Reduce the current container to a cursor, deleting selected
    /// content, and make the watcher reflect the result.
    fn force_cursor(&mut self, doc: &mut Document) -> EditorResult<Option<Cursor>> {
        let container = self.watcher.current().clone();
        let Some(cursor) = container.force_cursor(doc)? else {
            return Ok(None);
        };
        self.watcher
            .selection_changed(RangeContainer::Cursor(cursor.clone()), &mut self.events);
        Ok(Some(cursor))
    }

    fn notify_change(&mut self) {
        if let Some(host) = self.watcher.current().host() {
            self.notify(EditorEvent::Change { host });
        }
    }
}
