//! Raw key events translated into the editor's semantic key vocabulary.

use crate::events::{Eventable, ListenerId, Propagation};

/// A raw key event as the embedding layer reports it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RawKeyEvent {
    pub key: Key,
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl RawKeyEvent {
    pub fn plain(key: Key) -> Self {
        Self {
            key,
            shift: false,
            ctrl: false,
            alt: false,
            meta: false,
        }
    }

    pub fn with_shift(key: Key) -> Self {
        Self {
            shift: true,
            ..Self::plain(key)
        }
    }

    pub fn has_modifier(&self) -> bool {
        self.shift || self.ctrl || self.alt || self.meta
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Key {
    Left,
    Up,
    Right,
    Down,
    Tab,
    Esc,
    Backspace,
    Delete,
    Enter,
    Shift,
    Ctrl,
    Alt,
    Meta,
    Character(char),
}

/// The semantic strokes the dispatcher reacts to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum KeyStroke {
    Left,
    Up,
    Right,
    Down,
    Tab,
    ShiftTab,
    Esc,
    Backspace,
    Delete,
    Enter,
    ShiftEnter,
    Character(char),
}

impl KeyStroke {
    pub fn name(&self) -> &'static str {
        match self {
            KeyStroke::Left => "left",
            KeyStroke::Up => "up",
            KeyStroke::Right => "right",
            KeyStroke::Down => "down",
            KeyStroke::Tab => "tab",
            KeyStroke::ShiftTab => "shift_tab",
            KeyStroke::Esc => "esc",
            KeyStroke::Backspace => "backspace",
            KeyStroke::Delete => "delete",
            KeyStroke::Enter => "enter",
            KeyStroke::ShiftEnter => "shift_enter",
            KeyStroke::Character(_) => "character",
        }
    }
}

/// Translate a raw event into a stroke. Modifier keys on their own are
/// swallowed; character strokes are reported only when the embedder asks
/// for them (hosts with working input notifications do not need them).
pub fn translate(event: &RawKeyEvent, notify_character: bool) -> Option<KeyStroke> {
    match event.key {
        Key::Left => Some(KeyStroke::Left),
        Key::Up => Some(KeyStroke::Up),
        Key::Right => Some(KeyStroke::Right),
        Key::Down => Some(KeyStroke::Down),
        Key::Tab => Some(if event.shift {
            KeyStroke::ShiftTab
        } else {
            KeyStroke::Tab
        }),
        Key::Esc => Some(KeyStroke::Esc),
        Key::Backspace => Some(KeyStroke::Backspace),
        Key::Delete => Some(KeyStroke::Delete),
        Key::Enter => Some(if event.shift {
            KeyStroke::ShiftEnter
        } else {
            KeyStroke::Enter
        }),
        Key::Shift | Key::Ctrl | Key::Alt | Key::Meta => None,
        Key::Character(ch) => notify_character.then_some(KeyStroke::Character(ch)),
    }
}

/// Keyboard frontend: translates raw events and notifies stroke listeners.
#[derive(Default)]
pub struct Keyboard {
    events: Eventable<KeyStroke>,
}

impl Keyboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(
        &mut self,
        stroke: &str,
        callback: impl FnMut(&KeyStroke) -> Propagation + 'static,
    ) -> ListenerId {
        self.events.on(stroke, callback)
    }

    pub fn off(&mut self, stroke: &str, id: ListenerId) {
        self.events.off(stroke, id);
    }

    /// Translate and fan out one raw event. The stroke is also returned so
    /// a caller can drive its own handling without subscribing.
    pub fn dispatch_key_event(
        &mut self,
        event: &RawKeyEvent,
        notify_character: bool,
    ) -> Option<KeyStroke> {
        let stroke = translate(event, notify_character)?;
        self.events.notify(stroke.name(), &stroke);
        Some(stroke)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[rstest]
    #[case(RawKeyEvent::plain(Key::Enter), Some(KeyStroke::Enter))]
    #[case(RawKeyEvent::with_shift(Key::Enter), Some(KeyStroke::ShiftEnter))]
    #[case(RawKeyEvent::plain(Key::Tab), Some(KeyStroke::Tab))]
    #[case(RawKeyEvent::with_shift(Key::Tab), Some(KeyStroke::ShiftTab))]
    #[case(RawKeyEvent::plain(Key::Shift), None)]
    #[case(RawKeyEvent::plain(Key::Meta), None)]
    fn translates_raw_events(#[case] event: RawKeyEvent, #[case] expected: Option<KeyStroke>) {
        assert_eq!(translate(&event, true), expected);
    }

    #[test]
    fn character_strokes_are_opt_in() {
        let event = RawKeyEvent::plain(Key::Character('x'));
        assert_eq!(translate(&event, true), Some(KeyStroke::Character('x')));
        assert_eq!(translate(&event, false), None);
    }

    #[test]
    fn dispatch_notifies_stroke_listeners() {
        let mut keyboard = Keyboard::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        keyboard.on("backspace", move |stroke| {
            sink.borrow_mut().push(*stroke);
            Propagation::Continue
        });

        let stroke = keyboard.dispatch_key_event(&RawKeyEvent::plain(Key::Backspace), false);
        assert_eq!(stroke, Some(KeyStroke::Backspace));
        assert_eq!(*seen.borrow(), vec![KeyStroke::Backspace]);
    }
}
