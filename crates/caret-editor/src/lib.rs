//! Rich-text editing toolkit over the `caret-dom` range model.
//!
//! The crate layers editing semantics on top of the arena DOM: cursors
//! and selections tied to an editable host element, content formatting
//! and normalization, a keyboard/selection dispatcher emitting semantic
//! events, and a paste pipeline.

pub mod clipboard;
pub mod config;
pub mod container;
pub mod content;
pub mod cursor;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod host;
pub mod keyboard;
pub mod selection;

// Re-export key types for easier usage
pub use clipboard::{DefaultPasteFilter, PasteFilter};
pub use config::EditorConfig;
pub use container::RangeContainer;
pub use cursor::Cursor;
pub use dispatcher::{
    ClipboardAction, Direction, Dispatcher, EditorEvent, SelectionWatcher,
};
pub use error::{EditorError, EditorResult};
pub use events::{Eventable, ListenerId, Propagation};
pub use keyboard::{Key, KeyStroke, Keyboard, RawKeyEvent};
pub use selection::TextSelection;
