//! Publish/subscribe registry for editor notifications.
//!
//! Listeners subscribe per event name and are notified newest-first; a
//! listener can stop further propagation for an event. Closures have no
//! identity in Rust, so `on` hands back a token used for individual
//! removal.

use std::collections::HashMap;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Propagation {
    Continue,
    Stop,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Listener<E> {
    id: ListenerId,
    callback: Box<dyn FnMut(&E) -> Propagation>,
}

/// Event registry parameterized over the payload type.
pub struct Eventable<E> {
    listeners: HashMap<String, Vec<Listener<E>>>,
    next_id: u64,
}

impl<E> Default for Eventable<E> {
    fn default() -> Self {
        Self {
            listeners: HashMap::new(),
            next_id: 0,
        }
    }
}

impl<E> Eventable<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(
        &mut self,
        event: &str,
        callback: impl FnMut(&E) -> Propagation + 'static,
    ) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.entry(event.to_string()).or_default().push(Listener {
            id,
            callback: Box::new(callback),
        });
        id
    }

    /// Remove one listener by its token.
    pub fn off(&mut self, event: &str, id: ListenerId) {
        if let Some(listeners) = self.listeners.get_mut(event) {
            listeners.retain(|listener| listener.id != id);
        }
    }

    /// Remove every listener of one event.
    pub fn off_event(&mut self, event: &str) {
        self.listeners.remove(event);
    }

    /// Remove everything.
    pub fn off_all(&mut self) {
        self.listeners.clear();
    }

    /// Notify listeners of `event`, newest registration first. Returns how
    /// many listeners ran.
    pub fn notify(&mut self, event: &str, payload: &E) -> usize {
        let Some(listeners) = self.listeners.get_mut(event) else {
            return 0;
        };
        let mut ran = 0;
        for listener in listeners.iter_mut().rev() {
            ran += 1;
            if (listener.callback)(payload) == Propagation::Stop {
                break;
            }
        }
        ran
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn newest_listener_runs_first_and_can_stop() {
        let mut events: Eventable<String> = Eventable::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        let first = log.clone();
        events.on("change", move |payload: &String| {
            first.borrow_mut().push(format!("first:{payload}"));
            Propagation::Continue
        });
        let second = log.clone();
        events.on("change", move |payload: &String| {
            second.borrow_mut().push(format!("second:{payload}"));
            Propagation::Stop
        });

        let ran = events.notify("change", &"x".to_string());
        assert_eq!(ran, 1);
        assert_eq!(*log.borrow(), vec!["second:x"]);
    }

    #[test]
    fn off_variants_remove_the_right_listeners() {
        let mut events: Eventable<()> = Eventable::new();
        let id = events.on("a", |_| Propagation::Continue);
        events.on("a", |_| Propagation::Continue);
        events.on("b", |_| Propagation::Continue);

        events.off("a", id);
        assert_eq!(events.notify("a", &()), 1);

        events.off_event("a");
        assert_eq!(events.notify("a", &()), 0);
        assert_eq!(events.notify("b", &()), 1);

        events.off_all();
        assert_eq!(events.notify("b", &()), 0);
    }
}
