use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::view::ViewObject;

/// Identifies one registered handler on one `Emitter`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct HandlerId(u64);

struct Entry<T> {
    id: HandlerId,
    callback: Rc<RefCell<dyn FnMut(&T)>>,
}

/// An order-preserving, single-threaded handler registry.
///
/// `emit` snapshots the handler list before dispatch, so a handler may
/// subscribe or unsubscribe (including itself) mid-emit without skipping
/// or double-running other handlers. Nested emits are permitted.
pub struct Emitter<T> {
    entries: RefCell<Vec<Entry<T>>>,
    next_id: Cell<u64>,
}

impl<T> Emitter<T> {
    pub fn new() -> Self {
        Self {
            entries: RefCell::new(Vec::new()),
            next_id: Cell::new(0),
        }
    }

    pub fn on(&self, callback: impl FnMut(&T) + 'static) -> HandlerId {
        let id = HandlerId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.entries.borrow_mut().push(Entry {
            id,
            callback: Rc::new(RefCell::new(callback)),
        });
        id
    }

    /// Removes a handler by id. Removing an already-removed handler is a
    /// no-op.
    pub fn off(&self, id: HandlerId) {
        self.entries.borrow_mut().retain(|entry| entry.id != id);
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }

    pub fn handler_count(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn emit(&self, event: &T) {
        let snapshot: Vec<(HandlerId, Rc<RefCell<dyn FnMut(&T)>>)> = self
            .entries
            .borrow()
            .iter()
            .map(|entry| (entry.id, entry.callback.clone()))
            .collect();
        for (id, callback) in snapshot {
            let still_registered = self
                .entries
                .borrow()
                .iter()
                .any(|entry| entry.id == id);
            if still_registered {
                (callback.borrow_mut())(event);
            }
        }
    }
}

impl<T> Default for Emitter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Emitter<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Emitter")
            .field("handlers", &self.handler_count())
            .finish()
    }
}

pub const DEFAULT_CHILD_PREFIX: &str = "childview:";

/// The lifecycle vocabulary observable on every view.
///
/// `Child` carries an event bubbled from a collection view's child,
/// with the originating child and the bubbling view's child-event
/// prefix. Each hop keeps its own prefix, so an event bubbled through
/// collection views with different prefixes names every level
/// faithfully.
#[derive(Clone)]
pub enum ViewEvent {
    BeforeRender,
    Render,
    BeforeAttach,
    Attach,
    BeforeDetach,
    Detach,
    BeforeShow,
    Show,
    BeforeDestroy,
    Destroy,
    Child(Rc<dyn ViewObject>, Rc<ViewEvent>, Rc<str>),
}

impl ViewEvent {
    /// The conventional string name, with bubbled events namespaced by
    /// the prefix of the view that bubbled them.
    pub fn name(&self) -> String {
        match self {
            Self::BeforeRender => "before:render".to_owned(),
            Self::Render => "render".to_owned(),
            Self::BeforeAttach => "before:attach".to_owned(),
            Self::Attach => "attach".to_owned(),
            Self::BeforeDetach => "before:detach".to_owned(),
            Self::Detach => "detach".to_owned(),
            Self::BeforeShow => "before:show".to_owned(),
            Self::Show => "show".to_owned(),
            Self::BeforeDestroy => "before:destroy".to_owned(),
            Self::Destroy => "destroy".to_owned(),
            Self::Child(_, inner, prefix) => {
                format!("{}{}", prefix, inner.name())
            }
        }
    }
}

impl fmt::Debug for ViewEvent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.name())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    #[test]
    fn test_emit_in_registration_order() {
        let emitter = Emitter::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        let first = log.clone();
        emitter.on(move |value: &u32| first.borrow_mut().push(("first", *value)));
        let second = log.clone();
        emitter.on(move |value: &u32| second.borrow_mut().push(("second", *value)));

        emitter.emit(&1);
        emitter.emit(&2);

        assert_eq!(
            *log.borrow(),
            [("first", 1), ("second", 1), ("first", 2), ("second", 2)]
        );
    }

    #[test]
    fn test_off_is_idempotent() {
        let emitter = Emitter::new();
        let count = Rc::new(Cell::new(0));

        let counter = count.clone();
        let id = emitter.on(move |_: &()| counter.set(counter.get() + 1));

        emitter.emit(&());
        emitter.off(id);
        emitter.off(id);
        emitter.emit(&());

        assert_eq!(count.get(), 1);
        assert_eq!(emitter.handler_count(), 0);
    }

    #[test]
    fn test_handler_removed_mid_emit_does_not_run() {
        let emitter = Rc::new(Emitter::new());
        let log = Rc::new(RefCell::new(Vec::new()));

        let slot = Rc::new(Cell::new(None));

        let remover_log = log.clone();
        let remover_emitter = emitter.clone();
        let remover_slot = slot.clone();
        emitter.on(move |_: &()| {
            remover_log.borrow_mut().push("remover");
            if let Some(id) = remover_slot.take() {
                remover_emitter.off(id);
            }
        });

        let victim_log = log.clone();
        let id = emitter.on(move |_: &()| victim_log.borrow_mut().push("victim"));
        slot.set(Some(id));

        emitter.emit(&());
        emitter.emit(&());

        assert_eq!(*log.borrow(), ["remover", "remover"]);
    }

    #[test]
    fn test_subscription_during_emit_waits_for_next_emit() {
        let emitter = Rc::new(Emitter::new());
        let log = Rc::new(RefCell::new(Vec::new()));
        let installed = Rc::new(Cell::new(false));

        let outer_log = log.clone();
        let outer_emitter = emitter.clone();
        emitter.on(move |_: &()| {
            outer_log.borrow_mut().push("outer");
            if !installed.get() {
                installed.set(true);
                let inner_log = outer_log.clone();
                outer_emitter.on(move |_: &()| inner_log.borrow_mut().push("inner"));
            }
        });

        emitter.emit(&());
        assert_eq!(*log.borrow(), ["outer"]);

        emitter.emit(&());
        assert_eq!(*log.borrow(), ["outer", "outer", "inner"]);
    }

    #[test]
    fn test_event_names() {
        assert_eq!(ViewEvent::BeforeRender.name(), "before:render");
        assert_eq!(ViewEvent::Destroy.name(), "destroy");
        assert_eq!(ViewEvent::Show.name(), "show");
    }
}
