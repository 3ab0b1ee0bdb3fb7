use std::cell::RefCell;
use std::rc::Rc;

use crate::event::Emitter;

/// Tracks a view's subscriptions on external evented entities (models,
/// record sets) behind type-erased unbind thunks.
///
/// Emitters are held weakly: a dropped entity never keeps the binder's
/// bookkeeping alive, and unbinding after the entity is gone is a no-op.
#[derive(Default)]
pub struct EntityBinder {
    unbinders: RefCell<Vec<Box<dyn Fn()>>>,
}

impl EntityBinder {
    pub fn new() -> EntityBinder {
        Self::default()
    }

    pub fn bind<T: 'static>(
        &self,
        emitter: &Rc<Emitter<T>>,
        handler: impl FnMut(&T) + 'static,
    ) {
        let id = emitter.on(handler);
        let weak = Rc::downgrade(emitter);
        self.unbinders.borrow_mut().push(Box::new(move || {
            if let Some(emitter) = weak.upgrade() {
                emitter.off(id);
            }
        }));
    }

    /// Detaches every binding. Idempotent.
    pub fn unbind_all(&self) {
        for unbind in self.unbinders.borrow_mut().drain(..) {
            unbind();
        }
    }

    pub fn binding_count(&self) -> usize {
        self.unbinders.borrow().len()
    }
}

impl Drop for EntityBinder {
    fn drop(&mut self) {
        self.unbind_all();
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    #[test]
    fn test_unbind_all_detaches_handlers() {
        let emitter = Rc::new(Emitter::new());
        let binder = EntityBinder::new();
        let count = Rc::new(Cell::new(0));

        let counter = count.clone();
        binder.bind(&emitter, move |_: &()| counter.set(counter.get() + 1));

        emitter.emit(&());
        binder.unbind_all();
        binder.unbind_all();
        emitter.emit(&());

        assert_eq!(count.get(), 1);
        assert_eq!(emitter.handler_count(), 0);
        assert_eq!(binder.binding_count(), 0);
    }

    #[test]
    fn test_unbind_after_entity_dropped() {
        let binder = EntityBinder::new();
        {
            let emitter = Rc::new(Emitter::new());
            binder.bind(&emitter, |_: &u32| {});
        }
        binder.unbind_all();
    }

    #[test]
    fn test_drop_unbinds() {
        let emitter = Rc::new(Emitter::new());
        {
            let binder = EntityBinder::new();
            binder.bind(&emitter, |_: &()| {});
            assert_eq!(emitter.handler_count(), 1);
        }
        assert_eq!(emitter.handler_count(), 0);
    }
}
