use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::dom::{Dom, DomEvent, ListenerId, NodeId};

/// Identifies one delegated binding within one `EventDelegator`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct BindingId(u64);

/// One delegated DOM event binding: fires for `event` when the dispatch
/// target (or any ancestor of it up to the root) matches `selector`, or
/// unconditionally when `selector` is `None`.
pub struct DomEventSpec {
    pub event: String,
    pub selector: Option<String>,
    pub handler: Rc<dyn Fn(&DomEvent)>,
}

struct Binding {
    id: BindingId,
    spec: DomEventSpec,
}

/// Delegated DOM event listeners scoped to one root element.
///
/// Installs at most one raw listener on the root regardless of how many
/// bindings are registered.
pub struct EventDelegator {
    dom: Rc<dyn Dom>,
    root: NodeId,
    bindings: Rc<RefCell<Vec<Binding>>>,
    listener: Cell<Option<ListenerId>>,
    next_id: Cell<u64>,
}

impl EventDelegator {
    pub fn new(dom: Rc<dyn Dom>, root: NodeId) -> EventDelegator {
        EventDelegator {
            dom,
            root,
            bindings: Rc::new(RefCell::new(Vec::new())),
            listener: Cell::new(None),
            next_id: Cell::new(0),
        }
    }

    pub fn delegate(
        &self,
        event: &str,
        selector: Option<&str>,
        handler: impl Fn(&DomEvent) + 'static,
    ) -> BindingId {
        self.ensure_listener();

        let id = BindingId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.bindings.borrow_mut().push(Binding {
            id,
            spec: DomEventSpec {
                event: event.to_owned(),
                selector: selector.map(str::to_owned),
                handler: Rc::new(handler),
            },
        });
        id
    }

    pub fn delegate_spec(&self, spec: DomEventSpec) -> BindingId {
        self.ensure_listener();

        let id = BindingId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.bindings.borrow_mut().push(Binding { id, spec });
        id
    }

    /// Removes one binding; removing it again is a no-op.
    pub fn undelegate(&self, id: BindingId) {
        self.bindings.borrow_mut().retain(|binding| binding.id != id);
    }

    /// Drops every binding and the root listener.
    pub fn undelegate_all(&self) {
        self.bindings.borrow_mut().clear();
        if let Some(listener) = self.listener.take() {
            self.dom.remove_listener(self.root, listener);
        }
    }

    pub fn binding_count(&self) -> usize {
        self.bindings.borrow().len()
    }

    fn ensure_listener(&self) {
        if self.listener.get().is_some() {
            return;
        }
        let dom = self.dom.clone();
        let root = self.root;
        let bindings = self.bindings.clone();
        let listener = self.dom.add_listener(
            root,
            Rc::new(move |event: &DomEvent| {
                let matched: Vec<Rc<dyn Fn(&DomEvent)>> = bindings
                    .borrow()
                    .iter()
                    .filter(|binding| binding.spec.event == event.name)
                    .filter(|binding| match &binding.spec.selector {
                        Some(selector) => {
                            selector_hit(dom.as_ref(), root, event.target, selector)
                        }
                        None => true,
                    })
                    .map(|binding| binding.spec.handler.clone())
                    .collect();
                for handler in matched {
                    handler(event);
                }
            }),
        );
        self.listener.set(Some(listener));
    }
}

impl Drop for EventDelegator {
    fn drop(&mut self) {
        self.undelegate_all();
    }
}

fn selector_hit(dom: &dyn Dom, root: NodeId, target: NodeId, selector: &str) -> bool {
    let mut current = Some(target);
    while let Some(node) = current {
        if dom.matches(node, selector) {
            return true;
        }
        if node == root {
            break;
        }
        current = dom.parent(node);
    }
    false
}
