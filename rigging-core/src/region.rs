use std::cell::RefCell;
use std::rc::Rc;

use log::trace;

use crate::dom::{Dom, NodeId};
use crate::error::ViewError;
use crate::event::ViewEvent;
use crate::view::ViewObject;

/// A single-slot container showing exactly one view at a time inside a
/// target element.
pub struct Region {
    dom: Rc<dyn Dom>,
    el: NodeId,
    current: RefCell<Option<Rc<dyn ViewObject>>>,
}

impl Region {
    pub fn new(dom: Rc<dyn Dom>, el: Option<NodeId>) -> Result<Region, ViewError> {
        match el {
            Some(el) => Ok(Region {
                dom,
                el,
                current: RefCell::new(None),
            }),
            None => Err(ViewError::NoElement),
        }
    }

    pub fn el(&self) -> NodeId {
        self.el
    }

    pub fn current(&self) -> Option<Rc<dyn ViewObject>> {
        self.current.borrow().clone()
    }

    /// Replaces the current occupant with `view`: the old occupant is
    /// destroyed first, the new one is rendered if it is not already,
    /// inserted, and walked through the attach/show sequence. There is
    /// never a moment with two live occupants.
    pub fn show(&self, view: Rc<dyn ViewObject>) -> Result<(), ViewError> {
        if view.flags().is_destroyed() {
            return Err(ViewError::AlreadyDestroyed);
        }
        self.empty();

        if !view.flags().is_rendered() {
            view.render()?;
        }
        trace!("region {:?} shows el={:?}", self.el, view.el());
        self.dom.append_child(self.el, view.el());
        if self.dom.is_connected(self.el) {
            view.propagate_attach();
        }
        view.events().emit(&ViewEvent::BeforeShow);
        view.events().emit(&ViewEvent::Show);

        *self.current.borrow_mut() = Some(view);
        Ok(())
    }

    /// Destroys the current occupant and clears the slot. No-op when
    /// already empty.
    pub fn empty(&self) {
        if let Some(view) = self.current.borrow_mut().take() {
            view.destroy();
        }
    }
}
