use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::ViewError;
use crate::event::HandlerId;
use crate::record::{Record, RecordId};
use crate::view::ViewObject;

/// One live child of a collection view: the record it mirrors, the view
/// bound to it, its position in the current visible ordering, and the
/// bubbling subscription to tear down when the child goes away.
pub struct ChildEntry {
    pub record: Rc<dyn Record>,
    pub view: Rc<dyn ViewObject>,
    pub index: Cell<usize>,
    pub bubble: HandlerId,
}

impl ChildEntry {
    #[inline]
    pub fn id(&self) -> RecordId {
        self.record.id()
    }
}

/// Identifier-keyed ownership plus a derived visual ordering.
///
/// The map and the ordering always hold the same set of entries; at most
/// one entry exists per record identifier. The container never touches
/// the DOM; ordering the child elements is the collection view's job.
#[derive(Default)]
pub struct ChildViewContainer {
    by_id: RefCell<HashMap<RecordId, Rc<ChildEntry>>>,
    order: RefCell<Vec<Rc<ChildEntry>>>,
}

impl ChildViewContainer {
    pub fn new() -> ChildViewContainer {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.order.borrow().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.order.borrow().is_empty()
    }

    /// Inserts `entry` at `index` in the visual ordering.
    pub fn add(&self, entry: Rc<ChildEntry>, index: usize) -> Result<(), ViewError> {
        let id = entry.id();
        let mut by_id = self.by_id.borrow_mut();
        if by_id.contains_key(&id) {
            return Err(ViewError::DuplicateChild(id));
        }
        by_id.insert(id, entry.clone());

        let mut order = self.order.borrow_mut();
        let index = index.min(order.len());
        order.insert(index, entry);
        reindex(&order, index);
        Ok(())
    }

    /// Removes by identifier, re-indexing everything after it. Absent
    /// identifiers are a no-op so cleanup can race with filtering.
    pub fn remove(&self, id: RecordId) -> Option<Rc<ChildEntry>> {
        let entry = self.by_id.borrow_mut().remove(&id)?;
        let mut order = self.order.borrow_mut();
        if let Some(position) = order.iter().position(|other| other.id() == id) {
            order.remove(position);
            reindex(&order, position);
        }
        Some(entry)
    }

    #[inline]
    pub fn find_by_id(&self, id: RecordId) -> Option<Rc<ChildEntry>> {
        self.by_id.borrow().get(&id).cloned()
    }

    #[inline]
    pub fn find_by_record(&self, record: &dyn Record) -> Option<Rc<ChildEntry>> {
        self.find_by_id(record.id())
    }

    #[inline]
    pub fn find_by_index(&self, index: usize) -> Option<Rc<ChildEntry>> {
        self.order.borrow().get(index).cloned()
    }

    /// A restartable walk over the entries in current visual order.
    pub fn iterate(&self) -> impl Iterator<Item = Rc<ChildEntry>> {
        self.order.borrow().clone().into_iter()
    }

    /// Re-sorts the visual ordering in place without dropping any entry.
    pub fn reorder_by(&self, mut compare: impl FnMut(&ChildEntry, &ChildEntry) -> Ordering) {
        let mut order = self.order.borrow_mut();
        order.sort_by(|a, b| compare(a, b));
        reindex(&order, 0);
    }

    /// Drains every entry in visual order.
    pub fn clear(&self) -> Vec<Rc<ChildEntry>> {
        self.by_id.borrow_mut().clear();
        self.order.borrow_mut().drain(..).collect()
    }
}

fn reindex(order: &[Rc<ChildEntry>], from: usize) {
    for (index, entry) in order.iter().enumerate().skip(from) {
        entry.index.set(index);
    }
}
