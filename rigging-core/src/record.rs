use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::event::Emitter;

/// The stable unique identifier of a record. Unique within one record set
/// at any instant.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct RecordId(pub u64);

/// Emitted by a record when one of its attributes is written.
#[derive(Clone, Debug)]
pub struct RecordChange {
    pub key: String,
    pub value: String,
}

/// An externally-owned unit of data. The view layer only observes records;
/// it never mutates them.
pub trait Record {
    fn id(&self) -> RecordId;

    fn get(&self, key: &str) -> Option<String>;

    /// A snapshot of the attribute bag, as fed to templates.
    fn attributes(&self) -> BTreeMap<String, String>;

    fn changed(&self) -> &Rc<Emitter<RecordChange>>;
}

/// The four mutation notifications a record set emits.
#[derive(Clone)]
pub enum RecordSetEvent {
    Added { record: Rc<dyn Record>, index: usize },
    Removed { record: Rc<dyn Record> },
    Reset,
    Sorted,
}

/// An external ordered, keyed collection of records.
pub trait RecordSet {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get(&self, index: usize) -> Option<Rc<dyn Record>>;

    fn find(&self, id: RecordId) -> Option<Rc<dyn Record>>;

    /// A snapshot of all records in natural order.
    fn records(&self) -> Vec<Rc<dyn Record>>;

    fn events(&self) -> &Rc<Emitter<RecordSetEvent>>;
}

thread_local! {
    static NEXT_RECORD_ID: Cell<u64> = Cell::new(0);
}

fn next_record_id() -> RecordId {
    NEXT_RECORD_ID.with(|next| {
        let id = next.get();
        next.set(id + 1);
        RecordId(id)
    })
}

/// A plain attribute-bag record with an auto-assigned identifier.
pub struct ObjectRecord {
    id: RecordId,
    attributes: RefCell<BTreeMap<String, String>>,
    changed: Rc<Emitter<RecordChange>>,
}

impl ObjectRecord {
    pub fn new() -> ObjectRecord {
        ObjectRecord {
            id: next_record_id(),
            attributes: RefCell::new(BTreeMap::new()),
            changed: Rc::new(Emitter::new()),
        }
    }

    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> ObjectRecord {
        let record = Self::new();
        {
            let mut attributes = record.attributes.borrow_mut();
            for (key, value) in pairs {
                attributes.insert(key.to_owned(), value.to_owned());
            }
        }
        record
    }

    pub fn set(&self, key: &str, value: &str) {
        self.attributes
            .borrow_mut()
            .insert(key.to_owned(), value.to_owned());
        self.changed.emit(&RecordChange {
            key: key.to_owned(),
            value: value.to_owned(),
        });
    }
}

impl Default for ObjectRecord {
    fn default() -> Self {
        Self::new()
    }
}

impl Record for ObjectRecord {
    fn id(&self) -> RecordId {
        self.id
    }

    fn get(&self, key: &str) -> Option<String> {
        self.attributes.borrow().get(key).cloned()
    }

    fn attributes(&self) -> BTreeMap<String, String> {
        self.attributes.borrow().clone()
    }

    fn changed(&self) -> &Rc<Emitter<RecordChange>> {
        &self.changed
    }
}

/// An ordered in-memory record set emitting all four mutation
/// notifications synchronously.
pub struct RecordStore {
    records: RefCell<Vec<Rc<dyn Record>>>,
    events: Rc<Emitter<RecordSetEvent>>,
}

impl RecordStore {
    pub fn new() -> RecordStore {
        RecordStore {
            records: RefCell::new(Vec::new()),
            events: Rc::new(Emitter::new()),
        }
    }

    pub fn add(&self, record: Rc<dyn Record>) {
        let index = self.records.borrow().len();
        self.add_at(record, index);
    }

    pub fn add_at(&self, record: Rc<dyn Record>, index: usize) {
        self.records.borrow_mut().insert(index, record.clone());
        self.events.emit(&RecordSetEvent::Added { record, index });
    }

    pub fn remove(&self, id: RecordId) -> Option<Rc<dyn Record>> {
        let removed = {
            let mut records = self.records.borrow_mut();
            let position = records.iter().position(|record| record.id() == id)?;
            records.remove(position)
        };
        self.events.emit(&RecordSetEvent::Removed {
            record: removed.clone(),
        });
        Some(removed)
    }

    pub fn reset(&self, records: Vec<Rc<dyn Record>>) {
        *self.records.borrow_mut() = records;
        self.events.emit(&RecordSetEvent::Reset);
    }

    pub fn sort_by(&self, compare: impl FnMut(&Rc<dyn Record>, &Rc<dyn Record>) -> Ordering) {
        self.records.borrow_mut().sort_by(compare);
        self.events.emit(&RecordSetEvent::Sorted);
    }
}

impl Default for RecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordSet for RecordStore {
    fn len(&self) -> usize {
        self.records.borrow().len()
    }

    fn get(&self, index: usize) -> Option<Rc<dyn Record>> {
        self.records.borrow().get(index).cloned()
    }

    fn find(&self, id: RecordId) -> Option<Rc<dyn Record>> {
        self.records
            .borrow()
            .iter()
            .find(|record| record.id() == id)
            .cloned()
    }

    fn records(&self) -> Vec<Rc<dyn Record>> {
        self.records.borrow().clone()
    }

    fn events(&self) -> &Rc<Emitter<RecordSetEvent>> {
        &self.events
    }
}
