use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::rc::Rc;

use log::{debug, error, trace, warn};

use crate::child_container::{ChildEntry, ChildViewContainer};
use crate::dom::{Dom, NodeId, RenderBuffer};
use crate::error::ViewError;
use crate::event::{Emitter, HandlerId, ViewEvent, DEFAULT_CHILD_PREFIX};
use crate::lifecycle::{LifecycleCell, LifecycleFlags};
use crate::record::{Record, RecordSet, RecordSetEvent};
use crate::template::{Renderer, Template};
use crate::view::{ViewBuilder, ViewObject};

pub type ChildFactory = Rc<dyn Fn(&Rc<dyn Record>) -> Result<Rc<dyn ViewObject>, ViewError>>;
pub type EmptyFactory = Rc<dyn Fn() -> Result<Rc<dyn ViewObject>, ViewError>>;
pub type Filter = Rc<dyn Fn(&dyn Record, usize) -> bool>;
pub type Comparator = Rc<dyn Fn(&dyn Record, &dyn Record) -> Ordering>;

/// The reconciliation engine: an ordered, keyed set of child views
/// mirroring an external record set.
///
/// A full `render` is tear-down-and-rebuild through a `RenderBuffer`, so
/// N child renders cost one live-DOM write. Incremental add/remove touch
/// one child directly, and `Sorted` moves existing elements without
/// recreating any child.
pub struct CollectionView {
    dom: Rc<dyn Dom>,
    el: NodeId,
    records: Rc<dyn RecordSet>,
    child_factory: Option<ChildFactory>,
    empty_factory: Option<EmptyFactory>,
    filter: Option<Filter>,
    comparator: Option<Comparator>,
    child_event_prefix: String,
    container: ChildViewContainer,
    empty_view: RefCell<Option<Rc<dyn ViewObject>>>,
    events: Rc<Emitter<ViewEvent>>,
    flags: LifecycleCell,
    subscription: Cell<Option<HandlerId>>,
    last_error: RefCell<Option<ViewError>>,
}

impl CollectionView {
    pub fn container(&self) -> &ChildViewContainer {
        &self.container
    }

    pub fn records(&self) -> &Rc<dyn RecordSet> {
        &self.records
    }

    pub fn child_event_prefix(&self) -> &str {
        &self.child_event_prefix
    }

    pub fn current_empty_view(&self) -> Option<Rc<dyn ViewObject>> {
        self.empty_view.borrow().clone()
    }

    /// Takes the most recent failure raised by a record-set
    /// notification, clearing the latch.
    ///
    /// Record-set mutations reach this view through a subscription
    /// callback, which has no caller to return an error to; failures
    /// are logged and latched here so the application can still
    /// observe them.
    pub fn take_last_error(&self) -> Option<ViewError> {
        self.last_error.borrow_mut().take()
    }

    /// The record set's order with the filter applied, then the
    /// comparator over the survivors.
    fn visible_records(&self) -> Vec<Rc<dyn Record>> {
        let mut visible: Vec<Rc<dyn Record>> = self
            .records
            .records()
            .into_iter()
            .enumerate()
            .filter(|(index, record)| match &self.filter {
                Some(filter) => filter(record.as_ref(), *index),
                None => true,
            })
            .map(|(_, record)| record)
            .collect();
        if let Some(compare) = &self.comparator {
            visible.sort_by(|a, b| compare(a.as_ref(), b.as_ref()));
        }
        visible
    }

    /// Constructs the child view for `record` and wires event bubbling.
    /// The factory runs fresh per record so heterogeneous child types
    /// are supported.
    fn build_child(&self, record: &Rc<dyn Record>) -> Result<Rc<ChildEntry>, ViewError> {
        let factory = self
            .child_factory
            .as_ref()
            .ok_or_else(|| ViewError::MissingChildView(record.id()))?;
        let view = factory(record)?;
        if view.flags().is_destroyed() {
            return Err(ViewError::InvalidChildView(record.id()));
        }

        let parent_events = Rc::downgrade(&self.events);
        let child_weak = Rc::downgrade(&view);
        let prefix: Rc<str> = Rc::from(self.child_event_prefix.as_str());
        let bubble = view.events().on(move |event: &ViewEvent| {
            if let (Some(parent), Some(child)) = (parent_events.upgrade(), child_weak.upgrade()) {
                let bubbled = ViewEvent::Child(child, Rc::new(event.clone()), prefix.clone());
                trace!("bubble {}", bubbled.name());
                parent.emit(&bubbled);
            }
        });

        Ok(Rc::new(ChildEntry {
            record: record.clone(),
            view,
            index: Cell::new(0),
            bubble,
        }))
    }

    fn fill_buffer(
        &self,
        buffer: &RenderBuffer,
        visible: &[Rc<dyn Record>],
    ) -> Result<(), ViewError> {
        if visible.is_empty() {
            if let Some(factory) = &self.empty_factory {
                let view = factory()?;
                view.render()?;
                buffer.append(view.el());
                *self.empty_view.borrow_mut() = Some(view);
            }
            return Ok(());
        }
        for (position, record) in visible.iter().enumerate() {
            let entry = self.build_child(record)?;
            self.container.add(entry.clone(), position)?;
            entry.view.render()?;
            buffer.append(entry.view.el());
        }
        Ok(())
    }

    /// Destroys every child (and the empty placeholder), tearing down
    /// the per-child bubbling subscriptions.
    fn destroy_children(&self) {
        for entry in self.container.clear() {
            entry.view.events().off(entry.bubble);
            entry.view.destroy();
        }
        if let Some(view) = self.empty_view.borrow_mut().take() {
            view.destroy();
        }
    }

    fn show_empty_direct(&self) -> Result<(), ViewError> {
        if let Some(factory) = &self.empty_factory {
            let view = factory()?;
            view.render()?;
            self.dom.append_child(self.el, view.el());
            if self.flags.is_attached() {
                view.propagate_attach();
            }
            *self.empty_view.borrow_mut() = Some(view);
        }
        Ok(())
    }

    /// The visual position for a freshly visible record: comparator order
    /// when one is set, otherwise the number of visible records preceding
    /// `at_index` in the record set.
    fn insert_position(&self, record: &Rc<dyn Record>, at_index: usize) -> usize {
        match &self.comparator {
            Some(compare) => self
                .container
                .iterate()
                .take_while(|entry| {
                    compare(entry.record.as_ref(), record.as_ref()) != Ordering::Greater
                })
                .count(),
            None => self
                .records
                .records()
                .iter()
                .take(at_index)
                .filter(|earlier| self.container.find_by_id(earlier.id()).is_some())
                .count(),
        }
    }

    /// Handles `Added`. Filtered-out records are ignored; otherwise
    /// exactly one child is built and inserted directly, without
    /// buffering.
    pub fn on_record_added(
        &self,
        record: &Rc<dyn Record>,
        at_index: usize,
    ) -> Result<(), ViewError> {
        if self.flags.is_destroyed() {
            return Err(ViewError::AlreadyDestroyed);
        }
        if !self.flags.is_rendered() {
            return Ok(());
        }
        if let Some(filter) = &self.filter {
            if !filter(record.as_ref(), at_index) {
                return Ok(());
            }
        }
        if self.container.find_by_id(record.id()).is_some() {
            return Err(ViewError::DuplicateChild(record.id()));
        }

        // The first visible child displaces the empty placeholder.
        if self.container.is_empty() {
            if let Some(view) = self.empty_view.borrow_mut().take() {
                view.destroy();
            }
        }

        let entry = self.build_child(record)?;
        let position = self.insert_position(record, at_index);
        self.container.add(entry.clone(), position)?;
        entry.view.render()?;
        self.dom.insert_child(self.el, entry.view.el(), position);
        if self.flags.is_attached() {
            entry.view.propagate_attach();
        }
        debug!(
            "added child for record {:?} at position {}",
            record.id(),
            position
        );
        Ok(())
    }

    /// Handles `Removed`. Unknown records are a no-op; removal can race
    /// with prior filtering.
    pub fn on_record_removed(&self, record: &Rc<dyn Record>) -> Result<(), ViewError> {
        if self.flags.is_destroyed() {
            return Err(ViewError::AlreadyDestroyed);
        }
        if !self.flags.is_rendered() {
            return Ok(());
        }
        let Some(entry) = self.container.remove(record.id()) else {
            return Ok(());
        };
        entry.view.events().off(entry.bubble);
        entry.view.destroy();
        debug!("removed child for record {:?}", record.id());

        if self.container.is_empty() {
            self.show_empty_direct()?;
        }
        Ok(())
    }

    /// Handles `Reset`: discard everything and render again in full.
    pub fn on_reset(&self) -> Result<(), ViewError> {
        if !self.flags.is_rendered() {
            if self.flags.is_destroyed() {
                return Err(ViewError::AlreadyDestroyed);
            }
            return Ok(());
        }
        self.render()
    }

    /// Handles `Sorted`: re-orders the container and moves the existing
    /// child elements into the new order. No child is destroyed or
    /// recreated.
    pub fn on_sort(&self) -> Result<(), ViewError> {
        if self.flags.is_destroyed() {
            return Err(ViewError::AlreadyDestroyed);
        }
        if !self.flags.is_rendered() {
            return Ok(());
        }
        match &self.comparator {
            Some(compare) => {
                let compare = compare.clone();
                self.container
                    .reorder_by(|a, b| compare(a.record.as_ref(), b.record.as_ref()));
            }
            None => {
                let set_order: Vec<_> =
                    self.records.records().iter().map(|record| record.id()).collect();
                self.container.reorder_by(|a, b| {
                    let rank = |entry: &ChildEntry| {
                        set_order
                            .iter()
                            .position(|id| *id == entry.id())
                            .unwrap_or(usize::MAX)
                    };
                    rank(a).cmp(&rank(b))
                });
            }
        }
        for entry in self.container.iterate() {
            self.dom.append_child(self.el, entry.view.el());
        }
        debug!("reordered {} children in place", self.container.len());
        Ok(())
    }

    fn handle_record_set_event(&self, event: &RecordSetEvent) {
        if self.flags.is_destroyed() {
            // Unreachable once destroy has unsubscribed; never touch
            // freed state from a late notification.
            warn!("record-set event on a destroyed collection view");
            return;
        }
        if !self.flags.is_rendered() {
            return;
        }
        let result = match event {
            RecordSetEvent::Added { record, index } => self.on_record_added(record, *index),
            RecordSetEvent::Removed { record } => self.on_record_removed(record),
            RecordSetEvent::Reset => self.on_reset(),
            RecordSetEvent::Sorted => self.on_sort(),
        };
        if let Err(err) = result {
            error!("record-set mutation failed: {}", err);
            *self.last_error.borrow_mut() = Some(err);
        }
    }
}

impl ViewObject for CollectionView {
    fn el(&self) -> NodeId {
        self.el
    }

    fn dom(&self) -> &Rc<dyn Dom> {
        &self.dom
    }

    fn events(&self) -> &Rc<Emitter<ViewEvent>> {
        &self.events
    }

    fn flags(&self) -> &LifecycleCell {
        &self.flags
    }

    fn render(&self) -> Result<(), ViewError> {
        if self.flags.is_destroyed() {
            return Err(ViewError::AlreadyDestroyed);
        }
        debug!(
            "render collection el={:?} with {} records",
            self.el,
            self.records.len()
        );
        self.events.emit(&ViewEvent::BeforeRender);

        // Tear down and rebuild; a full render never diffs.
        self.destroy_children();

        let visible = self.visible_records();
        let buffer = RenderBuffer::new(&self.dom);
        match self.fill_buffer(&buffer, &visible) {
            Ok(()) => buffer.flush_into(self.el),
            Err(err) => {
                buffer.discard();
                return Err(err);
            }
        }

        self.flags.insert(LifecycleFlags::RENDERED);
        if self.flags.is_attached() {
            for entry in self.container.iterate() {
                entry.view.propagate_attach();
            }
            if let Some(view) = self.current_empty_view() {
                view.propagate_attach();
            }
        }
        self.events.emit(&ViewEvent::Render);
        Ok(())
    }

    fn destroy(&self) {
        if self.flags.is_destroyed() {
            return;
        }
        debug!("destroy collection el={:?}", self.el);
        self.events.emit(&ViewEvent::BeforeDestroy);

        if let Some(id) = self.subscription.take() {
            self.records.events().off(id);
        }
        self.destroy_children();
        self.dom.detach(self.el);

        self.flags.insert(LifecycleFlags::DESTROYED);
        self.events.emit(&ViewEvent::Destroy);
    }

    fn propagate_attach(&self) {
        self.events.emit(&ViewEvent::BeforeAttach);
        for entry in self.container.iterate() {
            entry.view.propagate_attach();
        }
        if let Some(view) = self.current_empty_view() {
            view.propagate_attach();
        }
        self.flags.insert(LifecycleFlags::ATTACHED);
        self.events.emit(&ViewEvent::Attach);
    }

    fn propagate_detach(&self) {
        self.events.emit(&ViewEvent::BeforeDetach);
        for entry in self.container.iterate() {
            entry.view.propagate_detach();
        }
        if let Some(view) = self.current_empty_view() {
            view.propagate_detach();
        }
        self.flags.remove(LifecycleFlags::ATTACHED);
        self.events.emit(&ViewEvent::Detach);
    }
}

/// Assembles a `CollectionView` and installs its record-set subscription.
///
/// Mutations arriving before the first `render` are ignored; the record
/// set is re-read in full when rendering starts.
pub struct CollectionViewBuilder {
    dom: Rc<dyn Dom>,
    records: Rc<dyn RecordSet>,
    tag: String,
    child_factory: Option<ChildFactory>,
    child_template: Option<(Renderer, Template, String)>,
    empty_factory: Option<EmptyFactory>,
    filter: Option<Filter>,
    comparator: Option<Comparator>,
    child_event_prefix: String,
}

impl CollectionViewBuilder {
    pub fn new(dom: Rc<dyn Dom>, records: Rc<dyn RecordSet>) -> CollectionViewBuilder {
        CollectionViewBuilder {
            dom,
            records,
            tag: "div".to_owned(),
            child_factory: None,
            child_template: None,
            empty_factory: None,
            filter: None,
            comparator: None,
            child_event_prefix: DEFAULT_CHILD_PREFIX.to_owned(),
        }
    }

    pub fn tag(mut self, tag: &str) -> Self {
        self.tag = tag.to_owned();
        self
    }

    pub fn child_view(
        mut self,
        factory: impl Fn(&Rc<dyn Record>) -> Result<Rc<dyn ViewObject>, ViewError> + 'static,
    ) -> Self {
        self.child_factory = Some(Rc::new(factory));
        self
    }

    /// Shorthand for homogeneous children: each record gets a plain
    /// `View` with `template`, rooted at a `child_tag` element.
    pub fn child_template(mut self, renderer: Renderer, template: Template, child_tag: &str) -> Self {
        self.child_template = Some((renderer, template, child_tag.to_owned()));
        self
    }

    pub fn empty_view(
        mut self,
        factory: impl Fn() -> Result<Rc<dyn ViewObject>, ViewError> + 'static,
    ) -> Self {
        self.empty_factory = Some(Rc::new(factory));
        self
    }

    pub fn filter(mut self, filter: impl Fn(&dyn Record, usize) -> bool + 'static) -> Self {
        self.filter = Some(Rc::new(filter));
        self
    }

    pub fn comparator(
        mut self,
        compare: impl Fn(&dyn Record, &dyn Record) -> Ordering + 'static,
    ) -> Self {
        self.comparator = Some(Rc::new(compare));
        self
    }

    pub fn child_event_prefix(mut self, prefix: &str) -> Self {
        self.child_event_prefix = prefix.to_owned();
        self
    }

    pub fn build(self) -> Rc<CollectionView> {
        let CollectionViewBuilder {
            dom,
            records,
            tag,
            child_factory,
            child_template,
            empty_factory,
            filter,
            comparator,
            child_event_prefix,
        } = self;

        let child_factory = child_factory.or_else(|| {
            child_template.map(|(renderer, template, child_tag)| {
                let dom = dom.clone();
                let factory: ChildFactory = Rc::new(move |record: &Rc<dyn Record>| {
                    Ok(ViewBuilder::new(dom.clone(), renderer.clone())
                        .tag(&child_tag)
                        .template(template.clone())
                        .record(record.clone())
                        .build() as Rc<dyn ViewObject>)
                });
                factory
            })
        });

        let el = dom.create_element(&tag);
        let view = Rc::new(CollectionView {
            dom,
            el,
            records,
            child_factory,
            empty_factory,
            filter,
            comparator,
            child_event_prefix,
            container: ChildViewContainer::new(),
            empty_view: RefCell::new(None),
            events: Rc::new(Emitter::new()),
            flags: LifecycleCell::new(),
            subscription: Cell::new(None),
            last_error: RefCell::new(None),
        });

        let weak = Rc::downgrade(&view);
        let id = view.records.events().on(move |event: &RecordSetEvent| {
            if let Some(view) = weak.upgrade() {
                view.handle_record_set_event(event);
            }
        });
        view.subscription.set(Some(id));
        view
    }
}
