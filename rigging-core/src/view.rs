use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use log::trace;

use crate::behavior::Behavior;
use crate::binder::EntityBinder;
use crate::delegate::{DomEventSpec, EventDelegator};
use crate::dom::{Dom, DomEvent, NodeId};
use crate::error::ViewError;
use crate::event::{Emitter, ViewEvent};
use crate::lifecycle::{LifecycleCell, LifecycleFlags};
use crate::record::{Record, RecordChange};
use crate::region::Region;
use crate::template::{Renderer, Template};

/// The capability set of anything a region or collection view can host.
///
/// Both `View` and `CollectionView` implement it, so collection views
/// nest arbitrarily. Handles are shared as `Rc<dyn ViewObject>`.
pub trait ViewObject {
    /// The root element of this view.
    fn el(&self) -> NodeId;

    fn dom(&self) -> &Rc<dyn Dom>;

    fn events(&self) -> &Rc<Emitter<ViewEvent>>;

    fn flags(&self) -> &LifecycleCell;

    fn render(&self) -> Result<(), ViewError>;

    /// Tears the view down. Idempotent; a second call changes nothing and
    /// emits nothing.
    fn destroy(&self);

    /// Announces attachment to the live document, depth-first:
    /// `BeforeAttach` parent-before-children, `Attach`
    /// children-before-parent.
    fn propagate_attach(&self);

    fn propagate_detach(&self);
}

/// A single rendered unit wrapping one root element: template markup, UI
/// lookups, DOM event delegation, entity-event bindings and named regions.
pub struct View {
    dom: Rc<dyn Dom>,
    renderer: Renderer,
    el: NodeId,
    template: Option<Template>,
    record: Option<Rc<dyn Record>>,
    events: Rc<Emitter<ViewEvent>>,
    flags: LifecycleCell,
    delegator: EventDelegator,
    binder: EntityBinder,
    ui_specs: Vec<(String, String)>,
    ui_cache: RefCell<HashMap<String, NodeId>>,
    region_specs: Vec<(String, String)>,
    regions: RefCell<HashMap<String, Rc<Region>>>,
}

impl View {
    pub fn record(&self) -> Option<&Rc<dyn Record>> {
        self.record.as_ref()
    }

    pub fn delegator(&self) -> &EventDelegator {
        &self.delegator
    }

    pub fn binder(&self) -> &EntityBinder {
        &self.binder
    }

    /// Resolves a declared `ui` lookup inside this view's element. Hits
    /// are cached until the next render.
    pub fn ui(&self, name: &str) -> Option<NodeId> {
        if let Some(node) = self.ui_cache.borrow().get(name) {
            return Some(*node);
        }
        let selector = self
            .ui_specs
            .iter()
            .find(|(spec_name, _)| spec_name == name)
            .map(|(_, selector)| selector.clone())?;
        let node = self.dom.query_selector(self.el, &selector)?;
        self.ui_cache.borrow_mut().insert(name.to_owned(), node);
        Some(node)
    }

    /// Resolves a named region against the current markup. The region is
    /// cached until the next render replaces its target; a selector with
    /// no match surfaces `NoElement`.
    pub fn region(&self, name: &str) -> Result<Rc<Region>, ViewError> {
        if let Some(region) = self.regions.borrow().get(name) {
            return Ok(region.clone());
        }
        let selector = self
            .region_specs
            .iter()
            .find(|(spec_name, _)| spec_name == name)
            .map(|(_, selector)| selector.clone())
            .ok_or(ViewError::NoElement)?;
        let target = self.dom.query_selector(self.el, &selector);
        let region = Rc::new(Region::new(self.dom.clone(), target)?);
        self.regions.borrow_mut().insert(name.to_owned(), region.clone());
        Ok(region)
    }

    fn drain_regions(&self) -> Vec<Rc<Region>> {
        self.regions
            .borrow_mut()
            .drain()
            .map(|(_, region)| region)
            .collect()
    }

    fn region_occupants(&self) -> Vec<Rc<dyn ViewObject>> {
        self.regions
            .borrow()
            .values()
            .filter_map(|region| region.current())
            .collect()
    }
}

impl ViewObject for View {
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
        trace!("render view el={:?}", self.el);
        self.events.emit(&ViewEvent::BeforeRender);

        // The previous cycle's region contents die before their targets
        // are replaced by the new markup.
        for region in self.drain_regions() {
            region.empty();
        }

        if let Some(template) = &self.template {
            let data = self
                .record
                .as_ref()
                .map(|record| record.attributes())
                .unwrap_or_default();
            let markup = self.renderer.render(template, &data)?;
            self.dom.set_inner_html(self.el, &markup);
        }
        self.ui_cache.borrow_mut().clear();

        self.flags.insert(LifecycleFlags::RENDERED);
        self.events.emit(&ViewEvent::Render);
        Ok(())
    }

    fn destroy(&self) {
        if self.flags.is_destroyed() {
            return;
        }
        trace!("destroy view el={:?}", self.el);
        self.events.emit(&ViewEvent::BeforeDestroy);

        // Children go down before the parent announces completion.
        for region in self.drain_regions() {
            region.empty();
        }

        self.dom.detach(self.el);
        self.delegator.undelegate_all();
        self.binder.unbind_all();

        self.flags.insert(LifecycleFlags::DESTROYED);
        self.events.emit(&ViewEvent::Destroy);
    }

    fn propagate_attach(&self) {
        self.events.emit(&ViewEvent::BeforeAttach);
        for occupant in self.region_occupants() {
            occupant.propagate_attach();
        }
        self.flags.insert(LifecycleFlags::ATTACHED);
        self.events.emit(&ViewEvent::Attach);
    }

    fn propagate_detach(&self) {
        self.events.emit(&ViewEvent::BeforeDetach);
        for occupant in self.region_occupants() {
            occupant.propagate_detach();
        }
        self.flags.remove(LifecycleFlags::ATTACHED);
        self.events.emit(&ViewEvent::Detach);
    }
}

/// Assembles a `View`: element tag, template, bound record, `ui` lookups,
/// delegated DOM events, lifecycle hooks, regions and behaviors are all
/// declared up front so the dispatch tables are fixed at build time.
pub struct ViewBuilder {
    dom: Rc<dyn Dom>,
    renderer: Renderer,
    tag: String,
    template: Option<Template>,
    record: Option<Rc<dyn Record>>,
    ui_specs: Vec<(String, String)>,
    region_specs: Vec<(String, String)>,
    dom_events: Vec<DomEventSpec>,
    hooks: Vec<Box<dyn FnMut(&ViewEvent)>>,
    record_change_handlers: Vec<Box<dyn FnMut(&RecordChange)>>,
    behaviors: Vec<Rc<dyn Behavior>>,
}

impl ViewBuilder {
    pub fn new(dom: Rc<dyn Dom>, renderer: Renderer) -> ViewBuilder {
        ViewBuilder {
            dom,
            renderer,
            tag: "div".to_owned(),
            template: None,
            record: None,
            ui_specs: Vec::new(),
            region_specs: Vec::new(),
            dom_events: Vec::new(),
            hooks: Vec::new(),
            record_change_handlers: Vec::new(),
            behaviors: Vec::new(),
        }
    }

    pub fn tag(mut self, tag: &str) -> Self {
        self.tag = tag.to_owned();
        self
    }

    pub fn template(mut self, template: Template) -> Self {
        self.template = Some(template);
        self
    }

    pub fn record(mut self, record: Rc<dyn Record>) -> Self {
        self.record = Some(record);
        self
    }

    pub fn ui(mut self, name: &str, selector: &str) -> Self {
        self.ui_specs.push((name.to_owned(), selector.to_owned()));
        self
    }

    pub fn region(mut self, name: &str, selector: &str) -> Self {
        self.region_specs.push((name.to_owned(), selector.to_owned()));
        self
    }

    pub fn dom_event(
        mut self,
        event: &str,
        selector: Option<&str>,
        handler: impl Fn(&DomEvent) + 'static,
    ) -> Self {
        self.dom_events.push(DomEventSpec {
            event: event.to_owned(),
            selector: selector.map(str::to_owned),
            handler: Rc::new(handler),
        });
        self
    }

    /// Subscribes a lifecycle hook on the view's emitter at build time.
    pub fn on(mut self, hook: impl FnMut(&ViewEvent) + 'static) -> Self {
        self.hooks.push(Box::new(hook));
        self
    }

    /// Reacts to attribute writes on the bound record. Re-rendering in
    /// response is the handler's choice, not automatic.
    pub fn on_record_change(mut self, handler: impl FnMut(&RecordChange) + 'static) -> Self {
        self.record_change_handlers.push(Box::new(handler));
        self
    }

    pub fn behavior(mut self, behavior: Rc<dyn Behavior>) -> Self {
        self.behaviors.push(behavior);
        self
    }

    pub fn build(self) -> Rc<View> {
        let el = self.dom.create_element(&self.tag);
        let delegator = EventDelegator::new(self.dom.clone(), el);

        let view = Rc::new(View {
            dom: self.dom,
            renderer: self.renderer,
            el,
            template: self.template,
            record: self.record,
            events: Rc::new(Emitter::new()),
            flags: LifecycleCell::new(),
            delegator,
            binder: EntityBinder::new(),
            ui_specs: self.ui_specs,
            ui_cache: RefCell::new(HashMap::new()),
            region_specs: self.region_specs,
            regions: RefCell::new(HashMap::new()),
        });

        for spec in self.dom_events {
            view.delegator.delegate_spec(spec);
        }
        for mut hook in self.hooks {
            view.events.on(move |event| hook(event));
        }
        if let Some(record) = view.record.clone() {
            for mut handler in self.record_change_handlers {
                view.binder.bind(record.changed(), move |change| handler(change));
            }
        }
        for behavior in self.behaviors {
            for spec in behavior.dom_events() {
                view.delegator.delegate_spec(spec);
            }
            behavior.bind(&view);
            let weak = Rc::downgrade(&view);
            view.events.on(move |event| {
                if let Some(view) = weak.upgrade() {
                    behavior.on_event(&view, event);
                }
            });
        }
        view
    }
}
