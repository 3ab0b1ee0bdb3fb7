use crate::delegate::DomEventSpec;
use crate::event::ViewEvent;
use crate::view::View;

/// A reusable set of event bindings attached to a view without
/// subclassing. Each behavior's DOM bindings are unioned into the owning
/// view's delegation table at build time, and `on_event` observes every
/// lifecycle event the view emits.
pub trait Behavior {
    /// DOM bindings contributed to the view's delegator.
    fn dom_events(&self) -> Vec<DomEventSpec> {
        Vec::new()
    }

    /// Entity-event setup, called once at build time. Bind through
    /// `view.binder()` so teardown rides the view's destroy.
    fn bind(&self, _view: &View) {}

    /// Observes every lifecycle event emitted by the owning view.
    fn on_event(&self, _view: &View, _event: &ViewEvent) {}
}
