mod behavior;
mod binder;
mod child_container;
mod collection_view;
mod delegate;
mod dom;
mod error;
mod event;
mod lifecycle;
mod record;
mod region;
mod template;
mod view;

pub use behavior::Behavior;
pub use binder::EntityBinder;
pub use child_container::{ChildEntry, ChildViewContainer};
pub use collection_view::{
    ChildFactory, CollectionView, CollectionViewBuilder, Comparator, EmptyFactory, Filter,
};
pub use delegate::{BindingId, DomEventSpec, EventDelegator};
pub use dom::{Dom, DomEvent, DomListener, ListenerId, NodeId, RenderBuffer};
pub use error::ViewError;
pub use event::{Emitter, HandlerId, ViewEvent, DEFAULT_CHILD_PREFIX};
pub use lifecycle::{LifecycleCell, LifecycleFlags};
pub use record::{
    ObjectRecord, Record, RecordChange, RecordId, RecordSet, RecordSetEvent, RecordStore,
};
pub use region::Region;
pub use template::{Renderer, Template, TemplateRegistry};
pub use view::{View, ViewBuilder, ViewObject};
