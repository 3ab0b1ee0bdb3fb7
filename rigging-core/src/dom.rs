use std::rc::Rc;

/// A handle into an adapter-owned element tree.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct NodeId(pub usize);

/// Identifies one raw listener installed on one node.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ListenerId(pub u64);

/// A dispatched DOM event as seen by a raw listener. `current` is the node
/// whose listener is running; `target` is where the dispatch started.
#[derive(Clone, Debug)]
pub struct DomEvent {
    pub name: String,
    pub target: NodeId,
    pub current: NodeId,
}

pub type DomListener = Rc<dyn Fn(&DomEvent)>;

/// The DOM primitives the view layer consumes. The same operations apply
/// identically to live nodes and to detached fragments.
///
/// `append_child` re-parents; appending a fragment splices its children
/// into the target and leaves the fragment empty.
pub trait Dom {
    fn create_element(&self, tag: &str) -> NodeId;

    fn create_fragment(&self) -> NodeId;

    fn set_attribute(&self, node: NodeId, name: &str, value: &str);

    fn attribute(&self, node: NodeId, name: &str) -> Option<String>;

    fn set_inner_html(&self, node: NodeId, markup: &str);

    fn inner_html(&self, node: NodeId) -> String;

    fn append_child(&self, parent: NodeId, child: NodeId);

    fn insert_child(&self, parent: NodeId, child: NodeId, index: usize);

    /// Disconnects `node` from its parent. No-op when already detached.
    fn detach(&self, node: NodeId);

    /// Drops `node` and its whole subtree.
    fn remove(&self, node: NodeId);

    fn child_nodes(&self, parent: NodeId) -> Vec<NodeId>;

    fn parent(&self, node: NodeId) -> Option<NodeId>;

    /// Whether `node` is reachable from the document root.
    fn is_connected(&self, node: NodeId) -> bool;

    /// Simple selectors only: `tag`, `.class`, `#id` and `tag.class`-style
    /// combinations.
    fn matches(&self, node: NodeId, selector: &str) -> bool;

    fn query_selector(&self, root: NodeId, selector: &str) -> Option<NodeId>;

    fn add_listener(&self, node: NodeId, listener: DomListener) -> ListenerId;

    fn remove_listener(&self, node: NodeId, id: ListenerId);

    /// Dispatches an event at `target`, bubbling through listeners up to
    /// the tree root.
    fn dispatch(&self, target: NodeId, event_name: &str);
}

/// Transient staging area batching child insertions into one live-DOM
/// write. Never outlives a single render pass.
pub struct RenderBuffer {
    dom: Rc<dyn Dom>,
    fragment: NodeId,
}

impl RenderBuffer {
    pub fn new(dom: &Rc<dyn Dom>) -> RenderBuffer {
        RenderBuffer {
            dom: dom.clone(),
            fragment: dom.create_fragment(),
        }
    }

    pub fn append(&self, child: NodeId) {
        self.dom.append_child(self.fragment, child);
    }

    /// Moves all buffered children into `parent` as one append, then drops
    /// the fragment.
    pub fn flush_into(self, parent: NodeId) {
        self.dom.append_child(parent, self.fragment);
        self.dom.remove(self.fragment);
    }

    /// Drops the fragment together with anything still buffered in it.
    pub fn discard(self) {
        self.dom.remove(self.fragment);
    }
}
