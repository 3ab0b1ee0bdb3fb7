mod arena;

pub use arena::Arena;

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use log::trace;
use rigging_core::{Dom, DomEvent, DomListener, ListenerId, NodeId};

const VOID_TAGS: &[&str] = &["br", "hr", "img", "input", "link", "meta"];

fn is_void(tag: &str) -> bool {
    VOID_TAGS.contains(&tag)
}

enum NodeKind {
    Root,
    Fragment,
    Element {
        tag: String,
        attributes: Vec<(String, String)>,
    },
    Text(String),
}

struct NodeData {
    kind: NodeKind,
    parent: Option<usize>,
    children: Vec<usize>,
    listeners: Vec<(u64, DomListener)>,
}

impl NodeData {
    fn new(kind: NodeKind) -> NodeData {
        NodeData {
            kind,
            parent: None,
            children: Vec::new(),
            listeners: Vec::new(),
        }
    }

    fn tag(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Element { tag, .. } => Some(tag),
            _ => None,
        }
    }

    fn attribute(&self, name: &str) -> Option<&str> {
        match &self.kind {
            NodeKind::Element { attributes, .. } => attributes
                .iter()
                .find(|(attr, _)| attr == name)
                .map(|(_, value)| value.as_str()),
            _ => None,
        }
    }
}

/// An in-memory element tree implementing the core's `Dom` contract:
/// markup parsing/serialization, simple selector matching, bubbling event
/// dispatch, and per-parent mutation counters for asserting write batching.
pub struct MemoryDom {
    nodes: RefCell<Arena<NodeData>>,
    next_listener_id: Cell<u64>,
    append_counts: RefCell<HashMap<usize, usize>>,
    insert_counts: RefCell<HashMap<usize, usize>>,
}

impl MemoryDom {
    pub fn new() -> MemoryDom {
        MemoryDom {
            nodes: RefCell::new(Arena::new()),
            next_listener_id: Cell::new(0),
            append_counts: RefCell::new(HashMap::new()),
            insert_counts: RefCell::new(HashMap::new()),
        }
    }

    /// Creates a connected document root. Elements become `is_connected`
    /// once reachable from one.
    pub fn create_root(&self) -> NodeId {
        NodeId(self.nodes.borrow_mut().push(NodeData::new(NodeKind::Root)))
    }

    pub fn create_text(&self, text: &str) -> NodeId {
        NodeId(
            self.nodes
                .borrow_mut()
                .push(NodeData::new(NodeKind::Text(text.to_owned()))),
        )
    }

    /// The concatenated text of `node`'s subtree, tags stripped.
    pub fn text_content(&self, node: NodeId) -> String {
        let nodes = self.nodes.borrow();
        let mut out = String::new();
        collect_text(&nodes, node.0, &mut out);
        out
    }

    pub fn outer_html(&self, node: NodeId) -> String {
        let nodes = self.nodes.borrow();
        let mut out = String::new();
        serialize_node(&nodes, node.0, &mut out);
        out
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.borrow().contains(node.0)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.borrow().len()
    }

    /// How many `append_child` calls have targeted `parent` directly.
    pub fn append_count(&self, parent: NodeId) -> usize {
        self.append_counts.borrow().get(&parent.0).copied().unwrap_or(0)
    }

    /// How many `insert_child` calls have targeted `parent` directly.
    pub fn insert_count(&self, parent: NodeId) -> usize {
        self.insert_counts.borrow().get(&parent.0).copied().unwrap_or(0)
    }

    pub fn reset_counts(&self) {
        self.append_counts.borrow_mut().clear();
        self.insert_counts.borrow_mut().clear();
    }

    fn place_child(&self, parent: NodeId, child: NodeId, position: Option<usize>) {
        let mut nodes = self.nodes.borrow_mut();
        let spliced = matches!(nodes[child.0].kind, NodeKind::Fragment);
        let incoming = if spliced {
            // DocumentFragment semantics: move the children, leave the
            // fragment empty.
            std::mem::take(&mut nodes[child.0].children)
        } else {
            detach_node(&mut nodes, child.0);
            vec![child.0]
        };
        let at = position
            .unwrap_or(usize::MAX)
            .min(nodes[parent.0].children.len());
        for (offset, index) in incoming.into_iter().enumerate() {
            nodes[index].parent = Some(parent.0);
            nodes[parent.0].children.insert(at + offset, index);
        }
    }
}

impl Default for MemoryDom {
    fn default() -> Self {
        Self::new()
    }
}

impl Dom for MemoryDom {
    fn create_element(&self, tag: &str) -> NodeId {
        NodeId(self.nodes.borrow_mut().push(NodeData::new(NodeKind::Element {
            tag: tag.to_owned(),
            attributes: Vec::new(),
        })))
    }

    fn create_fragment(&self) -> NodeId {
        NodeId(
            self.nodes
                .borrow_mut()
                .push(NodeData::new(NodeKind::Fragment)),
        )
    }

    fn set_attribute(&self, node: NodeId, name: &str, value: &str) {
        let mut nodes = self.nodes.borrow_mut();
        if let NodeKind::Element { attributes, .. } = &mut nodes[node.0].kind {
            match attributes.iter_mut().find(|(attr, _)| attr == name) {
                Some((_, existing)) => *existing = value.to_owned(),
                None => attributes.push((name.to_owned(), value.to_owned())),
            }
        }
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.nodes.borrow()[node.0].attribute(name).map(str::to_owned)
    }

    fn set_inner_html(&self, node: NodeId, markup: &str) {
        trace!("set_inner_html {:?} = {:?}", node, markup);
        let mut nodes = self.nodes.borrow_mut();
        for child in std::mem::take(&mut nodes[node.0].children) {
            nodes[child].parent = None;
            free_subtree(&mut nodes, child);
        }
        let roots = parse_markup(&mut nodes, markup);
        for index in roots {
            nodes[index].parent = Some(node.0);
            nodes[node.0].children.push(index);
        }
    }

    fn inner_html(&self, node: NodeId) -> String {
        let nodes = self.nodes.borrow();
        let mut out = String::new();
        serialize_children(&nodes, node.0, &mut out);
        out
    }

    fn append_child(&self, parent: NodeId, child: NodeId) {
        *self.append_counts.borrow_mut().entry(parent.0).or_insert(0) += 1;
        self.place_child(parent, child, None);
    }

    fn insert_child(&self, parent: NodeId, child: NodeId, index: usize) {
        *self.insert_counts.borrow_mut().entry(parent.0).or_insert(0) += 1;
        self.place_child(parent, child, Some(index));
    }

    fn detach(&self, node: NodeId) {
        let mut nodes = self.nodes.borrow_mut();
        if nodes.contains(node.0) {
            detach_node(&mut nodes, node.0);
        }
    }

    fn remove(&self, node: NodeId) {
        let mut nodes = self.nodes.borrow_mut();
        if nodes.contains(node.0) {
            detach_node(&mut nodes, node.0);
            free_subtree(&mut nodes, node.0);
        }
    }

    fn child_nodes(&self, parent: NodeId) -> Vec<NodeId> {
        self.nodes.borrow()[parent.0]
            .children
            .iter()
            .map(|&index| NodeId(index))
            .collect()
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.borrow()[node.0].parent.map(NodeId)
    }

    fn is_connected(&self, node: NodeId) -> bool {
        let nodes = self.nodes.borrow();
        if !nodes.contains(node.0) {
            return false;
        }
        let mut current = node.0;
        loop {
            if matches!(nodes[current].kind, NodeKind::Root) {
                return true;
            }
            match nodes[current].parent {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    fn matches(&self, node: NodeId, selector: &str) -> bool {
        let nodes = self.nodes.borrow();
        node_matches(&nodes, node.0, &Selector::parse(selector))
    }

    fn query_selector(&self, root: NodeId, selector: &str) -> Option<NodeId> {
        let nodes = self.nodes.borrow();
        let selector = Selector::parse(selector);
        let mut stack: Vec<usize> = nodes[root.0].children.iter().rev().copied().collect();
        while let Some(index) = stack.pop() {
            if node_matches(&nodes, index, &selector) {
                return Some(NodeId(index));
            }
            stack.extend(nodes[index].children.iter().rev());
        }
        None
    }

    fn add_listener(&self, node: NodeId, listener: DomListener) -> ListenerId {
        let id = ListenerId(self.next_listener_id.get());
        self.next_listener_id.set(id.0 + 1);
        self.nodes.borrow_mut()[node.0].listeners.push((id.0, listener));
        id
    }

    fn remove_listener(&self, node: NodeId, id: ListenerId) {
        let mut nodes = self.nodes.borrow_mut();
        if let Some(data) = nodes.get_mut(node.0) {
            data.listeners.retain(|(listener_id, _)| *listener_id != id.0);
        }
    }

    fn dispatch(&self, target: NodeId, event_name: &str) {
        let chain = {
            let nodes = self.nodes.borrow();
            let mut chain = vec![target.0];
            let mut current = target.0;
            while let Some(parent) = nodes[current].parent {
                chain.push(parent);
                current = parent;
            }
            chain
        };
        trace!("dispatch {:?} from {:?}", event_name, target);
        for current in chain {
            // Listeners may mutate the tree; snapshot before calling out.
            let listeners: Vec<DomListener> = match self.nodes.borrow().get(current) {
                Some(data) => data.listeners.iter().map(|(_, l)| l.clone()).collect(),
                None => continue,
            };
            let event = DomEvent {
                name: event_name.to_owned(),
                target,
                current: NodeId(current),
            };
            for listener in listeners {
                listener(&event);
            }
        }
    }
}

fn detach_node(nodes: &mut Arena<NodeData>, index: usize) {
    if let Some(parent) = nodes[index].parent.take() {
        nodes[parent].children.retain(|&child| child != index);
    }
}

fn free_subtree(nodes: &mut Arena<NodeData>, index: usize) {
    for child in std::mem::take(&mut nodes[index].children) {
        free_subtree(nodes, child);
    }
    nodes.remove(index);
}

fn collect_text(nodes: &Arena<NodeData>, index: usize, out: &mut String) {
    if let NodeKind::Text(text) = &nodes[index].kind {
        out.push_str(text);
    }
    for &child in &nodes[index].children {
        collect_text(nodes, child, out);
    }
}

fn serialize_node(nodes: &Arena<NodeData>, index: usize, out: &mut String) {
    match &nodes[index].kind {
        NodeKind::Text(text) => out.push_str(text),
        NodeKind::Element { tag, attributes } => {
            out.push('<');
            out.push_str(tag);
            for (name, value) in attributes {
                out.push(' ');
                out.push_str(name);
                out.push_str("=\"");
                out.push_str(value);
                out.push('"');
            }
            out.push('>');
            if !is_void(tag) {
                serialize_children(nodes, index, out);
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
        NodeKind::Root | NodeKind::Fragment => serialize_children(nodes, index, out),
    }
}

fn serialize_children(nodes: &Arena<NodeData>, index: usize, out: &mut String) {
    for &child in &nodes[index].children {
        serialize_node(nodes, child, out);
    }
}

/// A forgiving parser for the simple markup templates produce: nested
/// tags with optional attributes, text in between. Unclosed tags are
/// auto-closed at the end of input; anything unparseable passes through
/// as text.
fn parse_markup(nodes: &mut Arena<NodeData>, markup: &str) -> Vec<usize> {
    let mut roots = Vec::new();
    let mut stack: Vec<usize> = Vec::new();
    let mut rest = markup;

    while !rest.is_empty() {
        match rest.find('<') {
            Some(0) => {
                let Some(gt) = rest.find('>') else {
                    link_parsed(nodes, &stack, &mut roots, NodeKind::Text(rest.to_owned()));
                    break;
                };
                let inside = &rest[1..gt];
                rest = &rest[gt + 1..];

                if let Some(name) = inside.strip_prefix('/') {
                    let name = name.trim();
                    while let Some(open) = stack.pop() {
                        if nodes[open].tag() == Some(name) {
                            break;
                        }
                    }
                } else {
                    let self_closing = inside.ends_with('/');
                    let inside = inside.trim_end_matches('/').trim();
                    let (tag, attributes) = parse_tag(inside);
                    let index = link_parsed(
                        nodes,
                        &stack,
                        &mut roots,
                        NodeKind::Element {
                            tag: tag.clone(),
                            attributes,
                        },
                    );
                    if !self_closing && !is_void(&tag) {
                        stack.push(index);
                    }
                }
            }
            Some(lt) => {
                link_parsed(nodes, &stack, &mut roots, NodeKind::Text(rest[..lt].to_owned()));
                rest = &rest[lt..];
            }
            None => {
                link_parsed(nodes, &stack, &mut roots, NodeKind::Text(rest.to_owned()));
                break;
            }
        }
    }
    roots
}

fn link_parsed(
    nodes: &mut Arena<NodeData>,
    stack: &[usize],
    roots: &mut Vec<usize>,
    kind: NodeKind,
) -> usize {
    let index = nodes.push(NodeData::new(kind));
    if let Some(&parent) = stack.last() {
        nodes[index].parent = Some(parent);
        nodes[parent].children.push(index);
    } else {
        roots.push(index);
    }
    index
}

fn parse_tag(inside: &str) -> (String, Vec<(String, String)>) {
    let tag_end = inside.find(char::is_whitespace).unwrap_or(inside.len());
    let tag = inside[..tag_end].to_ascii_lowercase();
    let mut attributes = Vec::new();

    let mut rest = inside[tag_end..].trim_start();
    while !rest.is_empty() {
        let name_end = rest
            .find(|c: char| c == '=' || c.is_whitespace())
            .unwrap_or(rest.len());
        let name = rest[..name_end].to_owned();
        rest = rest[name_end..].trim_start();

        let value = if let Some(after_eq) = rest.strip_prefix('=') {
            let after_eq = after_eq.trim_start();
            if let Some(quoted) = after_eq.strip_prefix('"') {
                match quoted.find('"') {
                    Some(close) => {
                        rest = &quoted[close + 1..];
                        quoted[..close].to_owned()
                    }
                    None => {
                        rest = "";
                        quoted.to_owned()
                    }
                }
            } else {
                let value_end = after_eq
                    .find(char::is_whitespace)
                    .unwrap_or(after_eq.len());
                rest = &after_eq[value_end..];
                after_eq[..value_end].to_owned()
            }
        } else {
            String::new()
        };
        if !name.is_empty() {
            attributes.push((name, value));
        }
        rest = rest.trim_start();
    }
    (tag, attributes)
}

struct Selector {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
}

impl Selector {
    /// `tag`, `.class`, `#id` and combinations like `tag.class`.
    fn parse(selector: &str) -> Selector {
        let mut tag = None;
        let mut id = None;
        let mut classes = Vec::new();

        let markers: &[char] = &['.', '#'];
        let mut rest = selector.trim();
        if !rest.starts_with(markers) && !rest.is_empty() {
            let end = rest.find(markers).unwrap_or(rest.len());
            tag = Some(rest[..end].to_ascii_lowercase());
            rest = &rest[end..];
        }
        while !rest.is_empty() {
            let (marker, tail) = rest.split_at(1);
            let end = tail.find(markers).unwrap_or(tail.len());
            match marker {
                "." => classes.push(tail[..end].to_owned()),
                "#" => id = Some(tail[..end].to_owned()),
                _ => {}
            }
            rest = &tail[end..];
        }
        Selector { tag, id, classes }
    }
}

fn node_matches(nodes: &Arena<NodeData>, index: usize, selector: &Selector) -> bool {
    let data = match nodes.get(index) {
        Some(data) => data,
        None => return false,
    };
    let NodeKind::Element { tag, .. } = &data.kind else {
        return false;
    };
    if let Some(selector_tag) = &selector.tag {
        if tag != selector_tag {
            return false;
        }
    }
    if let Some(selector_id) = &selector.id {
        if data.attribute("id") != Some(selector_id) {
            return false;
        }
    }
    if !selector.classes.is_empty() {
        let class_list = data.attribute("class").unwrap_or("");
        let classes: Vec<&str> = class_list.split_whitespace().collect();
        if !selector
            .classes
            .iter()
            .all(|class| classes.contains(&class.as_str()))
        {
            return false;
        }
    }
    true
}
