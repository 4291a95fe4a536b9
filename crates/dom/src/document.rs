use crate::error::{DomError, Result};
use crate::node::{Node, NodeId, Rect};
use crate::observer::{MutationListener, MutationRecord, ObserveOptions, ObserverId, Registration};
use crate::selector::Selector;
use crate::snapshot::{NodeSnapshot, NodeSpec};
use log::debug;
use std::collections::BTreeMap;
use std::fmt;

/// Arena-backed element tree with synchronous mutation observation.
pub struct Document {
    nodes: Vec<Option<Node>>,
    root: NodeId,
    observers: Vec<Registration>,
    next_observer: u64,
    mutation_count: u64,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("root", &self.root)
            .field("nodes", &self.node_count())
            .field("observers", &self.observers.len())
            .field("mutation_count", &self.mutation_count)
            .finish()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: vec![Some(Node::new("body"))],
            root: NodeId(0),
            observers: Vec::new(),
            next_observer: 0,
            mutation_count: 0,
        }
    }

    /// Builds a document whose root is described by `spec`.
    #[must_use]
    pub fn from_spec(spec: &NodeSpec) -> Self {
        let mut doc = Self {
            nodes: Vec::new(),
            root: NodeId(0),
            observers: Vec::new(),
            next_observer: 0,
            mutation_count: 0,
        };
        doc.root = doc.build_detached(spec);
        doc
    }

    #[must_use]
    pub const fn root(&self) -> NodeId {
        self.root
    }

    /// Total number of records ever produced, observed or not.
    #[must_use]
    pub const fn mutation_count(&self) -> u64 {
        self.mutation_count
    }

    /// Number of nodes reachable from the root, root included.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.descendants(self.root).len() + 1
    }

    #[must_use]
    pub fn exists(&self, id: NodeId) -> bool {
        self.nodes.get(id.0).is_some_and(Option::is_some)
    }

    /// True when `id` is attached to the document root.
    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        self.exists(id) && self.is_inclusive_ancestor(self.root, id)
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.alloc(Node::new(tag))
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.insert_before(parent, child, None)
    }

    /// Inserts `child` before `reference` (or last when `None`), moving it out
    /// of its current parent first.
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<()> {
        self.node(parent)?;
        self.node(child)?;
        if child == self.root {
            debug!("Rejected insert of the root under {parent}");
            return Err(DomError::RootDetach);
        }
        if self.is_inclusive_ancestor(child, parent) {
            debug!("Rejected insert of {child} under its own descendant {parent}");
            return Err(DomError::HierarchyRequest { parent, child });
        }
        if let Some(reference) = reference {
            if !self.node(parent)?.children.contains(&reference) || reference == child {
                debug!("Rejected insert before {reference}: not a child of {parent}");
                return Err(DomError::NotAChild { parent, reference });
            }
        }

        self.detach(child)?;

        let position = match reference {
            Some(reference) => self
                .node(parent)?
                .children
                .iter()
                .position(|c| *c == reference)
                .ok_or(DomError::NotAChild { parent, reference })?,
            None => self.node(parent)?.children.len(),
        };
        self.node_mut(parent)?.children.insert(position, child);
        self.node_mut(child)?.parent = Some(parent);

        let added = self.snapshot(child).into_iter().collect();
        self.notify(MutationRecord::ChildList {
            target: parent,
            added,
            removed: Vec::new(),
        });
        Ok(())
    }

    /// Detaches `id` and drops its whole subtree.
    pub fn remove(&mut self, id: NodeId) -> Result<()> {
        if id == self.root {
            debug!("Rejected removal of the root");
            return Err(DomError::RootDetach);
        }
        self.node(id)?;
        self.detach(id)?;
        for node in self.descendants(id) {
            self.nodes[node.0] = None;
        }
        self.nodes[id.0] = None;
        Ok(())
    }

    fn detach(&mut self, id: NodeId) -> Result<()> {
        let Some(parent) = self.node(id)?.parent else {
            return Ok(());
        };
        let snapshot = self.snapshot(id);
        self.node_mut(parent)?.children.retain(|c| *c != id);
        self.node_mut(id)?.parent = None;
        self.notify(MutationRecord::ChildList {
            target: parent,
            added: Vec::new(),
            removed: snapshot.into_iter().collect(),
        });
        Ok(())
    }

    /// Sets an attribute. Returns `false` and records nothing when the value
    /// is unchanged. Classes and inline style have dedicated setters.
    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) -> Result<bool> {
        let node = self.node_mut(id)?;
        if node.attributes.get(name).map(String::as_str) == Some(value) {
            return Ok(false);
        }
        node.attributes.insert(name.to_string(), value.to_string());
        self.notify_attribute(id, name);
        Ok(true)
    }

    pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> Result<bool> {
        if self.node_mut(id)?.attributes.remove(name).is_none() {
            return Ok(false);
        }
        self.notify_attribute(id, name);
        Ok(true)
    }

    #[must_use]
    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.nodes
            .get(id.0)?
            .as_ref()?
            .attributes
            .get(name)
            .map(String::as_str)
    }

    #[must_use]
    pub fn has_attribute(&self, id: NodeId, name: &str) -> bool {
        self.attribute(id, name).is_some()
    }

    pub fn add_class(&mut self, id: NodeId, class: &str) -> Result<bool> {
        let node = self.node_mut(id)?;
        if node.classes.iter().any(|c| c == class) {
            return Ok(false);
        }
        node.classes.push(class.to_string());
        self.notify_attribute(id, "class");
        Ok(true)
    }

    pub fn remove_class(&mut self, id: NodeId, class: &str) -> Result<bool> {
        let node = self.node_mut(id)?;
        let before = node.classes.len();
        node.classes.retain(|c| c != class);
        if node.classes.len() == before {
            return Ok(false);
        }
        self.notify_attribute(id, "class");
        Ok(true)
    }

    #[must_use]
    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.classes(id).iter().any(|c| c == class)
    }

    #[must_use]
    pub fn classes(&self, id: NodeId) -> &[String] {
        match self.nodes.get(id.0).and_then(Option::as_ref) {
            Some(node) => &node.classes,
            None => &[],
        }
    }

    /// Sets one inline style property; recorded as a `style` attribute change.
    pub fn set_style(&mut self, id: NodeId, property: &str, value: &str) -> Result<bool> {
        let node = self.node_mut(id)?;
        if node.style.get(property).map(String::as_str) == Some(value) {
            return Ok(false);
        }
        node.style.insert(property.to_string(), value.to_string());
        self.notify_attribute(id, "style");
        Ok(true)
    }

    pub fn remove_style(&mut self, id: NodeId, property: &str) -> Result<bool> {
        if self.node_mut(id)?.style.remove(property).is_none() {
            return Ok(false);
        }
        self.notify_attribute(id, "style");
        Ok(true)
    }

    #[must_use]
    pub fn style(&self, id: NodeId, property: &str) -> Option<&str> {
        self.nodes
            .get(id.0)?
            .as_ref()?
            .style
            .get(property)
            .map(String::as_str)
    }

    #[must_use]
    pub fn styles(&self, id: NodeId) -> Option<&BTreeMap<String, String>> {
        self.nodes.get(id.0)?.as_ref().map(|node| &node.style)
    }

    /// Replaces the node's own text.
    pub fn set_text(&mut self, id: NodeId, text: &str) -> Result<bool> {
        let node = self.node_mut(id)?;
        if node.text.as_deref() == Some(text) {
            return Ok(false);
        }
        node.text = Some(text.to_string());
        self.notify(MutationRecord::CharacterData { target: id });
        Ok(true)
    }

    #[must_use]
    pub fn own_text(&self, id: NodeId) -> Option<&str> {
        self.nodes.get(id.0)?.as_ref()?.text.as_deref()
    }

    /// Own text followed by the text of every descendant in document order.
    #[must_use]
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        if let Some(text) = self.own_text(id) {
            out.push_str(text);
        }
        for node in self.descendants(id) {
            if let Some(text) = self.own_text(node) {
                out.push_str(text);
            }
        }
        out
    }

    /// Layout changes are not DOM mutations and produce no record.
    pub fn set_rect(&mut self, id: NodeId, rect: Rect) -> Result<()> {
        self.node_mut(id)?.rect = Some(rect);
        Ok(())
    }

    #[must_use]
    pub fn rect(&self, id: NodeId) -> Option<Rect> {
        self.nodes.get(id.0)?.as_ref()?.rect
    }

    #[must_use]
    pub fn tag(&self, id: NodeId) -> Option<&str> {
        self.nodes
            .get(id.0)?
            .as_ref()
            .map(|node| node.tag.as_str())
    }

    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0)?.as_ref()?.parent
    }

    #[must_use]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        match self.nodes.get(id.0).and_then(Option::as_ref) {
            Some(node) => &node.children,
            None => &[],
        }
    }

    /// Descendants of `scope` in document order, `scope` excluded.
    #[must_use]
    pub fn descendants(&self, scope: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(scope).iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.children(id).iter().rev().copied());
        }
        out
    }

    #[must_use]
    pub fn matches(&self, id: NodeId, selector: &Selector) -> bool {
        self.nodes
            .get(id.0)
            .and_then(Option::as_ref)
            .is_some_and(|node| selector.matches(node))
    }

    #[must_use]
    pub fn query_all(&self, scope: NodeId, selector: &Selector) -> Vec<NodeId> {
        self.descendants(scope)
            .into_iter()
            .filter(|id| self.matches(*id, selector))
            .collect()
    }

    #[must_use]
    pub fn query(&self, scope: NodeId, selector: &Selector) -> Option<NodeId> {
        self.descendants(scope)
            .into_iter()
            .find(|id| self.matches(*id, selector))
    }

    /// Nearest inclusive ancestor matching `selector`.
    #[must_use]
    pub fn closest(&self, id: NodeId, selector: &Selector) -> Option<NodeId> {
        let mut current = Some(id);
        while let Some(node) = current {
            if self.matches(node, selector) {
                return Some(node);
            }
            current = self.parent(node);
        }
        None
    }

    #[must_use]
    pub fn snapshot(&self, id: NodeId) -> Option<NodeSnapshot> {
        let node = self.nodes.get(id.0)?.as_ref()?;
        Some(NodeSnapshot {
            id: Some(id),
            tag: node.tag.clone(),
            attributes: node.attributes.clone(),
            classes: node.classes.clone(),
        })
    }

    /// Builds `spec` off-tree and inserts it as one fragment (one record).
    pub fn append_spec(&mut self, parent: NodeId, spec: &NodeSpec) -> Result<NodeId> {
        self.insert_spec_before(parent, spec, None)
    }

    pub fn insert_spec_before(
        &mut self,
        parent: NodeId,
        spec: &NodeSpec,
        reference: Option<NodeId>,
    ) -> Result<NodeId> {
        self.node(parent)?;
        let id = self.build_detached(spec);
        self.insert_before(parent, id, reference)?;
        Ok(id)
    }

    #[must_use]
    pub fn to_spec(&self, id: NodeId) -> Option<NodeSpec> {
        let node = self.nodes.get(id.0)?.as_ref()?;
        Some(NodeSpec {
            tag: node.tag.clone(),
            attributes: node.attributes.clone(),
            classes: node.classes.clone(),
            style: node.style.clone(),
            text: node.text.clone(),
            rect: node.rect,
            children: node
                .children
                .iter()
                .filter_map(|child| self.to_spec(*child))
                .collect(),
        })
    }

    pub fn observe(
        &mut self,
        target: NodeId,
        options: ObserveOptions,
        listener: MutationListener,
    ) -> Result<ObserverId> {
        self.node(target)?;
        let id = ObserverId(self.next_observer);
        self.next_observer += 1;
        self.observers.push(Registration {
            id,
            target,
            options,
            listener,
        });
        debug!("Observer {} watching {target}", id.0);
        Ok(id)
    }

    pub fn disconnect(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|reg| reg.id != id);
        let removed = self.observers.len() != before;
        if removed {
            debug!("Observer {} disconnected", id.0);
        }
        removed
    }

    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    fn build_detached(&mut self, spec: &NodeSpec) -> NodeId {
        let mut node = Node::new(&spec.tag);
        node.attributes = spec.attributes.clone();
        node.classes = spec.classes.clone();
        node.style = spec.style.clone();
        node.text = spec.text.clone();
        node.rect = spec.rect;
        let id = self.alloc(node);
        for child_spec in &spec.children {
            let child = self.build_detached(child_spec);
            if let Some(Some(child_node)) = self.nodes.get_mut(child.0) {
                child_node.parent = Some(id);
            }
            if let Some(Some(parent_node)) = self.nodes.get_mut(id.0) {
                parent_node.children.push(child);
            }
        }
        id
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        self.nodes.push(Some(node));
        NodeId(self.nodes.len() - 1)
    }

    fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or(DomError::NodeNotFound(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(DomError::NodeNotFound(id))
    }

    fn is_inclusive_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == ancestor {
                return true;
            }
            current = self.parent(node);
        }
        false
    }

    fn notify_attribute(&mut self, id: NodeId, name: &str) {
        if let Some(target) = self.snapshot(id) {
            self.notify(MutationRecord::Attributes {
                target,
                attribute: name.to_string(),
            });
        }
    }

    fn notify(&mut self, record: MutationRecord) {
        self.mutation_count += 1;
        let Some(anchor) = record.anchor() else {
            return;
        };
        for reg in &self.observers {
            if !reg.options.accepts(&record) {
                continue;
            }
            let in_scope = if reg.options.subtree {
                self.is_inclusive_ancestor(reg.target, anchor)
            } else {
                reg.target == anchor
            };
            if in_scope {
                (reg.listener)(&record);
            }
        }
    }
}
