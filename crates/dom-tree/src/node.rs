//! Document and element handles

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use schedassist_core_types::NodeKey;
use schedassist_event_bus::{EventBus, InMemoryBus};
use tokio::sync::broadcast;
use tracing::trace;

use crate::errors::{DomError, SelectorError};
use crate::events::{DomEvent, EventInit, Listener, MutationKind, MutationRecord};
use crate::selector::Selector;

static NEXT_NODE_KEY: AtomicU64 = AtomicU64::new(1);

const DEFAULT_BUS_CAPACITY: usize = 1024;

/// Owning handle to one page. Cloning shares the same tree.
#[derive(Clone)]
pub struct Document {
    inner: Arc<DocumentInner>,
}

struct DocumentInner {
    bus: Arc<InMemoryBus<MutationRecord>>,
    root: Element,
    body: Element,
}

impl Document {
    /// Create an empty page: `<html><body></body></html>`.
    pub fn new() -> Self {
        Self::with_bus_capacity(DEFAULT_BUS_CAPACITY)
    }

    pub fn with_bus_capacity(capacity: usize) -> Self {
        let inner = Arc::new_cyclic(|weak: &Weak<DocumentInner>| {
            let root = Element::alloc(weak.clone(), "html");
            let body = Element::alloc(weak.clone(), "body");
            body.0.state.write().parent = Arc::downgrade(&root.0);
            root.0.state.write().children.push(body.clone());
            DocumentInner {
                bus: InMemoryBus::new(capacity),
                root,
                body,
            }
        });
        Self { inner }
    }

    /// The document element (`html`).
    pub fn root(&self) -> Element {
        self.inner.root.clone()
    }

    pub fn body(&self) -> Element {
        self.inner.body.clone()
    }

    /// Create a detached element owned by this document.
    pub fn create_element(&self, tag: &str) -> Element {
        Element::alloc(Arc::downgrade(&self.inner), tag)
    }

    pub fn get_element_by_id(&self, id: &str) -> Option<Element> {
        let root = self.root();
        if root.id().as_deref() == Some(id) {
            return Some(root);
        }
        root.descendants()
            .into_iter()
            .find(|el| el.id().as_deref() == Some(id))
    }

    /// Query including the document element itself.
    pub fn query_selector(&self, selector: &str) -> Result<Option<Element>, SelectorError> {
        Ok(self.query_selector_all(selector)?.into_iter().next())
    }

    pub fn query_selector_all(&self, selector: &str) -> Result<Vec<Element>, SelectorError> {
        let parsed = Selector::parse(selector)?;
        let root = self.root();
        let mut out = Vec::new();
        if parsed.matches(&root) {
            out.push(root.clone());
        }
        out.extend(
            root.descendants()
                .into_iter()
                .filter(|el| parsed.matches(el)),
        );
        Ok(out)
    }

    /// Subscribe to every mutation inside this document.
    pub fn subscribe(&self) -> broadcast::Receiver<MutationRecord> {
        self.inner.bus.subscribe()
    }

    /// Number of live mutation subscriptions.
    pub fn mutation_subscribers(&self) -> usize {
        self.inner.bus.subscriber_count()
    }

    pub fn downgrade(&self) -> WeakDocument {
        WeakDocument(Arc::downgrade(&self.inner))
    }

    pub fn owns(&self, element: &Element) -> bool {
        element
            .0
            .doc
            .upgrade()
            .map(|doc| Arc::ptr_eq(&doc, &self.inner))
            .unwrap_or(false)
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("root", &self.inner.root)
            .finish()
    }
}

/// Non-owning document handle for listeners that must not keep the page alive.
#[derive(Clone, Default)]
pub struct WeakDocument(Weak<DocumentInner>);

impl WeakDocument {
    pub fn upgrade(&self) -> Option<Document> {
        self.0.upgrade().map(|inner| Document { inner })
    }
}

/// Strong handle to one element. Equality is node identity.
#[derive(Clone)]
pub struct Element(Arc<NodeData>);

/// Non-owning handle; upgrading fails once every strong handle is gone.
#[derive(Clone, Default)]
pub struct WeakElement(Weak<NodeData>);

impl WeakElement {
    pub fn upgrade(&self) -> Option<Element> {
        self.0.upgrade().map(Element)
    }
}

struct NodeData {
    key: NodeKey,
    tag: String,
    doc: Weak<DocumentInner>,
    state: RwLock<NodeState>,
}

#[derive(Default)]
struct NodeState {
    attrs: BTreeMap<String, String>,
    text: String,
    children: Vec<Element>,
    parent: Weak<NodeData>,
    listeners: Vec<(String, Listener)>,
}

impl Element {
    fn alloc(doc: Weak<DocumentInner>, tag: &str) -> Self {
        let key = NodeKey(NEXT_NODE_KEY.fetch_add(1, Ordering::Relaxed));
        Self(Arc::new(NodeData {
            key,
            tag: tag.to_ascii_lowercase(),
            doc,
            state: RwLock::new(NodeState::default()),
        }))
    }

    pub fn key(&self) -> NodeKey {
        self.0.key
    }

    pub fn tag(&self) -> &str {
        &self.0.tag
    }

    pub fn downgrade(&self) -> WeakElement {
        WeakElement(Arc::downgrade(&self.0))
    }

    pub fn document(&self) -> Option<Document> {
        self.0.doc.upgrade().map(|inner| Document { inner })
    }

    // ----- attributes -----

    pub fn attr(&self, name: &str) -> Option<String> {
        self.0.state.read().attrs.get(name).cloned()
    }

    pub fn set_attr(&self, name: &str, value: impl Into<String>) {
        let value = value.into();
        let changed = {
            let mut state = self.0.state.write();
            state.attrs.insert(name.to_ascii_lowercase(), value.clone()) != Some(value)
        };
        if changed {
            self.notify(MutationKind::Attributes);
        }
    }

    pub fn remove_attr(&self, name: &str) {
        let removed = self.0.state.write().attrs.remove(name).is_some();
        if removed {
            self.notify(MutationKind::Attributes);
        }
    }

    pub fn id(&self) -> Option<String> {
        self.attr("id")
    }

    pub fn set_id(&self, id: impl Into<String>) {
        self.set_attr("id", id);
    }

    pub fn class_name(&self) -> String {
        self.attr("class").unwrap_or_default()
    }

    pub fn set_class_name(&self, classes: impl Into<String>) {
        self.set_attr("class", classes);
    }

    pub fn has_class(&self, class: &str) -> bool {
        class_tokens(&self.class_name()).iter().any(|c| c == class)
    }

    pub fn add_class(&self, class: &str) {
        self.toggle_class(class, Some(true));
    }

    pub fn remove_class(&self, class: &str) {
        self.toggle_class(class, Some(false));
    }

    /// Flip `class`, or force it on/off. Returns whether the class is present afterwards.
    pub fn toggle_class(&self, class: &str, force: Option<bool>) -> bool {
        let mut tokens = class_tokens(&self.class_name());
        let present = tokens.iter().any(|c| c == class);
        let want = force.unwrap_or(!present);
        if want == present {
            return present;
        }
        if want {
            tokens.push(class.to_string());
        } else {
            tokens.retain(|c| c != class);
        }
        self.set_attr("class", tokens.join(" "));
        want
    }

    /// Inline style property, read from the `style` attribute.
    pub fn style(&self, property: &str) -> Option<String> {
        parse_style(&self.attr("style").unwrap_or_default())
            .into_iter()
            .find(|(name, _)| name == property)
            .map(|(_, value)| value)
    }

    pub fn set_style(&self, property: &str, value: &str) {
        let mut decls = parse_style(&self.attr("style").unwrap_or_default());
        match decls.iter_mut().find(|(name, _)| name == property) {
            Some(entry) => entry.1 = value.to_string(),
            None => decls.push((property.to_string(), value.to_string())),
        }
        let serialized = decls
            .iter()
            .map(|(name, value)| format!("{name}: {value};"))
            .collect::<Vec<_>>()
            .join(" ");
        self.set_attr("style", serialized);
    }

    // ----- text -----

    /// Own text followed by the text of every descendant, in document order.
    pub fn text_content(&self) -> String {
        let (mut out, children) = {
            let state = self.0.state.read();
            (state.text.clone(), state.children.clone())
        };
        for child in children {
            out.push_str(&child.text_content());
        }
        out
    }

    /// Replace the element's own text run. Children are kept.
    pub fn set_text(&self, text: impl Into<String>) {
        self.0.state.write().text = text.into();
        self.notify(MutationKind::CharacterData);
    }

    // ----- structure -----

    pub fn parent(&self) -> Option<Element> {
        self.0.state.read().parent.upgrade().map(Element)
    }

    pub fn children(&self) -> Vec<Element> {
        self.0.state.read().children.clone()
    }

    pub fn child_element_count(&self) -> usize {
        self.0.state.read().children.len()
    }

    /// Zero-based position among the parent's children.
    pub fn index_in_parent(&self) -> Option<usize> {
        let parent = self.parent()?;
        let index = parent.0.state.read().children.iter().position(|c| c == self);
        index
    }

    pub fn previous_sibling(&self) -> Option<Element> {
        let parent = self.parent()?;
        let index = self.index_in_parent()?;
        if index == 0 {
            return None;
        }
        let sibling = parent.0.state.read().children.get(index - 1).cloned();
        sibling
    }

    /// Inclusive descendant check.
    pub fn contains(&self, other: &Element) -> bool {
        let mut cursor = Some(other.clone());
        while let Some(node) = cursor {
            if &node == self {
                return true;
            }
            cursor = node.parent();
        }
        false
    }

    pub fn is_connected(&self) -> bool {
        self.document()
            .map(|doc| doc.root().contains(self))
            .unwrap_or(false)
    }

    /// Every descendant in document order, excluding `self`.
    pub fn descendants(&self) -> Vec<Element> {
        let mut out = Vec::new();
        let mut stack: Vec<Element> = self.children().into_iter().rev().collect();
        while let Some(node) = stack.pop() {
            stack.extend(node.children().into_iter().rev());
            out.push(node);
        }
        out
    }

    pub fn append_child(&self, child: &Element) -> Result<(), DomError> {
        self.insert_child(child, false)
    }

    pub fn prepend_child(&self, child: &Element) -> Result<(), DomError> {
        self.insert_child(child, true)
    }

    /// Detach from the parent, if any.
    pub fn remove(&self) {
        let Some(parent) = self.parent() else {
            return;
        };
        parent.0.state.write().children.retain(|c| c != self);
        self.0.state.write().parent = Weak::new();
        parent.notify(MutationKind::ChildList);
    }

    fn insert_child(&self, child: &Element, front: bool) -> Result<(), DomError> {
        if !Weak::ptr_eq(&self.0.doc, &child.0.doc) {
            return Err(DomError::WrongDocument(format!("{child} into {self}")));
        }
        if child.contains(self) {
            return Err(DomError::HierarchyRequest(format!(
                "{child} is an ancestor of {self}"
            )));
        }
        child.remove();
        {
            let mut state = self.0.state.write();
            if front {
                state.children.insert(0, child.clone());
            } else {
                state.children.push(child.clone());
            }
        }
        child.0.state.write().parent = Arc::downgrade(&self.0);
        self.notify(MutationKind::ChildList);
        Ok(())
    }

    // ----- queries -----

    /// First matching descendant (never `self`).
    pub fn query_selector(&self, selector: &str) -> Result<Option<Element>, SelectorError> {
        let parsed = Selector::parse(selector)?;
        Ok(self.descendants().into_iter().find(|el| parsed.matches(el)))
    }

    pub fn query_selector_all(&self, selector: &str) -> Result<Vec<Element>, SelectorError> {
        let parsed = Selector::parse(selector)?;
        Ok(self
            .descendants()
            .into_iter()
            .filter(|el| parsed.matches(el))
            .collect())
    }

    pub fn matches(&self, selector: &str) -> Result<bool, SelectorError> {
        Ok(Selector::parse(selector)?.matches(self))
    }

    // ----- events -----

    pub fn add_event_listener(&self, event_type: &str, listener: Listener) {
        self.0
            .state
            .write()
            .listeners
            .push((event_type.to_string(), listener));
    }

    pub fn on<F>(&self, event_type: &str, handler: F)
    where
        F: Fn(&DomEvent) + Send + Sync + 'static,
    {
        self.add_event_listener(event_type, Arc::new(handler));
    }

    /// Deliver an event to the target, then to its ancestors when it bubbles.
    /// Listeners run with no tree lock held. Returns the number of listeners invoked.
    pub fn dispatch_event(&self, event_type: &str, init: EventInit) -> usize {
        let mut path = vec![self.clone()];
        if init.bubbles {
            let mut cursor = self.parent();
            while let Some(node) = cursor {
                cursor = node.parent();
                path.push(node);
            }
        }

        let mut invoked = 0;
        for node in path {
            let listeners: Vec<Listener> = node
                .0
                .state
                .read()
                .listeners
                .iter()
                .filter(|(kind, _)| kind == event_type)
                .map(|(_, listener)| listener.clone())
                .collect();
            for listener in listeners {
                let event = DomEvent {
                    event_type: event_type.to_string(),
                    init,
                    target: self.clone(),
                    current_target: node.clone(),
                };
                listener(&event);
                invoked += 1;
            }
        }
        invoked
    }

    fn notify(&self, kind: MutationKind) {
        let Some(doc) = self.0.doc.upgrade() else {
            return;
        };
        // No subscribers is the common case; nothing to report.
        if let Ok(receivers) = doc.bus.publish(MutationRecord {
            kind,
            target_key: self.key(),
            target: self.downgrade(),
        }) {
            trace!(?kind, node = %self.key(), receivers, "mutation published");
        }
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Element {}

impl Hash for Element {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.key.hash(state);
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}", self.tag())?;
        if let Some(id) = self.id() {
            write!(f, "#{id}")?;
        }
        for class in class_tokens(&self.class_name()) {
            write!(f, ".{class}")?;
        }
        write!(f, ">")
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self, self.key())
    }
}

fn class_tokens(class_attr: &str) -> Vec<String> {
    class_attr
        .split_ascii_whitespace()
        .map(str::to_string)
        .collect()
}

fn parse_style(style: &str) -> Vec<(String, String)> {
    style
        .split(';')
        .filter_map(|decl| {
            let (name, value) = decl.split_once(':')?;
            let name = name.trim().to_ascii_lowercase();
            if name.is_empty() {
                return None;
            }
            Some((name, value.trim().to_string()))
        })
        .collect()
}
