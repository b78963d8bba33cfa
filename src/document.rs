use super::*;
use std::cell::{Cell, Ref, RefCell};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventTarget {
    Window,
    Node(NodeId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventPhase {
    Capturing,
    AtTarget,
    Bubbling,
}

type NativeListenerFn = Rc<dyn Fn(&mut Event) -> Result<()>>;

#[derive(Clone)]
struct Listener {
    id: ListenerId,
    capture: bool,
    callback: NativeListenerFn,
}

#[derive(Default)]
struct ListenerStore {
    map: HashMap<EventTarget, HashMap<String, Vec<Listener>>>,
}

impl ListenerStore {
    fn add(&mut self, target: EventTarget, event: String, listener: Listener) {
        self.map
            .entry(target)
            .or_default()
            .entry(event)
            .or_default()
            .push(listener);
    }

    fn remove(&mut self, id: ListenerId) -> bool {
        let mut removed = false;
        for events in self.map.values_mut() {
            for listeners in events.values_mut() {
                if let Some(pos) = listeners.iter().position(|listener| listener.id == id) {
                    listeners.remove(pos);
                    removed = true;
                }
            }
            events.retain(|_, listeners| !listeners.is_empty());
            if removed {
                break;
            }
        }
        self.map.retain(|_, events| !events.is_empty());
        removed
    }

    fn get(&self, target: EventTarget, event: &str, capture: bool) -> Vec<Listener> {
        self.map
            .get(&target)
            .and_then(|events| events.get(event))
            .map(|listeners| {
                listeners
                    .iter()
                    .filter(|listener| listener.capture == capture)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    fn retain_live(&mut self, dom: &Dom) {
        self.map.retain(|target, _| match target {
            EventTarget::Window => true,
            EventTarget::Node(node) => dom.is_valid_node(*node),
        });
    }

    fn count(&self, target: EventTarget, event: &str) -> usize {
        self.map
            .get(&target)
            .and_then(|events| events.get(event))
            .map(Vec::len)
            .unwrap_or(0)
    }
}

struct DocumentState {
    dom: RefCell<Dom>,
    listeners: RefCell<ListenerStore>,
    next_listener_id: Cell<u64>,
}

/// Shared handle to an in-memory document: the node tree plus every native
/// listener attached to it. Cloning is cheap and yields the same document.
#[derive(Clone)]
pub struct Document {
    state: Rc<DocumentState>,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("nodes", &self.state.dom.borrow().live_node_count())
            .finish()
    }
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }
}

impl Eq for Document {}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self::from_dom(Dom::new())
    }

    pub fn from_html(html: &str) -> Result<Self> {
        Ok(Self::from_dom(html::parse_html(html)?))
    }

    fn from_dom(dom: Dom) -> Self {
        Self {
            state: Rc::new(DocumentState {
                dom: RefCell::new(dom),
                listeners: RefCell::new(ListenerStore::default()),
                next_listener_id: Cell::new(1),
            }),
        }
    }

    pub(crate) fn dom(&self) -> Ref<'_, Dom> {
        self.state.dom.borrow()
    }

    pub(crate) fn with_dom_mut<T>(&self, f: impl FnOnce(&mut Dom) -> Result<T>) -> Result<T> {
        let mut dom = self
            .state
            .dom
            .try_borrow_mut()
            .map_err(|_| Error::Dom("document is already being mutated".into()))?;
        let released_before = dom.released_count();
        let out = f(&mut dom)?;
        if dom.released_count() != released_before {
            if let Ok(mut listeners) = self.state.listeners.try_borrow_mut() {
                listeners.retain_live(&dom);
            }
        }
        Ok(out)
    }

    pub fn document_node(&self) -> NodeId {
        self.dom().root
    }

    pub(crate) fn element(&self, node: NodeId) -> Element {
        Element::new(self.clone(), node)
    }

    pub fn query_selector(&self, selector: &str) -> Result<Option<Element>> {
        let found = self
            .dom()
            .query_selector_from(self.document_node(), selector)?;
        Ok(found.map(|node| self.element(node)))
    }

    pub fn query_selector_all(&self, selector: &str) -> Result<Vec<Element>> {
        let found = self
            .dom()
            .query_selector_all_from(self.document_node(), selector)?;
        Ok(found.into_iter().map(|node| self.element(node)).collect())
    }

    pub fn to_html(&self) -> String {
        let dom = self.dom();
        dom.dump_node(dom.root)
    }

    pub fn add_event_listener<F>(
        &self,
        target: EventTarget,
        event_type: &str,
        capture: bool,
        callback: F,
    ) -> ListenerId
    where
        F: Fn(&mut Event) -> Result<()> + 'static,
    {
        let id = ListenerId(self.state.next_listener_id.get());
        self.state.next_listener_id.set(id.0 + 1);
        self.state.listeners.borrow_mut().add(
            target,
            event_type.to_string(),
            Listener {
                id,
                capture,
                callback: Rc::new(callback),
            },
        );
        id
    }

    pub fn remove_event_listener(&self, id: ListenerId) -> bool {
        self.state.listeners.borrow_mut().remove(id)
    }

    /// Number of native listeners (both phases) for `event_type` on `target`.
    pub fn listener_count(&self, target: EventTarget, event_type: &str) -> usize {
        self.state.listeners.borrow().count(target, event_type)
    }

    pub fn click(&self, selector: &str) -> Result<Event> {
        self.dispatch(selector, "click")
    }

    pub fn dispatch(&self, selector: &str, event_type: &str) -> Result<Event> {
        let target = self.select_one(selector)?;
        self.dispatch_event(target, event_type)
    }

    fn select_one(&self, selector: &str) -> Result<NodeId> {
        self.dom()
            .query_selector_from(self.document_node(), selector)?
            .ok_or_else(|| Error::SelectorNotFound(selector.to_string()))
    }

    /// Fires `event_type` at `target` through the capture, target and bubble
    /// phases. The first listener error aborts the rest of the dispatch.
    pub fn dispatch_event(&self, target: NodeId, event_type: &str) -> Result<Event> {
        if !self.dom().is_valid_node(target) {
            return Err(Error::Dom(format!("unknown dispatch target {target:?}")));
        }
        stacker::maybe_grow(64 * 1024, 32 * 1024 * 1024, || {
            self.dispatch_event_inner(target, event_type)
        })
    }

    fn dispatch_event_inner(&self, target: NodeId, event_type: &str) -> Result<Event> {
        let mut event = Event::new(self.clone(), event_type, EventTarget::Node(target));

        let mut path = Vec::new();
        let mut cursor = Some(target);
        while let Some(node) = cursor {
            path.push(node);
            cursor = self.dom().parent(node);
        }
        path.reverse();

        let (ancestors, _) = path.split_at(path.len() - 1);

        event.phase = EventPhase::Capturing;
        for node in ancestors {
            event.current_target = EventTarget::Node(*node);
            self.invoke_listeners(&mut event, true)?;
            if event.propagation_stopped {
                return Ok(self.finish(event, "propagation_stopped"));
            }
        }

        // Target phase: capture listeners first.
        event.phase = EventPhase::AtTarget;
        event.current_target = EventTarget::Node(target);
        self.invoke_listeners(&mut event, true)?;
        if event.propagation_stopped {
            return Ok(self.finish(event, "propagation_stopped"));
        }
        self.invoke_listeners(&mut event, false)?;
        if event.propagation_stopped {
            return Ok(self.finish(event, "propagation_stopped"));
        }

        event.phase = EventPhase::Bubbling;
        for node in ancestors.iter().rev() {
            event.current_target = EventTarget::Node(*node);
            self.invoke_listeners(&mut event, false)?;
            if event.propagation_stopped {
                return Ok(self.finish(event, "propagation_stopped"));
            }
        }

        Ok(self.finish(event, "completed"))
    }

    pub fn dispatch_window_event(&self, event_type: &str) -> Result<Event> {
        let mut event = Event::new(self.clone(), event_type, EventTarget::Window);
        event.phase = EventPhase::AtTarget;
        self.invoke_listeners(&mut event, true)?;
        if !event.propagation_stopped {
            self.invoke_listeners(&mut event, false)?;
        }
        Ok(self.finish(event, "completed"))
    }

    fn invoke_listeners(&self, event: &mut Event, capture: bool) -> Result<()> {
        let listeners =
            self.state
                .listeners
                .borrow()
                .get(event.current_target, &event.event_type, capture);
        for listener in listeners {
            tracing::trace!(
                event = %event.event_type,
                target = ?event.target,
                current = ?event.current_target,
                phase = ?event.phase,
                listener = ?listener.id,
                "invoking listener"
            );
            (listener.callback)(event)?;
            if event.immediate_propagation_stopped {
                break;
            }
        }
        Ok(())
    }

    fn finish(&self, event: Event, outcome: &str) -> Event {
        tracing::trace!(
            event = %event.event_type,
            target = ?event.target,
            outcome,
            default_prevented = event.default_prevented,
            "dispatch done"
        );
        event
    }
}

#[derive(Debug, Clone)]
pub struct Event {
    document: Document,
    event_type: String,
    target: EventTarget,
    current_target: EventTarget,
    phase: EventPhase,
    default_prevented: bool,
    propagation_stopped: bool,
    immediate_propagation_stopped: bool,
}

impl Event {
    fn new(document: Document, event_type: &str, target: EventTarget) -> Self {
        Self {
            document,
            event_type: event_type.to_string(),
            target,
            current_target: target,
            phase: EventPhase::AtTarget,
            default_prevented: false,
            propagation_stopped: false,
            immediate_propagation_stopped: false,
        }
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn target(&self) -> EventTarget {
        self.target
    }

    pub fn target_node(&self) -> Option<NodeId> {
        match self.target {
            EventTarget::Node(node) => Some(node),
            EventTarget::Window => None,
        }
    }

    pub fn target_element(&self) -> Option<Element> {
        self.target_node()
            .filter(|node| self.document.dom().element(*node).is_some())
            .map(|node| self.document.element(node))
    }

    pub fn current_target(&self) -> EventTarget {
        self.current_target
    }

    pub fn phase(&self) -> EventPhase {
        self.phase
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }

    pub fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }

    pub fn stop_immediate_propagation(&mut self) {
        self.propagation_stopped = true;
        self.immediate_propagation_stopped = true;
    }

    pub fn propagation_stopped(&self) -> bool {
        self.propagation_stopped
    }
}
