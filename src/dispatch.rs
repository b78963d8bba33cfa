use super::*;
use std::cell::Cell;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Log the fault and keep invoking the remaining matched handlers.
    #[default]
    LogAndContinue,
    /// Stop at the first fault and return it from the native dispatch.
    Propagate,
}

#[derive(Debug)]
pub struct Binding {
    document: Document,
    root_listeners: Vec<(String, ListenerId)>,
    document_listeners: Vec<(String, ListenerId)>,
    faults: Rc<Cell<usize>>,
}

impl Binding {
    pub fn root_listener_count(&self) -> usize {
        self.root_listeners.len()
    }

    pub fn document_listener_count(&self) -> usize {
        self.document_listeners.len()
    }

    pub fn listener_count(&self) -> usize {
        self.root_listeners.len() + self.document_listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listener_count() == 0
    }

    /// Distinct event types with at least one listener, in bind order.
    pub fn event_types(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for (event_type, _) in self.root_listeners.iter().chain(&self.document_listeners) {
            if !out.contains(event_type) {
                out.push(event_type.clone());
            }
        }
        out
    }

    pub fn fault_count(&self) -> usize {
        self.faults.get()
    }

    /// Removes every listener this binding attached; returns how many were
    /// still present.
    pub fn unbind(self) -> usize {
        self.root_listeners
            .iter()
            .chain(&self.document_listeners)
            .filter(|(_, id)| self.document.remove_event_listener(*id))
            .count()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Dispatcher {
    policy: FailurePolicy,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: FailurePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Attaches one bubbling listener per event type on `root` for child and
    /// root handlers, plus one per event type on the document node for
    /// document handlers. Nothing is attached for an empty declaration list.
    pub fn bind<C: 'static>(
        &self,
        root: &Element,
        declarations: &[HandlerDeclaration<C>],
        ctx: C,
    ) -> Binding {
        let document = root.document().clone();
        let ctx = Rc::new(ctx);
        let faults = Rc::new(Cell::new(0usize));
        let mut binding = Binding {
            document: document.clone(),
            root_listeners: Vec::new(),
            document_listeners: Vec::new(),
            faults: Rc::clone(&faults),
        };

        for group in group_event_handlers(declarations) {
            let (document_handlers, scoped_handlers): (Vec<_>, Vec<_>) = group
                .handlers
                .into_iter()
                .partition(|handler| handler.target == Target::Document);

            let delegated = resolve_targets(root, scoped_handlers);
            if !delegated.is_empty() {
                let id = self.attach_root_listener(
                    root,
                    &group.event_type,
                    delegated,
                    Rc::clone(&ctx),
                    Rc::clone(&faults),
                );
                binding.root_listeners.push((group.event_type.clone(), id));
            }

            if !document_handlers.is_empty() {
                let id = self.attach_document_listener(
                    &document,
                    &group.event_type,
                    document_handlers,
                    Rc::clone(&ctx),
                    Rc::clone(&faults),
                );
                binding
                    .document_listeners
                    .push((group.event_type.clone(), id));
            }
        }

        tracing::debug!(
            root = ?root.node_id(),
            root_listeners = binding.root_listener_count(),
            document_listeners = binding.document_listener_count(),
            "bound event handlers"
        );
        binding
    }

    fn attach_root_listener<C: 'static>(
        &self,
        root: &Element,
        event_type: &str,
        handlers: Vec<DelegatedHandler<C>>,
        ctx: Rc<C>,
        faults: Rc<Cell<usize>>,
    ) -> ListenerId {
        let policy = self.policy;
        let listener_root = root.clone();
        let event_type_owned = event_type.to_string();
        root.document().add_event_listener(
            EventTarget::Node(root.node_id()),
            event_type,
            false,
            move |event| {
                // Resolve the full list before invoking anything; a handler
                // stopping propagation does not cancel its siblings.
                let matched = match_handlers(event, &handlers, &listener_root);
                for delegated in matched {
                    run_handler(
                        policy,
                        &faults,
                        &event_type_owned,
                        &delegated.handler.callback,
                        event,
                        Some(&delegated.element),
                        &*ctx,
                    )?;
                }
                Ok(())
            },
        )
    }

    fn attach_document_listener<C: 'static>(
        &self,
        document: &Document,
        event_type: &str,
        handlers: Vec<BoundHandler<C>>,
        ctx: Rc<C>,
        faults: Rc<Cell<usize>>,
    ) -> ListenerId {
        let policy = self.policy;
        let event_type_owned = event_type.to_string();
        document.add_event_listener(
            EventTarget::Node(document.document_node()),
            event_type,
            false,
            move |event| {
                for handler in &handlers {
                    run_handler(
                        policy,
                        &faults,
                        &event_type_owned,
                        &handler.callback,
                        event,
                        None,
                        &*ctx,
                    )?;
                }
                Ok(())
            },
        )
    }
}

pub fn bind<C: 'static>(root: &Element, declarations: &[HandlerDeclaration<C>], ctx: C) -> Binding {
    Dispatcher::default().bind(root, declarations, ctx)
}

fn resolve_targets<C>(root: &Element, handlers: Vec<BoundHandler<C>>) -> Vec<DelegatedHandler<C>> {
    let document = root.document();
    handlers
        .into_iter()
        .filter_map(|handler| {
            let element = match &handler.target {
                Target::Root => root.clone(),
                Target::ById(id) => {
                    let found =
                        document
                            .dom()
                            .find_descendant_by_attr(root.node_id(), CHILD_ATTR, id);
                    let Some(node) = found else {
                        tracing::debug!(id = %id, "no child element for handler target");
                        return None;
                    };
                    document.element(node)
                }
                Target::Document => return None,
            };
            Some(DelegatedHandler { handler, element })
        })
        .collect()
}

fn run_handler<C>(
    policy: FailurePolicy,
    faults: &Cell<usize>,
    event_type: &str,
    callback: &HandlerFn<C>,
    event: &mut Event,
    element: Option<&Element>,
    ctx: &C,
) -> Result<()> {
    let Err(err) = callback.invoke(event_type, event, element, ctx) else {
        return Ok(());
    };
    match policy {
        FailurePolicy::Propagate => Err(err),
        FailurePolicy::LogAndContinue => {
            faults.set(faults.get() + 1);
            tracing::warn!(
                event = event_type,
                target = ?element.map(Element::node_id),
                error = %err,
                "event handler failed"
            );
            Ok(())
        }
    }
}
