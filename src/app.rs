use super::*;
use std::cell::{Cell, RefCell};

const DEFAULT_TRACE_LOG_LIMIT: usize = 10_000;

/// Called once the window `load` event fires: `(root, children, app)`.
pub type LoadHook = Rc<dyn Fn(&Element, &[Element], &HtmlApp) -> Result<()>>;

pub type UnloadHook = Rc<dyn Fn(&HtmlApp) -> Result<()>>;

/// Options for [`HtmlApp::new`]. `Default` gives an unnamed app with no
/// handlers, no hooks and debug logging off.
pub struct AppOptions {
    pub app_name: Option<String>,
    pub event_handlers: Vec<HandlerDeclaration<HtmlApp>>,
    pub on_load_app: Option<LoadHook>,
    pub on_unload_app: Option<UnloadHook>,
    pub debug: bool,
    pub failure_policy: FailurePolicy,
    pub trace_log_limit: usize,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            app_name: None,
            event_handlers: Vec::new(),
            on_load_app: None,
            on_unload_app: None,
            debug: false,
            failure_policy: FailurePolicy::default(),
            trace_log_limit: DEFAULT_TRACE_LOG_LIMIT,
        }
    }
}

impl AppOptions {
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = Some(name.into());
        self
    }

    pub fn handler(mut self, declaration: HandlerDeclaration<HtmlApp>) -> Self {
        self.event_handlers.push(declaration);
        self
    }

    pub fn handlers(
        mut self,
        declarations: impl IntoIterator<Item = HandlerDeclaration<HtmlApp>>,
    ) -> Self {
        self.event_handlers.extend(declarations);
        self
    }

    pub fn on_load_app<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Element, &[Element], &HtmlApp) -> Result<()> + 'static,
    {
        self.on_load_app = Some(Rc::new(hook));
        self
    }

    pub fn on_unload_app<F>(mut self, hook: F) -> Self
    where
        F: Fn(&HtmlApp) -> Result<()> + 'static,
    {
        self.on_unload_app = Some(Rc::new(hook));
        self
    }

    pub fn debug(mut self, enabled: bool) -> Self {
        self.debug = enabled;
        self
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn trace_log_limit(mut self, max_entries: usize) -> Self {
        self.trace_log_limit = max_entries;
        self
    }
}

struct AppInner {
    document: Document,
    options: AppOptions,
    root: Element,
    children: Vec<Element>,
    bindings: RefCell<Vec<Binding>>,
    lifecycle_listeners: RefCell<Vec<ListenerId>>,
    trace_logs: RefCell<Vec<String>>,
    trace_log_limit: Cell<usize>,
}

/// One app instance: a root element located by `data-htmlapp`, the tagged
/// children inside it and the handlers bound when the window loads.
///
/// The document's window listeners hold a handle to the app, so the instance
/// stays alive until [`HtmlApp::detach`] is called.
#[derive(Clone)]
pub struct HtmlApp {
    inner: Rc<AppInner>,
}

impl fmt::Debug for HtmlApp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HtmlApp")
            .field("app_name", &self.inner.options.app_name)
            .field("root", &self.inner.root)
            .field("children", &self.inner.children.len())
            .field("handlers", &self.inner.options.event_handlers.len())
            .finish()
    }
}

impl HtmlApp {
    /// Locates the root, discovers its children and registers the window
    /// `load` / `beforeunload` listeners. Handlers are bound on `load`.
    pub fn new(document: &Document, options: AppOptions) -> Result<Self> {
        if options.trace_log_limit == 0 {
            return Err(Error::InvalidConfig(
                "trace_log_limit requires at least 1 entry".into(),
            ));
        }

        let app_name = options.app_name.clone().unwrap_or_default();
        let root_node = document.dom().find_descendant_by_attr(
            document.document_node(),
            ROOT_ATTR,
            &app_name,
        );
        let Some(root_node) = root_node else {
            return Err(Error::RootNotFound {
                attribute: ROOT_ATTR.to_string(),
                app_name,
            });
        };

        let root = document.element(root_node);
        let children = root.query_selector_all(&format!("[{CHILD_ATTR}]"))?;
        let trace_log_limit = options.trace_log_limit;

        let app = Self {
            inner: Rc::new(AppInner {
                document: document.clone(),
                options,
                root,
                children,
                bindings: RefCell::new(Vec::new()),
                lifecycle_listeners: RefCell::new(Vec::new()),
                trace_logs: RefCell::new(Vec::new()),
                trace_log_limit: Cell::new(trace_log_limit),
            }),
        };

        let on_load = app.clone();
        let load_id = document.add_event_listener(EventTarget::Window, "load", false, move |_| {
            on_load.handle_load()
        });
        let on_unload = app.clone();
        let unload_id = document.add_event_listener(
            EventTarget::Window,
            "beforeunload",
            false,
            move |_| on_unload.handle_unload(),
        );
        app.inner
            .lifecycle_listeners
            .borrow_mut()
            .extend([load_id, unload_id]);

        Ok(app)
    }

    pub fn get_el(&self, name: &str) -> Option<Element> {
        self.inner
            .children
            .iter()
            .find(|child| child.id().as_deref() == Some(name))
            .cloned()
    }

    pub fn get_root_el(&self) -> &Element {
        &self.inner.root
    }

    pub fn children(&self) -> &[Element] {
        &self.inner.children
    }

    pub fn document(&self) -> &Document {
        &self.inner.document
    }

    pub fn app_name(&self) -> Option<&str> {
        self.inner.options.app_name.as_deref()
    }

    pub fn binding_listener_count(&self) -> usize {
        self.inner
            .bindings
            .borrow()
            .iter()
            .map(Binding::listener_count)
            .sum()
    }

    pub fn fault_count(&self) -> usize {
        self.inner
            .bindings
            .borrow()
            .iter()
            .map(Binding::fault_count)
            .sum()
    }

    pub fn unbind(&self) -> usize {
        let bindings = std::mem::take(&mut *self.inner.bindings.borrow_mut());
        let removed = bindings.into_iter().map(Binding::unbind).sum();
        self.log_debug(&format!("unbound {removed} listeners"));
        removed
    }

    /// Unbinds handlers and drops the window lifecycle listeners.
    pub fn detach(&self) -> usize {
        let mut removed = self.unbind();
        let lifecycle = std::mem::take(&mut *self.inner.lifecycle_listeners.borrow_mut());
        for id in lifecycle {
            if self.inner.document.remove_event_listener(id) {
                removed += 1;
            }
        }
        removed
    }

    pub fn take_trace_logs(&self) -> Vec<String> {
        std::mem::take(&mut *self.inner.trace_logs.borrow_mut())
    }

    pub fn set_trace_log_limit(&self, max_entries: usize) -> Result<()> {
        if max_entries == 0 {
            return Err(Error::InvalidConfig(
                "set_trace_log_limit requires at least 1 entry".into(),
            ));
        }
        self.inner.trace_log_limit.set(max_entries);
        let mut logs = self.inner.trace_logs.borrow_mut();
        while logs.len() > max_entries {
            logs.remove(0);
        }
        Ok(())
    }

    fn handle_load(&self) -> Result<()> {
        self.log_debug("loading app");

        let handlers = &self.inner.options.event_handlers;
        if !handlers.is_empty() {
            let dispatcher = Dispatcher::with_policy(self.inner.options.failure_policy);
            let binding = dispatcher.bind(&self.inner.root, handlers, self.clone());
            self.log_debug(&format!(
                "bound {} listeners for {:?}",
                binding.listener_count(),
                binding.event_types()
            ));
            self.inner.bindings.borrow_mut().push(binding);
        }

        if let Some(hook) = &self.inner.options.on_load_app {
            hook(&self.inner.root, &self.inner.children, self)?;
        }
        Ok(())
    }

    fn handle_unload(&self) -> Result<()> {
        self.log_debug("unloading app");

        if let Some(hook) = &self.inner.options.on_unload_app {
            hook(self)?;
        }
        Ok(())
    }

    fn log_debug(&self, message: &str) {
        if !self.inner.options.debug {
            return;
        }
        let suffix = self
            .app_name()
            .filter(|name| !name.is_empty())
            .map(|name| format!(" {name}"))
            .unwrap_or_default();
        let line = format!("[DEBUG {LIB_NAME}{suffix}]: {message}");
        tracing::debug!(target: "html_app", "{}", truncate_chars(&line, 500));

        let mut logs = self.inner.trace_logs.borrow_mut();
        if logs.len() >= self.inner.trace_log_limit.get() {
            logs.remove(0);
        }
        logs.push(line);
    }
}
