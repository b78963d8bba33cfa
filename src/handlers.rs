use super::*;
use fancy_regex::Regex;
use std::sync::OnceLock;

/// Handler callback: `(event, resolved element, app context)`. The element is
/// `None` for document-scoped handlers.
pub type Callback<C> = Rc<dyn Fn(&mut Event, Option<&Element>, &C) -> Result<()>>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    /// The descendant of the root whose `data-ha` value equals the id.
    ById(String),
    Root,
    /// The ambient document, outside root containment.
    Document,
}

pub enum HandlerFn<C> {
    Callable(Callback<C>),
    /// A non-callable value under an event key. Accepted when grouping and
    /// reported as [`Error::HandlerNotCallable`] once the event fires.
    NotCallable(String),
}

impl<C> Clone for HandlerFn<C> {
    fn clone(&self) -> Self {
        match self {
            Self::Callable(callback) => Self::Callable(Rc::clone(callback)),
            Self::NotCallable(description) => Self::NotCallable(description.clone()),
        }
    }
}

impl<C> fmt::Debug for HandlerFn<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Callable(callback) => write!(f, "Callable({:p})", Rc::as_ptr(callback)),
            Self::NotCallable(description) => write!(f, "NotCallable({description:?})"),
        }
    }
}

impl<C> HandlerFn<C> {
    pub fn is_callable(&self) -> bool {
        matches!(self, Self::Callable(_))
    }

    pub(crate) fn invoke(
        &self,
        event_type: &str,
        event: &mut Event,
        element: Option<&Element>,
        ctx: &C,
    ) -> Result<()> {
        match self {
            Self::Callable(callback) => callback(event, element, ctx),
            Self::NotCallable(description) => Err(Error::HandlerNotCallable {
                event_type: event_type.to_string(),
                description: description.clone(),
            }),
        }
    }

    pub fn same_as(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Callable(a), Self::Callable(b)) => Rc::ptr_eq(a, b),
            (Self::NotCallable(a), Self::NotCallable(b)) => a == b,
            _ => false,
        }
    }
}

/// One declared handler entry: a target scope, options and any number of
/// events, each with its own callback.
pub struct HandlerDeclaration<C> {
    pub target: Target,
    pub ignore_children: bool,
    pub events: Vec<(String, HandlerFn<C>)>,
    pub extras: BTreeMap<String, String>,
}

impl<C> Clone for HandlerDeclaration<C> {
    fn clone(&self) -> Self {
        Self {
            target: self.target.clone(),
            ignore_children: self.ignore_children,
            events: self.events.clone(),
            extras: self.extras.clone(),
        }
    }
}

impl<C> fmt::Debug for HandlerDeclaration<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerDeclaration")
            .field("target", &self.target)
            .field("ignore_children", &self.ignore_children)
            .field(
                "events",
                &self.events.iter().map(|(name, _)| name).collect::<Vec<_>>(),
            )
            .field("extras", &self.extras)
            .finish()
    }
}

impl<C> HandlerDeclaration<C> {
    pub fn new(target: Target) -> Self {
        Self {
            target,
            ignore_children: false,
            events: Vec::new(),
            extras: BTreeMap::new(),
        }
    }

    pub fn by_id(id: impl Into<String>) -> Self {
        Self::new(Target::ById(id.into()))
    }

    pub fn root() -> Self {
        Self::new(Target::Root)
    }

    pub fn document() -> Self {
        Self::new(Target::Document)
    }

    pub fn ignore_children(mut self, ignore: bool) -> Self {
        self.ignore_children = ignore;
        self
    }

    /// Adds an event binding. `event` may carry the `on` prefix in any case
    /// (`onKeyDown`, `onkeydown`) or be the bare type (`keydown`).
    pub fn on<F>(mut self, event: &str, callback: F) -> Self
    where
        F: Fn(&mut Event, Option<&Element>, &C) -> Result<()> + 'static,
    {
        self.events
            .push((event.to_string(), HandlerFn::Callable(Rc::new(callback))));
        self
    }

    pub fn on_handler(mut self, event: &str, handler: HandlerFn<C>) -> Self {
        self.events.push((event.to_string(), handler));
        self
    }

    pub fn extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extras.insert(key.into(), value.into());
        self
    }
}

pub struct BoundHandler<C> {
    pub target: Target,
    pub ignore_children: bool,
    pub callback: HandlerFn<C>,
    pub extras: BTreeMap<String, String>,
}

impl<C> Clone for BoundHandler<C> {
    fn clone(&self) -> Self {
        Self {
            target: self.target.clone(),
            ignore_children: self.ignore_children,
            callback: self.callback.clone(),
            extras: self.extras.clone(),
        }
    }
}

impl<C> fmt::Debug for BoundHandler<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundHandler")
            .field("target", &self.target)
            .field("ignore_children", &self.ignore_children)
            .field("callback", &self.callback)
            .field("extras", &self.extras)
            .finish()
    }
}

pub struct EventGroup<C> {
    pub event_type: String,
    pub handlers: Vec<BoundHandler<C>>,
}

impl<C> Clone for EventGroup<C> {
    fn clone(&self) -> Self {
        Self {
            event_type: self.event_type.clone(),
            handlers: self.handlers.clone(),
        }
    }
}

impl<C> fmt::Debug for EventGroup<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventGroup")
            .field("event_type", &self.event_type)
            .field("handlers", &self.handlers)
            .finish()
    }
}

fn camel_case_event_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^on[A-Z]").ok())
        .as_ref()
}

/// `onClick`, `onKeyDown` and `onTouch` are event names; `onclick`, `click`,
/// `keyDown` and `on` are not.
pub fn is_camel_case_event_name(name: &str) -> bool {
    camel_case_event_pattern()
        .and_then(|pattern| pattern.is_match(name).ok())
        .unwrap_or(false)
}

/// `onKeyDown` and `onkeydown` -> `keydown`; `click` stays `click`. The `on`
/// prefix is matched in any case, so an event whose own name starts with
/// "on" is spelled with the prefix (`onOnline`).
pub fn normalize_event_type(name: &str) -> String {
    let bare = match name.get(..2) {
        Some(prefix) if prefix.eq_ignore_ascii_case("on") && name.len() > 2 => &name[2..],
        _ => name,
    };
    bare.to_lowercase()
}

/// Expands every (declaration, event) pair into a [`BoundHandler`] and groups
/// them by normalized event type. Groups appear in first-seen order; handlers
/// keep declaration order inside each group.
pub fn group_event_handlers<C>(declarations: &[HandlerDeclaration<C>]) -> Vec<EventGroup<C>> {
    let mut groups: Vec<EventGroup<C>> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for declaration in declarations {
        for (event, callback) in &declaration.events {
            let event_type = normalize_event_type(event);
            let slot = match index.get(&event_type) {
                Some(slot) => *slot,
                None => {
                    groups.push(EventGroup {
                        event_type: event_type.clone(),
                        handlers: Vec::new(),
                    });
                    index.insert(event_type, groups.len() - 1);
                    groups.len() - 1
                }
            };
            groups[slot].handlers.push(BoundHandler {
                target: declaration.target.clone(),
                ignore_children: declaration.ignore_children,
                callback: callback.clone(),
                extras: declaration.extras.clone(),
            });
        }
    }

    groups
}
