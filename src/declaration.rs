use super::*;

/// A loosely typed field of a handler declaration, as written by callers that
/// keep the `{ id, onClick, ignoreChildren, ... }` object convention.
pub enum FieldValue<C> {
    Callback(Callback<C>),
    Bool(bool),
    Text(String),
}

impl<C> FieldValue<C> {
    pub fn callback<F>(callback: F) -> Self
    where
        F: Fn(&mut Event, Option<&Element>, &C) -> Result<()> + 'static,
    {
        Self::Callback(Rc::new(callback))
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    fn describe(&self) -> String {
        match self {
            Self::Callback(_) => "callback".to_string(),
            Self::Bool(value) => format!("boolean {value}"),
            Self::Text(value) => format!("string {value:?}"),
        }
    }
}

impl<C> HandlerDeclaration<C> {
    /// Builds a declaration from named fields.
    ///
    /// Keys shaped like `onClick` become events, in field order. `id`, `root`
    /// and `document` pick the target and exactly one must be present;
    /// `ignoreChildren` sets the option. A `callback` key is discarded and
    /// every other non-callback field is carried as an extra.
    pub fn from_fields<I, K>(fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, FieldValue<C>)>,
        K: Into<String>,
    {
        let mut targets = Vec::new();
        let mut ignore_children = false;
        let mut events = Vec::new();
        let mut extras = BTreeMap::new();

        for (key, value) in fields {
            let key = key.into();
            if is_camel_case_event_name(&key) {
                let handler = match value {
                    FieldValue::Callback(callback) => HandlerFn::Callable(callback),
                    other => HandlerFn::NotCallable(other.describe()),
                };
                events.push((key, handler));
                continue;
            }

            match (key.as_str(), value) {
                ("id", FieldValue::Text(id)) => targets.push(Target::ById(id)),
                ("root", FieldValue::Bool(flag)) => {
                    if flag {
                        targets.push(Target::Root);
                    }
                }
                ("document", FieldValue::Bool(flag)) => {
                    if flag {
                        targets.push(Target::Document);
                    }
                }
                ("ignoreChildren", FieldValue::Bool(flag)) => ignore_children = flag,
                (name @ ("id" | "root" | "document" | "ignoreChildren"), other) => {
                    return Err(Error::InvalidDeclaration(format!(
                        "field \"{name}\" cannot hold a {}",
                        other.describe()
                    )));
                }
                ("callback", _) | (_, FieldValue::Callback(_)) => {}
                (_, FieldValue::Bool(flag)) => {
                    extras.insert(key.clone(), flag.to_string());
                }
                (_, FieldValue::Text(text)) => {
                    extras.insert(key.clone(), text);
                }
            }
        }

        let target = match targets.len() {
            1 => targets.remove(0),
            0 => {
                return Err(Error::InvalidDeclaration(
                    "expected one of \"id\", \"root: true\" or \"document: true\"".into(),
                ));
            }
            _ => {
                return Err(Error::InvalidDeclaration(format!(
                    "conflicting targets {targets:?}"
                )));
            }
        };

        Ok(Self {
            target,
            ignore_children,
            events,
            extras,
        })
    }
}
