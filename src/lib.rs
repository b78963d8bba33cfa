//! Lightweight DOM application helper.
//!
//! An app instance owns one root element (marked with `data-htmlapp`), knows the
//! tagged children inside it (marked with `data-ha`) and routes delegated DOM
//! events to handlers declared per child, per root or per document:
//!
//! ```
//! use html_app::{Document, HandlerDeclaration, bind};
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! # fn main() -> html_app::Result<()> {
//! let doc = Document::from_html(
//!     r#"<div data-htmlapp=""><button data-ha="save">Save</button></div>"#,
//! )?;
//! let root = doc
//!     .query_selector("[data-htmlapp]")?
//!     .expect("root element");
//!
//! let clicks = Rc::new(Cell::new(0));
//! let seen = Rc::clone(&clicks);
//! let handlers = vec![HandlerDeclaration::by_id("save").on("onClick", move |_, _, _: &()| {
//!     seen.set(seen.get() + 1);
//!     Ok(())
//! })];
//!
//! let binding = bind(&root, &handlers, ());
//! assert_eq!(binding.root_listener_count(), 1);
//!
//! doc.click("[data-ha=save]")?;
//! assert_eq!(clicks.get(), 1);
//! # Ok(())
//! # }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::error::Error as StdError;
use std::fmt;
use std::rc::Rc;

mod app;
mod declaration;
mod dispatch;
mod document;
mod dom;
mod element;
mod handlers;
mod html;
mod matcher;
mod selector;

pub use app::{AppOptions, HtmlApp, LoadHook, UnloadHook};
pub use declaration::FieldValue;
pub use dispatch::{Binding, Dispatcher, FailurePolicy, bind};
pub use document::{Document, Event, EventPhase, EventTarget, ListenerId};
pub use dom::NodeId;
pub use element::Element;
pub use handlers::{
    BoundHandler, Callback, EventGroup, HandlerDeclaration, HandlerFn, Target,
    group_event_handlers, is_camel_case_event_name, normalize_event_type,
};
pub use matcher::{DelegatedHandler, match_handlers};

use dom::Dom;

/// Name used to prefix library-level error and debug messages.
pub const LIB_NAME: &str = "HTMLApp";

/// Attribute marking the root element of an app instance.
pub const ROOT_ATTR: &str = "data-htmlapp";

/// Attribute marking addressable child elements inside a root.
pub const CHILD_ATTR: &str = "data-ha";

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    HtmlParse(String),
    UnsupportedSelector(String),
    SelectorNotFound(String),
    Dom(String),
    RootNotFound {
        attribute: String,
        app_name: String,
    },
    InvalidDeclaration(String),
    HandlerNotCallable {
        event_type: String,
        description: String,
    },
    Callback(String),
    InvalidConfig(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HtmlParse(msg) => write!(f, "html parse error: {msg}"),
            Self::UnsupportedSelector(selector) => write!(f, "unsupported selector: {selector}"),
            Self::SelectorNotFound(selector) => write!(f, "selector not found: {selector}"),
            Self::Dom(msg) => write!(f, "dom error: {msg}"),
            Self::RootNotFound {
                attribute,
                app_name,
            } => write!(
                f,
                "{LIB_NAME} - Unable to locate the app root element with attribute: \
                 {attribute}=\"{app_name}\". Make sure an element is present in the \
                 document with this attribute."
            ),
            Self::InvalidDeclaration(msg) => {
                write!(f, "{LIB_NAME} - invalid handler declaration: {msg}")
            }
            Self::HandlerNotCallable {
                event_type,
                description,
            } => write!(
                f,
                "{LIB_NAME} - handler for \"{event_type}\" is not callable: {description}"
            ),
            Self::Callback(msg) => write!(f, "handler failed: {msg}"),
            Self::InvalidConfig(msg) => write!(f, "{LIB_NAME} - invalid configuration: {msg}"),
        }
    }
}

impl StdError for Error {}

fn truncate_chars(value: &str, max_chars: usize) -> String {
    let mut it = value.chars();
    let mut out = String::new();
    for _ in 0..max_chars {
        let Some(ch) = it.next() else {
            return out;
        };
        out.push(ch);
    }
    if it.next().is_some() {
        out.push_str("...");
    }
    out
}
