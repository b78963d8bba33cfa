use super::*;

/// Wrapper around one element of a [`Document`] with chainable setters.
///
/// Setters return `Result<&Self>` so calls chain with `?`:
///
/// ```
/// # use html_app::Document;
/// # fn main() -> html_app::Result<()> {
/// let doc = Document::from_html(r#"<p data-ha="msg"></p>"#)?;
/// let msg = doc.query_selector("[data-ha=msg]")?.expect("msg");
/// msg.set_text("saved")?.set_class(&["ok", "flash"])?;
/// assert_eq!(msg.text(), "saved");
/// assert_eq!(msg.classes(), vec!["ok", "flash"]);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Element {
    document: Document,
    node: NodeId,
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dom = self.document.dom();
        let label = dom.tag_name(self.node).unwrap_or("#node").to_string();
        f.debug_struct("Element")
            .field("node", &self.node)
            .field("tag", &label)
            .field("id", &dom.attr(self.node, CHILD_ATTR))
            .finish()
    }
}

impl Element {
    pub(crate) fn new(document: Document, node: NodeId) -> Self {
        Self { document, node }
    }

    pub fn node_id(&self) -> NodeId {
        self.node
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Identity of the element: the value of its `data-ha` attribute.
    pub fn id(&self) -> Option<String> {
        self.document.dom().attr(self.node, CHILD_ATTR)
    }

    pub fn tag_name(&self) -> String {
        self.document
            .dom()
            .tag_name(self.node)
            .unwrap_or_default()
            .to_string()
    }

    /// True when `other` is this element or one of its descendants.
    pub fn contains(&self, other: &Element) -> bool {
        self.document == other.document && self.document.dom().contains(self.node, other.node)
    }

    pub fn parent(&self) -> Option<Element> {
        let parent = self.document.dom().parent(self.node)?;
        self.document
            .dom()
            .element(parent)
            .is_some()
            .then(|| self.document.element(parent))
    }

    pub fn query_selector(&self, selector: &str) -> Result<Option<Element>> {
        let found = self.document.dom().query_selector_from(self.node, selector)?;
        Ok(found.map(|node| self.document.element(node)))
    }

    pub fn query_selector_all(&self, selector: &str) -> Result<Vec<Element>> {
        let found = self
            .document
            .dom()
            .query_selector_all_from(self.node, selector)?;
        Ok(found
            .into_iter()
            .map(|node| self.document.element(node))
            .collect())
    }

    pub fn matches(&self, selector: &str) -> Result<bool> {
        self.document.dom().matches_selector(self.node, selector)
    }

    /// Fires `event_type` with this element as the originating target.
    pub fn dispatch(&self, event_type: &str) -> Result<Event> {
        self.document.dispatch_event(self.node, event_type)
    }

    pub fn click(&self) -> Result<Event> {
        self.dispatch("click")
    }

    pub fn text(&self) -> String {
        self.document.dom().text_content(self.node)
    }

    pub fn inner_html(&self) -> Result<String> {
        self.document.dom().inner_html(self.node)
    }

    pub fn outer_html(&self) -> String {
        self.document.dom().dump_node(self.node)
    }

    pub fn classes(&self) -> Vec<String> {
        self.document.dom().classes(self.node)
    }

    pub fn has_class(&self, class_name: &str) -> bool {
        self.document.dom().class_contains(self.node, class_name)
    }

    pub fn attribute(&self, name: &str) -> Option<String> {
        self.document.dom().attr(self.node, name)
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.document.dom().has_attr(self.node, name)
    }

    /// All attributes as `(name, value)` pairs sorted by name.
    pub fn attributes(&self) -> Vec<(String, String)> {
        self.document.dom().attrs(self.node)
    }

    pub fn style(&self, name: &str) -> Result<String> {
        self.document.dom().style_get(self.node, name)
    }

    pub fn set_text(&self, text: &str) -> Result<&Self> {
        self.document
            .with_dom_mut(|dom| dom.set_text_content(self.node, text))?;
        Ok(self)
    }

    pub fn set_inner_html(&self, markup: &str) -> Result<&Self> {
        self.document
            .with_dom_mut(|dom| dom.set_inner_html(self.node, markup))?;
        Ok(self)
    }

    pub fn set_class(&self, names: &[&str]) -> Result<&Self> {
        self.document.with_dom_mut(|dom| {
            names
                .iter()
                .try_for_each(|name| dom.class_add(self.node, name))
        })?;
        Ok(self)
    }

    pub fn remove_class(&self, names: &[&str]) -> Result<&Self> {
        self.document.with_dom_mut(|dom| {
            names
                .iter()
                .try_for_each(|name| dom.class_remove(self.node, name))
        })?;
        Ok(self)
    }

    pub fn set_attribute(&self, name: &str, value: &str) -> Result<&Self> {
        self.document
            .with_dom_mut(|dom| dom.set_attr(self.node, name, value))?;
        Ok(self)
    }

    pub fn remove_attribute(&self, name: &str) -> Result<&Self> {
        self.document
            .with_dom_mut(|dom| dom.remove_attr(self.node, name))?;
        Ok(self)
    }

    /// Sets one inline style declaration; an empty value removes it.
    pub fn set_style(&self, name: &str, value: &str) -> Result<&Self> {
        self.document
            .with_dom_mut(|dom| dom.style_set(self.node, name, value))?;
        Ok(self)
    }
}
