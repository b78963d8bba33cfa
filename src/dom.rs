use super::*;

const STACK_RED_ZONE: usize = 64 * 1024;
const STACK_GROW_SIZE: usize = 32 * 1024 * 1024;

/// Slot of a node inside a [`Document`] arena. Slots of removed nodes are
/// reused; the generation keeps an id from outliving its node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: usize,
    generation: u32,
}

#[derive(Debug, Clone)]
pub(crate) enum NodeKind {
    Document,
    Element(ElementData),
    Text(String),
}

#[derive(Debug, Clone)]
pub(crate) struct Node {
    generation: u32,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    kind: NodeKind,
}

#[derive(Debug, Clone)]
pub(crate) struct ElementData {
    pub(crate) tag_name: String,
    pub(crate) attrs: BTreeMap<String, String>,
}

impl ElementData {
    pub(crate) fn class_list(&self) -> Vec<String> {
        self.attrs
            .get("class")
            .map(|value| value.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }

    pub(crate) fn has_class(&self, class_name: &str) -> bool {
        self.attrs
            .get("class")
            .is_some_and(|value| value.split_whitespace().any(|token| token == class_name))
    }

    fn store_class_list(&mut self, classes: &[String]) {
        if classes.is_empty() {
            self.attrs.remove("class");
        } else {
            self.attrs.insert("class".into(), classes.join(" "));
        }
    }

    /// Inline `style` as ordered `(property, value)` pairs; later duplicates
    /// override earlier ones in place.
    fn style_declarations(&self) -> Vec<(String, String)> {
        let mut decls: Vec<(String, String)> = Vec::new();
        let Some(style) = self.attrs.get("style") else {
            return decls;
        };
        for (property, value) in style
            .split(';')
            .filter_map(|decl| decl.split_once(':'))
            .map(|(property, value)| (property.trim().to_ascii_lowercase(), value.trim()))
            .filter(|(property, _)| !property.is_empty())
        {
            match decls.iter_mut().find(|(existing, _)| *existing == property) {
                Some(slot) => slot.1 = value.to_string(),
                None => decls.push((property, value.to_string())),
            }
        }
        decls
    }

    fn store_style_declarations(&mut self, decls: &[(String, String)]) {
        if decls.is_empty() {
            self.attrs.remove("style");
            return;
        }
        let serialized = decls
            .iter()
            .map(|(property, value)| format!("{property}: {value};"))
            .collect::<Vec<_>>()
            .join(" ");
        self.attrs.insert("style".into(), serialized);
    }
}

/// Node arena. Slot 0 is the document node. Subtrees removed by
/// `set_text_content`/`set_inner_html` go back on the free list.
#[derive(Debug, Clone)]
pub(crate) struct Dom {
    pub(crate) nodes: Vec<Node>,
    free: Vec<usize>,
    released: u64,
    pub(crate) root: NodeId,
}

impl Dom {
    pub(crate) fn new() -> Self {
        Self {
            nodes: vec![Node {
                generation: 0,
                parent: None,
                children: Vec::new(),
                kind: NodeKind::Document,
            }],
            free: Vec::new(),
            released: 0,
            root: NodeId {
                index: 0,
                generation: 0,
            },
        }
    }

    fn node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes
            .get(node_id.index)
            .filter(|node| node.generation == node_id.generation)
    }

    fn child_ids(&self, node_id: NodeId) -> &[NodeId] {
        self.node(node_id)
            .map(|node| node.children.as_slice())
            .unwrap_or_default()
    }

    fn push_node(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.nodes[index];
                slot.parent = Some(parent);
                slot.children.clear();
                slot.kind = kind;
                NodeId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                self.nodes.push(Node {
                    generation: 0,
                    parent: Some(parent),
                    children: Vec::new(),
                    kind,
                });
                NodeId {
                    index: self.nodes.len() - 1,
                    generation: 0,
                }
            }
        };
        self.nodes[parent.index].children.push(id);
        id
    }

    /// Returns the subtree under `node_id` (inclusive) to the free list. Ids
    /// pointing into it stop resolving.
    fn release(&mut self, node_id: NodeId) {
        let Some(node) = self.nodes.get_mut(node_id.index) else {
            return;
        };
        if node.generation != node_id.generation {
            return;
        }
        node.generation = node.generation.wrapping_add(1);
        node.parent = None;
        node.kind = NodeKind::Text(String::new());
        let children = std::mem::take(&mut node.children);
        self.free.push(node_id.index);
        self.released += 1;
        for child in children {
            stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || self.release(child));
        }
    }

    pub(crate) fn released_count(&self) -> u64 {
        self.released
    }

    pub(crate) fn live_node_count(&self) -> usize {
        self.nodes.len() - self.free.len()
    }

    pub(crate) fn create_element(
        &mut self,
        parent: NodeId,
        tag_name: String,
        attrs: BTreeMap<String, String>,
    ) -> NodeId {
        self.push_node(parent, NodeKind::Element(ElementData { tag_name, attrs }))
    }

    pub(crate) fn create_text(&mut self, parent: NodeId, text: String) -> NodeId {
        self.push_node(parent, NodeKind::Text(text))
    }

    pub(crate) fn is_valid_node(&self, node_id: NodeId) -> bool {
        self.node(node_id).is_some()
    }

    pub(crate) fn element(&self, node_id: NodeId) -> Option<&ElementData> {
        match &self.node(node_id)?.kind {
            NodeKind::Element(data) => Some(data),
            NodeKind::Document | NodeKind::Text(_) => None,
        }
    }

    fn element_mut(&mut self, node_id: NodeId, op: &str) -> Result<&mut ElementData> {
        match self
            .nodes
            .get_mut(node_id.index)
            .filter(|node| node.generation == node_id.generation)
            .map(|node| &mut node.kind)
        {
            Some(NodeKind::Element(data)) => Ok(data),
            _ => Err(Error::Dom(format!("{op} target is not an element"))),
        }
    }

    pub(crate) fn tag_name(&self, node_id: NodeId) -> Option<&str> {
        self.element(node_id).map(|data| data.tag_name.as_str())
    }

    pub(crate) fn parent(&self, node_id: NodeId) -> Option<NodeId> {
        self.node(node_id)?.parent
    }

    pub(crate) fn is_descendant_of(&self, node_id: NodeId, ancestor: NodeId) -> bool {
        std::iter::successors(self.parent(node_id), |node| self.parent(*node))
            .any(|node| node == ancestor)
    }

    /// Inclusive containment: a node contains itself.
    pub(crate) fn contains(&self, ancestor: NodeId, node_id: NodeId) -> bool {
        ancestor == node_id || self.is_descendant_of(node_id, ancestor)
    }

    /// Element descendants of `scope` (exclusive), in document order.
    pub(crate) fn descendant_elements(&self, scope: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.push_descendant_elements(scope, &mut out);
        out
    }

    fn push_descendant_elements(&self, node_id: NodeId, out: &mut Vec<NodeId>) {
        for child in self.child_ids(node_id) {
            if self.element(*child).is_some() {
                out.push(*child);
            }
            stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
                self.push_descendant_elements(*child, out)
            });
        }
    }

    /// First element below `scope` whose `name` attribute equals `value`.
    pub(crate) fn find_descendant_by_attr(
        &self,
        scope: NodeId,
        name: &str,
        value: &str,
    ) -> Option<NodeId> {
        self.descendant_elements(scope)
            .into_iter()
            .find(|node| self.attr(*node, name).as_deref() == Some(value))
    }

    pub(crate) fn text_content(&self, node_id: NodeId) -> String {
        let mut out = String::new();
        self.push_text(node_id, &mut out);
        out
    }

    fn push_text(&self, node_id: NodeId, out: &mut String) {
        let Some(node) = self.node(node_id) else {
            return;
        };
        if let NodeKind::Text(text) = &node.kind {
            out.push_str(text);
            return;
        }
        for child in &node.children {
            stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
                self.push_text(*child, out)
            });
        }
    }

    pub(crate) fn set_text_content(&mut self, node_id: NodeId, value: &str) -> Result<()> {
        self.element_mut(node_id, "textContent")?;
        self.clear_children(node_id);
        if !value.is_empty() {
            self.create_text(node_id, value.to_string());
        }
        Ok(())
    }

    pub(crate) fn inner_html(&self, node_id: NodeId) -> Result<String> {
        if self.element(node_id).is_none() {
            return Err(Error::Dom("innerHTML target is not an element".into()));
        }
        let mut out = String::new();
        for child in self.child_ids(node_id) {
            self.serialize_into(*child, &mut out);
        }
        Ok(out)
    }

    /// Replaces the children of `node_id` with the parsed `markup`. The old
    /// children are released.
    pub(crate) fn set_inner_html(&mut self, node_id: NodeId, markup: &str) -> Result<()> {
        self.element_mut(node_id, "innerHTML")?;
        let fragment = html::parse_html(markup)?;
        self.clear_children(node_id);
        for child in fragment.child_ids(fragment.root) {
            self.adopt(&fragment, *child, node_id);
        }
        Ok(())
    }

    fn clear_children(&mut self, node_id: NodeId) {
        let children = std::mem::take(&mut self.nodes[node_id.index].children);
        for child in children {
            self.release(child);
        }
    }

    fn adopt(&mut self, source: &Dom, source_node: NodeId, parent: NodeId) {
        let Some(kind) = source.node(source_node).map(|node| node.kind.clone()) else {
            return;
        };
        if matches!(kind, NodeKind::Document) {
            return;
        }
        let node = self.push_node(parent, kind);
        for child in source.child_ids(source_node) {
            stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
                self.adopt(source, *child, node)
            });
        }
    }

    pub(crate) fn attr(&self, node_id: NodeId, name: &str) -> Option<String> {
        self.element(node_id)?
            .attrs
            .get(&name.to_ascii_lowercase())
            .cloned()
    }

    pub(crate) fn has_attr(&self, node_id: NodeId, name: &str) -> bool {
        self.element(node_id)
            .is_some_and(|data| data.attrs.contains_key(&name.to_ascii_lowercase()))
    }

    pub(crate) fn attrs(&self, node_id: NodeId) -> Vec<(String, String)> {
        self.element(node_id)
            .map(|data| data.attrs.clone().into_iter().collect())
            .unwrap_or_default()
    }

    pub(crate) fn set_attr(&mut self, node_id: NodeId, name: &str, value: &str) -> Result<()> {
        self.element_mut(node_id, "setAttribute")?
            .attrs
            .insert(name.to_ascii_lowercase(), value.to_string());
        Ok(())
    }

    pub(crate) fn remove_attr(&mut self, node_id: NodeId, name: &str) -> Result<()> {
        self.element_mut(node_id, "removeAttribute")?
            .attrs
            .remove(&name.to_ascii_lowercase());
        Ok(())
    }

    pub(crate) fn classes(&self, node_id: NodeId) -> Vec<String> {
        self.element(node_id)
            .map(ElementData::class_list)
            .unwrap_or_default()
    }

    pub(crate) fn class_contains(&self, node_id: NodeId, class_name: &str) -> bool {
        self.element(node_id)
            .is_some_and(|data| data.has_class(class_name))
    }

    pub(crate) fn class_add(&mut self, node_id: NodeId, class_name: &str) -> Result<()> {
        let data = self.element_mut(node_id, "classList")?;
        let mut classes = data.class_list();
        if !classes.iter().any(|existing| existing == class_name) {
            classes.push(class_name.to_string());
        }
        data.store_class_list(&classes);
        Ok(())
    }

    pub(crate) fn class_remove(&mut self, node_id: NodeId, class_name: &str) -> Result<()> {
        let data = self.element_mut(node_id, "classList")?;
        let mut classes = data.class_list();
        classes.retain(|existing| existing != class_name);
        data.store_class_list(&classes);
        Ok(())
    }

    /// Reads one inline style property; `backgroundColor` and
    /// `background-color` name the same property.
    pub(crate) fn style_get(&self, node_id: NodeId, property: &str) -> Result<String> {
        let data = self
            .element(node_id)
            .ok_or_else(|| Error::Dom("style target is not an element".into()))?;
        let property = css_property_name(property);
        Ok(data
            .style_declarations()
            .into_iter()
            .find_map(|(name, value)| (name == property).then_some(value))
            .unwrap_or_default())
    }

    pub(crate) fn style_set(&mut self, node_id: NodeId, property: &str, value: &str) -> Result<()> {
        let property = css_property_name(property);
        let data = self.element_mut(node_id, "style")?;
        let mut decls = data.style_declarations();
        let existing = decls.iter().position(|(name, _)| *name == property);
        match (existing, value.is_empty()) {
            (Some(index), true) => {
                decls.remove(index);
            }
            (Some(index), false) => decls[index].1 = value.to_string(),
            (None, false) => decls.push((property, value.to_string())),
            (None, true) => {}
        }
        data.store_style_declarations(&decls);
        Ok(())
    }

    pub(crate) fn dump_node(&self, node_id: NodeId) -> String {
        let mut out = String::new();
        self.serialize_into(node_id, &mut out);
        out
    }

    fn serialize_into(&self, node_id: NodeId, out: &mut String) {
        let Some(node) = self.node(node_id) else {
            return;
        };
        let data = match &node.kind {
            NodeKind::Text(text) => {
                out.push_str(&escape_text(text));
                return;
            }
            NodeKind::Document => None,
            NodeKind::Element(data) => Some(data),
        };

        if let Some(data) = data {
            out.push('<');
            out.push_str(&data.tag_name);
            for (name, value) in &data.attrs {
                out.push_str(&format!(" {name}=\"{}\"", escape_attr(value)));
            }
            out.push('>');
            if html::is_void_tag(&data.tag_name) {
                return;
            }
        }

        for child in &node.children {
            stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
                self.serialize_into(*child, out)
            });
        }

        if let Some(data) = data {
            out.push_str(&format!("</{}>", data.tag_name));
        }
    }
}

/// `backgroundColor` -> `background-color`; kebab-case names pass through.
fn css_property_name(property: &str) -> String {
    let mut out = String::with_capacity(property.len() + 4);
    for ch in property.chars() {
        if ch.is_ascii_uppercase() {
            out.push('-');
        }
        out.push(ch.to_ascii_lowercase());
    }
    out
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attr(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}
