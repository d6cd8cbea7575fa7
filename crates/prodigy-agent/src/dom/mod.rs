//! In-memory model of the host page.
//!
//! An arena of nodes addressed by [`NodeId`]. Nodes are never freed: a
//! removed subtree simply loses its parent and reports
//! [`Document::is_connected`] as `false`, which is what lets the registry
//! hold plain ids without dangling.
//!
//! Every child-list change under `<body>` is recorded as a
//! [`MutationRecord`] and handed out by [`Document::take_mutations`], the
//! same shape of data a subtree `childList` observer would deliver.

mod fragment;
pub mod selector;

use std::collections::VecDeque;

pub use selector::{Selector, SelectorError};

use fragment::{escape_attr, escape_text, is_raw_text, is_void, tokenize, Token};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone)]
enum NodeData {
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
    },
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone)]
struct Node {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Visible area of the window the page is rendered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub scroll_x: u32,
    pub scroll_y: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            scroll_x: 0,
            scroll_y: 0,
        }
    }
}

/// One child-list change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    pub target: NodeId,
    pub added: Vec<NodeId>,
    pub removed: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
    head: NodeId,
    body: NodeId,
    viewport: Viewport,
    mutations: Vec<MutationRecord>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// An empty `<html><head></head><body></body></html>` page.
    #[must_use]
    pub fn new() -> Self {
        let mut doc = Self {
            nodes: Vec::new(),
            root: NodeId(0),
            head: NodeId(0),
            body: NodeId(0),
            viewport: Viewport::default(),
            mutations: Vec::new(),
        };
        let root = doc.alloc(NodeData::element("html"));
        let head = doc.alloc(NodeData::element("head"));
        let body = doc.alloc(NodeData::element("body"));
        doc.attach(root, head);
        doc.attach(root, body);
        doc.root = root;
        doc.head = head;
        doc.body = body;
        doc
    }

    /// Loads a full page or a bare fragment. A fragment without `<body>`
    /// becomes the body content. Loading records no mutations.
    #[must_use]
    pub fn from_html(html: &str) -> Self {
        let mut doc = Self::new();
        let staging = doc.alloc(NodeData::element("template"));
        doc.build_fragment(staging, html);

        let head_src = doc.find_tag(staging, "head");
        let body_src = doc.find_tag(staging, "body");

        if let Some(src) = head_src {
            doc.adopt(src, doc.head);
        }

        if let Some(src) = body_src {
            doc.adopt(src, doc.body);
        } else {
            let mut loose = Vec::new();
            for child in doc.nodes[staging.0].children.clone() {
                if doc.tag(child) == Some("html") {
                    loose.extend(
                        doc.nodes[child.0]
                            .children
                            .iter()
                            .copied()
                            .filter(|n| Some(*n) != head_src),
                    );
                } else if Some(child) != head_src {
                    loose.push(child);
                }
            }
            let body = doc.body;
            for node in loose {
                doc.attach(body, node);
            }
        }

        doc.mutations.clear();
        doc
    }

    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    #[must_use]
    pub fn head(&self) -> NodeId {
        self.head
    }

    #[must_use]
    pub fn body(&self) -> NodeId {
        self.body
    }

    #[must_use]
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    // ---- construction and mutation ---------------------------------------

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.alloc(NodeData::element(&tag.to_ascii_lowercase()))
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.alloc(NodeData::Text(text.to_owned()))
    }

    /// Appends `child` to `parent`, moving it if it already has a parent.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        if let Some(old) = self.detach(child) {
            self.record(old, Vec::new(), vec![child]);
        }
        self.attach(parent, child);
        self.record(parent, vec![child], Vec::new());
    }

    /// Detaches `node` from its parent. No-op for detached nodes.
    pub fn remove(&mut self, node: NodeId) {
        if let Some(parent) = self.detach(node) {
            self.record(parent, Vec::new(), vec![node]);
        }
    }

    /// Replaces the children of `node` with the parsed `html`.
    pub fn set_inner_html(&mut self, node: NodeId, html: &str) {
        let removed = std::mem::take(&mut self.nodes[node.0].children);
        for child in &removed {
            self.nodes[child.0].parent = None;
        }
        let added = self.build_fragment(node, html);
        if !added.is_empty() || !removed.is_empty() {
            self.record(node, added, removed);
        }
    }

    pub fn set_attr(&mut self, node: NodeId, name: &str, value: &str) {
        if let NodeData::Element { attrs, .. } = &mut self.nodes[node.0].data {
            let name = name.to_ascii_lowercase();
            match attrs.iter_mut().find(|(k, _)| *k == name) {
                Some((_, v)) => value.clone_into(v),
                None => attrs.push((name, value.to_owned())),
            }
        }
    }

    pub fn remove_attr(&mut self, node: NodeId, name: &str) {
        if let NodeData::Element { attrs, .. } = &mut self.nodes[node.0].data {
            attrs.retain(|(k, _)| k != name);
        }
    }

    pub fn add_class(&mut self, node: NodeId, class: &str) {
        if self.has_class(node, class) {
            return;
        }
        let classes = match self.attr(node, "class") {
            Some(existing) if !existing.trim().is_empty() => format!("{} {class}", existing.trim()),
            _ => class.to_owned(),
        };
        self.set_attr(node, "class", &classes);
    }

    /// Sets one declaration of the inline `style` attribute, keeping the
    /// others.
    pub fn set_style(&mut self, node: NodeId, property: &str, value: &str) {
        let mut declarations = parse_style(self.attr(node, "style").unwrap_or_default());
        match declarations.iter_mut().find(|(p, _)| p == property) {
            Some((_, v)) => value.clone_into(v),
            None => declarations.push((property.to_owned(), value.to_owned())),
        }
        let style = declarations
            .iter()
            .map(|(p, v)| format!("{p}: {v};"))
            .collect::<Vec<_>>()
            .join(" ");
        self.set_attr(node, "style", &style);
    }

    /// Drains the mutation records collected since the last call.
    pub fn take_mutations(&mut self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.mutations)
    }

    // ---- queries ---------------------------------------------------------

    #[must_use]
    pub fn tag(&self, node: NodeId) -> Option<&str> {
        match &self.nodes[node.0].data {
            NodeData::Element { tag, .. } => Some(tag),
            _ => None,
        }
    }

    #[must_use]
    pub fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        match &self.nodes[node.0].data {
            NodeData::Element { attrs, .. } => attrs
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }

    #[must_use]
    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.attr(node, "class")
            .is_some_and(|list| list.split_whitespace().any(|c| c == class))
    }

    /// Value of one inline style declaration.
    #[must_use]
    pub fn style(&self, node: NodeId, property: &str) -> Option<String> {
        parse_style(self.attr(node, "style")?)
            .into_iter()
            .find(|(p, _)| p == property)
            .map(|(_, v)| v)
    }

    #[must_use]
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0].parent
    }

    #[must_use]
    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node.0].children
    }

    /// Whether `node` is reachable from the document root.
    #[must_use]
    pub fn is_connected(&self, node: NodeId) -> bool {
        self.is_within(node, self.root)
    }

    /// Whether `node` is `ancestor` or one of its descendants.
    #[must_use]
    pub fn is_within(&self, node: NodeId, ancestor: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(n) = current {
            if n == ancestor {
                return true;
            }
            current = self.nodes[n.0].parent;
        }
        false
    }

    /// Descendants of `node` in document order, excluding `node`.
    #[must_use]
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.nodes[node.0].children.iter().rev().copied().collect();
        while let Some(n) = stack.pop() {
            out.push(n);
            stack.extend(self.nodes[n.0].children.iter().rev().copied());
        }
        out
    }

    /// Descendant elements of `root` matching `selector`.
    #[must_use]
    pub fn select(&self, root: NodeId, selector: &Selector) -> Vec<NodeId> {
        self.descendants(root)
            .into_iter()
            .filter(|n| selector.matches(self, *n))
            .collect()
    }

    /// Like [`Document::select`] but `root` itself is a candidate too.
    #[must_use]
    pub fn select_inclusive(&self, root: NodeId, selector: &Selector) -> Vec<NodeId> {
        let mut out = Vec::new();
        if selector.matches(self, root) {
            out.push(root);
        }
        out.extend(self.select(root, selector));
        out
    }

    /// Parses `selector` and runs [`Document::select`].
    ///
    /// # Errors
    ///
    /// Returns [`SelectorError`] if `selector` is not supported syntax.
    pub fn query(&self, root: NodeId, selector: &str) -> Result<Vec<NodeId>, SelectorError> {
        let selector: Selector = selector.parse()?;
        Ok(self.select(root, &selector))
    }

    /// First connected element with the given `id` attribute.
    #[must_use]
    pub fn element_by_id(&self, id: &str) -> Option<NodeId> {
        let mut queue = VecDeque::from([self.root]);
        while let Some(n) = queue.pop_front() {
            if self.attr(n, "id") == Some(id) {
                return Some(n);
            }
            queue.extend(self.nodes[n.0].children.iter().copied());
        }
        None
    }

    /// `href`s of the `<link>` elements in `<head>`.
    #[must_use]
    pub fn head_link_hrefs(&self) -> Vec<String> {
        self.descendants(self.head)
            .into_iter()
            .filter(|n| self.tag(*n) == Some("link"))
            .filter_map(|n| self.attr(n, "href").map(str::to_owned))
            .collect()
    }

    #[must_use]
    pub fn inner_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        for child in &self.nodes[node.0].children {
            self.write_node(*child, &mut out);
        }
        out
    }

    #[must_use]
    pub fn outer_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_node(node, &mut out);
        out
    }

    #[must_use]
    pub fn text_content(&self, node: NodeId) -> String {
        match &self.nodes[node.0].data {
            NodeData::Text(text) => text.clone(),
            NodeData::Comment(_) => String::new(),
            NodeData::Element { .. } => self
                .descendants(node)
                .into_iter()
                .filter_map(|n| match &self.nodes[n.0].data {
                    NodeData::Text(text) => Some(text.as_str()),
                    _ => None,
                })
                .collect(),
        }
    }

    pub(crate) fn element(&self, node: NodeId) -> Option<(&str, &[(String, String)])> {
        match &self.nodes[node.0].data {
            NodeData::Element { tag, attrs } => Some((tag, attrs)),
            _ => None,
        }
    }

    // ---- internals -------------------------------------------------------

    fn alloc(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            data,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    fn attach(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    fn detach(&mut self, child: NodeId) -> Option<NodeId> {
        let parent = self.nodes[child.0].parent.take()?;
        self.nodes[parent.0].children.retain(|c| *c != child);
        Some(parent)
    }

    /// Moves all children and attributes of `src` onto `dst`.
    fn adopt(&mut self, src: NodeId, dst: NodeId) {
        let attrs = self
            .element(src)
            .map(|(_, attrs)| attrs.to_vec())
            .unwrap_or_default();
        for (k, v) in attrs {
            self.set_attr(dst, &k, &v);
        }
        for child in self.nodes[src.0].children.clone() {
            self.attach(dst, child);
        }
    }

    fn find_tag(&self, root: NodeId, tag: &str) -> Option<NodeId> {
        self.descendants(root)
            .into_iter()
            .find(|n| self.tag(*n) == Some(tag))
    }

    fn record(&mut self, target: NodeId, added: Vec<NodeId>, removed: Vec<NodeId>) {
        if self.is_within(target, self.body) && self.is_connected(target) {
            self.mutations.push(MutationRecord {
                target,
                added,
                removed,
            });
        }
    }

    /// Parses `html` and appends the result to `parent` without recording.
    /// Returns the top-level nodes created.
    fn build_fragment(&mut self, parent: NodeId, html: &str) -> Vec<NodeId> {
        let mut stack = vec![parent];
        let mut top = Vec::new();

        for token in tokenize(html) {
            let current = stack.last().copied().unwrap_or(parent);
            match token {
                Token::Open {
                    tag,
                    attrs,
                    self_closing,
                } => {
                    let opens_scope = !self_closing && !is_void(&tag);
                    let id = self.alloc(NodeData::Element { tag, attrs });
                    self.attach(current, id);
                    if current == parent {
                        top.push(id);
                    }
                    if opens_scope {
                        stack.push(id);
                    }
                }
                Token::Close(tag) => {
                    if let Some(pos) =
                        (1..stack.len()).rev().find(|&i| self.tag(stack[i]) == Some(tag.as_str()))
                    {
                        stack.truncate(pos);
                    }
                }
                Token::Text(text) => {
                    let id = self.alloc(NodeData::Text(text));
                    self.attach(current, id);
                    if current == parent {
                        top.push(id);
                    }
                }
                Token::Comment(text) => {
                    let id = self.alloc(NodeData::Comment(text));
                    self.attach(current, id);
                    if current == parent {
                        top.push(id);
                    }
                }
            }
        }

        top
    }

    fn write_node(&self, node: NodeId, out: &mut String) {
        match &self.nodes[node.0].data {
            NodeData::Text(text) => {
                let raw = self
                    .parent(node)
                    .and_then(|p| self.tag(p))
                    .is_some_and(is_raw_text);
                if raw {
                    out.push_str(text);
                } else {
                    escape_text(text, out);
                }
            }
            NodeData::Comment(text) => {
                out.push_str("<!--");
                out.push_str(text);
                out.push_str("-->");
            }
            NodeData::Element { tag, attrs } => {
                out.push('<');
                out.push_str(tag);
                for (k, v) in attrs {
                    out.push(' ');
                    out.push_str(k);
                    out.push_str("=\"");
                    escape_attr(v, out);
                    out.push('"');
                }
                out.push('>');
                if is_void(tag) {
                    return;
                }
                for child in &self.nodes[node.0].children {
                    self.write_node(*child, out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }
}

impl NodeData {
    fn element(tag: &str) -> Self {
        NodeData::Element {
            tag: tag.to_owned(),
            attrs: Vec::new(),
        }
    }
}

fn parse_style(style: &str) -> Vec<(String, String)> {
    style
        .split(';')
        .filter_map(|decl| {
            let (prop, value) = decl.split_once(':')?;
            let prop = prop.trim();
            (!prop.is_empty()).then(|| (prop.to_ascii_lowercase(), value.trim().to_owned()))
        })
        .collect()
}

#[cfg(test)]
#[path = "dom_test.rs"]
mod tests;
