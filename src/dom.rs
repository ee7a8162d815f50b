use super::*;

mod form_controls;
mod selector_matching;
mod serialize;
mod tree_mutation;

/// Arena of parsed nodes. `NodeId(0)` is the document.
///
/// Nodes are never freed: removing a subtree only unlinks it, so ids held by
/// listeners or pending lookups stay valid and can be checked with
/// [`Dom::is_connected`].
#[derive(Debug, Clone)]
pub(crate) struct Dom {
    pub(crate) nodes: Vec<Node>,
    pub(crate) root: NodeId,
    ids: HashMap<String, Vec<NodeId>>,
}

/// Pre-order walk over a subtree, start node first.
pub(crate) struct Preorder<'a> {
    dom: &'a Dom,
    pending: Vec<NodeId>,
}

impl Iterator for Preorder<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let node = self.pending.pop()?;
        let children = &self.dom.nodes[node.0].children;
        self.pending.extend(children.iter().rev().copied());
        Some(node)
    }
}

impl Element {
    pub(crate) fn class_list(&self) -> impl Iterator<Item = &str> {
        self.attrs
            .get("class")
            .map(String::as_str)
            .unwrap_or_default()
            .split_ascii_whitespace()
    }

    pub(crate) fn has_class(&self, class_name: &str) -> bool {
        self.class_list().any(|token| token == class_name)
    }
}

impl Dom {
    pub(crate) fn new() -> Self {
        Self {
            nodes: vec![Node {
                parent: None,
                children: Vec::new(),
                node_type: NodeType::Document,
            }],
            root: NodeId(0),
            ids: HashMap::new(),
        }
    }

    fn push_node(&mut self, parent: Option<NodeId>, node_type: NodeType) -> NodeId {
        let node = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent,
            children: Vec::new(),
            node_type,
        });
        if let Some(parent) = parent {
            self.nodes[parent.0].children.push(node);
        }
        node
    }

    /// Appends a parsed element. The id index is updated on the spot so the
    /// parser can resolve ids before the tree is finished.
    pub(crate) fn create_element(
        &mut self,
        parent: NodeId,
        tag_name: String,
        attrs: HashMap<String, String>,
    ) -> NodeId {
        let id_attr = attrs.get("id").filter(|id| !id.is_empty()).cloned();
        let value = attrs.get("value").cloned().unwrap_or_default();
        let node = self.push_node(
            Some(parent),
            NodeType::Element(Element {
                tag_name,
                attrs,
                value,
            }),
        );
        if let Some(id_attr) = id_attr {
            self.ids.entry(id_attr).or_default().push(node);
        }
        node
    }

    pub(crate) fn create_detached_element(&mut self, tag_name: &str) -> NodeId {
        self.push_node(
            None,
            NodeType::Element(Element {
                tag_name: tag_name.to_ascii_lowercase(),
                attrs: HashMap::new(),
                value: String::new(),
            }),
        )
    }

    pub(crate) fn create_text(&mut self, parent: NodeId, text: String) -> NodeId {
        self.push_node(Some(parent), NodeType::Text(text))
    }

    pub(crate) fn element(&self, node_id: NodeId) -> Option<&Element> {
        if let NodeType::Element(element) = &self.nodes.get(node_id.0)?.node_type {
            return Some(element);
        }
        None
    }

    pub(crate) fn element_mut(&mut self, node_id: NodeId) -> Option<&mut Element> {
        if let NodeType::Element(element) = &mut self.nodes.get_mut(node_id.0)?.node_type {
            return Some(element);
        }
        None
    }

    fn element_or_err(&mut self, node_id: NodeId, operation: &str) -> Result<&mut Element> {
        self.element_mut(node_id)
            .ok_or_else(|| Error::Dom(format!("{operation} target is not an element")))
    }

    pub(crate) fn tag_name(&self, node_id: NodeId) -> Option<&str> {
        Some(self.element(node_id)?.tag_name.as_str())
    }

    pub(crate) fn is_tag(&self, node_id: NodeId, tag: &str) -> bool {
        self.tag_name(node_id)
            .is_some_and(|name| name.eq_ignore_ascii_case(tag))
    }

    pub(crate) fn parent(&self, node_id: NodeId) -> Option<NodeId> {
        self.nodes.get(node_id.0)?.parent
    }

    /// Parent, grandparent and so on up to the document.
    pub(crate) fn ancestors(&self, node_id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(node_id), |node| self.parent(*node))
    }

    pub(crate) fn is_descendant_of(&self, node_id: NodeId, ancestor: NodeId) -> bool {
        self.ancestors(node_id).any(|node| node == ancestor)
    }

    pub(crate) fn is_connected(&self, node_id: NodeId) -> bool {
        node_id == self.root || self.is_descendant_of(node_id, self.root)
    }

    pub(crate) fn preorder(&self, start: NodeId) -> Preorder<'_> {
        Preorder {
            dom: self,
            pending: vec![start],
        }
    }

    /// Elements of the subtree rooted at `node_id`, the root included.
    pub(crate) fn subtree_elements(&self, node_id: NodeId) -> Vec<NodeId> {
        self.preorder(node_id)
            .filter(|node| self.element(*node).is_some())
            .collect()
    }

    /// Elements strictly below `node_id`, in document order.
    pub(crate) fn descendant_elements(&self, node_id: NodeId) -> Vec<NodeId> {
        self.preorder(node_id)
            .skip(1)
            .filter(|node| self.element(*node).is_some())
            .collect()
    }

    pub(crate) fn child_elements(&self, node_id: NodeId) -> Vec<NodeId> {
        self.nodes[node_id.0]
            .children
            .iter()
            .copied()
            .filter(|child| self.element(*child).is_some())
            .collect()
    }

    pub(crate) fn by_id(&self, id: &str) -> Option<NodeId> {
        self.ids.get(id)?.first().copied()
    }

    pub(crate) fn elements_with_id(&self, id: &str) -> &[NodeId] {
        self.ids.get(id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Re-indexes connected elements by `id`. Detached subtrees drop out.
    pub(crate) fn rebuild_id_index(&mut self) {
        let mut ids: HashMap<String, Vec<NodeId>> = HashMap::new();
        for node in self.subtree_elements(self.root) {
            match self.attr_str(node, "id") {
                Some(id) if !id.is_empty() => ids.entry(id.to_string()).or_default().push(node),
                _ => {}
            }
        }
        self.ids = ids;
    }

    fn attr_str(&self, node_id: NodeId, name: &str) -> Option<&str> {
        self.element(node_id)?.attrs.get(name).map(String::as_str)
    }

    pub(crate) fn attr(&self, node_id: NodeId, name: &str) -> Option<String> {
        self.attr_str(node_id, name).map(str::to_string)
    }

    pub(crate) fn has_attr(&self, node_id: NodeId, name: &str) -> bool {
        self.attr_str(node_id, name).is_some()
    }

    pub(crate) fn set_attr(&mut self, node_id: NodeId, name: &str, value: &str) -> Result<()> {
        let name = name.to_ascii_lowercase();
        let element = self.element_or_err(node_id, "setAttribute")?;
        if name == "value" {
            element.value = value.to_string();
        }
        let id_changed = element.attrs.insert(name.clone(), value.to_string()).as_deref()
            != Some(value)
            && name == "id";
        // Detached nodes are indexed when they are inserted.
        if id_changed && self.is_connected(node_id) {
            self.rebuild_id_index();
        }
        Ok(())
    }

    pub(crate) fn remove_attr(&mut self, node_id: NodeId, name: &str) -> Result<()> {
        let removed = self
            .element_or_err(node_id, "removeAttribute")?
            .attrs
            .remove(name);
        if removed.is_some() && name == "id" && self.is_connected(node_id) {
            self.rebuild_id_index();
        }
        Ok(())
    }

    pub(crate) fn dataset_get(&self, node_id: NodeId, key: &str) -> Option<String> {
        self.attr(node_id, &format!("data-{key}"))
    }

    pub(crate) fn class_contains(&self, node_id: NodeId, class_name: &str) -> bool {
        self.element(node_id)
            .is_some_and(|element| element.has_class(class_name))
    }

    fn edit_classes(
        &mut self,
        node_id: NodeId,
        edit: impl FnOnce(&mut Vec<String>),
    ) -> Result<()> {
        let element = self.element_or_err(node_id, "classList")?;
        let mut classes: Vec<String> = element.class_list().map(str::to_string).collect();
        edit(&mut classes);
        if classes.is_empty() {
            element.attrs.remove("class");
        } else {
            element.attrs.insert("class".into(), classes.join(" "));
        }
        Ok(())
    }

    pub(crate) fn class_add(&mut self, node_id: NodeId, class_name: &str) -> Result<()> {
        self.edit_classes(node_id, |classes| {
            if !classes.iter().any(|name| name == class_name) {
                classes.push(class_name.to_string());
            }
        })
    }

    pub(crate) fn class_remove(&mut self, node_id: NodeId, class_name: &str) -> Result<()> {
        self.edit_classes(node_id, |classes| classes.retain(|name| name != class_name))
    }

    pub(crate) fn text_content(&self, node_id: NodeId) -> String {
        self.preorder(node_id)
            .filter_map(|node| match &self.nodes[node.0].node_type {
                NodeType::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn set_text_content(&mut self, node_id: NodeId, value: &str) -> Result<()> {
        self.remove_all_children(node_id)?;
        if !value.is_empty() {
            self.create_text(node_id, value.to_string());
        }
        Ok(())
    }
}
