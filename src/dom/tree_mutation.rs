use super::*;

impl Dom {
    pub(crate) fn can_have_children(&self, node_id: NodeId) -> bool {
        match &self.nodes[node_id.0].node_type {
            NodeType::Document => true,
            NodeType::Element(element) => !is_void_tag(&element.tag_name),
            NodeType::Text(_) => false,
        }
    }

    fn detach(&mut self, node: NodeId) {
        if let Some(old_parent) = self.nodes[node.0].parent.take() {
            self.nodes[old_parent.0].children.retain(|id| *id != node);
        }
    }

    pub(crate) fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        if !self.can_have_children(parent) {
            return Err(Error::Dom("append target cannot have children".into()));
        }
        if child == parent || self.is_descendant_of(parent, child) {
            return Err(Error::Dom("append would create a cycle".into()));
        }
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
        self.rebuild_id_index();
        Ok(())
    }

    /// Inserts `child` as the previous sibling of `reference`.
    pub(crate) fn insert_before(&mut self, reference: NodeId, child: NodeId) -> Result<()> {
        let parent = self
            .parent(reference)
            .ok_or_else(|| Error::Dom("insertBefore reference is detached".into()))?;
        if child == reference {
            return Ok(());
        }
        if child == parent || self.is_descendant_of(parent, child) {
            return Err(Error::Dom("insertBefore would create a cycle".into()));
        }
        self.detach(child);
        let position = self.nodes[parent.0]
            .children
            .iter()
            .position(|id| *id == reference)
            .ok_or_else(|| Error::Dom("insertBefore reference is not a child".into()))?;
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.insert(position, child);
        self.rebuild_id_index();
        Ok(())
    }

    pub(crate) fn remove_all_children(&mut self, node_id: NodeId) -> Result<()> {
        if self.element(node_id).is_none() {
            return Err(Error::Dom("cannot empty a non-element node".into()));
        }
        let old_children = std::mem::take(&mut self.nodes[node_id.0].children);
        for child in old_children {
            self.nodes[child.0].parent = None;
        }
        self.rebuild_id_index();
        Ok(())
    }

    /// Deep copy of `source`. The copy is detached; attribute values, text and
    /// form control values are carried over verbatim.
    pub(crate) fn clone_subtree(&mut self, source: NodeId) -> NodeId {
        self.copy_under(source, None)
    }

    fn copy_under(&mut self, source: NodeId, parent: Option<NodeId>) -> NodeId {
        stacker::maybe_grow(32 * 1024, 1024 * 1024, || {
            let node_type = match &self.nodes[source.0].node_type {
                NodeType::Document => NodeType::Element(Element {
                    tag_name: "div".into(),
                    attrs: HashMap::new(),
                    value: String::new(),
                }),
                other => other.clone(),
            };
            let copy = self.push_node(parent, node_type);
            for child in self.nodes[source.0].children.clone() {
                self.copy_under(child, Some(copy));
            }
            copy
        })
    }
}
