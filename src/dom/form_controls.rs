use super::*;

impl Dom {
    pub(crate) fn value(&self, node_id: NodeId) -> Result<String> {
        let element = self
            .element(node_id)
            .ok_or_else(|| Error::Dom("value target is not an element".into()))?;
        if element.tag_name.eq_ignore_ascii_case("select") {
            return Ok(self.select_value_from_options(node_id));
        }
        if element.tag_name.eq_ignore_ascii_case("textarea") {
            return Ok(self.text_content(node_id));
        }
        if element.tag_name.eq_ignore_ascii_case("option") {
            return Ok(self.option_effective_value(node_id));
        }
        Ok(element.value.clone())
    }

    /// Sets the live value of a control. For a select this picks the first
    /// option with the requested value and reports whether one matched.
    pub(crate) fn set_value(&mut self, node_id: NodeId, value: &str) -> Result<bool> {
        if self.is_tag(node_id, "select") {
            return self.set_select_value(node_id, value);
        }
        if self.is_tag(node_id, "textarea") {
            self.set_text_content(node_id, value)?;
            return Ok(true);
        }
        let element = self
            .element_mut(node_id)
            .ok_or_else(|| Error::Dom("value target is not an element".into()))?;
        element.value = value.to_string();
        Ok(true)
    }

    pub(crate) fn select_options(&self, select_node: NodeId) -> Vec<NodeId> {
        let mut options = self.descendant_elements(select_node);
        options.retain(|node| self.is_tag(*node, "option"));
        options
    }

    pub(crate) fn option_effective_value(&self, option_node: NodeId) -> String {
        self.attr(option_node, "value")
            .unwrap_or_else(|| self.option_label(option_node))
    }

    pub(crate) fn option_label(&self, option_node: NodeId) -> String {
        self.text_content(option_node).trim().to_string()
    }

    pub(crate) fn select_value_from_options(&self, select_node: NodeId) -> String {
        let options = self.select_options(select_node);
        options
            .iter()
            .copied()
            .find(|option| self.has_attr(*option, "selected"))
            .or_else(|| options.first().copied())
            .map(|option| self.option_effective_value(option))
            .unwrap_or_default()
    }

    pub(crate) fn set_select_value(&mut self, select_node: NodeId, requested: &str) -> Result<bool> {
        let options = self.select_options(select_node);
        let chosen = options
            .iter()
            .copied()
            .find(|option| self.option_effective_value(*option) == requested);
        let Some(chosen) = chosen else {
            return Ok(false);
        };
        for option in options {
            if option == chosen {
                self.set_attr(option, "selected", "selected")?;
            } else {
                self.remove_attr(option, "selected")?;
            }
        }
        Ok(true)
    }

    pub(crate) fn append_option(
        &mut self,
        select_node: NodeId,
        value: &str,
        label: &str,
    ) -> Result<NodeId> {
        let option = self.create_detached_element("option");
        self.set_attr(option, "value", value)?;
        if !label.is_empty() {
            self.create_text(option, label.to_string());
        }
        self.append_child(select_node, option)?;
        Ok(option)
    }
}
