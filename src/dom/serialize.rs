use super::*;

impl Dom {
    pub(crate) fn outer_html(&self, node_id: NodeId) -> Result<String> {
        if self.element(node_id).is_none() {
            return Err(Error::Dom("outerHTML target is not an element".into()));
        }
        Ok(self.dump_node(node_id))
    }

    pub(crate) fn inner_html(&self, node_id: NodeId) -> Result<String> {
        if self.element(node_id).is_none() {
            return Err(Error::Dom("innerHTML target is not an element".into()));
        }
        let mut out = String::new();
        self.write_children(node_id, &mut out);
        Ok(out)
    }

    pub(crate) fn dump_node(&self, node_id: NodeId) -> String {
        let mut out = String::new();
        self.write_node(node_id, &mut out);
        out
    }

    fn write_children(&self, node_id: NodeId, out: &mut String) {
        for child in &self.nodes[node_id.0].children {
            self.write_node(*child, out);
        }
    }

    fn write_node(&self, node_id: NodeId, out: &mut String) {
        stacker::maybe_grow(32 * 1024, 1024 * 1024, || {
            match &self.nodes[node_id.0].node_type {
                NodeType::Document => self.write_children(node_id, out),
                NodeType::Text(text) => push_escaped(out, text, false),
                NodeType::Element(element) => {
                    let mut attrs: Vec<_> = element.attrs.iter().collect();
                    attrs.sort_unstable_by(|(left, _), (right, _)| left.cmp(right));
                    out.push('<');
                    out.push_str(&element.tag_name);
                    for (name, value) in attrs {
                        out.push(' ');
                        out.push_str(name);
                        out.push_str("=\"");
                        push_escaped(out, value, true);
                        out.push('"');
                    }
                    out.push('>');
                    if !is_void_tag(&element.tag_name) {
                        self.write_children(node_id, out);
                        out.push_str("</");
                        out.push_str(&element.tag_name);
                        out.push('>');
                    }
                }
            }
        })
    }

    /// Short excerpt of a node's markup for assertion messages.
    pub(crate) fn snippet(&self, node_id: NodeId) -> String {
        const MAX_SNIPPET_CHARS: usize = 200;
        let html = self.dump_node(node_id);
        if html.chars().count() <= MAX_SNIPPET_CHARS {
            return html;
        }
        let mut truncated = html.chars().take(MAX_SNIPPET_CHARS).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

/// Text escapes `<` and `>`; attribute values escape `"` instead.
fn push_escaped(out: &mut String, raw: &str, in_attr: bool) {
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '\u{00A0}' => out.push_str("&nbsp;"),
            '"' if in_attr => out.push_str("&quot;"),
            '<' if !in_attr => out.push_str("&lt;"),
            '>' if !in_attr => out.push_str("&gt;"),
            other => out.push(other),
        }
    }
}
