use fancy_regex::Regex;

use super::*;

/// A formset field name split into its parts: `form-3-street` is prefix
/// `form`, index 3, field `street`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldToken {
    pub prefix: String,
    pub index: usize,
    pub field: String,
}

impl FieldToken {
    /// Parses a full field name. Management fields such as
    /// `form-TOTAL_FORMS` carry no index and yield `None`.
    pub fn parse(name: &str, prefix: &str) -> Option<Self> {
        let rest = name.strip_prefix(prefix)?.strip_prefix('-')?;
        let (index, field) = rest.split_once('-')?;
        if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) || field.is_empty() {
            return None;
        }
        Some(Self {
            prefix: prefix.to_string(),
            index: index.parse().ok()?,
            field: field.to_string(),
        })
    }

    pub fn with_field(&self, field: &str) -> Self {
        Self {
            field: field.to_string(),
            ..self.clone()
        }
    }

    pub fn name(&self) -> String {
        format!("{}-{}-{}", self.prefix, self.index, self.field)
    }

    /// The id Django renders for the field's widget.
    pub fn html_id(&self) -> String {
        format!("id_{}", self.name())
    }
}

/// Finds `<prefix>-<index>-` tokens inside attribute values such as
/// `id_form-0-street`.
#[derive(Debug, Clone)]
pub(crate) struct IndexPattern {
    regex: Regex,
}

impl IndexPattern {
    pub(crate) fn new(prefix: &str) -> Result<Self> {
        let regex = Regex::new(&format!(r"(?<![A-Za-z0-9]){prefix}-(\d+)-"))
            .map_err(|err| Error::Config(format!("invalid formset prefix {prefix:?}: {err}")))?;
        Ok(Self { regex })
    }

    pub(crate) fn first_index(&self, value: &str) -> Option<usize> {
        let caps = self.regex.captures(value).ok()??;
        caps.get(1)?.as_str().parse().ok()
    }

    pub(crate) fn rewrite(&self, value: &str, new_index: usize) -> Result<String> {
        let mut out = String::with_capacity(value.len() + 2);
        let mut last = 0usize;
        for caps in self.regex.captures_iter(value) {
            let caps = caps.map_err(|err| Error::Dom(format!("index rewrite failed: {err}")))?;
            let Some(index) = caps.get(1) else {
                continue;
            };
            out.push_str(&value[last..index.start()]);
            out.push_str(&new_index.to_string());
            last = index.end();
        }
        out.push_str(&value[last..]);
        Ok(out)
    }
}

/// Rewrites the index token in every attribute value of the subtree, so
/// references such as `aria-describedby` follow the renamed ids. Text nodes
/// are left untouched.
pub(crate) fn reindex_subtree(
    dom: &mut Dom,
    root: NodeId,
    pattern: &IndexPattern,
    new_index: usize,
) -> Result<usize> {
    let mut rewritten = 0usize;
    for node in dom.subtree_elements(root) {
        let mut changes = Vec::new();
        if let Some(element) = dom.element(node) {
            for (name, value) in &element.attrs {
                let next = pattern.rewrite(value, new_index)?;
                if next != *value {
                    changes.push((name.clone(), next));
                }
            }
        }
        rewritten += changes.len();
        for (name, next) in changes {
            dom.set_attr(node, &name, &next)?;
        }
    }
    Ok(rewritten)
}

/// The formset's count, backed by the `TOTAL_FORMS` management field when the
/// page renders one.
#[derive(Debug, Clone)]
pub(crate) struct FormsetState {
    total_forms_selector: String,
    pattern: IndexPattern,
}

impl FormsetState {
    pub(crate) fn new(total_forms_selector: String, pattern: IndexPattern) -> Self {
        Self {
            total_forms_selector,
            pattern,
        }
    }

    pub(crate) fn pattern(&self) -> &IndexPattern {
        &self.pattern
    }

    fn total_forms_field(&self, dom: &Dom) -> Option<NodeId> {
        dom.query_selector(&self.total_forms_selector).ok().flatten()
    }

    /// Highest index + 1 among the named fields inside `container`.
    pub(crate) fn derived_count(&self, dom: &Dom, container: NodeId) -> usize {
        dom.subtree_elements(container)
            .into_iter()
            .filter_map(|node| dom.attr(node, "name"))
            .filter_map(|name| self.pattern.first_index(&name))
            .map(|index| index + 1)
            .max()
            .unwrap_or(0)
    }

    pub(crate) fn stored_count(&self, dom: &Dom) -> Option<usize> {
        let field = self.total_forms_field(dom)?;
        dom.value(field).ok()?.trim().parse().ok()
    }

    pub(crate) fn count(&self, dom: &Dom, container: NodeId) -> usize {
        self.stored_count(dom)
            .unwrap_or_else(|| self.derived_count(dom, container))
    }

    /// Index the next group gets. Never collides with a rendered index even
    /// when the management field lags behind the markup.
    pub(crate) fn next_index(&self, dom: &Dom, container: NodeId) -> usize {
        let derived = self.derived_count(dom, container);
        self.stored_count(dom).map_or(derived, |stored| stored.max(derived))
    }

    /// Returns false when the page has no management field to write.
    pub(crate) fn store_count(&self, dom: &mut Dom, count: usize) -> Result<bool> {
        let Some(field) = self.total_forms_field(dom) else {
            return Ok(false);
        };
        dom.set_attr(field, "value", &count.to_string())?;
        Ok(true)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CloneOutcome {
    pub(crate) index: usize,
    pub(crate) inserted: Vec<NodeId>,
    pub(crate) count_stored: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct GroupCloner {
    strategy: TemplateStrategy,
    snapshot: Vec<NodeId>,
    line_label: Option<String>,
}

impl GroupCloner {
    /// Snapshot templates are copied out of the live tree here, so later
    /// edits to the first group do not leak into new lines.
    pub(crate) fn new(
        dom: &mut Dom,
        container: NodeId,
        strategy: TemplateStrategy,
        line_label: Option<String>,
    ) -> Result<Self> {
        let mut snapshot = Vec::new();
        if let TemplateStrategy::Snapshot { selector } = &strategy {
            for node in dom.query_selector_all_from(container, selector)? {
                snapshot.push(dom.clone_subtree(node));
            }
        }
        Ok(Self {
            strategy,
            snapshot,
            line_label,
        })
    }

    #[cfg(test)]
    pub(crate) fn snapshot_roots(&self) -> &[NodeId] {
        &self.snapshot
    }

    fn group_index(dom: &Dom, group: NodeId, pattern: &IndexPattern) -> Option<usize> {
        dom.subtree_elements(group)
            .into_iter()
            .filter_map(|node| dom.attr(node, "name"))
            .filter_map(|name| pattern.first_index(&name))
            .max()
    }

    fn templates(&self, dom: &Dom, container: NodeId, pattern: &IndexPattern) -> Result<Vec<NodeId>> {
        match &self.strategy {
            TemplateStrategy::Snapshot { .. } => Ok(self.snapshot.clone()),
            TemplateStrategy::LastGroup { selector } => {
                let mut best: Option<(usize, NodeId)> = None;
                for group in dom.query_selector_all_from(container, selector)? {
                    let index = Self::group_index(dom, group, pattern).unwrap_or(0);
                    if best.is_none_or(|(best_index, _)| index >= best_index) {
                        best = Some((index, group));
                    }
                }
                Ok(best.map(|(_, group)| vec![group]).unwrap_or_default())
            }
        }
    }

    /// Copies the template group(s) in front of `add_button` with the next
    /// free index and stores the new count.
    pub(crate) fn add_group(
        &self,
        dom: &mut Dom,
        state: &FormsetState,
        container: NodeId,
        add_button: NodeId,
    ) -> Result<CloneOutcome> {
        let templates = self.templates(dom, container, state.pattern())?;
        if templates.is_empty() {
            return Err(Error::TemplateMissing(self.strategy.selector().to_string()));
        }

        let index = state.next_index(dom, container);
        let mut inserted = Vec::with_capacity(templates.len());
        for template in templates {
            let copy = dom.clone_subtree(template);
            reindex_subtree(dom, copy, state.pattern(), index)?;
            if let Some(label) = &self.line_label {
                self.set_line_label(dom, copy, label, index)?;
            }
            dom.insert_before(add_button, copy)?;
            inserted.push(copy);
        }

        let count_stored = state.store_count(dom, index + 1)?;
        Ok(CloneOutcome {
            index,
            inserted,
            count_stored,
        })
    }

    fn set_line_label(&self, dom: &mut Dom, copy: NodeId, label: &str, index: usize) -> Result<()> {
        for node in dom.subtree_elements(copy) {
            if dom.matches_selector(node, label)? {
                dom.set_text_content(node, &(index + 1).to_string())?;
            }
        }
        Ok(())
    }
}
