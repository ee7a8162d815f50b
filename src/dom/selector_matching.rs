use super::*;
use crate::selector::{SelectorAttrCondition, SelectorCombinator, SelectorPseudoClass, SelectorStep};

impl SelectorAttrCondition {
    fn matches(&self, element: &Element) -> bool {
        let (key, value) = match self {
            Self::Exists { key } => return element.attrs.contains_key(key),
            Self::Eq { key, value } => return element.attrs.get(key) == Some(value),
            Self::StartsWith { key, value }
            | Self::EndsWith { key, value }
            | Self::Contains { key, value } => (key, value.as_str()),
        };
        let Some(actual) = element.attrs.get(key) else {
            return false;
        };
        // An empty operand never matches the substring operators.
        !value.is_empty()
            && match self {
                Self::StartsWith { .. } => actual.starts_with(value),
                Self::EndsWith { .. } => actual.ends_with(value),
                _ => actual.contains(value),
            }
    }
}

impl Dom {
    pub(crate) fn query_selector(&self, selector: &str) -> Result<Option<NodeId>> {
        Ok(self.query_selector_all(selector)?.into_iter().next())
    }

    pub(crate) fn query_selector_all(&self, selector: &str) -> Result<Vec<NodeId>> {
        let groups = parse_selector_groups(selector)?;
        if let [chain] = groups.as_slice() {
            if let [part] = chain.as_slice() {
                if let Some(id) = part.step.id_only() {
                    return Ok(self.elements_with_id(id).to_vec());
                }
            }
        }
        Ok(self.select_from(self.descendant_elements(self.root), &groups))
    }

    pub(crate) fn query_selector_all_from(
        &self,
        root: NodeId,
        selector: &str,
    ) -> Result<Vec<NodeId>> {
        let groups = parse_selector_groups(selector)?;
        Ok(self.select_from(self.descendant_elements(root), &groups))
    }

    /// Candidates are already in document order and unique.
    fn select_from(&self, candidates: Vec<NodeId>, groups: &[Vec<SelectorPart>]) -> Vec<NodeId> {
        candidates
            .into_iter()
            .filter(|node| self.matches_any(*node, groups))
            .collect()
    }

    fn matches_any(&self, node_id: NodeId, groups: &[Vec<SelectorPart>]) -> bool {
        self.element(node_id).is_some()
            && groups
                .iter()
                .any(|chain| self.matches_selector_chain(node_id, chain))
    }

    pub(crate) fn matches_selector(&self, node_id: NodeId, selector: &str) -> Result<bool> {
        let groups = parse_selector_groups(selector)?;
        Ok(self.matches_any(node_id, &groups))
    }

    pub(crate) fn closest(&self, node_id: NodeId, selector: &str) -> Result<Option<NodeId>> {
        let groups = parse_selector_groups(selector)?;
        Ok(std::iter::once(node_id)
            .chain(self.ancestors(node_id))
            .find(|node| self.matches_any(*node, &groups)))
    }

    /// Matches right to left: the last part against `node_id`, the rest
    /// against its parent or some ancestor.
    pub(crate) fn matches_selector_chain(&self, node_id: NodeId, parts: &[SelectorPart]) -> bool {
        let Some((last, rest)) = parts.split_last() else {
            return false;
        };
        if !self.matches_step(node_id, &last.step) {
            return false;
        }
        if rest.is_empty() {
            return true;
        }
        match last.combinator {
            Some(SelectorCombinator::Child) => self
                .parent(node_id)
                .is_some_and(|parent| self.matches_selector_chain(parent, rest)),
            Some(SelectorCombinator::Descendant) | None => self
                .ancestors(node_id)
                .any(|ancestor| self.matches_selector_chain(ancestor, rest)),
        }
    }

    pub(crate) fn matches_step(&self, node_id: NodeId, step: &SelectorStep) -> bool {
        let Some(element) = self.element(node_id) else {
            return false;
        };
        step.tag
            .as_ref()
            .is_none_or(|tag| element.tag_name.eq_ignore_ascii_case(tag))
            && step
                .id
                .as_ref()
                .is_none_or(|id| element.attrs.get("id") == Some(id))
            && step.classes.iter().all(|class_name| element.has_class(class_name))
            && step.attrs.iter().all(|condition| condition.matches(element))
            && step
                .pseudo_classes
                .iter()
                .all(|pseudo| self.matches_pseudo_class(node_id, pseudo))
    }

    fn matches_pseudo_class(&self, node_id: NodeId, pseudo: &SelectorPseudoClass) -> bool {
        let siblings = || {
            self.parent(node_id)
                .map(|parent| self.child_elements(parent))
                .unwrap_or_default()
        };
        match pseudo {
            SelectorPseudoClass::FirstChild => siblings().first() == Some(&node_id),
            SelectorPseudoClass::LastChild => siblings().last() == Some(&node_id),
            SelectorPseudoClass::Not(groups) => !groups
                .iter()
                .any(|chain| self.matches_selector_chain(node_id, chain)),
        }
    }
}
