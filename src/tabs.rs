use super::*;

#[derive(Debug, Clone)]
pub(crate) struct TabController {
    config: TabConfig,
}

impl TabController {
    pub(crate) fn new(config: TabConfig) -> Self {
        Self { config }
    }

    pub(crate) fn bind(&self, dom: &Dom, listeners: &mut ListenerStore) -> Result<usize> {
        let links = dom.query_selector_all(&self.config.link)?;
        for link in &links {
            listeners.add(*link, "click", ListenerAction::TabClick);
        }
        Ok(links.len())
    }

    fn item_for(&self, dom: &Dom, link: NodeId) -> Result<NodeId> {
        if self.config.item.trim().is_empty() {
            return Ok(link);
        }
        Ok(dom.closest(link, &self.config.item)?.unwrap_or(link))
    }

    /// Moves the active marker to `link`'s menu item and to the panel its
    /// href fragment names. Returns the panel that became active, if any.
    pub(crate) fn activate(&self, dom: &mut Dom, link: NodeId) -> Result<Option<NodeId>> {
        let active = self.config.active_class.as_str();

        let mut items = Vec::new();
        for other in dom.query_selector_all(&self.config.link)? {
            items.push(self.item_for(dom, other)?);
        }
        let item = self.item_for(dom, link)?;
        for other in items {
            dom.class_remove(other, active)?;
        }
        dom.class_add(item, active)?;

        if self.config.panel.trim().is_empty() {
            return Ok(None);
        }
        let target = dom
            .attr(link, "href")
            .and_then(|href| href.split_once('#').map(|(_, fragment)| fragment.to_string()))
            .filter(|fragment| !fragment.is_empty())
            .and_then(|fragment| dom.by_id(&fragment));
        for panel in dom.query_selector_all(&self.config.panel)? {
            dom.class_remove(panel, active)?;
        }
        if let Some(panel) = target {
            dom.class_add(panel, active)?;
        }
        Ok(target)
    }
}
