use super::*;

/// A lookup derived from a country change, ready to be issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LookupRequest {
    pub(crate) url: String,
    pub(crate) target: NodeId,
    pub(crate) target_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Lookup {
    Fetch(LookupRequest),
    /// The state select was emptied and nothing is to be fetched for it.
    Cleared(NodeId),
    Skipped,
}

/// Attaches one `change` listener per country select of a formset and turns
/// a change into a state lookup.
#[derive(Debug, Clone)]
pub(crate) struct DependentFieldBinder {
    prefix: String,
    country_suffix: String,
    state_suffix: String,
    lookup_anchor: String,
    placeholder: String,
    bound: HashSet<NodeId>,
}

impl DependentFieldBinder {
    pub(crate) fn new(config: &FormsetConfig) -> Self {
        Self {
            prefix: config.prefix.clone(),
            country_suffix: config.country_suffix.clone(),
            state_suffix: config.state_suffix.clone(),
            lookup_anchor: config.lookup_anchor.clone(),
            placeholder: config.lookup_placeholder.clone(),
            bound: HashSet::new(),
        }
    }

    pub(crate) fn is_country_select(&self, dom: &Dom, node: NodeId) -> bool {
        dom.is_tag(node, "select")
            && dom
                .attr(node, "name")
                .is_some_and(|name| name.ends_with(&self.country_suffix))
    }

    /// Registers listeners on country selects not seen before. Safe to call
    /// any number of times; returns how many selects were newly bound.
    pub(crate) fn bind(
        &mut self,
        dom: &Dom,
        container: NodeId,
        listeners: &mut ListenerStore,
        formset: usize,
    ) -> Result<usize> {
        let mut newly_bound = 0usize;
        for select in dom.query_selector_all_from(container, "select")? {
            if !self.is_country_select(dom, select) {
                continue;
            }
            if self.bound.insert(select) {
                listeners.add(select, "change", ListenerAction::CountryChanged { formset });
                newly_bound += 1;
            }
        }
        Ok(newly_bound)
    }

    pub(crate) fn bound_count(&self) -> usize {
        self.bound.len()
    }

    /// Derives the lookup URL and the state select for a changed country
    /// select, clearing the state select's options.
    pub(crate) fn prepare_lookup(&self, dom: &mut Dom, select: NodeId) -> Result<Lookup> {
        let Some(name) = dom.attr(select, "name") else {
            return Ok(Lookup::Skipped);
        };
        let Some(token) = FieldToken::parse(&name, &self.prefix) else {
            tracing::warn!(name = %name, "country select name carries no formset index");
            return Ok(Lookup::Skipped);
        };

        let target_id = token.with_field(&self.state_suffix).html_id();
        let Some(target) = dom.by_id(&target_id) else {
            tracing::warn!(target_id = %target_id, "dependent state select not found");
            return Ok(Lookup::Skipped);
        };
        dom.remove_all_children(target)?;

        let country = dom.value(select)?;
        if country.is_empty() {
            return Ok(Lookup::Cleared(target));
        }

        let Some(url_template) = dom
            .query_selector(&self.lookup_anchor)?
            .and_then(|anchor| dom.dataset_get(anchor, "url"))
        else {
            tracing::warn!(anchor = %self.lookup_anchor, "lookup anchor has no data-url");
            return Ok(Lookup::Cleared(target));
        };
        let url = url_template.replacen(&self.placeholder, &country, 1);

        Ok(Lookup::Fetch(LookupRequest {
            url,
            target,
            target_id,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
      <a id="Url" data-url="/country/states/0/"></a>
      <div id="address">
        <p>
          <select name="form-0-country" id="id_form-0-country">
            <option value="">---------</option>
            <option value="160" selected>Nigeria</option>
          </select>
          <select name="form-0-state" id="id_form-0-state"><option value="9">Old</option></select>
          <select name="form-0-kind" id="id_form-0-kind"></select>
        </p>
      </div>
    "#;

    fn setup() -> Result<(Dom, NodeId, DependentFieldBinder)> {
        let dom = parse_html(PAGE)?;
        let container = dom
            .by_id("address")
            .ok_or_else(|| Error::SelectorNotFound("#address".into()))?;
        Ok((dom, container, DependentFieldBinder::new(&FormsetConfig::default())))
    }

    #[test]
    fn binding_twice_registers_one_listener() -> Result<()> {
        let (dom, container, mut binder) = setup()?;
        let mut listeners = ListenerStore::default();
        assert_eq!(binder.bind(&dom, container, &mut listeners, 0)?, 1);
        assert_eq!(binder.bind(&dom, container, &mut listeners, 0)?, 0);
        let country = dom
            .by_id("id_form-0-country")
            .ok_or_else(|| Error::SelectorNotFound("#id_form-0-country".into()))?;
        assert_eq!(listeners.count(country, "change"), 1);
        assert_eq!(binder.bound_count(), 1);
        Ok(())
    }

    #[test]
    fn lookup_substitutes_country_and_clears_state() -> Result<()> {
        let (mut dom, _, binder) = setup()?;
        let country = dom
            .by_id("id_form-0-country")
            .ok_or_else(|| Error::SelectorNotFound("#id_form-0-country".into()))?;
        let Lookup::Fetch(request) = binder.prepare_lookup(&mut dom, country)? else {
            return Err(Error::Dom("expected a lookup".into()));
        };
        assert_eq!(request.url, "/country/states/160/");
        assert_eq!(request.target_id, "id_form-0-state");
        assert!(dom.select_options(request.target).is_empty());
        Ok(())
    }

    #[test]
    fn blank_country_clears_without_lookup() -> Result<()> {
        let (mut dom, _, binder) = setup()?;
        let country = dom
            .by_id("id_form-0-country")
            .ok_or_else(|| Error::SelectorNotFound("#id_form-0-country".into()))?;
        dom.set_value(country, "")?;
        let state = dom
            .by_id("id_form-0-state")
            .ok_or_else(|| Error::SelectorNotFound("#id_form-0-state".into()))?;
        assert_eq!(binder.prepare_lookup(&mut dom, country)?, Lookup::Cleared(state));
        assert!(dom.select_options(state).is_empty());
        Ok(())
    }
}
