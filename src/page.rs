use super::*;
use crate::binder::Lookup;
use crate::fetcher::SettleOutcome;
use crate::formset::IndexPattern;
use crate::runtime_state::MockFetchOutcome;

/// Per-formset state: the count, the cloner and the binder registry.
#[derive(Debug)]
pub(crate) struct FormsetController {
    pub(crate) config: FormsetConfig,
    pub(crate) container: NodeId,
    pub(crate) add_button: NodeId,
    pub(crate) state: FormsetState,
    pub(crate) cloner: GroupCloner,
    pub(crate) binder: DependentFieldBinder,
}

#[derive(Debug)]
pub struct FormPage {
    pub(crate) dom: Dom,
    pub(crate) listeners: ListenerStore,
    pub(crate) formsets: Vec<FormsetController>,
    pub(crate) tabs: Option<TabController>,
    pub(crate) fetcher: RemoteOptionFetcher,
    pub(crate) platform_mocks: PlatformMockState,
    pub(crate) trace_state: TraceState,
}

impl FormPage {
    /// Parses `html` and attaches the default address formset and tab menu.
    /// Parts of the default configuration the page does not render are
    /// skipped.
    pub fn from_html(html: &str) -> Result<Self> {
        Self::attach(html, PageConfig::default(), false)
    }

    /// Like [`FormPage::from_html`], but every configured formset must be
    /// present: a missing container or add control is an error.
    pub fn from_html_with_config(html: &str, config: PageConfig) -> Result<Self> {
        config.validate()?;
        Self::attach(html, config, true)
    }

    fn attach(html: &str, config: PageConfig, strict: bool) -> Result<Self> {
        let dom = parse_html(html)?;
        let mut page = Self {
            dom,
            listeners: ListenerStore::default(),
            formsets: Vec::new(),
            tabs: None,
            fetcher: RemoteOptionFetcher::default(),
            platform_mocks: PlatformMockState::default(),
            trace_state: TraceState::default(),
        };

        for formset in config.formsets {
            page.attach_formset(formset, strict)?;
        }
        if let Some(tabs) = config.tabs {
            let controller = TabController::new(tabs);
            let links = controller.bind(&page.dom, &mut page.listeners)?;
            tracing::debug!(links, "tab menu attached");
            page.tabs = Some(controller);
        }
        Ok(page)
    }

    fn attach_formset(&mut self, config: FormsetConfig, strict: bool) -> Result<()> {
        let container = self.dom.query_selector(&config.container)?;
        let add_button = self.dom.query_selector(&config.add_button)?;
        let (container, add_button) = match (container, add_button) {
            (Some(container), Some(add_button)) => (container, add_button),
            (None, _) if strict => return Err(Error::SelectorNotFound(config.container)),
            (_, None) if strict => return Err(Error::SelectorNotFound(config.add_button)),
            _ => {
                tracing::debug!(prefix = %config.prefix, "formset not rendered on this page");
                return Ok(());
            }
        };

        let formset = self.formsets.len();
        let pattern = IndexPattern::new(&config.prefix)?;
        let state = FormsetState::new(config.total_forms_selector(), pattern);
        let cloner = GroupCloner::new(
            &mut self.dom,
            container,
            config.template.clone(),
            config.line_label.clone(),
        )?;
        let mut binder = DependentFieldBinder::new(&config);
        let bound = binder.bind(&self.dom, container, &mut self.listeners, formset)?;
        self.listeners
            .add(add_button, "click", ListenerAction::AddLine { formset });
        tracing::debug!(
            prefix = %config.prefix,
            count = state.count(&self.dom, container),
            bound,
            "formset attached"
        );

        self.formsets.push(FormsetController {
            config,
            container,
            add_button,
            state,
            cloner,
            binder,
        });
        Ok(())
    }

    fn select_one(&self, selector: &str) -> Result<NodeId> {
        self.dom
            .query_selector(selector)?
            .ok_or_else(|| Error::SelectorNotFound(selector.to_string()))
    }

    fn formset_by_prefix(&self, prefix: &str) -> Option<&FormsetController> {
        self.formsets
            .iter()
            .find(|formset| formset.config.prefix == prefix)
    }

    pub fn click(&mut self, selector: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        self.dispatch_event(target, "click")?;
        Ok(())
    }

    /// Selects the option with `value` and fires `change`, as a user picking
    /// it from the list would.
    pub fn select_option(&mut self, selector: &str, value: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        if !self.dom.is_tag(target, "select") {
            return Err(Error::TypeMismatch {
                selector: selector.to_string(),
                expected: "select".into(),
                actual: self.dom.tag_name(target).unwrap_or("node").to_string(),
            });
        }
        if !self.dom.set_value(target, value)? {
            return Err(Error::Dom(format!(
                "{selector} has no option with value {value:?}"
            )));
        }
        self.dispatch_event(target, "change")?;
        Ok(())
    }

    pub fn dispatch(&mut self, selector: &str, event: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        self.dispatch_event(target, event)?;
        Ok(())
    }

    pub(crate) fn dispatch_event(&mut self, target: NodeId, event_type: &str) -> Result<EventState> {
        let mut event = EventState::new(event_type, target);
        let path: Vec<NodeId> = std::iter::once(target)
            .chain(self.dom.ancestors(target))
            .collect();

        for node in path {
            let actions = self.listeners.get(node, event_type);
            if actions.is_empty() {
                continue;
            }
            event.current_target = node;
            for action in actions {
                if self.trace_state.enabled {
                    let target_label = self.trace_node_label(event.target);
                    let current_label = self.trace_node_label(event.current_target);
                    self.trace_state.event_line(format!(
                        "[event] {} target={} current={} action={:?}",
                        event.event_type, target_label, current_label, action
                    ));
                }
                self.run_action(action, &mut event)?;
            }
        }
        Ok(event)
    }

    fn run_action(&mut self, action: ListenerAction, event: &mut EventState) -> Result<()> {
        match action {
            ListenerAction::AddLine { formset } => {
                event.default_prevented = true;
                self.add_line(formset)
            }
            ListenerAction::CountryChanged { formset } => {
                self.country_changed(formset, event.current_target)
            }
            ListenerAction::TabClick => {
                event.default_prevented = true;
                let Some(tabs) = &self.tabs else {
                    return Ok(());
                };
                let panel = tabs.activate(&mut self.dom, event.current_target)?;
                let link = self.trace_node_label(event.current_target);
                let panel = panel.map_or_else(|| "none".to_string(), |p| self.trace_node_label(p));
                self.trace_state
                    .line(format!("[tabs] activated link={link} panel={panel}"));
                Ok(())
            }
        }
    }

    fn add_line(&mut self, formset: usize) -> Result<()> {
        let Some(controller) = self.formsets.get_mut(formset) else {
            return Ok(());
        };
        let outcome = controller.cloner.add_group(
            &mut self.dom,
            &controller.state,
            controller.container,
            controller.add_button,
        )?;
        // Copies carry no listeners; bind the new country selects.
        let bound = controller.binder.bind(
            &self.dom,
            controller.container,
            &mut self.listeners,
            formset,
        )?;
        let prefix = controller.config.prefix.clone();
        if !outcome.count_stored {
            tracing::debug!(prefix = %prefix, "no management count field; count derived from markup");
        }
        self.trace_state.line(format!(
            "[formset] {prefix} added index={} nodes={} bound={bound} count_stored={}",
            outcome.index,
            outcome.inserted.len(),
            outcome.count_stored
        ));
        Ok(())
    }

    fn country_changed(&mut self, formset: usize, select: NodeId) -> Result<()> {
        let Some(controller) = self.formsets.get(formset) else {
            return Ok(());
        };
        let request = match controller.binder.prepare_lookup(&mut self.dom, select)? {
            Lookup::Fetch(request) => request,
            Lookup::Cleared(target) => {
                self.fetcher.cancel(target);
                let label = self.trace_node_label(target);
                self.trace_state
                    .line(format!("[fetch] cleared {label} without lookup"));
                return Ok(());
            }
            Lookup::Skipped => return Ok(()),
        };

        self.platform_mocks.fetch_calls.push(request.url.clone());
        let pending = self
            .fetcher
            .request(request.url, request.target, request.target_id);
        self.trace_state.line(format!(
            "[fetch] issued {} GET {} target=#{}",
            pending.id, pending.url, pending.target_id
        ));
        Ok(())
    }

    pub fn set_fetch_mock(&mut self, url: &str, body: &str) {
        self.set_fetch_response(url, FetchResponse::ok(body));
    }

    pub fn set_fetch_response(&mut self, url: &str, response: FetchResponse) {
        self.platform_mocks
            .fetch_mocks
            .insert(url.to_string(), MockFetchOutcome::Respond(response));
    }

    pub fn set_fetch_failure(&mut self, url: &str, message: &str) {
        self.platform_mocks.fetch_mocks.insert(
            url.to_string(),
            MockFetchOutcome::NetworkError(message.to_string()),
        );
    }

    pub fn clear_fetch_mocks(&mut self) {
        self.platform_mocks.fetch_mocks.clear();
    }

    /// URLs requested so far, oldest first. Drains the log.
    pub fn take_fetch_calls(&mut self) -> Vec<String> {
        std::mem::take(&mut self.platform_mocks.fetch_calls)
    }

    pub fn pending_fetches(&self) -> Vec<PendingFetch> {
        self.fetcher.pending()
    }

    /// Answers every outstanding request from the fetch mocks, in the order
    /// they were issued. A URL without a mock answers with a network error.
    pub fn run_pending_fetches(&mut self) -> Result<usize> {
        let pending = self.fetcher.pending();
        let settled = pending.len();
        for request in pending {
            let outcome = match self.platform_mocks.fetch_mocks.get(&request.url) {
                Some(MockFetchOutcome::Respond(response)) => Ok(response.clone()),
                Some(MockFetchOutcome::NetworkError(message)) => Err(message.clone()),
                None => Err(format!("no fetch mock for {}", request.url)),
            };
            self.settle_fetch(request.id, outcome)?;
        }
        Ok(settled)
    }

    pub fn complete_fetch(&mut self, id: FetchRequestId, response: FetchResponse) -> Result<()> {
        self.settle_fetch(id, Ok(response))
    }

    pub fn fail_fetch(&mut self, id: FetchRequestId, message: &str) -> Result<()> {
        self.settle_fetch(id, Err(message.to_string()))
    }

    fn settle_fetch(
        &mut self,
        id: FetchRequestId,
        outcome: std::result::Result<FetchResponse, String>,
    ) -> Result<()> {
        let url = self.fetcher.pending_url(id).unwrap_or_default();
        match self.fetcher.settle(&mut self.dom, id, outcome)? {
            SettleOutcome::Applied(options) => {
                self.trace_state
                    .line(format!("[fetch] {id} applied options={options}"));
            }
            SettleOutcome::Stale => {
                self.trace_state
                    .line(format!("[fetch] {id} discarded stale response"));
            }
            SettleOutcome::Failed(failure) => {
                tracing::warn!(request = %id, url = %url, %failure, "option lookup failed");
                self.trace_state
                    .line(format!("[fetch] {id} failed: {failure}"));
            }
            SettleOutcome::Unknown => {
                return Err(Error::Dom(format!("unknown fetch request {id}")));
            }
        }
        Ok(())
    }

    pub fn text(&self, selector: &str) -> Result<String> {
        let target = self.select_one(selector)?;
        Ok(self.dom.text_content(target))
    }

    pub fn value(&self, selector: &str) -> Result<String> {
        let target = self.select_one(selector)?;
        self.dom.value(target)
    }

    pub fn attr(&self, selector: &str, name: &str) -> Result<Option<String>> {
        let target = self.select_one(selector)?;
        Ok(self.dom.attr(target, &name.to_ascii_lowercase()))
    }

    pub fn has_class(&self, selector: &str, class_name: &str) -> Result<bool> {
        let target = self.select_one(selector)?;
        Ok(self.dom.class_contains(target, class_name))
    }

    pub fn outer_html(&self, selector: &str) -> Result<String> {
        let target = self.select_one(selector)?;
        self.dom.outer_html(target)
    }

    pub fn inner_html(&self, selector: &str) -> Result<String> {
        let target = self.select_one(selector)?;
        self.dom.inner_html(target)
    }

    pub fn query_count(&self, selector: &str) -> Result<usize> {
        Ok(self.dom.query_selector_all(selector)?.len())
    }

    /// `(value, label)` of every option of a select, in document order.
    pub fn options(&self, selector: &str) -> Result<Vec<(String, String)>> {
        let target = self.select_one(selector)?;
        Ok(self
            .dom
            .select_options(target)
            .into_iter()
            .map(|option| {
                (
                    self.dom.option_effective_value(option),
                    self.dom.option_label(option),
                )
            })
            .collect())
    }

    pub fn listener_count(&self, selector: &str, event: &str) -> Result<usize> {
        let target = self.select_one(selector)?;
        Ok(self.listeners.count(target, event))
    }

    /// Current count of the formset with `prefix`: the management field's
    /// value when rendered, otherwise derived from the field names.
    pub fn formset_count(&self, prefix: &str) -> Option<usize> {
        self.formset_by_prefix(prefix)
            .map(|formset| formset.state.count(&self.dom, formset.container))
    }

    pub fn assert_text(&self, selector: &str, expected: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        let actual = self.dom.text_content(target);
        if actual.trim() != expected {
            return Err(Error::AssertionFailed {
                selector: selector.to_string(),
                expected: expected.to_string(),
                actual,
                dom_snippet: self.dom.snippet(target),
            });
        }
        Ok(())
    }

    pub fn assert_value(&self, selector: &str, expected: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        let actual = self.dom.value(target)?;
        if actual != expected {
            return Err(Error::AssertionFailed {
                selector: selector.to_string(),
                expected: expected.to_string(),
                actual,
                dom_snippet: self.dom.snippet(target),
            });
        }
        Ok(())
    }

    pub fn assert_exists(&self, selector: &str) -> Result<()> {
        self.select_one(selector).map(|_| ())
    }

    pub fn assert_count(&self, selector: &str, expected: usize) -> Result<()> {
        let actual = self.query_count(selector)?;
        if actual != expected {
            return Err(Error::AssertionFailed {
                selector: selector.to_string(),
                expected: expected.to_string(),
                actual: actual.to_string(),
                dom_snippet: String::new(),
            });
        }
        Ok(())
    }

    pub fn set_trace(&mut self, enabled: bool) {
        self.trace_state.enabled = enabled;
    }

    pub fn set_trace_events(&mut self, enabled: bool) {
        self.trace_state.events = enabled;
    }

    pub fn set_trace_log_limit(&mut self, max_entries: usize) -> Result<()> {
        if max_entries == 0 {
            return Err(Error::Config(
                "set_trace_log_limit requires at least 1 entry".into(),
            ));
        }
        self.trace_state.log_limit = max_entries;
        while self.trace_state.logs.len() > self.trace_state.log_limit {
            self.trace_state.logs.pop_front();
        }
        Ok(())
    }

    pub fn take_trace_logs(&mut self) -> Vec<String> {
        self.trace_state.logs.drain(..).collect()
    }

    fn trace_node_label(&self, node_id: NodeId) -> String {
        if let Some(id) = self.dom.attr(node_id, "id").filter(|id| !id.is_empty()) {
            return format!("#{id}");
        }
        if let Some(name) = self.dom.attr(node_id, "name").filter(|name| !name.is_empty()) {
            return format!("[name={name}]");
        }
        self.dom.tag_name(node_id).unwrap_or("document").to_string()
    }
}
