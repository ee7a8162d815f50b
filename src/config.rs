use serde::Deserialize;

use super::*;

/// How the group to copy is located when an "add line" control is clicked.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TemplateStrategy {
    /// Every element matching `selector` when the page is attached is kept as
    /// a pristine copy; each click inserts a copy of the whole set.
    Snapshot { selector: String },
    /// The group root matching `selector` with the highest index is copied
    /// at click time.
    LastGroup { selector: String },
}

impl TemplateStrategy {
    pub fn selector(&self) -> &str {
        match self {
            Self::Snapshot { selector } | Self::LastGroup { selector } => selector,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FormsetConfig {
    /// Element the groups live in; the binder only scans inside it.
    pub container: String,
    pub add_button: String,
    pub template: TemplateStrategy,
    /// Formset prefix, the `form` in `form-0-street`.
    pub prefix: String,
    /// Selector of the management count field. Defaults to
    /// `#id_<prefix>-TOTAL_FORMS`.
    pub total_forms: Option<String>,
    pub country_suffix: String,
    pub state_suffix: String,
    /// Element carrying the lookup URL template in `data-url`.
    pub lookup_anchor: String,
    pub lookup_placeholder: String,
    /// Human-readable line number label inside a group, set to `index + 1`.
    pub line_label: Option<String>,
}

impl Default for FormsetConfig {
    fn default() -> Self {
        Self {
            container: "#address".into(),
            add_button: "#add-address-line".into(),
            template: TemplateStrategy::Snapshot {
                selector: "#address p".into(),
            },
            prefix: "form".into(),
            total_forms: None,
            country_suffix: "country".into(),
            state_suffix: "state".into(),
            lookup_anchor: "#Url".into(),
            lookup_placeholder: "0".into(),
            line_label: None,
        }
    }
}

impl FormsetConfig {
    pub fn total_forms_selector(&self) -> String {
        self.total_forms
            .clone()
            .unwrap_or_else(|| format!("#id_{}-TOTAL_FORMS", self.prefix))
    }

    fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("container", self.container.as_str()),
            ("add_button", self.add_button.as_str()),
            ("template.selector", self.template.selector()),
            ("country_suffix", self.country_suffix.as_str()),
            ("state_suffix", self.state_suffix.as_str()),
            ("lookup_anchor", self.lookup_anchor.as_str()),
            ("lookup_placeholder", self.lookup_placeholder.as_str()),
        ] {
            if value.trim().is_empty() {
                return Err(Error::Config(format!("{field} must not be empty")));
            }
        }
        if self.prefix.is_empty()
            || !self
                .prefix
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_')
        {
            return Err(Error::Config(format!(
                "prefix must be a non-empty identifier, got {:?}",
                self.prefix
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TabConfig {
    pub link: String,
    /// Ancestor of a link that carries the active marker.
    pub item: String,
    pub panel: String,
    pub active_class: String,
}

impl Default for TabConfig {
    fn default() -> Self {
        Self {
            link: ".tab-menu a".into(),
            item: "li".into(),
            panel: ".tab-pane".into(),
            active_class: "active".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PageConfig {
    pub formsets: Vec<FormsetConfig>,
    pub tabs: Option<TabConfig>,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            formsets: vec![FormsetConfig::default()],
            tabs: Some(TabConfig::default()),
        }
    }
}

impl PageConfig {
    pub fn from_json(src: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(src).map_err(|err| Error::Config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for formset in &self.formsets {
            formset.validate()?;
        }
        let mut prefixes = HashSet::new();
        for formset in &self.formsets {
            if !prefixes.insert(formset.prefix.as_str()) {
                return Err(Error::Config(format!(
                    "duplicate formset prefix {:?}",
                    formset.prefix
                )));
            }
        }
        if let Some(tabs) = &self.tabs {
            if tabs.link.trim().is_empty() || tabs.active_class.trim().is_empty() {
                return Err(Error::Config(
                    "tab link selector and active class must not be empty".into(),
                ));
            }
        }
        Ok(())
    }
}
