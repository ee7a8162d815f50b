//! Deterministic formset page controller.
//!
//! A server-rendered HTML form is parsed into an in-memory DOM, and the
//! client-side behaviour of a Django-style formset page is attached to it:
//! "add line" controls copy a template group and renumber its
//! `form-<index>-<field>` names, country selects drive a dependent state
//! select through a remote lookup, and tab menus keep a single active entry.
//!
//! Interactions are driven through [`FormPage`], in the same way a headless
//! browser harness drives a page:
//!
//! ```
//! use formset_page::FormPage;
//!
//! let html = r#"
//!   <form id="address">
//!     <input type="hidden" name="form-TOTAL_FORMS" id="id_form-TOTAL_FORMS" value="1">
//!     <p><input name="form-0-street" id="id_form-0-street"></p>
//!     <button id="add-address-line">Add</button>
//!   </form>
//! "#;
//!
//! let mut page = FormPage::from_html(html)?;
//! page.click("#add-address-line")?;
//! page.assert_exists("#id_form-1-street")?;
//! page.assert_value("#id_form-TOTAL_FORMS", "2")?;
//! # Ok::<(), formset_page::Error>(())
//! ```

use std::collections::{HashMap, HashSet, VecDeque};
use std::error::Error as StdError;
use std::fmt;

mod binder;
mod config;
mod dom;
mod fetcher;
mod formset;
mod html;
mod page;
mod runtime_state;
mod selector;
mod tabs;

pub use config::{FormsetConfig, PageConfig, TabConfig, TemplateStrategy};
pub use fetcher::{FetchRequestId, FetchResponse, PendingFetch};
pub use formset::FieldToken;
pub use page::FormPage;

use binder::DependentFieldBinder;
use dom::Dom;
use fetcher::RemoteOptionFetcher;
use formset::{FormsetState, GroupCloner};
use html::{is_void_tag, parse_html};
use runtime_state::{EventState, ListenerAction, ListenerStore, PlatformMockState, TraceState};
use selector::{SelectorPart, parse_selector_groups};
use tabs::TabController;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    HtmlParse(String),
    Dom(String),
    SelectorNotFound(String),
    UnsupportedSelector(String),
    TemplateMissing(String),
    Config(String),
    TypeMismatch {
        selector: String,
        expected: String,
        actual: String,
    },
    AssertionFailed {
        selector: String,
        expected: String,
        actual: String,
        dom_snippet: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HtmlParse(msg) => write!(f, "html parse error: {msg}"),
            Self::Dom(msg) => write!(f, "dom error: {msg}"),
            Self::SelectorNotFound(selector) => write!(f, "selector not found: {selector}"),
            Self::UnsupportedSelector(selector) => write!(f, "unsupported selector: {selector}"),
            Self::TemplateMissing(selector) => {
                write!(f, "no template group to clone for {selector}")
            }
            Self::Config(msg) => write!(f, "invalid page config: {msg}"),
            Self::TypeMismatch {
                selector,
                expected,
                actual,
            } => write!(
                f,
                "type mismatch for {selector}: expected {expected}, actual {actual}"
            ),
            Self::AssertionFailed {
                selector,
                expected,
                actual,
                dom_snippet,
            } => write!(
                f,
                "assertion failed for {selector}: expected {expected}, actual {actual}, snippet {dom_snippet}"
            ),
        }
    }
}

impl StdError for Error {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct NodeId(usize);

#[derive(Debug, Clone)]
pub(crate) enum NodeType {
    Document,
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) node_type: NodeType,
}

#[derive(Debug, Clone)]
pub(crate) struct Element {
    pub(crate) tag_name: String,
    pub(crate) attrs: HashMap<String, String>,
    pub(crate) value: String,
}
