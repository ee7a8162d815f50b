use formset_page::{FormPage, PageConfig, TabConfig};

const TABBED_PAGE: &str = r##"
<ul class="tab-menu">
  <li class="active"><a id="tab-personal" href="#personal">Personal</a></li>
  <li><a id="tab-address" href="#addresses">Address</a></li>
  <li><a id="tab-bank" href="#bank">Bank</a></li>
  <li><a id="tab-orphan" href="#nowhere">Orphan</a></li>
</ul>
<div class="tab-content">
  <div class="tab-pane active" id="personal">Personal details</div>
  <div class="tab-pane" id="addresses">Addresses</div>
  <div class="tab-pane" id="bank">Bank details</div>
</div>
"##;

fn active_items(page: &FormPage) -> formset_page::Result<usize> {
    page.query_count(".tab-menu li.active")
}

#[test]
fn click_moves_the_single_active_marker() -> formset_page::Result<()> {
    let mut page = FormPage::from_html(TABBED_PAGE)?;
    page.click("#tab-address")?;

    assert_eq!(active_items(&page)?, 1);
    page.assert_count(".tab-menu li:not(.active)", 3)?;
    assert_eq!(page.query_count(".tab-pane.active")?, 1);
    assert!(page.has_class("#addresses", "active")?);
    assert!(!page.has_class("#personal", "active")?);
    page.assert_text(".tab-menu li.active > a", "Address")?;
    Ok(())
}

#[test]
fn clicking_the_active_tab_is_idempotent() -> formset_page::Result<()> {
    let mut page = FormPage::from_html(TABBED_PAGE)?;
    page.click("#tab-bank")?;
    let before = page.outer_html(".tab-menu")?;
    page.click("#tab-bank")?;
    page.click("#tab-bank")?;

    assert_eq!(page.outer_html(".tab-menu")?, before);
    assert_eq!(active_items(&page)?, 1);
    assert!(page.has_class("#bank", "active")?);
    Ok(())
}

#[test]
fn any_click_sequence_leaves_exactly_one_active_item() -> formset_page::Result<()> {
    let mut page = FormPage::from_html(TABBED_PAGE)?;
    for link in [
        "#tab-bank",
        "#tab-personal",
        "#tab-orphan",
        "#tab-address",
        "#tab-address",
        "#tab-bank",
    ] {
        page.click(link)?;
        assert_eq!(active_items(&page)?, 1, "after clicking {link}");
        assert!(page.query_count(".tab-pane.active")? <= 1);
    }
    Ok(())
}

#[test]
fn link_without_a_matching_panel_clears_all_panels() -> formset_page::Result<()> {
    let mut page = FormPage::from_html(TABBED_PAGE)?;
    page.click("#tab-orphan")?;

    assert_eq!(active_items(&page)?, 1);
    assert_eq!(page.query_count(".tab-pane.active")?, 0);
    Ok(())
}

#[test]
fn custom_tab_selectors_and_class() -> formset_page::Result<()> {
    let html = r##"
      <nav class="steps">
        <a class="step current" href="#one">One</a>
        <a class="step" href="#two">Two</a>
      </nav>
      <section class="panel current" id="one"></section>
      <section class="panel" id="two"></section>
    "##;
    let config = PageConfig {
        formsets: Vec::new(),
        tabs: Some(TabConfig {
            link: ".steps a.step".into(),
            item: String::new(),
            panel: "section.panel".into(),
            active_class: "current".into(),
        }),
    };
    let mut page = FormPage::from_html_with_config(html, config)?;
    page.click(".steps a[href='#two']")?;

    page.assert_count("a.step.current", 1)?;
    page.assert_text("a.step.current", "Two")?;
    page.assert_count("section.current", 1)?;
    assert!(page.has_class("#two", "current")?);
    Ok(())
}

#[test]
fn tab_config_loads_from_json() -> formset_page::Result<()> {
    let config = PageConfig::from_json(
        r##"{ "formsets": [], "tabs": { "link": "#menu a", "active_class": "on" } }"##,
    )?;
    let tabs = config.tabs.unwrap_or_default();
    assert_eq!(tabs.link, "#menu a");
    assert_eq!(tabs.item, "li");
    assert_eq!(tabs.active_class, "on");
    Ok(())
}
