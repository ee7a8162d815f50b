use formset_page::{FetchResponse, FormPage};

const ADDRESS_FORM: &str = r##"
<a id="Url" href="#" data-url="/country/states/0/"></a>
<form id="address">
  <input type="hidden" name="form-TOTAL_FORMS" id="id_form-TOTAL_FORMS" value="1">
  <p>
    <input type="text" name="form-0-street" id="id_form-0-street">
    <select name="form-0-country" id="id_form-0-country">
      <option value="" selected>---------</option>
      <option value="160">Nigeria</option>
      <option value="82">Ghana</option>
    </select>
    <select name="form-0-state" id="id_form-0-state">
      <option value="7">Stale</option>
    </select>
  </p>
  <button id="add-address-line">Add</button>
</form>
"##;

const NIGERIA_STATES: &str = r#""[{\"model\": \"country.state\", \"pk\": 1, \"fields\": {\"name\": \"Lagos\", \"country\": 160}}, {\"model\": \"country.state\", \"pk\": 2, \"fields\": {\"name\": \"Abuja\", \"country\": 160}}]""#;

const GHANA_STATES: &str = r#""[{\"model\": \"country.state\", \"pk\": 31, \"fields\": {\"name\": \"Ashanti\", \"country\": 82}}]""#;

#[test]
fn change_issues_exactly_one_lookup_with_the_country_in_the_url() -> formset_page::Result<()> {
    let mut page = FormPage::from_html(ADDRESS_FORM)?;
    page.select_option("#id_form-0-country", "160")?;

    assert_eq!(page.take_fetch_calls(), vec!["/country/states/160/".to_string()]);
    assert_eq!(page.pending_fetches().len(), 1);
    Ok(())
}

#[test]
fn lagos_abuja_response_yields_two_options_in_order() -> formset_page::Result<()> {
    let mut page = FormPage::from_html(ADDRESS_FORM)?;
    page.set_fetch_mock("/country/states/160/", NIGERIA_STATES);
    page.select_option("#id_form-0-country", "160")?;
    assert_eq!(page.run_pending_fetches()?, 1);

    assert_eq!(
        page.options("#id_form-0-state")?,
        vec![
            ("1".to_string(), "Lagos".to_string()),
            ("2".to_string(), "Abuja".to_string()),
        ]
    );
    page.assert_value("#id_form-0-state", "1")?;
    Ok(())
}

#[test]
fn state_options_are_cleared_as_soon_as_the_country_changes() -> formset_page::Result<()> {
    let mut page = FormPage::from_html(ADDRESS_FORM)?;
    assert_eq!(page.options("#id_form-0-state")?.len(), 1);
    page.select_option("#id_form-0-country", "160")?;
    assert!(page.options("#id_form-0-state")?.is_empty());
    Ok(())
}

#[test]
fn blank_country_clears_without_a_lookup() -> formset_page::Result<()> {
    let mut page = FormPage::from_html(ADDRESS_FORM)?;
    page.select_option("#id_form-0-country", "160")?;
    page.take_fetch_calls();
    page.select_option("#id_form-0-country", "")?;

    assert!(page.take_fetch_calls().is_empty());
    assert!(page.options("#id_form-0-state")?.is_empty());
    Ok(())
}

#[test]
fn copied_group_targets_its_own_state_select() -> formset_page::Result<()> {
    let mut page = FormPage::from_html(ADDRESS_FORM)?;
    page.set_fetch_mock("/country/states/82/", GHANA_STATES);
    page.click("#add-address-line")?;
    page.select_option("#id_form-1-country", "82")?;
    page.run_pending_fetches()?;

    assert_eq!(
        page.options("#id_form-1-state")?,
        vec![("31".to_string(), "Ashanti".to_string())]
    );
    assert_eq!(page.options("#id_form-0-state")?.len(), 1);
    Ok(())
}

#[test]
fn repeated_binding_never_duplicates_lookups() -> formset_page::Result<()> {
    let mut page = FormPage::from_html(ADDRESS_FORM)?;
    for _ in 0..3 {
        page.click("#add-address-line")?;
    }
    assert_eq!(page.listener_count("#id_form-0-country", "change")?, 1);
    assert_eq!(page.listener_count("#id_form-3-country", "change")?, 1);
    assert_eq!(page.listener_count("#id_form-0-state", "change")?, 0);

    page.select_option("#id_form-0-country", "82")?;
    assert_eq!(page.take_fetch_calls().len(), 1);
    Ok(())
}

#[test]
fn malformed_body_leaves_the_select_empty_without_error() -> formset_page::Result<()> {
    let mut page = FormPage::from_html(ADDRESS_FORM)?;
    page.set_fetch_mock("/country/states/160/", "<html>Server Error</html>");
    page.select_option("#id_form-0-country", "160")?;
    page.run_pending_fetches()?;

    assert!(page.options("#id_form-0-state")?.is_empty());
    Ok(())
}

#[test]
fn error_status_and_network_failure_are_swallowed() -> formset_page::Result<()> {
    let mut page = FormPage::from_html(ADDRESS_FORM)?;
    page.set_fetch_response(
        "/country/states/160/",
        FetchResponse::with_status(500, NIGERIA_STATES),
    );
    page.set_fetch_failure("/country/states/82/", "connection reset");

    page.select_option("#id_form-0-country", "160")?;
    page.run_pending_fetches()?;
    assert!(page.options("#id_form-0-state")?.is_empty());

    page.select_option("#id_form-0-country", "82")?;
    page.run_pending_fetches()?;
    assert!(page.options("#id_form-0-state")?.is_empty());

    page.clear_fetch_mocks();
    page.select_option("#id_form-0-country", "160")?;
    assert_eq!(page.run_pending_fetches()?, 1);
    assert!(page.options("#id_form-0-state")?.is_empty());
    Ok(())
}

#[test]
fn late_response_for_an_earlier_choice_is_discarded() -> formset_page::Result<()> {
    let mut page = FormPage::from_html(ADDRESS_FORM)?;
    page.select_option("#id_form-0-country", "160")?;
    page.select_option("#id_form-0-country", "82")?;
    let pending = page.pending_fetches();
    assert_eq!(pending.len(), 2);
    assert_eq!(pending[0].url, "/country/states/160/");
    assert_eq!(pending[1].url, "/country/states/82/");

    page.complete_fetch(pending[1].id, FetchResponse::ok(GHANA_STATES))?;
    page.complete_fetch(pending[0].id, FetchResponse::ok(NIGERIA_STATES))?;

    assert_eq!(
        page.options("#id_form-0-state")?,
        vec![("31".to_string(), "Ashanti".to_string())]
    );
    assert!(page.pending_fetches().is_empty());
    Ok(())
}

#[test]
fn failing_a_request_by_id_keeps_the_select_empty() -> formset_page::Result<()> {
    let mut page = FormPage::from_html(ADDRESS_FORM)?;
    page.select_option("#id_form-0-country", "160")?;
    let pending = page.pending_fetches();
    page.fail_fetch(pending[0].id, "timeout")?;

    assert!(page.options("#id_form-0-state")?.is_empty());
    assert!(page.pending_fetches().is_empty());
    Ok(())
}

#[test]
fn plain_array_bodies_are_accepted() -> formset_page::Result<()> {
    let mut page = FormPage::from_html(ADDRESS_FORM)?;
    page.set_fetch_mock(
        "/country/states/160/",
        r#"[{"pk": 1, "fields": {"name": "Lagos"}}]"#,
    );
    page.select_option("#id_form-0-country", "160")?;
    page.run_pending_fetches()?;
    page.assert_value("#id_form-0-state", "1")?;
    page.assert_text("#id_form-0-state", "Lagos")?;
    Ok(())
}

#[test]
fn selecting_on_a_non_select_is_a_type_mismatch() -> formset_page::Result<()> {
    let mut page = FormPage::from_html(ADDRESS_FORM)?;
    match page.select_option("#id_form-0-street", "x") {
        Err(formset_page::Error::TypeMismatch { expected, actual, .. }) => {
            assert_eq!(expected, "select");
            assert_eq!(actual, "input");
        }
        other => panic!("expected TypeMismatch, got {other:?}"),
    }
    assert!(matches!(
        page.select_option("#id_form-0-country", "999"),
        Err(formset_page::Error::Dom(_))
    ));
    Ok(())
}

#[test]
fn answer_arriving_after_the_country_was_blanked_is_discarded() -> formset_page::Result<()> {
    let mut page = FormPage::from_html(ADDRESS_FORM)?;
    page.set_fetch_mock("/country/states/160/", NIGERIA_STATES);
    page.select_option("#id_form-0-country", "160")?;
    page.select_option("#id_form-0-country", "")?;
    assert_eq!(page.run_pending_fetches()?, 1);

    assert!(page.options("#id_form-0-state")?.is_empty());
    Ok(())
}
