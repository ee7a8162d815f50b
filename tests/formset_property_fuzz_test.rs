use formset_page::FormPage;
use proptest::collection::vec;
use proptest::prelude::*;
use proptest::test_runner::{FileFailurePersistence, TestCaseError, TestCaseResult};

const FORMSET_PROPTEST_REGRESSION_FILE: &str =
    "tests/proptest-regressions/formset_property_fuzz_test.txt";
const DEFAULT_FORMSET_PROPTEST_CASES: u32 = 64;

const ADDRESS_FORM: &str = r##"
<ul class="tab-menu">
  <li class="active"><a id="tab-a" href="#pane-a">A</a></li>
  <li><a id="tab-b" href="#pane-b">B</a></li>
  <li><a id="tab-c" href="#pane-c">C</a></li>
</ul>
<div class="tab-pane active" id="pane-a"></div>
<div class="tab-pane" id="pane-b"></div>
<div class="tab-pane" id="pane-c"></div>
<a id="Url" data-url="/country/states/0/"></a>
<form id="address">
  <input type="hidden" name="form-TOTAL_FORMS" id="id_form-TOTAL_FORMS" value="1">
  <p>
    <input type="text" name="form-0-street" id="id_form-0-street">
    <select name="form-0-country" id="id_form-0-country">
      <option value="" selected>---------</option>
      <option value="160">Nigeria</option>
      <option value="82">Ghana</option>
    </select>
    <select name="form-0-state" id="id_form-0-state"></select>
  </p>
  <button id="add-address-line">Add</button>
</form>
"##;

const STATES: &str = r#""[{\"pk\": 1, \"fields\": {\"name\": \"Lagos\"}}, {\"pk\": 2, \"fields\": {\"name\": \"Abuja\"}}]""#;

#[derive(Clone, Debug)]
enum PageAction {
    AddLine,
    PickCountry { line: usize, country: &'static str },
    SettleFetches,
    ClickTab(&'static str),
}

fn formset_proptest_cases() -> u32 {
    std::env::var("FORMSET_PAGE_PROPTEST_CASES")
        .ok()
        .and_then(|raw| raw.parse::<u32>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_FORMSET_PROPTEST_CASES)
}

fn page_action_strategy() -> BoxedStrategy<PageAction> {
    prop_oneof![
        4 => Just(PageAction::AddLine),
        3 => (0usize..16, prop_oneof![Just(""), Just("160"), Just("82")])
            .prop_map(|(line, country)| PageAction::PickCountry { line, country }),
        2 => Just(PageAction::SettleFetches),
        1 => prop_oneof![Just("#tab-a"), Just("#tab-b"), Just("#tab-c")].prop_map(PageAction::ClickTab),
    ]
    .boxed()
}

fn fail(err: formset_page::Error) -> TestCaseError {
    TestCaseError::fail(format!("{err:?}"))
}

fn assert_clicks_number_groups_consecutively(clicks: usize) -> TestCaseResult {
    let mut page = FormPage::from_html(ADDRESS_FORM).map_err(fail)?;
    for _ in 0..clicks {
        page.click("#add-address-line").map_err(fail)?;
    }

    for index in 0..=clicks {
        prop_assert_eq!(
            page.query_count(&format!("#address [name='form-{index}-street']"))
                .map_err(fail)?,
            1,
            "group {} after {} clicks",
            index,
            clicks
        );
    }
    prop_assert_eq!(
        page.query_count(&format!("[name='form-{}-street']", clicks + 1))
            .map_err(fail)?,
        0
    );
    prop_assert_eq!(
        page.value("#id_form-TOTAL_FORMS").map_err(fail)?,
        (clicks + 1).to_string()
    );
    prop_assert_eq!(page.query_count("#address p").map_err(fail)?, clicks + 1);
    Ok(())
}

fn assert_action_sequence_keeps_invariants(actions: &[PageAction]) -> TestCaseResult {
    let mut page = FormPage::from_html(ADDRESS_FORM).map_err(fail)?;
    page.set_fetch_mock("/country/states/160/", STATES);
    page.set_fetch_mock("/country/states/82/", "not json");
    let mut lines = 1usize;

    for (step, action) in actions.iter().enumerate() {
        let outcome = match action {
            PageAction::AddLine => {
                lines += 1;
                page.click("#add-address-line")
            }
            PageAction::PickCountry { line, country } => {
                let line = line % lines;
                let before = page.take_fetch_calls().len();
                prop_assert_eq!(before, 0);
                let picked = page.select_option(&format!("#id_form-{line}-country"), country);
                let calls = page.take_fetch_calls();
                let expected = usize::from(!country.is_empty());
                prop_assert_eq!(calls.len(), expected, "step {}: {:?}", step, action);
                picked
            }
            PageAction::SettleFetches => page.run_pending_fetches().map(|_| ()),
            PageAction::ClickTab(link) => page.click(link),
        };
        prop_assert!(
            outcome.is_ok(),
            "step {step}: {action:?} failed with {outcome:?}, actions={actions:?}"
        );

        prop_assert_eq!(
            page.value("#id_form-TOTAL_FORMS").map_err(fail)?,
            lines.to_string()
        );
        prop_assert_eq!(
            page.query_count(".tab-menu li.active").map_err(fail)?,
            1
        );
        for line in 0..lines {
            prop_assert_eq!(
                page.listener_count(&format!("#id_form-{line}-country"), "change")
                    .map_err(fail)?,
                1
            );
            let states = page
                .options(&format!("#id_form-{line}-state"))
                .map_err(fail)?;
            prop_assert!(states.is_empty() || states.len() == 2, "{states:?}");
        }
    }

    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: formset_proptest_cases(),
        failure_persistence: Some(Box::new(
            FileFailurePersistence::Direct(FORMSET_PROPTEST_REGRESSION_FILE),
        )),
        .. ProptestConfig::default()
    })]

    #[test]
    fn n_clicks_yield_indices_zero_through_n(clicks in 0usize..24) {
        assert_clicks_number_groups_consecutively(clicks)?;
    }

    #[test]
    fn random_page_interaction_keeps_formset_invariants(
        actions in vec(page_action_strategy(), 1..=32)
    ) {
        assert_action_sequence_keeps_invariants(&actions)?;
    }
}
