//! Spec file generation
//!
//! Renders test cases into a single Playwright test file. Every test is
//! titled `"<name> [<test case id>]"` so results in the JSON report can be
//! mapped back to their test case.

use std::collections::{HashMap, HashSet};
use testdeck_common::{Fixture, Step, TestCase, WithSteps};

/// A test case together with its ordered steps
pub type CaseWithSteps = WithSteps<TestCase>;

/// Fixtures reachable from the selected cases, by id
pub type FixtureIndex = HashMap<String, WithSteps<Fixture>>;

/// Title used for a test case inside the generated file
pub fn test_title(case: &TestCase) -> String {
    format!("{} [{}]", case.name, case.id)
}

/// JS string literal for `value`
fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

fn indent(code: &str, depth: usize) -> String {
    let pad = "  ".repeat(depth);
    code.lines()
        .map(|line| {
            if line.trim().is_empty() {
                String::new()
            } else {
                format!("{}{}", pad, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn render_steps(
    out: &mut Vec<String>,
    steps: &[Step],
    fixtures: &FixtureIndex,
    depth: usize,
    expanding: &mut HashSet<String>,
) {
    for step in steps.iter().filter(|s| !s.disabled) {
        if let Some(fixture_ref) = &step.fixture_ref {
            match fixtures.get(fixture_ref) {
                Some(fixture) if expanding.insert(fixture_ref.clone()) => {
                    out.push(indent(&format!("// fixture: {}", single_line(&fixture.item.name)), depth));
                    render_steps(out, &fixture.steps, fixtures, depth, expanding);
                    expanding.remove(fixture_ref);
                    continue;
                }
                Some(_) => {
                    out.push(indent(&format!("// skipped recursive fixture {}", fixture_ref), depth));
                    continue;
                }
                None => {
                    out.push(indent(&format!("// missing fixture {}", fixture_ref), depth));
                }
            }
        }

        out.push(indent(&format!("// {}", single_line(&step.action)), depth));
        match step.playwright_script.as_deref().map(str::trim) {
            Some(code) if !code.is_empty() => out.push(indent(code, depth)),
            _ => {
                if let Some(expected) = &step.expected {
                    out.push(indent(&format!("// expected: {}", single_line(expected)), depth));
                }
            }
        }
    }
}

/// Render one test block
pub fn render_case(case: &CaseWithSteps, fixtures: &FixtureIndex) -> String {
    let mut body = Vec::new();
    match case.item.playwright_script.as_deref().map(str::trim) {
        Some(script) if !script.is_empty() => body.push(indent(script, 2)),
        _ => render_steps(&mut body, &case.steps, fixtures, 2, &mut HashSet::new()),
    }

    format!(
        "  test({}, async ({{ page }}) => {{\n{}\n  }});\n",
        js_string(&test_title(&case.item)),
        body.join("\n")
    )
}

/// Render the whole spec file for a run
pub fn render_spec(suite: &str, cases: &[CaseWithSteps], fixtures: &FixtureIndex) -> String {
    let mut spec = String::from("import { test, expect } from '@playwright/test';\n\n");
    spec.push_str(&format!("test.describe({}, () => {{\n", js_string(suite)));
    for case in cases {
        spec.push_str(&render_case(case, fixtures));
    }
    spec.push_str("});\n");
    spec
}

#[cfg(test)]
mod tests {
    use super::*;
    use testdeck_common::{FixtureType, TestCaseStatus};

    fn step(order: i64, action: &str, script: Option<&str>) -> Step {
        Step {
            id: format!("s{}", order),
            test_case_id: Some("tc".to_string()),
            fixture_id: None,
            order,
            action: action.to_string(),
            data: None,
            expected: None,
            disabled: false,
            fixture_ref: None,
            playwright_script: script.map(str::to_string),
            created_at: 0,
            updated_at: 0,
        }
    }

    fn case(steps: Vec<Step>) -> CaseWithSteps {
        WithSteps {
            item: TestCase {
                id: "tc-1".to_string(),
                project_id: "p".to_string(),
                name: "Log in".to_string(),
                status: TestCaseStatus::Active,
                tags: vec![],
                is_manual: false,
                playwright_script: None,
                current_version: 1,
                created_at: 0,
                updated_at: 0,
            },
            steps,
        }
    }

    fn fixture(id: &str, steps: Vec<Step>) -> WithSteps<Fixture> {
        WithSteps {
            item: Fixture {
                id: id.to_string(),
                project_id: "p".to_string(),
                name: "Sign in".to_string(),
                fixture_type: FixtureType::Setup,
                tags: vec![],
                export_name: None,
                playwright_script: None,
                current_version: 1,
                created_at: 0,
                updated_at: 0,
            },
            steps,
        }
    }

    #[test]
    fn test_title_carries_id() {
        let spec = render_spec("Shop", &[case(vec![])], &FixtureIndex::new());
        assert!(spec.contains(r#"test("Log in [tc-1]", async ({ page }) => {"#));
        assert!(spec.starts_with("import { test, expect } from '@playwright/test';"));
        assert!(spec.contains(r#"test.describe("Shop", () => {"#));
    }

    #[test]
    fn test_steps_in_order_and_disabled_skipped() {
        let mut skipped = step(1, "never", Some("await page.click('#never');"));
        skipped.disabled = true;
        let rendered = render_case(
            &case(vec![
                step(0, "open", Some("await page.goto('/');")),
                skipped,
                step(2, "submit", Some("await page.click('#submit');")),
            ]),
            &FixtureIndex::new(),
        );
        let goto = rendered.find("page.goto").unwrap();
        let submit = rendered.find("#submit").unwrap();
        assert!(goto < submit);
        assert!(!rendered.contains("#never"));
    }

    #[test]
    fn test_fixture_steps_are_inlined() {
        let mut uses = step(0, "sign in", None);
        uses.fixture_ref = Some("fx".to_string());
        let mut fixtures = FixtureIndex::new();
        fixtures.insert(
            "fx".to_string(),
            fixture("fx", vec![step(0, "fill", Some("await page.fill('#user', 'demo');"))]),
        );

        let rendered = render_case(&case(vec![uses]), &fixtures);
        assert!(rendered.contains("// fixture: Sign in"));
        assert!(rendered.contains("await page.fill('#user', 'demo');"));
    }

    #[test]
    fn test_recursive_fixture_is_not_expanded_forever() {
        let mut loop_step = step(0, "again", None);
        loop_step.fixture_ref = Some("fx".to_string());
        let mut fixtures = FixtureIndex::new();
        fixtures.insert("fx".to_string(), fixture("fx", vec![loop_step.clone()]));

        let rendered = render_case(&case(vec![loop_step]), &fixtures);
        assert!(rendered.contains("// skipped recursive fixture fx"));
    }

    #[test]
    fn test_case_script_overrides_steps() {
        let mut c = case(vec![step(0, "open", Some("await page.goto('/');"))]);
        c.item.playwright_script = Some("await page.goto('/custom');".to_string());
        let rendered = render_case(&c, &FixtureIndex::new());
        assert!(rendered.contains("/custom"));
        assert!(!rendered.contains("goto('/')"));
    }
}
