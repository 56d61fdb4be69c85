//! Deterministic step generator
//!
//! Used when no provider is configured, and for every line a provider
//! fails to answer. Matches keywords in the line and emits one Playwright
//! statement per step.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use testdeck_common::NewStep;

const MAX_NAME_LEN: usize = 80;

/// One generated step, in the shape providers are asked to return
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedStep {
    pub action: String,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub expected: Option<String>,
    #[serde(default)]
    pub playwright_code: String,
}

impl GeneratedStep {
    /// Usable as-is: an action and some code.
    pub fn is_complete(&self) -> bool {
        !self.action.trim().is_empty() && !self.playwright_code.trim().is_empty()
    }

    pub fn into_new_step(self) -> NewStep {
        NewStep {
            action: self.action.trim().to_string(),
            data: self.data.filter(|d| !d.trim().is_empty()),
            expected: self.expected.filter(|e| !e.trim().is_empty()),
            playwright_script: Some(self.playwright_code),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Intent {
    Navigate,
    Click,
    Fill,
    Select,
    Uncheck,
    Check,
    Hover,
    Press,
    Wait,
    Assert,
}

static KEYWORDS: Lazy<Vec<(Intent, Regex)>> = Lazy::new(|| {
    [
        (Intent::Navigate, r"(?i)\b(?:navigate to|navigate|go to|goto|open|visit)\b"),
        (Intent::Click, r"(?i)\b(?:click on|click|clicks|tap on|tap)\b"),
        (Intent::Fill, r"(?i)\b(?:fill in|fill|type|types|enter|enters)\b"),
        (Intent::Select, r"(?i)\b(?:select|choose)\b"),
        (Intent::Uncheck, r"(?i)\buncheck\b"),
        (Intent::Check, r"(?i)\b(?:check|tick)\b"),
        (Intent::Hover, r"(?i)\bhover(?: over)?\b"),
        (Intent::Press, r"(?i)\bpress(?:es)?\b"),
        (Intent::Wait, r"(?i)\bwait(?: for)?\b"),
        (
            Intent::Assert,
            r"(?i)\b(?:expect|verify that|verify|should see|should be|assert|ensure)\b",
        ),
    ]
    .into_iter()
    .map(|(intent, pattern)| (intent, Regex::new(pattern).expect("valid regex")))
    .collect()
});

static URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(https?://[^\s'"]+|/[^\s'"]*)"#).expect("valid regex"));
static SECONDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(ms|milliseconds?|s|secs?|seconds?)\b").expect("valid regex"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Script given to lines no keyword matches
pub fn default_script(line: &str) -> String {
    format!(
        "// {}\n// No automation generated for this step; add Playwright code here.",
        WHITESPACE.replace_all(line.trim(), " ")
    )
}

/// Generate a step from one free-text line.
pub fn generate_step(line: &str) -> GeneratedStep {
    let line = line.trim();
    let action = WHITESPACE.replace_all(line, " ").into_owned();

    // Already Playwright code: keep it.
    if line.starts_with("await page.") || line.starts_with("page.") || line.starts_with("await expect(") {
        return GeneratedStep {
            action: format!("Run: {}", action),
            data: None,
            expected: None,
            playwright_code: terminate(line),
        };
    }

    let matched = KEYWORDS
        .iter()
        .filter_map(|(intent, re)| re.find(line).map(|m| (m.start(), m.end(), *intent)))
        .min_by_key(|(start, _, _)| *start);

    let Some((_, end, intent)) = matched else {
        return GeneratedStep {
            action,
            data: None,
            expected: None,
            playwright_code: default_script(line),
        };
    };

    let rest = clean_target(&line[end..]);
    let mut step = GeneratedStep {
        action,
        data: None,
        expected: None,
        playwright_code: String::new(),
    };

    step.playwright_code = match intent {
        Intent::Navigate => {
            let target = URL
                .find(&rest)
                .map(|m| m.as_str().trim_end_matches(['.', ',']).to_string())
                .unwrap_or_else(|| "/".to_string());
            step.data = Some(target.clone());
            format!("await page.goto({});", js(&target))
        }
        Intent::Click => format!("await {}.click();", locate(&rest)),
        Intent::Fill => {
            let (field, value) = split_fill(&rest);
            step.data = Some(value.clone());
            format!("await page.getByLabel({}).fill({});", js(&field), js(&value))
        }
        Intent::Select => {
            let (option, field) = split_once_word(&rest, &[" from ", " in "])
                .unwrap_or_else(|| (rest.clone(), String::new()));
            step.data = Some(option.clone());
            if field.is_empty() {
                format!("await page.getByRole('combobox').selectOption({});", js(&option))
            } else {
                format!("await page.getByLabel({}).selectOption({});", js(&field), js(&option))
            }
        }
        Intent::Uncheck => format!("await page.getByLabel({}).uncheck();", js(&strip_suffix(&rest, &["checkbox", "box"]))),
        Intent::Check => format!("await page.getByLabel({}).check();", js(&strip_suffix(&rest, &["checkbox", "box"]))),
        Intent::Hover => format!("await {}.hover();", locate(&rest)),
        Intent::Press => {
            if ends_with_word(&rest, "button") || ends_with_word(&rest, "link") {
                format!("await {}.click();", locate(&rest))
            } else {
                let key = strip_suffix(&rest, &["key"]);
                let key = if key.is_empty() { "Enter".to_string() } else { key_name(&key) };
                format!("await page.keyboard.press({});", js(&key))
            }
        }
        Intent::Wait => match wait_millis(&rest) {
            Some(ms) => format!("await page.waitForTimeout({});", ms),
            None if rest.is_empty() => "await page.waitForLoadState('networkidle');".to_string(),
            None => format!("await page.getByText({}).waitFor();", js(&rest)),
        },
        Intent::Assert => {
            let target = strip_suffix(&rest, &["is visible", "is shown", "is displayed", "appears"]);
            step.expected = Some(target.clone());
            if let Some(title) = strip_prefix_word(&target, "title") {
                format!("await expect(page).toHaveTitle({});", js(&title))
            } else if let Some(url) = strip_prefix_word(&target, "url") {
                format!("await expect(page).toHaveURL({});", js(&url))
            } else {
                format!("await expect(page.getByText({})).toBeVisible();", js(&target))
            }
        }
    };
    step
}

/// Deterministic cleanup used when no provider can suggest a name.
///
/// Collapses whitespace, trims surrounding punctuation, upper-cases the
/// first letter and caps the length.
pub fn fallback_test_case_name(name: &str) -> String {
    let collapsed = WHITESPACE.replace_all(name.trim(), " ");
    let trimmed = collapsed
        .trim_matches(|c: char| !c.is_alphanumeric() && c != ')' && c != ']')
        .trim();

    let mut chars = trimmed.chars();
    let mut out = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
        None => return "Untitled test case".to_string(),
    };

    if out.chars().count() > MAX_NAME_LEN {
        out = out.chars().take(MAX_NAME_LEN).collect::<String>();
        out = out.trim_end().to_string();
    }
    out
}

fn terminate(code: &str) -> String {
    if code.ends_with(';') {
        code.to_string()
    } else {
        format!("{};", code)
    }
}

/// Single-quoted JS literal
fn js(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

fn clean_target(text: &str) -> String {
    let mut t = text.trim().trim_end_matches(['.', '!', ';']).trim().to_string();
    for article in ["on ", "the ", "a ", "an ", "to "] {
        let starts = t
            .get(..article.len())
            .map_or(false, |p| p.eq_ignore_ascii_case(article));
        if t.len() > article.len() && starts {
            t = t[article.len()..].trim_start().to_string();
        }
    }
    unquote(&t)
}

fn unquote(text: &str) -> String {
    let t = text.trim();
    for q in ['"', '\'', '`'] {
        if t.len() >= 2 && t.starts_with(q) && t.ends_with(q) {
            return t[1..t.len() - 1].to_string();
        }
    }
    t.to_string()
}

fn ends_with_word(text: &str, word: &str) -> bool {
    text.to_ascii_lowercase()
        .split_whitespace()
        .last()
        .map_or(false, |w| w == word)
}

fn strip_suffix(text: &str, suffixes: &[&str]) -> String {
    let lower = text.to_ascii_lowercase();
    for suffix in suffixes {
        if lower.ends_with(suffix) && lower.len() > suffix.len() {
            return unquote(text[..text.len() - suffix.len()].trim());
        }
    }
    unquote(text)
}

fn strip_prefix_word(text: &str, word: &str) -> Option<String> {
    let lower = text.to_ascii_lowercase();
    let rest = lower.strip_prefix(word)?;
    if !rest.starts_with(' ') {
        return None;
    }
    let mut value = text[word.len()..].trim();
    for joiner in ["is ", "contains ", "equals ", "should be ", "= "] {
        if value.to_ascii_lowercase().starts_with(joiner) {
            value = value[joiner.len()..].trim();
        }
    }
    Some(unquote(value))
}

/// Split on the first separator found, case-insensitively.
fn split_once_word(text: &str, separators: &[&str]) -> Option<(String, String)> {
    let lower = text.to_ascii_lowercase();
    separators.iter().find_map(|sep| {
        lower.find(sep).map(|idx| {
            (
                unquote(text[..idx].trim()),
                clean_target(&text[idx + sep.len()..]),
            )
        })
    })
}

/// `"<field> with <value>"` or `"<value> into <field>"`
fn split_fill(text: &str) -> (String, String) {
    if let Some((field, value)) = split_once_word(text, &[" with "]) {
        return (strip_suffix(&field, &["field", "input"]), value);
    }
    if let Some((value, field)) = split_once_word(text, &[" into ", " in "]) {
        return (strip_suffix(&field, &["field", "input"]), value);
    }
    (strip_suffix(text, &["field", "input"]), String::new())
}

/// Locator for a clickable target
fn locate(target: &str) -> String {
    for role in ["button", "link", "tab", "checkbox"] {
        if ends_with_word(target, role) {
            let name = strip_suffix(target, &[role]);
            if !name.is_empty() {
                return format!("page.getByRole('{}', {{ name: {} }})", role, js(&name));
            }
        }
    }
    format!("page.getByText({})", js(target))
}

fn key_name(key: &str) -> String {
    match key.to_ascii_lowercase().as_str() {
        "enter" | "return" => "Enter".to_string(),
        "tab" => "Tab".to_string(),
        "escape" | "esc" => "Escape".to_string(),
        "space" => "Space".to_string(),
        "backspace" => "Backspace".to_string(),
        _ => key.to_string(),
    }
}

fn wait_millis(text: &str) -> Option<u64> {
    let caps = SECONDS.captures(text)?;
    let amount: f64 = caps.get(1)?.as_str().parse().ok()?;
    let unit = caps.get(2)?.as_str().to_ascii_lowercase();
    let ms = if unit.starts_with("ms") || unit.starts_with("milli") {
        amount
    } else {
        amount * 1000.0
    };
    Some(ms.round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("click login button", "await page.getByRole('button', { name: 'login' }).click();"; "click button")]
    #[test_case("Click on the Sign up link", "await page.getByRole('link', { name: 'Sign up' }).click();"; "click link")]
    #[test_case("click Forgot password", "await page.getByText('Forgot password').click();"; "click text")]
    #[test_case("navigate to https://shop.test/login", "await page.goto('https://shop.test/login');"; "navigate url")]
    #[test_case("go to /cart.", "await page.goto('/cart');"; "navigate path")]
    #[test_case("fill email with bob@shop.test", "await page.getByLabel('email').fill('bob@shop.test');"; "fill with")]
    #[test_case("type 'shoes' into the search field", "await page.getByLabel('search').fill('shoes');"; "type into")]
    #[test_case("select Germany from country", "await page.getByLabel('country').selectOption('Germany');"; "select")]
    #[test_case("check remember me checkbox", "await page.getByLabel('remember me').check();"; "check")]
    #[test_case("uncheck newsletter", "await page.getByLabel('newsletter').uncheck();"; "uncheck")]
    #[test_case("hover over the profile menu", "await page.getByText('profile menu').hover();"; "hover")]
    #[test_case("press enter", "await page.keyboard.press('Enter');"; "press key")]
    #[test_case("press the submit button", "await page.getByRole('button', { name: 'submit' }).click();"; "press button")]
    #[test_case("wait 2 seconds", "await page.waitForTimeout(2000);"; "wait seconds")]
    #[test_case("wait for Order confirmed", "await page.getByText('Order confirmed').waitFor();"; "wait text")]
    #[test_case("verify Welcome back is visible", "await expect(page.getByText('Welcome back')).toBeVisible();"; "verify")]
    #[test_case("user should see Dashboard", "await expect(page.getByText('Dashboard')).toBeVisible();"; "should see")]
    #[test_case("expect title is \"Shop\"", "await expect(page).toHaveTitle('Shop');"; "title")]
    fn test_generate_step(line: &str, code: &str) {
        assert_eq!(generate_step(line).playwright_code, code);
    }

    #[test]
    fn test_unmatched_line_gets_default_script() {
        let step = generate_step("some unparseable gibberish###");
        assert_eq!(step.action, "some unparseable gibberish###");
        assert_eq!(step.playwright_code, default_script("some unparseable gibberish###"));
        assert!(step.playwright_code.starts_with("// some unparseable gibberish###"));
        assert!(step.is_complete());
    }

    #[test]
    fn test_earliest_keyword_wins() {
        let step = generate_step("click checkout and verify total");
        assert_eq!(
            step.playwright_code,
            "await page.getByText('checkout and verify total').click();"
        );
    }

    #[test]
    fn test_pasted_code_is_kept() {
        let step = generate_step("await page.getByRole('button').click()");
        assert_eq!(step.playwright_code, "await page.getByRole('button').click();");
    }

    #[test]
    fn test_fill_records_data_and_escapes_quotes() {
        let step = generate_step("enter O'Brien in last name");
        assert_eq!(step.data.as_deref(), Some("O'Brien"));
        assert_eq!(
            step.playwright_code,
            "await page.getByLabel('last name').fill('O\\'Brien');"
        );
    }

    #[test]
    fn test_assertion_records_expected() {
        let step = generate_step("verify Welcome back");
        assert_eq!(step.expected.as_deref(), Some("Welcome back"));
    }

    #[test_case("  login   test  ", "Login test"; "whitespace")]
    #[test_case("--checkout flow!!", "Checkout flow"; "punctuation")]
    #[test_case("already Fine", "Already Fine"; "keeps inner case")]
    #[test_case("???", "Untitled test case"; "empty after trim")]
    fn test_fallback_name(input: &str, expected: &str) {
        assert_eq!(fallback_test_case_name(input), expected);
    }

    #[test]
    fn test_fallback_name_is_capped() {
        let long = "a".repeat(200);
        assert_eq!(fallback_test_case_name(&long).chars().count(), 80);
    }

    #[test]
    fn test_into_new_step_drops_blank_fields() {
        let step = GeneratedStep {
            action: " open home ".to_string(),
            data: Some(" ".to_string()),
            expected: None,
            playwright_code: "await page.goto('/');".to_string(),
        };
        let new_step = step.into_new_step();
        assert_eq!(new_step.action, "open home");
        assert_eq!(new_step.data, None);
        assert_eq!(new_step.playwright_script.as_deref(), Some("await page.goto('/');"));
    }
}
