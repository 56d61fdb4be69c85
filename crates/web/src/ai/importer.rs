//! Batch step import

use futures::future::join_all;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::sync::Arc;
use testdeck_common::{Database, EditContext, Error, Result, Step, StepParent};
use tracing::{debug, info, warn};

use super::heuristic::{fallback_test_case_name, generate_step, GeneratedStep};
use super::provider::{build_provider, CompletionProvider, ProviderKind};
use crate::config::AiConfig;

const STEPS_SYSTEM_PROMPT: &str = r#"You convert manual test instructions or pasted automation code into Playwright test steps.
For every numbered input line produce exactly one JSON object:
{"action": "<what the user does>", "data": "<input value or null>", "expected": "<expected result or null>", "playwrightCode": "<one or more TypeScript statements using the `page` object>"}
Reply with a JSON array holding one object per input line, in input order. Output only JSON."#;

const NAME_SYSTEM_PROMPT: &str = "You tidy up test case names. Reply with the improved name only: \
     sentence case, no trailing punctuation, at most 80 characters.";

static CODE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)```").expect("valid regex"));

/// Generates steps from free text and appends them to a parent.
#[derive(Clone)]
pub struct StepImporter {
    provider: Option<Arc<dyn CompletionProvider>>,
    batch_size: usize,
}

impl StepImporter {
    pub fn new(provider: Option<Arc<dyn CompletionProvider>>, batch_size: usize) -> Self {
        Self {
            provider,
            batch_size: batch_size.max(1),
        }
    }

    pub fn rule_based() -> Self {
        Self::new(None, 10)
    }

    pub fn from_config(config: &AiConfig) -> Self {
        Self::new(build_provider(config), config.batch_size)
    }

    pub fn provider_kind(&self) -> ProviderKind {
        self.provider
            .as_ref()
            .map_or(ProviderKind::RuleBased, |p| p.kind())
    }

    /// One step per non-blank line, in input order.
    pub async fn generate(&self, lines: &[String]) -> Vec<GeneratedStep> {
        let lines: Vec<&str> = lines
            .iter()
            .map(|l| l.trim())
            .filter(|l| !l.is_empty())
            .collect();

        let Some(provider) = &self.provider else {
            return lines.into_iter().map(generate_step).collect();
        };

        let batches = lines
            .chunks(self.batch_size)
            .map(|batch| generate_batch(provider.as_ref(), batch));
        join_all(batches).await.into_iter().flatten().collect()
    }

    /// Generate steps for `lines` and append them to `parent` as a single
    /// edit.
    pub async fn import(
        &self,
        db: &Database,
        parent: &StepParent,
        lines: &[String],
        ctx: &EditContext,
    ) -> Result<Vec<Step>> {
        // Fail before calling the provider when the parent is gone.
        db.list_steps(parent)?;

        let generated = self.generate(lines).await;
        if generated.is_empty() {
            return Err(Error::validation("at least one non-empty line is required"));
        }

        let count = generated.len();
        let steps = generated.into_iter().map(GeneratedStep::into_new_step).collect();
        let created = db.insert_steps(parent, steps, ctx)?;
        info!(
            "Imported {} steps into {} via {}",
            count,
            parent,
            self.provider_kind()
        );
        Ok(created)
    }

    /// Suggest a cleaned-up test case name.
    pub async fn fix_test_case_name(&self, name: &str) -> String {
        if let Some(provider) = &self.provider {
            match provider.complete_with_system(NAME_SYSTEM_PROMPT, name).await {
                Ok(text) => {
                    let suggestion = text
                        .lines()
                        .map(|l| l.trim().trim_matches(['"', '\'', '`']))
                        .find(|l| !l.is_empty());
                    if let Some(suggestion) = suggestion {
                        return fallback_test_case_name(suggestion);
                    }
                    warn!("{} returned an empty name suggestion", provider.kind());
                }
                Err(e) => warn!("Name suggestion via {} failed: {}", provider.kind(), e),
            }
        }
        fallback_test_case_name(name)
    }
}

fn build_prompt(batch: &[&str]) -> String {
    let mut prompt = String::from("Input lines:\n");
    for (i, line) in batch.iter().enumerate() {
        prompt.push_str(&format!("{}. {}\n", i + 1, line));
    }
    prompt
}

/// Ask the provider for one batch. Anything it cannot answer for a line
/// comes from the heuristic.
async fn generate_batch(provider: &dyn CompletionProvider, batch: &[&str]) -> Vec<GeneratedStep> {
    let items = match provider
        .complete_with_system(STEPS_SYSTEM_PROMPT, &build_prompt(batch))
        .await
    {
        Ok(text) => extract_json_array(&text).unwrap_or_else(|| {
            warn!(
                "{} response held no JSON array, using heuristic for {} lines",
                provider.kind(),
                batch.len()
            );
            Vec::new()
        }),
        Err(e) => {
            warn!(
                "{} call failed, using heuristic for {} lines: {}",
                provider.kind(),
                batch.len(),
                e
            );
            Vec::new()
        }
    };

    batch
        .iter()
        .enumerate()
        .map(|(i, line)| match items.get(i).and_then(|v| parse_item(v, line)) {
            Some(step) => step,
            None => {
                debug!("Heuristic fallback for line {}: {}", i + 1, line);
                generate_step(line)
            }
        })
        .collect()
}

fn parse_item(value: &Value, line: &str) -> Option<GeneratedStep> {
    let mut step: GeneratedStep = serde_json::from_value(value.clone()).ok()?;
    if step.action.trim().is_empty() {
        step.action = line.to_string();
    }
    step.is_complete().then_some(step)
}

/// Find a JSON array in model output: bare, inside a code fence, or
/// embedded in prose. An object wrapping a `steps` array also counts.
pub fn extract_json_array(text: &str) -> Option<Vec<Value>> {
    let text = text.trim();

    let mut candidates: Vec<&str> = vec![text];
    candidates.extend(
        CODE_FENCE
            .captures_iter(text)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str().trim()),
    );
    if let (Some(start), Some(end)) = (text.find('['), text.rfind(']')) {
        if start < end {
            candidates.push(&text[start..=end]);
        }
    }
    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if start < end {
            candidates.push(&text[start..=end]);
        }
    }

    candidates.into_iter().find_map(|candidate| {
        match serde_json::from_str::<Value>(candidate).ok()? {
            Value::Array(items) => Some(items),
            Value::Object(mut map) => match map.remove("steps") {
                Some(Value::Array(items)) => Some(items),
                _ => None,
            },
            _ => None,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::heuristic::default_script;
    use crate::ai::provider::AiError;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use testdeck_common::{NewProject, NewTestCase};

    /// Answers each call with the next scripted reply.
    struct ScriptedProvider {
        replies: Mutex<Vec<std::result::Result<String, AiError>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedProvider {
        fn new(replies: Vec<std::result::Result<String, AiError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into_iter().rev().collect()),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl CompletionProvider for ScriptedProvider {
        fn kind(&self) -> ProviderKind {
            ProviderKind::OpenAi
        }

        async fn complete_with_system(
            &self,
            _system: &str,
            prompt: &str,
        ) -> std::result::Result<String, AiError> {
            self.prompts.lock().push(prompt.to_string());
            self.replies.lock().pop().unwrap_or(Err(AiError::Timeout))
        }
    }

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn setup() -> (Database, StepParent) {
        let db = Database::open_memory().unwrap();
        let project = db
            .create_project(NewProject {
                name: "Shop".to_string(),
                ..Default::default()
            })
            .unwrap();
        let case = db
            .create_test_case(
                &project.id,
                NewTestCase {
                    name: "Login".to_string(),
                    ..Default::default()
                },
                &EditContext::default(),
            )
            .unwrap();
        (db, StepParent::test_case(case.id))
    }

    #[test]
    fn test_extract_from_fence_and_prose() {
        let fenced = "Here you go:\n```json\n[{\"action\": \"a\"}]\n```\nEnjoy";
        assert_eq!(extract_json_array(fenced).unwrap().len(), 1);

        let prose = "Sure! [{\"action\": \"a\"}, {\"action\": \"b\"}] hope that helps";
        assert_eq!(extract_json_array(prose).unwrap().len(), 2);

        let wrapped = "{\"steps\": [{\"action\": \"a\"}]}";
        assert_eq!(extract_json_array(wrapped).unwrap().len(), 1);

        assert!(extract_json_array("no json here").is_none());
        assert!(extract_json_array("{\"action\": \"a\"}").is_none());
    }

    #[tokio::test]
    async fn test_malformed_item_falls_back_per_line() {
        let reply = r#"```json
[
  {"action": "Click login", "data": null, "expected": null, "playwrightCode": "await page.click('#login');"},
  {"nonsense": true}
]
```"#;
        let provider = ScriptedProvider::new(vec![Ok(reply.to_string())]);
        let importer = StepImporter::new(Some(provider), 10);

        let steps = importer
            .generate(&lines(&["click login button", "some unparseable gibberish###"]))
            .await;

        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].action, "Click login");
        assert_eq!(steps[0].playwright_code, "await page.click('#login');");
        assert_eq!(steps[1].action, "some unparseable gibberish###");
        assert_eq!(
            steps[1].playwright_code,
            default_script("some unparseable gibberish###")
        );
    }

    #[tokio::test]
    async fn test_failed_batch_does_not_abort_others() {
        let good = r#"[{"action": "Open home", "playwrightCode": "await page.goto('/');"}]"#;
        // Batches are issued in order, so the first call fails and the
        // second one answers.
        let provider = ScriptedProvider::new(vec![
            Err(AiError::Status {
                status: 401,
                message: "bad key".to_string(),
            }),
            Ok(good.to_string()),
        ]);
        let importer = StepImporter::new(Some(provider.clone()), 1);

        let steps = importer
            .generate(&lines(&["click login button", "open home"]))
            .await;

        assert_eq!(provider.prompts.lock().len(), 2);
        assert_eq!(steps.len(), 2);
        assert_eq!(
            steps[0].playwright_code,
            "await page.getByRole('button', { name: 'login' }).click();"
        );
        assert_eq!(steps[1].action, "Open home");
    }

    #[tokio::test]
    async fn test_short_reply_covers_missing_items() {
        let reply = r#"[{"action": "", "playwrightCode": "await page.goto('/a');"}]"#;
        let provider = ScriptedProvider::new(vec![Ok(reply.to_string())]);
        let importer = StepImporter::new(Some(provider), 5);

        let steps = importer.generate(&lines(&["go to /a", "wait 1 s"])).await;
        assert_eq!(steps[0].action, "go to /a");
        assert_eq!(steps[1].playwright_code, "await page.waitForTimeout(1000);");
    }

    #[tokio::test]
    async fn test_import_appends_in_order() {
        let (db, parent) = setup();
        let importer = StepImporter::rule_based();

        let created = importer
            .import(
                &db,
                &parent,
                &lines(&["click login button", "", "some unparseable gibberish###"]),
                &EditContext::by("u1"),
            )
            .await
            .unwrap();

        assert_eq!(created.len(), 2);
        let steps = db.list_steps(&parent).unwrap();
        assert_eq!(steps[0].action, "click login button");
        assert_eq!(steps[0].order, 0);
        assert_eq!(steps[1].order, 1);
        assert_eq!(
            steps[1].playwright_script.as_deref(),
            Some(default_script("some unparseable gibberish###").as_str())
        );

        // One version for creation, one for the import.
        assert_eq!(db.list_versions(&parent).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_import_rejects_blank_input() {
        let (db, parent) = setup();
        let err = StepImporter::rule_based()
            .import(&db, &parent, &lines(&["  "]), &EditContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_import_into_missing_parent() {
        let (db, _) = setup();
        let err = StepImporter::rule_based()
            .import(
                &db,
                &StepParent::fixture("nope"),
                &lines(&["click ok"]),
                &EditContext::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_fix_name_uses_provider_then_fallback() {
        let provider = ScriptedProvider::new(vec![Ok("\"Checkout with saved card\"\n".to_string())]);
        let importer = StepImporter::new(Some(provider), 10);
        assert_eq!(
            importer.fix_test_case_name("checkout w/ card!!").await,
            "Checkout with saved card"
        );
        // Script exhausted: the provider errors and the fallback applies.
        assert_eq!(
            importer.fix_test_case_name("  checkout   flow ").await,
            "Checkout flow"
        );
    }
}
