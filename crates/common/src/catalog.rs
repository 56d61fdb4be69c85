//! Projects, tags, test cases and fixtures

use crate::db::{
    collect_rows, fixture_from_row, project_from_row, test_case_from_row, FIXTURE_COLUMNS,
    PROJECT_COLUMNS, TEST_CASE_COLUMNS,
};
use crate::steps::{insert_step_row, list_steps_in, validate_fixture_ref, EditContext};
use crate::types::*;
use crate::versions::{check_expected_version, load_parent, write_snapshot};
use crate::{Database, Error, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashSet;
use tracing::{debug, info};

/// Filters for listing test cases
#[derive(Debug, Clone, Default)]
pub struct TestCaseFilter {
    pub status: Option<TestCaseStatus>,
    pub tag: Option<String>,
}

fn required_name(name: &str, what: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::validation(format!("{} name must not be empty", what)));
    }
    Ok(name.to_string())
}

/// Trim, drop empties and de-duplicate, keeping first-seen order.
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    tags.iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .filter(|t| seen.insert(t.to_string()))
        .map(str::to_string)
        .collect()
}

pub(crate) fn get_project_in(conn: &Connection, id: &str) -> Result<Project> {
    conn.query_row(
        &format!("SELECT {} FROM projects WHERE id = ?1", PROJECT_COLUMNS),
        params![id],
        project_from_row,
    )
    .optional()?
    .ok_or_else(|| Error::not_found("project", id))
}

fn get_test_case_in(conn: &Connection, id: &str) -> Result<TestCase> {
    conn.query_row(
        &format!("SELECT {} FROM test_cases WHERE id = ?1", TEST_CASE_COLUMNS),
        params![id],
        test_case_from_row,
    )
    .optional()?
    .ok_or_else(|| Error::not_found("test_case", id))
}

fn get_fixture_in(conn: &Connection, id: &str) -> Result<Fixture> {
    conn.query_row(
        &format!("SELECT {} FROM fixtures WHERE id = ?1", FIXTURE_COLUMNS),
        params![id],
        fixture_from_row,
    )
    .optional()?
    .ok_or_else(|| Error::not_found("fixture", id))
}

/// Copy every step of `from` onto the empty parent `to`, keeping orders.
fn copy_steps(conn: &Connection, from: &StepParent, to: &StepParent, project_id: &str) -> Result<()> {
    let now = now_millis();
    for step in list_steps_in(conn, from)? {
        if let Some(fixture_ref) = &step.fixture_ref {
            validate_fixture_ref(conn, to, project_id, fixture_ref)?;
        }
        let copy = NewStep {
            action: step.action,
            data: step.data,
            expected: step.expected,
            disabled: step.disabled,
            fixture_ref: step.fixture_ref,
            playwright_script: step.playwright_script,
        };
        insert_step_row(conn, to, &new_id(), step.order, &copy, now)?;
    }
    Ok(())
}

impl Database {
    // ------------------------------------------------------------------
    // Projects
    // ------------------------------------------------------------------

    pub fn create_project(&self, project: NewProject) -> Result<Project> {
        let name = required_name(&project.name, "project")?;
        let now = now_millis();
        let record = Project {
            id: new_id(),
            name,
            url: project.url,
            environment: project.environment,
            description: project.description,
            created_at: now,
            updated_at: now,
        };

        self.transaction(|tx| {
            tx.execute(
                "INSERT INTO projects (id, name, url, environment, description, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    record.id,
                    record.name,
                    record.url,
                    record.environment,
                    record.description,
                    record.created_at,
                    record.updated_at,
                ],
            )?;
            Ok(())
        })?;

        info!("Created project {} ({})", record.name, record.id);
        Ok(record)
    }

    pub fn get_project(&self, id: &str) -> Result<Project> {
        self.read(|conn| get_project_in(conn, id))
    }

    pub fn list_projects(&self) -> Result<Vec<Project>> {
        self.read(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM projects ORDER BY created_at DESC",
                PROJECT_COLUMNS
            ))?;
            let rows = stmt.query_map([], project_from_row)?;
            collect_rows(rows)
        })
    }

    pub fn update_project(&self, id: &str, patch: ProjectPatch) -> Result<Project> {
        let name = patch
            .name
            .as_deref()
            .map(|n| required_name(n, "project"))
            .transpose()?;

        self.transaction(|tx| {
            let mut project = get_project_in(tx, id)?;
            if let Some(name) = name {
                project.name = name;
            }
            if let Some(url) = patch.url {
                project.url = url;
            }
            if let Some(environment) = patch.environment {
                project.environment = environment;
            }
            if let Some(description) = patch.description {
                project.description = description;
            }
            project.updated_at = now_millis();

            tx.execute(
                "UPDATE projects SET name = ?1, url = ?2, environment = ?3, description = ?4, updated_at = ?5 WHERE id = ?6",
                params![
                    project.name,
                    project.url,
                    project.environment,
                    project.description,
                    project.updated_at,
                    project.id,
                ],
            )?;
            Ok(project)
        })
    }

    /// Delete a project and everything it owns.
    pub fn delete_project(&self, id: &str) -> Result<()> {
        let deleted = self.transaction(|tx| Ok(tx.execute("DELETE FROM projects WHERE id = ?1", params![id])?))?;
        if deleted == 0 {
            return Err(Error::not_found("project", id));
        }
        info!("Deleted project {}", id);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Tags
    // ------------------------------------------------------------------

    /// Declared tags united with every tag in use by the project's test
    /// cases and fixtures, sorted.
    pub fn list_project_tags(&self, project_id: &str) -> Result<Vec<String>> {
        self.read(|conn| {
            get_project_in(conn, project_id)?;
            let mut stmt = conn.prepare(
                "SELECT name FROM project_tags WHERE project_id = ?1
                 UNION SELECT j.value FROM test_cases, json_each(test_cases.tags) AS j WHERE test_cases.project_id = ?1
                 UNION SELECT j.value FROM fixtures, json_each(fixtures.tags) AS j WHERE fixtures.project_id = ?1
                 ORDER BY 1",
            )?;
            let rows = stmt.query_map(params![project_id], |row| row.get::<_, String>(0))?;
            collect_rows(rows)
        })
    }

    /// Declare tags on a project. Existing tags are left alone.
    pub fn add_project_tags(&self, project_id: &str, tags: &[String]) -> Result<Vec<String>> {
        let tags = normalize_tags(tags);
        if tags.is_empty() {
            return Err(Error::validation("at least one non-empty tag is required"));
        }

        self.transaction(|tx| {
            get_project_in(tx, project_id)?;
            let now = now_millis();
            for tag in &tags {
                tx.execute(
                    "INSERT OR IGNORE INTO project_tags (project_id, name, created_at) VALUES (?1, ?2, ?3)",
                    params![project_id, tag, now],
                )?;
            }
            Ok(())
        })?;
        self.list_project_tags(project_id)
    }

    // ------------------------------------------------------------------
    // Test cases
    // ------------------------------------------------------------------

    pub fn create_test_case(
        &self,
        project_id: &str,
        case: NewTestCase,
        ctx: &EditContext,
    ) -> Result<TestCase> {
        let name = required_name(&case.name, "test case")?;
        let tags = normalize_tags(&case.tags);

        self.transaction(|tx| {
            get_project_in(tx, project_id)?;
            let id = new_id();
            let now = now_millis();
            tx.execute(
                "INSERT INTO test_cases (id, project_id, name, status, tags, is_manual, playwright_script, current_version, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8, ?8)",
                params![
                    id,
                    project_id,
                    name,
                    case.status.to_string(),
                    serde_json::to_string(&tags)?,
                    case.is_manual,
                    case.playwright_script,
                    now,
                ],
            )?;
            write_snapshot(tx, &StepParent::test_case(&id), ctx, None)?;

            debug!("Created test case {} in project {}", id, project_id);
            get_test_case_in(tx, &id)
        })
    }

    pub fn get_test_case(&self, id: &str) -> Result<TestCase> {
        self.read(|conn| get_test_case_in(conn, id))
    }

    pub fn get_test_case_with_steps(&self, id: &str) -> Result<WithSteps<TestCase>> {
        self.read(|conn| {
            let item = get_test_case_in(conn, id)?;
            let steps = list_steps_in(conn, &StepParent::test_case(id))?;
            Ok(WithSteps { item, steps })
        })
    }

    pub fn list_test_cases(&self, project_id: &str, filter: &TestCaseFilter) -> Result<Vec<TestCase>> {
        let cases = self.read(|conn| {
            get_project_in(conn, project_id)?;
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM test_cases WHERE project_id = ?1 ORDER BY created_at ASC",
                TEST_CASE_COLUMNS
            ))?;
            let rows = stmt.query_map(params![project_id], test_case_from_row)?;
            collect_rows(rows)
        })?;

        Ok(cases
            .into_iter()
            .filter(|c| filter.status.map_or(true, |s| c.status == s))
            .filter(|c| filter.tag.as_ref().map_or(true, |t| c.tags.contains(t)))
            .collect())
    }

    pub fn update_test_case(&self, id: &str, patch: TestCasePatch, ctx: &EditContext) -> Result<TestCase> {
        let name = patch
            .name
            .as_deref()
            .map(|n| required_name(n, "test case"))
            .transpose()?;
        let ctx = EditContext {
            expected_version: patch.expected_version.or(ctx.expected_version),
            ..ctx.clone()
        };

        self.transaction(|tx| {
            let parent = StepParent::test_case(id);
            let state = load_parent(tx, &parent)?;
            check_expected_version(&parent, &state, &ctx)?;

            let mut case = get_test_case_in(tx, id)?;
            if let Some(name) = name {
                case.name = name;
            }
            if let Some(status) = patch.status {
                case.status = status;
            }
            if let Some(tags) = &patch.tags {
                case.tags = normalize_tags(tags);
            }
            if let Some(is_manual) = patch.is_manual {
                case.is_manual = is_manual;
            }
            if let Some(script) = patch.playwright_script {
                case.playwright_script = script;
            }

            tx.execute(
                "UPDATE test_cases SET name = ?1, status = ?2, tags = ?3, is_manual = ?4, playwright_script = ?5 WHERE id = ?6",
                params![
                    case.name,
                    case.status.to_string(),
                    serde_json::to_string(&case.tags)?,
                    case.is_manual,
                    case.playwright_script,
                    id,
                ],
            )?;
            write_snapshot(tx, &parent, &ctx, None)?;
            get_test_case_in(tx, id)
        })
    }

    pub fn delete_test_case(&self, id: &str) -> Result<()> {
        let deleted =
            self.transaction(|tx| Ok(tx.execute("DELETE FROM test_cases WHERE id = ?1", params![id])?))?;
        if deleted == 0 {
            return Err(Error::not_found("test_case", id));
        }
        debug!("Deleted test case {}", id);
        Ok(())
    }

    /// Copy a test case and its steps under the name `"<name> (copy)"`.
    pub fn clone_test_case(&self, id: &str, ctx: &EditContext) -> Result<WithSteps<TestCase>> {
        self.transaction(|tx| {
            let source = get_test_case_in(tx, id)?;
            let clone_id = new_id();
            let now = now_millis();
            tx.execute(
                "INSERT INTO test_cases (id, project_id, name, status, tags, is_manual, playwright_script, current_version, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8, ?8)",
                params![
                    clone_id,
                    source.project_id,
                    format!("{} (copy)", source.name),
                    source.status.to_string(),
                    serde_json::to_string(&source.tags)?,
                    source.is_manual,
                    source.playwright_script,
                    now,
                ],
            )?;

            let to = StepParent::test_case(&clone_id);
            copy_steps(tx, &StepParent::test_case(id), &to, &source.project_id)?;
            write_snapshot(tx, &to, ctx, None)?;

            info!("Cloned test case {} into {}", id, clone_id);
            Ok(WithSteps {
                item: get_test_case_in(tx, &clone_id)?,
                steps: list_steps_in(tx, &to)?,
            })
        })
    }

    // ------------------------------------------------------------------
    // Fixtures
    // ------------------------------------------------------------------

    pub fn create_fixture(&self, project_id: &str, fixture: NewFixture, ctx: &EditContext) -> Result<Fixture> {
        let name = required_name(&fixture.name, "fixture")?;
        let tags = normalize_tags(&fixture.tags);

        self.transaction(|tx| {
            get_project_in(tx, project_id)?;
            let id = new_id();
            let now = now_millis();
            tx.execute(
                "INSERT INTO fixtures (id, project_id, name, fixture_type, tags, export_name, playwright_script, current_version, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8, ?8)",
                params![
                    id,
                    project_id,
                    name,
                    fixture.fixture_type.to_string(),
                    serde_json::to_string(&tags)?,
                    fixture.export_name,
                    fixture.playwright_script,
                    now,
                ],
            )?;
            write_snapshot(tx, &StepParent::fixture(&id), ctx, None)?;

            debug!("Created fixture {} in project {}", id, project_id);
            get_fixture_in(tx, &id)
        })
    }

    pub fn get_fixture(&self, id: &str) -> Result<Fixture> {
        self.read(|conn| get_fixture_in(conn, id))
    }

    pub fn get_fixture_with_steps(&self, id: &str) -> Result<WithSteps<Fixture>> {
        self.read(|conn| {
            let item = get_fixture_in(conn, id)?;
            let steps = list_steps_in(conn, &StepParent::fixture(id))?;
            Ok(WithSteps { item, steps })
        })
    }

    pub fn list_fixtures(&self, project_id: &str) -> Result<Vec<Fixture>> {
        self.read(|conn| {
            get_project_in(conn, project_id)?;
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM fixtures WHERE project_id = ?1 ORDER BY created_at ASC",
                FIXTURE_COLUMNS
            ))?;
            let rows = stmt.query_map(params![project_id], fixture_from_row)?;
            collect_rows(rows)
        })
    }

    pub fn update_fixture(&self, id: &str, patch: FixturePatch, ctx: &EditContext) -> Result<Fixture> {
        let name = patch
            .name
            .as_deref()
            .map(|n| required_name(n, "fixture"))
            .transpose()?;
        let ctx = EditContext {
            expected_version: patch.expected_version.or(ctx.expected_version),
            ..ctx.clone()
        };

        self.transaction(|tx| {
            let parent = StepParent::fixture(id);
            let state = load_parent(tx, &parent)?;
            check_expected_version(&parent, &state, &ctx)?;

            let mut fixture = get_fixture_in(tx, id)?;
            if let Some(name) = name {
                fixture.name = name;
            }
            if let Some(fixture_type) = patch.fixture_type {
                fixture.fixture_type = fixture_type;
            }
            if let Some(tags) = &patch.tags {
                fixture.tags = normalize_tags(tags);
            }
            if let Some(export_name) = patch.export_name {
                fixture.export_name = export_name;
            }
            if let Some(script) = patch.playwright_script {
                fixture.playwright_script = script;
            }

            tx.execute(
                "UPDATE fixtures SET name = ?1, fixture_type = ?2, tags = ?3, export_name = ?4, playwright_script = ?5 WHERE id = ?6",
                params![
                    fixture.name,
                    fixture.fixture_type.to_string(),
                    serde_json::to_string(&fixture.tags)?,
                    fixture.export_name,
                    fixture.playwright_script,
                    id,
                ],
            )?;
            write_snapshot(tx, &parent, &ctx, None)?;
            get_fixture_in(tx, id)
        })
    }

    /// Delete a fixture. Refused while steps of other parents still
    /// reference it.
    pub fn delete_fixture(&self, id: &str) -> Result<()> {
        self.transaction(|tx| {
            get_fixture_in(tx, id)?;
            let referenced: i64 = tx.query_row(
                "SELECT COUNT(*) FROM steps WHERE fixture_ref = ?1 AND (fixture_id IS NULL OR fixture_id <> ?1)",
                params![id],
                |row| row.get(0),
            )?;
            if referenced > 0 {
                return Err(Error::Conflict(format!(
                    "fixture {} is still referenced by {} step(s)",
                    id, referenced
                )));
            }
            tx.execute("DELETE FROM fixtures WHERE id = ?1", params![id])?;
            Ok(())
        })?;
        debug!("Deleted fixture {}", id);
        Ok(())
    }

    /// Copy a fixture and its steps under the name `"<name> (copy)"`.
    pub fn clone_fixture(&self, id: &str, ctx: &EditContext) -> Result<WithSteps<Fixture>> {
        self.transaction(|tx| {
            let source = get_fixture_in(tx, id)?;
            let clone_id = new_id();
            let now = now_millis();
            tx.execute(
                "INSERT INTO fixtures (id, project_id, name, fixture_type, tags, export_name, playwright_script, current_version, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8, ?8)",
                params![
                    clone_id,
                    source.project_id,
                    format!("{} (copy)", source.name),
                    source.fixture_type.to_string(),
                    serde_json::to_string(&source.tags)?,
                    source.export_name,
                    source.playwright_script,
                    now,
                ],
            )?;

            let to = StepParent::fixture(&clone_id);
            copy_steps(tx, &StepParent::fixture(id), &to, &source.project_id)?;
            write_snapshot(tx, &to, ctx, None)?;

            info!("Cloned fixture {} into {}", id, clone_id);
            Ok(WithSteps {
                item: get_fixture_in(tx, &clone_id)?,
                steps: list_steps_in(tx, &to)?,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn project(db: &Database) -> Project {
        db.create_project(NewProject {
            name: "Shop".to_string(),
            url: Some("https://shop.example.com".to_string()),
            ..Default::default()
        })
        .unwrap()
    }

    fn case(db: &Database, project_id: &str, name: &str, tags: &[&str]) -> TestCase {
        db.create_test_case(
            project_id,
            NewTestCase {
                name: name.to_string(),
                tags: tags.iter().map(|t| t.to_string()).collect(),
                ..Default::default()
            },
            &EditContext::default(),
        )
        .unwrap()
    }

    #[test_case("" ; "empty")]
    #[test_case("   " ; "whitespace")]
    fn test_blank_names_are_rejected(name: &str) {
        let db = Database::open_memory().unwrap();
        let err = db
            .create_project(NewProject {
                name: name.to_string(),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_project_crud() {
        let db = Database::open_memory().unwrap();
        let p = project(&db);
        assert_eq!(db.get_project(&p.id).unwrap(), p);

        let updated = db
            .update_project(
                &p.id,
                ProjectPatch {
                    url: Some(None),
                    environment: Some(Some("staging".to_string())),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.url, None);
        assert_eq!(updated.environment.as_deref(), Some("staging"));
        assert_eq!(updated.name, "Shop");

        db.delete_project(&p.id).unwrap();
        assert!(matches!(db.get_project(&p.id), Err(Error::NotFound { .. })));
        assert!(matches!(db.delete_project(&p.id), Err(Error::NotFound { .. })));
    }

    #[test]
    fn test_normalize_tags() {
        let tags = vec![" smoke ".to_string(), "".to_string(), "smoke".to_string(), "cart".to_string()];
        assert_eq!(normalize_tags(&tags), vec!["smoke", "cart"]);
    }

    #[test]
    fn test_tags_union_declared_and_used() {
        let db = Database::open_memory().unwrap();
        let p = project(&db);
        case(&db, &p.id, "Login", &["smoke", "auth"]);
        db.add_project_tags(&p.id, &["regression".to_string(), "smoke".to_string()])
            .unwrap();

        assert_eq!(
            db.list_project_tags(&p.id).unwrap(),
            vec!["auth", "regression", "smoke"]
        );
    }

    #[test]
    fn test_list_test_cases_filters() {
        let db = Database::open_memory().unwrap();
        let p = project(&db);
        let login = case(&db, &p.id, "Login", &["smoke"]);
        case(&db, &p.id, "Search", &["regression"]);
        db.update_test_case(
            &login.id,
            TestCasePatch {
                status: Some(TestCaseStatus::Active),
                ..Default::default()
            },
            &EditContext::default(),
        )
        .unwrap();

        let smoke = db
            .list_test_cases(
                &p.id,
                &TestCaseFilter {
                    tag: Some("smoke".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(smoke.len(), 1);
        assert_eq!(smoke[0].name, "Login");

        let drafts = db
            .list_test_cases(
                &p.id,
                &TestCaseFilter {
                    status: Some(TestCaseStatus::Draft),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].name, "Search");
    }

    #[test]
    fn test_update_with_stale_version_conflicts() {
        let db = Database::open_memory().unwrap();
        let p = project(&db);
        let c = case(&db, &p.id, "Login", &[]);

        let patch = || TestCasePatch {
            name: Some("Sign in".to_string()),
            expected_version: Some(c.current_version),
            ..Default::default()
        };
        let updated = db.update_test_case(&c.id, patch(), &EditContext::default()).unwrap();
        assert_eq!(updated.current_version, c.current_version + 1);

        let err = db.update_test_case(&c.id, patch(), &EditContext::default()).unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[test]
    fn test_clone_copies_steps() {
        let db = Database::open_memory().unwrap();
        let p = project(&db);
        let c = case(&db, &p.id, "Login", &["smoke"]);
        let parent = StepParent::test_case(&c.id);
        for action in ["open", "type", "submit"] {
            db.insert_step(&parent, NewStep::new(action), None, &EditContext::default())
                .unwrap();
        }

        let cloned = db.clone_test_case(&c.id, &EditContext::default()).unwrap();
        assert_eq!(cloned.item.name, "Login (copy)");
        assert_eq!(cloned.item.tags, vec!["smoke"]);
        assert_eq!(cloned.item.current_version, 1);
        let got: Vec<(&str, i64)> = cloned.steps.iter().map(|s| (s.action.as_str(), s.order)).collect();
        assert_eq!(got, vec![("open", 0), ("type", 1), ("submit", 2)]);
        assert!(cloned.steps.iter().all(|s| s.test_case_id.as_deref() == Some(cloned.item.id.as_str())));
    }

    #[test]
    fn test_delete_referenced_fixture_conflicts() {
        let db = Database::open_memory().unwrap();
        let p = project(&db);
        let fixture = db
            .create_fixture(
                &p.id,
                NewFixture {
                    name: "Login".to_string(),
                    fixture_type: FixtureType::Setup,
                    ..Default::default()
                },
                &EditContext::default(),
            )
            .unwrap();
        let c = case(&db, &p.id, "Checkout", &[]);
        let mut step = NewStep::new("log in");
        step.fixture_ref = Some(fixture.id.clone());
        let step = db
            .insert_step(&StepParent::test_case(&c.id), step, None, &EditContext::default())
            .unwrap();

        let err = db.delete_fixture(&fixture.id).unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));

        db.delete_step(&StepParent::test_case(&c.id), &step.id, &EditContext::default())
            .unwrap();
        db.delete_fixture(&fixture.id).unwrap();
        assert!(matches!(db.get_fixture(&fixture.id), Err(Error::NotFound { .. })));
    }

    #[test]
    fn test_delete_test_case_cascades_steps_and_versions() {
        let db = Database::open_memory().unwrap();
        let p = project(&db);
        let c = case(&db, &p.id, "Login", &[]);
        let step = db
            .insert_step(&StepParent::test_case(&c.id), NewStep::new("open"), None, &EditContext::default())
            .unwrap();

        db.delete_test_case(&c.id).unwrap();
        assert!(matches!(db.get_step(&step.id), Err(Error::NotFound { .. })));
        let versions: i64 = db
            .read(|conn| {
                Ok(conn.query_row(
                    "SELECT COUNT(*) FROM versions WHERE parent_id = ?1",
                    params![c.id],
                    |r| r.get(0),
                )?)
            })
            .unwrap();
        assert_eq!(versions, 0);
    }
}
