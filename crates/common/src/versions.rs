//! Version history and revert for test cases and fixtures
//!
//! Every structural write ends with [`write_snapshot`], which appends the
//! post-write state as version `max + 1` and stamps the parent's
//! `current_version` and `updated_at` with it. Version timestamps are
//! strictly increasing per parent, so `updated_at` identifies the version
//! whose content equals the live state.
//!
//! Revert is the one write that snapshots first: the version it appends
//! holds the pre-revert state, and the parent's `updated_at` is set to the
//! restored version's `created_at`.

use crate::db::{collect_rows, version_from_row, VERSION_COLUMNS};
use crate::steps::{fixture_reaches, insert_step_row, is_dense, list_steps_in, EditContext};
use crate::types::*;
use crate::{Database, Error, Result};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info, warn};

/// Live fields of a step parent needed by the engines
#[derive(Debug, Clone)]
pub(crate) struct ParentState {
    pub project_id: String,
    pub name: String,
    pub playwright_script: Option<String>,
    pub current_version: i64,
    pub updated_at: i64,
}

pub(crate) fn load_parent(conn: &Connection, parent: &StepParent) -> Result<ParentState> {
    conn.query_row(
        &format!(
            "SELECT project_id, name, playwright_script, current_version, updated_at FROM {} WHERE id = ?1",
            parent.kind.table()
        ),
        params![parent.id],
        |row| {
            Ok(ParentState {
                project_id: row.get(0)?,
                name: row.get(1)?,
                playwright_script: row.get(2)?,
                current_version: row.get(3)?,
                updated_at: row.get(4)?,
            })
        },
    )
    .optional()?
    .ok_or_else(|| Error::not_found(parent.kind.as_str(), &parent.id))
}

pub(crate) fn check_expected_version(
    parent: &StepParent,
    state: &ParentState,
    ctx: &EditContext,
) -> Result<()> {
    match ctx.expected_version {
        Some(expected) if expected != state.current_version => Err(Error::Conflict(format!(
            "{} is at version {}, expected {}",
            parent, state.current_version, expected
        ))),
        _ => Ok(()),
    }
}

/// Append the current state of `parent` as a new version.
pub(crate) fn write_snapshot(
    conn: &Connection,
    parent: &StepParent,
    ctx: &EditContext,
    reverted_from: Option<i64>,
) -> Result<Version> {
    let state = load_parent(conn, parent)?;
    let steps: Vec<StepSnapshot> = list_steps_in(conn, parent)?
        .iter()
        .map(StepSnapshot::from)
        .collect();

    let (next, last_at): (i64, Option<i64>) = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) + 1, MAX(created_at) FROM versions WHERE parent_kind = ?1 AND parent_id = ?2",
        params![parent.kind.as_str(), parent.id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    let created_at = match last_at {
        Some(last) => now_millis().max(last + 1),
        None => now_millis(),
    };

    let version = Version {
        id: new_id(),
        parent_kind: parent.kind,
        parent_id: parent.id.clone(),
        version: next,
        name: state.name,
        playwright_script: state.playwright_script,
        steps,
        created_at,
        created_by: ctx.actor.clone(),
        reverted_from,
    };

    conn.execute(
        "INSERT INTO versions (id, parent_kind, parent_id, version, name, playwright_script, steps, created_at, created_by, reverted_from)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            version.id,
            version.parent_kind.as_str(),
            version.parent_id,
            version.version,
            version.name,
            version.playwright_script,
            serde_json::to_string(&version.steps)?,
            version.created_at,
            version.created_by,
            version.reverted_from,
        ],
    )?;
    conn.execute(
        &format!(
            "UPDATE {} SET current_version = ?1, updated_at = ?2 WHERE id = ?3",
            parent.kind.table()
        ),
        params![version.version, version.created_at, parent.id],
    )?;

    debug!("Recorded version {} of {}", version.version, parent);
    Ok(version)
}

fn get_version_in(conn: &Connection, version_id: &str) -> Result<Version> {
    conn.query_row(
        &format!("SELECT {} FROM versions WHERE id = ?1", VERSION_COLUMNS),
        params![version_id],
        version_from_row,
    )
    .optional()?
    .ok_or_else(|| Error::not_found("version", version_id))
}

/// Fixture references in a snapshot that can still be restored.
/// Dangling references are dropped; a reference that would now form a
/// cycle rejects the revert.
fn restorable_fixture_ref(
    conn: &Connection,
    parent: &StepParent,
    project_id: &str,
    step: &StepSnapshot,
) -> Result<Option<String>> {
    let Some(fixture_ref) = &step.fixture_ref else {
        return Ok(None);
    };

    let exists: Option<String> = conn
        .query_row(
            "SELECT id FROM fixtures WHERE id = ?1 AND project_id = ?2",
            params![fixture_ref, project_id],
            |row| row.get(0),
        )
        .optional()?;
    if exists.is_none() {
        warn!(
            "Dropping reference to missing fixture {} from step {} while reverting {}",
            fixture_ref, step.id, parent
        );
        return Ok(None);
    }

    if parent.kind == ParentKind::Fixture
        && (fixture_ref == &parent.id || fixture_reaches(conn, fixture_ref, &parent.id)?)
    {
        return Err(Error::validation(format!(
            "restoring step {} would make fixture {} reference itself",
            step.id, parent.id
        )));
    }
    Ok(Some(fixture_ref.clone()))
}

impl Database {
    /// Versions of `parent`, newest first
    pub fn list_versions(&self, parent: &StepParent) -> Result<Vec<Version>> {
        self.read(|conn| {
            load_parent(conn, parent)?;
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM versions WHERE parent_kind = ?1 AND parent_id = ?2 ORDER BY version DESC",
                VERSION_COLUMNS
            ))?;
            let rows = stmt.query_map(params![parent.kind.as_str(), parent.id], version_from_row)?;
            collect_rows(rows)
        })
    }

    pub fn get_version(&self, version_id: &str) -> Result<Version> {
        self.read(|conn| get_version_in(conn, version_id))
    }

    /// Restore `parent` to the state captured by `version_id`.
    ///
    /// The pre-revert state is recorded as a new version whose
    /// `reverted_from` names the restored version, then the live name,
    /// script and steps are overwritten. Returns the new version.
    pub fn revert(
        &self,
        parent: &StepParent,
        version_id: &str,
        ctx: &EditContext,
    ) -> Result<Version> {
        self.transaction(|tx| {
            let state = load_parent(tx, parent)?;
            check_expected_version(parent, &state, ctx)?;

            let target = get_version_in(tx, version_id)?;
            if target.parent() != *parent {
                return Err(Error::not_found("version", version_id));
            }
            if target.created_at == state.updated_at {
                return Err(Error::validation(format!(
                    "version {} is already the current state of {}",
                    target.version, parent
                )));
            }
            if !is_dense(target.steps.iter().map(|s| s.order)) {
                return Err(Error::Integrity(format!(
                    "version {} of {} has non-contiguous step orders",
                    target.version, parent
                )));
            }

            let mut restored = Vec::with_capacity(target.steps.len());
            for snap in &target.steps {
                let fixture_ref = restorable_fixture_ref(tx, parent, &state.project_id, snap)?;
                restored.push((snap, fixture_ref));
            }

            let version = write_snapshot(tx, parent, ctx, Some(target.version))?;

            tx.execute(
                &format!(
                    "UPDATE {} SET name = ?1, playwright_script = ?2, updated_at = ?3 WHERE id = ?4",
                    parent.kind.table()
                ),
                params![target.name, target.playwright_script, target.created_at, parent.id],
            )?;
            tx.execute(
                &format!("DELETE FROM steps WHERE {} = ?1", parent.kind.step_column()),
                params![parent.id],
            )?;

            let now = now_millis();
            for (snap, fixture_ref) in restored {
                let taken = tx
                    .query_row("SELECT 1 FROM steps WHERE id = ?1", params![snap.id], |_| Ok(()))
                    .optional()?
                    .is_some();
                let id = if taken { new_id() } else { snap.id.clone() };
                let step = NewStep {
                    action: snap.action.clone(),
                    data: snap.data.clone(),
                    expected: snap.expected.clone(),
                    disabled: snap.disabled,
                    fixture_ref,
                    playwright_script: snap.playwright_script.clone(),
                };
                insert_step_row(tx, parent, &id, snap.order, &step, now)?;
            }

            info!(
                "Reverted {} to version {} (pre-revert state kept as version {})",
                parent, target.version, version.version
            );
            Ok(version)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Database, TestCase) {
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
                    name: "Checkout".to_string(),
                    ..Default::default()
                },
                &EditContext::by("alice@example.com"),
            )
            .unwrap();
        (db, case)
    }

    fn actions(db: &Database, parent: &StepParent) -> Vec<String> {
        db.list_steps(parent)
            .unwrap()
            .into_iter()
            .map(|s| s.action)
            .collect()
    }

    #[test]
    fn test_create_records_first_version() {
        let (db, case) = setup();
        let parent = StepParent::test_case(&case.id);
        let versions = db.list_versions(&parent).unwrap();
        assert_eq!(versions.len(), 1);
        assert_eq!(versions[0].version, 1);
        assert_eq!(versions[0].created_by.as_deref(), Some("alice@example.com"));
        assert_eq!(case.current_version, 1);
        assert_eq!(case.updated_at, versions[0].created_at);
    }

    #[test]
    fn test_versions_are_strictly_increasing() {
        let (db, case) = setup();
        let parent = StepParent::test_case(&case.id);
        for action in ["A", "B", "C"] {
            db.insert_step(&parent, NewStep::new(action), None, &EditContext::default())
                .unwrap();
        }
        let numbers: Vec<i64> = db
            .list_versions(&parent)
            .unwrap()
            .iter()
            .map(|v| v.version)
            .collect();
        assert_eq!(numbers, vec![4, 3, 2, 1]);

        let latest = db.get_test_case(&case.id).unwrap();
        assert_eq!(latest.current_version, 4);
    }

    #[test]
    fn test_revert_restores_snapshot() {
        let (db, case) = setup();
        let parent = StepParent::test_case(&case.id);
        let a = db
            .insert_step(&parent, NewStep::new("A"), None, &EditContext::default())
            .unwrap();
        let b = db
            .insert_step(&parent, NewStep::new("B"), None, &EditContext::default())
            .unwrap();
        let target = db.list_versions(&parent).unwrap()[0].clone();

        db.move_step(&parent, &b.id, 0, &EditContext::default()).unwrap();
        db.insert_step(&parent, NewStep::new("C"), None, &EditContext::default())
            .unwrap();
        db.update_test_case(
            &case.id,
            TestCasePatch {
                name: Some("Renamed".to_string()),
                ..Default::default()
            },
            &EditContext::default(),
        )
        .unwrap();

        let reverted = db
            .revert(&parent, &target.id, &EditContext::by("bob@example.com"))
            .unwrap();
        assert_eq!(reverted.reverted_from, Some(target.version));
        assert_eq!(reverted.created_by.as_deref(), Some("bob@example.com"));
        assert_eq!(reverted.name, "Renamed");
        let kept: Vec<&str> = reverted.steps.iter().map(|s| s.action.as_str()).collect();
        assert_eq!(kept, vec!["B", "A", "C"]);

        let steps = db.list_steps(&parent).unwrap();
        let got: Vec<(&str, &str, i64)> = steps
            .iter()
            .map(|s| (s.id.as_str(), s.action.as_str(), s.order))
            .collect();
        assert_eq!(got, vec![(a.id.as_str(), "A", 0), (b.id.as_str(), "B", 1)]);
        let restored = db.get_test_case(&case.id).unwrap();
        assert_eq!(restored.name, "Checkout");
        assert_eq!(restored.current_version, reverted.version);
        assert_eq!(restored.updated_at, target.created_at);
    }

    #[test]
    fn test_revert_records_pre_revert_content() {
        let (db, case) = setup();
        let parent = StepParent::test_case(&case.id);
        let v1 = db.list_versions(&parent).unwrap()[0].clone();
        db.insert_step(&parent, NewStep::new("A"), None, &EditContext::default())
            .unwrap();
        db.update_test_case(
            &case.id,
            TestCasePatch {
                name: Some("Renamed".to_string()),
                ..Default::default()
            },
            &EditContext::default(),
        )
        .unwrap();
        let before = db.list_versions(&parent).unwrap().len();

        let reverted = db.revert(&parent, &v1.id, &EditContext::default()).unwrap();

        let versions = db.list_versions(&parent).unwrap();
        assert_eq!(versions.len(), before + 1);
        assert_eq!(versions[0].id, reverted.id);
        assert_eq!(reverted.name, "Renamed");
        assert_eq!(reverted.steps.len(), 1);
        assert_eq!(reverted.steps[0].action, "A");

        let live = db.get_test_case(&case.id).unwrap();
        assert_eq!(live.name, "Checkout");
        assert!(actions(&db, &parent).is_empty());
    }

    #[test]
    fn test_revert_can_be_undone_but_not_repeated() {
        let (db, case) = setup();
        let parent = StepParent::test_case(&case.id);
        let v1 = db.list_versions(&parent).unwrap()[0].clone();
        db.insert_step(&parent, NewStep::new("A"), None, &EditContext::default())
            .unwrap();

        let pre_revert = db.revert(&parent, &v1.id, &EditContext::default()).unwrap();
        let err = db.revert(&parent, &v1.id, &EditContext::default()).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        db.revert(&parent, &pre_revert.id, &EditContext::default())
            .unwrap();
        assert_eq!(actions(&db, &parent), vec!["A"]);
        let err = db
            .revert(&parent, &pre_revert.id, &EditContext::default())
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_revert_moves_expected_version() {
        let (db, case) = setup();
        let parent = StepParent::test_case(&case.id);
        let v1 = db.list_versions(&parent).unwrap()[0].clone();
        db.insert_step(&parent, NewStep::new("A"), None, &EditContext::default())
            .unwrap();

        let reverted = db
            .revert(&parent, &v1.id, &EditContext::default().expecting(Some(2)))
            .unwrap();
        assert_eq!(reverted.version, 3);
        let err = db
            .insert_step(&parent, NewStep::new("B"), None, &EditContext::default().expecting(Some(2)))
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
        db.insert_step(&parent, NewStep::new("B"), None, &EditContext::default().expecting(Some(3)))
            .unwrap();
    }

    #[test]
    fn test_version_timestamps_are_unique_per_parent() {
        let (db, case) = setup();
        let parent = StepParent::test_case(&case.id);
        for action in ["A", "B", "C", "D"] {
            db.insert_step(&parent, NewStep::new(action), None, &EditContext::default())
                .unwrap();
        }
        let stamps: Vec<i64> = db
            .list_versions(&parent)
            .unwrap()
            .iter()
            .map(|v| v.created_at)
            .collect();
        assert!(stamps.windows(2).all(|w| w[0] > w[1]));
    }

    #[test]
    fn test_revert_keeps_pre_revert_state_in_history() {
        let (db, case) = setup();
        let parent = StepParent::test_case(&case.id);
        let v1 = db.list_versions(&parent).unwrap()[0].clone();
        db.insert_step(&parent, NewStep::new("A"), None, &EditContext::default())
            .unwrap();

        db.revert(&parent, &v1.id, &EditContext::default()).unwrap();
        assert!(actions(&db, &parent).is_empty());

        let versions = db.list_versions(&parent).unwrap();
        assert_eq!(versions.len(), 3);
        assert_eq!(versions[0].reverted_from, Some(1));
        assert_eq!(versions[0].steps.len(), 1);
        assert_eq!(versions[0].steps[0].action, "A");
    }

    #[test]
    fn test_revert_to_current_version_is_rejected() {
        let (db, case) = setup();
        let parent = StepParent::test_case(&case.id);
        let current = db.list_versions(&parent).unwrap()[0].clone();
        let err = db
            .revert(&parent, &current.id, &EditContext::default())
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(db.list_versions(&parent).unwrap().len(), 1);
    }

    #[test]
    fn test_revert_rejects_version_of_other_parent() {
        let (db, case) = setup();
        let other = db
            .create_test_case(
                &case.project_id,
                NewTestCase {
                    name: "Other".to_string(),
                    ..Default::default()
                },
                &EditContext::default(),
            )
            .unwrap();
        let foreign = db.list_versions(&StepParent::test_case(&other.id)).unwrap()[0].clone();
        let err = db
            .revert(&StepParent::test_case(&case.id), &foreign.id, &EditContext::default())
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn test_revert_rejects_non_dense_snapshot() {
        let (db, case) = setup();
        let parent = StepParent::test_case(&case.id);
        db.insert_step(&parent, NewStep::new("A"), None, &EditContext::default())
            .unwrap();
        db.insert_step(&parent, NewStep::new("B"), None, &EditContext::default())
            .unwrap();
        let broken = db.list_versions(&parent).unwrap()[1].clone();
        db.read(|conn| {
            conn.execute(
                "UPDATE versions SET steps = ?1 WHERE id = ?2",
                params![
                    r#"[{"id":"x","order":3,"action":"A","data":null,"expected":null,"fixtureRef":null,"playwrightScript":null}]"#,
                    broken.id
                ],
            )?;
            Ok(())
        })
        .unwrap();

        let err = db.revert(&parent, &broken.id, &EditContext::default()).unwrap_err();
        assert!(matches!(err, Error::Integrity(_)));
        assert_eq!(actions(&db, &parent), vec!["A", "B"]);
    }

    #[test]
    fn test_revert_drops_references_to_deleted_fixtures() {
        let (db, case) = setup();
        let parent = StepParent::test_case(&case.id);
        let fixture = db
            .create_fixture(
                &case.project_id,
                NewFixture {
                    name: "Login".to_string(),
                    ..Default::default()
                },
                &EditContext::default(),
            )
            .unwrap();
        let mut step = NewStep::new("log in");
        step.fixture_ref = Some(fixture.id.clone());
        db.insert_step(&parent, step, None, &EditContext::default())
            .unwrap();
        let with_ref = db.list_versions(&parent).unwrap()[0].clone();

        let all = db.list_steps(&parent).unwrap();
        db.delete_step(&parent, &all[0].id, &EditContext::default())
            .unwrap();
        db.delete_fixture(&fixture.id).unwrap();

        db.revert(&parent, &with_ref.id, &EditContext::default())
            .unwrap();
        let steps = db.list_steps(&parent).unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].fixture_ref, None);
    }

    #[test]
    fn test_revert_with_stale_expected_version_conflicts() {
        let (db, case) = setup();
        let parent = StepParent::test_case(&case.id);
        let v1 = db.list_versions(&parent).unwrap()[0].clone();
        db.insert_step(&parent, NewStep::new("A"), None, &EditContext::default())
            .unwrap();
        let err = db
            .revert(&parent, &v1.id, &EditContext::default().expecting(Some(1)))
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }
}
