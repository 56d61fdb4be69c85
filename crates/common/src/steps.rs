//! Step ordering engine
//!
//! Steps of a test case or fixture carry a dense, zero-based `order`
//! (`position` column). Every operation here runs in one transaction,
//! renumbers siblings, and records a new version of the parent, so a
//! partial renumber is never observable.

use crate::db::{collect_rows, step_from_row, STEP_COLUMNS};
use crate::types::*;
use crate::versions::{check_expected_version, load_parent, write_snapshot};
use crate::{Database, Error, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::{HashSet, VecDeque};
use tracing::debug;

/// Who is writing, and which parent version they last saw.
#[derive(Debug, Clone, Default)]
pub struct EditContext {
    pub actor: Option<String>,
    /// When set, the write is rejected unless the parent is still at
    /// this version.
    pub expected_version: Option<i64>,
}

impl EditContext {
    pub fn by(actor: impl Into<String>) -> Self {
        Self {
            actor: Some(actor.into()),
            expected_version: None,
        }
    }

    pub fn expecting(mut self, version: Option<i64>) -> Self {
        self.expected_version = version;
        self
    }
}

/// True when `orders` is exactly `{0, 1, ..., n-1}`.
pub fn is_dense(orders: impl IntoIterator<Item = i64>) -> bool {
    let mut orders: Vec<i64> = orders.into_iter().collect();
    orders.sort_unstable();
    orders.iter().enumerate().all(|(i, order)| *order == i as i64)
}

pub(crate) fn list_steps_in(conn: &Connection, parent: &StepParent) -> Result<Vec<Step>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM steps WHERE {} = ?1 ORDER BY position ASC",
        STEP_COLUMNS,
        parent.kind.step_column()
    ))?;
    let rows = stmt.query_map(params![parent.id], step_from_row)?;
    collect_rows(rows)
}

fn count_steps(conn: &Connection, parent: &StepParent) -> Result<i64> {
    Ok(conn.query_row(
        &format!(
            "SELECT COUNT(*) FROM steps WHERE {} = ?1",
            parent.kind.step_column()
        ),
        params![parent.id],
        |row| row.get(0),
    )?)
}

fn get_step_in(conn: &Connection, step_id: &str) -> Result<Step> {
    conn.query_row(
        &format!("SELECT {} FROM steps WHERE id = ?1", STEP_COLUMNS),
        params![step_id],
        step_from_row,
    )
    .optional()?
    .ok_or_else(|| Error::not_found("step", step_id))
}

/// Load a step, requiring that it belongs to `parent`.
fn find_step_in(conn: &Connection, parent: &StepParent, step_id: &str) -> Result<Step> {
    conn.query_row(
        &format!(
            "SELECT {} FROM steps WHERE id = ?1 AND {} = ?2",
            STEP_COLUMNS,
            parent.kind.step_column()
        ),
        params![step_id, parent.id],
        step_from_row,
    )
    .optional()?
    .ok_or_else(|| Error::not_found("step", step_id))
}

fn validate_action(action: &str) -> Result<()> {
    if action.trim().is_empty() {
        return Err(Error::validation("step action must not be empty"));
    }
    Ok(())
}

/// True when `from` reaches `target` by following fixture references.
pub(crate) fn fixture_reaches(conn: &Connection, from: &str, target: &str) -> Result<bool> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT fixture_ref FROM steps WHERE fixture_id = ?1 AND fixture_ref IS NOT NULL",
    )?;
    let mut seen = HashSet::new();
    let mut queue = VecDeque::from([from.to_string()]);

    while let Some(current) = queue.pop_front() {
        if current == target {
            return Ok(true);
        }
        if !seen.insert(current.clone()) {
            continue;
        }
        let refs = collect_rows(stmt.query_map(params![current], |row| row.get::<_, String>(0))?)?;
        queue.extend(refs);
    }
    Ok(false)
}

/// A fixture reference must point at a fixture of the same project and
/// must not lead back to the owning fixture.
pub(crate) fn validate_fixture_ref(
    conn: &Connection,
    parent: &StepParent,
    project_id: &str,
    fixture_ref: &str,
) -> Result<()> {
    let ref_project: Option<String> = conn
        .query_row(
            "SELECT project_id FROM fixtures WHERE id = ?1",
            params![fixture_ref],
            |row| row.get(0),
        )
        .optional()?;

    match ref_project {
        None => {
            return Err(Error::validation(format!(
                "referenced fixture {} does not exist",
                fixture_ref
            )))
        }
        Some(p) if p != project_id => {
            return Err(Error::validation(format!(
                "referenced fixture {} belongs to another project",
                fixture_ref
            )))
        }
        Some(_) => {}
    }

    if parent.kind == ParentKind::Fixture
        && (fixture_ref == parent.id || fixture_reaches(conn, fixture_ref, &parent.id)?)
    {
        return Err(Error::validation(format!(
            "fixture {} would reference itself through {}",
            parent.id, fixture_ref
        )));
    }
    Ok(())
}

pub(crate) fn insert_step_row(
    conn: &Connection,
    parent: &StepParent,
    id: &str,
    order: i64,
    step: &NewStep,
    now: i64,
) -> Result<()> {
    let (test_case_id, fixture_id) = match parent.kind {
        ParentKind::TestCase => (Some(parent.id.as_str()), None),
        ParentKind::Fixture => (None, Some(parent.id.as_str())),
    };
    conn.execute(
        "INSERT INTO steps (id, test_case_id, fixture_id, position, action, data, expected, disabled, fixture_ref, playwright_script, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)",
        params![
            id,
            test_case_id,
            fixture_id,
            order,
            step.action.trim(),
            step.data,
            step.expected,
            step.disabled,
            step.fixture_ref,
            step.playwright_script,
            now,
        ],
    )?;
    Ok(())
}

/// Shift siblings and place `step` at `to`. Returns false for a no-op.
fn move_within(conn: &Connection, parent: &StepParent, step: &Step, to: i64) -> Result<bool> {
    let n = count_steps(conn, parent)?;
    if to < 0 || to >= n {
        return Err(Error::validation(format!(
            "position {} is out of range 0..{}",
            to,
            n
        )));
    }

    let from = step.order;
    if from == to {
        return Ok(false);
    }

    let column = parent.kind.step_column();
    if from < to {
        conn.execute(
            &format!(
                "UPDATE steps SET position = position - 1 WHERE {} = ?1 AND position > ?2 AND position <= ?3",
                column
            ),
            params![parent.id, from, to],
        )?;
    } else {
        conn.execute(
            &format!(
                "UPDATE steps SET position = position + 1 WHERE {} = ?1 AND position >= ?2 AND position < ?3",
                column
            ),
            params![parent.id, to, from],
        )?;
    }
    conn.execute(
        "UPDATE steps SET position = ?1, updated_at = ?2 WHERE id = ?3",
        params![to, now_millis(), step.id],
    )?;

    debug!("Moved step {} of {} from {} to {}", step.id, parent, from, to);
    Ok(true)
}

impl Database {
    /// Steps of `parent` in order
    pub fn list_steps(&self, parent: &StepParent) -> Result<Vec<Step>> {
        self.read(|conn| {
            load_parent(conn, parent)?;
            list_steps_in(conn, parent)
        })
    }

    pub fn get_step(&self, step_id: &str) -> Result<Step> {
        self.read(|conn| get_step_in(conn, step_id))
    }

    /// Insert a step. Without a position it is appended; otherwise steps at
    /// or after the (clamped) position shift down by one.
    pub fn insert_step(
        &self,
        parent: &StepParent,
        step: NewStep,
        at_position: Option<i64>,
        ctx: &EditContext,
    ) -> Result<Step> {
        validate_action(&step.action)?;

        self.transaction(|tx| {
            let state = load_parent(tx, parent)?;
            check_expected_version(parent, &state, ctx)?;
            if let Some(fixture_ref) = &step.fixture_ref {
                validate_fixture_ref(tx, parent, &state.project_id, fixture_ref)?;
            }

            let n = count_steps(tx, parent)?;
            let position = at_position.map(|p| p.clamp(0, n)).unwrap_or(n);

            if position < n {
                tx.execute(
                    &format!(
                        "UPDATE steps SET position = position + 1 WHERE {} = ?1 AND position >= ?2",
                        parent.kind.step_column()
                    ),
                    params![parent.id, position],
                )?;
            }

            let id = new_id();
            insert_step_row(tx, parent, &id, position, &step, now_millis())?;
            write_snapshot(tx, parent, ctx, None)?;

            debug!("Inserted step {} into {} at {}", id, parent, position);
            get_step_in(tx, &id)
        })
    }

    /// Append a batch of steps in order, recorded as a single version.
    pub fn insert_steps(
        &self,
        parent: &StepParent,
        steps: Vec<NewStep>,
        ctx: &EditContext,
    ) -> Result<Vec<Step>> {
        for step in &steps {
            validate_action(&step.action)?;
        }

        self.transaction(|tx| {
            let state = load_parent(tx, parent)?;
            check_expected_version(parent, &state, ctx)?;
            if steps.is_empty() {
                return Ok(Vec::new());
            }

            let mut position = count_steps(tx, parent)?;
            let now = now_millis();
            let mut ids = Vec::with_capacity(steps.len());
            for step in &steps {
                if let Some(fixture_ref) = &step.fixture_ref {
                    validate_fixture_ref(tx, parent, &state.project_id, fixture_ref)?;
                }
                let id = new_id();
                insert_step_row(tx, parent, &id, position, step, now)?;
                ids.push(id);
                position += 1;
            }
            write_snapshot(tx, parent, ctx, None)?;

            debug!("Appended {} steps to {}", ids.len(), parent);
            ids.iter().map(|id| get_step_in(tx, id)).collect()
        })
    }

    /// Move a step to `to_position`, renumbering the steps in between.
    pub fn move_step(
        &self,
        parent: &StepParent,
        step_id: &str,
        to_position: i64,
        ctx: &EditContext,
    ) -> Result<Vec<Step>> {
        self.transaction(|tx| {
            let state = load_parent(tx, parent)?;
            check_expected_version(parent, &state, ctx)?;
            let step = find_step_in(tx, parent, step_id)?;

            if move_within(tx, parent, &step, to_position)? {
                write_snapshot(tx, parent, ctx, None)?;
            }
            list_steps_in(tx, parent)
        })
    }

    /// Swap with the previous sibling. No-op for the first step.
    pub fn move_step_up(&self, step_id: &str, ctx: &EditContext) -> Result<Vec<Step>> {
        self.move_adjacent(step_id, -1, ctx)
    }

    /// Swap with the next sibling. No-op for the last step.
    pub fn move_step_down(&self, step_id: &str, ctx: &EditContext) -> Result<Vec<Step>> {
        self.move_adjacent(step_id, 1, ctx)
    }

    fn move_adjacent(&self, step_id: &str, delta: i64, ctx: &EditContext) -> Result<Vec<Step>> {
        self.transaction(|tx| {
            let step = get_step_in(tx, step_id)?;
            let parent = step.parent();
            let state = load_parent(tx, &parent)?;
            check_expected_version(&parent, &state, ctx)?;

            let n = count_steps(tx, &parent)?;
            let to = step.order + delta;
            if (0..n).contains(&to) && move_within(tx, &parent, &step, to)? {
                write_snapshot(tx, &parent, ctx, None)?;
            }
            list_steps_in(tx, &parent)
        })
    }

    /// Delete a step and close the gap it leaves.
    pub fn delete_step(
        &self,
        parent: &StepParent,
        step_id: &str,
        ctx: &EditContext,
    ) -> Result<Vec<Step>> {
        self.transaction(|tx| {
            let state = load_parent(tx, parent)?;
            check_expected_version(parent, &state, ctx)?;
            let step = find_step_in(tx, parent, step_id)?;

            tx.execute("DELETE FROM steps WHERE id = ?1", params![step.id])?;
            tx.execute(
                &format!(
                    "UPDATE steps SET position = position - 1 WHERE {} = ?1 AND position > ?2",
                    parent.kind.step_column()
                ),
                params![parent.id, step.order],
            )?;
            write_snapshot(tx, parent, ctx, None)?;

            debug!("Deleted step {} from {} at {}", step.id, parent, step.order);
            list_steps_in(tx, parent)
        })
    }

    /// Edit step content. The order is never touched here.
    pub fn update_step(&self, step_id: &str, patch: StepPatch, ctx: &EditContext) -> Result<Step> {
        if let Some(action) = &patch.action {
            validate_action(action)?;
        }
        let ctx = EditContext {
            expected_version: patch.expected_version.or(ctx.expected_version),
            ..ctx.clone()
        };

        self.transaction(|tx| {
            let mut step = get_step_in(tx, step_id)?;
            let parent = step.parent();
            let state = load_parent(tx, &parent)?;
            check_expected_version(&parent, &state, &ctx)?;
            if patch.is_empty() {
                return Ok(step);
            }

            if let Some(action) = patch.action {
                step.action = action.trim().to_string();
            }
            if let Some(data) = patch.data {
                step.data = data;
            }
            if let Some(expected) = patch.expected {
                step.expected = expected;
            }
            if let Some(disabled) = patch.disabled {
                step.disabled = disabled;
            }
            if let Some(fixture_ref) = patch.fixture_ref {
                if let Some(id) = &fixture_ref {
                    validate_fixture_ref(tx, &parent, &state.project_id, id)?;
                }
                step.fixture_ref = fixture_ref;
            }
            if let Some(script) = patch.playwright_script {
                step.playwright_script = script;
            }

            tx.execute(
                "UPDATE steps SET action = ?1, data = ?2, expected = ?3, disabled = ?4, fixture_ref = ?5, playwright_script = ?6, updated_at = ?7 WHERE id = ?8",
                params![
                    step.action,
                    step.data,
                    step.expected,
                    step.disabled,
                    step.fixture_ref,
                    step.playwright_script,
                    now_millis(),
                    step.id,
                ],
            )?;
            write_snapshot(tx, &parent, &ctx, None)?;
            get_step_in(tx, step_id)
        })
    }

    /// Copy a step into the slot directly after it.
    pub fn duplicate_step(&self, step_id: &str, ctx: &EditContext) -> Result<Step> {
        let source = self.get_step(step_id)?;
        let copy = NewStep {
            action: source.action.clone(),
            data: source.data.clone(),
            expected: source.expected.clone(),
            disabled: source.disabled,
            fixture_ref: source.fixture_ref.clone(),
            playwright_script: source.playwright_script.clone(),
        };
        self.insert_step(&source.parent(), copy, Some(source.order + 1), ctx)
    }

    /// Apply a full ordering. `step_ids` must be a permutation of the
    /// parent's current steps.
    pub fn reorder_steps(
        &self,
        parent: &StepParent,
        step_ids: &[String],
        ctx: &EditContext,
    ) -> Result<Vec<Step>> {
        self.transaction(|tx| {
            let state = load_parent(tx, parent)?;
            check_expected_version(parent, &state, ctx)?;
            let current = list_steps_in(tx, parent)?;

            let current_ids: HashSet<&str> = current.iter().map(|s| s.id.as_str()).collect();
            let requested: HashSet<&str> = step_ids.iter().map(String::as_str).collect();
            if step_ids.len() != current.len() || requested.len() != step_ids.len() || requested != current_ids {
                return Err(Error::validation(
                    "reorder must list every step of the parent exactly once",
                ));
            }

            let unchanged = current
                .iter()
                .zip(step_ids.iter())
                .all(|(step, id)| &step.id == id);
            if unchanged {
                return Ok(current);
            }

            let now = now_millis();
            for (position, id) in step_ids.iter().enumerate() {
                tx.execute(
                    "UPDATE steps SET position = ?1, updated_at = ?2 WHERE id = ?3",
                    params![position as i64, now, id],
                )?;
            }
            write_snapshot(tx, parent, ctx, None)?;
            list_steps_in(tx, parent)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Database, Project, StepParent) {
        let db = Database::open_memory().unwrap();
        let project = db
            .create_project(NewProject {
                name: "Shop".to_string(),
                ..Default::default()
            })
            .unwrap();
        let fixture = db
            .create_fixture(
                &project.id,
                NewFixture {
                    name: "Login".to_string(),
                    ..Default::default()
                },
                &EditContext::default(),
            )
            .unwrap();
        (db, project, StepParent::fixture(fixture.id))
    }

    fn add(db: &Database, parent: &StepParent, action: &str) -> Step {
        db.insert_step(parent, NewStep::new(action), None, &EditContext::default())
            .unwrap()
    }

    fn actions(db: &Database, parent: &StepParent) -> Vec<String> {
        db.list_steps(parent)
            .unwrap()
            .into_iter()
            .map(|s| s.action)
            .collect()
    }

    fn assert_dense(db: &Database, parent: &StepParent) {
        let steps = db.list_steps(parent).unwrap();
        assert!(is_dense(steps.iter().map(|s| s.order)), "orders not dense: {:?}", steps);
    }

    #[test]
    fn test_is_dense() {
        assert!(is_dense(Vec::<i64>::new()));
        assert!(is_dense([2, 0, 1]));
        assert!(!is_dense([0, 2]));
        assert!(!is_dense([0, 1, 1]));
        assert!(!is_dense([1, 2]));
    }

    #[test]
    fn test_append_and_insert_at_position() {
        let (db, _, parent) = setup();
        add(&db, &parent, "A");
        add(&db, &parent, "C");
        let b = db
            .insert_step(&parent, NewStep::new("B"), Some(1), &EditContext::default())
            .unwrap();
        assert_eq!(b.order, 1);
        assert_eq!(actions(&db, &parent), vec!["A", "B", "C"]);
        assert_dense(&db, &parent);
    }

    #[test]
    fn test_insert_position_is_clamped() {
        let (db, _, parent) = setup();
        add(&db, &parent, "A");
        let end = db
            .insert_step(&parent, NewStep::new("Z"), Some(99), &EditContext::default())
            .unwrap();
        assert_eq!(end.order, 1);
        let start = db
            .insert_step(&parent, NewStep::new("0"), Some(-5), &EditContext::default())
            .unwrap();
        assert_eq!(start.order, 0);
        assert_eq!(actions(&db, &parent), vec!["0", "A", "Z"]);
        assert_dense(&db, &parent);
    }

    #[test]
    fn test_move_last_to_front() {
        let (db, _, parent) = setup();
        add(&db, &parent, "A");
        add(&db, &parent, "B");
        let c = add(&db, &parent, "C");

        let steps = db.move_step(&parent, &c.id, 0, &EditContext::default()).unwrap();
        let got: Vec<(&str, i64)> = steps.iter().map(|s| (s.action.as_str(), s.order)).collect();
        assert_eq!(got, vec![("C", 0), ("A", 1), ("B", 2)]);
    }

    #[test]
    fn test_move_round_trip_restores_order() {
        let (db, _, parent) = setup();
        let ids: Vec<String> = ["A", "B", "C", "D", "E"]
            .iter()
            .map(|a| add(&db, &parent, a).id)
            .collect();
        let before = actions(&db, &parent);

        for (i, id) in ids.iter().enumerate() {
            for k in 0..ids.len() as i64 {
                db.move_step(&parent, id, k, &EditContext::default()).unwrap();
                assert_dense(&db, &parent);
                db.move_step(&parent, id, i as i64, &EditContext::default()).unwrap();
                assert_eq!(actions(&db, &parent), before);
            }
        }
    }

    #[test]
    fn test_move_out_of_range_leaves_state_untouched() {
        let (db, _, parent) = setup();
        let a = add(&db, &parent, "A");
        add(&db, &parent, "B");
        let version_before = db.get_fixture(&parent.id).unwrap().current_version;

        for to in [-1, 2, 10] {
            let err = db.move_step(&parent, &a.id, to, &EditContext::default()).unwrap_err();
            assert!(matches!(err, Error::Validation(_)));
        }
        assert_eq!(actions(&db, &parent), vec!["A", "B"]);
        assert_eq!(db.get_fixture(&parent.id).unwrap().current_version, version_before);
    }

    #[test]
    fn test_move_step_of_other_parent_is_not_found() {
        let (db, project, parent) = setup();
        let other = db
            .create_fixture(
                &project.id,
                NewFixture {
                    name: "Other".to_string(),
                    ..Default::default()
                },
                &EditContext::default(),
            )
            .unwrap();
        let foreign = add(&db, &StepParent::fixture(other.id), "X");
        add(&db, &parent, "A");

        let err = db
            .move_step(&parent, &foreign.id, 0, &EditContext::default())
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn test_delete_closes_gap() {
        let (db, _, parent) = setup();
        add(&db, &parent, "A");
        let b = add(&db, &parent, "B");
        let c = add(&db, &parent, "C");

        let steps = db.delete_step(&parent, &b.id, &EditContext::default()).unwrap();
        let got: Vec<(&str, i64)> = steps.iter().map(|s| (s.action.as_str(), s.order)).collect();
        assert_eq!(got, vec![("A", 0), ("C", 1)]);
        assert_eq!(db.get_step(&c.id).unwrap().order, 1);
    }

    #[test]
    fn test_move_up_and_down_are_noops_at_boundary() {
        let (db, _, parent) = setup();
        let a = add(&db, &parent, "A");
        let b = add(&db, &parent, "B");
        let version = db.get_fixture(&parent.id).unwrap().current_version;

        db.move_step_up(&a.id, &EditContext::default()).unwrap();
        db.move_step_down(&b.id, &EditContext::default()).unwrap();
        assert_eq!(actions(&db, &parent), vec!["A", "B"]);
        assert_eq!(db.get_fixture(&parent.id).unwrap().current_version, version);

        db.move_step_down(&a.id, &EditContext::default()).unwrap();
        assert_eq!(actions(&db, &parent), vec!["B", "A"]);
        db.move_step_up(&a.id, &EditContext::default()).unwrap();
        assert_eq!(actions(&db, &parent), vec!["A", "B"]);
    }

    #[test]
    fn test_density_after_mixed_operations() {
        let (db, _, parent) = setup();
        let mut ids = Vec::new();
        for i in 0..8 {
            let at = if i % 3 == 0 { Some(0) } else { None };
            let step = db
                .insert_step(&parent, NewStep::new(format!("s{}", i)), at, &EditContext::default())
                .unwrap();
            ids.push(step.id);
            assert_dense(&db, &parent);
        }
        for (i, id) in ids.iter().enumerate().step_by(2) {
            let n = db.list_steps(&parent).unwrap().len() as i64;
            db.move_step(&parent, id, (i as i64 * 3) % n, &EditContext::default())
                .unwrap();
            assert_dense(&db, &parent);
        }
        for id in ids.iter().skip(1).step_by(3) {
            db.delete_step(&parent, id, &EditContext::default()).unwrap();
            assert_dense(&db, &parent);
        }
        let dup = db.duplicate_step(&ids[0], &EditContext::default()).unwrap();
        assert_eq!(dup.order, db.get_step(&ids[0]).unwrap().order + 1);
        assert_dense(&db, &parent);
    }

    #[test]
    fn test_reorder_requires_permutation() {
        let (db, _, parent) = setup();
        let a = add(&db, &parent, "A");
        let b = add(&db, &parent, "B");
        let c = add(&db, &parent, "C");

        let err = db
            .reorder_steps(&parent, &[a.id.clone(), b.id.clone()], &EditContext::default())
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        let err = db
            .reorder_steps(
                &parent,
                &[a.id.clone(), a.id.clone(), b.id.clone()],
                &EditContext::default(),
            )
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        db.reorder_steps(&parent, &[c.id, a.id, b.id], &EditContext::default())
            .unwrap();
        assert_eq!(actions(&db, &parent), vec!["C", "A", "B"]);
        assert_dense(&db, &parent);
    }

    #[test]
    fn test_stale_expected_version_is_rejected() {
        let (db, _, parent) = setup();
        let a = add(&db, &parent, "A");
        add(&db, &parent, "B");
        let seen = db.get_fixture(&parent.id).unwrap().current_version;

        db.move_step(&parent, &a.id, 1, &EditContext::default().expecting(Some(seen)))
            .unwrap();
        let err = db
            .move_step(&parent, &a.id, 0, &EditContext::default().expecting(Some(seen)))
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
        assert_eq!(actions(&db, &parent), vec!["B", "A"]);
    }

    #[test]
    fn test_update_step_keeps_order() {
        let (db, _, parent) = setup();
        add(&db, &parent, "A");
        let b = add(&db, &parent, "B");
        let patch = StepPatch {
            action: Some("Click submit".to_string()),
            data: Some(Some("#submit".to_string())),
            disabled: Some(true),
            ..Default::default()
        };
        let updated = db.update_step(&b.id, patch, &EditContext::default()).unwrap();
        assert_eq!(updated.order, 1);
        assert_eq!(updated.action, "Click submit");
        assert_eq!(updated.data.as_deref(), Some("#submit"));
        assert!(updated.disabled);

        let err = db
            .update_step(
                &b.id,
                StepPatch {
                    action: Some("  ".to_string()),
                    ..Default::default()
                },
                &EditContext::default(),
            )
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_fixture_reference_cycles_are_rejected() {
        let (db, project, login) = setup();
        let checkout = db
            .create_fixture(
                &project.id,
                NewFixture {
                    name: "Checkout".to_string(),
                    ..Default::default()
                },
                &EditContext::default(),
            )
            .unwrap();
        let checkout = StepParent::fixture(checkout.id);

        let mut self_ref = NewStep::new("recurse");
        self_ref.fixture_ref = Some(login.id.clone());
        let err = db
            .insert_step(&login, self_ref, None, &EditContext::default())
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let mut uses_login = NewStep::new("log in first");
        uses_login.fixture_ref = Some(login.id.clone());
        db.insert_step(&checkout, uses_login, None, &EditContext::default())
            .unwrap();

        let mut back = NewStep::new("then checkout");
        back.fixture_ref = Some(checkout.id.clone());
        let err = db
            .insert_step(&login, back, None, &EditContext::default())
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(db.list_steps(&login).unwrap().is_empty());
    }

    #[test]
    fn test_fixture_reference_must_exist() {
        let (db, _, parent) = setup();
        let mut step = NewStep::new("use missing");
        step.fixture_ref = Some("nope".to_string());
        let err = db
            .insert_step(&parent, step, None, &EditContext::default())
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_insert_steps_writes_single_version() {
        let (db, _, parent) = setup();
        let before = db.get_fixture(&parent.id).unwrap().current_version;
        let steps = db
            .insert_steps(
                &parent,
                vec![NewStep::new("one"), NewStep::new("two"), NewStep::new("three")],
                &EditContext::default(),
            )
            .unwrap();
        assert_eq!(steps.iter().map(|s| s.order).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(db.get_fixture(&parent.id).unwrap().current_version, before + 1);
    }

    #[test]
    fn test_unknown_parent_is_not_found() {
        let (db, _, _) = setup();
        let missing = StepParent::test_case("missing");
        let err = db
            .insert_step(&missing, NewStep::new("A"), None, &EditContext::default())
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
        assert!(matches!(db.list_steps(&missing), Err(Error::NotFound { .. })));
    }
}
