//! Task repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide create/read/update/delete APIs over `tasks`.
//! - Append new tasks at the end of their project/section/parent scope.
//!
//! # Invariants
//! - Completion toggles and text edits never write `position`.
//! - Sub-tasks share their parent's project and section.
//! - Deleting a task deletes its sub-tasks.

use crate::model::item::{validate_name, NewTask, Priority, Task};
use crate::model::scope::{OrderingScope, ProjectId, TaskId};
use crate::position::allocator::position_at_end;
use crate::repo::error::{ItemRepoError, ItemRepoResult};
use crate::repo::ordering_repo::max_scope_position;
use crate::repo::sql::{
    bool_to_int, ensure_schema, optional_uuid_value, parse_bool, parse_optional_uuid, parse_uuid,
    scope_sql, ScopeSql, PROJECT_COLUMNS, SECTION_COLUMNS, TASK_COLUMNS,
};
use log::info;
use rusqlite::{
    params, params_from_iter, Connection, OptionalExtension, Row, Transaction,
    TransactionBehavior,
};
use uuid::Uuid;

const TASK_SELECT_SQL: &str = "SELECT
    id,
    user_id,
    project_id,
    section_id,
    parent_task_id,
    title,
    description,
    priority,
    is_completed,
    completed_at,
    due_date,
    position,
    created_at,
    updated_at
FROM tasks";

/// Repository interface for task operations.
pub trait TaskRepository {
    /// Creates one task appended to the end of `input.scope()`.
    fn create_task(&self, input: &NewTask) -> ItemRepoResult<Task>;
    fn get_task(&self, id: TaskId) -> ItemRepoResult<Option<Task>>;
    /// Lists every task in one scope in position order.
    fn list_tasks(&self, scope: &OrderingScope, include_completed: bool)
        -> ItemRepoResult<Vec<Task>>;
    /// Lists every task of one project across sections, top-level first.
    fn list_project_tasks(&self, project_id: ProjectId) -> ItemRepoResult<Vec<Task>>;
    fn update_task_text(&self, id: TaskId, title: &str, description: &str)
        -> ItemRepoResult<()>;
    fn set_task_completed(&self, id: TaskId, is_completed: bool) -> ItemRepoResult<()>;
    fn delete_task(&self, id: TaskId) -> ItemRepoResult<()>;
}

/// SQLite-backed task repository.
pub struct SqliteTaskRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTaskRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> ItemRepoResult<Self> {
        ensure_schema::<ItemRepoError>(
            conn,
            &[
                ("projects", PROJECT_COLUMNS),
                ("sections", SECTION_COLUMNS),
                ("tasks", TASK_COLUMNS),
            ],
        )?;
        Ok(Self { conn })
    }
}

impl TaskRepository for SqliteTaskRepository<'_> {
    fn create_task(&self, input: &NewTask) -> ItemRepoResult<Task> {
        input.validate()?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let user_id = owning_user(&tx, input.project_id)?;
        let mut scope = input.scope();
        if let Some(section_id) = input.section_id {
            ensure_section_in_project(&tx, section_id, input.project_id)?;
        }
        if let Some(parent_task_id) = input.parent_task_id {
            let parent = load_task(&tx, parent_task_id)?.ok_or(ItemRepoError::OwnerNotFound {
                kind: "parent task",
                id: parent_task_id,
            })?;
            // Sub-tasks live in the parent's section.
            scope = OrderingScope::sub_tasks(parent.project_id, parent.section_id, parent.id);
        }

        let OrderingScope::Tasks {
            project_id,
            section_id,
            parent_task_id,
        } = scope
        else {
            return Err(ItemRepoError::InvalidData(format!(
                "task input resolved to non-task scope {scope}"
            )));
        };

        let position = position_at_end(max_scope_position(&tx, &scope)?);
        let id = Uuid::new_v4();
        tx.execute(
            "INSERT INTO tasks (
                id,
                user_id,
                project_id,
                section_id,
                parent_task_id,
                title,
                description,
                priority,
                due_date,
                position
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10);",
            params![
                id.to_string(),
                user_id.to_string(),
                project_id.to_string(),
                optional_uuid_value(section_id),
                optional_uuid_value(parent_task_id),
                input.title.trim(),
                input.description.as_str(),
                input.priority.as_level(),
                input.due_date.as_deref(),
                position,
            ],
        )?;
        let task = load_task(&tx, id)?.ok_or(ItemRepoError::NotFound(id))?;
        tx.commit()?;

        info!("event=task_create module=repo status=ok position={position}");
        Ok(task)
    }

    fn get_task(&self, id: TaskId) -> ItemRepoResult<Option<Task>> {
        load_task(self.conn, id)
    }

    fn list_tasks(
        &self,
        scope: &OrderingScope,
        include_completed: bool,
    ) -> ItemRepoResult<Vec<Task>> {
        let ScopeSql {
            table,
            filter,
            mut binds,
            ..
        } = scope_sql(scope);
        if table != "tasks" {
            return Err(ItemRepoError::InvalidData(format!(
                "cannot list tasks in {scope}"
            )));
        }
        binds.push(rusqlite::types::Value::Integer(bool_to_int(include_completed)));

        let mut stmt = self.conn.prepare(&format!(
            "{TASK_SELECT_SQL}
             WHERE {filter}
               AND (? = 1 OR is_completed = 0)
             ORDER BY position ASC, id ASC;"
        ))?;
        let mut rows = stmt.query(params_from_iter(binds))?;
        collect_tasks(&mut rows)
    }

    fn list_project_tasks(&self, project_id: ProjectId) -> ItemRepoResult<Vec<Task>> {
        let mut stmt = self.conn.prepare(&format!(
            "{TASK_SELECT_SQL}
             WHERE project_id = ?1
             ORDER BY parent_task_id IS NOT NULL, section_id, position ASC, id ASC;"
        ))?;
        let mut rows = stmt.query([project_id.to_string()])?;
        collect_tasks(&mut rows)
    }

    fn update_task_text(
        &self,
        id: TaskId,
        title: &str,
        description: &str,
    ) -> ItemRepoResult<()> {
        validate_name(title)?;
        let changed = self.conn.execute(
            "UPDATE tasks
             SET title = ?2,
                 description = ?3,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![id.to_string(), title.trim(), description],
        )?;
        ensure_changed(changed, id)
    }

    fn set_task_completed(&self, id: TaskId, is_completed: bool) -> ItemRepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE tasks
             SET is_completed = ?2,
                 completed_at = CASE WHEN ?2 = 1 THEN (strftime('%s', 'now') * 1000) END,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![id.to_string(), bool_to_int(is_completed)],
        )?;
        ensure_changed(changed, id)
    }

    fn delete_task(&self, id: TaskId) -> ItemRepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM tasks WHERE id = ?1;", [id.to_string()])?;
        ensure_changed(changed, id)
    }
}

fn owning_user(conn: &Connection, project_id: ProjectId) -> ItemRepoResult<Uuid> {
    let user_id: Option<String> = conn
        .query_row(
            "SELECT user_id FROM projects WHERE id = ?1;",
            [project_id.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    let user_id = user_id.ok_or(ItemRepoError::OwnerNotFound {
        kind: "project",
        id: project_id,
    })?;
    parse_uuid(&user_id, "projects.user_id").map_err(ItemRepoError::InvalidData)
}

fn ensure_section_in_project(
    conn: &Connection,
    section_id: Uuid,
    project_id: ProjectId,
) -> ItemRepoResult<()> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sections WHERE id = ?1 AND project_id = ?2);",
        params![section_id.to_string(), project_id.to_string()],
        |row| row.get(0),
    )?;
    if exists == 0 {
        return Err(ItemRepoError::OwnerNotFound {
            kind: "section",
            id: section_id,
        });
    }
    Ok(())
}

fn load_task(conn: &Connection, id: TaskId) -> ItemRepoResult<Option<Task>> {
    let mut stmt = conn.prepare(&format!("{TASK_SELECT_SQL} WHERE id = ?1;"))?;
    let mut rows = stmt.query([id.to_string()])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_task_row(row)?));
    }
    Ok(None)
}

fn collect_tasks(rows: &mut rusqlite::Rows<'_>) -> ItemRepoResult<Vec<Task>> {
    let mut tasks = Vec::new();
    while let Some(row) = rows.next()? {
        tasks.push(parse_task_row(row)?);
    }
    Ok(tasks)
}

fn ensure_changed(changed: usize, id: Uuid) -> ItemRepoResult<()> {
    if changed == 0 {
        return Err(ItemRepoError::NotFound(id));
    }
    Ok(())
}

fn parse_task_row(row: &Row<'_>) -> ItemRepoResult<Task> {
    let id_text: String = row.get("id")?;
    let user_id_text: String = row.get("user_id")?;
    let project_id_text: String = row.get("project_id")?;
    let priority_level: u8 = row.get("priority")?;
    let priority = Priority::from_level(priority_level).ok_or_else(|| {
        ItemRepoError::InvalidData(format!(
            "invalid priority `{priority_level}` in tasks.priority"
        ))
    })?;

    Ok(Task {
        id: parse_uuid(&id_text, "tasks.id").map_err(ItemRepoError::InvalidData)?,
        user_id: parse_uuid(&user_id_text, "tasks.user_id").map_err(ItemRepoError::InvalidData)?,
        project_id: parse_uuid(&project_id_text, "tasks.project_id")
            .map_err(ItemRepoError::InvalidData)?,
        section_id: parse_optional_uuid(row.get("section_id")?, "tasks.section_id")
            .map_err(ItemRepoError::InvalidData)?,
        parent_task_id: parse_optional_uuid(row.get("parent_task_id")?, "tasks.parent_task_id")
            .map_err(ItemRepoError::InvalidData)?,
        title: row.get("title")?,
        description: row.get("description")?,
        priority,
        is_completed: parse_bool(row.get("is_completed")?, "tasks.is_completed")
            .map_err(ItemRepoError::InvalidData)?,
        completed_at: row.get("completed_at")?,
        due_date: row.get("due_date")?,
        position: row.get("position")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
