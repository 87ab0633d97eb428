//! Ordering repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Read and write `position` values for any ordering scope.
//! - Apply rebalance batches as one all-or-nothing write.
//!
//! # Invariants
//! - Scope listing is deterministic: `position ASC, id ASC`.
//! - A batch either updates every listed item or none of them.
//! - Only the `position` column (and scope columns on relocate) is written.
//! - Relocation keeps owned rows consistent: a moved section's tasks, a moved
//!   project's tasks and every descendant of a moved task follow the new owner.

use crate::db::DbError;
use crate::model::item::PositionUpdate;
use crate::model::scope::{OrderingScope, ScopeKind};
use crate::repo::sql::{
    ensure_schema, parse_uuid, scope_sql, uuid_value, SchemaMismatch, ScopeSql, PROJECT_COLUMNS,
    SECTION_COLUMNS, TASK_COLUMNS,
};
use rusqlite::types::Value;
use rusqlite::{
    params, params_from_iter, Connection, OptionalExtension, Transaction, TransactionBehavior,
};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Result type used by ordering repository operations.
pub type OrderingRepoResult<T> = Result<T, OrderingRepoError>;

/// Errors from ordering repository operations.
#[derive(Debug)]
pub enum OrderingRepoError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Item does not exist inside the addressed scope.
    ItemNotFound { scope: OrderingScope, id: Uuid },
    /// Relocation between scopes of different entity families.
    ScopeKindMismatch { from: ScopeKind, to: ScopeKind },
    /// Target project, section or parent task is missing or belongs elsewhere.
    OwnerNotFound { kind: &'static str, id: Uuid },
    /// Task would end up below one of its own descendants.
    CycleDetected(Uuid),
    /// Connection is not migrated to the expected schema.
    Schema(SchemaMismatch),
    /// Persisted data cannot be converted to a valid read model.
    InvalidData(String),
}

impl Display for OrderingRepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::ItemNotFound { scope, id } => write!(f, "item {id} not found in {scope}"),
            Self::ScopeKindMismatch { from, to } => {
                write!(f, "cannot relocate item from {from} scope to {to} scope")
            }
            Self::OwnerNotFound { kind, id } => {
                write!(f, "{kind} {id} is not part of the target scope")
            }
            Self::CycleDetected(id) => {
                write!(f, "task {id} cannot be nested under its own descendant")
            }
            Self::Schema(err) => write!(f, "ordering {err}"),
            Self::InvalidData(message) => write!(f, "invalid ordering data: {message}"),
        }
    }
}

impl Error for OrderingRepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Schema(err) => Some(err),
            Self::ItemNotFound { .. } => None,
            Self::ScopeKindMismatch { .. } => None,
            Self::OwnerNotFound { .. } => None,
            Self::CycleDetected(_) => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for OrderingRepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for OrderingRepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<SchemaMismatch> for OrderingRepoError {
    fn from(value: SchemaMismatch) -> Self {
        Self::Schema(value)
    }
}

/// Data Store contract the ordering service relies on.
pub trait OrderingRepository {
    /// Lists `(id, position)` for every item in scope, sorted ascending.
    fn list_positions(&self, scope: &OrderingScope) -> OrderingRepoResult<Vec<PositionUpdate>>;
    /// Returns the greatest position in scope, `None` when empty.
    fn max_position(&self, scope: &OrderingScope) -> OrderingRepoResult<Option<f64>>;
    /// Writes one item's position.
    fn set_position(&self, scope: &OrderingScope, id: Uuid, position: f64)
        -> OrderingRepoResult<()>;
    /// Writes many positions atomically.
    fn set_positions(
        &self,
        scope: &OrderingScope,
        updates: &[PositionUpdate],
    ) -> OrderingRepoResult<()>;
    /// Moves one item into another scope of the same kind at `position`.
    ///
    /// Rows owned by the item (a section's tasks, a task's descendants)
    /// follow it. Fails without writing when the target scope cannot own it.
    fn relocate(
        &self,
        id: Uuid,
        from: &OrderingScope,
        to: &OrderingScope,
        position: f64,
    ) -> OrderingRepoResult<()>;
}

/// SQLite-backed ordering repository.
pub struct SqliteOrderingRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteOrderingRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> OrderingRepoResult<Self> {
        ensure_schema::<OrderingRepoError>(
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

impl OrderingRepository for SqliteOrderingRepository<'_> {
    fn list_positions(&self, scope: &OrderingScope) -> OrderingRepoResult<Vec<PositionUpdate>> {
        list_scope_positions(self.conn, scope)
    }

    fn max_position(&self, scope: &OrderingScope) -> OrderingRepoResult<Option<f64>> {
        max_scope_position(self.conn, scope)
    }

    fn set_position(
        &self,
        scope: &OrderingScope,
        id: Uuid,
        position: f64,
    ) -> OrderingRepoResult<()> {
        write_position(self.conn, scope, id, position)
    }

    fn set_positions(
        &self,
        scope: &OrderingScope,
        updates: &[PositionUpdate],
    ) -> OrderingRepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        for update in updates {
            write_position(&tx, scope, update.id, update.position)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn relocate(
        &self,
        id: Uuid,
        from: &OrderingScope,
        to: &OrderingScope,
        position: f64,
    ) -> OrderingRepoResult<()> {
        if from.kind() != to.kind() {
            return Err(OrderingRepoError::ScopeKindMismatch {
                from: from.kind(),
                to: to.kind(),
            });
        }

        let source = scope_sql(from);
        let target = scope_sql(to);
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;

        if let OrderingScope::Tasks {
            project_id,
            section_id,
            parent_task_id,
        } = to
        {
            ensure_task_target(&tx, id, *project_id, *section_id, *parent_task_id)?;
        }

        let mut binds = target.binds.clone();
        binds.push(Value::Real(position));
        binds.push(uuid_value(id));
        binds.extend(source.binds.iter().cloned());
        let changed = tx.execute(
            &format!(
                "UPDATE {}
                 SET {},
                     position = ?,
                     updated_at = (strftime('%s', 'now') * 1000)
                 WHERE id = ?
                   AND {};",
                target.table, target.assign, source.filter
            ),
            params_from_iter(binds),
        )?;
        if changed == 0 {
            return Err(OrderingRepoError::ItemNotFound { scope: *from, id });
        }

        match to {
            OrderingScope::Projects { user_id } => {
                tx.execute(
                    "UPDATE tasks
                     SET user_id = ?1,
                         updated_at = (strftime('%s', 'now') * 1000)
                     WHERE project_id = ?2;",
                    params![user_id.to_string(), id.to_string()],
                )?;
            }
            OrderingScope::Sections { project_id } => {
                let owner = project_owner(&tx, *project_id)?;
                tx.execute(
                    "UPDATE tasks
                     SET project_id = ?1,
                         user_id = ?2,
                         updated_at = (strftime('%s', 'now') * 1000)
                     WHERE section_id = ?3;",
                    params![project_id.to_string(), owner, id.to_string()],
                )?;
            }
            OrderingScope::Tasks {
                project_id,
                section_id,
                ..
            } => {
                // The moved task and all of its descendants share one project and section.
                let owner = project_owner(&tx, *project_id)?;
                tx.execute(
                    "WITH RECURSIVE subtree(id) AS (
                         SELECT ?1
                         UNION ALL
                         SELECT t.id FROM tasks t JOIN subtree s ON t.parent_task_id = s.id
                     )
                     UPDATE tasks
                     SET project_id = ?2,
                         section_id = ?3,
                         user_id = ?4,
                         updated_at = (strftime('%s', 'now') * 1000)
                     WHERE id IN (SELECT id FROM subtree);",
                    params![
                        id.to_string(),
                        project_id.to_string(),
                        section_id.map(|value| value.to_string()),
                        owner,
                    ],
                )?;
            }
        }

        tx.commit()?;
        Ok(())
    }
}

fn project_owner(conn: &Connection, project_id: Uuid) -> OrderingRepoResult<String> {
    conn.query_row(
        "SELECT user_id FROM projects WHERE id = ?1;",
        [project_id.to_string()],
        |row| row.get(0),
    )
    .optional()?
    .ok_or(OrderingRepoError::OwnerNotFound {
        kind: "project",
        id: project_id,
    })
}

/// Checks that a task scope can receive `id`.
///
/// The section must belong to the project, the parent must live in exactly
/// that project and section, and the parent must not descend from `id`.
fn ensure_task_target(
    conn: &Connection,
    id: Uuid,
    project_id: Uuid,
    section_id: Option<Uuid>,
    parent_task_id: Option<Uuid>,
) -> OrderingRepoResult<()> {
    project_owner(conn, project_id)?;

    if let Some(section_id) = section_id {
        let exists: i64 = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sections WHERE id = ?1 AND project_id = ?2);",
            params![section_id.to_string(), project_id.to_string()],
            |row| row.get(0),
        )?;
        if exists == 0 {
            return Err(OrderingRepoError::OwnerNotFound {
                kind: "section",
                id: section_id,
            });
        }
    }

    let Some(parent_task_id) = parent_task_id else {
        return Ok(());
    };

    let cyclic: i64 = conn.query_row(
        "WITH RECURSIVE ancestors(id) AS (
             SELECT ?1
             UNION
             SELECT t.parent_task_id
             FROM tasks t JOIN ancestors a ON t.id = a.id
             WHERE t.parent_task_id IS NOT NULL
         )
         SELECT EXISTS(SELECT 1 FROM ancestors WHERE id = ?2);",
        params![parent_task_id.to_string(), id.to_string()],
        |row| row.get(0),
    )?;
    if cyclic != 0 {
        return Err(OrderingRepoError::CycleDetected(id));
    }

    let parent_in_scope: i64 = conn.query_row(
        "SELECT EXISTS(
             SELECT 1 FROM tasks
             WHERE id = ?1 AND project_id = ?2 AND section_id IS ?3
         );",
        params![
            parent_task_id.to_string(),
            project_id.to_string(),
            section_id.map(|value| value.to_string()),
        ],
        |row| row.get(0),
    )?;
    if parent_in_scope == 0 {
        return Err(OrderingRepoError::OwnerNotFound {
            kind: "task",
            id: parent_task_id,
        });
    }
    Ok(())
}

pub(crate) fn list_scope_positions(
    conn: &Connection,
    scope: &OrderingScope,
) -> OrderingRepoResult<Vec<PositionUpdate>> {
    let ScopeSql {
        table,
        filter,
        binds,
        ..
    } = scope_sql(scope);
    let mut stmt = conn.prepare(&format!(
        "SELECT id, position
         FROM {table}
         WHERE {filter}
         ORDER BY position ASC, id ASC;"
    ))?;
    let mut rows = stmt.query(params_from_iter(binds))?;

    let mut items = Vec::new();
    while let Some(row) = rows.next()? {
        let id_text: String = row.get(0)?;
        let id = parse_uuid(&id_text, "id").map_err(OrderingRepoError::InvalidData)?;
        items.push(PositionUpdate::new(id, row.get(1)?));
    }
    Ok(items)
}

pub(crate) fn max_scope_position(
    conn: &Connection,
    scope: &OrderingScope,
) -> OrderingRepoResult<Option<f64>> {
    let ScopeSql {
        table,
        filter,
        binds,
        ..
    } = scope_sql(scope);
    let max = conn.query_row(
        &format!("SELECT MAX(position) FROM {table} WHERE {filter};"),
        params_from_iter(binds),
        |row| row.get(0),
    )?;
    Ok(max)
}

fn write_position(
    conn: &Connection,
    scope: &OrderingScope,
    id: Uuid,
    position: f64,
) -> OrderingRepoResult<()> {
    let ScopeSql {
        table,
        filter,
        binds: scope_binds,
        ..
    } = scope_sql(scope);
    let mut binds = vec![Value::Real(position), uuid_value(id)];
    binds.extend(scope_binds);

    let changed = conn.execute(
        &format!(
            "UPDATE {table}
             SET position = ?,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?
               AND {filter};"
        ),
        params_from_iter(binds),
    )?;
    if changed == 0 {
        return Err(OrderingRepoError::ItemNotFound { scope: *scope, id });
    }
    Ok(())
}
