//! Shared SQLite helpers for ordering-aware repositories.
//!
//! # Responsibility
//! - Translate `OrderingScope` into table, filter and bind values.
//! - Verify migrated schema before repositories touch data.
//! - Parse persisted scalar columns with explicit error messages.

use crate::db::migrations::latest_version;
use crate::model::scope::OrderingScope;
use rusqlite::types::Value;
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// SQL fragment set addressing all rows of one ordering scope.
///
/// `filter` and `assign` use anonymous `?` placeholders; bind values must be
/// appended in placeholder order.
#[derive(Debug, Clone)]
pub(crate) struct ScopeSql {
    pub table: &'static str,
    pub filter: &'static str,
    pub assign: &'static str,
    pub binds: Vec<Value>,
}

pub(crate) fn scope_sql(scope: &OrderingScope) -> ScopeSql {
    match scope {
        OrderingScope::Projects { user_id } => ScopeSql {
            table: "projects",
            filter: "user_id = ?",
            assign: "user_id = ?",
            binds: vec![uuid_value(*user_id)],
        },
        OrderingScope::Sections { project_id } => ScopeSql {
            table: "sections",
            filter: "project_id = ?",
            assign: "project_id = ?",
            binds: vec![uuid_value(*project_id)],
        },
        OrderingScope::Tasks {
            project_id,
            section_id,
            parent_task_id,
        } => ScopeSql {
            table: "tasks",
            filter: "project_id = ? AND section_id IS ? AND parent_task_id IS ?",
            assign: "project_id = ?, section_id = ?, parent_task_id = ?",
            binds: vec![
                uuid_value(*project_id),
                optional_uuid_value(*section_id),
                optional_uuid_value(*parent_task_id),
            ],
        },
    }
}

pub(crate) const PROJECT_COLUMNS: &[&str] = &[
    "id",
    "user_id",
    "name",
    "color",
    "is_inbox",
    "is_archived",
    "position",
    "created_at",
    "updated_at",
];

pub(crate) const SECTION_COLUMNS: &[&str] = &[
    "id",
    "project_id",
    "name",
    "position",
    "is_collapsed",
    "created_at",
    "updated_at",
];

pub(crate) const TASK_COLUMNS: &[&str] = &[
    "id",
    "user_id",
    "project_id",
    "section_id",
    "parent_task_id",
    "title",
    "description",
    "priority",
    "is_completed",
    "completed_at",
    "due_date",
    "position",
    "created_at",
    "updated_at",
];

pub(crate) fn uuid_value(id: Uuid) -> Value {
    Value::Text(id.to_string())
}

pub(crate) fn optional_uuid_value(id: Option<Uuid>) -> Value {
    id.map_or(Value::Null, uuid_value)
}

/// Schema shape mismatch detected before repository construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaMismatch {
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Required column is missing from expected table.
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
}

impl Display for SchemaMismatch {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "repository requires column `{column}` in table `{table}`"
            ),
        }
    }
}

impl Error for SchemaMismatch {}

/// Checks migration version and required table columns.
pub(crate) fn ensure_schema<E>(
    conn: &Connection,
    required: &[(&'static str, &[&'static str])],
) -> Result<(), E>
where
    E: From<rusqlite::Error> + From<SchemaMismatch>,
{
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(SchemaMismatch::UninitializedConnection {
            expected_version,
            actual_version,
        }
        .into());
    }

    for &(table, columns) in required {
        if !table_exists(conn, table)? {
            return Err(SchemaMismatch::MissingRequiredTable(table).into());
        }
        let present = table_columns(conn, table)?;
        for &column in columns {
            if !present.iter().any(|value| value == column) {
                return Err(SchemaMismatch::MissingRequiredColumn { table, column }.into());
            }
        }
    }
    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> rusqlite::Result<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_columns(conn: &Connection, table: &str) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    let mut columns = Vec::new();
    while let Some(row) = rows.next()? {
        columns.push(row.get(1)?);
    }
    Ok(columns)
}

pub(crate) fn parse_uuid(value: &str, column: &'static str) -> Result<Uuid, String> {
    Uuid::parse_str(value).map_err(|_| format!("invalid uuid `{value}` in {column}"))
}

pub(crate) fn parse_optional_uuid(
    value: Option<String>,
    column: &'static str,
) -> Result<Option<Uuid>, String> {
    value.map(|value| parse_uuid(&value, column)).transpose()
}

pub(crate) fn parse_bool(value: i64, column: &'static str) -> Result<bool, String> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(format!("invalid boolean value `{other}` in {column}")),
    }
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
