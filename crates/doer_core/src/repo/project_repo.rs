//! Project and section repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide create/read/update APIs for projects and their sections.
//! - Append new rows at the end of their ordering scope.
//!
//! # Invariants
//! - Create paths validate input before any SQL mutation.
//! - Append reads `MAX(position)` and inserts inside one immediate
//!   transaction, so local writers never reuse a position.
//! - Listing order is `position ASC, id ASC`.
//! - At most one inbox project exists per user.

use crate::model::item::{
    validate_name, NewProject, NewSection, Project, Section, DEFAULT_PROJECT_COLOR,
    INBOX_PROJECT_NAME,
};
use crate::model::scope::{OrderingScope, ProjectId, SectionId, UserId};
use crate::position::allocator::position_at_end;
use crate::repo::error::{ItemRepoError, ItemRepoResult};
use crate::repo::ordering_repo::max_scope_position;
use crate::repo::sql::{
    bool_to_int, ensure_schema, parse_bool, parse_uuid, PROJECT_COLUMNS, SECTION_COLUMNS,
};
use log::info;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use uuid::Uuid;

const PROJECT_SELECT_SQL: &str = "SELECT
    id,
    user_id,
    name,
    color,
    is_inbox,
    is_archived,
    position,
    created_at,
    updated_at
FROM projects";

const SECTION_SELECT_SQL: &str = "SELECT
    id,
    project_id,
    name,
    position,
    is_collapsed,
    created_at,
    updated_at
FROM sections";

/// Repository interface for project and section operations.
pub trait ProjectRepository {
    /// Creates one project appended to the owner's project list.
    fn create_project(&self, input: &NewProject) -> ItemRepoResult<Project>;
    /// Returns the user's inbox project, creating it on first use.
    fn get_or_create_inbox(&self, user_id: UserId) -> ItemRepoResult<Project>;
    fn get_project(&self, id: ProjectId) -> ItemRepoResult<Option<Project>>;
    /// Lists the user's projects in position order.
    fn list_projects(&self, user_id: UserId, include_archived: bool)
        -> ItemRepoResult<Vec<Project>>;
    fn rename_project(&self, id: ProjectId, name: &str) -> ItemRepoResult<()>;
    fn set_project_archived(&self, id: ProjectId, is_archived: bool) -> ItemRepoResult<()>;
    /// Deletes one project with its sections and tasks.
    fn delete_project(&self, id: ProjectId) -> ItemRepoResult<()>;
    /// Creates one section appended to the project's section list.
    fn create_section(&self, input: &NewSection) -> ItemRepoResult<Section>;
    fn get_section(&self, id: SectionId) -> ItemRepoResult<Option<Section>>;
    fn list_sections(&self, project_id: ProjectId) -> ItemRepoResult<Vec<Section>>;
    fn set_section_collapsed(&self, id: SectionId, is_collapsed: bool) -> ItemRepoResult<()>;
    /// Deletes one section with its tasks.
    fn delete_section(&self, id: SectionId) -> ItemRepoResult<()>;
}

/// SQLite-backed project/section repository.
pub struct SqliteProjectRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteProjectRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> ItemRepoResult<Self> {
        ensure_schema::<ItemRepoError>(
            conn,
            &[("projects", PROJECT_COLUMNS), ("sections", SECTION_COLUMNS)],
        )?;
        Ok(Self { conn })
    }
}

impl ProjectRepository for SqliteProjectRepository<'_> {
    fn create_project(&self, input: &NewProject) -> ItemRepoResult<Project> {
        input.validate()?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let id = insert_project(
            &tx,
            input.user_id,
            input.name.trim(),
            input.color.as_deref().unwrap_or(DEFAULT_PROJECT_COLOR),
            false,
        )?;
        let project = load_required_project(&tx, id)?;
        tx.commit()?;

        info!(
            "event=project_create module=repo status=ok position={}",
            project.position
        );
        Ok(project)
    }

    fn get_or_create_inbox(&self, user_id: UserId) -> ItemRepoResult<Project> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let existing: Option<String> = tx
            .query_row(
                "SELECT id FROM projects WHERE user_id = ?1 AND is_inbox = 1;",
                [user_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;

        let id = match existing {
            Some(value) => parse_uuid(&value, "projects.id").map_err(ItemRepoError::InvalidData)?,
            None => insert_project(
                &tx,
                user_id,
                INBOX_PROJECT_NAME,
                DEFAULT_PROJECT_COLOR,
                true,
            )?,
        };
        let project = load_required_project(&tx, id)?;
        tx.commit()?;
        Ok(project)
    }

    fn get_project(&self, id: ProjectId) -> ItemRepoResult<Option<Project>> {
        load_project(self.conn, id)
    }

    fn list_projects(
        &self,
        user_id: UserId,
        include_archived: bool,
    ) -> ItemRepoResult<Vec<Project>> {
        let mut stmt = self.conn.prepare(&format!(
            "{PROJECT_SELECT_SQL}
             WHERE user_id = ?1
               AND (?2 = 1 OR is_archived = 0)
             ORDER BY position ASC, id ASC;"
        ))?;
        let mut rows = stmt.query(params![user_id.to_string(), bool_to_int(include_archived)])?;

        let mut projects = Vec::new();
        while let Some(row) = rows.next()? {
            projects.push(parse_project_row(row)?);
        }
        Ok(projects)
    }

    fn rename_project(&self, id: ProjectId, name: &str) -> ItemRepoResult<()> {
        validate_name(name)?;
        let changed = self.conn.execute(
            "UPDATE projects
             SET name = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![id.to_string(), name.trim()],
        )?;
        ensure_changed(changed, id)
    }

    fn set_project_archived(&self, id: ProjectId, is_archived: bool) -> ItemRepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE projects
             SET is_archived = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![id.to_string(), bool_to_int(is_archived)],
        )?;
        ensure_changed(changed, id)
    }

    fn delete_project(&self, id: ProjectId) -> ItemRepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM projects WHERE id = ?1;", [id.to_string()])?;
        ensure_changed(changed, id)
    }

    fn create_section(&self, input: &NewSection) -> ItemRepoResult<Section> {
        input.validate()?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if load_project(&tx, input.project_id)?.is_none() {
            return Err(ItemRepoError::OwnerNotFound {
                kind: "project",
                id: input.project_id,
            });
        }

        let scope = OrderingScope::Sections {
            project_id: input.project_id,
        };
        let position = position_at_end(max_scope_position(&tx, &scope)?);
        let id = Uuid::new_v4();
        tx.execute(
            "INSERT INTO sections (id, project_id, name, position)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                id.to_string(),
                input.project_id.to_string(),
                input.name.trim(),
                position,
            ],
        )?;
        let section = load_section(&tx, id)?.ok_or(ItemRepoError::NotFound(id))?;
        tx.commit()?;

        info!("event=section_create module=repo status=ok position={position}");
        Ok(section)
    }

    fn get_section(&self, id: SectionId) -> ItemRepoResult<Option<Section>> {
        load_section(self.conn, id)
    }

    fn list_sections(&self, project_id: ProjectId) -> ItemRepoResult<Vec<Section>> {
        let mut stmt = self.conn.prepare(&format!(
            "{SECTION_SELECT_SQL}
             WHERE project_id = ?1
             ORDER BY position ASC, id ASC;"
        ))?;
        let mut rows = stmt.query([project_id.to_string()])?;

        let mut sections = Vec::new();
        while let Some(row) = rows.next()? {
            sections.push(parse_section_row(row)?);
        }
        Ok(sections)
    }

    fn set_section_collapsed(&self, id: SectionId, is_collapsed: bool) -> ItemRepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE sections
             SET is_collapsed = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![id.to_string(), bool_to_int(is_collapsed)],
        )?;
        ensure_changed(changed, id)
    }

    fn delete_section(&self, id: SectionId) -> ItemRepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM sections WHERE id = ?1;", [id.to_string()])?;
        ensure_changed(changed, id)
    }
}

fn insert_project(
    conn: &Connection,
    user_id: UserId,
    name: &str,
    color: &str,
    is_inbox: bool,
) -> ItemRepoResult<ProjectId> {
    let scope = OrderingScope::Projects { user_id };
    let position = position_at_end(max_scope_position(conn, &scope)?);
    let id = Uuid::new_v4();
    conn.execute(
        "INSERT INTO projects (id, user_id, name, color, is_inbox, position)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
        params![
            id.to_string(),
            user_id.to_string(),
            name,
            color,
            bool_to_int(is_inbox),
            position,
        ],
    )?;
    Ok(id)
}

fn load_project(conn: &Connection, id: ProjectId) -> ItemRepoResult<Option<Project>> {
    let mut stmt = conn.prepare(&format!("{PROJECT_SELECT_SQL} WHERE id = ?1;"))?;
    let mut rows = stmt.query([id.to_string()])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_project_row(row)?));
    }
    Ok(None)
}

fn load_required_project(conn: &Connection, id: ProjectId) -> ItemRepoResult<Project> {
    load_project(conn, id)?.ok_or(ItemRepoError::NotFound(id))
}

fn load_section(conn: &Connection, id: SectionId) -> ItemRepoResult<Option<Section>> {
    let mut stmt = conn.prepare(&format!("{SECTION_SELECT_SQL} WHERE id = ?1;"))?;
    let mut rows = stmt.query([id.to_string()])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_section_row(row)?));
    }
    Ok(None)
}

fn ensure_changed(changed: usize, id: Uuid) -> ItemRepoResult<()> {
    if changed == 0 {
        return Err(ItemRepoError::NotFound(id));
    }
    Ok(())
}

fn parse_project_row(row: &Row<'_>) -> ItemRepoResult<Project> {
    let id_text: String = row.get("id")?;
    let user_id_text: String = row.get("user_id")?;
    Ok(Project {
        id: parse_uuid(&id_text, "projects.id").map_err(ItemRepoError::InvalidData)?,
        user_id: parse_uuid(&user_id_text, "projects.user_id")
            .map_err(ItemRepoError::InvalidData)?,
        name: row.get("name")?,
        color: row.get("color")?,
        is_inbox: parse_bool(row.get("is_inbox")?, "projects.is_inbox")
            .map_err(ItemRepoError::InvalidData)?,
        is_archived: parse_bool(row.get("is_archived")?, "projects.is_archived")
            .map_err(ItemRepoError::InvalidData)?,
        position: row.get("position")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_section_row(row: &Row<'_>) -> ItemRepoResult<Section> {
    let id_text: String = row.get("id")?;
    let project_id_text: String = row.get("project_id")?;
    Ok(Section {
        id: parse_uuid(&id_text, "sections.id").map_err(ItemRepoError::InvalidData)?,
        project_id: parse_uuid(&project_id_text, "sections.project_id")
            .map_err(ItemRepoError::InvalidData)?,
        name: row.get("name")?,
        position: row.get("position")?,
        is_collapsed: parse_bool(row.get("is_collapsed")?, "sections.is_collapsed")
            .map_err(ItemRepoError::InvalidData)?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
