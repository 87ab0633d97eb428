//! Ordering scope model.
//!
//! # Responsibility
//! - Name the partition under which item positions are compared.
//!
//! # Invariants
//! - Two items are only ordered relative to each other when they share an
//!   `OrderingScope` value.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type UserId = Uuid;
pub type ProjectId = Uuid;
pub type SectionId = Uuid;
pub type TaskId = Uuid;

/// Entity family an ordering scope belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    Projects,
    Sections,
    Tasks,
}

impl Display for ScopeKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let value = match self {
            Self::Projects => "projects",
            Self::Sections => "sections",
            Self::Tasks => "tasks",
        };
        f.write_str(value)
    }
}

/// Partition key for user-defined ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OrderingScope {
    /// All projects owned by one user.
    Projects { user_id: UserId },
    /// All sections of one project.
    Sections { project_id: ProjectId },
    /// Tasks sharing project, section and parent task.
    ///
    /// `section_id = None` is the project's unsectioned list and
    /// `parent_task_id = None` holds top-level tasks.
    Tasks {
        project_id: ProjectId,
        section_id: Option<SectionId>,
        parent_task_id: Option<TaskId>,
    },
}

impl OrderingScope {
    /// Scope of top-level tasks in one project section.
    pub fn tasks(project_id: ProjectId, section_id: Option<SectionId>) -> Self {
        Self::Tasks {
            project_id,
            section_id,
            parent_task_id: None,
        }
    }

    /// Scope of sub-tasks under one parent task.
    pub fn sub_tasks(
        project_id: ProjectId,
        section_id: Option<SectionId>,
        parent_task_id: TaskId,
    ) -> Self {
        Self::Tasks {
            project_id,
            section_id,
            parent_task_id: Some(parent_task_id),
        }
    }

    pub fn kind(&self) -> ScopeKind {
        match self {
            Self::Projects { .. } => ScopeKind::Projects,
            Self::Sections { .. } => ScopeKind::Sections,
            Self::Tasks { .. } => ScopeKind::Tasks,
        }
    }
}

impl Display for OrderingScope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Projects { user_id } => write!(f, "projects(user={user_id})"),
            Self::Sections { project_id } => write!(f, "sections(project={project_id})"),
            Self::Tasks {
                project_id,
                section_id,
                parent_task_id,
            } => {
                write!(f, "tasks(project={project_id}")?;
                if let Some(section_id) = section_id {
                    write!(f, " section={section_id}")?;
                }
                if let Some(parent_task_id) = parent_task_id {
                    write!(f, " parent={parent_task_id}")?;
                }
                f.write_str(")")
            }
        }
    }
}
