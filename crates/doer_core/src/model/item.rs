//! Orderable item models: projects, sections and tasks.
//!
//! # Responsibility
//! - Define read models returned by the Data Store.
//! - Define create inputs and their validation rules.
//!
//! # Invariants
//! - `position` is only written by create and explicit reorder paths.
//! - Completion, title and description edits never change `position`.

use crate::model::scope::{OrderingScope, ProjectId, SectionId, TaskId, UserId};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Default project color for new projects without an explicit color.
pub const DEFAULT_PROJECT_COLOR: &str = "#808080";
/// Display name of the per-user inbox project.
pub const INBOX_PROJECT_NAME: &str = "Inbox";

static HEX_COLOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#[0-9a-fA-F]{6}$").expect("valid color regex"));
static DUE_DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{4}-(0[1-9]|1[0-2])-(0[1-9]|[12]\d|3[01])$").expect("valid date regex")
});

/// Common accessors for items that carry a user-defined position.
pub trait Orderable {
    fn id(&self) -> Uuid;
    fn position(&self) -> f64;
    fn set_position(&mut self, position: f64);
}

/// One item's id paired with its position inside a scope.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionUpdate {
    pub id: Uuid,
    pub position: f64,
}

impl PositionUpdate {
    pub fn new(id: Uuid, position: f64) -> Self {
        Self { id, position }
    }
}

/// Task priority, `P1` most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Priority {
    P1,
    P2,
    P3,
    #[default]
    P4,
}

impl Priority {
    pub fn as_level(self) -> u8 {
        match self {
            Self::P1 => 1,
            Self::P2 => 2,
            Self::P3 => 3,
            Self::P4 => 4,
        }
    }

    pub fn from_level(level: u8) -> Option<Self> {
        match level {
            1 => Some(Self::P1),
            2 => Some(Self::P2),
            3 => Some(Self::P3),
            4 => Some(Self::P4),
            _ => None,
        }
    }
}

impl TryFrom<u8> for Priority {
    type Error = ItemValidationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_level(value).ok_or(ItemValidationError::InvalidPriority(value))
    }
}

impl From<Priority> for u8 {
    fn from(value: Priority) -> Self {
        value.as_level()
    }
}

/// Project read model. Ordered within `OrderingScope::Projects`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub user_id: UserId,
    pub name: String,
    pub color: String,
    pub is_inbox: bool,
    pub is_archived: bool,
    pub position: f64,
    /// Epoch ms creation timestamp.
    pub created_at: i64,
    /// Epoch ms update timestamp.
    pub updated_at: i64,
}

impl Project {
    pub fn scope(&self) -> OrderingScope {
        OrderingScope::Projects {
            user_id: self.user_id,
        }
    }
}

/// Section read model. Ordered within `OrderingScope::Sections`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub id: SectionId,
    pub project_id: ProjectId,
    pub name: String,
    pub position: f64,
    pub is_collapsed: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Section {
    pub fn scope(&self) -> OrderingScope {
        OrderingScope::Sections {
            project_id: self.project_id,
        }
    }
}

/// Task read model. Ordered within `OrderingScope::Tasks`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub user_id: UserId,
    pub project_id: ProjectId,
    pub section_id: Option<SectionId>,
    pub parent_task_id: Option<TaskId>,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub is_completed: bool,
    /// Epoch ms; set while `is_completed` is true.
    pub completed_at: Option<i64>,
    /// Calendar date in `YYYY-MM-DD` form.
    pub due_date: Option<String>,
    pub position: f64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Task {
    pub fn scope(&self) -> OrderingScope {
        OrderingScope::Tasks {
            project_id: self.project_id,
            section_id: self.section_id,
            parent_task_id: self.parent_task_id,
        }
    }
}

macro_rules! impl_orderable {
    ($($ty:ty),+) => {
        $(
            impl Orderable for $ty {
                fn id(&self) -> Uuid {
                    self.id
                }

                fn position(&self) -> f64 {
                    self.position
                }

                fn set_position(&mut self, position: f64) {
                    self.position = position;
                }
            }
        )+
    };
}

impl_orderable!(Project, Section, Task);

/// Validation errors for create inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemValidationError {
    /// Name or title is blank after trim.
    BlankName,
    /// Color is not `#RRGGBB`.
    InvalidColor(String),
    /// Due date is not `YYYY-MM-DD`.
    InvalidDueDate(String),
    /// Priority level outside `1..=4`.
    InvalidPriority(u8),
}

impl Display for ItemValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankName => write!(f, "name must not be blank"),
            Self::InvalidColor(value) => write!(f, "invalid color `{value}`; expected #RRGGBB"),
            Self::InvalidDueDate(value) => {
                write!(f, "invalid due date `{value}`; expected YYYY-MM-DD")
            }
            Self::InvalidPriority(value) => {
                write!(f, "invalid priority `{value}`; expected 1..=4")
            }
        }
    }
}

impl Error for ItemValidationError {}

/// Input for creating one project at the end of the user's project list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProject {
    pub user_id: UserId,
    pub name: String,
    pub color: Option<String>,
}

impl NewProject {
    pub fn new(user_id: UserId, name: impl Into<String>) -> Self {
        Self {
            user_id,
            name: name.into(),
            color: None,
        }
    }

    pub fn validate(&self) -> Result<(), ItemValidationError> {
        validate_name(&self.name)?;
        if let Some(color) = &self.color {
            if !HEX_COLOR_RE.is_match(color) {
                return Err(ItemValidationError::InvalidColor(color.clone()));
            }
        }
        Ok(())
    }
}

/// Input for creating one section at the end of a project's section list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSection {
    pub project_id: ProjectId,
    pub name: String,
}

impl NewSection {
    pub fn new(project_id: ProjectId, name: impl Into<String>) -> Self {
        Self {
            project_id,
            name: name.into(),
        }
    }

    pub fn validate(&self) -> Result<(), ItemValidationError> {
        validate_name(&self.name)
    }
}

/// Input for creating one task at the end of its scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub project_id: ProjectId,
    pub section_id: Option<SectionId>,
    pub parent_task_id: Option<TaskId>,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub due_date: Option<String>,
}

impl NewTask {
    pub fn new(project_id: ProjectId, title: impl Into<String>) -> Self {
        Self {
            project_id,
            section_id: None,
            parent_task_id: None,
            title: title.into(),
            description: String::new(),
            priority: Priority::default(),
            due_date: None,
        }
    }

    pub fn in_section(mut self, section_id: SectionId) -> Self {
        self.section_id = Some(section_id);
        self
    }

    pub fn under_parent(mut self, parent_task_id: TaskId) -> Self {
        self.parent_task_id = Some(parent_task_id);
        self
    }

    /// Scope this task will be appended to.
    pub fn scope(&self) -> OrderingScope {
        OrderingScope::Tasks {
            project_id: self.project_id,
            section_id: self.section_id,
            parent_task_id: self.parent_task_id,
        }
    }

    pub fn validate(&self) -> Result<(), ItemValidationError> {
        validate_name(&self.title)?;
        if let Some(due_date) = &self.due_date {
            if !DUE_DATE_RE.is_match(due_date) {
                return Err(ItemValidationError::InvalidDueDate(due_date.clone()));
            }
        }
        Ok(())
    }
}

/// Rejects names and titles that are blank after trim.
pub fn validate_name(value: &str) -> Result<(), ItemValidationError> {
    if value.trim().is_empty() {
        return Err(ItemValidationError::BlankName);
    }
    Ok(())
}
