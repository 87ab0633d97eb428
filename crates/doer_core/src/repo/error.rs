//! Error type shared by project, section and task repositories.

use crate::db::DbError;
use crate::model::item::ItemValidationError;
use crate::repo::ordering_repo::OrderingRepoError;
use crate::repo::sql::SchemaMismatch;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type ItemRepoResult<T> = Result<T, ItemRepoError>;

/// Repository error for item persistence and query operations.
#[derive(Debug)]
pub enum ItemRepoError {
    /// Create input failed validation; nothing was written.
    Validation(ItemValidationError),
    Db(DbError),
    /// Target item does not exist.
    NotFound(Uuid),
    /// Referenced owner (project, section or parent task) does not exist.
    OwnerNotFound { kind: &'static str, id: Uuid },
    Schema(SchemaMismatch),
    InvalidData(String),
}

impl Display for ItemRepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "item not found: {id}"),
            Self::OwnerNotFound { kind, id } => write!(f, "{kind} not found: {id}"),
            Self::Schema(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted item data: {message}"),
        }
    }
}

impl Error for ItemRepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::Schema(err) => Some(err),
            Self::NotFound(_) => None,
            Self::OwnerNotFound { .. } => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<ItemValidationError> for ItemRepoError {
    fn from(value: ItemValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for ItemRepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for ItemRepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<SchemaMismatch> for ItemRepoError {
    fn from(value: SchemaMismatch) -> Self {
        Self::Schema(value)
    }
}

impl From<OrderingRepoError> for ItemRepoError {
    fn from(value: OrderingRepoError) -> Self {
        match value {
            OrderingRepoError::Db(err) => Self::Db(err),
            OrderingRepoError::ItemNotFound { id, .. } => Self::NotFound(id),
            OrderingRepoError::Schema(err) => Self::Schema(err),
            OrderingRepoError::InvalidData(message) => Self::InvalidData(message),
            other => Self::InvalidData(other.to_string()),
        }
    }
}
