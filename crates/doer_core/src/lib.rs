//! Ordering core for the Doer to-do clients.
//! This crate owns position allocation, rebalancing and the reorder
//! state machine shared by project, section and task lists.

pub mod db;
pub mod list;
pub mod logging;
pub mod model;
pub mod position;
pub mod repo;
pub mod service;
pub mod sync;

pub use list::ordered_list::{ListSnapshot, OptimisticError, OrderedList};
pub use logging::{
    default_log_level, init_logging, init_logging_with, logging_status, LogConfig, LoggingError,
};
pub use model::item::{
    ItemValidationError, NewProject, NewSection, NewTask, Orderable, PositionUpdate, Priority,
    Project, Section, Task,
};
pub use model::scope::{OrderingScope, ProjectId, ScopeKind, SectionId, TaskId, UserId};
pub use position::allocator::{
    initial_position, needs_rebalance, position_at_end, position_between, rebalance,
    scope_health, ScopeHealth, MIN_POSITION_GAP, POSITION_GAP,
};
pub use repo::error::{ItemRepoError, ItemRepoResult};
pub use repo::ordering_repo::{
    OrderingRepoError, OrderingRepoResult, OrderingRepository, SqliteOrderingRepository,
};
pub use repo::project_repo::{ProjectRepository, SqliteProjectRepository};
pub use repo::task_repo::{SqliteTaskRepository, TaskRepository};
pub use service::ordering_service::{
    MoveOutcome, MoveTarget, OrderingService, OrderingServiceError, OrderingServiceResult,
    RebalancePolicy,
};
pub use sync::change_feed::{ChangeEvent, ChangeFeed, ChangeKind, SubscriptionId};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
