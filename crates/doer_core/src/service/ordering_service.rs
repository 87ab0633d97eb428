//! Ordering use-case service.
//!
//! # Responsibility
//! - Turn user reorder intents (start, end, index, between) into persisted
//!   positions through `OrderingRepository`.
//! - Apply the rebalance policy after each mutation.
//! - Publish every persisted position on the optional change feed.
//!
//! # Invariants
//! - Neighbour positions are read from the store, never from a caller cache.
//! - `Between` neighbours must exist in scope, satisfy `before < after` and be
//!   adjacent once the moving item is taken out. A `None` side must be the
//!   real list edge.
//! - A rebalance rewrites the whole scope in one batch or not at all.

use crate::model::item::PositionUpdate;
use crate::model::scope::OrderingScope;
use crate::position::allocator::{
    needs_rebalance, position_at_end, position_between, rebalance, scope_health, ScopeHealth,
};
use crate::repo::ordering_repo::{OrderingRepoError, OrderingRepository};
use crate::sync::change_feed::{ChangeEvent, ChangeFeed, ChangeKind};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// When the service checks for and repairs degenerate scopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RebalancePolicy {
    /// Only `rebalance_scope` repairs a scope.
    Manual,
    /// Check after every move and rebalance when degenerate.
    #[default]
    AfterMutation,
}

/// Requested destination inside a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveTarget {
    /// Before the current first item.
    Start,
    /// After the current last item.
    End,
    /// Slot index in the list as it looks without the moving item.
    /// Out-of-range indexes clamp to the end.
    Index(usize),
    /// Between two named neighbours; `None` means list edge.
    Between {
        before: Option<Uuid>,
        after: Option<Uuid>,
    },
}

/// Result of one persisted move.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveOutcome {
    /// Final stored position of the moved item.
    pub position: f64,
    /// Whether the move triggered a scope rebalance.
    pub rebalanced: bool,
}

/// Errors from ordering service operations.
#[derive(Debug)]
pub enum OrderingServiceError {
    /// Moving item is not part of the source scope.
    ItemNotFound { scope: OrderingScope, id: Uuid },
    /// A `Between` neighbour is not part of the target scope.
    NeighbourNotFound { scope: OrderingScope, id: Uuid },
    /// The moving item was named as its own neighbour.
    SelfNeighbour(Uuid),
    /// `Between` neighbours are not in ascending order.
    NeighbourOrderViolation { before: f64, after: f64 },
    /// Another item sits between the named `Between` neighbours.
    NeighbourNotAdjacent {
        before: Option<Uuid>,
        after: Option<Uuid>,
    },
    /// Task would become a sub-task of itself.
    CycleDetected(Uuid),
    /// Repository-level failure.
    Repo(OrderingRepoError),
}

impl Display for OrderingServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ItemNotFound { scope, id } => write!(f, "item {id} not found in {scope}"),
            Self::NeighbourNotFound { scope, id } => {
                write!(f, "neighbour {id} not found in {scope}")
            }
            Self::SelfNeighbour(id) => write!(f, "item {id} cannot be its own neighbour"),
            Self::NeighbourOrderViolation { before, after } => write!(
                f,
                "neighbour positions out of order: before={before} after={after}"
            ),
            Self::NeighbourNotAdjacent { before, after } => write!(
                f,
                "neighbours are not adjacent: before={} after={}",
                edge_label(*before),
                edge_label(*after)
            ),
            Self::CycleDetected(id) => write!(f, "task {id} cannot be nested under itself"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for OrderingServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<OrderingRepoError> for OrderingServiceError {
    fn from(value: OrderingRepoError) -> Self {
        match value {
            OrderingRepoError::ItemNotFound { scope, id } => Self::ItemNotFound { scope, id },
            OrderingRepoError::CycleDetected(id) => Self::CycleDetected(id),
            other => Self::Repo(other),
        }
    }
}

fn edge_label(id: Option<Uuid>) -> String {
    id.map_or_else(|| "edge".to_string(), |id| id.to_string())
}

pub type OrderingServiceResult<T> = Result<T, OrderingServiceError>;

/// Ordering service facade.
pub struct OrderingService<R: OrderingRepository> {
    repo: R,
    policy: RebalancePolicy,
    feed: Option<ChangeFeed<PositionUpdate>>,
}

impl<R: OrderingRepository> OrderingService<R> {
    /// Creates service with the default `AfterMutation` policy and no feed.
    pub fn new(repo: R) -> Self {
        Self {
            repo,
            policy: RebalancePolicy::default(),
            feed: None,
        }
    }

    pub fn with_policy(mut self, policy: RebalancePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Attaches a feed that receives every persisted position.
    pub fn with_feed(mut self, feed: ChangeFeed<PositionUpdate>) -> Self {
        self.feed = Some(feed);
        self
    }

    pub fn policy(&self) -> RebalancePolicy {
        self.policy
    }

    pub fn feed_mut(&mut self) -> Option<&mut ChangeFeed<PositionUpdate>> {
        self.feed.as_mut()
    }

    /// Lists `(id, position)` pairs of one scope in stored order.
    pub fn list_positions(&self, scope: &OrderingScope) -> OrderingServiceResult<Vec<PositionUpdate>> {
        self.repo.list_positions(scope).map_err(Into::into)
    }

    /// Returns the position a new item appended to `scope` should get.
    pub fn append_position(&self, scope: &OrderingScope) -> OrderingServiceResult<f64> {
        Ok(position_at_end(self.repo.max_position(scope)?))
    }

    /// Returns the position a new, not yet stored item should get at `target`.
    pub fn position_for_insert(
        &self,
        scope: &OrderingScope,
        target: MoveTarget,
    ) -> OrderingServiceResult<f64> {
        let entries = self.repo.list_positions(scope)?;
        let (before, after) = resolve_neighbours(scope, &entries, target, None)?;
        Ok(position_between(before, after))
    }

    /// Moves one stored item inside its scope.
    pub fn move_item(
        &self,
        scope: &OrderingScope,
        id: Uuid,
        target: MoveTarget,
    ) -> OrderingServiceResult<MoveOutcome> {
        let mut entries = self.repo.list_positions(scope)?;
        let count_before = entries.len();
        entries.retain(|entry| entry.id != id);
        if entries.len() == count_before {
            return Err(OrderingServiceError::ItemNotFound { scope: *scope, id });
        }

        let (before, after) = resolve_neighbours(scope, &entries, target, Some(id))?;
        let position = position_between(before, after);
        self.repo.set_position(scope, id, position)?;
        self.publish(scope, PositionUpdate::new(id, position));

        info!(
            "event=position_move module=ordering status=ok scope={} position={}",
            scope.kind(),
            position
        );
        self.after_mutation(scope, id, position)
    }

    /// Moves one stored item into another scope of the same kind.
    ///
    /// Same-scope calls behave like `move_item`.
    pub fn move_to_scope(
        &self,
        from: &OrderingScope,
        to: &OrderingScope,
        id: Uuid,
        target: MoveTarget,
    ) -> OrderingServiceResult<MoveOutcome> {
        if from == to {
            return self.move_item(from, id, target);
        }
        if let OrderingScope::Tasks {
            parent_task_id: Some(parent_task_id),
            ..
        } = to
        {
            if *parent_task_id == id {
                return Err(OrderingServiceError::CycleDetected(id));
            }
        }

        if !self.repo.list_positions(from)?.iter().any(|entry| entry.id == id) {
            return Err(OrderingServiceError::ItemNotFound { scope: *from, id });
        }

        let entries = self.repo.list_positions(to)?;
        let (before, after) = resolve_neighbours(to, &entries, target, Some(id))?;
        let position = position_between(before, after);
        self.repo.relocate(id, from, to, position)?;
        self.publish(to, PositionUpdate::new(id, position));

        info!(
            "event=position_relocate module=ordering status=ok scope={} position={}",
            to.kind(),
            position
        );
        self.after_mutation(to, id, position)
    }

    /// Returns the current health of one scope.
    pub fn health(&self, scope: &OrderingScope) -> OrderingServiceResult<ScopeHealth> {
        let positions = self.stored_positions(scope)?;
        Ok(scope_health(&positions))
    }

    pub fn needs_rebalance(&self, scope: &OrderingScope) -> OrderingServiceResult<bool> {
        let positions = self.stored_positions(scope)?;
        Ok(needs_rebalance(&positions))
    }

    /// Reassigns `GAP, 2*GAP, ...` to every item of the scope in stored order.
    ///
    /// Returns the written assignments.
    pub fn rebalance_scope(
        &self,
        scope: &OrderingScope,
    ) -> OrderingServiceResult<Vec<PositionUpdate>> {
        let entries = self.repo.list_positions(scope)?;
        let updates: Vec<PositionUpdate> = entries
            .iter()
            .zip(rebalance(entries.len()))
            .map(|(entry, position)| PositionUpdate::new(entry.id, position))
            .collect();

        self.repo.set_positions(scope, &updates)?;
        for update in &updates {
            self.publish(scope, *update);
        }

        info!(
            "event=scope_rebalance module=ordering status=ok scope={} count={}",
            scope.kind(),
            updates.len()
        );
        Ok(updates)
    }

    fn after_mutation(
        &self,
        scope: &OrderingScope,
        id: Uuid,
        position: f64,
    ) -> OrderingServiceResult<MoveOutcome> {
        if self.policy == RebalancePolicy::Manual {
            return Ok(MoveOutcome {
                position,
                rebalanced: false,
            });
        }

        if !self.needs_rebalance(scope)? {
            return Ok(MoveOutcome {
                position,
                rebalanced: false,
            });
        }

        warn!(
            "event=scope_degenerate module=ordering status=repair scope={}",
            scope.kind()
        );
        let updates = self.rebalance_scope(scope)?;
        let position = updates
            .iter()
            .find(|update| update.id == id)
            .map_or(position, |update| update.position);
        Ok(MoveOutcome {
            position,
            rebalanced: true,
        })
    }

    fn stored_positions(&self, scope: &OrderingScope) -> OrderingServiceResult<Vec<f64>> {
        Ok(self
            .repo
            .list_positions(scope)?
            .into_iter()
            .map(|entry| entry.position)
            .collect())
    }

    fn publish(&self, scope: &OrderingScope, update: PositionUpdate) {
        if let Some(feed) = &self.feed {
            feed.publish(&ChangeEvent::new(*scope, ChangeKind::Update, update));
        }
    }
}

/// Resolves the neighbour positions around `target` in `entries`.
///
/// `entries` must be sorted and must not contain the moving item.
fn resolve_neighbours(
    scope: &OrderingScope,
    entries: &[PositionUpdate],
    target: MoveTarget,
    moving: Option<Uuid>,
) -> OrderingServiceResult<(Option<f64>, Option<f64>)> {
    match target {
        MoveTarget::Start => Ok((None, entries.first().map(|entry| entry.position))),
        MoveTarget::End => Ok((entries.last().map(|entry| entry.position), None)),
        MoveTarget::Index(index) => {
            let index = index.min(entries.len());
            let before = index
                .checked_sub(1)
                .map(|previous| entries[previous].position);
            let after = entries.get(index).map(|entry| entry.position);
            Ok((before, after))
        }
        MoveTarget::Between { before, after } => {
            let lookup = |neighbour: Option<Uuid>| -> OrderingServiceResult<Option<usize>> {
                let Some(neighbour) = neighbour else {
                    return Ok(None);
                };
                if Some(neighbour) == moving {
                    return Err(OrderingServiceError::SelfNeighbour(neighbour));
                }
                entries
                    .iter()
                    .position(|entry| entry.id == neighbour)
                    .map(Some)
                    .ok_or(OrderingServiceError::NeighbourNotFound {
                        scope: *scope,
                        id: neighbour,
                    })
            };

            let before_index = lookup(before)?;
            let after_index = lookup(after)?;
            if let (Some(before_index), Some(after_index)) = (before_index, after_index) {
                let before = entries[before_index].position;
                let after = entries[after_index].position;
                if before >= after {
                    return Err(OrderingServiceError::NeighbourOrderViolation { before, after });
                }
            }

            let expected_after = before_index.map_or(0, |index| index + 1);
            let adjacent = match after_index {
                Some(index) => index == expected_after,
                None => expected_after == entries.len(),
            };
            if !adjacent {
                return Err(OrderingServiceError::NeighbourNotAdjacent { before, after });
            }

            Ok((
                before_index.map(|index| entries[index].position),
                after_index.map(|index| entries[index].position),
            ))
        }
    }
}
