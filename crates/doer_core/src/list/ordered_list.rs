//! Client-side ordered list cache with optimistic mutation.
//!
//! # Responsibility
//! - Hold one scope's items in display order.
//! - Compute positions from the cached neighbours and apply them locally
//!   before persistence confirms.
//! - Restore the pre-mutation snapshot when persistence fails.
//! - Merge change-feed events (insert-if-absent, update-by-id, delete-by-id).
//!
//! # Invariants
//! - Items stay sorted by `position ASC, id ASC` after every local mutation.
//! - A failed persist leaves the list exactly as it was before the call.

use crate::model::item::{Orderable, PositionUpdate};
use crate::position::allocator::{needs_rebalance, position_at_end, position_between, rebalance};
use crate::sync::change_feed::{ChangeEvent, ChangeKind};
use log::warn;
use std::cmp::Ordering;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Failure of an optimistic mutation.
#[derive(Debug)]
pub enum OptimisticError<E> {
    /// The item is not in the cached list; nothing was changed.
    ItemNotFound(Uuid),
    /// Persistence failed; the local list was rolled back.
    Persist(E),
}

impl<E: Display> Display for OptimisticError<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ItemNotFound(id) => write!(f, "item not in list: {id}"),
            Self::Persist(err) => write!(f, "persist failed, local list restored: {err}"),
        }
    }
}

impl<E: Error + 'static> Error for OptimisticError<E> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::ItemNotFound(_) => None,
            Self::Persist(err) => Some(err),
        }
    }
}

/// Saved list state used to undo an optimistic mutation.
#[derive(Debug, Clone)]
pub struct ListSnapshot<T> {
    items: Vec<T>,
}

/// Items of one ordering scope in display order.
#[derive(Debug, Clone)]
pub struct OrderedList<T> {
    items: Vec<T>,
}

impl<T> Default for OrderedList<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T: Orderable + Clone> OrderedList<T> {
    /// Wraps items already sorted by the Data Store.
    pub fn from_sorted(items: Vec<T>) -> Self {
        debug_assert!(
            items
                .windows(2)
                .all(|pair| compare_items(&pair[0], &pair[1]) != Ordering::Greater),
            "store output must be sorted by position"
        );
        Self { items }
    }

    /// Builds a list from items in arbitrary order.
    pub fn from_unsorted(mut items: Vec<T>) -> Self {
        items.sort_by(compare_items);
        Self { items }
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: Uuid) -> Option<&T> {
        self.items.iter().find(|item| item.id() == id)
    }

    pub fn index_of(&self, id: Uuid) -> Option<usize> {
        self.items.iter().position(|item| item.id() == id)
    }

    pub fn ids(&self) -> Vec<Uuid> {
        self.items.iter().map(Orderable::id).collect()
    }

    pub fn positions(&self) -> Vec<f64> {
        self.items.iter().map(Orderable::position).collect()
    }

    pub fn last_position(&self) -> Option<f64> {
        self.items.last().map(Orderable::position)
    }

    /// Position for a new item appended to this list.
    pub fn append_position(&self) -> f64 {
        position_at_end(self.last_position())
    }

    /// Neighbour positions around slot `index` once `moving` is taken out.
    pub fn neighbours(&self, index: usize, moving: Option<Uuid>) -> (Option<f64>, Option<f64>) {
        let remaining: Vec<f64> = self
            .items
            .iter()
            .filter(|item| Some(item.id()) != moving)
            .map(Orderable::position)
            .collect();
        let index = index.min(remaining.len());
        let before = index.checked_sub(1).map(|previous| remaining[previous]);
        let after = remaining.get(index).copied();
        (before, after)
    }

    pub fn needs_rebalance(&self) -> bool {
        needs_rebalance(&self.positions())
    }

    pub fn snapshot(&self) -> ListSnapshot<T> {
        ListSnapshot {
            items: self.items.clone(),
        }
    }

    pub fn restore(&mut self, snapshot: ListSnapshot<T>) {
        self.items = snapshot.items;
    }

    /// Inserts one item at its own position. Returns `false` when the id is
    /// already present.
    pub fn insert(&mut self, item: T) -> bool {
        if self.get(item.id()).is_some() {
            return false;
        }
        let index = self
            .items
            .partition_point(|existing| compare_items(existing, &item) == Ordering::Less);
        self.items.insert(index, item);
        true
    }

    pub fn remove(&mut self, id: Uuid) -> Option<T> {
        let index = self.index_of(id)?;
        Some(self.items.remove(index))
    }

    /// Moves one item locally to slot `index`. Returns its new position.
    pub fn move_item(&mut self, id: Uuid, index: usize) -> Option<f64> {
        self.index_of(id)?;
        let (before, after) = self.neighbours(index, Some(id));
        let position = position_between(before, after);
        self.apply_position(id, position);
        Some(position)
    }

    /// Sets one item's position and re-sorts. Returns `false` for unknown ids.
    pub fn apply_position(&mut self, id: Uuid, position: f64) -> bool {
        let Some(mut item) = self.remove(id) else {
            return false;
        };
        item.set_position(position);
        self.insert(item)
    }

    /// Applies `rebalance(len)` to the current order and returns assignments.
    pub fn apply_rebalance(&mut self) -> Vec<PositionUpdate> {
        let fresh = rebalance(self.items.len());
        self.items
            .iter_mut()
            .zip(fresh)
            .map(|(item, position)| {
                item.set_position(position);
                PositionUpdate::new(item.id(), position)
            })
            .collect()
    }

    /// Moves locally, persists, and rolls back when `persist` fails.
    pub fn try_move<E>(
        &mut self,
        id: Uuid,
        index: usize,
        persist: impl FnOnce(PositionUpdate) -> Result<(), E>,
    ) -> Result<f64, OptimisticError<E>> {
        let snapshot = self.snapshot();
        let position = self
            .move_item(id, index)
            .ok_or(OptimisticError::ItemNotFound(id))?;

        if let Err(err) = persist(PositionUpdate::new(id, position)) {
            warn!("event=optimistic_move module=list status=rollback");
            self.restore(snapshot);
            return Err(OptimisticError::Persist(err));
        }
        Ok(position)
    }

    /// Rebalances locally, persists the batch, and rolls back on failure.
    pub fn try_rebalance<E>(
        &mut self,
        persist: impl FnOnce(&[PositionUpdate]) -> Result<(), E>,
    ) -> Result<Vec<PositionUpdate>, OptimisticError<E>> {
        let snapshot = self.snapshot();
        let updates = self.apply_rebalance();

        if let Err(err) = persist(&updates) {
            warn!("event=optimistic_rebalance module=list status=rollback");
            self.restore(snapshot);
            return Err(OptimisticError::Persist(err));
        }
        Ok(updates)
    }

    /// Merges one full-record change event.
    ///
    /// Returns whether the list changed.
    pub fn apply_change(&mut self, event: &ChangeEvent<T>) -> bool {
        let record = &event.record;
        match event.kind {
            ChangeKind::Insert => self.insert(record.clone()),
            ChangeKind::Update => {
                if self.remove(record.id()).is_none() {
                    return false;
                }
                self.insert(record.clone())
            }
            ChangeKind::Delete => self.remove(record.id()).is_some(),
        }
    }

    /// Merges one position-only update event.
    pub fn apply_position_update(&mut self, event: &ChangeEvent<PositionUpdate>) -> bool {
        match event.kind {
            ChangeKind::Delete => self.remove(event.record.id).is_some(),
            ChangeKind::Insert | ChangeKind::Update => {
                self.apply_position(event.record.id, event.record.position)
            }
        }
    }
}

fn compare_items<T: Orderable>(left: &T, right: &T) -> Ordering {
    left.position()
        .total_cmp(&right.position())
        .then_with(|| left.id().cmp(&right.id()))
}

#[cfg(test)]
mod tests {
    use super::OrderedList;
    use crate::model::item::Orderable;
    use uuid::Uuid;

    #[derive(Debug, Clone, PartialEq)]
    struct Row {
        id: Uuid,
        position: f64,
    }

    impl Orderable for Row {
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

    fn row(position: f64) -> Row {
        Row {
            id: Uuid::new_v4(),
            position,
        }
    }

    #[test]
    fn from_unsorted_orders_by_position() {
        let list = OrderedList::from_unsorted(vec![row(3.0), row(1.0), row(2.0)]);
        assert_eq!(list.positions(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn neighbours_skip_the_moving_item() {
        let list = OrderedList::from_sorted(vec![row(10.0), row(20.0), row(30.0)]);
        let moving = list.items()[0].id;
        assert_eq!(list.neighbours(1, Some(moving)), (Some(20.0), Some(30.0)));
        assert_eq!(list.neighbours(0, None), (None, Some(10.0)));
        assert_eq!(list.neighbours(7, None), (Some(30.0), None));
    }

    #[test]
    fn move_to_front_halves_first_position() {
        let mut list = OrderedList::from_sorted(vec![row(65536.0), row(131072.0)]);
        let last = list.items()[1].id;
        assert_eq!(list.move_item(last, 0), Some(32768.0));
        assert_eq!(list.ids()[0], last);
        assert_eq!(list.move_item(Uuid::new_v4(), 0), None);
    }

    #[test]
    fn insert_rejects_duplicate_ids() {
        let mut list = OrderedList::default();
        let item = row(1.0);
        assert!(list.insert(item.clone()));
        assert!(!list.insert(item));
        assert_eq!(list.len(), 1);
    }
}
