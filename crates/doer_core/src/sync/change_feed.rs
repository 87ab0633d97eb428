//! In-process change feed for ordered items.
//!
//! # Responsibility
//! - Deliver `(scope, kind, record)` change events to registered listeners.
//! - Keep transport concerns out of the ordering core.
//!
//! # Invariants
//! - Listeners are invoked in subscription order.
//! - A subscription id is never reused within one feed.

use crate::model::scope::OrderingScope;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Row-level change kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// One change notification for a record inside an ordering scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent<T> {
    pub scope: OrderingScope,
    pub kind: ChangeKind,
    pub record: T,
}

impl<T> ChangeEvent<T> {
    pub fn new(scope: OrderingScope, kind: ChangeKind, record: T) -> Self {
        Self {
            scope,
            kind,
            record,
        }
    }
}

/// Handle returned by `ChangeFeed::subscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

type Listener<T> = Arc<dyn Fn(&ChangeEvent<T>) + Send + Sync>;

/// Listener registry for one record type.
pub struct ChangeFeed<T> {
    listeners: BTreeMap<SubscriptionId, Listener<T>>,
    next_id: u64,
}

impl<T> Default for ChangeFeed<T> {
    fn default() -> Self {
        Self {
            listeners: BTreeMap::new(),
            next_id: 0,
        }
    }
}

impl<T> ChangeFeed<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one listener.
    pub fn subscribe(
        &mut self,
        listener: impl Fn(&ChangeEvent<T>) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.listeners.insert(id, Arc::new(listener));
        id
    }

    /// Removes one listener. Returns `false` for unknown ids.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.listeners.remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Delivers one event to every listener.
    pub fn publish(&self, event: &ChangeEvent<T>) {
        for listener in self.listeners.values() {
            listener(event);
        }
    }
}
