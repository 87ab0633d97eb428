//! Change propagation between the Data Store and client caches.

pub mod change_feed;
