//! Optimistic synchronization with the remote store.

pub mod coordinator;
pub mod remote;
