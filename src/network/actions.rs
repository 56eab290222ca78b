//! Action registry
//!
//! Maps message types to callbacks. Dispatch works on a snapshot so that
//! callbacks may register new actions without deadlocking.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::message::{Message, MessageType};

use super::ClientId;

/// Callback invoked by [`Client::update`](super::Client::update)
pub type ClientAction = dyn Fn(Message) + Send + Sync;

/// Callback invoked by [`Server::update`](super::Server::update)
pub type ServerAction = dyn Fn(ClientId, Message) + Send + Sync;

/// Type → callback table; the last registration for a type wins
pub struct ActionRegistry<A: ?Sized> {
    actions: RwLock<HashMap<MessageType, Arc<A>>>,
}

impl<A: ?Sized> ActionRegistry<A> {
    pub fn new() -> Self {
        Self {
            actions: RwLock::new(HashMap::new()),
        }
    }

    /// Register or replace the action for `msg_type`
    pub fn define(&self, msg_type: MessageType, action: Arc<A>) {
        if self.actions.write().insert(msg_type, action).is_some() {
            tracing::trace!("Replaced action for message type {}", msg_type);
        }
    }

    /// Remove the action for `msg_type`, returning whether one existed
    pub fn remove(&self, msg_type: MessageType) -> bool {
        self.actions.write().remove(&msg_type).is_some()
    }

    pub fn contains(&self, msg_type: MessageType) -> bool {
        self.actions.read().contains_key(&msg_type)
    }

    pub fn len(&self) -> usize {
        self.actions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.read().is_empty()
    }

    /// Copy of the current table
    pub fn snapshot(&self) -> HashMap<MessageType, Arc<A>> {
        self.actions.read().clone()
    }
}

impl<A: ?Sized> Default for ActionRegistry<A> {
    fn default() -> Self {
        Self::new()
    }
}
