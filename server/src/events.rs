//! Explicit subscription point for connection teardown.

use log::debug;
use parking_lot::Mutex;
use shared::ConnectionId;
use std::sync::Arc;

pub trait DisconnectListener: Send + Sync {
    fn on_disconnect(&self, connection: ConnectionId);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: Vec<(ListenerId, Arc<dyn DisconnectListener>)>,
}

/// Fans out disconnect notifications to subscribed listeners.
///
/// Listeners are called after the registry lock is released, so a listener
/// may subscribe or unsubscribe from inside its callback.
#[derive(Default)]
pub struct DisconnectEvents {
    registry: Mutex<Registry>,
}

impl DisconnectEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: Arc<dyn DisconnectListener>) -> ListenerId {
        let mut registry = self.registry.lock();
        let id = ListenerId(registry.next_id);
        registry.next_id += 1;
        registry.listeners.push((id, listener));
        debug!("Disconnect listener {:?} subscribed", id);
        id
    }

    /// Returns false if the id was not subscribed.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut registry = self.registry.lock();
        let before = registry.listeners.len();
        registry.listeners.retain(|(listener_id, _)| *listener_id != id);
        let removed = registry.listeners.len() != before;
        if removed {
            debug!("Disconnect listener {:?} unsubscribed", id);
        }
        removed
    }

    pub fn notify(&self, connection: ConnectionId) {
        let listeners: Vec<Arc<dyn DisconnectListener>> = self
            .registry
            .lock()
            .listeners
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in listeners {
            listener.on_disconnect(connection);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.registry.lock().listeners.len()
    }
}
