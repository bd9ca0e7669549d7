use std::sync::{Arc, Weak, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, trace, warn};

use crate::data::PlayerEvent;
use crate::players::player_controller::PlayerEventListener;

/// Base implementation of the listener and suppression plumbing shared by
/// player controllers.
///
/// Concrete players delegate listener registration here and emit events
/// through `notify_event`, which drops events while suppression is active.
#[derive(Clone)]
pub struct BasePlayerController {
    /// Listeners registered with this controller
    listeners: Arc<RwLock<Vec<Weak<dyn PlayerEventListener>>>>,

    /// While set, events are swallowed instead of delivered
    suppressed: Arc<AtomicBool>,
}

impl BasePlayerController {
    /// Create a new base controller with no listeners
    pub fn new() -> Self {
        Self {
            listeners: Arc::new(RwLock::new(Vec::new())),
            suppressed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Enable or disable event suppression
    pub fn set_event_suppression(&self, suppressed: bool) {
        trace!("Event suppression set to {}", suppressed);
        self.suppressed.store(suppressed, Ordering::SeqCst);
    }

    /// Whether events are currently being swallowed
    pub fn is_suppressed(&self) -> bool {
        self.suppressed.load(Ordering::SeqCst)
    }

    /// Deliver an event to all live listeners, unless suppression is active
    pub fn notify_event(&self, event: PlayerEvent) {
        if self.is_suppressed() {
            trace!("Suppressed player event: {}", event);
            return;
        }
        self.prune_dead_listeners();
        if let Ok(listeners) = self.listeners.read() {
            debug!("Notifying {} listeners of player event: {}", listeners.len(), event);
            for listener_weak in listeners.iter() {
                if let Some(listener) = listener_weak.upgrade() {
                    listener.on_player_event(event);
                }
            }
        } else {
            warn!("Failed to acquire read lock for listeners when notifying event");
        }
    }

    /// Register an event listener
    pub fn register_event_listener(&self, listener: Weak<dyn PlayerEventListener>) -> bool {
        if let Ok(mut listeners) = self.listeners.write() {
            // Check for duplicates before adding
            for existing in listeners.iter() {
                if let (Some(new), Some(old)) = (listener.upgrade(), existing.upgrade()) {
                    if Arc::ptr_eq(&new, &old) {
                        debug!("Listener already registered, skipping");
                        return false;
                    }
                }
            }
            listeners.push(listener);
            debug!("Listener registered, total listeners: {}", listeners.len());
            return true;
        }
        warn!("Failed to acquire write lock when registering listener");
        false
    }

    /// Unregister a previously registered event listener
    pub fn unregister_event_listener(&self, listener: &Arc<dyn PlayerEventListener>) -> bool {
        if let Ok(mut listeners) = self.listeners.write() {
            let original_len = listeners.len();
            listeners.retain(|weak_ref| {
                if let Some(target) = weak_ref.upgrade() {
                    !Arc::ptr_eq(&target, listener)
                } else {
                    false // Drop dead weak references as well
                }
            });
            return listeners.len() < original_len;
        }
        warn!("Failed to acquire write lock when unregistering listener");
        false
    }

    /// Remove any dead (dropped) listeners
    fn prune_dead_listeners(&self) {
        if let Ok(mut listeners) = self.listeners.write() {
            listeners.retain(|weak_ref| weak_ref.upgrade().is_some());
        } else {
            warn!("Failed to acquire write lock when pruning dead listeners");
        }
    }
}

impl Default for BasePlayerController {
    fn default() -> Self {
        Self::new()
    }
}
