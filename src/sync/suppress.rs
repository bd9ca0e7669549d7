//! Feedback-loop guards.
//!
//! Every remote-to-local corrective write goes through `run_suppressed`, so
//! the player events it triggers never re-enter the outbound propagation
//! path. The one-shot flags cover the cases suppression alone cannot: echoes
//! that arrive after the suppression scope has already closed.

use crate::players::PlayerController;

/// RAII scope that holds a player's event suppression while a corrective
/// action runs
pub struct SuppressionScope<'a> {
    player: &'a dyn PlayerController,
}

impl<'a> SuppressionScope<'a> {
    pub fn new(player: &'a dyn PlayerController) -> Self {
        player.set_event_suppression(true);
        Self { player }
    }
}

impl Drop for SuppressionScope<'_> {
    fn drop(&mut self) {
        self.player.set_event_suppression(false);
    }
}

/// Run a corrective action with the player's events suppressed
pub fn run_suppressed<F: FnOnce()>(player: &dyn PlayerController, action: F) {
    let _scope = SuppressionScope::new(player);
    action();
}

/// Transient one-shot flags, each scoped to a single corrective-action /
/// response cycle.
#[derive(Debug, Default)]
pub struct SuppressionFlags {
    /// An engine-issued corrective seek is in flight; the next local
    /// seek-originated propagation attempt must no-op
    sync_seeking: bool,

    /// A pause has survived the debounce window (or came from the remote,
    /// which is stable by definition)
    stable_pause: bool,

    /// A corrective play was rejected by the autoplay policy; the next
    /// genuine playing event is the user's confirming gesture
    awaiting_first_interaction: bool,
}

impl SuppressionFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_sync_seeking(&mut self) {
        self.sync_seeking = true;
    }

    /// Consume the sync-seeking flag; true at most once per corrective seek
    pub fn take_sync_seeking(&mut self) -> bool {
        std::mem::take(&mut self.sync_seeking)
    }

    pub fn stable_pause(&self) -> bool {
        self.stable_pause
    }

    pub fn set_stable_pause(&mut self, stable: bool) {
        self.stable_pause = stable;
    }

    pub fn set_awaiting_first_interaction(&mut self) {
        self.awaiting_first_interaction = true;
    }

    /// Consume the first-interaction flag; true at most once per rejection
    pub fn take_awaiting_first_interaction(&mut self) -> bool {
        std::mem::take(&mut self.awaiting_first_interaction)
    }
}
