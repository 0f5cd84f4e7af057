//! Per-turn timer handles.
//!
//! Each armed turn owns one `CancellationToken` shared by its warning and
//! expiry timers. Resolving a turn cancels its token; archiving a session
//! cancels the tokens of all its turns.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

use hourglass_types::session::SessionId;
use hourglass_types::turn::TurnId;

struct TimerHandle {
    session_id: SessionId,
    token: CancellationToken,
    generation: u64,
}

/// Token returned by [`TimerRegistry::register`].
#[derive(Debug, Clone)]
pub struct ArmedTimer {
    pub token: CancellationToken,
    pub generation: u64,
}

#[derive(Default)]
pub struct TimerRegistry {
    handles: DashMap<TurnId, TimerHandle>,
    next_generation: AtomicU64,
}

impl TimerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm `turn_id`, cancelling any timers previously armed for it.
    pub fn register(&self, turn_id: TurnId, session_id: SessionId) -> ArmedTimer {
        let token = CancellationToken::new();
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let previous = self.handles.insert(
            turn_id,
            TimerHandle {
                session_id,
                token: token.clone(),
                generation,
            },
        );
        if let Some(previous) = previous {
            previous.token.cancel();
        }
        ArmedTimer { token, generation }
    }

    /// Cancel the timers of one turn. Returns `true` if any were armed.
    pub fn cancel(&self, turn_id: &TurnId) -> bool {
        match self.handles.remove(turn_id) {
            Some((_, handle)) => {
                handle.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel the timers of every turn in a session. Returns how many.
    pub fn cancel_session(&self, session_id: &SessionId) -> usize {
        let turn_ids: Vec<TurnId> = self
            .handles
            .iter()
            .filter(|entry| entry.value().session_id == *session_id)
            .map(|entry| *entry.key())
            .collect();
        turn_ids.iter().filter(|id| self.cancel(id)).count()
    }

    /// Drop the handle of a timer task that ran to completion, unless the
    /// turn was re-armed in the meantime.
    pub fn finish(&self, turn_id: &TurnId, generation: u64) {
        self.handles
            .remove_if(turn_id, |_, handle| handle.generation == generation);
    }

    pub fn is_armed(&self, turn_id: &TurnId) -> bool {
        self.handles.contains_key(turn_id)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

impl std::fmt::Debug for TimerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerRegistry")
            .field("armed", &self.handles.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_fires_token_and_forgets_turn() {
        let registry = TimerRegistry::new();
        let turn = TurnId::new();
        let armed = registry.register(turn, SessionId::new());

        assert!(registry.is_armed(&turn));
        assert!(registry.cancel(&turn));
        assert!(armed.token.is_cancelled());
        assert!(!registry.is_armed(&turn));
        assert!(!registry.cancel(&turn));
    }

    #[test]
    fn cancel_session_only_touches_its_turns() {
        let registry = TimerRegistry::new();
        let session_a = SessionId::new();
        let session_b = SessionId::new();
        let a1 = registry.register(TurnId::new(), session_a);
        let a2 = registry.register(TurnId::new(), session_a);
        let b1 = registry.register(TurnId::new(), session_b);

        assert_eq!(registry.cancel_session(&session_a), 2);
        assert!(a1.token.is_cancelled());
        assert!(a2.token.is_cancelled());
        assert!(!b1.token.is_cancelled());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn rearming_cancels_previous_token() {
        let registry = TimerRegistry::new();
        let turn = TurnId::new();
        let session = SessionId::new();
        let first = registry.register(turn, session);
        let second = registry.register(turn, session);

        assert!(first.token.is_cancelled());
        assert!(!second.token.is_cancelled());

        // A stale task finishing must not drop the newer handle.
        registry.finish(&turn, first.generation);
        assert!(registry.is_armed(&turn));
        registry.finish(&turn, second.generation);
        assert!(registry.is_empty());
    }
}
