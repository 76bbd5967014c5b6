//! Typed notifications published by the opponent engine.
//!
//! Subscribers register through [`Subscribers::subscribe`] and receive every
//! [`OpponentEvent`] in emission order. A subscriber that returns an error is
//! logged and removed; errors are never silently dropped.

use serde::{Deserialize, Serialize};
use shared::MoveIntent;

/// Stage of a simulated key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyPhase {
    /// The direction chosen by a decision, before any press is simulated.
    Decided,
    Press,
    Release,
    /// Brief press in the opposite direction after the main release.
    CorrectionPress,
    CorrectionRelease,
    /// Repeat of the main press shortly after release.
    DoubleTap,
    DoubleTapRelease,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OpponentEvent {
    Move { phase: KeyPhase, intent: MoveIntent },
    ActivationChanged { active: bool },
    DifficultyChanged { from: String, to: String },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ObserverError {
    #[error("subscriber channel closed")]
    Closed,
}

/// Receives opponent events.
pub trait OpponentObserver: Send {
    fn on_event(&mut self, event: &OpponentEvent) -> Result<(), ObserverError>;
}

impl<F> OpponentObserver for F
where
    F: FnMut(&OpponentEvent) -> Result<(), ObserverError> + Send,
{
    fn on_event(&mut self, event: &OpponentEvent) -> Result<(), ObserverError> {
        self(event)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Default)]
pub struct Subscribers {
    entries: Vec<(SubscriptionId, Box<dyn OpponentObserver>)>,
    next_id: u64,
}

impl Subscribers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, observer: Box<dyn OpponentObserver>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, observer));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry_id, _)| *entry_id != id);
        self.entries.len() != before
    }

    /// Delivers `event` to every subscriber, dropping the ones that fail.
    pub fn publish(&mut self, event: &OpponentEvent) {
        self.entries.retain_mut(|(id, observer)| match observer.on_event(event) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Dropping opponent subscriber {:?}: {}", id, e);
                false
            }
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
