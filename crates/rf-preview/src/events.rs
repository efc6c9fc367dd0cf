//! Typed engine → host notifications
//!
//! Subscribers get their own crossbeam receiver; `emit` fans out to every
//! live subscriber and forgets the ones whose receiver was dropped.

use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, unbounded};
use parking_lot::Mutex;

use crate::animation::AnimationEvent;
use crate::symbols::GridPosition;

/// Event delivered to the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewEvent {
    /// A grid reconfiguration finished fading in
    GridUpdated { reels: u8, rows: u8 },
    SpinStarted { spin_id: u64 },
    ReelStopped { index: usize },
    WinDetected { positions: Vec<GridPosition> },
    SpinCompleted { spin_id: u64 },
    /// Terminal: the host must fall back to a non-graphical view
    RenderUnavailable { reason: String },
}

impl PreviewEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::GridUpdated { .. } => "gridUpdated",
            Self::SpinStarted { .. } => "spinStarted",
            Self::ReelStopped { .. } => "reelStopped",
            Self::WinDetected { .. } => "winDetected",
            Self::SpinCompleted { .. } => "spinCompleted",
            Self::RenderUnavailable { .. } => "renderUnavailable",
        }
    }
}

impl From<AnimationEvent> for PreviewEvent {
    fn from(event: AnimationEvent) -> Self {
        match event {
            AnimationEvent::SpinStarted { spin_id } => Self::SpinStarted { spin_id },
            AnimationEvent::ReelStopped { index } => Self::ReelStopped { index },
            AnimationEvent::WinDetected { positions } => Self::WinDetected { positions },
            AnimationEvent::SpinCompleted { spin_id } => Self::SpinCompleted { spin_id },
        }
    }
}

/// Cloneable fan-out handle
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<Sender<PreviewEvent>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// New receiver that sees every event emitted from now on
    pub fn subscribe(&self) -> Receiver<PreviewEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    pub fn emit(&self, event: PreviewEvent) {
        log::trace!("event: {:?}", event);
        self.subscribers
            .lock()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
