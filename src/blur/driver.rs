//! Frame delivery for [`BlurScheduler`].
//!
//! Two drivers: [`ManualFrameQueue`] for hosts that pump frames themselves
//! (and for tests), and a tokio event loop where frames are timers and every
//! input arrives over one [`BlurEvents`] channel, so the scheduler is only
//! ever touched by the loop task.
//!
//! Pending frame timers hold the channel weakly. The loop stops once it is
//! told to shut down, its [`FrameLoop`] handle is dropped, or every
//! [`BlurEvents`] sender is gone.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};

use super::{BlurEvent, BlurScheduler, FrameScheduler, FrameToken};
use crate::bus::Subscription;
use crate::keys;
use crate::store::KeyChangeSignal;

/// Messages handled by the frame loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameLoopMessage {
    /// Input for the scheduler.
    Event(BlurEvent),
    /// Stop the loop.
    Shutdown,
}

/// Sender half of a scheduler's event channel.
#[derive(Debug, Clone)]
pub struct BlurEvents {
    tx: mpsc::UnboundedSender<FrameLoopMessage>,
}

impl BlurEvents {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<FrameLoopMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queue `event`. Returns false once the loop has stopped.
    pub fn send(&self, event: BlurEvent) -> bool {
        self.tx.send(FrameLoopMessage::Event(event)).is_ok()
    }

    fn shutdown(&self) -> bool {
        self.tx.send(FrameLoopMessage::Shutdown).is_ok()
    }

    /// Forward changes of the blur preference key as
    /// [`BlurEvent::PreferenceChanged`].
    pub fn follow_preferences(&self, signal: &KeyChangeSignal) -> Subscription {
        let events = self.clone();
        signal.subscribe(move |key: &String| {
            if key == keys::BLUR_EFFECT_ENABLED {
                events.send(BlurEvent::PreferenceChanged);
            }
        })
    }
}

/// Frames posted into a queue and delivered by the caller.
#[derive(Debug, Clone, Default)]
pub struct ManualFrameQueue {
    pending: Arc<Mutex<VecDeque<(Duration, FrameToken)>>>,
}

impl ManualFrameQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.queue().len()
    }

    /// Delay requested by the most recently posted frame.
    pub fn last_delay(&self) -> Option<Duration> {
        self.queue().back().map(|(delay, _)| *delay)
    }

    /// Deliver the frames posted so far. Frames they post in turn stay queued
    /// for the next call. Returns how many were delivered.
    pub fn run_pending(&self, scheduler: &mut BlurScheduler) -> usize {
        let due: Vec<FrameToken> = self.queue().drain(..).map(|(_, token)| token).collect();
        for token in &due {
            scheduler.handle(BlurEvent::Frame(*token));
        }
        due.len()
    }

    fn queue(&self) -> std::sync::MutexGuard<'_, VecDeque<(Duration, FrameToken)>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl FrameScheduler for ManualFrameQueue {
    fn post_frame(&self, delay: Duration, token: FrameToken) {
        self.queue().push_back((delay, token));
    }
}

/// Frames as tokio timers that report back over the event channel.
///
/// Holds the channel weakly, so a scheduler owning it does not keep its own
/// loop alive. Must be used from within a tokio runtime.
#[derive(Debug, Clone)]
pub struct TokioFrames {
    tx: mpsc::WeakUnboundedSender<FrameLoopMessage>,
}

impl TokioFrames {
    pub fn new(events: &BlurEvents) -> Self {
        Self {
            tx: events.tx.downgrade(),
        }
    }
}

impl FrameScheduler for TokioFrames {
    fn post_frame(&self, delay: Duration, token: FrameToken) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // The loop may have stopped meanwhile
            if let Some(tx) = tx.upgrade() {
                let _ = tx.send(FrameLoopMessage::Event(BlurEvent::Frame(token)));
            }
        });
    }
}

/// A running scheduler task. Dropping the handle stops the loop.
pub struct FrameLoop {
    events: BlurEvents,
    task: JoinHandle<BlurScheduler>,
}

impl FrameLoop {
    /// Run `scheduler` on a tokio task, handling messages from `rx` until
    /// [`FrameLoopMessage::Shutdown`] or until every sender is gone.
    pub fn spawn(
        mut scheduler: BlurScheduler,
        events: BlurEvents,
        mut rx: mpsc::UnboundedReceiver<FrameLoopMessage>,
    ) -> Self {
        let task = tokio::spawn(async move {
            tracing::debug!("blur loop started");
            while let Some(message) = rx.recv().await {
                match message {
                    FrameLoopMessage::Event(event) => scheduler.handle(event),
                    FrameLoopMessage::Shutdown => break,
                }
            }
            tracing::debug!(passes = scheduler.passes(), "blur loop stopped");
            scheduler
        });
        Self { events, task }
    }

    pub fn events(&self) -> &BlurEvents {
        &self.events
    }

    /// Stop the loop and hand the scheduler back.
    pub async fn shutdown(mut self) -> Result<BlurScheduler, JoinError> {
        self.events.shutdown();
        (&mut self.task).await
    }
}

impl Drop for FrameLoop {
    fn drop(&mut self) {
        // Other senders may outlive the handle
        self.events.shutdown();
    }
}
