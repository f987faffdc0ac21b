//! Plate blur scheduling.
//!
//! A plate shows either a periodically recomputed blur of the wallpaper or,
//! when blurring is not possible or not wanted, a flat fill of the plate
//! color. [`BlurScheduler`] decides which, driven by discrete [`BlurEvent`]s:
//!
//! ```text
//!              attach / resume / preference on
//! Disabled ──────────────────────────────────▶ ArmedWaitingAttach
//!    ▲                                               │ attached and resumed
//!    │ detach / pause / preference off /             ▼
//!    └─────────── permission lost ─────────────── Scheduled ◀─┐
//!                                                     │       │ frame: blur,
//!                                                     └───────┘ post next
//! ```
//!
//! The frame chain is self-rescheduling: each frame posts its successor. It is
//! cancelled by not posting one. A frame already posted when the scheduler
//! leaves `Scheduled` still arrives; it finds the scheduler no longer
//! scheduled (or carries a stale generation) and ends the chain without
//! blurring.

mod driver;

pub use driver::{BlurEvents, FrameLoop, FrameLoopMessage, ManualFrameQueue, TokioFrames};

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::appearance::AppearancePreferences;
use crate::config::{PlateColor, PlateConfig};

/// Delay between blur passes: one frame at 120 Hz.
pub const FRAME_INTERVAL: Duration = Duration::from_millis(1000 / 120);

/// Scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlurState {
    /// Showing the flat fill; no frames are posted.
    Disabled,
    /// Blur is wanted and allowed, waiting for the view to be attached and
    /// resumed.
    ArmedWaitingAttach,
    /// A frame is posted; each frame blurs and posts the next.
    Scheduled,
}

/// Identifies the frame chain a posted frame belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameToken {
    generation: u64,
}

/// Inputs to the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlurEvent {
    /// The plate view was attached to a window.
    Attached,
    /// The plate view was detached.
    Detached,
    /// The hosting screen was paused.
    Paused,
    /// The hosting screen was resumed.
    Resumed,
    /// The blur preference changed.
    PreferenceChanged,
    /// Wallpaper access was granted or revoked.
    PermissionChanged,
    /// A posted frame is due.
    Frame(FrameToken),
}

/// A blur pass failed. The pass is skipped; the chain continues.
#[derive(Debug, Error)]
#[error("Blur pass failed: {0}")]
pub struct BlurError(pub String);

/// The backdrop a plate draws.
pub trait BlurSurface: Send {
    /// Recompute the blurred wallpaper with `radius` into the surface.
    fn blur(&mut self, radius: u32) -> Result<(), BlurError>;

    /// Tint applied over the blurred image.
    fn set_color_filter(&mut self, color: PlateColor);

    /// Drop any blurred image and show a flat `color`.
    fn fill(&mut self, color: PlateColor);

    /// Clip the plate to a rounded outline, or draw it square.
    fn set_rounded_corners(&mut self, rounded: bool);
}

/// Posts a frame back to the scheduler after a delay.
pub trait FrameScheduler: Send {
    fn post_frame(&self, delay: Duration, token: FrameToken);
}

/// How a plate looks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlateStyle {
    pub color: PlateColor,
    pub blur_amount: u32,
    pub rounded_corners: bool,
}

impl PlateStyle {
    pub fn from_config(config: &PlateConfig) -> Self {
        Self {
            color: config.plate_color(),
            blur_amount: config.blur_amount,
            rounded_corners: config.rounded_corners,
        }
    }
}

/// Lifecycle- and preference-gated blur loop for one plate.
pub struct BlurScheduler {
    appearance: Arc<AppearancePreferences>,
    surface: Box<dyn BlurSurface>,
    frames: Box<dyn FrameScheduler>,
    style: PlateStyle,
    state: BlurState,
    attached: bool,
    resumed: bool,
    generation: u64,
    passes: u64,
}

impl BlurScheduler {
    /// Create a detached scheduler. The surface gets the plate outline and
    /// starts on the flat fill.
    pub fn new(
        appearance: Arc<AppearancePreferences>,
        style: PlateStyle,
        mut surface: Box<dyn BlurSurface>,
        frames: Box<dyn FrameScheduler>,
    ) -> Self {
        surface.set_rounded_corners(style.rounded_corners);
        surface.fill(style.color);
        Self {
            appearance,
            surface,
            frames,
            style,
            state: BlurState::Disabled,
            attached: false,
            resumed: true,
            generation: 0,
            passes: 0,
        }
    }

    pub fn state(&self) -> BlurState {
        self.state
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn style(&self) -> PlateStyle {
        self.style
    }

    /// Blur passes attempted so far.
    pub fn passes(&self) -> u64 {
        self.passes
    }

    pub fn handle(&mut self, event: BlurEvent) {
        tracing::trace!(?event, state = ?self.state, "blur event");
        match event {
            BlurEvent::Attached => {
                self.attached = true;
                self.toggle_blur_effect();
            }
            BlurEvent::Detached => {
                self.attached = false;
                self.turn_off_blur();
            }
            BlurEvent::Paused => {
                self.resumed = false;
                self.turn_off_blur();
            }
            BlurEvent::Resumed => {
                self.resumed = true;
                self.toggle_blur_effect();
            }
            BlurEvent::PreferenceChanged | BlurEvent::PermissionChanged => {
                self.toggle_blur_effect();
            }
            BlurEvent::Frame(token) => self.on_frame(token),
        }
    }

    /// Change the plate's background alpha. While not blurring, the flat fill
    /// is redrawn right away.
    pub fn set_background_alpha(&mut self, alpha: u8) {
        self.style.color = self.style.color.with_alpha(alpha);
        if self.state == BlurState::Scheduled {
            self.surface.set_color_filter(self.style.color);
        } else {
            self.surface.fill(self.style.color);
        }
    }

    /// Re-evaluate whether to blur. Without wallpaper access the stored
    /// preference is corrected to disabled.
    fn toggle_blur_effect(&mut self) {
        if !self.appearance.has_wallpaper_access() {
            self.turn_off_blur();
            match self.appearance.force_blur_disabled() {
                Ok(true) => tracing::info!("wallpaper access missing, blur preference reset"),
                Ok(false) => {}
                Err(e) => tracing::warn!(error = %e, "failed to reset blur preference"),
            }
            return;
        }

        if self.appearance.should_blur() {
            self.arm();
        } else {
            self.turn_off_blur();
        }
    }

    fn arm(&mut self) {
        if self.state == BlurState::Scheduled {
            return;
        }
        self.transition(BlurState::ArmedWaitingAttach);
        if self.attached && self.resumed {
            self.start_blur();
        }
    }

    fn start_blur(&mut self) {
        self.generation += 1;
        self.surface.set_color_filter(self.style.color);
        self.transition(BlurState::Scheduled);
        self.post_next_frame();
    }

    fn turn_off_blur(&mut self) {
        self.transition(BlurState::Disabled);
        self.surface.fill(self.style.color);
    }

    fn on_frame(&mut self, token: FrameToken) {
        if self.state != BlurState::Scheduled || token.generation != self.generation {
            tracing::trace!(generation = token.generation, "frame chain ended");
            return;
        }

        self.passes += 1;
        if let Err(e) = self.surface.blur(self.style.blur_amount) {
            tracing::warn!(error = %e, "blur pass failed, retrying next frame");
        }
        self.post_next_frame();
    }

    fn post_next_frame(&self) {
        self.frames.post_frame(
            FRAME_INTERVAL,
            FrameToken {
                generation: self.generation,
            },
        );
    }

    fn transition(&mut self, next: BlurState) {
        if self.state != next {
            tracing::debug!(from = ?self.state, to = ?next, "blur state");
            self.state = next;
        }
    }
}
