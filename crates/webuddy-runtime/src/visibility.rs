#![forbid(unsafe_code)]

//! Scroll-out detection and the teleport sequence.
//!
//! ```text
//!  Idle ──begin──▶ Vanishing ──400ms──▶ Relocated ──50ms──▶ Reappearing ──400ms──▶ Idle
//! ```
//!
//! While a teleport is in flight, scroll checks never start another one.

use std::time::Duration;

use webuddy_core::Viewport;

use crate::engine::TimerKind;
use crate::timer::{TimerId, TimerQueue};

/// Fade-out before the sprite moves.
pub const VANISH: Duration = Duration::from_millis(400);
/// Pause between moving and the portal opening.
pub const SETTLE: Duration = Duration::from_millis(50);
/// Portal animation before the walk resumes.
pub const REAPPEAR: Duration = Duration::from_millis(400);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TeleportPhase {
    #[default]
    Idle,
    Vanishing,
    Relocated,
    Reappearing,
}

/// What the engine should do after a teleport timer fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeleportStep {
    /// Pick a target and move the hidden sprite there.
    Relocate,
    /// Show the portal.
    Reappear,
    /// Clear the portal and resume walking.
    Finish,
    Ignored,
}

#[derive(Debug, Clone, Default)]
pub struct VisibilityMonitor {
    phase: TeleportPhase,
    timer: Option<TimerId>,
    completed: u64,
}

impl VisibilityMonitor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn phase(&self) -> TeleportPhase {
        self.phase
    }

    #[must_use]
    pub fn is_teleporting(&self) -> bool {
        self.phase != TeleportPhase::Idle
    }

    /// Teleports that ran to completion.
    #[must_use]
    pub fn completed(&self) -> u64 {
        self.completed
    }

    /// Whether a scroll check should start a teleport.
    #[must_use]
    pub fn should_teleport(&self, viewport: Viewport, top: f64, sprite_height: f64) -> bool {
        !self.is_teleporting() && viewport.hides(top, sprite_height)
    }

    /// Enter `Vanishing`. Returns `false` if a teleport is already running.
    pub fn begin(&mut self, timers: &mut TimerQueue<TimerKind>, now: Duration) -> bool {
        if self.is_teleporting() {
            return false;
        }
        self.phase = TeleportPhase::Vanishing;
        self.timer = Some(timers.once(now, VANISH, TimerKind::Teleport));
        true
    }

    /// Teleport timer fired.
    pub fn advance(&mut self, timers: &mut TimerQueue<TimerKind>, now: Duration) -> TeleportStep {
        self.timer = None;
        let (next, delay, step) = match self.phase {
            TeleportPhase::Idle => return TeleportStep::Ignored,
            TeleportPhase::Vanishing => (TeleportPhase::Relocated, Some(SETTLE), TeleportStep::Relocate),
            TeleportPhase::Relocated => {
                (TeleportPhase::Reappearing, Some(REAPPEAR), TeleportStep::Reappear)
            }
            TeleportPhase::Reappearing => (TeleportPhase::Idle, None, TeleportStep::Finish),
        };
        self.phase = next;
        if let Some(delay) = delay {
            self.timer = Some(timers.once(now, delay, TimerKind::Teleport));
        } else {
            self.completed += 1;
        }
        step
    }
}
