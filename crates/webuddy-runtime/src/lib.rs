#![forbid(unsafe_code)]

//! Webuddy Runtime
//!
//! The timer-driven behavior engine behind the on-page character: idle
//! walking, the speech bubble and its cooldown, the first-visit welcome,
//! automation triggers, and teleporting back into view after a scroll.
//!
//! # Key Components
//!
//! - [`Webuddy`] - one running instance; owns all state and its timers
//! - [`Lifecycle`] - at-most-one-instance guard hosts keep per page
//! - [`Stage`] - the host seam every visual mutation goes through
//! - [`TimerQueue`] - deterministic deadline queue the engine drains
//! - [`PageSimulator`] - virtual clock + [`RecordingStage`] for tests
//!
//! # How it fits in the system
//! `webuddy-core` supplies settings and the pure pieces (geometry, dialogue
//! selection, randomness). This crate wires them to time. Hosts (the WASM
//! crate in the browser, the harness on the command line) implement
//! [`Stage`], feed in the clock and page events, and never touch engine
//! state directly.

pub mod automation;
pub mod engine;
pub mod lifecycle;
pub mod message;
pub mod movement;
pub mod simulator;
pub mod stage;
pub mod timer;
pub mod visibility;
pub mod welcome;

pub use engine::{INTRO_DELAY, TimerKind, Webuddy};
pub use lifecycle::{Environment, InstanceId, Lifecycle};
pub use message::display_duration;
pub use simulator::PageSimulator;
pub use stage::{
    Listener, LogLevel, PageModel, RecordingStage, Stage, StageError, StageOp, TeleportCue,
};
pub use timer::{TimerId, TimerQueue};
pub use visibility::TeleportPhase;
pub use welcome::WelcomePhase;
