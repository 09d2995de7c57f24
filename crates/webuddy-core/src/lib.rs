#![forbid(unsafe_code)]

//! Core: settings, dialogue selection, geometry, and the small host-agnostic
//! pieces the Webuddy behavior engine is built from.
//!
//! Nothing in this crate owns a timer or touches a page. The runtime crate
//! drives these types from its timer queue; hosts (the WASM crate, the
//! harness) supply viewport measurements, randomness, and session storage.

pub mod config;
pub mod dialogue;
pub mod geometry;
pub mod look;
pub mod rng;
pub mod session;

pub use config::{
    Automation, AutomationSpec, ConfigError, DialogueSource, PageBuckets, Settings,
    SpeechBubbleConfig, Theme, Timing, TriggerConfig, TriggerKind, WebuddyConfig,
};
pub use dialogue::{DEFAULT_BUCKET, FALLBACK_LINE, dialogue_for_page, normalize_url};
pub use geometry::{Bounds, Direction, Position, Viewport};
pub use look::{CharacterMap, Frame, Look};
pub use rng::{RandomSource, ScriptedRandom, XorShift64};
pub use session::{MemorySession, SessionStore, WELCOME_SESSION_KEY};
