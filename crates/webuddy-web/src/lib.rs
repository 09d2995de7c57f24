#![forbid(unsafe_code)]

//! Browser host for Webuddy.
//!
//! Exposes `initWebuddy(config)` and `autoInit()` to JavaScript, renders the
//! sprite with plain DOM elements, and pumps the engine's timers from a
//! `setInterval` tick. On load the module starts itself from
//! `window.webuddyConfig` (or the older `window.spacemanConfig`) when the page
//! defines one.

pub mod attach;
pub mod style;

#[cfg(target_arch = "wasm32")]
mod dom;
#[cfg(target_arch = "wasm32")]
mod wasm;

#[cfg(target_arch = "wasm32")]
pub use dom::{DomStage, EventSink, PageEvent};
#[cfg(target_arch = "wasm32")]
pub use wasm::{WebuddyHandle, auto_init, init_webuddy};

/// Native builds compile this crate as a stub so `cargo check --workspace` stays
/// green on non-wasm targets.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Default)]
pub struct WebuddyHandle;

#[cfg(not(target_arch = "wasm32"))]
impl WebuddyHandle {
    /// Nothing is ever attached natively.
    pub fn destroy(&self) -> bool {
        false
    }

    pub fn is_active(&self) -> bool {
        false
    }
}
