#![forbid(unsafe_code)]

//! Deterministic scenario replay for Webuddy.
//!
//! Scenarios are JSON documents run against the recording stage; the output
//! is a JSONL trace of every stage operation with its virtual timestamp, so
//! behaviour changes show up as plain text diffs.
//!
//! ```sh
//! RUST_LOG=webuddy_runtime=debug webuddy-harness scenarios/scroll_teleport.json
//! ```

pub mod scenario;
pub mod trace;

pub use scenario::{Event, PageSpec, Scenario, ScenarioError, Step, ViewportSpec, replay};
pub use trace::{TraceLine, TraceOp};
