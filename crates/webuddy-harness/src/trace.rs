#![forbid(unsafe_code)]

//! JSONL trace lines.
//!
//! One line per recorded stage operation or replayed input, stamped with the
//! virtual time it happened at:
//!
//! ```json
//! {"at_ms":1000,"op":{"kind":"show_bubble","text":"Hello!"}}
//! {"at_ms":4000,"input":{"type":"scroll","scroll_y":2400.0}}
//! ```

use serde::Serialize;
use webuddy_core::Look;
use webuddy_runtime::{Listener, LogLevel, StageOp, TeleportCue};

use crate::scenario::Event;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceLine {
    pub at_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<Event>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub op: Option<TraceOp>,
}

impl TraceLine {
    pub fn input(at_ms: u64, event: Event) -> Self {
        Self {
            at_ms,
            input: Some(event),
            op: None,
        }
    }

    pub fn op(at_ms: u64, op: TraceOp) -> Self {
        Self {
            at_ms,
            input: None,
            op: Some(op),
        }
    }
}

/// Flat, serializable form of a [`StageOp`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TraceOp {
    Mount,
    Unmount,
    Place {
        top: f64,
        left_percent: f64,
    },
    Paint {
        #[serde(skip_serializing_if = "Option::is_none")]
        image: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        color: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        glow: Option<String>,
    },
    ShowBubble {
        text: String,
    },
    HideBubble,
    Teleport {
        cue: &'static str,
        #[serde(skip_serializing_if = "Option::is_none")]
        top: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        left_percent: Option<f64>,
    },
    Listen {
        listener: String,
    },
    Unlisten {
        listener: String,
    },
    UnlistenAll,
    Log {
        level: &'static str,
        message: String,
    },
}

impl TraceOp {
    pub fn log(level: LogLevel, message: &str) -> Self {
        TraceOp::Log {
            level: match level {
                LogLevel::Warn => "warn",
                LogLevel::Error => "error",
            },
            message: message.to_string(),
        }
    }
}

impl From<&StageOp> for TraceOp {
    fn from(op: &StageOp) -> Self {
        match op {
            StageOp::Mount => TraceOp::Mount,
            StageOp::Unmount => TraceOp::Unmount,
            StageOp::Place(position) => TraceOp::Place {
                top: position.top,
                left_percent: position.left_percent,
            },
            StageOp::Paint(Look::Image { url }) => TraceOp::Paint {
                image: Some(url.clone()),
                color: None,
                glow: None,
            },
            StageOp::Paint(Look::Orb { color, glow }) => TraceOp::Paint {
                image: None,
                color: Some(color.clone()),
                glow: Some(glow.clone()),
            },
            StageOp::ShowBubble(text) => TraceOp::ShowBubble { text: text.clone() },
            StageOp::HideBubble => TraceOp::HideBubble,
            StageOp::Teleport(cue) => {
                let (name, at) = match cue {
                    TeleportCue::Vanish => ("vanish", None),
                    TeleportCue::Relocate(position) => ("relocate", Some(*position)),
                    TeleportCue::Reappear => ("reappear", None),
                    TeleportCue::Settle => ("settle", None),
                };
                TraceOp::Teleport {
                    cue: name,
                    top: at.map(|p| p.top),
                    left_percent: at.map(|p| p.left_percent),
                }
            }
            StageOp::Listen(listener) => TraceOp::Listen {
                listener: listener_name(listener),
            },
            StageOp::Unlisten(listener) => TraceOp::Unlisten {
                listener: listener_name(listener),
            },
            StageOp::UnlistenAll => TraceOp::UnlistenAll,
            StageOp::Log(level, message) => TraceOp::log(*level, message),
        }
    }
}

fn listener_name(listener: &Listener) -> String {
    match listener {
        Listener::Scroll => "scroll".into(),
        Listener::Activity => "activity".into(),
        Listener::Hover(selector) => format!("hover:{selector}"),
    }
}
