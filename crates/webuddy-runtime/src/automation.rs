#![forbid(unsafe_code)]

//! Trigger-based lines: time on page, element hover, inactivity.

use std::collections::HashMap;
use std::time::Duration;

use webuddy_core::Automation;

use crate::engine::TimerKind;
use crate::stage::{Listener, LogLevel, Stage};
use crate::timer::{TimerId, TimerQueue};

/// Minimum spacing between two hover lines for the same selector.
pub const HOVER_COOLDOWN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq)]
struct HoverRule {
    selector: String,
    message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum InactivityState {
    Off,
    Armed {
        message: String,
        delay: Duration,
        timer: TimerId,
    },
    Fired,
}

/// Installed automations and their trigger state.
#[derive(Debug, Clone)]
pub struct AutomationEngine {
    hover: Vec<HoverRule>,
    last_hover: HashMap<String, Duration>,
    inactivity: InactivityState,
}

impl Default for AutomationEngine {
    fn default() -> Self {
        Self {
            hover: Vec::new(),
            last_hover: HashMap::new(),
            inactivity: InactivityState::Off,
        }
    }
}

impl AutomationEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Selectors with a live hover listener.
    pub fn hover_selectors(&self) -> impl Iterator<Item = &str> {
        let mut seen: Vec<&str> = Vec::new();
        for rule in &self.hover {
            if !seen.contains(&rule.selector.as_str()) {
                seen.push(&rule.selector);
            }
        }
        seen.into_iter()
    }

    #[must_use]
    pub fn inactivity_armed(&self) -> bool {
        matches!(self.inactivity, InactivityState::Armed { .. })
    }

    /// Schedule timers and register listeners for every automation.
    ///
    /// Time-on-page timers carry the automation's index. Hover selectors that
    /// fail to parse or match nothing are skipped and, in preview mode,
    /// reported to the page console. Only the first inactivity automation is
    /// honoured.
    pub fn install<S: Stage>(
        &mut self,
        automations: &[Automation],
        preview: bool,
        timers: &mut TimerQueue<TimerKind>,
        stage: &mut S,
        now: Duration,
    ) {
        for (index, automation) in automations.iter().enumerate() {
            match automation {
                Automation::TimeOnPage { delay, .. } => {
                    timers.once(now, *delay, TimerKind::TimeOnPage(index));
                }
                Automation::ElementHover { message, selector } => {
                    self.install_hover(selector, message, preview, stage);
                }
                Automation::Inactivity { message, delay } => {
                    if self.inactivity != InactivityState::Off {
                        tracing::debug!(index, "ignoring extra inactivity automation");
                        continue;
                    }
                    stage.listen(Listener::Activity);
                    self.inactivity = InactivityState::Armed {
                        message: message.clone(),
                        delay: *delay,
                        timer: timers.once(now, *delay, TimerKind::Inactivity),
                    };
                }
            }
        }
    }

    fn install_hover<S: Stage>(&mut self, selector: &str, message: &str, preview: bool, stage: &mut S) {
        match stage.match_selector(selector) {
            Err(err) => {
                tracing::warn!(selector, %err, "hover automation skipped");
                if preview {
                    stage.write_log(
                        LogLevel::Error,
                        &format!("Automation Error: Invalid CSS Selector \"{selector}\""),
                    );
                }
            }
            Ok(0) => {
                tracing::warn!(selector, "hover selector matched nothing");
                if preview {
                    stage.write_log(
                        LogLevel::Warn,
                        &format!("Automation Warning: CSS Selector \"{selector}\" did not find any elements."),
                    );
                }
            }
            Ok(count) => {
                if !self.hover.iter().any(|rule| rule.selector == selector) {
                    stage.listen(Listener::Hover(selector.to_string()));
                }
                tracing::debug!(selector, count, "hover automation installed");
                self.hover.push(HoverRule {
                    selector: selector.to_string(),
                    message: message.to_string(),
                });
            }
        }
    }

    /// Pointer entered an element matching `selector`.
    ///
    /// Returns the line to show when the per-selector cooldown allows it. The
    /// cooldown is stamped even if the caller's display is later suppressed.
    pub fn hover(&mut self, selector: &str, now: Duration) -> Option<String> {
        let rule = self.hover.iter().find(|rule| rule.selector == selector)?;
        if let Some(last) = self.last_hover.get(selector)
            && now.saturating_sub(*last) <= HOVER_COOLDOWN
        {
            tracing::trace!(selector, "hover within cooldown");
            return None;
        }
        self.last_hover.insert(selector.to_string(), now);
        Some(rule.message.clone())
    }

    /// Pointer, scroll, or key input: restart the inactivity countdown.
    pub fn activity(&mut self, timers: &mut TimerQueue<TimerKind>, now: Duration) {
        if let InactivityState::Armed { delay, timer, .. } = &mut self.inactivity {
            timers.cancel(*timer);
            *timer = timers.once(now, *delay, TimerKind::Inactivity);
        }
    }

    /// Inactivity timer fired. Returns the line once; the listener is removed.
    pub fn inactivity_fired<S: Stage>(&mut self, stage: &mut S) -> Option<String> {
        match std::mem::replace(&mut self.inactivity, InactivityState::Fired) {
            InactivityState::Armed { message, .. } => {
                stage.unlisten(&Listener::Activity);
                Some(message)
            }
            other => {
                self.inactivity = other;
                None
            }
        }
    }
}
