#![forbid(unsafe_code)]

//! First-visit welcome sequence.
//!
//! ```text
//!  Inactive ──begin──▶ Waiting ──step──▶ Stepping ──step (queue empty)──▶ Complete
//!     │                                    ▲   │
//!     │                                    └───┘ step (line shown)
//!     └──begin (flag set or no lines)──▶ Skipped
//! ```
//!
//! The session flag is written exactly once, as soon as the queue drains,
//! whether the last line was consumed by a step or borrowed by the idle
//! timer.

use std::collections::VecDeque;
use std::time::Duration;

use webuddy_core::{SessionStore, WELCOME_SESSION_KEY};

use crate::engine::TimerKind;
use crate::timer::{TimerId, TimerQueue};

/// Delay before the first welcome line.
pub const WELCOME_INITIAL_DELAY: Duration = Duration::from_millis(2000);
/// Spacing between welcome lines.
pub const WELCOME_INTERVAL: Duration = Duration::from_millis(4000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WelcomePhase {
    Inactive,
    /// First step scheduled.
    Waiting,
    /// At least one line shown.
    Stepping,
    Complete,
    /// Already welcomed this session, or nothing to say.
    Skipped,
}

/// Result of a welcome step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WelcomeStep {
    /// Display this line and wait for the next step.
    Show(String),
    /// The sequence just finished; idle chatter takes over.
    Finished,
    /// Step arrived outside an active sequence.
    Ignored,
}

#[derive(Debug, Clone)]
pub struct WelcomeSequence {
    phase: WelcomePhase,
    queue: VecDeque<String>,
    step: Option<TimerId>,
    marked: bool,
}

impl Default for WelcomeSequence {
    fn default() -> Self {
        Self {
            phase: WelcomePhase::Inactive,
            queue: VecDeque::new(),
            step: None,
            marked: false,
        }
    }
}

impl WelcomeSequence {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn phase(&self) -> WelcomePhase {
        self.phase
    }

    /// Lines not yet shown.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.queue.len()
    }

    /// Whether the sequence is still running.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self.phase, WelcomePhase::Waiting | WelcomePhase::Stepping)
    }

    /// Start the sequence unless this session was already welcomed. Returns
    /// whether a first step was scheduled.
    pub fn begin(
        &mut self,
        messages: &[String],
        session: &dyn SessionStore,
        timers: &mut TimerQueue<TimerKind>,
        now: Duration,
    ) -> bool {
        if self.phase != WelcomePhase::Inactive {
            return false;
        }
        if messages.is_empty() || session.flag(WELCOME_SESSION_KEY) {
            tracing::debug!(lines = messages.len(), "welcome skipped");
            self.phase = WelcomePhase::Skipped;
            return false;
        }
        self.queue = messages.iter().cloned().collect();
        self.phase = WelcomePhase::Waiting;
        self.step = Some(timers.once(now, WELCOME_INITIAL_DELAY, TimerKind::WelcomeStep));
        true
    }

    /// Step timer fired.
    pub fn step(
        &mut self,
        session: &mut dyn SessionStore,
        timers: &mut TimerQueue<TimerKind>,
        now: Duration,
    ) -> WelcomeStep {
        if !self.is_pending() {
            return WelcomeStep::Ignored;
        }
        self.step = None;
        match self.take_next(session) {
            Some(line) => {
                self.phase = WelcomePhase::Stepping;
                self.step = Some(timers.once(now, WELCOME_INTERVAL, TimerKind::WelcomeStep));
                WelcomeStep::Show(line)
            }
            None => {
                self.mark(session);
                self.phase = WelcomePhase::Complete;
                tracing::debug!("welcome complete");
                WelcomeStep::Finished
            }
        }
    }

    /// Pop the next line, marking the session once the queue empties.
    fn take_next(&mut self, session: &mut dyn SessionStore) -> Option<String> {
        if !self.is_pending() {
            return None;
        }
        let line = self.queue.pop_front()?;
        if self.queue.is_empty() {
            self.mark(session);
        }
        Some(line)
    }

    fn mark(&mut self, session: &mut dyn SessionStore) {
        if !self.marked {
            session.set_flag(WELCOME_SESSION_KEY);
            self.marked = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use webuddy_core::MemorySession;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    /// Session that counts writes.
    #[derive(Default)]
    struct CountingSession {
        set: bool,
        writes: usize,
    }

    impl SessionStore for CountingSession {
        fn flag(&self, _key: &str) -> bool {
            self.set
        }
        fn set_flag(&mut self, _key: &str) {
            self.set = true;
            self.writes += 1;
        }
    }

    #[test]
    fn walks_every_line_then_finishes() {
        let mut timers = TimerQueue::new();
        let mut session = MemorySession::new();
        let mut welcome = WelcomeSequence::new();

        assert!(welcome.begin(&lines(&["Hi", "There"]), &session, &mut timers, ms(0)));
        assert_eq!(welcome.phase(), WelcomePhase::Waiting);
        assert_eq!(timers.next_deadline(), Some(ms(2000)));

        let fired = timers.pop_due(ms(2000)).unwrap();
        assert_eq!(fired.kind, TimerKind::WelcomeStep);
        assert_eq!(welcome.step(&mut session, &mut timers, ms(2000)), WelcomeStep::Show("Hi".into()));
        assert_eq!(timers.next_deadline(), Some(ms(6000)));

        timers.pop_due(ms(6000)).unwrap();
        assert_eq!(
            welcome.step(&mut session, &mut timers, ms(6000)),
            WelcomeStep::Show("There".into())
        );
        assert!(session.flag(WELCOME_SESSION_KEY));
        assert!(welcome.is_pending());

        timers.pop_due(ms(10_000)).unwrap();
        assert_eq!(welcome.step(&mut session, &mut timers, ms(10_000)), WelcomeStep::Finished);
        assert_eq!(welcome.phase(), WelcomePhase::Complete);
        assert!(timers.is_empty());
    }

    #[test]
    fn skipped_when_session_already_welcomed() {
        let mut timers = TimerQueue::new();
        let mut session = MemorySession::new();
        session.set_flag(WELCOME_SESSION_KEY);
        let mut welcome = WelcomeSequence::new();
        assert!(!welcome.begin(&lines(&["Hi"]), &session, &mut timers, ms(0)));
        assert_eq!(welcome.phase(), WelcomePhase::Skipped);
        assert!(timers.is_empty());
    }

    #[test]
    fn skipped_without_lines() {
        let mut timers = TimerQueue::new();
        let session = MemorySession::new();
        let mut welcome = WelcomeSequence::new();
        assert!(!welcome.begin(&[], &session, &mut timers, ms(0)));
        assert!(!welcome.is_pending());
    }

    #[test]
    fn flag_written_once_when_idle_drains_the_queue() {
        let mut timers = TimerQueue::new();
        let mut session = CountingSession::default();
        let mut welcome = WelcomeSequence::new();
        welcome.begin(&lines(&["a", "b"]), &session, &mut timers, ms(0));

        assert_eq!(welcome.take_next(&mut session), Some("a".into()));
        assert_eq!(session.writes, 0);
        assert_eq!(welcome.take_next(&mut session), Some("b".into()));
        assert_eq!(session.writes, 1);

        timers.pop_due(ms(2000)).unwrap();
        assert_eq!(welcome.step(&mut session, &mut timers, ms(2000)), WelcomeStep::Finished);
        assert_eq!(session.writes, 1);
    }

    #[test]
    fn steps_outside_the_sequence_are_ignored() {
        let mut timers = TimerQueue::new();
        let mut session = MemorySession::new();
        let mut welcome = WelcomeSequence::new();
        assert_eq!(welcome.step(&mut session, &mut timers, ms(0)), WelcomeStep::Ignored);
        assert_eq!(welcome.take_next(&mut session), None);
    }
}
