#![forbid(unsafe_code)]

//! Speech bubble scheduling with a global cooldown.
//!
//! A display holds the bubble for [`display_duration`], hides it, then keeps
//! the cooldown on for a further tail before other lines may speak. Override
//! displays (welcome lines and the intro line) bypass the cooldown and cancel
//! any pending hide or release so the new line gets its full time on screen.

use std::time::Duration;

use crate::engine::TimerKind;
use crate::stage::Stage;
use crate::timer::{TimerId, TimerQueue};

/// Shortest time a line stays visible.
pub const MIN_VISIBLE: Duration = Duration::from_millis(2000);
/// Reading time granted per word.
pub const PER_WORD: Duration = Duration::from_millis(350);

/// How long `text` stays in the bubble.
///
/// Words are counted by splitting on single spaces, so runs of spaces count
/// as extra words.
#[must_use]
pub fn display_duration(text: &str) -> Duration {
    let words = u32::try_from(text.split(' ').count()).unwrap_or(u32::MAX);
    MIN_VISIBLE.max(PER_WORD.saturating_mul(words))
}

/// Bubble and cooldown state plus the idle-line timer slot.
#[derive(Debug, Clone, Default)]
pub struct MessageScheduler {
    on_cooldown: bool,
    hide: Option<TimerId>,
    release: Option<TimerId>,
    idle: Option<TimerId>,
}

impl MessageScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_on_cooldown(&self) -> bool {
        self.on_cooldown
    }

    /// Whether the bubble is scheduled to hide.
    #[must_use]
    pub fn is_showing(&self) -> bool {
        self.hide.is_some()
    }

    #[must_use]
    pub fn idle_armed(&self) -> bool {
        self.idle.is_some()
    }

    /// Show `text`. Returns `false` when suppressed by the cooldown.
    pub fn display<S: Stage>(
        &mut self,
        text: &str,
        overrides: bool,
        timers: &mut TimerQueue<TimerKind>,
        stage: &mut S,
        now: Duration,
    ) -> bool {
        if self.on_cooldown && !overrides {
            tracing::trace!(text, "line suppressed by cooldown");
            return false;
        }
        timers.cancel_slot(&mut self.hide);
        timers.cancel_slot(&mut self.release);

        self.on_cooldown = true;
        stage.show_bubble(text);
        self.hide = Some(timers.once(now, display_duration(text), TimerKind::BubbleHide));
        true
    }

    /// Hide timer fired: drop the bubble and start the cooldown tail.
    pub fn hide<S: Stage>(
        &mut self,
        timers: &mut TimerQueue<TimerKind>,
        stage: &mut S,
        now: Duration,
        cooldown: Duration,
    ) {
        self.hide = None;
        stage.hide_bubble();
        timers.cancel_slot(&mut self.release);
        self.release = Some(timers.once(now, cooldown, TimerKind::CooldownRelease));
    }

    /// Cooldown tail elapsed.
    pub fn release(&mut self) {
        self.release = None;
        self.on_cooldown = false;
    }

    /// (Re)arm the idle-line timer.
    pub fn arm_idle(&mut self, timers: &mut TimerQueue<TimerKind>, now: Duration, interval: Duration) {
        timers.cancel_slot(&mut self.idle);
        self.idle = Some(timers.once(now, interval, TimerKind::IdleMessage));
    }

    /// Restart the idle countdown if it is armed.
    pub fn postpone_idle(
        &mut self,
        timers: &mut TimerQueue<TimerKind>,
        now: Duration,
        interval: Duration,
    ) {
        if self.idle.is_some() {
            self.arm_idle(timers, now, interval);
        }
    }

    /// Idle timer fired.
    pub fn idle_fired(&mut self) {
        self.idle = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::RecordingStage;
    use pretty_assertions::assert_eq;
    use webuddy_core::Viewport;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn fixture() -> (MessageScheduler, TimerQueue<TimerKind>, RecordingStage) {
        (
            MessageScheduler::new(),
            TimerQueue::new(),
            RecordingStage::new(Viewport::new(1000.0, 800.0, 0.0)),
        )
    }

    #[test]
    fn short_lines_get_the_minimum() {
        assert_eq!(display_duration("Hi"), ms(2000));
        assert_eq!(display_duration("one two three four five"), ms(2000));
        assert_eq!(display_duration(""), ms(2000));
    }

    #[test]
    fn long_lines_scale_per_word() {
        assert_eq!(display_duration("a b c d e f"), ms(2100));
        assert_eq!(display_duration(&["w"; 10].join(" ")), ms(3500));
    }

    #[test]
    fn cooldown_suppresses_non_override() {
        let (mut msgs, mut timers, mut stage) = fixture();
        assert!(msgs.display("first", false, &mut timers, &mut stage, ms(0)));
        assert!(!msgs.display("second", false, &mut timers, &mut stage, ms(100)));
        assert_eq!(stage.spoken(), vec!["first"]);
        assert!(msgs.is_on_cooldown());
    }

    #[test]
    fn override_replaces_line_and_resets_hide() {
        let (mut msgs, mut timers, mut stage) = fixture();
        msgs.display("first", false, &mut timers, &mut stage, ms(0));
        assert!(msgs.display("second", true, &mut timers, &mut stage, ms(1500)));
        assert_eq!(timers.len(), 1);
        assert_eq!(timers.next_deadline(), Some(ms(3500)));
        assert_eq!(stage.bubble(), Some("second"));
    }

    #[test]
    fn override_during_tail_cancels_release() {
        let (mut msgs, mut timers, mut stage) = fixture();
        msgs.display("first", false, &mut timers, &mut stage, ms(0));
        msgs.hide(&mut timers, &mut stage, ms(2000), ms(5000));
        assert!(msgs.is_on_cooldown());

        msgs.display("urgent", true, &mut timers, &mut stage, ms(3000));
        let kinds: Vec<_> = timers.kinds().collect();
        assert_eq!(kinds, vec![TimerKind::BubbleHide]);
    }

    #[test]
    fn release_reopens_the_bubble() {
        let (mut msgs, mut timers, mut stage) = fixture();
        msgs.display("first", false, &mut timers, &mut stage, ms(0));
        msgs.hide(&mut timers, &mut stage, ms(2000), ms(5000));
        msgs.release();
        assert!(!msgs.is_on_cooldown());
        assert!(msgs.display("again", false, &mut timers, &mut stage, ms(7000)));
    }

    #[test]
    fn postpone_only_touches_an_armed_idle_timer() {
        let (mut msgs, mut timers, _) = fixture();
        msgs.postpone_idle(&mut timers, ms(0), ms(20_000));
        assert!(timers.is_empty());

        msgs.arm_idle(&mut timers, ms(0), ms(20_000));
        msgs.postpone_idle(&mut timers, ms(5000), ms(20_000));
        assert_eq!(timers.len(), 1);
        assert_eq!(timers.next_deadline(), Some(ms(25_000)));
    }
}
