#![forbid(unsafe_code)]

//! The behavior engine.
//!
//! [`Webuddy`] owns every piece of runtime state and one [`TimerQueue`]. The
//! host reports time and page events; the engine answers by mutating its
//! [`Stage`]. Nothing runs between calls, so a call to
//! [`destroy`](Webuddy::destroy) is final: the queue is emptied before it
//! returns and every later call is a no-op.
//!
//! # Timer ownership
//!
//! | Kind | Owner | Shape |
//! |------|-------|-------|
//! | `MoveStep`, `DirectionChange`, `AnimationFrame` | [`Movement`] | periodic while walking |
//! | `BubbleHide`, `CooldownRelease`, `IdleMessage` | [`MessageScheduler`] | one-shot |
//! | `WelcomeStep` | [`WelcomeSequence`] | one-shot chain |
//! | `TimeOnPage`, `Inactivity` | [`AutomationEngine`] | one-shot |
//! | `Teleport` | [`VisibilityMonitor`] | one-shot chain |
//! | `IntroLine` | engine | one-shot |

use std::time::Duration;

use webuddy_core::{
    Bounds, Direction, Frame, Position, RandomSource, SessionStore, Settings, dialogue_for_page,
};

use crate::automation::AutomationEngine;
use crate::lifecycle::Environment;
use crate::message::MessageScheduler;
use crate::movement::Movement;
use crate::stage::{Listener, LogLevel, Stage, StageError, TeleportCue};
use crate::timer::TimerQueue;
use crate::visibility::{TeleportPhase, TeleportStep, VisibilityMonitor};
use crate::welcome::{WelcomePhase, WelcomeSequence, WelcomeStep};

/// Delay before the first dialogue line when no welcome is pending.
pub const INTRO_DELAY: Duration = Duration::from_millis(1000);

/// What a due timer means to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    MoveStep,
    DirectionChange,
    AnimationFrame,
    BubbleHide,
    CooldownRelease,
    IdleMessage,
    WelcomeStep,
    IntroLine,
    /// Index into the settings' automation list.
    TimeOnPage(usize),
    Inactivity,
    Teleport,
}

/// One running page character.
pub struct Webuddy<S: Stage> {
    settings: Settings,
    stage: S,
    timers: TimerQueue<TimerKind>,
    rng: Box<dyn RandomSource>,
    session: Box<dyn SessionStore>,
    now: Duration,
    pool: Vec<String>,
    movement: Movement,
    messages: MessageScheduler,
    welcome: WelcomeSequence,
    automations: AutomationEngine,
    visibility: VisibilityMonitor,
    destroyed: bool,
}

impl<S: Stage> std::fmt::Debug for Webuddy<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Webuddy")
            .field("now", &self.now)
            .field("position", &self.movement.position())
            .field("direction", &self.movement.direction())
            .field("teleport", &self.visibility.phase())
            .field("welcome", &self.welcome.phase())
            .field("timers", &self.timers.len())
            .field("destroyed", &self.destroyed)
            .finish()
    }
}

impl<S: Stage> Webuddy<S> {
    /// Attach to `stage` and start every behavior.
    ///
    /// Fails only when the stage cannot be mounted; nothing is scheduled in
    /// that case.
    pub(crate) fn start(settings: Settings, mut stage: S, env: Environment) -> Result<Self, StageError> {
        if let Err(err) = stage.mount(&settings.theme) {
            tracing::error!(%err, "webuddy cannot be initialized");
            stage.write_log(
                LogLevel::Error,
                "Webuddy cannot be initialized because the target element is not found.",
            );
            return Err(err);
        }

        let start = Position::centered(stage.viewport());
        stage.place(start);
        let pool = dialogue_for_page(&settings.dialogue, &env.page_url, settings.preview_mode);

        let mut engine = Self {
            settings,
            stage,
            timers: TimerQueue::new(),
            rng: env.rng,
            session: env.session,
            now: env.now,
            pool,
            movement: Movement::new(start),
            messages: MessageScheduler::new(),
            welcome: WelcomeSequence::new(),
            automations: AutomationEngine::new(),
            visibility: VisibilityMonitor::new(),
            destroyed: false,
        };
        engine.boot();
        Ok(engine)
    }

    fn boot(&mut self) {
        let now = self.now;
        let welcoming = self.welcome.begin(
            &self.settings.welcome_messages,
            self.session.as_ref(),
            &mut self.timers,
            now,
        );
        if !welcoming {
            self.arm_idle();
        }

        self.automations.install(
            &self.settings.automations,
            self.settings.preview_mode,
            &mut self.timers,
            &mut self.stage,
            now,
        );

        self.start_walk();

        if !self.settings.preview_mode {
            self.stage.listen(Listener::Scroll);
        }

        if !welcoming && !self.pool.is_empty() {
            self.timers.once(now, INTRO_DELAY, TimerKind::IntroLine);
        }

        tracing::debug!(
            pool = self.pool.len(),
            welcome = ?self.welcome.phase(),
            automations = self.settings.automations.len(),
            preview = self.settings.preview_mode,
            "webuddy started"
        );
    }

    // ─────────────────────────────────────────────────────────────────────
    // Host events
    // ─────────────────────────────────────────────────────────────────────

    /// Run every timer due at or before `now`, in deadline order.
    pub fn advance_to(&mut self, now: Duration) {
        if self.destroyed {
            return;
        }
        while let Some(fired) = self.timers.pop_due(now) {
            self.now = self.now.max(fired.at);
            tracing::trace!(kind = ?fired.kind, at = ?fired.at, "timer");
            self.fire(fired.kind);
            if self.destroyed {
                return;
            }
        }
        self.now = self.now.max(now);
    }

    /// Treat a host stall as paused time.
    ///
    /// When more than `limit` passed since the engine last saw the clock
    /// (a throttled background tab, a blocked main thread), every pending
    /// timer is pushed back by the whole gap so nothing missed fires in a
    /// burst. Returns the skipped time.
    pub fn skip_stall(&mut self, now: Duration, limit: Duration) -> Option<Duration> {
        if self.destroyed {
            return None;
        }
        let gap = now.checked_sub(self.now)?;
        if gap <= limit {
            return None;
        }
        self.timers.postpone_all(gap);
        self.now = now;
        tracing::debug!(?gap, "host stalled, timers postponed");
        Some(gap)
    }

    /// The page scrolled.
    pub fn on_scroll(&mut self, now: Duration) {
        self.advance_to(now);
        if self.destroyed {
            return;
        }
        self.note_activity();
        if self.settings.preview_mode || self.visibility.is_teleporting() {
            return;
        }

        self.messages
            .postpone_idle(&mut self.timers, self.now, self.settings.timing.idle_message_interval);

        let viewport = self.stage.viewport();
        let sprite_height = self.stage.sprite_height();
        if self
            .visibility
            .should_teleport(viewport, self.movement.position().top, sprite_height)
        {
            self.begin_teleport();
        }
    }

    /// The pointer moved anywhere on the page.
    pub fn on_pointer_move(&mut self, now: Duration) {
        self.advance_to(now);
        if !self.destroyed {
            self.note_activity();
        }
    }

    /// A key was pressed.
    pub fn on_key(&mut self, now: Duration) {
        self.on_pointer_move(now);
    }

    /// The pointer entered an element matching `selector`.
    pub fn on_hover(&mut self, selector: &str, now: Duration) {
        self.advance_to(now);
        if self.destroyed {
            return;
        }
        if let Some(line) = self.automations.hover(selector, self.now) {
            self.display(&line, false);
        }
    }

    /// Show `text` in the bubble. Returns `false` when the cooldown
    /// suppressed it or the instance is gone.
    pub fn display(&mut self, text: &str, overrides_cooldown: bool) -> bool {
        if self.destroyed {
            return false;
        }
        self.messages.display(
            text,
            overrides_cooldown,
            &mut self.timers,
            &mut self.stage,
            self.now,
        )
    }

    /// Cancel every timer, drop every listener, and detach from the page.
    ///
    /// Idempotent; safe on a partially started instance.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        let cancelled = self.timers.len();
        self.timers.clear();
        self.stage.unlisten_all();
        self.stage.unmount();
        tracing::debug!(cancelled, now = ?self.now, "webuddy destroyed");
    }

    // ─────────────────────────────────────────────────────────────────────
    // Inspection
    // ─────────────────────────────────────────────────────────────────────

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    #[must_use]
    pub fn stage(&self) -> &S {
        &self.stage
    }

    pub fn stage_mut(&mut self) -> &mut S {
        &mut self.stage
    }

    #[must_use]
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Lines the idle timer picks from on this page.
    #[must_use]
    pub fn pool(&self) -> &[String] {
        &self.pool
    }

    #[must_use]
    pub fn position(&self) -> Position {
        self.movement.position()
    }

    #[must_use]
    pub fn direction(&self) -> Direction {
        self.movement.direction()
    }

    #[must_use]
    pub fn frame(&self) -> Frame {
        self.movement.frame()
    }

    #[must_use]
    pub fn is_walking(&self) -> bool {
        self.movement.is_walking()
    }

    #[must_use]
    pub fn teleport_phase(&self) -> TeleportPhase {
        self.visibility.phase()
    }

    #[must_use]
    pub fn is_teleporting(&self) -> bool {
        self.visibility.is_teleporting()
    }

    /// Teleports that ran to completion.
    #[must_use]
    pub fn teleports(&self) -> u64 {
        self.visibility.completed()
    }

    #[must_use]
    pub fn is_on_cooldown(&self) -> bool {
        self.messages.is_on_cooldown()
    }

    #[must_use]
    pub fn welcome_phase(&self) -> WelcomePhase {
        self.welcome.phase()
    }

    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Number of live timers.
    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// Kinds of the live timers in firing order.
    #[must_use]
    pub fn timer_kinds(&self) -> Vec<TimerKind> {
        self.timers.kinds().collect()
    }

    #[must_use]
    pub fn next_deadline(&self) -> Option<Duration> {
        self.timers.next_deadline()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Timer dispatch
    // ─────────────────────────────────────────────────────────────────────

    fn fire(&mut self, kind: TimerKind) {
        let glow = self.settings.theme.portal_color.as_str();
        match kind {
            TimerKind::MoveStep => self.movement.step(&mut self.stage, self.settings.timing.idle_speed),
            TimerKind::DirectionChange => self.movement.turn(
                self.rng.as_mut(),
                &mut self.stage,
                &self.settings.character,
                glow,
            ),
            TimerKind::AnimationFrame => {
                self.movement
                    .animate(&mut self.stage, &self.settings.character, glow);
            }
            TimerKind::BubbleHide => self.messages.hide(
                &mut self.timers,
                &mut self.stage,
                self.now,
                self.settings.timing.message_cooldown,
            ),
            TimerKind::CooldownRelease => self.messages.release(),
            TimerKind::IdleMessage => self.idle_message(),
            TimerKind::WelcomeStep => {
                match self
                    .welcome
                    .step(self.session.as_mut(), &mut self.timers, self.now)
                {
                    WelcomeStep::Show(line) => {
                        self.display(&line, true);
                    }
                    WelcomeStep::Finished => self.arm_idle(),
                    WelcomeStep::Ignored => {}
                }
            }
            TimerKind::IntroLine => {
                if let Some(line) = self.pool.first().cloned() {
                    self.display(&line, true);
                }
            }
            TimerKind::TimeOnPage(index) => {
                if let Some(line) = self
                    .settings
                    .automations
                    .get(index)
                    .map(|a| a.message().to_string())
                {
                    self.display(&line, false);
                }
            }
            TimerKind::Inactivity => {
                if let Some(line) = self.automations.inactivity_fired(&mut self.stage) {
                    self.display(&line, false);
                }
            }
            TimerKind::Teleport => self.teleport_step(),
        }
    }

    /// The idle timer is only armed once no welcome line is queued, so it
    /// never competes with the welcome sequence.
    fn idle_message(&mut self) {
        self.messages.idle_fired();
        if !self.pool.is_empty() {
            let line = self.pool[self.rng.pick_index(self.pool.len())].clone();
            self.display(&line, false);
        }
        self.arm_idle();
    }

    fn arm_idle(&mut self) {
        self.messages
            .arm_idle(&mut self.timers, self.now, self.settings.timing.idle_message_interval);
    }

    fn note_activity(&mut self) {
        self.automations.activity(&mut self.timers, self.now);
    }

    fn start_walk(&mut self) {
        self.movement.start(
            &mut self.timers,
            &mut self.stage,
            &self.settings.character,
            &self.settings.theme.portal_color,
            &self.settings.timing,
            self.now,
        );
    }

    fn begin_teleport(&mut self) {
        if !self.visibility.begin(&mut self.timers, self.now) {
            return;
        }
        tracing::debug!(top = self.movement.position().top, "sprite out of view, teleporting");
        self.movement.stop(
            &mut self.timers,
            &mut self.stage,
            &self.settings.character,
            &self.settings.theme.portal_color,
        );
        self.stage.teleport(TeleportCue::Vanish);
    }

    fn teleport_step(&mut self) {
        match self.visibility.advance(&mut self.timers, self.now) {
            TeleportStep::Relocate => {
                let bounds = Bounds::buffered(self.stage.viewport(), self.stage.sprite_height());
                let target = bounds.sample(self.rng.as_mut());
                self.movement.relocate(target);
                self.stage.teleport(TeleportCue::Relocate(target));
            }
            TeleportStep::Reappear => self.stage.teleport(TeleportCue::Reappear),
            TeleportStep::Finish => {
                self.stage.teleport(TeleportCue::Settle);
                self.start_walk();
                tracing::debug!(position = ?self.movement.position(), "teleport finished");
            }
            TeleportStep::Ignored => {}
        }
    }
}

impl<S: Stage> Drop for Webuddy<S> {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::{RecordingStage, StageOp};
    use pretty_assertions::assert_eq;
    use webuddy_core::{MemorySession, Viewport, WebuddyConfig, XorShift64};

    const VIEW: Viewport = Viewport::new(1200.0, 800.0, 0.0);

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn engine(json: &str) -> Webuddy<RecordingStage> {
        let config = WebuddyConfig::from_json(json).unwrap();
        let env = Environment::new(
            "https://example.com/",
            MemorySession::new(),
            XorShift64::new(7),
        );
        Webuddy::start(Settings::from_config(&config), RecordingStage::new(VIEW), env).unwrap()
    }

    #[test]
    fn starts_centred_and_walking() {
        let bud = engine("{}");
        assert_eq!(bud.position(), Position::new(400.0, 50.0));
        assert_eq!(bud.direction(), Direction::Right);
        assert!(bud.is_walking());
        assert!(bud.stage().is_mounted());
        assert_eq!(bud.stage().ops()[0], StageOp::Mount);
        assert_eq!(bud.stage().ops()[1], StageOp::Place(Position::new(400.0, 50.0)));
    }

    #[test]
    fn intro_line_then_idle_line() {
        let mut bud = engine(r#"{"dialogue": ["A", "B"], "frequency": 20}"#);
        bud.advance_to(ms(999));
        assert!(bud.stage().spoken().is_empty());
        bud.advance_to(ms(1000));
        assert_eq!(bud.stage().spoken(), vec!["A"]);
        assert!(bud.is_on_cooldown());
        bud.advance_to(ms(7999));
        assert!(bud.is_on_cooldown());
        bud.advance_to(ms(8000));
        assert!(!bud.is_on_cooldown());
        bud.advance_to(ms(20_000));
        assert_eq!(bud.stage().spoken().len(), 2);
    }

    #[test]
    fn idle_timer_waits_for_the_welcome_sequence() {
        let mut bud = engine(
            r#"{"welcome_messages": ["W1", "W2"], "dialogue": ["A"], "frequency": 1}"#,
        );
        assert!(!bud.timer_kinds().contains(&TimerKind::IdleMessage));
        assert!(!bud.timer_kinds().contains(&TimerKind::IntroLine));

        bud.advance_to(ms(6000));
        assert_eq!(bud.stage().spoken(), vec!["W1", "W2"]);
        assert!(!bud.timer_kinds().contains(&TimerKind::IdleMessage));

        bud.advance_to(ms(10_000));
        assert_eq!(bud.welcome_phase(), WelcomePhase::Complete);
        assert!(bud.timer_kinds().contains(&TimerKind::IdleMessage));
        assert_eq!(bud.stage().spoken(), vec!["W1", "W2"]);
    }

    #[test]
    fn stalls_are_skipped_not_replayed() {
        let mut bud = engine(r#"{"welcome_messages": ["W1", "W2"]}"#);
        bud.advance_to(ms(2000));
        assert_eq!(bud.stage().spoken(), vec!["W1"]);
        let ops = bud.stage().ops().len();
        let position = bud.position();

        assert_eq!(bud.skip_stall(ms(2100), ms(250)), None);
        assert_eq!(bud.skip_stall(ms(62_000), ms(250)), Some(ms(60_000)));
        bud.advance_to(ms(62_000));
        assert_eq!(bud.stage().ops().len(), ops);
        assert_eq!(bud.position(), position);

        bud.advance_to(ms(66_000));
        assert_eq!(bud.stage().spoken(), vec!["W1", "W2"]);
    }

    #[test]
    fn destroy_is_final() {
        let mut bud = engine("{}");
        bud.advance_to(ms(500));
        bud.destroy();
        let ops = bud.stage().ops().len();
        assert_eq!(bud.pending_timers(), 0);
        bud.advance_to(ms(60_000));
        bud.on_scroll(ms(61_000));
        bud.on_hover("#x", ms(62_000));
        assert!(!bud.display("late", true));
        bud.destroy();
        assert_eq!(bud.stage().ops().len(), ops);
        assert!(!bud.stage().is_mounted());
    }

    #[test]
    fn missing_parent_aborts_start() {
        let stage = RecordingStage::new(VIEW);
        stage.page().borrow_mut().has_parent = false;
        let env = Environment::new("/", MemorySession::new(), XorShift64::new(1));
        let result = Webuddy::start(Settings::default(), stage, env);
        assert_eq!(result.err(), Some(StageError::MissingParent));
    }
}
