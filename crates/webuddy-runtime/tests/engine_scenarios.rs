//! End-to-end engine scenarios on a simulated page.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use webuddy_core::{
    Bounds, MemorySession, SessionStore, Viewport, WELCOME_SESSION_KEY, WebuddyConfig, XorShift64,
};
use webuddy_runtime::{
    Environment, Lifecycle, Listener, LogLevel, PageModel, PageSimulator, RecordingStage, StageOp,
    TeleportCue, TeleportPhase, WelcomePhase,
};

const VIEW: Viewport = Viewport::new(1200.0, 800.0, 0.0);

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

fn config(json: &str) -> WebuddyConfig {
    WebuddyConfig::from_json(json).unwrap()
}

fn started(json: &str) -> PageSimulator {
    let mut sim = PageSimulator::new(VIEW).with_seed(42);
    sim.init(&config(json)).unwrap();
    sim
}

fn spoken(sim: &PageSimulator) -> Vec<String> {
    sim.stage()
        .unwrap()
        .spoken()
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// Session that counts how often a flag is written.
#[derive(Clone, Default)]
struct CountingSession {
    inner: MemorySession,
    writes: Rc<Cell<usize>>,
}

impl SessionStore for CountingSession {
    fn flag(&self, key: &str) -> bool {
        self.inner.flag(key)
    }

    fn set_flag(&mut self, key: &str) {
        self.writes.set(self.writes.get() + 1);
        self.inner.set_flag(key);
    }
}

// ── Dialogue selection ─────────────────────────────────────────────────────

#[test]
fn page_bucket_precedes_default_bucket() {
    let mut sim = PageSimulator::new(VIEW).with_page_url("https://example.com/");
    sim.init(&config(
        r#"{"dialogue": {"example.com/": ["Hi!"], "default": ["Hello!"]}}"#,
    ))
    .unwrap();
    assert_eq!(sim.engine().unwrap().pool(), ["Hi!", "Hello!"]);
}

#[test]
fn other_pages_get_the_default_bucket() {
    let mut sim = PageSimulator::new(VIEW).with_page_url("https://example.com/pricing");
    sim.init(&config(
        r#"{"dialogue": {"example.com/": ["Hi!"], "default": ["Hello!"]}}"#,
    ))
    .unwrap();
    assert_eq!(sim.engine().unwrap().pool(), ["Hello!"]);
}

#[test]
fn preview_mode_pools_every_bucket() {
    let mut sim = PageSimulator::new(VIEW).with_page_url("https://elsewhere.dev/");
    sim.init(&config(
        r#"{"previewMode": true, "dialogue": {"a.com": ["A"], "default": ["D"], "b.com": ["B"]}}"#,
    ))
    .unwrap();
    assert_eq!(sim.engine().unwrap().pool(), ["A", "D", "B"]);
}

// ── Messages ───────────────────────────────────────────────────────────────

#[test]
fn first_line_after_intro_delay_then_cooldown_tail() {
    let mut sim = started(r#"{"dialogue": ["A", "B"]}"#);

    sim.advance_to(ms(999));
    assert!(spoken(&sim).is_empty());

    sim.advance_to(ms(1000));
    assert_eq!(spoken(&sim), vec!["A"]);
    assert_eq!(sim.stage().unwrap().bubble(), Some("A"));

    sim.advance_to(ms(3000));
    assert_eq!(sim.stage().unwrap().bubble(), None);
    assert!(sim.engine().unwrap().is_on_cooldown());

    sim.advance_to(ms(7999));
    assert!(sim.engine().unwrap().is_on_cooldown());
    sim.advance_to(ms(8000));
    assert!(!sim.engine().unwrap().is_on_cooldown());
}

#[test]
fn suppressed_display_changes_nothing() {
    let mut sim = started(r#"{"dialogue": ["A"]}"#);
    sim.advance_to(ms(1000));

    let engine = sim.engine_mut().unwrap();
    let before = engine.stage().ops().len();
    assert!(!engine.display("Ignored", false));
    assert_eq!(engine.stage().ops().len(), before);
    assert_eq!(engine.stage().bubble(), Some("A"));

    assert!(engine.display("Forced", true));
    assert_eq!(engine.stage().bubble(), Some("Forced"));
}

#[test]
fn idle_lines_keep_coming_at_the_configured_frequency() {
    let mut sim = started(r#"{"dialogue": ["A"], "frequency": 10}"#);
    sim.advance_to(secs(31));
    // Intro at 1s, idle at 10s, 20s, 30s.
    assert_eq!(spoken(&sim), vec!["A", "A", "A", "A"]);
}

#[test]
fn empty_pool_keeps_quiet_but_rearms() {
    let mut sim = started(r#"{"dialogue": [], "frequency": 5}"#);
    sim.advance_to(secs(30));
    assert!(spoken(&sim).is_empty());
    assert!(
        sim.engine()
            .unwrap()
            .timer_kinds()
            .contains(&webuddy_runtime::TimerKind::IdleMessage)
    );
}

// ── Welcome ────────────────────────────────────────────────────────────────

#[test]
fn welcome_lines_precede_idle_lines_and_flag_once() {
    let session = CountingSession::default();
    let writes = Rc::clone(&session.writes);
    let mut life = Lifecycle::new();
    let env = Environment::new("https://example.com/", session.clone(), XorShift64::new(9));
    life.init(
        &config(r#"{"welcome_messages": ["W1", "W2", "W3"], "dialogue": ["R"], "frequency": 1}"#),
        RecordingStage::new(VIEW),
        env,
    )
    .unwrap();

    life.advance_to(ms(1999));
    assert_eq!(life.active().unwrap().welcome_phase(), WelcomePhase::Waiting);
    life.advance_to(ms(10_000));
    assert_eq!(writes.get(), 1);
    life.advance_to(ms(14_000));
    assert_eq!(life.active().unwrap().welcome_phase(), WelcomePhase::Complete);
    life.advance_to(secs(40));

    let engine = life.active().unwrap();
    let lines = engine.stage().spoken();
    assert_eq!(&lines[..3], ["W1", "W2", "W3"]);
    assert!(lines[3..].iter().all(|line| *line == "R"));
    assert!(lines.len() > 3);
    assert_eq!(writes.get(), 1);
    assert!(session.flag(WELCOME_SESSION_KEY));
}

#[test]
fn welcome_is_skipped_for_the_rest_of_the_session() {
    let session = MemorySession::new();
    let json = r#"{"welcome_messages": ["W1"], "dialogue": ["R"]}"#;

    let mut first = PageSimulator::new(VIEW).with_session(session.clone());
    first.init(&config(json)).unwrap();
    first.advance_to(secs(10));
    assert!(session.flag(WELCOME_SESSION_KEY));

    let mut second = PageSimulator::new(VIEW).with_session(session);
    second.init(&config(json)).unwrap();
    assert_eq!(second.engine().unwrap().welcome_phase(), WelcomePhase::Skipped);
    second.advance_to(ms(1000));
    assert_eq!(spoken(&second), vec!["R"]);
}

#[test]
fn welcome_lines_override_the_cooldown() {
    let mut sim = started(r#"{"welcome_messages": ["one two three four five six seven eight nine ten eleven twelve", "next"], "dialogue": []}"#);
    // First line holds the bubble for 4.2s, the second arrives at 6s during
    // the cooldown tail.
    sim.advance_to(ms(6000));
    assert_eq!(spoken(&sim).last().map(String::as_str), Some("next"));
}

// ── Automations ────────────────────────────────────────────────────────────

fn hover_sim() -> PageSimulator {
    let page = PageModel::new(VIEW).with_selector("#cta", 2);
    let mut sim = PageSimulator::on_page(Rc::new(RefCell::new(page)));
    sim.init(&config(
        r##"{"dialogue": [], "automations": [
            {"triggerType": "element_hover", "message": "Click me", "config": {"selector": "#cta"}}
        ]}"##,
    ))
    .unwrap();
    sim
}

#[test]
fn hovers_ten_seconds_apart_speak_once() {
    let mut sim = hover_sim();
    sim.advance_to(secs(10));
    sim.hover("#cta");
    sim.advance_to(secs(20));
    sim.hover("#cta");
    assert_eq!(spoken(&sim), vec!["Click me"]);
}

#[test]
fn hovers_seventy_seconds_apart_speak_twice() {
    let mut sim = hover_sim();
    sim.advance_to(secs(10));
    sim.hover("#cta");
    sim.advance_to(secs(80));
    sim.hover("#cta");
    assert_eq!(spoken(&sim), vec!["Click me", "Click me"]);
}

#[test]
fn hover_listener_is_registered_once_per_selector() {
    let sim = hover_sim();
    let listeners = sim.stage().unwrap().listeners().to_vec();
    assert_eq!(
        listeners,
        vec![Listener::Hover("#cta".into()), Listener::Scroll]
    );
}

#[test]
fn unmatched_selector_warns_only_in_preview() {
    let json = |preview: bool| {
        format!(
            r#"{{"previewMode": {preview}, "automations": [
                {{"triggerType": "element_hover", "message": "x", "config": {{"selector": ".nope"}}}}
            ]}}"#
        )
    };

    let mut live = PageSimulator::new(VIEW);
    live.init(&config(&json(false))).unwrap();
    assert!(live.page().borrow().console.is_empty());

    let mut preview = PageSimulator::new(VIEW);
    preview.init(&config(&json(true))).unwrap();
    assert_eq!(
        preview.page().borrow().console,
        vec![(
            LogLevel::Warn,
            "Automation Warning: CSS Selector \".nope\" did not find any elements.".to_string()
        )]
    );
}

#[test]
fn time_on_page_uses_normal_cooldown() {
    let mut sim = started(
        r#"{"dialogue": ["Intro"], "automations": [
            {"triggerType": "time_on_page", "message": "Early", "config": {"seconds": 2}},
            {"triggerType": "time_on_page", "message": "Later", "config": {"seconds": 9}}
        ]}"#,
    );
    sim.advance_to(secs(10));
    // "Early" lands inside the intro line's cooldown and is dropped.
    assert_eq!(spoken(&sim), vec!["Intro", "Later"]);
}

#[test]
fn inactivity_restarts_on_input_and_fires_once() {
    let mut sim = started(
        r#"{"dialogue": [], "automations": [
            {"triggerType": "inactivity", "message": "Still there?", "config": {"seconds": 5}}
        ]}"#,
    );
    sim.advance_to(secs(3));
    sim.pointer_move();
    sim.advance_to(secs(6));
    sim.key();
    sim.advance_to(ms(10_999));
    assert!(spoken(&sim).is_empty());

    sim.advance_to(secs(11));
    assert_eq!(spoken(&sim), vec!["Still there?"]);
    assert!(!sim.stage().unwrap().listeners().contains(&Listener::Activity));

    sim.pointer_move();
    sim.advance_to(secs(120));
    assert_eq!(spoken(&sim), vec!["Still there?"]);
}

// ── Teleport ───────────────────────────────────────────────────────────────

fn teleport_cues(sim: &PageSimulator) -> Vec<StageOp> {
    sim.stage()
        .unwrap()
        .ops()
        .iter()
        .filter(|op| matches!(op, StageOp::Teleport(_)))
        .cloned()
        .collect()
}

#[test]
fn scrolled_out_sprite_teleports_exactly_once() {
    let mut sim = started(r#"{"dialogue": []}"#);
    sim.advance_to(ms(100));
    sim.scroll_to(5000.0);
    assert_eq!(sim.engine().unwrap().teleport_phase(), TeleportPhase::Vanishing);
    assert!(!sim.engine().unwrap().is_walking());

    sim.advance_to(ms(200));
    sim.scroll_to(5010.0);
    sim.advance_to(ms(1000));

    let engine = sim.engine().unwrap();
    assert_eq!(engine.teleports(), 1);
    assert!(engine.is_walking());

    let cues = teleport_cues(&sim);
    assert_eq!(cues.len(), 4);
    assert_eq!(cues[0], StageOp::Teleport(TeleportCue::Vanish));
    assert_eq!(cues[3], StageOp::Teleport(TeleportCue::Settle));

    let bounds = Bounds::buffered(VIEW.scrolled_to(5010.0), 50.0);
    let StageOp::Teleport(TeleportCue::Relocate(target)) = &cues[1] else {
        panic!("expected relocate, got {:?}", cues[1]);
    };
    assert!(bounds.contains(*target));
    assert!(bounds.contains(engine.position()));
}

#[test]
fn movement_is_frozen_while_teleporting() {
    let mut sim = started(r#"{"dialogue": []}"#);
    sim.scroll_to(5000.0);
    sim.advance_to(ms(849));

    let ops = sim.stage().unwrap().ops();
    let vanish = ops
        .iter()
        .position(|op| *op == StageOp::Teleport(TeleportCue::Vanish))
        .unwrap();
    assert!(
        ops[vanish..]
            .iter()
            .all(|op| !matches!(op, StageOp::Place(_)))
    );
}

#[test]
fn visible_sprite_does_not_teleport_but_postpones_idle() {
    let mut sim = started(r#"{"dialogue": ["A"], "frequency": 20}"#);
    sim.advance_to(secs(15));
    sim.scroll_to(10.0);
    sim.advance_to(secs(25));
    assert!(teleport_cues(&sim).is_empty());
    // Only the intro so far; the idle line moved from 20s to 35s.
    assert_eq!(spoken(&sim), vec!["A"]);
    sim.advance_to(secs(35));
    assert_eq!(spoken(&sim), vec!["A", "A"]);
}

#[test]
fn preview_mode_ignores_scrolling() {
    let mut sim = started(r#"{"previewMode": true}"#);
    assert!(!sim.stage().unwrap().listeners().contains(&Listener::Scroll));
    sim.scroll_to(5000.0);
    sim.advance_to(secs(2));
    assert!(teleport_cues(&sim).is_empty());
}

// ── Teardown ───────────────────────────────────────────────────────────────

#[test]
fn destroy_mid_teleport_freezes_everything() {
    let mut sim = started(r#"{"dialogue": ["A"]}"#);
    sim.scroll_to(5000.0);
    sim.advance_to(ms(420));
    assert_eq!(sim.engine().unwrap().teleport_phase(), TeleportPhase::Relocated);

    let engine = sim.engine_mut().unwrap();
    engine.destroy();
    let position = engine.position();
    let ops = engine.stage().ops().len();
    assert_eq!(engine.pending_timers(), 0);

    sim.advance_to(secs(120));
    sim.scroll_to(0.0);
    sim.hover("#cta");

    let engine = sim.engine().unwrap();
    assert_eq!(engine.position(), position);
    assert_eq!(engine.stage().ops().len(), ops);
    assert_eq!(sim.page().borrow().sprites, 0);
    assert!(sim.page().borrow().listeners.is_empty());
}

#[test]
fn double_init_leaves_one_sprite_and_one_timer_set() {
    let json = r#"{"automations": [
        {"triggerType": "inactivity", "message": "x", "config": {"seconds": 5}}
    ]}"#;

    let mut fresh = PageSimulator::new(VIEW);
    fresh.init(&config(json)).unwrap();
    let expected_timers = fresh.engine().unwrap().pending_timers();

    let mut sim = PageSimulator::new(VIEW);
    sim.init(&config(json)).unwrap();
    sim.advance_to(ms(500));
    sim.init(&config(json)).unwrap();

    let page = sim.page();
    assert_eq!(page.borrow().sprites, 1);
    assert_eq!(page.borrow().stylesheets, 1);
    assert_eq!(
        page.borrow().listeners,
        sim.stage().unwrap().listeners().to_vec()
    );
    assert_eq!(sim.engine().unwrap().pending_timers(), expected_timers);
}

#[test]
fn teardown_cancels_every_timer_kind() {
    let mut sim = started(
        r#"{"welcome_messages": ["W"], "automations": [
            {"triggerType": "time_on_page", "message": "t", "config": {"seconds": 30}},
            {"triggerType": "inactivity", "message": "i", "config": {"seconds": 60}}
        ]}"#,
    );
    sim.advance_to(ms(2500));
    sim.scroll_to(9000.0);
    assert!(sim.engine().unwrap().pending_timers() > 4);

    sim.engine_mut().unwrap().destroy();
    assert_eq!(sim.engine().unwrap().pending_timers(), 0);
    assert!(!sim.stage().unwrap().is_mounted());
}
