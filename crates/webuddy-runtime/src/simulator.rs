#![forbid(unsafe_code)]

//! Deterministic page simulator for testing.
//!
//! `PageSimulator` runs the engine on a [`RecordingStage`] with a virtual
//! clock, a seeded random source, and an in-memory session, so scenarios can
//! be replayed exactly.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use webuddy_core::{Viewport, WebuddyConfig};
//! use webuddy_runtime::simulator::PageSimulator;
//!
//! let mut sim = PageSimulator::new(Viewport::new(1200.0, 800.0, 0.0));
//! sim.init(&WebuddyConfig::from_json(r#"{"dialogue": ["A", "B"]}"#).unwrap());
//! sim.advance(Duration::from_millis(1000));
//! assert_eq!(sim.stage().unwrap().spoken(), vec!["A"]);
//! ```

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use webuddy_core::{MemorySession, RandomSource, Viewport, WebuddyConfig, XorShift64};

use crate::engine::Webuddy;
use crate::lifecycle::{Environment, InstanceId, Lifecycle};
use crate::stage::{PageModel, RecordingStage};

/// Default page location for simulated instances.
pub const DEFAULT_PAGE_URL: &str = "https://example.com/";

/// A virtual page with at most one running instance.
pub struct PageSimulator {
    lifecycle: Lifecycle<RecordingStage>,
    page: Rc<RefCell<PageModel>>,
    session: MemorySession,
    clock: Duration,
    seed: u64,
    page_url: String,
}

impl PageSimulator {
    /// A fresh page with the given viewport.
    #[must_use]
    pub fn new(viewport: Viewport) -> Self {
        Self::on_page(Rc::new(RefCell::new(PageModel::new(viewport))))
    }

    /// Simulate on an existing page model.
    #[must_use]
    pub fn on_page(page: Rc<RefCell<PageModel>>) -> Self {
        Self {
            lifecycle: Lifecycle::new(),
            page,
            session: MemorySession::new(),
            clock: Duration::ZERO,
            seed: 0,
            page_url: DEFAULT_PAGE_URL.to_string(),
        }
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    #[must_use]
    pub fn with_page_url(mut self, url: impl Into<String>) -> Self {
        self.page_url = url.into();
        self
    }

    /// Share a session with another simulator (same tab, new page load).
    #[must_use]
    pub fn with_session(mut self, session: MemorySession) -> Self {
        self.session = session;
        self
    }

    /// Start an instance seeded from the simulator seed.
    pub fn init(&mut self, config: &WebuddyConfig) -> Option<InstanceId> {
        let rng = XorShift64::new(self.seed);
        self.init_with_rng(config, rng)
    }

    /// Start an instance with a specific random source.
    pub fn init_with_rng(
        &mut self,
        config: &WebuddyConfig,
        rng: impl RandomSource + 'static,
    ) -> Option<InstanceId> {
        let stage = RecordingStage::on_page(Rc::clone(&self.page));
        let env = Environment::new(self.page_url.clone(), self.session.clone(), rng).at(self.clock);
        self.lifecycle.init(config, stage, env)
    }

    /// Move the clock forward by `dt`, firing due timers.
    pub fn advance(&mut self, dt: Duration) {
        self.advance_to(self.clock.saturating_add(dt));
    }

    /// Move the clock to `t` (never backwards).
    pub fn advance_to(&mut self, t: Duration) {
        self.clock = self.clock.max(t);
        self.lifecycle.advance_to(self.clock);
    }

    /// Scroll the page and deliver the scroll event.
    pub fn scroll_to(&mut self, scroll_y: f64) {
        {
            let mut page = self.page.borrow_mut();
            page.viewport = page.viewport.scrolled_to(scroll_y);
        }
        self.lifecycle.on_scroll(self.clock);
    }

    /// Resize the viewport. No event is delivered; bounds are read lazily.
    pub fn resize(&mut self, width: f64, height: f64) {
        let mut page = self.page.borrow_mut();
        page.viewport.width = width;
        page.viewport.height = height;
    }

    pub fn pointer_move(&mut self) {
        self.lifecycle.on_pointer_move(self.clock);
    }

    pub fn key(&mut self) {
        self.lifecycle.on_key(self.clock);
    }

    pub fn hover(&mut self, selector: &str) {
        self.lifecycle.on_hover(selector, self.clock);
    }

    /// Tear down the running instance, dropping it.
    pub fn destroy(&mut self) {
        self.lifecycle.destroy_active();
    }

    #[must_use]
    pub fn now(&self) -> Duration {
        self.clock
    }

    #[must_use]
    pub fn page(&self) -> Rc<RefCell<PageModel>> {
        Rc::clone(&self.page)
    }

    #[must_use]
    pub fn session(&self) -> &MemorySession {
        &self.session
    }

    #[must_use]
    pub fn lifecycle(&self) -> &Lifecycle<RecordingStage> {
        &self.lifecycle
    }

    #[must_use]
    pub fn engine(&self) -> Option<&Webuddy<RecordingStage>> {
        self.lifecycle.active()
    }

    pub fn engine_mut(&mut self) -> Option<&mut Webuddy<RecordingStage>> {
        self.lifecycle.active_mut()
    }

    /// Stage of the running instance.
    #[must_use]
    pub fn stage(&self) -> Option<&RecordingStage> {
        self.engine().map(Webuddy::stage)
    }
}
