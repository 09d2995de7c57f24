#![forbid(unsafe_code)]

//! One active instance per page.
//!
//! [`Lifecycle`] is the guard hosts keep next to their page: `init` tears down
//! whatever instance is running before the new one attaches, and hands back an
//! [`InstanceId`] that `destroy` checks, so a stale handle can never tear down
//! its replacement.

use std::time::Duration;

use webuddy_core::{RandomSource, SessionStore, Settings, WebuddyConfig};

use crate::engine::Webuddy;
use crate::stage::Stage;

/// Everything an instance needs from its host besides the stage.
pub struct Environment {
    /// Location of the page, used to pick the dialogue bucket.
    pub page_url: String,
    pub session: Box<dyn SessionStore>,
    pub rng: Box<dyn RandomSource>,
    /// Host clock at start.
    pub now: Duration,
}

impl Environment {
    pub fn new(
        page_url: impl Into<String>,
        session: impl SessionStore + 'static,
        rng: impl RandomSource + 'static,
    ) -> Self {
        Self {
            page_url: page_url.into(),
            session: Box::new(session),
            rng: Box::new(rng),
            now: Duration::ZERO,
        }
    }

    /// Start the instance at host time `now`.
    #[must_use]
    pub fn at(mut self, now: Duration) -> Self {
        self.now = now;
        self
    }
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("page_url", &self.page_url)
            .field("now", &self.now)
            .finish_non_exhaustive()
    }
}

/// Handle to the instance created by one `init` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceId(u64);

/// Owner of the single active instance.
pub struct Lifecycle<S: Stage> {
    active: Option<(InstanceId, Webuddy<S>)>,
    next_id: u64,
}

impl<S: Stage> Default for Lifecycle<S> {
    fn default() -> Self {
        Self {
            active: None,
            next_id: 1,
        }
    }
}

impl<S: Stage> Lifecycle<S> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace any running instance with one built from `config`.
    ///
    /// Returns `None` when the stage could not be mounted; the previous
    /// instance is gone either way.
    pub fn init(&mut self, config: &WebuddyConfig, stage: S, env: Environment) -> Option<InstanceId> {
        self.destroy_active();
        let settings = Settings::from_config(config);
        match Webuddy::start(settings, stage, env) {
            Ok(engine) => {
                let id = InstanceId(self.next_id);
                self.next_id += 1;
                tracing::debug!(?id, "instance attached");
                self.active = Some((id, engine));
                Some(id)
            }
            Err(err) => {
                tracing::warn!(%err, "init aborted");
                None
            }
        }
    }

    /// Tear down the instance `id`. Returns `false` for stale handles.
    pub fn destroy(&mut self, id: InstanceId) -> bool {
        match &self.active {
            Some((active, _)) if *active == id => {
                self.destroy_active();
                true
            }
            _ => false,
        }
    }

    /// Tear down whatever is running.
    pub fn destroy_active(&mut self) {
        if let Some((id, mut engine)) = self.active.take() {
            engine.destroy();
            tracing::debug!(?id, "instance released");
        }
    }

    #[must_use]
    pub fn active_id(&self) -> Option<InstanceId> {
        self.active.as_ref().map(|(id, _)| *id)
    }

    #[must_use]
    pub fn active(&self) -> Option<&Webuddy<S>> {
        self.active.as_ref().map(|(_, engine)| engine)
    }

    pub fn active_mut(&mut self) -> Option<&mut Webuddy<S>> {
        self.active.as_mut().map(|(_, engine)| engine)
    }

    pub fn advance_to(&mut self, now: Duration) {
        if let Some(engine) = self.active_mut() {
            engine.advance_to(now);
        }
    }

    /// See [`Webuddy::skip_stall`].
    pub fn skip_stall(&mut self, now: Duration, limit: Duration) -> Option<Duration> {
        self.active_mut()
            .and_then(|engine| engine.skip_stall(now, limit))
    }

    pub fn on_scroll(&mut self, now: Duration) {
        if let Some(engine) = self.active_mut() {
            engine.on_scroll(now);
        }
    }

    pub fn on_pointer_move(&mut self, now: Duration) {
        if let Some(engine) = self.active_mut() {
            engine.on_pointer_move(now);
        }
    }

    pub fn on_key(&mut self, now: Duration) {
        if let Some(engine) = self.active_mut() {
            engine.on_key(now);
        }
    }

    pub fn on_hover(&mut self, selector: &str, now: Duration) {
        if let Some(engine) = self.active_mut() {
            engine.on_hover(selector, now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::{PageModel, RecordingStage};
    use std::cell::RefCell;
    use std::rc::Rc;
    use webuddy_core::{MemorySession, Viewport, XorShift64};

    fn env() -> Environment {
        Environment::new("https://example.com/", MemorySession::new(), XorShift64::new(3))
    }

    #[test]
    fn reinit_replaces_the_running_instance() {
        let page = Rc::new(RefCell::new(PageModel::new(Viewport::new(1000.0, 800.0, 0.0))));
        let mut life = Lifecycle::new();
        let config = WebuddyConfig::default();

        let first = life.init(&config, RecordingStage::on_page(Rc::clone(&page)), env()).unwrap();
        let second = life.init(&config, RecordingStage::on_page(Rc::clone(&page)), env()).unwrap();
        assert_ne!(first, second);
        assert_eq!(page.borrow().sprites, 1);
        assert_eq!(page.borrow().stylesheets, 1);

        assert!(!life.destroy(first), "stale handle must not tear down the replacement");
        assert_eq!(life.active_id(), Some(second));
        assert!(life.destroy(second));
        assert_eq!(page.borrow().sprites, 0);
        assert!(page.borrow().listeners.is_empty());
    }

    #[test]
    fn failed_init_leaves_nothing_running() {
        let page = Rc::new(RefCell::new(PageModel::new(Viewport::new(1000.0, 800.0, 0.0))));
        let mut life = Lifecycle::new();
        life.init(&WebuddyConfig::default(), RecordingStage::on_page(Rc::clone(&page)), env());

        page.borrow_mut().has_parent = false;
        let id = life.init(&WebuddyConfig::default(), RecordingStage::on_page(Rc::clone(&page)), env());
        assert_eq!(id, None);
        assert!(life.active().is_none());
        assert_eq!(page.borrow().sprites, 0);
    }
}
