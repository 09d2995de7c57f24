#![forbid(unsafe_code)]

//! Scenario documents and their replay.
//!
//! A scenario describes a page (viewport, which selectors exist), a
//! configuration, a seed, and a list of timed inputs. [`replay`] runs it on a
//! [`PageSimulator`], stepping the virtual clock from timer deadline to timer
//! deadline so every recorded stage operation gets the exact time it
//! happened at.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use webuddy_core::{Viewport, WebuddyConfig};
use webuddy_runtime::PageModel;
use webuddy_runtime::simulator::{DEFAULT_PAGE_URL, PageSimulator};

use crate::trace::{TraceLine, TraceOp};

#[derive(Debug)]
pub enum ScenarioError {
    Json(serde_json::Error),
}

impl fmt::Display for ScenarioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScenarioError::Json(e) => write!(f, "invalid scenario: {e}"),
        }
    }
}

impl std::error::Error for ScenarioError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ScenarioError::Json(e) => Some(e),
        }
    }
}

impl From<serde_json::Error> for ScenarioError {
    fn from(e: serde_json::Error) -> Self {
        ScenarioError::Json(e)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    #[serde(default)]
    pub config: WebuddyConfig,
    #[serde(default)]
    pub seed: u64,
    #[serde(default)]
    pub viewport: ViewportSpec,
    #[serde(default = "default_page_url")]
    pub page_url: String,
    #[serde(default)]
    pub page: PageSpec,
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Scenario {
    pub fn from_json(text: &str) -> Result<Self, ScenarioError> {
        Ok(serde_json::from_str(text)?)
    }
}

fn default_page_url() -> String {
    DEFAULT_PAGE_URL.to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ViewportSpec {
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub scroll_y: f64,
}

impl Default for ViewportSpec {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 800.0,
            scroll_y: 0.0,
        }
    }
}

impl From<ViewportSpec> for Viewport {
    fn from(spec: ViewportSpec) -> Self {
        Viewport::new(spec.width, spec.height, spec.scroll_y)
    }
}

/// What the simulated document contains.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PageSpec {
    /// Match counts per selector; anything else matches nothing.
    pub selectors: HashMap<String, usize>,
    /// Selectors the document refuses to parse.
    pub invalid_selectors: Vec<String>,
    /// Whether the sprite's parent element exists.
    pub has_parent: bool,
    pub sprite_height: Option<f64>,
}

impl Default for PageSpec {
    fn default() -> Self {
        Self {
            selectors: HashMap::new(),
            invalid_selectors: Vec::new(),
            has_parent: true,
            sprite_height: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Step {
    pub at_ms: u64,
    pub event: Event,
}

/// A page input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    Scroll { scroll_y: f64 },
    Pointer,
    Key,
    Hover { selector: String },
    Resize { width: f64, height: f64 },
    /// Re-run `init` with the scenario config.
    Init,
    Destroy,
    /// Only let time pass.
    Advance,
}

/// Run `scenario` and collect its trace.
pub fn replay(scenario: &Scenario) -> Vec<TraceLine> {
    let mut page = PageModel::new(scenario.viewport.into());
    page.has_parent = scenario.page.has_parent;
    page.sprite_height = scenario.page.sprite_height;
    page.selectors = scenario.page.selectors.clone();
    page.invalid_selectors = scenario.page.invalid_selectors.iter().cloned().collect();

    let mut run = Replay {
        sim: PageSimulator::on_page(Rc::new(RefCell::new(page)))
            .with_seed(scenario.seed)
            .with_page_url(scenario.page_url.clone()),
        config: &scenario.config,
        console_seen: 0,
        lines: Vec::new(),
    };

    run.init();
    for step in &scenario.steps {
        run.run_until(Duration::from_millis(step.at_ms));
        run.lines.push(TraceLine::input(run.now_ms(), step.event.clone()));
        run.apply(&step.event);
    }
    tracing::debug!(lines = run.lines.len(), "scenario replayed");
    run.lines
}

struct Replay<'a> {
    sim: PageSimulator,
    config: &'a WebuddyConfig,
    console_seen: usize,
    lines: Vec<TraceLine>,
}

impl Replay<'_> {
    fn now_ms(&self) -> u64 {
        u64::try_from(self.sim.now().as_millis()).unwrap_or(u64::MAX)
    }

    fn init(&mut self) {
        if self.sim.init(self.config).is_some() {
            self.drain();
        } else {
            // The failed stage is gone; what it logged survives on the page.
            let page = self.sim.page();
            let console = page.borrow().console.clone();
            let at = self.now_ms();
            for (level, message) in &console[self.console_seen.min(console.len())..] {
                self.lines.push(TraceLine::op(at, TraceOp::log(*level, message)));
            }
            tracing::warn!(at_ms = at, "init failed");
        }
        self.console_seen = self.sim.page().borrow().console.len();
    }

    fn drain(&mut self) {
        let at = self.now_ms();
        let Some(engine) = self.sim.engine_mut() else {
            return;
        };
        let ops = engine.stage_mut().take_ops();
        self.lines
            .extend(ops.iter().map(|op| TraceLine::op(at, TraceOp::from(op))));
    }

    fn run_until(&mut self, target: Duration) {
        while let Some(deadline) = self.sim.engine().and_then(|e| e.next_deadline()) {
            if deadline > target {
                break;
            }
            self.sim.advance_to(deadline);
            self.drain();
        }
        self.sim.advance_to(target);
        self.drain();
    }

    fn apply(&mut self, event: &Event) {
        match event {
            Event::Scroll { scroll_y } => self.sim.scroll_to(*scroll_y),
            Event::Pointer => self.sim.pointer_move(),
            Event::Key => self.sim.key(),
            Event::Hover { selector } => self.sim.hover(selector),
            Event::Resize { width, height } => self.sim.resize(*width, *height),
            Event::Init => {
                self.drain();
                self.init();
                return;
            }
            Event::Destroy => {
                self.drain();
                self.sim.destroy();
                return;
            }
            Event::Advance => {}
        }
        self.drain();
    }
}
