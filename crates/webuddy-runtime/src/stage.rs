#![forbid(unsafe_code)]

//! The host seam: everything the engine does to a page goes through [`Stage`].
//!
//! A stage owns the visual element tree (sprite, speech bubble, portal halo),
//! the injected stylesheet, and the page-level listeners. The engine never
//! reads the page except through [`Stage::viewport`], [`Stage::sprite_height`]
//! and [`Stage::match_selector`].
//!
//! [`RecordingStage`] is the deterministic in-memory implementation used by
//! tests and the harness. Several recording stages can share one
//! [`PageModel`], which is how "two instances on one page" scenarios are
//! observed.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

use webuddy_core::geometry::FALLBACK_SPRITE_HEIGHT;
use webuddy_core::{Look, Position, Theme, Viewport};

/// Errors a stage can report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageError {
    /// No parent element to attach the sprite to.
    MissingParent,
    /// The selector could not be parsed by the host.
    InvalidSelector(String),
    /// The host refused an operation.
    Host(String),
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageError::MissingParent => write!(f, "target element not found"),
            StageError::InvalidSelector(sel) => write!(f, "invalid CSS selector \"{sel}\""),
            StageError::Host(msg) => write!(f, "host error: {msg}"),
        }
    }
}

impl std::error::Error for StageError {}

/// Page-level event sources the engine subscribes to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Listener {
    /// Window scroll, for teleport recovery.
    Scroll,
    /// Pointer movement, scrolling, or key input, for the inactivity trigger.
    Activity,
    /// Pointer entering any element that matches the selector.
    Hover(String),
}

/// Visual steps of the teleport sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TeleportCue {
    /// Mark the sprite as teleporting; fade and shrink it out.
    Vanish,
    /// Jump to a new position without animating the move.
    Relocate(Position),
    /// Fade and scale back in.
    Reappear,
    /// Drop the teleporting mark.
    Settle,
}

/// Severity of an operator-visible log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Warn,
    Error,
}

/// Everything the engine needs from its host page.
pub trait Stage {
    /// Create the element tree under its parent and inject scoped styling.
    fn mount(&mut self, theme: &Theme) -> Result<(), StageError>;

    /// Remove the element tree and styling. Must be idempotent.
    fn unmount(&mut self);

    /// Current movement area.
    fn viewport(&self) -> Viewport;

    /// Rendered sprite height.
    fn sprite_height(&self) -> f64 {
        FALLBACK_SPRITE_HEIGHT
    }

    fn place(&mut self, position: Position);

    fn paint(&mut self, look: &Look);

    fn show_bubble(&mut self, text: &str);

    fn hide_bubble(&mut self);

    fn teleport(&mut self, cue: TeleportCue);

    /// Count the elements matching a selector.
    fn match_selector(&self, selector: &str) -> Result<usize, StageError>;

    fn listen(&mut self, listener: Listener);

    fn unlisten(&mut self, listener: &Listener);

    fn unlisten_all(&mut self);

    /// Operator-visible log (the browser console in the web host).
    fn write_log(&mut self, level: LogLevel, message: &str);
}

// ─────────────────────────────────────────────────────────────────────────────
// Recording stage
// ─────────────────────────────────────────────────────────────────────────────

/// One recorded stage mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOp {
    Mount,
    Unmount,
    Place(Position),
    Paint(Look),
    ShowBubble(String),
    HideBubble,
    Teleport(TeleportCue),
    Listen(Listener),
    Unlisten(Listener),
    UnlistenAll,
    Log(LogLevel, String),
}

/// Shared state of a simulated page.
#[derive(Debug, Clone)]
pub struct PageModel {
    pub viewport: Viewport,
    /// Whether the configured parent element exists.
    pub has_parent: bool,
    /// Sprites currently attached.
    pub sprites: usize,
    /// Injected stylesheets currently attached.
    pub stylesheets: usize,
    /// Live page-level listeners, one entry per registration.
    pub listeners: Vec<Listener>,
    /// Match counts for known selectors; unknown selectors match nothing.
    pub selectors: HashMap<String, usize>,
    /// Selectors the page reports as unparsable.
    pub invalid_selectors: HashSet<String>,
    /// Measured sprite height, if the page lays the sprite out.
    pub sprite_height: Option<f64>,
    /// Console output across all stages on this page.
    pub console: Vec<(LogLevel, String)>,
}

impl PageModel {
    #[must_use]
    pub fn new(viewport: Viewport) -> Self {
        Self {
            viewport,
            has_parent: true,
            sprites: 0,
            stylesheets: 0,
            listeners: Vec::new(),
            selectors: HashMap::new(),
            invalid_selectors: HashSet::new(),
            sprite_height: None,
            console: Vec::new(),
        }
    }

    /// Register `count` elements matching `selector`.
    pub fn with_selector(mut self, selector: &str, count: usize) -> Self {
        self.selectors.insert(selector.to_string(), count);
        self
    }
}

/// In-memory [`Stage`] that records every mutation.
#[derive(Debug)]
pub struct RecordingStage {
    page: Rc<RefCell<PageModel>>,
    ops: Vec<StageOp>,
    mounted: bool,
    own_listeners: Vec<Listener>,
    position: Option<Position>,
    look: Option<Look>,
    bubble: Option<String>,
    teleporting: bool,
}

impl RecordingStage {
    /// A stage on a fresh page of its own.
    #[must_use]
    pub fn new(viewport: Viewport) -> Self {
        Self::on_page(Rc::new(RefCell::new(PageModel::new(viewport))))
    }

    /// A stage on a shared page.
    #[must_use]
    pub fn on_page(page: Rc<RefCell<PageModel>>) -> Self {
        Self {
            page,
            ops: Vec::new(),
            mounted: false,
            own_listeners: Vec::new(),
            position: None,
            look: None,
            bubble: None,
            teleporting: false,
        }
    }

    /// Handle to the page this stage lives on.
    #[must_use]
    pub fn page(&self) -> Rc<RefCell<PageModel>> {
        Rc::clone(&self.page)
    }

    /// Scroll the page.
    pub fn scroll_to(&self, scroll_y: f64) {
        let mut page = self.page.borrow_mut();
        page.viewport = page.viewport.scrolled_to(scroll_y);
    }

    /// Resize the page viewport.
    pub fn resize(&self, width: f64, height: f64) {
        let mut page = self.page.borrow_mut();
        page.viewport.width = width;
        page.viewport.height = height;
    }

    #[must_use]
    pub fn ops(&self) -> &[StageOp] {
        &self.ops
    }

    /// Drain the op log.
    pub fn take_ops(&mut self) -> Vec<StageOp> {
        std::mem::take(&mut self.ops)
    }

    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    #[must_use]
    pub fn position(&self) -> Option<Position> {
        self.position
    }

    #[must_use]
    pub fn look(&self) -> Option<&Look> {
        self.look.as_ref()
    }

    /// Text currently visible in the speech bubble.
    #[must_use]
    pub fn bubble(&self) -> Option<&str> {
        self.bubble.as_deref()
    }

    #[must_use]
    pub fn is_teleporting(&self) -> bool {
        self.teleporting
    }

    /// Listeners registered by this stage.
    #[must_use]
    pub fn listeners(&self) -> &[Listener] {
        &self.own_listeners
    }

    /// Every text shown in the bubble, in order.
    #[must_use]
    pub fn spoken(&self) -> Vec<&str> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                StageOp::ShowBubble(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    fn record(&mut self, op: StageOp) {
        tracing::trace!(?op, "stage op");
        self.ops.push(op);
    }

    fn drop_page_listener(&self, listener: &Listener) {
        let mut page = self.page.borrow_mut();
        if let Some(idx) = page.listeners.iter().position(|l| l == listener) {
            page.listeners.remove(idx);
        }
    }
}

impl Stage for RecordingStage {
    fn mount(&mut self, _theme: &Theme) -> Result<(), StageError> {
        if self.mounted {
            return Ok(());
        }
        {
            let mut page = self.page.borrow_mut();
            if !page.has_parent {
                return Err(StageError::MissingParent);
            }
            page.sprites += 1;
            page.stylesheets += 1;
        }
        self.mounted = true;
        self.record(StageOp::Mount);
        Ok(())
    }

    fn unmount(&mut self) {
        if !self.mounted {
            return;
        }
        {
            let mut page = self.page.borrow_mut();
            page.sprites = page.sprites.saturating_sub(1);
            page.stylesheets = page.stylesheets.saturating_sub(1);
        }
        self.mounted = false;
        self.bubble = None;
        self.record(StageOp::Unmount);
    }

    fn viewport(&self) -> Viewport {
        self.page.borrow().viewport
    }

    fn sprite_height(&self) -> f64 {
        self.page
            .borrow()
            .sprite_height
            .filter(|h| *h > 0.0)
            .unwrap_or(FALLBACK_SPRITE_HEIGHT)
    }

    fn place(&mut self, position: Position) {
        self.position = Some(position);
        self.record(StageOp::Place(position));
    }

    fn paint(&mut self, look: &Look) {
        self.look = Some(look.clone());
        self.record(StageOp::Paint(look.clone()));
    }

    fn show_bubble(&mut self, text: &str) {
        self.bubble = Some(text.to_string());
        self.record(StageOp::ShowBubble(text.to_string()));
    }

    fn hide_bubble(&mut self) {
        self.bubble = None;
        self.record(StageOp::HideBubble);
    }

    fn teleport(&mut self, cue: TeleportCue) {
        match cue {
            TeleportCue::Vanish => self.teleporting = true,
            TeleportCue::Relocate(position) => self.position = Some(position),
            TeleportCue::Reappear => {}
            TeleportCue::Settle => self.teleporting = false,
        }
        self.record(StageOp::Teleport(cue));
    }

    fn match_selector(&self, selector: &str) -> Result<usize, StageError> {
        let page = self.page.borrow();
        if page.invalid_selectors.contains(selector) {
            return Err(StageError::InvalidSelector(selector.to_string()));
        }
        Ok(page.selectors.get(selector).copied().unwrap_or(0))
    }

    fn listen(&mut self, listener: Listener) {
        self.page.borrow_mut().listeners.push(listener.clone());
        self.own_listeners.push(listener.clone());
        self.record(StageOp::Listen(listener));
    }

    fn unlisten(&mut self, listener: &Listener) {
        let Some(idx) = self.own_listeners.iter().position(|l| l == listener) else {
            return;
        };
        self.own_listeners.remove(idx);
        self.drop_page_listener(listener);
        self.record(StageOp::Unlisten(listener.clone()));
    }

    fn unlisten_all(&mut self) {
        for listener in std::mem::take(&mut self.own_listeners) {
            self.drop_page_listener(&listener);
        }
        self.record(StageOp::UnlistenAll);
    }

    fn write_log(&mut self, level: LogLevel, message: &str) {
        self.page
            .borrow_mut()
            .console
            .push((level, message.to_string()));
        self.record(StageOp::Log(level, message.to_string()));
    }
}
