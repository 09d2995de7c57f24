#![forbid(unsafe_code)]

//! [`Stage`] over the browser DOM.

use std::rc::Rc;

use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{Document, Element, Event, EventTarget, HtmlElement, HtmlStyleElement, Window};
use webuddy_core::geometry::FALLBACK_SPRITE_HEIGHT;
use webuddy_core::{Look, Position, Theme, Viewport};
use webuddy_runtime::{Listener, LogLevel, Stage, StageError, TeleportCue};

use crate::style::{self, BUBBLE_CLASS, Declaration, PORTAL_CLASS, SPRITE_ID, TELEPORTING_CLASS};

/// Page events forwarded to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageEvent {
    Scroll,
    Activity,
    Hover(String),
}

/// Receiver for page events; owned by the host hub.
pub type EventSink = Rc<dyn Fn(PageEvent)>;

struct Registration {
    listener: Listener,
    target: EventTarget,
    event: &'static str,
    callback: Closure<dyn FnMut(Event)>,
}

impl Registration {
    fn remove(self) {
        if let Err(err) = self
            .target
            .remove_event_listener_with_callback(self.event, self.callback.as_ref().unchecked_ref())
        {
            tracing::warn!(event = self.event, ?err, "could not remove listener");
        }
    }
}

struct Tree {
    sprite: HtmlElement,
    bubble: HtmlElement,
    style: HtmlStyleElement,
}

/// The sprite tree attached to `document.body` or a preview container.
pub struct DomStage {
    window: Window,
    document: Document,
    preview: Option<HtmlElement>,
    sink: EventSink,
    tree: Option<Tree>,
    registrations: Vec<Registration>,
}

impl DomStage {
    /// A stage on `window`. With `preview`, the sprite lives inside that
    /// element and bounds come from its client box.
    pub fn new(window: Window, preview: Option<HtmlElement>, sink: EventSink) -> Result<Self, StageError> {
        let document = window
            .document()
            .ok_or_else(|| StageError::Host("window has no document".into()))?;
        Ok(Self {
            window,
            document,
            preview,
            sink,
            tree: None,
            registrations: Vec::new(),
        })
    }

    fn parent(&self) -> Option<HtmlElement> {
        match &self.preview {
            Some(container) => Some(container.clone()),
            None => self.document.body(),
        }
    }

    fn create(&self, tag: &str) -> Result<HtmlElement, StageError> {
        self.document
            .create_element(tag)
            .map_err(host_error)?
            .dyn_into::<HtmlElement>()
            .map_err(|_| StageError::Host(format!("<{tag}> is not an HTML element")))
    }

    fn sprite(&self) -> Option<&HtmlElement> {
        self.tree.as_ref().map(|tree| &tree.sprite)
    }

    fn subscribe(&mut self, listener: &Listener, target: EventTarget, event: &'static str, page_event: PageEvent) {
        let sink = Rc::clone(&self.sink);
        let callback = Closure::wrap(Box::new(move |_event: Event| {
            sink(page_event.clone());
        }) as Box<dyn FnMut(Event)>);
        match target.add_event_listener_with_callback(event, callback.as_ref().unchecked_ref()) {
            Ok(()) => self.registrations.push(Registration {
                listener: listener.clone(),
                target,
                event,
                callback,
            }),
            Err(err) => tracing::warn!(event, ?err, "could not add listener"),
        }
    }
}

impl Stage for DomStage {
    fn mount(&mut self, theme: &Theme) -> Result<(), StageError> {
        if self.tree.is_some() {
            return Ok(());
        }
        let parent = self.parent().ok_or(StageError::MissingParent)?;

        let style = self
            .document
            .create_element("style")
            .map_err(host_error)?
            .dyn_into::<HtmlStyleElement>()
            .map_err(|_| StageError::Host("<style> is not a style element".into()))?;
        style.set_text_content(Some(&style::stylesheet(theme)));
        match self.document.head() {
            Some(head) => head.append_child(&style).map_err(host_error)?,
            None => parent.append_child(&style).map_err(host_error)?,
        };

        let sprite = self.create("div")?;
        sprite.set_id(SPRITE_ID);
        let bubble = self.create("div")?;
        bubble.set_class_name(BUBBLE_CLASS);
        let portal = self.create("div")?;
        portal.set_class_name(PORTAL_CLASS);

        sprite.append_child(&bubble).map_err(host_error)?;
        sprite.append_child(&portal).map_err(host_error)?;
        if let Err(err) = parent.append_child(&sprite) {
            style.remove();
            return Err(host_error(err));
        }

        tracing::debug!(preview = self.preview.is_some(), "sprite attached");
        self.tree = Some(Tree { sprite, bubble, style });
        Ok(())
    }

    fn unmount(&mut self) {
        if let Some(tree) = self.tree.take() {
            tree.sprite.remove();
            tree.style.remove();
        }
    }

    fn viewport(&self) -> Viewport {
        if let Some(container) = &self.preview {
            return Viewport::new(
                f64::from(container.client_width()),
                f64::from(container.client_height()),
                0.0,
            );
        }
        let dimension = |value: Result<JsValue, JsValue>| value.ok().and_then(|v| v.as_f64()).unwrap_or(0.0);
        Viewport::new(
            dimension(self.window.inner_width()),
            dimension(self.window.inner_height()),
            self.window.scroll_y().unwrap_or(0.0),
        )
    }

    fn sprite_height(&self) -> f64 {
        self.sprite()
            .map(|sprite| f64::from(sprite.offset_height()))
            .filter(|h| *h > 0.0)
            .unwrap_or(FALLBACK_SPRITE_HEIGHT)
    }

    fn place(&mut self, position: Position) {
        if let Some(sprite) = self.sprite() {
            apply(sprite, &style::placement(position));
        }
    }

    fn paint(&mut self, look: &Look) {
        if let Some(sprite) = self.sprite() {
            apply(sprite, &style::paint(look));
        }
    }

    fn show_bubble(&mut self, text: &str) {
        if let Some(tree) = &self.tree {
            tree.bubble.set_inner_text(text);
            apply(&tree.bubble, &style::bubble(true));
        }
    }

    fn hide_bubble(&mut self) {
        if let Some(tree) = &self.tree {
            apply(&tree.bubble, &style::bubble(false));
        }
    }

    fn teleport(&mut self, cue: TeleportCue) {
        let Some(sprite) = self.sprite() else {
            return;
        };
        match cue {
            TeleportCue::Vanish => {
                let _ = sprite.class_list().add_1(TELEPORTING_CLASS);
                apply(sprite, &style::presence(false));
            }
            TeleportCue::Relocate(position) => {
                apply(sprite, &[("transition", "none".to_string())]);
                apply(sprite, &style::placement(position));
                // Reading layout commits the jump before transitions return.
                let _ = sprite.offset_width();
                apply(sprite, &[("transition", style::SPRITE_TRANSITION.to_string())]);
            }
            TeleportCue::Reappear => apply(sprite, &style::presence(true)),
            TeleportCue::Settle => {
                let _ = sprite.class_list().remove_1(TELEPORTING_CLASS);
            }
        }
    }

    fn match_selector(&self, selector: &str) -> Result<usize, StageError> {
        self.document
            .query_selector_all(selector)
            .map(|list| list.length() as usize)
            .map_err(|_| StageError::InvalidSelector(selector.to_string()))
    }

    fn listen(&mut self, listener: Listener) {
        match &listener {
            Listener::Scroll => {
                let target: EventTarget = self.window.clone().into();
                self.subscribe(&listener, target, "scroll", PageEvent::Scroll);
            }
            Listener::Activity => {
                for event in ["mousemove", "scroll", "keydown"] {
                    let target: EventTarget = self.document.clone().into();
                    self.subscribe(&listener, target, event, PageEvent::Activity);
                }
            }
            Listener::Hover(selector) => {
                let Ok(nodes) = self.document.query_selector_all(selector) else {
                    return;
                };
                for index in 0..nodes.length() {
                    let Some(node) = nodes.item(index) else {
                        continue;
                    };
                    let Ok(element) = node.dyn_into::<Element>() else {
                        continue;
                    };
                    self.subscribe(
                        &listener,
                        element.into(),
                        "mouseenter",
                        PageEvent::Hover(selector.clone()),
                    );
                }
            }
        }
    }

    fn unlisten(&mut self, listener: &Listener) {
        let (removed, keep): (Vec<_>, Vec<_>) = std::mem::take(&mut self.registrations)
            .into_iter()
            .partition(|reg| reg.listener == *listener);
        self.registrations = keep;
        removed.into_iter().for_each(Registration::remove);
    }

    fn unlisten_all(&mut self) {
        std::mem::take(&mut self.registrations)
            .into_iter()
            .for_each(Registration::remove);
    }

    fn write_log(&mut self, level: LogLevel, message: &str) {
        let message = JsValue::from_str(message);
        match level {
            LogLevel::Warn => web_sys::console::warn_1(&message),
            LogLevel::Error => web_sys::console::error_1(&message),
        }
    }
}

impl Drop for DomStage {
    fn drop(&mut self) {
        self.unlisten_all();
        self.unmount();
    }
}

fn apply(element: &HtmlElement, declarations: &[Declaration]) {
    let style = element.style();
    for (property, value) in declarations {
        if let Err(err) = style.set_property(property, value) {
            tracing::trace!(property, ?err, "style rejected");
        }
    }
}

fn host_error(err: JsValue) -> StageError {
    StageError::Host(err.as_string().unwrap_or_else(|| format!("{err:?}")))
}
