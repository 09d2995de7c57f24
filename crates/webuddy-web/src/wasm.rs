#![forbid(unsafe_code)]

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;

use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{HtmlElement, Storage, Window};
use web_time::Instant;
use webuddy_core::{SessionStore, WebuddyConfig, XorShift64};
use webuddy_runtime::{Environment, InstanceId, Lifecycle};

use crate::attach::preview_container;
use crate::dom::{DomStage, EventSink, PageEvent};

/// Milliseconds between timer pumps.
const PUMP_INTERVAL_MS: i32 = 10;

/// A pump gap longer than this counts as a stall; the engine skips it.
const STALL_LIMIT: Duration = Duration::from_millis(250);

/// Globals an embedding page may set before the script loads.
const AUTO_CONFIG_KEYS: [&str; 2] = ["webuddyConfig", "spacemanConfig"];

struct Pump {
    id: i32,
    _tick: Closure<dyn FnMut()>,
}

/// Per-page state shared by the exported functions and the DOM callbacks.
struct Hub {
    lifecycle: Lifecycle<DomStage>,
    pump: Option<Pump>,
    epoch: Instant,
}

impl Hub {
    fn new() -> Self {
        Self {
            lifecycle: Lifecycle::new(),
            pump: None,
            epoch: Instant::now(),
        }
    }

    fn elapsed(&self) -> Duration {
        self.epoch.elapsed()
    }

    fn dispatch(&mut self, event: PageEvent) {
        let now = self.elapsed();
        self.lifecycle.skip_stall(now, STALL_LIMIT);
        match event {
            PageEvent::Scroll => self.lifecycle.on_scroll(now),
            PageEvent::Activity => self.lifecycle.on_pointer_move(now),
            PageEvent::Hover(selector) => self.lifecycle.on_hover(&selector, now),
        }
    }

    fn stop_pump(&mut self, window: &Window) {
        if let Some(pump) = self.pump.take() {
            window.clear_interval_with_handle(pump.id);
        }
    }
}

thread_local! {
    static HUB: Rc<RefCell<Hub>> = Rc::new(RefCell::new(Hub::new()));
}

fn sink(hub: Weak<RefCell<Hub>>) -> EventSink {
    Rc::new(move |event: PageEvent| {
        let Some(hub) = hub.upgrade() else {
            return;
        };
        // Events raised while the engine itself holds the hub are dropped.
        let Ok(mut hub) = hub.try_borrow_mut() else {
            tracing::trace!(?event, "event dropped during dispatch");
            return;
        };
        hub.dispatch(event);
    })
}

fn start_pump(window: &Window, hub: &Rc<RefCell<Hub>>) -> Result<Pump, JsValue> {
    let weak = Rc::downgrade(hub);
    let tick = Closure::wrap(Box::new(move || {
        let Some(hub) = weak.upgrade() else {
            return;
        };
        if let Ok(mut hub) = hub.try_borrow_mut() {
            let now = hub.elapsed();
            hub.lifecycle.skip_stall(now, STALL_LIMIT);
            hub.lifecycle.advance_to(now);
        }
    }) as Box<dyn FnMut()>);
    let id = window.set_interval_with_callback_and_timeout_and_arguments_0(
        tick.as_ref().unchecked_ref(),
        PUMP_INTERVAL_MS,
    )?;
    Ok(Pump { id, _tick: tick })
}

/// `sessionStorage`, or nothing when the page may not use it.
struct BrowserSession {
    storage: Option<Storage>,
}

impl BrowserSession {
    fn open(window: &Window) -> Self {
        Self {
            storage: window.session_storage().ok().flatten(),
        }
    }
}

impl SessionStore for BrowserSession {
    fn flag(&self, key: &str) -> bool {
        self.storage
            .as_ref()
            .and_then(|storage| storage.get_item(key).ok().flatten())
            .is_some_and(|value| value == "true")
    }

    fn set_flag(&mut self, key: &str) {
        if let Some(storage) = &self.storage
            && let Err(err) = storage.set_item(key, "true")
        {
            tracing::warn!(key, ?err, "sessionStorage write failed");
        }
    }
}

fn decode(config: &JsValue) -> Result<WebuddyConfig, JsValue> {
    if config.is_undefined() || config.is_null() {
        return Ok(WebuddyConfig::default());
    }
    let text = js_sys::JSON::stringify(config)?
        .as_string()
        .unwrap_or_else(|| "{}".to_string());
    WebuddyConfig::from_json(&text).map_err(|err| JsValue::from_str(&format!("Webuddy: {err}")))
}

fn preview_element(config: &JsValue) -> Option<HtmlElement> {
    if !config.is_object() {
        return None;
    }
    js_sys::Reflect::get(config, &JsValue::from_str("previewElement"))
        .ok()?
        .dyn_into::<HtmlElement>()
        .ok()
}

/// Handle returned by [`init_webuddy`].
#[wasm_bindgen]
pub struct WebuddyHandle {
    id: InstanceId,
}

#[wasm_bindgen]
impl WebuddyHandle {
    /// Remove the character and every listener and timer it installed.
    ///
    /// Returns `false` when this handle was already replaced or destroyed.
    pub fn destroy(&self) -> bool {
        HUB.with(|hub| {
            let Ok(mut hub) = hub.try_borrow_mut() else {
                return false;
            };
            let destroyed = hub.lifecycle.destroy(self.id);
            if hub.lifecycle.active_id().is_none()
                && let Some(window) = web_sys::window()
            {
                hub.stop_pump(&window);
            }
            destroyed
        })
    }

    /// Whether this handle still refers to the running instance.
    #[wasm_bindgen(js_name = isActive)]
    pub fn is_active(&self) -> bool {
        HUB.with(|hub| {
            hub.try_borrow()
                .is_ok_and(|hub| hub.lifecycle.active_id() == Some(self.id))
        })
    }
}

/// Attach a character to the page, replacing any running one.
///
/// Resolves to `undefined` when the character cannot run; the reason is
/// written to the console. Never throws into the host page.
#[wasm_bindgen(js_name = initWebuddy)]
pub fn init_webuddy(config: JsValue) -> Option<WebuddyHandle> {
    match try_init(&config) {
        Ok(handle) => handle,
        Err(err) => {
            tracing::warn!(?err, "initWebuddy failed");
            web_sys::console::error_1(&err);
            None
        }
    }
}

fn try_init(config: &JsValue) -> Result<Option<WebuddyHandle>, JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("Webuddy: no window"))?;
    let parsed = decode(config)?;
    let page_url = window.location().href().unwrap_or_default();
    let seed = (js_sys::Math::random() * 9_007_199_254_740_992.0) as u64;
    let preview = preview_container(&parsed, || preview_element(config));

    HUB.with(|hub| {
        let stage = DomStage::new(window.clone(), preview, sink(Rc::downgrade(hub)))
            .map_err(|err| JsValue::from_str(&format!("Webuddy: {err}")))?;

        let mut state = hub
            .try_borrow_mut()
            .map_err(|_| JsValue::from_str("Webuddy: initWebuddy called re-entrantly"))?;
        let env = Environment::new(page_url, BrowserSession::open(&window), XorShift64::new(seed))
            .at(state.elapsed());

        let Some(id) = state.lifecycle.init(&parsed, stage, env) else {
            state.stop_pump(&window);
            return Ok(None);
        };
        if state.pump.is_none() {
            state.pump = Some(start_pump(&window, hub)?);
        }
        tracing::debug!(?id, "webuddy running");
        Ok(Some(WebuddyHandle { id }))
    })
}

/// Start from a global config object if the page defined one.
#[wasm_bindgen(js_name = autoInit)]
pub fn auto_init() -> Option<WebuddyHandle> {
    let window = web_sys::window()?;
    let config = AUTO_CONFIG_KEYS.iter().find_map(|key| {
        js_sys::Reflect::get(&window, &JsValue::from_str(key))
            .ok()
            .filter(JsValue::is_object)
    })?;
    init_webuddy(config)
}

#[wasm_bindgen(start)]
pub fn on_load() {
    let Some(document) = web_sys::window().and_then(|window| window.document()) else {
        return;
    };
    if document.ready_state() == "loading" {
        let ready = Closure::once_into_js(move || {
            auto_init();
        });
        if let Err(err) =
            document.add_event_listener_with_callback("DOMContentLoaded", ready.unchecked_ref())
        {
            web_sys::console::error_1(&err);
        }
    } else {
        auto_init();
    }
}
