#![forbid(unsafe_code)]

//! Caller configuration and its normalization into [`Settings`].
//!
//! [`WebuddyConfig`] mirrors the JSON document an embedding page (or the
//! authoring tool's preview) hands to the engine. Every field is optional.
//! [`Settings::from_config`] turns it into a fully populated, immutable
//! settings record; there is no error path once the document has been
//! decoded. Absent, empty, zero, or non-finite values fall back to defaults.
//!
//! # Defaults
//!
//! | Field | Default |
//! |-------|---------|
//! | `character` | `up: red`, `down: green`, `left: blue`, `right: yellow` |
//! | `welcome_messages` | empty |
//! | `dialogue` | `{"default": ["Hello!", "I'm your Webuddy."]}` |
//! | `automations` | empty |
//! | `frequency` | 20 s between idle lines |
//! | `portalColor` | `rgba(0, 246, 255, 0.5)` |
//! | `animationSpeed` | 200 ms per animation frame |

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use serde::de::{Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

use crate::dialogue::DEFAULT_BUCKET;
use crate::look::CharacterMap;

const DEFAULT_FREQUENCY_SECS: f64 = 20.0;
const DEFAULT_ANIMATION_MS: f64 = 200.0;
const DEFAULT_PORTAL_COLOR: &str = "rgba(0, 246, 255, 0.5)";
const DEFAULT_BUBBLE_BACKGROUND: &str = "rgba(10, 20, 30, 0.85)";
const DEFAULT_BUBBLE_TEXT: &str = "#E0E0E0";
const DEFAULT_BUBBLE_BORDER: &str = "rgba(0, 246, 255, 0.5)";
const DEFAULT_TIME_ON_PAGE_SECS: f64 = 30.0;
const DEFAULT_INACTIVITY_SECS: f64 = 60.0;

/// Pixels moved per movement tick.
pub const IDLE_SPEED_PX: f64 = 2.0;
/// Interval between movement ticks.
pub const MOVE_INTERVAL: Duration = Duration::from_millis(50);
/// Interval between random direction changes.
pub const DIRECTION_CHANGE_INTERVAL: Duration = Duration::from_millis(2500);
/// Cooldown tail after a message hides.
pub const MESSAGE_COOLDOWN: Duration = Duration::from_millis(5000);

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Failure to decode a configuration document.
///
/// Only raised by [`WebuddyConfig::from_json`]; normalization itself never
/// fails.
#[derive(Debug)]
pub enum ConfigError {
    /// The document is not valid JSON or does not have the expected shape.
    Json(serde_json::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Json(e) => write!(f, "invalid webuddy config: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Json(e) => Some(e),
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Json(e)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Caller-facing document
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration as supplied by the embedding page.
///
/// Field names follow the public JSON contract, including its mix of
/// `snake_case` (`welcome_messages`) and `camelCase` keys. The preview
/// container element is not part of the document; hosts pass it to their
/// stage directly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebuddyConfig {
    /// Sprite images or colours keyed by direction and optional frame
    /// (`up`, `up-2`, ...).
    #[serde(
        default,
        deserialize_with = "lenient::text_map",
        skip_serializing_if = "Option::is_none"
    )]
    pub character: Option<HashMap<String, String>>,
    /// Onboarding lines shown once per browser session.
    #[serde(
        rename = "welcome_messages",
        default,
        deserialize_with = "lenient::text_list",
        skip_serializing_if = "Option::is_none"
    )]
    pub welcome_messages: Option<Vec<String>>,
    /// Flat line list or per-page buckets.
    #[serde(
        default,
        deserialize_with = "lenient::dialogue",
        skip_serializing_if = "Option::is_none"
    )]
    pub dialogue: Option<DialogueSource>,
    /// Automation triggers.
    #[serde(
        default,
        deserialize_with = "lenient::automations",
        skip_serializing_if = "Option::is_none"
    )]
    pub automations: Option<Vec<AutomationSpec>>,
    /// Seconds between idle lines.
    #[serde(
        default,
        deserialize_with = "lenient::number",
        skip_serializing_if = "Option::is_none"
    )]
    pub frequency: Option<f64>,
    /// Glow and portal colour.
    #[serde(
        default,
        deserialize_with = "lenient::text",
        skip_serializing_if = "Option::is_none"
    )]
    pub portal_color: Option<String>,
    /// Speech bubble colours.
    #[serde(
        default,
        deserialize_with = "lenient::object",
        skip_serializing_if = "Option::is_none"
    )]
    pub speech_bubble: Option<SpeechBubbleConfig>,
    /// Authoring-tool preview: disables scroll teleporting, surfaces
    /// automation warnings.
    #[serde(
        default,
        deserialize_with = "lenient::flag",
        skip_serializing_if = "Option::is_none"
    )]
    pub preview_mode: Option<bool>,
    /// Milliseconds per animation frame.
    #[serde(
        default,
        deserialize_with = "lenient::number",
        skip_serializing_if = "Option::is_none"
    )]
    pub animation_speed: Option<f64>,
}

impl WebuddyConfig {
    /// Decode a configuration document.
    ///
    /// Fails only on malformed JSON or a document that is not an object.
    /// Fields of the wrong shape decode as absent and are logged at `warn`.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Speech bubble colours as supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechBubbleConfig {
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub text_color: Option<String>,
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub border_color: Option<String>,
}

/// Where dialogue lines come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DialogueSource {
    /// Legacy flat list, used on every page.
    Lines(Vec<String>),
    /// Lines bucketed by page URL, plus a reserved `default` bucket.
    Pages(PageBuckets),
}

impl Default for DialogueSource {
    fn default() -> Self {
        DialogueSource::Pages(PageBuckets::from_iter([(
            DEFAULT_BUCKET.to_string(),
            vec!["Hello!".to_string(), "I'm your Webuddy.".to_string()],
        )]))
    }
}

/// Ordered page buckets.
///
/// Keeps document order so that the first matching page key wins and the
/// preview pool flattens in the order the author wrote it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageBuckets(Vec<(String, Vec<String>)>);

impl PageBuckets {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a bucket, keeping the original position on replace.
    pub fn insert(&mut self, key: impl Into<String>, lines: Vec<String>) {
        let key = key.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = lines,
            None => self.0.push((key, lines)),
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, lines)| lines.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, Vec<String>)> for PageBuckets {
    fn from_iter<I: IntoIterator<Item = (String, Vec<String>)>>(iter: I) -> Self {
        let mut buckets = PageBuckets::new();
        for (key, lines) in iter {
            buckets.insert(key, lines);
        }
        buckets
    }
}

impl<'de> Deserialize<'de> for PageBuckets {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct BucketVisitor;

        impl<'de> Visitor<'de> for BucketVisitor {
            type Value = PageBuckets;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map from page URL to a list of lines")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut buckets = PageBuckets::new();
                while let Some((key, value)) = map.next_entry::<String, serde_json::Value>()? {
                    if let Some(lines) = lenient::lines(&value) {
                        buckets.insert(key, lines);
                    }
                }
                Ok(buckets)
            }
        }

        deserializer.deserialize_map(BucketVisitor)
    }
}

impl Serialize for PageBuckets {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, lines) in &self.0 {
            map.serialize_entry(key, lines)?;
        }
        map.end()
    }
}

/// One automation entry as written by the author.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationSpec {
    #[serde(default)]
    pub trigger_type: TriggerKind,
    #[serde(default, deserialize_with = "lenient::message")]
    pub message: String,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub config: TriggerConfig,
}

/// Automation trigger kinds. Missing or unrecognized kinds decode as
/// [`TriggerKind::Unknown`] and are dropped during normalization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    TimeOnPage,
    ElementHover,
    Inactivity,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Kind-specific trigger parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriggerConfig {
    #[serde(default, deserialize_with = "lenient::number", skip_serializing_if = "Option::is_none")]
    pub seconds: Option<f64>,
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Lenient field decoding
// ─────────────────────────────────────────────────────────────────────────────

/// Field decoders for documents written by hand in page scripts.
///
/// Numbers may arrive as strings and flags as numbers. A value of the wrong
/// shape decodes as absent and is logged, so one bad field never rejects the
/// whole document.
mod lenient {
    use std::collections::HashMap;
    use std::fmt;

    use serde::de::{DeserializeOwned, Deserializer, Error, MapAccess, SeqAccess, Visitor};
    use serde::Deserialize;
    use serde_json::Value;

    use super::{AutomationSpec, DialogueSource, PageBuckets};

    fn ignored(value: &Value) {
        tracing::warn!(%value, "ignoring unusable config value");
    }

    fn as_text(value: &Value) -> Option<String> {
        match value {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    fn text_item(value: &Value) -> Option<String> {
        let text = as_text(value);
        if text.is_none() && !value.is_null() {
            ignored(value);
        }
        text
    }

    /// Text items of an array; `None` for anything that is not an array.
    pub(super) fn lines(value: &Value) -> Option<Vec<String>> {
        match value {
            Value::Array(items) => Some(items.iter().filter_map(text_item).collect()),
            Value::Null => None,
            other => {
                ignored(other);
                None
            }
        }
    }

    pub(super) fn number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        let value = Value::deserialize(d)?;
        let parsed = match &value {
            Value::Null => return Ok(None),
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        if parsed.is_none() {
            ignored(&value);
        }
        Ok(parsed)
    }

    /// JavaScript truthiness.
    pub(super) fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Null => None,
            Value::Bool(b) => Some(b),
            Value::Number(n) => Some(n.as_f64().is_some_and(|v| v != 0.0 && !v.is_nan())),
            Value::String(s) => Some(!s.is_empty()),
            Value::Array(_) | Value::Object(_) => Some(true),
        })
    }

    pub(super) fn text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(text_item(&Value::deserialize(d)?))
    }

    pub(super) fn message<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        Ok(text(d)?.unwrap_or_default())
    }

    pub(super) fn text_list<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<Vec<String>>, D::Error> {
        Ok(lines(&Value::deserialize(d)?))
    }

    pub(super) fn text_map<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<HashMap<String, String>>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Null => None,
            Value::Object(entries) => Some(
                entries
                    .into_iter()
                    .filter_map(|(key, value)| text_item(&value).map(|text| (key, text)))
                    .collect(),
            ),
            other => {
                ignored(&other);
                None
            }
        })
    }

    pub(super) fn object<'de, D, T>(d: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        let value = Value::deserialize(d)?;
        if value.is_null() {
            return Ok(None);
        }
        match T::deserialize(value) {
            Ok(decoded) => Ok(Some(decoded)),
            Err(err) => {
                tracing::warn!(%err, "ignoring unusable config value");
                Ok(None)
            }
        }
    }

    pub(super) fn or_default<'de, D, T>(d: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned + Default,
    {
        Ok(object(d)?.unwrap_or_default())
    }

    /// Entries that do not decode as an automation are dropped one by one.
    pub(super) fn automations<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<Vec<AutomationSpec>>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Null => None,
            Value::Array(items) => Some(
                items
                    .into_iter()
                    .filter_map(|item| match AutomationSpec::deserialize(item) {
                        Ok(spec) => Some(spec),
                        Err(err) => {
                            tracing::warn!(%err, "dropping unusable automation");
                            None
                        }
                    })
                    .collect(),
            ),
            other => {
                ignored(&other);
                None
            }
        })
    }

    /// Streams the dialogue so page buckets keep document order.
    pub(super) fn dialogue<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<DialogueSource>, D::Error> {
        d.deserialize_any(DialogueVisitor)
    }

    struct DialogueVisitor;

    impl DialogueVisitor {
        fn ignore<E: Error>(value: Value) -> Result<Option<DialogueSource>, E> {
            ignored(&value);
            Ok(None)
        }
    }

    impl<'de> Visitor<'de> for DialogueVisitor {
        type Value = Option<DialogueSource>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a list of lines or a map of page buckets")
        }

        fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
            let mut lines = Vec::new();
            while let Some(item) = seq.next_element::<Value>()? {
                lines.extend(text_item(&item));
            }
            Ok(Some(DialogueSource::Lines(lines)))
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut buckets = PageBuckets::new();
            while let Some((key, value)) = map.next_entry::<String, Value>()? {
                if let Some(lines) = lines(&value) {
                    buckets.insert(key, lines);
                }
            }
            Ok(Some(DialogueSource::Pages(buckets)))
        }

        fn visit_unit<E: Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_none<E: Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<Self::Value, D::Error> {
            d.deserialize_any(self)
        }

        fn visit_bool<E: Error>(self, v: bool) -> Result<Self::Value, E> {
            Self::ignore(Value::Bool(v))
        }

        fn visit_i64<E: Error>(self, v: i64) -> Result<Self::Value, E> {
            Self::ignore(Value::from(v))
        }

        fn visit_u64<E: Error>(self, v: u64) -> Result<Self::Value, E> {
            Self::ignore(Value::from(v))
        }

        fn visit_f64<E: Error>(self, v: f64) -> Result<Self::Value, E> {
            Self::ignore(Value::from(v))
        }

        fn visit_str<E: Error>(self, v: &str) -> Result<Self::Value, E> {
            Self::ignore(Value::from(v))
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Normalized settings
// ─────────────────────────────────────────────────────────────────────────────

/// A normalized automation trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Automation {
    /// Say `message` once, `delay` after start.
    TimeOnPage { message: String, delay: Duration },
    /// Say `message` when any element matching `selector` is hovered.
    ElementHover { message: String, selector: String },
    /// Say `message` once after `delay` without pointer, scroll, or key input.
    Inactivity { message: String, delay: Duration },
}

impl Automation {
    /// The line this automation speaks.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Automation::TimeOnPage { message, .. }
            | Automation::ElementHover { message, .. }
            | Automation::Inactivity { message, .. } => message,
        }
    }

    fn from_spec(spec: &AutomationSpec) -> Option<Self> {
        let message = spec.message.clone();
        match spec.trigger_type {
            TriggerKind::TimeOnPage => Some(Automation::TimeOnPage {
                message,
                delay: seconds_or(spec.config.seconds, DEFAULT_TIME_ON_PAGE_SECS),
            }),
            TriggerKind::ElementHover => match spec.config.selector.as_deref() {
                Some(selector) if !selector.trim().is_empty() => Some(Automation::ElementHover {
                    message,
                    selector: selector.to_string(),
                }),
                _ => {
                    tracing::debug!("dropping element_hover automation without a selector");
                    None
                }
            },
            TriggerKind::Inactivity => Some(Automation::Inactivity {
                message,
                delay: seconds_or(spec.config.seconds, DEFAULT_INACTIVITY_SECS),
            }),
            TriggerKind::Unknown => {
                tracing::debug!("dropping automation with unknown trigger type");
                None
            }
        }
    }
}

/// Timing parameters for movement, animation, and chatter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timing {
    /// Pixels moved per movement tick.
    pub idle_speed: f64,
    pub move_interval: Duration,
    pub animation_interval: Duration,
    pub direction_change_interval: Duration,
    /// Cooldown tail after a message hides.
    pub message_cooldown: Duration,
    /// Interval between idle lines.
    pub idle_message_interval: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            idle_speed: IDLE_SPEED_PX,
            move_interval: MOVE_INTERVAL,
            animation_interval: Duration::from_secs_f64(DEFAULT_ANIMATION_MS / 1000.0),
            direction_change_interval: DIRECTION_CHANGE_INTERVAL,
            message_cooldown: MESSAGE_COOLDOWN,
            idle_message_interval: Duration::from_secs_f64(DEFAULT_FREQUENCY_SECS),
        }
    }
}

/// Visual theme for the sprite glow, portal, and speech bubble.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Theme {
    pub portal_color: String,
    pub bubble_background: String,
    pub bubble_text: String,
    pub bubble_border: String,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            portal_color: DEFAULT_PORTAL_COLOR.to_string(),
            bubble_background: DEFAULT_BUBBLE_BACKGROUND.to_string(),
            bubble_text: DEFAULT_BUBBLE_TEXT.to_string(),
            bubble_border: DEFAULT_BUBBLE_BORDER.to_string(),
        }
    }
}

/// Fully populated, immutable engine settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub character: CharacterMap,
    pub welcome_messages: Vec<String>,
    pub dialogue: DialogueSource,
    pub automations: Vec<Automation>,
    pub timing: Timing,
    pub theme: Theme,
    pub preview_mode: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_config(&WebuddyConfig::default())
    }
}

impl Settings {
    /// Merge a caller configuration with defaults.
    #[must_use]
    pub fn from_config(config: &WebuddyConfig) -> Self {
        let character = config
            .character
            .as_ref()
            .map(|map| CharacterMap::from_iter(map.clone()))
            .unwrap_or_else(CharacterMap::default_orbs);

        let bubble = config.speech_bubble.clone().unwrap_or_default();
        let theme = Theme {
            portal_color: non_empty(config.portal_color.as_deref(), DEFAULT_PORTAL_COLOR),
            bubble_background: non_empty(
                bubble.background_color.as_deref(),
                DEFAULT_BUBBLE_BACKGROUND,
            ),
            bubble_text: non_empty(bubble.text_color.as_deref(), DEFAULT_BUBBLE_TEXT),
            bubble_border: non_empty(bubble.border_color.as_deref(), DEFAULT_BUBBLE_BORDER),
        };

        let timing = Timing {
            animation_interval: millis_or(config.animation_speed, DEFAULT_ANIMATION_MS),
            idle_message_interval: seconds_or(config.frequency, DEFAULT_FREQUENCY_SECS),
            ..Timing::default()
        };

        let automations = config
            .automations
            .iter()
            .flatten()
            .filter_map(Automation::from_spec)
            .collect();

        Self {
            character,
            welcome_messages: config.welcome_messages.clone().unwrap_or_default(),
            dialogue: config.dialogue.clone().unwrap_or_default(),
            automations,
            timing,
            theme,
            preview_mode: config.preview_mode.unwrap_or(false),
        }
    }
}

fn non_empty(value: Option<&str>, default: &str) -> String {
    match value {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => default.to_string(),
    }
}

fn positive(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v > 0.0)
}

fn seconds_or(value: Option<f64>, default: f64) -> Duration {
    positive(value)
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .unwrap_or_else(|| Duration::from_secs_f64(default))
}

fn millis_or(value: Option<f64>, default: f64) -> Duration {
    seconds_or(value.map(|ms| ms / 1000.0), default / 1000.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_document_yields_defaults() {
        let settings = Settings::from_config(&WebuddyConfig::from_json("{}").unwrap());
        assert_eq!(settings.character, CharacterMap::default_orbs());
        assert!(settings.welcome_messages.is_empty());
        assert!(settings.automations.is_empty());
        assert!(!settings.preview_mode);
        assert_eq!(settings.timing.idle_message_interval, Duration::from_secs(20));
        assert_eq!(settings.timing.animation_interval, Duration::from_millis(200));
        assert_eq!(settings.timing.move_interval, Duration::from_millis(50));
        assert_eq!(settings.theme, Theme::default());
        match settings.dialogue {
            DialogueSource::Pages(buckets) => {
                assert_eq!(
                    buckets.get(DEFAULT_BUCKET),
                    Some(&["Hello!".to_string(), "I'm your Webuddy.".to_string()][..])
                );
            }
            DialogueSource::Lines(_) => panic!("default dialogue should be bucketed"),
        }
    }

    #[test]
    fn zero_and_empty_values_fall_back() {
        let doc = r#"{"frequency": 0, "animationSpeed": -5, "portalColor": ""}"#;
        let settings = Settings::from_config(&WebuddyConfig::from_json(doc).unwrap());
        assert_eq!(settings.timing.idle_message_interval, Duration::from_secs(20));
        assert_eq!(settings.timing.animation_interval, Duration::from_millis(200));
        assert_eq!(settings.theme.portal_color, DEFAULT_PORTAL_COLOR);
    }

    #[test]
    fn caller_values_override_defaults() {
        let doc = r##"{
            "character": {"up": "https://cdn/up.png", "up-2": "https://cdn/up2.png"},
            "welcome_messages": ["Hi", "Welcome aboard"],
            "frequency": 7.5,
            "animationSpeed": 120,
            "portalColor": "#ff00ff",
            "speechBubble": {"textColor": "#000"},
            "previewMode": true
        }"##;
        let settings = Settings::from_config(&WebuddyConfig::from_json(doc).unwrap());
        assert_eq!(settings.character.get("up-2"), Some("https://cdn/up2.png"));
        assert_eq!(settings.character.get("down"), None);
        assert_eq!(settings.welcome_messages, vec!["Hi", "Welcome aboard"]);
        assert_eq!(settings.timing.idle_message_interval, Duration::from_millis(7500));
        assert_eq!(settings.timing.animation_interval, Duration::from_millis(120));
        assert_eq!(settings.theme.portal_color, "#ff00ff");
        assert_eq!(settings.theme.bubble_text, "#000");
        assert_eq!(settings.theme.bubble_background, DEFAULT_BUBBLE_BACKGROUND);
        assert!(settings.preview_mode);
    }

    #[test]
    fn dialogue_accepts_flat_list() {
        let config = WebuddyConfig::from_json(r#"{"dialogue": ["A", "B"]}"#).unwrap();
        assert_eq!(
            config.dialogue,
            Some(DialogueSource::Lines(vec!["A".into(), "B".into()]))
        );
    }

    #[test]
    fn page_buckets_keep_document_order() {
        let doc = r#"{"dialogue": {"z.com/": ["Z"], "a.com/": ["A"], "default": ["D"]}}"#;
        let config = WebuddyConfig::from_json(doc).unwrap();
        let Some(DialogueSource::Pages(buckets)) = config.dialogue else {
            panic!("expected page buckets");
        };
        let keys: Vec<&str> = buckets.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["z.com/", "a.com/", "default"]);
    }

    #[test]
    fn page_buckets_serialize_back_in_order() {
        let buckets = PageBuckets::from_iter([
            ("b".to_string(), vec!["1".to_string()]),
            ("a".to_string(), vec!["2".to_string()]),
        ]);
        let json = serde_json::to_string(&DialogueSource::Pages(buckets)).unwrap();
        assert_eq!(json, r#"{"b":["1"],"a":["2"]}"#);
    }

    #[test]
    fn automations_normalize_with_defaults() {
        let doc = r##"{"automations": [
            {"triggerType": "time_on_page", "message": "Still here?", "config": {}},
            {"triggerType": "element_hover", "message": "Nice button", "config": {"selector": "#buy"}},
            {"triggerType": "element_hover", "message": "no selector", "config": {}},
            {"triggerType": "inactivity", "message": "Hello?", "config": {"seconds": 5}},
            {"triggerType": "confetti", "message": "??"}
        ]}"##;
        let settings = Settings::from_config(&WebuddyConfig::from_json(doc).unwrap());
        assert_eq!(
            settings.automations,
            vec![
                Automation::TimeOnPage {
                    message: "Still here?".into(),
                    delay: Duration::from_secs(30),
                },
                Automation::ElementHover {
                    message: "Nice button".into(),
                    selector: "#buy".into(),
                },
                Automation::Inactivity {
                    message: "Hello?".into(),
                    delay: Duration::from_secs(5),
                },
            ]
        );
    }

    #[test]
    fn numeric_strings_are_read_as_numbers() {
        let doc = r#"{"frequency": "30", "animationSpeed": " 150 ", "automations": [
            {"triggerType": "time_on_page", "message": "ok", "config": {"seconds": "10"}}
        ]}"#;
        let settings = Settings::from_config(&WebuddyConfig::from_json(doc).unwrap());
        assert_eq!(settings.timing.idle_message_interval, Duration::from_secs(30));
        assert_eq!(settings.timing.animation_interval, Duration::from_millis(150));
        assert_eq!(
            settings.automations,
            vec![Automation::TimeOnPage {
                message: "ok".into(),
                delay: Duration::from_secs(10),
            }]
        );
    }

    #[test]
    fn wrongly_shaped_values_fall_back_to_defaults() {
        let docs = [
            r#"{"frequency": "soon"}"#,
            r#"{"frequency": [1], "animationSpeed": {"ms": 3}}"#,
            r#"{"portalColor": null, "speechBubble": 4}"#,
            r#"{"welcome_messages": "hi", "dialogue": 12}"#,
            r#"{"character": "red", "previewMode": null}"#,
            r#"{"automations": {"triggerType": "inactivity"}}"#,
        ];
        for doc in docs {
            let settings = Settings::from_config(&WebuddyConfig::from_json(doc).unwrap());
            assert_eq!(settings, Settings::default(), "{doc}");
        }
    }

    #[test]
    fn null_character_entries_are_dropped() {
        let doc = r#"{"character": {"up": null, "down": "green", "left": 7}}"#;
        let settings = Settings::from_config(&WebuddyConfig::from_json(doc).unwrap());
        assert_eq!(settings.character.get("up"), None);
        assert_eq!(settings.character.get("down"), Some("green"));
        assert_eq!(settings.character.get("left"), Some("7"));
    }

    #[test]
    fn automations_without_a_kind_are_dropped_individually() {
        let doc = r#"{"automations": [
            {"message": "no kind"},
            {"triggerType": 3, "message": "numeric kind"},
            null,
            {"triggerType": "inactivity", "message": 42, "config": null}
        ]}"#;
        let settings = Settings::from_config(&WebuddyConfig::from_json(doc).unwrap());
        assert_eq!(
            settings.automations,
            vec![Automation::Inactivity {
                message: "42".into(),
                delay: Duration::from_secs(60),
            }]
        );
    }

    #[test]
    fn preview_flag_follows_truthiness() {
        let flag = |doc: &str| {
            Settings::from_config(&WebuddyConfig::from_json(doc).unwrap()).preview_mode
        };
        assert!(flag(r#"{"previewMode": 1}"#));
        assert!(flag(r#"{"previewMode": "yes"}"#));
        assert!(!flag(r#"{"previewMode": 0}"#));
        assert!(!flag(r#"{"previewMode": ""}"#));
    }

    #[test]
    fn dialogue_skips_unusable_lines_and_buckets() {
        let doc = r#"{"dialogue": {"z.com/": ["Z", null], "bad": "x", "default": ["D", 2]}}"#;
        let config = WebuddyConfig::from_json(doc).unwrap();
        let Some(DialogueSource::Pages(buckets)) = config.dialogue else {
            panic!("expected page buckets");
        };
        let entries: Vec<(&str, &[String])> = buckets.iter().collect();
        assert_eq!(
            entries,
            vec![
                ("z.com/", &["Z".to_string()][..]),
                ("default", &["D".to_string(), "2".to_string()][..]),
            ]
        );

        let flat = WebuddyConfig::from_json(r#"{"dialogue": ["A", {}, "B"]}"#).unwrap();
        assert_eq!(
            flat.dialogue,
            Some(DialogueSource::Lines(vec!["A".into(), "B".into()]))
        );
    }

    #[test]
    fn malformed_document_is_an_error() {
        let err = WebuddyConfig::from_json("{not json").unwrap_err();
        assert!(err.to_string().starts_with("invalid webuddy config"));
    }
}
