#![forbid(unsafe_code)]

//! Sprite appearance: character map lookup and animation frames.

use std::collections::HashMap;

use crate::geometry::Direction;

/// Animation frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Frame {
    #[default]
    One,
    Two,
}

impl Frame {
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Frame::One => Frame::Two,
            Frame::Two => Frame::One,
        }
    }

    #[must_use]
    pub const fn number(self) -> u8 {
        match self {
            Frame::One => 1,
            Frame::Two => 2,
        }
    }
}

/// How the sprite should be painted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Look {
    /// Background image, no fill and no glow.
    Image { url: String },
    /// Filled glowing circle.
    Orb { color: String, glow: String },
}

impl Look {
    /// Interpret a character-map value. Values starting with `http`, `/`, or
    /// `data:` are images; everything else is a CSS colour.
    #[must_use]
    pub fn from_value(value: &str, glow: &str) -> Self {
        if value.starts_with("http") || value.starts_with('/') || value.starts_with("data:") {
            Look::Image {
                url: value.to_string(),
            }
        } else {
            Look::Orb {
                color: value.to_string(),
                glow: glow.to_string(),
            }
        }
    }
}

/// Images or colours keyed by `direction` or `direction-frame`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CharacterMap {
    entries: HashMap<String, String>,
}

impl CharacterMap {
    /// The built-in coloured circles.
    #[must_use]
    pub fn default_orbs() -> Self {
        Self::from_iter([
            ("up".to_string(), "red".to_string()),
            ("down".to_string(), "green".to_string()),
            ("left".to_string(), "blue".to_string()),
            ("right".to_string(), "yellow".to_string()),
        ])
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Whether `direction` has a second animation frame.
    #[must_use]
    pub fn has_second_frame(&self, direction: Direction) -> bool {
        self.get(&frame_key(direction, Frame::Two)).is_some()
    }

    /// Resolve the look for `direction` at `frame`.
    ///
    /// Falls back to the bare direction key (and reports [`Frame::One`]) when
    /// the framed key is missing. Returns `None` for the look when neither key
    /// exists, in which case the sprite keeps its current paint.
    #[must_use]
    pub fn resolve(&self, direction: Direction, frame: Frame, glow: &str) -> (Option<Look>, Frame) {
        if let Some(value) = self.get(&frame_key(direction, frame)) {
            return (Some(Look::from_value(value, glow)), frame);
        }
        let look = self
            .get(direction.as_str())
            .map(|value| Look::from_value(value, glow));
        (look, Frame::One)
    }
}

impl FromIterator<(String, String)> for CharacterMap {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

fn frame_key(direction: Direction, frame: Frame) -> String {
    format!("{}-{}", direction.as_str(), frame.number())
}
