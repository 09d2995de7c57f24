#![forbid(unsafe_code)]

//! Viewport geometry.
//!
//! Vertical positions are document pixels (they include the scroll offset);
//! horizontal positions are a percentage of viewport width so movement is
//! resolution independent.

use crate::rng::RandomSource;

/// Gap kept between the sprite and the top/bottom viewport edges.
pub const VERTICAL_BUFFER: f64 = 150.0;
/// Gap kept between the sprite and the left/right viewport edges.
pub const HORIZONTAL_BUFFER: f64 = 110.0;
/// Sprite height assumed when the host cannot measure it.
pub const FALLBACK_SPRITE_HEIGHT: f64 = 50.0;

/// Visible area of the page as reported by the host.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
    /// Vertical scroll offset of the document.
    pub scroll_y: f64,
}

impl Viewport {
    #[must_use]
    pub const fn new(width: f64, height: f64, scroll_y: f64) -> Self {
        Self {
            width,
            height,
            scroll_y,
        }
    }

    /// Same viewport scrolled to `scroll_y`.
    #[must_use]
    pub const fn scrolled_to(self, scroll_y: f64) -> Self {
        Self { scroll_y, ..self }
    }

    /// Whether a sprite at `top` with `sprite_height` is entirely above or
    /// below the visible area.
    #[must_use]
    pub fn hides(&self, top: f64, sprite_height: f64) -> bool {
        top + sprite_height < self.scroll_y || top > self.scroll_y + self.height
    }
}

/// Sprite position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    /// Document pixels from the top of the page.
    pub top: f64,
    /// Percentage of viewport width.
    pub left_percent: f64,
}

impl Position {
    #[must_use]
    pub const fn new(top: f64, left_percent: f64) -> Self {
        Self { top, left_percent }
    }

    /// Centre of the current viewport.
    #[must_use]
    pub fn centered(viewport: Viewport) -> Self {
        Self::new(viewport.scroll_y + viewport.height / 2.0, 50.0)
    }
}

/// The buffered rectangle the sprite is kept inside.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub top: f64,
    pub bottom: f64,
    pub min_left: f64,
    pub max_left: f64,
}

impl Bounds {
    /// Viewport shrunk by the fixed buffers and the sprite's own height.
    #[must_use]
    pub fn buffered(viewport: Viewport, sprite_height: f64) -> Self {
        let min_left = if viewport.width > 0.0 {
            HORIZONTAL_BUFFER / viewport.width * 100.0
        } else {
            50.0
        };
        Self {
            top: viewport.scroll_y + VERTICAL_BUFFER,
            bottom: viewport.scroll_y + viewport.height - sprite_height - VERTICAL_BUFFER,
            min_left,
            max_left: 100.0 - min_left,
        }
    }

    #[must_use]
    pub fn contains(&self, position: Position) -> bool {
        position.top >= self.top
            && position.top <= self.bottom
            && position.left_percent >= self.min_left
            && position.left_percent <= self.max_left
    }

    /// Uniformly random point inside the rectangle (top drawn first).
    pub fn sample(&self, rng: &mut dyn RandomSource) -> Position {
        let top = rng.next_f64() * (self.bottom - self.top) + self.top;
        let left = rng.next_f64() * (self.max_left - self.min_left) + self.min_left;
        // Rounding can land one ulp past the far edge.
        Position::new(
            top.min(self.bottom).max(self.top),
            left.min(self.max_left).max(self.min_left),
        )
    }
}

/// Idle walking direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// All directions, in the order random picks index into.
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }

    /// Key used in the character map.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Left => "left",
            Direction::Right => "right",
        }
    }
}
