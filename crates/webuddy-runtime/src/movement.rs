#![forbid(unsafe_code)]

//! Idle walking: position ticks, random turns, and animation frames.
//!
//! Three periodic timers drive the walk while it is active:
//!
//! | Timer | Interval | Effect |
//! |-------|----------|--------|
//! | step | `move_interval` | advance by `idle_speed`, reflect off the buffered edges |
//! | turn | `direction_change_interval` | random new direction, repaint |
//! | animate | `animation_interval` | alternate frames when a second frame exists |
//!
//! The walk is stopped only by the teleport sequence and by teardown.

use std::time::Duration;

use webuddy_core::{Bounds, CharacterMap, Direction, Frame, Position, RandomSource, Timing, Viewport};

use crate::engine::TimerKind;
use crate::stage::Stage;
use crate::timer::{TimerId, TimerQueue};

#[derive(Debug, Clone, Copy)]
struct WalkTimers {
    step: TimerId,
    turn: TimerId,
    animate: TimerId,
}

/// Sprite position, heading, and animation state.
#[derive(Debug, Clone)]
pub struct Movement {
    position: Position,
    direction: Direction,
    frame: Frame,
    walk: Option<WalkTimers>,
}

impl Movement {
    /// Start heading right from `position`.
    #[must_use]
    pub fn new(position: Position) -> Self {
        Self {
            position,
            direction: Direction::Right,
            frame: Frame::One,
            walk: None,
        }
    }

    #[must_use]
    pub fn position(&self) -> Position {
        self.position
    }

    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    #[must_use]
    pub fn frame(&self) -> Frame {
        self.frame
    }

    #[must_use]
    pub fn is_walking(&self) -> bool {
        self.walk.is_some()
    }

    /// (Re)start the walk. Any running walk is stopped first, which also
    /// repaints frame 1.
    pub fn start<S: Stage>(
        &mut self,
        timers: &mut TimerQueue<TimerKind>,
        stage: &mut S,
        character: &CharacterMap,
        glow: &str,
        timing: &Timing,
        now: Duration,
    ) {
        self.stop(timers, stage, character, glow);
        self.walk = Some(WalkTimers {
            step: timers.every(now, timing.move_interval, TimerKind::MoveStep),
            turn: timers.every(now, timing.direction_change_interval, TimerKind::DirectionChange),
            animate: timers.every(now, timing.animation_interval, TimerKind::AnimationFrame),
        });
    }

    /// Cancel the walk timers and force frame 1.
    pub fn stop<S: Stage>(
        &mut self,
        timers: &mut TimerQueue<TimerKind>,
        stage: &mut S,
        character: &CharacterMap,
        glow: &str,
    ) {
        if let Some(walk) = self.walk.take() {
            timers.cancel(walk.step);
            timers.cancel(walk.turn);
            timers.cancel(walk.animate);
        }
        self.frame = Frame::One;
        self.repaint(stage, character, glow);
    }

    /// One movement tick.
    pub fn step<S: Stage>(&mut self, stage: &mut S, speed: f64) {
        let (position, direction) = advance(
            self.position,
            self.direction,
            speed,
            stage.viewport(),
            stage.sprite_height(),
        );
        self.position = position;
        self.direction = direction;
        stage.place(position);
    }

    /// Pick a new random heading and repaint.
    pub fn turn<S: Stage>(
        &mut self,
        rng: &mut dyn RandomSource,
        stage: &mut S,
        character: &CharacterMap,
        glow: &str,
    ) {
        self.direction = pick_direction(self.direction, rng);
        self.repaint(stage, character, glow);
    }

    /// Alternate animation frames when the heading has a second frame.
    pub fn animate<S: Stage>(&mut self, stage: &mut S, character: &CharacterMap, glow: &str) {
        if character.has_second_frame(self.direction) {
            self.frame = self.frame.toggled();
            self.repaint(stage, character, glow);
        } else {
            self.frame = Frame::One;
        }
    }

    /// Paint the look for the current heading and frame.
    pub fn repaint<S: Stage>(&mut self, stage: &mut S, character: &CharacterMap, glow: &str) {
        let (look, frame) = character.resolve(self.direction, self.frame, glow);
        self.frame = frame;
        if let Some(look) = look {
            stage.paint(&look);
        }
    }

    /// Move without animating (teleport target).
    pub fn relocate(&mut self, position: Position) {
        self.position = position;
    }
}

/// Advance one tick in `direction` and reflect off the buffered edges.
///
/// Vertical and horizontal edges are checked independently; hitting an edge
/// clamps to it and turns to face inward.
#[must_use]
pub fn advance(
    position: Position,
    direction: Direction,
    speed: f64,
    viewport: Viewport,
    sprite_height: f64,
) -> (Position, Direction) {
    let bounds = Bounds::buffered(viewport, sprite_height);
    let horizontal = if viewport.width > 0.0 {
        speed / viewport.width * 100.0
    } else {
        0.0
    };

    let mut top = position.top;
    let mut left = position.left_percent;
    let mut direction = direction;

    match direction {
        Direction::Up => top -= speed,
        Direction::Down => top += speed,
        Direction::Left => left -= horizontal,
        Direction::Right => left += horizontal,
    }

    if top < bounds.top {
        top = bounds.top;
        direction = Direction::Down;
    }
    if top > bounds.bottom {
        top = bounds.bottom;
        direction = Direction::Up;
    }
    if left < bounds.min_left {
        left = bounds.min_left;
        direction = Direction::Right;
    }
    if left > bounds.max_left {
        left = bounds.max_left;
        direction = Direction::Left;
    }

    (Position::new(top, left), direction)
}

/// Random heading with a single reroll when the first pick reverses course.
///
/// A second opposite pick is kept, so reversals are rarer but possible.
pub fn pick_direction(current: Direction, rng: &mut dyn RandomSource) -> Direction {
    let pick = Direction::ALL[rng.pick_index(Direction::ALL.len())];
    if pick == current.opposite() {
        Direction::ALL[rng.pick_index(Direction::ALL.len())]
    } else {
        pick
    }
}
