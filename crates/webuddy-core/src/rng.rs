#![forbid(unsafe_code)]

//! Seedable randomness for direction changes, idle lines, and teleport
//! targets.

use std::collections::VecDeque;

const GOLDEN_GAMMA: u64 = 0x9E37_79B9_7F4A_7C15;

/// Source of uniform random numbers.
pub trait RandomSource {
    /// Next raw 64-bit value.
    fn next_u64(&mut self) -> u64;

    /// Uniform float in `[0, 1)`.
    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Uniform index in `0..len`. `len` must be non-zero.
    fn pick_index(&mut self, len: usize) -> usize {
        let idx = (self.next_f64() * len as f64) as usize;
        idx.min(len.saturating_sub(1))
    }
}

/// xorshift64 generator.
#[derive(Debug, Clone)]
pub struct XorShift64 {
    state: u64,
}

impl XorShift64 {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        let state = seed ^ GOLDEN_GAMMA;
        Self {
            state: if state == 0 { GOLDEN_GAMMA } else { state },
        }
    }
}

impl RandomSource for XorShift64 {
    fn next_u64(&mut self) -> u64 {
        self.state ^= self.state << 13;
        self.state ^= self.state >> 7;
        self.state ^= self.state << 17;
        self.state
    }
}

/// Replays a fixed list of floats, then repeats the last one.
///
/// For tests that need to steer a specific random pick.
#[derive(Debug, Clone)]
pub struct ScriptedRandom {
    values: VecDeque<f64>,
    last: f64,
}

impl ScriptedRandom {
    pub fn new(values: impl IntoIterator<Item = f64>) -> Self {
        Self {
            values: values.into_iter().map(|v| v.clamp(0.0, 0.999_999_999)).collect(),
            last: 0.0,
        }
    }

    /// Queue more values.
    pub fn push(&mut self, value: f64) {
        self.values.push_back(value.clamp(0.0, 0.999_999_999));
    }
}

impl RandomSource for ScriptedRandom {
    fn next_u64(&mut self) -> u64 {
        (self.next_f64() * u64::MAX as f64) as u64
    }

    fn next_f64(&mut self) -> f64 {
        if let Some(v) = self.values.pop_front() {
            self.last = v;
        }
        self.last
    }
}
