//! Halton jitter for the ray sampler.

use glam::Vec2;

/// Length of the jitter cycle.
pub const SAMPLE_COUNT: u32 = 64;

/// Radical inverse of `index` in base `radix`.
pub fn halton(index: u32, radix: u32) -> f32 {
    let mut result = 0.0_f32;
    let mut fraction = 1.0 / radix as f32;
    let mut index = index;
    while index > 0 {
        result += (index % radix) as f32 * fraction;
        index /= radix;
        fraction /= radix as f32;
    }
    result
}

/// Frame counter producing base-2/base-3 Halton offsets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HaltonSequence {
    index: u32,
}

impl HaltonSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index used by the next call to [`next_offset`](Self::next_offset).
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn reset(&mut self) {
        self.index = 0;
    }

    /// Offset in [0, 1)² for this frame, then advances the counter.
    pub fn next_offset(&mut self) -> Vec2 {
        let i = self.index & 1023;
        let offset = Vec2::new(halton(i, 2), halton(i, 3));
        self.index += 1;
        if self.index >= SAMPLE_COUNT {
            self.index = 0;
        }
        offset
    }
}
