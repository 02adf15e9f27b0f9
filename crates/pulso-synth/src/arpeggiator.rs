//! Arpeggiator module — cyclic pitch table with a sample-accurate step clock.
//!
//! Events own a cloned arpeggiator instance. The render loop calls
//! [`peek_step_boundary`](Arpeggiator::peek_step_boundary) once per sample;
//! when it reports a boundary the event snaps its frequency to
//! [`pitch_for_step`](Arpeggiator::pitch_for_step) relative to the event's
//! base frequency, leaving the base itself untouched.

use alloc::vec;
use alloc::vec::Vec;

/// Cyclic semitone-offset sequence stepped by a sample counter.
///
/// # Example
///
/// ```rust
/// use pulso_synth::Arpeggiator;
///
/// let mut arp = Arpeggiator::new(4410); // 100 ms per step at 44.1 kHz
/// arp.set_steps(&[0, 4, 7, 12]); // major chord, octave on top
///
/// // one octave up from a 220 Hz base at step 3
/// let pitch = arp.pitch_for_step(3, 220.0);
/// assert!((pitch - 440.0).abs() < 0.01);
/// ```
#[derive(Debug, Clone)]
pub struct Arpeggiator {
    /// Semitone offsets per step.
    steps: Vec<i8>,
    /// Step duration in samples.
    step_size: usize,
    /// Sample counter within the current step.
    position: usize,
    current_step: usize,
}

impl Default for Arpeggiator {
    fn default() -> Self {
        Self::new(4410)
    }
}

impl Arpeggiator {
    /// Create an arpeggiator with the given step duration in samples and a
    /// single root step.
    pub fn new(step_size: usize) -> Self {
        Self {
            steps: vec![0],
            step_size: step_size.max(1),
            position: 0,
            current_step: 0,
        }
    }

    /// Replace the semitone-offset table. An empty table is treated as a
    /// single root step.
    pub fn set_steps(&mut self, offsets: &[i8]) {
        if offsets.is_empty() {
            self.steps = vec![0];
        } else {
            self.steps = offsets.to_vec();
        }
        self.current_step %= self.steps.len();
    }

    /// Number of steps in the table.
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Set the step duration in samples.
    pub fn set_step_size(&mut self, samples: usize) {
        self.step_size = samples.max(1);
    }

    /// Step duration in samples.
    pub fn step_size(&self) -> usize {
        self.step_size
    }

    /// Index of the step the clock currently sits on.
    pub fn current_step(&self) -> usize {
        self.current_step
    }

    /// Advance the sample clock by one. Returns true when a step boundary
    /// was crossed, after advancing `current_step` cyclically.
    #[inline]
    pub fn peek_step_boundary(&mut self) -> bool {
        self.position += 1;
        if self.position >= self.step_size {
            self.position = 0;
            self.current_step = (self.current_step + 1) % self.steps.len();
            true
        } else {
            false
        }
    }

    /// Pitch for a step relative to a base frequency:
    /// `base × 2^(offset / 12)`. Out-of-range steps fall back to the base.
    pub fn pitch_for_step(&self, step: usize, base_frequency: f32) -> f32 {
        let offset = self.steps.get(step).copied().unwrap_or(0);
        base_frequency * libm::powf(2.0, f32::from(offset) / 12.0)
    }
}
