//! Engine configuration injected at event construction.
//!
//! The sequencer owns tempo and transport; what the synthesis core needs
//! from it is fixed here at construction time: the sample rate, the native
//! hardware callback size, the output channel count, the sample length of
//! one sequencer step and of one bar, and which of the two playback modes
//! (streaming vs. pre-rendered caching) events operate in.

/// Engine-wide rendering parameters, fixed per event at construction.
///
/// A plain `Copy` value — pass it by value wherever events are created.
/// Both playback modes are selected here rather than through a global
/// toggle, so each can be exercised independently.
///
/// # Example
///
/// ```rust
/// use pulso_synth::EngineConfig;
///
/// let config = EngineConfig::new(44100.0, 512)
///     .with_tempo(120.0, 16)
///     .with_event_caching(true);
/// assert_eq!(config.samples_per_bar, 88200);
/// assert_eq!(config.samples_per_tick, 5512);
/// ```
#[derive(Clone, Copy, Debug)]
pub struct EngineConfig {
    /// Output sample rate in Hz.
    pub sample_rate: f32,
    /// Native hardware callback length in sample frames.
    pub buffer_size: usize,
    /// Output channel count.
    pub channels: usize,
    /// Sample length of one sequencer step.
    pub samples_per_tick: usize,
    /// Sample length of one bar.
    pub samples_per_bar: usize,
    /// When true, sequenced events pre-render their full duration into an
    /// owned buffer and playback reads cached slices; when false, events
    /// synthesize on demand per callback.
    pub event_caching: bool,
}

impl EngineConfig {
    /// Create a configuration for the given sample rate and native callback
    /// size: stereo output, 120 BPM, 16 steps per bar, streaming playback.
    pub fn new(sample_rate: f32, buffer_size: usize) -> Self {
        Self {
            sample_rate,
            buffer_size,
            channels: 2,
            samples_per_tick: 0,
            samples_per_bar: 0,
            event_caching: false,
        }
        .with_tempo(120.0, 16)
    }

    /// Derive step and bar lengths from a tempo in BPM (four beats per bar)
    /// and a step count per bar.
    pub fn with_tempo(mut self, bpm: f32, steps_per_bar: usize) -> Self {
        self.samples_per_bar = (self.sample_rate * 240.0 / bpm) as usize;
        self.samples_per_tick = self.samples_per_bar / steps_per_bar.max(1);
        self
    }

    /// Select the playback mode.
    pub fn with_event_caching(mut self, enabled: bool) -> Self {
        self.event_caching = enabled;
        self
    }

    /// Set the output channel count.
    pub fn with_channels(mut self, channels: usize) -> Self {
        self.channels = channels.max(1);
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new(44100.0, 512)
    }
}
