//! Waveform selection for the event generators.

/// Waveform types synthesized by [`SynthEvent`](crate::SynthEvent).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Waveform {
    /// Sine approximation — pure fundamental tone.
    #[default]
    Sine,
    /// Sawtooth — all harmonics, bright timbre.
    Sawtooth,
    /// Square approximation — odd harmonics, hollow timbre.
    Square,
    /// Triangle — odd harmonics, softer than saw.
    Triangle,
    /// Pulse-width modulation with an internal width LFO.
    Pwm,
    /// Pitched noise — random amplitude on a tonal carrier.
    Noise,
    /// Karplus-Strong plucked string.
    KarplusStrong,
}
