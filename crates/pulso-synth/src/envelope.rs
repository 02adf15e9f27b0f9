//! Positional ADSR envelope applied over rendered event regions.
//!
//! Unlike a gate-driven per-sample envelope, this curve is evaluated by
//! absolute position within the event: [`set_buffer_length`] spans the
//! A/D/S/R stages over the event's sample length, and [`apply`] multiplies
//! an already-rendered buffer region by the gain at each position. That
//! random-access form is what cached rendering needs — an event can be
//! (re-)rendered from any offset and the envelope lands identically.
//!
//! [`set_buffer_length`]: AdsrEnvelope::set_buffer_length
//! [`apply`]: AdsrEnvelope::apply

use pulso_core::AudioBuffer;

/// Attack-decay-sustain-release gain curve over an event's duration.
///
/// Stage times are normalized fractions (0.0 to 1.0) of the configured
/// buffer length; sustain is a level. A stage set to 0 is disabled. The
/// default envelope is the identity: no attack, no decay, full sustain,
/// no release — a freshly constructed event plays at full gain.
///
/// # Example
///
/// ```rust
/// use pulso_core::AudioBuffer;
/// use pulso_synth::AdsrEnvelope;
///
/// let mut env = AdsrEnvelope::default();
/// env.set_attack(0.25);
/// env.set_buffer_length(1000);
///
/// let mut buffer = AudioBuffer::zeroed(1, 1000);
/// buffer.channel_mut(0).fill(1.0);
/// env.apply(&mut buffer, 0);
///
/// assert_eq!(buffer.channel(0)[0], 0.0); // attack starts from silence
/// assert!((buffer.channel(0)[500] - 1.0).abs() < 1e-6); // past the attack
/// ```
#[derive(Debug, Clone)]
pub struct AdsrEnvelope {
    attack: f32,
    decay: f32,
    sustain: f32,
    release: f32,
    /// Event length in samples the stages are spanned over.
    buffer_length: usize,
}

impl Default for AdsrEnvelope {
    fn default() -> Self {
        Self {
            attack: 0.0,
            decay: 0.0,
            sustain: 1.0,
            release: 0.0,
            buffer_length: 0,
        }
    }
}

impl AdsrEnvelope {
    /// Set attack time as a fraction of the buffer length.
    pub fn set_attack(&mut self, attack: f32) {
        self.attack = attack.clamp(0.0, 1.0);
    }

    /// Attack fraction.
    pub fn attack(&self) -> f32 {
        self.attack
    }

    /// Set decay time as a fraction of the buffer length. 0 disables the
    /// decay stage entirely — gain holds at full level until release.
    pub fn set_decay(&mut self, decay: f32) {
        self.decay = decay.clamp(0.0, 1.0);
    }

    /// Decay fraction.
    pub fn decay(&self) -> f32 {
        self.decay
    }

    /// Set the sustain level.
    pub fn set_sustain(&mut self, sustain: f32) {
        self.sustain = sustain.clamp(0.0, 1.0);
    }

    /// Sustain level.
    pub fn sustain(&self) -> f32 {
        self.sustain
    }

    /// Set release time as a fraction of the buffer length, anchored at the
    /// tail of the event.
    pub fn set_release(&mut self, release: f32) {
        self.release = release.clamp(0.0, 1.0);
    }

    /// Release fraction.
    pub fn release(&self) -> f32 {
        self.release
    }

    /// Copy another envelope's curve parameters, keeping this envelope's
    /// buffer length. Used when an event re-reads its instrument's template.
    pub fn copy_curves(&mut self, other: &AdsrEnvelope) {
        self.attack = other.attack;
        self.decay = other.decay;
        self.sustain = other.sustain;
        self.release = other.release;
    }

    /// Span the stages over an event length in samples.
    pub fn set_buffer_length(&mut self, length: usize) {
        self.buffer_length = length;
    }

    /// Configured event length in samples.
    pub fn buffer_length(&self) -> usize {
        self.buffer_length
    }

    /// Gain at an absolute event position. Positions beyond the configured
    /// length hold the final gain.
    #[inline]
    pub fn gain_at(&self, position: usize) -> f32 {
        let length = self.buffer_length.max(1) as f32;
        let p = (position as f32).min(length);

        let mut gain = 1.0;
        let attack_frames = self.attack * length;

        if p < attack_frames {
            gain = p / attack_frames;
        } else if self.decay > 0.0 {
            let decay_frames = self.decay * length;
            let decay_end = attack_frames + decay_frames;
            if p < decay_end {
                gain = 1.0 + (self.sustain - 1.0) * ((p - attack_frames) / decay_frames);
            } else {
                gain = self.sustain;
            }
        }

        if self.release > 0.0 {
            let release_frames = self.release * length;
            let release_start = length - release_frames;
            if p >= release_start {
                gain *= 1.0 - ((p - release_start) / release_frames).min(1.0);
            }
        }

        gain
    }

    /// Multiply a rendered buffer region by the envelope, reading gains at
    /// `write_offset + frame` — the buffer's position within the event.
    pub fn apply(&self, buffer: &mut AudioBuffer, write_offset: usize) {
        let frames = buffer.frames();
        let channels = buffer.channels();

        for i in 0..frames {
            let gain = self.gain_at(write_offset + i);
            for c in 0..channels {
                buffer.channel_mut(c)[i] *= gain;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_buffer(frames: usize) -> AudioBuffer {
        let mut buffer = AudioBuffer::zeroed(1, frames);
        buffer.channel_mut(0).fill(1.0);
        buffer
    }

    #[test]
    fn test_default_is_identity() {
        let mut env = AdsrEnvelope::default();
        env.set_buffer_length(256);

        let mut buffer = unit_buffer(256);
        env.apply(&mut buffer, 0);
        assert!(buffer.channel(0).iter().all(|&s| s == 1.0));
    }

    #[test]
    fn test_attack_ramps_from_silence() {
        let mut env = AdsrEnvelope::default();
        env.set_attack(0.5);
        env.set_buffer_length(100);

        assert_eq!(env.gain_at(0), 0.0);
        assert!((env.gain_at(25) - 0.5).abs() < 1e-6);
        assert!((env.gain_at(50) - 1.0).abs() < 1e-6);
        assert_eq!(env.gain_at(80), 1.0);
    }

    #[test]
    fn test_decay_falls_to_sustain() {
        let mut env = AdsrEnvelope::default();
        env.set_decay(0.5);
        env.set_sustain(0.4);
        env.set_buffer_length(100);

        assert_eq!(env.gain_at(0), 1.0);
        assert!((env.gain_at(25) - 0.7).abs() < 1e-6);
        assert!((env.gain_at(75) - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_disabled_decay_holds_full_gain() {
        let mut env = AdsrEnvelope::default();
        env.set_decay(0.0);
        env.set_sustain(0.2); // ignored without a decay stage
        env.set_buffer_length(100);

        assert_eq!(env.gain_at(50), 1.0);
        assert_eq!(env.gain_at(99), 1.0);
    }

    #[test]
    fn test_release_reaches_zero_at_end() {
        let mut env = AdsrEnvelope::default();
        env.set_release(0.25);
        env.set_buffer_length(1000);

        assert_eq!(env.gain_at(500), 1.0);
        assert!((env.gain_at(875) - 0.5).abs() < 1e-2);
        assert!(env.gain_at(1000).abs() < 1e-6);
    }

    #[test]
    fn test_apply_honors_write_offset() {
        let mut env = AdsrEnvelope::default();
        env.set_attack(0.5);
        env.set_buffer_length(1000);

        // region starting past the attack stage is untouched
        let mut buffer = unit_buffer(100);
        env.apply(&mut buffer, 600);
        assert!(buffer.channel(0).iter().all(|&s| (s - 1.0).abs() < 1e-6));

        // region at the very start is shaped
        let mut buffer = unit_buffer(100);
        env.apply(&mut buffer, 0);
        assert_eq!(buffer.channel(0)[0], 0.0);
        assert!(buffer.channel(0)[99] < 0.21);
    }

    #[test]
    fn test_copy_curves_keeps_length() {
        let mut template = AdsrEnvelope::default();
        template.set_attack(0.1);
        template.set_decay(0.8);
        template.set_sustain(0.5);

        let mut env = AdsrEnvelope::default();
        env.set_buffer_length(4096);
        env.copy_curves(&template);

        assert_eq!(env.attack(), 0.1);
        assert_eq!(env.decay(), 0.8);
        assert_eq!(env.sustain(), 0.5);
        assert_eq!(env.buffer_length(), 4096);
    }
}
