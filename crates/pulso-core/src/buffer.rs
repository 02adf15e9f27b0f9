//! Multi-channel sample buffer with additive mixing semantics.
//!
//! An [`AudioBuffer`] owns one f32 sample vector per channel, all of equal
//! length. It is the unit of work the synthesis engine renders into and the
//! mixer reads from. Buffers are exclusively owned: cloning yields an
//! independent deep copy, and nothing here is shared between two live owners.

use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;

/// Per-channel f32 sample storage for one unit of audio work.
///
/// All channel vectors share the same length (`frames`). The buffer is
/// either backed by a [`BufferPool`](crate::BufferPool) zero template (when
/// its length equals the pool's native callback size — enables fast
/// re-silencing) or by plain zeroed storage for arbitrary lengths such as
/// fully pre-rendered event buffers.
///
/// # Example
///
/// ```rust
/// use pulso_core::AudioBuffer;
///
/// let mut target = AudioBuffer::zeroed(2, 512);
/// let mut source = AudioBuffer::zeroed(2, 128);
/// source.channel_mut(0).fill(0.25);
///
/// // additive mix at half gain, 64 frames into the target
/// let written = target.mix(&source, 0, 64, 0.5);
/// assert_eq!(written, 128);
/// assert_eq!(target.channel(0)[64], 0.125);
/// ```
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    /// One sample vector per channel, each exactly `frames` long.
    channels: Vec<Vec<f32>>,
    /// Buffer length in sample frames.
    frames: usize,
    /// When true, a [`mix`](AudioBuffer::mix) that exhausts this buffer as a
    /// source wraps its read index back to 0 instead of stopping early.
    pub loopable: bool,
    /// Shared zero template, present when this buffer is native-sized.
    template: Option<Arc<[f32]>>,
}

impl AudioBuffer {
    /// Create a buffer with freshly zero-filled storage.
    pub fn zeroed(channels: usize, frames: usize) -> Self {
        Self {
            channels: (0..channels).map(|_| vec![0.0; frames]).collect(),
            frames,
            loopable: false,
            template: None,
        }
    }

    /// Create a buffer by copying a shared silent template into every
    /// channel. The buffer keeps the template handle so later
    /// [`silence`](AudioBuffer::silence) calls are a straight memory copy.
    ///
    /// Used by [`BufferPool::allocate`](crate::BufferPool::allocate) for
    /// native-sized buffers; prefer the pool over calling this directly.
    pub fn from_template(channels: usize, template: Arc<[f32]>) -> Self {
        let frames = template.len();
        Self {
            channels: (0..channels).map(|_| template.to_vec()).collect(),
            frames,
            loopable: false,
            template: Some(template),
        }
    }

    /// Number of channels.
    pub fn channels(&self) -> usize {
        self.channels.len()
    }

    /// Buffer length in sample frames.
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// The channel's samples. `index` must be below
    /// [`channels`](AudioBuffer::channels) — this is a hot-path accessor and
    /// performs no validation of its own.
    #[inline]
    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index]
    }

    /// Mutable access to the channel's samples.
    #[inline]
    pub fn channel_mut(&mut self, index: usize) -> &mut [f32] {
        &mut self.channels[index]
    }

    /// Additively mix `gain × source` into this buffer.
    ///
    /// For every channel common to both buffers, adds
    /// `gain * source[read_offset + k]` into `self[write_offset + k]` for as
    /// many samples as fit within this buffer. When the source runs out of
    /// samples before the write region is exhausted, the read index wraps to
    /// 0 if the source is [`loopable`](AudioBuffer::loopable), otherwise the
    /// mix stops early for that region.
    ///
    /// No-op returning 0 when `write_offset` lies beyond this buffer. No
    /// clipping or limiting is applied — that belongs to a downstream stage.
    ///
    /// Returns the number of samples written per channel.
    pub fn mix(
        &mut self,
        source: &AudioBuffer,
        read_offset: usize,
        write_offset: usize,
        gain: f32,
    ) -> usize {
        if write_offset >= self.frames || source.frames == 0 {
            return 0;
        }

        let source_frames = source.frames;
        let max_write = self.frames;
        let shared_channels = self.channels().min(source.channels());

        let mut written = 0usize;

        for c in 0..shared_channels {
            let src = source.channel(c);
            let dst = &mut self.channels[c];
            let mut r = read_offset;

            for sample in &mut dst[write_offset..max_write] {
                if r >= source_frames {
                    if source.loopable {
                        r = 0;
                    } else {
                        break;
                    }
                }
                *sample += src[r] * gain;
                r += 1;
                written += 1;
            }
        }

        written / shared_channels.max(1)
    }

    /// Reset all channel contents to zero.
    ///
    /// Native-sized buffers copy the pooled silent template; any other
    /// length falls back to a plain fill.
    pub fn silence(&mut self) {
        match &self.template {
            Some(template) if template.len() == self.frames => {
                for channel in &mut self.channels {
                    channel.copy_from_slice(template);
                }
            }
            _ => {
                for channel in &mut self.channels {
                    channel.fill(0.0);
                }
            }
        }
    }

    /// Multiply every sample in every channel by `gain`.
    pub fn scale(&mut self, gain: f32) {
        for channel in &mut self.channels {
            for sample in channel.iter_mut() {
                *sample *= gain;
            }
        }
    }

    /// Copy channel 0's contents into every other channel. No-op for mono
    /// buffers.
    pub fn duplicate_mono(&mut self) {
        let Some((mono, rest)) = self.channels.split_first_mut() else {
            return;
        };
        for channel in rest {
            channel.copy_from_slice(mono);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zeroed_shape() {
        let buffer = AudioBuffer::zeroed(2, 256);
        assert_eq!(buffer.channels(), 2);
        assert_eq!(buffer.frames(), 256);
        assert!(buffer.channel(0).iter().all(|&s| s == 0.0));
        assert!(buffer.channel(1).iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_mix_writes_exact_sample_count() {
        let mut target = AudioBuffer::zeroed(2, 512);
        let mut source = AudioBuffer::zeroed(2, 128);
        source.channel_mut(0).fill(1.0);
        source.channel_mut(1).fill(1.0);

        let written = target.mix(&source, 0, 0, 1.0);
        assert_eq!(written, 128);

        // samples beyond the source length stay untouched
        assert_eq!(target.channel(0)[127], 1.0);
        assert_eq!(target.channel(0)[128], 0.0);
    }

    #[test]
    fn test_mix_is_additive() {
        let mut target = AudioBuffer::zeroed(1, 64);
        let mut source = AudioBuffer::zeroed(1, 64);
        source.channel_mut(0).fill(0.25);

        target.mix(&source, 0, 0, 1.0);
        target.mix(&source, 0, 0, 1.0);

        assert!((target.channel(0)[0] - 0.5).abs() < 1e-7);
    }

    #[test]
    fn test_mix_applies_gain() {
        let mut target = AudioBuffer::zeroed(1, 64);
        let mut source = AudioBuffer::zeroed(1, 64);
        source.channel_mut(0).fill(0.8);

        target.mix(&source, 0, 0, 0.5);
        assert!((target.channel(0)[10] - 0.4).abs() < 1e-7);
    }

    #[test]
    fn test_mix_clips_to_target_bounds() {
        let mut target = AudioBuffer::zeroed(1, 100);
        let mut source = AudioBuffer::zeroed(1, 100);
        source.channel_mut(0).fill(1.0);

        let written = target.mix(&source, 0, 60, 1.0);
        assert_eq!(written, 40, "write region clipped to target length");
        assert_eq!(target.channel(0)[99], 1.0);
    }

    #[test]
    fn test_mix_out_of_bounds_is_noop() {
        let mut target = AudioBuffer::zeroed(1, 64);
        let source = AudioBuffer::zeroed(1, 64);
        assert_eq!(target.mix(&source, 0, 64, 1.0), 0);
        assert_eq!(target.mix(&source, 0, 1000, 1.0), 0);
    }

    #[test]
    fn test_mix_loopable_wraps_read_index() {
        let mut target = AudioBuffer::zeroed(1, 8);
        let mut source = AudioBuffer::zeroed(1, 3);
        source.loopable = true;
        let src = source.channel_mut(0);
        src.copy_from_slice(&[1.0, 2.0, 3.0]);

        let written = target.mix(&source, 0, 0, 1.0);
        assert_eq!(written, 8, "loopable source fills the whole target");
        assert_eq!(
            target.channel(0),
            &[1.0, 2.0, 3.0, 1.0, 2.0, 3.0, 1.0, 2.0]
        );
    }

    #[test]
    fn test_mix_non_loopable_stops_at_source_end() {
        let mut target = AudioBuffer::zeroed(1, 8);
        let mut source = AudioBuffer::zeroed(1, 3);
        source.channel_mut(0).fill(1.0);

        let written = target.mix(&source, 0, 0, 1.0);
        assert_eq!(written, 3);
        assert_eq!(target.channel(0)[3], 0.0);
    }

    #[test]
    fn test_mix_read_offset() {
        let mut target = AudioBuffer::zeroed(1, 4);
        let mut source = AudioBuffer::zeroed(1, 4);
        source
            .channel_mut(0)
            .copy_from_slice(&[1.0, 2.0, 3.0, 4.0]);

        target.mix(&source, 2, 0, 1.0);
        assert_eq!(target.channel(0), &[3.0, 4.0, 0.0, 0.0]);
    }

    #[test]
    fn test_mix_channel_counts_differ() {
        // stereo target, mono source: only channel 0 receives samples
        let mut target = AudioBuffer::zeroed(2, 16);
        let mut source = AudioBuffer::zeroed(1, 16);
        source.channel_mut(0).fill(1.0);

        let written = target.mix(&source, 0, 0, 1.0);
        assert_eq!(written, 16);
        assert_eq!(target.channel(0)[0], 1.0);
        assert_eq!(target.channel(1)[0], 0.0);
    }

    #[test]
    fn test_silence_resets_contents() {
        let mut buffer = AudioBuffer::zeroed(2, 32);
        buffer.channel_mut(0).fill(0.7);
        buffer.channel_mut(1).fill(-0.7);

        buffer.silence();
        assert!(buffer.channel(0).iter().all(|&s| s == 0.0));
        assert!(buffer.channel(1).iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_scale() {
        let mut buffer = AudioBuffer::zeroed(2, 16);
        buffer.channel_mut(0).fill(0.5);
        buffer.channel_mut(1).fill(-0.5);

        buffer.scale(0.5);
        assert!((buffer.channel(0)[0] - 0.25).abs() < 1e-7);
        assert!((buffer.channel(1)[0] + 0.25).abs() < 1e-7);
    }

    #[test]
    fn test_duplicate_mono() {
        let mut buffer = AudioBuffer::zeroed(3, 8);
        buffer.channel_mut(0).fill(0.33);

        buffer.duplicate_mono();
        assert!(buffer.channel(1).iter().all(|&s| s == 0.33));
        assert!(buffer.channel(2).iter().all(|&s| s == 0.33));
    }

    #[test]
    fn test_duplicate_mono_single_channel_noop() {
        let mut buffer = AudioBuffer::zeroed(1, 8);
        buffer.channel_mut(0).fill(0.5);
        buffer.duplicate_mono();
        assert!(buffer.channel(0).iter().all(|&s| s == 0.5));
    }

    #[test]
    fn test_clone_is_independent() {
        let mut original = AudioBuffer::zeroed(2, 16);
        original.channel_mut(0).fill(0.9);

        let mut copy = original.clone();
        assert_eq!(copy.channel(0), original.channel(0));

        copy.silence();
        assert!(copy.channel(0).iter().all(|&s| s == 0.0));
        assert!(original.channel(0).iter().all(|&s| s == 0.9));
    }
}
