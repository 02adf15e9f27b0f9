//! Property-based tests for pulso-core buffer primitives.
//!
//! Tests mix bounds/wraparound arithmetic, silence idempotence, clone
//! independence, and ring-buffer energy decay using proptest for randomized
//! input generation.

use proptest::prelude::*;
use pulso_core::{AudioBuffer, BufferPool, RingBuffer};

/// Build a buffer whose channel 0 carries the given samples.
fn buffer_with_samples(samples: &[f32], loopable: bool) -> AudioBuffer {
    let mut buffer = AudioBuffer::zeroed(1, samples.len());
    buffer.channel_mut(0).copy_from_slice(samples);
    buffer.loopable = loopable;
    buffer
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// For a target of length N and non-loopable source of length M <= N,
    /// `mix` writes exactly `min(M, N - write_offset)` samples per channel
    /// and leaves the remainder untouched.
    #[test]
    fn mix_write_count_non_loopable(
        target_len in 1usize..512,
        source_len in 1usize..512,
        write_offset in 0usize..1024,
        samples in prop::collection::vec(-1.0f32..=1.0f32, 1..=512),
    ) {
        let source_len = source_len.min(samples.len());
        let source = buffer_with_samples(&samples[..source_len], false);
        let mut target = AudioBuffer::zeroed(1, target_len);

        let written = target.mix(&source, 0, write_offset, 1.0);

        let expected = if write_offset >= target_len {
            0
        } else {
            source_len.min(target_len - write_offset)
        };
        prop_assert_eq!(written, expected);

        // everything outside the written region is untouched
        for (i, &sample) in target.channel(0).iter().enumerate() {
            if i < write_offset || i >= write_offset + expected {
                prop_assert_eq!(sample, 0.0, "sample {} outside write region", i);
            }
        }
    }

    /// With a loopable source and write_offset 0, `mix` fills the entire
    /// target, wrapping the source read index at the source length.
    #[test]
    fn mix_loopable_fills_target(
        target_len in 1usize..512,
        samples in prop::collection::vec(-1.0f32..=1.0f32, 1..=64),
    ) {
        let source = buffer_with_samples(&samples, true);
        let mut target = AudioBuffer::zeroed(1, target_len);

        let written = target.mix(&source, 0, 0, 1.0);
        prop_assert_eq!(written, target_len);

        for (i, &sample) in target.channel(0).iter().enumerate() {
            let expected = samples[i % samples.len()];
            prop_assert!(
                (sample - expected).abs() < 1e-6,
                "wrapped read mismatch at {}: {} vs {}", i, sample, expected
            );
        }
    }

    /// silence() followed by mixing a zero source leaves the buffer zero,
    /// and mixing is linear in the gain argument.
    #[test]
    fn silence_then_zero_mix_is_noop(
        len in 1usize..256,
        gain in -2.0f32..=2.0f32,
    ) {
        let mut target = AudioBuffer::zeroed(2, len);
        target.channel_mut(0).fill(0.5);
        target.silence();

        let zero_source = AudioBuffer::zeroed(2, len);
        target.mix(&zero_source, 0, 0, gain);

        prop_assert!(target.channel(0).iter().all(|&s| s == 0.0));
        prop_assert!(target.channel(1).iter().all(|&s| s == 0.0));
    }

    /// clone() then silence() on the clone never mutates the original.
    #[test]
    fn clone_is_independent(
        samples in prop::collection::vec(-1.0f32..=1.0f32, 1..=256),
    ) {
        let original = buffer_with_samples(&samples, false);
        let mut copy = original.clone();
        copy.silence();
        copy.scale(3.0);

        prop_assert_eq!(original.channel(0), &samples[..]);
    }

    /// scale(a) then scale(b) equals scale(a * b) within float tolerance.
    #[test]
    fn scale_composes(
        samples in prop::collection::vec(-1.0f32..=1.0f32, 1..=128),
        a in 0.0f32..=2.0f32,
        b in 0.0f32..=2.0f32,
    ) {
        let mut sequential = buffer_with_samples(&samples, false);
        sequential.scale(a);
        sequential.scale(b);

        let mut combined = buffer_with_samples(&samples, false);
        combined.scale(a * b);

        for (x, y) in sequential.channel(0).iter().zip(combined.channel(0)) {
            prop_assert!((x - y).abs() < 1e-5);
        }
    }

    /// Pooled and unpooled allocations are indistinguishable in contents.
    #[test]
    fn pooled_allocation_is_zeroed(
        native in 16usize..512,
        channels in 1usize..4,
    ) {
        let pool = BufferPool::new(native);
        let buffer = pool.allocate(channels, native);
        for c in 0..channels {
            prop_assert!(buffer.channel(c).iter().all(|&s| s == 0.0));
        }
    }

    /// With decay below 1.0, the Karplus-Strong feedback update drives the
    /// ring's energy (sum of squares) toward zero: energy measured after
    /// each full period never increases, and is far below the seed energy
    /// after many periods.
    #[test]
    fn karplus_strong_energy_decays(
        seed in prop::collection::vec(-1.0f32..=1.0f32, 8..=64),
        decay in 0.9f32..=0.995f32,
    ) {
        let period = seed.len();
        let mut ring = RingBuffer::new(period);
        for &v in &seed {
            ring.enqueue(v);
        }

        let energy = |ring: &mut RingBuffer| -> f32 {
            // drain and re-enqueue to inspect contents without losing them
            let mut total = 0.0;
            for _ in 0..period {
                let v = ring.dequeue();
                total += v * v;
                ring.enqueue(v);
            }
            total
        };

        let mut previous = energy(&mut ring);
        let initial = previous;

        for _ in 0..64 {
            for _ in 0..period {
                let mixed = decay * (ring.dequeue() + ring.peek()) / 2.0;
                ring.enqueue(mixed);
            }
            let current = energy(&mut ring);
            prop_assert!(
                current <= previous + 1e-6,
                "period energy increased: {} -> {}", previous, current
            );
            previous = current;
        }

        prop_assert!(
            previous <= initial * 0.5 + 1e-6,
            "energy failed to decay: {} -> {}", initial, previous
        );
    }
}
