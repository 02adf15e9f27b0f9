//! Sequence demo: sequenced events, live notes, and cached playback.
//!
//! Run with: cargo run -p pulso-synth --example sequence_demo

use pulso_core::AudioBuffer;
use pulso_synth::{BulkCacher, EngineConfig, SynthInstrument, SynthPatch, Waveform};

fn peak(buffer: &AudioBuffer) -> f32 {
    buffer
        .channel(0)
        .iter()
        .fold(0.0f32, |m, &s| m.max(s.abs()))
}

fn main() {
    let config = EngineConfig::new(44100.0, 512).with_tempo(120.0, 16);

    // --- Streaming playback of a sequenced pattern ---
    println!("=== Streaming a 4-step pattern (120 BPM, 16 steps/bar) ===\n");

    let mut patch = SynthPatch::default();
    patch.waveform = Waveform::Sawtooth;

    let mut instrument = SynthInstrument::new(patch, config);
    for (step, freq) in [(0usize, 220.0), (4, 275.0), (8, 330.0), (12, 440.0)] {
        instrument.add_sequenced(freq, step, 2.0, false);
    }

    println!("Window | Timeline pos | Peak");
    println!("-------+--------------+------");

    let mut output = AudioBuffer::zeroed(config.channels, config.buffer_size);
    for window in 0..12 {
        let buffer_pos = window * config.buffer_size * 12;
        output.silence();

        for (_, event) in instrument.sequenced_events.iter_mut() {
            event.mix_buffer(&mut output, buffer_pos, 0, usize::MAX, false, 0, false);
        }

        println!("{:>6} | {:>12} | {:.3}", window, buffer_pos, peak(&output));
    }

    // --- Cached playback: pre-render in idle time, mix copies slices ---
    println!("\n=== Bulk caching the same pattern ===\n");

    let cached_config = config.with_event_caching(true);
    let mut patch = SynthPatch::default();
    patch.waveform = Waveform::KarplusStrong;

    let mut instrument = SynthInstrument::new(patch, cached_config);
    for (step, freq) in [(0usize, 110.0), (4, 146.8), (8, 164.8), (12, 220.0)] {
        instrument.add_sequenced(freq, step, 2.0, false);
    }

    let mut cacher = BulkCacher::new();
    cacher.add(instrument.sequenced_events.ids());

    let mut rendered = 0;
    while cacher.cache_next(&mut instrument.sequenced_events) {
        rendered += 1;
        println!("cached event {rendered}, {} pending", cacher.pending());
    }

    for (_, event) in instrument.sequenced_events.iter() {
        println!(
            "event @ step sample {:>6}: {} samples cached, completed: {}",
            event.sample_start(),
            event.buffer().map_or(0, |b| b.frames()),
            event.cache_state().is_completed()
        );
    }

    // --- Live note with release ring-out ---
    println!("\n=== Live note: release and ring-out ===\n");

    let mut patch = SynthPatch::default();
    patch.waveform = Waveform::Triangle;

    let mut instrument = SynthInstrument::new(patch, config);
    let note = instrument.note_on(440.0);

    for callback in 0..8 {
        if callback == 2 {
            instrument.note_off(note);
            println!("-- note released --");
        }

        if let Some(event) = instrument.live_events.get_mut(note) {
            if let Some(buffer) = event.synthesize(config.buffer_size) {
                println!("callback {callback}: peak {:.3}", peak(buffer));
            }
        }

        let removed = instrument.purge();
        if removed > 0 {
            println!("-- note swept after ring-out --");
            break;
        }
    }
}
