//! Pulso Synth - event synthesis engine for the pulso audio engine
//!
//! This crate renders musical events (notes driven by a step sequencer or
//! live performance input) into [`pulso_core`] buffers under real-time
//! constraints.
//!
//! # Core Components
//!
//! ## Events
//!
//! A [`SynthEvent`] owns one note's generator state and output buffer:
//!
//! - Sequenced events occupy a fixed sample window on the timeline and are
//!   mixed per callback with [`SynthEvent::mix_buffer`]
//! - Live events render incrementally with [`SynthEvent::synthesize`] and
//!   ring out a minimum length after release, ending in a click-free fade
//!
//! ```rust
//! use pulso_core::BufferPool;
//! use pulso_synth::{EngineConfig, SynthEvent, SynthPatch, Waveform};
//!
//! let config = EngineConfig::new(44100.0, 512);
//! let pool = BufferPool::new(config.buffer_size);
//!
//! let mut patch = SynthPatch::default();
//! patch.waveform = Waveform::KarplusStrong;
//!
//! let mut note = SynthEvent::live(110.0, &patch, &pool, config);
//! let buffer = note.synthesize(512).unwrap();
//! ```
//!
//! ## Waveforms
//!
//! Seven generators ([`Waveform`]): closed-form parabolic sine, square,
//! triangle and noise carriers, fractional sawtooth, pulse-width modulation
//! with an internal width LFO, and a Karplus-Strong plucked string running
//! on a [`pulso_core::RingBuffer`] delay line.
//!
//! ## Modules
//!
//! - [`AdsrEnvelope`] - positional gain curve spanned over the event length
//! - [`Arpeggiator`] - cyclic pitch table with a sample-accurate step clock
//! - Secondary oscillator (OSC2) - a detuned second voice merged into its
//!   parent's output at an equal-mix factor, configured per
//!   [`SynthPatch`] (cents detune, octave shift, semitone fine shift)
//!
//! ## Playback modes
//!
//! [`EngineConfig::event_caching`] selects, at construction, between
//! streaming (synthesize each callback's slice on demand) and caching
//! (pre-render the full event, play back slices of the cached buffer).
//! Cache renders are cancelled cooperatively: reconfiguring an event
//! mid-render flips its [`CacheState`] to `CancelPending`, the sample loop
//! bails, and the pass epilogue re-renders against fresh geometry. The
//! [`BulkCacher`] spreads full-duration renders across idle time.
//!
//! ## Instruments
//!
//! A [`SynthInstrument`] pairs a [`SynthPatch`] (the synthesis recipe) with
//! registries of its live and sequenced events, addressed by stable
//! [`EventId`]s.
//!
//! ```rust
//! use pulso_synth::{EngineConfig, SynthInstrument, SynthPatch};
//!
//! let mut instrument = SynthInstrument::new(SynthPatch::default(), EngineConfig::default());
//!
//! let note = instrument.note_on(440.0);
//! instrument.note_off(note);
//!
//! // released notes ring out their minimum length, then sweep them out
//! // after mixing:
//! instrument.purge();
//! ```
//!
//! # no_std Support
//!
//! This crate is `no_std` compatible (requires `alloc`). Disable the
//! default `std` feature:
//!
//! ```toml
//! [dependencies]
//! pulso-synth = { version = "0.1", default-features = false }
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod arpeggiator;
pub mod cacher;
pub mod config;
pub mod envelope;
pub mod event;
pub mod instrument;
pub mod waveform;

// Re-export main types at crate root
pub use arpeggiator::Arpeggiator;
pub use cacher::BulkCacher;
pub use config::EngineConfig;
pub use envelope::AdsrEnvelope;
pub use event::{CacheState, OscillatorSelector, SynthEvent};
pub use instrument::{EventId, EventRegistry, SynthInstrument, SynthPatch};
pub use waveform::Waveform;

// Re-export the buffer primitives events render into
pub use pulso_core::{AudioBuffer, BufferPool, RingBuffer};
