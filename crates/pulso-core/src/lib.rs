//! Pulso Core - buffer primitives for the pulso audio engine
//!
//! This crate provides the storage building blocks the synthesis engine
//! renders into: pooled multi-channel sample buffers and the fixed-capacity
//! ring buffer used by physical-modeling synthesis.
//!
//! # Core Abstractions
//!
//! ## Audio Buffers
//!
//! - [`AudioBuffer`] - Per-channel f32 sample storage with additive mixing,
//!   fast silencing, gain scaling, and mono duplication
//! - [`BufferPool`] - Supplies the shared silent template for the engine's
//!   native callback size and zeroed storage for arbitrary lengths
//!
//! Buffers allocated at the pool's native size share a read-only zero
//! template, so silencing them is a straight memory copy instead of a
//! per-sample loop — the common case on the real-time mix path.
//!
//! ```rust
//! use pulso_core::BufferPool;
//!
//! let pool = BufferPool::new(512);
//! let mut buffer = pool.allocate(2, 512);
//!
//! buffer.channel_mut(0)[0] = 0.5;
//! buffer.silence(); // fast path: copies the pooled template
//! assert_eq!(buffer.channel(0)[0], 0.0);
//! ```
//!
//! ## Ring Buffer
//!
//! - [`RingBuffer`] - Fixed-capacity circular f32 queue, sized to one period
//!   of a fundamental frequency for Karplus-Strong string synthesis
//!
//! ```rust
//! use pulso_core::RingBuffer;
//!
//! // one period of a 440 Hz fundamental at 44.1 kHz
//! let mut ring = RingBuffer::for_frequency(44100.0, 440.0);
//! assert_eq!(ring.capacity(), 100);
//! ```
//!
//! # no_std Support
//!
//! This crate is `no_std` compatible (requires `alloc`). Disable the default
//! `std` feature:
//!
//! ```toml
//! [dependencies]
//! pulso-core = { version = "0.1", default-features = false }
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod buffer;
pub mod pool;
pub mod ring;

// Re-export main types at crate root
pub use buffer::AudioBuffer;
pub use pool::BufferPool;
pub use ring::RingBuffer;
