//! Silent-template pool for native-sized buffer allocation.
//!
//! The engine allocates the bulk of its buffers at one fixed size: the
//! native hardware callback length. The pool owns a shared, read-only zero
//! template of that size so those buffers can be created and re-silenced
//! with memory copies. Buffers of any other length (for instance a fully
//! pre-rendered event spanning thousands of frames) get plain zeroed
//! storage and are never pooled.

use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;

use crate::buffer::AudioBuffer;

/// Supplies zero-filled sample storage, with a shared template fast path
/// for the engine's native buffer size.
///
/// # Example
///
/// ```rust
/// use pulso_core::BufferPool;
///
/// let pool = BufferPool::new(512);
///
/// // native size: template-backed, silencing is a memcpy
/// let native = pool.allocate(2, 512);
/// assert_eq!(native.frames(), 512);
///
/// // arbitrary size: freshly zeroed storage
/// let event = pool.allocate(2, 88200);
/// assert_eq!(event.frames(), 88200);
/// ```
#[derive(Debug, Clone)]
pub struct BufferPool {
    native_frames: usize,
    silent: Arc<[f32]>,
}

impl BufferPool {
    /// Create a pool for the given native callback size.
    pub fn new(native_frames: usize) -> Self {
        Self {
            native_frames,
            silent: vec![0.0; native_frames].into(),
        }
    }

    /// The native callback size this pool serves.
    pub fn native_frames(&self) -> usize {
        self.native_frames
    }

    /// Handle to the shared silent template.
    pub fn silent_template(&self) -> Arc<[f32]> {
        Arc::clone(&self.silent)
    }

    /// Allocate a zero-filled buffer. Native-sized requests are backed by
    /// the shared template; all other lengths get fresh storage.
    pub fn allocate(&self, channels: usize, frames: usize) -> AudioBuffer {
        if frames == self.native_frames {
            AudioBuffer::from_template(channels, Arc::clone(&self.silent))
        } else {
            #[cfg(feature = "tracing")]
            tracing::trace!("pool_allocate: unpooled {channels}ch x {frames}");

            AudioBuffer::zeroed(channels, frames)
        }
    }

    /// Allocate raw zeroed sample storage of arbitrary length.
    pub fn allocate_zeroed(&self, frames: usize) -> Vec<f32> {
        vec![0.0; frames]
    }
}
