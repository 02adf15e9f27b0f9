//! Bulk pre-rendering of sequenced events in idle time.
//!
//! Caching a long event is a full-duration render — too much work for the
//! audio callback. The [`BulkCacher`] queues event ids and renders one
//! event's cache per [`cache_next`](BulkCacher::cache_next) call, so the
//! owner can spread the work across idle moments between callbacks and a
//! cancelled render (an event reconfigured mid-queue) simply re-renders on
//! its next turn through the lazy `get_buffer` path.

use alloc::collections::VecDeque;

use crate::instrument::{EventId, EventRegistry};

/// FIFO scheduler that pre-renders queued events one at a time.
///
/// # Example
///
/// ```rust
/// use pulso_synth::{BulkCacher, EngineConfig, SynthInstrument, SynthPatch};
///
/// let config = EngineConfig::new(44100.0, 512).with_event_caching(true);
/// let mut instrument = SynthInstrument::new(SynthPatch::default(), config);
/// instrument.add_sequenced(440.0, 0, 2.0, false);
/// instrument.add_sequenced(660.0, 4, 2.0, false);
///
/// let mut cacher = BulkCacher::new();
/// cacher.add(instrument.sequenced_events.ids());
///
/// // drive the queue from idle time
/// while cacher.cache_next(&mut instrument.sequenced_events) {}
/// ```
#[derive(Debug, Default)]
pub struct BulkCacher {
    queue: VecDeque<EventId>,
}

impl BulkCacher {
    /// Create an empty cacher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append event ids to the cache queue.
    pub fn add(&mut self, ids: impl IntoIterator<Item = EventId>) {
        self.queue.extend(ids);
    }

    /// Whether queued work remains.
    pub fn has_work(&self) -> bool {
        !self.queue.is_empty()
    }

    /// Number of queued entries.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Drop all queued work.
    pub fn clear(&mut self) {
        self.queue.clear();
    }

    /// Render the cache of the next queued event. Stale ids (events removed
    /// since queueing) are skipped. Returns whether an event was rendered.
    pub fn cache_next(&mut self, events: &mut EventRegistry) -> bool {
        while let Some(id) = self.queue.pop_front() {
            if let Some(event) = events.get_mut(id) {
                // bulk-managed events keep their cache warm across future
                // reconfigurations
                event.set_bulk_cacheable(true);
                event.cache();

                #[cfg(feature = "tracing")]
                tracing::debug!("bulk_cache: {} events remaining", self.queue.len());

                return true;
            }
        }
        false
    }
}
