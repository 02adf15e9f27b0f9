//! Instrument descriptor and the event registries it owns.
//!
//! A [`SynthPatch`] is the synthesis recipe events are built from: waveform,
//! volume, envelope and arpeggiator templates, and the secondary-oscillator
//! settings. A [`SynthInstrument`] pairs a patch with two [`EventRegistry`]
//! arenas (live and sequenced events) addressed by stable [`EventId`]s.
//! Events never remove themselves; the owner removes them by id or sweeps
//! the deletable ones with [`EventRegistry::purge_deletable`].

use alloc::vec::Vec;

use pulso_core::BufferPool;

use crate::arpeggiator::Arpeggiator;
use crate::config::EngineConfig;
use crate::envelope::AdsrEnvelope;
use crate::event::{OscillatorSelector, SynthEvent};
use crate::waveform::Waveform;

/// The synthesis recipe an event clones its modules from.
#[derive(Debug, Clone)]
pub struct SynthPatch {
    /// Primary oscillator waveform.
    pub waveform: Waveform,
    /// Event volume, 0.0 to 1.0.
    pub volume: f32,
    /// Envelope template, cloned per event.
    pub envelope: AdsrEnvelope,
    /// Arpeggiator template, cloned per event when active.
    pub arpeggiator: Arpeggiator,
    /// Whether events run the arpeggiator.
    pub arpeggiator_active: bool,
    /// Whether events carry a secondary oscillator.
    pub osc2_active: bool,
    /// Secondary oscillator waveform.
    pub osc2_waveform: Waveform,
    /// Secondary detune in cents.
    pub osc2_detune: f32,
    /// Secondary octave shift, -2 to +2.
    pub osc2_octave_shift: i32,
    /// Secondary fine shift in semitone steps, -7 to +7.
    pub osc2_fine_shift: i32,
}

impl Default for SynthPatch {
    fn default() -> Self {
        Self {
            waveform: Waveform::Sine,
            volume: 0.8,
            envelope: AdsrEnvelope::default(),
            arpeggiator: Arpeggiator::default(),
            arpeggiator_active: false,
            osc2_active: false,
            osc2_waveform: Waveform::Sine,
            osc2_detune: 0.0,
            osc2_octave_shift: 0,
            osc2_fine_shift: 0,
        }
    }
}

/// Stable handle to an event in an [`EventRegistry`].
///
/// Ids are generational: removing an event invalidates its id, and a slot
/// reused by a later insert hands out a fresh generation. A stale id simply
/// resolves to `None`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EventId {
    slot: u32,
    generation: u32,
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    event: Option<SynthEvent>,
}

/// Slot arena of events with stable ids.
///
/// Mixing iterates the arena through `&mut self`, which serializes iteration
/// against insertion and removal by construction — the registry can never be
/// mutated underneath an in-progress mix pass.
#[derive(Debug, Default)]
pub struct EventRegistry {
    slots: Vec<Slot>,
    free: Vec<u32>,
    len: usize,
}

impl EventRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the registry holds no events.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Insert an event and return its id.
    pub fn insert(&mut self, event: SynthEvent) -> EventId {
        self.len += 1;

        if let Some(slot_index) = self.free.pop() {
            let slot = &mut self.slots[slot_index as usize];
            slot.event = Some(event);
            return EventId {
                slot: slot_index,
                generation: slot.generation,
            };
        }

        let slot_index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            event: Some(event),
        });
        EventId {
            slot: slot_index,
            generation: 0,
        }
    }

    /// Resolve an id to its event, or `None` when the id is stale.
    pub fn get(&self, id: EventId) -> Option<&SynthEvent> {
        let slot = self.slots.get(id.slot as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.event.as_ref()
    }

    /// Mutable access to an event by id.
    pub fn get_mut(&mut self, id: EventId) -> Option<&mut SynthEvent> {
        let slot = self.slots.get_mut(id.slot as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.event.as_mut()
    }

    /// Remove an event, returning it. The id becomes stale.
    pub fn remove(&mut self, id: EventId) -> Option<SynthEvent> {
        let slot = self.slots.get_mut(id.slot as usize)?;
        if slot.generation != id.generation {
            return None;
        }

        let event = slot.event.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.slot);
        self.len -= 1;
        Some(event)
    }

    /// Iterate events with their ids.
    pub fn iter(&self) -> impl Iterator<Item = (EventId, &SynthEvent)> {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            slot.event.as_ref().map(|event| {
                (
                    EventId {
                        slot: i as u32,
                        generation: slot.generation,
                    },
                    event,
                )
            })
        })
    }

    /// Iterate events mutably with their ids.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (EventId, &mut SynthEvent)> {
        self.slots.iter_mut().enumerate().filter_map(|(i, slot)| {
            let generation = slot.generation;
            slot.event.as_mut().map(move |event| {
                (
                    EventId {
                        slot: i as u32,
                        generation,
                    },
                    event,
                )
            })
        })
    }

    /// Collect the ids of all current events.
    pub fn ids(&self) -> Vec<EventId> {
        self.iter().map(|(id, _)| id).collect()
    }

    /// Remove every event flagged for deletion. Returns how many were
    /// removed.
    pub fn purge_deletable(&mut self) -> usize {
        let ids: Vec<EventId> = self
            .iter()
            .filter(|(_, event)| event.is_deletable())
            .map(|(id, _)| id)
            .collect();

        let removed = ids.len();
        for id in ids {
            self.remove(id);
        }
        removed
    }
}

/// An instrument: the patch events are built from plus the registries that
/// own its live and sequenced events.
///
/// # Example
///
/// ```rust
/// use pulso_synth::{EngineConfig, SynthInstrument, SynthPatch, Waveform};
///
/// let mut patch = SynthPatch::default();
/// patch.waveform = Waveform::KarplusStrong;
///
/// let mut instrument = SynthInstrument::new(patch, EngineConfig::default());
/// let id = instrument.note_on(220.0);
///
/// // ... mix callbacks ...
///
/// instrument.note_off(id);
/// ```
#[derive(Debug)]
pub struct SynthInstrument {
    /// The synthesis recipe.
    pub patch: SynthPatch,
    /// Live (performance) events.
    pub live_events: EventRegistry,
    /// Sequenced (timeline) events.
    pub sequenced_events: EventRegistry,
    pool: BufferPool,
    config: EngineConfig,
}

impl SynthInstrument {
    /// Create an instrument for the given patch and engine configuration.
    pub fn new(patch: SynthPatch, config: EngineConfig) -> Self {
        Self {
            patch,
            live_events: EventRegistry::new(),
            sequenced_events: EventRegistry::new(),
            pool: BufferPool::new(config.buffer_size),
            config,
        }
    }

    /// The buffer pool events of this instrument allocate from.
    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }

    /// The engine configuration events are constructed with.
    pub fn config(&self) -> EngineConfig {
        self.config
    }

    /// Start a live note and register it. Returns its id.
    pub fn note_on(&mut self, frequency: f32) -> EventId {
        let event = SynthEvent::live(frequency, &self.patch, &self.pool, self.config);
        self.live_events.insert(event)
    }

    /// Release a live note: it keeps ringing for its minimum length, then
    /// flags itself deletable for the next [`purge`](Self::purge).
    pub fn note_off(&mut self, id: EventId) {
        if let Some(event) = self.live_events.get_mut(id) {
            event.set_deletable(true);
        }
    }

    /// Add a sequenced event at `position` (steps) lasting `length` steps.
    pub fn add_sequenced(
        &mut self,
        frequency: f32,
        position: usize,
        length: f32,
        auto_cache: bool,
    ) -> EventId {
        let event = SynthEvent::sequenced(
            frequency,
            position,
            length,
            auto_cache,
            &self.patch,
            &self.pool,
            self.config,
        );
        self.sequenced_events.insert(event)
    }

    /// Re-read the patch into a sequenced event, moving/resizing it.
    pub fn update_event(
        &mut self,
        id: EventId,
        position: usize,
        length: f32,
        selector: OscillatorSelector,
    ) {
        if let Some(event) = self.sequenced_events.get_mut(id) {
            event.update_properties(position, length, &self.patch, selector);
        }
    }

    /// Remove an event from whichever registry holds it.
    pub fn remove_event(&mut self, id: EventId) {
        if self.live_events.remove(id).is_none() {
            self.sequenced_events.remove(id);
        }
    }

    /// Sweep both registries for events flagged deletable. Returns how many
    /// were removed.
    pub fn purge(&mut self) -> usize {
        self.live_events.purge_deletable() + self.sequenced_events.purge_deletable()
    }
}
