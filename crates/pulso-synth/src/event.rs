//! Synthesis events: per-note generator state, buffer geometry, and the
//! dual-mode rendering protocol.
//!
//! A [`SynthEvent`] is one note's synthesis state. Sequenced events occupy a
//! fixed sample window on the timeline and either synthesize their audible
//! slice on demand per callback (streaming) or pre-render their entire
//! duration into an owned buffer (caching), selected by
//! [`EngineConfig::event_caching`]. Live events render incrementally per
//! callback until released.
//!
//! Reconfiguration never interrupts a render pass: geometry changes while a
//! cache render is in flight move the event's [`CacheState`] to
//! `CancelPending`, the render loop observes the flag each sample and bails,
//! and the pass epilogue recomputes geometry and starts over. A `locked`
//! event defers geometry recomputation until [`SynthEvent::unlock`].

use pulso_core::{AudioBuffer, BufferPool, RingBuffer};

use crate::arpeggiator::Arpeggiator;
use crate::config::EngineConfig;
use crate::envelope::AdsrEnvelope;
use crate::instrument::SynthPatch;
use crate::waveform::Waveform;

const TWO_PI: f32 = core::f32::consts::TAU;
const PI: f32 = core::f32::consts::PI;

/// Damping factor of the plucked-string feedback loop.
const STRING_DECAY: f32 = 0.990;
/// Pulse-width LFO depth for the PWM generator.
const PWM_WIDTH: f32 = PI / 1.05;
/// Base amplitude of the PWM pulse before makeup gain.
const PWM_AMP: f32 = 0.075;
/// Sample-count divisor driving the PWM width LFO.
const PWM_LFO_DIVISOR: f32 = 18432.0;
/// Equal-mix factor when two oscillators sound together.
const OSC_MIX: f32 = 0.5;

/// Rendering/caching state of an event.
///
/// `Rendering -> CancelPending` is the cooperative cancellation edge: a
/// reconfiguration mid-render never mutates buffers underneath the render
/// loop, it requests cancellation and lets the pass epilogue restart against
/// fresh geometry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CacheState {
    /// No render in progress, no cached contents.
    #[default]
    Idle,
    /// A render pass is filling the buffer.
    Rendering,
    /// Cancellation was requested; the render loop stops at the next sample
    /// and geometry is recomputed in the pass epilogue.
    CancelPending,
    /// The full event duration has been rendered into the owned buffer.
    Completed,
}

impl CacheState {
    /// Whether a render pass is in progress.
    pub fn is_rendering(self) -> bool {
        matches!(self, CacheState::Rendering)
    }

    /// Whether cancellation has been requested.
    pub fn is_cancel_pending(self) -> bool {
        matches!(self, CacheState::CancelPending)
    }

    /// Whether the cached buffer holds the full event.
    pub fn is_completed(self) -> bool {
        matches!(self, CacheState::Completed)
    }
}

/// Which oscillators [`SynthEvent::update_properties`] reconfigures.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OscillatorSelector {
    /// Reconfigure the primary oscillator and the secondary.
    #[default]
    Both,
    /// Primary oscillator only.
    Primary,
    /// Secondary oscillator only.
    Secondary,
}

/// xorshift32 step for noise generation.
#[inline]
fn xorshift(state: u32) -> u32 {
    let mut x = state;
    x ^= x << 13;
    x ^= x >> 17;
    x ^= x << 5;
    x
}

#[inline]
fn noise_to_float(state: u32) -> f32 {
    (state as i32 as f32) / (i32::MAX as f32)
}

/// Parabolic approximation shared by the sine, square, triangle, and noise
/// carriers. Phase is normalized [0, 1).
#[inline]
fn parabolic(phase: f32) -> f32 {
    if phase < 0.5 {
        let t = phase * 4.0 - 1.0;
        1.0 - t * t
    } else {
        let t = phase * 4.0 - 3.0;
        t * t - 1.0
    }
}

/// Per-oscillator generator state: waveform, phase accumulator, string
/// delay line, noise state, and the oscillator's module clone.
///
/// Shared by the primary event and its secondary oscillator — the two
/// differ in lifecycle and buffer ownership, not in how samples are made.
#[derive(Debug, Clone)]
struct OscillatorState {
    waveform: Waveform,
    frequency: f32,
    base_frequency: f32,
    /// Normalized phase accumulator [0, 1). PWM keeps its own radian-domain
    /// phase below and leaves this one untouched.
    phase: f32,
    phase_incr: f32,
    pwm_phase: f32,
    /// Running sample counter driving the PWM width LFO.
    pwm_lfo: f32,
    noise_state: u32,
    /// Plucked-string delay line, present for `Waveform::KarplusStrong`.
    ring: Option<RingBuffer>,
    arpeggiator: Option<Arpeggiator>,
    sample_rate: f32,
}

impl OscillatorState {
    fn new(waveform: Waveform, frequency: f32, sample_rate: f32) -> Self {
        Self {
            waveform,
            frequency,
            base_frequency: frequency,
            phase: 0.0,
            phase_incr: frequency / sample_rate,
            pwm_phase: 0.0,
            pwm_lfo: 0.0,
            noise_state: 0x12345678,
            ring: None,
            arpeggiator: None,
            sample_rate,
        }
    }

    /// Update frequency and phase increment. The phase accumulator is
    /// deliberately left alone — resetting it mid-note pops.
    fn set_frequency(&mut self, frequency: f32, store_as_base: bool) {
        self.frequency = frequency;
        self.phase_incr = frequency / self.sample_rate;

        if store_as_base {
            self.base_frequency = frequency;
        }

        if self.waveform == Waveform::KarplusStrong {
            self.seed_string();
        }
    }

    /// (Re)build the string delay line at one period of the current
    /// frequency and pluck it with fresh noise. An existing ring of the
    /// same rounded period is flushed and re-seeded instead of reallocated.
    fn seed_string(&mut self) {
        let capacity = (libm::roundf(self.sample_rate / self.frequency) as usize).max(1);

        let rebuild = self.ring.as_ref().is_none_or(|r| r.capacity() != capacity);
        if rebuild {
            self.ring = Some(RingBuffer::new(capacity));
        }

        let mut state = self.noise_state;
        if let Some(ring) = self.ring.as_mut() {
            if !rebuild {
                ring.flush();
            }
            for _ in 0..capacity {
                state = xorshift(state);
                ring.enqueue(noise_to_float(state));
            }
        }
        self.noise_state = state;
    }

    /// Produce the next sample's amplitude and advance the phase
    /// accumulator. `index` is the buffer index being written, consumed by
    /// the PWM width LFO.
    #[inline]
    fn generate(&mut self, index: usize) -> f32 {
        let amp = match self.waveform {
            // sines distort easily when events overlap
            Waveform::Sine => parabolic(self.phase) * 0.7,

            Waveform::Sawtooth => self.phase - libm::floorf(self.phase),

            Waveform::Square => {
                let a = if self.phase < 0.5 {
                    let t = TWO_PI * (self.phase * 4.0 - 1.0);
                    1.0 - t * t
                } else {
                    let t = TWO_PI * (self.phase * 4.0 - 3.0);
                    t * t - 1.0
                };
                a * 0.01 // these get loud
            }

            Waveform::Triangle => {
                let a = parabolic(self.phase) * 0.75;
                // the actual triangulation
                if a < 0.0 { -a } else { a }
            }

            Waveform::Pwm => {
                self.pwm_lfo += 1.0;
                let pmv = index as f32 + self.pwm_lfo;
                let dpw = libm::sinf(pmv / PWM_LFO_DIVISOR) * PWM_WIDTH; // LFO -> pulse width

                let a = if self.pwm_phase < PI - dpw {
                    PWM_AMP
                } else {
                    -PWM_AMP
                };

                // PWM runs its own radian-domain phase
                self.pwm_phase += TWO_PI / self.sample_rate * self.frequency;
                if self.pwm_phase > TWO_PI {
                    self.pwm_phase -= TWO_PI;
                }

                a * 4.0 // PWM reads quiet
            }

            Waveform::Noise => {
                // tonal carrier amplitude-modulated by fresh noise
                self.noise_state = xorshift(self.noise_state);
                parabolic(self.phase) * noise_to_float(self.noise_state)
            }

            Waveform::KarplusStrong => match self.ring.as_mut() {
                Some(ring) => {
                    let mixed = STRING_DECAY * (ring.dequeue() + ring.peek()) / 2.0;
                    ring.enqueue(mixed);
                    ring.peek()
                }
                None => 0.0,
            },
        };

        if self.waveform != Waveform::Pwm {
            self.phase += self.phase_incr;
            if self.phase > 1.0 {
                self.phase -= 1.0;
            }
        }

        amp
    }

    /// Step the arpeggiator clock and return the new step's pitch when a
    /// boundary was crossed.
    #[inline]
    fn arpeggiator_pitch(&mut self) -> Option<f32> {
        let base = self.base_frequency;
        self.arpeggiator.as_mut().and_then(|arp| {
            arp.peek_step_boundary()
                .then(|| arp.pitch_for_step(arp.current_step(), base))
        })
    }
}

/// The secondary oscillator voice of an event.
///
/// Owns generator state but no buffer: its output is rendered into a
/// transient scoped to the parent's render pass and merged into the
/// parent's buffer. It is never registered with an instrument, and by
/// construction it cannot own a secondary of its own.
#[derive(Debug, Clone)]
struct Osc2 {
    osc: OscillatorState,
    volume: f32,
    is_sequenced: bool,
    length: f32,
    sample_length: usize,
    /// Cooperative cancellation for the secondary's render loop.
    cancel: bool,
    config: EngineConfig,
}

impl Osc2 {
    fn new(
        frequency: f32,
        is_sequenced: bool,
        length: f32,
        patch: &SynthPatch,
        config: EngineConfig,
    ) -> Self {
        let mut osc2 = Self {
            osc: OscillatorState::new(patch.osc2_waveform, frequency, config.sample_rate),
            volume: patch.volume,
            is_sequenced,
            length,
            sample_length: 0,
            cancel: false,
            config,
        };
        osc2.apply_modules(patch);
        osc2.calculate_geometry();
        osc2
    }

    fn set_frequency(&mut self, frequency: f32, store_as_base: bool) {
        self.osc.set_frequency(frequency, store_as_base);
    }

    fn apply_modules(&mut self, patch: &SynthPatch) {
        self.osc.arpeggiator = patch
            .arpeggiator_active
            .then(|| patch.arpeggiator.clone());

        if patch.arpeggiator_active {
            if let Some(pitch) = self
                .osc
                .arpeggiator
                .as_ref()
                .map(|arp| arp.pitch_for_step(arp.current_step(), self.osc.base_frequency))
            {
                self.osc.set_frequency(pitch, false);
            }
        } else {
            let base = self.osc.base_frequency;
            self.osc.set_frequency(base, true);
        }
    }

    /// Recompute the sample span this voice renders within. No buffer to
    /// allocate — the parent supplies one per render pass.
    fn calculate_geometry(&mut self) {
        self.sample_length = if self.is_sequenced {
            libm::roundf(self.length * self.config.samples_per_tick as f32) as usize
        } else {
            self.config.samples_per_bar
        };

        if self.osc.waveform == Waveform::KarplusStrong && self.is_sequenced {
            self.osc.seed_string();
        }
    }

    fn reset_cache(&mut self) {
        self.cancel = false;
    }

    /// Render this voice into the parent-provided transient buffer. The
    /// secondary contributes at the equal-mix factor; the parent merges the
    /// result at unity gain.
    fn render(&mut self, buffer: &mut AudioBuffer) {
        let frames = buffer.frames();
        let max_index = self.sample_length.saturating_sub(1);

        let render_end = if frames > max_index {
            buffer.silence(); // synthesis will not cover the full width
            max_index
        } else {
            frames
        };

        let channels = buffer.channels();
        let mut cancelled = false;

        for i in 0..render_end {
            let mut amp = self.osc.generate(i);

            if let Some(pitch) = self.osc.arpeggiator_pitch() {
                self.osc.set_frequency(pitch, false);
            }

            amp *= OSC_MIX;
            let value = amp * self.volume;
            for c in 0..channels {
                buffer.channel_mut(c)[i] = value;
            }

            if self.cancel {
                cancelled = true;
                break;
            }
        }

        if cancelled {
            self.calculate_geometry();
        }
        self.cancel = false;
    }
}

/// Result of one render pass, consumed by the caching epilogue.
struct RenderOutcome {
    end_index: usize,
    max_index: usize,
    cancelled: bool,
}

/// One note's synthesis state and buffer.
///
/// Construct with [`SynthEvent::sequenced`] for a fixed timeline window or
/// [`SynthEvent::live`] for an ad-hoc performance note, then register the
/// event with its instrument's registry (or use the convenience methods on
/// [`SynthInstrument`](crate::SynthInstrument), which do both).
///
/// # Example
///
/// ```rust
/// use pulso_core::BufferPool;
/// use pulso_synth::{EngineConfig, SynthEvent, SynthPatch};
///
/// let config = EngineConfig::new(44100.0, 512);
/// let pool = BufferPool::new(config.buffer_size);
/// let patch = SynthPatch::default();
///
/// let mut note = SynthEvent::live(440.0, &patch, &pool, config);
/// let buffer = note.synthesize(512).expect("live events own a buffer");
/// assert_eq!(buffer.frames(), 512);
/// ```
#[derive(Debug)]
pub struct SynthEvent {
    osc: OscillatorState,
    envelope: AdsrEnvelope,
    osc2: Option<Box<Osc2>>,
    /// Owned output storage; spans the full event in caching mode, one
    /// native callback otherwise.
    buffer: Option<AudioBuffer>,
    volume: f32,

    is_sequenced: bool,
    position: usize,
    /// Event length in sequencer steps.
    length: f32,

    sample_start: usize,
    sample_end: usize,
    sample_length: usize,
    cache_write_index: usize,

    cache: CacheState,
    auto_cache: bool,
    bulk_cacheable: bool,

    queued_for_deletion: bool,
    delete_now: bool,
    /// Remaining ring-out samples a released live note must still sound.
    min_length: usize,
    has_min_length: bool,

    locked: bool,
    update_after_unlock: bool,

    pool: BufferPool,
    config: EngineConfig,
}

impl SynthEvent {
    /// Create an event bound to a sequencer window: `position` in steps,
    /// `length` in (fractional) steps. With `auto_cache` and a caching
    /// configuration, every geometry recomputation re-renders the cache
    /// immediately; otherwise caching is driven externally (lazily on
    /// access, or by the [`BulkCacher`](crate::BulkCacher)).
    pub fn sequenced(
        frequency: f32,
        position: usize,
        length: f32,
        auto_cache: bool,
        patch: &SynthPatch,
        pool: &BufferPool,
        config: EngineConfig,
    ) -> Self {
        let mut event = Self::init(frequency, position, length, patch, pool, config, true);
        event.auto_cache = auto_cache;
        event
    }

    /// Create a live (unsequenced) event, rendered incrementally per
    /// callback via [`synthesize`](SynthEvent::synthesize).
    pub fn live(frequency: f32, patch: &SynthPatch, pool: &BufferPool, config: EngineConfig) -> Self {
        Self::init(frequency, 0, 1.0, patch, pool, config, false)
    }

    fn init(
        frequency: f32,
        position: usize,
        length: f32,
        patch: &SynthPatch,
        pool: &BufferPool,
        config: EngineConfig,
        is_sequenced: bool,
    ) -> Self {
        let mut envelope = patch.envelope.clone();

        // a short decay on a one-shot note reads as an abrupt cut; drop the
        // decay stage entirely for live events below the threshold
        if !is_sequenced && envelope.decay() < 0.75 {
            envelope.set_decay(0.0);
        }

        let mut event = Self {
            osc: OscillatorState::new(patch.waveform, frequency, config.sample_rate),
            envelope,
            osc2: None,
            buffer: None,
            volume: patch.volume,
            is_sequenced,
            position,
            length,
            sample_start: 0,
            sample_end: 0,
            sample_length: 0,
            cache_write_index: 0,
            cache: CacheState::Idle,
            auto_cache: false,
            bulk_cacheable: false,
            queued_for_deletion: false,
            delete_now: false,
            min_length: 0,
            has_min_length: is_sequenced, // a sequenced event has no early cancel
            locked: false,
            update_after_unlock: false,
            pool: pool.clone(),
            config,
        };

        if patch.osc2_active {
            event.create_osc2(patch);
        }

        event.set_frequency(frequency);
        event.apply_modules(patch);
        event.calculate_buffers();

        event
    }

    // ------------------------------------------------------------------
    // accessors
    // ------------------------------------------------------------------

    /// Current oscillator frequency in Hz.
    pub fn frequency(&self) -> f32 {
        self.osc.frequency
    }

    /// Stored base frequency — the return point for pitch-shifting modules.
    pub fn base_frequency(&self) -> f32 {
        self.osc.base_frequency
    }

    /// The secondary oscillator's current frequency, when active.
    pub fn osc2_frequency(&self) -> Option<f32> {
        self.osc2.as_ref().map(|o| o.osc.frequency)
    }

    /// Whether a secondary oscillator is active.
    pub fn has_osc2(&self) -> bool {
        self.osc2.is_some()
    }

    /// Event volume.
    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Set the event volume.
    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
    }

    /// The event's envelope.
    pub fn envelope(&self) -> &AdsrEnvelope {
        &self.envelope
    }

    /// Mutable access to the event's envelope.
    pub fn envelope_mut(&mut self) -> &mut AdsrEnvelope {
        &mut self.envelope
    }

    /// First timeline sample this event is audible at.
    pub fn sample_start(&self) -> usize {
        self.sample_start
    }

    /// One past the last timeline sample this event is audible at.
    pub fn sample_end(&self) -> usize {
        self.sample_end
    }

    /// Event duration in samples.
    pub fn sample_length(&self) -> usize {
        self.sample_length
    }

    /// Whether this event is bound to a sequencer window.
    pub fn is_sequenced(&self) -> bool {
        self.is_sequenced
    }

    /// Current cache state.
    pub fn cache_state(&self) -> CacheState {
        self.cache
    }

    /// Whether this event should be removed by the registry sweep.
    pub fn is_deletable(&self) -> bool {
        self.delete_now
    }

    /// Enable re-caching on every geometry recomputation.
    pub fn set_auto_cache(&mut self, auto_cache: bool) {
        self.auto_cache = auto_cache;
    }

    /// Mark this event as managed by bulk caching; a completed render then
    /// keeps the cache warm across future reconfigurations.
    pub fn set_bulk_cacheable(&mut self, bulk_cacheable: bool) {
        self.bulk_cacheable = bulk_cacheable;
    }

    // ------------------------------------------------------------------
    // lifecycle
    // ------------------------------------------------------------------

    /// Mark (or unmark) this event for deletion. Sequenced events and live
    /// events that already satisfied their minimum ring-out length are
    /// flagged for immediate removal; a freshly released live note is
    /// queued instead and keeps sounding until the minimum is rendered.
    pub fn set_deletable(&mut self, value: bool) {
        if self.is_sequenced || self.has_min_length {
            self.delete_now = value;
        } else {
            self.queued_for_deletion = value;
        }
    }

    /// Prevent buffer swaps while a caller is reading the buffer. Geometry
    /// recomputation requested meanwhile is deferred to [`unlock`].
    ///
    /// [`unlock`]: SynthEvent::unlock
    pub fn lock(&mut self) {
        self.locked = true;
    }

    /// Release the lock and run any deferred geometry recomputation.
    pub fn unlock(&mut self) {
        self.locked = false;

        if self.update_after_unlock {
            self.calculate_buffers();
        }
        self.update_after_unlock = false;
    }

    /// Request cooperative cancellation of the current (or next) render
    /// pass. The loop observes the flag at every sample; the pass epilogue
    /// recomputes geometry and clears the flag.
    pub fn request_cancel(&mut self) {
        if matches!(self.cache, CacheState::Idle | CacheState::Rendering) {
            self.cache = CacheState::CancelPending;
        }
    }

    // ------------------------------------------------------------------
    // configuration
    // ------------------------------------------------------------------

    /// Set frequency on all oscillators and store it as the new base.
    pub fn set_frequency(&mut self, frequency: f32) {
        self.set_frequency_with(frequency, true, true);
    }

    /// Set frequency with explicit propagation control.
    ///
    /// With `all_oscillators`, the secondary's frequency is scaled by the
    /// same ratio as the primary's change, preserving its detune relation.
    /// With `store_as_base`, the new value becomes the reference point
    /// pitch-shifting modules return to.
    pub fn set_frequency_with(
        &mut self,
        frequency: f32,
        all_oscillators: bool,
        store_as_base: bool,
    ) {
        let current = self.osc.frequency;
        self.osc.set_frequency(frequency, store_as_base);

        if all_oscillators && current > 0.0 {
            let ratio = frequency / current;
            if let Some(osc2) = self.osc2.as_mut() {
                let shifted = osc2.osc.frequency * ratio;
                osc2.set_frequency(shifted, store_as_base);
            }
        }
    }

    /// Re-read position, length, and instrument properties. A cache render
    /// in flight is cancelled rather than mutated underneath; otherwise
    /// geometry is recomputed immediately.
    pub fn update_properties(
        &mut self,
        position: usize,
        length: f32,
        patch: &SynthPatch,
        selector: OscillatorSelector,
    ) {
        self.osc.waveform = patch.waveform;
        self.position = position;
        self.length = length;
        self.envelope.copy_curves(&patch.envelope);

        if matches!(
            selector,
            OscillatorSelector::Both | OscillatorSelector::Secondary
        ) {
            if patch.osc2_active {
                self.create_osc2(patch);
            } else {
                self.destroy_osc2();
            }
        }

        self.apply_modules(patch);

        if matches!(
            selector,
            OscillatorSelector::Both | OscillatorSelector::Primary
        ) {
            if self.cache.is_rendering() {
                if let Some(osc2) = self.osc2.as_mut() {
                    osc2.cancel = true;
                }
                self.cache = CacheState::CancelPending;
            } else {
                self.calculate_buffers();
            }
        }
    }

    /// Rebuild the arpeggiator clone from the instrument (or clear it) and
    /// recurse into the secondary. An active arpeggiator snaps frequency to
    /// its current step; deactivation restores both oscillators' bases.
    pub fn apply_modules(&mut self, patch: &SynthPatch) {
        self.osc.arpeggiator = patch
            .arpeggiator_active
            .then(|| patch.arpeggiator.clone());

        if let Some(osc2) = self.osc2.as_mut() {
            osc2.apply_modules(patch);
        }

        if patch.arpeggiator_active {
            let pitch = self
                .osc
                .arpeggiator
                .as_ref()
                .map(|arp| arp.pitch_for_step(arp.current_step(), self.osc.base_frequency));
            if let Some(pitch) = pitch {
                self.set_frequency_with(pitch, true, false);
            }
        } else {
            let base = self.osc.base_frequency;
            self.set_frequency_with(base, false, true);
        }
    }

    /// Create or reconfigure the secondary oscillator. The instance is
    /// built once and reused across property updates so its phase and
    /// module state stay continuous.
    fn create_osc2(&mut self, patch: &SynthPatch) {
        if !patch.osc2_active {
            return;
        }

        if self.osc2.is_none() {
            #[cfg(feature = "tracing")]
            tracing::debug!("osc2_create: {} Hz", self.osc.frequency);

            self.osc2 = Some(Box::new(Osc2::new(
                self.osc.frequency,
                self.is_sequenced,
                self.length,
                patch,
                self.config,
            )));
        }

        let frequency = self.osc.frequency;
        let Some(osc2) = self.osc2.as_mut() else {
            return;
        };

        osc2.osc.waveform = patch.osc2_waveform;
        osc2.length = self.length;

        // cents-based detune (1200 cents per octave)
        let detuned = frequency + (frequency / 1200.0 * patch.osc2_detune);
        let mut shifted = detuned;

        // octave shift (-2 to +2), asymmetric halving/doubling
        let octave = patch.osc2_octave_shift;
        if octave != 0 {
            if octave < 0 {
                shifted = detuned / (octave * 2).unsigned_abs() as f32;
            } else {
                shifted += detuned * (octave * 2 - 1) as f32;
            }
        }

        // semitone-fraction fine shift (-7 to +7)
        let fine = detuned / 12.0 * patch.osc2_fine_shift.unsigned_abs() as f32;
        if patch.osc2_fine_shift < 0 {
            shifted -= fine;
        } else {
            shifted += fine;
        }

        osc2.set_frequency(shifted, true);
    }

    /// Deactivate the secondary oscillator.
    fn destroy_osc2(&mut self) {
        #[cfg(feature = "tracing")]
        if self.osc2.is_some() {
            tracing::debug!("osc2_destroy");
        }

        self.osc2 = None;
    }

    // ------------------------------------------------------------------
    // geometry
    // ------------------------------------------------------------------

    /// Recompute the event's sample window and (re)allocate its buffer.
    ///
    /// Deferred while the event is locked; a cache render in flight is
    /// cancelled first and re-enters here from the pass epilogue. Buffer
    /// allocation happens only when the computed length changed or no
    /// buffer exists yet.
    pub fn calculate_buffers(&mut self) {
        if self.locked {
            self.update_after_unlock = true;
            return;
        }

        let old_length = if self.is_sequenced {
            if self.cache.is_rendering() {
                self.cache = CacheState::CancelPending;
            }

            let previous = self.sample_length;
            self.sample_length =
                libm::roundf(self.length * self.config.samples_per_tick as f32) as usize;
            self.sample_start = self.position * self.config.samples_per_tick;
            self.sample_end = self.sample_start + self.sample_length;
            previous
        } else {
            // quick releases of the key should at least ring for a 32nd note
            self.min_length = self.config.samples_per_bar / 32;
            self.sample_length = self.config.samples_per_bar; // amplitude swell-in needs the full span
            self.has_min_length = false;
            self.config.buffer_size
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(
            "calculate_buffers: start {} end {} length {}",
            self.sample_start,
            self.sample_end,
            self.sample_length
        );

        self.envelope.set_buffer_length(self.sample_length);

        if let Some(osc2) = self.osc2.as_mut() {
            osc2.length = self.length;
            osc2.calculate_geometry();
        }

        // cached sequenced events span their full duration; everything else
        // renders one native callback at a time
        let alloc_frames = if self.config.event_caching && self.is_sequenced {
            self.sample_length
        } else {
            self.config.buffer_size
        };

        if self.sample_length != old_length || self.buffer.is_none() {
            self.buffer = Some(self.pool.allocate(self.config.channels, alloc_frames));
        }

        if self.is_sequenced {
            if self.osc.waveform == Waveform::KarplusStrong {
                self.osc.seed_string();
            }

            if self.config.event_caching {
                // reset here rather than in cache(): a cancel observed during
                // a bulk-cache pass must not survive into the next geometry
                self.reset_cache();

                if self.auto_cache {
                    if self.cache.is_rendering() {
                        self.cache = CacheState::CancelPending;
                    } else {
                        self.cache();
                    }
                }
            }
        }
    }

    fn reset_cache(&mut self) {
        if self.cache.is_completed() {
            self.cache = CacheState::Idle;
        }
        self.cache_write_index = 0;

        if let Some(osc2) = self.osc2.as_mut() {
            osc2.reset_cache();
        }
    }

    // ------------------------------------------------------------------
    // rendering
    // ------------------------------------------------------------------

    /// Pre-render the event's entire duration into its owned buffer.
    ///
    /// Skipped silently when no buffer exists (a cache request that arrived
    /// after teardown). A pending cancellation is honored by the render
    /// loop and resolves to a fresh pass against recomputed geometry.
    pub fn cache(&mut self) {
        if self.buffer.is_none() {
            return;
        }

        #[cfg(feature = "tracing")]
        tracing::debug!("cache: start {} length {}", self.sample_start, self.sample_length);

        if !self.cache.is_cancel_pending() {
            self.cache = CacheState::Rendering;
        }
        self.render_pass();
    }

    /// The event's buffer. In caching mode, a cache render is triggered
    /// lazily when the buffer is not yet complete.
    pub fn get_buffer(&mut self) -> Option<&AudioBuffer> {
        if self.config.event_caching && !self.cache.is_completed() {
            self.cache();
        }
        self.buffer.as_ref()
    }

    /// Read access to the buffer without triggering a cache render.
    pub fn buffer(&self) -> Option<&AudioBuffer> {
        self.buffer.as_ref()
    }

    /// Mix this sequenced event's contribution to the current callback
    /// window into `output`.
    ///
    /// In caching mode the pre-rendered buffer slice is copied out, with
    /// loop-wrap handling (`loop_started`, `loop_offset`). In streaming
    /// mode the overlapping slice is synthesized on demand; once the write
    /// index passes the event end, geometry resets for reuse.
    pub fn mix_buffer(
        &mut self,
        output: &mut AudioBuffer,
        buffer_pos: usize,
        min_buffer_pos: usize,
        max_buffer_pos: usize,
        loop_started: bool,
        loop_offset: usize,
        use_channel_range: bool,
    ) {
        if self.config.event_caching {
            self.mix_cached(
                output,
                buffer_pos,
                min_buffer_pos,
                max_buffer_pos,
                loop_started,
                loop_offset,
                use_channel_range,
            );
            return;
        }

        // synthesize on the fly
        // e.g. start 200 | end 2000 | length 1800 | buffer pos 0 @ size 512
        let window_end = buffer_pos + self.config.buffer_size;

        if buffer_pos < self.sample_end && window_end > self.sample_start {
            self.cache_write_index = buffer_pos.saturating_sub(self.sample_start);
            let write_offset = self.sample_start.saturating_sub(buffer_pos);

            self.render_pass(); // overwrites old buffer contents

            if let Some(buffer) = self.buffer.as_ref() {
                output.mix(buffer, 0, write_offset, 1.0);
            }

            // end of the event reached: reset for potential reuse
            if self.cache_write_index >= self.sample_length {
                self.calculate_buffers();
            }
        }
        // TODO: seamless reads across the sequencer loop point — only the
        // cached path honors loop_started/loop_offset
    }

    /// Copy the callback window's slice of the pre-rendered buffer into
    /// `output`, wrapping across the sequencer loop point when the window
    /// straddles it.
    fn mix_cached(
        &mut self,
        output: &mut AudioBuffer,
        buffer_pos: usize,
        min_buffer_pos: usize,
        max_buffer_pos: usize,
        loop_started: bool,
        loop_offset: usize,
        _use_channel_range: bool,
    ) {
        let Some(cached) = self.buffer.as_ref() else {
            return;
        };

        let frames = output.frames();
        let window_end = buffer_pos + frames;

        if buffer_pos < self.sample_end && window_end > self.sample_start {
            let read_offset = buffer_pos.saturating_sub(self.sample_start);
            let write_offset = self.sample_start.saturating_sub(buffer_pos);
            output.mix(cached, read_offset, write_offset, 1.0);
        }

        if loop_started && self.sample_start <= max_buffer_pos {
            // the window wrapped past the loop end: positions from
            // loop_offset onward read from the loop start
            let wrapped_frames = frames.saturating_sub(loop_offset);
            let wrapped_end = min_buffer_pos + wrapped_frames;

            if min_buffer_pos < self.sample_end && wrapped_end > self.sample_start {
                let read_offset = min_buffer_pos.saturating_sub(self.sample_start);
                let write_offset =
                    loop_offset + self.sample_start.saturating_sub(min_buffer_pos);
                output.mix(cached, read_offset, write_offset, 1.0);
            }
        }
    }

    /// Render one callback's worth of a live event and return its buffer.
    ///
    /// Once a deletion has been requested and the minimum ring-out length
    /// is exhausted, a short linear fade-out over the trailing quarter of
    /// the buffer prevents a click, and the event flags itself deletable.
    pub fn synthesize(&mut self, frames: usize) -> Option<&AudioBuffer> {
        let needs_alloc = self.buffer.as_ref().is_none_or(|b| b.frames() != frames);
        if needs_alloc {
            self.buffer = Some(self.pool.allocate(self.config.channels, frames));
        }

        self.render_pass(); // overwrites old buffer contents

        // a released key still rings for the minimum length before the
        // event is physically removed
        if self.queued_for_deletion && self.min_length > 0 {
            self.min_length = self.min_length.saturating_sub(frames);
        }

        if self.min_length == 0 {
            self.has_min_length = true;
            let queued = self.queued_for_deletion;
            self.set_deletable(queued);

            // about to be removed: apply a tiny fade-out
            if queued {
                if let Some(buffer) = self.buffer.as_mut() {
                    let fade = frames / 4;
                    if fade > 0 {
                        let step = 1.0 / fade as f32;
                        let mut amp = 1.0;
                        let channels = buffer.channels();

                        for i in (frames - fade)..frames {
                            for c in 0..channels {
                                buffer.channel_mut(c)[i] *= amp;
                            }
                            amp -= step;
                        }
                    }
                }
            }
        }

        self.buffer.as_ref()
    }

    /// Run one render pass against the owned buffer, then the caching
    /// epilogue (restart on cancellation, completion bookkeeping).
    fn render_pass(&mut self) {
        let Some(mut buffer) = self.buffer.take() else {
            return;
        };
        let outcome = self.render_into(&mut buffer);
        self.buffer = Some(buffer);
        self.finish_render(&outcome);
    }

    /// The synthesis routine shared by both playback modes: generate
    /// amplitudes across the render window, merge the secondary oscillator
    /// through a transient buffer, and apply the envelope over the region.
    fn render_into(&mut self, buffer: &mut AudioBuffer) -> RenderOutcome {
        let frames = buffer.frames();
        let channels = buffer.channels();

        let render_start = if self.config.event_caching && self.is_sequenced {
            self.cache_write_index
        } else {
            0
        };

        let max_index = self.sample_length.saturating_sub(1);
        let mut render_end = render_start + frames;
        if render_end > max_index {
            render_end = max_index;
            buffer.silence(); // synthesis will not cover the full width
        }

        let halve = self.osc2.is_some();
        let mut cancelled = false;
        let mut i = render_start;

        while i < render_end {
            let mut amp = self.osc.generate(i);

            // arpeggiator step boundary: snap to the new step's pitch,
            // keeping the stored base as the reference
            if let Some(pitch) = self.osc.arpeggiator_pitch() {
                self.set_frequency_with(pitch, true, false);
            }

            if halve {
                amp *= OSC_MIX;
            }

            let value = amp * self.volume;
            for c in 0..channels {
                buffer.channel_mut(c)[i] = value;
            }

            i += 1;

            // bail out mid-loop when cancellation was requested; a partial
            // buffer is fine, the epilogue restarts against fresh geometry
            if self.cache.is_cancel_pending() {
                cancelled = true;
                break;
            }
        }

        // merge the secondary oscillator through a transient buffer scoped
        // to exactly the rendered region — it must never retain a pointer
        // into a buffer a geometry change could swap out
        if !cancelled {
            let transient_frames = if self.config.event_caching && self.is_sequenced {
                render_end.saturating_sub(self.cache_write_index)
            } else {
                frames
            };

            if transient_frames > 0 {
                // osc2 taken out so the pool allocation below can't alias it
                if let Some(mut osc2) = self.osc2.take() {
                    let mut transient = self.pool.allocate(channels, transient_frames);
                    osc2.render(&mut transient);
                    buffer.mix(&transient, 0, render_start, 1.0);
                    self.osc2 = Some(osc2);
                }
            }
        }

        // the secondary writes into its parent's buffer; only the primary
        // applies the envelope and advances the cache write position
        self.envelope.apply(buffer, self.cache_write_index);
        self.cache_write_index += i.saturating_sub(render_start);

        RenderOutcome {
            end_index: i,
            max_index,
            cancelled,
        }
    }

    /// Caching epilogue of a render pass.
    fn finish_render(&mut self, outcome: &RenderOutcome) {
        if self.config.event_caching && self.is_sequenced {
            if outcome.cancelled {
                #[cfg(feature = "tracing")]
                tracing::debug!("render cancelled at {}", outcome.end_index);

                // a cancel is only requested while properties change:
                // re-render against the now-current geometry
                self.cache = CacheState::Idle;
                self.calculate_buffers();
            } else {
                if outcome.end_index == outcome.max_index {
                    self.cache = CacheState::Completed;

                    #[cfg(feature = "tracing")]
                    tracing::debug!("cache completed: {} samples", outcome.max_index);
                }

                if self.bulk_cacheable {
                    self.auto_cache = true;
                }
            }
        }

        // always leave the pass clean so the next render starts fresh
        if self.cache.is_cancel_pending() {
            self.cache = CacheState::Idle;
        }
    }
}
