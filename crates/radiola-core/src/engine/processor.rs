//! Block processor - the real-time half of the engine
//!
//! Owned by the audio callback context. Each block it pulls every active
//! source, mixes them through the master mixer's gains, applies the current
//! duck attenuation, then writes the result to the caller's buffer, the
//! output tap and the visualizer.
//!
//! Nothing in `process()` allocates, logs or waits: shared state is read
//! through atomics and `try_lock`. A contended source registry renders the
//! block silent and counts it; a full tap drops the block and counts it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;

use super::mixer::MasterMixer;
use super::state::AtomicEngineState;
use crate::audio::OutputTap;
use crate::types::MAX_BLOCK_FRAMES;
use crate::visualizer::VisualizerService;

/// Anything that can attenuate the mixed signal (the ducking service)
pub trait AttenuationSource: Send + Sync {
    /// Linear gain in [0, 1] applied to the whole mix
    fn attenuation(&self) -> f32;
}

/// Late-bound consumers of the mixed signal
///
/// The control plane swaps targets under the mutex and bumps `version`;
/// the processor re-reads them with `try_lock` only when the version moved.
/// Targets the processor replaces come back through `retired` so their last
/// reference is dropped on the control plane, not in the callback.
#[derive(Default)]
pub(crate) struct Routing {
    version: AtomicU64,
    targets: Mutex<RoutingTargets>,
    retired: Mutex<Option<rtrb::Consumer<RoutingTargets>>>,
}

#[derive(Default, Clone)]
pub(crate) struct RoutingTargets {
    attenuation: Option<Arc<dyn AttenuationSource>>,
    visualizer: Option<Arc<VisualizerService>>,
}

impl Routing {
    pub(crate) fn set_attenuation(&self, source: Arc<dyn AttenuationSource>) {
        self.update(|t| t.attenuation = Some(source));
    }

    pub(crate) fn set_visualizer(&self, visualizer: Arc<VisualizerService>) {
        self.update(|t| t.visualizer = Some(visualizer));
    }

    pub(crate) fn clear(&self) {
        self.update(|t| *t = RoutingTargets::default());
    }

    /// Attach the consumer side of the processor's return queue
    pub(crate) fn install_retired(&self, consumer: rtrb::Consumer<RoutingTargets>) {
        *self
            .retired
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(consumer);
    }

    /// Drop every target set the processor has handed back
    pub(crate) fn collect_retired(&self) {
        let mut retired = self
            .retired
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(consumer) = retired.as_mut() {
            while consumer.pop().is_ok() {}
        }
    }

    fn update(&self, f: impl FnOnce(&mut RoutingTargets)) {
        {
            let mut targets = self
                .targets
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            f(&mut targets);
            self.version.fetch_add(1, Ordering::Release);
        }
        self.collect_retired();
    }
}

/// Counters written by the real-time path
#[derive(Debug, Default)]
pub(crate) struct EngineCounters {
    pub(crate) processed_blocks: AtomicU64,
    pub(crate) skipped_mix_blocks: AtomicU64,
    pub(crate) dropped_visualizer_blocks: AtomicU64,
}

/// Snapshot of the real-time counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    /// Blocks rendered while running
    pub processed_blocks: u64,
    /// Blocks rendered silent because the source registry was busy
    pub skipped_mix_blocks: u64,
    /// Blocks the output tap could not take
    pub dropped_tap_blocks: u64,
    /// Blocks the visualizer could not take
    pub dropped_visualizer_blocks: u64,
}

impl EngineCounters {
    pub(crate) fn snapshot(&self, dropped_tap_blocks: u64) -> EngineStats {
        EngineStats {
            processed_blocks: self.processed_blocks.load(Ordering::Relaxed),
            skipped_mix_blocks: self.skipped_mix_blocks.load(Ordering::Relaxed),
            dropped_tap_blocks,
            dropped_visualizer_blocks: self.dropped_visualizer_blocks.load(Ordering::Relaxed),
        }
    }
}

/// Real-time block renderer handed out by `AudioEngine::processor()`
pub struct BlockProcessor {
    channels: usize,
    state: Arc<AtomicEngineState>,
    mixer: Arc<MasterMixer>,
    tap: Arc<OutputTap>,
    routing: Arc<Routing>,
    routing_version: u64,
    targets: RoutingTargets,
    retired: rtrb::Producer<RoutingTargets>,
    counters: Arc<EngineCounters>,
    /// Pre-allocated mix bus (MAX_BLOCK_FRAMES * channels)
    mix: Vec<f32>,
    /// Pre-allocated per-source pull buffer
    scratch: Vec<f32>,
    /// Pre-allocated stereo fold for the visualizer
    stereo: Vec<f32>,
}

impl BlockProcessor {
    pub(crate) fn new(
        channels: u16,
        state: Arc<AtomicEngineState>,
        mixer: Arc<MasterMixer>,
        tap: Arc<OutputTap>,
        routing: Arc<Routing>,
        retired: rtrb::Producer<RoutingTargets>,
        counters: Arc<EngineCounters>,
    ) -> Self {
        let channels = channels.max(1) as usize;
        Self {
            channels,
            state,
            mixer,
            tap,
            routing,
            routing_version: u64::MAX,
            targets: RoutingTargets::default(),
            retired,
            counters,
            mix: vec![0.0; MAX_BLOCK_FRAMES * channels],
            scratch: vec![0.0; MAX_BLOCK_FRAMES * channels],
            stereo: vec![0.0; MAX_BLOCK_FRAMES * 2],
        }
    }

    /// Interleaved channel count of the blocks this processor renders
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Render one interleaved block into `out`
    ///
    /// Outputs silence (and feeds nothing downstream) unless the engine is
    /// running. Blocks longer than `MAX_BLOCK_FRAMES` are rendered in pieces.
    pub fn process(&mut self, out: &mut [f32]) {
        if !self.state.is_running() {
            out.fill(0.0);
            return;
        }
        self.refresh_routing();

        let max_len = MAX_BLOCK_FRAMES * self.channels;
        for piece in out.chunks_mut(max_len) {
            let whole = piece.len() - piece.len() % self.channels;
            let (frames, remainder) = piece.split_at_mut(whole);
            remainder.fill(0.0);
            if !frames.is_empty() {
                self.render(frames);
            }
        }
    }

    fn refresh_routing(&mut self) {
        let version = self.routing.version.load(Ordering::Acquire);
        // Keep the current targets until the return queue has room
        if version == self.routing_version || self.retired.is_full() {
            return;
        }
        if let Ok(targets) = self.routing.targets.try_lock() {
            let previous = std::mem::replace(&mut self.targets, targets.clone());
            self.routing_version = version;
            let _ = self.retired.push(previous);
        }
    }

    fn render(&mut self, out: &mut [f32]) {
        let n = out.len();
        let channels = self.channels;
        let mix = &mut self.mix[..n];
        mix.fill(0.0);

        // Sum sources at their own volume
        match self.mixer.try_sources() {
            Some(sources) => {
                for source in sources.iter() {
                    let scratch = &mut self.scratch[..n];
                    let written = source.read_samples(scratch).min(n);
                    scratch[written..].fill(0.0);
                    let volume = source.volume();
                    for (m, s) in mix.iter_mut().zip(scratch.iter()) {
                        *m += s * volume;
                    }
                }
            }
            None => {
                self.counters.skipped_mix_blocks.fetch_add(1, Ordering::Relaxed);
            }
        }

        // Master volume, balance and duck level
        let gains = self.mixer.gains();
        let duck = self
            .targets
            .attenuation
            .as_ref()
            .map(|a| a.attenuation())
            .unwrap_or(1.0);
        for frame in mix.chunks_exact_mut(channels) {
            for (ch, sample) in frame.iter_mut().enumerate() {
                let balance = match (ch, channels) {
                    (0, c) if c >= 2 => gains.left,
                    (1, _) => gains.right,
                    _ => 1.0,
                };
                *sample = (*sample * gains.master * balance * duck).clamp(-1.0, 1.0);
            }
        }

        out.copy_from_slice(mix);
        self.tap.try_write(mix);

        if let Some(visualizer) = &self.targets.visualizer {
            let stereo = fold_to_stereo(mix, channels, &mut self.stereo);
            if !visualizer.try_process_samples(stereo) {
                self.counters
                    .dropped_visualizer_blocks
                    .fetch_add(1, Ordering::Relaxed);
            }
        }

        self.counters.processed_blocks.fetch_add(1, Ordering::Relaxed);
    }
}

/// Fold an interleaved block to interleaved stereo
///
/// Mono is duplicated, layouts wider than stereo keep channels 0 and 1.
fn fold_to_stereo<'a>(mix: &'a [f32], channels: usize, stereo: &'a mut [f32]) -> &'a [f32] {
    if channels == 2 {
        return mix;
    }
    let frames = mix.len() / channels;
    for (i, frame) in mix.chunks_exact(channels).enumerate() {
        let left = frame[0];
        let right = if channels > 1 { frame[1] } else { left };
        stereo[2 * i] = left;
        stereo[2 * i + 1] = right;
    }
    &stereo[..frames * 2]
}
