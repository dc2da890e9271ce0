//! Visualizer service - one facade over the three analyzers
//!
//! Two locks with different jobs:
//! - `feed` guards the per-block state (meter, waveform ring, FFT history).
//!   The audio callback only ever `try_lock`s it.
//! - `analysis` guards the FFT plan and buffers. Pulls copy the history
//!   out under `feed`, release it, then run the FFT under `analysis`.
//!
//! Spectrum smoothing advances once per batch of newly fed blocks, not per
//! pull: pulling again with no new audio returns the same magnitudes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, TryLockError};

use super::level::{LevelData, LevelMeter};
use super::spectrum::{MonoHistory, SpectrumAnalyzer, SpectrumData};
use super::waveform::{WaveformAnalyzer, WaveformData};
use crate::config::VisualizerConfig;
use crate::error::{CoreError, CoreResult};

struct FeedState {
    level: LevelMeter,
    waveform: WaveformAnalyzer,
    history: MonoHistory,
    /// Blocks fed since creation
    blocks: u64,
}

impl FeedState {
    fn process(&mut self, samples: &[f32]) {
        self.level.process(samples);
        self.waveform.add_samples(samples);
        self.history.push_stereo(samples);
        self.blocks = self.blocks.wrapping_add(1);
    }

    fn reset(&mut self) {
        self.level.reset();
        self.waveform.clear();
        self.history.clear();
    }
}

struct AnalysisState {
    spectrum: SpectrumAnalyzer,
    /// Pre-allocated copy of the FFT history
    frame: Vec<f32>,
    /// Feed block count the smoothed spectrum last folded in
    analyzed_blocks: Option<u64>,
}

/// Level, spectrum and waveform telemetry from the mixed stream
pub struct VisualizerService {
    config: VisualizerConfig,
    feed: Mutex<FeedState>,
    analysis: Mutex<AnalysisState>,
    active: AtomicBool,
    disposed: AtomicBool,
}

impl VisualizerService {
    pub fn new(config: VisualizerConfig) -> CoreResult<Self> {
        config.validate()?;
        log::debug!(
            "Visualizer: FFT {} @ {} Hz, waveform {} pairs",
            config.fft_size,
            config.sample_rate,
            config.waveform_samples
        );

        Ok(Self {
            feed: Mutex::new(FeedState {
                level: LevelMeter::new(&config),
                waveform: WaveformAnalyzer::new(&config),
                history: MonoHistory::new(config.fft_size),
                blocks: 0,
            }),
            analysis: Mutex::new(AnalysisState {
                spectrum: SpectrumAnalyzer::new(&config)?,
                frame: vec![0.0; config.fft_size],
                analyzed_blocks: None,
            }),
            config,
            active: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
        })
    }

    /// Feed an interleaved stereo block; the first call activates the service
    pub fn process_samples(&self, samples: &[f32]) -> CoreResult<()> {
        self.ensure_live()?;
        lock(&self.feed).process(samples);
        self.active.store(true, Ordering::Release);
        Ok(())
    }

    /// Real-time variant of `process_samples` (never waits)
    ///
    /// Returns `false` if the block was dropped because a pull held the
    /// feed lock. Blocks fed after dispose are ignored.
    pub fn try_process_samples(&self, samples: &[f32]) -> bool {
        if self.disposed.load(Ordering::Acquire) {
            return true;
        }
        let mut feed = match self.feed.try_lock() {
            Ok(feed) => feed,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => return false,
        };
        feed.process(samples);
        self.active.store(true, Ordering::Release);
        true
    }

    pub fn get_level_data(&self) -> CoreResult<LevelData> {
        self.ensure_live()?;
        Ok(lock(&self.feed).level.level_data())
    }

    /// Windowed FFT of the most recent `fft_size` samples (mono fold)
    pub fn get_spectrum_data(&self) -> CoreResult<SpectrumData> {
        self.ensure_live()?;
        let mut analysis = lock(&self.analysis);
        let AnalysisState {
            spectrum,
            frame,
            analyzed_blocks,
        } = &mut *analysis;

        let fresh = {
            let feed = lock(&self.feed);
            if *analyzed_blocks == Some(feed.blocks) {
                false
            } else {
                feed.history.copy_chronological(frame);
                *analyzed_blocks = Some(feed.blocks);
                true
            }
        };

        if fresh {
            spectrum.analyze(&frame[..])
        } else {
            Ok(spectrum.snapshot())
        }
    }

    pub fn get_waveform_data(&self) -> CoreResult<WaveformData> {
        self.ensure_live()?;
        Ok(lock(&self.feed).waveform.waveform_data())
    }

    /// Waveform reduced to `target` points (peak preserving)
    pub fn get_downsampled_waveform(&self, target: usize) -> CoreResult<WaveformData> {
        self.ensure_live()?;
        lock(&self.feed).waveform.downsampled(target)
    }

    /// Clear all analyzer state and go inactive
    pub fn reset(&self) -> CoreResult<()> {
        self.ensure_live()?;
        let mut analysis = lock(&self.analysis);
        lock(&self.feed).reset();
        analysis.spectrum.reset();
        analysis.analyzed_blocks = None;
        self.active.store(false, Ordering::Release);
        log::debug!("Visualizer reset");
        Ok(())
    }

    /// Whether blocks have been fed since creation or the last reset
    pub fn is_active(&self) -> CoreResult<bool> {
        self.ensure_live()?;
        Ok(self.active.load(Ordering::Acquire))
    }

    pub fn config(&self) -> &VisualizerConfig {
        &self.config
    }

    /// Idempotent
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.active.store(false, Ordering::Release);
        log::debug!("Visualizer disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    fn ensure_live(&self) -> CoreResult<()> {
        if self.is_disposed() {
            return Err(CoreError::Disposed("VisualizerService"));
        }
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
