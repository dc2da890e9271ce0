//! Radiola probe - exercises the audio core end to end
//!
//! Plays a background tone, fires a chime clip on top of it, and logs the
//! ducking level and meter readings as they change. By default the blocks
//! are rendered headless and the output tap is drained in-process.
//!
//! ## Command line flags
//!
//! - `--play`: Render through the default output device (CPAL) instead
//! - `--seconds <n>`: Run time (default 4)

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

use radiola_core::config::{default_config_path, load_config, ConsoleConfig};
use radiola_core::ducking::DuckingService;
use radiola_core::engine::{AudioEngine, BlockProcessor};
use radiola_core::source::{AudioSource, ClipSource, SourceCategory, SourceHandle, ToneSource};
use radiola_core::visualizer::VisualizerService;

const DEFAULT_RUN_SECONDS: u64 = 4;

/// Chime fires after this long and lasts for `CHIME_LENGTH`
const CHIME_AT: Duration = Duration::from_secs(1);
const CHIME_LENGTH: Duration = Duration::from_millis(1500);

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let play = args.iter().any(|arg| arg == "--play");
    let seconds = args
        .iter()
        .position(|arg| arg == "--seconds")
        .and_then(|i| args.get(i + 1))
        .map(|value| value.parse::<u64>())
        .transpose()
        .context("--seconds expects a whole number")?
        .unwrap_or(DEFAULT_RUN_SECONDS);

    // Initialize logger - set RUST_LOG=debug for verbose output
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    log::info!("radiola-probe starting up");

    let config_path = default_config_path();
    let config: ConsoleConfig = load_config(&config_path);
    config.validate().context("Invalid console configuration")?;

    let engine = AudioEngine::new(config.audio.clone());
    let ducking = Arc::new(DuckingService::new(config.ducking.clone())?);
    let visualizer = Arc::new(VisualizerService::new(config.visualizer_for_engine())?);
    engine.set_attenuation_source(ducking.clone())?;
    engine.set_visualizer(visualizer.clone())?;

    engine.initialize()?;
    let mixer = engine.master_mixer()?;
    let tap = engine.mixed_output_stream()?;
    let processor = engine.processor()?;

    let rate = config.audio.sample_rate;
    let channels = config.audio.channels;
    let tone: SourceHandle = Arc::new(
        ToneSource::new("line-check", SourceCategory::Primary, 220.0, rate, channels)?
            .with_amplitude(0.5),
    );
    let chime: SourceHandle = Arc::new(ClipSource::new(
        "chime",
        SourceCategory::Event,
        chime_samples(rate, channels),
        rate,
        channels,
    )?);
    mixer.add_source(tone.clone());

    println!("Radiola probe: {} Hz, {} channels, {} s", rate, channels, seconds);

    engine.start()?;
    let runner = Runner::start(processor, &config, play)?;

    let run_for = Duration::from_secs(seconds);
    let started = Instant::now();
    let mut drained = vec![0u8; config.audio.tap_capacity_bytes()];
    let mut chime_fired = false;

    while started.elapsed() < run_for {
        thread::sleep(Duration::from_millis(250));

        if !chime_fired && started.elapsed() >= CHIME_AT {
            mixer.add_source(chime.clone());
            ducking.start_ducking(&chime)?;
            chime_fired = true;
        }
        if chime_fired && chime.is_finished() && ducking.is_ducking() {
            mixer.remove_source(chime.id());
            ducking.stop_ducking(chime.id())?;
        }

        // Nothing downstream consumes the tap here; keep it from filling up
        let bytes = tap.read_available(&mut drained);

        let level = visualizer.get_level_data()?;
        let spectrum = visualizer.get_spectrum_data()?;
        log::info!(
            "duck {:5.1}% | peak {:6.1} dB rms {:6.1} dB | spectrum peak {:?} Hz | tap {} B",
            ducking.current_duck_level(),
            level.left_peak_db,
            level.left_rms_db,
            spectrum.peak_frequency(),
            bytes
        );
    }

    drop(runner);
    engine.stop()?;
    let stats = engine.stats();
    log::info!("Engine stats: {:?}", stats);

    ducking.dispose();
    visualizer.dispose();
    engine.dispose();
    log::info!("radiola-probe finished");
    Ok(())
}

/// Decaying two-tone chime at the engine format
fn chime_samples(rate: u32, channels: u16) -> Vec<f32> {
    let frames = (CHIME_LENGTH.as_secs_f64() * rate as f64) as usize;
    (0..frames)
        .flat_map(|i| {
            let t = i as f64 / rate as f64;
            let envelope = (-3.0 * t).exp();
            let s = 0.4
                * envelope
                * ((std::f64::consts::TAU * 880.0 * t).sin()
                    + 0.5 * (std::f64::consts::TAU * 1320.0 * t).sin());
            std::iter::repeat(s as f32).take(channels as usize)
        })
        .collect()
}

/// Drives the block processor until dropped
enum Runner {
    Headless {
        stop: crossbeam::channel::Sender<()>,
        handle: Option<thread::JoinHandle<()>>,
    },
    #[cfg(feature = "cpal-output")]
    Device(radiola_core::audio::CpalOutputHandle),
}

impl Runner {
    fn start(processor: BlockProcessor, config: &ConsoleConfig, play: bool) -> Result<Self> {
        if play {
            #[cfg(feature = "cpal-output")]
            {
                let handle = radiola_core::audio::start_output(processor, &config.audio)?;
                log::info!(
                    "Playing on {} (~{:.1}ms latency)",
                    handle.device_name(),
                    handle.latency_ms()
                );
                return Ok(Runner::Device(handle));
            }
            #[cfg(not(feature = "cpal-output"))]
            log::warn!("Built without cpal-output, rendering headless");
        }
        Self::headless(processor, config)
    }

    /// Render one buffer per buffer period on a plain thread
    fn headless(mut processor: BlockProcessor, config: &ConsoleConfig) -> Result<Self> {
        let frames = config.audio.buffer_frames();
        let period = Duration::from_secs_f64(frames as f64 / config.audio.sample_rate as f64);
        let mut block = vec![0.0f32; frames * processor.channels()];
        let (stop, stop_rx) = crossbeam::channel::bounded::<()>(1);

        let handle = thread::Builder::new()
            .name("probe-render".to_string())
            .spawn(move || loop {
                processor.process(&mut block);
                match stop_rx.recv_timeout(period) {
                    Err(crossbeam::channel::RecvTimeoutError::Timeout) => {}
                    _ => break,
                }
            })
            .context("Failed to spawn render thread")?;

        log::info!("Rendering headless, {} frames per block", frames);
        Ok(Runner::Headless {
            stop,
            handle: Some(handle),
        })
    }
}

impl Drop for Runner {
    fn drop(&mut self) {
        if let Runner::Headless { stop, handle } = self {
            let _ = stop.try_send(());
            if let Some(handle) = handle.take() {
                let _ = handle.join();
            }
        }
    }
}
