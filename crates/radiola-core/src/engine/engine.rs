//! Audio engine - lifecycle owner of the mixer and the output tap
//!
//! The engine is the control-plane half. It serializes lifecycle calls
//! through one gate, mirrors the state into an atomic for the real-time
//! path, and hands out the single `BlockProcessor` that renders blocks.
//!
//! The output tap lives in its own slot outside the gate. Slow lifecycle
//! work (device resolution, joining the forwarder) holds the gate, never the
//! slot, and `write_to_output_tap` only `try_lock`s it.

use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use std::thread::{self, JoinHandle};

use crossbeam::channel::{Receiver, RecvTimeoutError, Sender};

use super::mixer::MasterMixer;
use super::processor::{AttenuationSource, BlockProcessor, EngineCounters, EngineStats, Routing};
use super::state::{AtomicEngineState, EngineState};
use crate::audio::{AudioConfig, DeviceEvent, DeviceManager, OutputDevice, OutputTap, TapReader};
use crate::error::{CoreError, CoreResult};
use crate::events::{EventBus, DEFAULT_EVENT_CAPACITY};
use crate::visualizer::VisualizerService;

/// Superseded routing targets the processor can hand back between collections
const RETIRED_ROUTING_CAPACITY: usize = 8;

/// Notification published by the engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Lifecycle transition
    StateChanged {
        previous: EngineState,
        current: EngineState,
    },
    /// Device manager notification, forwarded unchanged
    DeviceChanged(DeviceEvent),
}

/// Resources that only exist between `initialize()` and `dispose()`
#[derive(Default)]
struct Lifecycle {
    processor_taken: bool,
    forwarder: Option<DeviceForwarder>,
}

/// Background thread re-emitting device events on the engine bus
struct DeviceForwarder {
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl DeviceForwarder {
    fn spawn(
        device_rx: Receiver<DeviceEvent>,
        events: Arc<EventBus<EngineEvent>>,
        active_device: Arc<Mutex<Option<OutputDevice>>>,
    ) -> CoreResult<Self> {
        let (stop_tx, stop_rx) = crossbeam::channel::bounded::<()>(1);
        let handle = thread::Builder::new()
            .name("engine-device-events".to_string())
            .spawn(move || {
                log::debug!("Device event forwarder started");
                loop {
                    crossbeam::select! {
                        recv(device_rx) -> event => match event {
                            Ok(event) => {
                                log::info!("Device change: {:?}", event);
                                if let DeviceEvent::DefaultChanged(device) = &event {
                                    *lock(&active_device) = Some(device.clone());
                                }
                                events.publish(EngineEvent::DeviceChanged(event));
                            }
                            Err(_) => {
                                log::debug!("Device manager closed its event channel");
                                break;
                            }
                        },
                        recv(stop_rx) -> _ => break,
                    }
                }
                log::debug!("Device event forwarder stopped");
            })
            .map_err(|e| CoreError::Spawn {
                name: "engine-device-events",
                reason: e.to_string(),
            })?;

        Ok(Self {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        })
    }

    fn shutdown(&mut self) {
        // Dropping the sender wakes the select with a disconnect
        self.stop_tx.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::warn!("Device event forwarder panicked");
            }
        }
    }
}

/// The console's audio engine
///
/// Constructed explicitly and passed by handle to its dependents. Every
/// operation other than `initialize()` is checked against the lifecycle
/// state; everything except the state queries fails with
/// [`CoreError::Disposed`] once the engine is disposed.
pub struct AudioEngine {
    config: AudioConfig,
    /// Lifecycle gate: serializes initialize/start/stop/dispose
    gate: Mutex<Lifecycle>,
    /// Set while Ready/Running; held only long enough to clone the handle
    tap: Mutex<Option<Arc<OutputTap>>>,
    state: Arc<AtomicEngineState>,
    mixer: Arc<MasterMixer>,
    routing: Arc<Routing>,
    counters: Arc<EngineCounters>,
    events: Arc<EventBus<EngineEvent>>,
    device_manager: Option<Arc<dyn DeviceManager>>,
    active_device: Arc<Mutex<Option<OutputDevice>>>,
}

impl AudioEngine {
    /// Create an engine with no device manager (headless or tap-only output)
    pub fn new(config: AudioConfig) -> Self {
        Self {
            config,
            gate: Mutex::new(Lifecycle::default()),
            tap: Mutex::new(None),
            state: Arc::new(AtomicEngineState::new(EngineState::Uninitialized)),
            mixer: Arc::new(MasterMixer::new()),
            routing: Arc::new(Routing::default()),
            counters: Arc::new(EngineCounters::default()),
            events: Arc::new(EventBus::new(DEFAULT_EVENT_CAPACITY)),
            device_manager: None,
            active_device: Arc::new(Mutex::new(None)),
        }
    }

    /// Create an engine that resolves its output device through `device_manager`
    pub fn with_device_manager(config: AudioConfig, device_manager: Arc<dyn DeviceManager>) -> Self {
        let mut engine = Self::new(config);
        engine.device_manager = Some(device_manager);
        engine
    }

    // ─────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────

    /// Bring the engine to `Ready`: resolve the output device and open the tap
    ///
    /// Valid only from `Uninitialized`. A failed setup step leaves the engine
    /// in `Error`, from which only `dispose()` is accepted.
    pub fn initialize(&self) -> CoreResult<()> {
        let mut lifecycle = self.lock_gate();
        let state = self.state.get();
        if state == EngineState::Disposed {
            return Err(self.rejected("initialize", CoreError::Disposed("AudioEngine")));
        }
        if state != EngineState::Uninitialized {
            return Err(self.rejected("initialize", CoreError::illegal_state("initialize", state)));
        }
        self.config.validate().map_err(|e| self.rejected("initialize", e))?;

        self.transition(EngineState::Initializing);

        match self.open(&mut lifecycle) {
            Ok(()) => {
                log::info!(
                    "Audio engine ready: {} Hz, {} ch, {} frames ({:.1} ms), tap {} bytes",
                    self.config.sample_rate,
                    self.config.channels,
                    self.config.buffer_frames(),
                    self.config.latency_ms(),
                    self.config.tap_capacity_bytes()
                );
                self.transition(EngineState::Ready);
                Ok(())
            }
            Err(e) => {
                log::error!("Audio engine initialization failed: {}", e);
                self.release(&mut lifecycle);
                self.transition(EngineState::Error);
                Err(e)
            }
        }
    }

    /// Setup steps of `initialize()`, run while `Initializing`
    fn open(&self, lifecycle: &mut Lifecycle) -> CoreResult<()> {
        if let Some(manager) = &self.device_manager {
            let device = resolve_active_device(manager.clone(), &self.config)?;
            match &device {
                Some(device) => log::info!(
                    "Active output device: {} ({} ch @ {} Hz)",
                    device.id.display_label(),
                    device.channels,
                    device.sample_rate
                ),
                None => log::warn!("Device manager reports no active output device"),
            }
            *lock(&self.active_device) = device;

            lifecycle.forwarder = Some(DeviceForwarder::spawn(
                manager.subscribe(),
                self.events.clone(),
                self.active_device.clone(),
            )?);
        }

        *lock(&self.tap) = Some(Arc::new(OutputTap::new(self.config.tap_capacity_bytes())));
        Ok(())
    }

    /// `Ready -> Running`
    pub fn start(&self) -> CoreResult<()> {
        let _lifecycle = self.lock_gate();
        match self.state.get() {
            EngineState::Ready => {
                self.transition(EngineState::Running);
                Ok(())
            }
            EngineState::Disposed => Err(self.rejected("start", CoreError::Disposed("AudioEngine"))),
            state => Err(self.rejected("start", CoreError::illegal_state("start", state))),
        }
    }

    /// `Running -> Stopping -> Ready`
    pub fn stop(&self) -> CoreResult<()> {
        let _lifecycle = self.lock_gate();
        match self.state.get() {
            EngineState::Running => {
                self.transition(EngineState::Stopping);
                self.routing.collect_retired();
                self.transition(EngineState::Ready);
                Ok(())
            }
            EngineState::Disposed => Err(self.rejected("stop", CoreError::Disposed("AudioEngine"))),
            state => Err(self.rejected("stop", CoreError::illegal_state("stop", state))),
        }
    }

    /// Release the tap and background threads and move to `Disposed`
    ///
    /// Valid from any state; repeated calls are no-ops.
    pub fn dispose(&self) {
        let mut lifecycle = self.lock_gate();
        if self.state.get() == EngineState::Disposed {
            return;
        }
        self.release(&mut lifecycle);
        self.routing.clear();
        self.mixer.clear_sources();
        self.transition(EngineState::Disposed);
        log::info!("Audio engine disposed");
    }

    fn release(&self, lifecycle: &mut Lifecycle) {
        if let Some(mut forwarder) = lifecycle.forwarder.take() {
            forwarder.shutdown();
        }
        let tap = lock(&self.tap).take();
        if let Some(tap) = tap {
            tap.close();
            let dropped = tap.dropped_blocks();
            if dropped > 0 {
                log::debug!("Output tap closed after dropping {} blocks", dropped);
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Output
    // ─────────────────────────────────────────────────────────────────────

    /// Readable handle onto the output tap (16-bit LE PCM)
    pub fn mixed_output_stream(&self) -> CoreResult<TapReader> {
        let operation = "get mixed output stream";
        self.ensure_output(operation)?;
        let tap = lock(&self.tap).clone();
        Ok(self.require_tap(tap, operation)?.reader())
    }

    /// Encode `samples` as 16-bit PCM and append them to the tap
    ///
    /// Never waits: returns `Ok(false)` when the block was dropped because
    /// the tap is full or its slot is momentarily held by the control plane.
    pub fn write_to_output_tap(&self, samples: &[f32]) -> CoreResult<bool> {
        let operation = "write to output tap";
        self.ensure_output(operation)?;
        let tap = match self.tap.try_lock() {
            Ok(slot) => slot.clone(),
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner().clone(),
            Err(TryLockError::WouldBlock) => return Ok(false),
        };
        Ok(self.require_tap(tap, operation)?.try_write(samples))
    }

    /// Take the real-time block processor (once per engine)
    pub fn processor(&self) -> CoreResult<BlockProcessor> {
        let operation = "create processor";
        let mut lifecycle = self.lock_gate();
        self.ensure_output(operation)?;
        let tap = lock(&self.tap).clone();
        let tap = self.require_tap(tap, operation)?;
        if lifecycle.processor_taken {
            return Err(self.rejected(
                "create processor",
                CoreError::illegal_state("create processor", "the processor is already taken"),
            ));
        }
        lifecycle.processor_taken = true;

        let (retire_tx, retire_rx) = rtrb::RingBuffer::new(RETIRED_ROUTING_CAPACITY);
        self.routing.install_retired(retire_rx);

        Ok(BlockProcessor::new(
            self.config.channels,
            self.state.clone(),
            self.mixer.clone(),
            tap,
            self.routing.clone(),
            retire_tx,
            self.counters.clone(),
        ))
    }

    /// Fail unless the state allows output (Ready or Running)
    fn ensure_output(&self, operation: &'static str) -> CoreResult<()> {
        let state = self.state.get();
        if state == EngineState::Disposed {
            return Err(self.rejected(operation, CoreError::Disposed("AudioEngine")));
        }
        if !state.has_output() {
            return Err(self.rejected(operation, CoreError::illegal_state(operation, state)));
        }
        Ok(())
    }

    /// The tap is cleared before the state leaves Ready/Running
    fn require_tap(
        &self,
        tap: Option<Arc<OutputTap>>,
        operation: &'static str,
    ) -> CoreResult<Arc<OutputTap>> {
        tap.ok_or_else(|| {
            self.rejected(
                operation,
                CoreError::illegal_state(operation, "the output tap is closed"),
            )
        })
    }

    // ─────────────────────────────────────────────────────────────────────
    // Wiring
    // ─────────────────────────────────────────────────────────────────────

    /// The engine's master mixer
    pub fn master_mixer(&self) -> CoreResult<Arc<MasterMixer>> {
        self.ensure_not_disposed("get master mixer")?;
        Ok(self.mixer.clone())
    }

    /// Attach the attenuation applied to the whole mix (the ducking service)
    pub fn set_attenuation_source(&self, source: Arc<dyn AttenuationSource>) -> CoreResult<()> {
        self.ensure_not_disposed("set attenuation source")?;
        self.routing.set_attenuation(source);
        log::debug!("Attenuation source attached");
        Ok(())
    }

    /// Attach the visualizer fed with every rendered block
    pub fn set_visualizer(&self, visualizer: Arc<VisualizerService>) -> CoreResult<()> {
        self.ensure_not_disposed("set visualizer")?;
        self.routing.set_visualizer(visualizer);
        log::debug!("Visualizer attached");
        Ok(())
    }

    /// Subscribe to state and device notifications
    pub fn subscribe(&self) -> CoreResult<Receiver<EngineEvent>> {
        self.ensure_not_disposed("subscribe")?;
        Ok(self.events.subscribe())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────

    pub fn state(&self) -> EngineState {
        self.state.get()
    }

    /// Ready or Running
    pub fn is_ready(&self) -> bool {
        self.state.get().has_output()
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    pub fn config(&self) -> &AudioConfig {
        &self.config
    }

    /// Device resolved during `initialize()`, updated on default-device changes
    pub fn active_device(&self) -> Option<OutputDevice> {
        lock(&self.active_device).clone()
    }

    /// Real-time counters
    pub fn stats(&self) -> EngineStats {
        self.routing.collect_retired();
        let dropped_tap_blocks = lock(&self.tap)
            .as_ref()
            .map(|tap| tap.dropped_blocks())
            .unwrap_or(0);
        self.counters.snapshot(dropped_tap_blocks)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────

    /// Set a new state and publish the transition. Caller holds the gate.
    fn transition(&self, next: EngineState) {
        let previous = self.state.get();
        self.state.set(next);
        log::info!("Audio engine state: {} -> {}", previous, next);
        self.events.publish(EngineEvent::StateChanged {
            previous,
            current: next,
        });
    }

    fn ensure_not_disposed(&self, operation: &'static str) -> CoreResult<()> {
        if self.state.get() == EngineState::Disposed {
            return Err(self.rejected(operation, CoreError::Disposed("AudioEngine")));
        }
        Ok(())
    }

    /// Log a rejected call with its context and hand the error back
    fn rejected(&self, operation: &'static str, error: CoreError) -> CoreError {
        log::warn!(
            "Audio engine rejected '{}' in state {}: {}",
            operation,
            self.state.get(),
            error
        );
        error
    }

    fn lock_gate(&self) -> MutexGuard<'_, Lifecycle> {
        lock(&self.gate)
    }
}

impl Drop for AudioEngine {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Ask the device manager for the active device, bounded by the init timeout
fn resolve_active_device(
    manager: Arc<dyn DeviceManager>,
    config: &AudioConfig,
) -> CoreResult<Option<OutputDevice>> {
    let timeout = config.init_timeout();
    let (tx, rx) = crossbeam::channel::bounded(1);

    thread::Builder::new()
        .name("engine-device-resolve".to_string())
        .spawn(move || {
            let _ = tx.send(manager.active_output_device());
        })
        .map_err(|e| CoreError::Spawn {
            name: "engine-device-resolve",
            reason: e.to_string(),
        })?;

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => Err(CoreError::Timeout {
            operation: "resolve active output device",
            after: timeout,
        }),
        Err(RecvTimeoutError::Disconnected) => Err(CoreError::Device(
            "device manager panicked while resolving the active device".to_string(),
        )),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::DeviceId;
    use crate::source::{ClipSource, SourceCategory, SourceHandle};
    use std::io::Read;
    use std::time::{Duration, Instant};

    fn ready_engine() -> AudioEngine {
        let engine = AudioEngine::new(AudioConfig::default());
        engine.initialize().unwrap();
        engine
    }

    fn device(name: &str) -> OutputDevice {
        OutputDevice {
            id: DeviceId::with_host(name, "ALSA"),
            name: name.to_string(),
            channels: 2,
            sample_rate: 48000,
        }
    }

    struct FakeDeviceManager {
        delay: Duration,
        events: Receiver<DeviceEvent>,
    }

    impl DeviceManager for FakeDeviceManager {
        fn active_output_device(&self) -> CoreResult<Option<OutputDevice>> {
            thread::sleep(self.delay);
            Ok(Some(device("hw:0,0")))
        }

        fn subscribe(&self) -> Receiver<DeviceEvent> {
            self.events.clone()
        }
    }

    #[test]
    fn test_lifecycle_happy_path() {
        let engine = AudioEngine::new(AudioConfig::default());
        let events = engine.subscribe().unwrap();
        assert_eq!(engine.state(), EngineState::Uninitialized);
        assert!(!engine.is_ready());

        engine.initialize().unwrap();
        assert_eq!(engine.state(), EngineState::Ready);
        engine.start().unwrap();
        assert!(engine.is_running());
        engine.stop().unwrap();
        assert_eq!(engine.state(), EngineState::Ready);

        let transitions: Vec<(EngineState, EngineState)> = events
            .try_iter()
            .filter_map(|e| match e {
                EngineEvent::StateChanged { previous, current } => Some((previous, current)),
                _ => None,
            })
            .collect();
        assert_eq!(
            transitions,
            vec![
                (EngineState::Uninitialized, EngineState::Initializing),
                (EngineState::Initializing, EngineState::Ready),
                (EngineState::Ready, EngineState::Running),
                (EngineState::Running, EngineState::Stopping),
                (EngineState::Stopping, EngineState::Ready),
            ]
        );
    }

    #[test]
    fn test_initialize_twice_is_illegal() {
        let engine = ready_engine();
        assert!(matches!(
            engine.initialize(),
            Err(CoreError::IllegalState { operation: "initialize", .. })
        ));
        assert_eq!(engine.state(), EngineState::Ready);
    }

    #[test]
    fn test_start_before_initialize_is_illegal() {
        let engine = AudioEngine::new(AudioConfig::default());
        assert!(matches!(engine.start(), Err(CoreError::IllegalState { .. })));
        assert!(matches!(engine.stop(), Err(CoreError::IllegalState { .. })));
        assert!(matches!(
            engine.mixed_output_stream(),
            Err(CoreError::IllegalState { .. })
        ));
        assert!(matches!(
            engine.write_to_output_tap(&[0.0]),
            Err(CoreError::IllegalState { .. })
        ));
    }

    #[test]
    fn test_operations_after_dispose_fail() {
        let engine = ready_engine();
        engine.dispose();
        engine.dispose();
        assert_eq!(engine.state(), EngineState::Disposed);

        assert_eq!(engine.initialize(), Err(CoreError::Disposed("AudioEngine")));
        assert_eq!(engine.start(), Err(CoreError::Disposed("AudioEngine")));
        assert_eq!(engine.stop(), Err(CoreError::Disposed("AudioEngine")));
        assert!(matches!(engine.mixed_output_stream(), Err(CoreError::Disposed(_))));
        assert!(matches!(engine.write_to_output_tap(&[0.5]), Err(CoreError::Disposed(_))));
        assert!(matches!(engine.master_mixer(), Err(CoreError::Disposed(_))));
        assert!(matches!(engine.processor(), Err(CoreError::Disposed(_))));
        assert!(matches!(engine.subscribe(), Err(CoreError::Disposed(_))));
    }

    #[test]
    fn test_dispose_closes_tap_readers() {
        let engine = ready_engine();
        let mut reader = engine.mixed_output_stream().unwrap();
        engine.write_to_output_tap(&[0.5, -0.5]).unwrap();
        engine.dispose();

        let mut buf = [0u8; 8];
        assert_eq!(reader.read(&mut buf).unwrap(), 4);
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_tap_round_trip() {
        let engine = ready_engine();
        assert!(engine.write_to_output_tap(&[0.5, -0.5]).unwrap());

        let mut reader = engine.mixed_output_stream().unwrap();
        let mut buf = [0u8; 16];
        let n = reader.read(&mut buf).unwrap();
        assert_eq!(n, 4);
        assert_eq!(
            [
                i16::from_le_bytes([buf[0], buf[1]]),
                i16::from_le_bytes([buf[2], buf[3]])
            ],
            [16384, -16384]
        );
    }

    #[test]
    fn test_processor_is_handed_out_once() {
        let engine = ready_engine();
        assert!(engine.processor().is_ok());
        assert!(matches!(engine.processor(), Err(CoreError::IllegalState { .. })));
    }

    #[test]
    fn test_processor_silent_until_running() {
        let engine = ready_engine();
        let mixer = engine.master_mixer().unwrap();
        mixer.set_master_volume(1.0);
        let clip: SourceHandle = Arc::new(
            ClipSource::new("chime", SourceCategory::Event, vec![0.5f32; 64], 48000, 2).unwrap(),
        );
        mixer.add_source(clip);

        let mut processor = engine.processor().unwrap();
        let mut out = [1.0f32; 8];
        processor.process(&mut out);
        assert!(out.iter().all(|&s| s == 0.0));

        engine.start().unwrap();
        processor.process(&mut out);
        assert!(out.iter().all(|&s| (s - 0.5).abs() < 1e-6));
        assert_eq!(engine.stats().processed_blocks, 1);
    }

    #[test]
    fn test_invalid_config_keeps_engine_uninitialized() {
        let engine = AudioEngine::new(AudioConfig::default().with_channels(0));
        assert!(matches!(engine.initialize(), Err(CoreError::InvalidArgument(_))));
        assert_eq!(engine.state(), EngineState::Uninitialized);
    }

    #[test]
    fn test_device_resolution_and_forwarding() {
        let (device_tx, device_rx) = crossbeam::channel::unbounded();
        let manager = Arc::new(FakeDeviceManager {
            delay: Duration::ZERO,
            events: device_rx,
        });
        let engine = AudioEngine::with_device_manager(AudioConfig::default(), manager);
        engine.initialize().unwrap();
        assert_eq!(engine.active_device(), Some(device("hw:0,0")));

        let events = engine.subscribe().unwrap();
        let usb = device("hw:1,0");
        device_tx.send(DeviceEvent::DefaultChanged(usb.clone())).unwrap();

        let forwarded = events.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(
            forwarded,
            EngineEvent::DeviceChanged(DeviceEvent::DefaultChanged(usb.clone()))
        );
        assert_eq!(engine.active_device(), Some(usb));
        engine.dispose();
    }

    #[test]
    fn test_tap_write_never_waits_on_initialize() {
        let (_device_tx, device_rx) = crossbeam::channel::unbounded();
        let manager = Arc::new(FakeDeviceManager {
            delay: Duration::from_millis(800),
            events: device_rx,
        });
        let engine = Arc::new(AudioEngine::with_device_manager(
            AudioConfig::default(),
            manager,
        ));

        let init = {
            let engine = engine.clone();
            thread::spawn(move || engine.initialize())
        };
        while engine.state() != EngineState::Initializing {
            thread::yield_now();
        }

        let started = Instant::now();
        let result = engine.write_to_output_tap(&[0.1, 0.1]);
        assert!(started.elapsed() < Duration::from_millis(200));
        assert!(matches!(result, Err(CoreError::IllegalState { .. })));
        assert_eq!(engine.stats().processed_blocks, 0);

        init.join().unwrap().unwrap();
        assert!(engine.write_to_output_tap(&[0.1, 0.1]).unwrap());
    }

    #[test]
    fn test_replaced_targets_are_dropped_off_the_callback() {
        let engine = ready_engine();
        let mut processor = engine.processor().unwrap();
        engine.start().unwrap();

        let config = crate::config::VisualizerConfig::default().with_fft_size(256);
        let first = Arc::new(VisualizerService::new(config.clone()).unwrap());
        let second = Arc::new(VisualizerService::new(config).unwrap());

        let mut out = [0.0f32; 8];
        engine.set_visualizer(first.clone()).unwrap();
        processor.process(&mut out);
        assert_eq!(Arc::strong_count(&first), 3);

        engine.set_visualizer(second.clone()).unwrap();
        assert_eq!(Arc::strong_count(&first), 2);
        processor.process(&mut out);
        // Handed back through the return queue, not dropped by the processor
        assert_eq!(Arc::strong_count(&first), 2);

        engine.stop().unwrap();
        assert_eq!(Arc::strong_count(&first), 1);
        assert!(first.is_active().unwrap());
        assert!(second.is_active().unwrap());
    }

    #[test]
    fn test_device_timeout_moves_to_error() {
        let (_device_tx, device_rx) = crossbeam::channel::unbounded();
        let manager = Arc::new(FakeDeviceManager {
            delay: Duration::from_millis(500),
            events: device_rx,
        });
        let config = AudioConfig::default().with_init_timeout_ms(20);
        let engine = AudioEngine::with_device_manager(config, manager);

        assert!(matches!(engine.initialize(), Err(CoreError::Timeout { .. })));
        assert_eq!(engine.state(), EngineState::Error);
        assert!(matches!(engine.start(), Err(CoreError::IllegalState { .. })));
        engine.dispose();
        assert_eq!(engine.state(), EngineState::Disposed);
    }
}
