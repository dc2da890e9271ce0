//! Ducking service - priority-based attenuation of background audio
//!
//! The service keeps the active-event set and the priority map behind one
//! short-critical-section mutex, and mirrors the current duck level into an
//! atomic so the block processor reads it without locking.
//!
//! Fades run on a dedicated worker thread driven by `recv_timeout`. Every
//! retarget bumps a generation counter; the worker checks it under the
//! state lock before applying a step, so an aborted ramp can never overwrite
//! the level of a newer one.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{Receiver, RecvTimeoutError, Sender};
use serde::Serialize;

use super::fade::FadePlan;
use crate::config::{DuckPolicy, DuckingConfig};
use crate::engine::AttenuationSource;
use crate::error::{CoreError, CoreResult};
use crate::events::{EventBus, DEFAULT_EVENT_CAPACITY};
use crate::source::{AudioSource, SourceCategory, SourceHandle, SourceId};
use crate::types::AtomicF32;

/// Lowest accepted ducking priority
pub const MIN_PRIORITY: u8 = 1;

/// Highest accepted ducking priority
pub const MAX_PRIORITY: u8 = 10;

/// Duck level with no attenuation, in percent
pub const UNDUCKED_LEVEL: f32 = 100.0;

/// Notification published by the ducking service
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum DuckEvent {
    /// The duck level moved (one per fade step)
    LevelChanged {
        level: f32,
        target: f32,
        transition_complete: bool,
    },
    /// Entered or left the ducked state
    StateChanged { ducking: bool, active_events: usize },
}

/// Messages to the fade worker
enum FadeCommand {
    Start { generation: u64, plan: FadePlan },
    Shutdown,
}

struct DuckingState {
    config: DuckingConfig,
    /// Active events in registration order, unique by id
    active: Vec<SourceHandle>,
    priorities: HashMap<SourceId, u8>,
    /// Current level in percent
    level: f32,
    /// Level the current (or last) ramp is heading to
    target: f32,
    generation: u64,
    disposed: bool,
}

/// State shared between the service handle and its fade worker
struct Shared {
    state: Mutex<DuckingState>,
    /// Lock-free mirror of `state.level` for the mix path
    level: AtomicF32,
    events: EventBus<DuckEvent>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, DuckingState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Apply one ramp step. Caller holds the state lock.
    fn apply_level(&self, state: &mut DuckingState, level: f32, complete: bool) {
        state.level = level;
        self.level.set(level);
        self.events.publish(DuckEvent::LevelChanged {
            level,
            target: state.target,
            transition_complete: complete,
        });
    }
}

/// Automatic attenuation of background audio while event audio plays
pub struct DuckingService {
    shared: Arc<Shared>,
    commands: Sender<FadeCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl DuckingService {
    /// Create the service and start its fade worker
    pub fn new(config: DuckingConfig) -> CoreResult<Self> {
        config.validate()?;
        log::info!(
            "Ducking service: {}% via {:?} (attack {} ms, release {} ms)",
            config.duck_percentage,
            config.policy,
            config.attack_ms,
            config.release_ms
        );

        let shared = Arc::new(Shared {
            state: Mutex::new(DuckingState {
                config,
                active: Vec::new(),
                priorities: HashMap::new(),
                level: UNDUCKED_LEVEL,
                target: UNDUCKED_LEVEL,
                generation: 0,
                disposed: false,
            }),
            level: AtomicF32::new(UNDUCKED_LEVEL),
            events: EventBus::new(DEFAULT_EVENT_CAPACITY),
        });

        let (tx, rx) = crossbeam::channel::unbounded();
        let worker_shared = shared.clone();
        let handle = thread::Builder::new()
            .name("ducking-fade".to_string())
            .spawn(move || run_fade_worker(worker_shared, rx))
            .map_err(|e| CoreError::Spawn {
                name: "ducking-fade",
                reason: e.to_string(),
            })?;

        Ok(Self {
            shared,
            commands: tx,
            worker: Mutex::new(Some(handle)),
        })
    }

    // ─────────────────────────────────────────────────────────────────────
    // Active events
    // ─────────────────────────────────────────────────────────────────────

    /// Register an active event; the first one ducks the background
    ///
    /// Starting an already-active source is a no-op.
    pub fn start_ducking(&self, source: &SourceHandle) -> CoreResult<()> {
        let mut state = self.lock_live("start ducking")?;
        if state.active.iter().any(|s| s.id() == source.id()) {
            log::debug!("Source '{}' is already ducking", source.id());
            return Ok(());
        }

        state.active.push(source.clone());
        let count = state.active.len();
        log::debug!("Ducking started for '{}' ({} active)", source.id(), count);

        if count == 1 {
            let target = state.config.duck_percentage as f32;
            log::info!("Ducking background to {}%", target);
            self.shared.events.publish(DuckEvent::StateChanged {
                ducking: true,
                active_events: count,
            });
            self.retarget(&mut state, target);
        }
        Ok(())
    }

    /// Unregister an active event; the last one restores the background
    ///
    /// Stopping a source that is not active is a no-op.
    pub fn stop_ducking(&self, id: &SourceId) -> CoreResult<()> {
        let mut state = self.lock_live("stop ducking")?;
        let Some(index) = state.active.iter().position(|s| s.id() == id) else {
            log::debug!("Source '{}' was not ducking", id);
            return Ok(());
        };
        let source = state.active.remove(index);
        forget_event_priority(&mut state, &source);

        let count = state.active.len();
        log::debug!("Ducking stopped for '{}' ({} active)", id, count);
        if count == 0 {
            self.restore(&mut state);
        }
        Ok(())
    }

    /// Clear every active event and restore the background
    pub fn stop_all_ducking(&self) -> CoreResult<()> {
        let mut state = self.lock_live("stop all ducking")?;
        let cleared = std::mem::take(&mut state.active);
        for source in &cleared {
            forget_event_priority(&mut state, source);
        }
        let cleared = cleared.len();
        if cleared > 0 {
            log::info!("Cleared {} active ducking events", cleared);
            self.restore(&mut state);
        } else {
            self.retarget(&mut state, UNDUCKED_LEVEL);
        }
        Ok(())
    }

    fn restore(&self, state: &mut DuckingState) {
        log::info!("Restoring background to {}%", UNDUCKED_LEVEL);
        self.shared.events.publish(DuckEvent::StateChanged {
            ducking: false,
            active_events: 0,
        });
        self.retarget(state, UNDUCKED_LEVEL);
    }

    /// Point the duck level at `target`, aborting any ramp in flight
    fn retarget(&self, state: &mut DuckingState, target: f32) {
        if state.target == target {
            // Already there, or already heading there
            return;
        }

        state.generation += 1;
        state.target = target;

        let duration = if target < state.level {
            Duration::from_millis(state.config.attack_ms as u64)
        } else {
            Duration::from_millis(state.config.release_ms as u64)
        };
        let plan = FadePlan::new(state.config.policy, state.level, target, duration);

        if state.config.policy == DuckPolicy::Instant || plan.step_interval().is_zero() {
            for step in 1..=plan.steps() {
                self.shared
                    .apply_level(state, plan.level_at(step), plan.is_last(step));
            }
            return;
        }

        log::debug!(
            "Fading duck level {:.1}% -> {:.1}% in {} steps",
            state.level,
            target,
            plan.steps()
        );
        let command = FadeCommand::Start {
            generation: state.generation,
            plan,
        };
        if self.commands.send(command).is_err() {
            // Worker gone: land on the target rather than stay mid-ramp
            log::warn!("Fade worker unavailable, jumping to {:.1}%", target);
            self.shared.apply_level(state, target, true);
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Priorities
    // ─────────────────────────────────────────────────────────────────────

    /// Priority of `source`: explicit value or its category default
    pub fn get_priority(&self, source: &dyn AudioSource) -> u8 {
        self.shared
            .lock()
            .priorities
            .get(source.id())
            .copied()
            .unwrap_or_else(|| source.category().default_priority())
    }

    /// Set the priority of `source` (1..=10)
    pub fn set_priority(&self, source: &dyn AudioSource, priority: u8) -> CoreResult<()> {
        if !(MIN_PRIORITY..=MAX_PRIORITY).contains(&priority) {
            let err = CoreError::OutOfRange {
                what: "priority",
                value: priority as i64,
                min: MIN_PRIORITY as i64,
                max: MAX_PRIORITY as i64,
            };
            log::warn!("Rejected priority for '{}': {}", source.id(), err);
            return Err(err);
        }
        let mut state = self.lock_live("set priority")?;
        state.priorities.insert(source.id().clone(), priority);
        Ok(())
    }

    /// Forget an explicit priority; returns whether one was set
    pub fn clear_priority(&self, id: &SourceId) -> CoreResult<bool> {
        let mut state = self.lock_live("clear priority")?;
        Ok(state.priorities.remove(id).is_some())
    }

    /// Explicitly set priorities, sorted by id
    pub fn registered_priorities(&self) -> Vec<(SourceId, u8)> {
        let mut priorities: Vec<(SourceId, u8)> = self
            .shared
            .lock()
            .priorities
            .iter()
            .map(|(id, p)| (id.clone(), *p))
            .collect();
        priorities.sort();
        priorities
    }

    /// Active events, highest priority first (ties keep registration order)
    pub fn get_active_events_by_priority(&self) -> Vec<SourceHandle> {
        let state = self.shared.lock();
        let mut events: Vec<(u8, SourceHandle)> = state
            .active
            .iter()
            .map(|source| {
                let priority = state
                    .priorities
                    .get(source.id())
                    .copied()
                    .unwrap_or_else(|| source.category().default_priority());
                (priority, source.clone())
            })
            .collect();
        events.sort_by(|a, b| b.0.cmp(&a.0));
        events.into_iter().map(|(_, source)| source).collect()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Queries and configuration
    // ─────────────────────────────────────────────────────────────────────

    /// Current duck level in percent (100 = unattenuated)
    pub fn current_duck_level(&self) -> f32 {
        self.shared.level.get()
    }

    /// Whether any event is active
    pub fn is_ducking(&self) -> bool {
        !self.shared.lock().active.is_empty()
    }

    pub fn active_event_count(&self) -> usize {
        self.shared.lock().active.len()
    }

    pub fn config(&self) -> DuckingConfig {
        self.shared.lock().config.clone()
    }

    /// Replace the configuration; an active duck is retargeted to the new depth
    pub fn set_config(&self, config: DuckingConfig) -> CoreResult<()> {
        config.validate()?;
        let mut state = self.lock_live("set config")?;
        state.config = config;
        if !state.active.is_empty() {
            let target = state.config.duck_percentage as f32;
            self.retarget(&mut state, target);
        }
        Ok(())
    }

    /// Subscribe to level and state notifications
    pub fn subscribe(&self) -> CoreResult<Receiver<DuckEvent>> {
        self.lock_live("subscribe")?;
        Ok(self.shared.events.subscribe())
    }

    /// Clear the active set, restore full level and stop the fade worker
    ///
    /// Idempotent.
    pub fn dispose(&self) {
        {
            let mut state = self.shared.lock();
            if state.disposed {
                return;
            }
            state.disposed = true;
            state.active.clear();
            state.generation += 1;
            state.target = UNDUCKED_LEVEL;
            state.level = UNDUCKED_LEVEL;
            self.shared.level.set(UNDUCKED_LEVEL);
        }

        let _ = self.commands.send(FadeCommand::Shutdown);
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                log::warn!("Ducking fade worker panicked");
            }
        }
        log::info!("Ducking service disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.lock().disposed
    }

    fn lock_live(&self, operation: &'static str) -> CoreResult<MutexGuard<'_, DuckingState>> {
        let state = self.shared.lock();
        if state.disposed {
            log::warn!("Ducking service rejected '{}': disposed", operation);
            return Err(CoreError::Disposed("DuckingService"));
        }
        Ok(state)
    }
}

impl AttenuationSource for DuckingService {
    fn attenuation(&self) -> f32 {
        (self.shared.level.get() / UNDUCKED_LEVEL).clamp(0.0, 1.0)
    }
}

impl Drop for DuckingService {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Event sources are one-shot clips with fresh ids, so an explicit priority
/// leaves the map together with the event
fn forget_event_priority(state: &mut DuckingState, source: &SourceHandle) {
    if source.category() == SourceCategory::Event {
        state.priorities.remove(source.id());
    }
}

/// Fade worker loop: one ramp at a time, newest command wins
fn run_fade_worker(shared: Arc<Shared>, commands: Receiver<FadeCommand>) {
    log::debug!("Ducking fade worker started");
    let mut current: Option<(u64, FadePlan, u32)> = None;

    loop {
        let received = match &current {
            Some((_, plan, _)) => commands.recv_timeout(plan.step_interval()),
            None => commands.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        match received {
            Ok(FadeCommand::Start { generation, plan }) => {
                current = Some((generation, plan, 0));
            }
            Ok(FadeCommand::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                let Some((generation, plan, step)) = current.as_mut() else {
                    continue;
                };
                *step += 1;
                let generation = *generation;
                let level = plan.level_at(*step);
                let last = plan.is_last(*step);

                let mut state = shared.lock();
                // A newer retarget supersedes this ramp
                let stale = state.generation != generation;
                if !stale {
                    shared.apply_level(&mut state, level, last);
                }
                drop(state);
                if stale || last {
                    current = None;
                }
            }
        }
    }
    log::debug!("Ducking fade worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{SourceCategory, ToneSource};

    fn event(id: &str) -> SourceHandle {
        Arc::new(ToneSource::new(id, SourceCategory::Event, 880.0, 48000, 2).unwrap())
    }

    fn instant() -> DuckingService {
        DuckingService::new(
            DuckingConfig::default()
                .with_percentage(20)
                .with_policy(DuckPolicy::Instant),
        )
        .unwrap()
    }

    fn state_changes(rx: &Receiver<DuckEvent>) -> Vec<(bool, usize)> {
        rx.try_iter()
            .filter_map(|e| match e {
                DuckEvent::StateChanged {
                    ducking,
                    active_events,
                } => Some((ducking, active_events)),
                _ => None,
            })
            .collect()
    }

    /// Collect level events until one is flagged complete
    fn levels_until_complete(rx: &Receiver<DuckEvent>) -> Vec<(f32, bool)> {
        let mut levels = Vec::new();
        while let Ok(event) = rx.recv_timeout(Duration::from_secs(2)) {
            if let DuckEvent::LevelChanged {
                level,
                transition_complete,
                ..
            } = event
            {
                levels.push((level, transition_complete));
                if transition_complete {
                    break;
                }
            }
        }
        levels
    }

    #[test]
    fn test_overlapping_events_duck_once() {
        let ducking = instant();
        let rx = ducking.subscribe().unwrap();
        let (a, b) = (event("doorbell"), event("tts"));

        ducking.start_ducking(&a).unwrap();
        assert!(ducking.is_ducking());
        assert_eq!(ducking.current_duck_level(), 20.0);
        assert_eq!(ducking.active_event_count(), 1);

        ducking.start_ducking(&b).unwrap();
        assert_eq!(ducking.active_event_count(), 2);
        assert_eq!(ducking.current_duck_level(), 20.0);
        assert_eq!(state_changes(&rx), vec![(true, 1)]);

        ducking.stop_ducking(a.id()).unwrap();
        assert!(ducking.is_ducking());
        assert_eq!(ducking.current_duck_level(), 20.0);
        assert_eq!(ducking.active_event_count(), 1);

        ducking.stop_ducking(b.id()).unwrap();
        assert!(!ducking.is_ducking());
        assert_eq!(ducking.current_duck_level(), 100.0);
        assert_eq!(ducking.active_event_count(), 0);
        assert_eq!(state_changes(&rx), vec![(false, 0)]);
    }

    #[test]
    fn test_start_and_stop_are_idempotent() {
        let ducking = instant();
        let a = event("doorbell");
        ducking.start_ducking(&a).unwrap();
        ducking.start_ducking(&a).unwrap();
        assert_eq!(ducking.active_event_count(), 1);

        ducking.stop_ducking(a.id()).unwrap();
        ducking.stop_ducking(a.id()).unwrap();
        assert_eq!(ducking.active_event_count(), 0);
        assert_eq!(ducking.current_duck_level(), 100.0);
    }

    #[test]
    fn test_instant_emits_exactly_one_level_change() {
        let ducking = instant();
        let rx = ducking.subscribe().unwrap();
        ducking.start_ducking(&event("doorbell")).unwrap();

        let levels: Vec<DuckEvent> = rx
            .try_iter()
            .filter(|e| matches!(e, DuckEvent::LevelChanged { .. }))
            .collect();
        assert_eq!(
            levels,
            vec![DuckEvent::LevelChanged {
                level: 20.0,
                target: 20.0,
                transition_complete: true
            }]
        );
    }

    #[test]
    fn test_fade_smooth_emits_intermediate_levels() {
        let config = DuckingConfig::default()
            .with_policy(DuckPolicy::FadeSmooth)
            .with_times(60, 60);
        let ducking = DuckingService::new(config).unwrap();
        let rx = ducking.subscribe().unwrap();

        ducking.start_ducking(&event("doorbell")).unwrap();
        let levels = levels_until_complete(&rx);

        assert!(levels.len() > 1);
        assert!(levels[..levels.len() - 1].iter().all(|(_, done)| !done));
        assert_eq!(levels.last(), Some(&(20.0, true)));
        assert_eq!(ducking.current_duck_level(), 20.0);
    }

    #[test]
    fn test_zero_duration_fade_completes_synchronously() {
        let config = DuckingConfig::default()
            .with_policy(DuckPolicy::FadeQuick)
            .with_times(0, 0);
        let ducking = DuckingService::new(config).unwrap();
        let rx = ducking.subscribe().unwrap();

        ducking.start_ducking(&event("doorbell")).unwrap();
        assert_eq!(ducking.current_duck_level(), 20.0);
        let levels: Vec<DuckEvent> = rx
            .try_iter()
            .filter(|e| matches!(e, DuckEvent::LevelChanged { .. }))
            .collect();
        assert_eq!(levels.len(), 2);
    }

    #[test]
    fn test_stop_all_aborts_fade_and_restores() {
        let config = DuckingConfig::default()
            .with_policy(DuckPolicy::FadeQuick)
            .with_times(2000, 50);
        let ducking = DuckingService::new(config).unwrap();
        let rx = ducking.subscribe().unwrap();

        ducking.start_ducking(&event("doorbell")).unwrap();
        ducking.start_ducking(&event("tts")).unwrap();
        ducking.stop_all_ducking().unwrap();
        assert_eq!(ducking.active_event_count(), 0);

        let levels = levels_until_complete(&rx);
        assert_eq!(levels.last(), Some(&(100.0, true)));
        assert_eq!(ducking.current_duck_level(), 100.0);

        // The aborted 2 s attack must not resume
        thread::sleep(Duration::from_millis(100));
        assert_eq!(ducking.current_duck_level(), 100.0);
    }

    #[test]
    fn test_fade_quick_emits_intermediate_levels() {
        let config = DuckingConfig::default()
            .with_percentage(20)
            .with_policy(DuckPolicy::FadeQuick)
            .with_times(100, 100);
        let ducking = DuckingService::new(config).unwrap();
        let rx = ducking.subscribe().unwrap();

        ducking.start_ducking(&event("doorbell")).unwrap();
        let levels = levels_until_complete(&rx);

        assert!(levels.len() > 1);
        assert!(levels[..levels.len() - 1].iter().all(|(_, done)| !done));
        assert!(levels.windows(2).all(|w| w[1].0 < w[0].0));
        assert_eq!(levels.last(), Some(&(20.0, true)));
    }

    #[test]
    fn test_restart_during_release_heads_back_from_current_level() {
        let config = DuckingConfig::default()
            .with_percentage(20)
            .with_policy(DuckPolicy::FadeQuick)
            .with_times(100, 2000);
        let ducking = DuckingService::new(config).unwrap();
        let rx = ducking.subscribe().unwrap();
        let doorbell = event("doorbell");

        ducking.start_ducking(&doorbell).unwrap();
        assert_eq!(levels_until_complete(&rx).last(), Some(&(20.0, true)));

        ducking.stop_ducking(doorbell.id()).unwrap();
        thread::sleep(Duration::from_millis(150));
        let mid_release = ducking.current_duck_level();
        assert!(mid_release > 20.0 && mid_release < 100.0);

        ducking.start_ducking(&doorbell).unwrap();
        let mut attack = Vec::new();
        while let Ok(event) = rx.recv_timeout(Duration::from_secs(2)) {
            if let DuckEvent::LevelChanged {
                level,
                target,
                transition_complete,
            } = event
            {
                // Steps of the aborted release still carry their own target
                if target != 20.0 {
                    continue;
                }
                attack.push(level);
                if transition_complete {
                    break;
                }
            }
        }

        assert!(attack.len() > 1);
        assert!(attack[0] > 20.0 && attack[0] <= mid_release + 1.0);
        assert!(attack.windows(2).all(|w| w[1] < w[0]));
        assert_eq!(attack.last(), Some(&20.0));

        // The aborted release must not resume
        thread::sleep(Duration::from_millis(100));
        assert_eq!(ducking.current_duck_level(), 20.0);
    }

    #[test]
    fn test_event_priority_leaves_with_the_event() {
        let ducking = instant();
        let tts = event("tts-0042");
        let tuner: SourceHandle =
            Arc::new(ToneSource::new("fm", SourceCategory::Primary, 440.0, 48000, 2).unwrap());
        ducking.set_priority(tts.as_ref(), 9).unwrap();
        ducking.set_priority(tuner.as_ref(), 3).unwrap();

        ducking.start_ducking(&tts).unwrap();
        ducking.start_ducking(&tuner).unwrap();
        assert_eq!(ducking.get_priority(tts.as_ref()), 9);

        ducking.stop_ducking(tts.id()).unwrap();
        ducking.stop_all_ducking().unwrap();
        assert_eq!(
            ducking.registered_priorities(),
            vec![(tuner.id().clone(), 3)]
        );
        assert_eq!(ducking.get_priority(tts.as_ref()), 7);
    }

    #[test]
    fn test_default_priorities_by_category() {
        let ducking = instant();
        let background = ToneSource::new("fm", SourceCategory::Primary, 440.0, 48000, 2).unwrap();
        assert_eq!(ducking.get_priority(&background), 5);
        assert_eq!(ducking.get_priority(event("doorbell").as_ref()), 7);
    }

    #[test]
    fn test_priority_bounds() {
        let ducking = instant();
        let a = event("doorbell");
        assert!(matches!(
            ducking.set_priority(a.as_ref(), 0),
            Err(CoreError::OutOfRange { value: 0, .. })
        ));
        assert!(matches!(
            ducking.set_priority(a.as_ref(), 11),
            Err(CoreError::OutOfRange { value: 11, .. })
        ));
        ducking.set_priority(a.as_ref(), 10).unwrap();
        assert_eq!(ducking.get_priority(a.as_ref()), 10);

        assert!(ducking.clear_priority(a.id()).unwrap());
        assert_eq!(ducking.get_priority(a.as_ref()), 7);
    }

    #[test]
    fn test_active_events_by_priority() {
        let ducking = instant();
        let sources: Vec<SourceHandle> = ["low", "high", "mid", "mid-too"]
            .iter()
            .map(|id| event(id))
            .collect();
        for (source, priority) in sources.iter().zip([3u8, 9, 5, 5]) {
            ducking.set_priority(source.as_ref(), priority).unwrap();
            ducking.start_ducking(source).unwrap();
        }

        let ordered: Vec<String> = ducking
            .get_active_events_by_priority()
            .iter()
            .map(|s| s.id().to_string())
            .collect();
        assert_eq!(ordered, ["high", "mid", "mid-too", "low"]);
    }

    #[test]
    fn test_set_config_retargets_active_duck() {
        let ducking = instant();
        ducking.start_ducking(&event("doorbell")).unwrap();
        ducking
            .set_config(
                DuckingConfig::default()
                    .with_percentage(50)
                    .with_policy(DuckPolicy::Instant),
            )
            .unwrap();
        assert_eq!(ducking.current_duck_level(), 50.0);
        assert!((ducking.attenuation() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_dispose_clears_and_rejects() {
        let ducking = instant();
        let a = event("doorbell");
        ducking.start_ducking(&a).unwrap();

        ducking.dispose();
        ducking.dispose();
        assert!(ducking.is_disposed());
        assert_eq!(ducking.active_event_count(), 0);
        assert_eq!(ducking.attenuation(), 1.0);

        assert_eq!(ducking.start_ducking(&a), Err(CoreError::Disposed("DuckingService")));
        assert_eq!(ducking.stop_ducking(a.id()), Err(CoreError::Disposed("DuckingService")));
        assert_eq!(ducking.stop_all_ducking(), Err(CoreError::Disposed("DuckingService")));
        assert!(matches!(
            ducking.set_priority(a.as_ref(), 5),
            Err(CoreError::Disposed(_))
        ));
    }
}
