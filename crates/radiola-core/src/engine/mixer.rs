//! Master mixer - source registry plus volume/balance/mute math
//!
//! Features:
//! - Insertion-ordered source registry, idempotent by id
//! - Master volume, balance and mute stored as atomics so the real-time
//!   path reads them without locking
//! - Balance only attenuates the opposite channel, it never boosts

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, TryLockError};

use crate::source::{SourceHandle, SourceId};
use crate::types::AtomicF32;

/// Master volume on construction and after `reset()`
pub const DEFAULT_MASTER_VOLUME: f32 = 0.75;

/// Per-block gain snapshot read by the block processor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MixGains {
    /// Effective master volume (0 when muted)
    pub master: f32,
    /// Balance gain for channel 0
    pub left: f32,
    /// Balance gain for channel 1
    pub right: f32,
}

/// Authoritative mix parameters and source registry
pub struct MasterMixer {
    /// Master volume (0.0 to 1.0)
    master_volume: AtomicF32,
    /// Balance (-1.0 = full left, 1.0 = full right)
    balance: AtomicF32,
    muted: AtomicBool,
    /// Active sources in insertion order, unique by id
    sources: Mutex<Vec<SourceHandle>>,
}

impl MasterMixer {
    /// Create a new mixer with default parameters and no sources
    pub fn new() -> Self {
        Self {
            master_volume: AtomicF32::new(DEFAULT_MASTER_VOLUME),
            balance: AtomicF32::new(0.0),
            muted: AtomicBool::new(false),
            sources: Mutex::new(Vec::new()),
        }
    }

    /// Set master volume, clamped to [0, 1]
    pub fn set_master_volume(&self, volume: f32) {
        if volume.is_nan() {
            log::warn!("Ignoring NaN master volume");
            return;
        }
        self.master_volume.set(volume.clamp(0.0, 1.0));
    }

    /// Get master volume
    pub fn master_volume(&self) -> f32 {
        self.master_volume.get()
    }

    /// Set balance, clamped to [-1, 1] (negative = left)
    pub fn set_balance(&self, balance: f32) {
        if balance.is_nan() {
            log::warn!("Ignoring NaN balance");
            return;
        }
        self.balance.set(balance.clamp(-1.0, 1.0));
    }

    /// Get balance
    pub fn balance(&self) -> f32 {
        self.balance.get()
    }

    pub fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::Relaxed);
    }

    pub fn mute(&self) {
        self.set_muted(true);
    }

    pub fn unmute(&self) {
        self.set_muted(false);
    }

    /// Flip the mute flag, returning the new state
    pub fn toggle_mute(&self) -> bool {
        !self.muted.fetch_xor(true, Ordering::Relaxed)
    }

    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::Relaxed)
    }

    /// 0 if muted, otherwise the master volume
    pub fn effective_volume(&self) -> f32 {
        if self.is_muted() {
            0.0
        } else {
            self.master_volume()
        }
    }

    /// 1.0 for balance <= 0, otherwise 1.0 - balance
    pub fn left_channel_gain(&self) -> f32 {
        let balance = self.balance();
        if balance <= 0.0 {
            1.0
        } else {
            1.0 - balance
        }
    }

    /// 1.0 for balance >= 0, otherwise 1.0 + balance
    pub fn right_channel_gain(&self) -> f32 {
        let balance = self.balance();
        if balance >= 0.0 {
            1.0
        } else {
            1.0 + balance
        }
    }

    /// Snapshot of all gains for one block
    pub fn gains(&self) -> MixGains {
        MixGains {
            master: self.effective_volume(),
            left: self.left_channel_gain(),
            right: self.right_channel_gain(),
        }
    }

    /// Register a source. Adding an id that is already present is a no-op.
    ///
    /// Returns whether the source was added.
    pub fn add_source(&self, source: SourceHandle) -> bool {
        let mut sources = self.lock_sources();
        if sources.iter().any(|s| s.id() == source.id()) {
            log::debug!("Source '{}' already registered", source.id());
            return false;
        }
        log::debug!(
            "Source '{}' ({:?}) added to mixer",
            source.id(),
            source.category()
        );
        sources.push(source);
        true
    }

    /// Unregister a source. Missing ids are a no-op.
    ///
    /// Returns whether a source was removed.
    pub fn remove_source(&self, id: &SourceId) -> bool {
        let mut sources = self.lock_sources();
        let before = sources.len();
        sources.retain(|s| s.id() != id);
        let removed = sources.len() != before;
        if removed {
            log::debug!("Source '{}' removed from mixer", id);
        }
        removed
    }

    /// Remove every source
    pub fn clear_sources(&self) {
        let mut sources = self.lock_sources();
        if !sources.is_empty() {
            log::debug!("Clearing {} mixer sources", sources.len());
        }
        sources.clear();
    }

    /// Active sources in insertion order
    pub fn active_sources(&self) -> Vec<SourceHandle> {
        self.lock_sources().clone()
    }

    /// Ids of the active sources in insertion order
    pub fn active_source_ids(&self) -> Vec<SourceId> {
        self.lock_sources().iter().map(|s| s.id().clone()).collect()
    }

    /// Look up a registered source
    pub fn get_source(&self, id: &SourceId) -> Option<SourceHandle> {
        self.lock_sources().iter().find(|s| s.id() == id).cloned()
    }

    pub fn source_count(&self) -> usize {
        self.lock_sources().len()
    }

    /// Restore default volume, balance and mute (sources are kept)
    pub fn reset(&self) {
        self.master_volume.set(DEFAULT_MASTER_VOLUME);
        self.balance.set(0.0);
        self.muted.store(false, Ordering::Relaxed);
    }

    /// Non-blocking registry access for the real-time path
    pub(crate) fn try_sources(&self) -> Option<MutexGuard<'_, Vec<SourceHandle>>> {
        match self.sources.try_lock() {
            Ok(guard) => Some(guard),
            Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => None,
        }
    }

    fn lock_sources(&self) -> MutexGuard<'_, Vec<SourceHandle>> {
        self.sources
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for MasterMixer {
    fn default() -> Self {
        Self::new()
    }
}
