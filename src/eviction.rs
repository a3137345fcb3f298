//! Keyframe-aware playback buffer eviction
//!
//! The playback buffer may only be trimmed at a keyframe, otherwise the
//! samples that remain would reference pictures that are gone. Every
//! accepted keyframe is recorded in a [`KeyframeIndex`]; a pass of the
//! [`EvictionPolicy`] picks the latest keyframe strictly before the playback
//! position and evicts everything in front of it.
//!
//! ```text
//! keyframes:   0s      2s          5s            9s
//!              |-------|-----------|------|------|
//!                                         ^ position 6s
//!              [ evicted ---------)[ kept ...
//!                                  cutoff = 5s
//! ```

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Time-ordered keyframe decode times, in seconds
#[derive(Debug, Clone, Default)]
pub struct KeyframeIndex {
    times: VecDeque<f64>,
}

impl KeyframeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a keyframe, keeping the index ordered
    pub fn record(&mut self, time: f64) {
        match self.times.back() {
            Some(&last) if time < last => {
                let pos = self.times.partition_point(|&t| t <= time);
                self.times.insert(pos, time);
            }
            _ => self.times.push_back(time),
        }
    }

    /// Latest keyframe strictly before `position`
    pub fn latest_before(&self, position: f64) -> Option<f64> {
        self.times.iter().rev().copied().find(|&t| t < position)
    }

    /// Drop every keyframe before `cutoff`, returning how many were removed
    pub fn prune_before(&mut self, cutoff: f64) -> usize {
        let count = self.times.partition_point(|&t| t < cutoff);
        self.times.drain(..count);
        count
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn clear(&mut self) {
        self.times.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.times.iter().copied()
    }
}

/// Decides when and up to where the playback buffer may be trimmed
#[derive(Debug)]
pub struct EvictionPolicy {
    index: KeyframeIndex,
    enabled: bool,
    /// Every frame is a sync point, so any position is a valid cutoff
    audio_only: bool,
    interval: Duration,
    last_pass: Instant,
}

impl EvictionPolicy {
    pub fn new(enabled: bool, audio_only: bool, interval: Duration) -> Self {
        Self::starting_at(enabled, audio_only, interval, Instant::now())
    }

    /// Policy whose first pass becomes due `interval` after `start`
    pub fn starting_at(enabled: bool, audio_only: bool, interval: Duration, start: Instant) -> Self {
        Self {
            index: KeyframeIndex::new(),
            enabled,
            audio_only,
            interval,
            last_pass: start,
        }
    }

    pub fn index(&self) -> &KeyframeIndex {
        &self.index
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Record keyframe times from one feed
    pub fn record(&mut self, keyframes: impl IntoIterator<Item = f64>) {
        if !self.enabled {
            return;
        }
        for time in keyframes {
            self.index.record(time);
        }
    }

    /// Whether a pass is due at `now`
    pub fn is_due(&self, now: Instant) -> bool {
        self.enabled && now.saturating_duration_since(self.last_pass) >= self.interval
    }

    /// Run a pass if one is due, returning the eviction cutoff in seconds
    pub fn poll(&mut self, now: Instant, position: f64) -> Option<f64> {
        if !self.is_due(now) {
            return None;
        }
        self.last_pass = now;
        self.cutoff(position)
    }

    /// Cutoff for `position`, pruning the index up to it
    pub fn cutoff(&mut self, position: f64) -> Option<f64> {
        if self.audio_only {
            return (position > 0.0).then_some(position);
        }
        let cutoff = self.index.latest_before(position)?;
        let pruned = self.index.prune_before(cutoff);
        tracing::debug!(
            position = position,
            cutoff = cutoff,
            pruned = pruned,
            remaining = self.index.len(),
            "Eviction cutoff computed"
        );
        Some(cutoff)
    }

    /// Forget recorded keyframes and restart the pass timer
    pub fn reset(&mut self, now: Instant) {
        self.index.clear();
        self.last_pass = now;
    }
}
