//! Simulated effect manager.
//!
//! Mirrors how the controller firmware rotates effects: a fixed list with
//! per-effect enable flags, a rotation interval, and next/previous that wrap
//! around and skip disabled effects while at least one effect is enabled.
//! The rotation catches up lazily whenever the manager is read, so no
//! background task is needed.

use std::sync::Arc;

use serde_json::{Value, json};

use stripdeck_core::clock::{Clock, Millis};

/// Default rotation interval.
pub const DEFAULT_INTERVAL_MS: Millis = 30_000;

/// Effect names of the stock strip build.
pub const DEFAULT_EFFECTS: &[&str] = &[
    "Rainbow Fill",
    "Fire",
    "Color Cycle",
    "Twinkle Stars",
    "Meteor Shower",
    "Marquee",
    "Spectrum Bars",
    "Bouncing Balls",
];

#[derive(Debug, Clone, PartialEq, Eq)]
struct SimEffect {
    name: String,
    enabled: bool,
}

pub struct EffectManager {
    clock: Arc<dyn Clock>,
    effects: Vec<SimEffect>,
    current: usize,
    interval: Millis,
    started: Millis,
}

impl std::fmt::Debug for EffectManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectManager")
            .field("effects", &self.effects.len())
            .field("current", &self.current)
            .field("interval", &self.interval)
            .field("started", &self.started)
            .finish()
    }
}

impl EffectManager {
    /// All effects start enabled; the first one is running.
    pub fn new<S: Into<String>>(
        clock: Arc<dyn Clock>,
        names: impl IntoIterator<Item = S>,
        interval: Millis,
    ) -> Self {
        let started = clock.now();
        Self {
            clock,
            effects: names
                .into_iter()
                .map(|name| SimEffect {
                    name: name.into(),
                    enabled: true,
                })
                .collect(),
            current: 0,
            interval,
            started,
        }
    }

    pub fn with_default_effects(clock: Arc<dyn Clock>) -> Self {
        Self::new(clock, DEFAULT_EFFECTS.iter().copied(), DEFAULT_INTERVAL_MS)
    }

    pub fn effect_count(&self) -> usize {
        self.effects.len()
    }

    pub fn enabled_count(&self) -> usize {
        self.effects.iter().filter(|e| e.enabled).count()
    }

    pub fn current_index(&mut self) -> usize {
        self.catch_up();
        self.current
    }

    pub fn interval(&self) -> Millis {
        self.interval
    }

    /// 0 stops rotation.
    pub fn set_interval(&mut self, interval: Millis) {
        self.catch_up();
        self.interval = interval;
    }

    pub fn is_enabled(&self, index: usize) -> bool {
        self.effects.get(index).is_some_and(|e| e.enabled)
    }

    /// Returns false for an out-of-range index.
    pub fn enable(&mut self, index: usize) -> bool {
        self.set_enabled(index, true)
    }

    pub fn disable(&mut self, index: usize) -> bool {
        self.set_enabled(index, false)
    }

    fn set_enabled(&mut self, index: usize, enabled: bool) -> bool {
        match self.effects.get_mut(index) {
            Some(effect) => {
                effect.enabled = enabled;
                true
            }
            None => {
                log::warn!("invalid index {index} for set_enabled");
                false
            }
        }
    }

    /// Jump to `index` and restart its timer. Returns false if out of range.
    pub fn select(&mut self, index: usize) -> bool {
        if index >= self.effects.len() {
            log::warn!("invalid index {index} for select");
            return false;
        }
        self.current = index;
        self.started = self.clock.now();
        true
    }

    pub fn next(&mut self) {
        self.catch_up();
        self.advance(true);
        self.started = self.clock.now();
    }

    pub fn previous(&mut self) {
        self.catch_up();
        self.advance(false);
        self.started = self.clock.now();
    }

    fn advance(&mut self, forward: bool) {
        let n = self.effects.len();
        if n == 0 {
            return;
        }
        let skip_disabled = self.enabled_count() > 0;
        loop {
            self.current = if forward {
                (self.current + 1) % n
            } else {
                (self.current + n - 1) % n
            };
            if !skip_disabled || self.effects[self.current].enabled {
                break;
            }
        }
    }

    /// Apply every rotation that fell due since the last read.
    fn catch_up(&mut self) {
        if self.interval == 0 || self.effects.is_empty() {
            return;
        }
        let elapsed = self.clock.now().saturating_sub(self.started);
        let due = elapsed / self.interval;
        // After the first step the rotation is periodic in the cycle length.
        let cycle = match self.enabled_count() {
            0 => self.effects.len() as u64,
            n => n as u64,
        };
        let steps = if due > cycle {
            cycle + (due - cycle) % cycle
        } else {
            due
        };
        for _ in 0..steps {
            self.advance(true);
        }
        self.started += due * self.interval;
    }

    /// Time the current effect has been running.
    pub fn elapsed(&mut self) -> Millis {
        self.catch_up();
        self.clock.now().saturating_sub(self.started)
    }

    /// Time until the next rotation; 0 when rotation is off.
    pub fn remaining(&mut self) -> Millis {
        if self.interval == 0 {
            return 0;
        }
        let elapsed = self.elapsed();
        self.interval.saturating_sub(elapsed)
    }

    /// Body of `/getEffectList`, using the controller's field names.
    pub fn effect_list_json(&mut self) -> Value {
        let remaining = self.remaining();
        json!({
            "currentEffect": self.current,
            "millisecondsRemaining": remaining,
            "effectInterval": self.interval,
            "enabledCount": self.enabled_count(),
            "Effects": self
                .effects
                .iter()
                .map(|e| json!({ "name": e.name, "enabled": e.enabled }))
                .collect::<Vec<_>>(),
        })
    }
}
