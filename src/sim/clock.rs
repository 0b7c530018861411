//! Simulation clock.
//!
//! All timestamps in the core (cooldown ends, effect expiry, combo
//! windows, match timers) are expressed in simulation seconds read from
//! this resource. Wall-clock time never enters the simulation: the clock
//! advances by the tick's `dt` at the start of every tick, so a scenario
//! replays identically regardless of host timing.

use bevy::prelude::*;

/// Monotonic simulation time, advanced once per tick.
#[derive(Resource, Debug, Clone, Copy)]
pub struct SimClock {
    now: f64,
    tick: u64,
    dt: f32,
}

impl Default for SimClock {
    fn default() -> Self {
        Self {
            now: 0.0,
            tick: 0,
            dt: 0.0,
        }
    }
}

impl SimClock {
    /// Current simulation time in seconds since world start.
    pub fn now(&self) -> f64 {
        self.now
    }

    /// Index of the tick currently being processed.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Delta applied at the start of the current tick.
    pub fn dt(&self) -> f32 {
        self.dt
    }

    /// Advance the clock by one tick of `dt` seconds.
    pub fn advance(&mut self, dt: f32) {
        self.now += dt as f64;
        self.tick += 1;
        self.dt = dt;
    }
}

/// Advances [`SimClock`] from the schedule's time source. Runs first in
/// the ingress phase so every later system observes the same `now`.
pub fn advance_clock(time: Res<Time>, mut clock: ResMut<SimClock>) {
    clock.advance(time.delta_secs());
}
