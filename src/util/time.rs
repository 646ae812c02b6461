//! Time utilities for the room tick loop

use std::time::{Duration, Instant};

use crate::game::Fixed;

/// Server start time for uptime tracking
static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// What a room should do on one scheduler tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    pub number: u64,
    /// Simulation step for this tick; `None` when the step rounds to zero
    pub simulate_dt: Option<Fixed>,
    pub broadcast: bool,
}

/// Drives simulation and broadcast from one monotonic tick counter.
///
/// Step lengths are derived from the counter, not from wall-clock reads, so
/// the sum of the first `n` steps is always `n * period` rounded down to
/// whole milliseconds.
#[derive(Debug, Clone)]
pub struct Scheduler {
    period_micros: u64,
    broadcast_every: u64,
    tick: u64,
}

impl Scheduler {
    /// `tick_rate` simulation steps per second, `broadcast_rate` flushes per
    /// second. The broadcast rate is rounded to a whole number of ticks.
    pub fn new(tick_rate: u32, broadcast_rate: u32) -> Self {
        let tick_rate = tick_rate.max(1);
        let broadcast_rate = broadcast_rate.clamp(1, tick_rate);
        Self {
            period_micros: 1_000_000 / tick_rate as u64,
            broadcast_every: (tick_rate / broadcast_rate).max(1) as u64,
            tick: 0,
        }
    }

    pub fn period(&self) -> Duration {
        Duration::from_micros(self.period_micros)
    }

    pub fn broadcast_every(&self) -> u64 {
        self.broadcast_every
    }

    /// Ticks elapsed so far
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn advance(&mut self) -> Tick {
        let previous = self.elapsed_millis(self.tick);
        self.tick += 1;
        let step = self.elapsed_millis(self.tick) - previous;

        Tick {
            number: self.tick,
            simulate_dt: (step > 0).then(|| Fixed::from_raw(step as i32)),
            broadcast: self.tick % self.broadcast_every == 0,
        }
    }

    fn elapsed_millis(&self, tick: u64) -> u64 {
        tick * self.period_micros / 1_000
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn steps(scheduler: &mut Scheduler, n: usize) -> Vec<i32> {
        (0..n)
            .map(|_| scheduler.advance().simulate_dt.map_or(0, Fixed::raw))
            .collect()
    }

    #[test]
    fn sixty_hz_steps_are_exact() {
        let mut scheduler = Scheduler::new(60, 20);
        assert_eq!(scheduler.period(), Duration::from_micros(16_666));
        assert_eq!(steps(&mut scheduler, 6), vec![16, 17, 16, 17, 17, 16]);

        let mut scheduler = Scheduler::new(60, 20);
        let total: i32 = steps(&mut scheduler, 60).iter().sum();
        assert_eq!(total, 999);
    }

    #[test]
    fn broadcast_every_third_tick_at_sixty_twenty() {
        let mut scheduler = Scheduler::new(60, 20);
        let flags: Vec<bool> = (0..6).map(|_| scheduler.advance().broadcast).collect();
        assert_eq!(flags, vec![false, false, true, false, false, true]);
        assert_eq!(scheduler.tick(), 6);
    }

    #[test]
    fn rates_are_sanitized() {
        let scheduler = Scheduler::new(0, 0);
        assert_eq!(scheduler.period(), Duration::from_secs(1));
        assert_eq!(scheduler.broadcast_every(), 1);

        let scheduler = Scheduler::new(30, 120);
        assert_eq!(scheduler.broadcast_every(), 1);
    }

    #[test]
    fn sub_millisecond_ticks_skip_simulation() {
        let mut scheduler = Scheduler::new(4000, 4000);
        let ticks: Vec<Tick> = (0..4).map(|_| scheduler.advance()).collect();
        assert_eq!(ticks[0].simulate_dt, None);
        assert_eq!(ticks[3].simulate_dt, Some(Fixed::from_raw(1)));
    }
}
