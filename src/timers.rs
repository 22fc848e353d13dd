//! Named one-shot timers merged into a single wait deadline.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerId {
    Animate,
    Slideshow,
    KeyRepeat,
    /// Debounced reload after the displayed file changed on disk.
    Reload,
}

impl TimerId {
    const ALL: [TimerId; 4] = [
        TimerId::Animate,
        TimerId::Slideshow,
        TimerId::KeyRepeat,
        TimerId::Reload,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

/// What a fired timer wants next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reschedule {
    Done,
    After(Duration),
}

#[derive(Debug, Default)]
pub struct Timers {
    deadlines: [Option<Instant>; 4],
}

impl Timers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm `id` to fire `delay` from now. An armed timer keeps its deadline
    /// unless `overwrite` is set.
    pub fn arm(&mut self, id: TimerId, delay: Duration, overwrite: bool) {
        self.arm_at(id, Instant::now() + delay, overwrite);
    }

    pub fn arm_at(&mut self, id: TimerId, when: Instant, overwrite: bool) {
        let slot = &mut self.deadlines[id.index()];
        if slot.is_none() || overwrite {
            *slot = Some(when);
            log::trace!("timer {:?} armed", id);
        }
    }

    pub fn disarm(&mut self, id: TimerId) {
        self.deadlines[id.index()] = None;
    }

    pub fn is_armed(&self, id: TimerId) -> bool {
        self.deadlines[id.index()].is_some()
    }

    #[cfg(test)]
    pub fn deadline(&self, id: TimerId) -> Option<Instant> {
        self.deadlines[id.index()]
    }

    /// Disarm and return one timer whose deadline has passed.
    pub fn take_expired(&mut self, now: Instant) -> Option<TimerId> {
        let id = TimerId::ALL
            .into_iter()
            .find(|id| matches!(self.deadlines[id.index()], Some(t) if t <= now))?;
        self.disarm(id);
        Some(id)
    }

    /// Time until the earliest armed deadline.
    pub fn next_delay(&self, now: Instant) -> Option<Duration> {
        self.deadlines
            .iter()
            .flatten()
            .map(|t| t.saturating_duration_since(now))
            .min()
    }

    /// Fire every expired timer, rescanning after each one so that timers
    /// armed by a handler are seen in the same pass. Returns the wait bound.
    pub fn poll_and_fire<F>(&mut self, now: Instant, mut fire: F) -> Option<Duration>
    where
        F: FnMut(TimerId, &mut Timers) -> Reschedule,
    {
        while let Some(id) = self.take_expired(now) {
            if let Reschedule::After(d) = fire(id, self) {
                self.arm_at(id, now + d.max(Duration::from_millis(1)), true);
            }
        }
        self.next_delay(now)
    }
}
