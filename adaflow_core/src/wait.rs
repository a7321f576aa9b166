//! Multi-object temperature wait.
//!
//! On an object switch the dispatch context must not start the next object
//! until the hotend is inside tolerance of its target. The wait is a condvar
//! blocked on the temperature published by the control tick: "wait
//! indefinitely" semantics without a busy spin. There is deliberately no
//! timeout: starting an object thermally unstable is worse than stalling,
//! and the wait is bounded by physics when the sensor is sane.

use std::sync::{Condvar, Mutex};

#[derive(Debug, Default)]
pub struct TempWait {
    current: Mutex<f32>,
    changed: Condvar,
}

impl TempWait {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish the latest measured temperature; called once per tick.
    pub fn notify(&self, temp_c: f32) {
        let mut cur = self
            .current
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *cur = temp_c;
        drop(cur);
        self.changed.notify_all();
    }

    /// Last published temperature.
    pub fn current(&self) -> f32 {
        *self
            .current
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Block until `|current − target| ≤ tolerance`. A stalled wait with a
    /// miscalibrated sensor never returns; that trade-off is intentional.
    pub fn wait_for(&self, target_c: f32, tolerance_c: f32) {
        let mut cur = self
            .current
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        while (*cur - target_c).abs() > tolerance_c {
            cur = self
                .changed
                .wait(cur)
                .unwrap_or_else(std::sync::PoisonError::into_inner);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn returns_immediately_when_in_tolerance() {
        let w = TempWait::new();
        w.notify(209.0);
        w.wait_for(210.0, 3.0);
    }

    #[test]
    fn blocks_until_notified_into_tolerance() {
        let w = Arc::new(TempWait::new());
        w.notify(180.0);
        let waiter = {
            let w = w.clone();
            std::thread::spawn(move || w.wait_for(210.0, 3.0))
        };
        // Walk the temperature up from another thread.
        std::thread::sleep(Duration::from_millis(20));
        w.notify(195.0);
        std::thread::sleep(Duration::from_millis(20));
        w.notify(209.5);
        waiter.join().expect("waiter thread");
    }
}
