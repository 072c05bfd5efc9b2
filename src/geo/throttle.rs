//! Minimum spacing between live upstream requests.
//!
//! Clones share one clock, so every backend of a batch draws from the same
//! budget and each HTTP request waits on the one before it.

use std::cell::Cell;
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct Throttle {
    interval: Duration,
    last: Rc<Cell<Option<Instant>>>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Rc::new(Cell::new(None)),
        }
    }

    /// A throttle that never waits.
    pub fn none() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Block until at least `interval` has passed since the previous request
    /// made through this throttle or any of its clones.
    pub fn wait(&self) {
        if let Some(last) = self.last.get() {
            let elapsed = last.elapsed();
            if elapsed < self.interval {
                thread::sleep(self.interval - elapsed);
            }
        }
        self.last.set(Some(Instant::now()));
    }
}
