//! Command tap: observes outgoing motion commands and rebroadcasts them to
//! subscribers without altering host dispatch.
//!
//! Broadcast is synchronous on the dispatch context, in program order, and
//! fire-and-forget: a subscriber panic is caught and logged so it can never
//! stall motion execution, and there is no back-pressure path.

use crate::gcode::{self, GcodeCommand};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex};

type Subscriber = Arc<dyn Fn(&GcodeCommand) + Send + Sync>;

#[derive(Default)]
pub struct CommandTap {
    subscribers: Mutex<Vec<Subscriber>>,
}

impl CommandTap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber. Registration is rare; the lock is held only to
    /// push the entry.
    pub fn subscribe(&self, f: impl Fn(&GcodeCommand) + Send + Sync + 'static) {
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.push(Arc::new(f));
        }
    }

    /// Publish one raw G-code line to every subscriber in registration order.
    pub fn publish_line(&self, line: &str) {
        self.publish(&gcode::parse(line));
    }

    /// Publish an already-parsed command.
    pub fn publish(&self, cmd: &GcodeCommand) {
        // Snapshot under the lock, dispatch outside it: a slow or panicking
        // subscriber must not hold up registration or the dispatch path.
        let snapshot: Vec<Subscriber> = match self.subscribers.lock() {
            Ok(subs) => subs.clone(),
            Err(_) => return,
        };
        for sub in snapshot {
            if catch_unwind(AssertUnwindSafe(|| sub(cmd))).is_err() {
                tracing::warn!("command tap subscriber panicked; command dropped for it");
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().map(|s| s.len()).unwrap_or(0)
    }
}
