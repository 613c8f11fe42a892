//! Change feed for observing committed writes.
//!
//! The feed keeps a bounded history of recent events and forwards every
//! new event to the subscribers whose filter accepts it. Events are emitted
//! only after commit, in commit order.

use parking_lot::RwLock;
use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, Sender};

use crate::error::{CollError, CollResult};
use crate::watch::ChangeEvent;

/// Predicate selecting the events a subscriber receives.
pub type EventFilter = Box<dyn Fn(&ChangeEvent) -> bool + Send + Sync>;

struct Subscriber {
    sender: Sender<ChangeEvent>,
    filter: EventFilter,
}

#[derive(Default)]
struct History {
    events: VecDeque<ChangeEvent>,
    // Highest revision dropped from the front.
    trimmed_through: u64,
}

/// Distributes committed events to filtered subscribers.
pub struct ChangeFeed {
    subscribers: RwLock<Vec<Subscriber>>,
    history: RwLock<History>,
    max_history: usize,
}

impl std::fmt::Debug for ChangeFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeFeed")
            .field("subscribers", &self.subscriber_count())
            .field("history", &self.history_len())
            .field("max_history", &self.max_history)
            .finish()
    }
}

impl ChangeFeed {
    /// Creates a feed retaining up to `max_history` events.
    pub fn with_max_history(max_history: usize) -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            history: RwLock::new(History::default()),
            max_history,
        }
    }

    /// Subscribes to future events accepted by `filter`.
    ///
    /// `initial` is queued first, followed by every retained event after
    /// `since` (when given) that passes the filter. Fails if events after
    /// `since` have already been trimmed from history.
    pub fn subscribe(
        &self,
        filter: EventFilter,
        initial: Vec<ChangeEvent>,
        since: Option<u64>,
    ) -> CollResult<Receiver<ChangeEvent>> {
        let (sender, receiver) = mpsc::channel();
        let mut subscribers = self.subscribers.write();

        for event in initial {
            let _ = sender.send(event);
        }
        if let Some(cursor) = since {
            let history = self.history.read();
            if cursor < history.trimmed_through {
                return Err(CollError::configuration(format!(
                    "history before revision {} is no longer retained",
                    history.trimmed_through + 1
                )));
            }
            for event in history.events.iter().filter(|e| e.revision > cursor) {
                if filter(event) {
                    let _ = sender.send(event.clone());
                }
            }
        }

        subscribers.push(Subscriber { sender, filter });
        Ok(receiver)
    }

    /// Records `event` and forwards it to matching subscribers.
    ///
    /// Subscribers whose receiver is gone are dropped.
    pub fn emit(&self, event: ChangeEvent) {
        let mut subscribers = self.subscribers.write();
        {
            let mut history = self.history.write();
            history.events.push_back(event.clone());
            while history.events.len() > self.max_history {
                if let Some(dropped) = history.events.pop_front() {
                    history.trimmed_through = dropped.revision;
                }
            }
        }
        subscribers.retain(|sub| !(sub.filter)(&event) || sub.sender.send(event.clone()).is_ok());
    }

    /// Emits the events of one commit.
    pub fn emit_batch(&self, events: Vec<ChangeEvent>) {
        for event in events {
            self.emit(event);
        }
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Number of retained events.
    pub fn history_len(&self) -> usize {
        self.history.read().events.len()
    }
}
