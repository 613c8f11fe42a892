//! Change notification types.
//!
//! Backends that support watching publish a [`ChangeEvent`] per committed
//! write. A [`Watcher`] receives the events that match its subscription and
//! decodes them into the model's wire message.

use std::marker::PhantomData;
use std::sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError};
use std::time::Duration;

use relcoll_codec::decode_row;

use crate::error::CollResult;
use crate::model::Model;

/// Kind of a committed change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    /// The key was created or replaced.
    Put,
    /// The key was removed.
    Delete,
}

/// A committed write as published by a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Store revision assigned at commit.
    pub revision: u64,
    /// Table written to.
    pub table: String,
    /// Primary key.
    pub key: String,
    /// Kind of change.
    pub kind: EventType,
    /// Encoded row after the change. `None` for deletes.
    pub payload: Option<Vec<u8>>,
    /// Encoded row before the change, if the key existed.
    pub prev_payload: Option<Vec<u8>>,
}

impl ChangeEvent {
    /// Creates a put event.
    pub fn put(
        revision: u64,
        table: impl Into<String>,
        key: impl Into<String>,
        payload: Vec<u8>,
        prev_payload: Option<Vec<u8>>,
    ) -> Self {
        Self {
            revision,
            table: table.into(),
            key: key.into(),
            kind: EventType::Put,
            payload: Some(payload),
            prev_payload,
        }
    }

    /// Creates a delete event.
    pub fn delete(
        revision: u64,
        table: impl Into<String>,
        key: impl Into<String>,
        prev_payload: Option<Vec<u8>>,
    ) -> Self {
        Self {
            revision,
            table: table.into(),
            key: key.into(),
            kind: EventType::Delete,
            payload: None,
            prev_payload,
        }
    }

    /// The row bytes filters should be evaluated against.
    #[must_use]
    pub fn subject(&self) -> Option<&[u8]> {
        match self.kind {
            EventType::Put => self.payload.as_deref(),
            EventType::Delete => self.prev_payload.as_deref(),
        }
    }
}

/// A decoded change delivered to a watcher.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchEvent<T> {
    /// Kind of change.
    pub kind: EventType,
    /// Primary key.
    pub key: String,
    /// New value for puts.
    pub value: Option<T>,
    /// Store revision of the change.
    pub revision: u64,
}

/// Options for starting a watch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchOptions {
    /// Deliver every currently matching record as a `Put` before live events.
    pub include_initial: bool,
    /// Replay retained history after this revision before live events.
    pub since_revision: Option<u64>,
    /// Only keys starting with this prefix. Ignored by `watch_one`.
    pub prefix: Option<String>,
}

impl WatchOptions {
    /// Live events only.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replays current records first.
    #[must_use]
    pub fn with_initial(mut self) -> Self {
        self.include_initial = true;
        self
    }

    /// Replays retained history after `revision` first.
    #[must_use]
    pub fn since(mut self, revision: u64) -> Self {
        self.since_revision = Some(revision);
        self
    }

    /// Restricts the watch to keys with `prefix`.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }
}

/// Receiving end of a watch.
///
/// The watch ends when the watcher is dropped or the store goes away; after
/// that every receive returns `Ok(None)`.
pub struct Watcher<M: Model> {
    receiver: Receiver<ChangeEvent>,
    _model: PhantomData<fn() -> M>,
}

impl<M: Model> std::fmt::Debug for Watcher<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watcher")
            .field("table", &M::table_name())
            .finish()
    }
}

impl<M: Model> Watcher<M> {
    pub(crate) fn new(receiver: Receiver<ChangeEvent>) -> Self {
        Self {
            receiver,
            _model: PhantomData,
        }
    }

    /// Blocks until the next event.
    pub fn recv(&self) -> CollResult<Option<WatchEvent<M::Message>>> {
        match self.receiver.recv() {
            Ok(event) => decode_event::<M>(event).map(Some),
            Err(_) => Ok(None),
        }
    }

    /// Waits up to `timeout` for the next event.
    pub fn recv_timeout(&self, timeout: Duration) -> CollResult<Option<WatchEvent<M::Message>>> {
        match self.receiver.recv_timeout(timeout) {
            Ok(event) => decode_event::<M>(event).map(Some),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => Ok(None),
        }
    }

    /// Returns the next event if one is already queued.
    pub fn try_recv(&self) -> CollResult<Option<WatchEvent<M::Message>>> {
        match self.receiver.try_recv() {
            Ok(event) => decode_event::<M>(event).map(Some),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => Ok(None),
        }
    }

    /// Drains every queued event without blocking.
    pub fn drain(&self) -> CollResult<Vec<WatchEvent<M::Message>>> {
        let mut events = Vec::new();
        while let Some(event) = self.try_recv()? {
            events.push(event);
        }
        Ok(events)
    }
}

fn decode_event<M: Model>(event: ChangeEvent) -> CollResult<WatchEvent<M::Message>> {
    let value = match (&event.kind, &event.payload) {
        (EventType::Put, Some(bytes)) => {
            let row = decode_row(bytes)?;
            Some(M::from_row(&row)?.write_message()?)
        }
        _ => None,
    };
    Ok(WatchEvent {
        kind: event.kind,
        key: event.key,
        value,
        revision: event.revision,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subject_follows_kind() {
        let put = ChangeEvent::put(1, "t", "k", vec![1], Some(vec![0]));
        assert_eq!(put.subject(), Some(&[1u8][..]));

        let delete = ChangeEvent::delete(2, "t", "k", Some(vec![1]));
        assert_eq!(delete.subject(), Some(&[1u8][..]));
        assert!(delete.payload.is_none());
    }

    #[test]
    fn options_builders() {
        let opts = WatchOptions::new().with_initial().since(4).with_prefix("a/");
        assert!(opts.include_initial);
        assert_eq!(opts.since_revision, Some(4));
        assert_eq!(opts.prefix.as_deref(), Some("a/"));
    }
}
