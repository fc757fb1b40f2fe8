// SPDX-License-Identifier: MIT OR Apache-2.0

//! Registry of listeners for named signals.
use std::collections::HashMap;
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_channel::mpsc;
use futures_util::Stream;
use futures_util::stream::FusedStream;
use pin_project::pin_project;

use crate::record::Record;

/// Receiver of emitted records.
enum Listener {
    Callback(Box<dyn FnMut(&Record) + Send>),
    Channel(mpsc::UnboundedSender<Record>),
}

impl Listener {
    /// Hands the record to this listener, returns `false` when it can never receive again.
    fn deliver(&mut self, record: &Record) -> bool {
        match self {
            Listener::Callback(callback) => {
                callback(record);
                true
            }
            Listener::Channel(tx) => {
                !tx.is_closed() && tx.unbounded_send(record.clone()).is_ok()
            }
        }
    }

    fn is_alive(&self) -> bool {
        match self {
            Listener::Callback(_) => true,
            Listener::Channel(tx) => !tx.is_closed(),
        }
    }
}

/// Listeners attached to signals, keyed by signal name.
///
/// Listeners of one signal are called in the order they were registered. Once closed, new
/// listeners are not registered anymore and new subscriptions end right away.
#[derive(Default)]
pub struct Signals {
    listeners: HashMap<String, Vec<Listener>>,
    closed: bool,
}

impl Signals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener which gets called synchronously for every record emitted under this
    /// signal name.
    pub fn on<F>(&mut self, signal: impl Into<String>, listener: F)
    where
        F: FnMut(&Record) + Send + 'static,
    {
        self.register(signal.into(), Listener::Callback(Box::new(listener)));
    }

    /// Returns a stream receiving a copy of every record emitted under this signal name.
    ///
    /// The stream ends when the signals are closed, usually when the pipeline ended. Dropping the
    /// stream removes it from the listeners.
    pub fn subscribe(&mut self, signal: impl Into<String>) -> Subscription {
        let (tx, rx) = mpsc::unbounded();

        // Sender is dropped right here when already closed, which ends the subscription.
        self.register(signal.into(), Listener::Channel(tx));

        Subscription { rx }
    }

    fn register(&mut self, signal: String, listener: Listener) {
        if self.closed {
            return;
        }

        self.listeners.entry(signal).or_default().push(listener);
    }

    /// Removes all listeners of this signal.
    pub fn remove_listeners(&mut self, signal: &str) {
        self.listeners.remove(signal);
    }

    /// Number of listeners of this signal, not counting dropped subscriptions.
    pub fn listener_count(&self, signal: &str) -> usize {
        self.listeners.get(signal).map_or(0, |listeners| {
            listeners.iter().filter(|listener| listener.is_alive()).count()
        })
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Calls every listener of this signal with the record, removing dropped subscriptions.
    ///
    /// Returns `false` when nobody was listening.
    pub(crate) fn emit(&mut self, signal: &str, record: &Record) -> bool {
        let Some(listeners) = self.listeners.get_mut(signal) else {
            return false;
        };

        listeners.retain_mut(|listener| listener.deliver(record));
        let delivered = !listeners.is_empty();

        if !delivered {
            self.listeners.remove(signal);
        }

        delivered
    }

    /// Drops all listeners, which ends all subscriptions.
    pub(crate) fn close(&mut self) {
        self.listeners.clear();
        self.closed = true;
    }
}

impl fmt::Debug for Signals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut counts: Vec<(&str, usize)> = self
            .listeners
            .iter()
            .map(|(name, listeners)| (name.as_str(), listeners.len()))
            .collect();
        counts.sort();

        f.debug_struct("Signals")
            .field("listeners", &counts)
            .field("closed", &self.closed)
            .finish()
    }
}

/// Stream of records emitted under one signal name.
#[derive(Debug)]
#[pin_project]
#[must_use = "streams do nothing unless polled"]
pub struct Subscription {
    #[pin]
    rx: mpsc::UnboundedReceiver<Record>,
}

impl Stream for Subscription {
    type Item = Record;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.project().rx.poll_next(cx)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rx.size_hint()
    }
}

impl FusedStream for Subscription {
    fn is_terminated(&self) -> bool {
        self.rx.is_terminated()
    }
}
