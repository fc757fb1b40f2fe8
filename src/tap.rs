// SPDX-License-Identifier: MIT OR Apache-2.0

use std::pin::Pin;

use futures_util::stream::{Fuse, FusedStream};
use futures_util::task::{Context, Poll};
use futures_util::{Stream, StreamExt, ready};
use pin_project::pin_project;
use tracing::{debug, trace, warn};

use crate::dispatch::DispatchRule;
use crate::error::{PipelineError, StageError};
use crate::record::{Mode, Record};
use crate::signal::{Signals, Subscription};

/// An extension trait for `Stream`s that provides a convenient [`tap`](TapExt::tap) method.
pub trait TapExt: Stream<Item = Result<Record, StageError>> {
    /// Passes every record through unchanged while emitting it under the signal of every
    /// matching rule.
    ///
    /// Without rules (`None`) the tap is a plain pass-through and no predicate is ever evaluated.
    fn tap(self, mode: Mode, rules: Option<Vec<DispatchRule>>) -> Tap<Self>
    where
        Self: Sized,
    {
        Tap::new(self, mode, rules)
    }
}

impl<T: ?Sized> TapExt for T where T: Stream<Item = Result<Record, StageError>> {}

/// Stream for the [`tap`](TapExt::tap) method.
///
/// Signals for a record are emitted synchronously inside the `poll_next` call which yields that
/// record, before the next record is pulled from upstream. Listeners hence observe records in the
/// exact order of the stream.
///
/// A failing predicate ends the stream with [`PipelineError::Predicate`] in place of the record.
/// Rules declared before the failing one have already been evaluated at that point, so their
/// signals fired for a record which never appears on the stream itself.
#[derive(Debug)]
#[pin_project]
#[must_use = "streams do nothing unless polled"]
pub struct Tap<St>
where
    St: Stream<Item = Result<Record, StageError>>,
{
    #[pin]
    stream: Fuse<St>,
    mode: Mode,
    rules: Option<Vec<DispatchRule>>,
    signals: Signals,
    ended: bool,
}

impl<St> Tap<St>
where
    St: Stream<Item = Result<Record, StageError>>,
{
    pub(crate) fn new(stream: St, mode: Mode, rules: Option<Vec<DispatchRule>>) -> Tap<St> {
        Tap {
            stream: stream.fuse(),
            mode,
            rules,
            signals: Signals::new(),
            ended: false,
        }
    }

    /// Mode of every record coming out of this stream.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Registers a listener called with every record emitted under this signal name.
    ///
    /// Only records yielded after registering are seen by the listener. Nothing is registered once
    /// the stream ended.
    pub fn on<F>(&mut self, signal: impl Into<String>, listener: F) -> &mut Self
    where
        F: FnMut(&Record) + Send + 'static,
    {
        self.signals.on(signal, listener);
        self
    }

    /// Returns a stream of all records emitted under this signal name from now on.
    ///
    /// Records are only emitted while this stream is polled, the subscription ends once it ended.
    /// Subscribing to an ended stream returns a subscription which is already finished.
    pub fn subscribe(&mut self, signal: impl Into<String>) -> Subscription {
        self.signals.subscribe(signal)
    }

    pub fn remove_listeners(&mut self, signal: &str) -> &mut Self {
        self.signals.remove_listeners(signal);
        self
    }

    pub fn listener_count(&self, signal: &str) -> usize {
        self.signals.listener_count(signal)
    }

    /// Returns `true` once no more records or signals will follow.
    pub fn is_ended(&self) -> bool {
        self.ended
    }
}

impl<St> Stream for Tap<St>
where
    St: Stream<Item = Result<Record, StageError>>,
{
    type Item = Result<Record, PipelineError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        if *this.ended {
            return Poll::Ready(None);
        }

        let record = match ready!(this.stream.as_mut().poll_next(cx)) {
            Some(Ok(record)) => record,
            Some(Err(err)) => {
                warn!(%err, "pipeline stage failed");
                *this.ended = true;
                this.signals.close();
                return Poll::Ready(Some(Err(PipelineError::Stage(err))));
            }
            None => {
                debug!("pipeline ended");
                *this.ended = true;
                this.signals.close();
                return Poll::Ready(None);
            }
        };

        if record.mode() != *this.mode {
            warn!(expected = %this.mode, found = %record.mode(), "record in wrong mode");
            *this.ended = true;
            this.signals.close();
            return Poll::Ready(Some(Err(PipelineError::ModeMismatch {
                expected: *this.mode,
                found: record.mode(),
            })));
        }

        if let Some(rules) = this.rules.as_mut() {
            // Every rule is evaluated, in the order they were declared. One record can be
            // emitted under several signals.
            for rule in rules.iter_mut() {
                match rule.evaluate(&record) {
                    Ok(true) => {
                        let delivered = this.signals.emit(rule.signal(), &record);
                        trace!(signal = rule.signal(), delivered, "emit signal");
                    }
                    Ok(false) => (),
                    Err(err) => {
                        warn!(signal = rule.signal(), %err, "dispatch predicate failed");
                        *this.ended = true;
                        this.signals.close();
                        return Poll::Ready(Some(Err(PipelineError::Predicate {
                            signal: rule.signal().to_owned(),
                            source: err,
                        })));
                    }
                }
            }
        }

        Poll::Ready(Some(Ok(record)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.ended {
            (0, Some(0))
        } else {
            self.stream.size_hint()
        }
    }
}

impl<St> FusedStream for Tap<St>
where
    St: Stream<Item = Result<Record, StageError>>,
{
    fn is_terminated(&self) -> bool {
        self.ended
    }
}
