// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt;

use futures_util::stream::{self, BoxStream};
use futures_util::{Stream, StreamExt};

use crate::error::StageError;
use crate::record::{Mode, Record};

/// Type-erased stream of records passed between stages.
pub type RecordStream = BoxStream<'static, Result<Record, StageError>>;

/// Readable record stream feeding a pipeline, together with its declared mode.
pub struct Source {
    mode: Mode,
    stream: RecordStream,
}

impl Source {
    /// Creates a source from an infallible stream of records.
    pub fn new<S>(mode: Mode, stream: S) -> Self
    where
        S: Stream<Item = Record> + Send + 'static,
    {
        Self::try_new(mode, stream.map(Ok))
    }

    /// Creates a source from a stream which might fail while reading.
    ///
    /// An error ends the pipeline after it was yielded.
    pub fn try_new<S>(mode: Mode, stream: S) -> Self
    where
        S: Stream<Item = Result<Record, StageError>> + Send + 'static,
    {
        Self {
            mode,
            stream: stream.boxed(),
        }
    }

    /// Source of raw byte chunks.
    pub fn raw<S, T>(stream: S) -> Self
    where
        S: Stream<Item = T> + Send + 'static,
        T: Into<Vec<u8>>,
    {
        Self::new(Mode::Raw, stream.map(|chunk| Record::Raw(chunk.into())))
    }

    /// Source of structured values.
    pub fn structured<S>(stream: S) -> Self
    where
        S: Stream<Item = serde_json::Value> + Send + 'static,
    {
        Self::new(Mode::Structured, stream.map(Record::Structured))
    }

    /// Source yielding the given records in order.
    pub fn from_records<I>(mode: Mode, records: I) -> Self
    where
        I: IntoIterator<Item = Record>,
        I::IntoIter: Send + 'static,
    {
        Self::new(mode, stream::iter(records))
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub(crate) fn into_stream(self) -> RecordStream {
        self.stream
    }
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Source").field("mode", &self.mode).finish()
    }
}
