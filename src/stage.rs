// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transformation stages and their composition onto a source.
//!
//! A stage takes in records one at a time and yields zero or more records for each of them, in
//! order. Stages declare the mode of the records they produce upfront, this is how the pipeline
//! learns about its final mode without looking at any data.
//!
//! Stages are chained in the order they were given: the source feeds the first stage, the first
//! stage feeds the second and so on. Every record travels through the whole chain before the next
//! one is pulled from the source.
use std::collections::VecDeque;
use std::fmt;
use std::future::{self, Future};

use futures_util::future::BoxFuture;
use futures_util::stream::{self, StreamExt};

use crate::error::StageError;
use crate::record::{Mode, Record};
use crate::source::{RecordStream, Source};

/// Interface for implementing record transformation stages.
///
/// `process` is called for every incoming record and returns the records to pass on to the next
/// stage. Returning an empty list drops the record, returning more than one splits it.
///
/// After the upstream is exhausted `flush` is called exactly once, stages holding back records
/// internally can return them here.
pub trait Stage {
    /// Mode of the records this stage produces.
    fn mode(&self) -> Mode;

    /// Consumes a record and returns its transformed outputs.
    fn process(
        &mut self,
        record: Record,
    ) -> impl Future<Output = Result<Vec<Record>, StageError>> + Send;

    /// Returns any records still held back once the upstream ended.
    fn flush(&mut self) -> impl Future<Output = Result<Vec<Record>, StageError>> + Send {
        future::ready(Ok(Vec::new()))
    }
}

/// Object-safe counterpart of [`Stage`], implemented for every stage.
trait DynStage: Send {
    fn mode(&self) -> Mode;

    fn process(&mut self, record: Record) -> BoxFuture<'_, Result<Vec<Record>, StageError>>;

    fn flush(&mut self) -> BoxFuture<'_, Result<Vec<Record>, StageError>>;
}

impl<S> DynStage for S
where
    S: Stage + Send,
{
    fn mode(&self) -> Mode {
        Stage::mode(self)
    }

    fn process(&mut self, record: Record) -> BoxFuture<'_, Result<Vec<Record>, StageError>> {
        Box::pin(Stage::process(self, record))
    }

    fn flush(&mut self) -> BoxFuture<'_, Result<Vec<Record>, StageError>> {
        Box::pin(Stage::flush(self))
    }
}

/// Type-erased stage, allowing stages of different types in one pipeline.
pub struct BoxedStage(Box<dyn DynStage>);

impl BoxedStage {
    pub fn new<S>(stage: S) -> Self
    where
        S: Stage + Send + 'static,
    {
        Self(Box::new(stage))
    }

    pub fn mode(&self) -> Mode {
        self.0.mode()
    }

    /// Pipes the given stream through this stage.
    pub(crate) fn pipe(self, upstream: RecordStream) -> RecordStream {
        let state = PipeState {
            upstream,
            stage: self.0,
            outputs: VecDeque::new(),
            status: PipeStatus::Flowing,
        };

        stream::unfold(state, |mut state| async move {
            let item = state.next().await?;
            Some((item, state))
        })
        .boxed()
    }
}

impl fmt::Debug for BoxedStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoxedStage")
            .field("mode", &self.mode())
            .finish()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PipeStatus {
    Flowing,
    Flushed,
    Failed,
}

struct PipeState {
    upstream: RecordStream,
    stage: Box<dyn DynStage>,
    outputs: VecDeque<Record>,
    status: PipeStatus,
}

impl PipeState {
    async fn next(&mut self) -> Option<Result<Record, StageError>> {
        loop {
            // 1. Hand out everything the stage produced for the last record first.
            if let Some(record) = self.outputs.pop_front() {
                return Some(Ok(record));
            }

            if self.status != PipeStatus::Flowing {
                return None;
            }

            // 2. Pull the next record from upstream and process it. Once the upstream ended we
            //    flush the stage and drain what it held back.
            let result = match self.upstream.next().await {
                Some(Ok(record)) => self.stage.process(record).await,
                Some(Err(err)) => Err(err),
                None => {
                    self.status = PipeStatus::Flushed;
                    self.stage.flush().await
                }
            };

            match result {
                Ok(records) => self.outputs.extend(records),
                Err(err) => {
                    self.status = PipeStatus::Failed;
                    return Some(Err(err));
                }
            }
        }
    }
}

/// Chains the stages onto the source, in order.
///
/// Returns the combined stream together with its effective mode: the mode of the last stage, or
/// the mode of the source when no stages are given.
pub fn compose<I>(source: Source, stages: I) -> (RecordStream, Mode)
where
    I: IntoIterator<Item = BoxedStage>,
{
    let mode = source.mode();

    stages
        .into_iter()
        .fold((source.into_stream(), mode), |(stream, _), stage| {
            let mode = stage.mode();
            (stage.pipe(stream), mode)
        })
}

/// Stage created from a closure, see [`from_fn`] and [`map`].
pub struct FnStage<F> {
    mode: Mode,
    f: F,
}

impl<F> Stage for FnStage<F>
where
    F: FnMut(Record) -> Result<Vec<Record>, StageError> + Send,
{
    fn mode(&self) -> Mode {
        self.mode
    }

    async fn process(&mut self, record: Record) -> Result<Vec<Record>, StageError> {
        (self.f)(record)
    }
}

/// Creates a stage from a closure returning zero or more records per input record.
pub fn from_fn<F>(mode: Mode, f: F) -> FnStage<F>
where
    F: FnMut(Record) -> Result<Vec<Record>, StageError> + Send,
{
    FnStage { mode, f }
}

/// Creates a stage from a closure mapping every record onto exactly one record.
pub fn map<F>(
    mode: Mode,
    mut f: F,
) -> FnStage<impl FnMut(Record) -> Result<Vec<Record>, StageError> + Send>
where
    F: FnMut(Record) -> Record + Send,
{
    from_fn(mode, move |record| Ok(vec![f(record)]))
}

#[cfg(test)]
mod tests {
    use futures_util::{StreamExt, TryStreamExt};
    use serde_json::json;

    use crate::error::StageError;
    use crate::record::{Mode, Record};
    use crate::source::Source;
    use crate::test_utils::{capitalize, remove_char, sample_chunks, sample_entries};

    use super::{BoxedStage, Stage, compose, from_fn, map};

    /// Stage collecting records and releasing them in pairs, the odd one on flush.
    #[derive(Default)]
    struct Pairs {
        held: Option<Record>,
    }

    impl Stage for Pairs {
        fn mode(&self) -> Mode {
            Mode::Raw
        }

        async fn process(&mut self, record: Record) -> Result<Vec<Record>, StageError> {
            match self.held.take() {
                Some(previous) => Ok(vec![previous, record]),
                None => {
                    self.held = Some(record);
                    Ok(Vec::new())
                }
            }
        }

        async fn flush(&mut self) -> Result<Vec<Record>, StageError> {
            Ok(self.held.take().into_iter().collect())
        }
    }

    #[tokio::test]
    async fn no_stages_is_source() {
        let (stream, mode) = compose(sample_chunks(), Vec::new());
        assert_eq!(mode, Mode::Raw);

        let records: Vec<Record> = stream.try_collect().await.unwrap();
        assert_eq!(
            records,
            vec![
                Record::from("newline\nseparated\nwords"),
                Record::from("with\nno\nspaces")
            ]
        );
    }

    #[tokio::test]
    async fn stages_apply_in_order() {
        let stages = vec![
            BoxedStage::new(remove_char('\n')),
            BoxedStage::new(capitalize()),
        ];
        let (stream, _) = compose(sample_chunks(), stages);

        let records: Vec<Record> = stream.try_collect().await.unwrap();
        assert_eq!(
            records,
            vec![
                Record::from("NEWLINESEPARATEDWORDS"),
                Record::from("WITHNOSPACES")
            ]
        );
    }

    #[tokio::test]
    async fn mode_of_last_stage_wins() {
        let parse = map(Mode::Structured, |record| {
            Record::from(json!({ "line": record.to_text() }))
        });
        let stages = vec![BoxedStage::new(capitalize()), BoxedStage::new(parse)];

        let (stream, mode) = compose(sample_chunks(), stages);
        assert_eq!(mode, Mode::Structured);

        let records: Vec<Record> = stream.try_collect().await.unwrap();
        assert_eq!(
            records[1],
            Record::from(json!({ "line": "WITH\nNO\nSPACES" }))
        );

        // Only the last stage counts, even if an earlier one is structured.
        let stringify = map(Mode::Raw, |record| Record::from(record.to_text().into_owned()));
        let stages = vec![
            BoxedStage::new(map(Mode::Structured, |record| record)),
            BoxedStage::new(stringify),
        ];
        let (_, mode) = compose(sample_entries(), stages);
        assert_eq!(mode, Mode::Raw);
    }

    #[tokio::test]
    async fn flush_after_upstream_ended() {
        let source = Source::from_records(
            Mode::Raw,
            ["1", "2", "3"].into_iter().map(Record::from),
        );
        let (stream, _) = compose(source, vec![BoxedStage::new(Pairs::default())]);

        let records: Vec<Record> = stream.try_collect().await.unwrap();
        assert_eq!(
            records,
            vec![Record::from("1"), Record::from("2"), Record::from("3")]
        );
    }

    #[tokio::test]
    async fn drop_and_split() {
        let split = from_fn(Mode::Raw, |record| {
            Ok(record
                .to_text()
                .split('\n')
                .filter(|word| *word != "no")
                .map(Record::from)
                .collect())
        });
        let (stream, _) = compose(sample_chunks(), vec![BoxedStage::new(split)]);

        let records: Vec<Record> = stream.try_collect().await.unwrap();
        let words: Vec<_> = records.iter().map(|r| r.to_text().into_owned()).collect();
        assert_eq!(words, ["newline", "separated", "words", "with", "spaces"]);
    }

    #[tokio::test]
    async fn stage_error_ends_stream() {
        let mut seen = 0;
        let failing = from_fn(Mode::Raw, move |record| {
            seen += 1;
            if seen == 2 {
                Err(StageError::new("second record rejected"))
            } else {
                Ok(vec![record])
            }
        });
        let (mut stream, _) = compose(sample_chunks(), vec![BoxedStage::new(failing)]);

        assert!(stream.next().await.unwrap().is_ok());
        assert_eq!(
            stream.next().await.unwrap().unwrap_err().to_string(),
            "second record rejected"
        );
        assert!(stream.next().await.is_none());
    }
}
