// SPDX-License-Identifier: MIT OR Apache-2.0

//! Compose record stream stages and dispatch matching records as named signals.
//!
//! `stream-tap` chains a list of transformation stages onto a source stream and classifies every
//! record leaving the chain against a set of dispatch rules. Records matching a rule are emitted
//! under the rule's signal name, while the pipeline itself still yields _every_ record. This way
//! consumers can attach to "warnings" or "errors" of a log stream without writing their own
//! filtering logic.
//!
//! Records are either raw byte chunks or structured values. The mode of a pipeline is decided once
//! when it is built: it is the mode of the last stage, or the mode of the source when there are no
//! stages.
//!
//! ## Example
//!
//! ```
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use futures_util::{StreamExt, TryStreamExt, stream};
//! use regex::Regex;
//! use stream_tap::{DispatchRule, Pipeline, Source};
//!
//! let source = Source::raw(stream::iter([
//!     "11:27:43.438 [notice] Opening Socks listener\n",
//!     "11:27:43.446 [warn] Detected broken kqueue\n",
//! ]));
//!
//! let mut pipeline = Pipeline::builder()
//!     .source(source)
//!     .rule(DispatchRule::pattern("warn", Regex::new(r"\[warn]")?))
//!     .build()?;
//!
//! let warnings = pipeline.subscribe("warn");
//!
//! let lines: Vec<_> = pipeline.try_collect().await?;
//! assert_eq!(lines.len(), 2);
//!
//! let warnings: Vec<_> = warnings.collect().await;
//! assert_eq!(warnings.len(), 1);
//! # Ok(())
//! # }
//! ```
mod dispatch;
mod error;
mod pipeline;
pub mod predicate;
mod record;
mod signal;
mod source;
pub mod stage;
mod tap;
#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;

pub use dispatch::{DispatchRule, RuleSpec};
pub use error::{ConfigError, PipelineError, PredicateError, StageError};
pub use pipeline::{Pipeline, PipelineBuilder, PipelineConfig, build};
pub use predicate::{
    FunctionPredicate, GlobalPattern, Pattern, PatternPredicate, Predicate, PredicateOutcome,
};
pub use record::{Mode, Record};
pub use signal::{Signals, Subscription};
pub use source::{RecordStream, Source};
pub use stage::{BoxedStage, FnStage, Stage, compose};
pub use tap::{Tap, TapExt};
