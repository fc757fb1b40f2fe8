// SPDX-License-Identifier: MIT OR Apache-2.0

//! Construction of pipelines from a source, stages and dispatch rules.
use tracing::debug;

use crate::dispatch::{DispatchRule, RuleSpec};
use crate::error::ConfigError;
use crate::predicate::Predicate;
use crate::source::{RecordStream, Source};
use crate::stage::{BoxedStage, Stage, compose};
use crate::tap::{Tap, TapExt};

/// Handle to a running pipeline.
///
/// It is a stream of every record leaving the last stage and at the same time the place where
/// listeners attach to named signals, see [`Tap`].
pub type Pipeline = Tap<RecordStream>;

/// Everything needed to construct a pipeline.
#[derive(Debug, Default)]
pub struct PipelineConfig {
    /// Stream feeding the pipeline, required.
    pub source: Option<Source>,

    /// Transformation stages, applied in order. Defaults to none.
    pub stages: Option<Vec<BoxedStage>>,

    /// Rules for emitting signals. Defaults to no dispatch at all.
    pub dispatch: Option<Vec<DispatchRule>>,
}

impl PipelineConfig {
    pub fn new(source: Source) -> Self {
        Self {
            source: Some(source),
            ..Default::default()
        }
    }

    pub fn build(self) -> Result<Pipeline, ConfigError> {
        build(self)
    }
}

/// Validates the configuration, composes the stages onto the source and installs the dispatch
/// tap at the end of the chain.
///
/// The mode of the pipeline is taken from the last stage, or from the source when there are no
/// stages. Nothing is read from the source here, records only start flowing once the returned
/// pipeline gets polled.
pub fn build(config: PipelineConfig) -> Result<Pipeline, ConfigError> {
    let PipelineConfig {
        source,
        stages,
        dispatch,
    } = config;

    let source = source.ok_or(ConfigError::MissingSource)?;
    let stages = stages.unwrap_or_default();

    if let Some(rules) = &dispatch {
        if let Some(index) = rules.iter().position(|rule| rule.signal().is_empty()) {
            return Err(ConfigError::EmptySignalName { index });
        }
    }

    let stages_len = stages.len();
    let (stream, mode) = compose(source, stages);

    debug!(
        stages = stages_len,
        rules = dispatch.as_ref().map_or(0, Vec::len),
        %mode,
        "build pipeline"
    );

    Ok(stream.tap(mode, dispatch))
}

/// Builder for pipelines, an alternative to filling in a [`PipelineConfig`].
#[derive(Debug, Default)]
pub struct PipelineBuilder {
    config: PipelineConfig,
    specs: Vec<RuleSpec>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn source(mut self, source: Source) -> Self {
        self.config.source = Some(source);
        self
    }

    /// Appends a stage to the end of the chain.
    pub fn stage<S>(mut self, stage: S) -> Self
    where
        S: Stage + Send + 'static,
    {
        self.config
            .stages
            .get_or_insert_with(Vec::new)
            .push(BoxedStage::new(stage));
        self
    }

    pub fn stages(mut self, stages: impl IntoIterator<Item = BoxedStage>) -> Self {
        self.config
            .stages
            .get_or_insert_with(Vec::new)
            .extend(stages);
        self
    }

    /// Emits records under `signal` whenever the predicate holds.
    pub fn dispatch<P>(self, signal: impl Into<String>, predicate: P) -> Self
    where
        P: Predicate + 'static,
    {
        self.rule(DispatchRule::new(signal, predicate))
    }

    pub fn rule(mut self, rule: DispatchRule) -> Self {
        self.config
            .dispatch
            .get_or_insert_with(Vec::new)
            .push(rule);
        self
    }

    pub fn rules(mut self, rules: impl IntoIterator<Item = DispatchRule>) -> Self {
        self.config
            .dispatch
            .get_or_insert_with(Vec::new)
            .extend(rules);
        self
    }

    /// Adds declarative pattern rules, compiled when the pipeline is built.
    ///
    /// They are appended after all rules given directly.
    pub fn rule_specs(mut self, specs: impl IntoIterator<Item = RuleSpec>) -> Self {
        self.specs.extend(specs);
        self
    }

    pub fn build(self) -> Result<Pipeline, ConfigError> {
        let Self { mut config, specs } = self;

        if !specs.is_empty() {
            let compiled = specs
                .iter()
                .map(RuleSpec::compile)
                .collect::<Result<Vec<_>, _>>()?;
            config
                .dispatch
                .get_or_insert_with(Vec::new)
                .extend(compiled);
        }

        build(config)
    }
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }
}
