// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rules pairing a signal name with a predicate.
use std::fmt;

use regex::Regex;
use serde::Deserialize;

use crate::error::{ConfigError, PredicateError};
use crate::predicate::{
    FunctionPredicate, GlobalPattern, Pattern, PatternPredicate, Predicate, PredicateOutcome,
};
use crate::record::Record;

/// Emits a record under `signal` whenever the predicate holds for it.
///
/// Several rules may share the same signal name, each of them fires independently.
pub struct DispatchRule {
    signal: String,
    predicate: Box<dyn Predicate>,
}

impl DispatchRule {
    pub fn new<P>(signal: impl Into<String>, predicate: P) -> Self
    where
        P: Predicate + 'static,
    {
        Self {
            signal: signal.into(),
            predicate: Box::new(predicate),
        }
    }

    /// Rule testing a text pattern against every record.
    pub fn pattern<P>(signal: impl Into<String>, pattern: P) -> Self
    where
        P: Pattern + Send + 'static,
    {
        Self::new(signal, PatternPredicate::new(pattern))
    }

    /// Rule calling a function with every record.
    ///
    /// The function returns either a `bool` or a `Result<bool, E>`.
    pub fn function<F, O>(signal: impl Into<String>, f: F) -> Self
    where
        F: FnMut(&Record) -> O + Send + 'static,
        O: PredicateOutcome + 'static,
    {
        Self::new(signal, FunctionPredicate::new(f))
    }

    pub fn signal(&self) -> &str {
        &self.signal
    }

    pub(crate) fn evaluate(&mut self, record: &Record) -> Result<bool, PredicateError> {
        self.predicate.evaluate(record)
    }
}

impl fmt::Debug for DispatchRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchRule")
            .field("signal", &self.signal)
            .finish_non_exhaustive()
    }
}

/// Pattern rule declared as data, for example in a JSON configuration file.
///
/// ```json
/// { "signal": "warn", "pattern": "\\[warn]", "global": false }
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct RuleSpec {
    pub signal: String,

    pub pattern: String,

    /// Keep the position of the last match between records, see [`GlobalPattern`].
    #[serde(default)]
    pub global: bool,
}

impl RuleSpec {
    pub fn compile(&self) -> Result<DispatchRule, ConfigError> {
        let regex = Regex::new(&self.pattern).map_err(|source| ConfigError::InvalidPattern {
            signal: self.signal.clone(),
            source,
        })?;

        if self.global {
            Ok(DispatchRule::pattern(
                self.signal.clone(),
                GlobalPattern::new(regex),
            ))
        } else {
            Ok(DispatchRule::pattern(self.signal.clone(), regex))
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::error::ConfigError;
    use crate::record::Record;

    use super::{DispatchRule, RuleSpec};

    #[test]
    fn rule_from_function() {
        let mut rule = DispatchRule::function("warning", |record: &Record| {
            record.as_value().is_some_and(|value| value["type"] == "warning")
        });
        assert_eq!(rule.signal(), "warning");
        assert!(rule.evaluate(&Record::from(json!({ "type": "warning" }))).unwrap());
        assert!(!rule.evaluate(&Record::from(json!({ "type": "notice" }))).unwrap());
    }

    #[test]
    fn specs_from_json() {
        let specs: Vec<RuleSpec> = serde_json::from_value(json!([
            { "signal": "warn", "pattern": r"\[warn]" },
            { "signal": "err", "pattern": r"\[err]", "global": true },
        ]))
        .unwrap();
        assert!(!specs[0].global);
        assert!(specs[1].global);

        let mut warn = specs[0].compile().unwrap();
        assert_eq!(warn.signal(), "warn");
        assert!(warn.evaluate(&Record::from("11:27 [warn] kqueue")).unwrap());
        assert!(warn.evaluate(&Record::from("11:27 [warn] kqueue")).unwrap());

        // Global rules keep their position between records.
        let mut err = specs[1].compile().unwrap();
        assert!(err.evaluate(&Record::from("[err] a")).unwrap());
        assert!(!err.evaluate(&Record::from("[err] b")).unwrap());
    }

    #[test]
    fn invalid_pattern() {
        let spec = RuleSpec {
            signal: "broken".into(),
            pattern: "[unclosed".into(),
            global: false,
        };

        let err = spec.compile().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPattern { ref signal, .. } if signal == "broken"));
    }
}
