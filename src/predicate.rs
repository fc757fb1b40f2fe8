// SPDX-License-Identifier: MIT OR Apache-2.0

//! Predicates deciding if a record belongs to a signal.
//!
//! Predicates come in two forms: text patterns (for example regular expressions) tested against
//! the text of a record, and plain functions receiving the record itself. Both are exposed through
//! the same [`Predicate`] interface, the tap never needs to know which one it is looking at.
use regex::Regex;

use crate::error::PredicateError;
use crate::record::Record;

/// Interface for testing a record.
///
/// Evaluation takes `&mut self` since some predicates carry state from one evaluation to the next,
/// see [`GlobalPattern`].
pub trait Predicate: Send {
    fn evaluate(&mut self, record: &Record) -> Result<bool, PredicateError>;
}

impl<P> Predicate for Box<P>
where
    P: Predicate + ?Sized,
{
    fn evaluate(&mut self, record: &Record) -> Result<bool, PredicateError> {
        (**self).evaluate(record)
    }
}

/// Text matching capability.
pub trait Pattern {
    fn test(&mut self, text: &str) -> bool;
}

impl Pattern for Regex {
    fn test(&mut self, text: &str) -> bool {
        self.is_match(text)
    }
}

/// Regular expression which remembers where its last match ended.
///
/// Every test continues searching from the end of the previous match. A hit moves the position
/// to the end of the match, a miss resets it to the beginning. The position is _not_ reset
/// between different inputs, so when the same pattern is tested against several records a match
/// in one record can make the search in the next record start past a later match and miss it.
///
/// Prefer a plain [`Regex`] unless this scanning behaviour is wanted.
#[derive(Clone, Debug)]
pub struct GlobalPattern {
    regex: Regex,
    last_index: usize,
}

impl GlobalPattern {
    pub fn new(regex: Regex) -> Self {
        Self {
            regex,
            last_index: 0,
        }
    }

    /// Byte offset the next search starts at.
    pub fn last_index(&self) -> usize {
        self.last_index
    }

    pub fn reset(&mut self) {
        self.last_index = 0;
    }
}

impl Pattern for GlobalPattern {
    fn test(&mut self, text: &str) -> bool {
        if self.last_index > text.len() || !text.is_char_boundary(self.last_index) {
            self.last_index = 0;
            return false;
        }

        match self.regex.find_at(text, self.last_index) {
            Some(found) => {
                self.last_index = found.end();
                true
            }
            None => {
                self.last_index = 0;
                false
            }
        }
    }
}

/// Predicate testing a pattern against the text of a record.
///
/// Raw records are decoded as UTF-8 text, structured records are rendered as JSON.
#[derive(Clone, Debug)]
pub struct PatternPredicate<P> {
    pattern: P,
}

impl<P> PatternPredicate<P>
where
    P: Pattern,
{
    pub fn new(pattern: P) -> Self {
        Self { pattern }
    }

    pub fn pattern(&self) -> &P {
        &self.pattern
    }
}

impl<P> Predicate for PatternPredicate<P>
where
    P: Pattern + Send,
{
    fn evaluate(&mut self, record: &Record) -> Result<bool, PredicateError> {
        Ok(self.pattern.test(&record.to_text()))
    }
}

/// Result types a function predicate may return.
pub trait PredicateOutcome {
    fn into_outcome(self) -> Result<bool, PredicateError>;
}

impl PredicateOutcome for bool {
    fn into_outcome(self) -> Result<bool, PredicateError> {
        Ok(self)
    }
}

impl<E> PredicateOutcome for Result<bool, E>
where
    E: Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
{
    fn into_outcome(self) -> Result<bool, PredicateError> {
        self.map_err(PredicateError::new)
    }
}

/// Predicate calling a function with the record.
///
/// The function can either return a `bool` or a `Result<bool, E>`, an error is passed on as a
/// [`PredicateError`].
#[derive(Clone)]
pub struct FunctionPredicate<F> {
    f: F,
}

impl<F, O> FunctionPredicate<F>
where
    F: FnMut(&Record) -> O + Send,
    O: PredicateOutcome,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F, O> Predicate for FunctionPredicate<F>
where
    F: FnMut(&Record) -> O + Send,
    O: PredicateOutcome,
{
    fn evaluate(&mut self, record: &Record) -> Result<bool, PredicateError> {
        (self.f)(record).into_outcome()
    }
}

#[cfg(test)]
mod tests {
    use regex::Regex;
    use serde_json::json;

    use crate::record::Record;

    use super::{FunctionPredicate, GlobalPattern, Pattern, PatternPredicate, Predicate};

    #[test]
    fn regex_on_raw_and_structured() {
        let mut predicate = PatternPredicate::new(Regex::new(r"\[warn]").unwrap());

        let line = Record::from("Nov 23 11:27:43.446 [warn] Warning from libevent\n");
        assert!(predicate.evaluate(&line).unwrap());
        assert!(predicate.evaluate(&line).unwrap());

        let line = Record::from("Nov 23 11:27:43.446 [notice] Opening Socks listener\n");
        assert!(!predicate.evaluate(&line).unwrap());

        let mut predicate = PatternPredicate::new(Regex::new(r#""type":"warning""#).unwrap());
        let entry = Record::from(json!({ "type": "warning" }));
        assert!(predicate.evaluate(&entry).unwrap());
    }

    #[test]
    fn global_pattern_keeps_position() {
        let mut pattern = GlobalPattern::new(Regex::new("warn").unwrap());

        assert!(pattern.test("warn: disk almost full"));
        assert_eq!(pattern.last_index(), 4);

        // Search continues after the previous match and misses the match at the start.
        assert!(!pattern.test("warn"));
        assert_eq!(pattern.last_index(), 0);

        // After a miss the position is back at the beginning.
        assert!(pattern.test("warn"));

        pattern.reset();
        assert_eq!(pattern.last_index(), 0);
        assert!(pattern.test("a warn and another warn"));
        assert!(pattern.test("a warn and another warn"));
        assert!(!pattern.test("a warn and another warn"));
    }

    #[test]
    fn global_pattern_outside_char_boundary() {
        let mut pattern = GlobalPattern::new(Regex::new("b").unwrap());
        assert!(pattern.test("ab"));
        assert_eq!(pattern.last_index(), 2);

        // Position lands inside the three bytes of '€'.
        assert!(!pattern.test("€b"));
        assert_eq!(pattern.last_index(), 0);
        assert!(pattern.test("€b"));
    }

    #[test]
    fn function_forms() {
        let entry = Record::from(json!({ "type": "warning" }));

        let mut plain = FunctionPredicate::new(|record: &Record| {
            record.as_value().and_then(|value| value["type"].as_str()) == Some("warning")
        });
        assert!(plain.evaluate(&entry).unwrap());

        let mut fallible = FunctionPredicate::new(|record: &Record| {
            record
                .as_value()
                .map(|value| value["type"] == "notice")
                .ok_or("expected structured record")
        });
        assert!(!fallible.evaluate(&entry).unwrap());

        let err = fallible.evaluate(&Record::from("chunk")).unwrap_err();
        assert_eq!(err.to_string(), "expected structured record");
    }

    #[test]
    fn boxed_predicates() {
        let mut predicates: Vec<Box<dyn Predicate>> = vec![
            Box::new(PatternPredicate::new(Regex::new("^a").unwrap())),
            Box::new(FunctionPredicate::new(|record: &Record| record.as_bytes().is_some())),
        ];

        let record = Record::from("abc");
        for predicate in predicates.iter_mut() {
            assert!(predicate.evaluate(&record).unwrap());
        }
    }
}
