//! Single compiled rules.

use crate::compiler::{compile, Predicate};
use crate::error::{CompileError, EvalError};
use crate::item::ItemSnapshot;
use crate::schema::Schema;
use crate::script::Section;
use crate::verdict::RuleFault;
use std::fmt;
use tracing::{debug, error};

/// What running one rule against one item came to.
#[derive(Debug)]
pub(crate) enum Outcome {
    /// Did not fire, or never compiled.
    Silent,
    Fired,
    Fault(RuleFault),
}

/// One rule of a script: its text, its position and its compiled form.
///
/// A rule whose text failed to compile keeps the error and never matches.
pub struct Rule<S = ItemSnapshot> {
    line: usize,
    negated: bool,
    text: String,
    raw: String,
    compiled: Result<Predicate<S>, CompileError>,
}

impl<S> Clone for Rule<S> {
    fn clone(&self) -> Self {
        Self {
            line: self.line,
            negated: self.negated,
            text: self.text.clone(),
            raw: self.raw.clone(),
            compiled: self.compiled.clone(),
        }
    }
}

impl<S> fmt::Debug for Rule<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("line", &self.line)
            .field("negated", &self.negated)
            .field("raw", &self.raw)
            .field("compiled", &self.compiled.is_ok())
            .finish()
    }
}

impl<S: Schema> Rule<S> {
    /// Compile a script section. Failures are logged and kept on the rule.
    pub fn from_section(section: Section) -> Self {
        let Section {
            start_line,
            negated,
            text,
            raw,
        } = section;
        Self::build(start_line, negated, text, raw)
    }

    /// Compile a standalone rule; `raw` and `text` are the same.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use itemfilter::{ItemAttributes, ItemSnapshot, Rule};
    ///
    /// let rule: Rule = Rule::new(1, "Width * Height <= 2");
    /// let ring = ItemSnapshot::new(ItemAttributes { width: 1, height: 1, ..Default::default() });
    /// assert!(rule.matches(&ring));
    /// ```
    pub fn new(line: usize, text: impl Into<String>) -> Self {
        let text = text.into();
        Self::build(line, false, text.clone(), text)
    }

    fn build(line: usize, negated: bool, text: String, raw: String) -> Self {
        let compiled = compile::<S>(&text);
        if let Err(err) = &compiled {
            error!(line, rule = %raw, "failed to compile rule: {}", err);
        }
        Self {
            line,
            negated,
            text,
            raw,
            compiled,
        }
    }

    /// Run the predicate, `None` if the rule did not compile.
    pub(crate) fn check(&self, item: &S) -> Option<Result<bool, EvalError>> {
        self.compiled.as_ref().ok().map(|predicate| predicate.evaluate(item))
    }

    /// Run the rule and log the result. Faults carry the item description.
    pub(crate) fn run(&self, item: &S, debug: bool) -> Outcome {
        match self.check(item) {
            None | Some(Ok(false)) => Outcome::Silent,
            Some(Ok(true)) => {
                if debug {
                    debug!(line = self.line, rule = %self.raw, item = %item.describe(), "rule matched");
                }
                Outcome::Fired
            }
            Some(Err(err)) => {
                let described = item.describe();
                error!(
                    line = self.line,
                    rule = %self.raw,
                    item = %described,
                    "evaluation error: {}",
                    err
                );
                Outcome::Fault(RuleFault {
                    line: self.line,
                    raw: self.raw.clone(),
                    item: described,
                    error: err,
                })
            }
        }
    }

    /// Whether the predicate holds for `item`, ignoring negation.
    ///
    /// Uncompiled rules and evaluation faults give `false`.
    pub fn matches(&self, item: &S) -> bool {
        self.matches_with(item, false)
    }

    pub fn matches_with(&self, item: &S, debug: bool) -> bool {
        matches!(self.run(item, debug), Outcome::Fired)
    }
}

impl<S> Rule<S> {
    /// 1-based line the rule starts on.
    pub fn line(&self) -> usize {
        self.line
    }

    pub fn is_negated(&self) -> bool {
        self.negated
    }

    /// Comment-stripped text that was compiled.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Text as written in the script.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn predicate(&self) -> Option<&Predicate<S>> {
        self.compiled.as_ref().ok()
    }

    pub fn compile_error(&self) -> Option<&CompileError> {
        self.compiled.as_ref().err()
    }

    pub fn is_compiled(&self) -> bool {
        self.compiled.is_ok()
    }
}

impl<S> fmt::Display for Rule<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.compiled.is_ok() { "ok" } else { "failed" };
        write!(f, "line {} [{}]: {}", self.line, status, self.raw.replace('\n', " "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{ItemAttributes, ItemRarity};

    fn item() -> ItemSnapshot {
        ItemSnapshot::new(ItemAttributes {
            base_name: "Hubris Circlet".into(),
            class_name: "Helmet".into(),
            rarity: ItemRarity::Rare,
            item_level: 85,
            ..Default::default()
        })
    }

    #[test]
    fn test_compiled_rule_matches() {
        let rule: Rule = Rule::new(1, "ItemLevel >= 84");
        assert!(rule.is_compiled());
        assert!(rule.matches(&item()));
        assert!(rule.compile_error().is_none());
    }

    #[test]
    fn test_failed_rule_keeps_error() {
        let rule: Rule = Rule::new(4, "ItemLevel >=");
        assert!(!rule.is_compiled());
        assert!(rule.predicate().is_none());
        assert!(rule.compile_error().is_some());
        assert!(!rule.matches(&item()));
        assert_eq!(rule.to_string(), "line 4 [failed]: ItemLevel >=");
    }

    #[test]
    fn test_fault_is_non_matching() {
        let rule: Rule = Rule::new(1, "ItemLevel % 0 == 0");
        assert!(rule.is_compiled());
        assert!(!rule.matches(&item()));
        assert_eq!(rule.check(&item()), Some(Err(EvalError::DivideByZero)));

        match rule.run(&item(), false) {
            Outcome::Fault(fault) => {
                assert_eq!(fault.line, 1);
                assert_eq!(fault.raw, "ItemLevel % 0 == 0");
                assert_eq!(fault.item, "Hubris Circlet (Helmet) Dist: inf");
                assert_eq!(fault.error, EvalError::DivideByZero);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_matches_ignores_negation() {
        let section = Section {
            start_line: 7,
            negated: true,
            text: "Rarity == \"Rare\"".to_string(),
            raw: "^Rarity == \"Rare\"".to_string(),
        };
        let rule: Rule = Rule::from_section(section);
        assert!(rule.is_negated());
        assert_eq!(rule.line(), 7);
        assert!(rule.matches_with(&item(), true));
    }
}
