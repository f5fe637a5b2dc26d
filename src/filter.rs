//! Rule sets: loading scripts and evaluating items against them.

use crate::config::FilterConfig;
use crate::error::{CompileError, FilterError};
use crate::item::ItemSnapshot;
use crate::rule::{Outcome, Rule};
use crate::schema::Schema;
use crate::script::{split_sections, split_text, Section};
use crate::verdict::{DecidingRule, Verdict};
use std::fs;
use std::path::Path;
use tracing::info;

/// An ordered, immutable list of rules. The first rule that fires decides.
///
/// # Examples
///
/// ```rust
/// use itemfilter::{ItemAttributes, ItemRarity, ItemSnapshot, RuleSet};
///
/// let rules: RuleSet = RuleSet::load_from_str(
///     "// keep good rares\nRarity == \"Rare\" && ItemLevel >= 80\n\n^Corrupted",
/// );
/// assert_eq!(rules.len(), 2);
///
/// let item = ItemSnapshot::new(ItemAttributes {
///     rarity: ItemRarity::Rare,
///     item_level: 84,
///     is_corrupted: true,
///     ..Default::default()
/// });
/// assert!(rules.evaluate(&item));
/// ```
pub struct RuleSet<S = ItemSnapshot> {
    name: String,
    rules: Vec<Rule<S>>,
}

impl<S> Clone for RuleSet<S> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            rules: self.rules.clone(),
        }
    }
}

impl<S> std::fmt::Debug for RuleSet<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleSet")
            .field("name", &self.name)
            .field("rules", &self.rules)
            .finish()
    }
}

/// Last component of a path, accepting either separator.
fn source_name(path: &str) -> &str {
    path.rsplit(|c| c == '/' || c == '\\').next().unwrap_or(path)
}

impl<S: Schema> RuleSet<S> {
    pub fn new(name: impl Into<String>, rules: Vec<Rule<S>>) -> Self {
        Self {
            name: name.into(),
            rules,
        }
    }

    fn from_sections(name: &str, sections: Vec<Section>) -> Self {
        Self::loaded(name, sections.into_iter().map(Rule::from_section).collect())
    }

    fn loaded(name: &str, rules: Vec<Rule<S>>) -> Self {
        let set = Self::new(source_name(name), rules);
        info!(
            source = %set.name,
            rules = set.rules.len(),
            failed = set.compile_errors().len(),
            "processed filter"
        );
        set
    }

    /// Read and compile a script file.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, FilterError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let lines: Vec<&str> = text.lines().collect();
        Ok(Self::from_sections(&path.to_string_lossy(), split_sections(&lines)))
    }

    /// Compile one rule per entry. Line numbers are 1-based list positions.
    pub fn load_from_list<I>(name: &str, rules: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let rules: Vec<Rule<S>> = rules
            .into_iter()
            .enumerate()
            .map(|(index, text)| Rule::new(index + 1, text))
            .collect();
        Self::loaded(name, rules)
    }

    /// Compile an in-memory script.
    pub fn load_from_str(text: &str) -> Self {
        Self::from_sections("memory", split_text(text))
    }

    /// `(line, error)` of every rule that failed to compile.
    pub fn compile_errors(&self) -> Vec<(usize, &CompileError)> {
        self.rules
            .iter()
            .filter_map(|rule| rule.compile_error().map(|err| (rule.line(), err)))
            .collect()
    }

    /// Whether the item is accepted.
    pub fn evaluate(&self, item: &S) -> bool {
        self.evaluate_with(item, false).matched
    }

    /// Scan the rules in order and report how the decision was reached.
    ///
    /// A rule that fails to evaluate is logged, recorded as a fault and
    /// skipped. With `debug` set the deciding rule is logged.
    pub fn evaluate_with(&self, item: &S, debug: bool) -> Verdict {
        let mut faults = Vec::new();

        for rule in &self.rules {
            match rule.run(item, debug) {
                Outcome::Silent => {}
                Outcome::Fired => {
                    return Verdict {
                        matched: !rule.is_negated(),
                        deciding: Some(DecidingRule {
                            line: rule.line(),
                            raw: rule.raw().to_string(),
                            negated: rule.is_negated(),
                        }),
                        faults,
                    };
                }
                Outcome::Fault(fault) => faults.push(fault),
            }
        }

        Verdict {
            matched: false,
            deciding: None,
            faults,
        }
    }

    /// `evaluate_with`, taking the debug flag from `config`.
    pub fn evaluate_configured(&self, item: &S, config: &FilterConfig) -> Verdict {
        self.evaluate_with(item, config.debug)
    }
}

impl<S> RuleSet<S> {
    /// Source name: the script's file name, the list name, or `"memory"`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rules(&self) -> &[Rule<S>] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
