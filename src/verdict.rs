//! Evaluation traces.

use crate::error::EvalError;
use serde::Serialize;

/// The rule that decided an evaluation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecidingRule {
    pub line: usize,
    pub raw: String,
    pub negated: bool,
}

/// A rule that failed while running against an item.
///
/// A faulting rule counts as not matching and the scan moves on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleFault {
    pub line: usize,
    pub raw: String,
    /// Short description of the item, e.g. `"Vaal Regalia (Body Armour) Dist: 12"`.
    pub item: String,
    #[serde(serialize_with = "serialize_error")]
    pub error: EvalError,
}

fn serialize_error<S: serde::Serializer>(error: &EvalError, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}

/// Outcome of one rule set evaluation.
///
/// # Examples
///
/// ```rust
/// use itemfilter::{ItemAttributes, ItemSnapshot, RuleSet};
///
/// let rules: RuleSet = RuleSet::load_from_str("ItemLevel / 0 > 1\n\n^ItemLevel > 10");
/// let item = ItemSnapshot::new(ItemAttributes { item_level: 50, ..Default::default() });
///
/// let verdict = rules.evaluate_with(&item, false);
/// assert!(!verdict.matched);
/// assert_eq!(verdict.faults.len(), 1);
/// assert_eq!(verdict.deciding.unwrap().line, 3);
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Verdict {
    pub matched: bool,
    /// `None` when no rule fired.
    pub deciding: Option<DecidingRule>,
    /// Faults of rules scanned before the deciding one, in script order.
    pub faults: Vec<RuleFault>,
}

impl Verdict {
    pub fn is_match(&self) -> bool {
        self.matched
    }

    pub fn has_faults(&self) -> bool {
        !self.faults.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_no_match() {
        let verdict = Verdict::default();
        assert!(!verdict.is_match());
        assert!(verdict.deciding.is_none());
        assert!(!verdict.has_faults());
    }

    #[test]
    fn test_fault_serializes_error_text() {
        let fault = RuleFault {
            line: 2,
            raw: "ItemLevel / 0 > 1".to_string(),
            item: "Ring (Ring) Dist: 0".to_string(),
            error: EvalError::DivideByZero,
        };
        let json = serde_json::to_value(&fault).unwrap();
        assert_eq!(json["error"], "Attempted to divide by zero");
        assert_eq!(json["line"], 2);
    }
}
