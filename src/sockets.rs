//! Socket pattern matching.
//!
//! A socket string is a run of single-letter colour codes (`r`, `g`, `b`,
//! ...), where `w`/`W` is a white socket that can stand in for any colour and
//! `?` is a wildcard that only counts towards length. Letters compare
//! case-insensitively.
//!
//! A candidate satisfies a required pattern when it is long enough (or
//! exactly as long, for exact matches) and its spare white sockets cover
//! every colour the candidate is short of.

use std::collections::BTreeMap;

/// A parsed socket string.
///
/// # Examples
///
/// ```rust
/// use itemfilter::sockets::SocketPattern;
///
/// let p = SocketPattern::parse("RRw?");
/// assert_eq!(p.len(), 4);
/// assert_eq!(p.count('r'), 2);
/// assert_eq!(p.whites(), 1);
/// assert_eq!(p.wildcards(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketPattern {
    letters: BTreeMap<char, usize>,
    whites: usize,
    wildcards: usize,
    len: usize,
}

impl SocketPattern {
    pub fn parse(text: &str) -> Self {
        let mut letters = BTreeMap::new();
        let mut whites = 0;
        let mut wildcards = 0;
        let mut len = 0;

        for c in text.chars() {
            len += 1;
            match c {
                '?' => wildcards += 1,
                'w' | 'W' => whites += 1,
                other => {
                    for lower in other.to_lowercase() {
                        *letters.entry(lower).or_insert(0) += 1;
                    }
                }
            }
        }

        Self {
            letters,
            whites,
            wildcards,
            len,
        }
    }

    /// Number of sockets, wildcards and whites included.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn whites(&self) -> usize {
        self.whites
    }

    pub fn wildcards(&self) -> usize {
        self.wildcards
    }

    /// How many sockets of colour `letter` (case-insensitive).
    pub fn count(&self, letter: char) -> usize {
        letter
            .to_lowercase()
            .map(|l| self.letters.get(&l).copied().unwrap_or(0))
            .sum()
    }

    /// Whether `candidate` satisfies this required pattern.
    ///
    /// ```rust
    /// use itemfilter::sockets::SocketPattern;
    ///
    /// let required = SocketPattern::parse("rg");
    /// assert!(required.is_satisfied_by(&SocketPattern::parse("rgb"), false));
    /// assert!(required.is_satisfied_by(&SocketPattern::parse("rrw"), false));
    /// assert!(!required.is_satisfied_by(&SocketPattern::parse("rr"), false));
    /// ```
    pub fn is_satisfied_by(&self, candidate: &SocketPattern, exact: bool) -> bool {
        let long_enough = if exact {
            candidate.len == self.len
        } else {
            candidate.len >= self.len
        };
        if !long_enough {
            return false;
        }

        let shortfall: i64 = self
            .letters
            .iter()
            .map(|(letter, needed)| {
                let have = candidate.letters.get(letter).copied().unwrap_or(0);
                needed.saturating_sub(have) as i64
            })
            .sum();

        shortfall <= candidate.whites as i64 - self.whites as i64
    }
}

/// Whether any single socket group satisfies `required`.
///
/// ```rust
/// use itemfilter::sockets::matches_any_group;
///
/// assert!(matches_any_group(&["rg", "bbb"], "bb", false));
/// assert!(!matches_any_group(&["rg", "b"], "bb", false));
/// ```
pub fn matches_any_group<G: AsRef<str>>(groups: &[G], required: &str, exact: bool) -> bool {
    let required = SocketPattern::parse(required);
    groups
        .iter()
        .any(|g| required.is_satisfied_by(&SocketPattern::parse(g.as_ref()), exact))
}

/// Whether all socket groups taken together satisfy `required`.
///
/// ```rust
/// use itemfilter::sockets::matches_flattened;
///
/// assert!(matches_flattened(&["rg", "b"], "rgb", true));
/// ```
pub fn matches_flattened<G: AsRef<str>>(groups: &[G], required: &str, exact: bool) -> bool {
    let all: String = groups.iter().map(|g| g.as_ref()).collect();
    SocketPattern::parse(required).is_satisfied_by(&SocketPattern::parse(&all), exact)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn satisfies(candidate: &str, required: &str, exact: bool) -> bool {
        SocketPattern::parse(required).is_satisfied_by(&SocketPattern::parse(candidate), exact)
    }

    #[test]
    fn test_superset_matches() {
        assert!(satisfies("rgb", "rg", false));
    }

    #[test]
    fn test_white_covers_missing_colour() {
        assert!(satisfies("rrw", "rg", false));
    }

    #[test]
    fn test_shortfall_without_whites_fails() {
        assert!(!satisfies("rr", "rg", false));
    }

    #[test]
    fn test_exact_length() {
        assert!(!satisfies("rgb", "rg", true));
        assert!(satisfies("gr", "rg", true));
    }

    #[test]
    fn test_case_insensitive() {
        assert!(satisfies("RGB", "bgr", true));
    }

    #[test]
    fn test_required_whites_need_spare_whites() {
        // Pattern demands a white; candidate has one white and no shortfall.
        assert!(satisfies("rw", "rw", false));
        // Candidate has no white at all.
        assert!(!satisfies("rg", "rw", false));
        // One white is used to cover the missing green, none left for the demanded white.
        assert!(!satisfies("rbw", "rgw", false));
    }

    #[test]
    fn test_wildcard_only_counts_length() {
        assert!(satisfies("bbb", "??", false));
        assert!(!satisfies("b", "??", false));
        assert!(satisfies("rgb", "r??", true));
    }

    #[test]
    fn test_group_vs_flattened() {
        let groups = ["rg", "b"];
        assert!(!matches_any_group(&groups, "rgb", false));
        assert!(matches_flattened(&groups, "rgb", false));
        assert!(matches_any_group(&groups, "gr", true));
    }

    #[test]
    fn test_empty_groups() {
        let groups: [&str; 0] = [];
        assert!(!matches_any_group(&groups, "r", false));
        assert!(matches_flattened(&groups, "", false));
    }
}
