//! Rule script splitting.
//!
//! A script is a sequence of sections separated by blank lines. Each section
//! is one rule. `//` starts a line comment anywhere on a line, including
//! inside string literals. A section whose first content line starts with
//! `^` is negated.

/// One rule's worth of script text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// 1-based line of the first content line.
    pub start_line: usize,
    /// Whether the section started with `^`.
    pub negated: bool,
    /// Comment-stripped text handed to the compiler.
    pub text: String,
    /// Lines exactly as written.
    pub raw: String,
}

fn strip_comment(line: &str) -> &str {
    match line.find("//") {
        Some(at) => line[..at].trim(),
        None => line.trim(),
    }
}

struct Open {
    start_line: usize,
    negated: bool,
    cleaned: Vec<String>,
    raw: Vec<String>,
}

impl Open {
    fn finish(self) -> Option<Section> {
        let text = self.cleaned.join("\n");
        if text.trim().is_empty() {
            return None;
        }
        Some(Section {
            start_line: self.start_line,
            negated: self.negated,
            text,
            raw: self.raw.join("\n"),
        })
    }
}

/// Split script lines into rule sections, in input order.
///
/// # Examples
///
/// ```rust
/// use itemfilter::script::split_sections;
///
/// let sections = split_sections(&["// currency", "BaseName == \"Chaos Orb\"", "", "^IsCorrupted"]);
/// assert_eq!(sections.len(), 2);
/// assert_eq!(sections[0].start_line, 2);
/// assert!(sections[1].negated);
/// assert_eq!(sections[1].text, "IsCorrupted");
/// ```
pub fn split_sections<S: AsRef<str>>(lines: &[S]) -> Vec<Section> {
    let mut sections = Vec::new();
    let mut open: Option<Open> = None;

    let lines = lines.iter().map(|line| line.as_ref()).chain(std::iter::once(""));
    for (index, line) in lines.enumerate() {
        if line.trim().is_empty() {
            if let Some(section) = open.take().and_then(Open::finish) {
                sections.push(section);
            }
            continue;
        }

        let cleaned = strip_comment(line);
        match open.as_mut() {
            Some(section) => {
                section.cleaned.push(cleaned.to_string());
                section.raw.push(line.to_string());
            }
            None if cleaned.is_empty() => {}
            None => {
                let (negated, cleaned) = match cleaned.strip_prefix('^') {
                    Some(rest) => (true, rest),
                    None => (false, cleaned),
                };
                open = Some(Open {
                    start_line: index + 1,
                    negated,
                    cleaned: vec![cleaned.to_string()],
                    raw: vec![line.to_string()],
                });
            }
        }
    }

    sections
}

/// Split a whole script, normalizing `\r\n` line endings.
pub fn split_text(text: &str) -> Vec<Section> {
    let lines: Vec<&str> = text.lines().collect();
    split_sections(&lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_line_separates_rules() {
        let sections = split_sections(&["ItemLevel > 80", "", "IsCorrupted"]);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].start_line, 1);
        assert_eq!(sections[1].start_line, 3);
        assert_eq!(sections[1].text, "IsCorrupted");
    }

    #[test]
    fn test_leading_comment_skipped() {
        let sections = split_sections(&["// header", "   // more", "Rarity == \"Rare\""]);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].start_line, 3);
        assert_eq!(sections[0].raw, "Rarity == \"Rare\"");
    }

    #[test]
    fn test_negation() {
        let sections = split_sections(&["^foo == 1"]);
        assert!(sections[0].negated);
        assert_eq!(sections[0].text, "foo == 1");
        assert_eq!(sections[0].raw, "^foo == 1");
    }

    #[test]
    fn test_comments_inside_section() {
        let sections = split_sections(&[
            "ItemLevel > 80 // high level",
            "// only rares",
            "&& Rarity == \"Rare\"",
        ]);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].text, "ItemLevel > 80\n\n&& Rarity == \"Rare\"");
        assert_eq!(sections[0].raw.lines().count(), 3);
    }

    #[test]
    fn test_whitespace_line_terminates() {
        let sections = split_sections(&["A", "  \t ", "B"]);
        assert_eq!(sections.len(), 2);
    }

    #[test]
    fn test_comment_marker_inside_string() {
        let sections = split_sections(&["Path.Contains(\"a//b\")"]);
        assert_eq!(sections[0].text, "Path.Contains(\"a");
    }

    #[test]
    fn test_crlf_text() {
        let sections = split_text("A\r\n\r\n^B\r\n");
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[1].text, "B");
        assert_eq!(sections[1].start_line, 3);
    }

    #[test]
    fn test_empty_script() {
        assert!(split_sections::<&str>(&[]).is_empty());
        assert!(split_sections(&["// nothing", ""]).is_empty());
    }
}
