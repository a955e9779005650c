use crate::template;
use rayon::prelude::*;
use regex::{Regex, RegexBuilder};

/// Compiled matching pattern.
///
/// Matching is a prefix match: the expression is anchored at the start of the
/// line but not at the end, and `.` also matches newlines so multi-line
/// entries are matched as a whole.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    pub fn new(source: &str) -> Result<Self, regex::Error> {
        let regex = RegexBuilder::new(&format!("^(?:{source})"))
            .dot_matches_new_line(true)
            .build()?;
        Ok(Self { source: source.to_string(), regex })
    }

    pub fn from_positional(positional: &str) -> Result<Self, regex::Error> {
        Self::new(&template::to_pattern(positional))
    }

    /// Accepts semantic or positional templates.
    pub fn from_template(template: &str) -> Result<Self, regex::Error> {
        Self::from_positional(&template::to_positional(template))
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, line: &str) -> bool {
        self.regex.is_match(line)
    }

    /// Values captured by each wildcard, or `None` when the line does not match.
    pub fn extract(&self, line: &str) -> Option<Vec<String>> {
        let caps = self.regex.captures(line)?;
        Some(
            caps.iter()
                .skip(1)
                .map(|m| m.map(|m| m.as_str().to_string()).unwrap_or_default())
                .collect(),
        )
    }
}

/// Every pool member the pattern matches, in pool order.
pub fn match_lines<'a, I>(pool: I, pattern: &Pattern) -> Vec<String>
where
    I: IntoParallelIterator<Item = &'a String>,
{
    pool.into_par_iter()
        .filter(|line| pattern.is_match(line))
        .cloned()
        .collect()
}
