use crate::matcher::Pattern;
use indexmap::IndexMap;
use itertools::Itertools;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateReport {
    /// Template -> other templates whose literal text its pattern matches.
    pub subsumes: IndexMap<String, Vec<String>>,
    /// Pairs that subsume each other; likely the same template twice.
    pub symmetric: Vec<(String, String)>,
}

impl DuplicateReport {
    /// Subsumptions that only hold one way (general, specific).
    pub fn one_directional(&self) -> Vec<(&str, &str)> {
        self.subsumes
            .iter()
            .flat_map(|(general, specifics)| specifics.iter().map(move |s| (general.as_str(), s.as_str())))
            .filter(|(general, specific)| !self.is_subsumed_by(general, specific))
            .collect()
    }

    /// True when `general`'s pattern matches `specific`'s text.
    pub fn is_subsumed_by(&self, specific: &str, general: &str) -> bool {
        self.subsumes
            .get(general)
            .is_some_and(|subs| subs.iter().any(|s| s == specific))
    }

    pub fn is_empty(&self) -> bool {
        self.subsumes.is_empty()
    }
}

/// Tests every template's pattern against every other template string.
/// Quadratic in the number of templates.
pub fn find_duplicates<S: AsRef<str>>(templates: &[S]) -> DuplicateReport {
    let templates: Vec<&str> = templates.iter().map(|t| t.as_ref()).unique().collect();

    let rows: Vec<(String, Vec<String>)> = templates
        .par_iter()
        .filter_map(|&t| {
            let pattern = match Pattern::from_template(t) {
                Ok(p) => p,
                Err(e) => {
                    tracing::warn!(template = t, error = %e, "skipping template in duplicate scan");
                    return None;
                }
            };
            let subs: Vec<String> = templates
                .iter()
                .filter(|&&other| other != t && pattern.is_match(other))
                .map(|s| s.to_string())
                .collect();
            (!subs.is_empty()).then(|| (t.to_string(), subs))
        })
        .collect();

    let mut report = DuplicateReport { subsumes: rows.into_iter().collect(), symmetric: Vec::new() };
    let symmetric = templates
        .iter()
        .tuple_combinations()
        .filter(|(a, b)| report.is_subsumed_by(a, b) && report.is_subsumed_by(b, a))
        .map(|(a, b)| (a.to_string(), b.to_string()))
        .collect();
    report.symmetric = symmetric;
    report
}
