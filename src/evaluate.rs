use crate::dataset::LogRecord;
use crate::pipeline::TemplateGroup;
use crate::template;
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub log: String,
    pub expected: String,
    /// Positional form of the template that claimed the log, if any.
    pub predicted: Option<String>,
    pub correct: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Evaluation {
    pub total: usize,
    pub correct: usize,
    pub unparsed: usize,
    pub accuracy: f64,
    pub outcomes: Vec<Outcome>,
}

/// Scores every record: correct when the group that claimed its log has the
/// ground-truth template once placeholder names are erased.
pub fn evaluate(records: &[LogRecord], groups: &IndexMap<String, TemplateGroup>) -> Evaluation {
    let mut claimed: HashMap<&str, String> = HashMap::new();
    for group in groups.values() {
        let positional = group.positional();
        for line in &group.matches {
            claimed.entry(line.as_str()).or_insert_with(|| positional.clone());
        }
    }

    let outcomes: Vec<Outcome> = records
        .iter()
        .map(|r| {
            let predicted = claimed.get(r.log.as_str()).cloned();
            let correct = predicted.as_deref() == Some(template::to_positional(&r.template).as_str());
            Outcome { log: r.log.clone(), expected: r.template.clone(), predicted, correct }
        })
        .collect();

    let total = outcomes.len();
    let correct = outcomes.iter().filter(|o| o.correct).count();
    let unparsed = outcomes.iter().filter(|o| o.predicted.is_none()).count();
    let accuracy = if total == 0 { 0.0 } else { correct as f64 / total as f64 };

    Evaluation { total, correct, unparsed, accuracy, outcomes }
}
