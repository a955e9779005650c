use crate::client::{CompletionError, CompletionSource, FewShot};
use crate::decoder::{self, DecodeError, Decoded};
use crate::matcher::{self, Pattern};
use crate::template::{self, Variables};
use crate::prompts;
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Temperature of the first pass.
    pub initial_temperature: f32,
    /// Temperature of every later pass.
    pub escalated_temperature: f32,
    pub max_passes: usize,
    /// Upper bound on completion requests across all passes.
    pub max_calls: Option<usize>,
    /// Reject replies whose rendering does not reproduce the source line.
    pub validate: bool,
    /// Reject replies with placeholders that have no assigned value.
    pub strict: bool,
    /// Ask the model to generalise each new template against its matches.
    pub refine: bool,
    /// Matched lines shown in a refinement request, source line first.
    pub refine_samples: usize,
    pub examples: Vec<FewShot>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            initial_temperature: 0.0,
            escalated_temperature: 0.8,
            max_passes: 5,
            max_calls: None,
            validate: false,
            strict: false,
            refine: false,
            refine_samples: 3,
            examples: prompts::default_examples(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateGroup {
    pub template: String,
    pub variables: Variables,
    pub matches: Vec<String>,
}

impl TemplateGroup {
    /// `None` when there are no matches; a group always covers at least one line.
    pub fn new(template: String, variables: Variables, matches: Vec<String>) -> Option<Self> {
        if matches.is_empty() {
            return None;
        }
        Some(Self { template, variables, matches })
    }

    pub fn positional(&self) -> String {
        template::to_positional(&self.template)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Converged,
    PassLimit,
    CallBudget,
    Interrupted,
}

#[derive(Debug, Clone)]
pub struct RunResult {
    /// Keyed by semantic template, in formation order.
    pub groups: IndexMap<String, TemplateGroup>,
    /// Lines no group claimed.
    pub residual: Vec<String>,
    pub passes: usize,
    pub calls: usize,
    pub stop: StopReason,
}

impl RunResult {
    pub fn is_converged(&self) -> bool {
        self.residual.is_empty()
    }

    pub fn templates(&self) -> Vec<&str> {
        self.groups.keys().map(String::as_str).collect()
    }

    pub fn matched_lines(&self) -> usize {
        self.groups.values().map(|g| g.matches.len()).sum()
    }
}

#[derive(Debug, Error)]
pub enum StepError {
    #[error(transparent)]
    Completion(#[from] CompletionError),
    #[error("{source}; reply was {reply:?}")]
    Decode { source: DecodeError, reply: String },
    #[error("template {template:?} does not render back to the log line")]
    NotReversible { template: String },
    #[error("refined template {template:?} no longer matches {line:?}")]
    RefinementMismatch { template: String, line: String },
    #[error("refined template does not compile: {0}")]
    Pattern(#[from] regex::Error),
}

pub struct Pipeline<'a, S: CompletionSource + ?Sized> {
    source: &'a S,
    config: PipelineConfig,
    stop: Option<&'a AtomicBool>,
}

impl<'a, S: CompletionSource + ?Sized> Pipeline<'a, S> {
    pub fn new(source: &'a S, config: PipelineConfig) -> Self {
        Self { source, config, stop: None }
    }

    /// The run ends early, keeping what it has, once `flag` is set.
    pub fn with_stop_flag(mut self, flag: &'a AtomicBool) -> Self {
        self.stop = Some(flag);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Templates `logs` until every line belongs to a group or a limit is hit.
    ///
    /// Each pass offers every unassigned line to the model once. A line whose
    /// template matches nothing stays in the pool for the next pass, which runs
    /// at the escalated temperature.
    pub fn run<I>(&self, logs: I) -> RunResult
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let mut pool: IndexSet<String> = logs.into_iter().map(Into::into).collect();
        let mut groups: IndexMap<String, TemplateGroup> = IndexMap::new();
        let mut passes = 0;
        let mut calls = 0;

        let stop = 'passes: loop {
            if pool.is_empty() {
                break StopReason::Converged;
            }
            if passes >= self.config.max_passes {
                break StopReason::PassLimit;
            }
            let temperature = if passes == 0 {
                self.config.initial_temperature
            } else {
                self.config.escalated_temperature
            };
            passes += 1;
            let before = pool.len();
            info!(pass = passes, temperature, pool = before, "starting pass");

            let sweep: Vec<String> = pool.iter().cloned().collect();
            for line in sweep {
                if self.stop.is_some_and(|f| f.load(Ordering::SeqCst)) {
                    break 'passes StopReason::Interrupted;
                }
                if !pool.contains(&line) {
                    continue;
                }
                if self.budget_spent(calls) {
                    break 'passes StopReason::CallBudget;
                }
                calls += 1;

                let decoded = match self.step(&line, temperature) {
                    Ok(d) => d,
                    Err(e) => {
                        warn!(line = %line, error = %e, "skipping line");
                        continue;
                    }
                };
                let pattern = match Pattern::from_template(&decoded.template) {
                    Ok(p) => p,
                    Err(e) => {
                        warn!(
                            template = %decoded.template,
                            error = %e,
                            "template does not compile"
                        );
                        continue;
                    }
                };

                let matches = matcher::match_lines(&pool, &pattern);
                if matches.is_empty() {
                    debug!(line = %line, template = %decoded.template, "template matched nothing");
                    continue;
                }

                let claimed: HashSet<&str> = matches.iter().map(String::as_str).collect();
                pool.retain(|l| !claimed.contains(l.as_str()));

                let decoded = if self.config.refine && !self.budget_spent(calls) {
                    calls += 1;
                    match self.refine(&line, &decoded, &matches) {
                        Ok(refined) => refined,
                        Err(e) => {
                            debug!(template = %decoded.template, error = %e, "refinement rejected");
                            decoded
                        }
                    }
                } else {
                    decoded
                };
                debug!(template = %decoded.template, matched = matches.len(), "formed group");
                merge_group(&mut groups, decoded, matches);
            }

            info!(
                pass = passes,
                claimed = before - pool.len(),
                remaining = pool.len(),
                "pass finished"
            );
        };

        let residual: Vec<String> = pool.into_iter().collect();
        if !residual.is_empty() {
            warn!(residual = residual.len(), ?stop, "lines left without a template");
        }
        info!(groups = groups.len(), passes, calls, "run finished");

        RunResult { groups, residual, passes, calls, stop }
    }

    fn budget_spent(&self, calls: usize) -> bool {
        self.config.max_calls.is_some_and(|max| calls >= max)
    }

    fn step(&self, line: &str, temperature: f32) -> Result<Decoded, StepError> {
        let reply = self
            .source
            .complete(&prompts::user_prompt(line), temperature, &self.config.examples)?;

        let decoded = self.decode(reply)?;

        if self.config.validate
            && !template::is_reversible(&decoded.template, &decoded.variables, line)
        {
            return Err(StepError::NotReversible { template: decoded.template });
        }
        Ok(decoded)
    }

    /// Asks for a more general template over `line` and a few of its matches.
    /// The answer is only taken if it still matches every line of the group.
    fn refine(
        &self,
        line: &str,
        decoded: &Decoded,
        matches: &[String],
    ) -> Result<Decoded, StepError> {
        let samples: Vec<&str> = std::iter::once(line)
            .chain(matches.iter().map(String::as_str).filter(|m| *m != line))
            .take(self.config.refine_samples.max(1))
            .collect();
        let reply = self.source.complete_with_system(
            prompts::REFINE_PROMPT,
            &prompts::refine_prompt(&decoded.template, &samples),
            self.config.initial_temperature,
        )?;
        let refined = self.decode(reply)?;

        let pattern = Pattern::from_template(&refined.template)?;
        if let Some(missed) = matches.iter().find(|m| !pattern.is_match(m.as_str())) {
            return Err(StepError::RefinementMismatch {
                template: refined.template,
                line: missed.clone(),
            });
        }
        if self.config.validate
            && !template::is_reversible(&refined.template, &refined.variables, line)
        {
            return Err(StepError::NotReversible { template: refined.template });
        }
        if refined.template != decoded.template {
            debug!(from = %decoded.template, to = %refined.template, "refined template");
        }
        Ok(refined)
    }

    fn decode(&self, reply: String) -> Result<Decoded, StepError> {
        if self.config.strict {
            decoder::decode_strict(&reply)
        } else {
            decoder::decode(&reply)
        }
        .map_err(move |source| StepError::Decode { source, reply })
    }
}

/// A template already in `groups` only reappears through refinement: two
/// different first answers generalised to the same text.
fn merge_group(
    groups: &mut IndexMap<String, TemplateGroup>,
    decoded: Decoded,
    matches: Vec<String>,
) {
    if let Some(existing) = groups.get_mut(&decoded.template) {
        warn!(
            template = %decoded.template,
            added = matches.len(),
            "template formed twice; merging matches"
        );
        existing.matches.extend(matches);
        return;
    }
    if let Some(group) = TemplateGroup::new(decoded.template.clone(), decoded.variables, matches) {
        groups.insert(decoded.template, group);
    }
}
