use log::debug;

use crate::config::EvaluatorConfig;
use crate::flag::Flag;
use crate::graph::DependencyGraph;

/// What to evaluate for a returning client.
#[derive(Debug, PartialEq)]
pub enum Plan<'a> {
    /// Evaluate every flag; the client replaces its cache.
    Full,
    /// Evaluate only these flags, in input order; the client merges the result into its
    /// cache.
    Partial(Vec<&'a Flag>),
}

/// Decides whether a client's cached evaluations can be patched or must be replaced.
pub struct IncrementalPolicy<'c> {
    config: &'c EvaluatorConfig,
}

impl<'c> IncrementalPolicy<'c> {
    pub fn new(config: &'c EvaluatorConfig) -> Self {
        IncrementalPolicy { config }
    }

    /// Plan the evaluation for a client that last evaluated at `evaluated_at` and holds the
    /// result set `prev_id`.
    ///
    /// A partial plan covers the flags updated since `evaluated_at` (minus the clock skew
    /// allowance) and, when the user's attributes changed, every flag with rules. The
    /// selection is extended with every flag depending on it, then with everything those
    /// flags depend on so it can be evaluated on its own.
    pub fn plan<'a>(
        &self,
        flags: &'a [Flag],
        prev_id: &str,
        evaluated_at: i64,
        user_attributes_updated: bool,
        now: i64,
    ) -> Plan<'a> {
        if prev_id.is_empty() {
            debug!("no previous evaluation id, evaluating all flags");
            return Plan::Full;
        }
        if evaluated_at < now - self.config.reevaluate_all_after_secs {
            debug!("previous evaluation at {} is too old, evaluating all flags", evaluated_at);
            return Plan::Full;
        }

        let adjusted = evaluated_at - self.config.clock_skew_adjustment_secs;
        let selected: Vec<&str> = flags
            .iter()
            .filter(|f| f.updated_at > adjusted || (user_attributes_updated && !f.rules.is_empty()))
            .map(|f| f.id.as_str())
            .collect();
        if selected.is_empty() {
            // the id changed although neither flags nor attributes did
            debug!("no flag changed since {}, evaluating all flags", evaluated_at);
            return Plan::Full;
        }

        let graph = DependencyGraph::new(flags);
        let dependents: Vec<&str> = graph
            .dependents_of(&selected)
            .into_iter()
            .map(|f| f.id.as_str())
            .collect();
        let subset = graph.dependencies_of(&dependents);
        debug!(
            "{} flags selected, {} evaluated after closure",
            selected.len(),
            subset.len()
        );
        Plan::Partial(subset)
    }
}
