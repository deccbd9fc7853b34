use std::collections::HashMap;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::clock::{Clock, SystemClock};
use crate::config::EvaluatorConfig;
use crate::error::Result;
use crate::flag::Flag;
use crate::graph::DependencyGraph;
use crate::identity::user_evaluations_id;
use crate::incremental::{IncrementalPolicy, Plan};
use crate::rule::evaluate_rules;
use crate::segment::SegmentStore;
use crate::user::User;
use crate::variation::Variation;

/// Why a user received the variation they did.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonType {
    /// The flag is disabled.
    OffVariation,
    /// No target or rule applied; the default strategy decided.
    Default,
    /// A targeting rule matched.
    Rule,
    /// A prerequisite flag did not resolve to the required variation.
    Prerequisite,
    /// The user is listed in one of the flag's targets.
    Target,
    /// Set by SDKs when they fall back to a local default. Never produced here.
    Client,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reason {
    #[serde(rename = "type")]
    pub reason_type: ReasonType,
    /// The id of the matching rule, only set for [ReasonType::Rule].
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub rule_id: String,
}

impl Reason {
    pub fn new(reason_type: ReasonType) -> Self {
        Reason {
            reason_type,
            rule_id: String::new(),
        }
    }

    pub fn rule(rule_id: impl Into<String>) -> Self {
        Reason {
            reason_type: ReasonType::Rule,
            rule_id: rule_id.into(),
        }
    }
}

/// The outcome of evaluating one flag for one user.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    pub id: String,
    pub feature_id: String,
    pub feature_version: i32,
    pub user_id: String,
    pub variation_id: String,
    pub variation_name: String,
    pub variation_value: String,
    pub reason: Reason,
}

/// Every evaluation produced for a user in one request.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserEvaluations {
    /// Fingerprint of the evaluated inputs; see [user_evaluations_id].
    pub id: String,
    pub evaluations: Vec<Evaluation>,
    /// Flags archived recently enough that clients may still cache them, so clients can
    /// drop them.
    pub archived_feature_ids: Vec<String>,
    /// True if `evaluations` covers every flag and the client must replace its cache
    /// rather than merge into it.
    pub force_update: bool,
    pub created_at: i64,
}

/// `{flag_id}:{flag_version}:{user_id}`
pub fn evaluation_id(flag_id: &str, flag_version: i32, user_id: &str) -> String {
    format!("{}:{}:{}", flag_id, flag_version, user_id)
}

impl Evaluation {
    fn new(flag: &Flag, user_id: &str, variation: &Variation, reason: Reason) -> Self {
        Evaluation {
            id: evaluation_id(&flag.id, flag.version, user_id),
            feature_id: flag.id.clone(),
            feature_version: flag.version,
            user_id: user_id.to_string(),
            variation_id: variation.id.clone(),
            variation_name: variation.name.clone(),
            variation_value: variation.value.clone(),
            reason,
        }
    }
}

/// Evaluates sets of flags for users.
///
/// An evaluator holds no per-request state and can be shared between threads.
pub struct Evaluator {
    config: EvaluatorConfig,
    clock: Box<dyn Clock>,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator {
    /// An evaluator with the default configuration and the system clock.
    pub fn new() -> Self {
        Evaluator {
            config: EvaluatorConfig::default(),
            clock: Box::new(SystemClock),
        }
    }

    pub fn with_config(mut self, config: EvaluatorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// Evaluate every flag in `flags` for `user`.
    ///
    /// `flags` must be closed under dependencies. When `target_tag` is not empty, only
    /// flags carrying that tag are returned, although all of them are evaluated.
    pub fn evaluate_features(
        &self,
        flags: &[Flag],
        user: &User,
        segments: &dyn SegmentStore,
        target_tag: &str,
    ) -> Result<UserEvaluations> {
        self.evaluate(flags.iter(), user, segments, false, target_tag)
    }

    /// Evaluate for a client that already holds the result set identified by `prev_id`,
    /// computed at `evaluated_at`.
    ///
    /// Only the flags that may have changed since then are evaluated, unless a full
    /// evaluation is needed; see [IncrementalPolicy].
    #[allow(clippy::too_many_arguments)]
    pub fn evaluate_features_by_evaluated_at(
        &self,
        flags: &[Flag],
        user: &User,
        segments: &dyn SegmentStore,
        prev_id: &str,
        evaluated_at: i64,
        user_attributes_updated: bool,
        target_tag: &str,
    ) -> Result<UserEvaluations> {
        let policy = IncrementalPolicy::new(self.config());
        match policy.plan(
            flags,
            prev_id,
            evaluated_at,
            user_attributes_updated,
            self.clock.now(),
        ) {
            Plan::Full => self.evaluate(flags.iter(), user, segments, true, target_tag),
            Plan::Partial(subset) => {
                self.evaluate(subset.into_iter(), user, segments, false, target_tag)
            }
        }
    }

    /// The flags in `all` that `targets` transitively depend on, including the targets.
    pub fn prerequisite_downwards<'a>(&self, targets: &[Flag], all: &'a [Flag]) -> Vec<&'a Flag> {
        let ids: Vec<&str> = targets.iter().map(|f| f.id.as_str()).collect();
        DependencyGraph::new(all).dependencies_of(&ids)
    }

    /// Flags whose last recorded use is older than the configured staleness window.
    pub fn stale_flags<'a>(&self, flags: &'a [Flag]) -> Vec<&'a Flag> {
        let now = self.clock.now();
        flags
            .iter()
            .filter(|f| f.is_stale(now, self.config.stale_after_secs))
            .collect()
    }

    fn evaluate<'a, I>(
        &self,
        flags: I,
        user: &User,
        segments: &dyn SegmentStore,
        force_update: bool,
        target_tag: &str,
    ) -> Result<UserEvaluations>
    where
        I: Iterator<Item = &'a Flag> + Clone,
    {
        let now = self.clock.now();
        let graph = DependencyGraph::new(flags.clone());
        let sorted = graph.sorted()?;

        let mut flag_variations: HashMap<String, String> = HashMap::with_capacity(sorted.len());
        let mut evaluations = Vec::with_capacity(sorted.len());
        let mut archived_feature_ids = Vec::new();

        for flag in sorted {
            if flag.archived {
                if !flag.is_archived_before(now, self.config.archived_retention_secs) {
                    archived_feature_ids.push(flag.id.clone());
                }
                continue;
            }

            let (reason, variation) = self.assign_user(flag, user, segments, &flag_variations)?;
            flag_variations.insert(flag.id.clone(), variation.id.clone());

            if !target_tag.is_empty() && !flag.has_tag(target_tag) {
                debug!("flag {} does not carry tag {}, omitted", flag.id, target_tag);
                continue;
            }
            evaluations.push(Evaluation::new(flag, &user.id, variation, reason));
        }

        Ok(UserEvaluations {
            id: user_evaluations_id(&user.id, &user.data, flags),
            evaluations,
            archived_feature_ids,
            force_update,
            created_at: now,
        })
    }

    /// Decide the variation of a single flag for `user`.
    ///
    /// `flag_variations` must already hold the variations of every flag this flag depends
    /// on.
    pub fn assign_user<'f>(
        &self,
        flag: &'f Flag,
        user: &User,
        segments: &dyn SegmentStore,
        flag_variations: &HashMap<String, String>,
    ) -> Result<(Reason, &'f Variation)> {
        if !flag.enabled {
            let variation = flag.find_variation(&flag.off_variation)?;
            return Ok((Reason::new(ReasonType::OffVariation), variation));
        }

        for prerequisite in &flag.prerequisites {
            let satisfied = flag_variations
                .get(&prerequisite.feature_id)
                .map_or(false, |v| *v == prerequisite.variation_id);
            if satisfied {
                continue;
            }
            if flag.off_variation.is_empty() {
                debug!(
                    "prerequisite {} of flag {} not met, but no off variation is set",
                    prerequisite.feature_id, flag.id
                );
                continue;
            }
            let variation = flag.find_variation(&flag.off_variation)?;
            return Ok((Reason::new(ReasonType::Prerequisite), variation));
        }

        if let Some(variation_id) = flag.target_variation(&user.id) {
            let variation = flag.find_variation(variation_id)?;
            return Ok((Reason::new(ReasonType::Target), variation));
        }

        if let Some(rule) = evaluate_rules(&flag.rules, user, segments, flag_variations) {
            let variation =
                rule.strategy
                    .resolve(&user.id, &flag.variations, &flag.id, &flag.sampling_seed)?;
            return Ok((Reason::rule(&rule.id), variation));
        }

        let variation = flag.default_strategy.resolve(
            &user.id,
            &flag.variations,
            &flag.id,
            &flag.sampling_seed,
        )?;
        Ok((Reason::new(ReasonType::Default), variation))
    }
}
