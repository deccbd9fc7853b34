use log::debug;

use crate::flag::Flag;
use crate::strategy::Strategy;

/// What [cleanup_orphaned_variation_references] did to a flag.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CleanupResult {
    pub changed: bool,
    /// The orphaned variation ids that were found, in first-seen order.
    pub removed: Vec<String>,
}

/// Variation ids the flag references but does not define, in first-seen order: the off
/// variation, targets, rule strategies, then the default strategy.
pub fn orphaned_variation_references(flag: &Flag) -> Vec<String> {
    let mut orphaned: Vec<String> = Vec::new();
    let mut check = |id: &str| {
        if !id.is_empty() && !defines(flag, id) && !orphaned.iter().any(|o| o == id) {
            orphaned.push(id.to_string());
        }
    };

    check(&flag.off_variation);
    for target in &flag.targets {
        check(&target.variation);
    }
    for strategy in flag.rules.iter().map(|r| &r.strategy).chain(Some(&flag.default_strategy)) {
        for id in strategy.variation_ids() {
            check(id);
        }
    }
    orphaned
}

/// Remove references to variations the flag no longer defines.
///
/// Orphaned targets and rollout entries are dropped. An orphaned fixed strategy or off
/// variation is repointed to the fallback variation: the second variation, or the first
/// when there is only one. `updated_at` is set to `now` if anything changed.
pub fn cleanup_orphaned_variation_references(flag: &mut Flag, now: i64) -> CleanupResult {
    let removed = orphaned_variation_references(flag);
    if removed.is_empty() {
        return CleanupResult::default();
    }
    let is_orphan = |id: &str| removed.iter().any(|o| o == id);
    let fallback = flag
        .variations
        .get(1)
        .or_else(|| flag.variations.first())
        .map(|v| v.id.clone())
        .unwrap_or_default();

    if is_orphan(&flag.off_variation) {
        flag.off_variation = fallback.clone();
    }
    flag.targets.retain(|t| !is_orphan(&t.variation));
    for rule in &mut flag.rules {
        clean_strategy(&mut rule.strategy, &is_orphan, &fallback);
    }
    clean_strategy(&mut flag.default_strategy, &is_orphan, &fallback);

    debug!(
        "removed orphaned variation references {:?} from flag {}",
        removed, flag.id
    );
    flag.updated_at = now;
    CleanupResult {
        changed: true,
        removed,
    }
}

fn defines(flag: &Flag, variation_id: &str) -> bool {
    flag.variations.iter().any(|v| v.id == variation_id)
}

fn clean_strategy<F: Fn(&str) -> bool>(strategy: &mut Strategy, is_orphan: &F, fallback: &str) {
    match strategy {
        Strategy::Fixed { variation } => {
            if is_orphan(variation.as_str()) {
                *variation = fallback.to_string();
            }
        }
        Strategy::Rollout(rollout) => {
            rollout.variations.retain(|v| !is_orphan(&v.variation));
            if let Some(audience) = rollout.audience.as_mut() {
                if is_orphan(&audience.default_variation) {
                    audience.default_variation = fallback.to_string();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flag::Target;
    use crate::rule::{Clause, Operator, Rule};
    use crate::strategy::{Audience, RolloutStrategy, WeightedVariation};
    use crate::test_common::{variations, NOW};
    use spectral::prelude::*;

    const UPDATED_AT: i64 = NOW - 1000;

    fn base_flag() -> Flag {
        Flag {
            off_variation: "variation-B".into(),
            targets: vec![
                Target::new("variation-A", ["user-a"]),
                Target::new("variation-B", ["user-b"]),
            ],
            updated_at: UPDATED_AT,
            ..Flag::new(
                "test-feature",
                variations(&["variation-A", "variation-B", "variation-C"]),
            )
        }
    }

    fn rollout(entries: &[(&str, i32)]) -> Strategy {
        Strategy::rollout(
            entries
                .iter()
                .map(|(v, w)| WeightedVariation::new(*v, *w))
                .collect::<Vec<_>>(),
        )
    }

    fn rule(strategy: Strategy) -> Rule {
        Rule {
            id: "test-rule".into(),
            clauses: vec![Clause::new("user_id", Operator::Equals, ["user-1"])],
            strategy,
        }
    }

    #[test]
    fn clean_flag_has_no_orphans() {
        let mut flag = base_flag();
        assert_that!(orphaned_variation_references(&flag)).has_length(0);

        let result = cleanup_orphaned_variation_references(&mut flag, NOW);
        assert_that!(result).is_equal_to(CleanupResult::default());
        assert_that!(flag.updated_at).is_equal_to(UPDATED_AT);
        assert_that!(flag).is_equal_to(base_flag());
    }

    #[test]
    fn orphans_are_listed_once_in_order() {
        let mut flag = base_flag();
        flag.off_variation = "orphaned-off".into();
        flag.targets.push(Target::new("orphaned-1", ["user-x"]));
        flag.rules = vec![rule(rollout(&[("variation-A", 50_000), ("orphaned-2", 50_000)]))];
        flag.default_strategy = Strategy::fixed("orphaned-1");

        assert_that!(orphaned_variation_references(&flag)).is_equal_to(vec![
            "orphaned-off".to_string(),
            "orphaned-1".to_string(),
            "orphaned-2".to_string(),
        ]);
    }

    #[test]
    fn orphaned_target_is_removed() {
        let mut flag = base_flag();
        flag.targets.push(Target::new("orphaned-variation", ["user1"]));

        let result = cleanup_orphaned_variation_references(&mut flag, NOW);
        assert_that!(result.changed).is_true();
        assert_that!(result.removed).is_equal_to(vec!["orphaned-variation".to_string()]);
        assert_that!(flag.targets).is_equal_to(base_flag().targets);
        assert_that!(flag.updated_at).is_equal_to(NOW);
    }

    #[test]
    fn orphaned_rollout_entries_are_removed() {
        let mut flag = base_flag();
        flag.rules = vec![rule(rollout(&[("variation-A", 50_000), ("orphaned-variation", 0)]))];
        flag.default_strategy = rollout(&[("variation-A", 100_000), ("orphaned-variation", 0)]);

        cleanup_orphaned_variation_references(&mut flag, NOW);
        let expected = Strategy::Rollout(RolloutStrategy {
            variations: vec![WeightedVariation::new("variation-A", 50_000)],
            audience: None,
        });
        assert_that!(flag.rules[0].strategy).is_equal_to(expected);
        assert_that!(flag.default_strategy)
            .is_equal_to(rollout(&[("variation-A", 100_000)]));
    }

    #[test]
    fn orphaned_fixed_strategy_is_repointed() {
        let mut flag = base_flag();
        flag.default_strategy = Strategy::fixed("gone");
        cleanup_orphaned_variation_references(&mut flag, NOW);
        assert_that!(flag.default_strategy).is_equal_to(Strategy::fixed("variation-B"));
    }

    #[test]
    fn orphaned_off_variation_uses_second_variation() {
        let mut flag = base_flag();
        flag.off_variation = "orphaned-off-variation".into();
        cleanup_orphaned_variation_references(&mut flag, NOW);
        assert_that!(flag.off_variation).is_equal_to("variation-B".to_string());
    }

    #[test]
    fn orphaned_off_variation_with_one_variation_uses_first() {
        let mut flag = base_flag();
        flag.variations.truncate(1);
        flag.targets.clear();
        flag.off_variation = "orphaned-off-variation".into();
        cleanup_orphaned_variation_references(&mut flag, NOW);
        assert_that!(flag.off_variation).is_equal_to("variation-A".to_string());
    }

    #[test]
    fn empty_off_variation_is_not_an_orphan() {
        let mut flag = base_flag();
        flag.off_variation.clear();
        assert_that!(orphaned_variation_references(&flag)).has_length(0);
    }

    #[test]
    fn orphaned_audience_default_is_repointed() {
        let mut flag = base_flag();
        flag.default_strategy = Strategy::Rollout(RolloutStrategy {
            variations: vec![
                WeightedVariation::new("variation-A", 50_000),
                WeightedVariation::new("variation-B", 50_000),
            ],
            audience: Some(Audience {
                percentage: 20,
                default_variation: "gone".into(),
            }),
        });
        assert_that!(orphaned_variation_references(&flag)).is_equal_to(vec!["gone".to_string()]);

        cleanup_orphaned_variation_references(&mut flag, NOW);
        match &flag.default_strategy {
            Strategy::Rollout(rollout) => {
                assert_that!(rollout.variations).has_length(2);
                assert_that!(rollout.audience.as_ref().map(|a| a.default_variation.as_str()))
                    .contains_value("variation-B");
            }
            other => panic!("expected rollout, got {:?}", other),
        }
    }
}
