use std::collections::HashSet;

use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error as ThisError;

use crate::error::Error;
use crate::flag::Flag;
use crate::graph::DependencyGraph;
use crate::strategy::{Strategy, TOTAL_VARIATION_WEIGHT};
use crate::variation::VariationType;

lazy_static! {
    static ref FLAG_ID_REGEX: Regex = Regex::new(r"^[a-zA-Z0-9-]+$").unwrap();
}

const MIN_VARIATIONS: usize = 2;
const MAX_AUDIENCE_PERCENTAGE: u32 = 100;

/// A flag definition that must not be stored.
///
/// Evaluation trusts that stored flags passed these checks.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ValidationError {
    #[error("invalid flag id {0:?}: only letters, digits and '-' are allowed")]
    InvalidFlagId(String),
    #[error("flag {flag_id} has {count} variations, at least 2 are required")]
    TooFewVariations { flag_id: String, count: usize },
    #[error("variation id {0:?} is used more than once")]
    DuplicateVariation(String),
    #[error("value {value:?} of variation {variation_id} is not a valid {variation_type:?}")]
    VariationTypeMismatch {
        variation_id: String,
        value: String,
        variation_type: VariationType,
    },
    #[error("{location} refers to unknown variation {variation_id:?}")]
    UnknownVariation {
        location: String,
        variation_id: String,
    },
    #[error("{location} gives variation {variation_id} negative weight {weight}")]
    NegativeWeight {
        location: String,
        variation_id: String,
        weight: i32,
    },
    #[error("{location} weights sum to {total}, expected 100000")]
    WeightSum { location: String, total: i64 },
    #[error("{location} audience percentage {percentage} is over 100")]
    AudiencePercentage { location: String, percentage: u32 },
    #[error("{location} audience needs a default variation")]
    MissingAudienceDefault { location: String },
    #[error("flag {0} cannot be its own prerequisite")]
    SelfPrerequisite(String),
    #[error("prerequisite flag {0} does not exist")]
    PrerequisiteNotFound(String),
    #[error("prerequisite flag {feature_id} has no variation {variation_id:?}")]
    PrerequisiteVariationNotFound {
        feature_id: String,
        variation_id: String,
    },
    #[error(transparent)]
    Dependency(#[from] Error),
}

/// Check the invariants a single flag must satisfy before it is stored.
pub fn validate_flag(flag: &Flag) -> Result<(), ValidationError> {
    if !FLAG_ID_REGEX.is_match(&flag.id) {
        return Err(ValidationError::InvalidFlagId(flag.id.clone()));
    }
    if flag.variations.len() < MIN_VARIATIONS {
        return Err(ValidationError::TooFewVariations {
            flag_id: flag.id.clone(),
            count: flag.variations.len(),
        });
    }

    let mut ids = HashSet::with_capacity(flag.variations.len());
    for variation in &flag.variations {
        if !ids.insert(variation.id.as_str()) {
            return Err(ValidationError::DuplicateVariation(variation.id.clone()));
        }
        if variation.typed_value(flag.variation_type).is_none() {
            return Err(ValidationError::VariationTypeMismatch {
                variation_id: variation.id.clone(),
                value: variation.value.clone(),
                variation_type: flag.variation_type,
            });
        }
    }

    let known = |location: &str, variation_id: &str| {
        if ids.contains(variation_id) {
            Ok(())
        } else {
            Err(ValidationError::UnknownVariation {
                location: location.to_string(),
                variation_id: variation_id.to_string(),
            })
        }
    };

    if !flag.off_variation.is_empty() {
        known("off variation", &flag.off_variation)?;
    }
    for target in &flag.targets {
        known("target", &target.variation)?;
    }
    validate_strategy("default strategy", &flag.default_strategy, &known)?;
    for rule in &flag.rules {
        validate_strategy(&format!("rule {}", rule.id), &rule.strategy, &known)?;
    }

    if flag.prerequisites.iter().any(|p| p.feature_id == flag.id) {
        return Err(ValidationError::SelfPrerequisite(flag.id.clone()));
    }
    Ok(())
}

fn validate_strategy<F>(location: &str, strategy: &Strategy, known: &F) -> Result<(), ValidationError>
where
    F: Fn(&str, &str) -> Result<(), ValidationError>,
{
    let rollout = match strategy {
        Strategy::Fixed { variation } => return known(location, variation),
        Strategy::Rollout(rollout) => rollout,
    };

    for weighted in &rollout.variations {
        known(location, &weighted.variation)?;
        if weighted.weight < 0 {
            return Err(ValidationError::NegativeWeight {
                location: location.to_string(),
                variation_id: weighted.variation.clone(),
                weight: weighted.weight,
            });
        }
    }
    let total = rollout.total_weight();
    if total != TOTAL_VARIATION_WEIGHT as i64 {
        return Err(ValidationError::WeightSum {
            location: location.to_string(),
            total,
        });
    }

    if let Some(audience) = &rollout.audience {
        if audience.percentage > MAX_AUDIENCE_PERCENTAGE {
            return Err(ValidationError::AudiencePercentage {
                location: location.to_string(),
                percentage: audience.percentage,
            });
        }
        let partial = audience.percentage > 0 && audience.percentage < MAX_AUDIENCE_PERCENTAGE;
        if partial {
            if audience.default_variation.is_empty() {
                return Err(ValidationError::MissingAudienceDefault {
                    location: location.to_string(),
                });
            }
            known(location, &audience.default_variation)?;
        }
    }
    Ok(())
}

/// Check that every prerequisite of `flag` names an existing flag in `flags` and one of its
/// variations.
pub fn validate_prerequisites(flag: &Flag, flags: &[Flag]) -> Result<(), ValidationError> {
    let graph = DependencyGraph::new(flags);
    for prerequisite in &flag.prerequisites {
        if prerequisite.feature_id == flag.id {
            return Err(ValidationError::SelfPrerequisite(flag.id.clone()));
        }
        let upstream = graph
            .get(&prerequisite.feature_id)
            .ok_or_else(|| ValidationError::PrerequisiteNotFound(prerequisite.feature_id.clone()))?;
        if upstream.find_variation(&prerequisite.variation_id).is_err() {
            return Err(ValidationError::PrerequisiteVariationNotFound {
                feature_id: prerequisite.feature_id.clone(),
                variation_id: prerequisite.variation_id.clone(),
            });
        }
    }
    Ok(())
}

/// Check that the dependencies among `flags` are acyclic and closed.
pub fn validate_dependencies(flags: &[Flag]) -> Result<(), ValidationError> {
    DependencyGraph::new(flags).sorted()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flag::{Prerequisite, Target};
    use crate::rule::Rule;
    use crate::strategy::{Audience, RolloutStrategy, WeightedVariation};
    use crate::test_common::variations;
    use crate::variation::Variation;
    use spectral::prelude::*;
    use test_case::test_case;

    fn valid_flag() -> Flag {
        Flag {
            off_variation: "b".into(),
            ..Flag::new("feature-1", variations(&["a", "b"]))
        }
    }

    fn rollout(weights: &[(&str, i32)], audience: Option<Audience>) -> Strategy {
        Strategy::Rollout(RolloutStrategy {
            variations: weights
                .iter()
                .map(|(v, w)| WeightedVariation::new(*v, *w))
                .collect(),
            audience,
        })
    }

    #[test]
    fn valid_flag_passes() {
        let mut flag = valid_flag();
        flag.default_strategy = rollout(&[("a", 50_000), ("b", 50_000)], None);
        flag.targets = vec![Target::new("a", ["qa"])];
        assert_that!(validate_flag(&flag)).is_ok();
    }

    #[test_case("feature_1"; "underscore")]
    #[test_case("feature 1"; "space")]
    #[test_case(""; "empty")]
    fn invalid_ids(id: &str) {
        let flag = Flag {
            id: id.to_string(),
            ..valid_flag()
        };
        assert_that!(validate_flag(&flag))
            .is_err_containing(ValidationError::InvalidFlagId(id.to_string()));
    }

    #[test]
    fn needs_two_variations() {
        let flag = Flag::new("feature-1", variations(&["a"]));
        assert_that!(validate_flag(&flag)).is_err_containing(ValidationError::TooFewVariations {
            flag_id: "feature-1".into(),
            count: 1,
        });
    }

    #[test]
    fn variation_values_must_match_type() {
        let mut flag = valid_flag();
        flag.variation_type = VariationType::Boolean;
        flag.variations = vec![Variation::new("a", "true"), Variation::new("b", "yes")];
        assert_that!(validate_flag(&flag)).is_err_containing(ValidationError::VariationTypeMismatch {
            variation_id: "b".into(),
            value: "yes".into(),
            variation_type: VariationType::Boolean,
        });

        flag.variations[1].value = "false".into();
        assert_that!(validate_flag(&flag)).is_ok();
    }

    #[test]
    fn references_must_resolve() {
        let flag = Flag {
            off_variation: "missing".into(),
            ..valid_flag()
        };
        assert_that!(validate_flag(&flag)).is_err_containing(ValidationError::UnknownVariation {
            location: "off variation".into(),
            variation_id: "missing".into(),
        });

        let mut flag = valid_flag();
        flag.rules = vec![Rule {
            id: "r1".into(),
            clauses: vec![],
            strategy: Strategy::fixed("c"),
        }];
        assert_that!(validate_flag(&flag)).is_err_containing(ValidationError::UnknownVariation {
            location: "rule r1".into(),
            variation_id: "c".into(),
        });
    }

    #[test_case(&[("a", 70_000), ("b", 20_000)], 90_000)]
    #[test_case(&[("a", 70_000), ("b", 40_000)], 110_000)]
    fn weights_must_sum_to_total(weights: &[(&str, i32)], total: i64) {
        let mut flag = valid_flag();
        flag.default_strategy = rollout(weights, None);
        assert_that!(validate_flag(&flag)).is_err_containing(ValidationError::WeightSum {
            location: "default strategy".into(),
            total,
        });
    }

    #[test]
    fn negative_weights_are_rejected() {
        let mut flag = valid_flag();
        flag.default_strategy = rollout(&[("a", 110_000), ("b", -10_000)], None);
        assert_that!(validate_flag(&flag)).is_err_containing(ValidationError::NegativeWeight {
            location: "default strategy".into(),
            variation_id: "b".into(),
            weight: -10_000,
        });
    }

    #[test_case(0, "", true; "zero percent needs no default")]
    #[test_case(100, "", true; "full audience needs no default")]
    #[test_case(50, "a", true; "partial audience with default")]
    #[test_case(50, "", false; "partial audience without default")]
    #[test_case(50, "zzz", false; "partial audience with unknown default")]
    #[test_case(101, "a", false; "over one hundred percent")]
    fn audience(percentage: u32, default_variation: &str, ok: bool) {
        let mut flag = valid_flag();
        flag.default_strategy = rollout(
            &[("a", 50_000), ("b", 50_000)],
            Some(Audience {
                percentage,
                default_variation: default_variation.to_string(),
            }),
        );
        assert_eq!(validate_flag(&flag).is_ok(), ok);
    }

    #[test]
    fn prerequisites() {
        let parent = valid_flag();
        let mut child = Flag::new("feature-2", variations(&["x", "y"]));

        child.prerequisites = vec![Prerequisite::new("feature-1", "a")];
        let all = vec![parent.clone(), child.clone()];
        assert_that!(validate_prerequisites(&child, &all)).is_ok();

        child.prerequisites = vec![Prerequisite::new("feature-1", "nope")];
        assert_that!(validate_prerequisites(&child, &all)).is_err_containing(
            ValidationError::PrerequisiteVariationNotFound {
                feature_id: "feature-1".into(),
                variation_id: "nope".into(),
            },
        );

        child.prerequisites = vec![Prerequisite::new("feature-9", "a")];
        assert_that!(validate_prerequisites(&child, &all))
            .is_err_containing(ValidationError::PrerequisiteNotFound("feature-9".into()));

        child.prerequisites = vec![Prerequisite::new("feature-2", "x")];
        assert_that!(validate_flag(&child))
            .is_err_containing(ValidationError::SelfPrerequisite("feature-2".into()));
    }

    #[test]
    fn dependency_cycles_are_rejected() {
        let mut a = Flag::new("a", variations(&["x", "y"]));
        let mut b = Flag::new("b", variations(&["x", "y"]));
        a.prerequisites = vec![Prerequisite::new("b", "x")];
        assert_that!(validate_dependencies(&[a.clone(), b.clone()])).is_ok();

        b.prerequisites = vec![Prerequisite::new("a", "x")];
        let result = validate_dependencies(&[a, b]);
        assert!(matches!(
            result,
            Err(ValidationError::Dependency(Error::CycleExists { .. }))
        ));
    }

    #[test]
    fn error_messages() {
        assert_eq!(
            ValidationError::WeightSum {
                location: "default strategy".into(),
                total: 90_000
            }
            .to_string(),
            "default strategy weights sum to 90000, expected 100000"
        );
    }
}
