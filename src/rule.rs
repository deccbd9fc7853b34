use std::cmp::Ordering;
use std::collections::HashMap;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::segment::{evaluate_segments, SegmentStore};
use crate::strategy::Strategy;
use crate::user::User;

/// A targeting rule: when every clause matches, the user is served by `strategy`.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub id: String,
    #[serde(default)]
    pub clauses: Vec<Clause>,
    pub strategy: Strategy,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Clause {
    #[serde(default)]
    pub id: String,
    /// The user attribute to test. Empty for [Operator::Segment]; the referenced flag id
    /// for [Operator::FeatureFlag].
    #[serde(default)]
    pub attribute: String,
    pub operator: Operator,
    #[serde(default)]
    pub values: Vec<String>,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operator {
    Equals,
    In,
    PartiallyMatch,
    StartsWith,
    EndsWith,
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
    Before,
    After,
    Segment,
    FeatureFlag,
}

impl Clause {
    pub fn new<V: Into<String>>(
        attribute: impl Into<String>,
        operator: Operator,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Clause {
            id: String::new(),
            attribute: attribute.into(),
            operator,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Test `target_value` (the user's value of [Clause::attribute]) against this clause.
    ///
    /// `flag_variations` maps the ids of flags already evaluated for this user to the
    /// variation they resolved to.
    pub fn evaluate(
        &self,
        target_value: &str,
        user_id: &str,
        segments: &dyn SegmentStore,
        flag_variations: &HashMap<String, String>,
    ) -> bool {
        match self.operator {
            Operator::Equals | Operator::In => self.values.iter().any(|v| v == target_value),
            Operator::PartiallyMatch => self.values.iter().any(|v| target_value.contains(v.as_str())),
            Operator::StartsWith => self
                .values
                .iter()
                .any(|v| target_value.starts_with(v.as_str())),
            Operator::EndsWith => self.values.iter().any(|v| target_value.ends_with(v.as_str())),

            Operator::Greater => self.compare_any(target_value, Ordering::is_gt),
            Operator::GreaterOrEqual => self.compare_any(target_value, Ordering::is_ge),
            Operator::Less => self.compare_any(target_value, Ordering::is_lt),
            Operator::LessOrEqual => self.compare_any(target_value, Ordering::is_le),

            Operator::Before => self.timestamp_any(target_value, |t, v| t < v),
            Operator::After => self.timestamp_any(target_value, |t, v| t > v),

            Operator::Segment => evaluate_segments(&self.values, user_id, segments),
            Operator::FeatureFlag => match flag_variations.get(&self.attribute) {
                Some(variation_id) => self.values.contains(variation_id),
                None => false,
            },
        }
    }

    /// Ordered comparison with a fixed parse priority: numbers, then semantic versions,
    /// then plain strings. The representation is chosen by the target; values that do
    /// not parse the same way are skipped.
    fn compare_any<F: Fn(Ordering) -> bool>(&self, target_value: &str, accept: F) -> bool {
        if let Ok(target) = target_value.parse::<f64>() {
            return self.values.iter().any(|v| match v.parse::<f64>() {
                Ok(value) => target.partial_cmp(&value).map_or(false, &accept),
                Err(_) => {
                    debug!("skipping non-numeric clause value {:?}", v);
                    false
                }
            });
        }

        if let Some(target) = parse_semver(target_value) {
            return self.values.iter().any(|v| match parse_semver(v) {
                Some(value) => accept(target.cmp(&value)),
                None => {
                    debug!("skipping non-semver clause value {:?}", v);
                    false
                }
            });
        }

        self.values
            .iter()
            .any(|v| accept(target_value.cmp(v.as_str())))
    }

    fn timestamp_any<F: Fn(i64, i64) -> bool>(&self, target_value: &str, accept: F) -> bool {
        let target = match target_value.parse::<i64>() {
            Ok(t) => t,
            Err(_) => return false,
        };
        self.values
            .iter()
            .filter_map(|v| v.parse::<i64>().ok())
            .any(|value| accept(target, value))
    }
}

/// Parse a strict `MAJOR.MINOR.PATCH` semantic version. Build metadata is dropped so it
/// does not take part in comparisons. A `v`-prefixed value is not a version; it is
/// compared as a plain string, as every SDK does.
fn parse_semver(s: &str) -> Option<semver::Version> {
    semver::Version::parse(s).ok().map(|mut version| {
        version.build = semver::BuildMetadata::EMPTY;
        version
    })
}

impl Rule {
    /// A rule matches if all of its clauses do.
    pub fn matches(
        &self,
        user: &User,
        segments: &dyn SegmentStore,
        flag_variations: &HashMap<String, String>,
    ) -> bool {
        self.clauses.iter().all(|clause| {
            clause.evaluate(
                user.value_of(&clause.attribute),
                &user.id,
                segments,
                flag_variations,
            )
        })
    }
}

/// The first rule, in stored order, that matches the user.
pub fn evaluate_rules<'a>(
    rules: &'a [Rule],
    user: &User,
    segments: &dyn SegmentStore,
    flag_variations: &HashMap<String, String>,
) -> Option<&'a Rule> {
    rules
        .iter()
        .find(|rule| rule.matches(user, segments, flag_variations))
}
