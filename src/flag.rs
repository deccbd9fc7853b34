use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::rule::{Operator, Rule};
use crate::strategy::Strategy;
use crate::variation::{find_variation, Variation, VariationType};

/// A feature flag definition, as stored by the flag management service.
///
/// Timestamps are unix seconds. An empty [Flag::off_variation] means no off variation is
/// configured.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Flag {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: i32,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub off_variation: String,
    #[serde(default)]
    pub variation_type: VariationType,
    pub variations: Vec<Variation>,
    #[serde(default)]
    pub rules: Vec<Rule>,
    pub default_strategy: Strategy,
    #[serde(default)]
    pub prerequisites: Vec<Prerequisite>,
    #[serde(default)]
    pub targets: Vec<Target>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub archived: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived_at: Option<i64>,
    #[serde(default)]
    pub updated_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used_info: Option<LastUsedInfo>,
    #[serde(default)]
    pub sampling_seed: String,
}

/// Another flag that must resolve to `variation_id` before this flag's own targeting
/// applies.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Prerequisite {
    pub feature_id: String,
    pub variation_id: String,
}

/// Users pinned to a variation.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub struct Target {
    pub variation: String,
    #[serde(default)]
    pub users: Vec<String>,
}

/// When SDKs last reported evaluating the flag.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LastUsedInfo {
    #[serde(default)]
    pub feature_id: String,
    #[serde(default)]
    pub version: i32,
    pub last_used_at: i64,
    #[serde(default)]
    pub created_at: i64,
}

impl Prerequisite {
    pub fn new(feature_id: impl Into<String>, variation_id: impl Into<String>) -> Self {
        Prerequisite {
            feature_id: feature_id.into(),
            variation_id: variation_id.into(),
        }
    }
}

impl Target {
    pub fn new<U: Into<String>>(
        variation: impl Into<String>,
        users: impl IntoIterator<Item = U>,
    ) -> Self {
        Target {
            variation: variation.into(),
            users: users.into_iter().map(Into::into).collect(),
        }
    }
}

impl Flag {
    /// A minimal enabled flag serving `variations[0]` by default.
    pub fn new(id: impl Into<String>, variations: Vec<Variation>) -> Self {
        let default_variation = variations.first().map(|v| v.id.clone()).unwrap_or_default();
        Flag {
            id: id.into(),
            name: String::new(),
            version: 1,
            enabled: true,
            off_variation: String::new(),
            variation_type: VariationType::String,
            variations,
            rules: Vec::new(),
            default_strategy: Strategy::fixed(default_variation),
            prerequisites: Vec::new(),
            targets: Vec::new(),
            tags: Vec::new(),
            archived: false,
            archived_at: None,
            updated_at: 0,
            last_used_info: None,
            sampling_seed: String::new(),
        }
    }

    pub fn find_variation(&self, variation_id: &str) -> Result<&Variation> {
        find_variation(&self.id, variation_id, &self.variations)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Distinct segment ids referenced by SEGMENT clauses, in first-seen order.
    pub fn segment_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = Vec::new();
        for clause in self.rules.iter().flat_map(|r| &r.clauses) {
            if clause.operator != Operator::Segment {
                continue;
            }
            for value in &clause.values {
                if !ids.contains(&value.as_str()) {
                    ids.push(value);
                }
            }
        }
        ids
    }

    /// Ids of the flags this flag reads: its prerequisites, then the flags referenced by
    /// FEATURE_FLAG clauses. Duplicates are removed.
    pub fn dependency_ids(&self) -> Vec<&str> {
        let prerequisites = self.prerequisites.iter().map(|p| p.feature_id.as_str());
        let clauses = self
            .rules
            .iter()
            .flat_map(|r| &r.clauses)
            .filter(|c| c.operator == Operator::FeatureFlag)
            .map(|c| c.attribute.as_str());

        let mut ids: Vec<&str> = Vec::new();
        for id in prerequisites.chain(clauses) {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        ids
    }

    /// The time the flag was archived, falling back to its last update for records that
    /// predate `archived_at`. None if the flag is not archived.
    pub fn archived_time(&self) -> Option<i64> {
        if !self.archived {
            return None;
        }
        Some(self.archived_at.unwrap_or(self.updated_at))
    }

    /// True if the flag was archived more than `retention_secs` before `now`.
    pub fn is_archived_before(&self, now: i64, retention_secs: i64) -> bool {
        match self.archived_time() {
            Some(archived_at) => archived_at < now - retention_secs,
            None => false,
        }
    }

    /// True if SDKs have not used the flag for at least `stale_after_secs`. A flag with no
    /// usage record is not stale.
    pub fn is_stale(&self, now: i64, stale_after_secs: i64) -> bool {
        match &self.last_used_info {
            Some(info) => now - info.last_used_at >= stale_after_secs,
            None => false,
        }
    }

    pub fn is_disabled_and_off_variation_empty(&self) -> bool {
        !self.enabled && self.off_variation.is_empty()
    }

    /// The variation the user is pinned to by a target, if any.
    pub fn target_variation(&self, user_id: &str) -> Option<&str> {
        self.targets
            .iter()
            .find(|t| t.users.iter().any(|u| u == user_id))
            .map(|t| t.variation.as_str())
    }
}
