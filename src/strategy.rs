use log::warn;
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::variation::{find_variation, Variation};

/// Rollout weights are fixed-point percentages: 100,000 is 100%.
pub const TOTAL_VARIATION_WEIGHT: i32 = 100_000;

const BUCKET_SCALE: f64 = u64::MAX as f64;

/// Strategy decides which variation a user receives once a flag's rules (or its default)
/// have been selected.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Strategy {
    /// Always serve one variation.
    Fixed { variation: String },
    /// Split users across variations by weight.
    Rollout(RolloutStrategy),
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RolloutStrategy {
    pub variations: Vec<WeightedVariation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience: Option<Audience>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub struct WeightedVariation {
    pub variation: String,
    pub weight: i32,
}

/// Limits a rollout to a percentage of users; everyone else gets `default_variation`.
///
/// The audience is validated when the flag is changed (see
/// [crate::validation::validate_flag]). Bucketing itself does not apply it.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Audience {
    pub percentage: u32,
    #[serde(default)]
    pub default_variation: String,
}

impl WeightedVariation {
    pub fn new(variation: impl Into<String>, weight: i32) -> Self {
        WeightedVariation {
            variation: variation.into(),
            weight,
        }
    }
}

impl Strategy {
    pub fn fixed(variation: impl Into<String>) -> Self {
        Strategy::Fixed {
            variation: variation.into(),
        }
    }

    pub fn rollout<V: Into<Vec<WeightedVariation>>>(variations: V) -> Self {
        Strategy::Rollout(RolloutStrategy {
            variations: variations.into(),
            audience: None,
        })
    }

    /// Resolve this strategy to one of `variations` for `user_id`.
    pub fn resolve<'a>(
        &self,
        user_id: &str,
        variations: &'a [Variation],
        flag_id: &str,
        sampling_seed: &str,
    ) -> Result<&'a Variation> {
        match self {
            Strategy::Fixed { variation } => find_variation(flag_id, variation, variations),
            Strategy::Rollout(rollout) => rollout.resolve(user_id, variations, flag_id, sampling_seed),
        }
    }

    /// Every variation id this strategy refers to, including a rollout audience's default
    /// variation when one is set.
    pub fn variation_ids(&self) -> Vec<&str> {
        match self {
            Strategy::Fixed { variation } => vec![variation.as_str()],
            Strategy::Rollout(rollout) => rollout
                .variations
                .iter()
                .map(|v| v.variation.as_str())
                .chain(
                    rollout
                        .audience
                        .iter()
                        .map(|a| a.default_variation.as_str())
                        .filter(|id| !id.is_empty()),
                )
                .collect(),
        }
    }
}

impl RolloutStrategy {
    pub fn total_weight(&self) -> i64 {
        self.variations.iter().map(|v| v.weight as i64).sum()
    }

    fn resolve<'a>(
        &self,
        user_id: &str,
        variations: &'a [Variation],
        flag_id: &str,
        sampling_seed: &str,
    ) -> Result<&'a Variation> {
        #[cfg(feature = "strict_rollout_weights")]
        if self.total_weight() != TOTAL_VARIATION_WEIGHT as i64 {
            warn!(
                "rollout weights of flag {} sum to {}, refusing to bucket",
                flag_id,
                self.total_weight()
            );
            return Err(Error::variation_not_found(flag_id, ""));
        }

        let position = bucket(flag_id, user_id, sampling_seed);
        let mut sum = 0.0;
        for weighted in &self.variations {
            sum += weighted.weight as f64 / TOTAL_VARIATION_WEIGHT as f64;
            if position < sum {
                return find_variation(flag_id, &weighted.variation, variations);
            }
        }
        warn!(
            "rollout of flag {} does not cover bucket {} (total weight {})",
            flag_id,
            position,
            self.total_weight()
        );
        Err(Error::variation_not_found(flag_id, ""))
    }
}

/// The user's position in `[0, 1)` for a flag.
///
/// The hash input is `{flag_id}-{user_id}{sampling_seed}` and the bucket is the first
/// eight bytes of its MD5 digest read as a big-endian integer. SDKs in other languages
/// compute the same value, so this layout must not change.
pub fn bucket(flag_id: &str, user_id: &str, sampling_seed: &str) -> f64 {
    let mut hash = Md5::new();
    hash.update(flag_id.as_bytes());
    hash.update(b"-");
    hash.update(user_id.as_bytes());
    hash.update(sampling_seed.as_bytes());
    let digest = hash.finalize();

    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(prefix) as f64 / BUCKET_SCALE
}
