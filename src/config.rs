use serde::Deserialize;

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// Tunable time windows used by the evaluator.
///
/// All values are in seconds. Missing fields fall back to their defaults when
/// deserializing, so a partial configuration such as `{"clockSkewAdjustmentSecs": 30}` is
/// accepted.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct EvaluatorConfig {
    /// A client whose last evaluation is older than this gets a full re-evaluation.
    pub reevaluate_all_after_secs: i64,
    /// Subtracted from a client's `evaluatedAt` to absorb clock skew between servers.
    pub clock_skew_adjustment_secs: i64,
    /// Archived flags are reported to clients for this long after being archived.
    pub archived_retention_secs: i64,
    /// A flag not used for this long is considered stale.
    pub stale_after_secs: i64,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            reevaluate_all_after_secs: 30 * SECONDS_PER_DAY,
            clock_skew_adjustment_secs: 10,
            archived_retention_secs: 30 * SECONDS_PER_DAY,
            stale_after_secs: 90 * SECONDS_PER_DAY,
        }
    }
}
