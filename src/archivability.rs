use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::flag::Flag;

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// What a flag must satisfy to be archived automatically.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchivabilityCriteria {
    /// Minimum number of whole days since SDKs last used the flag.
    pub unused_days_threshold: i32,
    /// Block flags that are still referenced from source code.
    pub check_code_references: bool,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockingReason {
    AlreadyArchived,
    NeverUsed,
    NotUnusedLongEnough,
    HasCodeReferences,
    HasDependencies,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchivabilityResult {
    pub feature_id: String,
    pub is_archivable: bool,
    pub unused_days: i32,
    pub code_ref_count: i64,
    /// Empty when the flag is archivable.
    pub blocking_reasons: Vec<BlockingReason>,
}

/// Decide for each flag whether it can be archived.
///
/// `code_ref_counts` maps flag ids to the number of code references found for them; it is
/// only consulted when `criteria.check_code_references` is set. A flag is blocked when
/// any other flag in `flags` depends on it, whether by prerequisite or FEATURE_FLAG
/// clause.
pub fn evaluate_archivability(
    flags: &[Flag],
    criteria: &ArchivabilityCriteria,
    code_ref_counts: &HashMap<String, i64>,
    now: i64,
) -> Vec<ArchivabilityResult> {
    let depended_on: HashSet<&str> = flags.iter().flat_map(|f| f.dependency_ids()).collect();

    flags
        .iter()
        .map(|flag| {
            let mut result = ArchivabilityResult {
                feature_id: flag.id.clone(),
                is_archivable: true,
                unused_days: 0,
                code_ref_count: 0,
                blocking_reasons: Vec::new(),
            };

            if flag.archived {
                result.blocking_reasons.push(BlockingReason::AlreadyArchived);
            }

            match &flag.last_used_info {
                Some(info) if info.last_used_at != 0 => {
                    result.unused_days = unused_days(info.last_used_at, now);
                    if result.unused_days < criteria.unused_days_threshold {
                        result.blocking_reasons.push(BlockingReason::NotUnusedLongEnough);
                    }
                }
                _ => result.blocking_reasons.push(BlockingReason::NeverUsed),
            }

            if criteria.check_code_references {
                result.code_ref_count = code_ref_counts.get(&flag.id).copied().unwrap_or(0);
                if result.code_ref_count > 0 {
                    result.blocking_reasons.push(BlockingReason::HasCodeReferences);
                }
            }

            if depended_on.contains(flag.id.as_str()) {
                result.blocking_reasons.push(BlockingReason::HasDependencies);
            }

            result.is_archivable = result.blocking_reasons.is_empty();
            result
        })
        .collect()
}

/// Whole days between `last_used_at` and `now`; zero if `last_used_at` is in the future.
pub fn unused_days(last_used_at: i64, now: i64) -> i32 {
    let days = (now - last_used_at).max(0) / SECONDS_PER_DAY;
    i32::try_from(days).unwrap_or(i32::MAX)
}

pub fn archivable_flag_ids(results: &[ArchivabilityResult]) -> Vec<&str> {
    results
        .iter()
        .filter(|r| r.is_archivable)
        .map(|r| r.feature_id.as_str())
        .collect()
}
