#![cfg(test)]

use std::collections::HashMap;

use maplit::hashmap;
use serde_json::json;

use crate::flag::Flag;
use crate::segment::SegmentUser;
use crate::variation::Variation;

pub const NOW: i64 = 1_700_000_000;

const DAY: i64 = 24 * 60 * 60;

/// Variations with the given ids, valued `value-{id}` and named `name-{id}`.
pub fn variations(ids: &[&str]) -> Vec<Variation> {
    ids.iter()
        .map(|id| Variation {
            name: format!("name-{}", id),
            ..Variation::new(*id, format!("value-{}", id))
        })
        .collect()
}

pub fn flag_from_json(json: &str) -> Flag {
    serde_json::from_str(json).expect("flag JSON should parse")
}

pub fn segment_store() -> HashMap<String, Vec<SegmentUser>> {
    hashmap! {
        "beta".to_string() => vec![SegmentUser::included("beta", "beta-user")],
    }
}

/// A small environment exercising every evaluation path. Flags are deliberately listed
/// out of dependency order.
pub fn snapshot() -> Vec<Flag> {
    let updated_at = NOW - 100_000;
    let flags = json!([
        {
            "id": "feature-flag-dep",
            "version": 1,
            "enabled": true,
            "variations": [{"id": "d-yes", "value": "yes"}, {"id": "d-no", "value": "no"}],
            "rules": [{
                "id": "rule-child-b",
                "clauses": [{"attribute": "feature-child", "operator": "FEATURE_FLAG", "values": ["c-b"]}],
                "strategy": {"type": "FIXED", "variation": "d-yes"}
            }],
            "defaultStrategy": {"type": "FIXED", "variation": "d-no"},
            "tags": ["web"],
            "updatedAt": updated_at
        },
        {
            "id": "feature-child",
            "version": 1,
            "enabled": true,
            "offVariation": "c-b",
            "variations": [{"id": "c-a", "value": "a"}, {"id": "c-b", "value": "b"}],
            "prerequisites": [{"featureId": "feature-parent", "variationId": "p-on"}],
            "targets": [{"variation": "c-b", "users": ["user-targeted"]}],
            "rules": [{
                "id": "rule-country",
                "clauses": [{"attribute": "country", "operator": "IN", "values": ["jp"]}],
                "strategy": {"type": "FIXED", "variation": "c-b"}
            }],
            "defaultStrategy": {"type": "FIXED", "variation": "c-a"},
            "tags": ["web", "ios"],
            "updatedAt": updated_at
        },
        {
            "id": "feature-parent",
            "version": 1,
            "enabled": true,
            "offVariation": "p-off",
            "variationType": "BOOLEAN",
            "variations": [{"id": "p-on", "value": "true"}, {"id": "p-off", "value": "false"}],
            "defaultStrategy": {"type": "FIXED", "variation": "p-on"},
            "tags": ["web"],
            "updatedAt": updated_at
        },
        {
            "id": "feature-segment",
            "version": 1,
            "enabled": true,
            "variations": [{"id": "s-in", "value": "in"}, {"id": "s-out", "value": "out"}],
            "rules": [{
                "id": "rule-beta",
                "clauses": [{"operator": "SEGMENT", "values": ["beta"]}],
                "strategy": {"type": "FIXED", "variation": "s-in"}
            }],
            "defaultStrategy": {"type": "FIXED", "variation": "s-out"},
            "tags": ["ios"],
            "updatedAt": updated_at
        },
        {
            "id": "F1",
            "version": 2,
            "enabled": true,
            "variations": [
                {"id": "A", "value": "a", "name": "Variation A"},
                {"id": "B", "value": "b", "name": "Variation B"}
            ],
            "defaultStrategy": {
                "type": "ROLLOUT",
                "variations": [{"variation": "A", "weight": 70000}, {"variation": "B", "weight": 30000}]
            },
            "tags": ["web"],
            "updatedAt": updated_at,
            "lastUsedInfo": {"featureId": "F1", "version": 2, "lastUsedAt": NOW - DAY},
            "samplingSeed": ""
        },
        {
            "id": "feature-archived-recent",
            "version": 1,
            "enabled": true,
            "variations": [{"id": "on", "value": "on"}, {"id": "off", "value": "off"}],
            "defaultStrategy": {"type": "FIXED", "variation": "on"},
            "archived": true,
            "archivedAt": NOW - DAY,
            "updatedAt": updated_at
        },
        {
            "id": "feature-archived-old",
            "version": 1,
            "enabled": true,
            "variations": [{"id": "on", "value": "on"}, {"id": "off", "value": "off"}],
            "defaultStrategy": {"type": "FIXED", "variation": "on"},
            "archived": true,
            "archivedAt": NOW - 40 * DAY,
            "updatedAt": updated_at
        },
        {
            "id": "feature-disabled",
            "version": 1,
            "enabled": false,
            "offVariation": "off",
            "variations": [{"id": "on", "value": "on"}, {"id": "off", "value": "off"}],
            "defaultStrategy": {"type": "FIXED", "variation": "on"},
            "updatedAt": updated_at,
            "lastUsedInfo": {"featureId": "feature-disabled", "lastUsedAt": NOW - 100 * DAY}
        }
    ]);
    serde_json::from_value(flags).expect("snapshot should parse")
}
