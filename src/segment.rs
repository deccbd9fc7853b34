use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Whether a user was added to or removed from a segment.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SegmentUserState {
    #[default]
    Included,
    Excluded,
}

/// One user's membership record in a segment.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentUser {
    #[serde(default)]
    pub id: String,
    pub segment_id: String,
    pub user_id: String,
    #[serde(default)]
    pub state: SegmentUserState,
    #[serde(default)]
    pub deleted: bool,
}

impl SegmentUser {
    pub fn included(segment_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        let segment_id = segment_id.into();
        let user_id = user_id.into();
        SegmentUser {
            id: format!("{}:{}", segment_id, user_id),
            segment_id,
            user_id,
            state: SegmentUserState::Included,
            deleted: false,
        }
    }

    fn includes(&self, segment_id: &str, user_id: &str) -> bool {
        !self.deleted
            && self.state == SegmentUserState::Included
            && self.segment_id == segment_id
            && self.user_id == user_id
    }
}

/// SegmentStore is the source of segment membership records used while evaluating SEGMENT
/// clauses.
///
/// The evaluator is handed a consistent snapshot; the usual implementation is a map from
/// segment id to the records of that segment.
pub trait SegmentStore {
    /// Membership records of the segment with id `segment_id`, or an empty slice.
    fn segment_users(&self, segment_id: &str) -> &[SegmentUser];
}

impl SegmentStore for HashMap<String, Vec<SegmentUser>> {
    fn segment_users(&self, segment_id: &str) -> &[SegmentUser] {
        self.get(segment_id).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// A store with no segments.
impl SegmentStore for () {
    fn segment_users(&self, _segment_id: &str) -> &[SegmentUser] {
        &[]
    }
}

/// True if the user is an active, included member of every one of `segment_ids`.
///
/// An empty list of segment ids is satisfied vacuously.
pub fn evaluate_segments<S: AsRef<str>>(
    segment_ids: &[S],
    user_id: &str,
    store: &dyn SegmentStore,
) -> bool {
    segment_ids.iter().all(|segment_id| {
        let segment_id = segment_id.as_ref();
        store
            .segment_users(segment_id)
            .iter()
            .any(|member| member.includes(segment_id, user_id))
    })
}
