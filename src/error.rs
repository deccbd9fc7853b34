use thiserror::Error as ThisError;

/// Error is returned when a snapshot of flags cannot be evaluated at all.
///
/// Every variant describes a structural problem with the flag data (a dependency cycle, a
/// dangling reference, a missing variation). Evaluating the same snapshot again cannot
/// succeed, so callers should surface these instead of retrying.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum Error {
    /// The flags' prerequisites or FEATURE_FLAG clauses form a cycle.
    #[error("cycle exists in flag dependencies (detected at {flag_id})")]
    CycleExists {
        /// The flag at which the back edge was found.
        flag_id: String,
    },
    /// A flag depends on a flag which is not part of the snapshot.
    #[error("flag not found: {flag_id}")]
    FlagNotFound {
        /// The id of the referenced flag.
        flag_id: String,
    },
    /// A flag refers to a variation it does not define, or a rollout did not cover the
    /// computed bucket.
    #[error("variation {variation_id:?} not found in flag {flag_id}")]
    VariationNotFound {
        /// The flag being evaluated.
        flag_id: String,
        /// The variation id that could not be resolved. Empty when the flag has no
        /// off variation configured or the rollout did not cover the bucket.
        variation_id: String,
    },
}

impl Error {
    pub(crate) fn variation_not_found(flag_id: &str, variation_id: &str) -> Self {
        Error::VariationNotFound {
            flag_id: flag_id.to_string(),
            variation_id: variation_id.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_name_the_offending_ids() {
        let err = Error::variation_not_found("flag-a", "v1");
        assert_eq!(
            err.to_string(),
            r#"variation "v1" not found in flag flag-a"#
        );

        let err = Error::FlagNotFound {
            flag_id: "missing".into(),
        };
        assert_eq!(err.to_string(), "flag not found: missing");
    }
}
