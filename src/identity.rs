use std::collections::HashMap;
use std::hash::Hasher;

use fnv::FnvHasher;
use itertools::Itertools;

use crate::flag::Flag;

/// Fingerprint of the inputs to a user's evaluation set.
///
/// The hash covers the user id, the user's attributes in key order, and `id:version` of
/// every flag in id order, so it changes whenever any input that could change an
/// evaluation changes. Clients send it back on their next request to detect that their
/// cached evaluations are still current.
pub fn user_evaluations_id<'a, I>(user_id: &str, user_data: &HashMap<String, String>, flags: I) -> String
where
    I: IntoIterator<Item = &'a Flag>,
{
    let mut hasher = FnvHasher::default();
    hasher.write(user_id.as_bytes());
    for (key, value) in user_data.iter().sorted_by(|a, b| a.0.cmp(b.0)) {
        hasher.write(key.as_bytes());
        hasher.write(value.as_bytes());
    }
    for flag in flags.into_iter().sorted_by(|a, b| a.id.cmp(&b.id)) {
        hasher.write(format!("{}:{}", flag.id, flag.version).as_bytes());
    }
    hasher.finish().to_string()
}
