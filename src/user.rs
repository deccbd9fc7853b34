use std::collections::HashMap;

use serde::{Deserialize, Serialize};

const USER_DATA_STARTING_CAPACITY: usize = 10;

/// The attribute name that clauses use to refer to [User::id] instead of an entry in
/// [User::data].
pub const ID_ATTRIBUTE: &str = "id";

/// A user being evaluated: an id plus string-valued attributes supplied by the SDK.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub data: HashMap<String, String>,
}

impl User {
    /// Start building a user with the given id.
    pub fn with_id(id: impl Into<String>) -> UserBuilder {
        UserBuilder::new(id)
    }

    /// The value a clause attribute resolves to for this user.
    ///
    /// `"id"` resolves to the user id. Any other attribute resolves to the matching entry
    /// in [User::data], or the empty string when the user does not carry it.
    pub fn value_of(&self, attribute: &str) -> &str {
        if attribute == ID_ATTRIBUTE {
            return &self.id;
        }
        self.data.get(attribute).map(String::as_str).unwrap_or("")
    }
}

pub struct UserBuilder {
    id: String,
    data: HashMap<String, String>,
}

impl UserBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            data: HashMap::with_capacity(USER_DATA_STARTING_CAPACITY),
        }
    }

    pub fn attribute(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn data(&mut self, data: HashMap<String, String>) -> &mut Self {
        self.data.extend(data);
        self
    }

    pub fn build(&self) -> User {
        User {
            id: self.id.clone(),
            data: self.data.clone(),
        }
    }
}
