use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The declared type of every variation value of a flag.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VariationType {
    #[default]
    String,
    Boolean,
    Number,
    Json,
}

/// One possible value a flag can resolve to.
///
/// The value is kept in its string encoding, exactly as clients receive it. Use
/// [Variation::typed_value] to interpret it according to the flag's [VariationType].
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Variation {
    pub id: String,
    pub value: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl Variation {
    pub fn new(id: impl Into<String>, value: impl Into<String>) -> Self {
        Variation {
            id: id.into(),
            value: value.into(),
            name: String::new(),
            description: String::new(),
        }
    }

    /// Interpret the string-encoded value as the given type. Returns None (and logs) when
    /// the value does not parse as that type.
    pub fn typed_value(&self, variation_type: VariationType) -> Option<VariationValue> {
        let parsed = VariationValue::parse(&self.value, variation_type);
        if parsed.is_none() {
            warn!(
                "variation {} value {:?} is not a valid {:?}",
                self.id, self.value, variation_type
            );
        }
        parsed
    }
}

/// Look up `variation_id` among a flag's variations.
pub(crate) fn find_variation<'a>(
    flag_id: &str,
    variation_id: &str,
    variations: &'a [Variation],
) -> Result<&'a Variation> {
    variations
        .iter()
        .find(|v| v.id == variation_id)
        .ok_or_else(|| Error::variation_not_found(flag_id, variation_id))
}

/// A decoded variation value.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum VariationValue {
    Bool(bool),
    Number(f64),
    Str(String),
    Json(serde_json::Value),
}

impl VariationValue {
    /// Decode `raw` as `variation_type`.
    ///
    /// Booleans must be exactly `true` or `false`; JSON values must be an object or an
    /// array.
    pub fn parse(raw: &str, variation_type: VariationType) -> Option<VariationValue> {
        match variation_type {
            VariationType::String => Some(VariationValue::Str(raw.to_string())),
            VariationType::Boolean => match raw {
                "true" => Some(VariationValue::Bool(true)),
                "false" => Some(VariationValue::Bool(false)),
                _ => None,
            },
            VariationType::Number => raw.parse::<f64>().ok().map(VariationValue::Number),
            VariationType::Json => match serde_json::from_str::<serde_json::Value>(raw) {
                Ok(v @ serde_json::Value::Object(_)) | Ok(v @ serde_json::Value::Array(_)) => {
                    Some(VariationValue::Json(v))
                }
                _ => None,
            },
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            VariationValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            VariationValue::Number(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            VariationValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl From<bool> for VariationValue {
    fn from(b: bool) -> VariationValue {
        VariationValue::Bool(b)
    }
}

impl From<f64> for VariationValue {
    fn from(f: f64) -> VariationValue {
        VariationValue::Number(f)
    }
}

impl From<String> for VariationValue {
    fn from(s: String) -> VariationValue {
        VariationValue::Str(s)
    }
}

impl From<serde_json::Value> for VariationValue {
    fn from(v: serde_json::Value) -> Self {
        VariationValue::Json(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use spectral::prelude::*;
    use test_case::test_case;

    #[test_case("true", Some(VariationValue::Bool(true)))]
    #[test_case("false", Some(VariationValue::Bool(false)))]
    #[test_case("True", None; "boolean is case sensitive")]
    #[test_case("1", None; "numeric booleans are rejected")]
    fn parse_boolean(raw: &str, expected: Option<VariationValue>) {
        assert_eq!(VariationValue::parse(raw, VariationType::Boolean), expected);
    }

    #[test_case("1", Some(1.0))]
    #[test_case("-2.5", Some(-2.5))]
    #[test_case("1e3", Some(1000.0))]
    #[test_case("one", None)]
    fn parse_number(raw: &str, expected: Option<f64>) {
        assert_eq!(
            VariationValue::parse(raw, VariationType::Number).and_then(|v| v.as_f64()),
            expected
        );
    }

    #[test]
    fn parse_json_requires_object_or_array() {
        assert_that!(VariationValue::parse(r#"{"a": 1}"#, VariationType::Json))
            .contains_value(VariationValue::Json(json!({"a": 1})));
        assert_that!(VariationValue::parse("[1, 2]", VariationType::Json))
            .contains_value(VariationValue::Json(json!([1, 2])));
        assert_that!(VariationValue::parse("42", VariationType::Json)).is_none();
        assert_that!(VariationValue::parse("{broken", VariationType::Json)).is_none();
    }

    #[test]
    fn strings_always_parse() {
        let variation = Variation::new("v1", "anything at all");
        assert_that!(variation.typed_value(VariationType::String))
            .contains_value(VariationValue::Str("anything at all".into()));
    }

    #[test]
    fn deserialize_variation() {
        let variation: Variation =
            serde_json::from_str(r#"{"id": "v1", "value": "true", "name": "On"}"#).unwrap();
        assert_eq!(variation.id, "v1");
        assert_eq!(variation.name, "On");
        assert_eq!(variation.description, "");
        assert_that!(variation.typed_value(VariationType::Boolean).and_then(|v| v.as_bool()))
            .contains_value(true);
    }
}
