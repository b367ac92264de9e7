//! Typed decoders for raw parameter elements.
//!
//! Each declared type tag resolves to a [`Decoder`]; decoding one raw element
//! yields the typed value or a [`DecodeFailure`] naming the offending custom
//! sub-attribute, if any.

use serde_json::Value;

use super::spec::{CustomShape, FieldType, ParamType, ValidationSpec};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodeFailure {
    pub sub_attr: Option<String>,
}

impl DecodeFailure {
    fn invalid() -> Self {
        Self::default()
    }

    fn at(sub_attr: &str) -> Self {
        Self { sub_attr: Some(sub_attr.to_string()) }
    }
}

pub type Decoded = Result<Value, DecodeFailure>;

#[derive(Debug, Clone, Copy)]
pub enum Decoder<'a> {
    String,
    Number,
    Boolean,
    Custom(&'a CustomShape),
    /// A custom type with no declared shape; nothing decodes.
    Unresolved,
}

impl<'a> Decoder<'a> {
    pub fn for_type(param_type: &ParamType, spec: &'a ValidationSpec) -> Self {
        match param_type {
            ParamType::String => Decoder::String,
            ParamType::Number => Decoder::Number,
            ParamType::Boolean => Decoder::Boolean,
            ParamType::Custom(name) => spec
                .get_custom(name)
                .map(Decoder::Custom)
                .unwrap_or(Decoder::Unresolved),
        }
    }

    pub fn decode(&self, raw: &Value) -> Decoded {
        match self {
            Decoder::String => match raw {
                Value::String(_) => Ok(raw.clone()),
                _ => Err(DecodeFailure::invalid()),
            },
            Decoder::Number => parse_integer(raw)
                .map(|n| Value::Number(n.into()))
                .ok_or_else(DecodeFailure::invalid),
            Decoder::Boolean => match raw.as_str() {
                Some("true") => Ok(Value::Bool(true)),
                Some("false") => Ok(Value::Bool(false)),
                _ => Err(DecodeFailure::invalid()),
            },
            Decoder::Custom(shape) => decode_custom(shape, raw),
            Decoder::Unresolved => Err(DecodeFailure::invalid()),
        }
    }
}

fn decode_custom(shape: &CustomShape, raw: &Value) -> Decoded {
    let obj = raw.as_object();
    for (field, field_type) in shape.fields() {
        let value = obj.and_then(|o| o.get(field)).unwrap_or(&Value::Null);
        let valid = match field_type {
            FieldType::String => value.is_string(),
            FieldType::Number => value.is_number(),
            FieldType::Boolean => value.is_boolean(),
            FieldType::Array => value
                .as_array()
                .is_some_and(|items| items.iter().all(|item| parse_integer(item).is_some())),
        };
        if !valid {
            return Err(DecodeFailure::at(field));
        }
    }
    Ok(raw.clone())
}

/// Leading-integer parse: skips leading whitespace, accepts a sign and a
/// `0x` prefix, and reads digits up to the first non-digit. Numbers are
/// truncated toward zero. Anything without a leading digit is rejected.
pub fn parse_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(i)
            } else {
                let f = n.as_f64()?;
                (f.is_finite() && f.abs() < i64::MAX as f64).then(|| f.trunc() as i64)
            }
        }
        Value::String(s) => parse_integer_str(s),
        _ => None,
    }
}

fn parse_integer_str(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (negative, rest) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let (radix, digits) = match rest.get(..2) {
        Some("0x") | Some("0X") => (16, &rest[2..]),
        _ => (10, rest),
    };

    let end = digits
        .char_indices()
        .find(|(_, c)| !c.is_digit(radix))
        .map(|(i, _)| i)
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }

    let magnitude = i64::from_str_radix(&digits[..end], radix).ok()?;
    Some(if negative { -magnitude } else { magnitude })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn integer_parse_reads_leading_digits() {
        assert_eq!(parse_integer(&json!("101")), Some(101));
        assert_eq!(parse_integer(&json!("  42abc")), Some(42));
        assert_eq!(parse_integer(&json!("-7")), Some(-7));
        assert_eq!(parse_integer(&json!("0x1A")), Some(26));
        assert_eq!(parse_integer(&json!(3.9)), Some(3));
        assert_eq!(parse_integer(&json!(12)), Some(12));
        assert_eq!(parse_integer(&json!("abc")), None);
        assert_eq!(parse_integer(&json!("")), None);
        assert_eq!(parse_integer(&json!("-")), None);
        assert_eq!(parse_integer(&json!(true)), None);
        assert_eq!(parse_integer(&Value::Null), None);
    }

    #[test]
    fn boolean_accepts_only_literal_strings() {
        let decoder = Decoder::Boolean;
        assert_eq!(decoder.decode(&json!("true")), Ok(json!(true)));
        assert_eq!(decoder.decode(&json!("false")), Ok(json!(false)));
        assert!(decoder.decode(&json!("TRUE")).is_err());
        assert!(decoder.decode(&json!(true)).is_err());
        assert!(decoder.decode(&json!("1")).is_err());
    }

    #[test]
    fn string_rejects_non_strings() {
        assert_eq!(Decoder::String.decode(&json!("x")), Ok(json!("x")));
        assert!(Decoder::String.decode(&json!(1)).is_err());
    }

    #[test]
    fn custom_shape_reports_first_bad_field() {
        let spec = ValidationSpec::standard();
        let decoder = Decoder::for_type(&ParamType::Custom("mass_timestamp".to_string()), &spec);

        let good = json!({
            "start_time": 10,
            "episode_id": 3,
            "category_ids": [1, "2"],
            "character_ids": [],
        });
        assert_eq!(decoder.decode(&good), Ok(good.clone()));

        let bad_number = json!({
            "start_time": "10",
            "episode_id": 3,
            "category_ids": [],
            "character_ids": [],
        });
        assert_eq!(decoder.decode(&bad_number).unwrap_err().sub_attr.as_deref(), Some("start_time"));

        let bad_array = json!({
            "start_time": 10,
            "episode_id": 3,
            "category_ids": ["x"],
            "character_ids": [],
        });
        assert_eq!(decoder.decode(&bad_array).unwrap_err().sub_attr.as_deref(), Some("category_ids"));

        assert!(decoder.decode(&json!("not an object")).is_err());
    }

    #[test]
    fn undeclared_custom_type_never_decodes() {
        let spec = ValidationSpec::standard();
        let decoder = Decoder::for_type(&ParamType::Custom("unknown".to_string()), &spec);
        assert!(decoder.decode(&json!({})).is_err());
    }
}
