use std::sync::Arc;

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use super::decoder::Decoder;
use super::spec::ValidationSpec;
use crate::baton::{Baton, ErrorRecord, RequestType, StageResult};
use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Violation {
    // Spelling kept: clients match on this text
    #[error("Attibute value missing")]
    Missing,

    #[error("Invalid Attribute Type")]
    InvalidType,

    #[error("Single Value is Expected")]
    SingleValueExpected,
}

/// First failed attribute of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub attr: String,
    pub violation: Violation,
    pub sub_attr: Option<String>,
}

impl Rejection {
    fn new(attr: &str, violation: Violation) -> Self {
        Self { attr: attr.to_string(), violation, sub_attr: None }
    }
}

/// Coerced parameters keyed by attribute name. Absent optional attributes
/// are not present at all.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidatedParams(Map<String, Value>);

impl ValidatedParams {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    pub fn i64(&self, name: &str) -> Option<i64> {
        self.0.get(name).and_then(Value::as_i64)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for ValidatedParams {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

#[derive(Clone)]
pub struct ParamValidator {
    spec: Arc<ValidationSpec>,
}

impl ParamValidator {
    pub fn new(spec: Arc<ValidationSpec>) -> Self {
        Self { spec }
    }

    pub fn spec(&self) -> &ValidationSpec {
        &self.spec
    }

    /// Coerce and check the raw parameters of `action`; on failure record a
    /// parameter validation error on the baton and answer the request.
    pub fn validate_request(
        &self,
        baton: &mut Baton,
        raw: &Map<String, Value>,
        action: &str,
    ) -> StageResult<ValidatedParams> {
        baton.add_method("validateRequest");
        match self.coerce(raw, action, baton.request_type) {
            Ok(params) => Ok(params),
            Err(rejection) => {
                debug!(
                    "[{}] {} rejected: {} ({})",
                    baton.id, action, rejection.attr, rejection.violation
                );
                Err(baton.fail(
                    ErrorRecord::new(ApiError::ParameterValidation)
                        .detail(rejection.violation.to_string())
                        .action(action)
                        .attr(rejection.attr)
                        .sub_attr(rejection.sub_attr),
                ))
            }
        }
    }

    /// Attributes are checked in declaration order and the first failure wins.
    /// Actions without declarations yield empty params.
    pub fn coerce(
        &self,
        raw: &Map<String, Value>,
        action: &str,
        request_type: RequestType,
    ) -> Result<ValidatedParams, Rejection> {
        let Some(action_spec) = self.spec.get_action(action) else {
            return Ok(ValidatedParams::default());
        };

        let mut out = Map::new();
        for (attr, param) in action_spec.attrs() {
            let elements = match split_raw(raw.get(attr), request_type) {
                Some(elements) if param.multiple || !elements.is_empty() => elements,
                // an empty list leaves a single-valued attribute nothing to unwrap
                _ if param.optional => continue,
                _ => return Err(Rejection::new(attr, Violation::Missing)),
            };

            let decoder = Decoder::for_type(&param.param_type, &self.spec);
            let mut values = Vec::with_capacity(elements.len());
            for element in &elements {
                match decoder.decode(element) {
                    Ok(value) => values.push(value),
                    Err(failure) => {
                        return Err(Rejection {
                            sub_attr: failure.sub_attr,
                            ..Rejection::new(attr, Violation::InvalidType)
                        })
                    }
                }
            }

            if param.multiple {
                out.insert(attr.to_string(), Value::Array(values));
            } else if values.len() > 1 {
                return Err(Rejection::new(attr, Violation::SingleValueExpected));
            } else if let Some(value) = values.pop() {
                out.insert(attr.to_string(), value);
            }
        }

        Ok(ValidatedParams(out))
    }
}

/// GET values are comma-separated strings; POST values are structured and
/// wrapped into a list when scalar. Only absent or null input yields `None`;
/// an empty list is a present value.
fn split_raw(raw: Option<&Value>, request_type: RequestType) -> Option<Vec<Value>> {
    let elements = match (raw?, request_type) {
        (Value::Null, _) => return None,
        (Value::String(s), RequestType::Get) => {
            s.split(',').map(|part| Value::String(part.to_string())).collect()
        }
        (Value::Array(items), _) => items.clone(),
        (other, _) => vec![other.clone()],
    };
    Some(elements)
}
