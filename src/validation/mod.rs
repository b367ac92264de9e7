//! Request parameter validation against an injected [`ValidationSpec`].

pub mod decoder;
pub mod spec;
pub mod validator;

pub use decoder::{parse_integer, DecodeFailure, Decoder};
pub use spec::{ActionSpec, CustomShape, FieldType, ParamSpec, ParamType, SpecError, ValidationSpec};
pub use validator::{ParamValidator, Rejection, ValidatedParams, Violation};
