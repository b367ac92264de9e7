//! Action Validation Spec: per-action parameter declarations and the named
//! custom object shapes they may reference.
//!
//! Declaration order is significant: attributes are validated in the order
//! they are declared, so the first failure reported for a request is stable.

use std::path::Path;

use serde_yaml::{Mapping, Value as Yaml};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpecError {
    #[error("Failed to read validation spec {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid validation spec YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid validation spec: {0}")]
    Invalid(String),

    #[error("Action {action} attribute {attr} references unknown custom type {type_name}")]
    UnknownCustomType {
        action: String,
        attr: String,
        type_name: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamType {
    String,
    Number,
    Boolean,
    /// Name of a [`CustomShape`].
    Custom(String),
}

impl ParamType {
    pub fn parse(name: &str) -> Self {
        match name {
            "string" => ParamType::String,
            "number" => ParamType::Number,
            "boolean" => ParamType::Boolean,
            other => ParamType::Custom(other.to_string()),
        }
    }
}

/// Sub-attribute type inside a custom shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Number,
    Boolean,
    /// Array whose elements all integer-parse.
    Array,
}

impl FieldType {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "string" => Some(FieldType::String),
            "number" => Some(FieldType::Number),
            "boolean" => Some(FieldType::Boolean),
            "array" => Some(FieldType::Array),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    pub param_type: ParamType,
    pub optional: bool,
    pub multiple: bool,
}

impl ParamSpec {
    pub fn required(param_type: ParamType) -> Self {
        Self { param_type, optional: false, multiple: false }
    }

    pub fn optional(param_type: ParamType) -> Self {
        Self { param_type, optional: true, multiple: false }
    }

    pub fn multiple(mut self) -> Self {
        self.multiple = true;
        self
    }
}

/// Ordered attribute declarations of one action.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionSpec {
    attrs: Vec<(String, ParamSpec)>,
}

impl ActionSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attr(mut self, name: impl Into<String>, spec: ParamSpec) -> Self {
        let name = name.into();
        self.attrs.retain(|(n, _)| *n != name);
        self.attrs.push((name, spec));
        self
    }

    pub fn attrs(&self) -> impl Iterator<Item = (&str, &ParamSpec)> {
        self.attrs.iter().map(|(n, s)| (n.as_str(), s))
    }

    pub fn get(&self, name: &str) -> Option<&ParamSpec> {
        self.attrs.iter().find(|(n, _)| n == name).map(|(_, s)| s)
    }

    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomShape {
    fields: Vec<(String, FieldType)>,
}

impl CustomShape {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        let name = name.into();
        self.fields.retain(|(n, _)| *n != name);
        self.fields.push((name, field_type));
        self
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, FieldType)> {
        self.fields.iter().map(|(n, t)| (n.as_str(), *t))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationSpec {
    actions: Vec<(String, ActionSpec)>,
    custom_objects: Vec<(String, CustomShape)>,
}

impl ValidationSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn action(mut self, name: impl Into<String>, spec: ActionSpec) -> Self {
        let name = name.into();
        self.actions.retain(|(n, _)| *n != name);
        self.actions.push((name, spec));
        self
    }

    pub fn custom_object(mut self, name: impl Into<String>, shape: CustomShape) -> Self {
        let name = name.into();
        self.custom_objects.retain(|(n, _)| *n != name);
        self.custom_objects.push((name, shape));
        self
    }

    pub fn get_action(&self, name: &str) -> Option<&ActionSpec> {
        self.actions.iter().find(|(n, _)| n == name).map(|(_, s)| s)
    }

    pub fn get_custom(&self, name: &str) -> Option<&CustomShape> {
        self.custom_objects.iter().find(|(n, _)| n == name).map(|(_, s)| s)
    }

    pub fn action_names(&self) -> impl Iterator<Item = &str> {
        self.actions.iter().map(|(n, _)| n.as_str())
    }

    /// Built-in declarations for the service's endpoints.
    pub fn standard() -> Self {
        use FieldType as F;
        use ParamType::*;

        Self::new()
            .action(
                "testGetCall",
                ActionSpec::new().attr("test_param", ParamSpec::optional(String)),
            )
            .action(
                "testPostCall",
                ActionSpec::new().attr("text", ParamSpec::required(String)),
            )
            .action(
                "createUser",
                ActionSpec::new()
                    .attr("username", ParamSpec::required(String))
                    .attr("email", ParamSpec::required(String))
                    .attr("password", ParamSpec::required(String)),
            )
            .action(
                "login",
                ActionSpec::new()
                    .attr("username", ParamSpec::optional(String))
                    .attr("email", ParamSpec::optional(String))
                    .attr("password", ParamSpec::required(String)),
            )
            .action(
                "validate",
                ActionSpec::new().attr("action", ParamSpec::required(String)),
            )
            .action(
                "permission",
                ActionSpec::new().attr("action", ParamSpec::optional(String)),
            )
            .custom_object(
                "mass_timestamp",
                CustomShape::new()
                    .field("start_time", F::Number)
                    .field("episode_id", F::Number)
                    .field("category_ids", F::Array)
                    .field("character_ids", F::Array),
            )
            .custom_object(
                "compilation_timestamp",
                CustomShape::new()
                    .field("timestamp_id", F::Number)
                    .field("duration", F::Number)
                    .field("start_time", F::Number),
            )
    }

    /// Every custom type referenced by an action must be declared.
    pub fn validate(&self) -> Result<(), SpecError> {
        for (action, spec) in &self.actions {
            for (attr, param) in spec.attrs() {
                if let ParamType::Custom(type_name) = &param.param_type {
                    if self.get_custom(type_name).is_none() {
                        return Err(SpecError::UnknownCustomType {
                            action: action.clone(),
                            attr: attr.to_string(),
                            type_name: type_name.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self, SpecError> {
        let text = std::fs::read_to_string(path).map_err(|source| SpecError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    /// ```yaml
    /// actions:
    ///   testPostCall:
    ///     text: { type: string }
    ///     ids: { type: number, optional: true, multiple: true }
    /// custom_objects:
    ///   compilation_timestamp:
    ///     duration: number
    /// ```
    pub fn from_yaml_str(text: &str) -> Result<Self, SpecError> {
        let root: Mapping = serde_yaml::from_str(text)?;
        let mut spec = Self::new();

        if let Some(actions) = root.get("actions") {
            for (name, attrs) in as_mapping(actions, "actions")? {
                let name = as_str(name, "action name")?;
                let mut action = ActionSpec::new();
                if !attrs.is_null() {
                    for (attr, decl) in as_mapping(attrs, name)? {
                        let attr = as_str(attr, "attribute name")?;
                        action = action.attr(attr, parse_param(name, attr, decl)?);
                    }
                }
                spec = spec.action(name, action);
            }
        }

        if let Some(customs) = root.get("custom_objects") {
            for (name, fields) in as_mapping(customs, "custom_objects")? {
                let name = as_str(name, "custom object name")?;
                let mut shape = CustomShape::new();
                for (field, type_name) in as_mapping(fields, name)? {
                    let field = as_str(field, "custom object field")?;
                    let type_name = as_str(type_name, field)?;
                    let field_type = FieldType::parse(type_name).ok_or_else(|| {
                        SpecError::Invalid(format!("{}.{}: unknown field type {}", name, field, type_name))
                    })?;
                    shape = shape.field(field, field_type);
                }
                spec = spec.custom_object(name, shape);
            }
        }

        spec.validate()?;
        Ok(spec)
    }
}

fn as_mapping<'a>(value: &'a Yaml, context: &str) -> Result<&'a Mapping, SpecError> {
    value
        .as_mapping()
        .ok_or_else(|| SpecError::Invalid(format!("{} must be a mapping", context)))
}

fn as_str<'a>(value: &'a Yaml, context: &str) -> Result<&'a str, SpecError> {
    value
        .as_str()
        .ok_or_else(|| SpecError::Invalid(format!("{} must be a string", context)))
}

fn parse_param(action: &str, attr: &str, decl: &Yaml) -> Result<ParamSpec, SpecError> {
    // Shorthand: `attr: string`
    if let Some(type_name) = decl.as_str() {
        return Ok(ParamSpec::required(ParamType::parse(type_name)));
    }

    let context = format!("{}.{}", action, attr);
    let decl = as_mapping(decl, &context)?;
    let type_name = decl
        .get("type")
        .and_then(Yaml::as_str)
        .ok_or_else(|| SpecError::Invalid(format!("{} is missing a type", context)))?;
    let flag = |key: &str| decl.get(key).and_then(Yaml::as_bool).unwrap_or(false);

    Ok(ParamSpec {
        param_type: ParamType::parse(type_name),
        optional: flag("optional"),
        multiple: flag("multiple"),
    })
}
