use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::params::{is_zero, normalize_whitespace};
use crate::error::{AuthError, AuthResult};

/// Declarative schema for a set of named fields
pub type SchemaMap = BTreeMap<String, Schema>;

/// Value types a schema field can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Bool,
    Int,
    #[default]
    String,
    List,
    Map,
}

/// Element type of a list or map field
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Elem {
    Schema(Box<Schema>),
    Resource(Resource),
}

/// A nested block of fields
#[derive(Debug, Clone, Default, Serialize)]
pub struct Resource {
    pub schema: SchemaMap,
}

/// Schema of a single configuration field
#[derive(Debug, Clone, Default, Serialize)]
pub struct Schema {
    #[serde(rename = "type")]
    pub value_type: ValueType,
    pub description: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub required: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub optional: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub sensitive: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_items: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub conflicts_with: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elem: Option<Elem>,
}

impl Schema {
    fn with_type(value_type: ValueType, description: &str) -> Self {
        Self {
            value_type,
            description: normalize_whitespace(description),
            optional: true,
            ..Default::default()
        }
    }

    pub fn string(description: &str) -> Self {
        Self::with_type(ValueType::String, description)
    }

    pub fn int(description: &str) -> Self {
        Self::with_type(ValueType::Int, description)
    }

    pub fn bool(description: &str) -> Self {
        Self::with_type(ValueType::Bool, description)
    }

    /// Mapping of string values
    pub fn string_map(description: &str) -> Self {
        Self {
            elem: Some(Elem::Schema(Box::new(Self::string("")))),
            ..Self::with_type(ValueType::Map, description)
        }
    }

    /// Mapping with values of any type, left to the reader to coerce
    pub fn map(description: &str) -> Self {
        Self::with_type(ValueType::Map, description)
    }

    /// List of nested blocks
    pub fn block_list(description: &str, resource: Resource) -> Self {
        Self {
            elem: Some(Elem::Resource(resource)),
            ..Self::with_type(ValueType::List, description)
        }
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self.optional = false;
        self
    }

    #[must_use]
    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    #[must_use]
    pub fn max_items(mut self, max: usize) -> Self {
        self.max_items = Some(max);
        self
    }

    #[must_use]
    pub fn conflicts_with(mut self, fields: Vec<String>) -> Self {
        self.conflicts_with = fields;
        self
    }
}

impl Resource {
    pub fn new(schema: SchemaMap) -> Self {
        Self { schema }
    }

    /// Statically validate a configuration object against this block.
    ///
    /// Rejects unknown fields, type mismatches, unset required fields, lists
    /// longer than `max_items` and any `conflicts_with` violation.
    pub fn validate(&self, config: &Value) -> AuthResult<()> {
        self.validate_at("", config)
    }

    fn validate_at(&self, prefix: &str, config: &Value) -> AuthResult<()> {
        let empty = Map::new();
        let object = match config {
            Value::Null => &empty,
            Value::Object(map) => map,
            other => {
                return Err(AuthError::config(format!(
                    "{}: expected a mapping, got {}",
                    display_path(prefix),
                    type_name(other)
                )))
            }
        };

        for key in object.keys() {
            if !self.schema.contains_key(key) {
                return Err(AuthError::config(format!(
                    "unsupported argument {:?}",
                    join_path(prefix, key)
                )));
            }
        }

        for (name, field) in &self.schema {
            let path = join_path(prefix, name);
            let value = object.get(name).filter(|v| !is_zero(v));

            let Some(value) = value else {
                if field.required {
                    return Err(AuthError::config(format!(
                        "the argument {:?} is required, but no definition was found",
                        path
                    )));
                }
                continue;
            };

            for other in &field.conflicts_with {
                if object.get(other).is_some_and(|v| !is_zero(v)) {
                    return Err(AuthError::config(format!(
                        "{:?}: conflicts with {}",
                        path,
                        join_path(prefix, other)
                    )));
                }
            }

            field.validate_value(&path, value)?;
        }

        Ok(())
    }
}

impl Schema {
    fn validate_value(&self, path: &str, value: &Value) -> AuthResult<()> {
        let matches = match self.value_type {
            ValueType::Bool => value.is_boolean(),
            ValueType::Int => value.is_i64() || value.is_u64(),
            ValueType::String => value.is_string(),
            ValueType::List => value.is_array(),
            ValueType::Map => value.is_object(),
        };
        if !matches {
            return Err(AuthError::config(format!(
                "{:?}: expected {:?}, got {}",
                path,
                self.value_type,
                type_name(value)
            )));
        }

        match (value, &self.elem) {
            (Value::Array(items), elem) => {
                if let Some(max) = self.max_items {
                    if items.len() > max {
                        return Err(AuthError::config(format!(
                            "{:?}: too many list items, at most {} allowed",
                            path, max
                        )));
                    }
                }
                for (i, item) in items.iter().enumerate() {
                    let item_path = format!("{}.{}", path, i);
                    match elem {
                        Some(Elem::Resource(resource)) => resource.validate_at(&item_path, item)?,
                        Some(Elem::Schema(schema)) => schema.validate_value(&item_path, item)?,
                        None => {}
                    }
                }
            }
            (Value::Object(map), Some(Elem::Schema(schema))) => {
                for (key, item) in map {
                    schema.validate_value(&join_path(path, key), item)?;
                }
            }
            _ => {}
        }

        Ok(())
    }
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}

fn display_path(prefix: &str) -> &str {
    if prefix.is_empty() {
        "configuration"
    } else {
        prefix
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "map",
    }
}
