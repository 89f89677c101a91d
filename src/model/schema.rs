use crate::error::{Error, Result};
use crate::model::Tuple;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Declared attribute type. Coercion is strict: a present, non-null value
/// that cannot satisfy the type fails the whole tuple, it is never nulled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttrType {
    String,
    Integer,
    Float,
    Bool,
    /// Pass-through for values kept as raw JSON.
    Json,
}

impl AttrType {
    /// Coerce a raw value to this type. JSON null passes through untouched
    /// so optional fields stay optional.
    pub fn coerce(&self, attribute: &str, value: &Value) -> Result<Value> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        let coerced = match self {
            AttrType::Json => Some(value.clone()),
            AttrType::String => match value {
                Value::String(s) => Some(Value::String(s.clone())),
                Value::Number(n) => Some(Value::String(n.to_string())),
                Value::Bool(b) => Some(Value::String(b.to_string())),
                _ => None,
            },
            AttrType::Integer => match value {
                Value::Number(n) if n.is_i64() || n.is_u64() => Some(value.clone()),
                Value::String(s) => s.parse::<i64>().ok().map(Value::from),
                _ => None,
            },
            AttrType::Float => match value {
                Value::Number(_) => value.as_f64().map(Value::from),
                Value::String(s) => s.parse::<f64>().ok().map(Value::from),
                _ => None,
            },
            AttrType::Bool => match value {
                Value::Bool(_) => Some(value.clone()),
                Value::String(s) => match s.as_str() {
                    "true" => Some(Value::Bool(true)),
                    "false" => Some(Value::Bool(false)),
                    _ => None,
                },
                _ => None,
            },
        };
        coerced.ok_or_else(|| Error::Coercion {
            attribute: attribute.to_string(),
            value: value.clone(),
        })
    }
}

/// One declared field of a resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    /// Canonical name, also the default source and output key.
    pub name: String,
    /// Key to read from raw response tuples when it differs from `name`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub attr_type: AttrType,
    /// Output rename applied after coercion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub primary_key: bool,
}

impl Attribute {
    pub fn new(name: impl Into<String>, attr_type: AttrType) -> Self {
        Self {
            name: name.into(),
            source: None,
            attr_type,
            alias: None,
            primary_key: false,
        }
    }

    pub fn from_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn aliased(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn primary(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Key read from raw response tuples.
    pub fn source_key(&self) -> &str {
        self.source.as_deref().unwrap_or(&self.name)
    }

    /// Key written to transformed tuples.
    pub fn output_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// Ordered set of attributes, unique by name. Every transform returns a new
/// schema; nothing here mutates.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Schema {
    attributes: Vec<Attribute>,
    /// When set, transformed tuples are nested under this key.
    #[serde(skip_serializing_if = "Option::is_none")]
    wrap: Option<String>,
}

impl Schema {
    pub fn new(attributes: Vec<Attribute>) -> Self {
        let mut seen: Vec<String> = Vec::new();
        let attributes = attributes
            .into_iter()
            .filter(|attr| {
                if seen.contains(&attr.name) {
                    false
                } else {
                    seen.push(attr.name.clone());
                    true
                }
            })
            .collect();
        Self {
            attributes,
            wrap: None,
        }
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Output names in declaration order.
    pub fn attribute_names(&self) -> Vec<&str> {
        self.attributes.iter().map(|a| a.output_key()).collect()
    }

    /// Output name of the first attribute flagged as primary key.
    pub fn primary_key_name(&self) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.primary_key)
            .map(|a| a.output_key())
    }

    /// Keep only the attributes whose current output name is listed.
    /// Declaration order is preserved; unknown names are ignored.
    pub fn project<S: AsRef<str>>(&self, names: &[S]) -> Self {
        let keep: Vec<&str> = names.iter().map(AsRef::as_ref).collect();
        Self {
            attributes: self
                .attributes
                .iter()
                .filter(|a| keep.contains(&a.output_key()))
                .cloned()
                .collect(),
            wrap: self.wrap.clone(),
        }
    }

    /// Drop the attributes whose current output name is listed.
    pub fn exclude<S: AsRef<str>>(&self, names: &[S]) -> Self {
        let drop: Vec<&str> = names.iter().map(AsRef::as_ref).collect();
        Self {
            attributes: self
                .attributes
                .iter()
                .filter(|a| !drop.contains(&a.output_key()))
                .cloned()
                .collect(),
            wrap: self.wrap.clone(),
        }
    }

    /// Re-alias attributes by current output name.
    pub fn rename(&self, mapping: &[(&str, &str)]) -> Self {
        Self {
            attributes: self
                .attributes
                .iter()
                .map(|a| {
                    let mut attr = a.clone();
                    if let Some((_, to)) =
                        mapping.iter().find(|(from, _)| *from == a.output_key())
                    {
                        attr.alias = Some((*to).to_string());
                    }
                    attr
                })
                .collect(),
            wrap: self.wrap.clone(),
        }
    }

    /// Alias every attribute as `<prefix>_<name>`.
    pub fn prefix(&self, prefix: &str) -> Self {
        Self {
            attributes: self
                .attributes
                .iter()
                .map(|a| {
                    let mut attr = a.clone();
                    attr.alias = Some(format!("{}_{}", prefix, a.output_key()));
                    attr
                })
                .collect(),
            wrap: self.wrap.clone(),
        }
    }

    /// Nest transformed tuples under the given key.
    pub fn wrap(&self, key: &str) -> Self {
        Self {
            attributes: self.attributes.clone(),
            wrap: Some(key.to_string()),
        }
    }

    /// Output transform: read each attribute's source key, coerce, write
    /// under its output name. Undeclared keys are dropped.
    pub fn apply(&self, tuple: &Tuple) -> Result<Tuple> {
        let mut out = Tuple::new();
        for attr in &self.attributes {
            let raw = tuple.get(attr.source_key()).cloned().unwrap_or(Value::Null);
            let coerced = attr.attr_type.coerce(&attr.name, &raw)?;
            out.insert(attr.output_key().to_string(), coerced);
        }
        match &self.wrap {
            Some(key) => {
                let mut wrapped = Tuple::new();
                wrapped.insert(key.clone(), Value::Object(out));
                Ok(wrapped)
            }
            None => Ok(out),
        }
    }

    /// Input transform, the inverse direction of [`Schema::apply`]: read the
    /// caller's canonical (or aliased) keys, coerce, write under source keys
    /// so the server sees its own field names. Undeclared keys are dropped;
    /// declared attributes absent from the input stay absent.
    pub fn apply_input(&self, attrs: &Tuple) -> Result<Tuple> {
        let mut out = Tuple::new();
        for attr in &self.attributes {
            let raw = attrs
                .get(attr.output_key())
                .or_else(|| attrs.get(&attr.name));
            if let Some(raw) = raw {
                let coerced = attr.attr_type.coerce(&attr.name, raw)?;
                out.insert(attr.source_key().to_string(), coerced);
            }
        }
        Ok(out)
    }
}
