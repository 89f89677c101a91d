use crate::error::Result;
use crate::logic::transform::ResponseTransformer;
use crate::model::{Dataset, Params, RequestMethod, Schema, Tuple};

const DEFAULT_PRIMARY_KEY: &str = "id";

/// A schema-aware wrapper around a [`Dataset`], exposing domain query and
/// command methods. Like the dataset underneath it, a relation is an
/// immutable value: every builder returns a new relation.
#[derive(Debug, Clone, PartialEq)]
pub struct Relation {
    name: String,
    dataset: Dataset,
    schema: Option<Schema>,
}

impl Relation {
    /// A schemaless relation: responses pass through untransformed (aside
    /// from an optional projection).
    pub fn new(name: impl Into<String>, dataset: Dataset) -> Self {
        Self {
            name: name.into(),
            dataset: dataset.with_transformer(ResponseTransformer::Schemaless),
            schema: None,
        }
    }

    /// A schema-driven relation: responses run through the schema's
    /// coercion/rename transform.
    pub fn with_schema(name: impl Into<String>, dataset: Dataset, schema: Schema) -> Self {
        Self {
            name: name.into(),
            dataset: dataset.with_transformer(ResponseTransformer::Schemad(schema.clone())),
            schema: Some(schema),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn schema(&self) -> Option<&Schema> {
        self.schema.as_ref()
    }

    /// Output name of the schema's primary key, falling back to `"id"`.
    pub fn primary_key(&self) -> &str {
        self.schema
            .as_ref()
            .and_then(|s| s.primary_key_name())
            .unwrap_or(DEFAULT_PRIMARY_KEY)
    }

    fn map_dataset(&self, dataset: Dataset) -> Self {
        Self {
            name: self.name.clone(),
            dataset,
            schema: self.schema.clone(),
        }
    }

    fn map_schema(&self, f: impl FnOnce(&Schema) -> Schema) -> Self {
        match &self.schema {
            Some(schema) => {
                let schema = f(schema);
                Self {
                    name: self.name.clone(),
                    dataset: self
                        .dataset
                        .with_transformer(ResponseTransformer::Schemad(schema.clone())),
                    schema: Some(schema),
                }
            }
            None => self.clone(),
        }
    }

    // Forwarded dataset builders.

    pub fn with_base_path(&self, base_path: &str) -> Self {
        self.map_dataset(self.dataset.with_base_path(base_path))
    }

    pub fn with_path(&self, path: &str) -> Self {
        self.map_dataset(self.dataset.with_path(path))
    }

    pub fn append_path(&self, segment: &str) -> Self {
        self.map_dataset(self.dataset.append_path(segment))
    }

    pub fn with_request_method(&self, method: RequestMethod) -> Self {
        self.map_dataset(self.dataset.with_request_method(method))
    }

    pub fn with_headers(&self, headers: Params) -> Self {
        self.map_dataset(self.dataset.with_headers(headers))
    }

    pub fn add_header(&self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.map_dataset(self.dataset.add_header(name, value))
    }

    pub fn add_headers(&self, headers: &Params) -> Self {
        self.map_dataset(self.dataset.add_headers(headers))
    }

    pub fn with_query_params(&self, params: Params) -> Self {
        self.map_dataset(self.dataset.with_query_params(params))
    }

    pub fn add_query_params(&self, params: &Params) -> Self {
        self.map_dataset(self.dataset.add_query_params(params))
    }

    pub fn with_body_params(&self, params: Params) -> Self {
        self.map_dataset(self.dataset.with_body_params(params))
    }

    pub fn add_body_params(&self, params: &Params) -> Self {
        self.map_dataset(self.dataset.add_body_params(params))
    }

    // Schema-shaped queries.

    /// Restrict output tuples to the named keys. Works for schemaless and
    /// schema-driven relations alike; for the latter the names refer to the
    /// schema's output (post-alias) keys.
    pub fn project<S: AsRef<str>>(&self, names: &[S]) -> Self {
        self.map_dataset(self.dataset.with_projections(names))
    }

    /// Drop the named attributes from the schema. No-op when schemaless.
    pub fn exclude<S: AsRef<str>>(&self, names: &[S]) -> Self {
        self.map_schema(|s| s.exclude(names))
    }

    /// Re-alias schema attributes. No-op when schemaless.
    pub fn rename(&self, mapping: &[(&str, &str)]) -> Self {
        self.map_schema(|s| s.rename(mapping))
    }

    /// Prefix every schema attribute. No-op when schemaless.
    pub fn prefix(&self, prefix: &str) -> Self {
        self.map_schema(|s| s.prefix(prefix))
    }

    /// Nest output tuples under a key. No-op when schemaless.
    pub fn wrap(&self, key: &str) -> Self {
        self.map_schema(|s| s.wrap(key))
    }

    // Terminal operations.

    /// Materialize the relation: execute the dataset and return the
    /// transformed tuples.
    pub async fn to_a(&self) -> Result<Vec<Tuple>> {
        self.dataset.response().await
    }

    pub async fn each<F>(&self, f: F) -> Result<()>
    where
        F: FnMut(&Tuple),
    {
        self.dataset.each(f).await
    }

    /// Insert one tuple. Input runs through the schema's input coercion
    /// (canonical names in, source keys out) when a schema is declared.
    pub async fn insert(&self, attributes: &Tuple) -> Result<Vec<Tuple>> {
        self.dataset.insert(self.coerce_input(attributes)?).await
    }

    /// Update one tuple, symmetric with [`Relation::insert`].
    pub async fn update(&self, attributes: &Tuple) -> Result<Vec<Tuple>> {
        self.dataset.update(self.coerce_input(attributes)?).await
    }

    pub async fn delete(&self) -> Result<Vec<Tuple>> {
        self.dataset.delete().await
    }

    fn coerce_input(&self, attributes: &Tuple) -> Result<Params> {
        let coerced = match &self.schema {
            Some(schema) => schema.apply_input(attributes)?,
            None => attributes.clone(),
        };
        Ok(coerced.into_iter().collect())
    }
}
