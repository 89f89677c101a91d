use serde_json::Value;

pub type Result<T> = std::result::Result<T, Error>;

/// Crate-wide error taxonomy.
///
/// Transport and handler failures stay opaque: they flow through the
/// `Handler` variant untouched so retry/backoff policy can live entirely
/// inside the injected request handler.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Required configuration is absent at execution time. All missing keys
    /// are reported at once.
    #[error("missing {} in gateway/dataset configuration", format_keys(keys))]
    Configuration { keys: Vec<String> },

    /// An association was resolved without a configured view. There is no
    /// default join strategy: the "query" is a remote call, not a local
    /// predicate, so this is fatal and happens before any I/O.
    #[error("association `{name}` has no view configured")]
    MissingAssociationView { name: String },

    /// A command that needs input coercion was built over a schemaless
    /// relation.
    #[error("relation `{relation}` requires a schema")]
    SchemaNotDefined { relation: String },

    /// A raw value failed its attribute's declared type. Never coerced to
    /// null; the whole tuple transformation fails.
    #[error("cannot coerce attribute `{attribute}` from {value}")]
    Coercion { attribute: String, value: Value },

    /// A tuple in a batch command failed validation. Batches are fail-fast:
    /// nothing past `index` was submitted.
    #[error("tuple {index} rejected: {source}")]
    TupleValidation {
        index: usize,
        #[source]
        source: Box<Error>,
    },

    /// Opaque request/response handler failure, propagated verbatim.
    #[error(transparent)]
    Handler(#[from] anyhow::Error),
}

impl Error {
    pub fn configuration<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Error::Configuration {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }
}

fn format_keys(keys: &[String]) -> String {
    match keys.len() {
        0 => String::from("configuration"),
        1 => keys[0].clone(),
        n => format!("{} and {}", keys[..n - 1].join(", "), keys[n - 1]),
    }
}
