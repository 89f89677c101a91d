use crate::error::{Error, Result};
use crate::handlers::{RequestHandler, ResponseHandler};
use crate::logic::transform::ResponseTransformer;
use crate::model::{deep_merge, Params, Tuple};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use url::form_urlencoded;

const PATH_SEPARATOR: char = '/';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RequestMethod {
    #[default]
    Get,
    Post,
    Put,
    Delete,
}

impl fmt::Display for RequestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            RequestMethod::Get => "GET",
            RequestMethod::Post => "POST",
            RequestMethod::Put => "PUT",
            RequestMethod::Delete => "DELETE",
        };
        f.write_str(verb)
    }
}

/// Immutable descriptor of an HTTP request-to-be-made, plus the pipeline
/// that turns its eventual response into tuples.
///
/// Every `with_*`/`add_*` builder returns a new instance; the receiver is
/// never touched. That makes a base dataset safe to share: concurrent
/// callers derive independent queries from it without synchronization. No
/// I/O happens until one of the terminal operations ([`Dataset::response`],
/// [`Dataset::each`], [`Dataset::insert`], [`Dataset::update`],
/// [`Dataset::delete`]) runs.
#[derive(Clone, Default)]
pub struct Dataset {
    uri: Option<String>,
    request_method: RequestMethod,
    base_path: String,
    path: String,
    headers: Params,
    query_params: Params,
    body_params: Params,
    projections: Vec<String>,
    transformer: ResponseTransformer,
    request_handler: Option<Arc<dyn RequestHandler>>,
    response_handler: Option<Arc<dyn ResponseHandler>>,
}

impl Dataset {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: Some(uri.into()),
            ..Self::default()
        }
    }

    pub fn request_method(&self) -> RequestMethod {
        self.request_method
    }

    pub fn is_get(&self) -> bool {
        self.request_method == RequestMethod::Get
    }

    pub fn is_post(&self) -> bool {
        self.request_method == RequestMethod::Post
    }

    pub fn is_put(&self) -> bool {
        self.request_method == RequestMethod::Put
    }

    pub fn is_delete(&self) -> bool {
        self.request_method == RequestMethod::Delete
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    pub fn headers(&self) -> &Params {
        &self.headers
    }

    pub fn query_params(&self) -> &Params {
        &self.query_params
    }

    pub fn body_params(&self) -> &Params {
        &self.body_params
    }

    pub fn projections(&self) -> &[String] {
        &self.projections
    }

    pub fn transformer(&self) -> &ResponseTransformer {
        &self.transformer
    }

    /// Combined path: `base_path/path`, no leading separator.
    pub fn path(&self) -> String {
        join_path(&self.base_path, &self.path)
    }

    pub fn absolute_path(&self) -> String {
        format!("{}{}", PATH_SEPARATOR, self.path())
    }

    /// Base URI joined with the combined path; query params are appended
    /// for GET requests, encoded in insertion order. Pure function of the
    /// dataset's current state.
    pub fn uri(&self) -> Result<String> {
        let base = self
            .uri
            .as_deref()
            .ok_or_else(|| Error::configuration(["uri"]))?;
        let mut uri = join_path(base.trim_end_matches(PATH_SEPARATOR), &self.path());
        if self.is_get() && !self.query_params.is_empty() {
            let mut encoder = form_urlencoded::Serializer::new(String::new());
            for (key, value) in &self.query_params {
                encoder.append_pair(key, &query_value(value));
            }
            uri.push('?');
            uri.push_str(&encoder.finish());
        }
        Ok(uri)
    }

    pub fn with_uri(&self, uri: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.uri = Some(uri.into());
        next
    }

    pub fn with_request_method(&self, request_method: RequestMethod) -> Self {
        let mut next = self.clone();
        next.request_method = request_method;
        next
    }

    pub fn with_base_path(&self, base_path: &str) -> Self {
        let mut next = self.clone();
        next.base_path = strip_leading(base_path);
        next
    }

    /// Replace the dataset's own path (relative to `base_path`). A leading
    /// slash is stripped so joins never produce `//`.
    pub fn with_path(&self, path: &str) -> Self {
        let mut next = self.clone();
        next.path = strip_leading(path);
        next
    }

    /// Join a segment onto the dataset's own path. Safe when either side is
    /// empty.
    pub fn append_path(&self, segment: &str) -> Self {
        let joined = join_path(&self.path, segment);
        let mut next = self.clone();
        next.path = joined;
        next
    }

    /// Replace all headers.
    pub fn with_headers(&self, headers: Params) -> Self {
        let mut next = self.clone();
        next.headers = headers;
        next
    }

    /// Add one header, keeping the rest.
    pub fn add_header(&self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut headers = self.headers.clone();
        headers.insert(name.into(), value.into());
        self.with_headers(headers)
    }

    /// Deep-merge headers into the existing ones; the argument wins per
    /// leaf key.
    pub fn add_headers(&self, headers: &Params) -> Self {
        self.with_headers(deep_merge(&self.headers, headers))
    }

    pub fn with_query_params(&self, query_params: Params) -> Self {
        let mut next = self.clone();
        next.query_params = query_params;
        next
    }

    pub fn add_query_params(&self, query_params: &Params) -> Self {
        self.with_query_params(deep_merge(&self.query_params, query_params))
    }

    pub fn with_body_params(&self, body_params: Params) -> Self {
        let mut next = self.clone();
        next.body_params = body_params;
        next
    }

    pub fn add_body_params(&self, body_params: &Params) -> Self {
        self.with_body_params(deep_merge(&self.body_params, body_params))
    }

    pub fn with_projections<S: AsRef<str>>(&self, names: &[S]) -> Self {
        let mut next = self.clone();
        next.projections = names.iter().map(|n| n.as_ref().to_string()).collect();
        next
    }

    pub fn with_transformer(&self, transformer: ResponseTransformer) -> Self {
        let mut next = self.clone();
        next.transformer = transformer;
        next
    }

    pub fn with_request_handler(&self, handler: Arc<dyn RequestHandler>) -> Self {
        let mut next = self.clone();
        next.request_handler = Some(handler);
        next
    }

    pub fn with_response_handler(&self, handler: Arc<dyn ResponseHandler>) -> Self {
        let mut next = self.clone();
        next.response_handler = Some(handler);
        next
    }

    /// Execute the dataset: one request-handler invocation, response
    /// handler, then the response transformer. Handler failures propagate
    /// verbatim.
    pub async fn response(&self) -> Result<Vec<Tuple>> {
        let (request_handler, response_handler) = self.require_configured()?;
        log::debug!("{} {}", self.request_method, self.uri()?);
        let raw = request_handler.call(self).await?;
        let tuples = response_handler.call(raw, self).await?;
        self.transformer.call(&tuples, &self.projections)
    }

    /// Eagerly drive every response tuple through the callback. The
    /// materialized form is available from [`Dataset::response`], which
    /// returns a collection that can be re-iterated freely.
    pub async fn each<F>(&self, mut f: F) -> Result<()>
    where
        F: FnMut(&Tuple),
    {
        for tuple in self.response().await? {
            f(&tuple);
        }
        Ok(())
    }

    /// POST the given attributes immediately and return the transformed
    /// response.
    pub async fn insert(&self, attributes: Params) -> Result<Vec<Tuple>> {
        self.with_request_method(RequestMethod::Post)
            .with_body_params(attributes)
            .response()
            .await
    }

    /// PUT the given attributes immediately and return the transformed
    /// response.
    pub async fn update(&self, attributes: Params) -> Result<Vec<Tuple>> {
        self.with_request_method(RequestMethod::Put)
            .with_body_params(attributes)
            .response()
            .await
    }

    /// DELETE immediately and return whatever tuples the server sent back.
    pub async fn delete(&self) -> Result<Vec<Tuple>> {
        self.with_request_method(RequestMethod::Delete)
            .response()
            .await
    }

    /// Lazy validation, matching lazy I/O: missing configuration surfaces
    /// here, with every absent key named in one error.
    fn require_configured(&self) -> Result<(&Arc<dyn RequestHandler>, &Arc<dyn ResponseHandler>)> {
        let mut missing = Vec::new();
        if self.uri.is_none() {
            missing.push("uri");
        }
        if self.request_handler.is_none() {
            missing.push("request_handler");
        }
        if self.response_handler.is_none() {
            missing.push("response_handler");
        }
        match (&self.request_handler, &self.response_handler) {
            (Some(request_handler), Some(response_handler)) if missing.is_empty() => {
                Ok((request_handler, response_handler))
            }
            _ => Err(Error::configuration(missing)),
        }
    }
}

/// Value equality over configuration; handler references compare by
/// pointer identity.
impl PartialEq for Dataset {
    fn eq(&self, other: &Self) -> bool {
        self.uri == other.uri
            && self.request_method == other.request_method
            && self.base_path == other.base_path
            && self.path == other.path
            && self.headers == other.headers
            && self.query_params == other.query_params
            && self.body_params == other.body_params
            && self.projections == other.projections
            && self.transformer == other.transformer
            && arc_eq(&self.request_handler, &other.request_handler)
            && arc_eq(&self.response_handler, &other.response_handler)
    }
}

fn arc_eq<T: ?Sized>(a: &Option<Arc<T>>, b: &Option<Arc<T>>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        _ => false,
    }
}

impl fmt::Debug for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dataset")
            .field("uri", &self.uri)
            .field("request_method", &self.request_method)
            .field("base_path", &self.base_path)
            .field("path", &self.path)
            .field("headers", &self.headers)
            .field("query_params", &self.query_params)
            .field("body_params", &self.body_params)
            .field("projections", &self.projections)
            .field("request_handler", &self.request_handler.is_some())
            .field("response_handler", &self.response_handler.is_some())
            .finish()
    }
}

fn strip_leading(path: &str) -> String {
    path.trim_start_matches(PATH_SEPARATOR).to_string()
}

fn join_path(left: &str, right: &str) -> String {
    let right = right.trim_start_matches(PATH_SEPARATOR);
    match (left.is_empty(), right.is_empty()) {
        (true, _) => right.to_string(),
        (_, true) => left.to_string(),
        _ => format!("{left}{PATH_SEPARATOR}{right}"),
    }
}

fn query_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::RawResponse;
    use crate::model::params_from;
    use serde_json::json;

    struct CannedRequestHandler {
        body: Value,
    }

    #[async_trait::async_trait]
    impl RequestHandler for CannedRequestHandler {
        async fn call(&self, _dataset: &Dataset) -> anyhow::Result<RawResponse> {
            Ok(RawResponse::new(200, self.body.to_string()))
        }
    }

    struct FailingRequestHandler;

    #[async_trait::async_trait]
    impl RequestHandler for FailingRequestHandler {
        async fn call(&self, _dataset: &Dataset) -> anyhow::Result<RawResponse> {
            Err(anyhow::anyhow!("connection refused"))
        }
    }

    fn executable(body: Value) -> Dataset {
        Dataset::new("http://localhost")
            .with_request_handler(Arc::new(CannedRequestHandler { body }))
            .with_response_handler(Arc::new(crate::handlers::JsonResponseHandler))
    }

    #[test]
    fn test_builders_do_not_mutate_the_receiver() {
        let base = Dataset::new("http://localhost").with_path("users");
        let derived = base
            .with_request_method(RequestMethod::Post)
            .append_path("7")
            .add_header("Accept", "application/json");
        assert_eq!(base.path(), "users");
        assert!(base.is_get());
        assert!(base.headers().is_empty());
        assert_eq!(derived.path(), "users/7");
    }

    #[test]
    fn test_with_path_last_write_wins() {
        let d = Dataset::new("http://localhost");
        assert_eq!(d.with_path("a").with_path("b"), d.with_path("b"));
    }

    #[test]
    fn test_path_join_is_slash_insensitive() {
        let d = Dataset::new("http://localhost")
            .with_base_path("/users")
            .with_path("/7");
        assert_eq!(d.path(), "users/7");
        assert_eq!(d.absolute_path(), "/users/7");
    }

    #[test]
    fn test_append_path_is_empty_safe() {
        let d = Dataset::new("http://localhost");
        assert_eq!(d.append_path("users").path(), "users");
        assert_eq!(d.with_path("users").append_path("").path(), "users");
        assert_eq!(d.with_path("users").append_path("/7").path(), "users/7");
    }

    #[test]
    fn test_uri_without_params_has_no_trailing_question_mark() {
        let d = Dataset::new("http://localhost").with_path("users");
        assert_eq!(d.uri().unwrap(), "http://localhost/users");
    }

    #[test]
    fn test_uri_encodes_params_in_insertion_order() {
        let d = Dataset::new("http://h").add_query_params(&params_from(json!({"a": 1, "b": 2})));
        assert_eq!(d.uri().unwrap(), "http://h?a=1&b=2");
    }

    #[test]
    fn test_uri_omits_query_for_non_get() {
        let d = Dataset::new("http://h")
            .add_query_params(&params_from(json!({"a": 1})))
            .with_request_method(RequestMethod::Post);
        assert_eq!(d.uri().unwrap(), "http://h");
    }

    #[test]
    fn test_uri_percent_encodes_values() {
        let d = Dataset::new("http://h").add_query_params(&params_from(json!({"q": "a b"})));
        assert_eq!(d.uri().unwrap(), "http://h?q=a+b");
    }

    #[test]
    fn test_add_params_deep_merges_last_write_wins() {
        let d = Dataset::new("http://h")
            .add_query_params(&params_from(json!({"filter": {"a": 1}, "page": 1})))
            .add_query_params(&params_from(json!({"filter": {"b": 2}, "page": 2})));
        assert_eq!(
            d.query_params().get("filter"),
            Some(&json!({"a": 1, "b": 2}))
        );
        assert_eq!(d.query_params().get("page"), Some(&json!(2)));
    }

    #[test]
    fn test_add_headers_instance_wins() {
        let d = Dataset::new("http://h")
            .with_headers(params_from(json!({"Accept": "application/json"})))
            .add_headers(&params_from(json!({"Accept": "text/plain", "X-Key": "1"})));
        assert_eq!(d.headers().get("Accept"), Some(&json!("text/plain")));
        assert_eq!(d.headers().get("X-Key"), Some(&json!("1")));
    }

    #[test]
    fn test_value_equality_not_identity() {
        let a = Dataset::new("http://h").with_path("users");
        let b = Dataset::new("http://h").with_path("users");
        assert_eq!(a, b);
        assert_ne!(a, b.with_path("posts"));
    }

    #[test]
    fn test_equality_compares_handlers_by_pointer() {
        let handler: Arc<dyn ResponseHandler> = Arc::new(crate::handlers::JsonResponseHandler);
        let a = Dataset::new("http://h").with_response_handler(handler.clone());
        let b = Dataset::new("http://h").with_response_handler(handler);
        assert_eq!(a, b);
        let c = Dataset::new("http://h")
            .with_response_handler(Arc::new(crate::handlers::JsonResponseHandler));
        assert_ne!(a, c);
    }

    #[tokio::test]
    async fn test_response_returns_transformed_tuples() {
        let tuples = executable(json!([{"id": 1}, {"id": 2}]))
            .response()
            .await
            .unwrap();
        assert_eq!(tuples.len(), 2);
        assert_eq!(tuples[0]["id"], json!(1));
    }

    #[tokio::test]
    async fn test_each_drives_the_callback() {
        let mut ids = Vec::new();
        executable(json!([{"id": 1}, {"id": 2}]))
            .each(|t| ids.push(t["id"].clone()))
            .await
            .unwrap();
        assert_eq!(ids, vec![json!(1), json!(2)]);
    }

    #[tokio::test]
    async fn test_insert_derives_post_and_executes() {
        let d = executable(json!({"id": 9, "name": "Jane"}));
        let out = d
            .insert(params_from(json!({"name": "Jane"})))
            .await
            .unwrap();
        assert_eq!(out[0]["id"], json!(9));
        // The original dataset is untouched.
        assert!(d.is_get());
        assert!(d.body_params().is_empty());
    }

    #[tokio::test]
    async fn test_missing_configuration_enumerates_all_keys() {
        let err = Dataset::default().response().await.unwrap_err();
        match err {
            Error::Configuration { keys } => {
                assert_eq!(keys, vec!["uri", "request_handler", "response_handler"]);
            }
            other => panic!("expected configuration error, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_handler_failure_propagates_verbatim() {
        let d = Dataset::new("http://localhost")
            .with_request_handler(Arc::new(FailingRequestHandler))
            .with_response_handler(Arc::new(crate::handlers::JsonResponseHandler));
        let err = d.response().await.unwrap_err();
        match err {
            Error::Handler(inner) => assert_eq!(inner.to_string(), "connection refused"),
            other => panic!("expected handler error, got {other}"),
        }
    }
}
