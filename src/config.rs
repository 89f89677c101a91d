use crate::handlers::{JsonRequestHandler, JsonResponseHandler, RequestHandler, ResponseHandler};
use crate::model::Params;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Explicit gateway configuration, threaded through dataset construction.
/// There is deliberately no class-level or global default handler state:
/// everything a dataset executes with is visible here.
#[derive(Clone, Default)]
pub struct GatewayConfig {
    pub uri: Option<String>,
    /// Default headers merged under every dataset's instance headers.
    pub headers: Params,
    /// Default query params merged under every dataset's instance params.
    pub query_params: Params,
    pub request_handler: Option<Arc<dyn RequestHandler>>,
    pub response_handler: Option<Arc<dyn ResponseHandler>>,
}

impl GatewayConfig {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: Some(uri.into()),
            ..Self::default()
        }
    }

    /// Configuration wired with the default JSON handler pair.
    pub fn json(uri: impl Into<String>) -> Self {
        Self::new(uri)
            .with_request_handler(Arc::new(JsonRequestHandler::new()))
            .with_response_handler(Arc::new(JsonResponseHandler::new()))
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_query_param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.query_params.insert(name.into(), value.into());
        self
    }

    pub fn with_request_handler(mut self, handler: Arc<dyn RequestHandler>) -> Self {
        self.request_handler = Some(handler);
        self
    }

    pub fn with_response_handler(mut self, handler: Arc<dyn ResponseHandler>) -> Self {
        self.response_handler = Some(handler);
        self
    }

    /// Names of required keys that are absent. The gateway refuses to build
    /// while this is non-empty.
    pub fn missing_keys(&self) -> Vec<&'static str> {
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
        missing
    }
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("uri", &self.uri)
            .field("headers", &self.headers)
            .field("query_params", &self.query_params)
            .field("request_handler", &self.request_handler.is_some())
            .field("response_handler", &self.response_handler.is_some())
            .finish()
    }
}
