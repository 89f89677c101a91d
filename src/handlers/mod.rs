pub mod json;

use crate::model::{Dataset, Tuple};
use anyhow::Result;

pub use json::{JsonRequestHandler, JsonResponseHandler};

/// What a request handler hands back: status, headers and the raw body.
/// The core never interprets it; only the paired response handler does.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }
}

/// Performs the outbound request described by a dataset. Timeouts, retries
/// and backoff all live behind this seam; failures propagate to the caller
/// untouched.
#[async_trait::async_trait]
pub trait RequestHandler: Send + Sync {
    async fn call(&self, dataset: &Dataset) -> Result<RawResponse>;
}

/// Turns a raw response into a sequence of raw tuples. Runs before the
/// dataset's response transformer.
#[async_trait::async_trait]
pub trait ResponseHandler: Send + Sync {
    async fn call(&self, response: RawResponse, dataset: &Dataset) -> Result<Vec<Tuple>>;
}
