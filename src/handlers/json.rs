use crate::handlers::{RawResponse, RequestHandler, ResponseHandler};
use crate::model::{Dataset, RequestMethod, Tuple};
use anyhow::{anyhow, Context, Result};
use serde_json::Value;

/// Default request handler: builds a reqwest request from the dataset's
/// uri, verb and headers, serializing body params as a JSON body for
/// non-GET verbs.
#[derive(Debug, Clone, Default)]
pub struct JsonRequestHandler {
    client: reqwest::Client,
}

impl JsonRequestHandler {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl RequestHandler for JsonRequestHandler {
    async fn call(&self, dataset: &Dataset) -> Result<RawResponse> {
        let uri = dataset.uri()?;
        let mut request = match dataset.request_method() {
            RequestMethod::Get => self.client.get(&uri),
            RequestMethod::Post => self.client.post(&uri),
            RequestMethod::Put => self.client.put(&uri),
            RequestMethod::Delete => self.client.delete(&uri),
        };

        for (name, value) in dataset.headers() {
            let value = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            request = request.header(name.as_str(), value);
        }

        if !dataset.is_get() && !dataset.body_params().is_empty() {
            request = request.json(dataset.body_params());
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("request to {uri} failed"))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), String::from_utf8_lossy(v.as_bytes()).into_owned()))
            .collect();
        let body = response.bytes().await?.to_vec();

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}

/// Default response handler: parses the body as JSON and flattens it into a
/// tuple sequence. An object becomes one tuple, an array becomes the
/// sequence, null or an empty body becomes empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonResponseHandler;

impl JsonResponseHandler {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl ResponseHandler for JsonResponseHandler {
    async fn call(&self, response: RawResponse, _dataset: &Dataset) -> Result<Vec<Tuple>> {
        if response.body.is_empty() {
            return Ok(Vec::new());
        }
        let value: Value =
            serde_json::from_slice(&response.body).context("response body is not valid JSON")?;
        flatten(value)
    }
}

fn flatten(value: Value) -> Result<Vec<Tuple>> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Object(map) => Ok(vec![map]),
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(map) => Ok(map),
                other => Err(anyhow!("expected a JSON object in response array, got {other}")),
            })
            .collect(),
        other => Err(anyhow!("expected a JSON object or array, got {other}")),
    }
}
