//! Rate-limited request client.
//!
//! Every call resolves its bucket, checks it, performs the HTTP exchange,
//! unwraps the `{code, message, data}` envelope and feeds the rate-limit
//! headers back into the bucket. No retries, no cache awareness.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use url::Url;

use super::bucket::{BucketRegistry, ClientId};
use super::policy::{SleepUntilReset, WaitPolicy};
use super::route::{HttpRoute, Method};
use crate::error::ApiError;

/// Remaining calls in the current window.
pub const HEADER_REMAINING: &str = "X-Rate-Limit-Remaining";
/// Seconds until the window resets.
pub const HEADER_RESET: &str = "X-Rate-Limit-Reset";

/// Outgoing request, independent of the HTTP library.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
}

#[derive(Debug, Clone)]
pub enum RequestBody {
    Empty,
    Json(String),
    Multipart { boundary: String, data: Vec<u8> },
}

/// Raw response as delivered by the transport, whatever its status.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Performs one HTTP exchange.
///
/// Non-2xx statuses are returned as responses, not errors; only failures to
/// get any response at all are errors.
pub trait HttpTransport: Send + Sync {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError>;
}

/// Blocking transport backed by `ureq`.
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new() -> Self {
        Self {
            agent: ureq::AgentBuilder::new().build(),
        }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpTransport for UreqTransport {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        let mut call = self
            .agent
            .request(request.method.as_str(), request.url.as_str());
        for (name, value) in &request.headers {
            call = call.set(name, value);
        }

        let result = match &request.body {
            RequestBody::Empty => call.call(),
            RequestBody::Json(payload) => call
                .set("Content-Type", "application/json")
                .send_string(payload),
            RequestBody::Multipart { boundary, data } => call
                .set(
                    "Content-Type",
                    &format!("multipart/form-data; boundary={boundary}"),
                )
                .send_bytes(data),
        };

        let response = match result {
            Ok(resp) => resp,
            Err(ureq::Error::Status(_, resp)) => resp,
            Err(ureq::Error::Transport(err)) => return Err(ApiError::Transport(err.to_string())),
        };

        let status = response.status();
        let headers = response
            .headers_names()
            .into_iter()
            .filter_map(|name| {
                let value = response.header(&name)?.to_string();
                Some((name, value))
            })
            .collect();
        let body = response
            .into_string()
            .map_err(|err| ApiError::Decode(err.to_string()))?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

/// A file to send through a multipart upload.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl Upload {
    pub fn from_bytes(file_name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: "application/octet-stream".to_string(),
            data,
        }
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ApiError> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string());
        Ok(Self::from_bytes(file_name, data))
    }

    #[must_use]
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    /// Encode as a single `file` part.
    fn encode(&self, boundary: &str) -> Vec<u8> {
        let mut body = Vec::with_capacity(self.data.len() + 256);
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
                self.file_name.replace('"', "")
            )
            .as_bytes(),
        );
        body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", self.content_type).as_bytes());
        body.extend_from_slice(&self.data);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
        body
    }
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: Value,
}

/// Synchronous, rate-limited RPC primitive against the remote API.
pub struct RequestClient {
    id: ClientId,
    base_url: String,
    authorization: String,
    transport: Arc<dyn HttpTransport>,
    buckets: Arc<BucketRegistry>,
    policy: Arc<dyn WaitPolicy>,
    low_water: i64,
}

impl RequestClient {
    /// Create a client using the global bucket registry and the default
    /// sleeping wait policy.
    pub fn new(
        id: ClientId,
        base_url: impl Into<String>,
        token: &str,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            id,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            authorization: format!("Bot {token}"),
            transport,
            buckets: BucketRegistry::global(),
            policy: Arc::new(SleepUntilReset::default()),
            low_water: 0,
        }
    }

    #[must_use]
    pub fn with_buckets(mut self, buckets: Arc<BucketRegistry>) -> Self {
        self.buckets = buckets;
        self
    }

    #[must_use]
    pub fn with_policy(mut self, policy: Arc<dyn WaitPolicy>) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_low_water(mut self, low_water: i64) -> Self {
        self.low_water = low_water;
        self
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    pub fn buckets(&self) -> &Arc<BucketRegistry> {
        &self.buckets
    }

    /// `GET` a route with query parameters, returning the envelope's `data`.
    pub fn get(&self, route: HttpRoute, query: &[(&str, &str)]) -> Result<Value, ApiError> {
        let url = self.url(route, query)?;
        self.call(route, url, RequestBody::Empty)
    }

    /// `POST` a JSON body.
    pub fn post_json<T>(&self, route: HttpRoute, body: &T) -> Result<Value, ApiError>
    where
        T: Serialize + ?Sized,
    {
        let payload = serde_json::to_string(body).map_err(|err| ApiError::Decode(err.to_string()))?;
        let url = self.url(route, &[])?;
        self.call(route, url, RequestBody::Json(payload))
    }

    /// `POST` a file as `multipart/form-data`.
    pub fn post_multipart(&self, route: HttpRoute, upload: &Upload) -> Result<Value, ApiError> {
        let boundary = format!(
            "guildline-{}-{}",
            self.id.get(),
            chrono::Utc::now().timestamp_micros()
        );
        let data = upload.encode(&boundary);
        let url = self.url(route, &[])?;
        self.call(route, url, RequestBody::Multipart { boundary, data })
    }

    fn url(&self, route: HttpRoute, query: &[(&str, &str)]) -> Result<Url, ApiError> {
        let raw = format!("{}{}", self.base_url, route.path());
        let parsed = if query.is_empty() {
            Url::parse(&raw)
        } else {
            Url::parse_with_params(&raw, query)
        };
        parsed.map_err(|err| ApiError::Transport(format!("invalid url {raw}: {err}")))
    }

    fn call(&self, route: HttpRoute, url: Url, body: RequestBody) -> Result<Value, ApiError> {
        let bucket = self.buckets.get(self.id, route);
        bucket.check(self.low_water, self.policy.as_ref());

        let request = HttpRequest {
            method: route.method(),
            url,
            headers: vec![("Authorization".to_string(), self.authorization.clone())],
            body,
        };
        let response = self.transport.execute(request)?;
        let data = parse_envelope(&response)?;

        if let Some((remaining, reset_millis)) = rate_limit_feedback(&response) {
            bucket.update(remaining, reset_millis);
        }
        debug!("{} -> {}", route, response.status);
        Ok(data)
    }
}

impl fmt::Debug for RequestClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestClient")
            .field("id", &self.id)
            .field("base_url", &self.base_url)
            .field("low_water", &self.low_water)
            .finish()
    }
}

fn parse_envelope(response: &HttpResponse) -> Result<Value, ApiError> {
    match serde_json::from_str::<Envelope>(&response.body) {
        Ok(envelope) if response.is_success() && envelope.code == 0 => Ok(envelope.data),
        Ok(envelope) => Err(ApiError::BadResponse {
            status: response.status,
            code: envelope.code,
            message: envelope.message,
        }),
        Err(_) if !response.is_success() => Err(ApiError::BadResponse {
            status: response.status,
            code: i64::from(response.status),
            message: response.body.chars().take(200).collect(),
        }),
        Err(err) => Err(ApiError::Decode(err.to_string())),
    }
}

/// `(remaining, reset window in millis)` when both headers parse.
fn rate_limit_feedback(response: &HttpResponse) -> Option<(i64, u64)> {
    let remaining = response.header(HEADER_REMAINING)?.trim().parse::<i64>().ok()?;
    let reset_secs = response.header(HEADER_RESET)?.trim().parse::<f64>().ok()?;
    let reset_millis = (reset_secs.max(0.0) * 1000.0).round() as u64;
    Some((remaining, reset_millis))
}
