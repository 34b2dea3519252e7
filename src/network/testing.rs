//! In-memory transport for tests.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{Value, json};

use super::bucket::{BucketRegistry, ClientId};
use super::client::{HEADER_RESET, HEADER_REMAINING, HttpRequest, HttpResponse, HttpTransport, RequestClient};
use crate::error::ApiError;

type Handler = Arc<dyn Fn(&HttpRequest) -> HttpResponse + Send + Sync>;

/// Answers requests by path and records every request it sees.
#[derive(Default)]
pub struct FakeTransport {
    handlers: Mutex<Vec<(String, Handler)>>,
    calls: Mutex<Vec<HttpRequest>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the handler for `path`.
    pub fn on<F>(&self, path: &str, handler: F)
    where
        F: Fn(&HttpRequest) -> HttpResponse + Send + Sync + 'static,
    {
        let handler: Handler = Arc::new(handler);
        let mut handlers = self.handlers.lock();
        handlers.retain(|(p, _)| p != path);
        handlers.push((path.to_string(), handler));
    }

    pub fn calls(&self) -> Vec<HttpRequest> {
        self.calls.lock().clone()
    }

    pub fn calls_to(&self, path: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|r| r.url.path().ends_with(path))
            .count()
    }
}

impl HttpTransport for FakeTransport {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        self.calls.lock().push(request.clone());
        let handler = self
            .handlers
            .lock()
            .iter()
            .find(|(path, _)| request.url.path().ends_with(path.as_str()))
            .map(|(_, handler)| Arc::clone(handler));
        match handler {
            Some(handler) => Ok(handler(&request)),
            None => Ok(api_error(404, 404, "no handler")),
        }
    }
}

pub fn ok(data: Value) -> HttpResponse {
    HttpResponse {
        status: 200,
        headers: Vec::new(),
        body: json!({"code": 0, "message": "", "data": data}).to_string(),
    }
}

pub fn ok_with_limits(data: Value, remaining: i64, reset_secs: &str) -> HttpResponse {
    let mut response = ok(data);
    response.headers.push((HEADER_REMAINING.to_string(), remaining.to_string()));
    response.headers.push((HEADER_RESET.to_string(), reset_secs.to_string()));
    response
}

pub fn api_error(status: u16, code: i64, message: &str) -> HttpResponse {
    HttpResponse {
        status,
        headers: Vec::new(),
        body: json!({"code": code, "message": message, "data": {}}).to_string(),
    }
}

/// Query parameter of a recorded request.
pub fn query_param(request: &HttpRequest, name: &str) -> Option<String> {
    request
        .url
        .query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

/// Request client over `transport` with a private bucket registry and a
/// wait policy that never blocks.
pub fn request_client(transport: Arc<FakeTransport>) -> Arc<RequestClient> {
    Arc::new(
        RequestClient::new(ClientId::next(), "http://api.test/api", "token", transport)
            .with_buckets(Arc::new(BucketRegistry::new()))
            .with_policy(Arc::new(|_: &str, _: u64| {})),
    )
}
