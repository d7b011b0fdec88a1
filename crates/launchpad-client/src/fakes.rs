//! In-memory fakes for the transport seam (testing only)
//!
//! [`FakeTransport`] answers requests from scripted routes and records every
//! request it sees, so tests can assert on exactly which calls were issued.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::transport::{HttpRequest, HttpResponse, Method, Transport};
use crate::Result;

#[derive(Debug)]
struct Route {
    method: Method,
    suffix: String,
    responses: VecDeque<HttpResponse>,
}

/// Scripted transport.
///
/// A route matches when the method is equal and the request URL ends with
/// the route's suffix; the most recently added matching route wins. Each
/// route replays its queued responses in order and keeps returning the last
/// one once the queue is down to a single entry. Unrouted requests get a 404.
#[derive(Debug, Default)]
pub struct FakeTransport {
    routes: Mutex<Vec<Route>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a JSON response for `method` + URL suffix
    pub fn respond(&self, method: Method, suffix: &str, status: u16, body: Value) {
        self.respond_raw(method, suffix, status, &body.to_string());
    }

    /// Queue a raw-text response for `method` + URL suffix
    pub fn respond_raw(&self, method: Method, suffix: &str, status: u16, body: &str) {
        let response = HttpResponse::new(status, body);
        let mut routes = self.routes.lock().unwrap();
        if let Some(route) = routes
            .iter_mut()
            .find(|r| r.method == method && r.suffix == suffix)
        {
            route.responses.push_back(response);
            return;
        }
        routes.push(Route {
            method,
            suffix: suffix.to_string(),
            responses: VecDeque::from([response]),
        });
    }

    /// Every request seen so far, in order
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Requests whose URL ends with `suffix`
    pub fn requests_to(&self, suffix: &str) -> Vec<HttpRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.url.ends_with(suffix))
            .collect()
    }

    /// Parsed JSON bodies of requests whose URL ends with `suffix`
    pub fn bodies_sent_to(&self, suffix: &str) -> Vec<Value> {
        self.requests_to(suffix)
            .into_iter()
            .filter_map(|r| r.body)
            .filter_map(|b| serde_json::from_str(&b).ok())
            .collect()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let response = {
            let mut routes = self.routes.lock().unwrap();
            match routes
                .iter_mut()
                .rev()
                .find(|r| r.method == request.method && request.url.ends_with(&r.suffix))
            {
                Some(route) if route.responses.len() > 1 => route.responses.pop_front(),
                Some(route) => route.responses.front().cloned(),
                None => None,
            }
        };
        self.requests.lock().unwrap().push(request);

        Ok(response.unwrap_or_else(|| HttpResponse::new(404, "no route")))
    }
}
