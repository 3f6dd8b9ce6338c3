use std::collections::BTreeMap;

use forge_http::{HttpMethod, HttpRequestRouter, Matched, RequestLike, ResponseLike, RoutingError};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// An in-memory stand-in for a transport request, implementing
/// [`RequestLike`] without binding a socket or running an HTTP server.
#[derive(Debug, Clone)]
pub struct FakeRequest {
    method: HttpMethod,
    path: String,
    host: Option<String>,
    headers: BTreeMap<String, String>,
    body: Vec<u8>,
}

impl FakeRequest {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self { method, path: path.into(), host: None, headers: BTreeMap::new(), body: Vec::new() }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Put, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, path)
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn bearer(self, token: &str) -> Self {
        self.with_header("authorization", format!("Bearer {token}"))
    }

    pub fn with_json(mut self, body: &impl Serialize) -> Self {
        self.body = serde_json::to_vec(body).expect("serializable test body");
        self.with_header("content-type", "application/json")
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(&key.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

impl RequestLike for FakeRequest {
    fn method(&self) -> HttpMethod {
        self.method
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }
}

/// Outcome of resolving a [`FakeRequest`] against an
/// [`HttpRequestRouter`], carrying just enough to assert on in a test.
#[derive(Debug, Clone)]
pub struct FakeResponse {
    pub status: u16,
    pub route_name: Option<String>,
    pub params: BTreeMap<String, String>,
}

impl ResponseLike for FakeResponse {
    fn status(&self) -> u16 {
        self.status
    }
}

impl FakeResponse {
    fn from_matched(matched: &Matched<'_>) -> Self {
        Self {
            status: 200,
            route_name: matched.route.name.clone(),
            params: matched.context.params.clone(),
        }
    }

    fn from_error(error: &RoutingError) -> Self {
        let status = match error {
            RoutingError::RouteNotFound => 404,
            RoutingError::MethodNotAllowed { .. } => 405,
            RoutingError::DuplicateRoute { .. }
            | RoutingError::InvalidPath { .. }
            | RoutingError::UnsupportedMethod { .. }
            | RoutingError::NoActiveGroup => {
                unreachable!("router.resolve() only ever returns RouteNotFound or MethodNotAllowed")
            }
        };
        Self { status, route_name: None, params: BTreeMap::new() }
    }

    pub fn assert_status(&self, expected: u16) -> &Self {
        assert_eq!(self.status, expected, "expected status {expected}, got {}", self.status);
        self
    }

    pub fn assert_route(&self, expected: &str) -> &Self {
        assert_eq!(self.route_name.as_deref(), Some(expected));
        self
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

/// In-process test client dispatching [`FakeRequest`]s straight into an
/// [`HttpRequestRouter`] without a socket, mirroring the teacher's
/// `oneshot`-based `TestApp` for the synchronous router here.
pub struct TestApp {
    router: HttpRequestRouter,
}

impl TestApp {
    pub fn new(router: HttpRequestRouter) -> Self {
        Self { router }
    }

    pub fn dispatch(&self, request: &FakeRequest) -> FakeResponse {
        match self.router.resolve(request) {
            Ok(matched) => FakeResponse::from_matched(&matched),
            Err(error) => FakeResponse::from_error(&error),
        }
    }

    pub fn get(&self, path: &str) -> FakeResponse {
        self.dispatch(&FakeRequest::get(path))
    }

    pub fn json<T: DeserializeOwned>(&self, bytes: &[u8]) -> T {
        serde_json::from_slice(bytes).unwrap_or_else(|e| panic!("failed to parse JSON: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_core::telemetry::NullSink;
    use forge_http::{HandlerRef, RouterDsl};
    use std::sync::Arc;

    fn app() -> TestApp {
        let mut dsl = RouterDsl::new();
        dsl.get("/users/{id}", HandlerRef::Named("users#show".into()))
            .unwrap()
            .name("users.show");
        TestApp::new(HttpRequestRouter::from_registry(dsl.into_registry(), Arc::new(NullSink)))
    }

    #[test]
    fn matches_named_route_and_extracts_param() {
        let response = app().get("/users/42");
        response.assert_status(200).assert_route("users.show");
        assert_eq!(response.param("id"), Some("42"));
    }

    #[test]
    fn missing_route_is_404() {
        let response = app().get("/nowhere");
        response.assert_status(404);
    }
}
