#![cfg(feature = "mock")]

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use serde_json::Value;

use crate::{
    errors::{TransportError, TransportErrorKind},
    request::ResolvedRequest,
    transport::{BoxFuture, RawResponse, Transport},
};

/// Scripted in-memory transport for offline tests.
///
/// Responses are handed out in the order they were queued. Every request is
/// recorded so tests can assert on URLs, headers and bodies. Once the script
/// runs out, requests get a 500 with an `errors` body.
#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Arc<MockInner>,
}

#[derive(Default)]
struct MockInner {
    responses: Mutex<VecDeque<Result<RawResponse, TransportError>>>,
    requests: Mutex<Vec<ResolvedRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(self, response: RawResponse) -> Self {
        self.push(Ok(response));
        self
    }

    pub fn with_json(self, status: u16, body: Value) -> Self {
        self.with_response(RawResponse::new(status, body.to_string()))
    }

    pub fn with_transport_error(self, kind: TransportErrorKind, message: &str) -> Self {
        self.push(Err(TransportError::new(kind, message)));
        self
    }

    /// Requests seen so far, in send order.
    pub fn requests(&self) -> Vec<ResolvedRequest> {
        self.inner
            .requests
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    /// Responses still queued.
    pub fn remaining(&self) -> usize {
        self.inner
            .responses
            .lock()
            .map(|guard| guard.len())
            .unwrap_or(0)
    }

    fn push(&self, entry: Result<RawResponse, TransportError>) {
        if let Ok(mut guard) = self.inner.responses.lock() {
            guard.push_back(entry);
        }
    }

    fn next(&self) -> Result<RawResponse, TransportError> {
        self.inner
            .responses
            .lock()
            .ok()
            .and_then(|mut guard| guard.pop_front())
            .unwrap_or_else(|| {
                Ok(RawResponse::new(
                    500,
                    r#"{"errors":[{"code":131,"message":"mock script exhausted"}]}"#,
                ))
            })
    }
}

impl Transport for MockTransport {
    fn send<'a>(
        &'a self,
        request: &'a ResolvedRequest,
    ) -> BoxFuture<'a, Result<RawResponse, TransportError>> {
        if let Ok(mut guard) = self.inner.requests.lock() {
            guard.push(request.clone());
        }
        let next = self.next();
        Box::pin(async move { next })
    }
}
