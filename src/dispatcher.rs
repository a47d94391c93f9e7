//! Per-request orchestration between the router and the key store

use crate::error::Result;
use crate::protocol::{parse_request, Request, Response};
use crate::router::Router;
use crate::store::KeyStore;
use serde_json::Value as Json;
use std::sync::Arc;
use tracing::debug;

/// Routes parsed requests into the key store and turns every failure into a
/// response line, so an operation error never ends the connection.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    store: Arc<KeyStore>,
    router: Arc<Router>,
}

impl Dispatcher {
    pub fn new(store: Arc<KeyStore>, router: Arc<Router>) -> Self {
        Self { store, router }
    }

    pub fn store(&self) -> &Arc<KeyStore> {
        &self.store
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    /// Execute a request, propagating failures as errors.
    pub async fn execute(&self, request: &Request) -> Result<Json> {
        self.store.execute(&self.router, request).await
    }

    /// Execute a request and render the outcome as a response.
    pub async fn dispatch(&self, request: &Request) -> Response {
        match self.execute(request).await {
            Ok(value) => Response::Value(value),
            Err(e) => {
                debug!(op = %request.op, key = %request.key, error = %e, "request failed");
                Response::from(e)
            }
        }
    }

    /// Tokenize and dispatch one request line, terminator already stripped.
    pub async fn dispatch_line(&self, line: &str) -> Response {
        match parse_request(line) {
            Ok(request) => self.dispatch(&request).await,
            Err(e) => Response::from(e),
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(Arc::new(KeyStore::new()), Arc::new(Router::new()))
    }
}
