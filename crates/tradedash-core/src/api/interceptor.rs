//! Response interceptors for requests dispatched through `ApiClient::execute`.
//!
//! Interceptors run in registration order. Each sees the request that was sent,
//! the response, and how many times this logical request has already been
//! replayed. The replay count lives in the dispatch loop, never on the request.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use reqwest::{Request, Response};
use tracing::debug;

use super::ApiError;

/// Handle returned by `register`, used to `eject` the interceptor later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InterceptorId(u64);

/// What an interceptor wants done with a response.
pub enum Intercepted {
    /// Pass this response on (to the next interceptor, then the caller)
    Respond(Response),
    /// Dispatch this request in place of the original
    Replay(Request),
}

#[async_trait]
pub trait ResponseInterceptor: Send + Sync {
    async fn on_response(
        &self,
        request: &Request,
        response: Response,
        replays: u32,
    ) -> Result<Intercepted, ApiError>;
}

#[derive(Default)]
pub struct InterceptorChain {
    next_id: AtomicU64,
    entries: RwLock<Vec<(InterceptorId, Arc<dyn ResponseInterceptor>)>>,
}

impl InterceptorChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, interceptor: Arc<dyn ResponseInterceptor>) -> InterceptorId {
        let id = InterceptorId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, interceptor));
        debug!(id = id.0, "Registered response interceptor");
        id
    }

    /// Unregister an interceptor. Returns false if the id was unknown.
    pub fn eject(&self, id: InterceptorId) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        let removed = entries.len() != before;
        if removed {
            debug!(id = id.0, "Ejected response interceptor");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Snapshot so no lock is held across interceptor awaits.
    fn snapshot(&self) -> Vec<Arc<dyn ResponseInterceptor>> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(_, interceptor)| Arc::clone(interceptor))
            .collect()
    }

    /// Run every interceptor over a response. Stops at the first replay request.
    pub async fn run(
        &self,
        request: &Request,
        mut response: Response,
        replays: u32,
    ) -> Result<Intercepted, ApiError> {
        for interceptor in self.snapshot() {
            match interceptor.on_response(request, response, replays).await? {
                Intercepted::Respond(next) => response = next,
                replay @ Intercepted::Replay(_) => return Ok(replay),
            }
        }
        Ok(Intercepted::Respond(response))
    }
}
