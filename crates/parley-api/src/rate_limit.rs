//! Per-client sliding-window limit on POST requests.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::state::AppState;

/// Remembers the instants of accepted requests per client key and refuses a
/// request when `limit` of them already fall inside the trailing `window`.
pub struct SlidingWindowLimiter {
    limit: usize,
    window: Duration,
    hits: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl SlidingWindowLimiter {
    pub fn new(limit: usize, window: Duration) -> Self {
        Self {
            limit,
            window,
            hits: Mutex::new(HashMap::new()),
        }
    }

    /// Records a request for `key` at `now` if it is within the limit.
    /// Rejected requests are not recorded.
    pub fn check(&self, key: &str, now: Instant) -> bool {
        let mut hits = self.hits.lock().unwrap_or_else(|e| e.into_inner());
        let queue = hits.entry(key.to_string()).or_default();

        evict(queue, now, self.window);
        if queue.len() >= self.limit {
            return false;
        }
        queue.push_back(now);
        true
    }

    /// Drops clients with no request inside the window. Returns how many went.
    pub fn purge_idle(&self, now: Instant) -> usize {
        let mut hits = self.hits.lock().unwrap_or_else(|e| e.into_inner());
        let before = hits.len();
        hits.retain(|_, queue| {
            evict(queue, now, self.window);
            !queue.is_empty()
        });
        before - hits.len()
    }

    pub fn tracked_clients(&self) -> usize {
        self.hits.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

fn evict(queue: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(&oldest) = queue.front() {
        if now.saturating_duration_since(oldest) >= window {
            queue.pop_front();
        } else {
            break;
        }
    }
}

/// First `X-Forwarded-For` entry, else the peer address.
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    match (forwarded, peer) {
        (Some(ip), _) => ip.to_string(),
        (None, Some(addr)) => addr.ip().to_string(),
        (None, None) => "unknown".to_string(),
    }
}

pub async fn limit_posts(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if req.method() != Method::POST {
        return next.run(req).await;
    }

    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let key = client_key(req.headers(), peer);

    if state.limiter.check(&key, Instant::now()) {
        next.run(req).await
    } else {
        warn!(client = %key, path = %req.uri().path(), "Rate limit exceeded");
        ApiError::RateLimited.into_response()
    }
}

/// Background task that forgets idle clients so the map does not grow forever.
pub async fn run_purge_loop(state: AppState, every: Duration) {
    let mut interval = tokio::time::interval(every);

    loop {
        interval.tick().await;

        let purged = state.limiter.purge_idle(Instant::now());
        if purged > 0 {
            debug!("Rate limiter: forgot {} idle clients", purged);
        }
    }
}
