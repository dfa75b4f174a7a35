use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::models::RateWindow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed,
    Limited,
}

/// Fixed-window counter keyed by client identity. State lives in process
/// memory only, so separate instances never share quotas.
pub struct RateLimiter {
    capacity: u32,
    window: Duration,
    windows: Mutex<HashMap<String, RateWindow>>,
}

impl RateLimiter {
    pub fn new(capacity: u32, window: Duration) -> Self {
        Self {
            capacity,
            window,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub async fn check(&self, client_id: &str) -> RateDecision {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;

        let Some(window) = windows.get_mut(client_id) else {
            windows.insert(
                client_id.to_string(),
                RateWindow {
                    count: 1,
                    window_start: now,
                },
            );
            return RateDecision::Allowed;
        };

        if now.duration_since(window.window_start) > self.window {
            window.count = 1;
            window.window_start = now;
            RateDecision::Allowed
        } else if window.count < self.capacity {
            window.count += 1;
            RateDecision::Allowed
        } else {
            RateDecision::Limited
        }
    }

    /// Drops every window that has already elapsed; returns how many were removed.
    pub async fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;
        let before = windows.len();
        windows.retain(|_, w| now.duration_since(w.window_start) <= self.window);
        let removed = before - windows.len();
        if removed > 0 {
            debug!(removed, remaining = windows.len(), "swept stale rate-limit windows");
        }
        removed
    }

    pub async fn tracked_clients(&self) -> usize {
        self.windows.lock().await.len()
    }
}
