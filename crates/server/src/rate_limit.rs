//! Fixed-window request limits per client source.

use std::collections::HashMap;

use tokio::sync::Mutex;

use crate::error::RelayError;

#[derive(Clone, Copy, Debug)]
struct Window {
    count: u32,
    resets_at: i64,
}

#[derive(Debug)]
pub struct RateLimiter {
    limit: u32,
    window_ms: i64,
    windows: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    pub fn new(limit: u32, window_ms: i64) -> Self {
        Self {
            limit,
            window_ms,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Count one request from `source`. Over the limit the request is
    /// refused and not counted.
    pub async fn check(&self, source: &str, now: i64) -> Result<(), RelayError> {
        let mut windows = self.windows.lock().await;

        let window = windows.entry(source.to_string()).or_insert(Window {
            count: 0,
            resets_at: now + self.window_ms,
        });
        if now >= window.resets_at {
            *window = Window {
                count: 0,
                resets_at: now + self.window_ms,
            };
        }

        if window.count >= self.limit {
            let wait_ms = (window.resets_at - now).max(0);
            return Err(RelayError::RateLimited {
                retry_after_secs: (wait_ms as u64).div_ceil(1000),
            });
        }

        window.count += 1;
        Ok(())
    }

    /// Forget windows that have already reset. Returns how many were dropped.
    pub async fn prune(&self, now: i64) -> usize {
        let mut windows = self.windows.lock().await;
        let before = windows.len();
        windows.retain(|_, window| now < window.resets_at);
        before - windows.len()
    }
}
