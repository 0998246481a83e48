//! Bounded readiness polling.
//!
//! Page rendering completion is not observable as an event, so every navigation
//! and scroll is followed by a poll loop: check a readiness predicate at a short
//! interval until it holds or a deadline passes. A `CancelToken` aborts the loop
//! cleanly mid-flight.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use tokio::time::sleep;

/// Cooperative cancellation flag shared across the scrape phase.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Polls `predicate` every `interval` until it returns true or `timeout` elapses.
///
/// Returns `Ok(true)` when the predicate held, `Ok(false)` on timeout. A
/// cancelled token is an error so callers unwind out of the scrape loop instead
/// of carrying on with a half-loaded page.
pub async fn poll_until<F>(
    interval: Duration,
    timeout: Duration,
    cancel: &CancelToken,
    mut predicate: F,
) -> Result<bool>
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if cancel.is_cancelled() {
            bail!("scrape cancelled");
        }
        if predicate() {
            return Ok(true);
        }
        if tokio::time::Instant::now() >= deadline {
            return Ok(false);
        }
        sleep(interval).await;
    }
}

/// Waits for the tab's `document.readyState` to reach `complete`, then a short
/// grace pause for late async inserts. Timeout is not an error: a slow page
/// degrades to partial extraction downstream.
pub async fn settle(
    tab: &Arc<headless_chrome::Tab>,
    timeout: Duration,
    cancel: &CancelToken,
) -> Result<()> {
    let ready = poll_until(Duration::from_millis(250), timeout, cancel, || {
        tab.evaluate("document.readyState", false)
            .ok()
            .and_then(|r| r.value)
            .map(|v| v == serde_json::json!("complete"))
            .unwrap_or(false)
    })
    .await?;

    if !ready {
        tracing::warn!("page did not settle within {:?}, continuing anyway", timeout);
    }
    sleep(Duration::from_millis(500)).await;
    Ok(())
}
