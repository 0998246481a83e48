//! Scroll-driven lazy loading.
//!
//! Repeatedly scrolls to the content boundary and re-measures the document
//! height, stopping once the height stops growing or an iteration bound is
//! reached. The bounds vary by section and are configuration, not constants.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use headless_chrome::Tab;

use crate::wait::{self, CancelToken};

#[derive(Debug, Clone, Copy)]
pub struct ScrollProfile {
    pub max_scrolls: usize,
    pub pause: Duration,
    /// Consecutive unchanged height readings required before stopping. The
    /// default of 1 matches the original behavior and is a known correctness
    /// risk: one lagged reading can look "stable" before all content loaded,
    /// and extraction then silently under-collects. Raise to 2+ to trade
    /// latency for completeness.
    pub stable_reads: usize,
}

impl ScrollProfile {
    pub const FEED: ScrollProfile = ScrollProfile {
        max_scrolls: 15,
        pause: Duration::from_secs(3),
        stable_reads: 1,
    };
    pub const REVIEWS: ScrollProfile = ScrollProfile {
        max_scrolls: 50,
        pause: Duration::from_secs(3),
        stable_reads: 1,
    };
    pub const ABOUT: ScrollProfile = ScrollProfile {
        max_scrolls: 2,
        pause: Duration::from_secs(3),
        stable_reads: 1,
    };
}

fn measure_height(tab: &Arc<Tab>) -> Result<f64> {
    let result = tab.evaluate("document.body.scrollHeight", false)?;
    Ok(result
        .value
        .as_ref()
        .and_then(|v| v.as_f64())
        .unwrap_or(0.0))
}

/// Scrolls until the page height stabilizes or the profile's bound is hit.
/// Returns the number of scroll iterations performed.
pub async fn scroll_to_end(
    tab: &Arc<Tab>,
    profile: ScrollProfile,
    cancel: &CancelToken,
) -> Result<usize> {
    let mut last_height = measure_height(tab)?;
    let mut stable = 0;

    for i in 0..profile.max_scrolls {
        tab.evaluate("window.scrollTo(0, document.body.scrollHeight);", false)?;

        // Wait for the height to move; a timeout is the "stable" signal.
        let grew = wait::poll_until(Duration::from_millis(250), profile.pause, cancel, || {
            measure_height(tab).map(|h| h > last_height).unwrap_or(false)
        })
        .await?;

        let new_height = measure_height(tab)?;
        if !grew && new_height <= last_height {
            stable += 1;
            if stable >= profile.stable_reads {
                tracing::info!("scrolling finished after {} iterations", i + 1);
                return Ok(i + 1);
            }
        } else {
            stable = 0;
        }
        last_height = new_height;
    }
    tracing::info!("scroll bound of {} reached", profile.max_scrolls);
    Ok(profile.max_scrolls)
}

const EXPAND_SEE_MORE_JS: &str = r#"(() => {
    let clicked = 0;
    for (const el of document.querySelectorAll('div')) {
        const t = (el.textContent || '').trim();
        if (t === 'See More' || t === 'See more') {
            el.click();
            clicked += 1;
        }
    }
    return clicked;
})()"#;

/// Clicks inline "See More" truncation toggles until none remain, bounded to a
/// fixed number of rounds so a sticky toggle cannot loop forever.
pub async fn expand_truncated(tab: &Arc<Tab>, cancel: &CancelToken) -> Result<()> {
    for _ in 0..10 {
        if cancel.is_cancelled() {
            anyhow::bail!("scrape cancelled");
        }
        let result = tab.evaluate(EXPAND_SEE_MORE_JS, false)?;
        let clicked = result.value.as_ref().and_then(|v| v.as_u64()).unwrap_or(0);
        if clicked == 0 {
            return Ok(());
        }
        wait::settle(tab, Duration::from_secs(2), cancel).await?;
    }
    tracing::warn!("see-more expansion round limit reached");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profiles_carry_the_observed_bounds() {
        assert_eq!(ScrollProfile::FEED.max_scrolls, 15);
        assert_eq!(ScrollProfile::REVIEWS.max_scrolls, 50);
        assert_eq!(ScrollProfile::ABOUT.max_scrolls, 2);
        // Single-reading stop is the documented default, not an accident.
        assert_eq!(ScrollProfile::FEED.stable_reads, 1);
    }
}
