//! Scrape orchestration: one authenticated session, one page, one Document.
//!
//! Strictly single-threaded over the browsing session; the tab is exclusively
//! owned here for the scrape's duration. Missing tabs degrade to empty
//! sections, session and persistence failures abort the run.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use scraper::Html;

use crate::dataset::{self, About, Document};
use crate::extract::Extractor;
use crate::navigate::{self, TabOutcome};
use crate::paginate::{self, ScrollProfile};
use crate::selectors::SelectorPlan;
use crate::session;
use crate::wait::{self, CancelToken};

pub async fn scrape_page(url: &str, cancel: &CancelToken) -> Result<PathBuf> {
    let plan = SelectorPlan::from_env()?;
    let extractor = Extractor::new(&plan);

    let session = session::open_authenticated(cancel).await?;
    let tab = &session.tab;

    tracing::info!("opening page {}", url);
    tab.navigate_to(url).with_context(|| format!("navigating to {url}"))?;
    tab.wait_until_navigated()?;
    wait::settle(tab, Duration::from_secs(10), cancel).await?;
    session::check_checkpoint(tab)?;

    // Feed: deep scroll, then one DOM snapshot for posts + recommendation.
    paginate::scroll_to_end(tab, ScrollProfile::FEED, cancel).await?;
    let (posts, recommendation) = {
        let html = Html::parse_document(&tab.get_content()?);
        (
            extractor.extract_posts(&html),
            extractor.extract_recommendation(&html),
        )
    };
    tracing::info!("scraped {} posts from feed", posts.len());

    // About: only scroll and extract when the tab exists on this page.
    let about = match navigate::navigate_to_tab(tab, "About", cancel).await? {
        TabOutcome::Found => {
            paginate::scroll_to_end(tab, ScrollProfile::ABOUT, cancel).await?;
            let html = Html::parse_document(&tab.get_content()?);
            About::Structured(extractor.extract_about(&html))
        }
        TabOutcome::NotFound => {
            tracing::info!("skipping About extraction, tab unavailable");
            About::default()
        }
    };

    let reviews = match navigate::navigate_to_tab(tab, "Reviews", cancel).await? {
        TabOutcome::Found => {
            paginate::scroll_to_end(tab, ScrollProfile::REVIEWS, cancel).await?;
            paginate::expand_truncated(tab, cancel).await?;
            let html = Html::parse_document(&tab.get_content()?);
            extractor.extract_reviews(&html)
        }
        TabOutcome::NotFound => {
            tracing::info!("skipping Reviews extraction, tab unavailable");
            Vec::new()
        }
    };
    tracing::info!("scraped {} reviews", reviews.len());

    let doc = Document { about, recommendation, reviews, posts };
    let path = dataset::dataset_path(url);
    dataset::save_document(&doc, &path)?;
    Ok(path)
}
