//! Session store: authenticated browser contexts.
//!
//! The scraper only asks two things of this module: "give me an authenticated
//! tab" and "save the credentials for next time". Credentials are a serialized
//! cookie blob at a fixed path; when it exists the login page is skipped, when
//! it does not the operator logs in manually once and the cookies are captured.
//! Any failure here is fatal to the scrape.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde::{Deserialize, Serialize};

use crate::wait::{self, CancelToken};

const LOGIN_URL: &str = "https://www.facebook.com/";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    pub secure: bool,
}

pub struct Session {
    // Kept alive for the lifetime of the scrape; dropping it closes Chrome.
    _browser: Browser,
    pub tab: Arc<Tab>,
}

pub fn session_file() -> PathBuf {
    std::env::var("FRAUDLENS_SESSION_FILE")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("session/facebook_cookies.json"))
}

fn headless() -> bool {
    matches!(
        std::env::var("FRAUDLENS_HEADLESS").as_deref(),
        Ok("1") | Ok("true")
    )
}

/// Launches Chrome, restores or captures the cookie blob, and returns a tab
/// positioned on the logged-in home page.
pub async fn open_authenticated(cancel: &CancelToken) -> Result<Session> {
    let args = vec![
        std::ffi::OsStr::new("--disable-blink-features=AutomationControlled"),
        std::ffi::OsStr::new("--disable-popup-blocking"),
        std::ffi::OsStr::new("--no-sandbox"),
        std::ffi::OsStr::new("--disable-dev-shm-usage"),
        std::ffi::OsStr::new("--disable-infobars"),
        std::ffi::OsStr::new("--start-maximized"),
    ];

    let browser = Browser::new(LaunchOptions {
        headless: headless(),
        window_size: Some((1920, 1080)),
        args,
        ..Default::default()
    })
    .context("launching Chrome")?;

    let tab = browser.new_tab().context("opening tab")?;
    tab.navigate_to(LOGIN_URL).context("navigating to login page")?;
    tab.wait_until_navigated()?;
    wait::settle(&tab, Duration::from_secs(10), cancel).await?;

    let blob = session_file();
    if blob.exists() {
        let cookies = load_cookies()?;
        tracing::info!("restoring {} cookies from {}", cookies.len(), blob.display());
        inject_cookies(&tab, &cookies)?;
        tab.reload(false, None)?;
        tab.wait_until_navigated()?;
        wait::settle(&tab, Duration::from_secs(10), cancel).await?;
    } else {
        if headless() {
            bail!(
                "no session blob at {} and FRAUDLENS_HEADLESS is set; run once headful to log in",
                blob.display()
            );
        }
        println!("Log in manually in the browser window, then press Enter here...");
        let mut line = String::new();
        std::io::stdin().read_line(&mut line).context("reading login confirmation")?;
        save_cookies(&tab)?;
    }

    check_checkpoint(&tab)?;
    Ok(Session { _browser: browser, tab })
}

pub fn load_cookies() -> Result<Vec<StoredCookie>> {
    let blob = session_file();
    let raw = std::fs::read_to_string(&blob)
        .with_context(|| format!("reading session blob {}", blob.display()))?;
    let cookies = serde_json::from_str(&raw)
        .with_context(|| format!("parsing session blob {}", blob.display()))?;
    Ok(cookies)
}

/// Captures the tab's cookies and persists them for the next run.
pub fn save_cookies(tab: &Arc<Tab>) -> Result<()> {
    let cookies: Vec<StoredCookie> = tab
        .get_cookies()
        .context("reading cookies from tab")?
        .into_iter()
        .map(|c| StoredCookie {
            name: c.name,
            value: c.value,
            domain: c.domain,
            path: c.path,
            secure: c.secure,
        })
        .collect();

    let blob = session_file();
    if let Some(parent) = blob.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating session directory {}", parent.display()))?;
    }
    std::fs::write(&blob, serde_json::to_string_pretty(&cookies)?)
        .with_context(|| format!("writing session blob {}", blob.display()))?;
    tracing::info!("saved {} cookies to {}", cookies.len(), blob.display());
    Ok(())
}

/// Injects stored cookies over CDP, one `Network.setCookie` per cookie. A
/// single rejected cookie is logged and skipped; authentication may still
/// succeed on the remainder.
pub fn inject_cookies(tab: &Arc<Tab>, cookies: &[StoredCookie]) -> Result<()> {
    use headless_chrome::protocol::cdp::Network;

    for cookie in cookies {
        let result = tab.call_method(Network::SetCookie {
            name: cookie.name.clone(),
            value: cookie.value.clone(),
            url: None,
            domain: Some(cookie.domain.clone()),
            path: Some(cookie.path.clone()),
            secure: Some(cookie.secure),
            http_only: Some(false),
            same_site: None,
            expires: None,
            priority: None,
            same_party: None,
            source_scheme: None,
            source_port: None,
            partition_key: None,
        });
        if let Err(e) = result {
            tracing::warn!("failed to set cookie {}: {}", cookie.name, e);
        }
    }
    Ok(())
}

/// Fatal when the session has been diverted to a checkpoint or lockout page.
pub fn check_checkpoint(tab: &Arc<Tab>) -> Result<()> {
    let url = tab.get_url();
    if ["checkpoint", "challenge", "suspicious", "banned"]
        .iter()
        .any(|m| url.contains(m))
    {
        bail!("checkpoint URL detected: {}", url);
    }
    if let Ok(html) = tab.get_content() {
        if html.contains("Verify it's you")
            || html.contains("security check")
            || html.contains("temporarily locked")
        {
            bail!("checkpoint content detected");
        }
    }
    Ok(())
}
