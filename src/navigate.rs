//! Tab navigation inside a dynamic, overflow-nested navigation bar.
//!
//! Lookup runs as injected JS (click by descendant span text), first against
//! the primary nav and then inside the overflow "More" menu. A tab missing from
//! both is `NotFound`: the feature is unavailable on this page, not an error.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use headless_chrome::Tab;

use crate::wait::{self, CancelToken};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavState {
    Idle,
    SearchingMainNav,
    SearchingMoreMenu,
    Found,
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabOutcome {
    Found,
    NotFound,
}

/// Pure transition function for the tab-search state machine.
pub fn next_state(state: NavState, hit: bool) -> NavState {
    match (state, hit) {
        (NavState::Idle, _) => NavState::SearchingMainNav,
        (NavState::SearchingMainNav, true) => NavState::Found,
        (NavState::SearchingMainNav, false) => NavState::SearchingMoreMenu,
        (NavState::SearchingMoreMenu, true) => NavState::Found,
        (NavState::SearchingMoreMenu, false) => NavState::NotFound,
        (terminal, _) => terminal,
    }
}

fn eval_bool(tab: &Arc<Tab>, js: &str) -> Result<bool> {
    let result = tab.evaluate(js, false)?;
    Ok(result.value == Some(serde_json::Value::Bool(true)))
}

fn click_tab_js(tab_name: &str) -> String {
    // serde_json produces a valid JS string literal, quoting included.
    let label = serde_json::to_string(tab_name).unwrap_or_else(|_| "\"\"".to_string());
    format!(
        r#"(() => {{
            const label = {label};
            for (const a of document.querySelectorAll('a')) {{
                for (const span of a.querySelectorAll('span')) {{
                    if (span.textContent && span.textContent.includes(label)) {{
                        a.click();
                        return true;
                    }}
                }}
            }}
            return false;
        }})()"#
    )
}

const OPEN_MORE_MENU_JS: &str = r#"(() => {
    for (const el of document.querySelectorAll('div[aria-label]')) {
        const label = el.getAttribute('aria-label') || '';
        if (label.includes('More') || label.includes('See more')) {
            el.click();
            return true;
        }
    }
    return false;
})()"#;

/// Locates and activates the named tab. Side effect only: the shared tab's
/// current view changes on `Found`; `NotFound` leaves it wherever it was.
pub async fn navigate_to_tab(
    tab: &Arc<Tab>,
    tab_name: &str,
    cancel: &CancelToken,
) -> Result<TabOutcome> {
    tracing::info!("checking if '{}' tab is available", tab_name);
    tab.evaluate("window.scrollTo(0, 0);", false)?;
    wait::settle(tab, Duration::from_secs(5), cancel).await?;

    let mut state = next_state(NavState::Idle, false);
    let click_js = click_tab_js(tab_name);

    // Primary navigation bar.
    let hit = eval_bool(tab, &click_js)?;
    state = next_state(state, hit);

    if state == NavState::SearchingMoreMenu {
        tracing::info!("'{}' not in main navigation, checking overflow menu", tab_name);
        if eval_bool(tab, OPEN_MORE_MENU_JS)? {
            wait::settle(tab, Duration::from_secs(5), cancel).await?;
            let hit = eval_bool(tab, &click_js)?;
            state = next_state(state, hit);
        } else {
            state = next_state(state, false);
        }
    }

    match state {
        NavState::Found => {
            wait::settle(tab, Duration::from_secs(10), cancel).await?;
            tracing::info!("'{}' tab activated", tab_name);
            Ok(TabOutcome::Found)
        }
        _ => {
            tracing::info!("'{}' tab unavailable on this page", tab_name);
            Ok(TabOutcome::NotFound)
        }
    }
}
