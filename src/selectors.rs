//! Externalized extraction selectors.
//!
//! The page's structural markers are obfuscated utility-class chains that drift
//! without notice. Every logical field therefore maps to an ordered list of CSS
//! selectors tried in priority order, and the whole plan can be replaced from a
//! JSON file (`FRAUDLENS_SELECTORS`) so structural drift is a config change, not
//! a code change.

use std::path::Path;

use anyhow::{Context, Result};
use scraper::Selector;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorPlan {
    pub post_container: Vec<String>,
    pub post_content: Vec<String>,
    pub comment_section: Vec<String>,
    pub comment_item: Vec<String>,
    pub timestamp: Vec<String>,
    pub recommendation_block: Vec<String>,
    pub about_address: Vec<String>,
    pub about_contact_block: Vec<String>,
    pub about_contact_value: Vec<String>,
    pub review_container: Vec<String>,
    pub review_user: Vec<String>,
    pub review_text: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for SelectorPlan {
    fn default() -> Self {
        Self {
            post_container: strings(&[
                "div.x1n2onr6.x1ja2u2z.x1jx94hy.x1qpq9i9.xdney7k.xu5ydu1.xt3gfkd.x9f619.xh8yej3.x6ikm8r.x10wlt62.xquyuld",
                "div[role='article']",
            ]),
            post_content: strings(&[
                "div.x1l90r2v.x1iorvi4.x1ye3gou.xn6708d",
                "div[data-ad-preview='message']",
            ]),
            comment_section: strings(&[
                "div.xabvvm4.xeyy32k.x1ia1hqs.x1a2w583.x6ikm8r.x10wlt62",
            ]),
            comment_item: strings(&[
                "div.x1lliihq.xjkvuk6.x1iorvi4",
            ]),
            timestamp: strings(&[
                "div.html-span.xdj266r.x11i5rnm.xat24cr.x1mh8g0r.xexx8yu.x4uap5.x18d9i69.xkhd6sd.x1hl2dhg.x16tdsg8.x1vvkbs.x4k7w5x.x1h91t0o.x1h9r5lt.x1jfb8zj.xv2umb2.x1beo9mf.xaigb6o.x12ejxvf.x3igimt.xarpa2k.xedcshv.x1lytzrv.x1t2pt76.x7ja8zs.x1qrby5j",
                "abbr[data-utime]",
                "[data-utime]",
            ]),
            recommendation_block: strings(&[
                "div.x9f619.x1n2onr6.x1ja2u2z.x78zum5.xdt5ytf.x193iq5w.xeuugli.x1r8uery.x1iyjqo2.xs83m0k.xsyo7zv.x16hj40l.x10b6aqq.x1yrsyyn",
            ]),
            about_address: strings(&[
                "div.xzsf02u.x6prxxf.xvq8zen.x126k92a.x12nagc",
            ]),
            about_contact_block: strings(&[
                "div.x9f619.x1n2onr6.x1ja2u2z.x78zum5.xdt5ytf.x193iq5w.xeuugli.x1r8uery.x1iyjqo2.xs83m0k.xamitd3.xsyo7zv.x16hj40l.x10b6aqq.x1yrsyyn",
            ]),
            about_contact_value: strings(&[
                "span.x193iq5w.xeuugli.x13faqbe.x1vvkbs.x1xmvt09.x1lliihq.x1s928wv.xhkezso.x1gmr53x.x1cpjm7i.x1fgarty.x1943h6x.xudqn12.x3x7a5m.x6prxxf.xvq8zen.xo1l8bm.xzsf02u.x1yc453h",
                "span a[href]",
            ]),
            review_container: strings(&[
                "div.html-div.xdj266r.x11i5rnm.xat24cr.x1mh8g0r.xexx8yu.x4uap5.x18d9i69.xkhd6sd.x78zum5.x1n2onr6.xh8yej3",
            ]),
            review_user: strings(&[
                "strong.html-strong.xdj266r.x11i5rnm.xat24cr.x1mh8g0r.xexx8yu.x4uap5.x18d9i69.xkhd6sd.x1hl2dhg.x16tdsg8.x1vvkbs.x1s688f",
                "strong",
            ]),
            review_text: strings(&[
                "span.html-span.xdj266r.x11i5rnm.xat24cr.x1mh8g0r.xexx8yu.x4uap5.x18d9i69.xkhd6sd.x1hl2dhg.x16tdsg8.x1vvkbs.xzsf02u.xngnso2.xo1l8bm.x1qb5hxa",
            ]),
        }
    }
}

impl SelectorPlan {
    /// Loads the plan from `FRAUDLENS_SELECTORS` when set, otherwise the built-in
    /// defaults. A missing or malformed override file is fatal: silently scraping
    /// with the wrong plan is worse than stopping.
    pub fn from_env() -> Result<Self> {
        match std::env::var("FRAUDLENS_SELECTORS") {
            Ok(path) => Self::from_file(Path::new(&path)),
            Err(_) => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading selector plan {}", path.display()))?;
        let plan = serde_json::from_str(&raw)
            .with_context(|| format!("parsing selector plan {}", path.display()))?;
        Ok(plan)
    }
}

/// Compiles an ordered selector list, skipping entries that do not parse. A bad
/// selector in an override file downgrades that strategy, it never panics.
pub fn compile(field: &str, sources: &[String]) -> Vec<Selector> {
    sources
        .iter()
        .filter_map(|s| match Selector::parse(s) {
            Ok(sel) => Some(sel),
            Err(e) => {
                tracing::warn!("selector for '{}' rejected ({}): {:?}", field, s, e);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_plan_compiles_cleanly() {
        let plan = SelectorPlan::default();
        for (field, list) in [
            ("post_container", &plan.post_container),
            ("post_content", &plan.post_content),
            ("comment_section", &plan.comment_section),
            ("comment_item", &plan.comment_item),
            ("timestamp", &plan.timestamp),
            ("recommendation_block", &plan.recommendation_block),
            ("about_address", &plan.about_address),
            ("about_contact_block", &plan.about_contact_block),
            ("about_contact_value", &plan.about_contact_value),
            ("review_container", &plan.review_container),
            ("review_user", &plan.review_user),
            ("review_text", &plan.review_text),
        ] {
            assert_eq!(compile(field, list).len(), list.len(), "field {field}");
        }
    }

    #[test]
    fn invalid_selector_is_skipped_not_fatal() {
        let compiled = compile("bogus", &["div.ok".to_string(), ":::nope".to_string()]);
        assert_eq!(compiled.len(), 1);
    }

    #[test]
    fn plan_round_trips_through_json() {
        let plan = SelectorPlan::default();
        let json = serde_json::to_string(&plan).unwrap();
        let back: SelectorPlan = serde_json::from_str(&json).unwrap();
        assert_eq!(back.post_container, plan.post_container);
    }
}
