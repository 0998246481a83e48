//! Content extraction over a rendered DOM snapshot.
//!
//! Every field goes through an ordered selector chain from the `SelectorPlan`;
//! a total miss yields the field's declared default (`"No Text"`, `"Unknown"`,
//! empty list/map) with a warning. A malformed or half-rendered page produces a
//! partial record, never an aborted batch.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::dataset::{AboutInfo, Post, Review};
use crate::selectors::{self, SelectorPlan};

static PHONE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\+?\d[\d\s\-()]*$").unwrap());

pub struct Extractor {
    post_container: Vec<Selector>,
    post_content: Vec<Selector>,
    comment_section: Vec<Selector>,
    comment_item: Vec<Selector>,
    timestamp: Vec<Selector>,
    recommendation_block: Vec<Selector>,
    about_address: Vec<Selector>,
    about_contact_block: Vec<Selector>,
    about_contact_value: Vec<Selector>,
    review_container: Vec<Selector>,
    review_user: Vec<Selector>,
    review_text: Vec<Selector>,
    aria_labelled: Selector,
    anchor: Selector,
    span: Selector,
}

fn text_of(el: ElementRef) -> String {
    el.text().collect::<String>().trim().to_string()
}

fn first_in<'a>(root: ElementRef<'a>, chain: &[Selector]) -> Option<ElementRef<'a>> {
    chain.iter().find_map(|sel| root.select(sel).next())
}

fn first_in_doc<'a>(doc: &'a Html, chain: &[Selector]) -> Option<ElementRef<'a>> {
    chain.iter().find_map(|sel| doc.select(sel).next())
}

impl Extractor {
    pub fn new(plan: &SelectorPlan) -> Self {
        Self {
            post_container: selectors::compile("post_container", &plan.post_container),
            post_content: selectors::compile("post_content", &plan.post_content),
            comment_section: selectors::compile("comment_section", &plan.comment_section),
            comment_item: selectors::compile("comment_item", &plan.comment_item),
            timestamp: selectors::compile("timestamp", &plan.timestamp),
            recommendation_block: selectors::compile(
                "recommendation_block",
                &plan.recommendation_block,
            ),
            about_address: selectors::compile("about_address", &plan.about_address),
            about_contact_block: selectors::compile(
                "about_contact_block",
                &plan.about_contact_block,
            ),
            about_contact_value: selectors::compile(
                "about_contact_value",
                &plan.about_contact_value,
            ),
            review_container: selectors::compile("review_container", &plan.review_container),
            review_user: selectors::compile("review_user", &plan.review_user),
            review_text: selectors::compile("review_text", &plan.review_text),
            aria_labelled: Selector::parse("[aria-label]").unwrap(),
            anchor: Selector::parse("a[href]").unwrap(),
            span: Selector::parse("span").unwrap(),
        }
    }

    // ------------------------------------------------------------------
    // Posts
    // ------------------------------------------------------------------

    pub fn extract_posts(&self, doc: &Html) -> Vec<Post> {
        let mut posts = Vec::new();
        for sel in &self.post_container {
            for container in doc.select(sel) {
                posts.push(self.extract_post(container));
            }
            if !posts.is_empty() {
                break;
            }
        }
        if posts.is_empty() {
            tracing::warn!("no post containers matched; feed section will be empty");
        }
        posts
    }

    fn extract_post(&self, container: ElementRef) -> Post {
        let content = match first_in(container, &self.post_content) {
            Some(el) => text_of(el),
            None => {
                tracing::warn!("post content selector missed, defaulting to 'No Text'");
                "No Text".to_string()
            }
        };

        let comments = first_in(container, &self.comment_section)
            .map(|section| {
                self.comment_item
                    .iter()
                    .flat_map(|sel| section.select(sel))
                    .map(text_of)
                    .filter(|c| !c.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Post {
            content,
            comments,
            reactions: self.extract_reactions(container),
            timestamp: self.extract_timestamp(container),
        }
    }

    fn extract_reactions(&self, container: ElementRef) -> BTreeMap<String, u64> {
        let mut reactions = BTreeMap::new();
        for el in container.select(&self.aria_labelled) {
            if let Some(label) = el.value().attr("aria-label") {
                if let Some((kind, count)) = parse_reaction_label(label) {
                    reactions.insert(kind, count);
                }
            }
        }
        reactions
    }

    fn extract_timestamp(&self, container: ElementRef) -> String {
        for sel in &self.timestamp {
            for el in container.select(sel) {
                if let Some(epoch) = el.value().attr("data-utime") {
                    if let Ok(secs) = epoch.parse::<i64>() {
                        if let Some(dt) = chrono::DateTime::from_timestamp(secs, 0) {
                            return dt.naive_utc().format("%Y-%m-%dT%H:%M:%S").to_string();
                        }
                    }
                }
            }
        }
        "Unknown".to_string()
    }

    // ------------------------------------------------------------------
    // Recommendation
    // ------------------------------------------------------------------

    /// First span under a recommendation block whose text mentions "recommend".
    pub fn extract_recommendation(&self, doc: &Html) -> String {
        for sel in &self.recommendation_block {
            for block in doc.select(sel) {
                for span in block.select(&self.span) {
                    let text = text_of(span);
                    if text.to_lowercase().contains("recommend") {
                        return text;
                    }
                }
            }
        }
        tracing::warn!("no recommendation span found");
        "not available".to_string()
    }

    // ------------------------------------------------------------------
    // About
    // ------------------------------------------------------------------

    pub fn extract_about(&self, doc: &Html) -> AboutInfo {
        let mut about = AboutInfo::default();

        if let Some(el) = first_in_doc(doc, &self.about_address) {
            about.address = Some(text_of(el));
        }

        let contact_el = first_in_doc(doc, &self.about_contact_block)
            .and_then(|block| first_in(block, &self.about_contact_value));
        let Some(el) = contact_el else {
            tracing::warn!("no contact section found on about page");
            return about;
        };

        let value = text_of(el);
        let href = el.select(&self.anchor).next().and_then(|a| a.value().attr("href"));
        if value.contains("http") || href.is_some() {
            let url = href.map(|h| h.to_string()).unwrap_or_else(|| value.clone());
            about.website = Some(unwrap_redirect(&url));
        } else if PHONE_RE.is_match(&value) {
            about.contact = Some(value);
        } else if !value.is_empty() {
            // Neither a URL nor a phone number: treat as an address line.
            about.address = Some(value);
        }
        about
    }

    // ------------------------------------------------------------------
    // Reviews
    // ------------------------------------------------------------------

    pub fn extract_reviews(&self, doc: &Html) -> Vec<Review> {
        let mut reviews = Vec::new();
        for sel in &self.review_container {
            for container in doc.select(sel) {
                let user = first_in(container, &self.review_user)
                    .map(text_of)
                    .filter(|u| !u.is_empty())
                    .unwrap_or_else(|| "Unknown User".to_string());
                let text = first_in(container, &self.review_text)
                    .map(text_of)
                    .filter(|t| !t.is_empty())
                    .unwrap_or_else(|| "No review text".to_string());
                reviews.push(Review { user, text });
            }
            if !reviews.is_empty() {
                break;
            }
        }
        reviews
    }
}

/// Parses an accessible reaction label shaped `"<Type>: <count> person(s)"`.
/// Labels without a person/people token or a leading-digit count are skipped.
pub fn parse_reaction_label(label: &str) -> Option<(String, u64)> {
    if !label.contains("person") && !label.contains("people") {
        return None;
    }
    let (kind, rest) = label.split_once(':')?;
    let count = rest.trim().split_whitespace().next()?;
    // u64::from_str tolerates a leading '+'; the label grammar does not.
    if !count.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let count: u64 = count.parse().ok()?;
    let kind = kind.trim();
    if kind.is_empty() {
        return None;
    }
    Some((kind.to_string(), count))
}

/// Unwraps interstitial redirect links (`l.facebook.com/l.php?u=...`) and
/// percent-decodes the result.
fn unwrap_redirect(url: &str) -> String {
    if url.contains("l.facebook.com/l.php") {
        if let Some(query) = url.splitn(2, '?').nth(1) {
            for pair in query.split('&') {
                if let Some(target) = pair.strip_prefix("u=") {
                    return urlencoding::decode(target)
                        .map(|c| c.into_owned())
                        .unwrap_or_else(|_| target.to_string());
                }
            }
        }
    }
    urlencoding::decode(url)
        .map(|c| c.into_owned())
        .unwrap_or_else(|_| url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_plan() -> SelectorPlan {
        SelectorPlan {
            post_container: vec!["div.post".into()],
            post_content: vec!["div.missing-first".into(), "div.body".into()],
            comment_section: vec!["div.comments".into()],
            comment_item: vec!["div.comment".into()],
            timestamp: vec!["abbr[data-utime]".into()],
            recommendation_block: vec!["div.reco".into()],
            about_address: vec!["div.addr".into()],
            about_contact_block: vec!["div.contact".into()],
            about_contact_value: vec!["span.value".into()],
            review_container: vec!["div.review".into()],
            review_user: vec!["strong.user".into()],
            review_text: vec!["span.text".into()],
        }
    }

    #[test]
    fn post_extraction_walks_fallback_chain() {
        let html = Html::parse_document(
            r#"<div class="post">
                 <div class="body">Huge discount, DM us now</div>
                 <div class="comments">
                   <div class="comment">is this legit?</div>
                   <div class="comment">ordered yesterday</div>
                 </div>
                 <div aria-label="Love: 8 people"></div>
                 <div aria-label="Angry: 2 people"></div>
                 <abbr data-utime="1700000000"></abbr>
               </div>"#,
        );
        let posts = Extractor::new(&test_plan()).extract_posts(&html);
        assert_eq!(posts.len(), 1);
        let post = &posts[0];
        assert_eq!(post.content, "Huge discount, DM us now");
        assert_eq!(post.comments, vec!["is this legit?", "ordered yesterday"]);
        assert_eq!(post.reactions.get("Love"), Some(&8));
        assert_eq!(post.reactions.get("Angry"), Some(&2));
        assert_eq!(post.timestamp, "2023-11-14T22:13:20");
    }

    #[test]
    fn missing_fields_become_declared_defaults() {
        let html = Html::parse_document(r#"<div class="post"></div>"#);
        let posts = Extractor::new(&test_plan()).extract_posts(&html);
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].content, "No Text");
        assert!(posts[0].comments.is_empty());
        assert!(posts[0].reactions.is_empty());
        assert_eq!(posts[0].timestamp, "Unknown");
    }

    #[test]
    fn empty_page_yields_empty_sections_not_errors() {
        let html = Html::parse_document("<html><body></body></html>");
        let ex = Extractor::new(&test_plan());
        assert!(ex.extract_posts(&html).is_empty());
        assert!(ex.extract_reviews(&html).is_empty());
        assert_eq!(ex.extract_about(&html), AboutInfo::default());
        assert_eq!(ex.extract_recommendation(&html), "not available");
    }

    #[test]
    fn reaction_label_accept_and_reject() {
        assert_eq!(parse_reaction_label("Love: 8 people"), Some(("Love".into(), 8)));
        assert_eq!(parse_reaction_label("Haha: 1 person"), Some(("Haha".into(), 1)));
        assert_eq!(parse_reaction_label("Love: 8"), None); // no person token
        assert_eq!(parse_reaction_label("Share this post"), None); // no colon
        assert_eq!(parse_reaction_label("Love: many people"), None); // not a count
        assert_eq!(parse_reaction_label("Love: +8 people"), None); // sign, not a leading digit
        assert_eq!(parse_reaction_label(": 8 people"), None); // empty type
    }

    #[test]
    fn recommendation_span_is_matched_by_substring() {
        let html = Html::parse_document(
            r#"<div class="reco"><span>ignored</span><span>92% recommend (110 Reviews)</span></div>"#,
        );
        let ex = Extractor::new(&test_plan());
        assert_eq!(ex.extract_recommendation(&html), "92% recommend (110 Reviews)");
    }

    #[test]
    fn about_classifies_website_phone_and_address() {
        let ex = Extractor::new(&test_plan());

        let site = Html::parse_document(
            r#"<div class="contact"><span class="value">
                 <a href="https://l.facebook.com/l.php?u=https%3A%2F%2Fshop.example%2F&h=x">shop</a>
               </span></div>"#,
        );
        assert_eq!(ex.extract_about(&site).website.as_deref(), Some("https://shop.example/"));

        let phone = Html::parse_document(
            r#"<div class="contact"><span class="value">+95 9 765 4321</span></div>"#,
        );
        assert_eq!(ex.extract_about(&phone).contact.as_deref(), Some("+95 9 765 4321"));

        let addr = Html::parse_document(
            r#"<div class="contact"><span class="value">12 Market Street, Yangon</span></div>"#,
        );
        assert_eq!(ex.extract_about(&addr).address.as_deref(), Some("12 Market Street, Yangon"));
    }

    #[test]
    fn reviews_fall_back_per_field() {
        let html = Html::parse_document(
            r#"<div class="review"><strong class="user">Aye Chan</strong>
                 <span class="text">Fast delivery, real products</span></div>
               <div class="review"><span class="text">Anonymous but happy</span></div>"#,
        );
        let reviews = Extractor::new(&test_plan()).extract_reviews(&html);
        assert_eq!(reviews.len(), 2);
        assert_eq!(reviews[0].user, "Aye Chan");
        assert_eq!(reviews[1].user, "Unknown User");
        assert_eq!(reviews[1].text, "Anonymous but happy");
    }
}
