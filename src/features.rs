//! Per-post behavioral features derived from a scraped Document.
//!
//! Everything here is a pure function of the post: same input, same features.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::dataset::{Document, Post};

static SEE_MORE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"… see more|\.\.\. see more").unwrap());
static URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"http\S+").unwrap());
static NON_ALNUM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9\s]").unwrap());

/// Lowercases, strips "see more" truncation markers, URLs, and anything that is
/// not ASCII alphanumeric or whitespace, then trims. Idempotent: applying it to
/// already-cleaned text is a no-op.
pub fn clean_text(text: &str) -> String {
    let text = text.to_lowercase();
    let text = SEE_MORE_RE.replace_all(&text, "");
    let text = URL_RE.replace_all(&text, "");
    let text = NON_ALNUM_RE.replace_all(&text, "");
    text.trim().to_string()
}

/// Derived features for one post. Not persisted back into the Document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureRow {
    pub cleaned: String,
    pub post_length: usize,
    pub num_comments: usize,
    pub total_reactions: u64,
    pub angry_ratio: f64,
    pub sad_ratio: f64,
    pub haha_ratio: f64,
    pub love_ratio: f64,
}

impl FeatureRow {
    /// Numeric vector fed to the anomaly detector.
    pub fn numeric(&self) -> [f64; 7] {
        [
            self.post_length as f64,
            self.num_comments as f64,
            self.total_reactions as f64,
            self.angry_ratio,
            self.sad_ratio,
            self.haha_ratio,
            self.love_ratio,
        ]
    }
}

fn ratio(post: &Post, kind: &str, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    *post.reactions.get(kind).unwrap_or(&0) as f64 / total as f64
}

pub fn featurize(post: &Post) -> FeatureRow {
    let cleaned = clean_text(&post.content);
    let total: u64 = post.reactions.values().sum();
    FeatureRow {
        post_length: cleaned.len(),
        num_comments: post.comments.len(),
        total_reactions: total,
        angry_ratio: ratio(post, "Angry", total),
        sad_ratio: ratio(post, "Sad", total),
        haha_ratio: ratio(post, "Haha", total),
        love_ratio: ratio(post, "Love", total),
        cleaned,
    }
}

pub fn featurize_all(doc: &Document) -> Vec<FeatureRow> {
    doc.posts.iter().map(featurize).collect()
}

/// 1 when the page-level recommendation text mentions "recommend", else 0.
/// Carried as the optional extra fusion signal.
pub fn recommendation_sentiment(recommendation: &str) -> f64 {
    if recommendation.to_lowercase().contains("recommend") {
        1.0
    } else {
        0.0
    }
}
