//! Canonical scraped dataset: data model, page identifier, persistence.
//!
//! One `Document` is assembled per scrape and written as pretty-printed UTF-8
//! JSON under the data directory. After that write it is a read-only artifact;
//! the scoring pipeline only ever loads it back.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Best-effort page metadata; any field may be absent on a sparse page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AboutInfo {
    #[serde(rename = "Address", skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(rename = "Contact", skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
    #[serde(rename = "Website", skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
}

/// The persisted `About` field is either a structured block or a plain string;
/// both shapes occur in the wild and both must score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum About {
    Structured(AboutInfo),
    Text(String),
}

impl Default for About {
    fn default() -> Self {
        About::Structured(AboutInfo::default())
    }
}

impl About {
    /// Free-text rendition fed to the scoring reference corpus.
    pub fn as_text(&self) -> String {
        match self {
            About::Structured(info) => [&info.address, &info.contact, &info.website]
                .into_iter()
                .flatten()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(" "),
            About::Text(text) => text.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    #[serde(rename = "User")]
    pub user: String,
    #[serde(rename = "Review")]
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    #[serde(rename = "Post Content")]
    pub content: String,
    #[serde(rename = "Comments")]
    pub comments: Vec<String>,
    /// Reaction type → count. BTreeMap keeps the persisted JSON stable.
    #[serde(rename = "Reactions")]
    pub reactions: BTreeMap<String, u64>,
    /// ISO-8601, or the literal `"Unknown"`. Never parse `"Unknown"` as a date.
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
}

impl Default for Post {
    fn default() -> Self {
        Self {
            content: "No Text".to_string(),
            comments: Vec::new(),
            reactions: BTreeMap::new(),
            timestamp: "Unknown".to_string(),
        }
    }
}

/// The merged record of one page: about info, recommendation text, reviews, posts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "About")]
    pub about: About,
    #[serde(rename = "Recommendation")]
    pub recommendation: String,
    #[serde(rename = "Reviews")]
    pub reviews: Vec<Review>,
    #[serde(rename = "Posts")]
    pub posts: Vec<Post>,
}

static PAGE_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"facebook\.com/(?:profile\.php\?id=)?([^/&?]+)").unwrap());

/// Normalized page identifier: first path segment after the domain, or the
/// `profile.php?id=` value. Falls back to `"default"` when neither matches.
pub fn page_identifier(url: &str) -> String {
    PAGE_ID_RE
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| "default".to_string())
}

pub fn data_dir() -> PathBuf {
    std::env::var("FRAUDLENS_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data"))
}

/// Content-addressed dataset path for a page URL.
pub fn dataset_path(url: &str) -> PathBuf {
    data_dir().join(format!("final_scraped_dataset_{}.json", page_identifier(url)))
}

/// Writes the Document as pretty-printed UTF-8 JSON. All-or-nothing: a write
/// failure is fatal to the scrape and is not retried.
pub fn save_document(doc: &Document, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating data directory {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(doc)?;
    std::fs::write(path, json)
        .with_context(|| format!("writing dataset to {}", path.display()))?;
    tracing::info!("dataset saved to {}", path.display());
    Ok(())
}

pub fn load_document(path: &Path) -> Result<Document> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading dataset {}", path.display()))?;
    let doc = serde_json::from_str(&raw)
        .with_context(|| format!("parsing dataset {}", path.display()))?;
    Ok(doc)
}
