//! Batch scoring: persisted Document in, per-post predictions CSV out.
//!
//! The scoring phase runs over an already-materialized batch and is pure given
//! its inputs. The retrain text strategy needs the whole batch before it can
//! score any post (global fit), which the batch-shaped API guarantees.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::anomaly::{self, AnomalyConfig};
use crate::dataset::{self, Document};
use crate::features::{self, clean_text};
use crate::fusion::FusionConfig;
use crate::text_score::{EmbeddingScorer, RetrainScorer, TextScorer};
use crate::trust;

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPost {
    pub content: String,
    pub cleaned: String,
    pub post_length: usize,
    pub num_comments: usize,
    pub total_reactions: u64,
    pub angry_ratio: f64,
    pub sad_ratio: f64,
    pub haha_ratio: f64,
    pub love_ratio: f64,
    pub text_prob: f64,
    pub anomaly_score: f64,
    pub trust_score: f64,
    pub fraud_score: f64,
    pub prediction: u8,
}

/// Reference corpus for the text signal: about text, recommendation text, and
/// genuine reviews (placeholder review bodies excluded), all cleaned.
fn reference_corpus(doc: &Document) -> Vec<String> {
    let mut corpus = Vec::new();
    let about = doc.about.as_text();
    for candidate in [clean_text(&about), clean_text(&doc.recommendation)] {
        if !candidate.is_empty() {
            corpus.push(candidate);
        }
    }
    for review in &doc.reviews {
        if review.text.trim().to_lowercase() != "no review text" {
            let cleaned = clean_text(&review.text);
            if !cleaned.is_empty() {
                corpus.push(cleaned);
            }
        }
    }
    corpus
}

/// Scores every post in the Document. An empty post set returns an empty,
/// well-typed batch; it is a boundary condition, not an error.
pub fn score_document(
    doc: &Document,
    text_scorer: &dyn TextScorer,
    fusion: &FusionConfig,
    anomaly_cfg: &AnomalyConfig,
) -> Result<Vec<ScoredPost>> {
    fusion.validate()?;

    let rows = features::featurize_all(doc);
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let corpus = reference_corpus(doc);
    let cleaned: Vec<String> = rows.iter().map(|r| r.cleaned.clone()).collect();
    let text_probs = text_scorer.score_batch(&corpus, &cleaned)?;
    let numeric: Vec<Vec<f64>> = rows.iter().map(|r| r.numeric().to_vec()).collect();
    let anomaly_scores = anomaly::fit_scores(anomaly_cfg, &numeric);
    let max_len = rows.iter().map(|r| r.post_length).max().unwrap_or(0);
    let extra = features::recommendation_sentiment(&doc.recommendation);

    Ok(doc
        .posts
        .iter()
        .zip(rows)
        .zip(text_probs)
        .zip(anomaly_scores)
        .map(|(((post, row), text_prob), anomaly_score)| {
            let trust_score = trust::trust_score(&row, max_len);
            let fraud_score = fusion.fraud_score(text_prob, anomaly_score, trust_score, extra);
            ScoredPost {
                content: post.content.clone(),
                cleaned: row.cleaned,
                post_length: row.post_length,
                num_comments: row.num_comments,
                total_reactions: row.total_reactions,
                angry_ratio: row.angry_ratio,
                sad_ratio: row.sad_ratio,
                haha_ratio: row.haha_ratio,
                love_ratio: row.love_ratio,
                text_prob,
                anomaly_score,
                trust_score,
                fraud_score,
                prediction: fusion.predict(fraud_score),
            }
        })
        .collect())
}

// ---------------------------------------------------------------------------
// CSV output
// ---------------------------------------------------------------------------

const CSV_HEADER: &str = "post_content,cleaned_content,post_length,num_comments,total_reactions,\
angry_ratio,sad_ratio,haha_ratio,love_ratio,text_prob,anomaly_score,trust_score,\
fraudlens_score,fraud_prediction";

fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Predictions land next to the input: `x.json` → `x_predictions.csv`.
pub fn predictions_path(input: &Path) -> PathBuf {
    let name = input
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("dataset.json");
    let stem = name.strip_suffix(".json").unwrap_or(name);
    input.with_file_name(format!("{stem}_predictions.csv"))
}

pub fn write_predictions(path: &Path, scored: &[ScoredPost]) -> Result<()> {
    let mut out = String::with_capacity(256 + scored.len() * 128);
    out.push_str(CSV_HEADER);
    out.push('\n');
    for s in scored {
        out.push_str(&format!(
            "{},{},{},{},{},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{}\n",
            csv_field(&s.content),
            csv_field(&s.cleaned),
            s.post_length,
            s.num_comments,
            s.total_reactions,
            s.angry_ratio,
            s.sad_ratio,
            s.haha_ratio,
            s.love_ratio,
            s.text_prob,
            s.anomaly_score,
            s.trust_score,
            s.fraud_score,
            s.prediction,
        ));
    }
    std::fs::write(path, out)
        .with_context(|| format!("writing predictions to {}", path.display()))?;
    tracing::info!("predictions saved to {}", path.display());
    Ok(())
}

fn text_model_path() -> PathBuf {
    std::env::var("FRAUDLENS_TEXT_MODEL")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("models/text_scorer.json"))
}

/// Entry point for `fraudlens score`: loads the Document, scores it with the
/// selected text strategy, writes the `_predictions.csv` sibling.
pub fn run(input: &Path, retrain: bool) -> Result<PathBuf> {
    let doc = dataset::load_document(input)?;
    let fusion = FusionConfig::default();
    let anomaly_cfg = AnomalyConfig::default();

    let scored = if retrain {
        tracing::warn!(
            "retrain strategy separates reference corpus from this batch, not genuine \
             from fraudulent; scores are a weak proxy"
        );
        score_document(&doc, &RetrainScorer::default(), &fusion, &anomaly_cfg)?
    } else {
        let scorer = EmbeddingScorer::from_file(&text_model_path())?;
        score_document(&doc, &scorer, &fusion, &anomaly_cfg)?
    };

    let out = predictions_path(input);
    write_predictions(&out, &scored)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Post, Review};
    use std::collections::BTreeMap;

    fn sample_doc() -> Document {
        Document {
            recommendation: "88% recommend (45 Reviews)".to_string(),
            reviews: vec![
                Review { user: "A".into(), text: "great shop fast delivery".into() },
                Review { user: "B".into(), text: "No review text".into() },
            ],
            posts: vec![
                Post {
                    content: "New arrivals this week, visit our store".into(),
                    comments: vec!["nice".into()],
                    reactions: BTreeMap::from([("Love".into(), 8), ("Angry".into(), 2)]),
                    timestamp: "Unknown".into(),
                },
                Post {
                    content: "URGENT!!! transfer money today to claim your prize http://x.test".into(),
                    comments: vec![],
                    reactions: BTreeMap::from([("Angry".into(), 9)]),
                    timestamp: "Unknown".into(),
                },
            ],
            ..Document::default()
        }
    }

    #[test]
    fn zero_posts_scores_to_an_empty_batch() {
        let doc = Document::default();
        let scored = score_document(
            &doc,
            &RetrainScorer::default(),
            &FusionConfig::default(),
            &AnomalyConfig::default(),
        )
        .unwrap();
        assert!(scored.is_empty());
    }

    #[test]
    fn scored_batch_is_aligned_and_bounded() {
        let doc = sample_doc();
        let scored = score_document(
            &doc,
            &RetrainScorer::default(),
            &FusionConfig::default(),
            &AnomalyConfig::default(),
        )
        .unwrap();
        assert_eq!(scored.len(), 2);
        for s in &scored {
            for v in [s.text_prob, s.anomaly_score, s.trust_score, s.fraud_score] {
                assert!((0.0..=1.0).contains(&v), "out of range: {v}");
            }
            assert!(s.prediction == 0 || s.prediction == 1);
        }
    }

    #[test]
    fn string_about_document_scores_like_any_other() {
        let mut doc = sample_doc();
        doc.about = crate::dataset::About::Text("Family-run shop, open daily".to_string());
        let scored = score_document(
            &doc,
            &RetrainScorer::default(),
            &FusionConfig::default(),
            &AnomalyConfig::default(),
        )
        .unwrap();
        assert_eq!(scored.len(), doc.posts.len());
        let corpus = reference_corpus(&doc);
        assert!(corpus.iter().any(|c| c.contains("familyrun shop")));
    }

    #[test]
    fn placeholder_reviews_are_excluded_from_the_corpus() {
        let corpus = reference_corpus(&sample_doc());
        assert!(corpus.iter().all(|c| c != "no review text"));
        assert!(corpus.iter().any(|c| c.contains("great shop")));
    }

    #[test]
    fn predictions_path_gets_suffix() {
        let p = predictions_path(Path::new("data/final_scraped_dataset_acme.json"));
        assert_eq!(p, Path::new("data/final_scraped_dataset_acme_predictions.csv"));
    }

    #[test]
    fn empty_batch_still_writes_a_header() {
        let dir = std::env::temp_dir().join("fraudlens_score_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("empty_predictions.csv");
        write_predictions(&path, &[]).unwrap();
        let body = std::fs::read_to_string(&path).unwrap();
        assert!(body.starts_with("post_content,"));
        assert_eq!(body.lines().count(), 1);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn csv_fields_with_commas_are_quoted() {
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_field("plain"), "plain");
    }
}
