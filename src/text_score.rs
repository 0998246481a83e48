//! Text authenticity signal.
//!
//! Scores how much a post's cleaned content resembles "suspicious" content
//! versus the page's reference corpus (about text, recommendation text, genuine
//! reviews). Two interchangeable strategies behind the `TextScorer` trait:
//!
//! - `EmbeddingScorer` (canonical): a fixed feature-hashed text embedding plus a
//!   frozen linear classifier loaded from a JSON artifact. Nothing is fitted at
//!   score time, so scores are stable across runs and across reference corpora.
//! - `RetrainScorer` (behind an explicit flag): builds a TF-IDF space over the
//!   reference corpus plus the target batch, labels the corpus 0 and every
//!   target post 1, and fits a logistic regression on that synthetic split.
//!   Known limitation: by construction this separates "reference corpus" from
//!   "this batch", not genuine from fraudulent. It is a weak proxy and is kept
//!   only for parity with the original pipeline.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};

pub trait TextScorer {
    /// Per-post probability in [0,1]; `posts` are cleaned contents and the
    /// returned vector is index-aligned with them.
    fn score_batch(&self, corpus: &[String], posts: &[String]) -> Result<Vec<f64>>;
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

fn tokens(text: &str) -> Vec<&str> {
    text.split_whitespace().collect()
}

// ============================================================================
// Retrain strategy: TF-IDF + logistic regression on synthetic labels
// ============================================================================

pub struct RetrainScorer {
    pub max_features: usize,
    pub epochs: usize,
    pub learning_rate: f64,
}

impl Default for RetrainScorer {
    fn default() -> Self {
        Self { max_features: 100, epochs: 300, learning_rate: 1.0 }
    }
}

impl RetrainScorer {
    /// Vocabulary: the `max_features` most frequent terms across all documents.
    /// Ties break on the term itself so the fit is deterministic.
    fn vocabulary(&self, docs: &[&String]) -> Vec<String> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for doc in docs {
            for tok in tokens(doc) {
                *counts.entry(tok).or_insert(0) += 1;
            }
        }
        let mut terms: Vec<(&str, usize)> = counts.into_iter().collect();
        terms.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        terms.truncate(self.max_features);
        terms.into_iter().map(|(t, _)| t.to_string()).collect()
    }

    /// Smoothed-idf TF-IDF row, l2-normalized.
    fn vectorize(doc: &str, vocab: &HashMap<String, usize>, idf: &[f64]) -> Vec<f64> {
        let mut row = vec![0.0; idf.len()];
        for tok in tokens(doc) {
            if let Some(&i) = vocab.get(tok) {
                row[i] += 1.0;
            }
        }
        for (x, w) in row.iter_mut().zip(idf) {
            *x *= w;
        }
        let norm = row.iter().map(|x| x * x).sum::<f64>().sqrt();
        if norm > 0.0 {
            for x in &mut row {
                *x /= norm;
            }
        }
        row
    }
}

impl TextScorer for RetrainScorer {
    fn score_batch(&self, corpus: &[String], posts: &[String]) -> Result<Vec<f64>> {
        if posts.is_empty() {
            return Ok(Vec::new());
        }
        if corpus.is_empty() {
            tracing::warn!(
                "empty reference corpus: synthetic split is one-class, scores will saturate"
            );
        }

        let all: Vec<&String> = corpus.iter().chain(posts.iter()).collect();
        let vocab_terms = self.vocabulary(&all);
        let vocab: HashMap<String, usize> = vocab_terms
            .into_iter()
            .enumerate()
            .map(|(i, t)| (t, i))
            .collect();

        // Smoothed document frequencies over the combined fit set.
        let mut df = vec![0usize; vocab.len()];
        for doc in &all {
            let mut seen = vec![false; vocab.len()];
            for tok in tokens(doc) {
                if let Some(&i) = vocab.get(tok) {
                    seen[i] = true;
                }
            }
            for (d, s) in df.iter_mut().zip(&seen) {
                if *s {
                    *d += 1;
                }
            }
        }
        let n = all.len() as f64;
        let idf: Vec<f64> = df
            .iter()
            .map(|&d| ((1.0 + n) / (1.0 + d as f64)).ln() + 1.0)
            .collect();

        let rows: Vec<Vec<f64>> = all.iter().map(|d| Self::vectorize(d, &vocab, &idf)).collect();
        let labels: Vec<f64> = std::iter::repeat(0.0)
            .take(corpus.len())
            .chain(std::iter::repeat(1.0).take(posts.len()))
            .collect();

        // Full-batch gradient descent from a zero initialization: deterministic.
        let dim = vocab.len();
        let mut w = vec![0.0; dim];
        let mut b = 0.0;
        for _ in 0..self.epochs {
            let mut grad_w = vec![0.0; dim];
            let mut grad_b = 0.0;
            for (row, &y) in rows.iter().zip(&labels) {
                let z: f64 = row.iter().zip(&w).map(|(x, wi)| x * wi).sum::<f64>() + b;
                let err = sigmoid(z) - y;
                for (g, x) in grad_w.iter_mut().zip(row) {
                    *g += err * x;
                }
                grad_b += err;
            }
            let scale = self.learning_rate / rows.len() as f64;
            for (wi, g) in w.iter_mut().zip(&grad_w) {
                *wi -= scale * g;
            }
            b -= scale * grad_b;
        }

        Ok(rows[corpus.len()..]
            .iter()
            .map(|row| sigmoid(row.iter().zip(&w).map(|(x, wi)| x * wi).sum::<f64>() + b))
            .collect())
    }
}

// ============================================================================
// Embedding strategy: frozen feature-hashed embedding + linear classifier
// ============================================================================

/// Frozen classifier artifact. `weights` lives in the hashed embedding space.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextModelArtifact {
    pub dim: usize,
    pub weights: Vec<f64>,
    pub bias: f64,
}

pub struct EmbeddingScorer {
    artifact: TextModelArtifact,
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut h: u64 = 0xcbf29ce484222325;
    for &b in bytes {
        h ^= b as u64;
        h = h.wrapping_mul(0x100000001b3);
    }
    h
}

impl EmbeddingScorer {
    pub fn new(artifact: TextModelArtifact) -> Result<Self> {
        ensure!(
            artifact.dim > 0 && artifact.weights.len() == artifact.dim,
            "text model artifact dimension mismatch: dim={} weights={}",
            artifact.dim,
            artifact.weights.len()
        );
        Ok(Self { artifact })
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).with_context(|| {
            format!(
                "loading text model artifact {} (supply one or score with --retrain)",
                path.display()
            )
        })?;
        let artifact = serde_json::from_str(&raw)
            .with_context(|| format!("parsing text model artifact {}", path.display()))?;
        Self::new(artifact)
    }

    /// Signed feature hashing over unigrams and bigrams, l2-normalized. The
    /// hash is fixed, so the embedding never changes across runs.
    fn embed(&self, text: &str) -> Vec<f64> {
        let dim = self.artifact.dim;
        let mut v = vec![0.0; dim];
        let toks = tokens(text);
        let mut bump = |term: &str| {
            let h = fnv1a(term.as_bytes());
            let sign = if h & 1 == 0 { 1.0 } else { -1.0 };
            v[(h >> 1) as usize % dim] += sign;
        };
        for t in &toks {
            bump(*t);
        }
        for pair in toks.windows(2) {
            bump(&format!("{} {}", pair[0], pair[1]));
        }
        let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }
}

impl TextScorer for EmbeddingScorer {
    fn score_batch(&self, _corpus: &[String], posts: &[String]) -> Result<Vec<f64>> {
        Ok(posts
            .iter()
            .map(|p| {
                let e = self.embed(p);
                sigmoid(
                    e.iter()
                        .zip(&self.artifact.weights)
                        .map(|(x, w)| x * w)
                        .sum::<f64>()
                        + self.artifact.bias,
                )
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn retrain_scores_are_probabilities_aligned_with_posts() {
        let corpus = strings(&["great product arrived fast", "lovely service would recommend"]);
        let posts = strings(&["send money now win big prize", "great product arrived fast"]);
        let scores = RetrainScorer::default().score_batch(&corpus, &posts).unwrap();
        assert_eq!(scores.len(), 2);
        for s in &scores {
            assert!((0.0..=1.0).contains(s));
        }
        // A post sharing no terms with the corpus separates further from it
        // than one that repeats a corpus document verbatim.
        assert!(scores[0] > scores[1]);
    }

    #[test]
    fn retrain_empty_posts_returns_empty() {
        let scores = RetrainScorer::default()
            .score_batch(&strings(&["reference text"]), &[])
            .unwrap();
        assert!(scores.is_empty());
    }

    #[test]
    fn retrain_is_deterministic() {
        let corpus = strings(&["calm ordinary update"]);
        let posts = strings(&["urgent transfer required today"]);
        let a = RetrainScorer::default().score_batch(&corpus, &posts).unwrap();
        let b = RetrainScorer::default().score_batch(&corpus, &posts).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn embedding_scorer_is_frozen_and_corpus_independent() {
        let scorer = EmbeddingScorer::new(TextModelArtifact {
            dim: 64,
            weights: (0..64).map(|i| (i as f64 - 32.0) / 64.0).collect(),
            bias: -0.1,
        })
        .unwrap();
        let posts = strings(&["limited offer click fast"]);
        let a = scorer.score_batch(&strings(&["corpus one"]), &posts).unwrap();
        let b = scorer.score_batch(&strings(&["totally different corpus"]), &posts).unwrap();
        assert_eq!(a, b);
        assert!((0.0..=1.0).contains(&a[0]));
    }

    #[test]
    fn embedding_artifact_dimension_mismatch_rejected() {
        let bad = TextModelArtifact { dim: 8, weights: vec![0.0; 4], bias: 0.0 };
        assert!(EmbeddingScorer::new(bad).is_err());
    }
}
