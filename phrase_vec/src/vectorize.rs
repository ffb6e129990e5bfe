use std::collections::BTreeMap;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::TermIdx;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("ngram bounds must satisfy 1 <= min <= max, got {0}..={1}")]
    NgramBounds(usize, usize),
    #[error("max_df must be in (0, 1], got {0}")]
    MaxDf(f64),
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct VectorizerConfig {
    pub ngram_min: usize,
    pub ngram_max: usize,
    /// Phrases found in more than this share of the documents are dropped.
    pub max_df: f64,
    pub extra_stopwords: Vec<String>,
}

impl Default for VectorizerConfig {
    fn default() -> Self {
        Self {
            ngram_min: 1,
            ngram_max: 3,
            max_df: 0.8,
            extra_stopwords: Vec::new(),
        }
    }
}

impl VectorizerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ngram_min == 0 || self.ngram_min > self.ngram_max {
            return Err(ConfigError::NgramBounds(self.ngram_min, self.ngram_max));
        }
        if !(self.max_df > 0.0 && self.max_df <= 1.0) {
            return Err(ConfigError::MaxDf(self.max_df));
        }
        Ok(())
    }
}

/// Sparse vector with entries sorted by term index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparseVec(pub Vec<(TermIdx, f64)>);

impl SparseVec {
    pub fn dot(&self, other: &SparseVec) -> f64 {
        let (a, b) = (&self.0, &other.0);
        let (mut i, mut j) = (0, 0);
        let mut out = 0.0;
        while i < a.len() && j < b.len() {
            match a[i].0.cmp(&b[j].0) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    out += a[i].1 * b[j].1;
                    i += 1;
                    j += 1;
                }
            }
        }
        out
    }

    pub fn norm(&self) -> f64 {
        self.0.iter().map(|(_, w)| w * w).sum::<f64>().sqrt()
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|(_, w)| *w == 0.0)
    }
}

/// Tf-idf vectors of a closed corpus over its shared phrase vocabulary.
///
/// weight(p, d) = ln(1 + count(p, d)) * ln(N / df(p))
pub struct PhraseCorpus {
    pub vocabulary: Vec<String>,
    pub vectors: Vec<SparseVec>,
}

impl PhraseCorpus {
    pub fn fit(docs: &[Vec<String>], config: &VectorizerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let n_docs = docs.len();
        let doc_counts: Vec<HashMap<String, u32>> = docs
            .iter()
            .map(|d| phrase_counts(d, config.ngram_min, config.ngram_max))
            .collect();

        let mut df: BTreeMap<&str, usize> = BTreeMap::new();
        for counts in doc_counts.iter() {
            for phrase in counts.keys() {
                *df.entry(phrase.as_str()).or_insert(0) += 1;
            }
        }

        let max_doc_count = config.max_df * n_docs as f64;
        let mut vocabulary = Vec::new();
        let mut idf = Vec::new();
        let mut index: HashMap<&str, TermIdx> = HashMap::new();
        for (phrase, count) in df.into_iter() {
            if count as f64 > max_doc_count {
                continue;
            }
            index.insert(phrase, vocabulary.len() as TermIdx);
            vocabulary.push(phrase.to_string());
            idf.push((n_docs as f64 / count as f64).ln());
        }

        let vectors = doc_counts
            .iter()
            .map(|counts| {
                let mut entries: Vec<(TermIdx, f64)> = counts
                    .iter()
                    .filter_map(|(phrase, c)| {
                        let ti = *index.get(phrase.as_str())?;
                        Some((ti, (1.0 + f64::from(*c)).ln() * idf[ti as usize]))
                    })
                    .collect();
                entries.sort_by_key(|e| e.0);
                SparseVec(entries)
            })
            .collect();

        Ok(Self { vocabulary, vectors })
    }
}

fn phrase_counts(tokens: &[String], min_n: usize, max_n: usize) -> HashMap<String, u32> {
    let mut out = HashMap::new();
    for n in min_n..=max_n {
        if n > tokens.len() {
            break;
        }
        for window in tokens.windows(n) {
            *out.entry(window.join(" ")).or_insert(0) += 1;
        }
    }
    out
}
