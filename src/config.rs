use std::{fs, path::Path};

use phrase_vec::VectorizerConfig;
use serde::{Deserialize, Serialize};

use crate::{
    errors::{FieldmapError, Result},
    records::EntityKind,
};

pub const CONFIG_ENV: &str = "FIELDMAP_CONFIG";

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Pairs need a similarity strictly above this to get an edge.
    pub similarity_threshold: f64,
    pub top_k: usize,
    pub max_top_papers: usize,
    pub vectorizer: VectorizerConfig,
    pub workers: Option<usize>,
    pub compress: bool,
    pub ranking_kind: EntityKind,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.12,
            top_k: 10,
            max_top_papers: 10,
            vectorizer: VectorizerConfig::default(),
            workers: None,
            compress: false,
            ranking_kind: EntityKind::Subfields,
        }
    }
}

impl PipelineConfig {
    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let deserializer = &mut serde_json::Deserializer::from_str(&raw);
        let config: Self =
            serde_path_to_error::deserialize(deserializer).map_err(|source| FieldmapError::Json {
                path: path.display().to_string(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Explicit path first, then the env var, then defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_path(path);
        }
        match std::env::var_os(CONFIG_ENV) {
            Some(p) => Self::from_path(Path::new(&p)),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.similarity_threshold) {
            return Err(FieldmapError::Config(format!(
                "similarity_threshold must be in [0, 1), got {}",
                self.similarity_threshold
            )));
        }
        if self.top_k == 0 {
            return Err(FieldmapError::Config("top_k must be positive".to_string()));
        }
        if self.workers == Some(0) {
            return Err(FieldmapError::Config("workers must be positive".to_string()));
        }
        self.vectorizer.validate()?;
        Ok(())
    }

    pub fn n_workers(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = PipelineConfig::default();
        assert_eq!(c.similarity_threshold, 0.12);
        assert_eq!(c.top_k, 10);
        assert_eq!(c.vectorizer.max_df, 0.8);
        assert_eq!((c.vectorizer.ngram_min, c.vectorizer.ngram_max), (1, 3));
        assert!(c.validate().is_ok());
    }

    #[test]
    fn reads_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("conf.json");
        fs::write(&p, r#"{"top_k": 5, "vectorizer": {"max_df": 0.9}, "workers": 2}"#).unwrap();
        let c = PipelineConfig::from_path(&p).unwrap();
        assert_eq!(c.top_k, 5);
        assert_eq!(c.vectorizer.max_df, 0.9);
        assert_eq!(c.n_workers(), 2);
        assert_eq!(c.similarity_threshold, 0.12);
    }

    #[test]
    fn json_errors_carry_path() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("conf.json");
        fs::write(&p, r#"{"vectorizer": {"ngram_max": "three"}}"#).unwrap();
        match PipelineConfig::from_path(&p) {
            Err(FieldmapError::Json { source, .. }) => {
                assert_eq!(source.path().to_string(), "vectorizer.ngram_max")
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn rejects_invalid() {
        let c = PipelineConfig {
            top_k: 0,
            ..Default::default()
        };
        assert!(c.validate().is_err());
        let c = PipelineConfig {
            similarity_threshold: 1.5,
            ..Default::default()
        };
        assert!(c.validate().is_err());
    }
}
