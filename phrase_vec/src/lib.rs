pub mod normalize;
mod stopwords;
pub mod vectorize;

pub use normalize::Normalizer;
pub use stopwords::ENGLISH_STOPWORDS;
pub use vectorize::{ConfigError, PhraseCorpus, SparseVec, VectorizerConfig};

pub type TermIdx = u32;
