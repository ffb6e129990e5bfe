use deunicode::deunicode;
use hashbrown::HashSet;

use crate::stopwords::ENGLISH_STOPWORDS;

const MIN_TOKEN_LEN: usize = 2;

/// Lowercases, transliterates to ascii and drops stopwords.
///
/// Tokens are maximal runs of ascii letters and digits, at least two
/// characters long.
pub struct Normalizer {
    stopwords: HashSet<String>,
}

impl Normalizer {
    pub fn new<I, S>(extra_stopwords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut stopwords: HashSet<String> =
            ENGLISH_STOPWORDS.iter().map(|w| w.to_string()).collect();
        for w in extra_stopwords {
            stopwords.insert(w.as_ref().to_lowercase());
        }
        Self { stopwords }
    }

    pub fn tokens(&self, text: &str) -> Vec<String> {
        let mut out = Vec::new();
        self.extend_tokens(text, &mut out);
        out
    }

    /// Token sequence of several text parts read one after the other,
    /// e.g. a display name followed by its description.
    pub fn document<'a, I>(&self, parts: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut out = Vec::new();
        for part in parts {
            self.extend_tokens(part, &mut out);
        }
        out
    }

    pub fn is_stopword(&self, token: &str) -> bool {
        self.stopwords.contains(token)
    }

    fn extend_tokens(&self, text: &str, out: &mut Vec<String>) {
        let ascii = deunicode(&text.to_lowercase()).to_lowercase();
        for raw in ascii.split(|c: char| !c.is_ascii_alphanumeric()) {
            if raw.len() < MIN_TOKEN_LEN || self.is_stopword(raw) {
                continue;
            }
            out.push(raw.to_string());
        }
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(std::iter::empty::<&str>())
    }
}
