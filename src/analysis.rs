//! Text normalization shared by indexing, classification and composition.
//!
//! Chunk bodies and questions must land in the same vector space, so there
//! is exactly one pipeline: split on non-alphanumerics, drop overlong
//! tokens, lowercase, remove stop words, then apply the English Snowball
//! stemmer. It is the same tantivy analyzer chain the full-text index used,
//! plus a stop-word filter.

use std::collections::BTreeMap;

use tantivy::tokenizer::{
    Language,
    LowerCaser,
    RemoveLongFilter,
    SimpleTokenizer,
    Stemmer,
    StopWordFilter,
    TextAnalyzer,
    TokenStream,
};

/// Tokens longer than this many bytes are dropped (hashes, base64 blobs).
const MAX_TOKEN_BYTES: usize = 40;

/// Fixed English stop-word list. Question scaffolding ("how do I", "can
/// you") is in here on purpose so it never contributes weight.
pub static STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "also", "am",
    "an", "and", "any", "are", "as", "at", "be", "because", "been", "before",
    "being", "below", "between", "both", "but", "by", "can", "could", "did",
    "do", "does", "doing", "done", "down", "during", "each", "else", "etc",
    "few", "for", "from", "further", "get", "had", "has", "have", "having",
    "he", "her", "here", "hers", "herself", "him", "himself", "his", "how",
    "i", "if", "in", "into", "is", "it", "its", "itself", "just", "let", "me",
    "might", "more", "most", "must", "my", "myself", "no", "nor", "not",
    "now", "of", "off", "on", "once", "only", "or", "other", "our", "ours",
    "ourselves", "out", "over", "own", "please", "same", "shall", "she",
    "should", "so", "some", "such", "than", "that", "the", "their", "theirs",
    "them", "themselves", "then", "there", "these", "they", "this", "those",
    "through", "to", "too", "under", "until", "up", "upon", "us", "very",
    "via", "want", "was", "we", "were", "what", "when", "where", "which",
    "while", "who", "whom", "why", "will", "with", "within", "would", "you",
    "your", "yours", "yourself", "yourselves",
];

/// A normalized term together with the text it was produced from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Stemmed, lowercased term as stored in the vocabulary.
    pub term: String,
    /// Lowercased source word, for rendering.
    pub surface: String,
    /// Byte range of the source word in the analyzed text.
    pub start: usize,
    pub end: usize,
}

/// Cheap-to-clone handle on the shared analyzer chain.
///
/// tantivy's `TextAnalyzer` needs `&mut self` to produce a stream, so every
/// call works on a private clone and the handle itself can be shared freely
/// between threads.
#[derive(Clone)]
pub struct Analyzer {
    inner: TextAnalyzer,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analyzer").finish_non_exhaustive()
    }
}

impl Analyzer {
    pub fn new() -> Self {
        let inner = TextAnalyzer::builder(SimpleTokenizer::default())
            .filter(RemoveLongFilter::limit(MAX_TOKEN_BYTES))
            .filter(LowerCaser)
            .filter(StopWordFilter::remove(
                STOP_WORDS.iter().map(|w| (*w).to_string()),
            ))
            .filter(Stemmer::new(Language::English))
            .build();
        Self { inner }
    }

    /// Analyze `text` keeping the surface form of each term.
    ///
    /// # Examples
    ///
    /// ```
    /// use cdpqa::analysis::Analyzer;
    ///
    /// let tokens = Analyzer::new().tokens("Creating Audiences");
    /// assert_eq!(tokens[0].term, "creat");
    /// assert_eq!(tokens[0].surface, "creating");
    /// ```
    pub fn tokens(&self, text: &str) -> Vec<Token> {
        let mut analyzer = self.inner.clone();
        let mut stream = analyzer.token_stream(text);
        let mut out = Vec::new();
        while stream.advance() {
            let token = stream.token();
            let surface = text
                .get(token.offset_from..token.offset_to)
                .unwrap_or(token.text.as_str())
                .to_lowercase();
            out.push(Token {
                term: token.text.clone(),
                surface,
                start: token.offset_from,
                end: token.offset_to,
            });
        }
        out
    }

    /// Analyze `text` into vocabulary terms, in order, with repeats.
    pub fn terms(&self, text: &str) -> Vec<String> {
        let mut analyzer = self.inner.clone();
        let mut stream = analyzer.token_stream(text);
        let mut out = Vec::new();
        while stream.advance() {
            out.push(stream.token().text.clone());
        }
        out
    }

    /// Term frequencies of `text`, keyed in lexicographic order.
    pub fn term_counts(&self, text: &str) -> BTreeMap<String, u32> {
        let mut counts = BTreeMap::new();
        for term in self.terms(text) {
            *counts.entry(term).or_insert(0) += 1;
        }
        counts
    }
}

/// Collapse every run of whitespace into a single space and trim the ends.
///
/// # Examples
///
/// ```
/// use cdpqa::analysis::normalize_whitespace;
///
/// assert_eq!(normalize_whitespace("  a\n\n b\tc "), "a b c");
/// ```
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
