//! Query classification: which platforms a question names, whether it asks
//! for a comparison, and whether it is in scope at all.

use std::collections::HashSet;

use serde::Serialize;

use crate::{
    analysis::{Analyzer, Token},
    index::Index,
    settings::EngineConfig,
    topic::{ALIASES, QUALIFIERS_AFTER, QUALIFIERS_BEFORE, Topic},
};

/// Feature phrase used when a question names nothing but platforms.
pub const DEFAULT_FEATURE: &str = "features and capabilities";

/// Words that signal a comparison. Never part of the feature phrase.
pub static COMPARISON_CUES: &[&str] = &[
    "compare",
    "compared",
    "comparing",
    "comparison",
    "versus",
    "vs",
    "difference",
    "differences",
    "different",
    "differ",
    "better",
    "best",
    "prefer",
    "advantage",
    "advantages",
    "disadvantage",
    "disadvantages",
    "between",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Howto,
    Comparison,
    OutOfDomain,
}

/// A classified question.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Query {
    /// Question text after truncation.
    pub text: String,
    /// Analyzed terms, deduplicated, in order of first appearance.
    pub terms: Vec<String>,
    /// Detected topics in order of first mention. For a question naming no
    /// topic but matching the corpus, the topic of the best match.
    pub topics: Vec<Topic>,
    pub intent: Intent,
    /// Best similarity seen while classifying.
    pub confidence: f32,
    /// What the question is about, minus platform names and comparison cues.
    pub feature: String,
    /// Analyzed terms of [`feature`](Self::feature).
    pub feature_terms: Vec<String>,
}

#[derive(Debug, Clone)]
struct AliasPattern {
    topic: Topic,
    terms: Vec<String>,
    /// Exact lowercase words an ambiguous alias must be written as, so
    /// "segments" or "segmentation" never stem their way into a mention.
    exact: Option<Vec<&'static str>>,
}

/// Analyzed form of every alias and cue word.
#[derive(Debug, Clone)]
pub struct Classifier {
    analyzer: Analyzer,
    patterns: Vec<AliasPattern>,
    cues: HashSet<String>,
    rejection_threshold: f32,
    max_question_chars: usize,
}

impl Classifier {
    pub fn new(analyzer: Analyzer, config: &EngineConfig) -> Self {
        let mut patterns: Vec<AliasPattern> = ALIASES
            .iter()
            .map(|alias| AliasPattern {
                topic: alias.topic,
                terms: analyzer.terms(alias.phrase),
                exact: alias
                    .ambiguous
                    .then(|| alias.phrase.split(' ').collect()),
            })
            .filter(|p| !p.terms.is_empty())
            .collect();
        // longest match wins ("twilio segment" before "segment")
        patterns.sort_by(|a, b| b.terms.len().cmp(&a.terms.len()));

        let cues = COMPARISON_CUES
            .iter()
            .flat_map(|w| analyzer.terms(w))
            .collect();

        Self {
            cues,
            patterns,
            analyzer,
            rejection_threshold: config.rejection_threshold,
            max_question_chars: config.max_question_chars,
        }
    }

    /// Every analyzed term that belongs to some topic alias.
    pub fn alias_terms(&self) -> HashSet<String> {
        self.patterns
            .iter()
            .flat_map(|p| p.terms.iter().cloned())
            .collect()
    }

    pub fn classify(&self, index: &Index, raw: &str) -> Query {
        let text = truncate_to_tail(raw.trim(), self.max_question_chars);
        let tokens = self.analyzer.tokens(text);

        let (topics, alias_positions) = self.detect_topics(text, &tokens);
        let (feature, feature_terms) = self.feature(&tokens, &alias_positions);

        let mut seen = HashSet::new();
        let terms: Vec<String> = tokens
            .iter()
            .filter(|t| seen.insert(t.term.as_str()))
            .map(|t| t.term.clone())
            .collect();

        let mut query = Query {
            text: text.to_string(),
            terms,
            topics,
            intent: Intent::OutOfDomain,
            confidence: 0.0,
            feature,
            feature_terms,
        };

        if tokens.is_empty() {
            return query;
        }

        let vector = index.query_vector(text);
        if query.topics.is_empty() {
            let Some(best) = index.search(&vector, None, 1).into_iter().next()
            else {
                return query;
            };
            query.confidence = best.score;
            if best.score >= self.rejection_threshold {
                query.topics.push(best.chunk.topic);
                query.intent = Intent::Howto;
            }
        } else {
            query.confidence = index
                .search(&vector, Some(query.topics.as_slice()), 1)
                .first()
                .map_or(0.0, |hit| hit.score);
            query.intent = if query.topics.len() >= 2 {
                Intent::Comparison
            } else {
                Intent::Howto
            };
        }

        tracing::debug!(
            intent = ?query.intent,
            topics = ?query.topics,
            confidence = query.confidence,
            "classified question"
        );
        query
    }

    /// Topics named in `tokens`, plus the token positions that named them.
    fn detect_topics(
        &self,
        text: &str,
        tokens: &[Token],
    ) -> (Vec<Topic>, HashSet<usize>) {
        let mut topics = Vec::new();
        let mut positions = HashSet::new();
        let mut i = 0;

        while i < tokens.len() {
            let matched = self.patterns.iter().find(|p| {
                tokens.len() - i >= p.terms.len()
                    && p.terms
                        .iter()
                        .zip(&tokens[i..])
                        .all(|(want, got)| *want == got.term)
                    && p.exact.as_ref().is_none_or(|words| {
                        words
                            .iter()
                            .zip(&tokens[i..])
                            .all(|(want, got)| *want == got.surface)
                    })
            });

            let Some(pattern) = matched else {
                i += 1;
                continue;
            };
            let end = i + pattern.terms.len();

            if pattern.exact.is_some()
                && is_plain_word(text, tokens[i].start, tokens[end - 1].end)
            {
                i = end;
                continue;
            }

            positions.extend(i..end);
            if !topics.contains(&pattern.topic) {
                topics.push(pattern.topic);
            }
            i = end;
        }

        (topics, positions)
    }

    fn feature(
        &self,
        tokens: &[Token],
        alias_positions: &HashSet<usize>,
    ) -> (String, Vec<String>) {
        let mut seen = HashSet::new();
        let mut surfaces = Vec::new();
        let mut terms = Vec::new();

        for (pos, token) in tokens.iter().enumerate() {
            if alias_positions.contains(&pos) || self.cues.contains(&token.term)
            {
                continue;
            }
            if seen.insert(token.term.as_str()) {
                surfaces.push(token.surface.as_str());
                terms.push(token.term.clone());
            }
        }

        if surfaces.is_empty() {
            (DEFAULT_FEATURE.to_string(), terms)
        } else {
            (surfaces.join(" "), terms)
        }
    }
}

/// Whether the ambiguous alias at bytes `start..end` of `text` reads as an
/// everyday word. Neighbours are taken from the raw text, stop words
/// included ("segment your audience").
fn is_plain_word(text: &str, start: usize, end: usize) -> bool {
    let is_break = |c: char| !c.is_alphanumeric();
    let before = text[..start]
        .rsplit(is_break)
        .find(|w| !w.is_empty())
        .map(str::to_lowercase);
    let after = text[end..]
        .split(is_break)
        .find(|w| !w.is_empty())
        .map(str::to_lowercase);

    before.is_some_and(|w| QUALIFIERS_BEFORE.contains(&w.as_str()))
        || after.is_some_and(|w| QUALIFIERS_AFTER.contains(&w.as_str()))
}

/// Keep at most `max_chars` trailing characters of `text`.
///
/// # Examples
///
/// ```
/// use cdpqa::classify::truncate_to_tail;
///
/// assert_eq!(truncate_to_tail("abcdef", 3), "def");
/// assert_eq!(truncate_to_tail("abc", 10), "abc");
/// ```
pub fn truncate_to_tail(text: &str, max_chars: usize) -> &str {
    let count = text.chars().count();
    if count <= max_chars {
        return text;
    }
    match text.char_indices().nth(count - max_chars) {
        Some((start, _)) => &text[start..],
        None => text,
    }
}
