//! Answer composition: pure functions from a classified query and its
//! retrieved chunks to answer text plus citations.
//!
//! Template selection is a closed set: how-to, comparison, and the two
//! rejections. Nothing here depends on time, randomness or hash order, so the
//! same inputs always render byte-identical answers.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use crate::{
    analysis::Analyzer,
    classify::{Intent, Query},
    index::SearchHit,
    retrieve::{Outcome, Retrieval, TopicHits},
    settings::EngineConfig,
    text_util::{excerpt, sentences, truncate_chars},
    topic::Topic,
};

/// Terms listed per topic in the comparison remark.
const REMARK_TERMS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Answered,
    RejectedOutOfDomain,
    RejectedLowConfidence,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Answered => "answered",
            Status::RejectedOutOfDomain => "rejected_out_of_domain",
            Status::RejectedLowConfidence => "rejected_low_confidence",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Citation {
    pub topic: Topic,
    pub source: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub text: String,
    /// Ordered by relevance; grouped by topic for comparisons.
    pub citations: Vec<Citation>,
    pub status: Status,
}

impl Answer {
    fn rejected(text: String, status: Status) -> Self {
        Self {
            text,
            citations: Vec::new(),
            status,
        }
    }

    pub fn out_of_domain() -> Self {
        Self::rejected(
            format!(
                "I'm a CDP support assistant, so I can only answer questions \
                 about {}. Try asking how to do something in one of them, for \
                 example \"How do I set up a new source in Segment?\"",
                platforms()
            ),
            Status::RejectedOutOfDomain,
        )
    }

    pub fn low_confidence(topics: &[Topic]) -> Self {
        let scope = if topics.is_empty() {
            "the indexed documentation".to_string()
        } else {
            format!("the {} documentation", join_names(topics, "or"))
        };
        Self::rejected(
            format!(
                "I couldn't find anything in {scope} that answers this. Try \
                 rephrasing the question or naming the specific feature. I can \
                 help with {}.",
                platforms()
            ),
            Status::RejectedLowConfidence,
        )
    }

    /// Generic reply when the pipeline cannot run or fails internally.
    pub fn apology() -> Self {
        Self::rejected(
            format!(
                "Sorry, something went wrong while answering that question. \
                 Please try again in a moment. I can help with {}.",
                platforms()
            ),
            Status::RejectedLowConfidence,
        )
    }
}

fn platforms() -> String {
    join_names(&Topic::ALL, "or")
}

/// "A", "A and B", "A, B and C".
fn join_names(topics: &[Topic], conjunction: &str) -> String {
    let names: Vec<&str> = topics.iter().map(|t| t.display_name()).collect();
    match names.split_last() {
        None => String::new(),
        Some((last, [])) => (*last).to_string(),
        Some((last, rest)) => {
            format!("{} {conjunction} {last}", rest.join(", "))
        }
    }
}

/// Keep the first hit per source locator, in score order.
fn dedup_by_source<'a>(hits: &[SearchHit<'a>]) -> Vec<SearchHit<'a>> {
    let mut seen = HashSet::new();
    hits.iter()
        .filter(|hit| seen.insert(hit.chunk.source.as_str()))
        .copied()
        .collect()
}

fn citation(hit: &SearchHit<'_>) -> Citation {
    Citation {
        topic: hit.chunk.topic,
        source: hit.chunk.source.clone(),
        title: hit.chunk.title.clone(),
    }
}

#[derive(Debug, Clone)]
pub struct Composer {
    analyzer: Analyzer,
    /// Platform-name terms; never reported as key terms.
    alias_terms: HashSet<String>,
    answer_sections: usize,
    excerpt_chars: usize,
    summary_chars: usize,
    comparison_sentences: usize,
}

impl Composer {
    pub fn new(
        analyzer: Analyzer,
        alias_terms: HashSet<String>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            analyzer,
            alias_terms,
            answer_sections: config.answer_sections,
            excerpt_chars: config.excerpt_chars,
            summary_chars: config.summary_chars,
            comparison_sentences: config.comparison_sentences,
        }
    }

    pub fn compose(&self, query: &Query, retrieval: &Retrieval<'_>) -> Answer {
        match retrieval.outcome {
            Outcome::OutOfDomain => Answer::out_of_domain(),
            Outcome::LowConfidence => Answer::low_confidence(&query.topics),
            Outcome::Found => match (query.intent, retrieval.topics.as_slice()) {
                (Intent::Comparison, topics) if topics.len() >= 2 => {
                    self.comparison(query, topics)
                }
                (_, topics) => match topics.iter().find(|t| !t.hits.is_empty())
                {
                    Some(found) => self.howto(found),
                    None => Answer::low_confidence(&query.topics),
                },
            },
        }
    }

    fn howto(&self, found: &TopicHits<'_>) -> Answer {
        let hits = dedup_by_source(&found.hits);
        let split = self.answer_sections.min(hits.len());
        let (sections, more) = hits.split_at(split);

        let mut lines =
            vec![format!("Here's how to do that in {}:", found.topic)];
        for hit in sections {
            lines.push(String::new());
            lines.push(format!("**{}**", hit.chunk.title));
            lines.push(excerpt(&hit.chunk.body, self.excerpt_chars));
        }

        if !more.is_empty() {
            lines.push(String::new());
            lines.push("You might also find these helpful:".to_string());
            for hit in more {
                lines.push(format!("- {}: {}", hit.chunk.title, hit.chunk.source));
            }
        }

        let citations: Vec<Citation> = hits.iter().map(citation).collect();
        lines.push(String::new());
        lines.push("Sources:".to_string());
        for (i, c) in citations.iter().enumerate() {
            lines.push(format!("{}. {}: {}", i + 1, c.title, c.source));
        }

        Answer {
            text: lines.join("\n"),
            citations,
            status: Status::Answered,
        }
    }

    fn comparison(&self, query: &Query, topics: &[TopicHits<'_>]) -> Answer {
        let names: Vec<Topic> = topics.iter().map(|t| t.topic).collect();
        let mut lines = vec![format!(
            "Here's a comparison of {} between {}:",
            query.feature,
            join_names(&names, "and")
        )];

        let focus = self.focus_terms(query);
        let mut profiles: Vec<(Topic, TermProfile)> = Vec::new();

        for topic_hits in topics {
            lines.push(String::new());
            let Some(best) = topic_hits.hits.first() else {
                lines.push(format!("**{}**:", topic_hits.topic));
                lines.push(format!(
                    "No documentation found for this in {}.",
                    topic_hits.topic
                ));
                continue;
            };
            lines.push(format!(
                "**{}** ({}):",
                topic_hits.topic, best.chunk.title
            ));
            lines.push(self.summary(&best.chunk.body, &focus));
            profiles.push((topic_hits.topic, self.profile(&best.chunk.body)));
        }

        lines.push(String::new());
        lines.push("**Key differences**:".to_string());
        lines.extend(remark(&profiles));

        let mut seen = HashSet::new();
        let mut citations = Vec::new();
        lines.push(String::new());
        lines.push("Sources:".to_string());
        for topic_hits in topics {
            let group: Vec<Citation> = dedup_by_source(&topic_hits.hits)
                .iter()
                .filter(|hit| seen.insert(hit.chunk.source.clone()))
                .map(citation)
                .collect();
            if group.is_empty() {
                continue;
            }
            lines.push(format!("{}:", topic_hits.topic));
            for (i, c) in group.iter().enumerate() {
                lines.push(format!("{}. {}: {}", i + 1, c.title, c.source));
            }
            citations.extend(group);
        }

        Answer {
            text: lines.join("\n"),
            citations,
            status: Status::Answered,
        }
    }

    /// Terms a comparison summary should be about.
    fn focus_terms(&self, query: &Query) -> HashSet<String> {
        if !query.feature_terms.is_empty() {
            return query.feature_terms.iter().cloned().collect();
        }
        query
            .terms
            .iter()
            .filter(|t| !self.alias_terms.contains(*t))
            .cloned()
            .collect()
    }

    fn summary(&self, body: &str, focus: &HashSet<String>) -> String {
        let picked: Vec<&str> = sentences(body)
            .into_iter()
            .filter(|sentence| {
                self.analyzer
                    .terms(sentence)
                    .iter()
                    .any(|term| focus.contains(term))
            })
            .take(self.comparison_sentences)
            .collect();

        if picked.is_empty() {
            truncate_chars(body, self.summary_chars)
        } else {
            picked.join(" ")
        }
    }

    fn profile(&self, body: &str) -> TermProfile {
        let mut profile = TermProfile::default();
        for token in self.analyzer.tokens(body) {
            if self.alias_terms.contains(&token.term) {
                continue;
            }
            let entry = profile
                .terms
                .entry(token.term)
                .or_insert_with(|| (0, token.surface));
            entry.0 += 1;
        }
        profile
    }
}

/// Term -> (frequency, first surface spelling) for one topic's text.
#[derive(Debug, Default)]
struct TermProfile {
    terms: BTreeMap<String, (u32, String)>,
}

/// Rank terms by frequency, then alphabetically, and render surfaces.
fn top_terms<'a>(
    candidates: impl Iterator<Item = (&'a String, u32, &'a str)>,
    limit: usize,
) -> Vec<&'a str> {
    let mut ranked: Vec<_> = candidates.collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked.into_iter().take(limit).map(|(_, _, s)| s).collect()
}

fn remark(profiles: &[(Topic, TermProfile)]) -> Vec<String> {
    if profiles.len() < 2 {
        return match profiles.first() {
            Some((topic, _)) => vec![format!(
                "- Only {topic} has matching documentation, so there is \
                 nothing to compare it against."
            )],
            None => Vec::new(),
        };
    }

    let mut lines = Vec::new();

    let (first, rest) = (&profiles[0].1, &profiles[1..]);
    let shared = top_terms(
        first
            .terms
            .iter()
            .filter(|(term, _)| {
                rest.iter().all(|(_, p)| p.terms.contains_key(*term))
            })
            .map(|(term, (count, surface))| {
                let total = count
                    + rest
                        .iter()
                        .filter_map(|(_, p)| p.terms.get(term))
                        .map(|(c, _)| c)
                        .sum::<u32>();
                (term, total, surface.as_str())
            }),
        REMARK_TERMS,
    );
    if shared.is_empty() {
        lines.push("- The documentation shares no key terms.".to_string());
    } else {
        lines.push(format!("- Both cover: {}.", shared.join(", ")));
    }

    for (i, (topic, profile)) in profiles.iter().enumerate() {
        let unique = top_terms(
            profile
                .terms
                .iter()
                .filter(|(term, _)| {
                    profiles
                        .iter()
                        .enumerate()
                        .all(|(j, (_, p))| j == i || !p.terms.contains_key(*term))
                })
                .map(|(term, (count, surface))| (term, *count, surface.as_str())),
            REMARK_TERMS,
        );
        if !unique.is_empty() {
            lines.push(format!("- Only {topic} mentions: {}.", unique.join(", ")));
        }
    }

    lines
}
