use crate::{
    classify::{Intent, Query},
    index::{Index, SearchHit},
    settings::EngineConfig,
    topic::Topic,
};

/// Ranked hits for one topic.
#[derive(Debug, Clone)]
pub struct TopicHits<'a> {
    pub topic: Topic,
    pub hits: Vec<SearchHit<'a>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// At least one topic produced hits.
    Found,
    /// Rejected by the classifier; the index was not searched.
    OutOfDomain,
    /// Searched, but nothing cleared the similarity floor.
    LowConfidence,
}

/// Per-topic ranked chunk lists, in the query's topic order.
#[derive(Debug, Clone)]
pub struct Retrieval<'a> {
    pub outcome: Outcome,
    pub topics: Vec<TopicHits<'a>>,
}

#[derive(Debug, Clone, Copy)]
pub struct Retriever {
    top_k: usize,
    min_similarity: f32,
}

impl Retriever {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            top_k: config.top_k,
            min_similarity: config.min_similarity,
        }
    }

    pub fn retrieve<'a>(&self, index: &'a Index, query: &Query) -> Retrieval<'a> {
        if query.intent == Intent::OutOfDomain || query.topics.is_empty() {
            return Retrieval {
                outcome: Outcome::OutOfDomain,
                topics: Vec::new(),
            };
        }

        let vector = index.query_vector(&query.text);
        let topics: Vec<TopicHits<'a>> = query
            .topics
            .iter()
            .map(|&topic| {
                let hits: Vec<SearchHit<'a>> = index
                    .search(&vector, Some(std::slice::from_ref(&topic)), self.top_k)
                    .into_iter()
                    .filter(|hit| hit.score >= self.min_similarity)
                    .collect();
                if hits.is_empty() {
                    tracing::debug!(
                        %topic,
                        indexed = index.indexed_chunks_for(topic),
                        "no chunk above the similarity floor"
                    );
                }
                TopicHits { topic, hits }
            })
            .collect();

        let outcome = if topics.iter().any(|t| !t.hits.is_empty()) {
            Outcome::Found
        } else {
            Outcome::LowConfidence
        };
        Retrieval { outcome, topics }
    }
}
