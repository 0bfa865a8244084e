//! TF-IDF vector-space index over the chunk store.
//!
//! Built once from an immutable chunk sequence, then only read. Every method
//! after [`Index::build`] takes `&self`, so one `Arc<Index>` can serve any
//! number of concurrent searches.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use rayon::prelude::*;
use serde::Serialize;

use crate::{
    analysis::Analyzer,
    corpus::Chunk,
    error::{Error, Result},
    topic::Topic,
};

/// Term -> dense position, positions contiguous from 0.
///
/// Positions follow lexicographic term order, so the same set of chunks
/// always produces the same vocabulary whatever order they arrive in.
#[derive(Debug, Clone, PartialEq)]
pub struct Vocabulary {
    terms: Vec<String>,
    positions: HashMap<String, u32>,
}

impl Vocabulary {
    fn from_sorted(terms: Vec<String>) -> Self {
        let positions = terms
            .iter()
            .enumerate()
            .map(|(pos, term)| (term.clone(), pos as u32))
            .collect();
        Self { terms, positions }
    }

    pub fn position(&self, term: &str) -> Option<u32> {
        self.positions.get(term).copied()
    }

    pub fn term(&self, position: u32) -> Option<&str> {
        self.terms.get(position as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }
}

/// Sparse vector, positions strictly increasing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparseVector {
    positions: Vec<u32>,
    weights: Vec<f32>,
}

impl SparseVector {
    /// Build from (position, raw weight) pairs and scale to unit length.
    fn normalized(mut entries: Vec<(u32, f32)>) -> Self {
        entries.sort_unstable_by_key(|(pos, _)| *pos);
        let norm = entries
            .iter()
            .map(|(_, w)| f64::from(*w) * f64::from(*w))
            .sum::<f64>()
            .sqrt();
        if norm == 0.0 {
            return Self::default();
        }
        let (positions, weights) = entries
            .into_iter()
            .map(|(pos, w)| (pos, (f64::from(w) / norm) as f32))
            .unzip();
        Self { positions, weights }
    }

    /// Rebuild from stored parts. Positions must be strictly increasing.
    pub fn from_parts(positions: Vec<u32>, weights: Vec<f32>) -> Result<Self> {
        if positions.len() != weights.len() {
            return Err(Error::CorruptIndex(format!(
                "vector has {} positions but {} weights",
                positions.len(),
                weights.len()
            )));
        }
        if positions.windows(2).any(|w| w[0] >= w[1]) {
            return Err(Error::CorruptIndex(
                "vector positions are not strictly increasing".into(),
            ));
        }
        Ok(Self { positions, weights })
    }

    pub fn positions(&self) -> &[u32] {
        &self.positions
    }

    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn norm(&self) -> f32 {
        self.weights.iter().map(|w| w * w).sum::<f32>().sqrt()
    }

    /// Dot product by merging the two sorted position lists.
    pub fn dot(&self, other: &SparseVector) -> f32 {
        let (mut i, mut j) = (0, 0);
        let mut sum = 0.0f32;
        while i < self.positions.len() && j < other.positions.len() {
            match self.positions[i].cmp(&other.positions[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    sum += self.weights[i] * other.weights[j];
                    i += 1;
                    j += 1;
                }
            }
        }
        sum
    }
}

/// A chunk that made it into the vector space.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedChunk {
    /// Position of the chunk in the chunk store.
    pub chunk: usize,
    pub vector: SparseVector,
}

/// One ranked search result.
#[derive(Debug, Clone, Copy)]
pub struct SearchHit<'a> {
    pub chunk: &'a Chunk,
    /// Cosine similarity in (0, 1].
    pub score: f32,
}

/// Summary numbers for status output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexStats {
    pub chunks: usize,
    pub indexed_chunks: usize,
    pub excluded_chunks: usize,
    pub vocabulary: usize,
    pub per_topic: BTreeMap<Topic, usize>,
}

/// The read-only TF-IDF index.
#[derive(Debug, Clone)]
pub struct Index {
    analyzer: Analyzer,
    chunks: Vec<Chunk>,
    vocabulary: Vocabulary,
    idf: Vec<f32>,
    entries: Vec<IndexedChunk>,
}

/// Smoothed inverse document frequency: `ln((N+1)/(df+1)) + 1`.
///
/// # Examples
///
/// ```
/// use cdpqa::index::smoothed_idf;
///
/// // A term in every document still gets weight 1.
/// assert!((smoothed_idf(10, 10) - 1.0).abs() < 1e-6);
/// assert!(smoothed_idf(10, 1) > smoothed_idf(10, 5));
/// ```
pub fn smoothed_idf(total_chunks: usize, doc_frequency: usize) -> f32 {
    let n = total_chunks as f64;
    let df = doc_frequency as f64;
    (((n + 1.0) / (df + 1.0)).ln() + 1.0) as f32
}

impl Index {
    /// Build the index from the full chunk store.
    ///
    /// The store is kept in chunk id order, so equal scores rank the same
    /// way whatever order the chunks arrive in. Chunks whose body has no
    /// indexable term stay in the store but get no vector. Fails with
    /// [`Error::EmptyCorpus`] when there is nothing to index at all.
    pub fn build(mut chunks: Vec<Chunk>) -> Result<Self> {
        if chunks.is_empty() {
            return Err(Error::EmptyCorpus { chunks: 0 });
        }
        chunks.sort_by(|a, b| a.id.cmp(&b.id));

        let analyzer = Analyzer::new();
        let counts: Vec<BTreeMap<String, u32>> = chunks
            .par_iter()
            .map(|chunk| analyzer.term_counts(&chunk.body))
            .collect();

        let terms: BTreeSet<&String> =
            counts.iter().flat_map(|c| c.keys()).collect();
        let vocabulary =
            Vocabulary::from_sorted(terms.into_iter().cloned().collect());
        if vocabulary.is_empty() {
            return Err(Error::EmptyCorpus {
                chunks: chunks.len(),
            });
        }

        let mut doc_frequency = vec![0usize; vocabulary.len()];
        for chunk_counts in &counts {
            for term in chunk_counts.keys() {
                if let Some(pos) = vocabulary.position(term) {
                    doc_frequency[pos as usize] += 1;
                }
            }
        }
        let idf: Vec<f32> = doc_frequency
            .iter()
            .map(|&df| smoothed_idf(chunks.len(), df))
            .collect();

        let entries: Vec<IndexedChunk> = counts
            .par_iter()
            .enumerate()
            .filter(|(_, chunk_counts)| !chunk_counts.is_empty())
            .map(|(chunk, chunk_counts)| IndexedChunk {
                chunk,
                vector: weigh(&vocabulary, &idf, chunk_counts),
            })
            .collect();

        let index = Self {
            analyzer,
            chunks,
            vocabulary,
            idf,
            entries,
        };
        let stats = index.stats();
        tracing::info!(
            chunks = stats.chunks,
            indexed = stats.indexed_chunks,
            excluded = stats.excluded_chunks,
            vocabulary = stats.vocabulary,
            "built index"
        );
        Ok(index)
    }

    /// Reassemble an index from persisted parts, checking every invariant
    /// the builder guarantees.
    pub fn from_parts(
        chunks: Vec<Chunk>,
        terms: Vec<String>,
        idf: Vec<f32>,
        entries: Vec<IndexedChunk>,
    ) -> Result<Self> {
        if terms.windows(2).any(|w| w[0] >= w[1]) {
            return Err(Error::CorruptIndex(
                "vocabulary is not sorted".into(),
            ));
        }
        if terms.len() != idf.len() {
            return Err(Error::CorruptIndex(format!(
                "{} terms but {} idf weights",
                terms.len(),
                idf.len()
            )));
        }
        if idf.iter().any(|w| !(w.is_finite() && *w > 0.0)) {
            return Err(Error::CorruptIndex("non-positive idf weight".into()));
        }
        for entry in &entries {
            if entry.chunk >= chunks.len() {
                return Err(Error::CorruptIndex(format!(
                    "vector refers to missing chunk {}",
                    entry.chunk
                )));
            }
            if entry
                .vector
                .positions()
                .last()
                .is_some_and(|&pos| pos as usize >= terms.len())
            {
                return Err(Error::CorruptIndex(
                    "vector position outside vocabulary".into(),
                ));
            }
        }
        if entries.windows(2).any(|w| w[0].chunk >= w[1].chunk) {
            return Err(Error::CorruptIndex(
                "vectors are not in chunk order".into(),
            ));
        }
        if entries.is_empty() {
            return Err(Error::EmptyCorpus {
                chunks: chunks.len(),
            });
        }

        Ok(Self {
            analyzer: Analyzer::new(),
            chunks,
            vocabulary: Vocabulary::from_sorted(terms),
            idf,
            entries,
        })
    }

    /// Vectorize free text against the existing vocabulary.
    ///
    /// Terms never seen at build time contribute nothing; text with no known
    /// term yields an empty vector.
    pub fn query_vector(&self, text: &str) -> SparseVector {
        weigh(&self.vocabulary, &self.idf, &self.analyzer.term_counts(text))
    }

    /// Rank chunks by cosine similarity to `query`.
    ///
    /// Only chunks whose topic is in `topics` are scored (all chunks when
    /// `None`). Chunks sharing no term with the query are left out. Results
    /// are in non-increasing score order; equal scores keep chunk store
    /// order.
    pub fn search(
        &self,
        query: &SparseVector,
        topics: Option<&[Topic]>,
        k: usize,
    ) -> Vec<SearchHit<'_>> {
        if k == 0 || query.is_empty() {
            return Vec::new();
        }

        let mut hits: Vec<SearchHit<'_>> = self
            .entries
            .iter()
            .filter_map(|entry| {
                let chunk = &self.chunks[entry.chunk];
                if topics.is_some_and(|wanted| !wanted.contains(&chunk.topic)) {
                    return None;
                }
                let score = entry.vector.dot(query);
                (score > 0.0).then_some(SearchHit { chunk, score })
            })
            .collect();

        // stable: ties stay in chunk store order
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(k);
        hits
    }

    /// Convenience: vectorize `text` and search.
    pub fn search_text(
        &self,
        text: &str,
        topics: Option<&[Topic]>,
        k: usize,
    ) -> Vec<SearchHit<'_>> {
        self.search(&self.query_vector(text), topics, k)
    }

    pub fn analyzer(&self) -> &Analyzer {
        &self.analyzer
    }

    /// The whole chunk store, including chunks without a vector.
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn idf(&self) -> &[f32] {
        &self.idf
    }

    pub fn entries(&self) -> &[IndexedChunk] {
        &self.entries
    }

    /// Number of vectorized chunks for `topic`.
    pub fn indexed_chunks_for(&self, topic: Topic) -> usize {
        self.entries
            .iter()
            .filter(|e| self.chunks[e.chunk].topic == topic)
            .count()
    }

    pub fn stats(&self) -> IndexStats {
        let mut per_topic: BTreeMap<Topic, usize> =
            Topic::ALL.iter().map(|&t| (t, 0)).collect();
        for entry in &self.entries {
            *per_topic.entry(self.chunks[entry.chunk].topic).or_insert(0) += 1;
        }
        IndexStats {
            chunks: self.chunks.len(),
            indexed_chunks: self.entries.len(),
            excluded_chunks: self.chunks.len() - self.entries.len(),
            vocabulary: self.vocabulary.len(),
            per_topic,
        }
    }
}

fn weigh(
    vocabulary: &Vocabulary,
    idf: &[f32],
    counts: &BTreeMap<String, u32>,
) -> SparseVector {
    let entries = counts
        .iter()
        .filter_map(|(term, &tf)| {
            let pos = vocabulary.position(term)?;
            Some((pos, tf as f32 * idf[pos as usize]))
        })
        .collect();
    SparseVector::normalized(entries)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn chunk(id: &str, topic: Topic, title: &str, body: &str) -> Chunk {
        Chunk::new(topic, format!("https://docs/{id}"), title, body)
            .unwrap()
            .with_id(id)
    }

    fn sample_chunks() -> Vec<Chunk> {
        vec![
            chunk(
                "seg-source",
                Topic::Segment,
                "Adding a Source",
                "To add a source, open the Sources page in your workspace \
                 and click Add Source. Choose the source type and name it.",
            ),
            chunk(
                "seg-dest",
                Topic::Segment,
                "Destinations",
                "Destinations receive data from sources. Connect a \
                 destination from the catalog.",
            ),
            chunk(
                "lyt-aud",
                Topic::Lytics,
                "Building Audiences",
                "Create an audience in Lytics using the audience builder. \
                 Combine behavioral and profile attributes.",
            ),
            chunk(
                "mp-profile",
                Topic::MParticle,
                "User Profiles",
                "mParticle creates a user profile for each identity and \
                 merges events into it.",
            ),
        ]
    }

    #[test]
    fn empty_corpus_is_rejected() {
        let err = Index::build(Vec::new()).unwrap_err();
        assert!(matches!(err, Error::EmptyCorpus { chunks: 0 }));
    }

    #[test]
    fn corpus_of_stop_words_is_rejected() {
        let chunks = vec![chunk("x", Topic::Zeotap, "t", "how do I do it")];
        let err = Index::build(chunks).unwrap_err();
        assert!(matches!(err, Error::EmptyCorpus { chunks: 1 }));
    }

    #[test]
    fn vocabulary_is_contiguous_and_sorted() {
        let index = Index::build(sample_chunks()).unwrap();
        let vocab = index.vocabulary();
        for (pos, term) in vocab.terms().iter().enumerate() {
            assert_eq!(vocab.position(term), Some(pos as u32));
            assert_eq!(vocab.term(pos as u32), Some(term.as_str()));
        }
        assert!(vocab.terms().windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn idf_is_positive_and_decreasing_in_df() {
        let index = Index::build(sample_chunks()).unwrap();
        assert!(index.idf().iter().all(|w| *w > 0.0));

        let vocab = index.vocabulary();
        let rare = vocab.position("catalog").unwrap() as usize;
        let common = vocab.position("sourc").unwrap() as usize;
        assert!(index.idf()[rare] > index.idf()[common]);
    }

    #[test]
    fn idf_matches_formula() {
        let index = Index::build(sample_chunks()).unwrap();
        let pos = index.vocabulary().position("catalog").unwrap() as usize;
        let expected = ((5.0f64 / 2.0).ln() + 1.0) as f32;
        assert!((index.idf()[pos] - expected).abs() < 1e-6);
    }

    #[test]
    fn chunks_without_terms_are_excluded_but_kept() {
        let mut chunks = sample_chunks();
        chunks.push(chunk("empty-ish", Topic::Zeotap, "t", "how to do it?"));
        let index = Index::build(chunks).unwrap();

        let stats = index.stats();
        assert_eq!(stats.chunks, 5);
        assert_eq!(stats.indexed_chunks, 4);
        assert_eq!(stats.excluded_chunks, 1);
        assert_eq!(stats.per_topic[&Topic::Zeotap], 0);
        assert!(index.chunks().iter().any(|c| c.id == "empty-ish"));
    }

    #[test]
    fn every_vector_has_unit_norm() {
        let index = Index::build(sample_chunks()).unwrap();
        for entry in index.entries() {
            assert!((entry.vector.norm() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn search_ranks_the_obvious_match_first() {
        let index = Index::build(sample_chunks()).unwrap();
        let hits = index.search_text("add a new source", None, 5);
        assert_eq!(hits[0].chunk.id, "seg-source");
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn search_respects_topic_filter() {
        let index = Index::build(sample_chunks()).unwrap();
        let hits =
            index.search_text("audience profile", Some(&[Topic::Lytics]), 5);
        assert!(!hits.is_empty());
        assert!(hits.iter().all(|h| h.chunk.topic == Topic::Lytics));
    }

    #[test]
    fn search_respects_k() {
        let index = Index::build(sample_chunks()).unwrap();
        assert_eq!(index.search_text("source destination", None, 1).len(), 1);
        assert!(index.search_text("source", None, 0).is_empty());
    }

    #[test]
    fn unseen_terms_contribute_nothing() {
        let index = Index::build(sample_chunks()).unwrap();
        assert!(index.query_vector("asdkjashdkjh").is_empty());
        assert!(index.search_text("asdkjashdkjh", None, 5).is_empty());

        let with_noise = index.query_vector("catalog qwertyzzz");
        let clean = index.query_vector("catalog");
        assert_eq!(with_noise, clean);
    }

    #[test]
    fn ties_keep_chunk_store_order() {
        let chunks = vec![
            chunk("first", Topic::Segment, "a", "tracking plan"),
            chunk("second", Topic::Segment, "b", "tracking plan"),
            chunk("third", Topic::Lytics, "c", "unrelated words"),
        ];
        let index = Index::build(chunks).unwrap();
        let hits = index.search_text("tracking plan", None, 5);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].score, hits[1].score);
        assert_eq!(hits[0].chunk.id, "first");
        assert_eq!(hits[1].chunk.id, "second");
    }

    #[test]
    fn ties_rank_the_same_for_any_build_order() {
        let chunks = vec![
            chunk("bbb", Topic::Segment, "b", "tracking plan"),
            chunk("aaa", Topic::Segment, "a", "tracking plan"),
            chunk("ccc", Topic::Lytics, "c", "unrelated words"),
        ];
        let mut reversed = chunks.clone();
        reversed.reverse();

        for input in [chunks, reversed] {
            let index = Index::build(input).unwrap();
            let hits = index.search_text("tracking plan", None, 5);
            assert_eq!(hits[0].score, hits[1].score);
            assert_eq!(hits[0].chunk.id, "aaa");
            assert_eq!(hits[1].chunk.id, "bbb");
        }
    }

    #[test]
    fn build_order_does_not_change_scores() {
        let forward = Index::build(sample_chunks()).unwrap();
        let mut reversed_chunks = sample_chunks();
        reversed_chunks.reverse();
        let reversed = Index::build(reversed_chunks).unwrap();

        assert_eq!(forward.vocabulary(), reversed.vocabulary());
        assert_eq!(forward.idf(), reversed.idf());

        let a = forward.search_text("create audience", None, 1);
        let b = reversed.search_text("create audience", None, 1);
        assert_eq!(a[0].chunk.id, b[0].chunk.id);
        assert_eq!(a[0].score, b[0].score);
    }

    #[test]
    fn from_parts_rejects_inconsistent_data() {
        let index = Index::build(sample_chunks()).unwrap();
        let mut idf = index.idf().to_vec();
        idf.pop();
        let err = Index::from_parts(
            index.chunks().to_vec(),
            index.vocabulary().terms().to_vec(),
            idf,
            index.entries().to_vec(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::CorruptIndex(_)));

        let mut entries = index.entries().to_vec();
        entries[0].chunk = 99;
        let err = Index::from_parts(
            index.chunks().to_vec(),
            index.vocabulary().terms().to_vec(),
            index.idf().to_vec(),
            entries,
        )
        .unwrap_err();
        assert!(matches!(err, Error::CorruptIndex(_)));
    }

    #[test]
    fn sparse_vector_rejects_unsorted_positions() {
        assert!(SparseVector::from_parts(vec![2, 1], vec![0.5, 0.5]).is_err());
        assert!(SparseVector::from_parts(vec![1], vec![0.5, 0.5]).is_err());
        assert!(SparseVector::from_parts(vec![1, 2], vec![0.5, 0.5]).is_ok());
    }

    fn word() -> impl Strategy<Value = String> {
        prop::sample::select(vec![
            "source", "destination", "audience", "profile", "event",
            "tracking", "identity", "warehouse", "schema", "consent",
            "the", "how", "and",
        ])
        .prop_map(str::to_string)
    }

    fn body() -> impl Strategy<Value = String> {
        prop::collection::vec(word(), 1..30).prop_map(|w| w.join(" "))
    }

    proptest! {
        #[test]
        fn prop_vectors_are_unit_length(bodies in prop::collection::vec(body(), 1..12)) {
            let chunks: Vec<Chunk> = bodies
                .iter()
                .enumerate()
                .map(|(i, b)| chunk(&format!("c{i}"), Topic::Segment, "t", b))
                .collect();
            if let Ok(index) = Index::build(chunks) {
                for entry in index.entries() {
                    prop_assert!((entry.vector.norm() - 1.0).abs() < 1e-4);
                }
            }
        }

        #[test]
        fn prop_results_non_increasing(
            bodies in prop::collection::vec(body(), 1..12),
            query in body(),
        ) {
            let chunks: Vec<Chunk> = bodies
                .iter()
                .enumerate()
                .map(|(i, b)| chunk(&format!("c{i}"), Topic::Lytics, "t", b))
                .collect();
            if let Ok(index) = Index::build(chunks) {
                let hits = index.search_text(&query, None, 20);
                for pair in hits.windows(2) {
                    prop_assert!(pair[0].score >= pair[1].score);
                    if pair[0].score == pair[1].score {
                        let pos = |id: &str| {
                            index.chunks().iter().position(|c| c.id == id)
                        };
                        prop_assert!(pos(&pair[0].chunk.id) < pos(&pair[1].chunk.id));
                    }
                }
            }
        }
    }
}
