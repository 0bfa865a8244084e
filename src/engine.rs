//! The request-serving core: one owned index plus the stages that read it.

use std::{
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{Arc, RwLock},
};

use crate::{
    analysis::Analyzer,
    classify::{Classifier, Query},
    compose::{Answer, Composer},
    corpus::Chunk,
    error::Result,
    index::{Index, IndexStats},
    retrieve::Retriever,
    settings::EngineConfig,
};

/// An index with the classifier, retriever and composer configured for it.
#[derive(Debug)]
pub struct Pipeline {
    index: Index,
    classifier: Classifier,
    retriever: Retriever,
    composer: Composer,
}

impl Pipeline {
    pub fn new(index: Index, config: &EngineConfig) -> Self {
        let analyzer: Analyzer = index.analyzer().clone();
        let classifier = Classifier::new(analyzer.clone(), config);
        let composer =
            Composer::new(analyzer, classifier.alias_terms(), config);
        Self {
            index,
            classifier,
            retriever: Retriever::new(config),
            composer,
        }
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    pub fn classify(&self, question: &str) -> Query {
        self.classifier.classify(&self.index, question)
    }

    /// Classify, retrieve, compose. Pure with respect to `self`.
    pub fn answer(&self, question: &str) -> Answer {
        let query = self.classify(question);
        let retrieval = self.retriever.retrieve(&self.index, &query);
        self.composer.compose(&query, &retrieval)
    }
}

/// Serves answers from the currently installed index.
///
/// Readers clone the `Arc` under a short read lock and then work lock-free;
/// installing a new index swaps the `Arc`, so in-flight answers finish on the
/// index they started with.
#[derive(Debug)]
pub struct AnswerEngine {
    config: EngineConfig,
    current: RwLock<Option<Arc<Pipeline>>>,
}

impl AnswerEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            current: RwLock::new(None),
        }
    }

    /// An engine serving `index` right away.
    pub fn with_index(config: EngineConfig, index: Index) -> Self {
        let engine = Self::new(config);
        engine.install(index);
        engine
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Publish a fully built index.
    pub fn install(&self, index: Index) {
        let pipeline = Arc::new(Pipeline::new(index, &self.config));
        // a poisoned lock still holds a valid Option<Arc<_>>
        let mut slot = self.current.write().unwrap_or_else(|e| e.into_inner());
        *slot = Some(pipeline);
        tracing::debug!("installed index");
    }

    /// Build a new index from `chunks`, then swap it in. On failure the
    /// previous index keeps serving.
    pub fn rebuild(&self, chunks: Vec<Chunk>) -> Result<IndexStats> {
        let index = Index::build(chunks)?;
        let stats = index.stats();
        self.install(index);
        Ok(stats)
    }

    /// Whether an index has been installed.
    pub fn ready(&self) -> bool {
        self.current().is_some()
    }

    pub fn current(&self) -> Option<Arc<Pipeline>> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn stats(&self) -> Option<IndexStats> {
        self.current().map(|p| p.index().stats())
    }

    /// Answer one question. Never panics and never returns an error: any
    /// internal failure becomes the generic apology.
    pub fn answer(&self, question: &str) -> Answer {
        let Some(pipeline) = self.current() else {
            tracing::warn!("question received before an index was installed");
            return Answer::apology();
        };

        shielded(|| pipeline.answer(question))
    }
}

/// Run `compose`, turning a panic into the generic apology.
fn shielded(compose: impl FnOnce() -> Answer) -> Answer {
    match catch_unwind(AssertUnwindSafe(compose)) {
        Ok(answer) => {
            tracing::info!(
                status = %answer.status,
                citations = answer.citations.len(),
                "answered question"
            );
            answer
        }
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            tracing::error!(%message, "answer pipeline panicked");
            Answer::apology()
        }
    }
}
