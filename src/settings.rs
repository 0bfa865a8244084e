//! Tunable constants of the answering pipeline.
//!
//! Every value resolves, highest priority first, from a CLI flag, a
//! `CDPQA_<KEY>` environment variable, the settings table in `config.redb`,
//! then the built-in default.

use serde::Serialize;

use crate::{
    config_db::ConfigDb,
    corpus::SplitOptions,
    error::{Error, Result},
};

/// Prefix of the environment variables that override settings.
pub const ENV_PREFIX: &str = "CDPQA_";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineConfig {
    /// Chunks retrieved per topic.
    pub top_k: usize,
    /// Hits scoring below this are dropped by the retriever.
    pub min_similarity: f32,
    /// Questions naming no topic are rejected when the best corpus match
    /// scores below this.
    pub rejection_threshold: f32,
    /// Longer questions are cut to their last this-many characters.
    pub max_question_chars: usize,
    pub answer_sections: usize,
    pub excerpt_chars: usize,
    pub summary_chars: usize,
    pub comparison_sentences: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            min_similarity: 0.05,
            rejection_threshold: 0.1,
            max_question_chars: 500,
            answer_sections: 3,
            excerpt_chars: 800,
            summary_chars: 300,
            comparison_sentences: 3,
            chunk_size: crate::chunking::DEFAULT_WINDOW_CHARS,
            chunk_overlap: crate::chunking::DEFAULT_WINDOW_OVERLAP,
        }
    }
}

impl EngineConfig {
    /// Every key accepted by [`set`](Self::set) and `cdpqa config`.
    pub const KEYS: &'static [&'static str] = &[
        "top_k",
        "min_similarity",
        "rejection_threshold",
        "max_question_chars",
        "answer_sections",
        "excerpt_chars",
        "summary_chars",
        "comparison_sentences",
        "chunk_size",
        "chunk_overlap",
    ];

    /// Resolve from persisted settings and the process environment.
    pub fn resolve(config_db: &ConfigDb) -> Result<Self> {
        Self::resolve_with(config_db, |name| std::env::var(name).ok())
    }

    /// Like [`resolve`](Self::resolve) with an injectable environment.
    pub fn resolve_with(
        config_db: &ConfigDb,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let mut config = Self::default();
        for key in Self::KEYS {
            if let Some(value) = config_db.get_setting(key)? {
                config.set(key, &value)?;
            }
            if let Some(value) = env(&env_var(key)) {
                config.set(key, &value).map_err(|e| {
                    Error::Config(format!("{}: {e}", env_var(key)))
                })?;
            }
        }
        config.validate()?;
        Ok(config)
    }

    /// Set one value from its string form.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
            value.trim().parse().map_err(|_| {
                Error::Config(format!("invalid value for {key}: {value:?}"))
            })
        }

        match key {
            "top_k" => self.top_k = parse(key, value)?,
            "min_similarity" => self.min_similarity = parse(key, value)?,
            "rejection_threshold" => {
                self.rejection_threshold = parse(key, value)?
            }
            "max_question_chars" => {
                self.max_question_chars = parse(key, value)?
            }
            "answer_sections" => self.answer_sections = parse(key, value)?,
            "excerpt_chars" => self.excerpt_chars = parse(key, value)?,
            "summary_chars" => self.summary_chars = parse(key, value)?,
            "comparison_sentences" => {
                self.comparison_sentences = parse(key, value)?
            }
            "chunk_size" => self.chunk_size = parse(key, value)?,
            "chunk_overlap" => self.chunk_overlap = parse(key, value)?,
            _ => {
                return Err(Error::NotFound {
                    kind: "setting",
                    name: key.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Current value of one key, as a string.
    pub fn get(&self, key: &str) -> Result<String> {
        Ok(match key {
            "top_k" => self.top_k.to_string(),
            "min_similarity" => self.min_similarity.to_string(),
            "rejection_threshold" => self.rejection_threshold.to_string(),
            "max_question_chars" => self.max_question_chars.to_string(),
            "answer_sections" => self.answer_sections.to_string(),
            "excerpt_chars" => self.excerpt_chars.to_string(),
            "summary_chars" => self.summary_chars.to_string(),
            "comparison_sentences" => self.comparison_sentences.to_string(),
            "chunk_size" => self.chunk_size.to_string(),
            "chunk_overlap" => self.chunk_overlap.to_string(),
            _ => {
                return Err(Error::NotFound {
                    kind: "setting",
                    name: key.to_string(),
                });
            }
        })
    }

    pub fn validate(&self) -> Result<()> {
        let unit = |name: &str, value: f32| {
            if (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(Error::Config(format!(
                    "{name} must be between 0 and 1, got {value}"
                )))
            }
        };
        let positive = |name: &str, value: usize| {
            if value >= 1 {
                Ok(())
            } else {
                Err(Error::Config(format!("{name} must be at least 1")))
            }
        };

        positive("top_k", self.top_k)?;
        unit("min_similarity", self.min_similarity)?;
        unit("rejection_threshold", self.rejection_threshold)?;
        positive("max_question_chars", self.max_question_chars)?;
        positive("answer_sections", self.answer_sections)?;
        positive("excerpt_chars", self.excerpt_chars)?;
        positive("summary_chars", self.summary_chars)?;
        positive("comparison_sentences", self.comparison_sentences)?;
        positive("chunk_size", self.chunk_size)?;
        if self.chunk_overlap >= self.chunk_size {
            return Err(Error::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }

    pub fn split_options(&self) -> SplitOptions {
        SplitOptions {
            window_chars: self.chunk_size,
            overlap: self.chunk_overlap,
        }
    }
}

/// Environment variable that overrides `key`, e.g. `CDPQA_TOP_K`.
pub fn env_var(key: &str) -> String {
    format!("{ENV_PREFIX}{}", key.to_uppercase())
}
