//! cdpqa - answers how-to questions about customer data platforms.
//!
//! cdpqa indexes the documentation of Segment, mParticle, Lytics and Zeotap
//! into a TF-IDF vector space and answers questions by retrieving the best
//! matching passages. A question naming one platform gets a step-by-step
//! answer; naming several gets a side-by-side comparison; anything else is
//! politely rejected. Every answer cites the pages it was built from.
//!
//! # Quick start
//!
//! ```
//! use cdpqa::{AnswerEngine, EngineConfig, Index, Topic};
//! use cdpqa::compose::Status;
//! use cdpqa::corpus::Chunk;
//!
//! let chunk = Chunk::new(
//!     Topic::Segment,
//!     "https://segment.com/docs/connections/sources/",
//!     "Adding a Source",
//!     "Open the Sources page and click Add Source.",
//! )
//! .unwrap();
//!
//! let index = Index::build(vec![chunk]).unwrap();
//! let engine = AnswerEngine::with_index(EngineConfig::default(), index);
//!
//! let answer = engine.answer("How do I set up a new source in Segment?");
//! assert_eq!(answer.status, Status::Answered);
//! assert_eq!(answer.citations[0].title, "Adding a Source");
//! ```

pub mod analysis;
pub mod chunk_id;
pub mod chunking;
pub mod classify;
pub mod cli;
pub mod compose;
pub mod config_db;
pub mod corpus;
pub mod data_dir;
pub mod engine;
pub mod error;
pub mod index;
pub mod index_db;
pub mod mcp;
pub mod retrieve;
pub mod settings;
pub mod text_util;
pub mod topic;
pub mod walker;
pub mod web;

pub use config_db::ConfigDb;
pub use data_dir::DataDir;
pub use engine::AnswerEngine;
pub use error::{Error, Result};
pub use index::Index;
pub use index_db::IndexDb;
pub use settings::EngineConfig;
pub use topic::Topic;
