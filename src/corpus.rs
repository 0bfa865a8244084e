//! The chunk store: normalized documentation chunks handed to the indexer.
//!
//! The acquisition job writes one JSON array of page records per platform.
//! Loading turns those pages into [`Chunk`]s: the body is whitespace
//! normalized, long pages are split into windows, and every window gets a
//! stable id.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
    analysis::normalize_whitespace,
    chunk_id::ChunkId,
    chunking::split_windows,
    error::Result,
    topic::Topic,
    walker::{self, DocsFile},
};

/// One retrievable unit of documentation text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub topic: Topic,
    /// URL or document path the text came from.
    pub source: String,
    pub title: String,
    /// Plain, whitespace-normalized text. Never empty.
    pub body: String,
    /// Heading path inside the page, when the acquisition job recorded one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
}

impl Chunk {
    /// Build a chunk, normalizing the body. Returns `None` when nothing but
    /// whitespace is left.
    pub fn new(
        topic: Topic,
        source: impl Into<String>,
        title: impl Into<String>,
        body: &str,
    ) -> Option<Self> {
        let source = source.into();
        let body = normalize_whitespace(body);
        if body.is_empty() {
            return None;
        }
        Some(Self {
            id: ChunkId::new(topic, &source, 0).to_string(),
            topic,
            source,
            title: title.into(),
            body,
            section: None,
        })
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        self.section = Some(section.into());
        self
    }
}

/// A page record as written by the acquisition job.
#[derive(Debug, Clone, Deserialize)]
pub struct PageRecord {
    #[serde(default)]
    pub title: Option<String>,
    pub content: String,
    pub url: String,
    #[serde(alias = "cdp")]
    pub topic: String,
    #[serde(default)]
    pub section: Option<String>,
}

/// Window settings used when splitting pages.
#[derive(Debug, Clone, Copy)]
pub struct SplitOptions {
    pub window_chars: usize,
    pub overlap: usize,
}

/// Chunks produced from a set of pages, plus what had to be skipped.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub chunks: Vec<Chunk>,
    pub pages: usize,
    pub skipped_pages: usize,
}

/// Turn page records into chunks, in page order.
pub fn chunk_pages(pages: &[PageRecord], split: SplitOptions) -> LoadReport {
    let mut report = LoadReport::default();

    for page in pages {
        report.pages += 1;

        let topic = match page.topic.parse::<Topic>() {
            Ok(topic) => topic,
            Err(_) => {
                tracing::warn!(
                    url = %page.url,
                    topic = %page.topic,
                    "skipping page with unknown topic"
                );
                report.skipped_pages += 1;
                continue;
            }
        };

        let body = normalize_whitespace(&page.content);
        if body.is_empty() {
            tracing::warn!(url = %page.url, "skipping page with empty body");
            report.skipped_pages += 1;
            continue;
        }

        let title = page
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or("Untitled")
            .to_string();

        for window in split_windows(&body, split.window_chars, split.overlap) {
            let Some(chunk) =
                Chunk::new(topic, page.url.clone(), title.clone(), &window.text)
            else {
                continue;
            };
            let mut chunk = chunk
                .with_id(ChunkId::new(topic, &page.url, window.index).to_string());
            if let Some(section) = &page.section {
                chunk = chunk.with_section(section.as_str());
            }
            report.chunks.push(chunk);
        }
    }

    report
}

/// Read one docs file (a JSON array of page records).
pub fn read_docs_file(path: &Path) -> Result<Vec<PageRecord>> {
    let contents = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

/// Load every docs file under `docs_dir` matching `pattern` into chunks.
pub fn load_docs_dir(
    docs_dir: &Path,
    pattern: &str,
    split: SplitOptions,
) -> Result<LoadReport> {
    let matcher = walker::compile_pattern(pattern)?;
    let files = walker::discover_docs_files(docs_dir, &matcher)?;

    let mut pages = Vec::new();
    for DocsFile {
        relative_path,
        absolute_path,
    } in &files
    {
        let records = read_docs_file(absolute_path)?;
        tracing::debug!(
            file = %relative_path.display(),
            pages = records.len(),
            "read docs file"
        );
        pages.extend(records);
    }

    let report = chunk_pages(&pages, split);
    tracing::info!(
        files = files.len(),
        pages = report.pages,
        skipped = report.skipped_pages,
        chunks = report.chunks.len(),
        "loaded chunk store"
    );
    Ok(report)
}
