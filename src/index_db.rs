use std::path::Path;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};

use crate::{
    corpus::Chunk,
    error::{Error, Result},
    index::{Index, IndexedChunk, SparseVector},
};

/// Bumped whenever the on-disk layout changes.
pub const FORMAT_VERSION: u64 = 2;

const META: TableDefinition<&str, u64> = TableDefinition::new("meta");
const CHUNKS: TableDefinition<u64, &[u8]> = TableDefinition::new("chunks");
const TERMS: TableDefinition<u64, &str> = TableDefinition::new("terms");
const WEIGHTS: TableDefinition<&str, &[u8]> = TableDefinition::new("weights");
const VECTORS: TableDefinition<u64, &[u8]> = TableDefinition::new("vectors");

const IDF_KEY: &str = "idf";

/// Header size of a vector entry: 4 bytes entry count.
const HEADER_SIZE: usize = 4;

/// Persists a built [`Index`] so the CLI does not rebuild on every run.
///
/// Layout:
/// - `meta`: format version and row counts
/// - `chunks`: chunk store position -> JSON chunk record (excluded chunks too)
/// - `terms`: vocabulary position -> term
/// - `weights["idf"]`: IDF table as raw f32 values
/// - `vectors`: chunk store position -> sparse vector
///
/// Binary format per vector entry:
/// - 4 bytes: entry count N (u32)
/// - N * 4 bytes: vocabulary positions (u32)
/// - N * 4 bytes: weights (f32)
///
/// Every number is little-endian whatever the host byte order.
pub struct IndexDb {
    db: Database,
}

impl IndexDb {
    /// Open or create an index database at the given path.
    ///
    /// # Examples
    ///
    /// ```
    /// # let tmp = tempfile::tempdir().unwrap();
    /// use cdpqa::IndexDb;
    ///
    /// let db = IndexDb::open(&tmp.path().join("index.redb")).unwrap();
    /// assert!(db.load().unwrap().is_none());
    /// ```
    pub fn open(path: &Path) -> Result<Self> {
        let db = Database::create(path)?;

        let txn = db.begin_write()?;
        txn.open_table(META)?;
        txn.open_table(CHUNKS)?;
        txn.open_table(TERMS)?;
        txn.open_table(WEIGHTS)?;
        txn.open_table(VECTORS)?;
        txn.commit()?;

        Ok(Self { db })
    }

    /// Replace everything stored with `index`, in one write transaction.
    pub fn save(&self, index: &Index) -> Result<()> {
        let txn = self.db.begin_write()?;
        txn.delete_table(CHUNKS)?;
        txn.delete_table(TERMS)?;
        txn.delete_table(VECTORS)?;
        {
            let mut chunks = txn.open_table(CHUNKS)?;
            for (pos, chunk) in index.chunks().iter().enumerate() {
                let record = serde_json::to_vec(chunk)?;
                chunks.insert(pos as u64, record.as_slice())?;
            }

            let mut terms = txn.open_table(TERMS)?;
            for (pos, term) in index.vocabulary().terms().iter().enumerate() {
                terms.insert(pos as u64, term.as_str())?;
            }

            let mut weights = txn.open_table(WEIGHTS)?;
            let idf = le_words(index.idf().iter().map(|w| w.to_bits()));
            weights.insert(IDF_KEY, bytemuck::cast_slice::<u32, u8>(&idf))?;

            let mut vectors = txn.open_table(VECTORS)?;
            for entry in index.entries() {
                let words = encode_vector(&entry.vector);
                let bytes: &[u8] = bytemuck::cast_slice(&words);
                let mut guard =
                    vectors.insert_reserve(entry.chunk as u64, bytes.len())?;
                guard.as_mut().copy_from_slice(bytes);
            }

            let mut meta = txn.open_table(META)?;
            meta.insert("format_version", FORMAT_VERSION)?;
            meta.insert("chunks", index.chunks().len() as u64)?;
            meta.insert("terms", index.vocabulary().len() as u64)?;
            meta.insert("vectors", index.entries().len() as u64)?;
        }
        txn.commit()?;

        tracing::debug!(
            chunks = index.chunks().len(),
            vectors = index.entries().len(),
            "saved index"
        );
        Ok(())
    }

    /// Load the stored index, or `None` if nothing has been saved yet.
    pub fn load(&self) -> Result<Option<Index>> {
        let txn = self.db.begin_read()?;
        let meta = txn.open_table(META)?;

        let Some(version) = meta.get("format_version")?.map(|v| v.value())
        else {
            return Ok(None);
        };
        if version != FORMAT_VERSION {
            return Err(Error::CorruptIndex(format!(
                "format version {version}, expected {FORMAT_VERSION}; run \
                 `cdpqa rebuild`"
            )));
        }
        let count = |key: &str| -> Result<usize> {
            meta.get(key)?.map(|v| v.value() as usize).ok_or_else(|| {
                Error::CorruptIndex(format!("missing {key} count"))
            })
        };
        let (chunk_count, term_count, vector_count) =
            (count("chunks")?, count("terms")?, count("vectors")?);

        let mut chunks = Vec::with_capacity(chunk_count);
        let chunk_table = txn.open_table(CHUNKS)?;
        for (expected, entry) in chunk_table.iter()?.enumerate() {
            let (key, value) = entry?;
            check_key(key.value(), expected, "chunk")?;
            chunks.push(serde_json::from_slice::<Chunk>(value.value())?);
        }

        let mut terms = Vec::with_capacity(term_count);
        let term_table = txn.open_table(TERMS)?;
        for (expected, entry) in term_table.iter()?.enumerate() {
            let (key, value) = entry?;
            check_key(key.value(), expected, "term")?;
            terms.push(value.value().to_string());
        }

        let weight_table = txn.open_table(WEIGHTS)?;
        let idf: Vec<f32> = match weight_table.get(IDF_KEY)? {
            Some(bytes) => decode_f32s(bytes.value())?,
            None => {
                return Err(Error::CorruptIndex("missing idf table".into()));
            }
        };

        let mut entries = Vec::with_capacity(vector_count);
        let vector_table = txn.open_table(VECTORS)?;
        for entry in vector_table.iter()? {
            let (key, value) = entry?;
            entries.push(IndexedChunk {
                chunk: key.value() as usize,
                vector: decode_vector(value.value())?,
            });
        }

        if chunks.len() != chunk_count
            || terms.len() != term_count
            || entries.len() != vector_count
        {
            return Err(Error::CorruptIndex(format!(
                "expected {chunk_count} chunks, {term_count} terms and \
                 {vector_count} vectors; found {}, {} and {}",
                chunks.len(),
                terms.len(),
                entries.len()
            )));
        }

        Index::from_parts(chunks, terms, idf, entries).map(Some)
    }

    /// Whether an index has been saved.
    pub fn has_index(&self) -> Result<bool> {
        let txn = self.db.begin_read()?;
        let meta = txn.open_table(META)?;
        Ok(meta.get("format_version")?.is_some())
    }
}

impl std::fmt::Debug for IndexDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexDb").finish_non_exhaustive()
    }
}

fn check_key(key: u64, expected: usize, what: &str) -> Result<()> {
    if key as usize != expected {
        return Err(Error::CorruptIndex(format!(
            "{what} positions are not contiguous at {expected}"
        )));
    }
    Ok(())
}

fn le_words(values: impl Iterator<Item = u32>) -> Vec<u32> {
    values.map(u32::to_le).collect()
}

/// Count, positions, then weight bits, each as a little-endian word.
fn encode_vector(vector: &SparseVector) -> Vec<u32> {
    let header = std::iter::once(vector.positions().len() as u32);
    let positions = vector.positions().iter().copied();
    let weights = vector.weights().iter().map(|w| w.to_bits());
    le_words(header.chain(positions).chain(weights))
}

/// Little-endian words back to host order. `bytes.len()` must be a
/// multiple of 4.
fn decode_words(bytes: &[u8]) -> Vec<u32> {
    // stored bytes carry no alignment guarantee, so copy instead of cast
    bytemuck::pod_collect_to_vec::<u8, u32>(bytes)
        .into_iter()
        .map(u32::from_le)
        .collect()
}

fn decode_f32s(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(Error::CorruptIndex("truncated weight table".into()));
    }
    Ok(decode_words(bytes).into_iter().map(f32::from_bits).collect())
}

fn decode_vector(bytes: &[u8]) -> Result<SparseVector> {
    if bytes.len() < HEADER_SIZE {
        return Err(Error::CorruptIndex("truncated vector header".into()));
    }
    let len = u32::from_le(bytemuck::pod_read_unaligned::<u32>(
        &bytes[..HEADER_SIZE],
    )) as usize;
    let split = HEADER_SIZE + len * 4;
    if bytes.len() != split + len * 4 {
        return Err(Error::CorruptIndex(format!(
            "vector of {len} entries has {} bytes",
            bytes.len()
        )));
    }
    let positions = decode_words(&bytes[HEADER_SIZE..split]);
    let weights = decode_words(&bytes[split..])
        .into_iter()
        .map(f32::from_bits)
        .collect();
    SparseVector::from_parts(positions, weights)
}
