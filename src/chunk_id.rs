use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
};

use crate::topic::Topic;

/// Number of hex digits in a rendered chunk id.
const ID_HEX_LEN: usize = 12;

/// A stable chunk identifier derived from (topic, source, window index).
///
/// The same page window always gets the same id, which keeps citations and
/// test fixtures stable across rebuilds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkId(u64);

impl ChunkId {
    pub fn new(topic: Topic, source: &str, window: usize) -> Self {
        let mut hasher = DefaultHasher::new();
        topic.slug().hash(&mut hasher);
        source.hash(&mut hasher);
        window.hash(&mut hasher);
        Self(hasher.finish())
    }
}

impl std::fmt::Display for ChunkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let full = format!("{:016x}", self.0);
        f.write_str(&full[..ID_HEX_LEN])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        let a = ChunkId::new(Topic::Segment, "https://x/docs/a", 0);
        let b = ChunkId::new(Topic::Segment, "https://x/docs/a", 0);
        assert_eq!(a, b);
    }

    #[test]
    fn every_component_matters() {
        let base = ChunkId::new(Topic::Segment, "https://x/docs/a", 0);
        assert_ne!(base, ChunkId::new(Topic::Lytics, "https://x/docs/a", 0));
        assert_ne!(base, ChunkId::new(Topic::Segment, "https://x/docs/b", 0));
        assert_ne!(base, ChunkId::new(Topic::Segment, "https://x/docs/a", 1));
    }

    #[test]
    fn renders_fixed_width_hex() {
        let id = ChunkId::new(Topic::Zeotap, "page", 3).to_string();
        assert_eq!(id.len(), ID_HEX_LEN);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
