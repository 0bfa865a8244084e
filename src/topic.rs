//! The closed set of documented platforms and the words that name them.
//!
//! Topic detection never works on free-form strings: every spelling a user
//! might type is listed in [`ALIASES`] and resolved to a [`Topic`] variant.
//! Aliases are read at startup and never stored in the index, so changing
//! the table only needs a restart. `status` reports the table version.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Bumped whenever [`ALIASES`] changes meaning.
pub const ALIAS_TABLE_VERSION: u32 = 2;

/// A documented customer data platform.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Topic {
    Segment,
    #[value(name = "mparticle")]
    MParticle,
    Lytics,
    Zeotap,
}

impl Topic {
    pub const ALL: [Topic; 4] =
        [Topic::Segment, Topic::MParticle, Topic::Lytics, Topic::Zeotap];

    /// Lowercase identifier used in files, URLs and settings.
    pub fn slug(self) -> &'static str {
        match self {
            Topic::Segment => "segment",
            Topic::MParticle => "mparticle",
            Topic::Lytics => "lytics",
            Topic::Zeotap => "zeotap",
        }
    }

    /// Brand spelling used in rendered answers.
    pub fn display_name(self) -> &'static str {
        match self {
            Topic::Segment => "Segment",
            Topic::MParticle => "mParticle",
            Topic::Lytics => "Lytics",
            Topic::Zeotap => "Zeotap",
        }
    }

    /// All aliases registered for this topic.
    pub fn aliases(self) -> impl Iterator<Item = &'static Alias> {
        ALIASES.iter().filter(move |alias| alias.topic == self)
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Topic {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        ALIASES
            .iter()
            .find(|alias| alias.phrase == wanted)
            .map(|alias| alias.topic)
            .ok_or_else(|| crate::error::Error::NotFound {
                kind: "topic",
                name: s.to_string(),
            })
    }
}

/// One recognised spelling of a topic.
#[derive(Debug, Clone, Copy)]
pub struct Alias {
    pub topic: Topic,
    /// Lowercase phrase, words separated by single spaces.
    pub phrase: &'static str,
    /// Also an everyday word; needs context before it counts as a mention.
    pub ambiguous: bool,
}

const fn alias(topic: Topic, phrase: &'static str) -> Alias {
    Alias {
        topic,
        phrase,
        ambiguous: false,
    }
}

const fn ambiguous(topic: Topic, phrase: &'static str) -> Alias {
    Alias {
        topic,
        phrase,
        ambiguous: true,
    }
}

pub static ALIASES: &[Alias] = &[
    ambiguous(Topic::Segment, "segment"),
    alias(Topic::Segment, "segment.com"),
    alias(Topic::Segment, "segment.io"),
    alias(Topic::Segment, "twilio segment"),
    alias(Topic::Segment, "segmnt"),
    alias(Topic::Segment, "segement"),
    alias(Topic::MParticle, "mparticle"),
    alias(Topic::MParticle, "m particle"),
    alias(Topic::MParticle, "mparticles"),
    alias(Topic::MParticle, "mparticel"),
    alias(Topic::MParticle, "mpartical"),
    alias(Topic::Lytics, "lytics"),
    alias(Topic::Lytics, "lytic"),
    alias(Topic::Lytics, "lytix"),
    alias(Topic::Lytics, "lytcs"),
    alias(Topic::Zeotap, "zeotap"),
    alias(Topic::Zeotap, "zeo tap"),
    alias(Topic::Zeotap, "zeotapp"),
    alias(Topic::Zeotap, "zetap"),
];

/// Raw words that, placed right before an ambiguous alias, make it a plain
/// noun ("audience segment", "dynamic segment").
pub static QUALIFIERS_BEFORE: &[&str] = &[
    "audience",
    "audiences",
    "user",
    "users",
    "customer",
    "customers",
    "behavioral",
    "behavioural",
    "dynamic",
    "static",
    "lookalike",
    "predictive",
];

/// Raw words that, placed right after an ambiguous alias, make it a verb
/// ("segment your users", "segment customers by region").
pub static QUALIFIERS_AFTER: &[&str] = &[
    "user",
    "users",
    "customer",
    "customers",
    "visitor",
    "visitors",
    "audience",
    "audiences",
    "your",
    "our",
    "their",
    "my",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_topic_has_its_slug_as_alias() {
        for topic in Topic::ALL {
            assert!(
                topic.aliases().any(|a| a.phrase == topic.slug()),
                "{topic:?} is missing its slug alias"
            );
        }
    }

    #[test]
    fn parses_slugs_and_misspellings() {
        assert_eq!("segment".parse::<Topic>().unwrap(), Topic::Segment);
        assert_eq!("mParticle".parse::<Topic>().unwrap(), Topic::MParticle);
        assert_eq!(" zeotapp ".parse::<Topic>().unwrap(), Topic::Zeotap);
        assert_eq!("lytix".parse::<Topic>().unwrap(), Topic::Lytics);
    }

    #[test]
    fn unknown_topic_is_not_found() {
        let err = "salesforce".parse::<Topic>().unwrap_err();
        assert!(err.to_string().contains("topic not found"));
    }

    #[test]
    fn serializes_as_slug() {
        let json = serde_json::to_string(&Topic::MParticle).unwrap();
        assert_eq!(json, "\"mparticle\"");
        let back: Topic = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Topic::MParticle);
    }

    #[test]
    fn alias_phrases_are_normalized() {
        for a in ALIASES {
            assert_eq!(a.phrase, a.phrase.to_lowercase());
            assert!(!a.phrase.contains("  "));
            assert_eq!(a.phrase, a.phrase.trim());
        }
    }
}
