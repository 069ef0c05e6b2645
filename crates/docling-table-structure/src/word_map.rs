//! Tag vocabulary (`word_map_tag` in `tm_config.json`)
//!
//! Maps model output ids to OTSL tags. The model is trained against a fixed
//! vocabulary, but the ids are read from configuration so that retrained
//! checkpoints with a reordered vocabulary decode correctly.

use std::fmt;

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Result, TableStructureError};
use crate::otsl::OtslTag;

/// Bidirectional word <-> id vocabulary for the tag decoder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WordPairs", into = "IndexMap<String, i64>")]
pub struct WordMap {
    /// Words in configuration order
    words: IndexMap<String, i64>,
    /// Reverse lookup for decoding
    by_id: FxHashMap<i64, String>,
}

impl WordMap {
    /// Build a vocabulary from (word, id) pairs
    ///
    /// Fails if an id is used twice or if any OTSL grammar word is missing.
    /// Words outside the OTSL vocabulary are kept; they decode to
    /// [`OtslTag::Unk`].
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, i64)>,
        S: Into<String>,
    {
        let mut words = IndexMap::new();
        let mut by_id = FxHashMap::default();
        for (word, id) in pairs {
            let word = word.into();
            if words.contains_key(&word) {
                return Err(TableStructureError::config(format!(
                    "word_map_tag lists '{word}' more than once"
                )));
            }
            if let Some(existing) = by_id.insert(id, word.clone()) {
                return Err(TableStructureError::config(format!(
                    "word_map_tag assigns id {id} to both '{existing}' and '{word}'"
                )));
            }
            words.insert(word, id);
        }

        let missing: Vec<&str> = OtslTag::GRAMMAR
            .iter()
            .map(|tag| tag.as_str())
            .filter(|word| !words.contains_key(*word))
            .collect();
        if !missing.is_empty() {
            return Err(TableStructureError::config(format!(
                "word_map_tag is missing OTSL words: {}",
                missing.join(", ")
            )));
        }

        Ok(Self { words, by_id })
    }

    /// The vocabulary TableFormer checkpoints ship with
    #[must_use]
    pub fn otsl_default() -> Self {
        let words: IndexMap<String, i64> = OtslTag::ALL
            .iter()
            .zip(0_i64..)
            .map(|(tag, id)| (tag.as_str().to_string(), id))
            .collect();
        let by_id = words.iter().map(|(w, &id)| (id, w.clone())).collect();
        Self { words, by_id }
    }

    /// Id assigned to `word`
    #[inline]
    #[must_use]
    pub fn id(&self, word: &str) -> Option<i64> {
        self.words.get(word).copied()
    }

    /// Word assigned to `id`
    #[inline]
    #[must_use]
    pub fn word(&self, id: i64) -> Option<&str> {
        self.by_id.get(&id).map(String::as_str)
    }

    /// Tag for `id`
    ///
    /// Fails for ids that are not in the vocabulary. Vocabulary words that are
    /// not OTSL tags decode to [`OtslTag::Unk`].
    pub fn tag(&self, id: i64) -> Result<OtslTag> {
        let word = self.word(id).ok_or_else(|| {
            TableStructureError::data_format(format!("tag id {id} has no vocabulary entry"))
        })?;
        Ok(word.parse().unwrap_or(OtslTag::Unk))
    }

    /// Id of `<unk>`, if the vocabulary defines one
    #[must_use]
    pub fn unknown_id(&self) -> Option<i64> {
        self.id(OtslTag::Unk.as_str())
    }

    /// Id for `word`, falling back to `<unk>`
    #[must_use]
    pub fn word_or_unknown(&self, word: &str) -> Option<i64> {
        self.id(word).or_else(|| self.unknown_id())
    }

    /// Number of words
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Returns true if the vocabulary has no words
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// (word, id) pairs in configuration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.words.iter().map(|(w, &id)| (w.as_str(), id))
    }
}

impl Default for WordMap {
    fn default() -> Self {
        Self::otsl_default()
    }
}

/// `word_map_tag` object as written, duplicate keys included
///
/// Deserializing straight into a map would silently keep the last id of a
/// repeated word; this keeps every entry so [`WordMap::from_pairs`] can reject it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WordPairs(pub Vec<(String, i64)>);

impl<'de> Deserialize<'de> for WordPairs {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct PairsVisitor;

        impl<'de> Visitor<'de> for PairsVisitor {
            type Value = WordPairs;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of tag words to integer ids")
            }

            fn visit_map<A>(self, mut map: A) -> std::result::Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut pairs = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some(entry) = map.next_entry::<String, i64>()? {
                    pairs.push(entry);
                }
                Ok(WordPairs(pairs))
            }
        }

        deserializer.deserialize_map(PairsVisitor)
    }
}

impl TryFrom<WordPairs> for WordMap {
    type Error = TableStructureError;

    fn try_from(pairs: WordPairs) -> Result<Self> {
        Self::from_pairs(pairs.0)
    }
}

impl From<WordMap> for IndexMap<String, i64> {
    fn from(map: WordMap) -> Self {
        map.words
    }
}
