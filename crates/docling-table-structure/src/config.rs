//! Decoder and matcher configuration
//!
//! The values come from the TableFormer `tm_config.json` shipped with each
//! checkpoint. Only two entries matter for structure decoding:
//!
//! ```json
//! {
//!   "dataset_wordmap": { "word_map_tag": { "<pad>": 0, "fcel": 5, "nl": 9 } },
//!   "predict": { "pdf_cell_iou_thres": 0.05 }
//! }
//! ```
//!
//! Everything else in the file (model hyper-parameters, beam size, image
//! normalisation) belongs to the inference backend and is ignored here.

use std::path::Path;

use serde::Deserialize;

use crate::error::{Result, TableStructureError};
use crate::word_map::{WordMap, WordPairs};

/// Threshold used when a checkpoint does not override it
pub const DEFAULT_IOU_THRESHOLD: f64 = 0.05;

/// Immutable configuration shared by the decoder and the cell matcher
#[derive(Debug, Clone, PartialEq)]
pub struct TableStructureConfig {
    /// Tag vocabulary
    pub word_map: WordMap,
    /// `pdf_cell_iou_thres`, carried through to [`MatchingResult`](crate::MatchingResult)
    pub iou_threshold: f64,
}

impl Default for TableStructureConfig {
    fn default() -> Self {
        Self {
            word_map: WordMap::otsl_default(),
            iou_threshold: DEFAULT_IOU_THRESHOLD,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    dataset_wordmap: RawWordMapSection,
    #[serde(default)]
    predict: RawPredictSection,
}

#[derive(Debug, Deserialize)]
struct RawWordMapSection {
    word_map_tag: WordPairs,
}

#[derive(Debug, Default, Deserialize)]
struct RawPredictSection {
    pdf_cell_iou_thres: Option<f64>,
}

impl TableStructureConfig {
    /// Start a builder with no values set
    #[inline]
    #[must_use = "returns a new builder"]
    pub fn builder() -> TableStructureConfigBuilder {
        TableStructureConfigBuilder::new()
    }

    /// Parse the contents of a `tm_config.json`
    ///
    /// # Errors
    ///
    /// [`TableStructureError::JsonError`] if the document is malformed,
    /// [`TableStructureError::ConfigError`] if the word map repeats a word or
    /// an id, lacks an OTSL word, or if `predict.pdf_cell_iou_thres` is
    /// missing or out of range.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw: RawConfig = serde_json::from_str(json)?;
        let word_map = WordMap::from_pairs(raw.dataset_wordmap.word_map_tag.0)?;
        let mut builder = Self::builder().word_map(word_map);
        if let Some(threshold) = raw.predict.pdf_cell_iou_thres {
            builder = builder.iou_threshold(threshold);
        }
        builder.build()
    }

    /// Read and parse a `tm_config.json` file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        log::debug!("Loading table structure config from {}", path.display());
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}

/// Builder for [`TableStructureConfig`]
///
/// # Examples
///
/// ```
/// use docling_table_structure::TableStructureConfigBuilder;
///
/// # fn main() -> docling_table_structure::Result<()> {
/// let config = TableStructureConfigBuilder::new().iou_threshold(0.1).build()?;
/// assert_eq!(config.iou_threshold, 0.1);
///
/// // The threshold is required
/// assert!(TableStructureConfigBuilder::new().build().is_err());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableStructureConfigBuilder {
    word_map: Option<WordMap>,
    iou_threshold: Option<f64>,
}

impl TableStructureConfigBuilder {
    /// Create an empty builder
    #[inline]
    #[must_use = "returns a new builder"]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the tag vocabulary (defaults to [`WordMap::otsl_default`])
    #[inline]
    #[must_use = "returns the builder with the word map configured"]
    pub fn word_map(mut self, word_map: WordMap) -> Self {
        self.word_map = Some(word_map);
        self
    }

    /// Set the matching threshold
    #[inline]
    #[must_use = "returns the builder with the threshold configured"]
    pub fn iou_threshold(mut self, threshold: f64) -> Self {
        self.iou_threshold = Some(threshold);
        self
    }

    /// Validate and build the configuration
    ///
    /// # Errors
    ///
    /// [`TableStructureError::ConfigError`] if the threshold was never set, is
    /// not finite, or lies outside `[0, 1]`.
    pub fn build(self) -> Result<TableStructureConfig> {
        let iou_threshold = self.iou_threshold.ok_or_else(|| {
            TableStructureError::config("matching threshold (pdf_cell_iou_thres) is not set")
        })?;
        if !iou_threshold.is_finite() || !(0.0..=1.0).contains(&iou_threshold) {
            return Err(TableStructureError::config(format!(
                "matching threshold must be within [0, 1], got {iou_threshold}"
            )));
        }

        Ok(TableStructureConfig {
            word_map: self.word_map.unwrap_or_default(),
            iou_threshold,
        })
    }
}
