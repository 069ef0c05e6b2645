//! # Docling Table Structure - TableFormer output decoding
//!
//! Turns the raw output of the TableFormer model (a tag-id sequence, one box per
//! cell and a class per cell) into a table grid with spans, places the cells on
//! the page, and assigns the page's text cells to them.
//!
//! ## Pipeline
//!
//! ```text
//! NeuralPrediction ─► SequenceDecoder ─► SequencePrediction ─► CellMatcher ─► MatchingResult
//!   (tag ids,           (otsl grammar,      (tags, markup,       (page space,    (cells, matches)
//!    boxes, classes)     box repair)          boxes)              iopdf)              │
//!                                                                                     ▼
//!                                                                       export::table_cells
//! ```
//!
//! - [`otsl`]: the OTSL grammar compiler (markup rendering and span map)
//! - [`decoder`]: vocabulary lookup, box conversion and box/cell desync repair
//! - [`matcher`]: crop-to-page translation and intersection-over-source matching
//! - [`export`]: conversion to docling table cells and HTML
//! - [`predictor`]: all of the above for one crop, or a batch of crops
//!
//! The crate performs no inference and no I/O beyond reading `tm_config.json`.
//! Every call is deterministic: identical inputs produce identical outputs,
//! including the order of matches.
//!
//! ## Quick Start
//!
//! ```
//! use docling_table_structure::{
//!     NeuralPrediction, PageBoundingBox, PageSnapshot, SourceCell, TableCropSnapshot,
//!     TableStructurePredictor,
//! };
//!
//! # fn main() -> docling_table_structure::Result<()> {
//! let predictor = TableStructurePredictor::default();
//!
//! // <start> fcel lcel nl fcel fcel nl <end>
//! let raw = NeuralPrediction::from_flat(
//!     vec![2, 5, 6, 9, 5, 5, 9, 3],
//!     vec![0.5, 0.25, 1.0, 0.5, 0.25, 0.75, 0.5, 0.5, 0.75, 0.75, 0.5, 0.5],
//!     vec![2, 2, 2],
//! );
//! let crop = TableCropSnapshot { bbox: PageBoundingBox::new(0.0, 0.0, 200.0, 100.0) };
//! let page = PageSnapshot {
//!     width: 612.0,
//!     height: 792.0,
//!     source_cells: vec![SourceCell::new(
//!         "0",
//!         PageBoundingBox::new(10.0, 10.0, 190.0, 40.0),
//!         "Total",
//!     )],
//! };
//!
//! let table = predictor.predict(&raw, &page, &crop)?;
//! assert_eq!((table.num_rows, table.num_cols), (2, 2));
//! assert_eq!(table.cells[0].col_span, 2);
//! assert_eq!(table.cells[0].text, "Total");
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration
//!
//! [`TableStructureConfig::default`] matches the vocabulary all published
//! TableFormer checkpoints use. For a checkpoint directory, load its
//! `tm_config.json` with [`TableStructureConfig::from_json_file`].
//!
//! ## Logging
//!
//! The crate logs through the [`log`] facade: `debug!` per table, `warn!` when
//! model output had to be repaired (box/cell desync, missing boxes).

pub mod config;
pub mod data_structures;
pub mod decoder;
pub mod error;
pub mod export;
pub mod geometry;
pub mod matcher;
pub mod otsl;
pub mod predictor;
pub mod word_map;

pub use config::{TableStructureConfig, TableStructureConfigBuilder, DEFAULT_IOU_THRESHOLD};
pub use data_structures::{
    CellMatch, MatchingResult, NeuralPrediction, PageSnapshot, SourceCell, StructuralCell,
    TableCropSnapshot,
};
pub use decoder::{SequenceDecoder, SequencePrediction};
pub use error::{Result, TableStructureError};
pub use export::TableCellRecord;
pub use geometry::{NormalizedBoundingBox, PageBoundingBox};
pub use matcher::{CellMatcher, DEFAULT_CELL_CLASS};
pub use otsl::{CellSpan, OtslTag, SpanMap};
pub use predictor::{TablePrediction, TableStructurePredictor};
pub use word_map::{WordMap, WordPairs};
