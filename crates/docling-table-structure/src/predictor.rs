//! Per-table entry point chaining decoder, matcher and export
//!
//! ```no_run
//! use docling_table_structure::{
//!     NeuralPrediction, PageSnapshot, TableCropSnapshot, TableStructureConfig,
//!     TableStructurePredictor,
//! };
//!
//! # fn main() -> docling_table_structure::Result<()> {
//! let config = TableStructureConfig::from_json_file("models/tableformer/tm_config.json")?;
//! let predictor = TableStructurePredictor::new(config);
//!
//! # let (tag_ids, boxes, classes) = (vec![], vec![], vec![]);
//! let raw = NeuralPrediction::from_flat(tag_ids, boxes, classes);
//! let table = predictor.predict(&raw, &PageSnapshot::default(), &TableCropSnapshot::default())?;
//! println!("{} x {} table", table.num_rows, table.num_cols);
//! # Ok(())
//! # }
//! ```

use rayon::prelude::*;

use crate::config::TableStructureConfig;
use crate::data_structures::{MatchingResult, NeuralPrediction, PageSnapshot, TableCropSnapshot};
use crate::decoder::{SequenceDecoder, SequencePrediction};
use crate::error::Result;
use crate::export::{self, TableCellRecord};
use crate::matcher::CellMatcher;

/// Everything produced for one table crop
#[derive(Debug, Clone, PartialEq)]
pub struct TablePrediction {
    /// Decoded tags, markup and boxes
    pub sequence: SequencePrediction,
    /// Page-space cells and source-cell matches
    pub matching: MatchingResult,
    /// Docling table cells with text filled in
    pub cells: Vec<TableCellRecord>,
    /// Grid rows
    pub num_rows: usize,
    /// Grid columns
    pub num_cols: usize,
}

impl TablePrediction {
    /// Render the table as HTML with cell text
    #[must_use]
    pub fn to_html(&self) -> String {
        export::to_html(&self.matching, &self.cells)
    }
}

/// Decodes TableFormer output into table structure
///
/// Holds only immutable configuration, so one instance can be shared across
/// threads.
#[derive(Debug, Clone)]
pub struct TableStructurePredictor {
    decoder: SequenceDecoder,
    matcher: CellMatcher,
}

impl TableStructurePredictor {
    /// Create a predictor from a validated configuration
    #[must_use]
    pub fn new(config: TableStructureConfig) -> Self {
        Self {
            matcher: CellMatcher::new(config.iou_threshold),
            decoder: SequenceDecoder::new(config.word_map),
        }
    }

    /// Sequence decoder used by this predictor
    #[must_use]
    pub fn decoder(&self) -> &SequenceDecoder {
        &self.decoder
    }

    /// Cell matcher used by this predictor
    #[must_use]
    pub fn matcher(&self) -> &CellMatcher {
        &self.matcher
    }

    /// Decode one table crop and match it against the page's source cells
    ///
    /// # Errors
    ///
    /// [`TableStructureError::DataFormatError`](crate::TableStructureError::DataFormatError)
    /// if the prediction holds an unknown tag id or a malformed box tensor.
    pub fn predict(
        &self,
        prediction: &NeuralPrediction,
        page: &PageSnapshot,
        crop: &TableCropSnapshot,
    ) -> Result<TablePrediction> {
        let sequence = self.decoder.decode(prediction)?;
        let matching = self
            .matcher
            .match_cells(&sequence, &prediction.class_ids, page, crop);
        let cells = export::table_cells(&matching);
        let num_rows = matching.num_rows();
        let num_cols = matching.num_cols();

        log::debug!(
            "Table at ({:.1}, {:.1}): {} x {} grid, {} cells",
            crop.bbox.l,
            crop.bbox.t,
            num_rows,
            num_cols,
            cells.len()
        );

        Ok(TablePrediction {
            sequence,
            matching,
            cells,
            num_rows,
            num_cols,
        })
    }

    /// Predict several table crops of the same page in parallel
    ///
    /// Results are returned in input order. A failing crop does not affect
    /// the others.
    #[must_use]
    pub fn predict_batch(
        &self,
        tables: &[(NeuralPrediction, TableCropSnapshot)],
        page: &PageSnapshot,
    ) -> Vec<Result<TablePrediction>> {
        tables
            .par_iter()
            .map(|(prediction, crop)| self.predict(prediction, page, crop))
            .collect()
    }
}

impl Default for TableStructurePredictor {
    fn default() -> Self {
        Self::new(TableStructureConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_structures::SourceCell;
    use crate::geometry::PageBoundingBox;

    fn two_by_two() -> NeuralPrediction {
        // <start> fcel fcel nl fcel fcel nl <end>, one quadrant box per cell
        NeuralPrediction::from_flat(
            vec![2, 5, 5, 9, 5, 5, 9, 3],
            vec![
                0.25, 0.25, 0.5, 0.5, 0.75, 0.25, 0.5, 0.5, 0.25, 0.75, 0.5, 0.5, 0.75, 0.75, 0.5,
                0.5,
            ],
            vec![1, 1, 2, 2],
        )
    }

    #[test]
    fn test_predict_end_to_end() {
        let predictor = TableStructurePredictor::default();
        let crop = TableCropSnapshot {
            bbox: PageBoundingBox::new(0.0, 0.0, 100.0, 100.0),
        };
        let page = PageSnapshot {
            width: 612.0,
            height: 792.0,
            source_cells: vec![
                SourceCell::new("0", PageBoundingBox::new(10.0, 10.0, 40.0, 40.0), "top left"),
                SourceCell::new("1", PageBoundingBox::new(60.0, 60.0, 90.0, 90.0), "bottom right"),
            ],
        };

        let table = predictor.predict(&two_by_two(), &page, &crop).unwrap();
        assert_eq!((table.num_rows, table.num_cols), (2, 2));
        assert_eq!(table.cells[0].text, "top left");
        assert_eq!(table.cells[3].text, "bottom right");
        assert!(table.sequence.bboxes_synced);
        assert_eq!(
            table.to_html(),
            "<table><tr><td>top left</td><td></td></tr><tr><td></td><td>bottom right</td></tr></table>"
        );
    }

    #[test]
    fn test_predictor_uses_config() {
        let config = TableStructureConfig::builder()
            .iou_threshold(0.3)
            .build()
            .unwrap();
        let predictor = TableStructurePredictor::new(config);
        assert_eq!(predictor.matcher().iou_threshold(), 0.3);
        assert_eq!(predictor.decoder().word_map().id("nl"), Some(9));
    }

    #[test]
    fn test_predict_batch_keeps_order_and_isolates_errors() {
        let predictor = TableStructurePredictor::default();
        let crop = TableCropSnapshot::default();
        let bad = NeuralPrediction::from_flat(vec![2, 77, 3], vec![], vec![]);
        let tables = vec![(two_by_two(), crop), (bad, crop), (two_by_two(), crop)];

        let results = predictor.predict_batch(&tables, &PageSnapshot::default());
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(results[1].as_ref().unwrap_err().is_data_format_error());
        assert!(results[2].is_ok());
    }
}
