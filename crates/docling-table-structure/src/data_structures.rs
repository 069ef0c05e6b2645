//! Data types flowing through the decoder and matcher
//!
//! ```text
//! NeuralPrediction ──► SequenceDecoder ──► SequencePrediction
//!                                                │
//!          PageSnapshot + TableCropSnapshot ──► CellMatcher ──► MatchingResult
//! ```
//!
//! Everything here is created per table crop and never mutated after it is
//! returned.

use indexmap::IndexMap;
use ndarray::{Array1, ArrayD, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::geometry::PageBoundingBox;
use crate::otsl::OtslTag;

/// Raw TableFormer output for one table crop
///
/// Produced by the inference backend. `tag_ids` includes the `<start>` and
/// `<end>` markers; `bbox_tensor` holds `(xc, yc, w, h)` quadruples in any
/// shape whose element count is a multiple of 4 (usually `[N, 4]`).
#[derive(Debug, Clone, PartialEq)]
pub struct NeuralPrediction {
    /// Vocabulary ids, one per decoding step
    pub tag_ids: Vec<i64>,
    /// Center-form boxes, one per emitted cell
    pub bbox_tensor: ArrayD<f32>,
    /// Semantic class per emitted cell
    pub class_ids: Vec<i64>,
}

impl NeuralPrediction {
    /// Build a prediction from a flat `[xc, yc, w, h, xc, ...]` box buffer
    #[must_use = "returns a new prediction"]
    pub fn from_flat(tag_ids: Vec<i64>, bboxes: Vec<f32>, class_ids: Vec<i64>) -> Self {
        Self {
            tag_ids,
            bbox_tensor: Array1::from(bboxes).into_dyn(),
            class_ids,
        }
    }

    /// Build a prediction from the class head's `[N, C]` logits
    ///
    /// The class of each cell is the argmax of its row; on ties the lowest
    /// class index wins.
    #[must_use = "returns a new prediction"]
    pub fn from_class_logits(
        tag_ids: Vec<i64>,
        bbox_tensor: ArrayD<f32>,
        class_logits: ArrayView2<'_, f32>,
    ) -> Self {
        let class_ids = class_logits
            .axis_iter(Axis(0))
            .map(|row| {
                let mut best_idx = 0_usize;
                let mut best = f32::NEG_INFINITY;
                for (idx, &value) in row.iter().enumerate() {
                    if value > best {
                        best = value;
                        best_idx = idx;
                    }
                }
                best_idx as i64
            })
            .collect();
        Self {
            tag_ids,
            bbox_tensor,
            class_ids,
        }
    }
}

/// Text fragment extracted independently of the model (PDF text layer or OCR)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceCell {
    /// Identifier, unique within the page
    pub id: String,
    /// Location in page pixels
    pub bbox: PageBoundingBox,
    /// Text content
    pub text: String,
}

impl SourceCell {
    /// Create a source cell
    #[must_use = "returns a new source cell"]
    pub fn new(id: impl Into<String>, bbox: PageBoundingBox, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            bbox,
            text: text.into(),
        }
    }
}

/// Page the table was detected on
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PageSnapshot {
    /// Page width in pixels
    pub width: f64,
    /// Page height in pixels
    pub height: f64,
    /// Text fragments on the page, in extraction order
    pub source_cells: Vec<SourceCell>,
}

/// Table region within the page
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TableCropSnapshot {
    /// Table bounding box in page pixels
    pub bbox: PageBoundingBox,
}

/// One cell of the predicted grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuralCell {
    /// Dense id in emission order, starting at 0
    pub cell_id: usize,
    /// Grid row of the cell's top-left slot
    ///
    /// Counts every `nl` before the cell. A sequence with repeated `nl` tags
    /// therefore has row ids with gaps, while its markup has no empty rows.
    pub row_id: usize,
    /// Grid column of the cell's top-left slot
    pub column_id: usize,
    /// Cell geometry in page pixels
    pub bbox: PageBoundingBox,
    /// Semantic class from the class head (2 when the model emitted none)
    pub cell_class: i64,
    /// Tag that opened the cell
    pub label: OtslTag,
    /// Columns covered, only set for cells spanning more than one slot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colspan: Option<usize>,
    /// Rows covered, only set for cells spanning more than one slot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rowspan: Option<usize>,
}

impl StructuralCell {
    /// Columns covered (1 when the cell does not span)
    #[inline]
    #[must_use]
    pub fn col_span(&self) -> usize {
        self.colspan.unwrap_or(1)
    }

    /// Rows covered (1 when the cell does not span)
    #[inline]
    #[must_use]
    pub fn row_span(&self) -> usize {
        self.rowspan.unwrap_or(1)
    }
}

/// Association between a source cell and a structural cell
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CellMatch {
    /// Matched [`StructuralCell::cell_id`]
    pub structural_cell_id: usize,
    /// Intersection area divided by the source cell's area, in `(0, 1]`
    pub iopdf: f64,
}

/// Output of the cell matcher for one table crop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchingResult {
    /// Configured matching threshold, carried through for downstream consumers
    pub iou_threshold: f64,
    /// Table crop in page pixels
    pub table_bbox: PageBoundingBox,
    /// Every predicted box translated into page pixels, in emission order
    pub page_bboxes: Vec<PageBoundingBox>,
    /// Predicted cells
    pub structural_cells: Vec<StructuralCell>,
    /// Copy of the page's source cells
    pub source_cells: Vec<SourceCell>,
    /// Source cell id to its matches, in source-cell order; unmatched ids are absent
    pub matches: IndexMap<String, Vec<CellMatch>>,
    /// Page width, not interpreted here
    pub page_width: f64,
    /// Page height, not interpreted here
    pub page_height: f64,
    #[serde(skip)]
    pub(crate) pairs_evaluated: usize,
}

impl MatchingResult {
    /// Number of (source cell, structural cell) pairs scored
    ///
    /// Diagnostic only: zero when the page had no source cells and matching
    /// was skipped. Not serialized.
    #[inline]
    #[must_use]
    pub fn pairs_evaluated(&self) -> usize {
        self.pairs_evaluated
    }

    /// Number of grid rows covered by the structural cells
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.structural_cells
            .iter()
            .map(|cell| cell.row_id + cell.row_span())
            .max()
            .unwrap_or(0)
    }

    /// Number of grid columns covered by the structural cells
    #[must_use]
    pub fn num_cols(&self) -> usize {
        self.structural_cells
            .iter()
            .map(|cell| cell.column_id + cell.col_span())
            .max()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn cell(cell_id: usize, row_id: usize, column_id: usize) -> StructuralCell {
        StructuralCell {
            cell_id,
            row_id,
            column_id,
            bbox: PageBoundingBox::zero(),
            cell_class: 2,
            label: OtslTag::Fcel,
            colspan: None,
            rowspan: None,
        }
    }

    #[test]
    fn test_from_class_logits_first_max_wins() {
        let logits = array![[0.1_f32, 0.9, 0.9], [2.0, 1.0, 0.0], [-1.0, -1.0, -0.5]];
        let pred = NeuralPrediction::from_class_logits(
            vec![2, 5, 3],
            ArrayD::zeros(vec![3, 4]),
            logits.view(),
        );
        assert_eq!(pred.class_ids, vec![1, 0, 2]);
    }

    #[test]
    fn test_from_flat_keeps_buffer() {
        let pred = NeuralPrediction::from_flat(vec![2, 3], vec![0.5; 8], vec![]);
        assert_eq!(pred.bbox_tensor.len(), 8);
        assert_eq!(pred.bbox_tensor.ndim(), 1);
    }

    #[test]
    fn test_grid_dimensions() {
        let mut spanning = cell(0, 0, 0);
        spanning.colspan = Some(3);
        let mut tall = cell(1, 1, 0);
        tall.rowspan = Some(2);
        let result = MatchingResult {
            iou_threshold: 0.05,
            table_bbox: PageBoundingBox::zero(),
            page_bboxes: vec![],
            structural_cells: vec![spanning, tall, cell(2, 1, 1)],
            source_cells: vec![],
            matches: IndexMap::new(),
            page_width: 0.0,
            page_height: 0.0,
            pairs_evaluated: 6,
        };
        assert_eq!(result.num_cols(), 3);
        assert_eq!(result.num_rows(), 3);

        let json = serde_json::to_string(&result).unwrap();
        assert!(!json.contains("pairs_evaluated"));
        let restored: MatchingResult = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.pairs_evaluated(), 0);
    }

    #[test]
    fn test_structural_cell_serialization_skips_missing_spans() {
        let json = serde_json::to_string(&cell(0, 0, 0)).unwrap();
        assert!(!json.contains("colspan"));
        assert!(json.contains("\"label\":\"fcel\""));
    }
}
