//! Geometric cell matcher
//!
//! Places the decoded cells on the page and assigns source text cells (PDF
//! text layer or OCR) to them by intersection-over-source area:
//!
//! ```text
//! iopdf = area(structural ∩ source) / area(source)
//! ```
//!
//! A source cell may overlap several structural cells (text spilling over a
//! column rule); every positive overlap is kept and [`crate::export`] picks the
//! best one.

use indexmap::IndexMap;

use crate::data_structures::{
    CellMatch, MatchingResult, PageSnapshot, SourceCell, StructuralCell, TableCropSnapshot,
};
use crate::decoder::SequencePrediction;
use crate::geometry::{NormalizedBoundingBox, PageBoundingBox};
use crate::otsl::{self, OtslTag};

/// Class assigned to cells the class head produced no prediction for
pub const DEFAULT_CELL_CLASS: i64 = 2;

/// Two scores closer than this are the same score
const SCORE_TOLERANCE: f64 = 1e-9;

/// Matches source text cells against the decoded table grid
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellMatcher {
    iou_threshold: f64,
}

impl CellMatcher {
    /// Create a matcher; the threshold is carried into every [`MatchingResult`]
    #[inline]
    #[must_use]
    pub const fn new(iou_threshold: f64) -> Self {
        Self { iou_threshold }
    }

    /// Configured threshold
    #[inline]
    #[must_use]
    pub const fn iou_threshold(&self) -> f64 {
        self.iou_threshold
    }

    /// Translate model-space boxes into page pixels relative to `table_bbox`
    #[must_use]
    pub fn translate_bboxes(
        &self,
        table_bbox: &PageBoundingBox,
        bboxes: &[NormalizedBoundingBox],
    ) -> Vec<PageBoundingBox> {
        bboxes
            .iter()
            .map(|nb| PageBoundingBox::from_normalized(table_bbox, nb))
            .collect()
    }

    /// Build one [`StructuralCell`] per cell-opening tag of `rs_sequence`
    ///
    /// Boxes and classes are consumed in emission order. Cells beyond the
    /// available boxes get a zero box, cells beyond the available classes get
    /// [`DEFAULT_CELL_CLASS`]. Every `nl` advances the row, so repeated `nl`
    /// tags leave empty grid rows that the markup does not have.
    #[must_use]
    pub fn build_structural_cells(
        &self,
        rs_sequence: &[OtslTag],
        page_bboxes: &[PageBoundingBox],
        class_ids: &[i64],
    ) -> Vec<StructuralCell> {
        let spans = otsl::compute_spans(rs_sequence);
        let mut cells = Vec::new();
        let mut row_id = 0;
        let mut column_id = 0;

        for &tag in rs_sequence {
            if tag == OtslTag::Nl {
                row_id += 1;
                column_id = 0;
                continue;
            }

            if tag.opens_cell() {
                let cell_id = cells.len();
                let span = spans.get(&cell_id);
                cells.push(StructuralCell {
                    cell_id,
                    row_id,
                    column_id,
                    bbox: page_bboxes
                        .get(cell_id)
                        .copied()
                        .unwrap_or_else(PageBoundingBox::zero),
                    cell_class: class_ids.get(cell_id).copied().unwrap_or(DEFAULT_CELL_CLASS),
                    label: tag,
                    colspan: span.map(|s| s.colspan),
                    rowspan: span.map(|s| s.rowspan),
                });
            }
            column_id += 1;
        }

        if cells.len() > page_bboxes.len() {
            log::warn!(
                "{} cells but only {} boxes, remaining cells get a zero box",
                cells.len(),
                page_bboxes.len()
            );
        }
        if cells.len() > class_ids.len() {
            log::debug!(
                "{} cells but only {} class predictions, defaulting to class {}",
                cells.len(),
                class_ids.len(),
                DEFAULT_CELL_CLASS
            );
        }
        cells
    }

    /// Score every (source cell, structural cell) pair
    ///
    /// Returns the matches keyed by source cell id, in source order, and the
    /// number of pairs evaluated.
    #[must_use]
    pub fn match_source_cells(
        &self,
        source_cells: &[SourceCell],
        structural_cells: &[StructuralCell],
    ) -> (IndexMap<String, Vec<CellMatch>>, usize) {
        let mut matches: IndexMap<String, Vec<CellMatch>> = IndexMap::new();
        let mut pairs_evaluated = 0;

        for source in source_cells {
            for cell in structural_cells {
                pairs_evaluated += 1;
                // Zero for disjoint boxes and for degenerate source cells
                let iopdf = source.bbox.intersection_over_self(&cell.bbox);
                if iopdf <= 0.0 {
                    continue;
                }

                let entry = matches.entry(source.id.clone()).or_default();
                let duplicate = entry.iter().any(|m| {
                    m.structural_cell_id == cell.cell_id
                        && (m.iopdf - iopdf).abs() <= SCORE_TOLERANCE
                });
                if !duplicate {
                    entry.push(CellMatch {
                        structural_cell_id: cell.cell_id,
                        iopdf,
                    });
                }
            }
        }

        (matches, pairs_evaluated)
    }

    /// Place the decoded cells on the page and match the page's source cells
    #[must_use]
    pub fn match_cells(
        &self,
        sequence: &SequencePrediction,
        class_ids: &[i64],
        page: &PageSnapshot,
        crop: &TableCropSnapshot,
    ) -> MatchingResult {
        let page_bboxes = self.translate_bboxes(&crop.bbox, &sequence.final_bboxes);
        let structural_cells =
            self.build_structural_cells(&sequence.rs_sequence, &page_bboxes, class_ids);

        let (matches, pairs_evaluated) = if page.source_cells.is_empty() {
            log::debug!("No source cells on page, skipping matching");
            (IndexMap::new(), 0)
        } else {
            self.match_source_cells(&page.source_cells, &structural_cells)
        };

        log::debug!(
            "Matched {} of {} source cells against {} structural cells",
            matches.len(),
            page.source_cells.len(),
            structural_cells.len()
        );

        MatchingResult {
            iou_threshold: self.iou_threshold,
            table_bbox: crop.bbox,
            page_bboxes,
            structural_cells,
            source_cells: page.source_cells.clone(),
            matches,
            page_width: page.width,
            page_height: page.height,
            pairs_evaluated,
        }
    }
}
