//! Sequence decoder: raw model output to tags, markup and cell boxes
//!
//! The tag decoder and the box decoder of TableFormer run in lockstep, but the
//! box head emits one box per *decoding step that produced a cell slot*, which
//! includes the `lcel` step following a spanning cell. The markup, on the other
//! hand, has one cell per span. [`SequenceDecoder::sync_bounding_boxes`]
//! removes the extra box after every spanning cell so geometry and markup line
//! up again.

use ndarray::ArrayViewD;
use serde::{Deserialize, Serialize};

use crate::data_structures::NeuralPrediction;
use crate::error::{Result, TableStructureError};
use crate::geometry::NormalizedBoundingBox;
use crate::otsl::{
    self, OtslTag, HTML_CELL_CLOSE_ATTRS, HTML_CELL_OPEN, HTML_CELL_OPEN_ATTRS, HTML_EMPTY_CELL,
};
use crate::word_map::WordMap;

/// Decoded form of one [`NeuralPrediction`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequencePrediction {
    /// Raw vocabulary ids, including `<start>`/`<end>`
    pub tag_ids: Vec<i64>,
    /// Tags without the boundary markers
    pub rs_sequence: Vec<OtslTag>,
    /// Row-delimited markup tokens
    pub html_sequence: Vec<String>,
    /// Boxes as emitted by the model, in corner form
    pub raw_bboxes: Vec<NormalizedBoundingBox>,
    /// Boxes after desynchronization repair, one per markup cell when repair succeeds
    pub final_bboxes: Vec<NormalizedBoundingBox>,
    /// True when the raw boxes already matched the markup cell count
    pub bboxes_synced: bool,
}

/// Turns [`NeuralPrediction`]s into [`SequencePrediction`]s
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SequenceDecoder {
    word_map: WordMap,
}

impl SequenceDecoder {
    /// Create a decoder over `word_map`
    #[must_use]
    pub fn new(word_map: WordMap) -> Self {
        Self { word_map }
    }

    /// Vocabulary used for decoding
    #[must_use]
    pub fn word_map(&self) -> &WordMap {
        &self.word_map
    }

    /// Resolve ids to tags, dropping the first and last id (`<start>`/`<end>`)
    ///
    /// # Errors
    ///
    /// [`TableStructureError::DataFormatError`] if any remaining id has no
    /// vocabulary entry.
    pub fn map_to_tags(&self, tag_ids: &[i64]) -> Result<Vec<OtslTag>> {
        let inner: &[i64] = match tag_ids {
            [_, inner @ .., _] => inner,
            _ => &[],
        };
        inner.iter().map(|&id| self.word_map.tag(id)).collect()
    }

    /// Render tags as markup (see [`otsl::to_html`])
    #[must_use]
    pub fn to_html(&self, tags: &[OtslTag]) -> Vec<String> {
        otsl::to_html(tags)
    }

    /// Convert a tensor of `(xc, yc, w, h)` quadruples to corner form
    ///
    /// Elements are read in logical (row-major) order regardless of shape.
    ///
    /// # Errors
    ///
    /// [`TableStructureError::DataFormatError`] if the element count is not a
    /// multiple of 4.
    pub fn convert_bounding_boxes(
        &self,
        tensor: &ArrayViewD<'_, f32>,
    ) -> Result<Vec<NormalizedBoundingBox>> {
        if tensor.len() % 4 != 0 {
            return Err(TableStructureError::data_format(format!(
                "box tensor has {} elements, expected a multiple of 4",
                tensor.len()
            )));
        }
        let quads = tensor.to_shape((tensor.len() / 4, 4))?;
        Ok(quads
            .rows()
            .into_iter()
            .map(|q| {
                NormalizedBoundingBox::from_center(
                    f64::from(q[0]),
                    f64::from(q[1]),
                    f64::from(q[2]),
                    f64::from(q[3]),
                )
            })
            .collect())
    }

    /// Drop the extra box emitted after every spanning cell
    ///
    /// Returns the boxes to use and whether they were already in sync. When
    /// the counts already agree the boxes are returned unchanged.
    #[must_use]
    pub fn sync_bounding_boxes(
        &self,
        html: &[String],
        raw_bboxes: &[NormalizedBoundingBox],
    ) -> (Vec<NormalizedBoundingBox>, bool) {
        let expected = expected_cell_count(html);
        if expected == raw_bboxes.len() {
            return (raw_bboxes.to_vec(), true);
        }

        let mut cursor = 0_usize;
        let mut to_delete = Vec::new();
        for token in html {
            match token.as_str() {
                HTML_EMPTY_CELL | HTML_CELL_OPEN | HTML_CELL_OPEN_ATTRS => cursor += 1,
                HTML_CELL_CLOSE_ATTRS => to_delete.push(cursor),
                _ => {}
            }
        }

        let synced: Vec<NormalizedBoundingBox> = raw_bboxes
            .iter()
            .enumerate()
            .filter(|(idx, _)| !to_delete.contains(idx))
            .map(|(_, bbox)| *bbox)
            .collect();

        if synced.len() == expected {
            log::debug!(
                "Repaired box desync: {} boxes for {} cells, dropped indices {:?}",
                raw_bboxes.len(),
                expected,
                to_delete
            );
        } else {
            log::warn!(
                "Box/cell count mismatch persists after repair: {} boxes for {} cells",
                synced.len(),
                expected
            );
        }
        (synced, false)
    }

    /// Full decode of one prediction
    pub fn decode(&self, prediction: &NeuralPrediction) -> Result<SequencePrediction> {
        let rs_sequence = self.map_to_tags(&prediction.tag_ids)?;
        log::trace!("Tag histogram: {:?}", otsl::tag_histogram(&rs_sequence));

        let html_sequence = self.to_html(&rs_sequence);
        let raw_bboxes = self.convert_bounding_boxes(&prediction.bbox_tensor.view())?;
        let (final_bboxes, bboxes_synced) = self.sync_bounding_boxes(&html_sequence, &raw_bboxes);

        log::debug!(
            "Decoded {} tags into {} markup tokens, {} boxes (synced: {})",
            rs_sequence.len(),
            html_sequence.len(),
            final_bboxes.len(),
            bboxes_synced
        );

        Ok(SequencePrediction {
            tag_ids: prediction.tag_ids.clone(),
            rs_sequence,
            html_sequence,
            raw_bboxes,
            final_bboxes,
            bboxes_synced,
        })
    }
}

/// Number of cells implied by a markup sequence
///
/// Counts rendered cells (`<td></td>`, `<td>`, and the `>` closing the
/// attributes of a spanning cell) plus raw cell tags for sequences that were
/// passed through without rendering.
fn expected_cell_count(html: &[String]) -> usize {
    html.iter()
        .filter(|token| match token.as_str() {
            HTML_EMPTY_CELL | HTML_CELL_OPEN | HTML_CELL_CLOSE_ATTRS => true,
            word => word.parse::<OtslTag>().is_ok_and(OtslTag::opens_cell),
        })
        .count()
}
