//! Conversion to docling table cells
//!
//! This is the only place where structural cells and source text are merged
//! into the flat record the document assembler consumes. Each source cell
//! contributes its text to exactly one table cell, the one it overlaps best.

use std::fmt::Write as _;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::data_structures::MatchingResult;
use crate::geometry::PageBoundingBox;
use crate::otsl::OtslTag;

/// Table cell in the shape used by docling documents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableCellRecord {
    /// Text of all source cells assigned to this cell, in reading order
    pub text: String,
    /// Cell geometry in page pixels
    pub bbox: PageBoundingBox,
    /// Number of rows this cell spans
    pub row_span: usize,
    /// Number of columns this cell spans
    pub col_span: usize,
    /// Starting row index
    pub start_row_offset_idx: usize,
    /// Ending row index (exclusive)
    pub end_row_offset_idx: usize,
    /// Starting column index
    pub start_col_offset_idx: usize,
    /// Ending column index (exclusive)
    pub end_col_offset_idx: usize,
    /// Whether this cell is a column header (ched tag)
    #[serde(default)]
    pub column_header: bool,
    /// Whether this cell is a row header (rhed tag)
    #[serde(default)]
    pub row_header: bool,
    /// Whether this cell is a section row (srow tag)
    #[serde(default)]
    pub row_section: bool,
}

/// Convert a matching result into table cell records, one per structural cell
#[must_use]
pub fn table_cells(result: &MatchingResult) -> Vec<TableCellRecord> {
    // Source cell index per structural cell, best match only
    let mut assigned: Vec<Vec<usize>> = vec![Vec::new(); result.structural_cells.len()];
    for (source_idx, source) in result.source_cells.iter().enumerate() {
        let Some(found) = result.matches.get(&source.id) else {
            continue;
        };
        let best = found.iter().fold(None, |best: Option<(usize, f64)>, m| match best {
            Some((_, score)) if score >= m.iopdf => best,
            _ => Some((m.structural_cell_id, m.iopdf)),
        });
        if let Some((cell_id, _)) = best {
            if let Some(slot) = assigned.get_mut(cell_id) {
                slot.push(source_idx);
            }
        }
    }

    result
        .structural_cells
        .iter()
        .zip(assigned)
        .map(|(cell, mut sources)| {
            // Stable sort: equal positions keep source order
            sources.sort_by_key(|&idx| {
                let bbox = &result.source_cells[idx].bbox;
                (OrderedFloat(bbox.t), OrderedFloat(bbox.l))
            });
            let text = sources
                .iter()
                .map(|&idx| result.source_cells[idx].text.trim())
                .filter(|text| !text.is_empty())
                .collect::<Vec<_>>()
                .join(" ");

            TableCellRecord {
                text,
                bbox: cell.bbox,
                row_span: cell.row_span(),
                col_span: cell.col_span(),
                start_row_offset_idx: cell.row_id,
                end_row_offset_idx: cell.row_id + cell.row_span(),
                start_col_offset_idx: cell.column_id,
                end_col_offset_idx: cell.column_id + cell.col_span(),
                column_header: cell.label == OtslTag::Ched,
                row_header: cell.label == OtslTag::Rhed,
                row_section: cell.label == OtslTag::Srow,
            }
        })
        .collect()
}

/// Escape text for HTML element content (matches Python docling: `&`, `<`, `>`)
fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Render table cell records as an HTML `<table>`
///
/// Column headers render as `<th>`, everything else as `<td>`. Every grid row
/// of `result` produces a `<tr>`, even when no cell starts in it.
#[must_use]
pub fn to_html(result: &MatchingResult, cells: &[TableCellRecord]) -> String {
    let mut html = String::from("<table>");
    for row in 0..result.num_rows() {
        html.push_str("<tr>");
        for cell in cells.iter().filter(|c| c.start_row_offset_idx == row) {
            let tag = if cell.column_header { "th" } else { "td" };
            let _ = write!(html, "<{tag}");
            if cell.col_span > 1 {
                let _ = write!(html, " colspan=\"{}\"", cell.col_span);
            }
            if cell.row_span > 1 {
                let _ = write!(html, " rowspan=\"{}\"", cell.row_span);
            }
            let _ = write!(html, ">{}</{tag}>", escape_html(&cell.text));
        }
        html.push_str("</tr>");
    }
    html.push_str("</table>");
    html
}
