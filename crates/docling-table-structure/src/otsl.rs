//! # OTSL grammar compiler
//!
//! TableFormer emits a table as a flat sequence of OTSL tags. This module turns
//! that sequence into row-delimited HTML markup and a span map.
//!
//! ## Grammar
//!
//! - **Cell-opening tags** (`fcel`, `ecel`, `ched`, `rhed`, `srow`) introduce exactly one cell
//! - **Span continuations** extend a previous cell: `lcel` (left), `ucel` (up), `xcel` (2D)
//! - **Row terminator** `nl` closes a row
//!
//! ```text
//! fcel lcel nl      <tr><td colspan="2"></td></tr>
//! fcel fcel nl  =>  <tr><td></td><td></td></tr>
//! ```
//!
//! Markup rendering ([`to_html`]) and span computation ([`compute_spans`]) share
//! one grid walk, so a span rendered as `colspan="2"` is always reported as
//! `colspan: 2` for the same cell id.

use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::TableStructureError;

/// Markup token for a cell without span attributes
pub const HTML_EMPTY_CELL: &str = "<td></td>";
/// Markup token for a plain cell opener (emitted by older HTML-vocabulary models)
pub const HTML_CELL_OPEN: &str = "<td>";
/// Markup token opening a cell that carries span attributes
pub const HTML_CELL_OPEN_ATTRS: &str = "<td";
/// Markup token closing the attribute list of a spanning cell
pub const HTML_CELL_CLOSE_ATTRS: &str = ">";
/// Markup token closing a spanning cell
pub const HTML_CELL_CLOSE: &str = "</td>";

/// One symbol of the TableFormer tag vocabulary
///
/// The first four variants are sequence-modelling markers; the rest form the
/// OTSL table grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OtslTag {
    /// `<pad>` padding marker
    #[serde(rename = "<pad>")]
    Pad,
    /// `<unk>` unknown marker
    #[serde(rename = "<unk>")]
    Unk,
    /// `<start>` sequence start marker
    #[serde(rename = "<start>")]
    Start,
    /// `<end>` sequence end marker
    #[serde(rename = "<end>")]
    End,
    /// Empty cell
    Ecel,
    /// Filled cell
    Fcel,
    /// Left-looking span continuation (colspan)
    Lcel,
    /// Up-looking span continuation (rowspan)
    Ucel,
    /// 2D span continuation
    Xcel,
    /// Row terminator
    Nl,
    /// Column header cell
    Ched,
    /// Row header cell
    Rhed,
    /// Section row cell
    Srow,
}

impl OtslTag {
    /// Every tag, in the order of the standard TableFormer word map
    pub const ALL: [OtslTag; 13] = [
        OtslTag::Pad,
        OtslTag::Unk,
        OtslTag::Start,
        OtslTag::End,
        OtslTag::Ecel,
        OtslTag::Fcel,
        OtslTag::Lcel,
        OtslTag::Ucel,
        OtslTag::Xcel,
        OtslTag::Nl,
        OtslTag::Ched,
        OtslTag::Rhed,
        OtslTag::Srow,
    ];

    /// Tags a vocabulary must define for structural decoding to work
    pub const GRAMMAR: [OtslTag; 9] = [
        OtslTag::Fcel,
        OtslTag::Ecel,
        OtslTag::Ched,
        OtslTag::Rhed,
        OtslTag::Srow,
        OtslTag::Lcel,
        OtslTag::Ucel,
        OtslTag::Xcel,
        OtslTag::Nl,
    ];

    /// Vocabulary word for this tag
    #[inline]
    #[must_use = "returns the vocabulary word"]
    pub const fn as_str(self) -> &'static str {
        match self {
            OtslTag::Pad => "<pad>",
            OtslTag::Unk => "<unk>",
            OtslTag::Start => "<start>",
            OtslTag::End => "<end>",
            OtslTag::Ecel => "ecel",
            OtslTag::Fcel => "fcel",
            OtslTag::Lcel => "lcel",
            OtslTag::Ucel => "ucel",
            OtslTag::Xcel => "xcel",
            OtslTag::Nl => "nl",
            OtslTag::Ched => "ched",
            OtslTag::Rhed => "rhed",
            OtslTag::Srow => "srow",
        }
    }

    /// Returns true for tags that open exactly one structural cell
    #[inline]
    #[must_use = "returns whether the tag opens a cell"]
    pub const fn opens_cell(self) -> bool {
        matches!(
            self,
            OtslTag::Fcel | OtslTag::Ecel | OtslTag::Ched | OtslTag::Rhed | OtslTag::Srow
        )
    }

    /// Returns true for `lcel`, `ucel` and `xcel`
    #[inline]
    #[must_use = "returns whether the tag continues a span"]
    pub const fn is_span_continuation(self) -> bool {
        matches!(self, OtslTag::Lcel | OtslTag::Ucel | OtslTag::Xcel)
    }
}

impl fmt::Display for OtslTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OtslTag {
    type Err = TableStructureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OtslTag::ALL
            .iter()
            .copied()
            .find(|tag| tag.as_str() == s)
            .ok_or_else(|| TableStructureError::data_format(format!("'{s}' is not an OTSL tag")))
    }
}

/// Column and row extent of one cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellSpan {
    /// Number of grid columns covered (>= 1)
    pub colspan: usize,
    /// Number of grid rows covered (>= 1)
    pub rowspan: usize,
}

impl CellSpan {
    /// A 1x1 cell
    pub const SINGLE: CellSpan = CellSpan {
        colspan: 1,
        rowspan: 1,
    };

    /// Returns true if the cell covers more than one grid slot
    #[inline]
    #[must_use = "returns whether the span covers more than one slot"]
    pub const fn is_spanning(&self) -> bool {
        self.colspan > 1 || self.rowspan > 1
    }
}

impl Default for CellSpan {
    #[inline]
    fn default() -> Self {
        Self::SINGLE
    }
}

/// Cell id (0-based, emission order) to span, only for cells that span
///
/// Absent ids are implicitly 1x1.
pub type SpanMap = BTreeMap<usize, CellSpan>;

/// Direction of a span-distance scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scan {
    Right,
    Down,
}

impl Scan {
    /// Returns true if `tag` terminates a scan in this direction
    fn stops_at(self, tag: OtslTag) -> bool {
        match (self, tag) {
            (
                _,
                OtslTag::Fcel
                | OtslTag::Ecel
                | OtslTag::Ched
                | OtslTag::Rhed
                | OtslTag::Srow
                | OtslTag::Nl,
            ) => true,
            (Scan::Right, OtslTag::Ucel) | (Scan::Down, OtslTag::Lcel) => true,
            (Scan::Right, OtslTag::Lcel | OtslTag::Xcel)
            | (Scan::Down, OtslTag::Ucel | OtslTag::Xcel) => false,
            (_, OtslTag::Pad | OtslTag::Unk | OtslTag::Start | OtslTag::End) => false,
        }
    }
}

/// Distance covered by a rightward span starting at column `x` of row `y`
///
/// Starts at 1 and adds one for every continuation tag walked over, stopping at
/// a cell-opening tag, `ucel`, `nl` or the end of the row. Called with `x` one
/// past the cell, so a cell followed by no continuation reports 1 and a cell
/// followed by one `lcel` reports 2.
#[must_use = "returns the span distance"]
pub fn check_right(grid: &[Vec<OtslTag>], x: usize, y: usize) -> usize {
    let Some(row) = grid.get(y) else {
        return 1;
    };
    let mut distance = 1;
    let mut x = x;
    while let Some(&tag) = row.get(x) {
        if Scan::Right.stops_at(tag) {
            break;
        }
        distance += 1;
        x += 1;
    }
    distance
}

/// Distance covered by a downward span starting at row `y` of column `x`
///
/// Same contract as [`check_right`], walking rows instead of columns and
/// stopping at `lcel` instead of `ucel`.
#[must_use = "returns the span distance"]
pub fn check_down(grid: &[Vec<OtslTag>], x: usize, y: usize) -> usize {
    let mut distance = 1;
    let mut y = y;
    while let Some(&tag) = grid.get(y).and_then(|row| row.get(x)) {
        if Scan::Down.stops_at(tag) {
            break;
        }
        distance += 1;
        y += 1;
    }
    distance
}

/// Split a tag sequence into rows at `nl`
///
/// Runs of `nl` never produce empty rows; trailing tags without a final `nl`
/// form the last row.
#[must_use = "returns the rows of the sequence"]
pub fn split_rows(tags: &[OtslTag]) -> Vec<Vec<OtslTag>> {
    tags.split(|&tag| tag == OtslTag::Nl)
        .filter(|row| !row.is_empty())
        .map(<[OtslTag]>::to_vec)
        .collect()
}

/// Returns true if every row (plus its terminator) has the length of the first row
#[must_use = "returns whether the sequence is rectangular"]
pub fn is_rectangular(tags: &[OtslTag]) -> bool {
    let rows = split_rows(tags);
    let Some(first) = rows.first() else {
        return true;
    };
    let expected = first.len() + 1;
    rows.iter().all(|row| row.len() + 1 == expected)
}

/// Right-pad every row with `pad` up to the longest row, re-appending `nl`
#[must_use = "returns the padded sequence"]
pub fn pad_to_rectangle(tags: &[OtslTag], pad: OtslTag) -> Vec<OtslTag> {
    let rows = split_rows(tags);
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);

    let mut padded = Vec::with_capacity(rows.len() * (width + 1));
    for row in rows {
        let missing = width - row.len();
        padded.extend(row);
        padded.extend(std::iter::repeat(pad).take(missing));
        padded.push(OtslTag::Nl);
    }
    padded
}

/// Grid slots already claimed by an accepted 2D (`xcel`) span
///
/// Scoped to a single walk; every compile starts with an empty registry.
#[derive(Debug, Default)]
struct SpanRegistry {
    claimed: FxHashSet<(usize, usize)>,
}

impl SpanRegistry {
    /// Claim the `cols` x `rows` rectangle whose top-left slot is (`x`, `y`)
    ///
    /// Returns false, claiming nothing, if any slot is already taken.
    fn claim(&mut self, x: usize, y: usize, cols: usize, rows: usize) -> bool {
        let slots: Vec<(usize, usize)> = (y..y + rows)
            .flat_map(|row| (x..x + cols).map(move |col| (col, row)))
            .collect();
        if slots.iter().any(|slot| self.claimed.contains(slot)) {
            return false;
        }
        self.claimed.extend(slots);
        true
    }
}

/// One cell-opening tag placed on the grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PlacedCell {
    cell_id: usize,
    span: CellSpan,
}

/// One grid row after span resolution
#[derive(Debug, Clone, PartialEq, Eq)]
struct PlacedRow {
    has_column_header: bool,
    cells: Vec<PlacedCell>,
}

/// Walk the grid and resolve spans for every cell-opening tag
///
/// Returns `None` for sequences that are not OTSL (empty, or not starting with
/// a cell-opening or `xcel` tag); callers pass those through untouched.
fn layout(tags: &[OtslTag]) -> Option<Vec<PlacedRow>> {
    let first = *tags.first()?;
    if !(first.opens_cell() || first == OtslTag::Xcel) {
        return None;
    }

    let grid = if is_rectangular(tags) {
        split_rows(tags)
    } else {
        log::debug!("OTSL sequence is not rectangular, padding rows with lcel");
        split_rows(&pad_to_rectangle(tags, OtslTag::Lcel))
    };

    let mut registry = SpanRegistry::default();
    let mut next_cell_id = 0;
    let mut rows = Vec::with_capacity(grid.len());

    for (y, row) in grid.iter().enumerate() {
        let mut cells = Vec::new();
        for (x, &tag) in row.iter().enumerate() {
            if !tag.opens_cell() {
                continue;
            }

            let mut span = CellSpan::SINGLE;
            let right = row.get(x + 1).copied();
            let below = grid.get(y + 1).and_then(|next| next.get(x)).copied();

            if right == Some(OtslTag::Lcel) {
                span.colspan = check_right(&grid, x + 1, y);
            }
            if below == Some(OtslTag::Ucel) {
                span.rowspan = check_down(&grid, x, y + 1);
            }
            if right == Some(OtslTag::Xcel) {
                let cols = check_right(&grid, x + 1, y);
                let rows_down = check_down(&grid, x, y + 1);
                if registry.claim(x, y, cols, rows_down) {
                    span.colspan = span.colspan.max(cols);
                    span.rowspan = span.rowspan.max(rows_down);
                } else {
                    log::debug!(
                        "Rejecting 2D span at ({x}, {y}): region already claimed by another span"
                    );
                }
            }

            cells.push(PlacedCell {
                cell_id: next_cell_id,
                span,
            });
            next_cell_id += 1;
        }
        rows.push(PlacedRow {
            has_column_header: row.contains(&OtslTag::Ched),
            cells,
        });
    }

    Some(rows)
}

/// Render an OTSL sequence as HTML table-row markup tokens
///
/// Non-spanning cells render as the single token `<td></td>`; spanning cells
/// render as `<td`, ` colspan="N"` and/or ` rowspan="M"`, `>`, `</td>`. Rows
/// are wrapped in `<tr>`/`</tr>`; `<thead>` opens before the first row holding
/// a `ched` and `</thead>` closes before the first later row without one.
///
/// Sequences that are empty or do not start with a cell-opening or `xcel` tag
/// are returned unchanged as their vocabulary words.
#[must_use = "returns the rendered markup"]
pub fn to_html(tags: &[OtslTag]) -> Vec<String> {
    let Some(rows) = layout(tags) else {
        return tags.iter().map(|tag| tag.as_str().to_string()).collect();
    };

    #[derive(PartialEq)]
    enum Header {
        NotSeen,
        Open,
        Closed,
    }

    let mut header = Header::NotSeen;
    let mut html = Vec::new();
    for row in &rows {
        if row.has_column_header && header == Header::NotSeen {
            html.push("<thead>".to_string());
            header = Header::Open;
        } else if !row.has_column_header && header == Header::Open {
            html.push("</thead>".to_string());
            header = Header::Closed;
        }

        html.push("<tr>".to_string());
        for cell in &row.cells {
            if cell.span.is_spanning() {
                html.push(HTML_CELL_OPEN_ATTRS.to_string());
                if cell.span.colspan > 1 {
                    html.push(format!(" colspan=\"{}\"", cell.span.colspan));
                }
                if cell.span.rowspan > 1 {
                    html.push(format!(" rowspan=\"{}\"", cell.span.rowspan));
                }
                html.push(HTML_CELL_CLOSE_ATTRS.to_string());
                html.push(HTML_CELL_CLOSE.to_string());
            } else {
                html.push(HTML_EMPTY_CELL.to_string());
            }
        }
        html.push("</tr>".to_string());
    }
    html
}

/// Span of every spanning cell, keyed by 0-based cell id in emission order
///
/// Uses the same walk as [`to_html`], so both always agree.
#[must_use = "returns the span map"]
pub fn compute_spans(tags: &[OtslTag]) -> SpanMap {
    layout(tags)
        .unwrap_or_default()
        .into_iter()
        .flat_map(|row| row.cells)
        .filter(|cell| cell.span.is_spanning())
        .map(|cell| (cell.cell_id, cell.span))
        .collect()
}

/// Count of each tag in a sequence, in first-seen order (diagnostics only)
pub(crate) fn tag_histogram(tags: &[OtslTag]) -> IndexMap<OtslTag, usize> {
    let mut counts = IndexMap::new();
    for &tag in tags {
        *counts.entry(tag).or_insert(0) += 1;
    }
    counts
}
