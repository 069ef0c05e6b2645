//! Property-Based Tests
//!
//! Tests using property-based testing (proptest) to verify invariants:
//! - Span computation is repeatable and agrees with rendered markup
//! - Padding always yields a rectangular grid
//! - Desync repair never grows the box list
//! - Matching never reports duplicate or out-of-range scores

use docling_table_structure::otsl::{self, OtslTag};
use docling_table_structure::{
    CellMatcher, NormalizedBoundingBox, PageBoundingBox, SequenceDecoder, SourceCell,
};
use proptest::prelude::*;

fn grammar_tag() -> impl Strategy<Value = OtslTag> {
    prop::sample::select(vec![
        OtslTag::Fcel,
        OtslTag::Ecel,
        OtslTag::Ched,
        OtslTag::Rhed,
        OtslTag::Srow,
        OtslTag::Lcel,
        OtslTag::Ucel,
        OtslTag::Xcel,
        OtslTag::Nl,
    ])
}

/// Sequences that start with a cell, so the grammar walk runs
fn otsl_sequence() -> impl Strategy<Value = Vec<OtslTag>> {
    (
        prop::sample::select(vec![OtslTag::Fcel, OtslTag::Ecel, OtslTag::Ched]),
        prop::collection::vec(grammar_tag(), 0..40),
    )
        .prop_map(|(first, rest)| {
            let mut seq = vec![first];
            seq.extend(rest);
            seq.push(OtslTag::Nl);
            seq
        })
}

fn page_box() -> impl Strategy<Value = PageBoundingBox> {
    (0.0..100.0_f64, 0.0..100.0_f64, 0.1..50.0_f64, 0.1..50.0_f64)
        .prop_map(|(l, t, w, h)| PageBoundingBox::new(l, t, l + w, t + h))
}

// ============================================================================
// Grammar Compiler Properties
// ============================================================================

/// Property: span computation has no hidden state
#[test]
fn proptest_compute_spans_repeatable() {
    proptest!(|(seq in otsl_sequence())| {
        prop_assert_eq!(otsl::compute_spans(&seq), otsl::compute_spans(&seq));
        prop_assert_eq!(otsl::to_html(&seq), otsl::to_html(&seq));
    });
}

/// Property: sequences not starting with a cell are passed through verbatim
#[test]
fn proptest_pass_through_without_leading_cell() {
    let leading =
        prop::sample::select(vec![OtslTag::Lcel, OtslTag::Ucel, OtslTag::Nl, OtslTag::Pad]);
    proptest!(|(first in leading, rest in prop::collection::vec(grammar_tag(), 0..20))| {
        let mut seq = vec![first];
        seq.extend(rest);

        let html = otsl::to_html(&seq);
        let words: Vec<&str> = seq.iter().map(|t| t.as_str()).collect();
        prop_assert_eq!(html, words);
        prop_assert!(otsl::compute_spans(&seq).is_empty());
    });
}

/// Property: padding always produces a rectangular grid and keeps every tag
#[test]
fn proptest_padding_is_rectangular() {
    proptest!(|(seq in otsl_sequence())| {
        let padded = otsl::pad_to_rectangle(&seq, OtslTag::Lcel);
        prop_assert!(otsl::is_rectangular(&padded));

        let cells_before = seq.iter().filter(|t| t.opens_cell()).count();
        let cells_after = padded.iter().filter(|t| t.opens_cell()).count();
        prop_assert_eq!(cells_before, cells_after);
    });
}

/// Property: markup has one cell per cell-opening tag and the span map agrees with it
#[test]
fn proptest_markup_matches_spans() {
    proptest!(|(seq in otsl_sequence())| {
        let html = otsl::to_html(&seq);
        let spans = otsl::compute_spans(&seq);

        let plain = html.iter().filter(|t| *t == "<td></td>").count();
        let spanning = html.iter().filter(|t| *t == ">").count();
        let cells = seq.iter().filter(|t| t.opens_cell()).count();

        prop_assert_eq!(plain + spanning, cells);
        prop_assert_eq!(spanning, spans.len());
        prop_assert!(spans.keys().all(|&id| id < cells));
        prop_assert!(spans.values().all(|s| s.colspan >= 1 && s.rowspan >= 1 && s.is_spanning()));
    });
}

// ============================================================================
// Sequence Decoder Properties
// ============================================================================

/// Property: repair never adds boxes, and in-sync input is returned untouched
#[test]
fn proptest_sync_never_grows() {
    proptest!(|(seq in otsl_sequence(), n in 0usize..60)| {
        let decoder = SequenceDecoder::default();
        let html = otsl::to_html(&seq);
        let raw: Vec<NormalizedBoundingBox> = (0..n)
            .map(|i| NormalizedBoundingBox::new(i as f64, 0.0, i as f64 + 1.0, 1.0))
            .collect();

        let (fixed, synced) = decoder.sync_bounding_boxes(&html, &raw);

        prop_assert!(fixed.len() <= raw.len());
        if synced {
            prop_assert_eq!(&fixed, &raw);
        }
        // Kept boxes stay in emission order
        prop_assert!(fixed.windows(2).all(|w| w[0].l < w[1].l));
    });
}

// ============================================================================
// Matcher Properties
// ============================================================================

/// Property: scores lie in (0, 1] and no (cell, score) pair repeats
#[test]
fn proptest_match_scores_in_range() {
    proptest!(|(
        cell_boxes in prop::collection::vec(page_box(), 1..8),
        source_boxes in prop::collection::vec(page_box(), 0..8)
    )| {
        let matcher = CellMatcher::new(0.05);
        let mut seq = vec![OtslTag::Fcel; cell_boxes.len()];
        seq.push(OtslTag::Nl);
        let structural = matcher.build_structural_cells(&seq, &cell_boxes, &[]);
        let sources: Vec<SourceCell> = source_boxes
            .iter()
            .enumerate()
            .map(|(i, b)| SourceCell::new(i.to_string(), *b, "x"))
            .collect();

        let (matches, pairs) = matcher.match_source_cells(&sources, &structural);

        prop_assert_eq!(pairs, sources.len() * structural.len());
        for found in matches.values() {
            prop_assert!(!found.is_empty());
            for (i, m) in found.iter().enumerate() {
                prop_assert!(m.iopdf > 0.0 && m.iopdf <= 1.0 + 1e-9);
                prop_assert!(found[..i].iter().all(|o| o.structural_cell_id != m.structural_cell_id
                    || (o.iopdf - m.iopdf).abs() > 1e-9));
            }
        }
    });
}
