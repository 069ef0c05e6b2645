//! Sequence decoder tests: tag mapping, box conversion and desync repair

mod common;

use common::{init_logging, prediction, tag_ids, tags};
use docling_table_structure::{
    otsl, NormalizedBoundingBox, SequenceDecoder, TableStructureConfig, WordMap,
};
use ndarray::{Array3, ArrayD, IxDyn};
use rstest::rstest;

fn boxes(n: usize) -> Vec<NormalizedBoundingBox> {
    (0..n)
        .map(|i| {
            let v = i as f64 / 10.0;
            NormalizedBoundingBox::new(v, v, v + 0.05, v + 0.05)
        })
        .collect()
}

#[rstest]
#[case::one_span("fcel lcel nl fcel fcel nl", 3)]
#[case::rowspan("fcel fcel nl ucel fcel nl", 3)]
#[case::two_spans("fcel lcel fcel nl fcel fcel lcel nl", 4)]
#[case::header_span("ched lcel lcel nl fcel fcel fcel nl", 4)]
fn test_desync_repair_drops_extra_boxes(#[case] text: &str, #[case] cells: usize) {
    init_logging();
    let decoder = SequenceDecoder::default();
    let html = otsl::to_html(&tags(text));
    let spanning = html.iter().filter(|t| *t == ">").count();
    let raw = boxes(cells + spanning);

    let (fixed, synced) = decoder.sync_bounding_boxes(&html, &raw);

    assert!(!synced);
    assert_eq!(fixed.len(), cells);
}

#[rstest]
#[case::plain("fcel fcel nl fcel fcel nl", 4)]
#[case::one_span("fcel lcel nl fcel fcel nl", 3)]
#[case::pass_through("lcel fcel ecel nl", 2)]
fn test_matching_counts_are_untouched(#[case] text: &str, #[case] cells: usize) {
    let decoder = SequenceDecoder::default();
    let html = otsl::to_html(&tags(text));
    let raw = boxes(cells);

    let (fixed, synced) = decoder.sync_bounding_boxes(&html, &raw);

    assert!(synced);
    assert_eq!(fixed, raw);
}

#[test]
fn test_desync_repair_removes_slot_after_spanning_cell() {
    let decoder = SequenceDecoder::default();
    let html = otsl::to_html(&tags("fcel fcel nl fcel lcel nl"));
    let raw = boxes(4);

    let (fixed, _) = decoder.sync_bounding_boxes(&html, &raw);

    // Cell 2 spans; the box after it (index 3) belongs to the lcel step
    assert_eq!(fixed, vec![raw[0], raw[1], raw[2]]);
}

#[test]
fn test_decode_reports_desync() {
    init_logging();
    let decoder = SequenceDecoder::default();
    let pred = prediction(
        "fcel lcel nl fcel fcel nl",
        &[
            [0.25, 0.25, 0.5, 0.5],
            [0.75, 0.25, 0.5, 0.5],
            [0.25, 0.75, 0.5, 0.5],
            [0.75, 0.75, 0.5, 0.5],
        ],
    );

    let decoded = decoder.decode(&pred).unwrap();

    assert_eq!(decoded.raw_bboxes.len(), 4);
    assert_eq!(decoded.final_bboxes.len(), 3);
    assert!(!decoded.bboxes_synced);
    assert_eq!(decoded.final_bboxes[1], decoded.raw_bboxes[2]);
}

#[test]
fn test_decode_unknown_id_fails() {
    let decoder = SequenceDecoder::default();
    let mut pred = prediction("fcel nl", &[[0.5, 0.5, 1.0, 1.0]]);
    pred.tag_ids[1] = 500;

    let err = decoder.decode(&pred).unwrap_err();
    assert!(err.is_data_format_error());
}

#[test]
fn test_decode_ragged_box_tensor_fails() {
    let decoder = SequenceDecoder::default();
    let mut pred = prediction("fcel nl", &[]);
    pred.bbox_tensor = ArrayD::zeros(IxDyn(&[5]));

    let err = decoder.decode(&pred).unwrap_err();
    assert!(err.is_data_format_error());
    assert!(err.to_string().contains("multiple of 4"));
}

#[test]
fn test_convert_accepts_batched_tensor() {
    let decoder = SequenceDecoder::default();
    let tensor = Array3::<f32>::from_shape_fn((1, 2, 4), |(_, row, col)| {
        [[0.5, 0.5, 1.0, 1.0], [0.5, 0.25, 0.5, 0.5]][row][col]
    })
    .into_dyn();

    let converted = decoder.convert_bounding_boxes(&tensor.view()).unwrap();

    assert_eq!(
        converted,
        vec![
            NormalizedBoundingBox::new(0.0, 0.0, 1.0, 1.0),
            NormalizedBoundingBox::new(0.25, 0.0, 0.75, 0.5),
        ]
    );
}

#[test]
fn test_custom_vocabulary_from_config() {
    // Same words, shifted ids
    let json = r#"{
        "dataset_wordmap": {"word_map_tag": {
            "<start>": 100, "<end>": 101, "fcel": 102, "ecel": 103, "ched": 104,
            "rhed": 105, "srow": 106, "lcel": 107, "ucel": 108, "xcel": 109, "nl": 110
        }},
        "predict": {"pdf_cell_iou_thres": 0.05}
    }"#;
    let config = TableStructureConfig::from_json_str(json).unwrap();
    let decoder = SequenceDecoder::new(config.word_map);

    let seq = decoder.map_to_tags(&[100, 102, 107, 110, 101]).unwrap();
    assert_eq!(seq, tags("fcel lcel nl"));

    // Default ids mean something else here
    assert!(decoder.map_to_tags(&tag_ids("fcel nl")).is_err());
}

#[test]
fn test_default_word_map_matches_checkpoint_ids() {
    assert_eq!(
        tag_ids("ecel fcel lcel ucel xcel nl ched rhed srow"),
        vec![2, 4, 5, 6, 7, 8, 9, 10, 11, 12, 3]
    );
    assert_eq!(SequenceDecoder::default().word_map(), &WordMap::otsl_default());
}
