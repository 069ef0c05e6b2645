//! Common test utilities for table structure tests.
//!
//! These are not part of the production library.
#![allow(dead_code)]

use docling_table_structure::{NeuralPrediction, OtslTag, PageBoundingBox, SourceCell, WordMap};

/// Initialise logging once per test binary (`RUST_LOG=debug` to see output)
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Parse a space-separated tag list such as `"fcel lcel nl"`
pub fn tags(text: &str) -> Vec<OtslTag> {
    text.split_whitespace()
        .map(|word| word.parse().expect("test tag"))
        .collect()
}

/// Wrap tags in `<start>`/`<end>` and map them to default vocabulary ids
pub fn tag_ids(text: &str) -> Vec<i64> {
    let map = WordMap::otsl_default();
    let mut ids = vec![map.id("<start>").expect("<start>")];
    ids.extend(
        text.split_whitespace()
            .map(|word| map.id(word).expect("word in vocabulary")),
    );
    ids.push(map.id("<end>").expect("<end>"));
    ids
}

/// Prediction with one `(xc, yc, w, h)` box per entry and no class predictions
pub fn prediction(text: &str, centers: &[[f32; 4]]) -> NeuralPrediction {
    NeuralPrediction::from_flat(
        tag_ids(text),
        centers.iter().flatten().copied().collect(),
        Vec::new(),
    )
}

pub fn page_box(l: f64, t: f64, r: f64, b: f64) -> PageBoundingBox {
    PageBoundingBox::new(l, t, r, b)
}

pub fn source(id: &str, bbox: PageBoundingBox, text: &str) -> SourceCell {
    SourceCell::new(id, bbox, text)
}
