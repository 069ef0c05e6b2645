//! Bounding boxes and the crop-to-page coordinate mapping
//!
//! There are two box types: [`NormalizedBoundingBox`]
//! lives in model space (roughly `[0, 1]` relative to the table crop) and
//! [`PageBoundingBox`] lives in page pixels. The only way from one to the
//! other is [`PageBoundingBox::from_normalized`].

use serde::{Deserialize, Serialize};

/// Box in page pixel space, top-left origin
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PageBoundingBox {
    /// Left edge
    pub l: f64,
    /// Top edge
    pub t: f64,
    /// Right edge
    pub r: f64,
    /// Bottom edge
    pub b: f64,
}

/// Box predicted by the model, in corner form, relative to the table crop
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NormalizedBoundingBox {
    /// Left edge
    pub l: f64,
    /// Top edge
    pub t: f64,
    /// Right edge
    pub r: f64,
    /// Bottom edge
    pub b: f64,
}

impl NormalizedBoundingBox {
    /// Create a box from corner coordinates
    #[inline]
    #[must_use = "returns a new bounding box"]
    pub const fn new(l: f64, t: f64, r: f64, b: f64) -> Self {
        Self { l, t, r, b }
    }

    /// Convert the model's `(xc, yc, w, h)` center form to corners
    #[inline]
    #[must_use = "returns a new bounding box"]
    pub fn from_center(xc: f64, yc: f64, w: f64, h: f64) -> Self {
        Self {
            l: xc - w / 2.0,
            t: yc - h / 2.0,
            r: xc + w / 2.0,
            b: yc + h / 2.0,
        }
    }
}

impl PageBoundingBox {
    /// Create a box from corner coordinates
    #[inline]
    #[must_use = "returns a new bounding box"]
    pub const fn new(l: f64, t: f64, r: f64, b: f64) -> Self {
        Self { l, t, r, b }
    }

    /// Zero-area box at the origin, used when the model emitted no geometry for a cell
    #[inline]
    #[must_use = "returns a zero-area bounding box"]
    pub const fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0, 0.0)
    }

    /// Width (`r - l`)
    #[inline]
    #[must_use = "returns the box width"]
    pub fn width(&self) -> f64 {
        self.r - self.l
    }

    /// Height (`b - t`)
    #[inline]
    #[must_use = "returns the box height"]
    pub fn height(&self) -> f64 {
        self.b - self.t
    }

    /// Area of the bounding box
    #[inline]
    #[must_use = "returns the bounding box area"]
    pub fn area(&self) -> f64 {
        self.width().abs() * self.height().abs()
    }

    /// Overlap with `other`, or `None` if the two boxes do not overlap with positive area
    #[inline]
    #[must_use = "returns the intersection box"]
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        let l = self.l.max(other.l);
        let t = self.t.max(other.t);
        let r = self.r.min(other.r);
        let b = self.b.min(other.b);
        (r > l && b > t).then_some(Self { l, t, r, b })
    }

    /// Intersection area divided by `self`'s own area
    ///
    /// This is intersection-over-self, NOT `IoU`. Returns 0.0 when the boxes
    /// do not overlap or `self` has no area.
    #[inline]
    #[must_use = "returns the intersection-over-self ratio"]
    pub fn intersection_over_self(&self, other: &Self) -> f64 {
        let area = self.area();
        if area <= 0.0 {
            return 0.0;
        }
        self.intersection(other)
            .map_or(0.0, |overlap| overlap.area() / area)
    }

    /// Place a model-space box inside this table crop, in page coordinates
    ///
    /// The vertical axis is mapped twice: first against a bottom-up axis
    /// anchored at the crop bottom, then flipped back to top-down page
    /// coordinates. Keep the two steps separate; folding them changes
    /// floating-point rounding.
    #[must_use = "returns the translated bounding box"]
    pub fn from_normalized(table: &Self, nb: &NormalizedBoundingBox) -> Self {
        let width = table.r - table.l;
        let height = table.b - table.t;

        let x1 = table.l + width * nb.l;
        let y1 = table.b - height * nb.t;
        let x2 = table.l + width * nb.r;
        let y2 = table.b - height * nb.b;

        Self {
            l: x1,
            t: table.b - y1 + table.t,
            r: x2,
            b: table.b - y2 + table.t,
        }
    }
}
