//! Box geometry in the canonical reference frame.
//!
//! Boxes are stored in a fixed pixel space (see
//! [`SyncConfig::reference_width`](crate::SyncConfig::reference_width)) that
//! is independent of the size either stream is rendered at on screen.

use serde::{Deserialize, Serialize};

/// A pointer position in canonical pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// An axis-aligned rectangle anchored at `(x, y)`.
///
/// While a box is being dragged its `width` / `height` may be negative
/// (the pointer moved left or up from the origin). [`normalized`] turns
/// that into a top-left anchored box with non-negative extents.
///
/// [`normalized`]: BoundingBox::normalized
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Box spanning from `origin` to `corner`, keeping `origin` as the
    /// anchor even when `corner` lies above or to the left of it.
    pub fn from_drag(origin: Point, corner: Point) -> Self {
        Self {
            x: origin.x,
            y: origin.y,
            width: corner.x - origin.x,
            height: corner.y - origin.y,
        }
    }

    /// Return a copy whose origin is the true top-left corner.
    ///
    /// A negative width shifts `x` left by `|width|`; the same rule applies
    /// to `height` / `y`. Applying this twice is the same as applying it once.
    pub fn normalized(&self) -> Self {
        let mut out = *self;
        if out.width < 0.0 {
            out.x += out.width;
            out.width = out.width.abs();
        }
        if out.height < 0.0 {
            out.y += out.height;
            out.height = out.height.abs();
        }
        out
    }

    /// Round every component to the nearest integer pixel.
    pub fn rounded(&self) -> Self {
        Self {
            x: self.x.round(),
            y: self.y.round(),
            width: self.width.round(),
            height: self.height.round(),
        }
    }

    /// `true` when all four components are finite numbers.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite()
            && self.y.is_finite()
            && self.width.is_finite()
            && self.height.is_finite()
    }

    /// `true` when neither extent is zero.
    pub fn has_area(&self) -> bool {
        self.width != 0.0 && self.height != 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drag_down_right_keeps_origin() {
        let b = BoundingBox::from_drag(Point::new(10.0, 10.0), Point::new(110.0, 60.0));
        assert_eq!(b, BoundingBox::new(10.0, 10.0, 100.0, 50.0));
        assert_eq!(b.normalized(), b);
    }

    #[test]
    fn drag_up_left_normalizes_to_top_left() {
        let b = BoundingBox::from_drag(Point::new(110.0, 60.0), Point::new(10.0, 10.0));
        assert_eq!(b.width, -100.0);
        assert_eq!(b.height, -50.0);
        assert_eq!(b.normalized(), BoundingBox::new(10.0, 10.0, 100.0, 50.0));
    }

    #[test]
    fn normalization_is_idempotent() {
        let drafts = [
            BoundingBox::new(50.0, 40.0, -20.0, 30.0),
            BoundingBox::new(50.0, 40.0, 20.0, -30.0),
            BoundingBox::new(50.0, 40.0, -20.0, -30.0),
            BoundingBox::new(0.0, 0.0, -0.5, -848.0),
        ];
        for draft in drafts {
            let once = draft.normalized();
            assert_eq!(once.normalized(), once);
            assert!(once.width >= 0.0 && once.height >= 0.0);
            assert_eq!(once.x, draft.x.min(draft.x + draft.width));
            assert_eq!(once.y, draft.y.min(draft.y + draft.height));
        }
    }

    #[test]
    fn rounding_goes_to_nearest_pixel() {
        let b = BoundingBox::new(10.4, 10.6, 99.5, 0.2).rounded();
        assert_eq!(b, BoundingBox::new(10.0, 11.0, 100.0, 0.0));
    }

    #[test]
    fn zero_extent_has_no_area() {
        assert!(!BoundingBox::new(1.0, 1.0, 0.0, 5.0).has_area());
        assert!(!BoundingBox::new(1.0, 1.0, 5.0, 0.0).has_area());
        assert!(BoundingBox::new(1.0, 1.0, 5.0, 5.0).has_area());
    }

    #[test]
    fn non_finite_component_detected() {
        assert!(!BoundingBox::new(f64::NAN, 0.0, 1.0, 1.0).is_finite());
        assert!(!BoundingBox::new(0.0, 0.0, f64::INFINITY, 1.0).is_finite());
        assert!(BoundingBox::new(0.0, 0.0, 1.0, 1.0).is_finite());
    }
}
