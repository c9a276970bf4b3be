//! Draws the selected box onto each stream's overlay surface.
//!
//! Boxes live in the canonical reference frame. Each surface may be
//! rendered at its own on-screen size, so the box is scaled independently
//! per surface and per axis.

use std::sync::{Mutex, PoisonError};

use rgbd_core::BoundingBox;
use serde::Serialize;

/// An integer rectangle in a surface's own pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PixelRect {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

/// A drawable layer laid over one stream.
pub trait OverlaySurface: Send + Sync {
    /// Current on-screen size as `(width, height)`.
    fn rendered_size(&self) -> (f64, f64);

    fn clear(&self);

    fn stroke_rect(&self, rect: PixelRect);
}

/// Scale a canonical box into a surface of `rendered` size.
///
/// Returns `None` when either size is zero or not finite.
pub fn scale_box(
    bbox: &BoundingBox,
    rendered: (f64, f64),
    reference: (f64, f64),
) -> Option<PixelRect> {
    let (rw, rh) = rendered;
    let (fw, fh) = reference;
    let usable = |v: f64| v.is_finite() && v > 0.0;
    if !(usable(rw) && usable(rh) && usable(fw) && usable(fh)) {
        return None;
    }
    let sx = rw / fw;
    let sy = rh / fh;
    Some(PixelRect {
        x: (bbox.x * sx).round() as i64,
        y: (bbox.y * sy).round() as i64,
        width: (bbox.width * sx).round() as i64,
        height: (bbox.height * sy).round() as i64,
    })
}

/// Paints a selected box, or nothing, on every surface it is given.
#[derive(Debug, Clone, Copy)]
pub struct OverlayRenderer {
    reference: (f64, f64),
}

impl OverlayRenderer {
    pub fn new(reference_width: f64, reference_height: f64) -> Self {
        Self {
            reference: (reference_width, reference_height),
        }
    }

    /// Clear every surface, then stroke `selected` scaled to each one.
    ///
    /// Always starting from a cleared surface keeps repeated calls
    /// idempotent.
    pub fn render<S>(&self, selected: Option<&BoundingBox>, surfaces: &[S])
    where
        S: AsRef<dyn OverlaySurface>,
    {
        for surface in surfaces {
            let surface = surface.as_ref();
            surface.clear();
            let Some(bbox) = selected else {
                continue;
            };
            if let Some(rect) = scale_box(bbox, surface.rendered_size(), self.reference) {
                surface.stroke_rect(rect);
            }
        }
    }
}

/// An overlay surface that remembers what is currently drawn on it.
#[derive(Debug)]
pub struct MemorySurface {
    size: Mutex<(f64, f64)>,
    drawn: Mutex<Option<PixelRect>>,
}

impl MemorySurface {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            size: Mutex::new((width, height)),
            drawn: Mutex::new(None),
        }
    }

    /// Simulate the surface being laid out at a new size.
    pub fn resize(&self, width: f64, height: f64) {
        *self.size.lock().unwrap_or_else(PoisonError::into_inner) = (width, height);
    }

    /// The rectangle currently visible, if any.
    pub fn drawn(&self) -> Option<PixelRect> {
        *self.drawn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl OverlaySurface for MemorySurface {
    fn rendered_size(&self) -> (f64, f64) {
        *self.size.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn clear(&self) {
        *self.drawn.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn stroke_rect(&self, rect: PixelRect) {
        *self.drawn.lock().unwrap_or_else(PoisonError::into_inner) = Some(rect);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const REFERENCE: (f64, f64) = (848.0, 480.0);

    fn sample_box() -> BoundingBox {
        BoundingBox::new(100.0, 50.0, 200.0, 100.0)
    }

    #[test]
    fn half_scale_surface_halves_the_box() {
        let rect = scale_box(&sample_box(), (424.0, 240.0), REFERENCE).unwrap();
        assert_eq!(
            rect,
            PixelRect {
                x: 50,
                y: 25,
                width: 100,
                height: 50
            }
        );
    }

    #[test]
    fn axes_scale_independently() {
        let rect = scale_box(&sample_box(), (848.0, 240.0), REFERENCE).unwrap();
        assert_eq!((rect.x, rect.y, rect.width, rect.height), (100, 25, 200, 50));
    }

    #[test]
    fn zero_size_surface_is_skipped() {
        assert_eq!(scale_box(&sample_box(), (0.0, 240.0), REFERENCE), None);
        assert_eq!(scale_box(&sample_box(), (f64::NAN, 240.0), REFERENCE), None);
    }

    fn as_surfaces(list: &[&Arc<MemorySurface>]) -> Vec<Arc<dyn OverlaySurface>> {
        list.iter()
            .map(|s| Arc::clone(*s) as Arc<dyn OverlaySurface>)
            .collect()
    }

    #[test]
    fn render_draws_on_every_surface_at_its_own_scale() {
        let full = Arc::new(MemorySurface::new(848.0, 480.0));
        let half = Arc::new(MemorySurface::new(424.0, 240.0));
        let surfaces = as_surfaces(&[&full, &half]);

        let renderer = OverlayRenderer::new(848.0, 480.0);
        renderer.render(Some(&sample_box()), &surfaces);

        assert_eq!(full.drawn().map(|r| (r.x, r.y)), Some((100, 50)));
        assert_eq!(half.drawn().map(|r| (r.x, r.y)), Some((50, 25)));
    }

    #[test]
    fn render_is_idempotent_and_clears_without_selection() {
        let surface = Arc::new(MemorySurface::new(424.0, 240.0));
        let surfaces = as_surfaces(&[&surface]);
        let renderer = OverlayRenderer::new(848.0, 480.0);

        renderer.render(Some(&sample_box()), &surfaces);
        let first = surface.drawn();
        renderer.render(Some(&sample_box()), &surfaces);
        assert_eq!(surface.drawn(), first);

        renderer.render(None, &surfaces);
        assert_eq!(surface.drawn(), None);
    }

    #[test]
    fn resized_surface_is_rescaled_on_next_render() {
        let surface = Arc::new(MemorySurface::new(848.0, 480.0));
        let surfaces = as_surfaces(&[&surface]);
        let renderer = OverlayRenderer::new(848.0, 480.0);

        renderer.render(Some(&sample_box()), &surfaces);
        assert_eq!(surface.drawn().map(|r| r.width), Some(200));

        surface.resize(424.0, 240.0);
        renderer.render(Some(&sample_box()), &surfaces);
        assert_eq!(surface.drawn().map(|r| r.width), Some(100));
    }
}
