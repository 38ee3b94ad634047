//! Board camera: the pan offset and zoom that map world space onto the screen.

use kurbo::{Affine, Point, Rect, Size, Vec2};
use serde::{Deserialize, Serialize};

/// World-to-screen mapping of a board view.
///
/// Zoom also drives every screen-constant quantity: handle sizes, hit padding and
/// stroke simplification tolerance are all divided by it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Camera {
    /// Screen position of the world origin.
    pub offset: Vec2,
    pub zoom: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            offset: Vec2::ZERO,
            zoom: 1.0,
            min_zoom: 0.1,
            max_zoom: 8.0,
        }
    }
}

impl Camera {
    pub fn new() -> Self {
        Self::default()
    }

    /// World to screen.
    pub fn transform(&self) -> Affine {
        Affine::translate(self.offset) * Affine::scale(self.zoom)
    }

    pub fn screen_to_world(&self, screen: Point) -> Point {
        Point::new(
            (screen.x - self.offset.x) / self.zoom,
            (screen.y - self.offset.y) / self.zoom,
        )
    }

    pub fn world_to_screen(&self, world: Point) -> Point {
        self.transform() * world
    }

    /// Move the view by a screen-space delta.
    pub fn pan(&mut self, delta: Vec2) {
        self.offset += delta;
    }

    /// Scale the zoom by `factor` within the allowed range, keeping the world point under
    /// `anchor` where it is on screen.
    pub fn zoom_at(&mut self, anchor: Point, factor: f64) {
        let zoom = (self.zoom * factor).clamp(self.min_zoom, self.max_zoom);
        if (zoom - self.zoom).abs() < f64::EPSILON {
            return;
        }
        let world = self.screen_to_world(anchor);
        self.zoom = zoom;
        self.offset = anchor.to_vec2() - world.to_vec2() * zoom;
    }

    /// Back to the identity view.
    pub fn reset(&mut self) {
        self.offset = Vec2::ZERO;
        self.zoom = 1.0;
    }

    /// Center `bounds` in a `viewport`, zoomed so it fits inside a `margin` of screen
    /// pixels on every side. Degenerate bounds are centered without changing the zoom.
    pub fn fit_to_bounds(&mut self, bounds: Rect, viewport: Size, margin: f64) {
        let room = Size::new(
            (viewport.width - 2.0 * margin).max(1.0),
            (viewport.height - 2.0 * margin).max(1.0),
        );
        if bounds.width() > 0.0 && bounds.height() > 0.0 {
            let fit = (room.width / bounds.width()).min(room.height / bounds.height());
            self.zoom = fit.clamp(self.min_zoom, self.max_zoom);
        }
        let screen_center = Vec2::new(viewport.width / 2.0, viewport.height / 2.0);
        self.offset = screen_center - bounds.center().to_vec2() * self.zoom;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_screen_to_world_with_offset_and_zoom() {
        let camera = Camera {
            offset: Vec2::new(50.0, 100.0),
            zoom: 2.0,
            ..Camera::default()
        };
        let world = camera.screen_to_world(Point::new(150.0, 300.0));
        assert!((world.x - 50.0).abs() < f64::EPSILON);
        assert!((world.y - 100.0).abs() < f64::EPSILON);
        let back = camera.world_to_screen(world);
        assert!((back.x - 150.0).abs() < 1e-10);
        assert!((back.y - 300.0).abs() < 1e-10);
    }

    #[test]
    fn test_zoom_at_keeps_anchor_fixed() {
        let mut camera = Camera::new();
        camera.pan(Vec2::new(-30.0, 12.0));
        let anchor = Point::new(200.0, 120.0);
        let before = camera.screen_to_world(anchor);
        camera.zoom_at(anchor, 2.0);
        let after = camera.screen_to_world(anchor);
        assert!((camera.zoom - 2.0).abs() < f64::EPSILON);
        assert!((before.x - after.x).abs() < 1e-9);
        assert!((before.y - after.y).abs() < 1e-9);
    }

    #[test]
    fn test_zoom_clamp() {
        let mut camera = Camera::new();
        camera.zoom_at(Point::ZERO, 0.001);
        assert!((camera.zoom - camera.min_zoom).abs() < f64::EPSILON);
        camera.zoom_at(Point::ZERO, 1000.0);
        assert!((camera.zoom - camera.max_zoom).abs() < f64::EPSILON);
    }

    #[test]
    fn test_fit_to_bounds_centers_and_scales() {
        let mut camera = Camera::new();
        let viewport = Size::new(400.0, 300.0);
        camera.fit_to_bounds(Rect::new(1000.0, 1000.0, 1200.0, 1050.0), viewport, 50.0);

        // Width is the tighter axis: 300 px of room for 200 world units
        assert!((camera.zoom - 1.5).abs() < 1e-12);
        let center = camera.world_to_screen(Point::new(1100.0, 1025.0));
        assert!((center.x - 200.0).abs() < 1e-9);
        assert!((center.y - 150.0).abs() < 1e-9);
    }

    #[test]
    fn test_fit_to_point_keeps_zoom() {
        let mut camera = Camera {
            zoom: 3.0,
            ..Camera::default()
        };
        camera.fit_to_bounds(Rect::new(10.0, 20.0, 10.0, 20.0), Size::new(100.0, 100.0), 10.0);
        assert!((camera.zoom - 3.0).abs() < f64::EPSILON);
        let p = camera.world_to_screen(Point::new(10.0, 20.0));
        assert!((p.x - 50.0).abs() < 1e-9);
        assert!((p.y - 50.0).abs() < 1e-9);

        camera.reset();
        assert_eq!(camera.offset, Vec2::ZERO);
        assert!((camera.zoom - 1.0).abs() < f64::EPSILON);
    }
}
