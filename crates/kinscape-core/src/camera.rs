//! Pan/zoom camera with smooth target-seeking transitions.
//!
//! Mapping is the affine pair `world = screen / zoom + offset` and its
//! inverse. Operations that depend on the viewport are no-ops until
//! [`Camera::set_viewport`] has been called.

use serde::{Deserialize, Serialize};

/// A requested camera state for smooth move-to transitions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraTarget {
    /// Target world-space offset x.
    pub x: f32,
    /// Target world-space offset y.
    pub y: f32,
    /// Target zoom factor.
    pub zoom: f32,
}

/// Read-only camera state published with each frame snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraTransform {
    /// World-space offset of the viewport origin.
    pub offset_x: f32,
    /// World-space offset of the viewport origin.
    pub offset_y: f32,
    /// Zoom factor (screen units per world unit).
    pub zoom: f32,
}

/// Camera controller owning offset, zoom, and the in-flight transition.
#[derive(Debug, Clone)]
pub struct Camera {
    offset: (f32, f32),
    zoom: f32,
    viewport: Option<(f32, f32)>,
    transition: Option<CameraTarget>,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new()
    }
}

impl Camera {
    /// A camera at the world origin with unit zoom and no viewport yet.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            offset: (0.0, 0.0),
            zoom: 1.0,
            viewport: None,
            transition: None,
        }
    }

    /// Current world-space offset.
    #[must_use]
    pub const fn offset(&self) -> (f32, f32) {
        self.offset
    }

    /// Current zoom factor.
    #[must_use]
    pub const fn zoom(&self) -> f32 {
        self.zoom
    }

    /// Whether a move-to transition is in flight.
    #[must_use]
    pub const fn in_transition(&self) -> bool {
        self.transition.is_some()
    }

    /// Record the measured viewport size in screen units.
    pub fn set_viewport(&mut self, width: f32, height: f32, world: (f32, f32)) {
        if width <= 0.0 || height <= 0.0 {
            return;
        }
        self.viewport = Some((width, height));
        self.clamp_offset(world);
    }

    /// Measured viewport, if any.
    #[must_use]
    pub const fn viewport(&self) -> Option<(f32, f32)> {
        self.viewport
    }

    /// Pan by a screen-space delta. Cancels any in-flight transition.
    /// No-op before the viewport is measured.
    pub fn pan(&mut self, dx: f32, dy: f32, world: (f32, f32)) {
        if self.viewport.is_none() {
            return;
        }
        self.transition = None;
        self.offset.0 += dx / self.zoom;
        self.offset.1 += dy / self.zoom;
        self.clamp_offset(world);
    }

    /// Multiply the zoom by `factor`, keeping the world point at the
    /// viewport centre fixed. No-op before the viewport is measured.
    pub fn zoom_by(&mut self, factor: f32, min_zoom: f32, max_zoom: f32, world: (f32, f32)) {
        let Some((vw, vh)) = self.viewport else {
            return;
        };
        if !(factor.is_finite()) || factor <= 0.0 {
            return;
        }
        let new_zoom = (self.zoom * factor).clamp(min_zoom, max_zoom);
        if (new_zoom - self.zoom).abs() <= f32::EPSILON {
            return;
        }
        let centre_x = self.offset.0 + vw / (2.0 * self.zoom);
        let centre_y = self.offset.1 + vh / (2.0 * self.zoom);
        self.zoom = new_zoom;
        self.offset.0 = centre_x - vw / (2.0 * new_zoom);
        self.offset.1 = centre_y - vh / (2.0 * new_zoom);
        self.clamp_offset(world);
    }

    /// Begin a smooth transition toward `target`.
    pub fn move_to(&mut self, target: CameraTarget) {
        self.transition = Some(target);
    }

    /// Compute the target that centres `point` at the current zoom, clamped
    /// so the transition can actually reach it inside the world bounds.
    /// Returns `None` before the viewport is measured.
    #[must_use]
    pub fn target_centred_on(&self, point: (f32, f32), world: (f32, f32)) -> Option<CameraTarget> {
        let (vw, vh) = self.viewport?;
        let max_x = (world.0 - vw / self.zoom).max(0.0);
        let max_y = (world.1 - vh / self.zoom).max(0.0);
        Some(CameraTarget {
            x: (point.0 - vw / (2.0 * self.zoom)).clamp(0.0, max_x),
            y: (point.1 - vh / (2.0 * self.zoom)).clamp(0.0, max_y),
            zoom: self.zoom,
        })
    }

    /// Advance the in-flight transition one tick: interpolate at `rate`,
    /// snap to target once every component is within its epsilon.
    pub fn tick(&mut self, rate: f32, epsilon: f32, zoom_epsilon: f32, world: (f32, f32)) {
        let Some(target) = self.transition else {
            return;
        };
        self.offset.0 += (target.x - self.offset.0) * rate;
        self.offset.1 += (target.y - self.offset.1) * rate;
        self.zoom += (target.zoom - self.zoom) * rate;

        if (target.x - self.offset.0).abs() <= epsilon
            && (target.y - self.offset.1).abs() <= epsilon
            && (target.zoom - self.zoom).abs() <= zoom_epsilon
        {
            self.offset = (target.x, target.y);
            self.zoom = target.zoom;
            self.transition = None;
        }
        self.clamp_offset(world);
    }

    /// Map a screen point to world space.
    #[must_use]
    pub fn screen_to_world(&self, point: (f32, f32)) -> (f32, f32) {
        (
            point.0 / self.zoom + self.offset.0,
            point.1 / self.zoom + self.offset.1,
        )
    }

    /// Map a world point to screen space.
    #[must_use]
    pub fn world_to_screen(&self, point: (f32, f32)) -> (f32, f32) {
        (
            (point.0 - self.offset.0) * self.zoom,
            (point.1 - self.offset.1) * self.zoom,
        )
    }

    /// Publishable transform for the current frame.
    #[must_use]
    pub const fn transform(&self) -> CameraTransform {
        CameraTransform {
            offset_x: self.offset.0,
            offset_y: self.offset.1,
            zoom: self.zoom,
        }
    }

    fn clamp_offset(&mut self, world: (f32, f32)) {
        let Some((vw, vh)) = self.viewport else {
            return;
        };
        let max_x = (world.0 - vw / self.zoom).max(0.0);
        let max_y = (world.1 - vh / self.zoom).max(0.0);
        self.offset.0 = self.offset.0.clamp(0.0, max_x);
        self.offset.1 = self.offset.1.clamp(0.0, max_y);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WORLD: (f32, f32) = (4_000.0, 2_400.0);
    const VIEWPORT: (f32, f32) = (1_600.0, 900.0);

    fn measured_camera() -> Camera {
        let mut camera = Camera::new();
        camera.set_viewport(VIEWPORT.0, VIEWPORT.1, WORLD);
        camera
    }

    fn approx_eq(a: f32, b: f32, eps: f32) -> bool {
        (a - b).abs() <= eps
    }

    #[test]
    fn operations_before_viewport_are_noops() {
        let mut camera = Camera::new();
        camera.pan(100.0, 100.0, WORLD);
        camera.zoom_by(2.0, 0.4, 2.5, WORLD);
        assert_eq!(camera.offset(), (0.0, 0.0));
        assert!(approx_eq(camera.zoom(), 1.0, f32::EPSILON));
        assert!(camera.target_centred_on((10.0, 10.0), WORLD).is_none());
    }

    #[test]
    fn pan_clamps_to_world_bounds() {
        let mut camera = measured_camera();
        camera.pan(-500.0, -500.0, WORLD);
        assert_eq!(camera.offset(), (0.0, 0.0));

        camera.pan(1e6, 1e6, WORLD);
        let (ox, oy) = camera.offset();
        assert!(approx_eq(ox, WORLD.0 - VIEWPORT.0, 1e-3));
        assert!(approx_eq(oy, WORLD.1 - VIEWPORT.1, 1e-3));
    }

    #[test]
    fn zoom_keeps_viewport_centre_fixed() {
        let mut camera = measured_camera();
        camera.pan(800.0, 400.0, WORLD);
        let centre_before = camera.screen_to_world((VIEWPORT.0 * 0.5, VIEWPORT.1 * 0.5));
        camera.zoom_by(1.5, 0.4, 2.5, WORLD);
        let centre_after = camera.screen_to_world((VIEWPORT.0 * 0.5, VIEWPORT.1 * 0.5));
        assert!(approx_eq(centre_before.0, centre_after.0, 1e-2));
        assert!(approx_eq(centre_before.1, centre_after.1, 1e-2));
    }

    #[test]
    fn zoom_respects_configured_range() {
        let mut camera = measured_camera();
        camera.zoom_by(100.0, 0.4, 2.5, WORLD);
        assert!(approx_eq(camera.zoom(), 2.5, f32::EPSILON));
        camera.zoom_by(1e-6, 0.4, 2.5, WORLD);
        assert!(approx_eq(camera.zoom(), 0.4, f32::EPSILON));
    }

    #[test]
    fn round_trip_mapping_is_exact() {
        let mut camera = measured_camera();
        camera.pan(321.0, 123.0, WORLD);
        camera.zoom_by(1.3, 0.4, 2.5, WORLD);
        let world_point = (1_234.5, 678.9);
        let screen = camera.world_to_screen(world_point);
        let recovered = camera.screen_to_world(screen);
        assert!(approx_eq(world_point.0, recovered.0, 1e-3));
        assert!(approx_eq(world_point.1, recovered.1, 1e-3));
    }

    #[test]
    fn transition_converges_and_snaps() {
        let mut camera = measured_camera();
        camera.move_to(CameraTarget {
            x: 900.0,
            y: 500.0,
            zoom: 1.8,
        });
        for _ in 0..400 {
            camera.tick(0.12, 0.5, 0.005, WORLD);
            if !camera.in_transition() {
                break;
            }
        }
        assert!(!camera.in_transition(), "transition should snap");
        assert!(approx_eq(camera.offset().0, 900.0, 1e-3));
        assert!(approx_eq(camera.offset().1, 500.0, 1e-3));
        assert!(approx_eq(camera.zoom(), 1.8, 1e-3));
    }

    #[test]
    fn manual_pan_cancels_transition() {
        let mut camera = measured_camera();
        camera.move_to(CameraTarget {
            x: 900.0,
            y: 500.0,
            zoom: 1.8,
        });
        assert!(camera.in_transition());
        camera.pan(10.0, 0.0, WORLD);
        assert!(!camera.in_transition());
    }
}
