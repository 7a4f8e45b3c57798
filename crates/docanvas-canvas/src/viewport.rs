//! Viewport and coordinate transformation for the canvas.
//!
//! Handles conversion between screen coordinates (logical pixels, origin at
//! the top-left of the canvas) and world coordinates (the plane nodes and ink
//! are stored in). Every component that places or draws anything reads the
//! same [`ViewportTransform`].

use std::fmt;

use docanvas_core::ViewportError;
use serde::{Deserialize, Serialize};

use crate::model::{ScreenPoint, WorldPoint};

/// Serializable snapshot of the transform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportState {
    pub zoom: f64,
    pub pan_x: f64,
    pub pan_y: f64,
}

impl Default for ViewportState {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            pan_x: 0.0,
            pan_y: 0.0,
        }
    }
}

/// Pan offset plus uniform zoom.
///
/// ```text
/// screen = world * zoom + pan
/// world  = (screen - pan) / zoom
/// ```
///
/// `zoom` is always positive and finite; updates that would break that are
/// rejected and leave the transform untouched.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ViewportTransform {
    state: ViewportState,
}

impl ViewportTransform {
    /// Identity transform.
    pub fn new() -> Self {
        Self::default()
    }

    /// Transform with the given pan at zoom 1.
    pub fn with_pan(pan_x: f64, pan_y: f64) -> Self {
        Self {
            state: ViewportState {
                zoom: 1.0,
                pan_x,
                pan_y,
            },
        }
    }

    /// Build from a snapshot, validating it.
    pub fn from_state(state: ViewportState) -> Result<Self, ViewportError> {
        let mut viewport = Self::new();
        viewport.set_state(state)?;
        Ok(viewport)
    }

    pub fn state(&self) -> ViewportState {
        self.state
    }

    /// Gets the current zoom level (1.0 = 100%).
    pub fn zoom(&self) -> f64 {
        self.state.zoom
    }

    pub fn pan_x(&self) -> f64 {
        self.state.pan_x
    }

    pub fn pan_y(&self) -> f64 {
        self.state.pan_y
    }

    /// Replace the whole transform.
    pub fn set_state(&mut self, state: ViewportState) -> Result<(), ViewportError> {
        if !(state.zoom.is_finite() && state.zoom > 0.0) {
            return Err(ViewportError::InvalidZoom { zoom: state.zoom });
        }
        if !(state.pan_x.is_finite() && state.pan_y.is_finite()) {
            return Err(ViewportError::InvalidPan {
                x: state.pan_x,
                y: state.pan_y,
            });
        }
        self.state = state;
        Ok(())
    }

    /// Converts screen coordinates to world coordinates.
    pub fn to_world(&self, screen: ScreenPoint) -> WorldPoint {
        WorldPoint::new(
            (screen.x - self.state.pan_x) / self.state.zoom,
            (screen.y - self.state.pan_y) / self.state.zoom,
        )
    }

    /// Converts world coordinates to screen coordinates.
    pub fn to_screen(&self, world: WorldPoint) -> ScreenPoint {
        ScreenPoint::new(
            world.x * self.state.zoom + self.state.pan_x,
            world.y * self.state.zoom + self.state.pan_y,
        )
    }

    /// Converts a screen-space distance to world units.
    pub fn screen_delta_to_world(&self, dx: f64, dy: f64) -> (f64, f64) {
        (dx / self.state.zoom, dy / self.state.zoom)
    }

    /// Pans by a delta amount in screen pixels. No clamping.
    ///
    /// Returns false (and changes nothing) when a delta or the resulting pan
    /// is not finite.
    pub fn pan_by(&mut self, dx: f64, dy: f64) -> bool {
        let (pan_x, pan_y) = (self.state.pan_x + dx, self.state.pan_y + dy);
        if !(pan_x.is_finite() && pan_y.is_finite()) {
            tracing::debug!("Rejected pan delta ({}, {})", dx, dy);
            return false;
        }
        self.state.pan_x = pan_x;
        self.state.pan_y = pan_y;
        true
    }

    /// Zooms by `scale_factor` keeping the world point under `anchor` fixed.
    ///
    /// Returns false (and changes nothing) when the resulting zoom would not be
    /// positive and finite.
    pub fn zoom_at(&mut self, anchor: ScreenPoint, scale_factor: f64) -> bool {
        let new_zoom = self.state.zoom * scale_factor;
        if !(scale_factor.is_finite() && new_zoom.is_finite() && new_zoom > 0.0) {
            tracing::debug!("Rejected zoom factor {}", scale_factor);
            return false;
        }

        let world = self.to_world(anchor);
        self.state.zoom = new_zoom;
        self.state.pan_x = anchor.x - world.x * new_zoom;
        self.state.pan_y = anchor.y - world.y * new_zoom;
        true
    }

    /// Like [`zoom_at`](Self::zoom_at) but reports the rejection as an error.
    pub fn try_zoom_at(&mut self, anchor: ScreenPoint, scale_factor: f64) -> Result<(), ViewportError> {
        if self.zoom_at(anchor, scale_factor) {
            Ok(())
        } else {
            Err(ViewportError::InvalidScaleFactor {
                factor: scale_factor,
            })
        }
    }

    /// Resets viewport to the identity transform.
    pub fn reset(&mut self) {
        self.state = ViewportState::default();
    }
}

impl fmt::Display for ViewportTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Zoom: {:.2}x | Pan: ({:.1}, {:.1})",
            self.state.zoom, self.state.pan_x, self.state.pan_y
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let mut vp = ViewportTransform::with_pan(30.0, -12.0);
        vp.zoom_at(ScreenPoint::new(0.0, 0.0), 2.5);
        let world = WorldPoint::new(17.0, 42.0);
        let back = vp.to_world(vp.to_screen(world));
        assert!((back.x - world.x).abs() < 1e-9);
        assert!((back.y - world.y).abs() < 1e-9);
    }

    #[test]
    fn test_zoom_at_anchor() {
        let mut vp = ViewportTransform::new();
        assert!(vp.zoom_at(ScreenPoint::new(100.0, 100.0), 2.0));
        assert_eq!(vp.zoom(), 2.0);
        assert_eq!(vp.pan_x(), -100.0);
        assert_eq!(vp.pan_y(), -100.0);
        assert_eq!(
            vp.to_world(ScreenPoint::new(100.0, 100.0)),
            WorldPoint::new(100.0, 100.0)
        );
    }

    #[test]
    fn test_zoom_rejects_bad_factor() {
        let mut vp = ViewportTransform::new();
        assert!(!vp.zoom_at(ScreenPoint::new(1.0, 1.0), 0.0));
        assert!(!vp.zoom_at(ScreenPoint::new(1.0, 1.0), -2.0));
        assert!(!vp.zoom_at(ScreenPoint::new(1.0, 1.0), f64::NAN));
        assert!(!vp.zoom_at(ScreenPoint::new(1.0, 1.0), f64::INFINITY));
        assert_eq!(vp, ViewportTransform::new());
        assert!(matches!(
            vp.try_zoom_at(ScreenPoint::new(1.0, 1.0), 0.0),
            Err(ViewportError::InvalidScaleFactor { .. })
        ));
    }

    #[test]
    fn test_pan_unclamped() {
        let mut vp = ViewportTransform::new();
        vp.pan_by(-1e6, 5.0);
        vp.pan_by(0.0, 5.0);
        assert_eq!(vp.pan_x(), -1e6);
        assert_eq!(vp.pan_y(), 10.0);
    }

    #[test]
    fn test_pan_rejects_non_finite_delta() {
        let mut vp = ViewportTransform::with_pan(4.0, 8.0);
        assert!(!vp.pan_by(f64::NAN, 0.0));
        assert!(!vp.pan_by(0.0, f64::INFINITY));
        assert_eq!(
            vp.to_world(ScreenPoint::new(4.0, 8.0)),
            WorldPoint::new(0.0, 0.0)
        );
    }

    #[test]
    fn test_set_state_validates() {
        let mut vp = ViewportTransform::new();
        let bad = ViewportState {
            zoom: 0.0,
            ..Default::default()
        };
        assert!(vp.set_state(bad).is_err());
        assert!(ViewportTransform::from_state(ViewportState {
            zoom: 1.0,
            pan_x: f64::NAN,
            pan_y: 0.0
        })
        .is_err());
    }

    #[test]
    fn test_display() {
        let vp = ViewportTransform::with_pan(5.0, 6.0);
        assert_eq!(vp.to_string(), "Zoom: 1.00x | Pan: (5.0, 6.0)");
    }
}
