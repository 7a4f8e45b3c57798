use docanvas_canvas::model::ScreenPoint;
use docanvas_canvas::viewport::ViewportTransform;
use proptest::prelude::*;

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-6 * a.abs().max(b.abs()).max(1.0)
}

proptest! {
    #[test]
    fn zoom_keeps_anchor_fixed(
        pan_x in -2000.0f64..2000.0,
        pan_y in -2000.0f64..2000.0,
        ax in 0.0f64..1920.0,
        ay in 0.0f64..1080.0,
        s in 0.1f64..10.0,
    ) {
        let mut vp = ViewportTransform::with_pan(pan_x, pan_y);
        let anchor = ScreenPoint::new(ax, ay);
        let before = vp.to_world(anchor);
        prop_assert!(vp.zoom_at(anchor, s));
        let after = vp.to_world(anchor);
        prop_assert!(approx(before.x, after.x), "{} vs {}", before.x, after.x);
        prop_assert!(approx(before.y, after.y), "{} vs {}", before.y, after.y);
    }

    #[test]
    fn screen_world_round_trip(
        sx in -5000.0f64..5000.0,
        sy in -5000.0f64..5000.0,
        s in 0.05f64..20.0,
    ) {
        let mut vp = ViewportTransform::with_pan(37.0, -12.0);
        vp.zoom_at(ScreenPoint::new(400.0, 300.0), s);
        let screen = ScreenPoint::new(sx, sy);
        let back = vp.to_screen(vp.to_world(screen));
        prop_assert!(approx(back.x, sx));
        prop_assert!(approx(back.y, sy));
    }
}

#[test]
fn test_zoom_in_then_out_restores_state() {
    let mut vp = ViewportTransform::with_pan(10.0, 20.0);
    let anchor = ScreenPoint::new(300.0, 200.0);
    assert!(vp.zoom_at(anchor, 4.0));
    assert!(vp.zoom_at(anchor, 0.25));
    assert!(approx(vp.zoom(), 1.0));
    assert!(approx(vp.pan_x(), 10.0));
    assert!(approx(vp.pan_y(), 20.0));
}

#[test]
fn test_rejected_factors_leave_state_unchanged() {
    let mut vp = ViewportTransform::with_pan(5.0, 5.0);
    let before = vp.state();
    for s in [0.0, -1.0, f64::NAN, f64::INFINITY] {
        assert!(!vp.zoom_at(ScreenPoint::new(1.0, 1.0), s));
    }
    assert_eq!(vp.state(), before);
}
