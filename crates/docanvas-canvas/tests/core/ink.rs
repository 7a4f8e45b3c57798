use docanvas_canvas::model::{ScreenPoint, WorldPoint};
use docanvas_canvas::strokes::{Stroke, StrokeOutcome, StrokeStore, Tool};
use docanvas_canvas::surface::DrawingSurface;
use docanvas_canvas::viewport::ViewportTransform;
use proptest::prelude::*;

fn draw(store: &mut StrokeStore, from: (f64, f64), to: (f64, f64)) {
    store.begin(WorldPoint::new(from.0, from.1)).unwrap();
    store.extend(WorldPoint::new(to.0, to.1));
    assert_eq!(store.end(), StrokeOutcome::Committed);
}

fn is_red(px: Option<[u8; 4]>) -> bool {
    matches!(px, Some([r, g, b, a]) if r > 200 && g < 50 && b < 50 && a > 200)
}

#[test]
fn test_ink_is_anchored_to_world() {
    let mut store = StrokeStore::new();
    store.select_tool(Tool::Pen);
    draw(&mut store, (10.0, 50.0), (90.0, 50.0));

    let mut surface = DrawingSurface::new(300.0, 200.0, 1.0).unwrap();
    let mut vp = ViewportTransform::new();
    vp.zoom_at(ScreenPoint::new(0.0, 0.0), 2.0);
    surface.render(&vp, &store);
    assert!(is_red(surface.pixel(100, 100)));
    assert!(!is_red(surface.pixel(100, 60)));

    vp.pan_by(50.0, 0.0);
    surface.render(&vp, &store);
    assert!(is_red(surface.pixel(150, 100)));
    assert!(!is_red(surface.pixel(40, 100)));
}

#[test]
fn test_undo_scenarios() {
    let mut store = StrokeStore::new();
    store.select_tool(Tool::Pen);
    draw(&mut store, (0.0, 0.0), (1.0, 1.0));
    draw(&mut store, (2.0, 2.0), (3.0, 3.0));
    let second = store.strokes()[1].clone();

    assert!(store.undo());
    assert_eq!(store.strokes().len(), 1);
    assert_eq!(store.redo_buffer(), &[second.clone()]);

    assert!(store.redo());
    assert_eq!(store.strokes().len(), 2);
    assert_eq!(store.strokes()[1], second);
    assert!(!store.can_redo());

    // New ink after an undo forgets the redo history.
    assert!(store.undo());
    draw(&mut store, (5.0, 5.0), (6.0, 6.0));
    assert!(!store.can_redo());
    assert!(!store.redo());
    assert_eq!(store.strokes().len(), 2);
}

#[test]
fn test_loaded_degenerate_strokes_are_dropped() {
    let mut store = StrokeStore::new();
    let dot = Stroke::new(
        Tool::Pen,
        Default::default(),
        5.0,
        vec![WorldPoint::new(1.0, 1.0)],
    );
    let line = Stroke::new(
        Tool::Pen,
        Default::default(),
        5.0,
        vec![WorldPoint::new(1.0, 1.0), WorldPoint::new(2.0, 2.0)],
    );
    store.load(vec![dot, line.clone()]);
    assert_eq!(store.strokes(), &[line]);
}

proptest! {
    #[test]
    fn undo_then_redo_is_identity(commits in 1usize..8, undos in 0usize..10) {
        let mut store = StrokeStore::new();
        store.select_tool(Tool::Highlighter);
        for i in 0..commits {
            let x = i as f64;
            draw(&mut store, (x, 0.0), (x, 10.0));
        }
        let before = store.strokes().to_vec();
        let mut undone = 0;
        for _ in 0..undos {
            if store.undo() {
                undone += 1;
            }
        }
        prop_assert_eq!(undone, undos.min(commits));
        for _ in 0..undone {
            prop_assert!(store.redo());
        }
        prop_assert_eq!(store.strokes(), before.as_slice());
        prop_assert!(!store.can_redo());
    }
}

#[test]
fn test_undo_across_tools() {
    let mut store = StrokeStore::new();
    store.select_tool(Tool::Pen);
    store.begin(WorldPoint::new(0.0, 0.0)).unwrap();
    store.extend(WorldPoint::new(1.0, 0.0));
    store.extend(WorldPoint::new(2.0, 0.0));
    store.end();
    let a = store.strokes()[0].clone();

    store.select_tool(Tool::Eraser);
    draw(&mut store, (0.0, 0.0), (2.0, 0.0));
    let b = store.strokes()[1].clone();
    assert_eq!(b.tool, Tool::Eraser);

    store.undo();
    assert_eq!(store.strokes(), &[a.clone()]);
    assert_eq!(store.redo_buffer(), &[b.clone()]);

    store.undo();
    assert!(store.strokes().is_empty());
    assert_eq!(store.redo_buffer(), &[b, a]);

    draw(&mut store, (9.0, 9.0), (10.0, 10.0));
    assert_eq!(store.strokes().len(), 1);
    assert!(store.redo_buffer().is_empty());
}
