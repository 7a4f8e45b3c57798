use docanvas_canvas::gestures::{ActiveGesture, GestureDispatcher, GestureOutcome, GestureTargets};
use docanvas_canvas::input::{Modifiers, PointerEvent, PointerKind, WheelEvent};
use docanvas_canvas::model::{ScreenPoint, WorldPoint};
use docanvas_canvas::nodes::NodeGraph;
use docanvas_canvas::strokes::{StrokeOutcome, StrokeStore, Tool};
use docanvas_canvas::viewport::ViewportTransform;
use docanvas_core::DocumentId;

struct Canvas {
    viewport: ViewportTransform,
    strokes: StrokeStore,
    nodes: NodeGraph,
    gestures: GestureDispatcher,
}

impl Canvas {
    fn new() -> Self {
        Self {
            viewport: ViewportTransform::new(),
            strokes: StrokeStore::new(),
            nodes: NodeGraph::new(DocumentId::new("doc"), 28.0),
            gestures: GestureDispatcher::default(),
        }
    }

    fn pointer(&mut self, event: PointerEvent) -> GestureOutcome {
        let mut targets = GestureTargets {
            viewport: &mut self.viewport,
            strokes: &mut self.strokes,
            nodes: &mut self.nodes,
        };
        self.gestures.handle_pointer(&event, &mut targets)
    }

    fn wheel(&mut self, event: WheelEvent) -> GestureOutcome {
        let mut targets = GestureTargets {
            viewport: &mut self.viewport,
            strokes: &mut self.strokes,
            nodes: &mut self.nodes,
        };
        self.gestures.handle_wheel(&event, &mut targets)
    }
}

#[test]
fn test_pinch_zoom_keeps_midpoint_content() {
    let mut canvas = Canvas::new();
    canvas.pointer(PointerEvent::touch(1, PointerKind::Down, 90.0, 100.0));
    canvas.pointer(PointerEvent::touch(2, PointerKind::Down, 110.0, 100.0));
    assert!(matches!(canvas.gestures.active(), ActiveGesture::Pinch { .. }));

    canvas.pointer(PointerEvent::touch(1, PointerKind::Move, 80.0, 100.0));
    canvas.pointer(PointerEvent::touch(2, PointerKind::Move, 120.0, 100.0));

    assert!((canvas.viewport.zoom() - 2.0).abs() < 1e-9);
    let world = canvas.viewport.to_world(ScreenPoint::new(100.0, 100.0));
    assert!((world.x - 100.0).abs() < 1e-9);
    assert!((world.y - 100.0).abs() < 1e-9);

    canvas.pointer(PointerEvent::touch(2, PointerKind::Up, 120.0, 100.0));
    assert!(canvas.gestures.is_idle());
}

#[test]
fn test_tool_beats_node_hit() {
    let mut canvas = Canvas::new();
    canvas
        .nodes
        .create_node("p-1", WorldPoint::new(0.0, 0.0), vec![], "");
    canvas.strokes.select_tool(Tool::Pen);

    assert_eq!(
        canvas.pointer(PointerEvent::mouse(PointerKind::Down, 10.0, 10.0)),
        GestureOutcome::StrokeStarted
    );
    canvas.pointer(PointerEvent::mouse(PointerKind::Move, 40.0, 10.0));
    assert_eq!(
        canvas.pointer(PointerEvent::mouse(PointerKind::Up, 40.0, 10.0)),
        GestureOutcome::StrokeFinished(StrokeOutcome::Committed)
    );
    assert_eq!(canvas.nodes.nodes()[0].position(), WorldPoint::new(0.0, 0.0));
}

#[test]
fn test_node_drag_then_background_pan() {
    let mut canvas = Canvas::new();
    let node = canvas
        .nodes
        .create_node("p-1", WorldPoint::new(0.0, 0.0), vec![], "");
    canvas.viewport.zoom_at(ScreenPoint::new(0.0, 0.0), 2.0);

    canvas.pointer(PointerEvent::mouse(PointerKind::Down, 20.0, 20.0));
    assert_eq!(
        canvas.pointer(PointerEvent::mouse(PointerKind::Move, 40.0, 60.0)),
        GestureOutcome::NodeMoved(node.id)
    );
    assert_eq!(
        canvas.pointer(PointerEvent::mouse(PointerKind::Up, 40.0, 60.0)),
        GestureOutcome::NodeReleased(node.id)
    );
    // Screen delta (20, 40) at zoom 2 is world (10, 20).
    assert_eq!(canvas.nodes.nodes()[0].position(), WorldPoint::new(10.0, 20.0));
    assert_eq!(canvas.viewport.pan_x(), 0.0);

    canvas.pointer(PointerEvent::mouse(PointerKind::Down, 500.0, 500.0));
    canvas.pointer(PointerEvent::mouse(PointerKind::Move, 520.0, 490.0));
    canvas.pointer(PointerEvent::mouse(PointerKind::Leave, 520.0, 490.0));
    assert_eq!(canvas.viewport.pan_x(), 20.0);
    assert_eq!(canvas.viewport.pan_y(), -10.0);
    assert!(canvas.gestures.is_idle());
}

#[test]
fn test_wheel_zoom_and_scroll() {
    let mut canvas = Canvas::new();
    let anchor = ScreenPoint::new(200.0, 150.0);
    let before = canvas.viewport.to_world(anchor);

    assert_eq!(
        canvas.wheel(WheelEvent::new(200.0, 150.0, -100.0, Modifiers::CTRL)),
        GestureOutcome::ViewportChanged
    );
    assert!(canvas.viewport.zoom() > 1.0);
    let after = canvas.viewport.to_world(anchor);
    assert!((before.x - after.x).abs() < 1e-9);
    assert!((before.y - after.y).abs() < 1e-9);

    let pan_y = canvas.viewport.pan_y();
    canvas.wheel(WheelEvent::new(0.0, 0.0, 30.0, Modifiers::NONE));
    assert_eq!(canvas.viewport.pan_y(), pan_y - 30.0);

    canvas.strokes.select_tool(Tool::Eraser);
    let state = canvas.viewport.state();
    assert_eq!(
        canvas.wheel(WheelEvent::new(0.0, 0.0, 30.0, Modifiers::META)),
        GestureOutcome::Ignored
    );
    assert_eq!(canvas.viewport.state(), state);
}
