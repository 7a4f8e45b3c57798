use std::collections::HashMap;

use docanvas_canvas::model::{ScreenPoint, ScreenRect, WorldPoint};
use docanvas_canvas::nodes::NodeGraph;
use docanvas_canvas::viewport::ViewportTransform;
use docanvas_canvas::wires::WireRouter;
use docanvas_core::DocumentId;

#[test]
fn test_only_laid_out_fragments_get_wires() {
    let mut graph = NodeGraph::new(DocumentId::new("doc"), 28.0);
    let a = graph.create_node("p-1", WorldPoint::new(0.0, 0.0), vec![], "");
    graph.create_node("p-2", WorldPoint::new(100.0, 0.0), vec![], "");
    let c = graph.create_node("p-3", WorldPoint::new(200.0, 0.0), vec![], "");

    let mut layout = HashMap::new();
    layout.insert("p-1".to_string(), ScreenRect::new(500.0, 10.0, 100.0, 20.0));
    layout.insert("p-3".to_string(), ScreenRect::new(500.0, 60.0, 100.0, 20.0));

    let mut router = WireRouter::default();
    let ids: Vec<_> = router
        .route(&graph, &ViewportTransform::new(), &layout)
        .iter()
        .map(|w| w.node_id)
        .collect();
    assert_eq!(ids, vec![a.id, c.id]);
}

#[test]
fn test_wires_follow_pan() {
    let mut graph = NodeGraph::new(DocumentId::new("doc"), 28.0);
    graph.create_node("p-1", WorldPoint::new(0.0, 0.0), vec![], "");
    let mut layout = HashMap::new();
    layout.insert("p-1".to_string(), ScreenRect::new(500.0, 100.0, 100.0, 40.0));

    let mut vp = ViewportTransform::new();
    vp.pan_by(30.0, 0.0);
    let mut router = WireRouter::default();
    let wire = router.route(&graph, &vp, &layout)[0].clone();

    // Marker moves with the plane, the fragment end stays where the document put it.
    assert_eq!(wire.start(), ScreenPoint::new(44.0, 14.0));
    assert_eq!(wire.end(), ScreenPoint::new(500.0, 120.0));
}
