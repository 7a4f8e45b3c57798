//! Curved connectors from knowledge nodes to their source fragments.
//!
//! Routing is total: every call recomputes all wires from the current node
//! positions, fragment layout and viewport. Nodes whose fragment is not laid
//! out get no wire.

use std::collections::HashMap;
use std::fmt::Write as _;

use docanvas_settings::WireSettings;
use lyon::geom::{point, CubicBezierSegment};
use uuid::Uuid;

use crate::model::{ScreenPoint, ScreenRect, WorldPoint};
use crate::nodes::NodeGraph;
use crate::viewport::ViewportTransform;

/// Looks up where a fragment currently sits on screen.
pub trait FragmentResolver: Send + Sync {
    fn resolve_fragment(&self, fragment_id: &str) -> Option<ScreenRect>;
}

impl FragmentResolver for HashMap<String, ScreenRect> {
    fn resolve_fragment(&self, fragment_id: &str) -> Option<ScreenRect> {
        self.get(fragment_id).copied()
    }
}

/// Resolver with no fragments laid out.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFragments;

impl FragmentResolver for NoFragments {
    fn resolve_fragment(&self, _fragment_id: &str) -> Option<ScreenRect> {
        None
    }
}

/// One routed wire, in screen coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Wire {
    pub node_id: Uuid,
    pub fragment_id: String,
    pub curve: CubicBezierSegment<f64>,
}

impl Wire {
    pub fn start(&self) -> ScreenPoint {
        ScreenPoint::new(self.curve.from.x, self.curve.from.y)
    }

    pub fn end(&self) -> ScreenPoint {
        ScreenPoint::new(self.curve.to.x, self.curve.to.y)
    }

    /// SVG path data: `M x1,y1 C c1x,c1y c2x,c2y x2,y2`.
    pub fn to_svg_path(&self) -> String {
        let c = &self.curve;
        let mut d = String::new();
        let _ = write!(
            d,
            "M {},{} C {},{} {},{} {},{}",
            c.from.x, c.from.y, c.ctrl1.x, c.ctrl1.y, c.ctrl2.x, c.ctrl2.y, c.to.x, c.to.y
        );
        d
    }
}

/// Computes wires for a node graph.
#[derive(Debug, Clone)]
pub struct WireRouter {
    node_offset: f64,
    fragment_offset: f64,
    wires: Vec<Wire>,
    route_count: u64,
}

impl Default for WireRouter {
    fn default() -> Self {
        Self::new(&WireSettings::default())
    }
}

impl WireRouter {
    pub fn new(settings: &WireSettings) -> Self {
        Self {
            node_offset: settings.node_offset,
            fragment_offset: settings.fragment_offset,
            wires: Vec::new(),
            route_count: 0,
        }
    }

    pub fn wires(&self) -> &[Wire] {
        &self.wires
    }

    pub fn route_count(&self) -> u64 {
        self.route_count
    }

    /// Recompute every wire.
    pub fn route(
        &mut self,
        graph: &NodeGraph,
        viewport: &ViewportTransform,
        resolver: &dyn FragmentResolver,
    ) -> &[Wire] {
        self.wires.clear();
        for node in graph.nodes() {
            let Some(rect) = resolver.resolve_fragment(&node.source_fragment_id) else {
                continue;
            };
            let Some(start) = graph.marker_center(node.id) else {
                continue;
            };
            let end = viewport.to_world(rect.left_mid());
            let c1 = WorldPoint::new(start.x + self.node_offset, start.y);
            let c2 = WorldPoint::new(end.x - self.fragment_offset, end.y);

            let to_screen = |p: WorldPoint| {
                let s = viewport.to_screen(p);
                point(s.x, s.y)
            };
            self.wires.push(Wire {
                node_id: node.id,
                fragment_id: node.source_fragment_id.clone(),
                curve: CubicBezierSegment {
                    from: to_screen(start),
                    ctrl1: to_screen(c1),
                    ctrl2: to_screen(c2),
                    to: to_screen(end),
                },
            });
        }
        self.route_count += 1;
        tracing::trace!("Routed {} wires", self.wires.len());
        &self.wires
    }
}
