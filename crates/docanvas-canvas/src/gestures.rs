//! Gesture state machines and the dispatcher that owns them.
//!
//! At most one gesture is active at a time. A pointer-down on an idle canvas
//! picks the gesture: an active drawing tool captures it as a stroke, a node
//! marker under the pointer starts a drag, anything else pans. A second touch
//! while one-finger panning turns the gesture into a pinch. Events from
//! pointers that do not drive the active gesture are ignored.

use uuid::Uuid;

use crate::input::{PointerEvent, PointerKind, PointerType, WheelEvent};
use crate::model::ScreenPoint;
use crate::nodes::NodeGraph;
use crate::strokes::{StrokeOutcome, StrokeStore};
use crate::viewport::ViewportTransform;

/// State the dispatcher mutates.
pub struct GestureTargets<'a> {
    pub viewport: &'a mut ViewportTransform,
    pub strokes: &'a mut StrokeStore,
    pub nodes: &'a mut NodeGraph,
}

/// One finger of a pinch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Touch {
    pub pointer_id: u64,
    pub position: ScreenPoint,
}

/// The gesture in progress.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ActiveGesture {
    Idle,
    Pan {
        pointer_id: u64,
        last: ScreenPoint,
    },
    NodeDrag {
        pointer_id: u64,
        node_id: Uuid,
        last: ScreenPoint,
    },
    Stroke {
        pointer_id: u64,
    },
    Pinch {
        first: Touch,
        second: Touch,
    },
}

/// What a handled event changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureOutcome {
    /// Nothing changed.
    Ignored,
    /// A gesture started without changing state yet.
    Started,
    ViewportChanged,
    StrokeStarted,
    StrokeExtended,
    StrokeFinished(StrokeOutcome),
    NodeMoved(Uuid),
    /// Drag finished; the node should be persisted.
    NodeReleased(Uuid),
}

/// Routes pointer and wheel input to exactly one gesture.
#[derive(Debug, Clone)]
pub struct GestureDispatcher {
    active: ActiveGesture,
    wheel_zoom_sensitivity: f64,
}

impl Default for GestureDispatcher {
    fn default() -> Self {
        Self::new(0.001)
    }
}

impl GestureDispatcher {
    pub fn new(wheel_zoom_sensitivity: f64) -> Self {
        Self {
            active: ActiveGesture::Idle,
            wheel_zoom_sensitivity,
        }
    }

    pub fn active(&self) -> ActiveGesture {
        self.active
    }

    pub fn is_idle(&self) -> bool {
        self.active == ActiveGesture::Idle
    }

    /// Abandon the current gesture, discarding an in-progress stroke.
    pub fn reset(&mut self, targets: &mut GestureTargets<'_>) {
        if matches!(self.active, ActiveGesture::Stroke { .. }) {
            targets.strokes.cancel();
        }
        self.active = ActiveGesture::Idle;
    }

    fn transition(&mut self, next: ActiveGesture) {
        tracing::debug!("Gesture {:?} -> {:?}", self.active, next);
        self.active = next;
    }

    pub fn handle_pointer(
        &mut self,
        event: &PointerEvent,
        targets: &mut GestureTargets<'_>,
    ) -> GestureOutcome {
        match self.active {
            ActiveGesture::Idle => self.on_idle(event, targets),
            ActiveGesture::Stroke { pointer_id } => {
                if event.pointer_id != pointer_id {
                    return GestureOutcome::Ignored;
                }
                match event.kind {
                    PointerKind::Move => {
                        let p = targets.viewport.to_world(event.position);
                        if targets.strokes.extend(p) {
                            GestureOutcome::StrokeExtended
                        } else {
                            GestureOutcome::Ignored
                        }
                    }
                    kind if kind.is_release() => {
                        self.transition(ActiveGesture::Idle);
                        GestureOutcome::StrokeFinished(targets.strokes.end())
                    }
                    _ => GestureOutcome::Ignored,
                }
            }
            ActiveGesture::NodeDrag {
                pointer_id,
                node_id,
                last,
            } => {
                if event.pointer_id != pointer_id {
                    return GestureOutcome::Ignored;
                }
                match event.kind {
                    PointerKind::Move => {
                        let (dx, dy) = targets
                            .viewport
                            .screen_delta_to_world(event.position.x - last.x, event.position.y - last.y);
                        self.active = ActiveGesture::NodeDrag {
                            pointer_id,
                            node_id,
                            last: event.position,
                        };
                        match targets.nodes.translate_node(node_id, dx, dy) {
                            Ok(_) => GestureOutcome::NodeMoved(node_id),
                            Err(e) => {
                                tracing::debug!("Dragged node vanished: {}", e);
                                self.transition(ActiveGesture::Idle);
                                GestureOutcome::Ignored
                            }
                        }
                    }
                    kind if kind.is_release() => {
                        self.transition(ActiveGesture::Idle);
                        GestureOutcome::NodeReleased(node_id)
                    }
                    _ => GestureOutcome::Ignored,
                }
            }
            ActiveGesture::Pan { pointer_id, last } => {
                if event.pointer_id != pointer_id {
                    return self.maybe_start_pinch(event, pointer_id, last);
                }
                match event.kind {
                    PointerKind::Move => {
                        let moved = targets
                            .viewport
                            .pan_by(event.position.x - last.x, event.position.y - last.y);
                        if !moved {
                            return GestureOutcome::Ignored;
                        }
                        self.active = ActiveGesture::Pan {
                            pointer_id,
                            last: event.position,
                        };
                        GestureOutcome::ViewportChanged
                    }
                    kind if kind.is_release() => {
                        self.transition(ActiveGesture::Idle);
                        GestureOutcome::Ignored
                    }
                    _ => GestureOutcome::Ignored,
                }
            }
            ActiveGesture::Pinch { first, second } => self.on_pinch(event, first, second, targets),
        }
    }

    fn on_idle(&mut self, event: &PointerEvent, targets: &mut GestureTargets<'_>) -> GestureOutcome {
        if event.kind != PointerKind::Down {
            return GestureOutcome::Ignored;
        }
        let world = targets.viewport.to_world(event.position);

        if targets.strokes.active_tool().is_some() {
            return match targets.strokes.begin(world) {
                Ok(()) => {
                    self.transition(ActiveGesture::Stroke {
                        pointer_id: event.pointer_id,
                    });
                    GestureOutcome::StrokeStarted
                }
                Err(e) => {
                    tracing::debug!("Stroke not started: {}", e);
                    GestureOutcome::Ignored
                }
            };
        }

        if let Some(node_id) = targets.nodes.hit_test(world) {
            self.transition(ActiveGesture::NodeDrag {
                pointer_id: event.pointer_id,
                node_id,
                last: event.position,
            });
            return GestureOutcome::Started;
        }

        self.transition(ActiveGesture::Pan {
            pointer_id: event.pointer_id,
            last: event.position,
        });
        GestureOutcome::Started
    }

    fn maybe_start_pinch(&mut self, event: &PointerEvent, pointer_id: u64, last: ScreenPoint) -> GestureOutcome {
        if event.kind != PointerKind::Down || event.pointer_type != PointerType::Touch {
            return GestureOutcome::Ignored;
        }
        self.transition(ActiveGesture::Pinch {
            first: Touch {
                pointer_id,
                position: last,
            },
            second: Touch {
                pointer_id: event.pointer_id,
                position: event.position,
            },
        });
        GestureOutcome::Started
    }

    fn on_pinch(
        &mut self,
        event: &PointerEvent,
        first: Touch,
        second: Touch,
        targets: &mut GestureTargets<'_>,
    ) -> GestureOutcome {
        let (mut moved_first, mut moved_second) = (first, second);
        if event.pointer_id == first.pointer_id {
            moved_first.position = event.position;
        } else if event.pointer_id == second.pointer_id {
            moved_second.position = event.position;
        } else {
            return GestureOutcome::Ignored;
        }

        if event.kind.is_release() {
            self.transition(ActiveGesture::Idle);
            return GestureOutcome::Ignored;
        }
        if event.kind != PointerKind::Move {
            return GestureOutcome::Ignored;
        }

        let prev_mid = first.position.midpoint(&second.position);
        let prev_dist = first.position.distance_to(&second.position);
        let mid = moved_first.position.midpoint(&moved_second.position);
        let dist = moved_first.position.distance_to(&moved_second.position);

        targets.viewport.pan_by(mid.x - prev_mid.x, mid.y - prev_mid.y);
        if prev_dist > 0.0 && dist > 0.0 {
            targets.viewport.zoom_at(mid, dist / prev_dist);
        }
        self.active = ActiveGesture::Pinch {
            first: moved_first,
            second: moved_second,
        };
        GestureOutcome::ViewportChanged
    }

    /// Modifier+wheel zooms around the cursor; plain wheel scrolls vertically.
    /// Ignored while a drawing tool is active.
    pub fn handle_wheel(&mut self, event: &WheelEvent, targets: &mut GestureTargets<'_>) -> GestureOutcome {
        if targets.strokes.active_tool().is_some() {
            return GestureOutcome::Ignored;
        }
        if event.modifiers.command() {
            let factor = (-event.delta_y * self.wheel_zoom_sensitivity).exp();
            if targets.viewport.zoom_at(event.position, factor) {
                GestureOutcome::ViewportChanged
            } else {
                GestureOutcome::Ignored
            }
        } else {
            if targets.viewport.pan_by(0.0, -event.delta_y) {
                GestureOutcome::ViewportChanged
            } else {
                GestureOutcome::Ignored
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::Modifiers;
    use crate::model::WorldPoint;
    use crate::strokes::Tool;
    use docanvas_core::DocumentId;

    struct Fixture {
        viewport: ViewportTransform,
        strokes: StrokeStore,
        nodes: NodeGraph,
        dispatcher: GestureDispatcher,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                viewport: ViewportTransform::new(),
                strokes: StrokeStore::new(),
                nodes: NodeGraph::new(DocumentId::new("d"), 28.0),
                dispatcher: GestureDispatcher::default(),
            }
        }

        fn pointer(&mut self, event: PointerEvent) -> GestureOutcome {
            let mut targets = GestureTargets {
                viewport: &mut self.viewport,
                strokes: &mut self.strokes,
                nodes: &mut self.nodes,
            };
            self.dispatcher.handle_pointer(&event, &mut targets)
        }

        fn wheel(&mut self, event: WheelEvent) -> GestureOutcome {
            let mut targets = GestureTargets {
                viewport: &mut self.viewport,
                strokes: &mut self.strokes,
                nodes: &mut self.nodes,
            };
            self.dispatcher.handle_wheel(&event, &mut targets)
        }
    }

    #[test]
    fn test_mouse_drag_pans() {
        let mut f = Fixture::new();
        assert_eq!(f.pointer(PointerEvent::mouse(PointerKind::Down, 10.0, 10.0)), GestureOutcome::Started);
        assert_eq!(
            f.pointer(PointerEvent::mouse(PointerKind::Move, 30.0, 5.0)),
            GestureOutcome::ViewportChanged
        );
        f.pointer(PointerEvent::mouse(PointerKind::Up, 30.0, 5.0));
        assert_eq!(f.viewport.pan_x(), 20.0);
        assert_eq!(f.viewport.pan_y(), -5.0);
        assert!(f.dispatcher.is_idle());
    }

    #[test]
    fn test_tool_captures_pointer() {
        let mut f = Fixture::new();
        f.nodes.create_node("p", WorldPoint::new(0.0, 0.0), vec![], "");
        f.strokes.select_tool(Tool::Pen);
        assert_eq!(f.pointer(PointerEvent::mouse(PointerKind::Down, 5.0, 5.0)), GestureOutcome::StrokeStarted);
        f.pointer(PointerEvent::mouse(PointerKind::Move, 50.0, 50.0));
        assert_eq!(
            f.pointer(PointerEvent::mouse(PointerKind::Leave, 50.0, 50.0)),
            GestureOutcome::StrokeFinished(StrokeOutcome::Committed)
        );
        assert_eq!(f.nodes.nodes()[0].position(), WorldPoint::new(0.0, 0.0));
        assert_eq!(f.viewport, ViewportTransform::new());
    }

    #[test]
    fn test_node_drag_divides_by_zoom() {
        let mut f = Fixture::new();
        f.viewport.zoom_at(ScreenPoint::new(0.0, 0.0), 2.0);
        let node = f.nodes.create_node("p", WorldPoint::new(10.0, 10.0), vec![], "");
        f.pointer(PointerEvent::mouse(PointerKind::Down, 30.0, 30.0));
        assert_eq!(
            f.pointer(PointerEvent::mouse(PointerKind::Move, 50.0, 40.0)),
            GestureOutcome::NodeMoved(node.id)
        );
        assert_eq!(
            f.pointer(PointerEvent::mouse(PointerKind::Up, 50.0, 40.0)),
            GestureOutcome::NodeReleased(node.id)
        );
        assert_eq!(f.nodes.get(node.id).map(|n| n.position()), Some(WorldPoint::new(20.0, 15.0)));
    }

    #[test]
    fn test_other_pointers_ignored_during_stroke() {
        let mut f = Fixture::new();
        f.strokes.select_tool(Tool::Pen);
        f.pointer(PointerEvent::touch(1, PointerKind::Down, 5.0, 5.0));
        assert_eq!(
            f.pointer(PointerEvent::touch(2, PointerKind::Down, 50.0, 5.0)),
            GestureOutcome::Ignored
        );
        assert!(matches!(f.dispatcher.active(), ActiveGesture::Stroke { pointer_id: 1 }));
    }

    #[test]
    fn test_wheel() {
        let mut f = Fixture::new();
        f.wheel(WheelEvent::new(0.0, 0.0, 40.0, Modifiers::NONE));
        assert_eq!(f.viewport.pan_y(), -40.0);
        assert_eq!(f.viewport.zoom(), 1.0);

        f.wheel(WheelEvent::new(100.0, 100.0, -100.0, Modifiers::CTRL));
        assert!((f.viewport.zoom() - (0.1f64).exp()).abs() < 1e-12);

        f.strokes.select_tool(Tool::Pen);
        let before = f.viewport.clone();
        assert_eq!(
            f.wheel(WheelEvent::new(0.0, 0.0, 40.0, Modifiers::CTRL)),
            GestureOutcome::Ignored
        );
        assert_eq!(f.viewport, before);
    }
}
