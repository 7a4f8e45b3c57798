//! Knowledge nodes pinned to document fragments.
//!
//! A node is a square marker on the world plane carrying the conversation
//! that was had about one fragment. Its stored position is the marker's
//! top-left corner.

use docanvas_core::{DocumentId, NodeError};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::conversation::ChatMessage;
use crate::model::{ScreenRect, WorldPoint};
use crate::viewport::ViewportTransform;

/// Stored marker position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CanvasPosition {
    pub x: f64,
    pub y: f64,
    #[serde(default = "default_zoom_level")]
    pub zoom_level: f64,
}

fn default_zoom_level() -> f64 {
    1.0
}

impl CanvasPosition {
    /// Position recorded at the zoom the node was created under.
    pub fn at_zoom(p: WorldPoint, zoom_level: f64) -> Self {
        Self {
            x: p.x,
            y: p.y,
            zoom_level,
        }
    }
}

impl From<WorldPoint> for CanvasPosition {
    fn from(p: WorldPoint) -> Self {
        Self::at_zoom(p, default_zoom_level())
    }
}

/// Stores written by older clients carry `null` for a missing snapshot.
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// A conversation anchored to a fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeNode {
    #[serde(rename = "node_id")]
    pub id: Uuid,
    pub document_id: DocumentId,
    #[serde(rename = "source_element_id")]
    pub source_fragment_id: String,
    #[serde(rename = "canvas_position")]
    pub position: CanvasPosition,
    #[serde(rename = "conversation_log", default)]
    pub conversation: Vec<ChatMessage>,
    #[serde(default)]
    pub user_annotations: Option<serde_json::Value>,
    #[serde(
        rename = "source_element_html",
        default,
        deserialize_with = "null_as_empty"
    )]
    pub source_fragment_snapshot: String,
}

impl KnowledgeNode {
    pub fn position(&self) -> WorldPoint {
        WorldPoint::new(self.position.x, self.position.y)
    }

    fn set_position(&mut self, p: WorldPoint) {
        self.position.x = p.x;
        self.position.y = p.y;
    }
}

/// The nodes of one document.
#[derive(Debug, Clone)]
pub struct NodeGraph {
    document_id: DocumentId,
    nodes: Vec<KnowledgeNode>,
    marker_size: f64,
}

impl NodeGraph {
    pub fn new(document_id: DocumentId, marker_size: f64) -> Self {
        Self {
            document_id,
            nodes: Vec::new(),
            marker_size,
        }
    }

    pub fn document_id(&self) -> &DocumentId {
        &self.document_id
    }

    pub fn marker_size(&self) -> f64 {
        self.marker_size
    }

    pub fn nodes(&self) -> &[KnowledgeNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: Uuid) -> Option<&KnowledgeNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    fn get_mut(&mut self, id: Uuid) -> Result<&mut KnowledgeNode, NodeError> {
        self.nodes
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| NodeError::NotFound {
                node_id: id.to_string(),
            })
    }

    /// Replace all nodes. Nodes of other documents are rejected.
    pub fn load(&mut self, nodes: Vec<KnowledgeNode>) -> Result<(), NodeError> {
        if let Some(stray) = nodes.iter().find(|n| n.document_id != self.document_id) {
            return Err(NodeError::WrongDocument {
                node_id: stray.id.to_string(),
                document_id: stray.document_id.to_string(),
            });
        }
        self.nodes = nodes;
        Ok(())
    }

    /// Where a node created from a fragment is placed: the fragment's world
    /// top-left, pulled back by half a marker.
    pub fn placement_for(&self, fragment: ScreenRect, viewport: &ViewportTransform) -> WorldPoint {
        let corner = viewport.to_world(fragment.top_left());
        let half = self.marker_size / 2.0;
        WorldPoint::new(corner.x - half, corner.y - half)
    }

    /// Adds a node with a fresh id and returns a copy of it.
    pub fn create_node(
        &mut self,
        source_fragment_id: impl Into<String>,
        position: impl Into<CanvasPosition>,
        conversation: Vec<ChatMessage>,
        source_fragment_snapshot: impl Into<String>,
    ) -> KnowledgeNode {
        let node = KnowledgeNode {
            id: Uuid::new_v4(),
            document_id: self.document_id.clone(),
            source_fragment_id: source_fragment_id.into(),
            position: position.into(),
            conversation,
            user_annotations: None,
            source_fragment_snapshot: source_fragment_snapshot.into(),
        };
        self.nodes.push(node.clone());
        node
    }

    /// Re-insert or overwrite a node by id.
    pub fn upsert(&mut self, node: KnowledgeNode) {
        match self.nodes.iter_mut().find(|n| n.id == node.id) {
            Some(existing) => *existing = node,
            None => self.nodes.push(node),
        }
    }

    pub fn move_node(&mut self, id: Uuid, position: WorldPoint) -> Result<(), NodeError> {
        self.get_mut(id)?.set_position(position);
        Ok(())
    }

    /// Shift a node by a world-space delta and return its new position.
    pub fn translate_node(&mut self, id: Uuid, dx: f64, dy: f64) -> Result<WorldPoint, NodeError> {
        let node = self.get_mut(id)?;
        let p = node.position();
        let moved = WorldPoint::new(p.x + dx, p.y + dy);
        node.set_position(moved);
        Ok(moved)
    }

    pub fn append_message(&mut self, id: Uuid, message: ChatMessage) -> Result<&KnowledgeNode, NodeError> {
        let node = self.get_mut(id)?;
        node.conversation.push(message);
        Ok(node)
    }

    pub fn update_conversation(
        &mut self,
        id: Uuid,
        conversation: Vec<ChatMessage>,
    ) -> Result<&KnowledgeNode, NodeError> {
        let node = self.get_mut(id)?;
        node.conversation = conversation;
        Ok(node)
    }

    pub fn remove(&mut self, id: Uuid) -> Result<KnowledgeNode, NodeError> {
        let index = self
            .nodes
            .iter()
            .position(|n| n.id == id)
            .ok_or_else(|| NodeError::NotFound {
                node_id: id.to_string(),
            })?;
        Ok(self.nodes.remove(index))
    }

    /// Center of a node's marker.
    pub fn marker_center(&self, id: Uuid) -> Option<WorldPoint> {
        let half = self.marker_size / 2.0;
        self.get(id)
            .map(|n| WorldPoint::new(n.position.x + half, n.position.y + half))
    }

    /// Topmost node whose marker contains `point`.
    pub fn hit_test(&self, point: WorldPoint) -> Option<Uuid> {
        let size = self.marker_size;
        self.nodes
            .iter()
            .rev()
            .find(|n| {
                point.x >= n.position.x
                    && point.x <= n.position.x + size
                    && point.y >= n.position.y
                    && point.y <= n.position.y + size
            })
            .map(|n| n.id)
    }
}
