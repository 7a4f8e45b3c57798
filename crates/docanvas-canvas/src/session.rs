//! Document sessions.
//!
//! A [`DocumentSession`] owns every piece of per-document canvas state and
//! keeps the ink surface and the wires in step with it: each mutation that
//! can change what is on screen re-renders the surface and re-routes wires
//! before returning. The [`SessionManager`] keeps at most one session alive,
//! flushes it before opening another, and drops async results that were
//! requested by a session that is no longer active.

use std::sync::Arc;

use docanvas_core::{
    CanvasEvent, ChatError, DocumentId, DrawingEvent, Error, EventBus, NodeError, NodeEvent,
    PersistenceEvent, Result, SelectionEvent, SessionEvent, SessionId, ViewportEvent,
};
use docanvas_settings::CanvasConfig;
use uuid::Uuid;

use crate::conversation::{
    ChatHistory, ChatMessage, ChatReply, ChatRequest, ChatService, ChatSession, ContextScope,
    Conversation, ThinkingGuard,
};
use crate::gestures::{ActiveGesture, GestureDispatcher, GestureOutcome, GestureTargets};
use crate::input::{KeyEvent, PointerEvent, Shortcut, ShortcutMap, WheelEvent};
use crate::model::{Rgb, ScreenPoint, WorldPoint};
use crate::nodes::{CanvasPosition, KnowledgeNode, NodeGraph};
use crate::persistence::{
    ChatHistoryPersistence, LocalNodeCache, NodePersistence, StrokePersistence, WriteQueue,
};
use crate::selection::{SelectionEntry, SelectionSet};
use crate::strokes::{Stroke, StrokeOutcome, StrokeStore, Tool};
use crate::surface::DrawingSurface;
use crate::viewport::ViewportTransform;
use crate::wires::{FragmentResolver, NoFragments, WireRouter};

/// Asks the user to approve a destructive action.
pub trait ConfirmPrompt: Send + Sync {
    fn confirm(&self, message: &str) -> bool;
}

/// Prompt that always gives the same answer.
#[derive(Debug, Clone, Copy)]
pub struct AutoConfirm(pub bool);

impl ConfirmPrompt for AutoConfirm {
    fn confirm(&self, _message: &str) -> bool {
        self.0
    }
}

/// External services a session talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub strokes: Arc<dyn StrokePersistence>,
    pub nodes: Arc<dyn NodePersistence>,
    pub chats: Arc<dyn ChatHistoryPersistence>,
    pub chat: Arc<dyn ChatService>,
    pub confirm: Arc<dyn ConfirmPrompt>,
    /// Local fallback for node writes.
    pub cache: Option<LocalNodeCache>,
}

impl Collaborators {
    /// Use the local node cache named by `config` unless one is set already.
    pub fn with_config_cache(mut self, config: &CanvasConfig) -> Result<Self> {
        if self.cache.is_none() {
            self.cache = Some(LocalNodeCache::from_config(config)?);
        }
        Ok(self)
    }
}

/// Identifies the session an async request was issued for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTicket {
    pub session: SessionId,
    pub document: DocumentId,
}

/// A chat request that has been validated and optimistically shown.
///
/// The thinking indicator stays up until this value is dropped.
#[derive(Debug)]
pub struct PendingChat {
    pub ticket: RequestTicket,
    pub request: ChatRequest,
    pending_message: Uuid,
    _thinking: ThinkingGuard,
}

impl PendingChat {
    /// Id of the optimistic user message.
    pub fn pending_message(&self) -> Uuid {
        self.pending_message
    }
}

/// Logical size and device pixel ratio of the canvas element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceSize {
    pub width: f64,
    pub height: f64,
    pub device_pixel_ratio: f64,
}

impl Default for SurfaceSize {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 800.0,
            device_pixel_ratio: 1.0,
        }
    }
}

/// All canvas state of one open document.
pub struct DocumentSession {
    id: SessionId,
    document_id: DocumentId,
    viewport: ViewportTransform,
    strokes: StrokeStore,
    nodes: NodeGraph,
    selection: SelectionSet,
    conversation: Conversation,
    chats: ChatHistory,
    surface: DrawingSurface,
    wires: WireRouter,
    dispatcher: GestureDispatcher,
    shortcuts: ShortcutMap,
    write_queue: WriteQueue,
    fragments: Arc<dyn FragmentResolver>,
    collaborators: Collaborators,
    bus: Arc<EventBus>,
}

impl DocumentSession {
    pub fn new(
        document_id: DocumentId,
        config: &CanvasConfig,
        collaborators: Collaborators,
        bus: Arc<EventBus>,
        size: SurfaceSize,
    ) -> Result<Self> {
        let strokes = StrokeStore::from_settings(&config.drawing)?;
        let surface = DrawingSurface::new(size.width, size.height, size.device_pixel_ratio)?;
        let write_queue = WriteQueue::new(
            document_id.clone(),
            collaborators.strokes.clone(),
            bus.clone(),
            config.drawing.save_debounce(),
        );

        let mut session = Self {
            id: SessionId::new(),
            viewport: ViewportTransform::with_pan(
                config.viewport.initial_pan_x,
                config.viewport.initial_pan_y,
            ),
            strokes,
            nodes: NodeGraph::new(document_id.clone(), config.nodes.marker_size),
            selection: SelectionSet::new(),
            conversation: Conversation::new(),
            chats: ChatHistory::new(),
            surface,
            wires: WireRouter::new(&config.wires),
            dispatcher: GestureDispatcher::new(config.viewport.wheel_zoom_sensitivity),
            shortcuts: ShortcutMap,
            write_queue,
            fragments: Arc::new(NoFragments),
            collaborators,
            bus,
            document_id,
        };
        session.refresh();
        Ok(session)
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn document_id(&self) -> &DocumentId {
        &self.document_id
    }

    pub fn ticket(&self) -> RequestTicket {
        RequestTicket {
            session: self.id,
            document: self.document_id.clone(),
        }
    }

    pub fn viewport(&self) -> &ViewportTransform {
        &self.viewport
    }

    pub fn strokes(&self) -> &StrokeStore {
        &self.strokes
    }

    pub fn nodes(&self) -> &NodeGraph {
        &self.nodes
    }

    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn chat_history(&self) -> &ChatHistory {
        &self.chats
    }

    pub fn surface(&self) -> &DrawingSurface {
        &self.surface
    }

    pub fn wires(&self) -> &WireRouter {
        &self.wires
    }

    pub fn gestures(&self) -> &GestureDispatcher {
        &self.dispatcher
    }

    pub fn has_unsaved_strokes(&self) -> bool {
        self.write_queue.has_pending()
    }

    fn emit(&self, event: CanvasEvent) {
        let _ = self.bus.publish(event);
    }

    fn render_ink(&mut self) {
        self.surface.render(&self.viewport, &self.strokes);
    }

    fn route_wires(&mut self) {
        self.wires
            .route(&self.nodes, &self.viewport, self.fragments.as_ref());
    }

    /// Re-render ink and re-route wires.
    pub fn refresh(&mut self) {
        self.render_ink();
        self.route_wires();
    }

    fn viewport_changed(&mut self) {
        self.refresh();
        let state = self.viewport.state();
        self.emit(CanvasEvent::Viewport(ViewportEvent::Changed {
            zoom: state.zoom,
            pan_x: state.pan_x,
            pan_y: state.pan_y,
        }));
    }

    /// Coalesce viewport events while a pan or pinch is running.
    fn track_viewport_gesture(&self) {
        let in_gesture = matches!(
            self.dispatcher.active(),
            ActiveGesture::Pan { .. } | ActiveGesture::Pinch { .. }
        );
        self.bus.set_viewport_coalescing(in_gesture);
    }

    fn ink_changed(&mut self) {
        self.render_ink();
        self.write_queue.schedule(self.strokes.strokes().to_vec());
    }

    /// Feed a pointer event through the gesture dispatcher.
    pub async fn handle_pointer(&mut self, event: PointerEvent) -> GestureOutcome {
        let outcome = {
            let mut targets = GestureTargets {
                viewport: &mut self.viewport,
                strokes: &mut self.strokes,
                nodes: &mut self.nodes,
            };
            self.dispatcher.handle_pointer(&event, &mut targets)
        };
        self.track_viewport_gesture();

        match outcome {
            GestureOutcome::ViewportChanged => self.viewport_changed(),
            GestureOutcome::StrokeStarted | GestureOutcome::StrokeExtended => self.render_ink(),
            GestureOutcome::StrokeFinished(StrokeOutcome::Committed) => {
                self.ink_changed();
                self.emit(CanvasEvent::Drawing(DrawingEvent::StrokeCommitted {
                    committed: self.strokes.strokes().len(),
                }));
            }
            GestureOutcome::StrokeFinished(StrokeOutcome::Discarded) => {
                self.render_ink();
                self.emit(CanvasEvent::Drawing(DrawingEvent::StrokeDiscarded));
            }
            GestureOutcome::NodeMoved(node_id) => self.node_moved(node_id),
            GestureOutcome::NodeReleased(node_id) => self.persist_node(node_id).await,
            GestureOutcome::Ignored
            | GestureOutcome::Started
            | GestureOutcome::StrokeFinished(StrokeOutcome::NotDrawing) => {}
        }
        outcome
    }

    pub fn handle_wheel(&mut self, event: WheelEvent) -> GestureOutcome {
        let outcome = {
            let mut targets = GestureTargets {
                viewport: &mut self.viewport,
                strokes: &mut self.strokes,
                nodes: &mut self.nodes,
            };
            self.dispatcher.handle_wheel(&event, &mut targets)
        };
        if outcome == GestureOutcome::ViewportChanged {
            self.viewport_changed();
        }
        outcome
    }

    /// Apply an undo/redo shortcut. Returns the shortcut that fired, if any.
    pub fn handle_key(&mut self, event: &KeyEvent) -> Option<Shortcut> {
        let shortcut = self.shortcuts.resolve(event)?;
        match shortcut {
            Shortcut::Undo => self.undo(),
            Shortcut::Redo => self.redo(),
        };
        Some(shortcut)
    }

    /// Pan by a screen delta (scrollbars, keyboard). Returns false when the
    /// delta was rejected.
    pub fn pan_by(&mut self, dx: f64, dy: f64) -> bool {
        let accepted = self.viewport.pan_by(dx, dy);
        if accepted {
            self.viewport_changed();
        }
        accepted
    }

    /// Anchored zoom. Returns false when the factor was rejected.
    pub fn zoom_at(&mut self, anchor: ScreenPoint, factor: f64) -> bool {
        let accepted = self.viewport.zoom_at(anchor, factor);
        if accepted {
            self.viewport_changed();
        }
        accepted
    }

    pub fn select_tool(&mut self, tool: Tool) -> Option<Tool> {
        let mut targets = GestureTargets {
            viewport: &mut self.viewport,
            strokes: &mut self.strokes,
            nodes: &mut self.nodes,
        };
        self.dispatcher.reset(&mut targets);
        self.track_viewport_gesture();
        let active = self.strokes.select_tool(tool);
        self.render_ink();
        self.emit(CanvasEvent::Drawing(DrawingEvent::ToolChanged {
            tool: active.map(|t| t.to_string()),
        }));
        active
    }

    pub fn set_color(&mut self, color: Rgb) {
        self.strokes.set_color(color);
    }

    pub fn set_width(&mut self, width: f64) -> Result<()> {
        self.strokes.set_width(width)?;
        Ok(())
    }

    pub fn undo(&mut self) -> bool {
        if !self.strokes.undo() {
            return false;
        }
        self.ink_changed();
        self.emit(CanvasEvent::Drawing(DrawingEvent::Undone {
            committed: self.strokes.strokes().len(),
            redo: self.strokes.redo_buffer().len(),
        }));
        true
    }

    pub fn redo(&mut self) -> bool {
        if !self.strokes.redo() {
            return false;
        }
        self.ink_changed();
        self.emit(CanvasEvent::Drawing(DrawingEvent::Redone {
            committed: self.strokes.strokes().len(),
            redo: self.strokes.redo_buffer().len(),
        }));
        true
    }

    /// Resize the canvas element.
    pub fn resize(&mut self, size: SurfaceSize) -> Result<()> {
        self.surface
            .resize(size.width, size.height, size.device_pixel_ratio)?;
        self.refresh();
        self.emit(CanvasEvent::Viewport(ViewportEvent::Resized {
            width: size.width,
            height: size.height,
            device_pixel_ratio: self.surface.device_pixel_ratio(),
        }));
        Ok(())
    }

    /// Swap in a new fragment layout and re-route.
    pub fn set_fragment_resolver(&mut self, resolver: Arc<dyn FragmentResolver>) {
        self.fragments = resolver;
        self.route_wires();
    }

    /// The document reflowed; fragment rectangles may have moved.
    pub fn relayout(&mut self) {
        self.route_wires();
    }

    /// Replace ink with strokes from the store.
    pub fn apply_strokes(&mut self, strokes: Vec<Stroke>) {
        self.strokes.load(strokes);
        self.render_ink();
        self.emit(CanvasEvent::Drawing(DrawingEvent::Loaded {
            count: self.strokes.strokes().len(),
        }));
    }

    /// Replace nodes with nodes from the store or cache.
    pub fn apply_nodes(&mut self, nodes: Vec<KnowledgeNode>) -> Result<()> {
        self.nodes.load(nodes)?;
        self.route_wires();
        self.emit(CanvasEvent::Node(NodeEvent::Loaded {
            count: self.nodes.len(),
        }));
        Ok(())
    }

    async fn save_node_or_cache(&self, node: &KnowledgeNode) {
        match self
            .collaborators
            .nodes
            .save_node(&self.document_id, node)
            .await
        {
            Ok(()) => {
                tracing::debug!("Saved node {}", node.id);
                self.emit(CanvasEvent::Persistence(PersistenceEvent::Saved {
                    what: format!("node {}", node.id),
                }));
            }
            Err(e) => {
                tracing::warn!("Failed to save node {}: {}", node.id, e);
                let Some(cache) = &self.collaborators.cache else {
                    self.emit(CanvasEvent::Persistence(PersistenceEvent::SaveFailed {
                        what: format!("node {}", node.id),
                        reason: e.to_string(),
                    }));
                    return;
                };
                match cache.upsert(&self.document_id, node).await {
                    Ok(()) => self.emit(CanvasEvent::Persistence(PersistenceEvent::CachedLocally {
                        node_id: node.id,
                    })),
                    Err(cache_err) => {
                        tracing::warn!("Local cache write failed for {}: {}", node.id, cache_err);
                        self.emit(CanvasEvent::Persistence(PersistenceEvent::SaveFailed {
                            what: format!("node {}", node.id),
                            reason: cache_err.to_string(),
                        }));
                    }
                }
            }
        }
    }

    async fn persist_node(&self, node_id: Uuid) {
        match self.nodes.get(node_id) {
            Some(node) => self.save_node_or_cache(node).await,
            None => tracing::debug!("Node {} vanished before save", node_id),
        }
    }

    fn node_moved(&mut self, node_id: Uuid) {
        self.route_wires();
        if let Some(p) = self.nodes.get(node_id).map(|n| n.position()) {
            self.emit(CanvasEvent::Node(NodeEvent::Moved {
                node_id,
                x: p.x,
                y: p.y,
            }));
        }
    }

    /// Create a node at a world position and persist it. The current zoom is
    /// recorded with the position.
    pub async fn create_node(
        &mut self,
        fragment_id: &str,
        position: WorldPoint,
        conversation: Vec<ChatMessage>,
        fragment_snapshot: &str,
    ) -> KnowledgeNode {
        let position = CanvasPosition::at_zoom(position, self.viewport.zoom());
        let node = self
            .nodes
            .create_node(fragment_id, position, conversation, fragment_snapshot);
        self.route_wires();
        self.emit(CanvasEvent::Node(NodeEvent::Created {
            node_id: node.id,
            fragment_id: node.source_fragment_id.clone(),
        }));
        self.save_node_or_cache(&node).await;
        node
    }

    /// Create a node next to a laid-out fragment.
    pub async fn create_node_for_fragment(
        &mut self,
        fragment: &SelectionEntry,
        conversation: Vec<ChatMessage>,
    ) -> Result<KnowledgeNode> {
        let rect = self
            .fragments
            .resolve_fragment(&fragment.fragment_id)
            .ok_or_else(|| NodeError::FragmentNotFound {
                fragment_id: fragment.fragment_id.clone(),
            })?;
        let position = self.nodes.placement_for(rect, &self.viewport);
        Ok(self
            .create_node(
                &fragment.fragment_id,
                position,
                conversation,
                &fragment.snapshot_html,
            )
            .await)
    }

    /// Move a node without persisting it. See [`persist_moved_node`](Self::persist_moved_node).
    pub fn move_node(&mut self, node_id: Uuid, position: WorldPoint) -> Result<()> {
        self.nodes.move_node(node_id, position)?;
        self.node_moved(node_id);
        Ok(())
    }

    /// Persist a node after a programmatic move.
    pub async fn persist_moved_node(&self, node_id: Uuid) -> Result<()> {
        if self.nodes.get(node_id).is_none() {
            return Err(NodeError::NotFound {
                node_id: node_id.to_string(),
            }
            .into());
        }
        self.persist_node(node_id).await;
        Ok(())
    }

    /// Delete a node after confirmation.
    ///
    /// Returns `Ok(false)` when the user declined. The node is only removed
    /// locally once the remote store accepted the delete.
    pub async fn delete_node(&mut self, node_id: Uuid) -> Result<bool> {
        if self.nodes.get(node_id).is_none() {
            return Err(NodeError::NotFound {
                node_id: node_id.to_string(),
            }
            .into());
        }
        if !self.collaborators.confirm.confirm("Delete this node?") {
            return Ok(false);
        }

        self.collaborators
            .nodes
            .delete_node(&self.document_id, node_id)
            .await?;
        self.nodes.remove(node_id)?;
        if let Some(cache) = &self.collaborators.cache {
            if let Err(e) = cache.remove(&self.document_id, node_id).await {
                tracing::warn!("Could not drop cached node {}: {}", node_id, e);
            }
        }
        if self.conversation.bound_node() == Some(node_id) {
            self.conversation.clear();
        }
        self.route_wires();
        self.emit(CanvasEvent::Node(NodeEvent::Deleted { node_id }));
        Ok(true)
    }

    pub async fn append_message(&mut self, node_id: Uuid, message: ChatMessage) -> Result<()> {
        let node = self.nodes.append_message(node_id, message)?;
        let messages = node.conversation.len();
        self.emit(CanvasEvent::Node(NodeEvent::ConversationUpdated { node_id, messages }));
        self.persist_node(node_id).await;
        Ok(())
    }

    pub async fn update_conversation(
        &mut self,
        node_id: Uuid,
        conversation: Vec<ChatMessage>,
    ) -> Result<()> {
        let node = self.nodes.update_conversation(node_id, conversation)?;
        let messages = node.conversation.len();
        self.emit(CanvasEvent::Node(NodeEvent::ConversationUpdated { node_id, messages }));
        self.persist_node(node_id).await;
        Ok(())
    }

    /// Show a node's conversation in the chat panel.
    pub fn open_node_conversation(&mut self, node_id: Uuid) -> Result<()> {
        let node = self.nodes.get(node_id).ok_or_else(|| NodeError::NotFound {
            node_id: node_id.to_string(),
        })?;
        let messages = node.conversation.clone();
        self.conversation.bind(node_id, messages);
        Ok(())
    }

    /// Clear the chat panel after confirmation. Returns false when declined.
    pub fn clear_conversation(&mut self) -> bool {
        if self.conversation.is_empty() && self.conversation.bound_node().is_none() {
            return true;
        }
        if !self.collaborators.confirm.confirm("Clear this conversation?") {
            return false;
        }
        self.conversation.clear();
        true
    }

    fn selection_changed(&self) {
        self.emit(CanvasEvent::Selection(SelectionEvent::Changed {
            fragment_ids: self.selection.fragment_ids(),
        }));
    }

    pub fn toggle_fragment(&mut self, entry: SelectionEntry) -> bool {
        let selected = self.selection.toggle(entry);
        self.selection_changed();
        selected
    }

    pub fn add_fragment(&mut self, entry: SelectionEntry) -> bool {
        let added = self.selection.add(entry);
        if added {
            self.selection_changed();
        }
        added
    }

    pub fn remove_fragment(&mut self, fragment_id: &str) -> bool {
        let removed = self.selection.remove(fragment_id);
        if removed {
            self.selection_changed();
        }
        removed
    }

    /// Validate a chat message, show it optimistically and build the request.
    ///
    /// An invalid context range rolls the optimistic message back and leaves
    /// the selection untouched.
    pub fn begin_chat(
        &mut self,
        text: &str,
        scope: &ContextScope,
        document_len: usize,
    ) -> Result<PendingChat> {
        let message = self.selection.compose_message(text);
        if message.is_empty() {
            return Err(ChatError::EmptyMessage.into());
        }

        let pending_message = self.conversation.push_pending_user(message, None);
        let context_range = match scope.resolve(document_len) {
            Ok(range) => range,
            Err(e) => {
                self.conversation.rollback(pending_message);
                return Err(e.into());
            }
        };

        let selected_fragments = self.selection.take();
        self.selection_changed();

        let source_fragment_id = self
            .conversation
            .bound_node()
            .and_then(|id| self.nodes.get(id))
            .map(|n| n.source_fragment_id.clone());

        Ok(PendingChat {
            ticket: self.ticket(),
            request: ChatRequest {
                document_id: self.document_id.clone(),
                messages: self.conversation.messages().to_vec(),
                selected_fragments,
                context_range,
                source_fragment_id,
            },
            pending_message,
            _thinking: self.conversation.thinking().show(),
        })
    }

    /// Apply a chat outcome to the panel and the bound node.
    pub async fn finish_chat(&mut self, pending: PendingChat, reply: Result<ChatReply>) {
        let pending_message = pending.pending_message;
        match reply {
            Ok(reply) => {
                self.conversation
                    .confirm(pending_message, reply.first_user_message_override);
                self.conversation.push(ChatMessage::assistant(reply.reply));
            }
            Err(e) => {
                tracing::warn!("Chat request failed: {}", e);
                self.conversation.confirm(pending_message, None);
                self.conversation.push_failure_placeholder();
            }
        }
        drop(pending);

        match self.conversation.bound_node() {
            Some(node_id) => {
                let messages = self.conversation.messages().to_vec();
                if let Err(e) = self.update_conversation(node_id, messages).await {
                    tracing::warn!("Could not store conversation on node {}: {}", node_id, e);
                }
            }
            None => self.record_active_chat().await,
        }
    }

    async fn save_chat(&self, chat: &ChatSession) {
        let what = format!("chat {}", chat.id);
        match self
            .collaborators
            .chats
            .save_chat(&self.document_id, chat)
            .await
        {
            Ok(()) => self.emit(CanvasEvent::Persistence(PersistenceEvent::Saved { what })),
            Err(e) => {
                tracing::warn!("Failed to save {}: {}", what, e);
                self.emit(CanvasEvent::Persistence(PersistenceEvent::SaveFailed {
                    what,
                    reason: e.to_string(),
                }));
            }
        }
    }

    /// Copy the free-standing panel onto the active chat thread and save it.
    async fn record_active_chat(&mut self) {
        let messages = self.conversation.messages().to_vec();
        let Some(chat) = self.chats.record_active(&messages).cloned() else {
            return;
        };
        self.save_chat(&chat).await;
    }

    fn show_chat(&mut self, chat: ChatSession) {
        self.conversation.show(chat.messages);
        self.emit(CanvasEvent::Session(SessionEvent::ChatSwitched {
            chat_id: chat.id,
            name: chat.name,
        }));
    }

    /// Replace the chat threads with stored ones and show the first. A
    /// document without threads gets a fresh one.
    pub async fn apply_chats(&mut self, chats: Vec<ChatSession>) {
        self.chats.load(chats);
        match self.chats.active().cloned() {
            Some(chat) => self.show_chat(chat),
            None => {
                self.new_chat().await;
            }
        }
    }

    /// Start an empty chat thread, save it and show it.
    pub async fn new_chat(&mut self) -> Uuid {
        let chat = self.chats.create().clone();
        self.save_chat(&chat).await;
        let id = chat.id;
        self.show_chat(chat);
        id
    }

    /// Show another chat thread in the panel.
    pub fn select_chat(&mut self, chat_id: Uuid) -> Result<()> {
        let chat = self
            .chats
            .set_active(chat_id)
            .cloned()
            .ok_or_else(|| Error::other(format!("Chat {} not found", chat_id)))?;
        self.show_chat(chat);
        Ok(())
    }

    /// Delete a chat thread after confirmation. Returns `Ok(false)` when the
    /// user declined.
    pub async fn delete_chat(&mut self, chat_id: Uuid) -> Result<bool> {
        if self.chats.get(chat_id).is_none() {
            return Err(Error::other(format!("Chat {} not found", chat_id)));
        }
        if !self.collaborators.confirm.confirm("Delete this chat?") {
            return Ok(false);
        }
        self.collaborators
            .chats
            .delete_chat(&self.document_id, chat_id)
            .await?;
        let was_active = self.chats.active_id() == Some(chat_id);
        self.chats.remove(chat_id);
        if was_active {
            match self.chats.active().cloned() {
                Some(chat) => self.show_chat(chat),
                None => {
                    self.new_chat().await;
                }
            }
        }
        Ok(true)
    }

    /// Flush pending writes and shut the session down.
    pub async fn close(mut self) {
        self.bus.set_viewport_coalescing(false);
        self.write_queue.flush().await;
        tracing::info!("Closed {} for {}", self.id, self.document_id);
        self.emit(CanvasEvent::Session(SessionEvent::Closed {
            session: self.id,
            document: self.document_id.clone(),
        }));
    }
}

impl std::fmt::Debug for DocumentSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentSession")
            .field("id", &self.id)
            .field("document_id", &self.document_id)
            .field("viewport", &self.viewport)
            .field("strokes", &self.strokes.strokes().len())
            .field("nodes", &self.nodes.len())
            .finish()
    }
}

/// Owns the single active document session.
pub struct SessionManager {
    config: CanvasConfig,
    collaborators: Collaborators,
    bus: Arc<EventBus>,
    surface_size: SurfaceSize,
    active: Option<DocumentSession>,
}

impl SessionManager {
    pub fn new(config: CanvasConfig, collaborators: Collaborators) -> Self {
        Self {
            config,
            collaborators,
            bus: Arc::new(EventBus::new()),
            surface_size: SurfaceSize::default(),
            active: None,
        }
    }

    pub fn with_surface_size(mut self, size: SurfaceSize) -> Self {
        self.surface_size = size;
        self
    }

    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.bus = bus;
        self
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn config(&self) -> &CanvasConfig {
        &self.config
    }

    pub fn active(&self) -> Option<&DocumentSession> {
        self.active.as_ref()
    }

    pub fn active_mut(&mut self) -> Option<&mut DocumentSession> {
        self.active.as_mut()
    }

    fn active_or_err(&mut self) -> Result<&mut DocumentSession> {
        self.active
            .as_mut()
            .ok_or_else(|| Error::other("No document is open"))
    }

    /// Whether a response for `ticket` may still be applied.
    pub fn is_current(&self, ticket: &RequestTicket) -> bool {
        self.active
            .as_ref()
            .is_some_and(|s| s.id() == ticket.session)
    }

    fn discard_if_stale(&self, ticket: &RequestTicket, what: &str) -> bool {
        if self.is_current(ticket) {
            return false;
        }
        tracing::info!("Discarding stale {} for {}", what, ticket.session);
        let _ = self
            .bus
            .publish(CanvasEvent::Session(SessionEvent::StaleResponseDiscarded {
                session: ticket.session,
                what: what.to_string(),
            }));
        true
    }

    /// Flush and close the active session, then open `document` and load it.
    pub async fn open_document(&mut self, document: DocumentId) -> Result<SessionId> {
        self.close_active().await;

        let session = DocumentSession::new(
            document.clone(),
            &self.config,
            self.collaborators.clone(),
            self.bus.clone(),
            self.surface_size,
        )?;
        let id = session.id();
        let ticket = session.ticket();
        self.active = Some(session);
        tracing::info!("Opened {} for {}", id, document);
        let _ = self.bus.publish(CanvasEvent::Session(SessionEvent::Opened {
            session: id,
            document: document.clone(),
        }));

        let strokes = self.collaborators.strokes.load_strokes(&document).await;
        self.complete_stroke_load(&ticket, strokes);
        let nodes = self.collaborators.nodes.load_nodes(&document).await;
        self.complete_node_load(&ticket, nodes).await;
        let chats = self.collaborators.chats.load_chats(&document).await;
        self.complete_chat_history_load(&ticket, chats).await;
        Ok(id)
    }

    /// Flush and close the active session, if any.
    pub async fn close_active(&mut self) {
        if let Some(session) = self.active.take() {
            session.close().await;
        }
    }

    /// Apply a stroke load. Returns false when the response was discarded.
    pub fn complete_stroke_load(
        &mut self,
        ticket: &RequestTicket,
        result: Result<Vec<Stroke>>,
    ) -> bool {
        if self.discard_if_stale(ticket, "stroke load") {
            return false;
        }
        let Some(session) = self.active.as_mut() else {
            return false;
        };
        match result {
            Ok(strokes) => session.apply_strokes(strokes),
            Err(e) => tracing::warn!("Could not load strokes for {}: {}", ticket.document, e),
        }
        true
    }

    /// Apply a node load, falling back to the local cache when the remote
    /// load failed. Returns false when the response was discarded.
    pub async fn complete_node_load(
        &mut self,
        ticket: &RequestTicket,
        result: Result<Vec<KnowledgeNode>>,
    ) -> bool {
        if self.discard_if_stale(ticket, "node load") {
            return false;
        }
        let nodes = match result {
            Ok(nodes) => nodes,
            Err(e) => {
                tracing::warn!("Could not load nodes for {}: {}", ticket.document, e);
                match &self.collaborators.cache {
                    Some(cache) => cache.load(&ticket.document).await.unwrap_or_else(|e| {
                        tracing::warn!("Local node cache unreadable: {}", e);
                        Vec::new()
                    }),
                    None => Vec::new(),
                }
            }
        };
        let Some(session) = self.active.as_mut() else {
            return false;
        };
        if let Err(e) = session.apply_nodes(nodes) {
            tracing::warn!("Rejected loaded nodes: {}", e);
        }
        true
    }

    /// Apply a chat thread load. A failed load starts a fresh thread.
    /// Returns false when the response was discarded.
    pub async fn complete_chat_history_load(
        &mut self,
        ticket: &RequestTicket,
        result: Result<Vec<ChatSession>>,
    ) -> bool {
        if self.discard_if_stale(ticket, "chat history load") {
            return false;
        }
        let Some(session) = self.active.as_mut() else {
            return false;
        };
        let chats = result.unwrap_or_else(|e| {
            tracing::warn!("Could not load chats for {}: {}", ticket.document, e);
            Vec::new()
        });
        session.apply_chats(chats).await;
        true
    }

    /// Send a chat message through the chat service and apply the reply.
    pub async fn send_chat(
        &mut self,
        text: &str,
        scope: &ContextScope,
        document_len: usize,
    ) -> Result<()> {
        let pending = self.active_or_err()?.begin_chat(text, scope, document_len)?;
        let chat = self.collaborators.chat.clone();
        let reply = chat.chat(pending.request.clone()).await;
        self.complete_chat(pending, reply).await;
        Ok(())
    }

    /// Apply a chat reply. Returns false when the response was discarded.
    pub async fn complete_chat(&mut self, pending: PendingChat, reply: Result<ChatReply>) -> bool {
        if self.discard_if_stale(&pending.ticket, "chat reply") {
            return false;
        }
        match self.active.as_mut() {
            Some(session) => {
                session.finish_chat(pending, reply).await;
                true
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("active", &self.active)
            .finish()
    }
}
