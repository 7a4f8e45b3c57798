//! Persistence collaborators and the debounced stroke writer.
//!
//! The remote store is reached through async traits, one per collection.
//! `MemoryStore` backs tests and demos, `FileStore` keeps one JSON file per
//! document per collection on disk. `LocalNodeCache` is the durable fallback
//! for node writes that the remote store rejected.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use docanvas_core::{
    thread_safe_none, CanvasEvent, DocumentId, EventBus, PersistenceError,
    PersistenceEvent, Result, ThreadSafeOption, ThreadSafeRw,
};
use docanvas_settings::CanvasConfig;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::conversation::ChatSession;
use crate::nodes::KnowledgeNode;
use crate::strokes::Stroke;

/// Remote storage for freehand ink.
#[async_trait]
pub trait StrokePersistence: Send + Sync {
    async fn load_strokes(&self, document: &DocumentId) -> Result<Vec<Stroke>>;
    async fn save_strokes(&self, document: &DocumentId, strokes: &[Stroke]) -> Result<()>;
}

/// Remote storage for knowledge nodes.
#[async_trait]
pub trait NodePersistence: Send + Sync {
    async fn load_nodes(&self, document: &DocumentId) -> Result<Vec<KnowledgeNode>>;
    /// Insert or replace by node id.
    async fn save_node(&self, document: &DocumentId, node: &KnowledgeNode) -> Result<()>;
    async fn delete_node(&self, document: &DocumentId, node_id: Uuid) -> Result<()>;
}

/// Remote storage for the named chat threads of a document.
#[async_trait]
pub trait ChatHistoryPersistence: Send + Sync {
    async fn load_chats(&self, document: &DocumentId) -> Result<Vec<ChatSession>>;
    /// Insert or replace by chat id.
    async fn save_chat(&self, document: &DocumentId, chat: &ChatSession) -> Result<()>;
    async fn delete_chat(&self, document: &DocumentId, chat_id: Uuid) -> Result<()>;
}

fn unavailable() -> docanvas_core::Error {
    PersistenceError::Unavailable {
        reason: "store is offline".to_string(),
    }
    .into()
}

/// In-memory store with a switch to simulate outages.
#[derive(Debug, Default)]
pub struct MemoryStore {
    strokes: ThreadSafeRw<HashMap<DocumentId, Vec<Stroke>>>,
    nodes: ThreadSafeRw<HashMap<DocumentId, Vec<KnowledgeNode>>>,
    chats: ThreadSafeRw<HashMap<DocumentId, Vec<ChatSession>>>,
    offline: AtomicBool,
    stroke_saves: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While offline every call fails with `PersistenceError::Unavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of successful stroke writes.
    pub fn stroke_save_count(&self) -> usize {
        self.stroke_saves.load(Ordering::SeqCst)
    }

    pub fn strokes_for(&self, document: &DocumentId) -> Vec<Stroke> {
        self.strokes.read().get(document).cloned().unwrap_or_default()
    }

    pub fn nodes_for(&self, document: &DocumentId) -> Vec<KnowledgeNode> {
        self.nodes.read().get(document).cloned().unwrap_or_default()
    }

    pub fn chats_for(&self, document: &DocumentId) -> Vec<ChatSession> {
        self.chats.read().get(document).cloned().unwrap_or_default()
    }

    fn check(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(unavailable())
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl StrokePersistence for MemoryStore {
    async fn load_strokes(&self, document: &DocumentId) -> Result<Vec<Stroke>> {
        self.check()?;
        Ok(self.strokes_for(document))
    }

    async fn save_strokes(&self, document: &DocumentId, strokes: &[Stroke]) -> Result<()> {
        self.check()?;
        self.strokes.write().insert(document.clone(), strokes.to_vec());
        self.stroke_saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl NodePersistence for MemoryStore {
    async fn load_nodes(&self, document: &DocumentId) -> Result<Vec<KnowledgeNode>> {
        self.check()?;
        Ok(self.nodes_for(document))
    }

    async fn save_node(&self, document: &DocumentId, node: &KnowledgeNode) -> Result<()> {
        self.check()?;
        upsert(
            self.nodes.write().entry(document.clone()).or_default(),
            node.clone(),
        );
        Ok(())
    }

    async fn delete_node(&self, document: &DocumentId, node_id: Uuid) -> Result<()> {
        self.check()?;
        if let Some(nodes) = self.nodes.write().get_mut(document) {
            nodes.retain(|n| n.id != node_id);
        }
        Ok(())
    }
}

#[async_trait]
impl ChatHistoryPersistence for MemoryStore {
    async fn load_chats(&self, document: &DocumentId) -> Result<Vec<ChatSession>> {
        self.check()?;
        Ok(self.chats_for(document))
    }

    async fn save_chat(&self, document: &DocumentId, chat: &ChatSession) -> Result<()> {
        self.check()?;
        upsert(
            self.chats.write().entry(document.clone()).or_default(),
            chat.clone(),
        );
        Ok(())
    }

    async fn delete_chat(&self, document: &DocumentId, chat_id: Uuid) -> Result<()> {
        self.check()?;
        if let Some(chats) = self.chats.write().get_mut(document) {
            chats.retain(|c| c.id != chat_id);
        }
        Ok(())
    }
}

/// Records stored in per-document lists, replaced by id.
trait Keyed {
    fn key(&self) -> Uuid;
}

impl Keyed for KnowledgeNode {
    fn key(&self) -> Uuid {
        self.id
    }
}

impl Keyed for ChatSession {
    fn key(&self) -> Uuid {
        self.id
    }
}

fn upsert<T: Keyed>(items: &mut Vec<T>, item: T) {
    match items.iter_mut().find(|i| i.key() == item.key()) {
        Some(existing) => *existing = item,
        None => items.push(item),
    }
}

/// Document id made safe for use as a file stem.
fn file_stem(document: &DocumentId) -> String {
    document
        .as_str()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// A missing file reads as empty. A file that does not parse is an error, so
/// read-modify-write callers never overwrite it.
async fn read_list<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    serde_json::from_str(&content).map_err(|e| {
        tracing::warn!("Refusing to use unreadable {}: {}", path.display(), e);
        PersistenceError::Malformed {
            path: path.display().to_string(),
            reason: e.to_string(),
        }
        .into()
    })
}

async fn write_list<T: Serialize>(path: &Path, items: &[T]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let content = serde_json::to_string_pretty(items)?;
    tokio::fs::write(path, content).await?;
    Ok(())
}

/// One JSON file per document under `strokes/`, `nodes/` and `chats/`.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn strokes_path(&self, document: &DocumentId) -> PathBuf {
        self.root
            .join("strokes")
            .join(format!("{}.json", file_stem(document)))
    }

    fn nodes_path(&self, document: &DocumentId) -> PathBuf {
        self.root
            .join("nodes")
            .join(format!("{}.json", file_stem(document)))
    }

    fn chats_path(&self, document: &DocumentId) -> PathBuf {
        self.root
            .join("chats")
            .join(format!("{}.json", file_stem(document)))
    }
}

#[async_trait]
impl StrokePersistence for FileStore {
    async fn load_strokes(&self, document: &DocumentId) -> Result<Vec<Stroke>> {
        read_list(&self.strokes_path(document)).await
    }

    async fn save_strokes(&self, document: &DocumentId, strokes: &[Stroke]) -> Result<()> {
        write_list(&self.strokes_path(document), strokes).await
    }
}

#[async_trait]
impl NodePersistence for FileStore {
    async fn load_nodes(&self, document: &DocumentId) -> Result<Vec<KnowledgeNode>> {
        read_list(&self.nodes_path(document)).await
    }

    async fn save_node(&self, document: &DocumentId, node: &KnowledgeNode) -> Result<()> {
        let path = self.nodes_path(document);
        let mut nodes: Vec<KnowledgeNode> = read_list(&path).await?;
        upsert(&mut nodes, node.clone());
        write_list(&path, &nodes).await
    }

    async fn delete_node(&self, document: &DocumentId, node_id: Uuid) -> Result<()> {
        let path = self.nodes_path(document);
        let mut nodes: Vec<KnowledgeNode> = read_list(&path).await?;
        nodes.retain(|n| n.id != node_id);
        write_list(&path, &nodes).await
    }
}

#[async_trait]
impl ChatHistoryPersistence for FileStore {
    async fn load_chats(&self, document: &DocumentId) -> Result<Vec<ChatSession>> {
        read_list(&self.chats_path(document)).await
    }

    async fn save_chat(&self, document: &DocumentId, chat: &ChatSession) -> Result<()> {
        let path = self.chats_path(document);
        let mut chats: Vec<ChatSession> = read_list(&path).await?;
        upsert(&mut chats, chat.clone());
        write_list(&path, &chats).await
    }

    async fn delete_chat(&self, document: &DocumentId, chat_id: Uuid) -> Result<()> {
        let path = self.chats_path(document);
        let mut chats: Vec<ChatSession> = read_list(&path).await?;
        chats.retain(|c| c.id != chat_id);
        write_list(&path, &chats).await
    }
}

/// Durable local copy of nodes the remote store did not accept.
#[derive(Debug, Clone)]
pub struct LocalNodeCache {
    dir: PathBuf,
}

impl LocalNodeCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Cache in the configured directory, or under the user cache dir.
    pub fn from_config(config: &CanvasConfig) -> Result<Self> {
        let dir = config.cache_dir()?;
        tracing::debug!("Local node cache at {}", dir.display());
        Ok(Self::new(dir))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, document: &DocumentId) -> PathBuf {
        self.dir.join(format!("{}.nodes.json", file_stem(document)))
    }

    pub async fn load(&self, document: &DocumentId) -> Result<Vec<KnowledgeNode>> {
        read_list(&self.path(document)).await.map_err(cache_error)
    }

    pub async fn upsert(&self, document: &DocumentId, node: &KnowledgeNode) -> Result<()> {
        let mut nodes = self.load(document).await?;
        upsert(&mut nodes, node.clone());
        write_list(&self.path(document), &nodes)
            .await
            .map_err(cache_error)
    }

    pub async fn remove(&self, document: &DocumentId, node_id: Uuid) -> Result<()> {
        let mut nodes = self.load(document).await?;
        let before = nodes.len();
        nodes.retain(|n| n.id != node_id);
        if nodes.len() == before {
            return Ok(());
        }
        write_list(&self.path(document), &nodes)
            .await
            .map_err(cache_error)
    }
}

fn cache_error(e: docanvas_core::Error) -> docanvas_core::Error {
    if let docanvas_core::Error::Persistence(malformed @ PersistenceError::Malformed { .. }) = e {
        return malformed.into();
    }
    PersistenceError::Cache {
        reason: e.to_string(),
    }
    .into()
}

async fn write_strokes(
    store: &dyn StrokePersistence,
    document: &DocumentId,
    strokes: &[Stroke],
    bus: &EventBus,
) {
    match store.save_strokes(document, strokes).await {
        Ok(()) => {
            tracing::debug!("Saved {} strokes for {}", strokes.len(), document);
            let _ = bus.publish(CanvasEvent::Persistence(PersistenceEvent::Saved {
                what: format!("strokes of {}", document),
            }));
        }
        Err(e) => {
            tracing::warn!("Failed to save strokes for {}: {}", document, e);
            let _ = bus.publish(CanvasEvent::Persistence(PersistenceEvent::SaveFailed {
                what: format!("strokes of {}", document),
                reason: e.to_string(),
            }));
        }
    }
}

/// Debounced stroke writer.
///
/// Each [`schedule`](Self::schedule) replaces the pending snapshot and
/// restarts the single timer, so a burst of edits produces one write of the
/// final state. [`flush`](Self::flush) writes immediately.
///
/// Writes are serialized by a gate. A timer that already holds the gate is
/// never aborted, so a save in flight always completes and a later flush
/// waits for it before writing the newest snapshot.
pub struct WriteQueue {
    document: DocumentId,
    store: Arc<dyn StrokePersistence>,
    bus: Arc<EventBus>,
    delay: Duration,
    pending: ThreadSafeOption<Vec<Stroke>>,
    write_gate: Arc<AsyncMutex<()>>,
    runtime: Option<Handle>,
    timer: Option<JoinHandle<()>>,
}

impl WriteQueue {
    /// Captures the current tokio runtime, if any, for spawning timers.
    pub fn new(
        document: DocumentId,
        store: Arc<dyn StrokePersistence>,
        bus: Arc<EventBus>,
        delay: Duration,
    ) -> Self {
        Self {
            document,
            store,
            bus,
            delay,
            pending: thread_safe_none(),
            write_gate: Arc::new(AsyncMutex::new(())),
            runtime: Handle::try_current().ok(),
            timer: None,
        }
    }

    pub fn has_pending(&self) -> bool {
        self.pending.lock().is_some()
    }

    /// Abort the timer unless it is writing.
    fn stop_idle_timer(&mut self) {
        let Some(timer) = self.timer.take() else {
            return;
        };
        match self.write_gate.try_lock() {
            Ok(_idle) => timer.abort(),
            Err(_) => tracing::trace!("Stroke write for {} in flight", self.document),
        }
    }

    /// Replace the pending snapshot and restart the timer.
    ///
    /// Without a runtime the snapshot stays pending until [`flush`](Self::flush).
    pub fn schedule(&mut self, strokes: Vec<Stroke>) {
        *self.pending.lock() = Some(strokes);
        self.stop_idle_timer();

        let Some(runtime) = self
            .runtime
            .clone()
            .or_else(|| Handle::try_current().ok())
        else {
            tracing::warn!(
                "No async runtime; strokes of {} wait for an explicit flush",
                self.document
            );
            return;
        };

        let pending = self.pending.clone();
        let gate = self.write_gate.clone();
        let store = self.store.clone();
        let bus = self.bus.clone();
        let document = self.document.clone();
        let delay = self.delay;
        self.timer = Some(runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            let _writing = gate.lock().await;
            let snapshot = pending.lock().take();
            if let Some(strokes) = snapshot {
                write_strokes(store.as_ref(), &document, &strokes, &bus).await;
            }
        }));
    }

    /// Cancel an idle timer, wait for any write in flight, then write the
    /// pending snapshot.
    pub async fn flush(&mut self) {
        self.stop_idle_timer();
        let gate = self.write_gate.clone();
        let _writing = gate.lock().await;
        let snapshot = self.pending.lock().take();
        if let Some(strokes) = snapshot {
            write_strokes(self.store.as_ref(), &self.document, &strokes, &self.bus).await;
        }
    }
}

impl Drop for WriteQueue {
    fn drop(&mut self) {
        self.stop_idle_timer();
        if self.pending.lock().is_some() {
            tracing::warn!("Dropping unsaved strokes for {}", self.document);
        }
    }
}

impl std::fmt::Debug for WriteQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteQueue")
            .field("document", &self.document)
            .field("delay", &self.delay)
            .field("pending", &self.has_pending())
            .finish()
    }
}
