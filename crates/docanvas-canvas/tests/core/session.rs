use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use docanvas_canvas::conversation::{
    ChatReply, ChatRequest, ChatService, ContextScope, MessageStatus, Role,
    CHAT_UNAVAILABLE_PLACEHOLDER,
};
use docanvas_canvas::input::{FocusTarget, KeyEvent, Modifiers, PointerEvent, PointerKind};
use docanvas_canvas::model::{ScreenRect, WorldPoint};
use docanvas_canvas::persistence::{LocalNodeCache, MemoryStore};
use docanvas_canvas::selection::SelectionEntry;
use docanvas_canvas::session::{AutoConfirm, Collaborators, SessionManager};
use docanvas_canvas::strokes::Tool;
use docanvas_core::{
    CanvasEvent, ChatError, DocumentId, Error, EventCategory, EventFilter, PersistenceEvent,
    Result, SessionEvent,
};
use docanvas_settings::CanvasConfig;

/// Replies with the number of messages it was sent.
struct CountingChat;

#[async_trait]
impl ChatService for CountingChat {
    async fn chat(&self, request: ChatRequest) -> Result<ChatReply> {
        Ok(ChatReply {
            reply: format!("seen {} messages", request.messages.len()),
            first_user_message_override: None,
        })
    }
}

struct DownChat;

#[async_trait]
impl ChatService for DownChat {
    async fn chat(&self, _request: ChatRequest) -> Result<ChatReply> {
        Err(ChatError::Unavailable {
            reason: "503".to_string(),
        }
        .into())
    }
}

fn manager(store: Arc<MemoryStore>, chat: Arc<dyn ChatService>) -> SessionManager {
    SessionManager::new(
        CanvasConfig::default(),
        Collaborators {
            strokes: store.clone(),
            nodes: store.clone(),
            chats: store,
            chat,
            confirm: Arc::new(AutoConfirm(true)),
            cache: None,
        },
    )
}

fn record(manager: &SessionManager, categories: Vec<EventCategory>) -> Arc<Mutex<Vec<CanvasEvent>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    manager
        .bus()
        .subscribe(EventFilter::Categories(categories), move |e| {
            sink.lock().unwrap().push(e)
        });
    seen
}

#[tokio::test(start_paused = true)]
async fn test_stroke_saves_are_debounced() {
    let store = Arc::new(MemoryStore::new());
    let doc = DocumentId::new("doc-1");
    let mut mgr = manager(store.clone(), Arc::new(CountingChat));
    mgr.open_document(doc.clone()).await.unwrap();

    let session = mgr.active_mut().unwrap();
    session.select_tool(Tool::Pen);
    for i in 0..3 {
        let y = 10.0 * i as f64;
        session
            .handle_pointer(PointerEvent::mouse(PointerKind::Down, 0.0, y))
            .await;
        session
            .handle_pointer(PointerEvent::mouse(PointerKind::Move, 50.0, y))
            .await;
        session
            .handle_pointer(PointerEvent::mouse(PointerKind::Up, 50.0, y))
            .await;
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
    assert_eq!(store.stroke_save_count(), 0);

    tokio::time::sleep(Duration::from_millis(1500)).await;
    tokio::task::yield_now().await;
    assert_eq!(store.stroke_save_count(), 1);
    assert_eq!(store.strokes_for(&doc).len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_switching_documents_flushes_pending_strokes() {
    let store = Arc::new(MemoryStore::new());
    let doc = DocumentId::new("doc-1");
    let mut mgr = manager(store.clone(), Arc::new(CountingChat));
    mgr.open_document(doc.clone()).await.unwrap();

    let session = mgr.active_mut().unwrap();
    session.select_tool(Tool::Highlighter);
    session
        .handle_pointer(PointerEvent::mouse(PointerKind::Down, 0.0, 0.0))
        .await;
    session
        .handle_pointer(PointerEvent::mouse(PointerKind::Move, 80.0, 0.0))
        .await;
    session
        .handle_pointer(PointerEvent::mouse(PointerKind::Up, 80.0, 0.0))
        .await;
    assert!(session.has_unsaved_strokes());

    mgr.open_document(DocumentId::new("doc-2")).await.unwrap();
    assert_eq!(store.strokes_for(&doc).len(), 1);
    assert_eq!(mgr.active().unwrap().strokes().strokes().len(), 0);
}

#[tokio::test]
async fn test_undo_shortcut_saves_and_is_suppressed_while_typing() {
    let store = Arc::new(MemoryStore::new());
    let mut mgr = manager(store, Arc::new(CountingChat));
    mgr.open_document(DocumentId::new("doc")).await.unwrap();
    let session = mgr.active_mut().unwrap();
    session.select_tool(Tool::Pen);
    session
        .handle_pointer(PointerEvent::mouse(PointerKind::Down, 0.0, 0.0))
        .await;
    session
        .handle_pointer(PointerEvent::mouse(PointerKind::Move, 5.0, 5.0))
        .await;
    session
        .handle_pointer(PointerEvent::mouse(PointerKind::Up, 5.0, 5.0))
        .await;

    let typing = KeyEvent::new("z", Modifiers::CTRL, FocusTarget::TextInput);
    assert_eq!(session.handle_key(&typing), None);
    assert_eq!(session.strokes().strokes().len(), 1);

    let undo = KeyEvent::new("z", Modifiers::CTRL, FocusTarget::Canvas);
    assert!(session.handle_key(&undo).is_some());
    assert_eq!(session.strokes().strokes().len(), 0);
    assert_eq!(session.strokes().redo_buffer().len(), 1);
}

#[tokio::test]
async fn test_stale_load_is_discarded() {
    let store = Arc::new(MemoryStore::new());
    let mut mgr = manager(store, Arc::new(CountingChat));
    let events = record(&mgr, vec![EventCategory::Session]);

    mgr.open_document(DocumentId::new("doc-1")).await.unwrap();
    let stale = mgr.active().unwrap().ticket();
    mgr.open_document(DocumentId::new("doc-2")).await.unwrap();

    assert!(!mgr.is_current(&stale));
    assert!(!mgr.complete_stroke_load(&stale, Ok(Vec::new())));
    assert!(!mgr.complete_node_load(&stale, Ok(Vec::new())).await);

    let discarded = events
        .lock()
        .unwrap()
        .iter()
        .filter(|e| matches!(e, CanvasEvent::Session(SessionEvent::StaleResponseDiscarded { .. })))
        .count();
    assert_eq!(discarded, 2);
}

#[tokio::test]
async fn test_stale_chat_reply_is_discarded() {
    let store = Arc::new(MemoryStore::new());
    let mut mgr = manager(store, Arc::new(CountingChat));
    mgr.open_document(DocumentId::new("doc-1")).await.unwrap();

    let pending = mgr
        .active_mut()
        .unwrap()
        .begin_chat("hello", &ContextScope::FullDocument, 100)
        .unwrap();
    mgr.open_document(DocumentId::new("doc-2")).await.unwrap();

    let reply = Ok(ChatReply {
        reply: "late".to_string(),
        first_user_message_override: None,
    });
    assert!(!mgr.complete_chat(pending, reply).await);
    assert!(mgr.active().unwrap().conversation().is_empty());
}

#[tokio::test]
async fn test_node_save_falls_back_to_local_cache() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::new());
    let doc = DocumentId::new("doc");
    let cache = LocalNodeCache::new(dir.path());
    let mut mgr = SessionManager::new(
        CanvasConfig::default(),
        Collaborators {
            strokes: store.clone(),
            nodes: store.clone(),
            chats: store.clone(),
            chat: Arc::new(CountingChat),
            confirm: Arc::new(AutoConfirm(true)),
            cache: Some(cache.clone()),
        },
    );
    let events = record(&mgr, vec![EventCategory::Persistence]);
    mgr.open_document(doc.clone()).await.unwrap();

    store.set_offline(true);
    let node = mgr
        .active_mut()
        .unwrap()
        .create_node("p-1", WorldPoint::new(5.0, 5.0), vec![], "<p>hi</p>")
        .await;

    assert!(store.nodes_for(&doc).is_empty());
    let cached = cache.load(&doc).await.unwrap();
    assert_eq!(cached.len(), 1);
    assert_eq!(cached[0].id, node.id);
    assert!(events.lock().unwrap().iter().any(|e| matches!(
        e,
        CanvasEvent::Persistence(PersistenceEvent::CachedLocally { node_id }) if *node_id == node.id
    )));

    // Reopening while the store is still down restores from the cache.
    mgr.open_document(doc.clone()).await.unwrap();
    assert_eq!(mgr.active().unwrap().nodes().len(), 1);
}

#[tokio::test]
async fn test_delete_needs_confirmation_and_remote_success() {
    let store = Arc::new(MemoryStore::new());
    let doc = DocumentId::new("doc");
    let confirm = Arc::new(AutoConfirm(false));
    let mut mgr = SessionManager::new(
        CanvasConfig::default(),
        Collaborators {
            strokes: store.clone(),
            nodes: store.clone(),
            chats: store.clone(),
            chat: Arc::new(CountingChat),
            confirm,
            cache: None,
        },
    );
    mgr.open_document(doc.clone()).await.unwrap();
    let session = mgr.active_mut().unwrap();
    let node = session
        .create_node("p-1", WorldPoint::new(0.0, 0.0), vec![], "")
        .await;

    assert!(!session.delete_node(node.id).await.unwrap());
    assert_eq!(session.nodes().len(), 1);
    assert_eq!(store.nodes_for(&doc).len(), 1);
}

#[tokio::test]
async fn test_delete_failure_keeps_node() {
    let store = Arc::new(MemoryStore::new());
    let doc = DocumentId::new("doc");
    let mut mgr = manager(store.clone(), Arc::new(CountingChat));
    mgr.open_document(doc.clone()).await.unwrap();
    let session = mgr.active_mut().unwrap();
    let node = session
        .create_node("p-1", WorldPoint::new(0.0, 0.0), vec![], "")
        .await;
    session.open_node_conversation(node.id).unwrap();

    store.set_offline(true);
    assert!(session.delete_node(node.id).await.is_err());
    assert_eq!(session.nodes().len(), 1);

    store.set_offline(false);
    assert!(session.delete_node(node.id).await.unwrap());
    assert!(session.nodes().is_empty());
    assert!(store.nodes_for(&doc).is_empty());
    assert_eq!(session.conversation().bound_node(), None);
}

#[tokio::test]
async fn test_chat_round_trip_consumes_selection() {
    let store = Arc::new(MemoryStore::new());
    let mut mgr = manager(store, Arc::new(CountingChat));
    mgr.open_document(DocumentId::new("doc")).await.unwrap();
    let session = mgr.active_mut().unwrap();
    session.toggle_fragment(SelectionEntry::new("p-3", "<p>three</p>"));
    session.toggle_fragment(SelectionEntry::new("p-7", "<p>seven</p>"));

    mgr.send_chat("compare these", &ContextScope::Selection, 500)
        .await
        .unwrap();

    let session = mgr.active().unwrap();
    let messages = session.conversation().messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].text, "@p-3 @p-7 compare these");
    assert_eq!(messages[0].status, MessageStatus::Confirmed);
    assert_eq!(messages[1].role, Role::Assistant);
    assert_eq!(messages[1].text, "seen 1 messages");
    assert!(session.selection().is_empty());
    assert!(!session.conversation().thinking().is_active());
}

#[tokio::test]
async fn test_chat_failure_shows_placeholder() {
    let store = Arc::new(MemoryStore::new());
    let mut mgr = manager(store, Arc::new(DownChat));
    mgr.open_document(DocumentId::new("doc")).await.unwrap();

    mgr.send_chat("anyone there?", &ContextScope::FullDocument, 10)
        .await
        .unwrap();

    let conversation = mgr.active().unwrap().conversation();
    let last = conversation.messages().last().unwrap();
    assert_eq!(last.role, Role::Assistant);
    assert_eq!(last.text, CHAT_UNAVAILABLE_PLACEHOLDER);
    assert!(!conversation.thinking().is_active());
}

#[tokio::test]
async fn test_invalid_range_rolls_back() {
    let store = Arc::new(MemoryStore::new());
    let mut mgr = manager(store, Arc::new(CountingChat));
    mgr.open_document(DocumentId::new("doc")).await.unwrap();
    mgr.active_mut()
        .unwrap()
        .toggle_fragment(SelectionEntry::new("p-1", ""));

    let err = mgr
        .send_chat("summarize", &ContextScope::Custom { start: 50, end: 10 }, 100)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Chat(ChatError::InvalidRange { .. })));

    let session = mgr.active().unwrap();
    assert!(session.conversation().is_empty());
    assert_eq!(session.selection().len(), 1);
}

#[tokio::test]
async fn test_empty_message_is_rejected() {
    let store = Arc::new(MemoryStore::new());
    let mut mgr = manager(store, Arc::new(CountingChat));
    mgr.open_document(DocumentId::new("doc")).await.unwrap();
    let err = mgr
        .send_chat("   ", &ContextScope::FullDocument, 10)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Chat(ChatError::EmptyMessage)));
}

#[tokio::test]
async fn test_node_from_fragment_is_wired() {
    let store = Arc::new(MemoryStore::new());
    let mut mgr = manager(store, Arc::new(CountingChat));
    mgr.open_document(DocumentId::new("doc")).await.unwrap();
    let session = mgr.active_mut().unwrap();

    let mut layout = HashMap::new();
    layout.insert("p-2".to_string(), ScreenRect::new(400.0, 120.0, 300.0, 40.0));
    session.set_fragment_resolver(Arc::new(layout));

    let entry = SelectionEntry::new("p-2", "<p>two</p>");
    let node = session.create_node_for_fragment(&entry, vec![]).await.unwrap();
    assert_eq!(node.position(), WorldPoint::new(386.0, 106.0));
    assert_eq!(session.wires().wires().len(), 1);

    let missing = SelectionEntry::new("p-9", "");
    assert!(session.create_node_for_fragment(&missing, vec![]).await.is_err());
}

#[tokio::test]
async fn test_chat_threads_are_kept_per_document() {
    let store = Arc::new(MemoryStore::new());
    let doc = DocumentId::new("doc");
    let mut mgr = manager(store.clone(), Arc::new(CountingChat));
    mgr.open_document(doc.clone()).await.unwrap();

    let first = {
        let session = mgr.active().unwrap();
        assert_eq!(session.chat_history().chats().len(), 1);
        session.chat_history().active_id().unwrap()
    };
    mgr.send_chat("first question", &ContextScope::FullDocument, 10)
        .await
        .unwrap();

    let session = mgr.active_mut().unwrap();
    let second = session.new_chat().await;
    assert!(session.conversation().is_empty());
    assert_eq!(session.chat_history().get(second).unwrap().name, "Chat 2");

    session.select_chat(first).unwrap();
    assert_eq!(session.conversation().messages().len(), 2);
    assert!(session.select_chat(uuid::Uuid::new_v4()).is_err());

    let stored = store.chats_for(&doc);
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].messages.len(), 2);

    // Reopening restores both threads with the first one active.
    mgr.open_document(doc.clone()).await.unwrap();
    let session = mgr.active_mut().unwrap();
    assert_eq!(session.chat_history().chats().len(), 2);
    assert_eq!(session.chat_history().active_id(), Some(first));
    assert_eq!(session.conversation().messages()[0].text, "first question");

    assert!(session.delete_chat(first).await.unwrap());
    assert_eq!(session.chat_history().active_id(), Some(second));
    assert!(session.conversation().is_empty());
    assert_eq!(store.chats_for(&doc).len(), 1);
}

#[tokio::test]
async fn test_configured_cache_takes_failed_node_saves() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::new());
    let doc = DocumentId::new("doc");
    let mut config = CanvasConfig::default();
    config.cache.directory = Some(dir.path().join("nodes"));

    let collaborators = Collaborators {
        strokes: store.clone(),
        nodes: store.clone(),
        chats: store.clone(),
        chat: Arc::new(CountingChat),
        confirm: Arc::new(AutoConfirm(true)),
        cache: None,
    }
    .with_config_cache(&config)
    .unwrap();
    let mut mgr = SessionManager::new(config, collaborators);
    mgr.open_document(doc.clone()).await.unwrap();

    store.set_offline(true);
    let node = mgr
        .active_mut()
        .unwrap()
        .create_node("p-1", WorldPoint::new(1.0, 1.0), vec![], "")
        .await;

    let cached = LocalNodeCache::new(dir.path().join("nodes"))
        .load(&doc)
        .await
        .unwrap();
    assert_eq!(cached.len(), 1);
    assert_eq!(cached[0].id, node.id);
}
