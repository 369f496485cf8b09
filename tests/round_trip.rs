//! Stored draft round-trip and corrupt record rejection.

use funnel_drafts::persistence::{load_document, store_document};
use funnel_drafts::{
    default_funnel, BlockKind, Document, DocumentId, DraftError, DraftStore, EditorConfig,
    EditorSession, ErrorKind, ManualClock, MemoryStorage, PersistenceRecord, SaveStatus,
    StorageAdapter,
};
use proptest::prelude::*;
use serde_json::json;
use std::sync::Arc;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

#[derive(Clone, Debug)]
enum Edit {
    AddBlock { page: usize, kind: usize },
    Update { block: usize, content: String, count: i64 },
    Delete { block: usize },
    Reorder { page: usize, from: usize, to: usize },
    AddPage { name: String },
}

const KINDS: &[&str] = &[
    "text", "heading", "image", "button", "quiz-question", "pricing", "custom-widget",
];

fn edit_strategy() -> impl Strategy<Value = Edit> {
    prop_oneof![
        (0usize..4, 0usize..KINDS.len()).prop_map(|(page, kind)| Edit::AddBlock { page, kind }),
        (0usize..16, "[a-zA-Z0-9 ]{0,24}", any::<i64>())
            .prop_map(|(block, content, count)| Edit::Update { block, content, count }),
        (0usize..16).prop_map(|block| Edit::Delete { block }),
        (0usize..4, 0usize..8, 0usize..12)
            .prop_map(|(page, from, to)| Edit::Reorder { page, from, to }),
        "[A-Z][a-z]{0,10}".prop_map(|name| Edit::AddPage { name }),
    ]
}

fn apply(draft: &mut DraftStore, edit: &Edit) {
    let doc = draft.document();
    let page_id = |i: usize| doc.pages[i % doc.pages.len()].id.clone();
    let block_id = |i: usize| {
        let blocks: Vec<_> = doc.pages.iter().flat_map(|p| &p.blocks).collect();
        (!blocks.is_empty()).then(|| blocks[i % blocks.len()].id.clone())
    };

    match edit {
        Edit::AddBlock { page, kind } => {
            draft.add_block(&page_id(*page), BlockKind::parse(KINDS[*kind]));
        }
        Edit::Update {
            block,
            content,
            count,
        } => {
            if let Some(id) = block_id(*block) {
                let partial = json!({ "content": content, "count": count });
                draft.update_block(&id, partial.as_object().unwrap());
            }
        }
        Edit::Delete { block } => {
            if let Some(id) = block_id(*block) {
                draft.delete_block(&id);
            }
        }
        Edit::Reorder { page, from, to } => {
            draft.reorder_blocks(&page_id(*page), *from, *to);
        }
        Edit::AddPage { name } => {
            draft.add_page(name, "question");
        }
    }
}

proptest! {
    #[test]
    fn prop_stored_draft_loads_back_equal(edits in prop::collection::vec(edit_strategy(), 0..40)) {
        let mut draft = DraftStore::new(default_funnel(DocumentId::from("prop")));
        for edit in &edits {
            apply(&mut draft, edit);
        }

        let storage = StorageAdapter::new(MemoryStorage::unbounded());
        let doc = draft.document();
        store_document(&storage, &doc).unwrap();
        let loaded = load_document(&storage, &doc.id).unwrap().unwrap();

        prop_assert_eq!(&loaded, &*doc);
        prop_assert!(loaded.validate().is_ok());
    }
}

#[test]
fn test_unknown_block_fields_survive() {
    let storage = StorageAdapter::new(MemoryStorage::new());
    let mut doc = Document::empty(DocumentId::from("extra"));
    let raw_block = json!({
        "id": "b1",
        "type": "carousel",
        "order": 0,
        "slides": [{ "src": "a.png" }, { "src": "b.png" }],
        "autoplay": true,
    });
    doc.pages[0]
        .blocks
        .push(serde_json::from_value(raw_block.clone()).unwrap());

    store_document(&storage, &doc).unwrap();
    let loaded = load_document(&storage, &doc.id).unwrap().unwrap();
    let block = &loaded.pages[0].blocks[0];
    assert_eq!(block.kind, BlockKind::Other("carousel".into()));
    assert_eq!(serde_json::to_value(block).unwrap(), raw_block);
}

// --- Corrupt Records ---

#[test]
fn test_truncated_record_leaves_draft_unchanged() {
    init_tracing();
    let storage = Arc::new(StorageAdapter::new(MemoryStorage::new()));
    let mut session = EditorSession::open_with_clock(
        EditorConfig::default(),
        storage.clone(),
        DocumentId::from("quiz"),
        Arc::new(ManualClock::new()),
    )
    .unwrap();
    session.add_page("Unsaved", "question");
    let before = session.document();
    let revision = session.revision();

    let raw = PersistenceRecord::encode(&default_funnel(DocumentId::from("quiz"))).unwrap();
    storage
        .set("document:quiz", &raw[..raw.len() / 2])
        .unwrap();

    let err = session.reload().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CorruptRecord);
    assert!(Arc::ptr_eq(&before, &session.document()));
    assert_eq!(session.revision(), revision);
    assert!(session.recovery().is_some());
    assert!(matches!(session.status(), SaveStatus::CorruptRecord { .. }));
}

#[test]
fn test_reload_adopts_valid_record() {
    init_tracing();
    let storage = Arc::new(StorageAdapter::new(MemoryStorage::new()));
    let mut session = EditorSession::open_with_clock(
        EditorConfig::default(),
        storage.clone(),
        DocumentId::from("quiz"),
        Arc::new(ManualClock::new()),
    )
    .unwrap();

    let mut stored = Document::empty(DocumentId::from("quiz"));
    stored.name = "From storage".into();
    storage
        .set("document:quiz", &PersistenceRecord::encode(&stored).unwrap())
        .unwrap();

    assert!(session.reload().unwrap());
    let doc = session.document();
    assert_eq!(doc.name, "From storage");
    assert_eq!(doc.pages.len(), stored.pages.len());
    assert!(session.recovery().is_none());
}

#[test]
fn test_structurally_invalid_records_rejected() {
    init_tracing();
    let storage = StorageAdapter::new(MemoryStorage::new());
    let id = DocumentId::from("quiz");

    let mut dup = default_funnel(id.clone());
    let first = dup.pages[0].blocks[0].clone();
    dup.pages[2].blocks.push(first);

    let cases = [
        json!({ "document": default_funnel(id.clone()) }).to_string(),
        json!({ "schemaVersion": 2, "document": default_funnel(id.clone()) }).to_string(),
        json!({ "schemaVersion": 1, "document": { "id": "quiz", "pages": "nope" } }).to_string(),
        json!({ "schemaVersion": 1, "document": dup }).to_string(),
        "null".to_string(),
    ];

    for raw in cases {
        storage.set("document:quiz", &raw).unwrap();
        let err = load_document(&storage, &id).unwrap_err();
        assert!(
            matches!(err, DraftError::CorruptRecord { .. }),
            "accepted {}",
            raw
        );
    }
}

#[test]
fn test_session_offers_recovery_for_corrupt_draft() {
    init_tracing();
    let storage = Arc::new(StorageAdapter::new(MemoryStorage::new()));
    storage.set("document:quiz", "{\"schemaVersion\":1,\"document\":{\"id\"").unwrap();

    let mut session = EditorSession::open_with_clock(
        EditorConfig::default(),
        storage.clone(),
        DocumentId::from("quiz"),
        Arc::new(ManualClock::new()),
    )
    .unwrap();

    let recovery = session.recovery().unwrap();
    assert!(!recovery.reason.is_empty());
    assert_eq!(session.status().label(), "Saved draft could not be read");

    assert!(session.start_fresh().is_saved());
    assert!(session.recovery().is_none());
    assert!(load_document(&storage, &DocumentId::from("quiz")).unwrap().is_some());
}
