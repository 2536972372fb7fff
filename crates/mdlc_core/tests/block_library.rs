use mdlc_core::{BlockDraft, BlockLibraryStore, BlockType, SkipReason};
use uuid::Uuid;

fn markdown_block(name: &str, content: &str, shortcut: Option<&str>) -> BlockDraft {
    BlockDraft {
        id: None,
        name: name.to_string(),
        kind: BlockType::Markdown,
        content: content.to_string(),
        shortcut: shortcut.map(str::to_string),
    }
}

#[test]
fn add_mints_id_and_upserts_known_id() {
    let mut store = BlockLibraryStore::in_memory();
    let block = store
        .add_block(markdown_block("Signature", "-- me", Some("Ctrl+S")))
        .unwrap();

    let mut replacement = markdown_block("Signature", "-- someone else", None);
    replacement.id = Some(block.id);
    store.add_block(replacement).unwrap();

    assert_eq!(store.blocks().len(), 1);
    let stored = store.get(block.id).unwrap();
    assert_eq!(stored.content, "-- someone else");
    assert_eq!(stored.shortcut, None);
}

#[test]
fn update_overwrites_fields_and_blank_shortcut_unbinds() {
    let mut store = BlockLibraryStore::in_memory();
    let block = store
        .add_block(markdown_block("Note", "x", Some("Alt+N")))
        .unwrap();

    let change = store
        .update_block(block.id, "Callout", "> note", Some("  ".to_string()))
        .unwrap();
    assert!(change.is_applied());

    let stored = store.get(block.id).unwrap();
    assert_eq!(stored.name, "Callout");
    assert_eq!(stored.content, "> note");
    assert_eq!(stored.shortcut, None);
    assert_eq!(stored.kind, BlockType::Markdown);
    assert!(store.block_for_shortcut("Alt+N").is_none());
}

#[test]
fn remove_and_update_skip_unknown_ids() {
    let mut store = BlockLibraryStore::in_memory();
    let ghost = Uuid::new_v4();

    assert_eq!(
        store.remove_block(ghost).unwrap().skip_reason(),
        Some(SkipReason::NotFound(ghost))
    );
    assert_eq!(
        store
            .update_block(ghost, "x", "y", None)
            .unwrap()
            .skip_reason(),
        Some(SkipReason::NotFound(ghost))
    );

    let block = store.add_block(markdown_block("a", "", None)).unwrap();
    assert!(store.remove_block(block.id).unwrap().is_applied());
    assert!(store.blocks().is_empty());
}

#[test]
fn import_blocks_keeps_insertion_order() {
    let mut store = BlockLibraryStore::in_memory();
    let ids = store
        .import_blocks(vec![
            markdown_block("first", "", None),
            markdown_block("second", "", None),
        ])
        .unwrap();

    let names: Vec<_> = store.blocks().iter().map(|block| block.name.as_str()).collect();
    assert_eq!(names, vec!["first", "second"]);
    assert_eq!(store.blocks()[0].id, ids[0]);
}

#[test]
fn html_block_shortcut_is_resolved_like_markdown() {
    let mut store = BlockLibraryStore::in_memory();
    let block = store
        .add_block(BlockDraft {
            kind: BlockType::Html,
            ..markdown_block("Badge", "<b>new</b>", Some("cmd+shift+b"))
        })
        .unwrap();

    let found = store.block_for_shortcut("Shift+Meta+B").unwrap();
    assert_eq!(found.id, block.id);
    assert!(store.shortcut_conflicts().is_empty());
}

#[test]
fn import_replaces_known_ids_in_place() {
    let mut store = BlockLibraryStore::in_memory();
    let first = store.add_block(markdown_block("first", "1", None)).unwrap();
    let second = store.add_block(markdown_block("second", "2", None)).unwrap();

    let mut edited = markdown_block("first v2", "1b", Some("Alt+1"));
    edited.id = Some(first.id);
    let ids = store
        .import_blocks(vec![edited, markdown_block("third", "3", None)])
        .unwrap();

    assert_eq!(ids[0], first.id);
    let names: Vec<_> = store.blocks().iter().map(|block| block.name.as_str()).collect();
    assert_eq!(names, vec!["first v2", "second", "third"]);
    assert_eq!(store.blocks()[1].id, second.id);
    assert_eq!(store.block_for_shortcut("alt+1").unwrap().id, first.id);
}
