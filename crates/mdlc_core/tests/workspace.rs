use mdlc_core::service::image_upload::decode_data_uri;
use mdlc_core::{
    EntityKind, FormatError, ImportError, MemoryKeyValueStore, UploadCandidate, ValidationError,
    Workspace, WorkspaceConfig, WorkspaceError,
};
use serde_json::json;
use std::rc::Rc;
use uuid::Uuid;

fn open_workspace() -> Workspace<Rc<MemoryKeyValueStore>> {
    Workspace::open(Rc::new(MemoryKeyValueStore::new()), WorkspaceConfig::default())
}

fn png(name: &str, bytes: &[u8]) -> UploadCandidate {
    UploadCandidate {
        file_name: name.to_string(),
        mime_type: "image/png".to_string(),
        bytes: bytes.to_vec(),
    }
}

#[test]
fn upload_stores_valid_images_and_reports_rejections() {
    let mut config = WorkspaceConfig::default();
    config.images.max_bytes = 4;
    let mut workspace = Workspace::open(Rc::new(MemoryKeyValueStore::new()), config);

    let report = workspace
        .upload_images(vec![
            png("ok.png", b"abc"),
            UploadCandidate {
                file_name: "notes.txt".to_string(),
                mime_type: "text/plain".to_string(),
                bytes: b"x".to_vec(),
            },
            png("huge.png", b"too large"),
            UploadCandidate {
                mime_type: "IMAGE/JPEG".to_string(),
                ..png("photo.JPG", b"j")
            },
        ])
        .unwrap();

    assert_eq!(report.stored.len(), 2);
    assert_eq!(report.skipped.len(), 2);
    assert!(matches!(
        &report.skipped[0],
        ValidationError::UnsupportedMimeType { file_name, .. } if file_name == "notes.txt"
    ));
    assert!(matches!(
        &report.skipped[1],
        ValidationError::TooLarge { size: 9, max_bytes: 4, .. }
    ));

    let stored = workspace.images().get(report.stored[0]).unwrap();
    assert_eq!(stored.name, "ok.png");
    assert_eq!(stored.data, "data:image/png;base64,YWJj");
    assert_eq!(stored.size, 3);
    assert_eq!(
        workspace.images().get(report.stored[1]).unwrap().mime_type,
        "image/jpeg"
    );
}

#[test]
fn uploaded_image_renders_inside_current_file() {
    let mut workspace = open_workspace();
    let image_id = workspace.upload_images(vec![png("a.png", b"abc")]).unwrap().stored[0];
    let file = workspace
        .files_mut()
        .add_file("post.md", format!("# Post\n\n![a]({image_id})"), None)
        .unwrap();
    workspace.files_mut().set_current_file(file.id).unwrap();

    let html = workspace.render_current_file().unwrap();
    assert!(html.contains("<h1>Post</h1>"), "{html}");
    assert!(html.contains("data:image/png;base64,YWJj"), "{html}");
    assert_eq!(workspace.render_file(file.id).unwrap(), html);
}

#[test]
fn render_file_is_none_for_folders_and_unknown_ids() {
    let mut workspace = open_workspace();
    let folder = workspace.files_mut().add_folder("Docs", None).unwrap();

    assert!(workspace.render_file(folder.id).is_none());
    assert!(workspace.render_file(Uuid::new_v4()).is_none());
    assert!(workspace.render_current_file().is_none());
}

#[test]
fn image_usage_lists_referencing_files() {
    let mut workspace = open_workspace();
    let ids = workspace
        .upload_images(vec![png("a.png", b"a"), png("b.png", b"b")])
        .unwrap()
        .stored;
    let uses = workspace
        .files_mut()
        .add_file("uses.md", format!("![x]({})", ids[0]), None)
        .unwrap();
    workspace
        .files_mut()
        .add_file("plain.md", format!("id {} in prose", ids[0]), None)
        .unwrap();

    let usage: Vec<_> = workspace
        .image_usage(ids[0])
        .into_iter()
        .map(|item| item.id)
        .collect();
    assert_eq!(usage, vec![uses.id]);
    assert!(workspace.image_usage(ids[1]).is_empty());
}

#[test]
fn envelope_import_dispatches_on_kind() {
    let mut source = open_workspace();
    let folder = source.files_mut().add_folder("Docs", None).unwrap();
    source
        .files_mut()
        .add_file("a.md", "# A", Some(folder.id))
        .unwrap();
    let image_id = source.upload_images(vec![png("a.png", b"a")]).unwrap().stored[0];

    let items = source.export_subtree(folder.id).unwrap().unwrap();
    let images = source.export_images(&[image_id], "pics").unwrap();

    let mut target = open_workspace();
    let summary = target.import_envelope(&items.contents, None).unwrap();
    assert_eq!(summary.kind, EntityKind::Item);
    assert_eq!(summary.ids.len(), 2);
    let imported = target.files().get(summary.ids[1]).unwrap();
    assert_eq!(target.files().file_path(imported).unwrap(), "Docs/a.md");

    let summary = target.import_envelope(&images.contents, None).unwrap();
    assert_eq!(summary.kind, EntityKind::Image);
    assert_eq!(summary.ids, vec![image_id]);
    assert_eq!(target.images().get(image_id).unwrap().data, "data:image/png;base64,YQ==");
}

#[test]
fn single_file_import_lands_under_fallback_folder() {
    let mut source = open_workspace();
    let old_parent = source.files_mut().add_folder("Old", None).unwrap();
    let file = source
        .files_mut()
        .add_file("note.md", "x", Some(old_parent.id))
        .unwrap();
    let document = source.export_subtree(file.id).unwrap().unwrap();
    assert_eq!(document.file_name, "note.item.mdlc");

    let mut target = open_workspace();
    let inbox = target.files_mut().add_folder("Inbox", None).unwrap();
    let summary = target
        .import_envelope(&document.contents, Some(inbox.id))
        .unwrap();

    let imported = target.files().get(summary.ids[0]).unwrap();
    assert_eq!(imported.parent_id, Some(inbox.id));
}

#[test]
fn malformed_envelope_changes_nothing() {
    let mut workspace = open_workspace();
    workspace.files_mut().add_file("keep.md", "", None).unwrap();

    let err = workspace
        .import_envelope(r#"{"version":1,"type":"multiple","items":[{"name":3}]}"#, None)
        .unwrap_err();
    assert!(matches!(
        err,
        WorkspaceError::Import(ImportError::Format(FormatError::InvalidPayload { .. }))
    ));
    assert_eq!(workspace.files().len(), 1);
}

#[test]
fn envelope_file_requires_interchange_extension() {
    let dir = tempfile::tempdir().unwrap();
    let mut workspace = open_workspace();

    let wrong = dir.path().join("blocks.json");
    std::fs::write(&wrong, "{}").unwrap();
    assert!(matches!(
        workspace.import_envelope_file(&wrong, None),
        Err(WorkspaceError::Import(ImportError::Validation(
            ValidationError::WrongExtension { .. }
        )))
    ));

    let block_file = dir.path().join("team.parts.mdlc");
    std::fs::write(
        &block_file,
        r#"{"version":1,"type":"multiple","blocks":[{"name":"sig","content":"-- me"}]}"#,
    )
    .unwrap();
    let summary = workspace.import_envelope_file(&block_file, None).unwrap();
    assert_eq!(summary.kind, EntityKind::Block);
    assert_eq!(workspace.blocks().blocks()[0].name, "sig");
}

#[test]
fn markdown_import_and_export_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("Draft.md");
    std::fs::write(&source, "# Draft\n\nbody").unwrap();

    let mut workspace = open_workspace();
    let item = workspace.import_markdown_file(&source, None).unwrap();
    assert_eq!(item.name, "Draft.md");
    assert_eq!(item.content(), Some("# Draft\n\nbody"));

    let document = workspace.export_file_markdown(item.id).unwrap();
    assert_eq!(document.file_name, "Draft.md");
    assert_eq!(document.mime_type, "text/markdown");
    assert_eq!(document.contents, "# Draft\n\nbody");

    let not_markdown = dir.path().join("notes.txt");
    std::fs::write(&not_markdown, "x").unwrap();
    assert!(workspace.import_markdown_file(&not_markdown, None).is_err());
    assert_eq!(workspace.files().len(), 1);
}

#[test]
fn export_of_unknown_or_folder_items() {
    let mut workspace = open_workspace();
    let folder = workspace.files_mut().add_folder("Empty", None).unwrap();

    assert!(workspace.export_subtree(Uuid::new_v4()).unwrap().is_none());
    assert!(workspace.export_file_markdown(folder.id).is_none());
    let lone_folder = workspace.export_subtree(folder.id).unwrap().unwrap();
    assert_eq!(lone_folder.file_name, "empty.item.mdlc");
}

#[test]
fn block_export_uses_single_or_batch_envelope() {
    let mut workspace = open_workspace();
    let ids: Vec<_> = ["one", "two"]
        .into_iter()
        .map(|name| {
            workspace
                .blocks_mut()
                .add_block(mdlc_core::BlockDraft {
                    name: name.to_string(),
                    ..mdlc_core::BlockDraft::default()
                })
                .unwrap()
                .id
        })
        .collect();

    let single = workspace.export_blocks(&ids[..1], "ignored").unwrap();
    assert_eq!(single.file_name, "one.part.mdlc");
    let batch = workspace.export_blocks(&ids, "Team Parts").unwrap();
    assert_eq!(batch.file_name, "team-parts.parts.mdlc");
    assert!(workspace.render_block(ids[0]).is_some());
}

#[test]
fn stored_upload_decodes_back_to_original_bytes() {
    let mut workspace = open_workspace();
    let payload = vec![0x89, b'P', b'N', b'G', 0, 255];
    let id = workspace
        .upload_images(vec![png("raw.png", &payload)])
        .unwrap()
        .stored[0];

    let stored = workspace.images().get(id).unwrap();
    let (mime_type, bytes) = decode_data_uri(&stored.data).unwrap();
    assert_eq!(mime_type, "image/png");
    assert_eq!(bytes, payload);
    assert_eq!(stored.size, payload.len() as u64);
}

#[test]
fn batch_envelope_with_repeated_existing_id_upserts_in_place() {
    let mut workspace = open_workspace();
    let id = workspace.upload_images(vec![png("logo.png", b"a")]).unwrap().stored[0];
    let before = workspace.images().get(id).unwrap().clone();
    std::thread::sleep(std::time::Duration::from_millis(5));

    let envelope = json!({
        "version": 1,
        "type": "multiple",
        "images": [
            { "id": id, "name": "logo-v2.png", "data": "data:image/png;base64,Yg==", "type": "image/png" },
            { "id": id, "name": "logo-v3.png", "data": "data:image/png;base64,Yw==", "type": "image/png" }
        ]
    })
    .to_string();
    let summary = workspace.import_envelope(&envelope, None).unwrap();

    assert_eq!(summary.kind, EntityKind::Image);
    assert_eq!(summary.ids, vec![id, id]);
    assert_eq!(workspace.images().image_count(), 1);
    let after = workspace.images().get(id).unwrap();
    assert_eq!(after.name, "logo-v3.png");
    assert_eq!(after.data, "data:image/png;base64,Yw==");
    assert_eq!(after.created_at, before.created_at);
    assert!(after.updated_at > before.updated_at);
}
