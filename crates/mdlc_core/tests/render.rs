use mdlc_core::render::MISSING_IMAGE_CLASS;
use mdlc_core::{
    render, render_block, BlockDraft, BlockType, ImageDraft, ImageLibraryStore, MarkdownRenderer,
    RenderOptions,
};
use uuid::Uuid;

fn library_with_logo() -> (ImageLibraryStore, Uuid) {
    let mut images = ImageLibraryStore::in_memory();
    let id = images
        .add_images(vec![ImageDraft {
            name: "logo.png".to_string(),
            data: "data:image/png;base64,AAAA".to_string(),
            size: 3,
            mime_type: "image/png".to_string(),
            ..ImageDraft::default()
        }])
        .unwrap()[0];
    (images, id)
}

#[test]
fn library_image_reference_resolves_to_data_uri() {
    let (images, id) = library_with_logo();
    let html = render(&format!("![logo]({id})"), &images);

    assert!(html.contains("<img"), "{html}");
    assert!(html.contains("src=\"data:image/png;base64,AAAA\""), "{html}");
    assert!(html.contains("alt=\"logo\""), "{html}");
    assert!(!html.contains(&id.to_string()));
}

#[test]
fn unknown_image_id_renders_placeholder_instead_of_img() {
    let images = ImageLibraryStore::in_memory();
    let ghost = Uuid::new_v4();
    let html = render(&format!("before ![diagram]({ghost}) after"), &images);

    assert!(!html.contains("<img"), "{html}");
    assert!(html.contains(MISSING_IMAGE_CLASS), "{html}");
    assert!(html.contains(&ghost.to_string()), "{html}");
    assert!(html.contains("diagram"), "{html}");
    assert!(html.contains("before") && html.contains("after"));
}

#[test]
fn placeholder_target_cannot_inject_markup() {
    let images = ImageLibraryStore::in_memory();
    let html = render("![x](<\"><script>alert(1)</script>>)", &images);

    assert!(!html.contains("<script"), "{html}");
    assert!(!html.contains("<img"), "{html}");
}

#[test]
fn absolute_and_embedded_urls_pass_through() {
    let images = ImageLibraryStore::in_memory();
    let html = render(
        "![remote](https://example.com/a.png) ![inline](data:image/gif;base64,R0lG)",
        &images,
    );

    assert!(html.contains("src=\"https://example.com/a.png\""), "{html}");
    assert!(html.contains("src=\"data:image/gif;base64,R0lG\""), "{html}");
}

#[test]
fn scripts_handlers_and_unsafe_urls_are_stripped() {
    let images = ImageLibraryStore::in_memory();
    let markdown = "\
<script>alert('x')</script>

<div onclick=\"steal()\">hello</div>

<img src=\"https://example.com/a.png\" onerror=\"steal()\">

[click](javascript:steal())

[page](data:text/html;base64,PHNjcmlwdD4=)
";
    let html = render(markdown, &images);

    assert!(!html.contains("<script"), "{html}");
    assert!(!html.contains("alert"), "{html}");
    assert!(!html.contains("onclick"), "{html}");
    assert!(!html.contains("onerror"), "{html}");
    assert!(!html.contains("javascript:"), "{html}");
    assert!(!html.contains("data:text/html"), "{html}");
    assert!(html.contains("hello"));
    assert!(html.contains("click"));
}

#[test]
fn gfm_extensions_are_enabled_by_default() {
    let images = ImageLibraryStore::in_memory();
    let markdown = "\
| a | b |
|---|---|
| 1 | 2 |

~~gone~~

- [x] done
- [ ] todo
";
    let html = render(markdown, &images);

    assert!(html.contains("<table>"), "{html}");
    assert!(html.contains("<td>1</td>"), "{html}");
    assert!(html.contains("<del>gone</del>"), "{html}");
    assert!(html.contains("type=\"checkbox\""), "{html}");
    assert!(html.contains("checked"), "{html}");
}

#[test]
fn disabled_extensions_render_as_plain_text() {
    let images = ImageLibraryStore::in_memory();
    let renderer = MarkdownRenderer::new(RenderOptions {
        tables: false,
        strikethrough: false,
        task_lists: false,
        hard_breaks: false,
    });
    let html = renderer.render("~~kept~~\n\n- [ ] todo", &images);

    assert!(html.contains("~~kept~~"), "{html}");
    assert!(!html.contains("checkbox"), "{html}");
}

#[test]
fn html_blocks_are_sanitized_and_markdown_blocks_rendered() {
    let (images, id) = library_with_logo();

    let html_block = BlockDraft {
        name: "badge".to_string(),
        kind: BlockType::Html,
        content: "<b onmouseover=\"x()\">new</b><script>x()</script>".to_string(),
        ..BlockDraft::default()
    }
    .into_block(Uuid::new_v4());
    let rendered = render_block(&html_block, &images);
    assert_eq!(rendered, "<b>new</b>");

    let markdown_block = BlockDraft {
        name: "logo".to_string(),
        kind: BlockType::Markdown,
        content: format!("**brand** ![logo]({id})"),
        ..BlockDraft::default()
    }
    .into_block(Uuid::new_v4());
    let rendered = render_block(&markdown_block, &images);
    assert!(rendered.contains("<strong>brand</strong>"), "{rendered}");
    assert!(rendered.contains("data:image/png;base64,AAAA"), "{rendered}");
}
