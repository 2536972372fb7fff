//! Markdown to sanitized HTML.
//!
//! # Responsibility
//! - Render CommonMark with GFM tables, strikethrough and task lists.
//! - Resolve library image references (`![alt](<image-id>)`) to data URIs.
//! - Sanitize every produced fragment, including raw html blocks.
//!
//! # Invariants
//! - No rendering path returns HTML that skipped the sanitizer.
//! - Unresolved image ids render as a visible placeholder, never a broken
//!   `<img>`.

pub mod references;

pub use references::{files_using_image, referenced_image_ids};

use crate::model::block::{Block, BlockType};
use crate::model::image::{Image, ImageId};
use crate::storage::Persist;
use crate::store::image_library::{ImageLibraryState, ImageLibraryStore};
use once_cell::sync::Lazy;
use pulldown_cmark::{html, CowStr, Event, Options, Parser, Tag, TagEnd};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use uuid::Uuid;

/// CSS class carried by the placeholder of an unresolved image.
pub const MISSING_IMAGE_CLASS: &str = "mdlc-missing-image";

static DEFAULT_RENDERER: Lazy<MarkdownRenderer> = Lazy::new(MarkdownRenderer::default);

/// Markdown dialect switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RenderOptions {
    pub tables: bool,
    pub strikethrough: bool,
    pub task_lists: bool,
    /// Render single newlines as `<br>`.
    pub hard_breaks: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            tables: true,
            strikethrough: true,
            task_lists: true,
            hard_breaks: true,
        }
    }
}

impl RenderOptions {
    fn parser_options(self) -> Options {
        let mut options = Options::empty();
        if self.tables {
            options.insert(Options::ENABLE_TABLES);
        }
        if self.strikethrough {
            options.insert(Options::ENABLE_STRIKETHROUGH);
        }
        if self.task_lists {
            options.insert(Options::ENABLE_TASKLISTS);
        }
        options
    }
}

/// Looks up image payloads by id.
pub trait ImageSource {
    /// Data URI of `id`, if the image exists.
    fn image_data(&self, id: ImageId) -> Option<&str>;
}

impl ImageSource for BTreeMap<ImageId, Image> {
    fn image_data(&self, id: ImageId) -> Option<&str> {
        self.get(&id).map(|image| image.data.as_str())
    }
}

impl ImageSource for ImageLibraryState {
    fn image_data(&self, id: ImageId) -> Option<&str> {
        self.library.image_data(id)
    }
}

impl<P: Persist<ImageLibraryState>> ImageSource for ImageLibraryStore<P> {
    fn image_data(&self, id: ImageId) -> Option<&str> {
        self.library().image_data(id)
    }
}

impl<T: ImageSource + ?Sized> ImageSource for &T {
    fn image_data(&self, id: ImageId) -> Option<&str> {
        (**self).image_data(id)
    }
}

/// Markdown renderer with a preconfigured HTML sanitizer.
pub struct MarkdownRenderer {
    options: RenderOptions,
    sanitizer: ammonia::Builder<'static>,
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new(RenderOptions::default())
    }
}

impl MarkdownRenderer {
    pub fn new(options: RenderOptions) -> Self {
        Self {
            options,
            sanitizer: build_sanitizer(),
        }
    }

    pub fn options(&self) -> RenderOptions {
        self.options
    }

    /// Renders markdown, resolving library images through `images`.
    pub fn render<S: ImageSource + ?Sized>(&self, markdown: &str, images: &S) -> String {
        let parser = Parser::new_ext(markdown, self.options.parser_options());
        let events = rewrite_events(parser, images, self.options.hard_breaks);

        let mut unsafe_html = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut unsafe_html, events.into_iter());
        self.sanitize(&unsafe_html)
    }

    /// Renders a block: markdown through [`render`](Self::render), html
    /// through the sanitizer only.
    pub fn render_block<S: ImageSource + ?Sized>(&self, block: &Block, images: &S) -> String {
        match block.kind {
            BlockType::Markdown => self.render(&block.content, images),
            BlockType::Html => self.sanitize(&block.content),
        }
    }

    /// Strips scripts, event handlers and unsafe URLs from an HTML fragment.
    pub fn sanitize(&self, html: &str) -> String {
        self.sanitizer.clean(html).to_string()
    }
}

/// Renders with default options.
pub fn render<S: ImageSource + ?Sized>(markdown: &str, images: &S) -> String {
    DEFAULT_RENDERER.render(markdown, images)
}

/// Renders a block with default options.
pub fn render_block<S: ImageSource + ?Sized>(block: &Block, images: &S) -> String {
    DEFAULT_RENDERER.render_block(block, images)
}

fn build_sanitizer() -> ammonia::Builder<'static> {
    let mut builder = ammonia::Builder::default();
    builder
        .add_url_schemes(&["data"])
        .add_tags(&["input"])
        .add_tag_attributes("input", &["type", "checked", "disabled"])
        .add_tag_attributes("span", &["data-image-id"])
        .add_allowed_classes("span", &[MISSING_IMAGE_CLASS])
        .attribute_filter(|element, attribute, value| {
            let lowered = value.trim_start().to_ascii_lowercase();
            if !lowered.starts_with("data:") {
                return Some(Cow::Borrowed(value));
            }
            if element == "img" && attribute == "src" && lowered.starts_with("data:image/") {
                Some(Cow::Borrowed(value))
            } else {
                None
            }
        });
    builder
}

/// Image whose target did not resolve; its alt text is being collected.
struct PendingPlaceholder {
    target: String,
    alt: String,
    nested: usize,
}

impl PendingPlaceholder {
    fn into_event(self) -> Event<'static> {
        let label = if self.alt.trim().is_empty() {
            "missing image".to_string()
        } else {
            self.alt
        };
        Event::InlineHtml(CowStr::from(format!(
            "<span class=\"{MISSING_IMAGE_CLASS}\" data-image-id=\"{}\" title=\"Image not found\">{}</span>",
            ammonia::clean_text(&self.target),
            ammonia::clean_text(&label)
        )))
    }
}

fn rewrite_events<'a, S: ImageSource + ?Sized>(
    parser: Parser<'a>,
    images: &S,
    hard_breaks: bool,
) -> Vec<Event<'a>> {
    let mut events = Vec::new();
    let mut pending: Option<PendingPlaceholder> = None;

    for event in parser {
        if let Some(placeholder) = pending.as_mut() {
            let mut finished = false;
            match event {
                Event::Start(Tag::Image { .. }) => placeholder.nested += 1,
                Event::End(TagEnd::Image) if placeholder.nested > 0 => placeholder.nested -= 1,
                Event::End(TagEnd::Image) => finished = true,
                Event::Text(text) | Event::Code(text) => placeholder.alt.push_str(&text),
                _ => {}
            }
            if finished {
                if let Some(done) = pending.take() {
                    events.push(done.into_event());
                }
            }
            continue;
        }

        match event {
            Event::Start(Tag::Image {
                link_type,
                dest_url,
                title,
                id,
            }) => {
                if is_passthrough_target(&dest_url) {
                    events.push(Event::Start(Tag::Image {
                        link_type,
                        dest_url,
                        title,
                        id,
                    }));
                } else if let Some(data) = resolve_library_image(images, &dest_url) {
                    events.push(Event::Start(Tag::Image {
                        link_type,
                        dest_url: CowStr::from(data.to_string()),
                        title,
                        id,
                    }));
                } else {
                    pending = Some(PendingPlaceholder {
                        target: dest_url.to_string(),
                        alt: String::new(),
                        nested: 0,
                    });
                }
            }
            Event::SoftBreak if hard_breaks => events.push(Event::HardBreak),
            other => events.push(other),
        }
    }

    if let Some(unterminated) = pending.take() {
        events.push(unterminated.into_event());
    }
    events
}

fn is_passthrough_target(target: &str) -> bool {
    let lowered = target.trim_start().to_ascii_lowercase();
    lowered.starts_with("http://") || lowered.starts_with("https://") || lowered.starts_with("data:")
}

fn resolve_library_image<'s, S: ImageSource + ?Sized>(images: &'s S, target: &str) -> Option<&'s str> {
    let id = Uuid::parse_str(target.trim()).ok()?;
    images.image_data(id)
}
