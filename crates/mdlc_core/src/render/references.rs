//! Image references embedded in markdown bodies.

use crate::model::image::ImageId;
use crate::model::item::Item;
use once_cell::sync::Lazy;
use regex::Regex;
use uuid::Uuid;

static MARKDOWN_IMAGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"!\[[^\]]*]\(\s*<?([^)\s>]+)>?(?:\s+"[^"]*")?\s*\)"#).expect("valid image regex")
});

/// Library image ids referenced by `![alt](<id>)`, first occurrence order,
/// without duplicates. URL and data-URI targets are ignored.
pub fn referenced_image_ids(markdown: &str) -> Vec<ImageId> {
    let mut ids = Vec::new();
    for captures in MARKDOWN_IMAGE_RE.captures_iter(markdown) {
        let Some(target) = captures.get(1) else {
            continue;
        };
        if let Ok(id) = Uuid::parse_str(target.as_str()) {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
    }
    ids
}

/// Files whose content references image `id`.
pub fn files_using_image<'a, I>(items: I, id: ImageId) -> Vec<&'a Item>
where
    I: IntoIterator<Item = &'a Item>,
{
    items
        .into_iter()
        .filter(|item| {
            item.content()
                .is_some_and(|content| referenced_image_ids(content).contains(&id))
        })
        .collect()
}
