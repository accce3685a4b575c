//! Id generation: a time-sortable UUIDv7, optionally prefixed with a short
//! slug derived from a title for readability in logs and CLI output.

use uuid::Uuid;

pub fn generate_id() -> String {
    Uuid::now_v7().to_string()
}

/// `<slug>-<uuid>` where slug is the first few lowercase-hyphenated words of
/// `title`. Falls back to a bare uuid when `title` has no alphanumeric
/// content.
pub fn generate_slugged_id(title: &str) -> String {
    let slug = slugify(title);
    let uuid = Uuid::now_v7();
    if slug.is_empty() {
        uuid.to_string()
    } else {
        format!("{slug}-{uuid}")
    }
}

fn slugify(title: &str) -> String {
    let words: Vec<String> = title
        .split_whitespace()
        .take(4)
        .map(|w| w.chars().filter(|c| c.is_alphanumeric()).collect::<String>().to_lowercase())
        .filter(|w| !w.is_empty())
        .collect();
    words.join("-")
}
