//! Stage 4: identifier extractor. Extracts an integer id, a title
//! string, or the `__ALL__` bulk sentinel.

pub const ALL_SENTINEL: &str = "__ALL__";

const BULK_WORDS: &[&str] = &["all", "every", "each", "entire"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Identifier {
    Numeric(i64),
    Title(String),
    All,
}

/// Returns the extracted identifier and a confidence in `[0.0, 1.0]`. A bulk
/// keyword yields `Identifier::All` at high confidence.
pub fn extract_identifier(text: &str) -> (Option<Identifier>, f32) {
    let lower = text.to_lowercase();

    if BULK_WORDS.iter().any(|w| contains_word(&lower, w)) {
        return (Some(Identifier::All), 0.97);
    }

    if let Some(n) = text.split_whitespace().find_map(|tok| tok.trim_matches(|c: char| !c.is_alphanumeric()).parse::<i64>().ok())
    {
        return (Some(Identifier::Numeric(n)), 0.9);
    }

    if let Some(title) = extract_quoted_title(text) {
        return (Some(Identifier::Title(title)), 0.85);
    }

    (None, 0.0)
}

fn extract_quoted_title(text: &str) -> Option<String> {
    let start = text.find(['"', '\''])?;
    let quote = text.as_bytes()[start] as char;
    let rest = &text[start + 1..];
    let end = rest.find(quote)?;
    let title = &rest[..end];
    if title.trim().is_empty() { None } else { Some(title.trim().to_string()) }
}

fn contains_word(haystack: &str, needle: &str) -> bool {
    haystack.split(|c: char| !c.is_alphanumeric()).any(|w| w == needle)
}
