//! Text preparation shared by ingestion and querying

use regex::Regex;
use std::sync::LazyLock;

static MARKUP_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<[^>]*>").expect("markup pattern is a valid regex")
});

static BLANK_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("blank-line pattern is a valid regex"));

/// Strip HTML tags from an AniList description and unescape the common entities.
pub fn clean_markup(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }

    let stripped = MARKUP_TAG.replace_all(raw, "");
    let unescaped = stripped
        .replace("&quot;", "\"")
        .replace("&#039;", "'")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&");

    BLANK_RUNS.replace_all(unescaped.trim(), "\n\n").into_owned()
}

/// Text embedded for a catalog item. Ingestion and name ingestion both go
/// through this so stored vectors share one convention.
pub fn embedding_source(
    romaji: Option<&str>,
    english: Option<&str>,
    description: &str,
    genres: &[String],
) -> String {
    format!(
        "Title: {} ({})\nDescription: {}\nGenres: {}",
        romaji.unwrap_or_default(),
        english.unwrap_or_default(),
        description,
        genres.join(", ")
    )
}

/// Query text embedded for genre-mode recommendations.
pub fn genre_query(query: &str) -> String {
    format!("Genres: {}", query)
}

/// Cut `text` to at most `max_chars` characters on a char boundary, marking the cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", text[..cut].trim_end()),
        None => text.to_string(),
    }
}
