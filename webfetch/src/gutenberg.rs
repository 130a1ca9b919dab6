//! Project Gutenberg body extraction.
//!
//! Gutenberg plain-text editions surround the book with a license header and
//! footer, separated from it by lines such as
//! `*** START OF THE PROJECT GUTENBERG EBOOK ... ***`. The body is the text
//! between the first and second such marker.

use std::sync::LazyLock;

use regex::Regex;

use crate::SourceFetchError;

/// `.` does not match `\n`, so a marker never spans lines.
static BOUNDARY_MARKER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\*\*\* .+ \*\*\*").ok());

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GutenbergText {
    /// Text between the first two markers.
    pub body: String,
    /// Byte length of every part produced by the marker split, in order.
    pub part_lengths: Vec<usize>,
}

/// Strip `\r` and return the part between the first two boundary markers.
pub fn extract_gutenberg_body(raw: &str) -> Result<GutenbergText, SourceFetchError> {
    let text = raw.replace('\r', "");
    let parts: Vec<&str> = match BOUNDARY_MARKER.as_ref() {
        Some(marker) => marker.split(&text).collect(),
        None => vec![text.as_str()],
    };

    let part_lengths: Vec<usize> = parts.iter().map(|part| part.len()).collect();
    tracing::info!(?part_lengths, "Divided source into parts");

    if parts.len() < 3 {
        return Err(SourceFetchError::MissingMarkers { parts: parts.len() });
    }

    Ok(GutenbergText {
        body: parts[1].to_string(),
        part_lengths,
    })
}
