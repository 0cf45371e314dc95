//! File suffix derivation for remote image URLs.

use reqwest::Url;

/// Returns the suffix (including the leading dot) of the URL's last path
/// segment, or `None` if it has no extension.
///
/// Query and fragment never contribute. For multi-dot names only the final
/// piece is used, so `archive.tar.gz` yields `.gz`.
#[must_use]
pub fn extension_of(url: &Url) -> Option<String> {
    let segment = url.path_segments()?.next_back()?;
    let mut pieces = segment.split('.');
    pieces.next()?;
    pieces.next_back().map(|ext| format!(".{ext}"))
}

/// Parses `url` and returns its extension. Unparseable input has none.
#[must_use]
pub fn extension_of_str(url: &str) -> Option<String> {
    Url::parse(url).ok().as_ref().and_then(extension_of)
}
