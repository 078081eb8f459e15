//! Filename derivation for generated images.
//!
//! Output paths arrive as server-relative URLs (`/outputs/abc/0001.png`)
//! or absolute ones. Local filenames are always the last non-empty path
//! segment, with a positional fallback when the URL has none.

use std::collections::HashSet;

use crate::types::DbId;

/// Extract the last non-empty path segment of a URL or path.
///
/// Query strings, fragments, scheme and host are ignored. Returns `None`
/// when the URL has no usable segment (e.g. `https://host/`).
///
/// ```
/// use artforge_core::naming::last_path_segment;
///
/// assert_eq!(last_path_segment("/outputs/run/a.png"), Some("a.png"));
/// assert_eq!(last_path_segment("https://host/x/b.png?v=2"), Some("b.png"));
/// assert_eq!(last_path_segment("https://host/"), None);
/// ```
pub fn last_path_segment(url: &str) -> Option<&str> {
    let clean = url.split('?').next().unwrap_or(url);
    let clean = clean.split('#').next().unwrap_or(clean);

    let path = match clean.split_once("://") {
        Some((_, rest)) => rest.find('/').map(|i| &rest[i..]).unwrap_or(""),
        None => clean,
    };

    path.rsplit('/').find(|s| !s.is_empty())
}

/// Filename for the `index`-th image of a batch, falling back to
/// `image-{index}.png` when the URL carries no segment.
pub fn image_filename(url: &str, index: usize) -> String {
    last_path_segment(url)
        .map(str::to_string)
        .unwrap_or_else(|| format!("image-{index}.png"))
}

/// Download name for a background-removal output.
pub fn remove_bg_filename(task_id: DbId) -> String {
    format!("rmbg_{task_id}.png")
}

/// Produce a name not yet present in `taken`, recording it.
///
/// The first occurrence of a name is kept as-is; later collisions are
/// prefixed with their batch index (`3-a.png`), then with an extra
/// counter if even that is taken.
pub fn unique_name(taken: &mut HashSet<String>, name: String, index: usize) -> String {
    if taken.insert(name.clone()) {
        return name;
    }

    let mut candidate = format!("{index}-{name}");
    let mut attempt = 1;
    while !taken.insert(candidate.clone()) {
        candidate = format!("{index}-{attempt}-{name}");
        attempt += 1;
    }
    candidate
}
