//! # Path Normalizer
//!
//! Maps raw paths from either inventory to a canonical key so that a file
//! seen by the torrent client and the same file seen on disk compare equal.
//!
//! The key is the tail of the path starting at the earliest category marker
//! (`/4k/`, `/movies/`, `/shows/`). Local paths additionally lose the mount
//! prefix first, because the scanner sees the library through a mount point
//! the torrent client does not.
//!
//! ```
//! use core_library::normalize::PathNormalizer;
//!
//! let normalizer = PathNormalizer::new("/mnt");
//! assert_eq!(normalizer.local_key("/mnt/movies/A/f1.mkv"), "/movies/A/f1.mkv");
//! assert_eq!(normalizer.remote_key("/downloads/movies/A/f1.mkv"), "/movies/A/f1.mkv");
//! ```
//!
//! Matching is exact string equality on the keys: no case folding and no
//! trailing-separator handling.

use std::borrow::Cow;

use crate::models::Category;

/// Replace `\` separators with `/`.
pub fn to_slash(path: &str) -> Cow<'_, str> {
    if path.contains('\\') {
        Cow::Owned(path.replace('\\', "/"))
    } else {
        Cow::Borrowed(path)
    }
}

/// First category (priority 4k, movies, shows) whose marker occurs in `path`.
pub fn classify(path: &str) -> Category {
    let path = to_slash(path);
    Category::LABELLED
        .into_iter()
        .find(|category| {
            category
                .marker()
                .is_some_and(|marker| path.contains(marker))
        })
        .unwrap_or(Category::Unknown)
}

/// Tail of `path` from the earliest category marker, or the whole
/// slash-normalized path when none occurs.
pub fn normalized_key(path: &str) -> String {
    let path = to_slash(path);
    let earliest = Category::LABELLED
        .iter()
        .filter_map(|category| category.marker())
        .filter_map(|marker| path.find(marker))
        .min();

    match earliest {
        Some(index) => path[index..].to_string(),
        None => path.into_owned(),
    }
}

/// Folded name and path that free-text search matches against.
///
/// SQLite only case-folds ASCII, so folding happens here with full Unicode
/// lowercasing. The newline keeps a term from matching across the two fields.
pub fn search_text(file_name: &str, file_path: &str) -> String {
    format!("{}\n{}", file_name, to_slash(file_path)).to_lowercase()
}

/// Normalizer bound to a mount prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathNormalizer {
    mount_prefix: String,
}

impl PathNormalizer {
    /// An empty prefix disables stripping. A trailing separator is ignored.
    pub fn new(mount_prefix: impl Into<String>) -> Self {
        let prefix = mount_prefix.into();
        let prefix = to_slash(&prefix).trim_end_matches('/').to_string();
        Self {
            mount_prefix: prefix,
        }
    }

    pub fn mount_prefix(&self) -> &str {
        &self.mount_prefix
    }

    /// Remove the mount prefix when it is a whole leading path component.
    ///
    /// `/mnt/movies/x` becomes `/movies/x`; `/mnt2/x` is left untouched.
    pub fn strip_mount_prefix(&self, path: &str) -> String {
        let path = to_slash(path);
        if self.mount_prefix.is_empty() {
            return path.into_owned();
        }

        match path.strip_prefix(self.mount_prefix.as_str()) {
            Some(rest) if rest.is_empty() || rest.starts_with('/') => rest.to_string(),
            _ => path.into_owned(),
        }
    }

    /// Key for a local path: mount prefix stripped, then marker tail.
    pub fn local_key(&self, path: &str) -> String {
        normalized_key(&self.strip_mount_prefix(path))
    }

    /// Key for a remote path: marker tail only.
    pub fn remote_key(&self, path: &str) -> String {
        normalized_key(path)
    }
}

impl Default for PathNormalizer {
    fn default() -> Self {
        Self::new("/mnt")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_text_folds_unicode() {
        assert_eq!(
            search_text("Amélie.MKV", "/movies/AMÉLIE/Amélie.MKV"),
            "amélie.mkv\n/movies/amélie/amélie.mkv"
        );
    }

    #[test]
    fn test_classify_priority_order() {
        assert_eq!(classify("/data/4k/movies/A/f.mkv"), Category::FourK);
        assert_eq!(classify("/data/movies/4k/A/f.mkv"), Category::FourK);
        assert_eq!(classify("/data/shows/movies/A/f.mkv"), Category::Movies);
        assert_eq!(classify("/data/shows/B/f.mkv"), Category::Shows);
    }

    #[test]
    fn test_classify_requires_wrapped_label() {
        assert_eq!(classify("/data/movies"), Category::Unknown);
        assert_eq!(classify("/data/Movies/A/f.mkv"), Category::Unknown);
        assert_eq!(classify("/data/mymovies/A/f.mkv"), Category::Unknown);
        assert_eq!(classify("movies/A/f.mkv"), Category::Unknown);
        assert_eq!(classify("/data/misc/f.mkv"), Category::Unknown);
    }

    #[test]
    fn test_classify_accepts_backslashes() {
        assert_eq!(classify("D:\\media\\shows\\B\\f.mkv"), Category::Shows);
    }

    #[test]
    fn test_normalized_key_uses_earliest_marker() {
        assert_eq!(
            normalized_key("/srv/shows/Movies Show/movies/f.mkv"),
            "/shows/Movies Show/movies/f.mkv"
        );
        assert_eq!(
            normalized_key("/srv/movies/x/shows/f.mkv"),
            "/movies/x/shows/f.mkv"
        );
        assert_eq!(normalized_key("/srv/other/f.mkv"), "/srv/other/f.mkv");
    }

    #[test]
    fn test_normalized_key_is_idempotent_on_marker_paths() {
        for path in [
            "/downloads/movies/A/f1.mkv",
            "/x/4k/B/f.mkv",
            "/shows/C/S01/e1.mkv",
        ] {
            let once = normalized_key(path);
            assert_eq!(normalized_key(&once), once);
        }
    }

    #[test]
    fn test_local_key_ignores_leading_mount_prefix() {
        let normalizer = PathNormalizer::new("/mnt");
        for path in ["/movies/A/f1.mkv", "/library/shows/B/f2.mkv", "/misc/f3.bin"] {
            let mounted = format!("/mnt{}", path);
            assert_eq!(normalizer.local_key(&mounted), normalizer.local_key(path));
        }
    }

    #[test]
    fn test_strip_mount_prefix_respects_component_boundary() {
        let normalizer = PathNormalizer::new("/mnt/");
        assert_eq!(normalizer.mount_prefix(), "/mnt");
        assert_eq!(normalizer.strip_mount_prefix("/mnt/movies/A"), "/movies/A");
        assert_eq!(normalizer.strip_mount_prefix("/mnt2/movies/A"), "/mnt2/movies/A");
        assert_eq!(normalizer.strip_mount_prefix("/data/mnt/x"), "/data/mnt/x");
    }

    #[test]
    fn test_empty_mount_prefix_disables_stripping() {
        let normalizer = PathNormalizer::new("");
        assert_eq!(normalizer.strip_mount_prefix("/mnt/x"), "/mnt/x");
    }

    #[test]
    fn test_remote_key_does_not_strip_mount_prefix() {
        let normalizer = PathNormalizer::default();
        assert_eq!(normalizer.remote_key("/mnt/other/f.mkv"), "/mnt/other/f.mkv");
        assert_eq!(normalizer.local_key("/mnt/other/f.mkv"), "/other/f.mkv");
    }
}
