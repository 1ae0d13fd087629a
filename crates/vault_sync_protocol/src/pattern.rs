//! Path patterns and file classification shared by transports.

/// Extensions treated as text documents. Everything else is binary.
pub const TEXT_EXTENSIONS: &[&str] = &["md", "markdown", "txt", "json", "jsonl", "yaml", "yml", "csv"];

/// Returns true if `path` matches a glob-style `pattern`.
///
/// `*` matches any run of characters (including `/`) and `?` matches a
/// single character. An empty pattern matches everything.
pub fn matches_pattern(pattern: &str, path: &str) -> bool {
    if pattern.is_empty() {
        return true;
    }

    let pattern: Vec<char> = pattern.chars().collect();
    let path: Vec<char> = path.chars().collect();

    let (mut p, mut s) = (0usize, 0usize);
    let mut star: Option<usize> = None;
    let mut star_match = 0usize;

    while s < path.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == path[s]) {
            p += 1;
            s += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            star = Some(p);
            star_match = s;
            p += 1;
        } else if let Some(star_pos) = star {
            p = star_pos + 1;
            star_match += 1;
            s = star_match;
        } else {
            return false;
        }
    }

    while p < pattern.len() && pattern[p] == '*' {
        p += 1;
    }
    p == pattern.len()
}

/// Returns true if the path names a text document.
pub fn is_text_path(path: &str) -> bool {
    let name = path.rsplit('/').next().unwrap_or(path);
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => {
            let ext = ext.to_ascii_lowercase();
            TEXT_EXTENSIONS.contains(&ext.as_str())
        }
        _ => false,
    }
}

/// Returns true if a path takes part in a sync with the given settings.
pub fn is_syncable(path: &str, pattern: &str, include_binary: bool) -> bool {
    matches_pattern(pattern, path) && (include_binary || is_text_path(path))
}
