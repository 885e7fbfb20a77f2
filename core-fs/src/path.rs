//! Path normalization.
//!
//! Cache keys are normalized paths: the root is the empty string and every
//! other path is `/`-anchored with no trailing or repeated separators, e.g.
//! `/Music/Live`.

/// Normalize a client-supplied path into a cache key
pub fn normalize(path: &str) -> String {
    let trimmed = path.strip_prefix("./").unwrap_or(path);

    let mut out = String::with_capacity(trimmed.len() + 1);
    for segment in trimmed.split('/').filter(|s| !s.is_empty() && *s != ".") {
        out.push('/');
        out.push_str(segment);
    }
    out
}

/// Normalized path of the parent; the root is its own parent
pub fn parent(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    }
}

/// Last segment of a normalized path; empty for the root
pub fn basename(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

/// Append one segment to a normalized path
pub fn join(base: &str, name: &str) -> String {
    format!("{}/{}", base, name)
}
