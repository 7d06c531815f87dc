//! Custom-id grammar: `<prefix>[|<segment>]*`, where a segment is either a
//! positional value or a `key=value` pair.

pub const DELIMITER: char = '|';

/// Trim whitespace and stray delimiters. Returns `None` when nothing is left.
pub fn normalize(raw: &str) -> Option<&str> {
    let key = raw.trim().trim_matches(DELIMITER).trim();
    if key.is_empty() {
        None
    } else {
        Some(key)
    }
}

/// `true` when `key` is `prefix` itself or continues it at a delimiter.
pub fn matches_prefix(key: &str, prefix: &str) -> bool {
    if prefix.is_empty() || !key.starts_with(prefix) {
        return false;
    }
    if key.len() == prefix.len() || prefix.ends_with(DELIMITER) || prefix.ends_with('=') {
        return true;
    }
    key[prefix.len()..].starts_with(DELIMITER)
}

pub fn build(prefix: &str, segments: &[&str]) -> String {
    let mut id = prefix.to_string();
    for segment in segments {
        id.push(DELIMITER);
        id.push_str(segment);
    }
    id
}

/// Value of the first `key=value` segment.
pub fn param<'a>(id: &'a str, key: &str) -> Option<&'a str> {
    id.split(DELIMITER)
        .skip(1)
        .filter_map(|segment| segment.split_once('='))
        .find(|(k, _)| k.trim() == key)
        .map(|(_, v)| v.trim())
        .filter(|v| !v.is_empty())
}

/// Positional segment after the prefix (0-based), skipping `key=value` pairs.
pub fn positional(id: &str, index: usize) -> Option<&str> {
    id.split(DELIMITER)
        .skip(1)
        .filter(|segment| !segment.contains('='))
        .nth(index)
        .map(str::trim)
        .filter(|v| !v.is_empty())
}
