//! OSC address canonicalization.
//!
//! Every path that enters the mirror goes through [`sanitize_path`]; index and
//! listener lookups additionally fold case through [`index_key`].

/// Canonicalize an OSC path: force a leading slash, collapse repeated
/// slashes and replace spaces with underscores.
///
/// ```
/// use oscquery_client::sanitize_path;
///
/// assert_eq!(sanitize_path("//a//b c"), "/a/b_c");
/// assert_eq!(sanitize_path("foo"), "/foo");
/// ```
pub fn sanitize_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len() + 1);
    out.push('/');
    for ch in path.chars() {
        match ch {
            '/' if out.ends_with('/') => {}
            ' ' => out.push('_'),
            _ => out.push(ch),
        }
    }
    out
}

/// Check a path against the OSC address grammar used by OSCQuery servers:
/// `/` or one or more `/segment` parts made of `[#A-Za-z0-9_-]`.
pub fn is_osc_path(path: &str) -> bool {
    let Some(rest) = path.strip_prefix('/') else {
        return false;
    };
    if rest.is_empty() {
        return true;
    }
    rest.split('/').all(|segment| {
        !segment.is_empty()
            && segment
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '#' | '_' | '-'))
    })
}

/// Lower-cased canonical form used as the key of the path index and of the
/// per-path listener table.
pub fn index_key(path: &str) -> String {
    let mut key = sanitize_path(path);
    while key.len() > 1 && key.ends_with('/') {
        key.pop();
    }
    key.to_lowercase()
}

/// Non-empty segments of a path.
pub(crate) fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Split a canonical path into its parent path and final segment.
///
/// Returns `None` for the root.
pub(crate) fn split_parent(path: &str) -> Option<(String, String)> {
    let parts: Vec<&str> = segments(path).collect();
    let (name, parent) = parts.split_last()?;
    let parent = if parent.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", parent.join("/"))
    };
    Some((parent, name.to_string()))
}

/// The root and every ancestor of `path`, ending with `path` itself.
///
/// `"/a/b"` yields `["/", "/a", "/a/b"]`.
pub(crate) fn ancestry(path: &str) -> Vec<String> {
    let mut chain = vec!["/".to_string()];
    let mut current = String::new();
    for segment in segments(path) {
        current.push('/');
        current.push_str(segment);
        chain.push(current.clone());
    }
    chain
}

/// True when `key` equals `prefix` or lies below it on a segment boundary.
/// Both arguments are index keys.
pub(crate) fn is_within(key: &str, prefix: &str) -> bool {
    if prefix == "/" {
        return true;
    }
    key == prefix
        || key
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_collapses_and_replaces() {
        assert_eq!(sanitize_path("//a//b c"), "/a/b_c");
        assert_eq!(sanitize_path(""), "/");
        assert_eq!(sanitize_path("/"), "/");
        assert_eq!(sanitize_path("a b/c"), "/a_b/c");
    }

    #[test]
    fn sanitize_is_idempotent() {
        for p in ["//a//b c", "x", "/already/fine", "  ", "///", "/Mixed/Case Path/"] {
            let once = sanitize_path(p);
            assert_eq!(sanitize_path(&once), once, "input {p:?}");
        }
    }

    #[test]
    fn osc_path_grammar() {
        assert!(is_osc_path("/"));
        assert!(is_osc_path("/a/b_c/#1/x-y"));
        assert!(!is_osc_path("a/b"));
        assert!(!is_osc_path("/a//b"));
        assert!(!is_osc_path("/a b"));
        assert!(!is_osc_path("/a/"));
    }

    #[test]
    fn index_key_folds_case_and_trailing_slash() {
        assert_eq!(index_key("/Layer/Opacity/"), "/layer/opacity");
        assert_eq!(index_key("/"), "/");
    }

    #[test]
    fn parent_and_ancestry() {
        assert_eq!(split_parent("/a/b"), Some(("/a".to_string(), "b".to_string())));
        assert_eq!(split_parent("/a"), Some(("/".to_string(), "a".to_string())));
        assert_eq!(split_parent("/"), None);
        assert_eq!(ancestry("/a/b"), vec!["/", "/a", "/a/b"]);
        assert_eq!(ancestry("/"), vec!["/"]);
    }

    #[test]
    fn within_respects_segment_boundaries() {
        assert!(is_within("/a/b", "/a/b"));
        assert!(is_within("/a/b/c", "/a/b"));
        assert!(!is_within("/a/bc", "/a/b"));
        assert!(is_within("/anything", "/"));
    }
}
