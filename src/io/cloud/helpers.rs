//! Shared helpers for the transports and the listing layer.
//!
//! - [`paginate_with_marker`] - drain a marker-based listing API page by page
//! - [`glob_to_regex`] / [`extract_prefix_before_wildcard`] - turn a wildcard pattern
//!   into a provider prefix plus a matcher
//! - [`extension_suffix`] / [`matches_extension`] - the `.ext` filter used by listings

use crate::error::{Result, SeqError};
use log::{debug, warn};

// ============================================================================
// Pagination Helper
// ============================================================================

/// Configuration for pagination
#[derive(Debug, Clone, Copy, Default)]
pub struct PaginationConfig {
    /// Stop after this many pages even if the provider reports more.
    pub max_pages: Option<u32>,
}

/// Drain a marker-based listing.
///
/// `fetch_page` receives the marker to resume after (`None` for the first page) and
/// returns that page's items plus the next marker. Items are appended in page order.
///
/// # Errors
///
/// Returns the first page error, or `Transport` if the provider hands back the same
/// marker twice (it would otherwise loop forever)
pub fn paginate_with_marker<T, F>(config: &PaginationConfig, mut fetch_page: F) -> Result<Vec<T>>
where
    F: FnMut(Option<&str>) -> Result<(Vec<T>, Option<String>)>,
{
    let mut all_items = Vec::new();
    let mut marker: Option<String> = None;
    let mut page = 0u32;

    loop {
        let (items, next) = fetch_page(marker.as_deref())?;
        page += 1;
        debug!("listing page {page}: {} item(s)", items.len());
        all_items.extend(items);

        let Some(next) = next else {
            break;
        };
        if marker.as_deref() == Some(next.as_str()) {
            return Err(SeqError::transport(format!(
                "listing did not advance past marker {next}"
            )));
        }
        marker = Some(next);

        if let Some(max_pages) = config.max_pages
            && page >= max_pages
        {
            warn!("listing stopped after {page} page(s); more results remain");
            break;
        }
    }

    Ok(all_items)
}

// ============================================================================
// Wildcards
// ============================================================================

/// True if the string contains a `*` or `?` wildcard.
#[must_use]
pub fn has_wildcard(pattern: &str) -> bool {
    pattern.contains(['*', '?'])
}

/// Convert a glob pattern to an anchored regex.
///
/// `*` matches within one path segment, `**` crosses segments, `?` matches one
/// character. Everything else is literal.
#[must_use]
pub fn glob_to_regex(pattern: &str) -> String {
    let mut regex = String::from("^");
    let mut chars = pattern.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    regex.push_str(".*");
                } else {
                    regex.push_str("[^/]*");
                }
            }
            '?' => regex.push_str("[^/]"),
            '.' => regex.push_str(r"\."),
            '+' | '(' | ')' | '|' | '[' | ']' | '{' | '}' | '^' | '$' | '\\' => {
                regex.push('\\');
                regex.push(ch);
            }
            _ => regex.push(ch),
        }
    }

    regex.push('$');
    regex
}

/// Everything before the first wildcard, or the whole pattern if there is none.
#[must_use]
pub fn extract_prefix_before_wildcard(pattern: &str) -> &str {
    pattern.find(['*', '?']).map_or(pattern, |pos| &pattern[..pos])
}

/// The extension named by a trailing `*.ext` in a pattern, if the tail is wildcard free.
#[must_use]
pub fn trailing_extension(pattern: &str) -> Option<&str> {
    let (_, tail) = pattern.rsplit_once("*.")?;
    (!tail.is_empty() && !has_wildcard(tail) && !tail.contains('/')).then_some(tail)
}

// ============================================================================
// Extension Filter
// ============================================================================

/// Normalize an extension argument to the suffix it selects: `""` for all, else `.ext`.
#[must_use]
pub fn extension_suffix(extension: &str) -> String {
    let ext = extension.trim_start_matches('.');
    if ext.is_empty() {
        String::new()
    } else {
        format!(".{ext}")
    }
}

/// Does `name` end with the suffix produced by [`extension_suffix`]?
#[must_use]
pub fn matches_extension(name: &str, suffix: &str) -> bool {
    suffix.is_empty() || name.ends_with(suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use regex::Regex;

    #[test]
    fn pagination_collects_all_pages_in_order() {
        let pages = [vec![1, 2], vec![3], vec![4, 5]];
        let result = paginate_with_marker(&PaginationConfig::default(), |marker| {
            let idx: usize = marker.map_or(0, |m| m.parse().unwrap());
            let next = (idx + 1 < pages.len()).then(|| (idx + 1).to_string());
            Ok((pages[idx].clone(), next))
        })
        .unwrap();
        assert_eq!(result, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn pagination_honours_max_pages() {
        let config = PaginationConfig { max_pages: Some(2) };
        let mut calls = 0;
        let result = paginate_with_marker(&config, |_| {
            calls += 1;
            Ok((vec![calls], Some(format!("m{calls}"))))
        })
        .unwrap();
        assert_eq!(result, vec![1, 2]);
    }

    #[test]
    fn pagination_rejects_a_stuck_marker() {
        let err = paginate_with_marker(&PaginationConfig::default(), |_| {
            Ok((vec![0u8], Some("same".to_string())))
        })
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Transport);
    }

    #[test]
    fn glob_regex_respects_segments() {
        let re = Regex::new(&glob_to_regex("data/*.nc")).unwrap();
        assert!(re.is_match("data/a.nc"));
        assert!(!re.is_match("data/sub/a.nc"));
        assert!(!re.is_match("data/anc"));

        let re = Regex::new(&glob_to_regex("data/**/x?.txt")).unwrap();
        assert!(re.is_match("data/a/b/x1.txt"));
        assert!(!re.is_match("data/a/b/x12.txt"));
    }

    #[test]
    fn prefix_and_extension_from_pattern() {
        assert_eq!(extract_prefix_before_wildcard("logs/2024-*/a.gz"), "logs/2024-");
        assert_eq!(extract_prefix_before_wildcard("plain/key"), "plain/key");
        assert_eq!(trailing_extension("dir/*.nc"), Some("nc"));
        assert_eq!(trailing_extension("dir/*"), None);
        assert_eq!(trailing_extension("dir/*.n?"), None);
    }

    #[test]
    fn extension_filter() {
        assert_eq!(extension_suffix(""), "");
        assert_eq!(extension_suffix("nc"), ".nc");
        assert_eq!(extension_suffix(".nc"), ".nc");
        assert!(matches_extension("a.nc", ".nc"));
        assert!(!matches_extension("a.nc4", ".nc"));
        assert!(!matches_extension("anc", ".nc"));
        assert!(matches_extension("anything", ""));
    }
}
