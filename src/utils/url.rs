// src/utils/url.rs

//! Gateway URL construction.

use url::Url;

use crate::error::{AppError, Result};

/// Parse the configured gateway base URL.
pub fn parse_base(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim())?;
    if url.cannot_be_a_base() {
        return Err(AppError::config(format!(
            "Gateway base URL cannot carry paths: {raw}"
        )));
    }
    Ok(url)
}

/// Build an endpoint URL under `base`.
///
/// Each entry of `segments` becomes one percent-encoded path segment, so ids
/// containing `/` or spaces stay inside their segment. Query pairs are
/// appended in order.
///
/// # Examples
/// ```
/// use lending_sync::utils::url::{endpoint, parse_base};
///
/// let base = parse_base("http://localhost:8080/api").unwrap();
/// let url = endpoint(&base, &["reservations", "4"], &[("user_id", "user1")]).unwrap();
/// assert_eq!(url.as_str(), "http://localhost:8080/api/reservations/4?user_id=user1");
/// ```
pub fn endpoint(base: &Url, segments: &[&str], query: &[(&str, &str)]) -> Result<Url> {
    let mut url = base.clone();
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|_| AppError::config(format!("Gateway base URL cannot carry paths: {base}")))?;
        path.pop_if_empty();
        path.extend(segments);
    }

    url.set_query(None);
    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query);
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_base_path() {
        let base = parse_base("http://localhost:8080/api").unwrap();
        let url = endpoint(&base, &["borrows", "history"], &[]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/api/borrows/history");
    }

    #[test]
    fn test_trailing_slash_base() {
        let base = parse_base("https://library.example/api/").unwrap();
        let url = endpoint(&base, &["books"], &[]).unwrap();
        assert_eq!(url.as_str(), "https://library.example/api/books");
    }

    #[test]
    fn test_segments_are_encoded() {
        let base = parse_base("http://gw").unwrap();
        let url = endpoint(&base, &["borrows", "return", "a/b c"], &[]).unwrap();
        assert_eq!(url.as_str(), "http://gw/borrows/return/a%2Fb%20c");
    }

    #[test]
    fn test_query_pairs() {
        let base = parse_base("http://gw/api").unwrap();
        let url = endpoint(
            &base,
            &["books"],
            &[("search", "rust & co"), ("year", "2024")],
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "http://gw/api/books?search=rust+%26+co&year=2024"
        );
    }

    #[test]
    fn test_rejects_non_base_url() {
        assert!(parse_base("mailto:someone@example.com").is_err());
    }
}
