//! Catalog entries.

use serde::{Deserialize, Serialize};

/// A catalog title with its copy counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub id: String,

    pub title: String,

    #[serde(default)]
    pub author: String,

    #[serde(default)]
    pub publisher: String,

    #[serde(default)]
    pub year: i32,

    #[serde(default)]
    pub isbn: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub price: f64,

    #[serde(default)]
    pub cover_image: String,

    #[serde(default)]
    pub total_copies: u32,

    #[serde(default)]
    pub available_copies: u32,
}

impl Book {
    pub fn is_available(&self) -> bool {
        self.available_copies > 0
    }
}

/// Catalog search filters. Empty fields are not sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookFilters {
    pub search: Option<String>,
    pub author: Option<String>,
    pub publisher: Option<String>,
    pub year: Option<String>,
}

impl BookFilters {
    pub fn search(text: impl Into<String>) -> Self {
        Self {
            search: Some(text.into()),
            ..Self::default()
        }
    }

    /// Non-empty filters as query pairs, in a fixed order.
    pub fn query_pairs(&self) -> Vec<(&'static str, &str)> {
        [
            ("search", &self.search),
            ("author", &self.author),
            ("publisher", &self.publisher),
            ("year", &self.year),
        ]
        .into_iter()
        .filter_map(|(key, value)| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(|v| (key, v))
        })
        .collect()
    }

    /// Case-insensitive match used by the in-memory backend.
    pub fn matches(&self, book: &Book) -> bool {
        let contains = |haystack: &str, needle: &Option<String>| {
            needle.as_deref().map(str::trim).is_none_or(|n| {
                n.is_empty() || haystack.to_lowercase().contains(&n.to_lowercase())
            })
        };

        let search_hit = self.search.as_deref().map(str::trim).is_none_or(|n| {
            n.is_empty()
                || book.title.to_lowercase().contains(&n.to_lowercase())
                || book.author.to_lowercase().contains(&n.to_lowercase())
                || book.isbn.contains(n)
        });
        let year_hit = self
            .year
            .as_deref()
            .map(str::trim)
            .is_none_or(|y| y.is_empty() || y == book.year.to_string());

        search_hit
            && year_hit
            && contains(&book.author, &self.author)
            && contains(&book.publisher, &self.publisher)
    }
}
