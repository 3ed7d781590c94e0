//! Trait definitions for catalog providers.
//!
//! The watchlist only ever asks a catalog one question: "what should these
//! identifiers look like on screen?". Providers answer with [`CatalogRecord`]s.

use std::future::Future;

/// A source of display records keyed by catalog identifier.
pub trait CatalogProvider: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Fetch display records for `ids` in a single request.
    ///
    /// Identifiers the catalog does not know are absent from the result.
    /// No ordering is guaranteed.
    fn fetch_by_ids(
        &self,
        ids: &[u64],
    ) -> impl Future<Output = Result<Vec<CatalogRecord>, Self::Error>> + Send;
}

/// Display-ready projection of one anime.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CatalogRecord {
    pub id: u64,
    pub title: String,
    pub cover_url: Option<String>,
    /// Average score on a 0-100 scale.
    pub average_score: Option<u32>,
    pub episodes: Option<u32>,
    pub format: Option<String>,
}

impl CatalogRecord {
    /// Score on a 0-10 scale with one fraction digit, e.g. `"8.5"`.
    ///
    /// A missing or zero score has no badge.
    pub fn score_label(&self) -> Option<String> {
        match self.average_score {
            Some(score) if score > 0 => Some(format!("{}.{}", score / 10, score % 10)),
            _ => None,
        }
    }

    /// Media format tag, `ANIME` when the catalog has none.
    pub fn format_label(&self) -> &str {
        self.format
            .as_deref()
            .filter(|f| !f.is_empty())
            .unwrap_or("ANIME")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(score: Option<u32>, format: Option<&str>) -> CatalogRecord {
        CatalogRecord {
            id: 1,
            title: "Cowboy Bebop".into(),
            cover_url: None,
            average_score: score,
            episodes: Some(26),
            format: format.map(Into::into),
        }
    }

    #[test]
    fn test_score_label() {
        assert_eq!(record(Some(85), None).score_label().as_deref(), Some("8.5"));
        assert_eq!(record(Some(90), None).score_label().as_deref(), Some("9.0"));
        assert_eq!(record(Some(100), None).score_label().as_deref(), Some("10.0"));
        assert_eq!(record(Some(7), None).score_label().as_deref(), Some("0.7"));
    }

    #[test]
    fn test_score_label_absent_or_zero() {
        assert_eq!(record(None, None).score_label(), None);
        assert_eq!(record(Some(0), None).score_label(), None);
    }

    #[test]
    fn test_format_label_fallback() {
        assert_eq!(record(None, Some("TV")).format_label(), "TV");
        assert_eq!(record(None, Some("")).format_label(), "ANIME");
        assert_eq!(record(None, None).format_label(), "ANIME");
    }
}
